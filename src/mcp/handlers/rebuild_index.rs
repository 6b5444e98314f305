use std::sync::Arc;

use crate::core::context::CoreContext;
use crate::mcp::http::McpCallResponse;
use crate::search::SearchCore;

/// Reloads all chunks from the store and rebuilds both indices from scratch
/// — the recovery path after partial-availability
/// failures in `onItemUpserted`/`onItemDeleted`.
pub async fn handle(ctx: Arc<CoreContext>, _args: &serde_json::Value) -> McpCallResponse {
    let search_core = SearchCore::new(ctx);
    match search_core.rebuild_all().await {
        Ok(()) => McpCallResponse::ok_json(serde_json::json!({ "rebuilt": true })),
        Err(e) => McpCallResponse::error(format!("rebuild failed: {e}")),
    }
}
