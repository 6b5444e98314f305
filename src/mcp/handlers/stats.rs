use std::sync::Arc;

use crate::core::context::CoreContext;
use crate::mcp::http::McpCallResponse;

/// Row counts per table.
pub async fn handle(ctx: Arc<CoreContext>, _args: &serde_json::Value) -> McpCallResponse {
    match ctx.store.stats() {
        Ok(stats) => McpCallResponse::ok_json(stats),
        Err(e) => McpCallResponse::error(format!("failed to load stats: {e}")),
    }
}
