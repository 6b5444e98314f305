use std::sync::Arc;

use crate::core::context::CoreContext;
use crate::mcp::http::McpCallResponse;
use crate::search::SearchCore;

/// Deletes an item; the store's cascade delete drains its chunks, category
/// and tag links, and relationships. Both indices are then told to drop the
/// item's chunk projection.
pub async fn handle(ctx: Arc<CoreContext>, args: &serde_json::Value) -> McpCallResponse {
    let Some(id) = args.get("id").and_then(|v| v.as_str()) else {
        return McpCallResponse::error("missing required field: id");
    };

    let deleted = match ctx.store.delete_item(id) {
        Ok(v) => v,
        Err(e) => return McpCallResponse::error(format!("failed to delete item: {e}")),
    };
    if !deleted {
        return McpCallResponse::error(format!("item not found: {id}"));
    }

    let search_core = SearchCore::new(ctx);
    if let Err(e) = search_core.on_item_deleted(id).await {
        return McpCallResponse::error(format!("item deleted but index cleanup failed: {e}"));
    }

    McpCallResponse::ok_json(serde_json::json!({ "id": id, "deleted": true }))
}
