use std::sync::Arc;

use crate::core::context::CoreContext;
use crate::mcp::http::McpCallResponse;
use crate::store::ItemQuery;

/// Filter/paginate items at the database layer.
pub async fn handle(ctx: Arc<CoreContext>, args: &serde_json::Value) -> McpCallResponse {
    let category = args.get("category").and_then(|v| v.as_str()).map(str::to_string);
    let tag = args.get("tag").and_then(|v| v.as_str()).map(str::to_string);
    let limit = args.get("limit").and_then(|v| v.as_i64()).unwrap_or(50);
    let offset = args.get("offset").and_then(|v| v.as_i64()).unwrap_or(0);

    let query = ItemQuery { category, tag, limit, offset };
    match ctx.store.query_items(&query) {
        Ok(items) => {
            let count = items.len();
            McpCallResponse::ok_json(serde_json::json!({ "items": items, "count": count }))
        }
        Err(e) => McpCallResponse::error(format!("failed to query items: {e}")),
    }
}
