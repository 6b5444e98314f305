use std::sync::Arc;

use crate::core::context::CoreContext;
use crate::mcp::http::McpCallResponse;

/// Fetches a single item by id, with its categories/tags and chunk count.
/// Returns `NotFound` as a null-shaped response rather than an error.
pub async fn handle(ctx: Arc<CoreContext>, args: &serde_json::Value) -> McpCallResponse {
    let Some(id) = args.get("id").and_then(|v| v.as_str()) else {
        return McpCallResponse::error("missing required field: id");
    };

    let item = match ctx.store.get_item(id) {
        Ok(v) => v,
        Err(e) => return McpCallResponse::error(format!("failed to load item: {e}")),
    };
    let Some(item) = item else {
        return McpCallResponse::ok_json(serde_json::json!({ "item": null }));
    };

    let (categories, tags) = match ctx.store.get_all_items_eager() {
        Ok(eager) => eager
            .into_iter()
            .find(|(i, _, _)| i.id == item.id)
            .map(|(_, c, t)| (c, t))
            .unwrap_or_default(),
        Err(e) => return McpCallResponse::error(format!("failed to load categories/tags: {e}")),
    };

    let chunk_count = match ctx.store.get_chunks_for_item(&item.id) {
        Ok(chunks) => chunks.len(),
        Err(e) => return McpCallResponse::error(format!("failed to load chunks: {e}")),
    };

    McpCallResponse::ok_json(serde_json::json!({
        "item": {
            "id": item.id,
            "title": item.title,
            "content": item.content,
            "source_type": item.source_type.as_str(),
            "source_path": item.source_path,
            "metadata": item.metadata,
            "categories": categories,
            "tags": tags,
            "chunk_count": chunk_count,
            "created_at": item.created_at,
            "updated_at": item.updated_at,
        }
    }))
}
