use std::sync::Arc;

use crate::chunking::{Chunker, ChunkingConfig};
use crate::core::context::CoreContext;
use crate::mcp::http::McpCallResponse;
use crate::search::SearchCore;

/// Replaces an item's title/content, bumps `updated_at`, re-chunks, and
/// refreshes both indices.
pub async fn handle(ctx: Arc<CoreContext>, args: &serde_json::Value) -> McpCallResponse {
    let Some(id) = args.get("id").and_then(|v| v.as_str()) else {
        return McpCallResponse::error("missing required field: id");
    };
    let Some(title) = args.get("title").and_then(|v| v.as_str()) else {
        return McpCallResponse::error("missing required field: title");
    };
    let Some(content) = args.get("content").and_then(|v| v.as_str()) else {
        return McpCallResponse::error("missing required field: content");
    };

    match ctx.store.update_item(id, title, content) {
        Ok(false) => return McpCallResponse::error(format!("item not found: {id}")),
        Err(e) => return McpCallResponse::error(format!("failed to update item: {e}")),
        Ok(true) => {}
    }

    let Some(item) = (match ctx.store.get_item(id) {
        Ok(v) => v,
        Err(e) => return McpCallResponse::error(format!("failed to reload item: {e}")),
    }) else {
        return McpCallResponse::error(format!("item disappeared during update: {id}"));
    };

    let chunker = Chunker::new(ChunkingConfig::from(&ctx.config));
    let mut chunks = chunker.chunk(&item.content, &item.title);
    for c in &mut chunks {
        c.item_id = item.id.clone();
    }

    let search_core = SearchCore::new(ctx);
    if let Err(e) = search_core.on_item_upserted(&item, &chunks).await {
        return McpCallResponse::error(format!("item updated but re-indexing failed: {e}"));
    }

    McpCallResponse::ok_json(serde_json::json!({
        "id": item.id,
        "updated_at": item.updated_at,
        "chunk_count": chunks.len(),
    }))
}
