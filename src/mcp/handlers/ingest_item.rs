use std::sync::Arc;

use crate::chunking::{Chunker, ChunkingConfig};
use crate::core::context::CoreContext;
use crate::core::model::{Item, SourceType};
use crate::mcp::http::McpCallResponse;
use crate::search::SearchCore;

pub async fn handle(ctx: Arc<CoreContext>, args: &serde_json::Value) -> McpCallResponse {
    let title = match args.get("title").and_then(|v| v.as_str()) {
        Some(t) => t.to_string(),
        None => return McpCallResponse::error("missing required field: title"),
    };
    let content = match args.get("content").and_then(|v| v.as_str()) {
        Some(c) => c.to_string(),
        None => return McpCallResponse::error("missing required field: content"),
    };
    let source_type = match args.get("source_type").and_then(|v| v.as_str()).and_then(SourceType::parse) {
        Some(st) => st,
        None => return McpCallResponse::error("missing or invalid field: source_type"),
    };
    let source_path = args.get("source_path").and_then(|v| v.as_str()).map(str::to_string);

    let mut item = Item::new(title, content, source_type);
    item.source_path = source_path;

    if let Err(e) = ctx.store.save_item(&item) {
        return McpCallResponse::error(format!("failed to save item: {e}"));
    }

    let chunker = Chunker::new(ChunkingConfig::from(&ctx.config));
    let mut chunks = chunker.chunk(&item.content, &item.title);
    for c in &mut chunks {
        c.item_id = item.id.clone();
    }

    let search_core = SearchCore::new(ctx);
    if let Err(e) = search_core.on_item_upserted(&item, &chunks).await {
        return McpCallResponse::error(format!("item saved but indexing failed: {e}"));
    }

    McpCallResponse::ok_json(serde_json::json!({
        "id": item.id,
        "chunk_count": chunks.len(),
    }))
}
