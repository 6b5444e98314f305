use std::sync::Arc;

use crate::core::context::CoreContext;
use crate::mcp::http::McpCallResponse;
use crate::search::{SearchCore, SearchOptions};

/// Two-phase chunk-aware search. Options are all optional; absent
/// fields fall back to `CoreConfig` defaults inside `SearchCore::search`.
pub async fn handle(ctx: Arc<CoreContext>, args: &serde_json::Value) -> McpCallResponse {
    let Some(query) = args.get("query").and_then(|v| v.as_str()) else {
        return McpCallResponse::error("missing required field: query");
    };

    let options: SearchOptions = match args.get("options") {
        Some(opts) => match serde_json::from_value(opts.clone()) {
            Ok(o) => o,
            Err(e) => return McpCallResponse::error(format!("invalid options: {e}")),
        },
        None => match serde_json::from_value(args.clone()) {
            Ok(o) => o,
            Err(_) => SearchOptions::default(),
        },
    };

    let search_core = SearchCore::new(ctx);
    match search_core.search(query, options).await {
        Ok(response) => McpCallResponse::ok_json(response),
        Err(e) => McpCallResponse::error(format!("search failed: {e}")),
    }
}
