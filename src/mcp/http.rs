//! Thin HTTP mirror of the MCP tool surface: a tools-list endpoint and a
//! single call-tool endpoint that dispatches by name.

use axum::{extract::State, http::StatusCode, response::Json};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::info;

use crate::core::context::CoreContext;
use crate::core::model::ErrorResponse;
use crate::mcp::{handlers, tooling};

#[derive(Debug, Serialize, Deserialize)]
pub struct McpTool {
    pub name: String,
    pub title: String,
    pub description: String,
    pub input_schema: serde_json::Value,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct McpToolsResponse {
    pub tools: Vec<McpTool>,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct McpCallRequest {
    pub name: String,
    pub arguments: serde_json::Value,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct McpCallResponse {
    pub content: Vec<McpContent>,
    pub is_error: bool,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct McpContent {
    #[serde(rename = "type")]
    pub content_type: String,
    pub text: String,
}

impl McpCallResponse {
    pub fn ok_json(value: impl Serialize) -> Self {
        Self {
            content: vec![McpContent {
                content_type: "text".to_string(),
                text: serde_json::to_string_pretty(&value).unwrap_or_else(|e| format!("{{\"error\":\"{e}\"}}")),
            }],
            is_error: false,
        }
    }

    pub fn error(message: impl Into<String>) -> Self {
        Self {
            content: vec![McpContent {
                content_type: "text".to_string(),
                text: message.into(),
            }],
            is_error: true,
        }
    }
}

pub fn list_tools_for_context() -> McpToolsResponse {
    let tools = tooling::tool_catalog()
        .into_iter()
        .map(|spec| McpTool {
            name: spec.name.to_string(),
            title: spec.title.to_string(),
            description: spec.description.to_string(),
            input_schema: spec.input_schema,
        })
        .collect();
    McpToolsResponse { tools }
}

pub async fn list_tools(State(_ctx): State<Arc<CoreContext>>) -> Json<McpToolsResponse> {
    Json(list_tools_for_context())
}

pub async fn call_tool(
    State(ctx): State<Arc<CoreContext>>,
    Json(request): Json<McpCallRequest>,
) -> Result<Json<McpCallResponse>, (StatusCode, Json<ErrorResponse>)> {
    info!("MCP tool call: {} with args: {:?}", request.name, request.arguments);
    match call_tool_inner(ctx, &request.name, &request.arguments).await {
        Ok(response) => Ok(Json(response)),
        Err(message) => Err((StatusCode::BAD_REQUEST, Json(ErrorResponse { error: message }))),
    }
}

pub async fn call_tool_inner(
    ctx: Arc<CoreContext>,
    name: &str,
    args: &serde_json::Value,
) -> Result<McpCallResponse, String> {
    match name {
        "ingest_item" => Ok(handlers::ingest_item::handle(ctx, args).await),
        "update_item" => Ok(handlers::update_item::handle(ctx, args).await),
        "delete_item" => Ok(handlers::delete_item::handle(ctx, args).await),
        "get_item" => Ok(handlers::get_item::handle(ctx, args).await),
        "list_items" => Ok(handlers::list_items::handle(ctx, args).await),
        "search" => Ok(handlers::search::handle(ctx, args).await),
        "rebuild_index" => Ok(handlers::rebuild_index::handle(ctx, args).await),
        "stats" => Ok(handlers::stats::handle(ctx, args).await),
        other => Err(format!("Unknown tool: {other}")),
    }
}
