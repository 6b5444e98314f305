//! stdio MCP transport: adapts the core's tool catalog and dispatch onto the
//! `rmcp` stdio transport via a `McpService` implementing `rmcp::ServerHandler`,
//! served with `ServiceExt::serve(rmcp::transport::stdio())`.

use std::borrow::Cow;
use std::sync::Arc;

use rmcp::model::{
    CallToolRequestParam, CallToolResult, Content, ErrorCode, ErrorData, Implementation,
    ListToolsResult, PaginatedRequestParam, ProtocolVersion, ServerCapabilities, ServerInfo, Tool,
};
use rmcp::ServiceExt;
use tracing::info;

use crate::core::config::load_core_config;
use crate::core::context::CoreContext;
use crate::mcp::http::{call_tool_inner, McpCallResponse};
use crate::mcp::tooling::tool_catalog;

#[derive(Clone)]
pub struct McpService {
    pub ctx: Arc<CoreContext>,
}

impl McpService {
    pub fn new() -> anyhow::Result<Self> {
        tracing_subscriber::fmt()
            .with_writer(std::io::stderr)
            .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
            .try_init()
            .ok();

        info!("Starting knowledge-core MCP service");
        let config = load_core_config();
        let ctx = CoreContext::new(config)?.as_shared();
        Ok(Self { ctx })
    }
}

fn response_to_call_result(response: McpCallResponse) -> CallToolResult {
    let content = response.content.into_iter().map(|c| Content::text(c.text)).collect();
    CallToolResult::success(content)
}

impl rmcp::ServerHandler for McpService {
    fn get_info(&self) -> ServerInfo {
        ServerInfo {
            protocol_version: ProtocolVersion::LATEST,
            server_info: Implementation {
                name: "knowledge-core".to_string(),
                version: env!("CARGO_PKG_VERSION").to_string(),
            },
            instructions: Some(
                "A chunk-aware personal knowledge store: ingest documents, search across chunk-level inverted and vector indices, and load budgeted, context-bearing results.".to_string(),
            ),
            capabilities: ServerCapabilities::builder().enable_tools().build(),
            ..Default::default()
        }
    }

    async fn list_tools(
        &self,
        _page: Option<PaginatedRequestParam>,
        _context: rmcp::service::RequestContext<rmcp::RoleServer>,
    ) -> Result<ListToolsResult, ErrorData> {
        let tools = tool_catalog()
            .into_iter()
            .map(|spec| Tool {
                name: Cow::Owned(spec.name.to_string()),
                description: Some(Cow::Owned(spec.description.to_string())),
                input_schema: match spec.input_schema {
                    serde_json::Value::Object(map) => Arc::new(map),
                    _ => Arc::new(serde_json::Map::new()),
                },
                output_schema: None,
                annotations: None,
            })
            .collect();

        Ok(ListToolsResult { tools, ..Default::default() })
    }

    async fn call_tool(
        &self,
        request: CallToolRequestParam,
        _context: rmcp::service::RequestContext<rmcp::RoleServer>,
    ) -> Result<CallToolResult, ErrorData> {
        info!("MCP tool call: {} with args: {:?}", request.name, request.arguments);
        let arguments = request
            .arguments
            .map(serde_json::Value::Object)
            .unwrap_or(serde_json::Value::Null);

        match call_tool_inner(Arc::clone(&self.ctx), request.name.as_ref(), &arguments).await {
            Ok(response) => Ok(response_to_call_result(response)),
            Err(message) => Err(ErrorData::new(ErrorCode::METHOD_NOT_FOUND, message, None)),
        }
    }
}

pub async fn run() -> anyhow::Result<()> {
    let service = McpService::new()?;
    let server = service.serve(rmcp::transport::stdio()).await?;
    info!("MCP stdio server running");
    let _quit_reason = server.waiting().await?;
    Ok(())
}
