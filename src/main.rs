use axum::{
    extract::State,
    routing::{get, post},
    Router,
};
use std::sync::Arc;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;
use tracing::{info, warn};

use knowledge_core::core::config::load_core_config;
use knowledge_core::mcp;
use knowledge_core::CoreContext;

fn parse_port_from_args() -> Option<u16> {
    let mut args = std::env::args().peekable();
    while let Some(a) = args.next() {
        if a == "--port" {
            if let Some(v) = args.next() {
                if let Ok(p) = v.parse::<u16>() {
                    return Some(p);
                }
            }
        } else if let Some(rest) = a.strip_prefix("--port=") {
            if let Ok(p) = rest.parse::<u16>() {
                return Some(p);
            }
        }
    }
    None
}

fn port_from_env() -> Option<u16> {
    for k in ["KNOWLEDGE_CORE_PORT", "PORT"] {
        if let Ok(v) = std::env::var(k) {
            if let Ok(p) = v.trim().parse::<u16>() {
                return Some(p);
            }
        }
    }
    None
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let env_filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info,tower_http=warn"));
    tracing_subscriber::fmt().with_env_filter(env_filter).init();

    info!("Starting knowledge-core HTTP server");

    let config = load_core_config();
    info!(
        storage_path = %config.storage_path.display(),
        index_dir = %config.index_dir.display(),
        "resolved configuration"
    );

    let ctx = Arc::new(CoreContext::new(config)?);

    let app = Router::new()
        .route("/", get(health_check))
        .route("/health", get(health_check))
        .route("/.well-known/mcp/server-card.json", get(server_card))
        .route("/mcp", post(mcp_rpc_handler))
        .route("/mcp/tools", get(mcp::http::list_tools))
        .route("/mcp/call", post(mcp::http::call_tool))
        .layer(CorsLayer::permissive())
        .layer(TraceLayer::new_for_http())
        .with_state(ctx.clone());

    let port: u16 = parse_port_from_args().or_else(port_from_env).unwrap_or(8420);
    let bind_addr = format!("0.0.0.0:{}", port);
    let listener = match tokio::net::TcpListener::bind(&bind_addr).await {
        Ok(l) => l,
        Err(e) if e.kind() == std::io::ErrorKind::AddrInUse => {
            anyhow::bail!(
                "Address already in use: {}. Stop the existing process or run with --port {} (or set PORT/KNOWLEDGE_CORE_PORT).",
                bind_addr,
                port.saturating_add(1)
            )
        }
        Err(e) => return Err(e.into()),
    };
    info!("knowledge-core listening on http://{}", bind_addr);

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    Ok(())
}

async fn shutdown_signal() {
    #[cfg(unix)]
    {
        use tokio::signal::unix::{signal, SignalKind};
        let mut sigterm = signal(SignalKind::terminate()).ok();
        let mut sigint = signal(SignalKind::interrupt()).ok();

        tokio::select! {
            _ = tokio::signal::ctrl_c() => {},
            _ = async {
                if let Some(ref mut s) = sigterm {
                    s.recv().await;
                } else {
                    futures::future::pending::<()>().await;
                }
            } => {},
            _ = async {
                if let Some(ref mut s) = sigint {
                    s.recv().await;
                } else {
                    futures::future::pending::<()>().await;
                }
            } => {},
        }
    }

    #[cfg(not(unix))]
    {
        let _ = tokio::signal::ctrl_c().await;
    }

    warn!("knowledge-core shutting down");
}

async fn health_check() -> axum::response::Json<serde_json::Value> {
    axum::response::Json(serde_json::json!({
        "status": "healthy",
        "service": "knowledge-core",
        "version": env!("CARGO_PKG_VERSION")
    }))
}

async fn server_card(State(_ctx): State<Arc<CoreContext>>) -> axum::response::Json<serde_json::Value> {
    let tools: Vec<serde_json::Value> = mcp::tooling::tool_catalog()
        .into_iter()
        .map(|spec| {
            serde_json::json!({
                "name": spec.name,
                "title": spec.title,
                "description": spec.description
            })
        })
        .collect();

    axum::response::Json(serde_json::json!({
        "serverInfo": {
            "name": "knowledge-core",
            "version": env!("CARGO_PKG_VERSION")
        },
        "tools": tools,
        "resources": [],
        "prompts": []
    }))
}

async fn mcp_rpc_handler(
    State(ctx): State<Arc<CoreContext>>,
    axum::response::Json(request): axum::response::Json<serde_json::Value>,
) -> axum::response::Json<serde_json::Value> {
    let id = request.get("id").cloned().unwrap_or(serde_json::Value::Null);
    let method = request.get("method").and_then(|m| m.as_str()).unwrap_or_default();

    match method {
        "initialize" => axum::response::Json(serde_json::json!({
            "jsonrpc": "2.0",
            "id": id,
            "result": {
                "protocolVersion": "2024-11-05",
                "capabilities": { "tools": {} },
                "serverInfo": {
                    "name": "knowledge-core",
                    "version": env!("CARGO_PKG_VERSION")
                }
            }
        })),
        "tools/list" => {
            let tools = mcp::http::list_tools_for_context();
            axum::response::Json(serde_json::json!({
                "jsonrpc": "2.0",
                "id": id,
                "result": tools
            }))
        }
        "tools/call" => {
            let params = request.get("params").cloned().unwrap_or(serde_json::Value::Null);
            let name = params.get("name").and_then(|v| v.as_str()).unwrap_or_default();
            let arguments = params.get("arguments").cloned().unwrap_or(serde_json::Value::Null);
            match mcp::http::call_tool_inner(ctx, name, &arguments).await {
                Ok(result) => axum::response::Json(serde_json::json!({
                    "jsonrpc": "2.0",
                    "id": id,
                    "result": result
                })),
                Err(message) => axum::response::Json(serde_json::json!({
                    "jsonrpc": "2.0",
                    "id": id,
                    "error": { "code": -32602, "message": message }
                })),
            }
        }
        _ => axum::response::Json(serde_json::json!({
            "jsonrpc": "2.0",
            "id": id,
            "error": {
                "code": -32601,
                "message": "Method not found"
            }
        })),
    }
}
