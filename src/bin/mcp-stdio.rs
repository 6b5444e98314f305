use knowledge_core::mcp::stdio;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let _ = tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .try_init();

    // VS Code's MCP host may probe stdio servers with `--version`/`--help`.
    // If we ignore args and start JSON-RPC transport instead, the host can
    // fail compatibility detection and cancel the session.
    let args: Vec<String> = std::env::args().collect();
    if args.iter().any(|a| a == "--version" || a == "-V") {
        println!("{}", env!("CARGO_PKG_VERSION"));
        return Ok(());
    }
    if args.iter().any(|a| a == "--help" || a == "-h") {
        println!("knowledge-core-mcp (MCP stdio server); usage: knowledge-core-mcp [--version|--help]");
        return Ok(());
    }

    stdio::run().await
}
