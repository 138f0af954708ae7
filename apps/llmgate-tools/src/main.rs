use std::sync::Arc;

use anyhow::Result;
use clap::Parser;

use llmgate_tools::{CurrentTimeTool, ToolRegistry, WebSearchTool, tool_router};

#[derive(Debug, Parser)]
#[command(name = "llmgate-tools", version, about = "Tool gateway for llmgate reasoning sessions")]
struct Args {
    #[arg(long, env = "LLMGATE_TOOLS_HOST", default_value = "0.0.0.0")]
    host: String,

    #[arg(long, env = "LLMGATE_TOOLS_PORT", default_value_t = 8101)]
    port: u16,
}

#[tokio::main]
async fn main() -> Result<()> {
    init_tracing();
    let args = Args::parse();

    let mut registry = ToolRegistry::new();
    registry.register(Arc::new(CurrentTimeTool::new()));
    registry.register(Arc::new(WebSearchTool::from_env()?));
    tracing::info!(tools = registry.len(), "tool registry ready");

    let app = tool_router(Arc::new(registry));
    let bind = format!("{}:{}", args.host, args.port);
    let listener = tokio::net::TcpListener::bind(&bind).await?;
    tracing::info!(bind = %bind, "tool gateway listening");
    axum::serve(listener, app)
        .with_graceful_shutdown(async {
            let _ = tokio::signal::ctrl_c().await;
        })
        .await?;
    Ok(())
}

fn init_tracing() {
    use tracing_subscriber::EnvFilter;
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();
}
