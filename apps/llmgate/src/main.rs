use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use anyhow::Result;
use axum::routing::get;
use clap::Parser;
use tokio::sync::Notify;

use llmgate_agent::{
    EngineConfig, HttpToolGateway, PatternSet, ReasoningEngine, RouterChatBackend, SessionBus,
    TaskQueue, load_server_prompts,
};
use llmgate_core::{
    CliArgs, GatewayRouter, ResponseCache, RotationExecutor, UpstreamClient, UpstreamClientConfig,
    WreqUpstreamClient,
};
use llmgate_router::{AdminState, ClientApiState, admin_router, client_router};

const DEFAULT_TOOL_SERVER_URL: &str = "http://127.0.0.1:8101";
const TASK_QUEUE_CAPACITY: usize = 256;

#[tokio::main]
async fn main() -> Result<()> {
    init_tracing();

    let args = CliArgs::parse();
    let boot = llmgate_core::bootstrap(args).await?;
    let config = boot.state.config.load_full();

    let upstream: Arc<dyn UpstreamClient> =
        Arc::new(WreqUpstreamClient::new(UpstreamClientConfig::default())?);
    let executor = RotationExecutor::new(
        boot.state.pool.clone(),
        boot.registry.clone(),
        upstream.clone(),
        boot.state.events.clone(),
    );
    let router = Arc::new(GatewayRouter::new(
        boot.state.clone(),
        executor,
        ResponseCache::new(),
    ));

    let patterns = match PatternSet::discover(&config.agent_settings.patterns_dir) {
        Ok(patterns) => Arc::new(patterns),
        Err(err) => {
            tracing::warn!(%err, "no reasoning patterns loaded");
            Arc::new(PatternSet::default())
        }
    };
    let prompts_dir = PathBuf::from(&config.agent_settings.prompts_dir);
    let (server_system_instruction, server_manifests) = load_server_prompts(&prompts_dir);

    let bus = Arc::new(SessionBus::new());
    let queue = TaskQueue::new(TASK_QUEUE_CAPACITY);
    let tool_server_url = config
        .agent_settings
        .mcp_server_url
        .clone()
        .unwrap_or_else(|| DEFAULT_TOOL_SERVER_URL.to_string());
    let tools = Arc::new(HttpToolGateway::new(
        tool_server_url,
        upstream.clone(),
        Duration::from_secs(300),
    ));
    let engine = Arc::new(ReasoningEngine::new(
        Arc::new(RouterChatBackend::new(router.clone())),
        tools,
        bus.clone(),
        patterns.clone(),
        EngineConfig {
            max_steps: config.agent_settings.max_steps,
            tool_timeout: Duration::from_secs(300),
            typewriter: config.streaming_settings.typewriter_mode,
            server_system_instruction,
            server_manifests,
        },
    ));
    engine.spawn_workers(queue.clone(), config.agent_settings.workers);

    let restart = Arc::new(Notify::new());
    let app = axum::Router::new()
        .merge(client_router(ClientApiState {
            router,
            bus,
            queue,
        }))
        .nest(
            "/admin",
            admin_router(AdminState {
                app: boot.state.clone(),
                config_path: boot.config_path.clone(),
                prompts_dir,
                patterns,
                restart: restart.clone(),
            }),
        )
        .route("/", get(|| async { "llmgate" }));

    let listener = tokio::net::TcpListener::bind(&boot.bind).await?;
    tracing::info!(bind = %boot.bind, "llmgate listening");
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal(restart))
        .await?;
    Ok(())
}

async fn shutdown_signal(restart: Arc<Notify>) {
    tokio::select! {
        _ = tokio::signal::ctrl_c() => tracing::info!("shutting down on ctrl-c"),
        _ = restart.notified() => tracing::info!("shutting down for restart"),
    }
}

fn init_tracing() {
    use tracing_subscriber::EnvFilter;
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();
}
