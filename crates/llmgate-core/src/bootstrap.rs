use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use anyhow::Context;
use clap::Parser;

use llmgate_common::GatewayConfig;
use llmgate_provider_core::{AdapterRegistry, EventHub, KeyPool, TerminalEventSink};
use llmgate_providers::register_builtin_adapters;

use crate::state::AppState;

#[derive(Debug, Clone, Parser)]
#[command(name = "llmgate", version, about = "Multi-provider LLM gateway with reasoning sessions")]
pub struct CliArgs {
    /// Path to the YAML configuration file.
    #[arg(long, env = "LLMGATE_CONFIG", default_value = "config.yaml")]
    pub config: PathBuf,

    /// Directory holding keys_pool_<provider>.env files.
    #[arg(long, env = "LLMGATE_KEYS_DIR", default_value = "keys_pool")]
    pub keys_dir: PathBuf,

    /// Bind host.
    #[arg(long, env = "LLMGATE_HOST", default_value = "0.0.0.0")]
    pub host: String,

    /// Bind port.
    #[arg(long, env = "LLMGATE_PORT", default_value_t = 8100)]
    pub port: u16,
}

pub struct Bootstrap {
    pub state: Arc<AppState>,
    pub registry: Arc<AdapterRegistry>,
    pub config_path: PathBuf,
    pub keys_dir: PathBuf,
    pub bind: String,
}

pub async fn bootstrap(args: CliArgs) -> anyhow::Result<Bootstrap> {
    let config = GatewayConfig::load(&args.config)
        .with_context(|| format!("load config {}", args.config.display()))?;

    let events = EventHub::new(1024);
    events.add_sink(Arc::new(TerminalEventSink::new())).await;

    let pool = KeyPool::new(
        events.clone(),
        config.key_management_settings.enable_quarantine,
        Duration::from_secs(config.key_management_settings.quarantine_seconds),
    );
    let providers = config.provider_tags();
    let loaded = pool
        .seed_from_dir(&args.keys_dir, &providers)
        .await
        .with_context(|| format!("seed key pool from {}", args.keys_dir.display()))?;
    tracing::info!(
        providers = providers.len(),
        keys = loaded,
        "credential pool seeded"
    );

    let state = Arc::new(AppState::new(config, pool, events));

    let mut registry = AdapterRegistry::new();
    register_builtin_adapters(&mut registry);

    let bind = format!("{}:{}", args.host, args.port);
    Ok(Bootstrap {
        state,
        registry: Arc::new(registry),
        config_path: args.config,
        keys_dir: args.keys_dir,
        bind,
    })
}
