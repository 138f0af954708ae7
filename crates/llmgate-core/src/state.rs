use std::sync::Arc;

use arc_swap::ArcSwap;

use llmgate_common::GatewayConfig;
use llmgate_provider_core::{EventHub, KeyPool};

/// Process-wide runtime state.
///
/// The config is read-mostly: readers `load()` a snapshot, admin reload
/// stores a new pointer. The pool lives outside the swap so credential
/// state survives config reloads.
pub struct AppState {
    pub config: ArcSwap<GatewayConfig>,
    pub pool: Arc<KeyPool>,
    pub events: EventHub,
}

impl AppState {
    pub fn new(config: GatewayConfig, pool: Arc<KeyPool>, events: EventHub) -> Self {
        Self {
            config: ArcSwap::from_pointee(config),
            pool,
            events,
        }
    }

    pub fn apply_config(&self, config: GatewayConfig) {
        self.config.store(Arc::new(config));
    }
}
