use std::sync::Arc;
use std::time::Duration;

use bytes::Bytes;

use llmgate_common::{CacheRule, GatewayConfig};
use llmgate_provider_core::{
    GatewayRequest, UpstreamBody, UpstreamHttpResponse,
};

use crate::cache::{ResponseCache, fingerprint};
use crate::executor::{ExecuteError, RotationExecutor};
use crate::state::AppState;

#[derive(Debug)]
pub enum RouteError {
    /// 404: the alias is not configured.
    AliasNotFound(String),
    /// 503: every profile in the chain was exhausted.
    NoProviderAvailable,
    /// 4xx surfaced from upstream: the request content is at fault.
    RequestInvalid { status: u16, body: Bytes },
}

/// Resolves a client alias to its profile chain and walks it until one
/// profile answers.
pub struct GatewayRouter {
    state: Arc<AppState>,
    executor: RotationExecutor,
    cache: Arc<ResponseCache>,
}

impl GatewayRouter {
    pub fn new(state: Arc<AppState>, executor: RotationExecutor, cache: Arc<ResponseCache>) -> Self {
        Self {
            state,
            executor,
            cache,
        }
    }

    pub fn state(&self) -> &Arc<AppState> {
        &self.state
    }

    pub async fn route(
        &self,
        trace_id: Option<&str>,
        req: &GatewayRequest,
    ) -> Result<UpstreamHttpResponse, RouteError> {
        // One config snapshot for the whole request; admin reloads swap the
        // pointer and never disturb in-flight routing.
        let config = self.state.config.load_full();
        let alias = req.alias();
        let Some(chain) = config.chain(alias) else {
            return Err(RouteError::AliasNotFound(alias.to_string()));
        };

        let cacheable = config.cache_settings.enabled && !req.is_stream();
        let body_json = if cacheable { Some(req.body_json()) } else { None };

        for profile_id in chain {
            let Some(profile) = config.profile(profile_id) else {
                tracing::warn!(alias, profile_id = %profile_id, "chain references missing profile");
                continue;
            };

            let rule = body_json
                .as_ref()
                .and_then(|_| rule_for(&config, profile_id));
            let cache_key = rule.map(|rule| {
                format!(
                    "{}{}",
                    config.cache_settings.key_prefix,
                    fingerprint(
                        &profile.model_params.model,
                        body_json.as_ref().unwrap_or(&serde_json::Value::Null),
                        &rule.include_in_key,
                    )
                )
            });

            if let Some(key) = &cache_key
                && let Some(body) = self.cache.lookup(key).await
            {
                tracing::debug!(alias, profile_id = %profile_id, "cache hit");
                return Ok(cached_response(body));
            }

            match self.executor.execute(trace_id, profile, req).await {
                Ok(resp) => {
                    if let (Some(key), Some(rule)) = (cache_key, rule)
                        && let UpstreamBody::Bytes(bytes) = &resp.body
                    {
                        let cache = self.cache.clone();
                        let bytes = bytes.clone();
                        let ttl = Duration::from_secs(rule.ttl_seconds);
                        tokio::spawn(async move {
                            cache.store(key, bytes, ttl).await;
                        });
                    }
                    return Ok(resp);
                }
                Err(ExecuteError::Exhausted) => {
                    tracing::warn!(alias, profile_id = %profile_id, "provider exhausted, trying next profile");
                    continue;
                }
                Err(ExecuteError::Adapter(err)) => {
                    tracing::warn!(alias, profile_id = %profile_id, %err, "adapter error, trying next profile");
                    continue;
                }
                Err(ExecuteError::RequestRejected { status, body }) => {
                    return Err(RouteError::RequestInvalid { status, body });
                }
            }
        }

        Err(RouteError::NoProviderAvailable)
    }
}

fn rule_for<'a>(config: &'a GatewayConfig, profile_id: &str) -> Option<&'a CacheRule> {
    config
        .cache_settings
        .rules
        .iter()
        .find(|rule| rule.model_names.iter().any(|name| name == profile_id))
}

fn cached_response(body: Bytes) -> UpstreamHttpResponse {
    UpstreamHttpResponse {
        status: 200,
        headers: vec![("content-type".to_string(), "application/json".to_string())],
        body: UpstreamBody::Bytes(body),
    }
}
