use std::sync::Arc;

use async_trait::async_trait;
use serde_json::Value;

use llmgate_core::{GatewayRouter, RouteError};
use llmgate_provider_core::{ChatRequest, GatewayRequest, UpstreamBody};

#[derive(Debug, thiserror::Error)]
pub enum BackendError {
    /// Every provider in the alias chain is exhausted (or the alias is
    /// gone after a reload).
    #[error("no provider available")]
    Unavailable,
    #[error("upstream rejected the request: {0}")]
    Rejected(String),
    #[error("{0}")]
    Other(String),
}

/// The reasoning loop's LLM edge: one unary chat completion in, the
/// assistant's text out.
#[async_trait]
pub trait ChatBackend: Send + Sync {
    async fn complete(
        &self,
        trace_id: Option<&str>,
        req: ChatRequest,
    ) -> Result<String, BackendError>;
}

/// Production backend: goes through the gateway router, so the same key
/// rotation and provider fallback apply to in-loop LLM calls as to direct
/// client requests.
pub struct RouterChatBackend {
    router: Arc<GatewayRouter>,
}

impl RouterChatBackend {
    pub fn new(router: Arc<GatewayRouter>) -> Self {
        Self { router }
    }
}

#[async_trait]
impl ChatBackend for RouterChatBackend {
    async fn complete(
        &self,
        trace_id: Option<&str>,
        req: ChatRequest,
    ) -> Result<String, BackendError> {
        let resp = self
            .router
            .route(trace_id, &GatewayRequest::Chat(req))
            .await
            .map_err(|err| match err {
                RouteError::NoProviderAvailable | RouteError::AliasNotFound(_) => {
                    BackendError::Unavailable
                }
                RouteError::RequestInvalid { status, body } => BackendError::Rejected(format!(
                    "{status}: {}",
                    String::from_utf8_lossy(&body)
                )),
            })?;

        let UpstreamBody::Bytes(bytes) = resp.body else {
            return Err(BackendError::Other(
                "unexpected streaming body from unary completion".to_string(),
            ));
        };
        let value: Value = serde_json::from_slice(&bytes)
            .map_err(|err| BackendError::Other(format!("upstream response decode: {err}")))?;
        value["choices"][0]["message"]["content"]
            .as_str()
            .map(str::to_string)
            .ok_or_else(|| BackendError::Other("upstream response had no content".to_string()))
    }
}
