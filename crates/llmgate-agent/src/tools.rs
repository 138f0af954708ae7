use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use bytes::Bytes;
use serde_json::Value;

use llmgate_common::ToolDescriptor;
use llmgate_core::UpstreamClient;
use llmgate_provider_core::{
    HttpMethod, UpstreamBody, UpstreamHttpRequest, header_set,
};

#[derive(Debug, Clone, thiserror::Error)]
#[error("tool call failed ({status}): {detail}")]
pub struct ToolError {
    pub status: u16,
    pub detail: String,
}

/// The engine's edge to the tool gateway. A trait so session tests run
/// without a tool server.
#[async_trait]
pub trait ToolInvoker: Send + Sync {
    async fn descriptors(&self) -> Result<Vec<ToolDescriptor>, ToolError>;
    async fn invoke(&self, tool_name: &str, arguments: &Value) -> Result<Value, ToolError>;
}

/// HTTP client for the tool gateway: `GET /tools` for metadata,
/// `POST /tools/{name}` to invoke.
pub struct HttpToolGateway {
    base_url: String,
    client: Arc<dyn UpstreamClient>,
    timeout: Duration,
}

impl HttpToolGateway {
    pub fn new(base_url: impl Into<String>, client: Arc<dyn UpstreamClient>, timeout: Duration) -> Self {
        Self {
            base_url: base_url.into().trim_end_matches('/').to_string(),
            client,
            timeout,
        }
    }

    async fn send(&self, req: UpstreamHttpRequest) -> Result<(u16, Bytes), ToolError> {
        let sent = tokio::time::timeout(self.timeout, self.client.send(req)).await;
        let outcome = match sent {
            Ok(outcome) => outcome,
            Err(_) => {
                return Err(ToolError {
                    status: 504,
                    detail: "tool call timed out".to_string(),
                });
            }
        };
        let resp = outcome.map_err(|failure| ToolError {
            status: 502,
            detail: failure.summary(),
        })?;
        let body = match resp.body {
            UpstreamBody::Bytes(bytes) => bytes,
            UpstreamBody::Stream(_) => Bytes::new(),
        };
        Ok((resp.status, body))
    }
}

#[async_trait]
impl ToolInvoker for HttpToolGateway {
    async fn descriptors(&self) -> Result<Vec<ToolDescriptor>, ToolError> {
        let url = format!("{}/tools", self.base_url);
        let (status, body) = self
            .send(UpstreamHttpRequest {
                method: HttpMethod::Get,
                url,
                headers: Vec::new(),
                body: None,
                is_stream: false,
            })
            .await?;
        if !(200..300).contains(&status) {
            return Err(ToolError {
                status,
                detail: String::from_utf8_lossy(&body).into_owned(),
            });
        }
        serde_json::from_slice(&body).map_err(|err| ToolError {
            status: 502,
            detail: format!("tool metadata decode: {err}"),
        })
    }

    async fn invoke(&self, tool_name: &str, arguments: &Value) -> Result<Value, ToolError> {
        let url = format!("{}/tools/{tool_name}", self.base_url);
        let body = serde_json::to_vec(arguments).map_err(|err| ToolError {
            status: 400,
            detail: err.to_string(),
        })?;
        let mut headers = Vec::new();
        header_set(&mut headers, "content-type", "application/json");

        let (status, body) = self
            .send(UpstreamHttpRequest {
                method: HttpMethod::Post,
                url,
                headers,
                body: Some(Bytes::from(body)),
                is_stream: false,
            })
            .await?;
        if !(200..300).contains(&status) {
            return Err(ToolError {
                status,
                detail: String::from_utf8_lossy(&body).into_owned(),
            });
        }
        serde_json::from_slice(&body).map_err(|err| ToolError {
            status: 502,
            detail: format!("tool response decode: {err}"),
        })
    }
}
