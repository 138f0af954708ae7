use async_trait::async_trait;
use bytes::Bytes;
use serde::{Deserialize, Serialize};

use llmgate_common::ModelProfile;

use crate::errors::{AdapterError, AdapterResult};
use crate::headers::Headers;
use crate::request::{ChatRequest, EmbeddingsRequest, Op, SpeechRequest};

pub type ByteStream = tokio::sync::mpsc::Receiver<Bytes>;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HttpMethod {
    Get,
    Post,
}

impl HttpMethod {
    pub fn as_str(&self) -> &'static str {
        match self {
            HttpMethod::Get => "GET",
            HttpMethod::Post => "POST",
        }
    }
}

#[derive(Debug, Clone)]
pub struct UpstreamHttpRequest {
    pub method: HttpMethod,
    pub url: String,
    pub headers: Headers,
    pub body: Option<Bytes>,
    pub is_stream: bool,
}

#[derive(Debug)]
pub enum UpstreamBody {
    Bytes(Bytes),
    Stream(ByteStream),
}

#[derive(Debug)]
pub struct UpstreamHttpResponse {
    pub status: u16,
    pub headers: Headers,
    pub body: UpstreamBody,
}

impl UpstreamHttpResponse {
    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum TransportErrorKind {
    Timeout,
    ReadTimeout,
    Connect,
    Dns,
    Tls,
    Other,
}

/// Failed upstream call, either before an HTTP response existed or as a
/// captured non-2xx response.
#[derive(Debug, Clone)]
pub enum UpstreamFailure {
    Transport {
        kind: TransportErrorKind,
        message: String,
    },
    Http {
        status: u16,
        headers: Headers,
        body: Bytes,
    },
}

impl UpstreamFailure {
    pub fn summary(&self) -> String {
        match self {
            UpstreamFailure::Transport { kind, message } => format!("{kind:?}: {message}"),
            UpstreamFailure::Http { status, .. } => format!("http_status_{status}"),
        }
    }
}

/// Per-attempt context threaded through adapter build hooks, mostly for
/// tracing.
#[derive(Debug, Clone, Default)]
pub struct CallCtx {
    pub trace_id: Option<String>,
    pub attempt: u32,
}

/// One upstream provider family.
///
/// Adapters only *describe* HTTP requests; the executor performs IO, so an
/// adapter never touches the credential pool and stays trivially testable.
/// Unimplemented operations default to `Unsupported`.
#[async_trait]
pub trait ProviderAdapter: Send + Sync {
    fn name(&self) -> &'static str;

    async fn build_chat(
        &self,
        _ctx: &CallCtx,
        _profile: &ModelProfile,
        _secret: &str,
        _req: &ChatRequest,
    ) -> AdapterResult<UpstreamHttpRequest> {
        Err(AdapterError::Unsupported("chat"))
    }

    async fn build_embeddings(
        &self,
        _ctx: &CallCtx,
        _profile: &ModelProfile,
        _secret: &str,
        _req: &EmbeddingsRequest,
    ) -> AdapterResult<UpstreamHttpRequest> {
        Err(AdapterError::Unsupported("embeddings"))
    }

    async fn build_speech(
        &self,
        _ctx: &CallCtx,
        _profile: &ModelProfile,
        _secret: &str,
        _req: &SpeechRequest,
    ) -> AdapterResult<UpstreamHttpRequest> {
        Err(AdapterError::Unsupported("speech"))
    }

    /// Rewrite a successful non-streaming upstream body into the
    /// OpenAI-compatible shape the client API speaks. Native providers
    /// pass bytes through.
    fn normalize_response(&self, _op: Op, body: Bytes) -> AdapterResult<Bytes> {
        Ok(body)
    }
}
