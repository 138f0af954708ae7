use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use llmgate_common::ModelProfile;

/// Operation kind, used by adapters and by the cache layer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Op {
    Chat,
    Embeddings,
    Speech,
}

impl Op {
    pub fn as_str(&self) -> &'static str {
        match self {
            Op::Chat => "chat",
            Op::Embeddings => "embeddings",
            Op::Speech => "speech",
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChatMessage {
    pub role: String,
    /// Left as raw JSON: providers accept both plain strings and content
    /// part arrays here.
    pub content: Value,
}

impl ChatMessage {
    pub fn new(role: impl Into<String>, content: impl Into<String>) -> Self {
        Self {
            role: role.into(),
            content: Value::String(content.into()),
        }
    }

    pub fn text(&self) -> String {
        match &self.content {
            Value::String(text) => text.clone(),
            other => other.to_string(),
        }
    }
}

/// OpenAI-compatible chat request as accepted on the client API. Unknown
/// generation parameters ride along in `extra` untouched.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChatRequest {
    pub model: String,
    pub messages: Vec<ChatMessage>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub stream: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub temperature: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_tokens: Option<u32>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EmbeddingsRequest {
    pub model: String,
    pub input: Value,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SpeechRequest {
    pub model: String,
    pub input: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub voice: Option<String>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

/// Tagged client request; keeps the router type-homogeneous across the
/// operations the gateway supports.
#[derive(Debug, Clone)]
pub enum GatewayRequest {
    Chat(ChatRequest),
    Embeddings(EmbeddingsRequest),
    Speech(SpeechRequest),
}

impl GatewayRequest {
    pub fn op(&self) -> Op {
        match self {
            GatewayRequest::Chat(_) => Op::Chat,
            GatewayRequest::Embeddings(_) => Op::Embeddings,
            GatewayRequest::Speech(_) => Op::Speech,
        }
    }

    /// Client-facing model alias carried in the body.
    pub fn alias(&self) -> &str {
        match self {
            GatewayRequest::Chat(req) => &req.model,
            GatewayRequest::Embeddings(req) => &req.model,
            GatewayRequest::Speech(req) => &req.model,
        }
    }

    pub fn is_stream(&self) -> bool {
        matches!(self, GatewayRequest::Chat(req) if req.stream.unwrap_or(false))
    }

    /// Request body as JSON, used by the cache fingerprint.
    pub fn body_json(&self) -> Value {
        match self {
            GatewayRequest::Chat(req) => serde_json::to_value(req).unwrap_or(Value::Null),
            GatewayRequest::Embeddings(req) => serde_json::to_value(req).unwrap_or(Value::Null),
            GatewayRequest::Speech(req) => serde_json::to_value(req).unwrap_or(Value::Null),
        }
    }
}

impl ChatRequest {
    /// Copy with the profile's upstream model substituted and profile
    /// generation params filled in where the client left them unset.
    pub fn for_profile(&self, profile: &ModelProfile) -> ChatRequest {
        let mut req = self.clone();
        req.model = profile.model_params.model.clone();
        if req.temperature.is_none() {
            req.temperature = profile.model_params.temperature;
        }
        if req.max_tokens.is_none() {
            req.max_tokens = profile.model_params.max_tokens;
        }
        req
    }
}

impl EmbeddingsRequest {
    pub fn for_profile(&self, profile: &ModelProfile) -> EmbeddingsRequest {
        let mut req = self.clone();
        req.model = profile.model_params.model.clone();
        req
    }
}

impl SpeechRequest {
    pub fn for_profile(&self, profile: &ModelProfile) -> SpeechRequest {
        let mut req = self.clone();
        req.model = profile.model_params.model.clone();
        req
    }
}
