use bytes::Bytes;
use serde_json::{Value, json};

use llmgate_common::ModelProfile;
use llmgate_provider_core::{
    AdapterError, AdapterResult, CallCtx, ChatRequest, HttpMethod, Op, ProviderAdapter,
    UpstreamHttpRequest, header_set,
};

const PROVIDER_NAME: &str = "gemini";
const DEFAULT_BASE_URL: &str = "https://generativelanguage.googleapis.com";

/// Google Gemini provider. Chat requests are transformed from the
/// OpenAI-compatible shape into `generateContent`, and responses back.
#[derive(Debug, Default)]
pub struct GeminiAdapter;

impl GeminiAdapter {
    pub fn new() -> Self {
        Self
    }
}

#[async_trait::async_trait]
impl ProviderAdapter for GeminiAdapter {
    fn name(&self) -> &'static str {
        PROVIDER_NAME
    }

    async fn build_chat(
        &self,
        _ctx: &CallCtx,
        profile: &ModelProfile,
        secret: &str,
        req: &ChatRequest,
    ) -> AdapterResult<UpstreamHttpRequest> {
        let upstream = req.for_profile(profile);
        let base = profile
            .model_params
            .api_base
            .as_deref()
            .unwrap_or(DEFAULT_BASE_URL)
            .trim_end_matches('/');
        let url = format!("{base}/v1beta/models/{}:generateContent", upstream.model);

        let body = chat_to_generate_content(&upstream);
        let body =
            serde_json::to_vec(&body).map_err(|err| AdapterError::Other(err.to_string()))?;
        let mut headers = Vec::new();
        header_set(&mut headers, "x-goog-api-key", secret);
        header_set(&mut headers, "content-type", "application/json");
        Ok(UpstreamHttpRequest {
            method: HttpMethod::Post,
            url,
            headers,
            body: Some(Bytes::from(body)),
            is_stream: false,
        })
    }

    fn normalize_response(&self, op: Op, body: Bytes) -> AdapterResult<Bytes> {
        if op != Op::Chat {
            return Ok(body);
        }
        let value: Value = serde_json::from_slice(&body)
            .map_err(|err| AdapterError::Other(format!("gemini response decode: {err}")))?;
        let normalized = generate_content_to_chat(&value);
        let bytes = serde_json::to_vec(&normalized)
            .map_err(|err| AdapterError::Other(err.to_string()))?;
        Ok(Bytes::from(bytes))
    }
}

fn chat_to_generate_content(req: &ChatRequest) -> Value {
    let mut contents = Vec::new();
    let mut system_parts: Vec<Value> = Vec::new();

    for message in &req.messages {
        let text = message.text();
        match message.role.as_str() {
            "system" => system_parts.push(json!({ "text": text })),
            "assistant" => contents.push(json!({
                "role": "model",
                "parts": [{ "text": text }],
            })),
            // Gemini has no separate tool role on this surface.
            _ => contents.push(json!({
                "role": "user",
                "parts": [{ "text": text }],
            })),
        }
    }

    let mut body = json!({ "contents": contents });
    if !system_parts.is_empty() {
        body["systemInstruction"] = json!({ "parts": system_parts });
    }

    let mut generation_config = serde_json::Map::new();
    if let Some(temperature) = req.temperature {
        generation_config.insert("temperature".into(), json!(temperature));
    }
    if let Some(max_tokens) = req.max_tokens {
        generation_config.insert("maxOutputTokens".into(), json!(max_tokens));
    }
    if !generation_config.is_empty() {
        body["generationConfig"] = Value::Object(generation_config);
    }
    body
}

fn generate_content_to_chat(value: &Value) -> Value {
    let text = value["candidates"][0]["content"]["parts"]
        .as_array()
        .map(|parts| {
            parts
                .iter()
                .filter_map(|part| part["text"].as_str())
                .collect::<Vec<_>>()
                .join("")
        })
        .unwrap_or_default();

    let finish_reason = match value["candidates"][0]["finishReason"].as_str() {
        Some("MAX_TOKENS") => "length",
        _ => "stop",
    };

    let mut out = json!({
        "object": "chat.completion",
        "choices": [{
            "index": 0,
            "message": { "role": "assistant", "content": text },
            "finish_reason": finish_reason,
        }],
    });

    if let Some(usage) = value.get("usageMetadata") {
        out["usage"] = json!({
            "prompt_tokens": usage["promptTokenCount"].as_u64().unwrap_or(0),
            "completion_tokens": usage["candidatesTokenCount"].as_u64().unwrap_or(0),
            "total_tokens": usage["totalTokenCount"].as_u64().unwrap_or(0),
        });
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use llmgate_common::ModelParams;
    use llmgate_provider_core::{ChatMessage, header_get};

    fn profile() -> ModelProfile {
        ModelProfile {
            profile_id: "gemini-backup".into(),
            provider: "gemini".into(),
            model_params: ModelParams {
                model: "gemini-2.0-flash".into(),
                api_base: None,
                temperature: None,
                max_tokens: Some(1024),
                agent_settings: None,
            },
        }
    }

    #[tokio::test]
    async fn chat_transforms_to_generate_content() {
        let adapter = GeminiAdapter::new();
        let req = ChatRequest {
            model: "smart".into(),
            messages: vec![
                ChatMessage::new("system", "be brief"),
                ChatMessage::new("user", "hi"),
                ChatMessage::new("assistant", "hello"),
            ],
            stream: None,
            temperature: Some(0.5),
            max_tokens: None,
            extra: serde_json::Map::new(),
        };
        let built = adapter
            .build_chat(&CallCtx::default(), &profile(), "g-key", &req)
            .await
            .unwrap();

        assert_eq!(
            built.url,
            "https://generativelanguage.googleapis.com/v1beta/models/gemini-2.0-flash:generateContent"
        );
        assert_eq!(header_get(&built.headers, "x-goog-api-key"), Some("g-key"));

        let body: Value = serde_json::from_slice(built.body.as_ref().unwrap()).unwrap();
        assert_eq!(body["contents"][0]["role"], "user");
        assert_eq!(body["contents"][1]["role"], "model");
        assert_eq!(body["systemInstruction"]["parts"][0]["text"], "be brief");
        assert_eq!(body["generationConfig"]["temperature"], json!(0.5));
        assert_eq!(body["generationConfig"]["maxOutputTokens"], json!(1024));
    }

    #[test]
    fn response_normalizes_to_chat_completion() {
        let adapter = GeminiAdapter::new();
        let upstream = json!({
            "candidates": [{
                "content": { "parts": [{ "text": "Par" }, { "text": "is" }] },
                "finishReason": "STOP",
            }],
            "usageMetadata": {
                "promptTokenCount": 7,
                "candidatesTokenCount": 2,
                "totalTokenCount": 9,
            },
        });
        let bytes = Bytes::from(serde_json::to_vec(&upstream).unwrap());
        let out = adapter.normalize_response(Op::Chat, bytes).unwrap();
        let out: Value = serde_json::from_slice(&out).unwrap();
        assert_eq!(out["choices"][0]["message"]["content"], "Paris");
        assert_eq!(out["choices"][0]["finish_reason"], "stop");
        assert_eq!(out["usage"]["total_tokens"], json!(9));
    }
}
