use bytes::Bytes;

use llmgate_common::ModelProfile;
use llmgate_provider_core::{
    AdapterError, AdapterResult, CallCtx, ChatRequest, EmbeddingsRequest, HttpMethod,
    ProviderAdapter, SpeechRequest, UpstreamHttpRequest,
};

use crate::http::{build_url, set_bearer, set_json_headers};

const PROVIDER_NAME: &str = "openai";
const DEFAULT_BASE_URL: &str = "https://api.openai.com";

/// OpenAI-compatible provider. The client API already speaks this dialect,
/// so requests pass through with the profile overlay applied.
#[derive(Debug, Default)]
pub struct OpenAiAdapter;

impl OpenAiAdapter {
    pub fn new() -> Self {
        Self
    }

    fn post_json(
        &self,
        profile: &ModelProfile,
        secret: &str,
        path: &str,
        body: &impl serde::Serialize,
        is_stream: bool,
    ) -> AdapterResult<UpstreamHttpRequest> {
        let url = build_url(
            profile.model_params.api_base.as_deref(),
            DEFAULT_BASE_URL,
            path,
        );
        let body = serde_json::to_vec(body).map_err(|err| AdapterError::Other(err.to_string()))?;
        let mut headers = Vec::new();
        set_bearer(&mut headers, secret);
        set_json_headers(&mut headers);
        Ok(UpstreamHttpRequest {
            method: HttpMethod::Post,
            url,
            headers,
            body: Some(Bytes::from(body)),
            is_stream,
        })
    }
}

#[async_trait::async_trait]
impl ProviderAdapter for OpenAiAdapter {
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
        let is_stream = upstream.stream.unwrap_or(false);
        self.post_json(profile, secret, "/v1/chat/completions", &upstream, is_stream)
    }

    async fn build_embeddings(
        &self,
        _ctx: &CallCtx,
        profile: &ModelProfile,
        secret: &str,
        req: &EmbeddingsRequest,
    ) -> AdapterResult<UpstreamHttpRequest> {
        let upstream = req.for_profile(profile);
        self.post_json(profile, secret, "/v1/embeddings", &upstream, false)
    }

    async fn build_speech(
        &self,
        _ctx: &CallCtx,
        profile: &ModelProfile,
        secret: &str,
        req: &SpeechRequest,
    ) -> AdapterResult<UpstreamHttpRequest> {
        let upstream = req.for_profile(profile);
        self.post_json(profile, secret, "/v1/audio/speech", &upstream, false)
    }
}
