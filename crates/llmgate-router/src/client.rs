use std::convert::Infallible;
use std::sync::Arc;
use std::time::Duration;

use axum::body::Body;
use axum::extract::State;
use axum::http::{StatusCode, header};
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use axum::{Json, Router};
use bytes::Bytes;
use serde::{Deserialize, Serialize};
use serde_json::json;
use time::OffsetDateTime;
use tokio_stream::StreamExt;
use tokio_stream::wrappers::ReceiverStream;

use llmgate_agent::{SessionBus, SseBridge, StreamError, TaskEnvelope, TaskQueue};
use llmgate_core::{GatewayRouter, RouteError};
use llmgate_provider_core::{
    ChatRequest, EmbeddingsRequest, GatewayRequest, SpeechRequest, UpstreamBody,
    UpstreamHttpResponse, header_get,
};

#[derive(Clone)]
pub struct ClientApiState {
    pub router: Arc<GatewayRouter>,
    pub bus: Arc<SessionBus>,
    pub queue: Arc<TaskQueue>,
}

pub fn client_router(state: ClientApiState) -> Router {
    Router::new()
        .route("/v1/chat/completions", post(chat_completions))
        .route("/v1/embeddings", post(embeddings))
        .route("/v1/audio/speech", post(audio_speech))
        .route("/v1/react/sessions", post(react_sessions))
        .route("/v1/models/all-runnable", get(models_all_runnable))
        .with_state(state)
}

async fn chat_completions(State(state): State<ClientApiState>, body: Bytes) -> Response {
    let req: ChatRequest = match serde_json::from_slice(&body) {
        Ok(req) => req,
        Err(err) => return bad_request(&format!("invalid request body: {err}")),
    };
    dispatch(&state, GatewayRequest::Chat(req)).await
}

async fn embeddings(State(state): State<ClientApiState>, body: Bytes) -> Response {
    let req: EmbeddingsRequest = match serde_json::from_slice(&body) {
        Ok(req) => req,
        Err(err) => return bad_request(&format!("invalid request body: {err}")),
    };
    dispatch(&state, GatewayRequest::Embeddings(req)).await
}

async fn audio_speech(State(state): State<ClientApiState>, body: Bytes) -> Response {
    let req: SpeechRequest = match serde_json::from_slice(&body) {
        Ok(req) => req,
        Err(err) => return bad_request(&format!("invalid request body: {err}")),
    };
    dispatch(&state, GatewayRequest::Speech(req)).await
}

async fn dispatch(state: &ClientApiState, req: GatewayRequest) -> Response {
    let trace_id = uuid::Uuid::now_v7().to_string();
    match state.router.route(Some(&trace_id), &req).await {
        Ok(resp) => upstream_to_response(resp),
        Err(err) => route_error_to_response(err),
    }
}

#[derive(Debug, Deserialize)]
struct ReactSessionRequest {
    user_query: String,
    model_alias: String,
    #[serde(default)]
    reasoning_mode: Option<String>,
    #[serde(default)]
    client_system_instruction: Option<String>,
    #[serde(default)]
    client_manifests: Vec<String>,
    #[serde(default)]
    safety_flags: Vec<String>,
}

async fn react_sessions(
    State(state): State<ClientApiState>,
    Json(req): Json<ReactSessionRequest>,
) -> Response {
    let config = state.router.state().config.load_full();
    if config.chain(&req.model_alias).is_none() {
        return error_response(
            StatusCode::NOT_FOUND,
            "alias_not_found",
            &format!("unknown model alias: {}", req.model_alias),
        );
    }

    let reasoning_mode =
        config.reasoning_mode_for(&req.model_alias, req.reasoning_mode.as_deref());
    let session_id = format!("react-{}", uuid::Uuid::now_v7());
    let trace_id = uuid::Uuid::now_v7().to_string();
    tracing::info!(%session_id, %trace_id, alias = %req.model_alias, "reasoning session accepted");

    // Subscribe before enqueueing: the channel is non-retentive and the
    // worker may ack immediately.
    let rx = state.bus.subscribe(&session_id).await;
    let accepted = state.queue.enqueue(TaskEnvelope {
        session_id: session_id.clone(),
        alias: req.model_alias,
        user_query: req.user_query,
        client_system_instruction: req.client_system_instruction,
        client_manifests: req.client_manifests,
        safety_flags: req.safety_flags,
        reasoning_mode,
        trace_id: Some(trace_id),
        enqueued_at: OffsetDateTime::now_utc(),
    });
    if !accepted {
        state.bus.close(&session_id).await;
        return error_response(
            StatusCode::SERVICE_UNAVAILABLE,
            "queue_full",
            "the reasoning queue is full, retry later",
        );
    }

    let read_timeout = Duration::from_secs(config.streaming_settings.sse_read_timeout_seconds);
    match SseBridge::new(read_timeout).stream(rx).await {
        Ok(frames) => {
            let stream = ReceiverStream::new(frames).map(Ok::<_, Infallible>);
            Response::builder()
                .status(StatusCode::OK)
                .header(header::CONTENT_TYPE, "text/event-stream")
                .header(header::CACHE_CONTROL, "no-cache")
                .body(Body::from_stream(stream))
                .unwrap_or_else(|_| StatusCode::INTERNAL_SERVER_ERROR.into_response())
        }
        Err(StreamError::WorkerTimeout) => {
            state.bus.close(&session_id).await;
            error_response(
                StatusCode::GATEWAY_TIMEOUT,
                "worker_timeout",
                "no worker picked the session up in time",
            )
        }
    }
}

#[derive(Debug, Serialize)]
struct RunnableModel {
    id: String,
    name: String,
    is_agent: bool,
}

async fn models_all_runnable(State(state): State<ClientApiState>) -> Json<Vec<RunnableModel>> {
    let config = state.router.state().config.load_full();
    let models = config
        .router_settings
        .model_group_alias
        .keys()
        .map(|alias| RunnableModel {
            id: alias.clone(),
            name: alias.clone(),
            is_agent: config.alias_is_agent(alias),
        })
        .collect();
    Json(models)
}

fn upstream_to_response(resp: UpstreamHttpResponse) -> Response {
    let content_type = header_get(&resp.headers, "content-type")
        .unwrap_or("application/json")
        .to_string();
    let builder = Response::builder()
        .status(StatusCode::from_u16(resp.status).unwrap_or(StatusCode::OK))
        .header(header::CONTENT_TYPE, content_type);
    let result = match resp.body {
        UpstreamBody::Bytes(bytes) => builder.body(Body::from(bytes)),
        UpstreamBody::Stream(rx) => {
            let stream = ReceiverStream::new(rx).map(Ok::<_, Infallible>);
            builder.body(Body::from_stream(stream))
        }
    };
    result.unwrap_or_else(|_| StatusCode::INTERNAL_SERVER_ERROR.into_response())
}

fn route_error_to_response(err: RouteError) -> Response {
    match err {
        RouteError::AliasNotFound(alias) => error_response(
            StatusCode::NOT_FOUND,
            "alias_not_found",
            &format!("unknown model alias: {alias}"),
        ),
        RouteError::NoProviderAvailable => error_response(
            StatusCode::SERVICE_UNAVAILABLE,
            "no_provider_available",
            "all providers for this alias are exhausted",
        ),
        RouteError::RequestInvalid { status, body } => Response::builder()
            .status(StatusCode::from_u16(status).unwrap_or(StatusCode::BAD_REQUEST))
            .header(header::CONTENT_TYPE, "application/json")
            .body(Body::from(body))
            .unwrap_or_else(|_| StatusCode::BAD_REQUEST.into_response()),
    }
}

fn bad_request(message: &str) -> Response {
    error_response(StatusCode::BAD_REQUEST, "invalid_request", message)
}

fn error_response(status: StatusCode, kind: &str, message: &str) -> Response {
    (
        status,
        Json(json!({ "error": { "type": kind, "message": message } })),
    )
        .into_response()
}
