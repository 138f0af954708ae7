use std::sync::Arc;

use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::response::IntoResponse;
use axum::routing::{get, post};
use axum::{Json, Router};
use serde_json::{Value, json};

use crate::tool::{ToolFailure, ToolRegistry};

#[derive(Clone)]
struct ToolServerState {
    registry: Arc<ToolRegistry>,
}

pub fn tool_router(registry: Arc<ToolRegistry>) -> Router {
    let state = ToolServerState { registry };
    Router::new()
        .route("/", get(health))
        .route("/tools", get(list_tools))
        .route("/tools/{name}", post(invoke_tool))
        .with_state(state)
}

async fn health() -> &'static str {
    "llmgate tool gateway"
}

async fn list_tools(State(state): State<ToolServerState>) -> impl IntoResponse {
    Json(state.registry.descriptors())
}

async fn invoke_tool(
    State(state): State<ToolServerState>,
    Path(name): Path<String>,
    body: axum::body::Bytes,
) -> impl IntoResponse {
    let Some(tool) = state.registry.get(&name) else {
        return (
            StatusCode::NOT_FOUND,
            Json(json!({ "error": "unknown_tool", "detail": name })),
        );
    };
    let arguments: Value = if body.is_empty() {
        Value::Null
    } else {
        match serde_json::from_slice(&body) {
            Ok(value) => value,
            Err(err) => {
                return (
                    StatusCode::BAD_REQUEST,
                    Json(json!({ "error": "invalid_arguments", "detail": err.to_string() })),
                );
            }
        }
    };

    tracing::info!(tool = %name, "tool invocation");
    match tool.invoke(arguments).await {
        Ok(result) => (StatusCode::OK, Json(result)),
        Err(ToolFailure::InvalidArguments(detail)) => (
            StatusCode::BAD_REQUEST,
            Json(json!({ "error": "invalid_arguments", "detail": detail })),
        ),
        Err(ToolFailure::Execution(detail)) => (
            StatusCode::INTERNAL_SERVER_ERROR,
            Json(json!({ "error": "tool_execution_failed", "detail": detail })),
        ),
    }
}
