use std::path::{Path, PathBuf};
use std::sync::Arc;

use axum::extract::{Query, State};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use axum::{Json, Router};
use serde::Deserialize;
use serde_json::json;
use tokio::sync::Notify;

use llmgate_agent::PatternSet;
use llmgate_common::GatewayConfig;
use llmgate_core::AppState;

#[derive(Clone)]
pub struct AdminState {
    pub app: Arc<AppState>,
    pub config_path: PathBuf,
    pub prompts_dir: PathBuf,
    pub patterns: Arc<PatternSet>,
    pub restart: Arc<Notify>,
}

pub fn admin_router(state: AdminState) -> Router {
    Router::new()
        .route("/config", get(get_config).post(post_config))
        .route("/prompt_content", get(get_prompt_content).post(post_prompt_content))
        .route("/prompts", get(list_prompts))
        .route("/react_patterns", get(list_patterns))
        .route("/provider_models", get(provider_models))
        .route("/keys", get(keys_snapshot))
        .route("/restart", post(restart))
        .with_state(state)
}

async fn get_config(State(state): State<AdminState>) -> Response {
    match tokio::fs::read_to_string(&state.config_path).await {
        Ok(text) => ([("content-type", "application/yaml")], text).into_response(),
        Err(err) => admin_error(
            StatusCode::INTERNAL_SERVER_ERROR,
            &format!("read config: {err}"),
        ),
    }
}

/// Validate, persist, then swap the in-memory snapshot; in-flight requests
/// keep whatever snapshot they loaded.
async fn post_config(State(state): State<AdminState>, body: String) -> Response {
    let config = match GatewayConfig::from_yaml(&body) {
        Ok(config) => config,
        Err(err) => return admin_error(StatusCode::BAD_REQUEST, &err.to_string()),
    };
    if let Err(err) = tokio::fs::write(&state.config_path, &body).await {
        return admin_error(
            StatusCode::INTERNAL_SERVER_ERROR,
            &format!("write config: {err}"),
        );
    }
    state.app.apply_config(config);
    tracing::info!("configuration reloaded");
    Json(json!({ "status": "reloaded" })).into_response()
}

#[derive(Debug, Deserialize)]
struct PromptPathQuery {
    path: String,
}

async fn get_prompt_content(
    State(state): State<AdminState>,
    Query(query): Query<PromptPathQuery>,
) -> Response {
    let Some(path) = resolve_prompt_path(&state.prompts_dir, &query.path) else {
        return admin_error(StatusCode::BAD_REQUEST, "invalid path");
    };
    match tokio::fs::read_to_string(&path).await {
        Ok(text) => text.into_response(),
        Err(err) if err.kind() == std::io::ErrorKind::NotFound => {
            admin_error(StatusCode::NOT_FOUND, "no such prompt file")
        }
        Err(err) => admin_error(StatusCode::INTERNAL_SERVER_ERROR, &err.to_string()),
    }
}

async fn post_prompt_content(
    State(state): State<AdminState>,
    Query(query): Query<PromptPathQuery>,
    body: String,
) -> Response {
    let Some(path) = resolve_prompt_path(&state.prompts_dir, &query.path) else {
        return admin_error(StatusCode::BAD_REQUEST, "invalid path");
    };
    if let Some(parent) = path.parent()
        && let Err(err) = tokio::fs::create_dir_all(parent).await
    {
        return admin_error(StatusCode::INTERNAL_SERVER_ERROR, &err.to_string());
    }
    match tokio::fs::write(&path, body).await {
        Ok(()) => Json(json!({ "status": "written" })).into_response(),
        Err(err) => admin_error(StatusCode::INTERNAL_SERVER_ERROR, &err.to_string()),
    }
}

async fn list_prompts(State(state): State<AdminState>) -> Response {
    let mut files = Vec::new();
    match std::fs::read_dir(&state.prompts_dir) {
        Ok(entries) => {
            for entry in entries.filter_map(|e| e.ok()) {
                if entry.path().is_file()
                    && let Some(name) = entry.file_name().to_str()
                {
                    files.push(name.to_string());
                }
            }
        }
        Err(err) if err.kind() == std::io::ErrorKind::NotFound => {}
        Err(err) => return admin_error(StatusCode::INTERNAL_SERVER_ERROR, &err.to_string()),
    }
    files.sort();
    Json(files).into_response()
}

async fn list_patterns(State(state): State<AdminState>) -> Json<Vec<String>> {
    Json(state.patterns.names())
}

async fn provider_models(State(state): State<AdminState>) -> Response {
    let config = state.app.config.load_full();
    Json(config.provider_models()).into_response()
}

async fn keys_snapshot(State(state): State<AdminState>) -> Response {
    Json(state.app.pool.snapshot().await).into_response()
}

/// Responds, then wakes the binary's shutdown future; the supervisor is
/// expected to start a fresh process.
async fn restart(State(state): State<AdminState>) -> Response {
    tracing::warn!("restart requested via admin API");
    state.restart.notify_one();
    (StatusCode::ACCEPTED, Json(json!({ "status": "restarting" }))).into_response()
}

/// Confine admin file access to the prompts directory.
fn resolve_prompt_path(base: &Path, requested: &str) -> Option<PathBuf> {
    let requested = Path::new(requested);
    if requested.is_absolute() {
        return None;
    }
    let traverses = requested
        .components()
        .any(|c| matches!(c, std::path::Component::ParentDir));
    if traverses {
        return None;
    }
    Some(base.join(requested))
}

fn admin_error(status: StatusCode, message: &str) -> Response {
    (status, Json(json!({ "error": message }))).into_response()
}
