//! HTTP request handlers

use std::sync::Arc;

use axum::{
    extract::{rejection::JsonRejection, Json, State},
    http::StatusCode,
    response::{IntoResponse, Response},
};

use super::admission::Admission;
use super::error::reject_body;
use super::streaming::create_chat_stream;
use super::types::{ChatRequest, ChatResponse, HealthResponse, ModelInfo, ModelsResponse};
use crate::config::GenerationConfig;
use crate::engine::Engine;
use crate::error::SoloError;

/// Shared application state
pub struct AppState {
    pub engine: Engine,
    pub admission: Admission,
    started_at: i64,
}

impl AppState {
    /// Fails when the configured generation defaults are out of range
    pub fn new(engine: Engine, defaults: GenerationConfig) -> Result<Self, SoloError> {
        let config = engine.manager().config();
        let admission = Admission::new(defaults, config.served_model_name(), config.context_size)?;
        Ok(Self {
            engine,
            admission,
            started_at: chrono::Utc::now().timestamp(),
        })
    }
}

/// Health check endpoint. May trigger a model load.
pub async fn health(State(state): State<Arc<AppState>>) -> Response {
    let status = state.engine.health().await;
    if status.ok {
        (
            StatusCode::OK,
            Json(HealthResponse {
                status: "ok".to_string(),
                model_loaded: status.model_loaded,
            }),
        )
            .into_response()
    } else {
        (
            StatusCode::SERVICE_UNAVAILABLE,
            Json(HealthResponse {
                status: "error".to_string(),
                model_loaded: status.model_loaded,
            }),
        )
            .into_response()
    }
}

/// List the served model
pub async fn list_models(State(state): State<Arc<AppState>>) -> impl IntoResponse {
    let response = ModelsResponse {
        object: "list".to_string(),
        data: vec![ModelInfo {
            id: state.admission.model_name().to_string(),
            object: "model".to_string(),
            created: state.started_at,
            owned_by: "local".to_string(),
        }],
    };
    (StatusCode::OK, Json(response))
}

/// Chat completion endpoint
pub async fn chat_completions(
    State(state): State<Arc<AppState>>,
    payload: Result<Json<ChatRequest>, JsonRejection>,
) -> Response {
    match serve_chat(&state, payload).await {
        Ok(response) => response,
        Err(e) => {
            match &e {
                SoloError::Internal(_) => tracing::error!("Chat completion failed: {}", e),
                SoloError::Cancelled => tracing::info!("Chat completion abandoned by client"),
                _ => tracing::warn!("Chat completion rejected: {}", e),
            }
            e.into_response()
        }
    }
}

async fn serve_chat(
    state: &AppState,
    payload: Result<Json<ChatRequest>, JsonRejection>,
) -> Result<Response, SoloError> {
    let Json(request) = match payload {
        Ok(json) => json,
        Err(rejection) => return reject_body(rejection),
    };
    let request = state.admission.admit(request)?;

    if request.stream {
        let handle = state.engine.stream(request).await?;
        Ok(create_chat_stream(handle).into_response())
    } else {
        let result = state.engine.complete(request).await?;
        Ok(Json(ChatResponse::from(result)).into_response())
    }
}
