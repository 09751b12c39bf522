//! Request handlers for the chat gateway.

use super::AppState;
use crate::agent::PipelineError;
use crate::sessions::Message;
use axum::{
    body::Bytes,
    extract::State,
    http::StatusCode,
    response::{IntoResponse, Json, Response},
};
use serde::Deserialize;

/// Body of `POST /chat`. `history` may be omitted or null.
#[derive(Debug, Deserialize)]
pub struct ChatRequest {
    pub message: Option<String>,
    #[serde(default)]
    pub history: Option<Vec<Message>>,
}

fn error_response(status: StatusCode, message: impl Into<String>) -> Response {
    (status, Json(serde_json::json!({ "error": message.into() }))).into_response()
}

/// HTTP status for a failed turn.
pub fn error_status(error: &PipelineError) -> StatusCode {
    match error {
        PipelineError::Configuration(_) => StatusCode::BAD_REQUEST,
        PipelineError::Template(_) => StatusCode::INTERNAL_SERVER_ERROR,
        PipelineError::Gateway { .. } => StatusCode::BAD_GATEWAY,
    }
}

/// POST /chat: run one turn through the pipeline
pub async fn handle_chat(State(state): State<AppState>, body: Bytes) -> Response {
    let request: ChatRequest = match serde_json::from_slice(&body) {
        Ok(request) => request,
        Err(e) => {
            tracing::debug!(error = %e, "Rejected malformed /chat body");
            return error_response(StatusCode::BAD_REQUEST, format!("Invalid JSON body: {e}"));
        }
    };

    let message = request.message.as_deref().map(str::trim).unwrap_or_default();
    if message.is_empty() {
        return error_response(StatusCode::BAD_REQUEST, "message is required");
    }
    let history = request.history.unwrap_or_default();

    match state.pipeline.generate_response(message, &history).await {
        Ok(result) => Json(result).into_response(),
        Err(e) => {
            let status = error_status(&e);
            if status.is_server_error() {
                tracing::error!(error = %e, status = status.as_u16(), "Chat turn failed");
            } else {
                tracing::warn!(error = %e, status = status.as_u16(), "Chat turn rejected");
            }
            error_response(status, e.to_string())
        }
    }
}

/// GET /health: liveness and active model
pub async fn handle_health(State(state): State<AppState>) -> impl IntoResponse {
    Json(serde_json::json!({
        "status": "ok",
        "provider": state.provider,
        "model": state.model,
    }))
}
