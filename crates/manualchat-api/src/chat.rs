use axum::Json;
use axum::extract::State;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use manualchat_core::inference::{ChatRequest, ChatResponse};
use serde_json::json;
use tracing::{debug, warn};

use crate::backend::BackendError;
use crate::{ApiError, AppState};

/// `POST /api/chat`: forward the question to the inference backend.
pub async fn chat(
    State(state): State<AppState>,
    Json(request): Json<ChatRequest>,
) -> Result<Json<ChatResponse>, ApiError> {
    let response = state.backend.chat(&request).await?;
    if request.debug_mode {
        debug!(answer = %response.answer, images = ?response.images, "Debug chat response");
    }
    Ok(Json(response))
}

/// `GET /api/chat`: report whether the inference backend answers.
pub async fn backend_health(State(state): State<AppState>) -> Response {
    let backend_url = state.backend.base_url();
    match state.backend.health().await {
        Ok(backend) => (
            StatusCode::OK,
            Json(json!({
                "status": "ok",
                "backend": backend,
                "backend_url": backend_url,
            })),
        )
            .into_response(),
        Err(err) => {
            warn!(error = %err, backend_url, "Backend health check failed");
            let message = match err {
                BackendError::Timeout => "Backend health check timed out",
                BackendError::Request(_) => "Cannot reach the backend",
            };
            (
                StatusCode::SERVICE_UNAVAILABLE,
                Json(json!({
                    "status": "error",
                    "message": message,
                    "backend_url": backend_url,
                })),
            )
                .into_response()
        }
    }
}
