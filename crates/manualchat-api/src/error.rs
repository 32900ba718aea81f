//! Mapping from failures to HTTP responses.

use axum::Json;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use manualchat_core::Error;
use serde_json::json;
use tracing::warn;

use crate::backend::BackendError;

#[derive(Debug, thiserror::Error)]
pub enum ApiError {
    #[error(transparent)]
    Store(#[from] Error),

    #[error("{0}")]
    BadRequest(String),

    #[error("Conversation belongs to another user")]
    Forbidden,

    #[error(transparent)]
    Backend(#[from] BackendError),
}

impl ApiError {
    fn status(&self) -> StatusCode {
        match self {
            ApiError::Store(Error::NotFound(_)) => StatusCode::NOT_FOUND,
            ApiError::Store(Error::NotConfigured) => StatusCode::SERVICE_UNAVAILABLE,
            ApiError::Store(_) | ApiError::Backend(BackendError::Request(_)) => {
                StatusCode::INTERNAL_SERVER_ERROR
            }
            ApiError::BadRequest(_) => StatusCode::BAD_REQUEST,
            ApiError::Forbidden => StatusCode::FORBIDDEN,
            ApiError::Backend(BackendError::Timeout) => StatusCode::REQUEST_TIMEOUT,
        }
    }

    /// Text safe to hand to the browser.
    fn public_message(&self) -> String {
        match self {
            ApiError::Backend(BackendError::Timeout) => {
                "The request timed out. Please try again.".to_string()
            }
            ApiError::Backend(BackendError::Request(_)) => {
                "Failed to process the chat request.".to_string()
            }
            ApiError::Store(Error::NotFound(_) | Error::NotConfigured)
            | ApiError::BadRequest(_)
            | ApiError::Forbidden => self.to_string(),
            ApiError::Store(_) => "Internal server error".to_string(),
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status();
        if status.is_server_error() || status == StatusCode::REQUEST_TIMEOUT {
            warn!(error = %self, status = status.as_u16(), "Request failed");
        }
        (status, Json(json!({ "error": self.public_message() }))).into_response()
    }
}
