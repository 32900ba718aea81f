//! Client for the inference backend.

use std::time::Duration;

use manualchat_core::config::BackendConfig;
use manualchat_core::inference::{ChatRequest, ChatResponse};
use tracing::debug;

#[derive(Debug, thiserror::Error)]
pub enum BackendError {
    #[error("Inference backend timed out")]
    Timeout,

    #[error("Inference backend request failed: {0}")]
    Request(reqwest::Error),
}

impl From<reqwest::Error> for BackendError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_timeout() {
            BackendError::Timeout
        } else {
            BackendError::Request(err)
        }
    }
}

/// Thin wrapper over the backend's `/chat` and `/health` endpoints.
#[derive(Debug, Clone)]
pub struct BackendClient {
    http: reqwest::Client,
    base_url: String,
    timeout: Duration,
    health_timeout: Duration,
}

impl BackendClient {
    pub fn new(config: &BackendConfig) -> Result<Self, BackendError> {
        let http = reqwest::Client::builder().build()?;
        Ok(Self {
            http,
            base_url: config.url.trim_end_matches('/').to_string(),
            timeout: Duration::from_millis(config.timeout_ms),
            health_timeout: Duration::from_millis(config.health_timeout_ms),
        })
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// Forward a question. The deadline covers the whole round trip.
    pub async fn chat(&self, request: &ChatRequest) -> Result<ChatResponse, BackendError> {
        let response = self
            .http
            .post(format!("{}/chat", self.base_url))
            .timeout(self.timeout)
            .json(request)
            .send()
            .await?
            .error_for_status()?
            .json::<ChatResponse>()
            .await?;
        debug!(
            answer_len = response.answer.len(),
            images = response.images.as_ref().map_or(0, Vec::len),
            "Backend answered"
        );
        Ok(response)
    }

    /// Fetch the backend's own health document.
    pub async fn health(&self) -> Result<serde_json::Value, BackendError> {
        Ok(self
            .http
            .get(format!("{}/health", self.base_url))
            .timeout(self.health_timeout)
            .send()
            .await?
            .json::<serde_json::Value>()
            .await?)
    }
}
