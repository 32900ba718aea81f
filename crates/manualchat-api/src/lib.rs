//! manualchat-api: HTTP surface over the conversation store and the
//! inference backend.

pub mod backend;
mod caller;
mod chat;
mod conversations;
pub mod error;
mod votes;

use axum::routing::{delete, get};
use axum::{Json, Router};
use manualchat_core::Database;
use serde::Serialize;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;

pub use backend::BackendClient;
pub use caller::USER_ID_HEADER;
pub use error::ApiError;

/// Shared handler state. Both members are cheap to clone.
#[derive(Clone)]
pub struct AppState {
    pub db: Database,
    pub backend: BackendClient,
}

pub fn create_router(state: AppState) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    Router::new()
        .route("/health", get(health))
        .route("/api/chat", get(chat::backend_health).post(chat::chat))
        .route("/api/history", get(conversations::history))
        .route("/api/conversations/{id}", delete(conversations::delete_conversation))
        .route("/api/votes", get(votes::list_votes).patch(votes::vote))
        .layer(cors)
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

#[derive(Serialize)]
struct HealthResponse {
    status: &'static str,
    name: &'static str,
    version: &'static str,
}

async fn health() -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok",
        name: env!("CARGO_PKG_NAME"),
        version: env!("CARGO_PKG_VERSION"),
    })
}
