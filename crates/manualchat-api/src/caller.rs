//! Caller identity.
//!
//! Session issuance lives in front of this service; it forwards the
//! authenticated user id in a header. Requests without one act as a freshly
//! minted guest.

use axum::extract::FromRequestParts;
use axum::http::request::Parts;
use tracing::debug;
use uuid::Uuid;

use crate::{ApiError, AppState};

pub const USER_ID_HEADER: &str = "x-user-id";

pub struct Caller {
    pub id: Uuid,
}

impl FromRequestParts<AppState> for Caller {
    type Rejection = ApiError;

    async fn from_request_parts(parts: &mut Parts, state: &AppState) -> Result<Self, Self::Rejection> {
        let Some(value) = parts.headers.get(USER_ID_HEADER) else {
            let guest = state.db.users().create_guest();
            debug!(guest_id = %guest.id, "Serving request as guest");
            return Ok(Caller { id: guest.id });
        };

        let id = value
            .to_str()
            .ok()
            .and_then(|raw| Uuid::parse_str(raw.trim()).ok())
            .ok_or_else(|| ApiError::BadRequest(format!("Invalid {USER_ID_HEADER} header")))?;
        Ok(Caller { id })
    }
}
