use axum::Json;
use axum::extract::{Path, Query, State};
use manualchat_core::models::{Conversation, ConversationPage, ListConversations};
use manualchat_core::{Database, Error};
use serde::Deserialize;
use uuid::Uuid;

use crate::caller::Caller;
use crate::{ApiError, AppState};

const DEFAULT_PAGE_SIZE: u32 = 10;
const MAX_PAGE_SIZE: u32 = 100;

#[derive(Debug, Deserialize)]
pub struct HistoryQuery {
    limit: Option<u32>,
    starting_after: Option<Uuid>,
    ending_before: Option<Uuid>,
}

/// `GET /api/history`: one page of the caller's conversations.
pub async fn history(
    State(state): State<AppState>,
    caller: Caller,
    Query(params): Query<HistoryQuery>,
) -> Result<Json<ConversationPage>, ApiError> {
    let request = ListConversations {
        owner_id: caller.id,
        limit: params
            .limit
            .unwrap_or(DEFAULT_PAGE_SIZE)
            .clamp(1, MAX_PAGE_SIZE),
        starting_after: params.starting_after,
        ending_before: params.ending_before,
    };
    Ok(Json(state.db.conversations().list(&request).await?))
}

/// `DELETE /api/conversations/{id}`: remove a conversation the caller owns.
pub async fn delete_conversation(
    State(state): State<AppState>,
    caller: Caller,
    Path(id): Path<Uuid>,
) -> Result<Json<Conversation>, ApiError> {
    owned_conversation(&state.db, id, caller.id).await?;
    let deleted = state
        .db
        .conversations()
        .delete(id)
        .await?
        .ok_or_else(|| not_found(id))?;
    Ok(Json(deleted))
}

/// Load a conversation and check it belongs to `owner`.
pub(crate) async fn owned_conversation(
    db: &Database,
    id: Uuid,
    owner: Uuid,
) -> Result<Conversation, ApiError> {
    let conversation = db
        .conversations()
        .get(id)
        .await?
        .ok_or_else(|| not_found(id))?;
    if conversation.user_id != owner {
        return Err(ApiError::Forbidden);
    }
    Ok(conversation)
}

fn not_found(id: Uuid) -> Error {
    Error::NotFound(format!("conversation '{id}'"))
}
