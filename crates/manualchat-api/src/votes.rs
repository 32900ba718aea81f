use axum::Json;
use axum::extract::{Query, State};
use manualchat_core::Error;
use manualchat_core::models::{Vote, VoteType};
use serde::Deserialize;
use uuid::Uuid;

use crate::caller::Caller;
use crate::conversations::owned_conversation;
use crate::{ApiError, AppState};

#[derive(Debug, Deserialize)]
pub struct VotesQuery {
    conversation_id: Uuid,
}

#[derive(Debug, Deserialize)]
pub struct VoteRequest {
    conversation_id: Uuid,
    message_id: Uuid,
    #[serde(rename = "type")]
    vote: VoteType,
}

/// `GET /api/votes?conversation_id=`
pub async fn list_votes(
    State(state): State<AppState>,
    caller: Caller,
    Query(params): Query<VotesQuery>,
) -> Result<Json<Vec<Vote>>, ApiError> {
    owned_conversation(&state.db, params.conversation_id, caller.id).await?;
    Ok(Json(state.db.votes().list(params.conversation_id).await?))
}

/// `PATCH /api/votes`: record or replace the caller's vote on a message.
pub async fn vote(
    State(state): State<AppState>,
    caller: Caller,
    Json(request): Json<VoteRequest>,
) -> Result<Json<Vote>, ApiError> {
    owned_conversation(&state.db, request.conversation_id, caller.id).await?;

    let in_conversation = state
        .db
        .messages()
        .get(request.message_id)
        .await?
        .is_some_and(|message| message.conversation_id == request.conversation_id);
    if !in_conversation {
        return Err(Error::NotFound(format!("message '{}'", request.message_id)).into());
    }

    state
        .db
        .votes()
        .vote(request.conversation_id, request.message_id, request.vote)
        .await?;
    Ok(Json(Vote {
        conversation_id: request.conversation_id,
        message_id: request.message_id,
        is_upvoted: request.vote.is_upvote(),
    }))
}
