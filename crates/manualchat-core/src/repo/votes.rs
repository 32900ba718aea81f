//! Message votes.

use sqlx::any::AnyRow;
use tracing::debug;
use uuid::Uuid;

use super::{flag, uuid};
use crate::db::{Database, LogFailure};
use crate::error::{Error, Result};
use crate::models::{Vote, VoteType};
use crate::query::{Filter, Select};

pub struct VoteRepository<'a> {
    db: &'a Database,
}

impl<'a> VoteRepository<'a> {
    pub(crate) fn new(db: &'a Database) -> Self {
        Self { db }
    }

    /// Record a vote, replacing any earlier vote on the same message.
    ///
    /// `votes.message_id` is unique, so concurrent votes on one message
    /// serialize in the database instead of racing a read-then-write. The row
    /// is only written when the message belongs to `conversation_id`;
    /// otherwise the message is reported as not found.
    pub async fn vote(&self, conversation_id: Uuid, message_id: Uuid, vote: VoteType) -> Result<()> {
        async {
            let written = sqlx::query(
                r#"
                INSERT INTO votes (conversation_id, message_id, is_upvoted)
                SELECT $1, $2, $3 FROM messages
                WHERE id = $4 AND conversation_id = $5
                ON CONFLICT (message_id) DO UPDATE SET
                    is_upvoted = excluded.is_upvoted
                WHERE votes.conversation_id = excluded.conversation_id
                "#,
            )
            .bind(conversation_id.to_string())
            .bind(message_id.to_string())
            .bind(i64::from(vote.is_upvote()))
            .bind(message_id.to_string())
            .bind(conversation_id.to_string())
            .execute(self.db.pool()?)
            .await?
            .rows_affected();

            if written == 0 {
                return Err(Error::NotFound(format!(
                    "message '{message_id}' in conversation '{conversation_id}'"
                )));
            }
            debug!(%conversation_id, %message_id, ?vote, "Recorded vote");
            Ok(())
        }
        .await
        .log_failure("vote message")
    }

    /// Votes cast in a conversation.
    pub async fn list(&self, conversation_id: Uuid) -> Result<Vec<Vote>> {
        let stmt = Select::from("votes")
            .filter(Filter::new().eq("conversation_id", conversation_id))
            .build();
        let rows = self
            .db
            .fetch_all(&stmt)
            .await
            .log_failure("get votes by conversation")?;
        rows.iter().map(vote_from_row).collect()
    }
}

fn vote_from_row(row: &AnyRow) -> Result<Vote> {
    Ok(Vote {
        conversation_id: uuid(row, "conversation_id")?,
        message_id: uuid(row, "message_id")?,
        is_upvoted: flag(row, "is_upvoted")?,
    })
}
