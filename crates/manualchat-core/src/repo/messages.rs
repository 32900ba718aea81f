//! Message storage, conversation rewind and usage counting.

use chrono::{DateTime, Duration, Utc};
use sqlx::Row;
use sqlx::any::AnyRow;
use tracing::debug;
use uuid::Uuid;

use super::{text, timestamp, uuid};
use crate::db::{Database, LogFailure};
use crate::error::{Error, Result};
use crate::models::{Message, MessageRole, to_millis};
use crate::query::{Delete, Filter, Order, Select};

pub struct MessageRepository<'a> {
    db: &'a Database,
}

impl<'a> MessageRepository<'a> {
    pub(crate) fn new(db: &'a Database) -> Self {
        Self { db }
    }

    /// Insert messages as one unit: either every row lands or none does.
    pub async fn save_all(&self, messages: &[Message]) -> Result<()> {
        if messages.is_empty() {
            return Ok(());
        }

        async {
            let mut tx = self.db.begin().await?;
            for msg in messages {
                sqlx::query(
                    r#"
                    INSERT INTO messages (id, conversation_id, role, content, created_at)
                    VALUES ($1, $2, $3, $4, $5)
                    "#,
                )
                .bind(msg.id.to_string())
                .bind(msg.conversation_id.to_string())
                .bind(msg.role.as_str())
                .bind(msg.content.to_string())
                .bind(to_millis(msg.created_at))
                .execute(&mut *tx)
                .await?;
            }
            tx.commit().await?;
            debug!(count = messages.len(), "Saved messages");
            Ok::<_, Error>(())
        }
        .await
        .log_failure("save messages")
    }

    /// Messages of a conversation, oldest first.
    pub async fn list(&self, conversation_id: Uuid) -> Result<Vec<Message>> {
        let stmt = Select::from("messages")
            .filter(Filter::new().eq("conversation_id", conversation_id))
            .order_by("created_at", Order::Asc)
            .build();
        let rows = self
            .db
            .fetch_all(&stmt)
            .await
            .log_failure("get messages by conversation")?;
        rows.iter().map(message_from_row).collect()
    }

    /// Get a message by ID.
    pub async fn get(&self, id: Uuid) -> Result<Option<Message>> {
        let stmt = Select::from("messages")
            .filter(Filter::new().eq("id", id))
            .limit(1)
            .build();
        let row = self
            .db
            .fetch_optional(&stmt)
            .await
            .log_failure("get message")?;
        row.as_ref().map(message_from_row).transpose()
    }

    /// Rewind a conversation: drop every message created at or after `timestamp`
    /// together with the votes on exactly those messages.
    ///
    /// Returns the number of messages removed.
    pub async fn delete_after(&self, conversation_id: Uuid, timestamp: DateTime<Utc>) -> Result<u64> {
        async {
            let mut tx = self.db.begin().await?;

            let select = Select::from("messages")
                .columns("id")
                .filter(
                    Filter::new()
                        .eq("conversation_id", conversation_id)
                        .gte("created_at", timestamp),
                )
                .build();
            let ids = select
                .query()
                .fetch_all(&mut *tx)
                .await?
                .iter()
                .map(|row| text(row, "id"))
                .collect::<Result<Vec<_>>>()?;

            if ids.is_empty() {
                return Ok(0);
            }

            let votes = Delete::from(
                "votes",
                Filter::new()
                    .eq("conversation_id", conversation_id)
                    .is_in("message_id", ids.iter().map(String::as_str)),
            )
            .build();
            let removed_votes = votes.query().execute(&mut *tx).await?.rows_affected();

            let messages = Delete::from(
                "messages",
                Filter::new()
                    .eq("conversation_id", conversation_id)
                    .is_in("id", ids.iter().map(String::as_str)),
            )
            .build();
            let removed = messages.query().execute(&mut *tx).await?.rows_affected();

            tx.commit().await?;
            debug!(%conversation_id, removed, removed_votes, "Rewound conversation");
            Ok::<_, Error>(removed)
        }
        .await
        .log_failure("delete messages after timestamp")
    }

    /// Messages sent by `owner_id` in the trailing `window_hours`, for rate limiting.
    pub async fn count_recent(&self, owner_id: Uuid, window_hours: i64) -> Result<i64> {
        let cutoff = Utc::now() - Duration::hours(window_hours);
        self.count_since(owner_id, cutoff).await
    }

    /// Messages in `owner_id`'s conversations created at or after `cutoff`.
    pub async fn count_since(&self, owner_id: Uuid, cutoff: DateTime<Utc>) -> Result<i64> {
        async {
            let conversations = Select::from("conversations")
                .columns("id")
                .filter(Filter::new().eq("user_id", owner_id))
                .build();
            let ids = self
                .db
                .fetch_all(&conversations)
                .await?
                .iter()
                .map(|row| text(row, "id"))
                .collect::<Result<Vec<_>>>()?;

            if ids.is_empty() {
                return Ok(0);
            }

            let count = Select::from("messages")
                .columns("COUNT(*) AS count")
                .filter(
                    Filter::new()
                        .is_in("conversation_id", ids)
                        .gte("created_at", cutoff),
                )
                .build();
            let row = self.db.fetch_one(&count).await?;
            Ok::<_, Error>(row.try_get::<i64, _>("count")?)
        }
        .await
        .log_failure("count messages by user")
    }

    /// Get message count.
    pub async fn count(&self) -> Result<i64> {
        let stmt = Select::from("messages")
            .columns("COUNT(*) AS count")
            .build();
        let row = self.db.fetch_one(&stmt).await?;
        Ok(row.try_get::<i64, _>("count")?)
    }
}

fn message_from_row(row: &AnyRow) -> Result<Message> {
    Ok(Message {
        id: uuid(row, "id")?,
        conversation_id: uuid(row, "conversation_id")?,
        role: MessageRole::from(text(row, "role")?.as_str()),
        content: serde_json::from_str(&text(row, "content")?)?,
        created_at: timestamp(row, "created_at")?,
    })
}
