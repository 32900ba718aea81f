//! Conversation storage, keyset pagination and cascading delete.

use chrono::Utc;
use sqlx::any::AnyRow;
use tracing::debug;
use uuid::Uuid;

use super::{text, timestamp, uuid};
use crate::db::{Database, LogFailure};
use crate::error::{Error, Result};
use crate::models::{Conversation, ConversationPage, ListConversations, Visibility, to_millis};
use crate::query::{Delete, Filter, Order, Select, Update};

pub struct ConversationRepository<'a> {
    db: &'a Database,
}

impl<'a> ConversationRepository<'a> {
    pub(crate) fn new(db: &'a Database) -> Self {
        Self { db }
    }

    /// Create a private conversation stamped with the current time.
    pub async fn create(&self, id: Uuid, owner_id: Uuid, title: &str) -> Result<Conversation> {
        let conversation = Conversation {
            id,
            user_id: owner_id,
            title: title.to_string(),
            created_at: Utc::now(),
            visibility: Visibility::Private,
        };
        self.insert(&conversation).await?;
        Ok(conversation)
    }

    /// Insert a fully specified conversation row.
    pub async fn insert(&self, conversation: &Conversation) -> Result<()> {
        async {
            sqlx::query(
                r#"
                INSERT INTO conversations (id, user_id, title, visibility, created_at)
                VALUES ($1, $2, $3, $4, $5)
                "#,
            )
            .bind(conversation.id.to_string())
            .bind(conversation.user_id.to_string())
            .bind(conversation.title.as_str())
            .bind(conversation.visibility.as_str())
            .bind(to_millis(conversation.created_at))
            .execute(self.db.pool()?)
            .await?;
            debug!(conversation_id = %conversation.id, "Saved conversation");
            Ok::<_, Error>(())
        }
        .await
        .log_failure("save conversation")
    }

    /// Get a conversation by ID.
    pub async fn get(&self, id: Uuid) -> Result<Option<Conversation>> {
        let stmt = Select::from("conversations")
            .filter(Filter::new().eq("id", id))
            .limit(1)
            .build();
        let row = self
            .db
            .fetch_optional(&stmt)
            .await
            .log_failure("get conversation")?;
        row.as_ref().map(conversation_from_row).transpose()
    }

    /// Delete a conversation with its votes and messages.
    ///
    /// Children go first, all inside one transaction. Returns the deleted row.
    pub async fn delete(&self, id: Uuid) -> Result<Option<Conversation>> {
        async {
            let mut tx = self.db.begin().await?;

            let votes = Delete::from("votes", Filter::new().eq("conversation_id", id)).build();
            let removed_votes = votes.query().execute(&mut *tx).await?.rows_affected();

            let messages =
                Delete::from("messages", Filter::new().eq("conversation_id", id)).build();
            let removed_messages = messages.query().execute(&mut *tx).await?.rows_affected();

            let conversation = Delete::from("conversations", Filter::new().eq("id", id))
                .returning("*")
                .build();
            let row = conversation.query().fetch_optional(&mut *tx).await?;

            tx.commit().await?;

            debug!(
                conversation_id = %id,
                removed_votes,
                removed_messages,
                found = row.is_some(),
                "Deleted conversation"
            );
            row.as_ref().map(conversation_from_row).transpose()
        }
        .await
        .log_failure("delete conversation")
    }

    /// List a user's conversations newest first, one keyset page at a time.
    ///
    /// Fetches `limit + 1` rows so `has_more` needs no separate count.
    pub async fn list(&self, request: &ListConversations) -> Result<ConversationPage> {
        async {
            let cursor = match (request.starting_after, request.ending_before) {
                (Some(after), _) => {
                    let anchor = self.cursor_anchor(after).await?;
                    Some(Filter::new().gt("created_at", anchor.created_at))
                }
                (None, Some(before)) => {
                    let anchor = self.cursor_anchor(before).await?;
                    Some(Filter::new().lt("created_at", anchor.created_at))
                }
                (None, None) => None,
            };

            let limit = u64::from(request.limit);
            let stmt = Select::from("conversations")
                .filter(
                    Filter::new()
                        .eq("user_id", request.owner_id)
                        .and_maybe(cursor),
                )
                .order_by("created_at", Order::Desc)
                .limit(limit + 1)
                .build();

            let rows = self.db.fetch_all(&stmt).await?;
            let mut items = rows
                .iter()
                .map(conversation_from_row)
                .collect::<Result<Vec<_>>>()?;

            let has_more = items.len() as u64 > limit;
            items.truncate(request.limit as usize);
            Ok::<_, Error>(ConversationPage { items, has_more })
        }
        .await
        .log_failure("list conversations")
    }

    async fn cursor_anchor(&self, id: Uuid) -> Result<Conversation> {
        self.get(id)
            .await?
            .ok_or_else(|| Error::NotFound(format!("conversation '{id}'")))
    }

    /// Change who can see a conversation.
    pub async fn set_visibility(&self, id: Uuid, visibility: Visibility) -> Result<()> {
        let stmt = Update::table("conversations", Filter::new().eq("id", id))
            .set("visibility", visibility.as_str())
            .build();
        self.db
            .execute(&stmt)
            .await
            .log_failure("update conversation visibility")?;
        Ok(())
    }

    /// Get conversation count.
    pub async fn count(&self) -> Result<i64> {
        let stmt = Select::from("conversations")
            .columns("COUNT(*) AS count")
            .build();
        let row = self.db.fetch_one(&stmt).await?;
        Ok(sqlx::Row::try_get::<i64, _>(&row, "count")?)
    }
}

fn conversation_from_row(row: &AnyRow) -> Result<Conversation> {
    Ok(Conversation {
        id: uuid(row, "id")?,
        user_id: uuid(row, "user_id")?,
        title: text(row, "title")?,
        created_at: timestamp(row, "created_at")?,
        visibility: text(row, "visibility")?.parse()?,
    })
}
