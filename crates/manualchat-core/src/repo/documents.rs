//! Versioned documents and their suggestions.

use chrono::{DateTime, Utc};
use sqlx::any::AnyRow;
use tracing::debug;
use uuid::Uuid;

use super::{flag, opt_text, text, timestamp, uuid};
use crate::db::{Database, LogFailure};
use crate::error::{Error, Result};
use crate::models::{Document, DocumentKind, Suggestion, to_millis};
use crate::query::{Delete, Filter, Order, Select};

pub struct DocumentRepository<'a> {
    db: &'a Database,
}

impl<'a> DocumentRepository<'a> {
    pub(crate) fn new(db: &'a Database) -> Self {
        Self { db }
    }

    /// Save a new version of document `id`, stamped with the current time.
    pub async fn save(
        &self,
        id: Uuid,
        title: &str,
        kind: DocumentKind,
        content: Option<&str>,
        owner_id: Uuid,
    ) -> Result<Document> {
        self.insert(&Document {
            id,
            created_at: Utc::now(),
            title: title.to_string(),
            kind,
            content: content.map(ToOwned::to_owned),
            user_id: owner_id,
        })
        .await
    }

    /// Insert a document version and return the stored row.
    pub async fn insert(&self, document: &Document) -> Result<Document> {
        async {
            let row = sqlx::query(
                r#"
                INSERT INTO documents (id, created_at, title, content, kind, user_id)
                VALUES ($1, $2, $3, $4, $5, $6)
                RETURNING *
                "#,
            )
            .bind(document.id.to_string())
            .bind(to_millis(document.created_at))
            .bind(document.title.as_str())
            .bind(document.content.as_deref())
            .bind(document.kind.as_str())
            .bind(document.user_id.to_string())
            .fetch_one(self.db.pool()?)
            .await?;
            debug!(document_id = %document.id, "Saved document version");
            document_from_row(&row)
        }
        .await
        .log_failure("save document")
    }

    /// Full version history, oldest first.
    pub async fn versions(&self, id: Uuid) -> Result<Vec<Document>> {
        let stmt = Select::from("documents")
            .filter(Filter::new().eq("id", id))
            .order_by("created_at", Order::Asc)
            .build();
        let rows = self
            .db
            .fetch_all(&stmt)
            .await
            .log_failure("get documents by id")?;
        rows.iter().map(document_from_row).collect()
    }

    /// Most recent version.
    pub async fn latest(&self, id: Uuid) -> Result<Option<Document>> {
        let stmt = Select::from("documents")
            .filter(Filter::new().eq("id", id))
            .order_by("created_at", Order::Desc)
            .limit(1)
            .build();
        let row = self
            .db
            .fetch_optional(&stmt)
            .await
            .log_failure("get document by id")?;
        row.as_ref().map(document_from_row).transpose()
    }

    /// Drop every version newer than `timestamp`, and the suggestions tied to
    /// those versions. Returns the removed versions.
    pub async fn delete_versions_after(
        &self,
        id: Uuid,
        timestamp: DateTime<Utc>,
    ) -> Result<Vec<Document>> {
        async {
            let mut tx = self.db.begin().await?;

            let suggestions = Delete::from(
                "suggestions",
                Filter::new()
                    .eq("document_id", id)
                    .gt("document_created_at", timestamp),
            )
            .build();
            let removed_suggestions = suggestions.query().execute(&mut *tx).await?.rows_affected();

            let documents = Delete::from(
                "documents",
                Filter::new().eq("id", id).gt("created_at", timestamp),
            )
            .returning("*")
            .build();
            let rows = documents.query().fetch_all(&mut *tx).await?;

            tx.commit().await?;
            debug!(
                document_id = %id,
                removed_versions = rows.len(),
                removed_suggestions,
                "Deleted document versions"
            );

            let mut removed = rows
                .iter()
                .map(document_from_row)
                .collect::<Result<Vec<_>>>()?;
            removed.sort_by_key(|doc| doc.created_at);
            Ok::<_, Error>(removed)
        }
        .await
        .log_failure("delete documents by id after timestamp")
    }

    /// Insert suggestions as one unit.
    pub async fn save_suggestions(&self, suggestions: &[Suggestion]) -> Result<()> {
        if suggestions.is_empty() {
            return Ok(());
        }

        async {
            let mut tx = self.db.begin().await?;
            for suggestion in suggestions {
                sqlx::query(
                    r#"
                    INSERT INTO suggestions (
                        id, document_id, document_created_at, original_text, suggested_text,
                        description, is_resolved, user_id, created_at
                    )
                    VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9)
                    "#,
                )
                .bind(suggestion.id.to_string())
                .bind(suggestion.document_id.to_string())
                .bind(to_millis(suggestion.document_created_at))
                .bind(suggestion.original_text.as_str())
                .bind(suggestion.suggested_text.as_str())
                .bind(suggestion.description.as_deref())
                .bind(i64::from(suggestion.is_resolved))
                .bind(suggestion.user_id.to_string())
                .bind(to_millis(suggestion.created_at))
                .execute(&mut *tx)
                .await?;
            }
            tx.commit().await?;
            debug!(count = suggestions.len(), "Saved suggestions");
            Ok::<_, Error>(())
        }
        .await
        .log_failure("save suggestions")
    }

    /// Suggestions across every version of a document.
    pub async fn suggestions_for(&self, document_id: Uuid) -> Result<Vec<Suggestion>> {
        let stmt = Select::from("suggestions")
            .filter(Filter::new().eq("document_id", document_id))
            .order_by("created_at", Order::Asc)
            .build();
        let rows = self
            .db
            .fetch_all(&stmt)
            .await
            .log_failure("get suggestions by document")?;
        rows.iter().map(suggestion_from_row).collect()
    }
}

fn document_from_row(row: &AnyRow) -> Result<Document> {
    Ok(Document {
        id: uuid(row, "id")?,
        created_at: timestamp(row, "created_at")?,
        title: text(row, "title")?,
        kind: text(row, "kind")?.parse()?,
        content: opt_text(row, "content")?,
        user_id: uuid(row, "user_id")?,
    })
}

fn suggestion_from_row(row: &AnyRow) -> Result<Suggestion> {
    Ok(Suggestion {
        id: uuid(row, "id")?,
        document_id: uuid(row, "document_id")?,
        document_created_at: timestamp(row, "document_created_at")?,
        original_text: text(row, "original_text")?,
        suggested_text: text(row, "suggested_text")?,
        description: opt_text(row, "description")?,
        is_resolved: flag(row, "is_resolved")?,
        user_id: uuid(row, "user_id")?,
        created_at: timestamp(row, "created_at")?,
    })
}
