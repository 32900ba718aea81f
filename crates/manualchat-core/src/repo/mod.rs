//! Entity repositories.
//!
//! Each repository borrows the shared [`Database`](crate::Database) and exposes
//! the operations for one table family.

mod conversations;
mod documents;
mod messages;
mod users;
mod votes;

pub use conversations::ConversationRepository;
pub use documents::DocumentRepository;
pub use messages::MessageRepository;
pub use users::UserRepository;
pub use votes::VoteRepository;

use chrono::{DateTime, Utc};
use sqlx::Row;
use sqlx::any::AnyRow;
use uuid::Uuid;

use crate::error::Result;

fn text(row: &AnyRow, column: &str) -> Result<String> {
    Ok(row.try_get::<String, _>(column)?)
}

fn opt_text(row: &AnyRow, column: &str) -> Result<Option<String>> {
    Ok(row.try_get::<Option<String>, _>(column)?)
}

fn uuid(row: &AnyRow, column: &str) -> Result<Uuid> {
    crate::id::parse(&text(row, column)?)
}

fn timestamp(row: &AnyRow, column: &str) -> Result<DateTime<Utc>> {
    crate::models::from_millis(row.try_get::<i64, _>(column)?)
}

fn flag(row: &AnyRow, column: &str) -> Result<bool> {
    Ok(row.try_get::<i64, _>(column)? != 0)
}
