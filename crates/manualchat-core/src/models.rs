//! Domain models for the conversation store.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::{Error, Result};

/// A registered account. Guests never get a row.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct User {
    pub id: Uuid,
    pub email: Option<String>,
    /// Argon2 PHC string; never the plaintext.
    #[serde(skip_serializing)]
    pub password_hash: Option<String>,
}

/// Ephemeral identity for an unauthenticated session.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GuestUser {
    pub id: Uuid,
    pub email: String,
}

/// A chat owned by exactly one user.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Conversation {
    pub id: Uuid,
    pub user_id: Uuid,
    pub title: String,
    pub created_at: DateTime<Utc>,
    pub visibility: Visibility,
}

/// Who can see a conversation.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Visibility {
    #[default]
    Private,
    Public,
}

impl Visibility {
    pub fn as_str(self) -> &'static str {
        match self {
            Visibility::Private => "private",
            Visibility::Public => "public",
        }
    }
}

impl std::fmt::Display for Visibility {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for Visibility {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "private" => Ok(Visibility::Private),
            "public" => Ok(Visibility::Public),
            other => Err(Error::InvalidData(format!("visibility '{other}'"))),
        }
    }
}

/// A message within a conversation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Message {
    pub id: Uuid,
    pub conversation_id: Uuid,
    pub role: MessageRole,
    /// Structured payload: text parts, image references returned by the backend.
    pub content: serde_json::Value,
    pub created_at: DateTime<Utc>,
}

/// Message roles.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum MessageRole {
    User,
    Assistant,
    System,
    Tool,
    #[serde(other)]
    Other,
}

impl MessageRole {
    pub fn as_str(self) -> &'static str {
        match self {
            MessageRole::User => "user",
            MessageRole::Assistant => "assistant",
            MessageRole::System => "system",
            MessageRole::Tool => "tool",
            MessageRole::Other => "other",
        }
    }
}

impl std::fmt::Display for MessageRole {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl From<&str> for MessageRole {
    fn from(s: &str) -> Self {
        match s.to_lowercase().as_str() {
            "user" | "human" => MessageRole::User,
            "assistant" | "bot" | "ai" => MessageRole::Assistant,
            "system" => MessageRole::System,
            "tool" | "function" => MessageRole::Tool,
            _ => MessageRole::Other,
        }
    }
}

/// Feedback on one assistant message.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Vote {
    pub conversation_id: Uuid,
    pub message_id: Uuid,
    pub is_upvoted: bool,
}

/// Direction of a vote as submitted by the UI.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum VoteType {
    Up,
    Down,
}

impl VoteType {
    pub fn is_upvote(self) -> bool {
        matches!(self, VoteType::Up)
    }
}

/// One version of a generated document. Versions share `id` and differ by `created_at`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Document {
    pub id: Uuid,
    pub created_at: DateTime<Utc>,
    pub title: String,
    pub kind: DocumentKind,
    pub content: Option<String>,
    pub user_id: Uuid,
}

/// Artifact kinds a document can hold.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DocumentKind {
    #[default]
    Text,
    Code,
    Image,
    Sheet,
}

impl DocumentKind {
    pub fn as_str(self) -> &'static str {
        match self {
            DocumentKind::Text => "text",
            DocumentKind::Code => "code",
            DocumentKind::Image => "image",
            DocumentKind::Sheet => "sheet",
        }
    }
}

impl std::fmt::Display for DocumentKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for DocumentKind {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "text" => Ok(DocumentKind::Text),
            "code" => Ok(DocumentKind::Code),
            "image" => Ok(DocumentKind::Image),
            "sheet" => Ok(DocumentKind::Sheet),
            other => Err(Error::InvalidData(format!("document kind '{other}'"))),
        }
    }
}

/// An edit proposal tied to one specific document version.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Suggestion {
    pub id: Uuid,
    pub document_id: Uuid,
    pub document_created_at: DateTime<Utc>,
    pub original_text: String,
    pub suggested_text: String,
    pub description: Option<String>,
    pub is_resolved: bool,
    pub user_id: Uuid,
    pub created_at: DateTime<Utc>,
}

/// Keyset pagination request over a user's conversations.
///
/// When both cursors are set, `starting_after` takes precedence.
#[derive(Debug, Clone)]
pub struct ListConversations {
    pub owner_id: Uuid,
    pub limit: u32,
    /// Return conversations strictly newer than this one.
    pub starting_after: Option<Uuid>,
    /// Return conversations strictly older than this one.
    pub ending_before: Option<Uuid>,
}

impl ListConversations {
    pub fn first_page(owner_id: Uuid, limit: u32) -> Self {
        Self {
            owner_id,
            limit,
            starting_after: None,
            ending_before: None,
        }
    }
}

/// One page of conversations, newest first.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConversationPage {
    pub items: Vec<Conversation>,
    pub has_more: bool,
}

/// Milliseconds since the epoch, the storage representation of every timestamp.
pub(crate) fn to_millis(ts: DateTime<Utc>) -> i64 {
    ts.timestamp_millis()
}

pub(crate) fn from_millis(ms: i64) -> Result<DateTime<Utc>> {
    DateTime::from_timestamp_millis(ms)
        .ok_or_else(|| Error::InvalidData(format!("timestamp {ms} out of range")))
}

#[cfg(test)]
#[path = "models_tests.rs"]
mod tests;
