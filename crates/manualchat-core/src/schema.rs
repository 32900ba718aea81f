//! Database schema for manualchat.
//!
//! The DDL is kept to the subset PostgreSQL and SQLite share: TEXT ids,
//! BIGINT epoch-millisecond timestamps and BIGINT 0/1 flags.

/// Statements applied by `Database::migrate`, in order.
pub const SCHEMA: &[&str] = &[
    r#"
    CREATE TABLE IF NOT EXISTS users (
        id TEXT PRIMARY KEY,
        email TEXT UNIQUE,
        password TEXT
    )
    "#,
    // user_id has no foreign key: guest-owned conversations reference ids
    // that never get a users row.
    r#"
    CREATE TABLE IF NOT EXISTS conversations (
        id TEXT PRIMARY KEY,
        user_id TEXT NOT NULL,
        title TEXT NOT NULL,
        visibility TEXT NOT NULL DEFAULT 'private',
        created_at BIGINT NOT NULL
    )
    "#,
    "CREATE INDEX IF NOT EXISTS idx_conversations_user_created ON conversations (user_id, created_at)",
    r#"
    CREATE TABLE IF NOT EXISTS messages (
        id TEXT PRIMARY KEY,
        conversation_id TEXT NOT NULL REFERENCES conversations (id),
        role TEXT NOT NULL,
        content TEXT NOT NULL,
        created_at BIGINT NOT NULL,
        UNIQUE (id, conversation_id)
    )
    "#,
    "CREATE INDEX IF NOT EXISTS idx_messages_conversation_created ON messages (conversation_id, created_at)",
    // A vote's message must belong to the vote's conversation, so deleting a
    // conversation's votes always frees every one of its messages.
    r#"
    CREATE TABLE IF NOT EXISTS votes (
        conversation_id TEXT NOT NULL REFERENCES conversations (id),
        message_id TEXT NOT NULL,
        is_upvoted BIGINT NOT NULL,
        PRIMARY KEY (conversation_id, message_id),
        FOREIGN KEY (message_id, conversation_id) REFERENCES messages (id, conversation_id)
    )
    "#,
    "CREATE UNIQUE INDEX IF NOT EXISTS idx_votes_message ON votes (message_id)",
    r#"
    CREATE TABLE IF NOT EXISTS documents (
        id TEXT NOT NULL,
        created_at BIGINT NOT NULL,
        title TEXT NOT NULL,
        content TEXT,
        kind TEXT NOT NULL DEFAULT 'text',
        user_id TEXT NOT NULL,
        PRIMARY KEY (id, created_at)
    )
    "#,
    r#"
    CREATE TABLE IF NOT EXISTS suggestions (
        id TEXT PRIMARY KEY,
        document_id TEXT NOT NULL,
        document_created_at BIGINT NOT NULL,
        original_text TEXT NOT NULL,
        suggested_text TEXT NOT NULL,
        description TEXT,
        is_resolved BIGINT NOT NULL DEFAULT 0,
        user_id TEXT NOT NULL,
        created_at BIGINT NOT NULL,
        FOREIGN KEY (document_id, document_created_at) REFERENCES documents (id, created_at)
    )
    "#,
];
