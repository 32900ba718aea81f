//! Error types for manualchat-core

use thiserror::Error;

/// Core library error type.
#[derive(Debug, Error)]
pub enum Error {
    /// Connectivity or constraint failure reported by the storage engine.
    #[error("Persistence error: {0}")]
    Persistence(#[from] sqlx::Error),

    /// A query reached the placeholder connection.
    #[error("Database is not configured (set DATABASE_URL or POSTGRES_URL)")]
    NotConfigured,

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Not found: {0}")]
    NotFound(String),

    /// A stored value could not be decoded into its domain type.
    #[error("Invalid stored value: {0}")]
    InvalidData(String),

    #[error("Password hashing error: {0}")]
    PasswordHash(String),
}

impl From<config::ConfigError> for Error {
    fn from(err: config::ConfigError) -> Self {
        Error::Config(err.to_string())
    }
}

/// Result type alias using Error.
pub type Result<T> = std::result::Result<T, Error>;
