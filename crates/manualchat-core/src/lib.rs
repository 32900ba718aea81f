//! manualchat-core: conversation store for the vehicle-manual assistant
//!
//! This crate owns persistence for the chat front end: conversations,
//! messages, votes, versioned documents with their suggestions, and user
//! credentials. It also carries the configuration shared by the binaries and
//! the request/response contract of the inference backend.

pub mod config;
pub mod connection;
pub mod db;
pub mod error;
pub mod id;
pub mod inference;
pub mod models;
pub mod query;
pub mod repo;
pub mod schema;

pub use config::Config;
pub use connection::ConnectionManager;
pub use db::Database;
pub use error::Error;
pub use error::Result;

/// Application name used for config directories and paths.
pub const APP_NAME: &str = "manualchat";

/// Prefix for environment overrides, e.g. `MANUALCHAT__SERVER__PORT`.
pub const ENV_PREFIX: &str = "MANUALCHAT";
