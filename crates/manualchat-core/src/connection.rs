//! Process-wide database connection.
//!
//! The manager resolves a connection string once, builds a lazily dialing
//! pool, and hands out the same [`Database`] for the rest of the process.
//! Without a usable connection string it hands out the placeholder instead,
//! so startup never fails and only the first query does.

use std::sync::OnceLock;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use tracing::{info, warn};

use crate::config::DatabaseConfig;
use crate::db::{Database, PoolSettings};

/// Set once the connectivity probe has run in this process.
static PROBED: AtomicBool = AtomicBool::new(false);

const ENV_DATABASE_URL: &str = "DATABASE_URL";
const ENV_POSTGRES_URL: &str = "POSTGRES_URL";

pub struct ConnectionManager {
    config: DatabaseConfig,
    database: OnceLock<Database>,
}

impl ConnectionManager {
    pub fn new(config: DatabaseConfig) -> Self {
        Self {
            config,
            database: OnceLock::new(),
        }
    }

    /// The shared handle, initialised on first access.
    pub fn database(&self) -> &Database {
        self.database.get_or_init(|| self.connect())
    }

    fn connect(&self) -> Database {
        let Some(url) = resolve_url(self.config.url.as_deref()) else {
            warn!("No database connection string configured, queries will fail");
            return Database::unconfigured();
        };

        let settings = PoolSettings {
            max_connections: self.config.max_connections,
            connect_timeout: Duration::from_secs(self.config.connect_timeout_secs),
            idle_timeout: Duration::from_secs(self.config.idle_timeout_secs),
        };
        match Database::connect_lazy(&url, settings) {
            Ok(db) => {
                info!(
                    url = %mask_database_url(&url),
                    max_connections = settings.max_connections,
                    "Database pool created"
                );
                db
            }
            Err(e) => {
                warn!(
                    url = %mask_database_url(&url),
                    error = %e,
                    "Invalid database connection string, queries will fail"
                );
                Database::unconfigured()
            }
        }
    }

    /// Run a one-off `SELECT 1` and log the outcome.
    ///
    /// Does nothing unless diagnostics are enabled, and runs at most once per
    /// process no matter how many managers exist.
    pub async fn probe(&self) {
        if !self.config.diagnostics || !claim(&PROBED) {
            return;
        }
        match self.database().ping().await {
            Ok(()) => info!("Database connectivity probe succeeded"),
            Err(e) => warn!(error = %e, "Database connectivity probe failed"),
        }
    }

    /// Close the pool if one was ever created.
    pub async fn shutdown(&self) {
        if let Some(db) = self.database.get() {
            db.close().await;
            info!("Database pool closed");
        }
    }
}

/// True for the first caller only.
fn claim(flag: &AtomicBool) -> bool {
    flag.compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
        .is_ok()
}

/// Pick the connection string: explicit value, then `DATABASE_URL`, then
/// `POSTGRES_URL`. Blank values count as unset.
pub fn resolve_url(configured: Option<&str>) -> Option<String> {
    configured
        .map(ToOwned::to_owned)
        .or_else(|| std::env::var(ENV_DATABASE_URL).ok())
        .or_else(|| std::env::var(ENV_POSTGRES_URL).ok())
        .map(|url| url.trim().to_string())
        .filter(|url| !url.is_empty())
        .map(|url| normalize_scheme(&url))
}

/// Rewrite the `postgresql://` alias to the scheme the driver registry knows.
pub fn normalize_scheme(url: &str) -> String {
    match url.strip_prefix("postgresql://") {
        Some(rest) => format!("postgres://{rest}"),
        None => url.to_string(),
    }
}

/// Hide credentials before a connection string reaches a log line.
pub fn mask_database_url(url: &str) -> String {
    let Some((scheme, rest)) = url.split_once("://") else {
        return url.to_string();
    };
    let authority_end = rest.find('/').unwrap_or(rest.len());
    match rest[..authority_end].rfind('@') {
        Some(at) => format!("{scheme}://***@{}", &rest[at + 1..]),
        None => url.to_string(),
    }
}
