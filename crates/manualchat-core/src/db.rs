//! Database handle for manualchat.
//!
//! A `Database` is either a real sqlx pool reached through the `Any` driver
//! (PostgreSQL in production, SQLite for tests and local use) or a placeholder
//! that rejects every query with [`Error::NotConfigured`]. Repositories borrow
//! it and only see the narrow surface below: run a composed [`Statement`],
//! insert with bound values, or open a transaction.

use std::path::Path;
use std::sync::Once;
use std::time::Duration;

use sqlx::any::{Any, AnyPoolOptions, AnyRow};
use sqlx::{AnyPool, Transaction};

use crate::error::{Error, Result};
use crate::query::Statement;
use crate::repo::{
    ConversationRepository, DocumentRepository, MessageRepository, UserRepository,
    VoteRepository,
};
use crate::schema::SCHEMA;

static INSTALL_DRIVERS: Once = Once::new();

fn install_drivers() {
    INSTALL_DRIVERS.call_once(sqlx::any::install_default_drivers);
}

/// Pool sizing for a configured connection.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PoolSettings {
    pub max_connections: u32,
    pub connect_timeout: Duration,
    pub idle_timeout: Duration,
}

impl Default for PoolSettings {
    fn default() -> Self {
        Self {
            max_connections: 10,
            connect_timeout: Duration::from_secs(30),
            idle_timeout: Duration::from_secs(30),
        }
    }
}

#[derive(Debug, Clone)]
enum Backend {
    Pool(AnyPool),
    Unconfigured,
}

/// Database handle shared by every repository.
#[derive(Debug, Clone)]
pub struct Database {
    backend: Backend,
}

impl Database {
    /// Connect to `url` immediately and apply the schema.
    pub async fn open(url: &str) -> Result<Self> {
        install_drivers();
        let settings = PoolSettings::default();
        let pool = AnyPoolOptions::new()
            .max_connections(settings.max_connections)
            .acquire_timeout(settings.connect_timeout)
            .idle_timeout(settings.idle_timeout)
            .connect(url)
            .await?;

        let db = Self {
            backend: Backend::Pool(pool),
        };
        db.migrate().await?;
        Ok(db)
    }

    /// Open or create a SQLite database file.
    pub async fn open_sqlite(path: &Path) -> Result<Self> {
        let parent = path.parent().unwrap_or(Path::new("."));
        if !parent.exists() {
            std::fs::create_dir_all(parent)?;
        }
        Self::open(&format!("sqlite://{}?mode=rwc", path.display())).await
    }

    /// Build a pool that dials on first use. Only URL parsing can fail here.
    pub fn connect_lazy(url: &str, settings: PoolSettings) -> Result<Self> {
        install_drivers();
        let pool = AnyPoolOptions::new()
            .max_connections(settings.max_connections)
            .acquire_timeout(settings.connect_timeout)
            .idle_timeout(settings.idle_timeout)
            .connect_lazy(url)?;
        Ok(Self {
            backend: Backend::Pool(pool),
        })
    }

    /// Placeholder used when no connection string is available.
    pub fn unconfigured() -> Self {
        Self {
            backend: Backend::Unconfigured,
        }
    }

    pub fn is_configured(&self) -> bool {
        matches!(self.backend, Backend::Pool(_))
    }

    /// Get the connection pool.
    pub fn pool(&self) -> Result<&AnyPool> {
        match &self.backend {
            Backend::Pool(pool) => Ok(pool),
            Backend::Unconfigured => Err(Error::NotConfigured),
        }
    }

    /// Apply the schema. Idempotent.
    pub async fn migrate(&self) -> Result<()> {
        let pool = self.pool()?;
        for statement in SCHEMA {
            sqlx::raw_sql(statement).execute(pool).await?;
        }
        tracing::debug!("Schema is up to date");
        Ok(())
    }

    /// Round-trip a trivial query.
    pub async fn ping(&self) -> Result<()> {
        sqlx::query("SELECT 1 AS connection_test")
            .fetch_one(self.pool()?)
            .await?;
        Ok(())
    }

    /// Close the pool. The placeholder has nothing to close.
    pub async fn close(&self) {
        if let Backend::Pool(pool) = &self.backend {
            pool.close().await;
        }
    }

    // =========================================================================
    // Statement execution
    // =========================================================================

    pub(crate) async fn fetch_all(&self, stmt: &Statement) -> Result<Vec<AnyRow>> {
        Ok(stmt.query().fetch_all(self.pool()?).await?)
    }

    pub(crate) async fn fetch_optional(&self, stmt: &Statement) -> Result<Option<AnyRow>> {
        Ok(stmt.query().fetch_optional(self.pool()?).await?)
    }

    pub(crate) async fn fetch_one(&self, stmt: &Statement) -> Result<AnyRow> {
        Ok(stmt.query().fetch_one(self.pool()?).await?)
    }

    pub(crate) async fn execute(&self, stmt: &Statement) -> Result<u64> {
        let result = stmt.query().execute(self.pool()?).await?;
        Ok(result.rows_affected())
    }

    /// Start a transaction. Dropping it without commit rolls back.
    pub(crate) async fn begin(&self) -> Result<Transaction<'static, Any>> {
        Ok(self.pool()?.begin().await?)
    }

    // =========================================================================
    // Repositories
    // =========================================================================

    pub fn conversations(&self) -> ConversationRepository<'_> {
        ConversationRepository::new(self)
    }

    pub fn messages(&self) -> MessageRepository<'_> {
        MessageRepository::new(self)
    }

    pub fn votes(&self) -> VoteRepository<'_> {
        VoteRepository::new(self)
    }

    pub fn documents(&self) -> DocumentRepository<'_> {
        DocumentRepository::new(self)
    }

    pub fn users(&self) -> UserRepository<'_> {
        UserRepository::new(self)
    }
}

/// Log a failed store operation with context, then hand the error back.
pub(crate) trait LogFailure<T> {
    fn log_failure(self, operation: &str) -> Result<T>;
}

impl<T> LogFailure<T> for Result<T> {
    fn log_failure(self, operation: &str) -> Result<T> {
        if let Err(err) = &self {
            tracing::warn!(error = %err, "Failed to {operation}");
        }
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn placeholder_rejects_queries() {
        let db = Database::unconfigured();
        assert!(!db.is_configured());
        assert!(matches!(db.ping().await, Err(Error::NotConfigured)));
        assert!(matches!(db.migrate().await, Err(Error::NotConfigured)));
    }

    #[tokio::test]
    async fn placeholder_repositories_fail_fast() {
        let db = Database::unconfigured();
        let result = db.conversations().get(uuid::Uuid::new_v4()).await;
        assert!(matches!(result, Err(Error::NotConfigured)));
    }

    #[test]
    fn lazy_pool_rejects_malformed_url() {
        assert!(Database::connect_lazy("definitely not a url", PoolSettings::default()).is_err());
    }
}
