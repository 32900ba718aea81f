//! Configuration types and loading for manualchat.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::Error;
use crate::error::Result;

/// Main application configuration.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Conversation store connection.
    pub database: DatabaseConfig,

    /// Inference backend the chat endpoint forwards to.
    pub backend: BackendConfig,

    /// HTTP server settings.
    pub server: ServerConfig,
}

impl Config {
    /// Load configuration from the default config file plus environment overrides.
    pub fn load() -> Result<Self> {
        Self::load_from_path(&Self::default_config_path())
    }

    /// Load configuration from a specific file (optional) plus environment overrides.
    ///
    /// Environment keys use the `MANUALCHAT__` prefix and `__` between
    /// sections, e.g. `MANUALCHAT__BACKEND__URL`.
    pub fn load_from_path(path: &Path) -> Result<Self> {
        let settings = config::Config::builder()
            .add_source(config::File::from(path).required(false))
            .add_source(
                config::Environment::with_prefix(crate::ENV_PREFIX)
                    .prefix_separator("__")
                    .separator("__"),
            )
            .build()?;
        let mut config: Self = settings.try_deserialize()?;
        config.expand_paths();
        Ok(config)
    }

    /// Get the default config file path.
    pub fn default_config_path() -> PathBuf {
        dirs::config_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join(crate::APP_NAME)
            .join("config.toml")
    }

    /// Save configuration to a specific file path.
    pub fn save_to_path(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let content = toml::to_string_pretty(self).map_err(|e| Error::Config(e.to_string()))?;
        std::fs::write(path, content)?;
        Ok(())
    }

    /// Ensure config exists at the given path, creating defaults if missing.
    pub fn ensure_at(path: &Path) -> Result<Self> {
        if !path.exists() {
            Self::default().save_to_path(path)?;
        }
        Self::load_from_path(path)
    }

    /// Expand a path, replacing ~ and environment variables.
    pub fn expand_path(path: &str) -> PathBuf {
        let expanded = shellexpand::full(path)
            .map(|v| v.into_owned())
            .unwrap_or_else(|_| path.to_string());
        PathBuf::from(expanded)
    }

    /// Expand `~` and variables in the file part of a SQLite database URL.
    fn expand_paths(&mut self) {
        let Some(url) = self.database.url.as_deref() else {
            return;
        };
        let Some(rest) = url.strip_prefix("sqlite://").or_else(|| url.strip_prefix("sqlite:")) else {
            return;
        };
        let (file, query) = match rest.split_once('?') {
            Some((file, query)) => (file, Some(query)),
            None => (rest, None),
        };
        if file.is_empty() || file == ":memory:" {
            return;
        }

        let mut expanded = format!("sqlite://{}", Self::expand_path(file).display());
        if let Some(query) = query {
            expanded.push('?');
            expanded.push_str(query);
        }
        self.database.url = Some(expanded);
    }
}

/// Connection settings for the conversation store.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DatabaseConfig {
    /// Connection string. Falls back to `DATABASE_URL`, then `POSTGRES_URL`.
    pub url: Option<String>,

    /// Upper bound on pooled sessions.
    pub max_connections: u32,

    pub connect_timeout_secs: u64,

    pub idle_timeout_secs: u64,

    /// Run and log a one-off connectivity probe at startup.
    pub diagnostics: bool,
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            url: None,
            max_connections: 10,
            connect_timeout_secs: 30,
            idle_timeout_secs: 30,
            diagnostics: false,
        }
    }
}

/// Inference backend endpoint.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct BackendConfig {
    pub url: String,

    /// Deadline for a chat round trip.
    pub timeout_ms: u64,

    /// Deadline for the health probe.
    pub health_timeout_ms: u64,
}

impl Default for BackendConfig {
    fn default() -> Self {
        Self {
            url: "http://localhost:8001".to_string(),
            timeout_ms: 30_000,
            health_timeout_ms: 5_000,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    pub port: u16,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self { port: 3000 }
    }
}

#[cfg(test)]
#[path = "config_tests.rs"]
mod tests;
