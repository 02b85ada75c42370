//! Configuration management for rowkit.
//!
//! Handles loading configuration from TOML files and environment variables,
//! with support for named SQLite connections and query defaults.

use crate::db::DatabaseBackend;
use crate::error::{Result, RowkitError};
use crate::query::QueryOptions;
use serde::{Deserialize, Serialize};
use sqlx::sqlite::SqliteConnectOptions;
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::str::FromStr;
use std::time::Duration;

/// Database path denoting a private in-memory database.
pub const MEMORY_DATABASE: &str = ":memory:";

/// Main configuration structure for rowkit.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct Config {
    /// Defaults applied to every query.
    #[serde(default)]
    pub query: QueryOptions,

    /// Named database connections.
    #[serde(default)]
    pub connections: HashMap<String, ConnectionConfig>,
}

/// SQLite connection configuration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConnectionConfig {
    /// Database file path, or `:memory:`.
    pub database: Option<String>,

    /// Create the database file when it does not exist.
    #[serde(default = "default_create_if_missing")]
    pub create_if_missing: bool,

    /// How long to wait on a locked database before failing.
    pub busy_timeout_secs: Option<u64>,
}

fn default_create_if_missing() -> bool {
    true
}

impl Default for ConnectionConfig {
    fn default() -> Self {
        Self {
            database: None,
            create_if_missing: default_create_if_missing(),
            busy_timeout_secs: None,
        }
    }
}

impl ConnectionConfig {
    /// Creates a config for the database file at `path`.
    pub fn for_path(path: impl AsRef<Path>) -> Self {
        Self {
            database: Some(path.as_ref().to_string_lossy().into_owned()),
            ..Self::default()
        }
    }

    /// Creates a config for a private in-memory database.
    pub fn in_memory() -> Self {
        Self {
            database: Some(MEMORY_DATABASE.to_string()),
            ..Self::default()
        }
    }

    /// Creates a new connection config from a connection string.
    ///
    /// Formats: `sqlite://path/to/db?mode=rwc`, `sqlite:path`, `sqlite::memory:`
    pub fn from_connection_string(conn_str: &str) -> Result<Self> {
        let (scheme, rest) = conn_str
            .split_once(':')
            .ok_or_else(|| RowkitError::config(format!("Invalid connection string: {conn_str}")))?;

        if DatabaseBackend::parse(scheme).is_none() {
            return Err(RowkitError::config(format!(
                "Invalid scheme '{scheme}'. Expected '{}'",
                DatabaseBackend::Sqlite.url_scheme()
            )));
        }

        let rest = rest.strip_prefix("//").unwrap_or(rest);
        let (path, query) = rest.split_once('?').unwrap_or((rest, ""));
        if path.is_empty() {
            return Err(RowkitError::config("Database path is required"));
        }

        let mut config = Self {
            database: Some(path.to_string()),
            ..Self::default()
        };

        for (key, value) in url::form_urlencoded::parse(query.as_bytes()) {
            match key.as_ref() {
                "mode" => match value.as_ref() {
                    "rwc" => config.create_if_missing = true,
                    "rw" | "ro" => config.create_if_missing = false,
                    "memory" => config.database = Some(MEMORY_DATABASE.to_string()),
                    other => {
                        return Err(RowkitError::config(format!("Invalid mode '{other}'")));
                    }
                },
                "busy_timeout" => {
                    let secs = value.parse().map_err(|_| {
                        RowkitError::config(format!("Invalid busy_timeout '{value}'"))
                    })?;
                    config.busy_timeout_secs = Some(secs);
                }
                _ => {}
            }
        }

        Ok(config)
    }

    /// Converts the connection config to a connection string.
    pub fn to_connection_string(&self) -> Result<String> {
        let database = self
            .database
            .as_deref()
            .ok_or_else(|| RowkitError::config("Database path is required"))?;

        if database == MEMORY_DATABASE {
            return Ok(format!("{}::memory:", DatabaseBackend::Sqlite.url_scheme()));
        }

        let mut query = url::form_urlencoded::Serializer::new(String::new());
        query.append_pair("mode", if self.create_if_missing { "rwc" } else { "rw" });
        if let Some(secs) = self.busy_timeout_secs {
            query.append_pair("busy_timeout", &secs.to_string());
        }

        Ok(format!(
            "{}://{}?{}",
            DatabaseBackend::Sqlite.url_scheme(),
            database,
            query.finish()
        ))
    }

    /// Returns true when this config names an in-memory database.
    pub fn is_memory(&self) -> bool {
        self.database.as_deref() == Some(MEMORY_DATABASE)
    }

    /// Merges another config into this one, with the other taking precedence.
    pub fn merge(&mut self, other: &ConnectionConfig) {
        if other.database.is_some() {
            self.database = other.database.clone();
        }
        if other.create_if_missing != default_create_if_missing() {
            self.create_if_missing = other.create_if_missing;
        }
        if other.busy_timeout_secs.is_some() {
            self.busy_timeout_secs = other.busy_timeout_secs;
        }
    }

    /// Applies `DATABASE_URL` as a default for an unset database.
    pub fn apply_env_defaults(&mut self) {
        self.apply_url_default(std::env::var("DATABASE_URL").ok().as_deref());
    }

    fn apply_url_default(&mut self, url: Option<&str>) {
        if self.database.is_some() {
            return;
        }
        if let Some(parsed) = url.and_then(|u| Self::from_connection_string(u).ok()) {
            let mut base = parsed;
            base.merge(self);
            *self = base;
        }
    }

    /// Builds sqlx connect options for this config.
    pub fn connect_options(&self) -> Result<SqliteConnectOptions> {
        let database = self
            .database
            .as_deref()
            .ok_or_else(|| RowkitError::config("Database path is required"))?;

        let mut options = if database == MEMORY_DATABASE {
            SqliteConnectOptions::from_str("sqlite::memory:")?
        } else {
            SqliteConnectOptions::new()
                .filename(database)
                .create_if_missing(self.create_if_missing)
        };

        if let Some(secs) = self.busy_timeout_secs {
            options = options.busy_timeout(Duration::from_secs(secs));
        }

        Ok(options)
    }

    /// Returns a display-safe string for logs and output.
    pub fn display_string(&self) -> String {
        let database = self.database.as_deref().unwrap_or("unknown");
        format!("{} ({})", database, DatabaseBackend::Sqlite.as_str())
    }
}

impl Config {
    /// Returns the default config file path for the current platform.
    pub fn default_path() -> PathBuf {
        dirs::config_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join("db-rowkit")
            .join("config.toml")
    }

    /// Loads configuration from a TOML file.
    pub fn load_from_file(path: &Path) -> Result<Self> {
        if !path.exists() {
            return Ok(Self::default());
        }

        let content = std::fs::read_to_string(path)
            .map_err(|e| RowkitError::config(format!("Failed to read config file: {e}")))?;

        Self::parse_toml(&content, path)
    }

    /// Parses configuration from a TOML string.
    fn parse_toml(content: &str, path: &Path) -> Result<Self> {
        toml::from_str(content).map_err(|e| {
            RowkitError::config(format!(
                "Configuration error in {}:\n  {}",
                path.display(),
                e
            ))
        })
    }

    /// Gets a named connection, or the default connection if name is None.
    pub fn get_connection(&self, name: Option<&str>) -> Option<&ConnectionConfig> {
        let key = name.unwrap_or("default");
        self.connections.get(key)
    }

    /// Resolves the connection to use.
    ///
    /// An explicit connection string wins, then the named connection, then the
    /// default connection, then `DATABASE_URL`.
    pub fn resolve_connection(
        &self,
        conn_str: Option<&str>,
        name: Option<&str>,
    ) -> Result<ConnectionConfig> {
        let mut resolved = match (conn_str, name) {
            (Some(conn_str), _) => ConnectionConfig::from_connection_string(conn_str)?,
            (None, Some(name)) => self
                .get_connection(Some(name))
                .cloned()
                .ok_or_else(|| RowkitError::config(format!("Unknown connection '{name}'")))?,
            (None, None) => self.get_connection(None).cloned().unwrap_or_default(),
        };

        resolved.apply_env_defaults();

        if resolved.database.is_none() {
            return Err(RowkitError::config(
                "No database configured. Pass a connection string, define \
                 [connections.default], or set DATABASE_URL",
            ));
        }
        Ok(resolved)
    }
}
