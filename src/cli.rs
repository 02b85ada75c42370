//! Command-line argument parsing for the rowkit demo.

use clap::Parser;
use db_rowkit::config::{Config, ConnectionConfig};
use db_rowkit::error::Result;
use db_rowkit::query::QueryOptions;
use std::path::PathBuf;
use std::time::Duration;

/// Output format for the run summary.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum OutputFormat {
    #[default]
    Text,
    Json,
}

/// Exercises the typed access layer against a SQLite database.
#[derive(Parser, Debug)]
#[command(name = "rowkit")]
#[command(version, about, long_about = None)]
pub struct Cli {
    /// SQLite connection string (e.g., sqlite://app.db?mode=rwc or sqlite::memory:)
    #[arg(value_name = "CONNECTION_STRING")]
    pub connection_string: Option<String>,

    /// Database file path
    #[arg(short = 'd', long, value_name = "PATH")]
    pub database: Option<PathBuf>,

    /// Use named connection from config
    #[arg(short = 'c', long, value_name = "NAME")]
    pub connection: Option<String>,

    /// Config file path
    #[arg(long, value_name = "PATH")]
    pub config: Option<PathBuf>,

    /// Number of demo rows to bulk insert
    #[arg(short = 'n', long, value_name = "N", default_value = "100")]
    pub rows: usize,

    /// Statement timeout in seconds (overrides config)
    #[arg(long, value_name = "SECS")]
    pub timeout: Option<u64>,

    /// Print the summary as JSON
    #[arg(long)]
    pub json: bool,
}

impl Cli {
    /// Parses command-line arguments.
    pub fn parse_args() -> Self {
        Self::parse()
    }

    /// Returns the explicit connection string, built from `--database` when given.
    pub fn connection_override(&self) -> Result<Option<String>> {
        if let Some(conn_str) = &self.connection_string {
            return Ok(Some(conn_str.clone()));
        }

        match &self.database {
            Some(path) => ConnectionConfig::for_path(path)
                .to_connection_string()
                .map(Some),
            None => Ok(None),
        }
    }

    /// Returns the config file path to use.
    ///
    /// Uses the --config argument if provided, otherwise the default path.
    pub fn config_path(&self) -> PathBuf {
        self.config.clone().unwrap_or_else(Config::default_path)
    }

    /// Returns the named connection to use, if specified.
    pub fn connection_name(&self) -> Option<&str> {
        self.connection.as_deref()
    }

    /// Applies `--timeout` on top of the configured query options.
    pub fn query_options(&self, config: &Config) -> QueryOptions {
        match self.timeout {
            Some(secs) => config.query.with_timeout(Duration::from_secs(secs)),
            None => config.query,
        }
    }

    pub fn output_format(&self) -> OutputFormat {
        if self.json {
            OutputFormat::Json
        } else {
            OutputFormat::Text
        }
    }
}
