//! Configuration management for the SQL agent.
//!
//! Configuration can be set via environment variables:
//! - `OPENAI_API_KEY` - Required. API key for the model backend.
//! - `OPENAI_MODEL` - Optional. Model identifier. Defaults to `gpt-3.5-turbo`.
//! - `OPENAI_URL` - Optional. Base URL of an OpenAI-compatible endpoint.
//! - `DATABASE_PATH` - Required. Path to the SQLite database (`:memory:` allowed).
//! - `MAX_STEPS` - Optional. Maximum reasoning-loop steps per query. Defaults to `5`.
//! - `MAX_ROWS` - Optional. Row cap for query results fed to the model. Defaults to `5`.
//! - `INCLUDE_TABLES` - Optional. Comma-separated allow-list of table names.
//! - `QUERY_TIMEOUT_SECS` - Optional. Per-statement execution timeout. Defaults to `30`.

use std::collections::BTreeSet;
use std::path::PathBuf;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Missing required environment variable: {0}")]
    MissingEnvVar(String),

    #[error("Invalid value for {0}: {1}")]
    InvalidValue(String, String),
}

/// Agent configuration.
#[derive(Debug, Clone)]
pub struct Config {
    /// API key for the model backend
    pub api_key: String,

    /// Model identifier sent with every completion request
    pub model: String,

    /// Base URL of the chat-completions endpoint, if overridden
    pub api_base_url: Option<String>,

    /// Path to the SQLite database file
    pub database_path: PathBuf,

    /// Maximum reasoning-loop steps per query
    pub max_steps: usize,

    /// Maximum rows any tool may return in one observation
    pub max_rows: usize,

    /// Optional allow-list restricting which tables the agent may see.
    /// `None` means all tables; `Some` with an empty set means none.
    pub include_tables: Option<BTreeSet<String>>,

    /// Timeout for a single SQL statement execution
    pub query_timeout_secs: u64,
}

impl Config {
    /// Load configuration from environment variables.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError::MissingEnvVar` if `OPENAI_API_KEY` or
    /// `DATABASE_PATH` is not set.
    pub fn from_env() -> Result<Self, ConfigError> {
        let api_key = std::env::var("OPENAI_API_KEY")
            .map_err(|_| ConfigError::MissingEnvVar("OPENAI_API_KEY".to_string()))?;

        let model =
            std::env::var("OPENAI_MODEL").unwrap_or_else(|_| "gpt-3.5-turbo".to_string());

        let api_base_url = std::env::var("OPENAI_URL").ok();

        let database_path = std::env::var("DATABASE_PATH")
            .map(PathBuf::from)
            .map_err(|_| ConfigError::MissingEnvVar("DATABASE_PATH".to_string()))?;

        let max_steps = parse_env("MAX_STEPS", 5)?;
        let max_rows = parse_env("MAX_ROWS", 5)?;
        let query_timeout_secs = parse_env("QUERY_TIMEOUT_SECS", 30)?;

        let include_tables = std::env::var("INCLUDE_TABLES")
            .ok()
            .map(|v| parse_include_tables(&v));

        Ok(Self {
            api_key,
            model,
            api_base_url,
            database_path,
            max_steps,
            max_rows,
            include_tables,
            query_timeout_secs,
        })
    }
}

/// Parse a comma-separated table allow-list, dropping empty entries.
///
/// An allow-list that ends up empty is preserved as an empty set: the
/// operator asked for a restriction, so no tables are visible.
pub fn parse_include_tables(raw: &str) -> BTreeSet<String> {
    raw.split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(str::to_string)
        .collect()
}

fn parse_env<T>(name: &str, default: T) -> Result<T, ConfigError>
where
    T: std::str::FromStr,
    T::Err: std::fmt::Display,
{
    match std::env::var(name) {
        Ok(v) => v
            .parse()
            .map_err(|e| ConfigError::InvalidValue(name.to_string(), format!("{}", e))),
        Err(_) => Ok(default),
    }
}
