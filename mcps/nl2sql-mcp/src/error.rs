//! Error types for the NL2SQL server
//!
//! Failures inside a single tool call are converted to text at the MCP
//! boundary; only [`ConfigError`] is fatal, and only at startup.

use thiserror::Error;

use crate::llm::LlmError;

/// Missing or invalid startup configuration
#[derive(Error, Debug)]
pub enum ConfigError {
    /// A required value was not provided
    #[error("missing required configuration value {0}")]
    Missing(&'static str),

    /// A value was provided but cannot be used
    #[error("invalid configuration value {key}: {reason}")]
    Invalid {
        /// Environment variable / flag name
        key: &'static str,
        /// Why the value was rejected
        reason: String,
    },
}

/// Errors raised while serving a request
#[derive(Error, Debug)]
pub enum Error {
    #[error(transparent)]
    Config(#[from] ConfigError),

    /// The database could not be reached or the connection timed out
    #[error("Database connection failed: {0}")]
    Connect(String),

    /// Schema introspection failed for a table
    #[error("schema introspection failed for table '{table}': {source}")]
    Introspection {
        table: String,
        #[source]
        source: sqlx::Error,
    },

    /// The LLM endpoint failed; not retried
    #[error(transparent)]
    Llm(#[from] LlmError),

    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    /// A statement issued on the caller's behalf failed
    #[error("Database error: {0}")]
    Query(String),

    #[error("failed to persist schema: {0}")]
    Io(#[from] std::io::Error),

    #[error("failed to (de)serialize schema: {0}")]
    Json(#[from] serde_json::Error),
}

/// Result type alias for server operations
pub type Result<T> = std::result::Result<T, Error>;
