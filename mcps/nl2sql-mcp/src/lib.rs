//! NL2SQL MCP Library
//!
//! Answers natural-language questions against a SQLite, MySQL or PostgreSQL
//! database. The schema is described to an LLM in M-Schema form, the
//! generated SQL is executed, and failing statements are sent back to the
//! model for repair a bounded number of times.
//!
//! # Usage as Library
//!
//! ```rust,ignore
//! use clap::Parser;
//! use nl2sql_mcp::{AppConfig, Cli, Nl2SqlMcpServer};
//!
//! let config = AppConfig::from_cli(Cli::parse())?;
//! let server = Nl2SqlMcpServer::new(config)?;
//! let text = server.answer_question("How many customers signed up in May?").await;
//! ```

pub mod config;
pub mod db;
pub mod error;
pub mod format;
pub mod llm;
pub mod schema;
pub mod server;
pub mod text2sql;

// Re-export main server type
pub use server::Nl2SqlMcpServer;

pub use config::{AppConfig, Cli};
pub use error::{ConfigError, Error, Result};
