//! NL2SQL MCP Server
//!
//! Natural-language questions answered with SQL over stdio.
//!
//! # Configuration
//! Database settings come from `DB_*` environment variables, the model from
//! `MODEL_NAME`, `MODEL_KEY` and `MODEL_URL`. Run with `--help` for the full list.

use clap::Parser;
use rmcp::{transport::stdio, ServiceExt};

use nl2sql_mcp::{AppConfig, Cli, Nl2SqlMcpServer};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    mcp_common::init_tracing("nl2sql_mcp")?;

    tracing::info!("Starting NL2SQL MCP Server");

    let config = AppConfig::from_cli(Cli::parse())?;
    tracing::info!("Database: {}", config.database.redacted_url());
    tracing::info!("Model: {} at {}", config.model.name, config.model.url);

    let server = Nl2SqlMcpServer::new(config)?;
    let service = server.serve(stdio()).await?;

    tracing::info!("Server running, waiting for requests...");
    service.waiting().await?;

    tracing::info!("Server shutting down");
    Ok(())
}
