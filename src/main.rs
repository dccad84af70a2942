//! MCP server binary entry point.

use anyhow::{Context, Result};
use mssql_query_mcp::{
    config::ServerConfig,
    database::MssqlConnector,
    protocol::McpServerBuilder,
    server::{McpHandler, ServerStateBuilder},
};
use std::sync::Arc;
use tracing::info;
use tracing_subscriber::{EnvFilter, fmt};

#[tokio::main]
async fn main() -> Result<()> {
    init_tracing();

    info!(
        "Starting {} v{}",
        env!("CARGO_PKG_NAME"),
        env!("CARGO_PKG_VERSION")
    );

    let config = ServerConfig::from_env().context("Failed to load configuration")?;

    let state = Arc::new(
        ServerStateBuilder::new()
            .config(config)
            .connector(Arc::new(MssqlConnector::new()))
            .build()
            .context("Invalid profile configuration")?,
    );

    info!(
        profiles = state.profiles.len(),
        tools = state.tools.len(),
        "Server state initialized"
    );

    let handler = McpHandler::new(state);
    let server = McpServerBuilder::new()
        .handler(handler)
        .name(env!("CARGO_PKG_NAME"))
        .version(env!("CARGO_PKG_VERSION"))
        .build()?;

    info!("MCP server ready, waiting for requests...");

    server.run().await?;

    info!("Server shutdown complete");
    Ok(())
}

fn init_tracing() {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("mssql_query_mcp=info,warn"));

    // JSON to stderr; stdout carries the protocol.
    fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(true)
        .with_thread_ids(false)
        .with_file(false)
        .with_line_number(false)
        .json()
        .init();
}
