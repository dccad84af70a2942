//! MCP server for bounded, read-only SQL Server queries.
//!
//! Callers submit ad hoc SQL against named connection profiles. Every statement passes a
//! lexical read-only guard, named parameters are normalized before binding, and results are
//! capped by per-profile row and time limits under non-overridable hard ceilings.
//!
//! # Example
//!
//! ```no_run
//! use mssql_query_mcp::{
//!     config::ServerConfig,
//!     database::MssqlConnector,
//!     protocol::McpServerBuilder,
//!     server::{McpHandler, ServerStateBuilder},
//! };
//! use std::sync::Arc;
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     // Profiles from MSSQL_MCP_CONFIG plus the legacy MSSQL_* variables
//!     let config = ServerConfig::from_env()?;
//!
//!     let state = Arc::new(
//!         ServerStateBuilder::new()
//!             .config(config)
//!             .connector(Arc::new(MssqlConnector::new()))
//!             .build()?,
//!     );
//!
//!     let server = McpServerBuilder::new()
//!         .handler(McpHandler::new(state))
//!         .build()?;
//!
//!     server.run().await?;
//!     Ok(())
//! }
//! ```

pub mod config;
pub mod database;
pub mod error;
pub mod protocol;
pub mod security;
pub mod server;
pub mod tools;

pub use config::{ExecutionContextProvider, ProfileTable, ServerConfig};
pub use database::{BoundedExecutor, ExecuteRequest, QueryResult};
pub use error::{ErrorKind, McpError, QueryError, Result};
pub use protocol::{McpServer, McpServerBuilder};
pub use security::SqlGuard;
pub use server::{McpHandler, ServerState, ServerStateBuilder};
