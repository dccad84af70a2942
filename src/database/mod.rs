//! Database layer.
//!
//! The [`BoundedExecutor`] is engine-agnostic and reaches the database only through the
//! [`Connector`] seam.
//!
//! # Feature Flags
//!
//! - `mssql` - SQL Server connector built on `tiberius` (enabled by default)

pub mod connection_string;
pub mod engine;
pub mod executor;
#[cfg(feature = "mssql")]
pub mod mssql;
pub mod params;
pub mod result;

pub use connection_string::{ConnectionDescriptor, ConnectionStringParser};
pub use engine::{Connector, EngineConnection, PreparedStatement, RowStream};
pub use executor::{BoundedExecutor, ExecuteRequest};
#[cfg(feature = "mssql")]
pub use mssql::MssqlConnector;
pub use params::{BoundParameter, BoundValue, normalize_parameters};
pub use result::{CellValue, QueryResult};
