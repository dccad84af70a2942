//! Engine seam.
//!
//! The executor talks to a database only through these traits: a [`Connector`] opens one
//! fresh [`EngineConnection`] per call, and the connection yields a [`RowStream`] that is
//! pulled one row at a time. Dropping any of them releases the underlying resources.

use crate::database::connection_string::ConnectionDescriptor;
use crate::database::params::BoundParameter;
use crate::database::result::CellValue;
use crate::error::DbResult;
use async_trait::async_trait;

/// User SQL plus its normalized parameters, ready to send.
#[derive(Debug, Clone, PartialEq)]
pub struct PreparedStatement {
    sql: String,
    parameters: Vec<BoundParameter>,
}

impl PreparedStatement {
    pub fn new(sql: impl Into<String>, parameters: Vec<BoundParameter>) -> Self {
        Self {
            sql: sql.into(),
            parameters,
        }
    }

    pub fn sql(&self) -> &str {
        &self.sql
    }

    pub fn parameters(&self) -> &[BoundParameter] {
        &self.parameters
    }
}

/// Opens connections for a profile's descriptor.
#[async_trait]
pub trait Connector: Send + Sync {
    /// Returns the engine name (e.g., "mssql").
    fn name(&self) -> &'static str;

    /// Open a new, unpooled connection.
    ///
    /// # Errors
    ///
    /// Returns [`QueryError::Connectivity`](crate::error::QueryError::Connectivity) when the
    /// engine cannot be reached or refuses the login.
    async fn connect(&self, descriptor: &ConnectionDescriptor)
    -> DbResult<Box<dyn EngineConnection>>;
}

/// One open connection, owned by a single call.
#[async_trait]
pub trait EngineConnection: Send {
    /// Switch the active database for the rest of this connection.
    async fn change_catalog(&mut self, catalog: &str) -> DbResult<()>;

    /// Send the statement and return a stream positioned before the first row.
    async fn execute<'a>(
        &'a mut self,
        statement: &'a PreparedStatement,
    ) -> DbResult<Box<dyn RowStream + 'a>>;
}

/// Rows of the first result set.
#[async_trait]
pub trait RowStream: Send {
    /// Column names in projection order, as reported by the engine.
    fn columns(&self) -> &[String];

    /// Next row, or `None` once the result set is exhausted.
    async fn next_row(&mut self) -> DbResult<Option<Vec<CellValue>>>;
}
