//! SQL Server engine using `tiberius`.
//!
//! Connections are opened one per call through `bb8-tiberius`'s connection manager, which
//! also follows Azure gateway redirects. Nothing is pooled here.

use crate::database::connection_string::ConnectionDescriptor;
use crate::database::engine::{Connector, EngineConnection, PreparedStatement, RowStream};
use crate::database::params::BoundValue;
use crate::database::result::CellValue;
use crate::error::{DbResult, QueryError};
use async_trait::async_trait;
use bb8::ManageConnection;
use bb8_tiberius::ConnectionManager;
use chrono::{DateTime, NaiveDate, NaiveDateTime, NaiveTime, Utc};
use futures_util::TryStreamExt;
use rust_decimal::Decimal;
use std::borrow::Cow;
use tiberius::numeric::Numeric;
use tiberius::{AuthMethod, ColumnData, Config, EncryptionLevel, FromSql, QueryItem, QueryStream, ToSql};
use tracing::{debug, instrument};

type Client = <ConnectionManager as ManageConnection>::Connection;

/// Opens `tiberius` connections.
#[derive(Debug, Clone, Copy, Default)]
pub struct MssqlConnector;

impl MssqlConnector {
    pub fn new() -> Self {
        Self
    }
}

#[async_trait]
impl Connector for MssqlConnector {
    fn name(&self) -> &'static str {
        "mssql"
    }

    #[instrument(skip(self, descriptor), fields(target = %descriptor.display_target()))]
    async fn connect(
        &self,
        descriptor: &ConnectionDescriptor,
    ) -> DbResult<Box<dyn EngineConnection>> {
        let manager = ConnectionManager::new(tiberius_config(descriptor));

        let client = manager
            .connect()
            .await
            .map_err(|e| QueryError::Connectivity(e.to_string()))?;

        debug!("Connection opened");
        Ok(Box::new(MssqlConnection { client }))
    }
}

fn tiberius_config(descriptor: &ConnectionDescriptor) -> Config {
    let mut config = Config::new();
    config.host(&descriptor.host);
    config.port(descriptor.port);
    if let Some(database) = &descriptor.database {
        config.database(database);
    }
    config.authentication(AuthMethod::sql_server(
        &descriptor.username,
        &descriptor.password,
    ));
    config.application_name(env!("CARGO_PKG_NAME"));

    if descriptor.trust_server_certificate {
        config.trust_cert();
    }
    config.encryption(if descriptor.encrypt {
        EncryptionLevel::Required
    } else {
        EncryptionLevel::Off
    });

    config
}

struct MssqlConnection {
    client: Client,
}

#[async_trait]
impl EngineConnection for MssqlConnection {
    async fn change_catalog(&mut self, catalog: &str) -> DbResult<()> {
        // A plain batch, so the switch outlives the statement that made it.
        self.client
            .simple_query(use_catalog(catalog))
            .await
            .map_err(map_error)?
            .into_results()
            .await
            .map_err(map_error)?;
        Ok(())
    }

    async fn execute<'a>(
        &'a mut self,
        statement: &'a PreparedStatement,
    ) -> DbResult<Box<dyn RowStream + 'a>> {
        let batch = compose_batch(statement);
        let params: Vec<&dyn ToSql> = statement
            .parameters()
            .iter()
            .map(|p| p.value() as &dyn ToSql)
            .collect();

        let mut stream = self.client.query(batch, &params).await.map_err(map_error)?;

        let columns = stream
            .columns()
            .await
            .map_err(map_error)?
            .map(|columns| columns.iter().map(|c| c.name().to_string()).collect())
            .unwrap_or_default();

        Ok(Box::new(MssqlRowStream {
            stream,
            columns,
            finished: false,
        }))
    }
}

struct MssqlRowStream<'a> {
    stream: QueryStream<'a>,
    columns: Vec<String>,
    finished: bool,
}

#[async_trait]
impl RowStream for MssqlRowStream<'_> {
    fn columns(&self) -> &[String] {
        &self.columns
    }

    async fn next_row(&mut self) -> DbResult<Option<Vec<CellValue>>> {
        if self.finished {
            return Ok(None);
        }

        while let Some(item) = self.stream.try_next().await.map_err(map_error)? {
            match item {
                QueryItem::Metadata(meta) if meta.result_index() > 0 => break,
                QueryItem::Metadata(_) => continue,
                QueryItem::Row(row) if row.result_index() > 0 => break,
                QueryItem::Row(row) => {
                    let cells = row
                        .into_iter()
                        .map(decode_cell)
                        .collect::<DbResult<Vec<_>>>()?;
                    return Ok(Some(cells));
                }
            }
        }

        // Only the first result set is read.
        self.finished = true;
        Ok(None)
    }
}

impl ToSql for BoundValue {
    fn to_sql(&self) -> ColumnData<'_> {
        match self {
            Self::Null => ColumnData::String(None),
            Self::Bool(b) => ColumnData::Bit(Some(*b)),
            Self::Int32(i) => ColumnData::I32(Some(*i)),
            Self::Int64(i) => ColumnData::I64(Some(*i)),
            Self::Decimal(d) => ColumnData::Numeric(Some(Numeric::new_with_scale(
                d.mantissa(),
                d.scale() as u8,
            ))),
            Self::Float(f) => ColumnData::F64(Some(*f)),
            Self::String(s) => ColumnData::String(Some(Cow::Borrowed(s.as_str()))),
        }
    }
}

/// T-SQL type a parameter is declared with in the batch prelude.
fn declared_type(value: &BoundValue) -> Cow<'static, str> {
    match value {
        BoundValue::Null | BoundValue::String(_) => "NVARCHAR(MAX)".into(),
        BoundValue::Bool(_) => "BIT".into(),
        BoundValue::Int32(_) => "INT".into(),
        BoundValue::Int64(_) => "BIGINT".into(),
        BoundValue::Decimal(d) => format!("DECIMAL(38, {})", d.scale()).into(),
        BoundValue::Float(_) => "FLOAT".into(),
    }
}

/// Prefix the user's SQL with one `DECLARE @name TYPE = @Pn;` per parameter.
///
/// Names were checked to be plain identifiers during normalization.
fn compose_batch(statement: &PreparedStatement) -> String {
    let parameters = statement.parameters();
    if parameters.is_empty() {
        return statement.sql().to_string();
    }

    let mut batch = String::with_capacity(statement.sql().len() + parameters.len() * 48);
    for (index, parameter) in parameters.iter().enumerate() {
        batch.push_str(&format!(
            "DECLARE {} {} = @P{};\n",
            parameter.name(),
            declared_type(parameter.value()),
            index + 1
        ));
    }
    batch.push_str(statement.sql());
    batch
}

fn use_catalog(catalog: &str) -> String {
    format!("USE [{}]", catalog.replace(']', "]]"))
}

fn decode_cell(data: ColumnData<'static>) -> DbResult<CellValue> {
    let value = match data {
        ColumnData::U8(v) => v.map(|n| CellValue::Int(i64::from(n))),
        ColumnData::I16(v) => v.map(|n| CellValue::Int(i64::from(n))),
        ColumnData::I32(v) => v.map(|n| CellValue::Int(i64::from(n))),
        ColumnData::I64(v) => v.map(CellValue::Int),
        ColumnData::F32(v) => v.map(|n| CellValue::Float(f64::from(n))),
        ColumnData::F64(v) => v.map(CellValue::Float),
        ColumnData::Bit(v) => v.map(CellValue::Bool),
        ColumnData::String(v) => v.map(|s| CellValue::String(s.into_owned())),
        ColumnData::Guid(v) => v.map(|g| CellValue::String(g.to_string())),
        ColumnData::Binary(v) => v.map(|b| CellValue::Bytes(b.into_owned())),
        ColumnData::Numeric(v) => v.map(decode_numeric),
        ColumnData::Xml(v) => v.map(|x| CellValue::String(x.into_owned().into_string())),
        ref temporal => decode_temporal(temporal)?,
    };

    Ok(value.unwrap_or(CellValue::Null))
}

fn decode_numeric(n: Numeric) -> CellValue {
    match Decimal::try_from_i128_with_scale(n.value(), u32::from(n.scale())) {
        Ok(d) => CellValue::Decimal(d),
        Err(_) => CellValue::Float(n.value() as f64 / 10f64.powi(i32::from(n.scale()))),
    }
}

fn decode_temporal(data: &ColumnData<'static>) -> DbResult<Option<CellValue>> {
    if let Ok(value) = DateTime::<Utc>::from_sql(data) {
        return Ok(value.map(CellValue::DateTime));
    }
    if let Ok(value) = NaiveDateTime::from_sql(data) {
        return Ok(value.map(|dt| CellValue::DateTime(DateTime::from_naive_utc_and_offset(dt, Utc))));
    }
    if let Ok(value) = NaiveDate::from_sql(data) {
        return Ok(value.map(|d| CellValue::String(d.format("%Y-%m-%d").to_string())));
    }
    if let Ok(value) = NaiveTime::from_sql(data) {
        return Ok(value.map(|t| CellValue::String(t.format("%H:%M:%S%.f").to_string())));
    }

    Err(QueryError::Engine(format!(
        "Unsupported column type in result: {:?}",
        data
    )))
}

/// Server-reported errors keep their message; transport failures are connectivity.
fn map_error(error: tiberius::error::Error) -> QueryError {
    use tiberius::error::Error;

    match error {
        Error::Server(token) => QueryError::Engine(token.message().to_string()),
        Error::Io { .. } | Error::Tls(_) | Error::Routing { .. } | Error::Protocol(_) => {
            QueryError::Connectivity(error.to_string())
        }
        other => QueryError::Engine(other.to_string()),
    }
}
