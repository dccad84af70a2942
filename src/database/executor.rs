//! Bounded query execution.
//!
//! Every call resolves a profile, passes the SQL guard and parameter normalization before
//! any I/O, then runs on its own connection under the profile's command deadline and row
//! limit. The connection lives inside the call's future, so it is released on success,
//! error, timeout and cancellation alike.

use crate::config::{Profile, ProfileTable};
use crate::database::engine::{Connector, EngineConnection, PreparedStatement};
use crate::database::params::normalize_parameters;
use crate::database::result::QueryResult;
use crate::error::{DbResult, QueryError};
use crate::security::SqlGuard;
use serde::Deserialize;
use serde_json::{Map, Value};
use std::collections::HashSet;
use std::sync::Arc;
use std::time::Instant;
use tokio::time::timeout;
use tracing::{debug, info, instrument, warn};

const SQL_LOG_PREVIEW_CHARS: usize = 200;
const INITIAL_ROW_CAPACITY: usize = 256;

/// One query call.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct ExecuteRequest {
    #[serde(default)]
    pub sql: Option<String>,
    #[serde(default)]
    pub profile: Option<String>,
    #[serde(default)]
    pub catalog: Option<String>,
    #[serde(default)]
    pub parameters: Option<Map<String, Value>>,
    #[serde(default, alias = "maxRows")]
    pub max_rows: Option<i64>,
}

impl ExecuteRequest {
    pub fn new(sql: impl Into<String>) -> Self {
        Self {
            sql: Some(sql.into()),
            ..Default::default()
        }
    }

    pub fn profile(mut self, profile: impl Into<String>) -> Self {
        self.profile = Some(profile.into());
        self
    }

    pub fn catalog(mut self, catalog: impl Into<String>) -> Self {
        self.catalog = Some(catalog.into());
        self
    }

    pub fn parameter(mut self, name: impl Into<String>, value: Value) -> Self {
        self.parameters
            .get_or_insert_with(Map::new)
            .insert(name.into(), value);
        self
    }

    pub fn max_rows(mut self, max_rows: i64) -> Self {
        self.max_rows = Some(max_rows);
        self
    }
}

/// Runs guarded, bounded queries against configured profiles.
pub struct BoundedExecutor {
    profiles: Arc<ProfileTable>,
    connector: Arc<dyn Connector>,
    guard: SqlGuard,
}

impl BoundedExecutor {
    pub fn new(profiles: Arc<ProfileTable>, connector: Arc<dyn Connector>) -> Self {
        Self {
            profiles,
            connector,
            guard: SqlGuard::new(),
        }
    }

    pub fn profiles(&self) -> &Arc<ProfileTable> {
        &self.profiles
    }

    /// Execute one request.
    ///
    /// # Errors
    ///
    /// Profile, validation and parameter errors are returned before a connection is opened.
    /// Connectivity, timeout and engine errors are returned as they happen and never retried.
    #[instrument(
        skip(self, request),
        fields(
            engine = self.connector.name(),
            profile = request.profile.as_deref().unwrap_or_default(),
        )
    )]
    pub async fn execute(&self, request: &ExecuteRequest) -> DbResult<QueryResult> {
        let profile = self.profiles.resolve(request.profile.as_deref())?;

        self.guard.validate(request.sql.as_deref())?;
        let sql = request.sql.as_deref().unwrap_or_default();

        let parameters = normalize_parameters(request.parameters.as_ref())?;
        let statement = PreparedStatement::new(sql, parameters);

        let limits = profile.limits();
        let row_limit = limits.row_limit(request.max_rows);
        let catalog = request
            .catalog
            .as_deref()
            .map(str::trim)
            .filter(|c| !c.is_empty());

        debug!(
            profile = profile.name(),
            row_limit,
            parameters = statement.parameters().len(),
            sql = %preview(sql),
            "Executing bounded query"
        );

        let started = Instant::now();
        let connection = self.connect(profile).await?;

        let result = timeout(
            limits.command_timeout(),
            Self::run(connection, catalog, &statement, row_limit),
        )
        .await
        .map_err(|_| {
            warn!(
                profile = profile.name(),
                timeout_seconds = limits.command_timeout_seconds(),
                "Query exceeded command timeout"
            );
            QueryError::Timeout(u64::from(limits.command_timeout_seconds()))
        })??;

        info!(
            profile = profile.name(),
            rows = result.row_count(),
            truncated = result.truncated,
            row_limit,
            elapsed_ms = started.elapsed().as_millis() as u64,
            "Query completed"
        );

        Ok(result)
    }

    async fn connect(&self, profile: &Profile) -> DbResult<Box<dyn EngineConnection>> {
        let descriptor = profile.connection();
        let Some(limit) = descriptor.connect_timeout else {
            return self.connector.connect(descriptor).await;
        };

        timeout(limit, self.connector.connect(descriptor))
            .await
            .map_err(|_| {
                QueryError::Connectivity(format!(
                    "Timed out after {} seconds connecting to {}",
                    limit.as_secs(),
                    descriptor.display_target()
                ))
            })?
    }

    /// Owns the connection for the duration of one statement.
    async fn run(
        mut connection: Box<dyn EngineConnection>,
        catalog: Option<&str>,
        statement: &PreparedStatement,
        row_limit: u32,
    ) -> DbResult<QueryResult> {
        if let Some(catalog) = catalog {
            debug!(catalog, "Switching catalog");
            connection.change_catalog(catalog).await?;
        }

        let mut stream = connection.execute(statement).await?;
        let columns = unique_column_names(stream.columns());

        let limit = row_limit as usize;
        let mut rows = Vec::with_capacity(limit.min(INITIAL_ROW_CAPACITY));
        let mut truncated = false;

        while let Some(row) = stream.next_row().await? {
            if rows.len() == limit {
                truncated = true;
                break;
            }
            rows.push(row);
        }

        Ok(QueryResult {
            columns,
            rows,
            truncated,
            row_limit,
        })
    }
}

/// Make projection names unique and non-blank.
///
/// Blank names become `Column{n}` (1-based ordinal); repeats, compared case-insensitively,
/// get `_2`, `_3`, ... in projection order.
pub fn unique_column_names(names: &[String]) -> Vec<String> {
    let mut seen = HashSet::with_capacity(names.len());
    let mut unique = Vec::with_capacity(names.len());

    for (index, name) in names.iter().enumerate() {
        let base = match name.trim() {
            "" => format!("Column{}", index + 1),
            _ => name.clone(),
        };

        let mut candidate = base.clone();
        let mut suffix = 2;
        while !seen.insert(candidate.to_lowercase()) {
            candidate = format!("{}_{}", base, suffix);
            suffix += 1;
        }

        unique.push(candidate);
    }

    unique
}

fn preview(sql: &str) -> String {
    match sql.char_indices().nth(SQL_LOG_PREVIEW_CHARS) {
        Some((cut, _)) => format!("{}...", &sql[..cut]),
        None => sql.to_string(),
    }
}
