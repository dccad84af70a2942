//! Error types for the MCP server.
//!
//! Uses `thiserror` for ergonomic error definitions with automatic `From` conversions.
//! [`QueryError`] is the closed taxonomy surfaced to callers of the query tools; every
//! variant maps to exactly one [`ErrorKind`].

use serde::{Deserialize, Serialize};
use std::borrow::Cow;
use std::fmt;
use thiserror::Error;

/// Main error type for the MCP server.
#[derive(Debug, Error)]
pub enum McpError {
    #[error("Protocol error: {0}")]
    Protocol(#[from] ProtocolError),

    #[error("Query error: {0}")]
    Query(#[from] QueryError),

    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("Tool error: {0}")]
    Tool(#[from] ToolError),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Internal error: {message}")]
    Internal { message: Cow<'static, str> },
}

/// JSON-RPC 2.0 and MCP protocol errors.
#[derive(Debug, Error)]
pub enum ProtocolError {
    #[error("Parse error: invalid JSON")]
    ParseError,

    #[error("Invalid request: {0}")]
    InvalidRequest(Cow<'static, str>),

    #[error("Method not found: {0}")]
    MethodNotFound(String),

    #[error("Invalid params: {0}")]
    InvalidParams(Cow<'static, str>),

    #[error("Internal error: {0}")]
    InternalError(Cow<'static, str>),
}

impl ProtocolError {
    /// Returns the JSON-RPC 2.0 error code.
    pub fn code(&self) -> i32 {
        match self {
            Self::ParseError => -32700,
            Self::InvalidRequest(_) => -32600,
            Self::MethodNotFound(_) => -32601,
            Self::InvalidParams(_) => -32602,
            Self::InternalError(_) => -32603,
        }
    }
}

/// Reasons the SQL guard refuses a statement.
///
/// All of these are detected lexically, before any connection is opened.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum GuardViolation {
    #[error("SQL text is required and cannot be empty or whitespace")]
    EmptyStatement,

    #[error("Multiple statements not allowed")]
    MultipleStatements,

    #[error("Query must begin with SELECT (or WITH ... SELECT)")]
    MustBeginWithSelect,

    #[error("Forbidden operation: `{0}`")]
    ForbiddenOperation(String),

    #[error("Unterminated {0} in SQL text")]
    UnterminatedLiteral(&'static str),
}

impl GuardViolation {
    /// True when the input was malformed as an argument rather than unsafe as SQL.
    pub fn is_argument_error(&self) -> bool {
        matches!(self, Self::EmptyStatement)
    }
}

/// Stable, serializable name of a [`QueryError`] variant.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ErrorKind {
    ValidationError,
    ProfileNotFoundError,
    UnsupportedParameterError,
    ConnectivityError,
    TimeoutError,
    EngineError,
}

impl ErrorKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::ValidationError => "ValidationError",
            Self::ProfileNotFoundError => "ProfileNotFoundError",
            Self::UnsupportedParameterError => "UnsupportedParameterError",
            Self::ConnectivityError => "ConnectivityError",
            Self::TimeoutError => "TimeoutError",
            Self::EngineError => "EngineError",
        }
    }
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Failures of a bounded query call.
///
/// Validation, profile and parameter failures are raised before any I/O. The remaining
/// variants are raised only after a connection attempt and are never retried internally.
#[derive(Debug, Error)]
pub enum QueryError {
    #[error("{0}")]
    Validation(#[from] GuardViolation),

    #[error("Profile '{requested}' not found. Configured profiles: {}", available.join(", "))]
    ProfileNotFound {
        requested: String,
        available: Vec<String>,
    },

    #[error("Unsupported value for parameter '{name}': {reason}")]
    UnsupportedParameter {
        name: String,
        reason: Cow<'static, str>,
    },

    #[error("Connection failed: {0}")]
    Connectivity(String),

    #[error("Command timed out after {0} seconds")]
    Timeout(u64),

    /// Message as reported by the engine, never rewritten.
    #[error("{0}")]
    Engine(String),
}

impl QueryError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::Validation(_) => ErrorKind::ValidationError,
            Self::ProfileNotFound { .. } => ErrorKind::ProfileNotFoundError,
            Self::UnsupportedParameter { .. } => ErrorKind::UnsupportedParameterError,
            Self::Connectivity(_) => ErrorKind::ConnectivityError,
            Self::Timeout(_) => ErrorKind::TimeoutError,
            Self::Engine(_) => ErrorKind::EngineError,
        }
    }

    pub fn unsupported_parameter(
        name: impl Into<String>,
        reason: impl Into<Cow<'static, str>>,
    ) -> Self {
        Self::UnsupportedParameter {
            name: name.into(),
            reason: reason.into(),
        }
    }

    /// Wire shape of this error: `{kind, message}`.
    pub fn to_response(&self) -> ErrorResponse {
        ErrorResponse {
            kind: self.kind(),
            message: self.to_string(),
        }
    }
}

/// Error payload returned to tool callers.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ErrorResponse {
    pub kind: ErrorKind,
    pub message: String,
}

/// Configuration errors.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Missing required field: {0}")]
    MissingField(Cow<'static, str>),

    #[error("Invalid value for {field}: {message}")]
    InvalidValue {
        field: Cow<'static, str>,
        message: Cow<'static, str>,
    },

    #[error("Invalid connection string for profile '{profile}': {message}")]
    InvalidConnectionString { profile: String, message: String },

    #[error("Duplicate profile name (names are case-insensitive): {0}")]
    DuplicateProfile(String),

    #[error("Default profile '{0}' is not configured")]
    MissingDefaultProfile(String),

    #[error("Failed to read configuration file {path}: {message}")]
    Unreadable { path: String, message: String },
}

/// Tool execution errors.
#[derive(Debug, Error)]
pub enum ToolError {
    #[error("Tool not found: {0}")]
    NotFound(String),

    #[error("Invalid arguments: {0}")]
    InvalidArguments(String),
}

/// Result type alias for McpError.
pub type Result<T> = std::result::Result<T, McpError>;

/// Result type alias for QueryError.
pub type DbResult<T> = std::result::Result<T, QueryError>;

/// Result type alias for ProtocolError.
pub type ProtocolResult<T> = std::result::Result<T, ProtocolError>;

/// Result type alias for GuardViolation.
pub type GuardResult<T> = std::result::Result<T, GuardViolation>;

/// Result type alias for ConfigError.
pub type ConfigResult<T> = std::result::Result<T, ConfigError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_protocol_error_codes() {
        assert_eq!(ProtocolError::ParseError.code(), -32700);
        assert_eq!(ProtocolError::InvalidRequest("test".into()).code(), -32600);
        assert_eq!(ProtocolError::MethodNotFound("test".into()).code(), -32601);
        assert_eq!(ProtocolError::InvalidParams("test".into()).code(), -32602);
        assert_eq!(ProtocolError::InternalError("test".into()).code(), -32603);
    }

    #[test]
    fn test_query_error_kinds() {
        let cases = [
            (
                QueryError::from(GuardViolation::MultipleStatements),
                ErrorKind::ValidationError,
            ),
            (
                QueryError::ProfileNotFound {
                    requested: "x".into(),
                    available: vec!["default".into()],
                },
                ErrorKind::ProfileNotFoundError,
            ),
            (
                QueryError::unsupported_parameter("p", "objects are not bindable"),
                ErrorKind::UnsupportedParameterError,
            ),
            (
                QueryError::Connectivity("refused".into()),
                ErrorKind::ConnectivityError,
            ),
            (QueryError::Timeout(30), ErrorKind::TimeoutError),
            (
                QueryError::Engine("Invalid column name 'x'.".into()),
                ErrorKind::EngineError,
            ),
        ];

        for (error, kind) in cases {
            assert_eq!(error.kind(), kind);
        }
    }

    #[test]
    fn test_engine_message_is_verbatim() {
        let error = QueryError::Engine("Invalid object name 'dbo.Nope'.".into());
        assert_eq!(error.to_string(), "Invalid object name 'dbo.Nope'.");
    }

    #[test]
    fn test_profile_not_found_lists_names() {
        let error = QueryError::ProfileNotFound {
            requested: "missing".into(),
            available: vec!["default".into(), "warehouse".into()],
        };
        let message = error.to_string();
        assert!(message.contains("missing"));
        assert!(message.contains("default"));
        assert!(message.contains("warehouse"));
    }

    #[test]
    fn test_error_response_serialization() {
        let response = QueryError::Timeout(5).to_response();
        let json = serde_json::to_value(&response).unwrap();
        assert_eq!(json["kind"], "TimeoutError");
        assert_eq!(json["message"], "Command timed out after 5 seconds");
    }

    #[test]
    fn test_argument_error_is_distinct() {
        assert!(GuardViolation::EmptyStatement.is_argument_error());
        assert!(!GuardViolation::MultipleStatements.is_argument_error());
        assert!(!GuardViolation::ForbiddenOperation("DROP".into()).is_argument_error());
    }

    #[test]
    fn test_error_conversion() {
        let query_error = QueryError::Connectivity("test".into());
        let mcp_error: McpError = query_error.into();
        assert!(matches!(mcp_error, McpError::Query(_)));
    }
}
