//! Read-only query execution tool.

use crate::database::{BoundedExecutor, ExecuteRequest};
use crate::error::Result;
use crate::protocol::{CallToolResult, Tool};
use crate::tools::registry::{ToolHandler, parse_arguments};
use async_trait::async_trait;
use serde_json::Value;
use std::sync::Arc;
use tracing::{instrument, warn};

pub struct ExecuteQueryTool {
    executor: Arc<BoundedExecutor>,
}

impl ExecuteQueryTool {
    pub fn new(executor: Arc<BoundedExecutor>) -> Self {
        Self { executor }
    }
}

#[async_trait]
impl ToolHandler for ExecuteQueryTool {
    fn definition(&self) -> Tool {
        Tool {
            name: "execute_query".into(),
            description: Some(
                "Execute a single read-only SELECT (or WITH ... SELECT) statement against a \
                configured SQL Server profile. Rows are capped by max_rows and the profile's \
                hard row limit; `truncated` reports whether more rows existed. \
                Pass values through `parameters` and reference them as @name in the SQL."
                    .into(),
            ),
            input_schema: serde_json::json!({
                "type": "object",
                "properties": {
                    "sql": {
                        "type": "string",
                        "description": "One SELECT statement. Data and schema changes are rejected."
                    },
                    "profile": {
                        "type": "string",
                        "description": "Profile name (case-insensitive). Defaults to the default profile."
                    },
                    "catalog": {
                        "type": "string",
                        "description": "Database to switch to before running the query."
                    },
                    "parameters": {
                        "type": "object",
                        "description": "Named parameters. Values must be null, boolean, number or string.",
                        "additionalProperties": {
                            "type": ["string", "number", "boolean", "null"]
                        }
                    },
                    "max_rows": {
                        "type": "integer",
                        "description": "Rows to return. Values above the profile's hard limit are clamped."
                    }
                },
                "required": ["sql"]
            }),
        }
    }

    #[instrument(skip(self, arguments), fields(tool = "execute_query"))]
    async fn execute(&self, arguments: Value) -> Result<CallToolResult> {
        let request: ExecuteRequest = parse_arguments(arguments)?;

        match self.executor.execute(&request).await {
            Ok(result) => Ok(CallToolResult::json(&result)),
            Err(e) => {
                warn!(kind = %e.kind(), "Query failed: {}", e);
                Ok(CallToolResult::json_error(&e.to_response()))
            }
        }
    }
}
