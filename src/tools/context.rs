//! Execution context introspection tool.

use crate::config::ExecutionContextProvider;
use crate::error::Result;
use crate::protocol::{CallToolResult, Tool};
use crate::tools::registry::{ToolHandler, parse_arguments};
use async_trait::async_trait;
use serde::Deserialize;
use serde_json::Value;

#[derive(Debug, Default, Deserialize)]
pub struct GetExecutionContextArgs {
    #[serde(default)]
    pub profile: Option<String>,
}

pub struct GetExecutionContextTool {
    provider: ExecutionContextProvider,
}

impl GetExecutionContextTool {
    pub fn new(provider: ExecutionContextProvider) -> Self {
        Self { provider }
    }
}

#[async_trait]
impl ToolHandler for GetExecutionContextTool {
    fn definition(&self) -> Tool {
        Tool {
            name: "get_execution_context".into(),
            description: Some(
                "Report the row and time limits that apply to queries on a profile, \
                and which of them a call may override."
                    .into(),
            ),
            input_schema: serde_json::json!({
                "type": "object",
                "properties": {
                    "profile": {
                        "type": "string",
                        "description": "Profile name (case-insensitive). Defaults to the default profile."
                    }
                }
            }),
        }
    }

    async fn execute(&self, arguments: Value) -> Result<CallToolResult> {
        let args: GetExecutionContextArgs = parse_arguments(arguments)?;

        Ok(match self.provider.context(args.profile.as_deref()) {
            Ok(context) => CallToolResult::json(&context),
            Err(e) => CallToolResult::json_error(&e.to_response()),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{LegacyOverlay, ProfileTable, ProfilesConfig};
    use serde_json::json;
    use std::sync::Arc;

    fn tool() -> GetExecutionContextTool {
        let config = ProfilesConfig::from_toml_str(
            r#"
            [profiles.default]
            connection_string = "Server=a;User Id=sa"

            [profiles.Warehouse]
            connection_string = "Server=b;User Id=sa"
            description = "Reporting copy"
            default_max_rows = 25
            max_rows = 20000
            command_timeout_seconds = 60
            "#,
        )
        .unwrap();
        let table = ProfileTable::build(&config, &LegacyOverlay::default()).unwrap();
        GetExecutionContextTool::new(ExecutionContextProvider::new(Arc::new(table)))
    }

    fn payload(result: &CallToolResult) -> Value {
        serde_json::from_str(result.first_text().unwrap()).unwrap()
    }

    #[tokio::test]
    async fn test_default_profile_context() {
        let result = tool().execute(Value::Null).await.unwrap();
        let payload = payload(&result);

        assert_eq!(payload["profile"], "default");
        assert_eq!(payload["default_max_rows"]["value"], 100);
        assert_eq!(payload["default_max_rows"]["is_overridable"], true);
        assert_eq!(payload["hard_row_limit"]["value"], 5000);
        assert_eq!(payload["hard_row_limit"]["is_overridable"], false);
        assert_eq!(payload["command_timeout_seconds"]["value"], 30);
    }

    #[tokio::test]
    async fn test_named_profile_is_clamped() {
        let result = tool()
            .execute(json!({"profile": "WAREHOUSE"}))
            .await
            .unwrap();
        let payload = payload(&result);

        assert_eq!(payload["profile"], "Warehouse");
        assert_eq!(payload["description"], "Reporting copy");
        assert_eq!(payload["default_max_rows"]["value"], 25);
        assert_eq!(payload["hard_row_limit"]["value"], 10_000);
        assert_eq!(payload["command_timeout_seconds"]["value"], 60);
    }

    #[tokio::test]
    async fn test_unknown_profile() {
        let result = tool().execute(json!({"profile": "nope"})).await.unwrap();
        assert!(result.is_error());
        assert_eq!(payload(&result)["kind"], "ProfileNotFoundError");
    }
}
