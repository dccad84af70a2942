//! MCP request handler implementation.

use crate::error::ProtocolResult;
use crate::protocol::{
    CallToolParams, CallToolResult, Handler, Implementation, InitializeParams, InitializeResult,
    ListToolsResult, MCP_VERSION, ServerCapabilities, ToolsCapability,
};
use crate::server::state::ServerState;
use async_trait::async_trait;
use std::sync::Arc;
use tracing::{debug, error, info};

/// MCP request handler that processes protocol messages.
pub struct McpHandler {
    state: Arc<ServerState>,
}

impl McpHandler {
    pub fn new(state: Arc<ServerState>) -> Self {
        Self { state }
    }

    pub fn state(&self) -> &Arc<ServerState> {
        &self.state
    }

    fn instructions(&self) -> String {
        let profiles = &self.state.profiles;
        let names: Vec<&str> = profiles.names().collect();

        format!(
            "Read-only SQL Server query server. Profiles: {} (default '{}'). \
            Tools: {}. Only single SELECT statements are accepted; call \
            get_execution_context to see row and time limits before querying.",
            names.join(", "),
            profiles.default_profile().name(),
            self.state.tools.names().join(", ")
        )
    }
}

#[async_trait]
impl Handler for McpHandler {
    async fn initialize(&self, params: InitializeParams) -> ProtocolResult<InitializeResult> {
        match &params.client_info {
            Some(client) => info!("Initialize request from {} v{}", client.name, client.version),
            None => info!("Initialize request from unnamed client"),
        }
        debug!("Client capabilities: {:?}", params.capabilities);

        self.state.set_initialized(params.client_info);

        Ok(InitializeResult {
            protocol_version: MCP_VERSION.into(),
            capabilities: ServerCapabilities {
                tools: Some(ToolsCapability {
                    list_changed: Some(false),
                }),
            },
            server_info: Implementation {
                name: self.state.config.name.to_string(),
                version: self.state.config.version.to_string(),
            },
            instructions: Some(self.instructions()),
        })
    }

    async fn initialized(&self) -> ProtocolResult<()> {
        info!("Client confirmed initialization");
        Ok(())
    }

    async fn shutdown(&self) -> ProtocolResult<()> {
        info!(
            requests = self.state.request_count(),
            "Shutdown request received"
        );
        Ok(())
    }

    async fn list_tools(&self) -> ProtocolResult<ListToolsResult> {
        let tools = self.state.tools.list();
        debug!("Listing {} tools", tools.len());

        Ok(ListToolsResult {
            tools,
            next_cursor: None,
        })
    }

    async fn call_tool(&self, params: CallToolParams) -> ProtocolResult<CallToolResult> {
        let sequence = self.state.next_request_id();
        debug!(sequence, "Tool call: {}", params.name);

        match self.state.tools.execute(params).await {
            Ok(result) => Ok(result),
            Err(e) => {
                error!("Tool execution error: {}", e);
                Ok(CallToolResult::error(e.to_string()))
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{ProfilesConfig, ServerConfig};
    use crate::database::engine::testing::FakeConnector;
    use crate::server::ServerStateBuilder;
    use serde_json::{Value, json};

    fn handler() -> McpHandler {
        let profiles = ProfilesConfig::from_toml_str(
            r#"
            [profiles.default]
            connection_string = "Server=db;User Id=reader;Password=x"

            [profiles.warehouse]
            connection_string = "Server=dw;User Id=reader;Password=x"
            "#,
        )
        .unwrap();

        let state = ServerStateBuilder::new()
            .config(ServerConfig::builder().name("query-test").profiles(profiles).build())
            .connector(Arc::new(FakeConnector::counting(3)))
            .build()
            .unwrap();

        McpHandler::new(Arc::new(state))
    }

    #[tokio::test]
    async fn test_initialize_reports_profiles_and_tools() {
        let handler = handler();
        let result = handler
            .initialize(InitializeParams {
                protocol_version: Some(MCP_VERSION.into()),
                capabilities: Value::Null,
                client_info: None,
            })
            .await
            .unwrap();

        assert_eq!(result.server_info.name, "query-test");
        assert_eq!(result.capabilities.tools.unwrap().list_changed, Some(false));

        let instructions = result.instructions.unwrap();
        assert!(instructions.contains("default, warehouse"));
        assert!(instructions.contains("execute_query"));
        assert!(handler.state().is_initialized());
    }

    #[tokio::test]
    async fn test_call_tool_runs_query() {
        let handler = handler();
        let result = handler
            .call_tool(CallToolParams {
                name: "execute_query".into(),
                arguments: json!({"sql": "SELECT Value FROM Numbers", "max_rows": 2}),
            })
            .await
            .unwrap();

        assert!(!result.is_error());
        let payload: Value = serde_json::from_str(result.first_text().unwrap()).unwrap();
        assert_eq!(payload["rows"], json!([[1], [2]]));
        assert_eq!(payload["truncated"], true);
        assert_eq!(handler.state().request_count(), 1);
    }

    #[tokio::test]
    async fn test_unknown_tool_is_error_result() {
        let result = handler()
            .call_tool(CallToolParams {
                name: "drop_everything".into(),
                arguments: Value::Null,
            })
            .await
            .unwrap();

        assert!(result.is_error());
        assert!(result.first_text().unwrap().contains("drop_everything"));
    }
}
