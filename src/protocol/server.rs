//! MCP server loop with lifecycle tracking.

use crate::error::{McpError, ProtocolError, Result};
use crate::protocol::handler::{Dispatcher, Handler};
use crate::protocol::transport::{StdioTransport, Transport};
use crate::protocol::types::*;
use std::sync::Arc;
use tokio::sync::RwLock;
use tracing::{debug, error, info, instrument, warn};

/// Protocol lifecycle of one session.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Lifecycle {
    Created,
    /// Initialize answered, awaiting the initialized notification.
    Initializing,
    Running,
    ShuttingDown,
    Stopped,
}

/// MCP Server.
pub struct McpServer<H: Handler> {
    info: Implementation,
    handler: Arc<H>,
    lifecycle: RwLock<Lifecycle>,
}

impl<H: Handler> McpServer<H> {
    pub fn new(handler: H, info: Implementation) -> Self {
        Self {
            info,
            handler: Arc::new(handler),
            lifecycle: RwLock::new(Lifecycle::Created),
        }
    }

    pub async fn lifecycle(&self) -> Lifecycle {
        *self.lifecycle.read().await
    }

    /// Serve over stdin/stdout until EOF or shutdown.
    #[instrument(skip(self), fields(server = %self.info.name))]
    pub async fn run(&self) -> Result<()> {
        self.run_with_transport(&StdioTransport::stdio()).await
    }

    pub async fn run_with_transport<T: Transport>(&self, transport: &T) -> Result<()> {
        info!("Starting MCP server: {} v{}", self.info.name, self.info.version);

        let dispatcher = Dispatcher::new(Arc::clone(&self.handler));

        loop {
            let message = match transport.read_message().await {
                Ok(Some(message)) => message,
                Ok(None) => {
                    debug!("EOF received, shutting down");
                    break;
                }
                Err(McpError::Protocol(ProtocolError::ParseError)) => {
                    let response = JsonRpcResponse::error(None, JsonRpcError::parse_error());
                    if let Err(e) = transport.write_response(&response).await {
                        error!("Failed to send error response: {}", e);
                    }
                    continue;
                }
                Err(e) => {
                    error!("Transport error: {}", e);
                    break;
                }
            };

            let request = match message {
                Message::Request(request) => request,
                Message::Response(response) => {
                    warn!("Unexpected response received: {:?}", response.id);
                    continue;
                }
            };

            let is_notification = request.is_notification();
            let method = request.method.clone();
            self.advance(&method).await;

            let response = dispatcher.dispatch(request).await;

            if !is_notification && let Err(e) = transport.write_response(&response).await {
                error!("Failed to send response: {}", e);
            }

            if method == "shutdown" {
                info!("Shutdown request received");
                break;
            }
        }

        *self.lifecycle.write().await = Lifecycle::Stopped;
        info!("Server stopped");
        Ok(())
    }

    async fn advance(&self, method: &str) {
        let mut lifecycle = self.lifecycle.write().await;
        match method {
            "initialize" if *lifecycle == Lifecycle::Created => {
                *lifecycle = Lifecycle::Initializing;
            }
            "initialized" | "notifications/initialized"
                if *lifecycle == Lifecycle::Initializing =>
            {
                *lifecycle = Lifecycle::Running;
                info!("Session initialized and running");
            }
            "shutdown" => *lifecycle = Lifecycle::ShuttingDown,
            _ => {}
        }
    }
}

/// Builder for MCP Server.
pub struct McpServerBuilder<H: Handler> {
    handler: Option<H>,
    name: String,
    version: String,
}

impl<H: Handler> McpServerBuilder<H> {
    pub fn new() -> Self {
        Self {
            handler: None,
            name: env!("CARGO_PKG_NAME").into(),
            version: env!("CARGO_PKG_VERSION").into(),
        }
    }

    pub fn handler(mut self, handler: H) -> Self {
        self.handler = Some(handler);
        self
    }

    pub fn name(mut self, name: impl Into<String>) -> Self {
        self.name = name.into();
        self
    }

    pub fn version(mut self, version: impl Into<String>) -> Self {
        self.version = version.into();
        self
    }

    pub fn build(self) -> Result<McpServer<H>> {
        let handler = self.handler.ok_or_else(|| McpError::Internal {
            message: "Handler is required".into(),
        })?;

        Ok(McpServer::new(
            handler,
            Implementation {
                name: self.name,
                version: self.version,
            },
        ))
    }
}

impl<H: Handler> Default for McpServerBuilder<H> {
    fn default() -> Self {
        Self::new()
    }
}
