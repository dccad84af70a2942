//! Server state management.

use crate::config::{ProfileTable, ServerConfig};
use crate::database::{BoundedExecutor, Connector};
use crate::error::{ConfigError, ConfigResult};
use crate::protocol::Implementation;
use crate::tools::ToolRegistry;
use parking_lot::RwLock;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};

pub struct ServerState {
    pub config: ServerConfig,
    pub profiles: Arc<ProfileTable>,
    pub tools: ToolRegistry,
    initialized: AtomicBool,
    client_info: RwLock<Option<Implementation>>,
    request_count: AtomicU64,
}

impl ServerState {
    pub fn new(config: ServerConfig, profiles: Arc<ProfileTable>, tools: ToolRegistry) -> Self {
        Self {
            config,
            profiles,
            tools,
            initialized: AtomicBool::new(false),
            client_info: RwLock::new(None),
            request_count: AtomicU64::new(0),
        }
    }

    pub fn is_initialized(&self) -> bool {
        self.initialized.load(Ordering::SeqCst)
    }

    pub fn set_initialized(&self, client_info: Option<Implementation>) {
        *self.client_info.write() = client_info;
        self.initialized.store(true, Ordering::SeqCst);
    }

    pub fn client_info(&self) -> Option<Implementation> {
        self.client_info.read().clone()
    }

    /// Count a tool call, returning its sequence number.
    pub fn next_request_id(&self) -> u64 {
        self.request_count.fetch_add(1, Ordering::SeqCst)
    }

    pub fn request_count(&self) -> u64 {
        self.request_count.load(Ordering::SeqCst)
    }
}

pub struct ServerStateBuilder {
    config: Option<ServerConfig>,
    connector: Option<Arc<dyn Connector>>,
}

impl ServerStateBuilder {
    pub fn new() -> Self {
        Self {
            config: None,
            connector: None,
        }
    }

    pub fn config(mut self, config: ServerConfig) -> Self {
        self.config = Some(config);
        self
    }

    pub fn connector(mut self, connector: Arc<dyn Connector>) -> Self {
        self.connector = Some(connector);
        self
    }

    /// Freeze the profile table and wire the executor and tools over it.
    pub fn build(self) -> ConfigResult<ServerState> {
        let config = self.config.unwrap_or_default();
        let connector = self
            .connector
            .ok_or_else(|| ConfigError::MissingField("connector".into()))?;

        let profiles = Arc::new(config.profile_table()?);
        let executor = Arc::new(BoundedExecutor::new(Arc::clone(&profiles), connector));
        let tools = crate::tools::create_registry(executor);

        Ok(ServerState::new(config, profiles, tools))
    }
}

impl Default for ServerStateBuilder {
    fn default() -> Self {
        Self::new()
    }
}
