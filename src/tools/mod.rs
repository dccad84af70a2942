//! MCP tool definitions and registry.

pub mod context;
pub mod profiles;
pub mod query;
pub mod registry;

pub use context::GetExecutionContextTool;
pub use profiles::ListProfilesTool;
pub use query::ExecuteQueryTool;
pub use registry::{ToolHandler, ToolRegistry};

use crate::config::ExecutionContextProvider;
use crate::database::BoundedExecutor;
use std::sync::Arc;

/// Create and register all tools over one executor.
pub fn create_registry(executor: Arc<BoundedExecutor>) -> ToolRegistry {
    let registry = ToolRegistry::new();
    let profiles = Arc::clone(executor.profiles());

    registry.register(ListProfilesTool::new(Arc::clone(&profiles)));
    registry.register(GetExecutionContextTool::new(ExecutionContextProvider::new(
        profiles,
    )));
    registry.register(ExecuteQueryTool::new(executor));

    registry
}
