use std::sync::Arc;

use nodeflow_core::config::GatewayConfig;
use nodeflow_core::traits::{ExecutionLogStore, WorkflowStore};
use nodeflow_engine::WorkflowEngine;

/// Shared application state for axum handlers.
pub struct AppState {
    pub config: GatewayConfig,
    pub engine: Arc<WorkflowEngine>,
    pub workflows: Arc<dyn WorkflowStore>,
    pub logs: Arc<dyn ExecutionLogStore>,
}
