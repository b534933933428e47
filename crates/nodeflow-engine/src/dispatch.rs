use std::sync::Arc;
use std::time::Duration;

use serde_json::{json, Value};
use tracing::{debug, warn};

use nodeflow_core::config::{AppConfig, ProviderCredentials};
use nodeflow_core::error::NodeflowError;
use nodeflow_core::traits::TextCleaner;

use crate::graph::{GraphNode, NodeKind};
use crate::http::ApiExecutor;

pub const EXECUTION_STARTED: &str = "Workflow execution started";
pub const NO_DATA_RECEIVED: &str = "Output Node: No data received from previous node";
pub const NO_API_ROUTE: &str = "Output Node: No API route defined for this node";
pub const NO_DATA_TO_TRANSFORM: &str = "No data to transform";

/// Result of running one node's action.
#[derive(Debug, Clone, PartialEq)]
pub enum NodeOutcome {
    Success(Value),
    Failure(String),
}

impl NodeOutcome {
    pub fn is_success(&self) -> bool {
        matches!(self, NodeOutcome::Success(_))
    }
}

impl From<nodeflow_core::Result<Value>> for NodeOutcome {
    fn from(result: nodeflow_core::Result<Value>) -> Self {
        match result {
            Ok(v) => NodeOutcome::Success(v),
            Err(e) => NodeOutcome::Failure(e.to_string()),
        }
    }
}

/// Runs a node according to its kind.
pub struct NodeDispatcher {
    api: ApiExecutor,
    cleaner: Arc<dyn TextCleaner>,
    node_timeout: Option<Duration>,
}

impl NodeDispatcher {
    pub fn new(credentials: ProviderCredentials, cleaner: Arc<dyn TextCleaner>) -> Self {
        Self {
            api: ApiExecutor::new(credentials),
            cleaner,
            node_timeout: None,
        }
    }

    pub fn from_config(config: &AppConfig, cleaner: Arc<dyn TextCleaner>) -> Self {
        Self::new(config.providers.credentials(), cleaner)
            .with_timeout_secs(config.engine.node_timeout_secs)
    }

    /// Bound each node call. 0 disables the limit.
    pub fn with_timeout_secs(mut self, secs: u64) -> Self {
        self.node_timeout = (secs > 0).then(|| Duration::from_secs(secs));
        self
    }

    /// Execute `node` with the data produced by the node it was reached from.
    ///
    /// Never fails as a whole: every problem is folded into
    /// [`NodeOutcome::Failure`].
    pub async fn dispatch(&self, node: &GraphNode, previous: Option<&Value>) -> NodeOutcome {
        debug!(node_id = %node.id(), kind = node.kind.name(), "Dispatching node");

        let run = self.run(node, previous);
        let outcome = match self.node_timeout {
            Some(limit) => match tokio::time::timeout(limit, run).await {
                Ok(outcome) => outcome,
                Err(_) => NodeOutcome::Failure(
                    NodeflowError::NodeTimeout {
                        node_id: node.id().to_string(),
                        timeout_secs: limit.as_secs(),
                    }
                    .to_string(),
                ),
            },
            None => run.await,
        };

        if let NodeOutcome::Failure(ref e) = outcome {
            warn!(node_id = %node.id(), error = %e, "Node failed");
        }
        outcome
    }

    async fn run(&self, node: &GraphNode, previous: Option<&Value>) -> NodeOutcome {
        let previous = previous.filter(|v| !v.is_null());

        match &node.kind {
            NodeKind::Start => NodeOutcome::Success(json!({ "message": EXECUTION_STARTED })),
            NodeKind::Output => NodeOutcome::Success(
                previous
                    .cloned()
                    .unwrap_or_else(|| json!({ "message": NO_DATA_RECEIVED })),
            ),
            NodeKind::Transform => match previous {
                None => NodeOutcome::Success(Value::String(NO_DATA_TO_TRANSFORM.to_string())),
                Some(data) => match self.cleaner.clean(data).await {
                    Ok(text) => NodeOutcome::Success(Value::String(text)),
                    Err(e) => NodeOutcome::Failure(e.to_string()),
                },
            },
            NodeKind::Api(route) => self.api.execute(route).await.into(),
            NodeKind::Passive => NodeOutcome::Success(json!({ "message": NO_API_ROUTE })),
        }
    }
}
