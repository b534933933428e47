use std::sync::Arc;

use chrono::Utc;
use tracing::{debug, warn};

use nodeflow_core::traits::ExecutionLogStore;
use nodeflow_core::types::{ExecutionLogEntry, ExecutionResult, ExecutionStatus, NodeResult};

/// Writes one summary entry per workflow run.
///
/// Appends are best-effort: a store failure is reported through `tracing`
/// and never reaches the caller of the run.
#[derive(Clone)]
pub struct RunLogger {
    store: Arc<dyn ExecutionLogStore>,
}

impl RunLogger {
    pub fn new(store: Arc<dyn ExecutionLogStore>) -> Self {
        Self { store }
    }

    pub fn store(&self) -> &Arc<dyn ExecutionLogStore> {
        &self.store
    }

    /// Summarize a completed run from its visible results.
    pub fn completed_entry(
        workflow_id: &str,
        workflow_name: &str,
        results: &[ExecutionResult],
        execution_time: u64,
    ) -> ExecutionLogEntry {
        let first_error = results
            .iter()
            .find(|r| !r.success)
            .map(|r| r.error.clone().unwrap_or_else(|| "Unknown error".to_string()));

        ExecutionLogEntry {
            id: uuid::Uuid::new_v4().to_string(),
            workflow_id: workflow_id.to_string(),
            workflow_name: workflow_name.to_string(),
            timestamp: Utc::now(),
            status: run_status(results),
            execution_time,
            error: first_error,
            node_results: Some(results.iter().map(NodeResult::from).collect()),
        }
    }

    /// Summarize a run that aborted before any node executed.
    pub fn aborted_entry(
        workflow_id: &str,
        workflow_name: &str,
        error: &str,
        execution_time: u64,
    ) -> ExecutionLogEntry {
        ExecutionLogEntry {
            id: uuid::Uuid::new_v4().to_string(),
            workflow_id: workflow_id.to_string(),
            workflow_name: workflow_name.to_string(),
            timestamp: Utc::now(),
            status: ExecutionStatus::Failure,
            execution_time,
            error: Some(error.to_string()),
            node_results: None,
        }
    }

    /// Append an entry, swallowing store errors.
    pub async fn record(&self, entry: ExecutionLogEntry) {
        let id = entry.id.clone();
        let workflow_id = entry.workflow_id.clone();
        match self.store.append(entry).await {
            Ok(()) => debug!(log_id = %id, workflow_id = %workflow_id, "Execution logged"),
            Err(e) => warn!(workflow_id = %workflow_id, error = %e, "Failed to log execution"),
        }
    }
}

/// `failure` if any result failed, else `success`.
pub fn run_status(results: &[ExecutionResult]) -> ExecutionStatus {
    if results.iter().all(|r| r.success) {
        ExecutionStatus::Success
    } else {
        ExecutionStatus::Failure
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use nodeflow_store::MemoryLogStore;
    use nodeflow_test_utils::FailingLogStore;
    use serde_json::json;

    #[test]
    fn test_completed_entry_strips_payloads() {
        let results = vec![
            ExecutionResult::success("a", json!({"big": "payload"})),
            ExecutionResult::failure("b", "Request failed with status 500"),
            ExecutionResult::failure("c", "second failure"),
        ];
        let entry = RunLogger::completed_entry("wf", "Demo", &results, 42);

        assert_eq!(entry.status, ExecutionStatus::Failure);
        assert_eq!(entry.execution_time, 42);
        assert_eq!(entry.error.as_deref(), Some("Request failed with status 500"));
        let nodes = entry.node_results.unwrap();
        assert_eq!(nodes.len(), 3);
        assert_eq!(nodes[1].node_id, "b");
        assert!(!nodes[1].success);
        let value = serde_json::to_value(&nodes[0]).unwrap();
        assert!(value.get("data").is_none());
    }

    #[test]
    fn test_empty_run_is_success() {
        let entry = RunLogger::completed_entry("wf", "Demo", &[], 0);
        assert_eq!(entry.status, ExecutionStatus::Success);
        assert!(entry.error.is_none());
        assert_eq!(entry.node_results, Some(vec![]));
    }

    #[test]
    fn test_aborted_entry() {
        let entry = RunLogger::aborted_entry("wf", "Demo", "No start node found in the workflow", 1);
        assert_eq!(entry.status, ExecutionStatus::Failure);
        assert!(entry.node_results.is_none());
        assert!(uuid::Uuid::parse_str(&entry.id).is_ok());
    }

    #[tokio::test]
    async fn test_record_appends() {
        let store = Arc::new(MemoryLogStore::new());
        let logger = RunLogger::new(store.clone());
        logger
            .record(RunLogger::completed_entry("wf", "Demo", &[], 3))
            .await;

        let logs = store.list_for_workflow("wf").await.unwrap();
        assert_eq!(logs.len(), 1);
        assert_eq!(logs[0].workflow_name, "Demo");
    }

    #[tokio::test]
    async fn test_record_swallows_store_errors() {
        let logger = RunLogger::new(Arc::new(FailingLogStore));
        // Must not panic or propagate.
        logger
            .record(RunLogger::completed_entry("wf", "Demo", &[], 3))
            .await;
    }
}
