use futures::future::BoxFuture;
use serde_json::Value;

use crate::error::Result;
use crate::types::{ExecutionLogEntry, Workflow, WorkflowDraft};

/// Text-cleaning service used by Transform nodes.
pub trait TextCleaner: Send + Sync + 'static {
    /// Turn arbitrary prior-node data into human-readable text.
    fn clean(&self, data: &Value) -> BoxFuture<'_, Result<String>>;
}

/// Capped, newest-first store of execution log entries.
pub trait ExecutionLogStore: Send + Sync + 'static {
    /// Insert an entry and trim the oldest entries beyond the cap.
    fn append(&self, entry: ExecutionLogEntry) -> BoxFuture<'_, Result<()>>;

    /// All entries, newest first.
    fn list_all(&self) -> BoxFuture<'_, Result<Vec<ExecutionLogEntry>>>;

    /// Entries for one workflow, newest first.
    fn list_for_workflow(&self, workflow_id: &str)
        -> BoxFuture<'_, Result<Vec<ExecutionLogEntry>>>;

    /// Look up a single entry by id.
    fn get(&self, id: &str) -> BoxFuture<'_, Result<Option<ExecutionLogEntry>>>;

    /// Remove every entry that belongs to a workflow.
    fn delete_for_workflow(&self, workflow_id: &str) -> BoxFuture<'_, Result<()>>;
}

/// Workflow document persistence.
pub trait WorkflowStore: Send + Sync + 'static {
    fn list(&self) -> BoxFuture<'_, Result<Vec<Workflow>>>;

    fn get(&self, id: &str) -> BoxFuture<'_, Result<Option<Workflow>>>;

    fn create(&self, draft: WorkflowDraft) -> BoxFuture<'_, Result<Workflow>>;

    /// Replace the document's fields. `None` when the id is unknown.
    fn update(&self, id: &str, draft: WorkflowDraft) -> BoxFuture<'_, Result<Option<Workflow>>>;

    /// Returns `false` when the id is unknown.
    fn delete(&self, id: &str) -> BoxFuture<'_, Result<bool>>;
}
