//! Persistence backends for nodeflow.
//!
//! Execution logs are capped and kept newest-first; workflows are plain
//! documents with their graph stored as JSON.

mod log_store;
mod workflows;

pub use log_store::{MemoryLogStore, SqliteLogStore, DEFAULT_MAX_LOG_ENTRIES};
pub use workflows::SqliteWorkflowStore;
