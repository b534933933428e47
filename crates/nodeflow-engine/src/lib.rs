pub mod dispatch;
pub mod graph;
pub mod http;
pub mod run_log;

pub use dispatch::{NodeDispatcher, NodeOutcome};
pub use graph::{GraphNode, NodeKind, WorkflowEngine, WorkflowGraph};
pub use http::ApiExecutor;
pub use run_log::RunLogger;
