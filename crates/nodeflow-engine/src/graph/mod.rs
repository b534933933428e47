//! Workflow graph execution.
//!
//! The raw editor nodes and edges are compiled into a `WorkflowGraph` arena
//! (indices, not references) with every node's kind resolved up front.
//! `WorkflowEngine` walks that arena breadth-first from the resolved start
//! node, dispatching each successor and feeding it the data produced by the
//! node it was reached from.

pub mod executor;
pub mod node;
pub mod query;

pub use executor::WorkflowEngine;
pub use node::{GraphNode, NodeKind};
pub use query::WorkflowGraph;
