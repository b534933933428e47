use std::collections::{HashSet, VecDeque};
use std::sync::Arc;
use std::time::Instant;

use serde_json::{json, Value};
use tracing::{debug, info, warn};

use nodeflow_core::error::{NodeflowError, Result};
use nodeflow_core::traits::ExecutionLogStore;
use nodeflow_core::types::{Edge, ExecutionResult, Node};

use super::node::NodeKind;
use super::query::WorkflowGraph;
use crate::dispatch::{NodeDispatcher, NodeOutcome, EXECUTION_STARTED};
use crate::run_log::{run_status, RunLogger};

const UNNAMED_WORKFLOW: &str = "Untitled workflow";

/// Executes workflow graphs.
///
/// Traversal is breadth-first from the resolved start node and strictly
/// sequential: each node's executor is awaited before the next queue item is
/// taken. A node's output feeds its successors only when the node succeeded.
pub struct WorkflowEngine {
    dispatcher: NodeDispatcher,
    run_logger: Option<RunLogger>,
}

impl WorkflowEngine {
    pub fn new(dispatcher: NodeDispatcher) -> Self {
        Self {
            dispatcher,
            run_logger: None,
        }
    }

    /// Record a summary entry for every run that names a workflow id.
    pub fn with_log_store(mut self, store: Arc<dyn ExecutionLogStore>) -> Self {
        self.run_logger = Some(RunLogger::new(store));
        self
    }

    /// Run a workflow and return the results visible to the caller.
    ///
    /// Only a missing start node aborts the call; every per-node failure is
    /// reported as a `success: false` entry. Graphs without an output node
    /// yield an empty list.
    pub async fn execute_workflow(
        &self,
        nodes: &[Node],
        edges: &[Edge],
        workflow_id: Option<&str>,
        workflow_name: Option<&str>,
    ) -> Result<Vec<ExecutionResult>> {
        let started = Instant::now();
        let workflow_name = workflow_name.unwrap_or(UNNAMED_WORKFLOW);
        let graph = WorkflowGraph::new(nodes, edges);

        info!(
            workflow_id = workflow_id.unwrap_or("-"),
            nodes = graph.len(),
            edges = edges.len(),
            "Starting workflow execution"
        );

        let all_results = match self.traverse(&graph).await {
            Ok(results) => results,
            Err(e) => {
                warn!(workflow_id = workflow_id.unwrap_or("-"), error = %e, "Workflow aborted");
                if let (Some(logger), Some(id)) = (&self.run_logger, workflow_id) {
                    let elapsed = started.elapsed().as_millis() as u64;
                    logger
                        .record(RunLogger::aborted_entry(id, workflow_name, &e.to_string(), elapsed))
                        .await;
                }
                return Err(e);
            }
        };

        let results = visible_results(&graph, all_results);
        let elapsed = started.elapsed().as_millis() as u64;

        info!(
            workflow_id = workflow_id.unwrap_or("-"),
            status = %run_status(&results),
            results = results.len(),
            elapsed_ms = elapsed,
            "Workflow execution finished"
        );

        if let (Some(logger), Some(id)) = (&self.run_logger, workflow_id) {
            logger
                .record(RunLogger::completed_entry(id, workflow_name, &results, elapsed))
                .await;
        }

        Ok(results)
    }

    /// Breadth-first walk producing one result per executed node, plus the
    /// synthetic start entry, in execution order.
    async fn traverse(&self, graph: &WorkflowGraph) -> Result<Vec<ExecutionResult>> {
        let start = graph.find_start_node().ok_or(NodeflowError::NoStartNode)?;
        debug!(start_node = %graph.node(start).id(), "Resolved start node");

        let mut results = vec![ExecutionResult::success(
            graph.node(start).id(),
            json!({ "message": EXECUTION_STARTED }),
        )];

        // The start node is not executed, so it hands no data downstream.
        let mut queue: VecDeque<(usize, Option<Value>)> = VecDeque::new();
        queue.push_back((start, None));
        let mut expanded = vec![false; graph.len()];

        while let Some((idx, data)) = queue.pop_front() {
            if expanded[idx] {
                continue;
            }
            expanded[idx] = true;

            // Duplicate edges from one source run their target once.
            let mut dispatched: HashSet<usize> = HashSet::new();
            for &next in graph.next_nodes(idx) {
                let node = graph.node(next);
                if node.kind == NodeKind::Start || !dispatched.insert(next) {
                    continue;
                }

                let node_start = Instant::now();
                let outcome = self.dispatcher.dispatch(node, data.as_ref()).await;
                debug!(
                    node_id = %node.id(),
                    succeeded = outcome.is_success(),
                    elapsed_ms = node_start.elapsed().as_millis() as u64,
                    "Node execution complete"
                );

                match outcome {
                    NodeOutcome::Success(output) => {
                        results.push(ExecutionResult::success(node.id(), output.clone()));
                        queue.push_back((next, Some(output)));
                    }
                    NodeOutcome::Failure(error) => {
                        // Descendants on this path are never reached.
                        results.push(ExecutionResult::failure(node.id(), error));
                    }
                }
            }
        }

        Ok(results)
    }
}

/// Keep only results of nodes that are, or lead to, an output node.
fn visible_results(graph: &WorkflowGraph, results: Vec<ExecutionResult>) -> Vec<ExecutionResult> {
    if !graph.has_output_node() {
        return Vec::new();
    }

    let keep: HashSet<String> = graph.nodes_connected_to_output();
    results
        .into_iter()
        .filter(|r| keep.contains(&r.node_id))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use nodeflow_core::config::ProviderCredentials;
    use nodeflow_core::types::{ApiProvider, ApiRouteConfig, ExecutionStatus, HttpMethod};
    use nodeflow_test_utils::{api_node, edge, output_node, passive_node, start_node, MockCleaner};

    fn engine() -> WorkflowEngine {
        WorkflowEngine::new(NodeDispatcher::new(
            ProviderCredentials::default(),
            Arc::new(MockCleaner::ok("clean")),
        ))
    }

    fn ids(results: &[ExecutionResult]) -> Vec<&str> {
        results.iter().map(|r| r.node_id.as_str()).collect()
    }

    #[tokio::test]
    async fn test_empty_graph_has_no_start() {
        let err = engine().execute_workflow(&[], &[], None, None).await.unwrap_err();
        assert!(matches!(err, NodeflowError::NoStartNode));
    }

    #[tokio::test]
    async fn test_fan_in_expands_once() {
        let nodes = vec![
            start_node("s"),
            passive_node("a", "A"),
            passive_node("b", "B"),
            passive_node("join", "Join"),
            output_node("out"),
        ];
        let edges = vec![
            edge("s", "a"),
            edge("s", "b"),
            edge("a", "join"),
            edge("b", "join"),
            edge("join", "out"),
        ];

        let results = engine()
            .execute_workflow(&nodes, &edges, None, None)
            .await
            .unwrap();
        // join runs once per incoming edge, but is expanded only once.
        assert_eq!(ids(&results), vec!["s", "a", "b", "join", "join", "out"]);
    }

    #[tokio::test]
    async fn test_start_type_successor_is_skipped() {
        let nodes = vec![start_node("s"), passive_node("a", "A"), output_node("out")];
        let edges = vec![edge("s", "a"), edge("a", "s"), edge("a", "out")];

        let results = engine()
            .execute_workflow(&nodes, &edges, None, None)
            .await
            .unwrap();
        assert_eq!(ids(&results), vec!["s", "a", "out"]);
    }

    #[tokio::test]
    async fn test_self_loop_terminates() {
        let nodes = vec![start_node("s"), passive_node("a", "A"), output_node("out")];
        let edges = vec![edge("s", "a"), edge("a", "a"), edge("a", "out")];

        let results = engine()
            .execute_workflow(&nodes, &edges, None, None)
            .await
            .unwrap();
        // a re-runs through its own loop once before being marked expanded.
        assert_eq!(ids(&results), vec!["s", "a", "a", "out"]);
    }

    #[tokio::test]
    async fn test_duplicate_edges_run_target_once() {
        let nodes = vec![start_node("s"), passive_node("a", "A"), output_node("out")];
        let edges = vec![edge("s", "a"), edge("s", "a"), edge("a", "out"), edge("a", "out")];

        let results = engine()
            .execute_workflow(&nodes, &edges, None, None)
            .await
            .unwrap();
        assert_eq!(ids(&results), vec!["s", "a", "out"]);
    }

    #[tokio::test]
    async fn test_failed_branch_does_not_stop_sibling() {
        let nodes = vec![
            start_node("s"),
            api_node(
                "a",
                ApiRouteConfig::new(HttpMethod::Get, "http://127.0.0.1:1/x")
                    .with_provider(ApiProvider::Stripe),
            ),
            output_node("o1"),
            passive_node("b", "B"),
            output_node("o2"),
        ];
        let edges = vec![edge("s", "a"), edge("a", "o1"), edge("s", "b"), edge("b", "o2")];

        let results = engine()
            .execute_workflow(&nodes, &edges, None, None)
            .await
            .unwrap();
        assert_eq!(ids(&results), vec!["s", "a", "b", "o2"]);
        assert!(!results[1].success);
        assert!(results.iter().filter(|r| r.node_id != "a").all(|r| r.success));
        assert_eq!(run_status(&results), ExecutionStatus::Failure);
    }

    #[tokio::test]
    async fn test_dead_branch_is_filtered() {
        let nodes = vec![
            start_node("s"),
            passive_node("side", "Side"),
            passive_node("a", "A"),
            output_node("out"),
        ];
        let edges = vec![edge("s", "side"), edge("s", "a"), edge("a", "out")];

        let results = engine()
            .execute_workflow(&nodes, &edges, None, None)
            .await
            .unwrap();
        assert_eq!(ids(&results), vec!["s", "a", "out"]);
    }
}
