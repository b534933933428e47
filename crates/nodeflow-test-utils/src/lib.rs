//! Fixtures and mock collaborators shared by the nodeflow test suites.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;
use std::time::Duration;

use futures::future::BoxFuture;
use serde_json::Value;

use nodeflow_core::error::{NodeflowError, Result};
use nodeflow_core::traits::{ExecutionLogStore, TextCleaner};
use nodeflow_core::types::{ApiRouteConfig, Edge, ExecutionLogEntry, Node};

// ── Fixtures ────────────────────────────────────────────────────

pub fn start_node(id: &str) -> Node {
    Node::new(id, "start", "Start")
}

pub fn output_node(id: &str) -> Node {
    Node::new(id, "output", "Output")
}

pub fn transform_node(id: &str) -> Node {
    Node::new(id, "default", "Transform")
}

/// A node with no route and no special label.
pub fn passive_node(id: &str, label: &str) -> Node {
    Node::new(id, "default", label)
}

pub fn api_node(id: &str, route: ApiRouteConfig) -> Node {
    Node::new(id, "default", "Api").with_api_route(route)
}

pub fn edge(source: &str, target: &str) -> Edge {
    Edge::new(source, target)
}

// ── Mocks ───────────────────────────────────────────────────────

/// Scripted [`TextCleaner`] that records its inputs.
pub struct MockCleaner {
    response: std::result::Result<String, String>,
    delay: Option<Duration>,
    calls: AtomicUsize,
    last_input: Mutex<Option<Value>>,
}

impl MockCleaner {
    pub fn ok(text: &str) -> Self {
        Self::with_response(Ok(text.to_string()))
    }

    pub fn failing(message: &str) -> Self {
        Self::with_response(Err(message.to_string()))
    }

    fn with_response(response: std::result::Result<String, String>) -> Self {
        Self {
            response,
            delay: None,
            calls: AtomicUsize::new(0),
            last_input: Mutex::new(None),
        }
    }

    /// Sleep before answering.
    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = Some(delay);
        self
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    pub fn last_input(&self) -> Option<Value> {
        self.last_input.lock().unwrap().clone()
    }
}

impl TextCleaner for MockCleaner {
    fn clean(&self, data: &Value) -> BoxFuture<'_, Result<String>> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        *self.last_input.lock().unwrap() = Some(data.clone());

        Box::pin(async move {
            if let Some(delay) = self.delay {
                tokio::time::sleep(delay).await;
            }
            self.response.clone().map_err(NodeflowError::Transform)
        })
    }
}

/// Log store whose every operation fails.
pub struct FailingLogStore;

fn unavailable<T>() -> Result<T> {
    Err(NodeflowError::Database("log store unavailable".into()))
}

impl ExecutionLogStore for FailingLogStore {
    fn append(&self, _entry: ExecutionLogEntry) -> BoxFuture<'_, Result<()>> {
        Box::pin(async { unavailable() })
    }

    fn list_all(&self) -> BoxFuture<'_, Result<Vec<ExecutionLogEntry>>> {
        Box::pin(async { unavailable() })
    }

    fn list_for_workflow(&self, _workflow_id: &str) -> BoxFuture<'_, Result<Vec<ExecutionLogEntry>>> {
        Box::pin(async { unavailable() })
    }

    fn get(&self, _id: &str) -> BoxFuture<'_, Result<Option<ExecutionLogEntry>>> {
        Box::pin(async { unavailable() })
    }

    fn delete_for_workflow(&self, _workflow_id: &str) -> BoxFuture<'_, Result<()>> {
        Box::pin(async { unavailable() })
    }
}

// ── HTTP stub ───────────────────────────────────────────────────

/// Serve `router` on an ephemeral local port; returns `http://127.0.0.1:<port>`.
///
/// The server task lives until the test runtime shuts down.
pub async fn spawn_stub_server(router: axum::Router) -> String {
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0")
        .await
        .expect("bind stub server");
    let addr = listener.local_addr().expect("stub server address");

    tokio::spawn(async move {
        axum::serve(listener, router).await.ok();
    });

    format!("http://{}", addr)
}
