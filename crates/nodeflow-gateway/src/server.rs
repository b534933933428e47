use std::sync::Arc;

use axum::routing::{get, post};
use axum::Router;
use tokio::net::TcpListener;
use tokio_util::sync::CancellationToken;
use tower_http::cors::CorsLayer;
use tracing::info;

use nodeflow_core::config::GatewayConfig;
use nodeflow_core::traits::{ExecutionLogStore, WorkflowStore};
use nodeflow_engine::WorkflowEngine;

use crate::routes;
use crate::state::AppState;

/// HTTP gateway server built on axum.
pub struct GatewayServer {
    config: GatewayConfig,
    engine: Arc<WorkflowEngine>,
    workflows: Arc<dyn WorkflowStore>,
    logs: Arc<dyn ExecutionLogStore>,
}

impl GatewayServer {
    pub fn new(
        config: GatewayConfig,
        engine: Arc<WorkflowEngine>,
        workflows: Arc<dyn WorkflowStore>,
        logs: Arc<dyn ExecutionLogStore>,
    ) -> Self {
        Self {
            config,
            engine,
            workflows,
            logs,
        }
    }

    /// Run the gateway server until the cancellation token is triggered.
    pub async fn run(&self, shutdown: CancellationToken) -> anyhow::Result<()> {
        let state = Arc::new(AppState {
            config: self.config.clone(),
            engine: self.engine.clone(),
            workflows: self.workflows.clone(),
            logs: self.logs.clone(),
        });

        let app = build_router(state);

        let listener = TcpListener::bind(&self.config.bind).await?;
        info!(bind = %self.config.bind, "Gateway listening");

        axum::serve(listener, app)
            .with_graceful_shutdown(async move { shutdown.cancelled().await })
            .await?;

        info!("Gateway shut down");
        Ok(())
    }
}

pub fn build_router(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/api/health", get(routes::health))
        // Workflows
        .route(
            "/api/workflows",
            get(routes::list_workflows).post(routes::create_workflow),
        )
        .route(
            "/api/workflows/{id}",
            get(routes::get_workflow)
                .put(routes::update_workflow)
                .delete(routes::delete_workflow),
        )
        .route("/api/workflows/{id}/execute", post(routes::execute_workflow))
        // Execution logs
        .route(
            "/api/execution-logs",
            get(routes::list_logs)
                .post(routes::append_log)
                .delete(routes::delete_logs),
        )
        .route("/api/execution-logs/{id}", get(routes::get_log))
        .layer(CorsLayer::permissive())
        .with_state(state)
}
