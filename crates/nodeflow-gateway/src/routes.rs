use std::sync::Arc;

use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde::Deserialize;
use serde_json::{json, Value};
use tracing::{error, info};

use nodeflow_core::error::NodeflowError;
use nodeflow_core::types::{ExecutionLogEntry, WorkflowDraft};

use crate::state::AppState;

/// Error body `{"error": message}` with a status derived from the error kind.
pub struct ApiError(NodeflowError);

impl From<NodeflowError> for ApiError {
    fn from(e: NodeflowError) -> Self {
        Self(e)
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = match &self.0 {
            NodeflowError::NotFound(_) => StatusCode::NOT_FOUND,
            NodeflowError::Validation(_) => StatusCode::BAD_REQUEST,
            _ => StatusCode::INTERNAL_SERVER_ERROR,
        };
        if status.is_server_error() {
            error!(error = %self.0, "Request failed");
        }
        (status, Json(json!({ "error": self.0.to_string() }))).into_response()
    }
}

type ApiResult<T> = std::result::Result<T, ApiError>;

fn workflow_not_found() -> ApiError {
    NodeflowError::NotFound("Workflow".into()).into()
}

fn require_name(draft: &WorkflowDraft) -> ApiResult<()> {
    if draft.name.trim().is_empty() {
        return Err(NodeflowError::Validation("Workflow name is required".into()).into());
    }
    Ok(())
}

// GET /api/health
pub async fn health() -> Json<Value> {
    Json(json!({
        "status": "ok",
        "version": env!("CARGO_PKG_VERSION"),
    }))
}

// ── Workflows ───────────────────────────────────────────────────

// GET /api/workflows
pub async fn list_workflows(State(state): State<Arc<AppState>>) -> ApiResult<Json<Value>> {
    let workflows = state.workflows.list().await?;
    Ok(Json(json!(workflows)))
}

// POST /api/workflows
pub async fn create_workflow(
    State(state): State<Arc<AppState>>,
    Json(draft): Json<WorkflowDraft>,
) -> ApiResult<(StatusCode, Json<Value>)> {
    require_name(&draft)?;
    let workflow = state.workflows.create(draft).await?;
    info!(workflow_id = %workflow.id, "Workflow created");
    Ok((StatusCode::CREATED, Json(json!(workflow))))
}

// GET /api/workflows/{id}
pub async fn get_workflow(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
) -> ApiResult<Json<Value>> {
    let workflow = state.workflows.get(&id).await?.ok_or_else(workflow_not_found)?;
    Ok(Json(json!(workflow)))
}

// PUT /api/workflows/{id}
pub async fn update_workflow(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
    Json(draft): Json<WorkflowDraft>,
) -> ApiResult<Json<Value>> {
    require_name(&draft)?;
    let workflow = state
        .workflows
        .update(&id, draft)
        .await?
        .ok_or_else(workflow_not_found)?;
    Ok(Json(json!(workflow)))
}

// DELETE /api/workflows/{id}, also drops the workflow's execution logs
pub async fn delete_workflow(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
) -> ApiResult<Json<Value>> {
    if !state.workflows.delete(&id).await? {
        return Err(workflow_not_found());
    }
    state.logs.delete_for_workflow(&id).await?;
    info!(workflow_id = %id, "Workflow deleted");
    Ok(Json(json!({ "success": true })))
}

// POST /api/workflows/{id}/execute
pub async fn execute_workflow(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
) -> ApiResult<Json<Value>> {
    let workflow = state.workflows.get(&id).await?.ok_or_else(workflow_not_found)?;

    let results = state
        .engine
        .execute_workflow(
            &workflow.nodes,
            &workflow.edges,
            Some(&workflow.id),
            Some(&workflow.name),
        )
        .await?;

    Ok(Json(json!({
        "success": true,
        "results": results,
        "workflowId": workflow.id,
        "workflowName": workflow.name,
    })))
}

// ── Execution logs ──────────────────────────────────────────────

#[derive(Deserialize)]
pub struct LogsQuery {
    #[serde(default, rename = "workflowId")]
    pub workflow_id: Option<String>,
}

impl LogsQuery {
    fn workflow_id(&self) -> Option<&str> {
        self.workflow_id.as_deref().filter(|id| !id.is_empty())
    }
}

// GET /api/execution-logs?workflowId=
pub async fn list_logs(
    State(state): State<Arc<AppState>>,
    Query(q): Query<LogsQuery>,
) -> ApiResult<Json<Value>> {
    let logs = match q.workflow_id() {
        Some(id) => state.logs.list_for_workflow(id).await?,
        None => state.logs.list_all().await?,
    };
    Ok(Json(json!(logs)))
}

// POST /api/execution-logs
pub async fn append_log(
    State(state): State<Arc<AppState>>,
    Json(body): Json<Value>,
) -> ApiResult<Json<Value>> {
    let has = |field: &str| body.get(field).and_then(Value::as_str).is_some_and(|s| !s.is_empty());
    if !has("id") || !has("workflowId") {
        return Err(NodeflowError::Validation("Invalid log entry".into()).into());
    }

    let entry: ExecutionLogEntry = serde_json::from_value(body)
        .map_err(|e| NodeflowError::Validation(format!("Invalid log entry: {}", e)))?;
    state.logs.append(entry).await?;
    Ok(Json(json!({ "success": true })))
}

// DELETE /api/execution-logs?workflowId=
pub async fn delete_logs(
    State(state): State<Arc<AppState>>,
    Query(q): Query<LogsQuery>,
) -> ApiResult<Json<Value>> {
    let id = q
        .workflow_id()
        .ok_or_else(|| NodeflowError::Validation("Workflow ID is required".into()))?;
    state.logs.delete_for_workflow(id).await?;
    Ok(Json(json!({ "success": true })))
}

// GET /api/execution-logs/{id}
pub async fn get_log(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
) -> ApiResult<Json<Value>> {
    let log = state
        .logs
        .get(&id)
        .await?
        .ok_or_else(|| NodeflowError::NotFound("Execution log".into()))?;
    Ok(Json(json!(log)))
}
