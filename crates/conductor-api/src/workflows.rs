// Workflow submission and status routes

use std::sync::Arc;

use axum::{
    extract::{Path, State},
    http::StatusCode,
    routing::{get, post},
    Json, Router,
};
use conductor_contracts::{ExecutionDetail, SubmitResponse, WorkflowSpec};
use conductor_engine::WorkflowEngine;
use uuid::Uuid;

use crate::error::ApiError;

/// App state
#[derive(Clone)]
pub struct AppState {
    pub engine: Arc<WorkflowEngine>,
    pub development: bool,
}

/// Create workflow routes
pub fn routes(state: AppState) -> Router {
    Router::new()
        .route("/api/workflows", post(submit_workflow))
        .route("/api/workflows/:id", get(get_workflow_status))
        .with_state(state)
}

/// POST /api/workflows - Submit a workflow for execution
#[utoipa::path(
    post,
    path = "/api/workflows",
    request_body = WorkflowSpec,
    responses(
        (status = 201, description = "Workflow accepted", body = SubmitResponse),
        (status = 400, description = "Validation failed, cycle, or dangling dependency"),
        (status = 500, description = "Internal server error")
    ),
    tag = "workflows"
)]
pub async fn submit_workflow(
    State(state): State<AppState>,
    Json(body): Json<serde_json::Value>,
) -> Result<(StatusCode, Json<SubmitResponse>), ApiError> {
    // Type mismatches (steps not an array, id not a string, ...) are
    // validation failures, not framework-level rejections
    let spec: WorkflowSpec = serde_json::from_value(body)
        .map_err(|e| ApiError::bad_request(format!("Invalid workflow document: {}", e), vec![]))?;

    let accepted = state
        .engine
        .submit(spec)
        .await
        .map_err(|e| ApiError::from_engine(e, state.development))?;

    tracing::info!(execution_id = %accepted.execution_id, "workflow accepted");
    Ok((StatusCode::CREATED, Json(accepted)))
}

/// GET /api/workflows/:id - Execution status by id
///
/// Submissions mint a workflow and an execution together, so the execution
/// id is what clients poll; this route and /api/executions/:id answer the
/// same question.
#[utoipa::path(
    get,
    path = "/api/workflows/{id}",
    params(("id" = Uuid, Path, description = "Execution ID")),
    responses(
        (status = 200, description = "Execution status with tasks and events", body = ExecutionDetail),
        (status = 404, description = "Execution not found")
    ),
    tag = "workflows"
)]
pub async fn get_workflow_status(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<Json<ExecutionDetail>, ApiError> {
    let detail = state
        .engine
        .status(id)
        .await
        .map_err(|e| ApiError::from_engine(e, state.development))?
        .ok_or_else(|| ApiError::not_found(format!("execution {} not found", id)))?;

    Ok(Json(detail))
}
