// Execution inspection routes

use std::sync::Arc;

use axum::{
    extract::{Path, Query, State},
    routing::get,
    Json, Router,
};
use conductor_contracts::{ExecutionDetail, ExecutionSummary};
use conductor_engine::WorkflowEngine;
use serde::Deserialize;
use serde_json::json;
use utoipa::ToSchema;
use uuid::Uuid;

use crate::error::ApiError;

/// Listing is capped regardless of what the client asks for
const MAX_LIST_LIMIT: i64 = 50;

/// App state
#[derive(Clone)]
pub struct AppState {
    pub engine: Arc<WorkflowEngine>,
    pub development: bool,
}

#[derive(Debug, Deserialize, ToSchema)]
pub struct ListExecutionsParams {
    #[serde(default = "default_limit")]
    pub limit: i64,
}

fn default_limit() -> i64 {
    MAX_LIST_LIMIT
}

/// Create execution routes
pub fn routes(state: AppState) -> Router {
    Router::new()
        .route("/api/executions", get(list_executions))
        .route("/api/executions/:id", get(get_execution))
        .with_state(state)
}

/// GET /api/executions - Newest executions first
#[utoipa::path(
    get,
    path = "/api/executions",
    params(("limit" = Option<i64>, Query, description = "Max results (capped at 50)")),
    responses(
        (status = 200, description = "List of executions", body = [ExecutionSummary]),
        (status = 500, description = "Internal server error")
    ),
    tag = "executions"
)]
pub async fn list_executions(
    State(state): State<AppState>,
    Query(params): Query<ListExecutionsParams>,
) -> Result<Json<serde_json::Value>, ApiError> {
    let limit = params.limit.clamp(1, MAX_LIST_LIMIT);
    let executions = state
        .engine
        .list_executions(limit)
        .await
        .map_err(|e| ApiError::from_engine(e, state.development))?;

    Ok(Json(json!({ "executions": executions })))
}

/// GET /api/executions/:id - Execution status with tasks and events
#[utoipa::path(
    get,
    path = "/api/executions/{id}",
    params(("id" = Uuid, Path, description = "Execution ID")),
    responses(
        (status = 200, description = "Execution status with tasks and events", body = ExecutionDetail),
        (status = 404, description = "Execution not found")
    ),
    tag = "executions"
)]
pub async fn get_execution(
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
