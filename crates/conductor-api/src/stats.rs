// Aggregated counters route

use std::sync::Arc;

use axum::{extract::State, routing::get, Json, Router};
use conductor_contracts::StatsView;
use conductor_engine::WorkflowEngine;

use crate::error::ApiError;

/// App state
#[derive(Clone)]
pub struct AppState {
    pub engine: Arc<WorkflowEngine>,
    pub development: bool,
}

pub fn routes(state: AppState) -> Router {
    Router::new()
        .route("/api/stats", get(get_stats))
        .with_state(state)
}

/// GET /api/stats - Queue and execution counters
#[utoipa::path(
    get,
    path = "/api/stats",
    responses(
        (status = 200, description = "Queue and execution counts", body = StatsView),
        (status = 500, description = "Internal server error")
    ),
    tag = "stats"
)]
pub async fn get_stats(State(state): State<AppState>) -> Result<Json<StatsView>, ApiError> {
    let stats = state
        .engine
        .stats()
        .await
        .map_err(|e| ApiError::from_engine(e, state.development))?;

    Ok(Json(stats))
}
