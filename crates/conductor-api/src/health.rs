// Aggregated health route

use std::sync::Arc;

use axum::{extract::State, http::StatusCode, routing::get, Json, Router};
use conductor_contracts::HealthView;
use conductor_engine::WorkflowEngine;
use conductor_storage::Database;

/// App state
#[derive(Clone)]
pub struct AppState {
    pub db: Database,
    pub engine: Arc<WorkflowEngine>,
}

pub fn routes(state: AppState) -> Router {
    Router::new()
        .route("/api/health", get(get_health))
        .with_state(state)
}

/// GET /api/health - Store reachability + engine state + plugin count
#[utoipa::path(
    get,
    path = "/api/health",
    responses(
        (status = 200, description = "Everything healthy", body = HealthView),
        (status = 503, description = "Store unreachable or engine stopped", body = HealthView)
    ),
    tag = "health"
)]
pub async fn get_health(State(state): State<AppState>) -> (StatusCode, Json<HealthView>) {
    let store_ok = state.db.ping().await.is_ok();
    let engine_ok = state.engine.is_running();
    let plugins = if store_ok {
        state.db.count_plugins().await.unwrap_or(0)
    } else {
        0
    };

    let healthy = store_ok && engine_ok;
    let view = HealthView {
        status: if healthy { "ok" } else { "degraded" }.to_string(),
        store: store_ok,
        engine: engine_ok,
        plugins,
    };

    let code = if healthy {
        StatusCode::OK
    } else {
        StatusCode::SERVICE_UNAVAILABLE
    };
    (code, Json(view))
}
