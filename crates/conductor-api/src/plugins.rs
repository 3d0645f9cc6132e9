// Plugin registration and read routes

use std::sync::Arc;

use axum::{
    extract::{Path, State},
    http::StatusCode,
    routing::{get, post},
    Json, Router,
};
use conductor_contracts::{validate_plugin, PluginManifest, PluginSpec};
use conductor_engine::WorkflowEngine;
use conductor_storage::{Database, PluginRow, StoreError, UpdatePlugin};
use serde::{Deserialize, Serialize};
use serde_json::json;
use utoipa::ToSchema;

use crate::error::ApiError;

/// App state
#[derive(Clone)]
pub struct AppState {
    pub db: Database,
    pub engine: Arc<WorkflowEngine>,
    pub development: bool,
}

/// Request to update a registered plugin
#[derive(Debug, Deserialize, ToSchema)]
pub struct UpdatePluginRequest {
    pub digest: Option<String>,
    pub version: Option<String>,
    pub spec: Option<PluginSpec>,
}

/// Registration/update acknowledgement
#[derive(Debug, Serialize, ToSchema)]
pub struct PluginResponse {
    pub message: String,
    pub plugin: PluginManifest,
}

/// Create plugin routes
pub fn routes(state: AppState) -> Router {
    Router::new()
        .route("/api/plugins", post(register_plugin).get(list_plugins))
        .route("/api/plugins/:id", get(get_plugin).put(update_plugin))
        .with_state(state)
}

/// POST /api/plugins - Register a plugin
#[utoipa::path(
    post,
    path = "/api/plugins",
    request_body = PluginManifest,
    responses(
        (status = 201, description = "Plugin registered", body = PluginResponse),
        (status = 400, description = "Validation failed or id already registered")
    ),
    tag = "plugins"
)]
pub async fn register_plugin(
    State(state): State<AppState>,
    Json(body): Json<serde_json::Value>,
) -> Result<(StatusCode, Json<PluginResponse>), ApiError> {
    let manifest: PluginManifest = serde_json::from_value(body)
        .map_err(|e| ApiError::bad_request(format!("Invalid plugin document: {}", e), vec![]))?;

    let errors = validate_plugin(&manifest);
    if !errors.is_empty() {
        return Err(ApiError::bad_request("Plugin validation failed", errors));
    }

    let spec_json = serde_json::to_value(&manifest.spec)
        .map_err(|e| ApiError::internal(e.to_string(), state.development))?;

    let row = state
        .db
        .create_plugin(
            &manifest.id,
            &manifest.name,
            &manifest.image,
            manifest.digest.as_deref(),
            manifest.version.as_deref(),
            &spec_json,
        )
        .await
        .map_err(|e| match e {
            StoreError::Constraint(_) => ApiError::bad_request(
                format!("plugin '{}' is already registered", manifest.id),
                vec![],
            ),
            other => ApiError::internal(other.to_string(), state.development),
        })?;

    tracing::info!(plugin_id = %row.id, "plugin registered");
    let plugin = manifest_from_row(row, state.development)?;
    Ok((
        StatusCode::CREATED,
        Json(PluginResponse {
            message: "Plugin registered".to_string(),
            plugin,
        }),
    ))
}

/// GET /api/plugins - List registered plugins
#[utoipa::path(
    get,
    path = "/api/plugins",
    responses((status = 200, description = "Registered plugins", body = [PluginManifest])),
    tag = "plugins"
)]
pub async fn list_plugins(
    State(state): State<AppState>,
) -> Result<Json<serde_json::Value>, ApiError> {
    let rows = state
        .db
        .list_plugins()
        .await
        .map_err(|e| ApiError::internal(e.to_string(), state.development))?;

    let plugins = rows
        .into_iter()
        .map(|row| manifest_from_row(row, state.development))
        .collect::<Result<Vec<_>, _>>()?;

    Ok(Json(json!({ "plugins": plugins })))
}

/// GET /api/plugins/:id - One plugin by id
#[utoipa::path(
    get,
    path = "/api/plugins/{id}",
    params(("id" = String, Path, description = "Plugin ID")),
    responses(
        (status = 200, description = "Plugin found", body = PluginManifest),
        (status = 404, description = "Plugin not found")
    ),
    tag = "plugins"
)]
pub async fn get_plugin(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<PluginManifest>, ApiError> {
    let row = state
        .db
        .get_plugin(&id)
        .await
        .map_err(|e| ApiError::internal(e.to_string(), state.development))?
        .ok_or_else(|| ApiError::not_found(format!("plugin '{}' not found", id)))?;

    Ok(Json(manifest_from_row(row, state.development)?))
}

/// PUT /api/plugins/:id - Update digest, version, or spec
#[utoipa::path(
    put,
    path = "/api/plugins/{id}",
    params(("id" = String, Path, description = "Plugin ID")),
    request_body = UpdatePluginRequest,
    responses(
        (status = 200, description = "Plugin updated", body = PluginResponse),
        (status = 404, description = "Plugin not found")
    ),
    tag = "plugins"
)]
pub async fn update_plugin(
    State(state): State<AppState>,
    Path(id): Path<String>,
    Json(request): Json<UpdatePluginRequest>,
) -> Result<Json<PluginResponse>, ApiError> {
    let spec_json = request
        .spec
        .map(|s| serde_json::to_value(&s))
        .transpose()
        .map_err(|e| ApiError::internal(e.to_string(), state.development))?;

    let row = state
        .db
        .update_plugin(
            &id,
            UpdatePlugin {
                digest: request.digest,
                version: request.version,
                spec: spec_json,
            },
        )
        .await
        .map_err(|e| ApiError::internal(e.to_string(), state.development))?
        .ok_or_else(|| ApiError::not_found(format!("plugin '{}' not found", id)))?;

    // The engine memoises plugin specs; drop the stale entry
    state.engine.registry().invalidate(&id);

    tracing::info!(plugin_id = %id, "plugin updated");
    let plugin = manifest_from_row(row, state.development)?;
    Ok(Json(PluginResponse {
        message: "Plugin updated".to_string(),
        plugin,
    }))
}

fn manifest_from_row(row: PluginRow, development: bool) -> Result<PluginManifest, ApiError> {
    let spec: PluginSpec = serde_json::from_value(row.spec)
        .map_err(|e| ApiError::internal(e.to_string(), development))?;

    Ok(PluginManifest {
        id: row.id,
        name: row.name,
        image: row.image,
        digest: row.digest,
        version: row.version,
        spec,
    })
}
