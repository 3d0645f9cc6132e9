// Conductor API server
// Thin admission surface over the workflow engine and the store

mod config;
mod error;
mod executions;
mod health;
mod plugins;
mod stats;
mod workflows;

use anyhow::{Context, Result};
use axum::Router;
use conductor_engine::{AdapterRegistry, EngineConfig, WorkflowEngine};
use conductor_storage::Database;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};
use utoipa::OpenApi;
use utoipa_swagger_ui::SwaggerUi;

use crate::config::Config;

/// OpenAPI documentation
#[derive(OpenApi)]
#[openapi(
    paths(
        workflows::submit_workflow,
        workflows::get_workflow_status,
        executions::list_executions,
        executions::get_execution,
        plugins::register_plugin,
        plugins::list_plugins,
        plugins::get_plugin,
        plugins::update_plugin,
        stats::get_stats,
        health::get_health,
    ),
    components(
        schemas(
            conductor_contracts::WorkflowSpec,
            conductor_contracts::StepSpec,
            conductor_contracts::StepRetry,
            conductor_contracts::BackoffKind,
            conductor_contracts::PluginManifest,
            conductor_contracts::PluginSpec,
            conductor_contracts::ExecutionStatus,
            conductor_contracts::TaskStatus,
            conductor_contracts::ExecutionView,
            conductor_contracts::ExecutionSummary,
            conductor_contracts::TaskView,
            conductor_contracts::EventView,
            conductor_contracts::ExecutionDetail,
            conductor_contracts::SubmitResponse,
            conductor_contracts::StatsView,
            conductor_contracts::QueueStatsView,
            conductor_contracts::HealthView,
            conductor_contracts::ValidationError,
            plugins::UpdatePluginRequest,
            plugins::PluginResponse,
        )
    ),
    tags(
        (name = "workflows", description = "Workflow submission and status"),
        (name = "executions", description = "Execution inspection"),
        (name = "plugins", description = "Plugin registration"),
        (name = "stats", description = "Queue and execution counters"),
        (name = "health", description = "Aggregated health")
    ),
    info(
        title = "Conductor API",
        version = "0.2.0",
        description = "Declarative workflow orchestration over registered plugins",
        license(name = "MIT", url = "https://opensource.org/licenses/MIT")
    )
)]
struct ApiDoc;

#[tokio::main]
async fn main() -> Result<()> {
    dotenvy::dotenv().ok();

    // Initialize tracing
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "conductor=debug,tower_http=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    tracing::info!("conductor starting...");

    let config = Config::from_env();

    // Open the store (created on first run)
    let db = Database::from_path(&config.db_path)
        .await
        .context("Failed to open store")?;
    tracing::info!(db_path = %config.db_path, "store opened");

    // Plugins are reached over HTTP by default; typed in-process adapters
    // would be registered here
    let adapters = AdapterRegistry::new();

    let engine_config =
        EngineConfig::new().with_default_namespace(config.kube_namespace.clone());
    let engine = WorkflowEngine::new(db.clone(), adapters, engine_config);
    engine.start().await;

    // Build router
    let app = Router::new()
        .merge(workflows::routes(workflows::AppState {
            engine: engine.clone(),
            development: config.development,
        }))
        .merge(executions::routes(executions::AppState {
            engine: engine.clone(),
            development: config.development,
        }))
        .merge(plugins::routes(plugins::AppState {
            db: db.clone(),
            engine: engine.clone(),
            development: config.development,
        }))
        .merge(stats::routes(stats::AppState {
            engine: engine.clone(),
            development: config.development,
        }))
        .merge(health::routes(health::AppState {
            db: db.clone(),
            engine: engine.clone(),
        }))
        .merge(SwaggerUi::new("/swagger-ui").url("/api-doc/openapi.json", ApiDoc::openapi()))
        .layer(
            CorsLayer::new()
                .allow_origin(Any)
                .allow_methods(Any)
                .allow_headers(Any),
        )
        .layer(TraceLayer::new_for_http());

    // Start server
    let addr = config.bind_addr();
    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .context("Failed to bind to address")?;
    tracing::info!("Listening on {}", addr);

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("Server error")?;

    // Drain in-flight work, then close the store
    engine.stop().await;
    db.close().await;
    tracing::info!("conductor stopped");

    Ok(())
}

/// Resolves on SIGINT or SIGTERM
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            tracing::error!("failed to install SIGINT handler: {}", e);
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(e) => {
                tracing::error!("failed to install SIGTERM handler: {}", e);
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }
    tracing::info!("shutdown signal received");
}
