//! Workflow engine: lifecycle orchestration
//!
//! The engine owns the execution state machine. `submit` validates and
//! persists a workflow, mints an execution, and enqueues it;
//! `process_execution` drives one leased execution through its steps in
//! topological order, recording tasks and events at every transition.
//!
//! Step failures are the engine's to handle: they fail the execution and
//! the queue row is still completed, because the engine did its job of
//! running the workflow to a terminal state. Only infrastructure errors
//! propagate to the queue for retry.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Weak};
use std::time::{Duration, Instant};

use conductor_contracts::{
    validate_workflow, EventKind, ExecutionDetail, ExecutionStatus, ExecutionSummary,
    ExecutionView, EventView, QueueStatsView, StatsView, SubmitResponse, TaskStatus, TaskView,
    ValidationError, WorkflowSpec,
};
use conductor_storage::{
    CreateTask, Database, EnqueueOptions, EventRow, ExecutionRow, ExecutionSummaryRow, StoreError,
    TaskQueue, TaskRow, UpdateExecution, UpdateTask,
};
use serde::{Deserialize, Serialize};
use serde_json::json;
use tokio::sync::{watch, Mutex};
use tokio::task::JoinHandle;
use tracing::{info, instrument, warn};
use uuid::Uuid;

use crate::adapter::AdapterRegistry;
use crate::executor::{ExecutorError, StepExecutor};
use crate::http::HttpDispatcher;
use crate::processor::{cleanup_loop, QueueProcessor};
use crate::registry::PluginRegistry;
use crate::resolver::{self, ResolverError};
use crate::template::{self, StepContext};

/// Engine errors, translated to HTTP status codes at the admission layer
#[derive(Debug, thiserror::Error)]
pub enum EngineError {
    /// Shape validation failed; every accumulated error is carried
    #[error("Workflow validation failed")]
    Validation(Vec<ValidationError>),

    /// Cycle or dangling dependency in the submitted DAG
    #[error(transparent)]
    Resolver(#[from] ResolverError),

    /// A step references an unregistered plugin
    #[error("Plugin not found: {0}")]
    PluginNotFound(String),

    /// A step names an action outside the plugin's whitelist
    #[error("Action '{action}' is not exposed by plugin '{plugin}'")]
    ActionNotExposed { plugin: String, action: String },

    #[error("not found: {0}")]
    NotFound(Uuid),

    /// Queue key collision on submission: a bug, not a user error
    #[error("duplicate queue key for execution {0}")]
    Conflict(Uuid),

    #[error("engine is not running")]
    Stopped,

    #[error("store error: {0}")]
    Store(#[from] StoreError),

    #[error("invalid document: {0}")]
    Serialization(#[from] serde_json::Error),
}

/// Payload carried by a queue row: the execution descriptor
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExecutionPayload {
    #[serde(rename = "executionId")]
    pub execution_id: Uuid,
    #[serde(rename = "workflowId")]
    pub workflow_id: Uuid,
}

/// Engine tuning knobs
#[derive(Debug, Clone)]
pub struct EngineConfig {
    /// Queue poll interval
    pub tick_interval: Duration,

    /// How often terminal queue rows are garbage collected
    pub cleanup_interval: Duration,

    /// Terminal queue rows older than this are deleted
    pub cleanup_age: Duration,

    /// How long `stop` waits for the in-flight handler
    pub shutdown_grace: Duration,

    /// Environment-level namespace for composed plugin service URLs
    pub default_namespace: Option<String>,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            tick_interval: Duration::from_secs(1),
            cleanup_interval: Duration::from_secs(60 * 60),
            cleanup_age: Duration::from_secs(24 * 60 * 60),
            shutdown_grace: Duration::from_secs(5),
            default_namespace: None,
        }
    }
}

impl EngineConfig {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_tick_interval(mut self, interval: Duration) -> Self {
        self.tick_interval = interval;
        self
    }

    pub fn with_cleanup(mut self, interval: Duration, age: Duration) -> Self {
        self.cleanup_interval = interval;
        self.cleanup_age = age;
        self
    }

    pub fn with_shutdown_grace(mut self, grace: Duration) -> Self {
        self.shutdown_grace = grace;
        self
    }

    pub fn with_default_namespace(mut self, namespace: Option<String>) -> Self {
        self.default_namespace = namespace;
        self
    }
}

struct EngineRuntime {
    shutdown_tx: watch::Sender<bool>,
    processor: JoinHandle<()>,
    cleanup: JoinHandle<()>,
}

pub struct WorkflowEngine {
    db: Database,
    queue: TaskQueue,
    registry: Arc<PluginRegistry>,
    executor: StepExecutor,
    config: EngineConfig,
    running: AtomicBool,
    runtime: Mutex<Option<EngineRuntime>>,
    // Handle to ourselves for the spawned processor task
    weak: Weak<WorkflowEngine>,
}

impl WorkflowEngine {
    pub fn new(db: Database, adapters: AdapterRegistry, config: EngineConfig) -> Arc<Self> {
        let queue = TaskQueue::new(db.pool().clone());
        let registry = Arc::new(PluginRegistry::new(db.clone()));
        let http = HttpDispatcher::new(config.default_namespace.clone());
        let executor = StepExecutor::new(Arc::clone(&registry), adapters, http);

        Arc::new_cyclic(|weak| Self {
            db,
            queue,
            registry,
            executor,
            config,
            running: AtomicBool::new(false),
            runtime: Mutex::new(None),
            weak: weak.clone(),
        })
    }

    pub fn registry(&self) -> &Arc<PluginRegistry> {
        &self.registry
    }

    pub(crate) fn queue(&self) -> &TaskQueue {
        &self.queue
    }

    pub(crate) fn config(&self) -> &EngineConfig {
        &self.config
    }

    pub fn is_running(&self) -> bool {
        self.running.load(Ordering::SeqCst)
    }

    /// Begin draining the queue and garbage-collecting terminal rows.
    /// A second start is a no-op with a warning.
    pub async fn start(&self) {
        // Always succeeds: the engine is only reachable through its Arc
        let Some(engine) = self.weak.upgrade() else {
            return;
        };
        if self.running.swap(true, Ordering::SeqCst) {
            warn!("engine already started");
            return;
        }

        let (shutdown_tx, shutdown_rx) = watch::channel(false);
        let processor = QueueProcessor::new(engine, shutdown_rx.clone());
        let processor = tokio::spawn(processor.run());
        let cleanup = tokio::spawn(cleanup_loop(
            self.queue.clone(),
            self.config.cleanup_interval,
            self.config.cleanup_age,
            shutdown_rx,
        ));

        *self.runtime.lock().await = Some(EngineRuntime {
            shutdown_tx,
            processor,
            cleanup,
        });
        info!("workflow engine started");
    }

    /// Stop accepting leases, let the in-flight handler finish within the
    /// grace period, and halt the cleanup timer. Idempotent.
    pub async fn stop(&self) {
        if !self.running.swap(false, Ordering::SeqCst) {
            return;
        }

        let runtime = self.runtime.lock().await.take();
        if let Some(mut runtime) = runtime {
            let _ = runtime.shutdown_tx.send(true);

            if tokio::time::timeout(self.config.shutdown_grace, &mut runtime.processor)
                .await
                .is_err()
            {
                warn!(
                    grace_ms = self.config.shutdown_grace.as_millis() as u64,
                    "queue processor did not stop within grace period, aborting"
                );
                runtime.processor.abort();
            }
            runtime.cleanup.abort();
        }
        info!("workflow engine stopped");
    }

    /// Validate a workflow and persist workflow + pending execution +
    /// `workflow_submitted` event + queue row atomically.
    #[instrument(skip(self, spec), fields(workflow = %spec.name))]
    pub async fn submit(&self, spec: WorkflowSpec) -> Result<SubmitResponse, EngineError> {
        if !self.is_running() {
            return Err(EngineError::Stopped);
        }

        let shape_errors = validate_workflow(&spec);
        if !shape_errors.is_empty() {
            return Err(EngineError::Validation(shape_errors));
        }
        resolver::resolve(&spec)?;

        for step in &spec.steps {
            let manifest = self
                .registry
                .get(&step.plugin)
                .await?
                .ok_or_else(|| EngineError::PluginNotFound(step.plugin.clone()))?;
            if !manifest.spec.allows_action(&step.action) {
                return Err(EngineError::ActionNotExposed {
                    plugin: step.plugin.clone(),
                    action: step.action.clone(),
                });
            }
        }

        let workflow_id = Uuid::now_v7();
        let execution_id = Uuid::now_v7();
        let spec_json = serde_json::to_value(&spec)?;
        let payload = serde_json::to_value(ExecutionPayload {
            execution_id,
            workflow_id,
        })?;

        let accepted = self
            .db
            .create_submission(
                workflow_id,
                &spec.name,
                &spec_json,
                execution_id,
                &payload,
                &EnqueueOptions::default(),
            )
            .await?;
        if !accepted {
            return Err(EngineError::Conflict(execution_id));
        }

        info!(%execution_id, %workflow_id, steps = spec.steps.len(), "workflow submitted");
        Ok(SubmitResponse {
            execution_id,
            workflow_id,
        })
    }

    /// Full status of one execution: the row plus its tasks and events
    pub async fn status(&self, execution_id: Uuid) -> Result<Option<ExecutionDetail>, EngineError> {
        let Some(execution) = self.db.get_execution(execution_id).await? else {
            return Ok(None);
        };
        let tasks = self.db.get_tasks_by_execution(execution_id).await?;
        let events = self.db.get_events_by_execution(execution_id).await?;

        Ok(Some(ExecutionDetail {
            execution: execution_view(execution),
            tasks: tasks.into_iter().map(task_view).collect(),
            events: events.into_iter().map(event_view).collect(),
        }))
    }

    /// Newest executions first, joined with workflow names
    pub async fn list_executions(&self, limit: i64) -> Result<Vec<ExecutionSummary>, EngineError> {
        let rows = self.db.list_executions(limit).await?;
        Ok(rows.into_iter().map(execution_summary).collect())
    }

    /// Queue and execution counters
    pub async fn stats(&self) -> Result<StatsView, EngineError> {
        let queue = self.queue.stats().await?;
        let executions = self.db.execution_stats().await?;

        Ok(StatsView {
            queue: QueueStatsView {
                pending: queue.pending,
                processing: queue.processing,
                completed: queue.completed,
                failed: queue.failed,
            },
            executions,
        })
    }

    /// Drive one leased execution end-to-end.
    ///
    /// Steps run sequentially in topological order. Any step failure fails
    /// the whole execution; prior successful step records remain. Returns
    /// Err only on infrastructure failures, which the queue retries.
    #[instrument(skip(self))]
    pub async fn process_execution(&self, execution_id: Uuid) -> Result<(), EngineError> {
        let execution = self
            .db
            .get_execution(execution_id)
            .await?
            .ok_or(EngineError::NotFound(execution_id))?;
        if execution.status().is_terminal() {
            warn!(%execution_id, "execution already terminal, skipping");
            return Ok(());
        }

        let workflow = self
            .db
            .get_workflow(execution.workflow_id)
            .await?
            .ok_or(EngineError::NotFound(execution.workflow_id))?;
        let spec: WorkflowSpec = serde_json::from_value(workflow.spec)?;

        self.db
            .update_execution(
                execution_id,
                UpdateExecution {
                    status: Some(ExecutionStatus::Running),
                    ..Default::default()
                },
            )
            .await?;
        self.db
            .create_event(
                execution_id,
                EventKind::ExecutionStarted,
                json!({ "workflowId": execution.workflow_id, "name": workflow.name }),
            )
            .await?;
        info!(%execution_id, workflow = %workflow.name, "execution started");

        let order = match resolver::resolve(&spec) {
            Ok(order) => order,
            // Admission validates the DAG, so this only fires for rows
            // persisted by an incompatible writer
            Err(e) => {
                self.finish_failed(execution_id, &e.to_string()).await?;
                return Ok(());
            }
        };

        let mut ctx = StepContext::new();
        let mut failure: Option<String> = None;

        for step_id in &order {
            let Some(step) = spec.steps.iter().find(|s| &s.id == step_id) else {
                continue;
            };

            let resolved = template::resolve(&step.input, &ctx);
            let task = self
                .db
                .create_task(CreateTask {
                    execution_id,
                    step_id: step.id.clone(),
                    plugin_id: step.plugin.clone(),
                    action: step.action.clone(),
                    input: Some(resolved.clone()),
                })
                .await?;
            self.db
                .update_task(
                    task.id,
                    UpdateTask {
                        status: Some(TaskStatus::Running),
                        ..Default::default()
                    },
                )
                .await?;
            self.db
                .create_event(
                    execution_id,
                    EventKind::StepStarted,
                    json!({ "stepId": step.id, "plugin": step.plugin, "action": step.action }),
                )
                .await?;

            let started = Instant::now();
            match self.executor.execute_resolved(step, &resolved).await {
                Ok(success) => {
                    let duration_ms = started.elapsed().as_millis() as u64;
                    self.db
                        .update_task(
                            task.id,
                            UpdateTask {
                                status: Some(TaskStatus::Completed),
                                result: Some(success.result.clone()),
                                attempts: Some(success.attempts),
                                ..Default::default()
                            },
                        )
                        .await?;
                    self.db
                        .create_event(
                            execution_id,
                            EventKind::StepCompleted,
                            json!({
                                "stepId": step.id,
                                "attempts": success.attempts,
                                "durationMs": duration_ms,
                            }),
                        )
                        .await?;
                    info!(%execution_id, step_id = %step.id, duration_ms, "step completed");
                    ctx.insert(step.id.clone(), success.result);
                }
                Err(step_failure) => {
                    let duration_ms = started.elapsed().as_millis() as u64;
                    let attempts = step_failure.attempts.max(1);
                    match step_failure.error {
                        ExecutorError::Store(e) => return Err(EngineError::Store(e)),
                        other => {
                            let message = other.to_string();
                            self.db
                                .update_task(
                                    task.id,
                                    UpdateTask {
                                        status: Some(TaskStatus::Failed),
                                        error: Some(message.clone()),
                                        attempts: Some(attempts),
                                        ..Default::default()
                                    },
                                )
                                .await?;
                            self.db
                                .create_event(
                                    execution_id,
                                    EventKind::StepFailed,
                                    json!({
                                        "stepId": step.id,
                                        "error": message,
                                        "attempts": attempts,
                                        "durationMs": duration_ms,
                                    }),
                                )
                                .await?;
                            warn!(%execution_id, step_id = %step.id, %message, "step failed");
                            failure = Some(message);
                        }
                    }
                    break;
                }
            }
        }

        match failure {
            None => {
                let result = ctx.into_result_map();
                self.db
                    .update_execution(
                        execution_id,
                        UpdateExecution {
                            status: Some(ExecutionStatus::Completed),
                            result: Some(result.clone()),
                            ..Default::default()
                        },
                    )
                    .await?;
                self.db
                    .create_event(
                        execution_id,
                        EventKind::ExecutionCompleted,
                        json!({ "result": result }),
                    )
                    .await?;
                info!(%execution_id, "execution completed");
            }
            Some(message) => {
                self.finish_failed(execution_id, &message).await?;
            }
        }

        Ok(())
    }

    async fn finish_failed(&self, execution_id: Uuid, message: &str) -> Result<(), EngineError> {
        self.db
            .update_execution(
                execution_id,
                UpdateExecution {
                    status: Some(ExecutionStatus::Failed),
                    error: Some(message.to_string()),
                    ..Default::default()
                },
            )
            .await?;
        self.db
            .create_event(
                execution_id,
                EventKind::ExecutionFailed,
                json!({ "error": message }),
            )
            .await?;
        info!(%execution_id, error = %message, "execution failed");
        Ok(())
    }
}

fn execution_view(row: ExecutionRow) -> ExecutionView {
    ExecutionView {
        id: row.id,
        workflow_id: row.workflow_id,
        status: row.status(),
        result: row.result,
        error: row.error,
        started_at: Some(row.started_at),
        completed_at: row.completed_at,
    }
}

fn execution_summary(row: ExecutionSummaryRow) -> ExecutionSummary {
    ExecutionSummary {
        id: row.id,
        workflow_id: row.workflow_id,
        workflow_name: row.workflow_name,
        status: row.status.parse().unwrap_or(ExecutionStatus::Pending),
        started_at: Some(row.started_at),
        completed_at: row.completed_at,
    }
}

fn task_view(row: TaskRow) -> TaskView {
    TaskView {
        id: row.id,
        execution_id: row.execution_id,
        step_id: row.step_id.clone(),
        plugin_id: row.plugin_id.clone(),
        action: row.action.clone(),
        status: row.status(),
        input: row.input,
        result: row.result,
        error: row.error,
        attempts: row.attempts.max(0) as u32,
        started_at: row.started_at,
        completed_at: row.completed_at,
    }
}

fn event_view(row: EventRow) -> EventView {
    EventView {
        id: row.id,
        execution_id: row.execution_id,
        kind: row.kind,
        data: row.data,
        timestamp: row.timestamp,
    }
}
