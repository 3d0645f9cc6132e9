// End-to-end engine tests against an in-memory store and in-process adapters

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use conductor_contracts::{
    BackoffKind, ExecutionDetail, ExecutionStatus, StepRetry, StepSpec, TaskStatus, WorkflowSpec,
};
use conductor_engine::{
    AdapterError, AdapterRegistry, EchoAdapter, EngineConfig, EngineError, PluginAdapter,
    WorkflowEngine,
};
use conductor_storage::Database;
use serde_json::{json, Value};
use tokio::sync::Mutex;
use uuid::Uuid;

/// Fails transiently once, then echoes
struct FlakyAdapter {
    remaining_failures: Mutex<u32>,
}

#[async_trait]
impl PluginAdapter for FlakyAdapter {
    async fn call(&self, _action: &str, input: Value) -> Result<Value, AdapterError> {
        let mut remaining = self.remaining_failures.lock().await;
        if *remaining > 0 {
            *remaining -= 1;
            return Err(AdapterError::Transient("connection refused".to_string()));
        }
        Ok(input)
    }
}

/// Always fails permanently
struct BoomAdapter;

#[async_trait]
impl PluginAdapter for BoomAdapter {
    async fn call(&self, _action: &str, _input: Value) -> Result<Value, AdapterError> {
        Err(AdapterError::Permanent("bad things happened".to_string()))
    }
}

/// Returns a fixed value and records every input it receives
struct RecordingAdapter {
    result: Value,
    calls: Mutex<Vec<Value>>,
}

#[async_trait]
impl PluginAdapter for RecordingAdapter {
    async fn call(&self, _action: &str, input: Value) -> Result<Value, AdapterError> {
        self.calls.lock().await.push(input);
        Ok(self.result.clone())
    }
}

async fn engine_with(
    plugins: &[&str],
    adapters: AdapterRegistry,
) -> (Database, Arc<WorkflowEngine>) {
    let db = Database::in_memory().await.unwrap();
    for id in plugins {
        db.create_plugin(
            id,
            id,
            "conductor/test:1",
            None,
            None,
            &json!({"exposes": ["run"]}),
        )
        .await
        .unwrap();
    }

    let config = EngineConfig::new()
        .with_tick_interval(Duration::from_millis(20))
        .with_shutdown_grace(Duration::from_millis(500));
    let engine = WorkflowEngine::new(db.clone(), adapters, config);
    (db, engine)
}

fn step(id: &str, plugin: &str, needs: &[&str]) -> StepSpec {
    StepSpec {
        id: id.to_string(),
        plugin: plugin.to_string(),
        action: "run".to_string(),
        input: json!({ "step": id }),
        needs: needs.iter().map(|s| s.to_string()).collect(),
        timeout_ms: None,
        retry: None,
    }
}

fn workflow(name: &str, steps: Vec<StepSpec>) -> WorkflowSpec {
    WorkflowSpec {
        name: name.to_string(),
        steps,
    }
}

async fn wait_for_terminal(engine: &WorkflowEngine, execution_id: Uuid) -> ExecutionDetail {
    for _ in 0..400 {
        if let Some(detail) = engine.status(execution_id).await.unwrap() {
            if detail.execution.status.is_terminal() {
                return detail;
            }
        }
        tokio::time::sleep(Duration::from_millis(25)).await;
    }
    panic!("execution {} did not reach a terminal state", execution_id);
}

fn event_kinds(detail: &ExecutionDetail) -> Vec<&str> {
    detail.events.iter().map(|e| e.kind.as_str()).collect()
}

#[tokio::test]
async fn linear_workflow_completes_in_order() {
    let mut adapters = AdapterRegistry::new();
    adapters.register("echo", Arc::new(EchoAdapter));
    let (_db, engine) = engine_with(&["echo"], adapters).await;
    engine.start().await;

    let spec = workflow(
        "lin",
        vec![
            step("a", "echo", &[]),
            step("b", "echo", &["a"]),
            step("c", "echo", &["b"]),
        ],
    );
    let accepted = engine.submit(spec).await.unwrap();
    let detail = wait_for_terminal(&engine, accepted.execution_id).await;

    assert_eq!(detail.execution.status, ExecutionStatus::Completed);
    assert!(detail.execution.completed_at.is_some());
    assert!(detail.execution.error.is_none());

    let step_ids: Vec<&str> = detail.tasks.iter().map(|t| t.step_id.as_str()).collect();
    assert_eq!(step_ids, vec!["a", "b", "c"]);
    for task in &detail.tasks {
        assert_eq!(task.status, TaskStatus::Completed);
        assert_eq!(task.attempts, 1);
        assert!(task.completed_at.unwrap() >= task.started_at.unwrap());
    }

    assert_eq!(
        event_kinds(&detail),
        vec![
            "workflow_submitted",
            "execution_started",
            "step_started",
            "step_completed",
            "step_started",
            "step_completed",
            "step_started",
            "step_completed",
            "execution_completed",
        ]
    );

    // The aggregate result carries every step's result
    let result = detail.execution.result.as_ref().unwrap();
    assert_eq!(result["a"], json!({ "step": "a" }));
    assert_eq!(result["c"], json!({ "step": "c" }));

    // The queue row is completed because the engine ran the workflow
    let stats = engine.stats().await.unwrap();
    assert_eq!(stats.queue.completed, 1);
    assert_eq!(stats.queue.failed, 0);

    engine.stop().await;
}

#[tokio::test]
async fn results_flow_through_templates() {
    let mut adapters = AdapterRegistry::new();
    adapters.register(
        "source",
        Arc::new(RecordingAdapter {
            result: json!({ "url": "https://ex/x" }),
            calls: Mutex::new(vec![]),
        }),
    );
    let sink = Arc::new(RecordingAdapter {
        result: json!("stored"),
        calls: Mutex::new(vec![]),
    });
    adapters.register("sink", sink.clone());

    let (_db, engine) = engine_with(&["source", "sink"], adapters).await;
    engine.start().await;

    let mut fetch = step("fetch", "source", &[]);
    fetch.input = json!({});
    let mut store = step("store", "sink", &["fetch"]);
    store.input = json!({ "u": "{{ steps.fetch.result.url }}" });

    let accepted = engine
        .submit(workflow("handoff", vec![fetch, store]))
        .await
        .unwrap();
    let detail = wait_for_terminal(&engine, accepted.execution_id).await;
    assert_eq!(detail.execution.status, ExecutionStatus::Completed);

    let calls = sink.calls.lock().await;
    assert_eq!(calls.as_slice(), &[json!({ "u": "https://ex/x" })]);

    // The resolved input is what the task record keeps
    let store_task = detail.tasks.iter().find(|t| t.step_id == "store").unwrap();
    assert_eq!(store_task.input, Some(json!({ "u": "https://ex/x" })));

    engine.stop().await;
}

#[tokio::test]
async fn failing_step_fails_execution_and_skips_the_rest() {
    let mut adapters = AdapterRegistry::new();
    adapters.register("echo", Arc::new(EchoAdapter));
    adapters.register("boom", Arc::new(BoomAdapter));
    let (_db, engine) = engine_with(&["echo", "boom"], adapters).await;
    engine.start().await;

    let spec = workflow(
        "doomed",
        vec![
            step("a", "echo", &[]),
            step("b", "boom", &["a"]),
            step("c", "echo", &["b"]),
        ],
    );
    let accepted = engine.submit(spec).await.unwrap();
    let detail = wait_for_terminal(&engine, accepted.execution_id).await;

    assert_eq!(detail.execution.status, ExecutionStatus::Failed);
    assert!(detail.execution.result.is_none());
    assert!(detail
        .execution
        .error
        .as_ref()
        .unwrap()
        .contains("bad things happened"));

    // Prior successful records remain; the step after the failure never ran
    assert_eq!(detail.tasks.len(), 2);
    assert_eq!(detail.tasks[0].step_id, "a");
    assert_eq!(detail.tasks[0].status, TaskStatus::Completed);
    assert_eq!(detail.tasks[1].step_id, "b");
    assert_eq!(detail.tasks[1].status, TaskStatus::Failed);
    assert!(detail.tasks[1].attempts >= 1);

    let kinds = event_kinds(&detail);
    assert_eq!(kinds.last(), Some(&"execution_failed"));
    let terminal = kinds
        .iter()
        .filter(|k| **k == "execution_completed" || **k == "execution_failed")
        .count();
    assert_eq!(terminal, 1);

    // Step failure is handled by the engine: the queue row still completes
    let stats = engine.stats().await.unwrap();
    assert_eq!(stats.queue.completed, 1);
    assert_eq!(stats.queue.failed, 0);

    engine.stop().await;
}

#[tokio::test]
async fn step_retry_recovers_from_a_transient_failure() {
    let mut adapters = AdapterRegistry::new();
    adapters.register(
        "flaky",
        Arc::new(FlakyAdapter {
            remaining_failures: Mutex::new(1),
        }),
    );
    let (_db, engine) = engine_with(&["flaky"], adapters).await;
    engine.start().await;

    let mut retried = step("only", "flaky", &[]);
    retried.retry = Some(StepRetry {
        max_attempts: 2,
        backoff: BackoffKind::Fixed,
    });

    let accepted = engine.submit(workflow("retry", vec![retried])).await.unwrap();
    let detail = wait_for_terminal(&engine, accepted.execution_id).await;

    assert_eq!(detail.execution.status, ExecutionStatus::Completed);
    assert_eq!(detail.tasks[0].attempts, 2);

    engine.stop().await;
}

#[tokio::test]
async fn submit_rejects_invalid_workflows() {
    let mut adapters = AdapterRegistry::new();
    adapters.register("echo", Arc::new(EchoAdapter));
    let (_db, engine) = engine_with(&["echo"], adapters).await;
    engine.start().await;

    // Cycle
    let err = engine
        .submit(workflow(
            "cyc",
            vec![step("a", "echo", &["b"]), step("b", "echo", &["a"])],
        ))
        .await
        .unwrap_err();
    assert!(matches!(err, EngineError::Resolver(_)));
    assert!(err.to_string().contains("Cycle"));

    // Dangling dependency
    let err = engine
        .submit(workflow("ghost", vec![step("a", "echo", &["ghost"])]))
        .await
        .unwrap_err();
    assert!(err.to_string().contains("Dependency not found"));

    // Shape failure
    let err = engine
        .submit(workflow("bad name!", vec![step("a", "echo", &[])]))
        .await
        .unwrap_err();
    match err {
        EngineError::Validation(details) => assert!(!details.is_empty()),
        other => panic!("expected validation error, got {:?}", other),
    }

    // Unregistered plugin
    let err = engine
        .submit(workflow("nope", vec![step("a", "ghost-plugin", &[])]))
        .await
        .unwrap_err();
    assert!(matches!(err, EngineError::PluginNotFound(_)));

    // Action outside the whitelist
    let mut bad_action = step("a", "echo", &[]);
    bad_action.action = "drop".to_string();
    let err = engine
        .submit(workflow("denied", vec![bad_action]))
        .await
        .unwrap_err();
    assert!(matches!(err, EngineError::ActionNotExposed { .. }));

    engine.stop().await;
}

#[tokio::test]
async fn submit_is_rejected_while_stopped() {
    let mut adapters = AdapterRegistry::new();
    adapters.register("echo", Arc::new(EchoAdapter));
    let (_db, engine) = engine_with(&["echo"], adapters).await;

    let spec = workflow("early", vec![step("a", "echo", &[])]);
    let err = engine.submit(spec.clone()).await.unwrap_err();
    assert!(matches!(err, EngineError::Stopped));

    engine.start().await;
    engine.submit(spec.clone()).await.unwrap();
    engine.stop().await;

    let err = engine.submit(spec).await.unwrap_err();
    assert!(matches!(err, EngineError::Stopped));
}

#[tokio::test]
async fn start_and_stop_are_idempotent() {
    let mut adapters = AdapterRegistry::new();
    adapters.register("echo", Arc::new(EchoAdapter));
    let (_db, engine) = engine_with(&["echo"], adapters).await;

    engine.start().await;
    engine.start().await;
    assert!(engine.is_running());

    let accepted = engine
        .submit(workflow("once", vec![step("a", "echo", &[])]))
        .await
        .unwrap();
    wait_for_terminal(&engine, accepted.execution_id).await;

    engine.stop().await;
    engine.stop().await;
    assert!(!engine.is_running());
}

#[tokio::test]
async fn terminal_executions_are_not_reprocessed() {
    let mut adapters = AdapterRegistry::new();
    adapters.register("echo", Arc::new(EchoAdapter));
    let (_db, engine) = engine_with(&["echo"], adapters).await;
    engine.start().await;

    let accepted = engine
        .submit(workflow("done", vec![step("a", "echo", &[])]))
        .await
        .unwrap();
    let detail = wait_for_terminal(&engine, accepted.execution_id).await;
    let tasks_before = detail.tasks.len();
    let events_before = detail.events.len();

    // A second lease of the same execution is a no-op
    engine.process_execution(accepted.execution_id).await.unwrap();

    let detail = engine
        .status(accepted.execution_id)
        .await
        .unwrap()
        .unwrap();
    assert_eq!(detail.tasks.len(), tasks_before);
    assert_eq!(detail.events.len(), events_before);

    engine.stop().await;
}

#[tokio::test]
async fn unknown_execution_status_is_none() {
    let (_db, engine) = engine_with(&[], AdapterRegistry::new()).await;
    assert!(engine.status(Uuid::now_v7()).await.unwrap().is_none());
}
