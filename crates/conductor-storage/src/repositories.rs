// Repository layer for database operations
//
// One `Database` over a SQLite pool. Every write is a single statement or an
// explicit transaction; constraint violations surface as StoreError::Constraint.

use std::collections::HashMap;
use std::str::FromStr;
use std::time::Duration;

use chrono::Utc;
use conductor_contracts::EventKind;
use sqlx::sqlite::{SqliteConnectOptions, SqliteJournalMode, SqlitePoolOptions};
use sqlx::{Row, SqlitePool};
use tracing::{debug, instrument};
use uuid::Uuid;

use crate::error::StoreError;
use crate::models::*;
use crate::queue::EnqueueOptions;

/// Schema bootstrap, applied idempotently at startup
const SCHEMA: &[&str] = &[
    r#"
    CREATE TABLE IF NOT EXISTS plugins (
        id         TEXT PRIMARY KEY,
        name       TEXT NOT NULL,
        image      TEXT NOT NULL,
        digest     TEXT,
        version    TEXT,
        spec       TEXT NOT NULL,
        created_at TEXT NOT NULL,
        updated_at TEXT NOT NULL
    )
    "#,
    r#"
    CREATE TABLE IF NOT EXISTS workflows (
        id         BLOB PRIMARY KEY,
        name       TEXT NOT NULL,
        spec       TEXT NOT NULL,
        created_at TEXT NOT NULL
    )
    "#,
    r#"
    CREATE TABLE IF NOT EXISTS executions (
        id           BLOB PRIMARY KEY,
        workflow_id  BLOB NOT NULL REFERENCES workflows(id),
        status       TEXT NOT NULL DEFAULT 'pending',
        result       TEXT,
        error        TEXT,
        started_at   TEXT NOT NULL,
        completed_at TEXT,
        created_at   TEXT NOT NULL
    )
    "#,
    r#"
    CREATE TABLE IF NOT EXISTS tasks (
        id           BLOB PRIMARY KEY,
        execution_id BLOB NOT NULL REFERENCES executions(id),
        step_id      TEXT NOT NULL,
        plugin_id    TEXT NOT NULL REFERENCES plugins(id),
        action       TEXT NOT NULL,
        status       TEXT NOT NULL DEFAULT 'pending',
        input        TEXT,
        result       TEXT,
        error        TEXT,
        attempts     INTEGER NOT NULL DEFAULT 0,
        started_at   TEXT,
        completed_at TEXT,
        created_at   TEXT NOT NULL
    )
    "#,
    r#"
    CREATE TABLE IF NOT EXISTS events (
        id           INTEGER PRIMARY KEY AUTOINCREMENT,
        execution_id BLOB NOT NULL REFERENCES executions(id),
        kind         TEXT NOT NULL,
        data         TEXT NOT NULL,
        timestamp    TEXT NOT NULL
    )
    "#,
    r#"
    CREATE TABLE IF NOT EXISTS task_queue (
        id           INTEGER PRIMARY KEY AUTOINCREMENT,
        task_id      BLOB NOT NULL UNIQUE,
        priority     INTEGER NOT NULL DEFAULT 0,
        payload      TEXT NOT NULL,
        max_retries  INTEGER NOT NULL DEFAULT 3,
        retry_count  INTEGER NOT NULL DEFAULT 0,
        status       TEXT NOT NULL DEFAULT 'pending',
        scheduled_at TEXT NOT NULL,
        started_at   TEXT,
        completed_at TEXT,
        created_at   TEXT NOT NULL
    )
    "#,
    "CREATE INDEX IF NOT EXISTS idx_task_queue_eligible ON task_queue(status, scheduled_at)",
    "CREATE INDEX IF NOT EXISTS idx_tasks_execution ON tasks(execution_id, created_at)",
    "CREATE INDEX IF NOT EXISTS idx_events_execution ON events(execution_id, id)",
    "CREATE INDEX IF NOT EXISTS idx_executions_started ON executions(started_at)",
];

#[derive(Clone)]
pub struct Database {
    pool: SqlitePool,
}

impl Database {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    /// Open (or create) the store at `path` with WAL journaling and
    /// foreign-key enforcement, then apply the schema.
    pub async fn from_path(path: &str) -> Result<Self, StoreError> {
        let options = SqliteConnectOptions::new()
            .filename(path)
            .create_if_missing(true)
            .journal_mode(SqliteJournalMode::Wal)
            .foreign_keys(true)
            .busy_timeout(Duration::from_secs(5));

        let pool = SqlitePoolOptions::new()
            .max_connections(5)
            .connect_with(options)
            .await?;

        let db = Self { pool };
        db.migrate().await?;
        Ok(db)
    }

    /// Private in-memory store for tests
    pub async fn in_memory() -> Result<Self, StoreError> {
        let options = SqliteConnectOptions::from_str("sqlite::memory:")
            .map_err(|e| StoreError::Database(e.to_string()))?
            .foreign_keys(true);

        // One pinned connection: an in-memory database lives and dies with
        // its connection, so the pool must never recycle it
        let pool = SqlitePoolOptions::new()
            .max_connections(1)
            .min_connections(1)
            .idle_timeout(None)
            .max_lifetime(None)
            .connect_with(options)
            .await?;

        let db = Self { pool };
        db.migrate().await?;
        Ok(db)
    }

    pub fn pool(&self) -> &SqlitePool {
        &self.pool
    }

    /// Apply the schema; safe to call on every startup
    pub async fn migrate(&self) -> Result<(), StoreError> {
        for statement in SCHEMA {
            sqlx::query(statement).execute(&self.pool).await?;
        }
        debug!("schema applied");
        Ok(())
    }

    /// Cheap reachability probe for the health endpoint
    pub async fn ping(&self) -> Result<(), StoreError> {
        sqlx::query("SELECT 1").execute(&self.pool).await?;
        Ok(())
    }

    pub async fn close(&self) {
        self.pool.close().await;
    }

    // ============================================
    // Plugins
    // ============================================

    #[instrument(skip(self, spec))]
    pub async fn create_plugin(
        &self,
        id: &str,
        name: &str,
        image: &str,
        digest: Option<&str>,
        version: Option<&str>,
        spec: &serde_json::Value,
    ) -> Result<PluginRow, StoreError> {
        let now = Utc::now();
        let row = sqlx::query_as::<_, PluginRow>(
            r#"
            INSERT INTO plugins (id, name, image, digest, version, spec, created_at, updated_at)
            VALUES (?, ?, ?, ?, ?, ?, ?, ?)
            RETURNING id, name, image, digest, version, spec, created_at, updated_at
            "#,
        )
        .bind(id)
        .bind(name)
        .bind(image)
        .bind(digest)
        .bind(version)
        .bind(spec)
        .bind(now)
        .bind(now)
        .fetch_one(&self.pool)
        .await?;

        debug!(plugin_id = %id, "created plugin");
        Ok(row)
    }

    pub async fn get_plugin(&self, id: &str) -> Result<Option<PluginRow>, StoreError> {
        let row = sqlx::query_as::<_, PluginRow>(
            r#"
            SELECT id, name, image, digest, version, spec, created_at, updated_at
            FROM plugins
            WHERE id = ?
            "#,
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;

        Ok(row)
    }

    pub async fn list_plugins(&self) -> Result<Vec<PluginRow>, StoreError> {
        let rows = sqlx::query_as::<_, PluginRow>(
            r#"
            SELECT id, name, image, digest, version, spec, created_at, updated_at
            FROM plugins
            ORDER BY id
            "#,
        )
        .fetch_all(&self.pool)
        .await?;

        Ok(rows)
    }

    pub async fn count_plugins(&self) -> Result<i64, StoreError> {
        let row = sqlx::query("SELECT COUNT(*) AS n FROM plugins")
            .fetch_one(&self.pool)
            .await?;
        Ok(row.get("n"))
    }

    #[instrument(skip(self, patch))]
    pub async fn update_plugin(
        &self,
        id: &str,
        patch: UpdatePlugin,
    ) -> Result<Option<PluginRow>, StoreError> {
        let row = sqlx::query_as::<_, PluginRow>(
            r#"
            UPDATE plugins
            SET digest = COALESCE(?, digest),
                version = COALESCE(?, version),
                spec = COALESCE(?, spec),
                updated_at = ?
            WHERE id = ?
            RETURNING id, name, image, digest, version, spec, created_at, updated_at
            "#,
        )
        .bind(&patch.digest)
        .bind(&patch.version)
        .bind(&patch.spec)
        .bind(Utc::now())
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;

        Ok(row)
    }

    // ============================================
    // Workflows
    // ============================================

    pub async fn create_workflow(
        &self,
        id: Uuid,
        name: &str,
        spec: &serde_json::Value,
    ) -> Result<WorkflowRow, StoreError> {
        let row = sqlx::query_as::<_, WorkflowRow>(
            r#"
            INSERT INTO workflows (id, name, spec, created_at)
            VALUES (?, ?, ?, ?)
            RETURNING id, name, spec, created_at
            "#,
        )
        .bind(id)
        .bind(name)
        .bind(spec)
        .bind(Utc::now())
        .fetch_one(&self.pool)
        .await?;

        Ok(row)
    }

    pub async fn get_workflow(&self, id: Uuid) -> Result<Option<WorkflowRow>, StoreError> {
        let row = sqlx::query_as::<_, WorkflowRow>(
            r#"
            SELECT id, name, spec, created_at
            FROM workflows
            WHERE id = ?
            "#,
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;

        Ok(row)
    }

    // ============================================
    // Executions
    // ============================================

    pub async fn create_execution(
        &self,
        id: Uuid,
        workflow_id: Uuid,
    ) -> Result<ExecutionRow, StoreError> {
        let now = Utc::now();
        let row = sqlx::query_as::<_, ExecutionRow>(
            r#"
            INSERT INTO executions (id, workflow_id, status, started_at, created_at)
            VALUES (?, ?, 'pending', ?, ?)
            RETURNING id, workflow_id, status, result, error, started_at, completed_at, created_at
            "#,
        )
        .bind(id)
        .bind(workflow_id)
        .bind(now)
        .bind(now)
        .fetch_one(&self.pool)
        .await?;

        Ok(row)
    }

    pub async fn get_execution(&self, id: Uuid) -> Result<Option<ExecutionRow>, StoreError> {
        let row = sqlx::query_as::<_, ExecutionRow>(
            r#"
            SELECT id, workflow_id, status, result, error, started_at, completed_at, created_at
            FROM executions
            WHERE id = ?
            "#,
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;

        Ok(row)
    }

    /// Patch an execution. A terminal status sets `completed_at` in the same
    /// write, so the invariant "completed_at is set iff terminal" holds at
    /// every observable point.
    #[instrument(skip(self, patch))]
    pub async fn update_execution(
        &self,
        id: Uuid,
        patch: UpdateExecution,
    ) -> Result<Option<ExecutionRow>, StoreError> {
        let status = patch.status.map(|s| s.to_string());
        let completed_at = match patch.status {
            Some(s) if s.is_terminal() => Some(Utc::now()),
            _ => None,
        };

        let row = sqlx::query_as::<_, ExecutionRow>(
            r#"
            UPDATE executions
            SET status = COALESCE(?, status),
                result = COALESCE(?, result),
                error = COALESCE(?, error),
                completed_at = COALESCE(?, completed_at)
            WHERE id = ?
            RETURNING id, workflow_id, status, result, error, started_at, completed_at, created_at
            "#,
        )
        .bind(&status)
        .bind(&patch.result)
        .bind(&patch.error)
        .bind(completed_at)
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;

        Ok(row)
    }

    /// Newest executions first, joined with the workflow name
    pub async fn list_executions(&self, limit: i64) -> Result<Vec<ExecutionSummaryRow>, StoreError> {
        let rows = sqlx::query_as::<_, ExecutionSummaryRow>(
            r#"
            SELECT e.id, e.workflow_id, w.name AS workflow_name, e.status,
                   e.started_at, e.completed_at
            FROM executions e
            JOIN workflows w ON w.id = e.workflow_id
            ORDER BY e.started_at DESC, e.rowid DESC
            LIMIT ?
            "#,
        )
        .bind(limit)
        .fetch_all(&self.pool)
        .await?;

        Ok(rows)
    }

    /// Execution counts grouped by status
    pub async fn execution_stats(&self) -> Result<HashMap<String, i64>, StoreError> {
        let rows = sqlx::query("SELECT status, COUNT(*) AS n FROM executions GROUP BY status")
            .fetch_all(&self.pool)
            .await?;

        let mut stats = HashMap::new();
        for row in rows {
            stats.insert(row.get::<String, _>("status"), row.get::<i64, _>("n"));
        }
        Ok(stats)
    }

    // ============================================
    // Tasks
    // ============================================

    pub async fn create_task(&self, input: CreateTask) -> Result<TaskRow, StoreError> {
        let row = sqlx::query_as::<_, TaskRow>(
            r#"
            INSERT INTO tasks (id, execution_id, step_id, plugin_id, action, status, input, created_at)
            VALUES (?, ?, ?, ?, ?, 'pending', ?, ?)
            RETURNING id, execution_id, step_id, plugin_id, action, status,
                      input, result, error, attempts, started_at, completed_at, created_at
            "#,
        )
        .bind(Uuid::now_v7())
        .bind(input.execution_id)
        .bind(&input.step_id)
        .bind(&input.plugin_id)
        .bind(&input.action)
        .bind(&input.input)
        .bind(Utc::now())
        .fetch_one(&self.pool)
        .await?;

        Ok(row)
    }

    pub async fn get_task(&self, id: Uuid) -> Result<Option<TaskRow>, StoreError> {
        let row = sqlx::query_as::<_, TaskRow>(
            r#"
            SELECT id, execution_id, step_id, plugin_id, action, status,
                   input, result, error, attempts, started_at, completed_at, created_at
            FROM tasks
            WHERE id = ?
            "#,
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;

        Ok(row)
    }

    /// Tasks of one execution in creation order
    pub async fn get_tasks_by_execution(
        &self,
        execution_id: Uuid,
    ) -> Result<Vec<TaskRow>, StoreError> {
        let rows = sqlx::query_as::<_, TaskRow>(
            r#"
            SELECT id, execution_id, step_id, plugin_id, action, status,
                   input, result, error, attempts, started_at, completed_at, created_at
            FROM tasks
            WHERE execution_id = ?
            ORDER BY created_at ASC, rowid ASC
            "#,
        )
        .bind(execution_id)
        .fetch_all(&self.pool)
        .await?;

        Ok(rows)
    }

    /// Patch a task. `running` stamps `started_at`, a terminal status stamps
    /// `completed_at`, both in the same write.
    #[instrument(skip(self, patch))]
    pub async fn update_task(
        &self,
        id: Uuid,
        patch: UpdateTask,
    ) -> Result<Option<TaskRow>, StoreError> {
        let now = Utc::now();
        let status = patch.status.map(|s| s.to_string());
        let started_at = match patch.status {
            Some(conductor_contracts::TaskStatus::Running) => Some(now),
            _ => None,
        };
        let completed_at = match patch.status {
            Some(s) if s.is_terminal() => Some(now),
            _ => None,
        };

        let row = sqlx::query_as::<_, TaskRow>(
            r#"
            UPDATE tasks
            SET status = COALESCE(?, status),
                result = COALESCE(?, result),
                error = COALESCE(?, error),
                attempts = COALESCE(?, attempts),
                started_at = COALESCE(?, started_at),
                completed_at = COALESCE(?, completed_at)
            WHERE id = ?
            RETURNING id, execution_id, step_id, plugin_id, action, status,
                      input, result, error, attempts, started_at, completed_at, created_at
            "#,
        )
        .bind(&status)
        .bind(&patch.result)
        .bind(&patch.error)
        .bind(patch.attempts.map(|a| a as i64))
        .bind(started_at)
        .bind(completed_at)
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;

        Ok(row)
    }

    // ============================================
    // Events
    // ============================================

    /// Append an event to an execution's log
    pub async fn create_event(
        &self,
        execution_id: Uuid,
        kind: EventKind,
        data: serde_json::Value,
    ) -> Result<EventRow, StoreError> {
        let row = sqlx::query_as::<_, EventRow>(
            r#"
            INSERT INTO events (execution_id, kind, data, timestamp)
            VALUES (?, ?, ?, ?)
            RETURNING id, execution_id, kind, data, timestamp
            "#,
        )
        .bind(execution_id)
        .bind(kind.to_string())
        .bind(&data)
        .bind(Utc::now())
        .fetch_one(&self.pool)
        .await?;

        Ok(row)
    }

    /// Events of one execution, oldest first
    pub async fn get_events_by_execution(
        &self,
        execution_id: Uuid,
    ) -> Result<Vec<EventRow>, StoreError> {
        let rows = sqlx::query_as::<_, EventRow>(
            r#"
            SELECT id, execution_id, kind, data, timestamp
            FROM events
            WHERE execution_id = ?
            ORDER BY id ASC
            "#,
        )
        .bind(execution_id)
        .fetch_all(&self.pool)
        .await?;

        Ok(rows)
    }

    // ============================================
    // Submission (workflow + execution + event + queue row, atomically)
    // ============================================

    /// Persist one accepted submission in a single transaction.
    ///
    /// Returns false (rolling everything back) when the queue key collides,
    /// which indicates double-submission of the same execution id.
    #[instrument(skip(self, spec, payload, options))]
    pub async fn create_submission(
        &self,
        workflow_id: Uuid,
        workflow_name: &str,
        spec: &serde_json::Value,
        execution_id: Uuid,
        payload: &serde_json::Value,
        options: &EnqueueOptions,
    ) -> Result<bool, StoreError> {
        let now = Utc::now();
        let mut tx = self.pool.begin().await?;

        sqlx::query("INSERT INTO workflows (id, name, spec, created_at) VALUES (?, ?, ?, ?)")
            .bind(workflow_id)
            .bind(workflow_name)
            .bind(spec)
            .bind(now)
            .execute(&mut *tx)
            .await?;

        sqlx::query(
            r#"
            INSERT INTO executions (id, workflow_id, status, started_at, created_at)
            VALUES (?, ?, 'pending', ?, ?)
            "#,
        )
        .bind(execution_id)
        .bind(workflow_id)
        .bind(now)
        .bind(now)
        .execute(&mut *tx)
        .await?;

        let event_data = serde_json::json!({
            "workflowId": workflow_id,
            "name": workflow_name,
        });
        sqlx::query("INSERT INTO events (execution_id, kind, data, timestamp) VALUES (?, ?, ?, ?)")
            .bind(execution_id)
            .bind(EventKind::WorkflowSubmitted.to_string())
            .bind(&event_data)
            .bind(now)
            .execute(&mut *tx)
            .await?;

        let inserted = sqlx::query(
            r#"
            INSERT INTO task_queue (task_id, priority, payload, max_retries, scheduled_at, created_at)
            VALUES (?, ?, ?, ?, ?, ?)
            ON CONFLICT(task_id) DO NOTHING
            "#,
        )
        .bind(execution_id)
        .bind(options.priority)
        .bind(payload)
        .bind(options.max_retries)
        .bind(now + chrono::Duration::from_std(options.delay).unwrap_or_default())
        .bind(now)
        .execute(&mut *tx)
        .await?
        .rows_affected();

        if inserted == 0 {
            // Double submission of the same execution id; leave nothing behind
            tx.rollback().await?;
            return Ok(false);
        }

        tx.commit().await?;
        debug!(%execution_id, %workflow_id, "submission persisted");
        Ok(true)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use conductor_contracts::{ExecutionStatus, TaskStatus};
    use serde_json::json;

    async fn db() -> Database {
        Database::in_memory().await.unwrap()
    }

    async fn seed_execution(db: &Database) -> (Uuid, Uuid) {
        let workflow_id = Uuid::now_v7();
        let execution_id = Uuid::now_v7();
        db.create_workflow(workflow_id, "wf", &json!({"name": "wf", "steps": []}))
            .await
            .unwrap();
        db.create_execution(execution_id, workflow_id).await.unwrap();
        (workflow_id, execution_id)
    }

    #[tokio::test]
    async fn execution_terminal_status_sets_completed_at() {
        let db = db().await;
        let (_, execution_id) = seed_execution(&db).await;

        let row = db
            .update_execution(
                execution_id,
                UpdateExecution {
                    status: Some(ExecutionStatus::Running),
                    ..Default::default()
                },
            )
            .await
            .unwrap()
            .unwrap();
        assert!(row.completed_at.is_none());

        let row = db
            .update_execution(
                execution_id,
                UpdateExecution {
                    status: Some(ExecutionStatus::Completed),
                    result: Some(json!({"a": 1})),
                    ..Default::default()
                },
            )
            .await
            .unwrap()
            .unwrap();
        assert_eq!(row.status(), ExecutionStatus::Completed);
        assert!(row.completed_at.is_some());
        assert_eq!(row.result, Some(json!({"a": 1})));
    }

    #[tokio::test]
    async fn task_lifecycle_stamps_timestamps() {
        let db = db().await;
        let (_, execution_id) = seed_execution(&db).await;
        db.create_plugin("echo", "Echo", "conductor/echo:1", None, None, &json!({}))
            .await
            .unwrap();

        let task = db
            .create_task(CreateTask {
                execution_id,
                step_id: "a".into(),
                plugin_id: "echo".into(),
                action: "run".into(),
                input: Some(json!({"x": 1})),
            })
            .await
            .unwrap();
        assert_eq!(task.status(), TaskStatus::Pending);
        assert!(task.started_at.is_none());

        let task = db
            .update_task(
                task.id,
                UpdateTask {
                    status: Some(TaskStatus::Running),
                    ..Default::default()
                },
            )
            .await
            .unwrap()
            .unwrap();
        let started_at = task.started_at.expect("running task has started_at");

        let task = db
            .update_task(
                task.id,
                UpdateTask {
                    status: Some(TaskStatus::Completed),
                    result: Some(json!("ok")),
                    attempts: Some(1),
                    ..Default::default()
                },
            )
            .await
            .unwrap()
            .unwrap();
        assert!(task.attempts >= 1);
        assert!(task.completed_at.unwrap() >= started_at);
    }

    #[tokio::test]
    async fn events_are_ordered_by_insertion() {
        let db = db().await;
        let (_, execution_id) = seed_execution(&db).await;

        for kind in [
            EventKind::ExecutionStarted,
            EventKind::StepStarted,
            EventKind::StepCompleted,
            EventKind::ExecutionCompleted,
        ] {
            db.create_event(execution_id, kind, json!({})).await.unwrap();
        }

        let events = db.get_events_by_execution(execution_id).await.unwrap();
        let kinds: Vec<String> = events.iter().map(|e| e.kind.clone()).collect();
        assert_eq!(
            kinds,
            vec![
                "execution_started",
                "step_started",
                "step_completed",
                "execution_completed"
            ]
        );
        assert!(events.windows(2).all(|w| w[0].id < w[1].id));
    }

    #[tokio::test]
    async fn foreign_keys_are_enforced() {
        let db = db().await;
        let err = db
            .create_execution(Uuid::now_v7(), Uuid::now_v7())
            .await
            .unwrap_err();
        assert!(matches!(err, StoreError::Constraint(_)));
    }

    #[tokio::test]
    async fn duplicate_workflow_id_is_a_constraint_error() {
        let db = db().await;
        let id = Uuid::now_v7();
        db.create_workflow(id, "wf", &json!({})).await.unwrap();
        let err = db.create_workflow(id, "wf", &json!({})).await.unwrap_err();
        assert!(matches!(err, StoreError::Constraint(_)));
    }

    #[tokio::test]
    async fn submission_is_atomic_and_rejects_duplicates() {
        let db = db().await;
        let workflow_id = Uuid::now_v7();
        let execution_id = Uuid::now_v7();
        let spec = json!({"name": "wf", "steps": [{"id": "a", "plugin": "p", "action": "run"}]});

        let payload = json!({"executionId": execution_id});
        let accepted = db
            .create_submission(workflow_id, "wf", &spec, execution_id, &payload, &EnqueueOptions::default())
            .await
            .unwrap();
        assert!(accepted);

        let events = db.get_events_by_execution(execution_id).await.unwrap();
        assert_eq!(events.len(), 1);
        assert_eq!(events[0].kind, "workflow_submitted");

        // Same execution id again: queue key collides, nothing new persisted
        let other_workflow = Uuid::now_v7();
        let accepted = db
            .create_submission(other_workflow, "wf2", &spec, execution_id, &payload, &EnqueueOptions::default())
            .await
            .unwrap();
        assert!(!accepted);
        assert!(db.get_workflow(other_workflow).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn list_executions_is_newest_first() {
        let db = db().await;
        let (_, first) = seed_execution(&db).await;
        let (_, second) = seed_execution(&db).await;

        let list = db.list_executions(50).await.unwrap();
        assert_eq!(list.len(), 2);
        assert_eq!(list[0].id, second);
        assert_eq!(list[1].id, first);
        assert_eq!(list[0].workflow_name, "wf");
    }

    #[tokio::test]
    async fn execution_stats_group_by_status() {
        let db = db().await;
        let (_, a) = seed_execution(&db).await;
        let (_, _b) = seed_execution(&db).await;
        db.update_execution(
            a,
            UpdateExecution {
                status: Some(ExecutionStatus::Completed),
                ..Default::default()
            },
        )
        .await
        .unwrap();

        let stats = db.execution_stats().await.unwrap();
        assert_eq!(stats.get("completed"), Some(&1));
        assert_eq!(stats.get("pending"), Some(&1));
    }
}
