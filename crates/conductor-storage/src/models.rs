// Database models (internal, may differ from public DTOs)

use chrono::{DateTime, Utc};
use conductor_contracts::{EventKind, ExecutionStatus, TaskStatus};
use sqlx::FromRow;
use uuid::Uuid;

// ============================================
// Plugin models
// ============================================

/// Plugin row from database
#[derive(Debug, Clone, FromRow)]
pub struct PluginRow {
    pub id: String,
    pub name: String,
    pub image: String,
    pub digest: Option<String>,
    pub version: Option<String>,
    pub spec: sqlx::types::JsonValue,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Input for updating a plugin registration
#[derive(Debug, Clone, Default)]
pub struct UpdatePlugin {
    pub digest: Option<String>,
    pub version: Option<String>,
    pub spec: Option<serde_json::Value>,
}

// ============================================
// Workflow models
// ============================================

/// Workflow row from database (spec is immutable once created)
#[derive(Debug, Clone, FromRow)]
pub struct WorkflowRow {
    pub id: Uuid,
    pub name: String,
    pub spec: sqlx::types::JsonValue,
    pub created_at: DateTime<Utc>,
}

// ============================================
// Execution models
// ============================================

/// Execution row from database
#[derive(Debug, Clone, FromRow)]
pub struct ExecutionRow {
    pub id: Uuid,
    pub workflow_id: Uuid,
    pub status: String,
    pub result: Option<sqlx::types::JsonValue>,
    pub error: Option<String>,
    pub started_at: DateTime<Utc>,
    pub completed_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
}

impl ExecutionRow {
    pub fn status(&self) -> ExecutionStatus {
        self.status.parse().unwrap_or(ExecutionStatus::Pending)
    }
}

/// Execution row joined with the workflow name
#[derive(Debug, Clone, FromRow)]
pub struct ExecutionSummaryRow {
    pub id: Uuid,
    pub workflow_id: Uuid,
    pub workflow_name: String,
    pub status: String,
    pub started_at: DateTime<Utc>,
    pub completed_at: Option<DateTime<Utc>>,
}

/// Patch for an execution; absent fields are left untouched
///
/// A terminal status sets `completed_at` atomically in the same write.
#[derive(Debug, Clone, Default)]
pub struct UpdateExecution {
    pub status: Option<ExecutionStatus>,
    pub result: Option<serde_json::Value>,
    pub error: Option<String>,
}

// ============================================
// Task models
// ============================================

/// Task row from database (one step of one execution)
#[derive(Debug, Clone, FromRow)]
pub struct TaskRow {
    pub id: Uuid,
    pub execution_id: Uuid,
    pub step_id: String,
    pub plugin_id: String,
    pub action: String,
    pub status: String,
    pub input: Option<sqlx::types::JsonValue>,
    pub result: Option<sqlx::types::JsonValue>,
    pub error: Option<String>,
    pub attempts: i64,
    pub started_at: Option<DateTime<Utc>>,
    pub completed_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
}

impl TaskRow {
    pub fn status(&self) -> TaskStatus {
        self.status.parse().unwrap_or(TaskStatus::Pending)
    }
}

/// Input for creating a task
#[derive(Debug, Clone)]
pub struct CreateTask {
    pub execution_id: Uuid,
    pub step_id: String,
    pub plugin_id: String,
    pub action: String,
    pub input: Option<serde_json::Value>,
}

/// Patch for a task; absent fields are left untouched
///
/// `running` sets `started_at`, a terminal status sets `completed_at`.
#[derive(Debug, Clone, Default)]
pub struct UpdateTask {
    pub status: Option<TaskStatus>,
    pub result: Option<serde_json::Value>,
    pub error: Option<String>,
    pub attempts: Option<u32>,
}

// ============================================
// Event models
// ============================================

/// Event row from the append-only per-execution log
///
/// The auto-increment id preserves insertion order even under equal
/// timestamps.
#[derive(Debug, Clone, FromRow)]
pub struct EventRow {
    pub id: i64,
    pub execution_id: Uuid,
    pub kind: String,
    pub data: sqlx::types::JsonValue,
    pub timestamp: DateTime<Utc>,
}

impl EventRow {
    pub fn kind(&self) -> Option<EventKind> {
        self.kind.parse().ok()
    }
}

// ============================================
// Queue models
// ============================================

/// Row of the persistent task queue
#[derive(Debug, Clone, FromRow)]
pub struct QueueRow {
    pub id: i64,
    pub task_id: Uuid,
    pub priority: i64,
    pub payload: sqlx::types::JsonValue,
    pub max_retries: i64,
    pub retry_count: i64,
    pub status: String,
    pub scheduled_at: DateTime<Utc>,
    pub started_at: Option<DateTime<Utc>>,
    pub completed_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
}
