// Response DTOs for the admission API

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;
use uuid::Uuid;

use crate::status::{ExecutionStatus, TaskStatus};

/// One workflow execution
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct ExecutionView {
    pub id: Uuid,
    pub workflow_id: Uuid,
    pub status: ExecutionStatus,
    /// Map of step id -> step result; set only on completed executions
    pub result: Option<serde_json::Value>,
    /// Set only on failed executions
    pub error: Option<String>,
    pub started_at: Option<DateTime<Utc>>,
    pub completed_at: Option<DateTime<Utc>>,
}

/// Execution row joined with its workflow name, for list endpoints
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct ExecutionSummary {
    pub id: Uuid,
    pub workflow_id: Uuid,
    pub workflow_name: String,
    pub status: ExecutionStatus,
    pub started_at: Option<DateTime<Utc>>,
    pub completed_at: Option<DateTime<Utc>>,
}

/// The record of one step's execution
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct TaskView {
    pub id: Uuid,
    pub execution_id: Uuid,
    pub step_id: String,
    pub plugin_id: String,
    pub action: String,
    pub status: TaskStatus,
    pub input: Option<serde_json::Value>,
    pub result: Option<serde_json::Value>,
    pub error: Option<String>,
    pub attempts: u32,
    pub started_at: Option<DateTime<Utc>>,
    pub completed_at: Option<DateTime<Utc>>,
}

/// One entry of an execution's append-only event log
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct EventView {
    pub id: i64,
    pub execution_id: Uuid,
    pub kind: String,
    pub data: serde_json::Value,
    pub timestamp: DateTime<Utc>,
}

/// Full status of one execution: the row plus its tasks and events
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct ExecutionDetail {
    pub execution: ExecutionView,
    pub tasks: Vec<TaskView>,
    pub events: Vec<EventView>,
}

/// Accepted submission
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct SubmitResponse {
    #[serde(rename = "executionId")]
    pub execution_id: Uuid,
    #[serde(rename = "workflowId")]
    pub workflow_id: Uuid,
}

/// Queue counters by row status
#[derive(Debug, Clone, Default, Serialize, Deserialize, ToSchema)]
pub struct QueueStatsView {
    pub pending: i64,
    pub processing: i64,
    pub completed: i64,
    pub failed: i64,
}

/// Aggregated counters for the stats endpoint
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct StatsView {
    pub queue: QueueStatsView,
    /// Execution counts grouped by status
    pub executions: std::collections::HashMap<String, i64>,
}

/// Aggregated health report
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct HealthView {
    pub status: String,
    pub store: bool,
    pub engine: bool,
    pub plugins: i64,
}
