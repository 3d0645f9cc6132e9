// Workflow spec documents as submitted by clients

use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

/// Maximum number of steps accepted in a single workflow
pub const MAX_STEPS: usize = 100;

/// Default per-attempt timeout for a step, in milliseconds
pub const DEFAULT_STEP_TIMEOUT_MS: u64 = 30_000;

/// A declarative workflow: a named DAG of steps
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct WorkflowSpec {
    pub name: String,
    pub steps: Vec<StepSpec>,
}

/// One step of a workflow, naming a plugin and an action
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct StepSpec {
    /// Unique within the workflow
    pub id: String,

    /// Id of the plugin this step dispatches to
    pub plugin: String,

    /// Action name; checked against the plugin's `exposes` whitelist when set
    pub action: String,

    /// Arbitrary JSON input; string leaves may contain `{{ steps.<id>.result }}`
    /// templates resolved against prior step results
    #[serde(default)]
    pub input: serde_json::Value,

    /// Sibling step ids this step depends on
    #[serde(default)]
    pub needs: Vec<String>,

    /// Per-attempt timeout in milliseconds (default 30 000)
    #[serde(default, rename = "timeout", skip_serializing_if = "Option::is_none")]
    pub timeout_ms: Option<u64>,

    /// Per-step retry policy (default: single attempt)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub retry: Option<StepRetry>,
}

impl StepSpec {
    /// Effective per-attempt timeout
    pub fn timeout_ms(&self) -> u64 {
        self.timeout_ms.unwrap_or(DEFAULT_STEP_TIMEOUT_MS)
    }

    /// Effective maximum attempts (at least 1)
    pub fn max_attempts(&self) -> u32 {
        self.retry.as_ref().map(|r| r.max_attempts.max(1)).unwrap_or(1)
    }

    /// Effective backoff strategy between attempts
    pub fn backoff(&self) -> BackoffKind {
        self.retry.as_ref().map(|r| r.backoff).unwrap_or(BackoffKind::Fixed)
    }
}

/// Retry policy embedded in a step spec
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct StepRetry {
    #[serde(rename = "maxAttempts")]
    pub max_attempts: u32,

    #[serde(default)]
    pub backoff: BackoffKind,
}

/// Backoff strategy between step attempts
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "lowercase")]
pub enum BackoffKind {
    /// 1 second between attempts
    #[default]
    Fixed,

    /// 2^attempt seconds between attempts (2 s, 4 s, 8 s, ...)
    Exponential,
}
