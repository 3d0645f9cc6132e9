//! Step executor: one step, one result
//!
//! For a single step this resolves input templates, authorises the action
//! against the plugin's whitelist, picks an adapter (typed in-process or
//! HTTP), and runs the attempt loop with per-attempt timeout and
//! backoff-spaced retries.

use std::sync::Arc;
use std::time::Duration;

use conductor_contracts::{BackoffKind, PluginManifest, StepSpec};
use conductor_storage::StoreError;
use serde_json::Value;
use tracing::{debug, warn};

use crate::adapter::{AdapterError, AdapterRegistry};
use crate::http::HttpDispatcher;
use crate::registry::PluginRegistry;
use crate::template::{self, StepContext};

/// Error from executing one step
#[derive(Debug, thiserror::Error)]
pub enum ExecutorError {
    /// The step references a plugin that is not registered (fatal)
    #[error("Plugin not found: {0}")]
    PluginNotFound(String),

    /// The plugin's `exposes` whitelist does not include the action (fatal)
    #[error("Action '{action}' is not exposed by plugin '{plugin}'")]
    UnknownAction { plugin: String, action: String },

    /// All attempts failed; carries the last attempt's error
    #[error("{0}")]
    StepFailed(String),

    /// Infrastructure failure while looking up the plugin; the engine
    /// propagates this to the queue instead of failing the step
    #[error("store error: {0}")]
    Store(#[from] StoreError),
}

/// Successful step execution
#[derive(Debug)]
pub struct StepSuccess {
    pub result: Value,
    pub attempts: u32,
}

/// Failed step execution
#[derive(Debug)]
pub struct StepFailure {
    pub error: ExecutorError,
    pub attempts: u32,
}

pub struct StepExecutor {
    registry: Arc<PluginRegistry>,
    adapters: AdapterRegistry,
    http: HttpDispatcher,
}

impl StepExecutor {
    pub fn new(registry: Arc<PluginRegistry>, adapters: AdapterRegistry, http: HttpDispatcher) -> Self {
        Self {
            registry,
            adapters,
            http,
        }
    }

    /// Execute one step against the results collected so far
    pub async fn execute(
        &self,
        step: &StepSpec,
        ctx: &StepContext,
    ) -> Result<StepSuccess, StepFailure> {
        let resolved = template::resolve(&step.input, ctx);
        self.execute_resolved(step, &resolved).await
    }

    /// Execute with an already-resolved input
    ///
    /// The engine resolves templates up front so the resolved input can be
    /// persisted on the task record before dispatch.
    pub async fn execute_resolved(
        &self,
        step: &StepSpec,
        input: &Value,
    ) -> Result<StepSuccess, StepFailure> {
        let manifest = match self.registry.get(&step.plugin).await {
            Ok(Some(manifest)) => manifest,
            Ok(None) => {
                return Err(StepFailure {
                    error: ExecutorError::PluginNotFound(step.plugin.clone()),
                    attempts: 1,
                })
            }
            Err(e) => {
                return Err(StepFailure {
                    error: ExecutorError::Store(e),
                    attempts: 0,
                })
            }
        };

        if !manifest.spec.allows_action(&step.action) {
            return Err(StepFailure {
                error: ExecutorError::UnknownAction {
                    plugin: step.plugin.clone(),
                    action: step.action.clone(),
                },
                attempts: 1,
            });
        }

        let timeout = Duration::from_millis(step.timeout_ms());
        let max_attempts = step.max_attempts();
        let mut last_error = String::new();

        for attempt in 1..=max_attempts {
            match tokio::time::timeout(timeout, self.call(&manifest, step, input)).await {
                Ok(Ok(result)) => {
                    debug!(step_id = %step.id, attempt, "step succeeded");
                    return Ok(StepSuccess { result, attempts: attempt });
                }
                Ok(Err(err)) if err.is_permanent() => {
                    warn!(step_id = %step.id, attempt, %err, "step failed permanently");
                    return Err(StepFailure {
                        error: ExecutorError::StepFailed(err.to_string()),
                        attempts: attempt,
                    });
                }
                Ok(Err(err)) => {
                    warn!(step_id = %step.id, attempt, %err, "step attempt failed");
                    last_error = err.to_string();
                }
                Err(_) => {
                    warn!(step_id = %step.id, attempt, timeout_ms = step.timeout_ms(), "step attempt timed out");
                    last_error = format!(
                        "step '{}' timed out after {}ms",
                        step.id,
                        step.timeout_ms()
                    );
                }
            }

            if attempt < max_attempts {
                tokio::time::sleep(backoff_delay(step.backoff(), attempt)).await;
            }
        }

        Err(StepFailure {
            error: ExecutorError::StepFailed(last_error),
            attempts: max_attempts,
        })
    }

    async fn call(
        &self,
        manifest: &PluginManifest,
        step: &StepSpec,
        input: &Value,
    ) -> Result<Value, AdapterError> {
        if let Some(adapter) = self.adapters.get(&step.plugin) {
            adapter.call(&step.action, input.clone()).await
        } else {
            let timeout = Duration::from_millis(step.timeout_ms());
            self.http
                .dispatch(manifest, &step.action, &step.id, input, timeout)
                .await
        }
    }
}

/// Delay before the next attempt, after the `attempt`-th failure (1-based)
///
/// Exponential spacing doubles from 2 s; fixed spacing is a flat 1 s.
fn backoff_delay(kind: BackoffKind, attempt: u32) -> Duration {
    match kind {
        BackoffKind::Exponential => Duration::from_secs(2u64.saturating_pow(attempt)),
        BackoffKind::Fixed => Duration::from_secs(1),
    }
}
