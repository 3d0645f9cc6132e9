//! Typed in-process plugin adapters
//!
//! An adapter is a capability set over action names for one plugin id.
//! Plugins without a registered adapter are reached over HTTP instead.

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use serde_json::Value;

/// Error from one adapter call
///
/// The transient/permanent split drives the executor's retry decision:
/// transient failures are retried per the step's policy, permanent failures
/// fail the step immediately.
#[derive(Debug, Clone, thiserror::Error)]
pub enum AdapterError {
    /// Will not succeed on retry (bad input, unknown action, 4xx)
    #[error("{0}")]
    Permanent(String),

    /// May succeed on retry (timeout, connection error, 5xx)
    #[error("{0}")]
    Transient(String),
}

impl AdapterError {
    pub fn is_permanent(&self) -> bool {
        matches!(self, AdapterError::Permanent(_))
    }
}

/// A typed in-process plugin endpoint
#[async_trait]
pub trait PluginAdapter: Send + Sync {
    async fn call(&self, action: &str, input: Value) -> Result<Value, AdapterError>;
}

/// Maps plugin id -> adapter; unknown ids fall through to HTTP dispatch
#[derive(Clone, Default)]
pub struct AdapterRegistry {
    adapters: HashMap<String, Arc<dyn PluginAdapter>>,
}

impl AdapterRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(&mut self, plugin_id: impl Into<String>, adapter: Arc<dyn PluginAdapter>) {
        self.adapters.insert(plugin_id.into(), adapter);
    }

    pub fn get(&self, plugin_id: &str) -> Option<Arc<dyn PluginAdapter>> {
        self.adapters.get(plugin_id).cloned()
    }

    pub fn is_empty(&self) -> bool {
        self.adapters.is_empty()
    }
}

/// Adapter that returns its input unchanged, for any action
///
/// Useful in tests and local smoke runs.
pub struct EchoAdapter;

#[async_trait]
impl PluginAdapter for EchoAdapter {
    async fn call(&self, _action: &str, input: Value) -> Result<Value, AdapterError> {
        Ok(input)
    }
}
