//! HTTP dispatch to plugin services
//!
//! The generic adapter for plugins without a typed in-process adapter:
//! POST the resolved input as JSON to the plugin's service URL.

use std::time::Duration;

use conductor_contracts::PluginManifest;
use serde_json::Value;
use tracing::debug;

use crate::adapter::AdapterError;

/// Default port when the plugin spec carries no port list
const DEFAULT_PORT: u16 = 8080;

/// Namespace fallback when neither the plugin spec nor the environment
/// provides one
const DEFAULT_NAMESPACE: &str = "plugins";

/// Dispatches step invocations to plugin services over HTTP
#[derive(Clone)]
pub struct HttpDispatcher {
    client: reqwest::Client,
    default_namespace: Option<String>,
}

impl HttpDispatcher {
    /// `default_namespace` is the environment-level namespace override
    /// (`KUBE_NAMESPACE`), consulted when the plugin spec has none.
    pub fn new(default_namespace: Option<String>) -> Self {
        Self {
            client: reqwest::Client::new(),
            default_namespace,
        }
    }

    /// Build the URL for one action of one plugin.
    ///
    /// An explicit `baseUrl` wins; otherwise the cluster-local service name
    /// is composed from the plugin id (dots become hyphens), the namespace,
    /// and the first configured port.
    pub fn service_url(&self, plugin: &PluginManifest, action: &str) -> String {
        if let Some(base) = &plugin.spec.base_url {
            return format!("{}/{}", base.trim_end_matches('/'), action);
        }

        let host = plugin.id.replace('.', "-");
        let namespace = plugin
            .spec
            .namespace
            .as_deref()
            .or(self.default_namespace.as_deref())
            .unwrap_or(DEFAULT_NAMESPACE);
        let port = plugin.spec.ports.first().copied().unwrap_or(DEFAULT_PORT);

        format!(
            "http://{}.{}.svc.cluster.local:{}/{}",
            host, namespace, port, action
        )
    }

    /// POST `input` to the plugin, returning the response body as JSON.
    ///
    /// 4xx responses are permanent failures; 5xx, timeouts, and connection
    /// errors are transient and eligible for per-step retry.
    pub async fn dispatch(
        &self,
        plugin: &PluginManifest,
        action: &str,
        step_id: &str,
        input: &Value,
        timeout: Duration,
    ) -> Result<Value, AdapterError> {
        let url = self.service_url(plugin, action);
        debug!(plugin_id = %plugin.id, %action, %url, "dispatching step over http");

        let response = self
            .client
            .post(&url)
            .header("X-Workflow-Step", step_id)
            .json(input)
            .timeout(timeout)
            .send()
            .await
            .map_err(|e| {
                if e.is_timeout() {
                    AdapterError::Transient(format!("request to {} timed out", url))
                } else {
                    AdapterError::Transient(format!("request to {} failed: {}", url, e))
                }
            })?;

        let status = response.status();
        if status.is_success() {
            response
                .json()
                .await
                .map_err(|e| AdapterError::Permanent(format!("invalid JSON from plugin: {}", e)))
        } else if status.is_client_error() {
            Err(AdapterError::Permanent(format!(
                "plugin '{}' returned {} for action '{}'",
                plugin.id, status, action
            )))
        } else {
            Err(AdapterError::Transient(format!(
                "plugin '{}' returned {} for action '{}'",
                plugin.id, status, action
            )))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use conductor_contracts::PluginSpec;
    use serde_json::json;

    fn plugin(id: &str, spec: PluginSpec) -> PluginManifest {
        PluginManifest {
            id: id.to_string(),
            name: id.to_string(),
            image: "conductor/test:1".to_string(),
            digest: None,
            version: None,
            spec,
        }
    }

    #[test]
    fn explicit_base_url_wins() {
        let dispatcher = HttpDispatcher::new(Some("ignored".to_string()));
        let p = plugin(
            "echo",
            serde_json::from_value(json!({"baseUrl": "http://localhost:9999/"})).unwrap(),
        );
        assert_eq!(dispatcher.service_url(&p, "run"), "http://localhost:9999/run");
    }

    #[test]
    fn cluster_url_replaces_dots_and_uses_spec_namespace() {
        let dispatcher = HttpDispatcher::new(Some("env-ns".to_string()));
        let p = plugin(
            "object.store",
            serde_json::from_value(json!({"namespace": "etl", "ports": [9090]})).unwrap(),
        );
        assert_eq!(
            dispatcher.service_url(&p, "put"),
            "http://object-store.etl.svc.cluster.local:9090/put"
        );
    }

    #[test]
    fn environment_namespace_is_the_fallback() {
        let dispatcher = HttpDispatcher::new(Some("env-ns".to_string()));
        let p = plugin("echo", PluginSpec::default());
        assert_eq!(
            dispatcher.service_url(&p, "run"),
            "http://echo.env-ns.svc.cluster.local:8080/run"
        );
    }

    #[test]
    fn default_namespace_and_port_apply_last() {
        let dispatcher = HttpDispatcher::new(None);
        let p = plugin("echo", PluginSpec::default());
        assert_eq!(
            dispatcher.service_url(&p, "run"),
            "http://echo.plugins.svc.cluster.local:8080/run"
        );
    }
}
