// Plugin descriptors: registered external capabilities addressed by id

use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

/// A registered plugin and the image that backs it
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct PluginManifest {
    /// Lowercase letters, digits, `.`, `-`, `_`; length <= 255
    pub id: String,

    /// Human-readable name
    pub name: String,

    /// Container image reference (`registry/repo:tag`)
    pub image: String,

    /// Optional image digest pin
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub digest: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub version: Option<String>,

    /// Connection parameters and action whitelist
    #[serde(default)]
    pub spec: PluginSpec,
}

/// The spec document carried by a plugin
#[derive(Debug, Clone, Default, Serialize, Deserialize, ToSchema)]
pub struct PluginSpec {
    /// Opaque connection parameters handed to the plugin's adapter
    #[serde(default, skip_serializing_if = "serde_json::Value::is_null")]
    pub connection: serde_json::Value,

    /// Whitelist of action names; empty means any action is allowed
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub exposes: Vec<String>,

    /// Explicit service URL; when absent the cluster-local URL is composed
    #[serde(default, rename = "baseUrl", skip_serializing_if = "Option::is_none")]
    pub base_url: Option<String>,

    /// Service ports; the first entry is used, defaulting to 8080
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub ports: Vec<u16>,

    /// Namespace override for the composed service URL
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub namespace: Option<String>,
}

impl PluginSpec {
    /// Whether `action` may be invoked on this plugin
    pub fn allows_action(&self, action: &str) -> bool {
        self.exposes.is_empty() || self.exposes.iter().any(|a| a == action)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn empty_exposes_allows_any_action() {
        let spec = PluginSpec::default();
        assert!(spec.allows_action("anything"));
    }

    #[test]
    fn exposes_whitelist_is_exact() {
        let spec: PluginSpec = serde_json::from_value(json!({
            "exposes": ["run", "query"]
        }))
        .unwrap();

        assert!(spec.allows_action("run"));
        assert!(!spec.allows_action("drop"));
    }

    #[test]
    fn base_url_wire_name() {
        let spec: PluginSpec = serde_json::from_value(json!({
            "baseUrl": "http://localhost:1234",
            "ports": [9090],
            "namespace": "etl"
        }))
        .unwrap();

        assert_eq!(spec.base_url.as_deref(), Some("http://localhost:1234"));
        assert_eq!(spec.ports, vec![9090]);
        assert_eq!(spec.namespace.as_deref(), Some("etl"));
    }
}
