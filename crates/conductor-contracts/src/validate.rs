// Admission-time shape validation
//
// Validation accumulates every failure instead of stopping at the first,
// so a client sees the full list in one 400 response.

use std::sync::OnceLock;

use regex::Regex;
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

use crate::plugin::PluginManifest;
use crate::workflow::{WorkflowSpec, MAX_STEPS};

/// One shape failure, pointing at the offending field
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
pub struct ValidationError {
    pub field: String,
    pub message: String,
}

impl ValidationError {
    pub fn new(field: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            field: field.into(),
            message: message.into(),
        }
    }
}

impl std::fmt::Display for ValidationError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}: {}", self.field, self.message)
    }
}

fn workflow_name_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"^[A-Za-z0-9_-]+$").unwrap())
}

fn plugin_id_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"^[a-z0-9._-]+$").unwrap())
}

fn image_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"(?i)^[a-z0-9._/-]+:[a-z0-9._-]+$").unwrap())
}

/// Validate the shape of a submitted workflow
///
/// Returns every structural error found. DAG-level checks (cycles, missing
/// dependencies) are the resolver's job and run after this passes.
pub fn validate_workflow(spec: &WorkflowSpec) -> Vec<ValidationError> {
    let mut errors = Vec::new();

    if spec.name.is_empty() {
        errors.push(ValidationError::new("name", "name is required"));
    } else if spec.name.len() > 255 {
        errors.push(ValidationError::new("name", "name must be at most 255 characters"));
    } else if !workflow_name_re().is_match(&spec.name) {
        errors.push(ValidationError::new(
            "name",
            "name may only contain letters, digits, underscores, and hyphens",
        ));
    }

    if spec.steps.is_empty() {
        errors.push(ValidationError::new("steps", "workflow must have at least one step"));
    } else if spec.steps.len() > MAX_STEPS {
        errors.push(ValidationError::new(
            "steps",
            format!("workflow must have at most {} steps", MAX_STEPS),
        ));
    }

    let mut seen = std::collections::HashSet::new();
    for (i, step) in spec.steps.iter().enumerate() {
        let at = |field: &str| format!("steps[{}].{}", i, field);

        if step.id.is_empty() {
            errors.push(ValidationError::new(at("id"), "step id is required"));
        } else if !seen.insert(step.id.as_str()) {
            errors.push(ValidationError::new(
                at("id"),
                format!("duplicate step id '{}'", step.id),
            ));
        }
        if step.plugin.is_empty() {
            errors.push(ValidationError::new(at("plugin"), "step plugin is required"));
        }
        if step.action.is_empty() {
            errors.push(ValidationError::new(at("action"), "step action is required"));
        }
        if let Some(retry) = &step.retry {
            if retry.max_attempts < 1 {
                errors.push(ValidationError::new(at("retry.maxAttempts"), "maxAttempts must be >= 1"));
            }
        }
    }

    errors
}

/// Validate the shape of a plugin registration
pub fn validate_plugin(manifest: &PluginManifest) -> Vec<ValidationError> {
    let mut errors = Vec::new();

    if manifest.id.is_empty() {
        errors.push(ValidationError::new("id", "id is required"));
    } else if manifest.id.len() > 255 {
        errors.push(ValidationError::new("id", "id must be at most 255 characters"));
    } else if !plugin_id_re().is_match(&manifest.id) {
        errors.push(ValidationError::new(
            "id",
            "id may only contain lowercase letters, digits, dots, hyphens, and underscores",
        ));
    }

    if manifest.name.is_empty() {
        errors.push(ValidationError::new("name", "name is required"));
    } else if manifest.name.len() > 255 {
        errors.push(ValidationError::new("name", "name must be at most 255 characters"));
    }

    if manifest.image.is_empty() {
        errors.push(ValidationError::new("image", "image is required"));
    } else if !image_re().is_match(&manifest.image) {
        errors.push(ValidationError::new(
            "image",
            "image must look like registry/repo:tag",
        ));
    }

    errors
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::plugin::PluginSpec;
    use crate::workflow::StepSpec;
    use serde_json::json;

    fn step(id: &str) -> StepSpec {
        StepSpec {
            id: id.to_string(),
            plugin: "echo".to_string(),
            action: "run".to_string(),
            input: json!({}),
            needs: vec![],
            timeout_ms: None,
            retry: None,
        }
    }

    #[test]
    fn valid_workflow_passes() {
        let spec = WorkflowSpec {
            name: "lin".to_string(),
            steps: vec![step("a"), step("b")],
        };
        assert!(validate_workflow(&spec).is_empty());
    }

    #[test]
    fn errors_accumulate() {
        let mut bad = step("");
        bad.plugin = String::new();
        bad.action = String::new();
        let spec = WorkflowSpec {
            name: "bad name!".to_string(),
            steps: vec![bad],
        };

        let errors = validate_workflow(&spec);
        let fields: Vec<&str> = errors.iter().map(|e| e.field.as_str()).collect();
        assert!(fields.contains(&"name"));
        assert!(fields.contains(&"steps[0].id"));
        assert!(fields.contains(&"steps[0].plugin"));
        assert!(fields.contains(&"steps[0].action"));
    }

    #[test]
    fn duplicate_step_ids_rejected() {
        let spec = WorkflowSpec {
            name: "dup".to_string(),
            steps: vec![step("a"), step("a")],
        };

        let errors = validate_workflow(&spec);
        assert_eq!(errors.len(), 1);
        assert!(errors[0].message.contains("duplicate"));
    }

    #[test]
    fn too_many_steps_rejected() {
        let steps = (0..MAX_STEPS + 1).map(|i| step(&format!("s{}", i))).collect();
        let spec = WorkflowSpec {
            name: "big".to_string(),
            steps,
        };

        let errors = validate_workflow(&spec);
        assert!(errors.iter().any(|e| e.field == "steps"));
    }

    #[test]
    fn plugin_rules() {
        let manifest = PluginManifest {
            id: "Postgres".to_string(),
            name: "Postgres".to_string(),
            image: "no-tag".to_string(),
            digest: None,
            version: None,
            spec: PluginSpec::default(),
        };

        let errors = validate_plugin(&manifest);
        let fields: Vec<&str> = errors.iter().map(|e| e.field.as_str()).collect();
        assert!(fields.contains(&"id"));
        assert!(fields.contains(&"image"));
    }

    #[test]
    fn image_regex_is_case_insensitive() {
        let manifest = PluginManifest {
            id: "pg".to_string(),
            name: "Postgres".to_string(),
            image: "Registry.IO/org/pg:V16".to_string(),
            digest: None,
            version: Some("16".to_string()),
            spec: PluginSpec::default(),
        };
        assert!(validate_plugin(&manifest).is_empty());
    }
}
