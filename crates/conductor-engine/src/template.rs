//! Template resolution of step inputs
//!
//! String leaves of a step's input may reference prior step results:
//!
//! - `{{ steps.<id>.result }}` replaces the whole leaf with that step's
//!   result, whatever its JSON type
//! - `{{ steps.<id>.result.<field> }}` replaces the leaf with one field of
//!   that result
//!
//! A reference to a step (or field) that is not present in the context is
//! left verbatim, as is any partial interpolation inside a larger string.

use std::collections::HashMap;
use std::sync::OnceLock;

use regex::Regex;
use serde_json::Value;

fn template_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r"^\{\{\s*steps\.([A-Za-z0-9_-]+)\.result(?:\.(\w+))?\s*\}\}$").unwrap()
    })
}

/// Results of the steps that have completed so far in one execution
#[derive(Debug, Clone, Default)]
pub struct StepContext {
    results: HashMap<String, Value>,
}

impl StepContext {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, step_id: impl Into<String>, result: Value) {
        self.results.insert(step_id.into(), result);
    }

    pub fn result(&self, step_id: &str) -> Option<&Value> {
        self.results.get(step_id)
    }

    pub fn completed_ids(&self) -> impl Iterator<Item = &str> {
        self.results.keys().map(String::as_str)
    }

    /// Aggregate map of step id -> result, stored on completed executions
    pub fn into_result_map(self) -> Value {
        Value::Object(self.results.into_iter().collect())
    }
}

/// Deep-walk `input`, substituting template leaves from `ctx`
///
/// Non-string leaves pass through unchanged; arrays and objects are walked
/// element by element with key order preserved.
pub fn resolve(input: &Value, ctx: &StepContext) -> Value {
    match input {
        Value::String(s) => resolve_leaf(s, ctx),
        Value::Array(items) => Value::Array(items.iter().map(|v| resolve(v, ctx)).collect()),
        Value::Object(map) => Value::Object(
            map.iter()
                .map(|(k, v)| (k.clone(), resolve(v, ctx)))
                .collect(),
        ),
        other => other.clone(),
    }
}

fn resolve_leaf(leaf: &str, ctx: &StepContext) -> Value {
    if let Some(caps) = template_re().captures(leaf) {
        let step_id = &caps[1];
        if let Some(result) = ctx.result(step_id) {
            match caps.get(2) {
                None => return result.clone(),
                Some(field) => {
                    if let Some(value) = result.get(field.as_str()) {
                        return value.clone();
                    }
                }
            }
        }
    }
    Value::String(leaf.to_string())
}
