//! DAG validation and topological ordering
//!
//! Pure functions over a workflow spec. The order is deterministic for a
//! given input: steps are visited in the order they appear in the spec,
//! dependencies first (depth-first post-order).

use std::collections::{HashMap, HashSet};

use conductor_contracts::{validate_workflow, StepSpec, ValidationError, WorkflowSpec};

/// Error from resolving a workflow DAG
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ResolverError {
    /// A step is reachable from itself (self-loops included)
    #[error("Cycle detected at step '{0}'")]
    Cycle(String),

    /// A `needs` entry does not name a sibling step
    #[error("Dependency not found: step '{step}' needs '{needed}'")]
    MissingDependency { step: String, needed: String },
}

/// Produce a topological order of step ids, dependencies first
pub fn resolve(spec: &WorkflowSpec) -> Result<Vec<String>, ResolverError> {
    let by_id: HashMap<&str, &StepSpec> =
        spec.steps.iter().map(|s| (s.id.as_str(), s)).collect();

    let mut visiting = HashSet::new();
    let mut done = HashSet::new();
    let mut order = Vec::with_capacity(spec.steps.len());

    for step in &spec.steps {
        visit(step.id.as_str(), &by_id, &mut visiting, &mut done, &mut order)?;
    }

    Ok(order)
}

fn visit<'a>(
    id: &'a str,
    by_id: &HashMap<&'a str, &'a StepSpec>,
    visiting: &mut HashSet<&'a str>,
    done: &mut HashSet<&'a str>,
    order: &mut Vec<String>,
) -> Result<(), ResolverError> {
    if done.contains(id) {
        return Ok(());
    }
    if !visiting.insert(id) {
        return Err(ResolverError::Cycle(id.to_string()));
    }

    let step = by_id[id];
    for needed in &step.needs {
        let Some(_) = by_id.get(needed.as_str()) else {
            return Err(ResolverError::MissingDependency {
                step: id.to_string(),
                needed: needed.clone(),
            });
        };
        visit(needed.as_str(), by_id, visiting, done, order)?;
    }

    visiting.remove(id);
    done.insert(id);
    order.push(id.to_string());
    Ok(())
}

/// Accumulate every structural error, then attempt resolution
///
/// Shape failures are all reported together; the resolver only runs once the
/// shape is clean, so a cycle is reported against a structurally valid spec.
pub fn validate(spec: &WorkflowSpec) -> Vec<ValidationError> {
    let mut errors = validate_workflow(spec);
    if errors.is_empty() {
        if let Err(e) = resolve(spec) {
            errors.push(ValidationError::new("steps", e.to_string()));
        }
    }
    errors
}

/// Steps whose dependencies are all satisfied and which have not run yet
///
/// The sequential engine does not use this; it exists for parallel
/// schedulers that dispatch independent branches concurrently.
pub fn ready_steps<'a>(
    steps: &'a [StepSpec],
    completed: &HashSet<String>,
) -> Vec<&'a StepSpec> {
    steps
        .iter()
        .filter(|s| !completed.contains(&s.id))
        .filter(|s| s.needs.iter().all(|n| completed.contains(n)))
        .collect()
}
