//! Structural plan validation.

use serde::{Deserialize, Serialize};
use tollway_core::{ErrorKind, ExecutionError, ExecutionPlan, StepGraph};

/// Outcome of [`validate_chain`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ValidationReport {
    /// True when `errors` is empty.
    pub valid: bool,

    /// Every problem found, dangling references first.
    pub errors: Vec<ExecutionError>,
}

impl ValidationReport {
    /// Messages of all errors.
    pub fn messages(&self) -> Vec<&str> {
        self.errors.iter().map(|e| e.error.as_str()).collect()
    }
}

/// Check a plan's structure without running anything.
///
/// Reports one error per dependency naming a step that is not in the plan,
/// one per duplicated step id, and one for the first cycle found.
pub fn validate_chain(plan: &ExecutionPlan) -> ValidationReport {
    let graph = StepGraph::new(&plan.steps);
    let mut errors = Vec::new();

    for missing in graph.missing_dependencies() {
        errors.push(ExecutionError::for_step(
            missing.step_id.clone(),
            ErrorKind::Validation,
            format!(
                "Step {} depends on unknown step {}",
                missing.step_id, missing.dependency
            ),
        ));
    }

    for id in graph.duplicate_ids() {
        errors.push(ExecutionError::for_step(
            id.clone(),
            ErrorKind::Validation,
            format!("Step id {} is used more than once", id),
        ));
    }

    if let Some(path) = graph.find_cycle() {
        errors.push(ExecutionError::for_plan(
            ErrorKind::CycleDetected,
            format!("Cycle detected: {}", path.join(" → ")),
        ));
    }

    ValidationReport {
        valid: errors.is_empty(),
        errors,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tollway_core::ExecutionStep;

    fn step(id: &str, deps: &[&str]) -> ExecutionStep {
        let mut builder = ExecutionStep::builder(id, "test");
        for dep in deps {
            builder = builder.depends_on(*dep);
        }
        builder.build().unwrap()
    }

    fn plan(steps: Vec<ExecutionStep>) -> ExecutionPlan {
        ExecutionPlan {
            steps,
            ..ExecutionPlan::default()
        }
    }

    #[test]
    fn test_valid_chain() {
        let report = validate_chain(&plan(vec![step("a", &[]), step("b", &["a"])]));
        assert!(report.valid);
        assert!(report.errors.is_empty());
    }

    #[test]
    fn test_empty_plan_is_valid() {
        assert!(validate_chain(&ExecutionPlan::empty()).valid);
    }

    #[test]
    fn test_unknown_dependency() {
        let report = validate_chain(&plan(vec![step("a", &[]), step("b", &["ghost"])]));

        assert!(!report.valid);
        assert_eq!(report.errors.len(), 1);
        assert_eq!(report.errors[0].step_id.as_deref(), Some("b"));
        assert_eq!(report.errors[0].kind, ErrorKind::Validation);
        assert!(report.messages()[0].contains("ghost"));
    }

    #[test]
    fn test_two_step_cycle() {
        let report = validate_chain(&plan(vec![step("a", &["b"]), step("b", &["a"])]));

        assert!(!report.valid);
        assert_eq!(report.errors.len(), 1);
        assert_eq!(report.errors[0].kind, ErrorKind::CycleDetected);
        assert_eq!(report.errors[0].step_id, None);
        assert!(report.errors[0].error.starts_with("Cycle detected"));
    }

    #[test]
    fn test_duplicates_and_dangling_together() {
        let report = validate_chain(&plan(vec![
            step("a", &[]),
            step("a", &[]),
            step("c", &["missing"]),
        ]));

        assert_eq!(report.errors.len(), 2);
        assert_eq!(report.errors[0].step_id.as_deref(), Some("c"));
        assert!(report.errors[1].error.contains("more than once"));
    }
}
