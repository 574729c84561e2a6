//! Execution result types.
//!
//! A [`ChainExecutionResult`] is what one run of a plan produces. It has a
//! stable serialized shape so an external store or event bus can persist it.

use std::fmt;

use chrono::{DateTime, Utc};
use serde::de::{MapAccess, Visitor};
use serde::ser::SerializeMap;
use serde::{Deserialize, Deserializer, Serialize, Serializer};

/// Category of an execution error.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorKind {
    /// Plan rejected before execution (dangling reference, over budget).
    Validation,
    /// The plan's dependency graph has a cycle.
    CycleDetected,
    /// A step's dependencies were not all executed successfully.
    DependencyUnmet,
    /// The service answered with a failure other than payment-required.
    ServiceCall,
    /// The service requires payment before it will serve the request.
    PaymentRequired,
    /// A per-call deadline or the plan-wide budget elapsed.
    Timeout,
    /// The run was cancelled before the step was dispatched.
    Cancelled,
}

impl ErrorKind {
    /// Whether errors of this kind are raised before any step runs.
    pub fn is_pre_execution(&self) -> bool {
        matches!(self, ErrorKind::Validation | ErrorKind::CycleDetected)
    }
}

/// One recorded error of a run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExecutionError {
    /// The step the error belongs to; `None` for plan-level errors.
    pub step_id: Option<String>,

    /// Human-readable message.
    pub error: String,

    /// Error category.
    pub kind: ErrorKind,

    /// When the error was recorded.
    pub timestamp: DateTime<Utc>,
}

impl ExecutionError {
    /// Create an error attached to a step.
    pub fn for_step(step_id: impl Into<String>, kind: ErrorKind, error: impl Into<String>) -> Self {
        Self {
            step_id: Some(step_id.into()),
            error: error.into(),
            kind,
            timestamp: Utc::now(),
        }
    }

    /// Create a plan-level error.
    pub fn for_plan(kind: ErrorKind, error: impl Into<String>) -> Self {
        Self {
            step_id: None,
            error: error.into(),
            kind,
            timestamp: Utc::now(),
        }
    }
}

/// Outcome of one attempted step.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StepResult {
    /// The step this result belongs to.
    pub step_id: String,

    /// Whether the final attempt succeeded.
    pub success: bool,

    /// Output of the service, if it succeeded.
    pub output: Option<serde_json::Value>,

    /// Planned cost charged for the step (zero on failure).
    pub cost: f64,

    /// Wall-clock time spent on the step in milliseconds, retries included.
    pub time: u64,

    /// Failure message of the final attempt.
    pub error: Option<String>,

    /// Number of invocations made.
    pub attempts: u32,
}

impl StepResult {
    /// A successful step.
    pub fn succeeded(
        step_id: impl Into<String>,
        output: serde_json::Value,
        cost: f64,
        time: u64,
        attempts: u32,
    ) -> Self {
        Self {
            step_id: step_id.into(),
            success: true,
            output: Some(output),
            cost,
            time,
            error: None,
            attempts,
        }
    }

    /// A failed step.
    pub fn failed(step_id: impl Into<String>, error: impl Into<String>, time: u64, attempts: u32) -> Self {
        Self {
            step_id: step_id.into(),
            success: false,
            output: None,
            cost: 0.0,
            time,
            error: Some(error.into()),
            attempts,
        }
    }
}

/// Step results keyed by step id, iterated in insertion order.
///
/// Serializes as a JSON object whose keys follow execution order.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct StepResults {
    entries: Vec<StepResult>,
}

impl StepResults {
    /// Create an empty collection.
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert a result, replacing any previous result for the same step
    /// in place.
    pub fn insert(&mut self, result: StepResult) {
        match self.entries.iter_mut().find(|r| r.step_id == result.step_id) {
            Some(existing) => *existing = result,
            None => self.entries.push(result),
        }
    }

    /// Result for a step, if it was attempted.
    pub fn get(&self, step_id: &str) -> Option<&StepResult> {
        self.entries.iter().find(|r| r.step_id == step_id)
    }

    /// Whether a step has a result.
    pub fn contains(&self, step_id: &str) -> bool {
        self.get(step_id).is_some()
    }

    /// Number of results.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Whether no step was attempted.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Results in insertion order.
    pub fn iter(&self) -> std::slice::Iter<'_, StepResult> {
        self.entries.iter()
    }

    /// Step ids in insertion order.
    pub fn step_ids(&self) -> Vec<&str> {
        self.entries.iter().map(|r| r.step_id.as_str()).collect()
    }
}

impl<'a> IntoIterator for &'a StepResults {
    type Item = &'a StepResult;
    type IntoIter = std::slice::Iter<'a, StepResult>;

    fn into_iter(self) -> Self::IntoIter {
        self.entries.iter()
    }
}

impl FromIterator<StepResult> for StepResults {
    fn from_iter<T: IntoIterator<Item = StepResult>>(iter: T) -> Self {
        let mut results = StepResults::new();
        for result in iter {
            results.insert(result);
        }
        results
    }
}

impl Serialize for StepResults {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(self.entries.len()))?;
        for result in &self.entries {
            map.serialize_entry(&result.step_id, result)?;
        }
        map.end()
    }
}

impl<'de> Deserialize<'de> for StepResults {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        struct StepResultsVisitor;

        impl<'de> Visitor<'de> for StepResultsVisitor {
            type Value = StepResults;

            fn expecting(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str("a map of step id to step result")
            }

            fn visit_map<A: MapAccess<'de>>(self, mut access: A) -> Result<StepResults, A::Error> {
                let mut results = StepResults::new();
                while let Some((_key, value)) = access.next_entry::<String, StepResult>()? {
                    results.insert(value);
                }
                Ok(results)
            }
        }

        deserializer.deserialize_map(StepResultsVisitor)
    }
}

/// Outcome of executing a whole plan.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChainExecutionResult {
    /// True when no error was recorded.
    pub success: bool,

    /// Planned cost of the steps that succeeded.
    pub total_cost: f64,

    /// Wall-clock time of the run in milliseconds.
    pub total_time: u64,

    /// One entry per attempted step, in execution order.
    pub step_results: StepResults,

    /// Output derived from the terminal steps.
    pub output: serde_json::Value,

    /// Errors in the order they were recorded.
    pub errors: Vec<ExecutionError>,
}

impl ChainExecutionResult {
    /// A run rejected before any step executed.
    pub fn rejected(error: ExecutionError) -> Self {
        Self::rejected_with(vec![error])
    }

    /// A run rejected before any step executed, with several reasons.
    pub fn rejected_with(errors: Vec<ExecutionError>) -> Self {
        Self {
            success: false,
            total_cost: 0.0,
            total_time: 0,
            step_results: StepResults::new(),
            output: serde_json::Value::Null,
            errors,
        }
    }

    /// Results of the steps that failed.
    pub fn failed_steps(&self) -> Vec<&StepResult> {
        self.step_results.iter().filter(|r| !r.success).collect()
    }

    /// Results of the steps that succeeded.
    pub fn successful_steps(&self) -> Vec<&StepResult> {
        self.step_results.iter().filter(|r| r.success).collect()
    }

    /// First error recorded for a step.
    pub fn error_for(&self, step_id: &str) -> Option<&ExecutionError> {
        self.errors
            .iter()
            .find(|e| e.step_id.as_deref() == Some(step_id))
    }

    /// Whether any error of the given kind was recorded.
    pub fn has_error_kind(&self, kind: ErrorKind) -> bool {
        self.errors.iter().any(|e| e.kind == kind)
    }

    /// Fraction of attempted steps that succeeded (0.0 to 1.0).
    pub fn success_rate(&self) -> f32 {
        if self.step_results.is_empty() {
            return 0.0;
        }
        self.successful_steps().len() as f32 / self.step_results.len() as f32
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_step_results_keep_insertion_order() {
        let mut results = StepResults::new();
        results.insert(StepResult::succeeded("step_3", json!(3), 3.0, 1, 1));
        results.insert(StepResult::succeeded("step_1", json!(1), 1.0, 1, 1));
        results.insert(StepResult::failed("step_2", "boom", 1, 1));

        assert_eq!(results.step_ids(), vec!["step_3", "step_1", "step_2"]);
        assert!(!results.get("step_2").unwrap().success);
        assert!(results.get("step_4").is_none());
    }

    #[test]
    fn test_insert_replaces_in_place() {
        let mut results = StepResults::new();
        results.insert(StepResult::failed("a", "first", 1, 1));
        results.insert(StepResult::succeeded("b", json!(null), 0.0, 1, 1));
        results.insert(StepResult::succeeded("a", json!("ok"), 1.0, 1, 2));

        assert_eq!(results.len(), 2);
        assert_eq!(results.step_ids(), vec!["a", "b"]);
        assert_eq!(results.get("a").unwrap().attempts, 2);
    }

    #[test]
    fn test_step_results_serialize_as_ordered_map() {
        let results: StepResults = vec![
            StepResult::succeeded("step_2", json!("x"), 1.0, 5, 1),
            StepResult::succeeded("step_1", json!("y"), 1.0, 5, 1),
        ]
        .into_iter()
        .collect();

        let json = serde_json::to_string(&results).unwrap();
        let first = json.find("\"step_2\"").unwrap();
        let second = json.find("\"step_1\"").unwrap();
        assert!(first < second);

        let back: StepResults = serde_json::from_str(&json).unwrap();
        assert_eq!(back.step_ids(), vec!["step_2", "step_1"]);
    }

    #[test]
    fn test_rejected_result_shape() {
        let result = ChainExecutionResult::rejected(ExecutionError::for_plan(
            ErrorKind::Validation,
            "over budget",
        ));

        assert!(!result.success);
        assert_eq!(result.total_cost, 0.0);
        assert_eq!(result.total_time, 0);
        assert!(result.step_results.is_empty());
        assert_eq!(result.errors.len(), 1);
        assert!(result.errors[0].kind.is_pre_execution());
        assert_eq!(result.success_rate(), 0.0);
    }

    #[test]
    fn test_error_kind_serialization() {
        let json = serde_json::to_string(&ErrorKind::PaymentRequired).unwrap();
        assert_eq!(json, "\"payment_required\"");
    }

    #[test]
    fn test_success_rate_and_lookup() {
        let result = ChainExecutionResult {
            success: false,
            total_cost: 1.0,
            total_time: 10,
            step_results: vec![
                StepResult::succeeded("a", json!(1), 1.0, 5, 1),
                StepResult::failed("b", "down", 5, 1),
            ]
            .into_iter()
            .collect(),
            output: json!(null),
            errors: vec![ExecutionError::for_step("b", ErrorKind::ServiceCall, "down")],
        };

        assert!((result.success_rate() - 0.5).abs() < f32::EPSILON);
        assert_eq!(result.failed_steps().len(), 1);
        assert_eq!(result.error_for("b").unwrap().kind, ErrorKind::ServiceCall);
        assert!(result.has_error_kind(ErrorKind::ServiceCall));
        assert!(!result.has_error_kind(ErrorKind::Timeout));
    }
}
