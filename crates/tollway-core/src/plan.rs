//! Execution plan: steps plus the DAG metadata derived from them.

use std::collections::{BTreeMap, HashMap};

use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

use crate::dag::StepGraph;
use crate::error::{Result, TollwayError};
use crate::step::ExecutionStep;

/// An ordered list of steps with its dependency view, critical path and
/// cost/time bounds.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct ExecutionPlan {
    /// Steps in execution order.
    pub steps: Vec<ExecutionStep>,

    /// Step id -> ids of the steps depending on it. Every step is a key.
    pub dag: BTreeMap<String, Vec<String>>,

    /// Heaviest dependency chain, by summed estimated time.
    pub critical_path: Vec<String>,

    /// Groups of mutually independent steps, one per level.
    pub parallel_groups: Vec<Vec<String>>,

    /// Sum of every step's estimated cost.
    pub total_estimated_cost: f64,

    /// Sum over levels of the slowest step at each level, in milliseconds.
    pub total_estimated_time: u64,
}

impl ExecutionPlan {
    /// The valid zero-step, zero-cost plan.
    pub fn empty() -> Self {
        Self::default()
    }

    /// Validate `steps` and derive the plan metadata.
    ///
    /// Rejects duplicate ids, dangling dependencies and cycles.
    pub fn from_steps(steps: Vec<ExecutionStep>) -> Result<Self> {
        {
            let graph = StepGraph::new(&steps);

            if let Some(id) = graph.duplicate_ids().first() {
                return Err(TollwayError::validation(format!(
                    "Step {} is defined more than once",
                    id
                )));
            }

            if !graph.missing_dependencies().is_empty() {
                let detail: Vec<String> = graph
                    .missing_dependencies()
                    .iter()
                    .map(|m| format!("{} -> {}", m.step_id, m.dependency))
                    .collect();
                return Err(TollwayError::validation(format!(
                    "Unknown dependencies: {}",
                    detail.join(", ")
                )));
            }

            if let Some(path) = graph.find_cycle() {
                return Err(TollwayError::CycleDetected { path });
            }
        }

        Ok(Self::assemble(steps))
    }

    /// Derive the plan metadata without validating.
    ///
    /// Unknown dependency ids are ignored and cycles cannot recurse forever,
    /// but the result is only meaningful for a valid DAG.
    pub fn assemble(steps: Vec<ExecutionStep>) -> Self {
        let graph = StepGraph::new(&steps);
        let levels = graph.levels();
        let id_of = |i: &usize| graph.step(*i).id.clone();

        let dag: BTreeMap<String, Vec<String>> = (0..graph.len())
            .map(|i| {
                let dependents: Vec<String> = graph.dependents_of(i).iter().map(id_of).collect();
                (graph.step(i).id.clone(), dependents)
            })
            .collect();
        let critical_path: Vec<String> = graph.critical_path().iter().map(id_of).collect();
        let parallel_groups: Vec<Vec<String>> = graph
            .parallel_groups(&levels)
            .iter()
            .map(|group| group.iter().map(id_of).collect())
            .collect();
        let total_estimated_time = graph.level_time(&levels);
        let total_estimated_cost: f64 = steps.iter().map(|s| s.estimated_cost).sum();

        Self {
            dag,
            critical_path,
            parallel_groups,
            total_estimated_cost,
            total_estimated_time,
            steps,
        }
    }

    /// Number of steps.
    pub fn len(&self) -> usize {
        self.steps.len()
    }

    /// Whether the plan has no steps.
    pub fn is_empty(&self) -> bool {
        self.steps.is_empty()
    }

    /// Look up a step by id.
    pub fn step(&self, id: &str) -> Option<&ExecutionStep> {
        self.steps.iter().find(|s| s.id == id)
    }

    /// Steps no other step depends on, in plan order.
    pub fn terminal_steps(&self) -> Vec<&ExecutionStep> {
        self.steps
            .iter()
            .filter(|s| self.dag.get(&s.id).map_or(true, |d| d.is_empty()))
            .collect()
    }

    /// Diagnostic rendering such as `step_1 → (step_1) → step_2`.
    pub fn render_graph(&self) -> String {
        self.steps
            .iter()
            .map(|step| {
                if !step.has_dependencies() {
                    step.id.clone()
                } else {
                    format!("({}) → {}", step.dependencies.join(" || "), step.id)
                }
            })
            .collect::<Vec<_>>()
            .join(" → ")
    }

    /// Derive the plan output from the outputs produced so far.
    ///
    /// A single terminal step yields its own output; several yield an object
    /// keyed by each terminal step's output key, omitting the ones that
    /// produced nothing.
    pub fn derive_output(&self, outputs: &HashMap<String, serde_json::Value>) -> serde_json::Value {
        let terminals = self.terminal_steps();

        match terminals.as_slice() {
            [] => serde_json::Value::Null,
            [only] => outputs
                .get(only.output_key())
                .cloned()
                .unwrap_or(serde_json::Value::Null),
            many => {
                let record: serde_json::Map<String, serde_json::Value> = many
                    .iter()
                    .filter_map(|step| {
                        let key = step.output_key();
                        outputs.get(key).map(|value| (key.to_string(), value.clone()))
                    })
                    .collect();
                serde_json::Value::Object(record)
            }
        }
    }

    /// SHA-256 over the plan's canonical JSON, hex encoded.
    ///
    /// Structurally identical plans share a fingerprint.
    pub fn fingerprint(&self) -> String {
        let json = serde_json::to_vec(self).unwrap_or_default();
        let mut hasher = Sha256::new();
        hasher.update(&json);
        hasher
            .finalize()
            .iter()
            .map(|b| format!("{:02x}", b))
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn step(id: &str, deps: &[&str], cost: f64, time: u64) -> ExecutionStep {
        let mut builder = ExecutionStep::builder(id, "test").cost(cost).time(time);
        for dep in deps {
            builder = builder.depends_on(*dep);
        }
        builder.build().unwrap()
    }

    #[test]
    fn test_from_steps_derives_metadata() {
        let plan = ExecutionPlan::from_steps(vec![
            step("step_1", &[], 1.0, 1000),
            step("step_2", &["step_1"], 2.0, 1000),
            step("step_3", &["step_2"], 3.0, 1000),
        ])
        .unwrap();

        assert_eq!(plan.total_estimated_cost, 6.0);
        assert_eq!(plan.total_estimated_time, 3000);
        assert_eq!(plan.critical_path, vec!["step_1", "step_2", "step_3"]);
        assert_eq!(plan.dag["step_1"], vec!["step_2"]);
        assert!(plan.dag["step_3"].is_empty());
        assert_eq!(plan.parallel_groups.len(), 3);
    }

    #[test]
    fn test_from_steps_rejects_dangling_dependency() {
        let err = ExecutionPlan::from_steps(vec![step("a", &["missing"], 1.0, 1)]).unwrap_err();
        assert!(matches!(err, TollwayError::Validation { .. }));
        assert!(err.to_string().contains("a -> missing"));
    }

    #[test]
    fn test_from_steps_rejects_cycle() {
        let err = ExecutionPlan::from_steps(vec![
            step("a", &["b"], 1.0, 1),
            step("b", &["a"], 1.0, 1),
        ])
        .unwrap_err();
        assert!(matches!(err, TollwayError::CycleDetected { .. }));
    }

    #[test]
    fn test_from_steps_rejects_duplicates() {
        let err = ExecutionPlan::from_steps(vec![step("a", &[], 1.0, 1), step("a", &[], 1.0, 1)])
            .unwrap_err();
        assert!(err.to_string().contains("more than once"));
    }

    #[test]
    fn test_empty_plan() {
        let plan = ExecutionPlan::from_steps(Vec::new()).unwrap();
        assert_eq!(plan, ExecutionPlan::empty());
        assert!(plan.is_empty());
        assert_eq!(plan.total_estimated_cost, 0.0);
        assert_eq!(plan.render_graph(), "");
    }

    #[test]
    fn test_render_graph() {
        let plan = ExecutionPlan::assemble(vec![
            step("step_1", &[], 0.0, 0),
            step("step_2", &["step_1"], 0.0, 0),
            step("step_3", &["step_1"], 0.0, 0),
            step("step_4", &["step_2", "step_3"], 0.0, 0),
        ]);
        assert_eq!(
            plan.render_graph(),
            "step_1 → (step_1) → step_2 → (step_1) → step_3 → (step_2 || step_3) → step_4"
        );
    }

    #[test]
    fn test_single_terminal_output() {
        let plan = ExecutionPlan::assemble(vec![step("a", &[], 0.0, 0), step("b", &["a"], 0.0, 0)]);
        let outputs = HashMap::from([
            ("a".to_string(), json!(1)),
            ("b".to_string(), json!({"report": "done"})),
        ]);
        assert_eq!(plan.derive_output(&outputs), json!({"report": "done"}));
    }

    #[test]
    fn test_multiple_terminal_output_keyed_by_output_key() {
        let left = ExecutionStep::builder("left", "test")
            .output_key("prices")
            .build()
            .unwrap();
        let right = step("right", &[], 0.0, 0);
        let plan = ExecutionPlan::assemble(vec![left, right]);

        let outputs = HashMap::from([
            ("prices".to_string(), json!([1, 2])),
            ("right".to_string(), json!("ok")),
        ]);
        assert_eq!(
            plan.derive_output(&outputs),
            json!({"prices": [1, 2], "right": "ok"})
        );
    }

    #[test]
    fn test_fingerprint_is_stable() {
        let build = || {
            ExecutionPlan::from_steps(vec![
                step("a", &[], 0.5, 10),
                step("b", &["a"], 0.5, 10),
            ])
            .unwrap()
        };
        let first = build().fingerprint();
        assert_eq!(first, build().fingerprint());
        assert_eq!(first.len(), 64);
        assert_ne!(first, ExecutionPlan::empty().fingerprint());
    }
}
