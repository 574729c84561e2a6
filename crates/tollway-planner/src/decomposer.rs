//! Keyword-driven task decomposer.

use std::collections::{BTreeMap, BTreeSet, HashMap};

use async_trait::async_trait;
use tollway_core::{ExecutionPlan, ExecutionStep, Result, TollwayError};
use tracing::{debug, info};

use crate::catalog::{Capability, Category, CATALOG};
use crate::planner::{Planner, PlannerConfig};

/// Intermediate unit of work, one per activated category.
#[derive(Debug, Clone)]
struct Task {
    id: String,
    description: String,
    required_capabilities: BTreeSet<String>,
    priority: i32,
    dependencies: Vec<String>,
    estimated_cost: f64,
    estimated_time: u64,
    action: &'static str,
}

/// Deterministic decomposer: task description -> execution plan.
///
/// Performs no I/O; the same description always yields the same plan.
pub struct Decomposer {
    config: PlannerConfig,
}

impl Decomposer {
    /// Create a decomposer with default configuration.
    pub fn new() -> Self {
        Self {
            config: PlannerConfig::default(),
        }
    }

    /// Create a decomposer with custom configuration.
    pub fn with_config(config: PlannerConfig) -> Self {
        Self { config }
    }

    /// Get the planner configuration.
    pub fn config(&self) -> &PlannerConfig {
        &self.config
    }

    /// Categories activated by the description, in catalog order.
    pub fn classify(&self, description: &str) -> Vec<Capability> {
        let text = description.to_lowercase();
        CATALOG
            .iter()
            .filter(|category| category.matches(&text))
            .map(|category| category.capability)
            .collect()
    }

    /// Decompose a description into a plan.
    ///
    /// A description matching no category yields the empty plan.
    pub fn decompose(&self, description: &str) -> ExecutionPlan {
        let capabilities = self.classify(description);
        let activated: Vec<&Category> = CATALOG
            .iter()
            .filter(|c| capabilities.contains(&c.capability))
            .collect();

        let tasks = build_tasks(description, &activated);
        let mut steps = self.tasks_to_steps(description, &tasks);
        propagate_times(&mut steps);

        let plan = ExecutionPlan::assemble(steps);
        debug!(
            capabilities = ?capabilities,
            steps = plan.len(),
            total_cost = plan.total_estimated_cost,
            total_time_ms = plan.total_estimated_time,
            graph = %plan.render_graph(),
            "Decomposed task description"
        );
        plan
    }

    fn tasks_to_steps(&self, description: &str, tasks: &[Task]) -> Vec<ExecutionStep> {
        let step_ids: HashMap<&str, String> = tasks
            .iter()
            .enumerate()
            .map(|(i, task)| (task.id.as_str(), format!("step_{}", i + 1)))
            .collect();

        tasks
            .iter()
            .enumerate()
            .map(|(i, task)| {
                let dependencies: Vec<String> = task
                    .dependencies
                    .iter()
                    .filter_map(|dep| step_ids.get(dep.as_str()).cloned())
                    .collect();

                let has_independent_sibling = tasks.iter().enumerate().any(|(j, other)| {
                    j != i
                        && other.priority == task.priority
                        && !task.dependencies.contains(&other.id)
                });

                let mut params = BTreeMap::new();
                params.insert("query".to_string(), serde_json::json!(description));
                params.insert("task".to_string(), serde_json::json!(task.description));
                params.insert(
                    "capabilities".to_string(),
                    serde_json::json!(task.required_capabilities),
                );

                ExecutionStep {
                    id: format!("step_{}", i + 1),
                    action: task.action.to_string(),
                    params,
                    parallelizable: dependencies.is_empty() || has_independent_sibling,
                    dependencies,
                    estimated_cost: task.estimated_cost,
                    estimated_time: task.estimated_time,
                    output_key: None,
                    input_mapping: BTreeMap::new(),
                    service_name: self
                        .config
                        .service_prefix
                        .as_ref()
                        .map(|prefix| format!("{}-{}", prefix, task.action)),
                    service_url: None,
                    retry_policy: self.config.default_retry_policy.clone(),
                }
            })
            .collect()
    }
}

impl Default for Decomposer {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl Planner for Decomposer {
    async fn plan(&self, description: &str) -> Result<ExecutionPlan> {
        let plan = self.decompose(description);

        info!(
            planner = self.name(),
            steps = plan.len(),
            "Planned task"
        );

        if plan.len() > self.config.max_steps {
            return Err(TollwayError::Planning {
                message: format!(
                    "Plan has {} steps, limit is {}",
                    plan.len(),
                    self.config.max_steps
                ),
            });
        }

        Ok(plan)
    }

    fn name(&self) -> &str {
        "decomposer"
    }
}

/// One task per activated category, with category dependency rules applied.
fn build_tasks(description: &str, activated: &[&Category]) -> Vec<Task> {
    let mut tasks: Vec<Task> = Vec::with_capacity(activated.len());
    let mut data_task: Option<String> = None;

    for (i, category) in activated.iter().enumerate() {
        let id = format!("task_{}", i + 1);

        let dependencies = match category.capability {
            Capability::Data => Vec::new(),
            Capability::Analysis | Capability::Computation => data_task.iter().cloned().collect(),
            Capability::Generation => tasks.iter().map(|t| t.id.clone()).collect(),
        };

        if category.capability == Capability::Data {
            data_task = Some(id.clone());
        }

        tasks.push(Task {
            id,
            description: format!("{}: {}", category.summary, description.trim()),
            required_capabilities: category.tags.iter().map(|t| t.to_string()).collect(),
            priority: category.priority,
            dependencies,
            estimated_cost: category.estimated_cost,
            estimated_time: category.estimated_time,
            action: category.action,
        });
    }

    tasks
}

/// Raise each step's estimated time to at least its slowest direct dependency.
fn propagate_times(steps: &mut [ExecutionStep]) {
    let mut times: HashMap<String, u64> = HashMap::with_capacity(steps.len());

    for step in steps.iter_mut() {
        let slowest_dep = step
            .dependencies
            .iter()
            .filter_map(|dep| times.get(dep))
            .copied()
            .max();

        if let Some(slowest) = slowest_dep {
            step.estimated_time = step.estimated_time.max(slowest);
        }
        times.insert(step.id.clone(), step.estimated_time);
    }
}
