//! Planner trait and configuration.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tollway_core::{ExecutionPlan, RetryPolicy, Result, TollwayError};

/// Configuration for the planner.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PlannerConfig {
    /// Maximum number of steps allowed in a plan.
    pub max_steps: usize,

    /// Retry policy attached to every generated step.
    pub default_retry_policy: RetryPolicy,

    /// Prefix for generated service names (`<prefix>-<action>`).
    pub service_prefix: Option<String>,
}

impl Default for PlannerConfig {
    fn default() -> Self {
        Self {
            max_steps: 16,
            default_retry_policy: RetryPolicy::default(),
            service_prefix: Some("tollway".to_string()),
        }
    }
}

/// Trait for planning engines.
///
/// Any implementation producing a conforming [`ExecutionPlan`] can stand in
/// for the built-in [`Decomposer`](crate::Decomposer); the executor does not
/// care how a plan was produced.
#[async_trait]
pub trait Planner: Send + Sync {
    /// Generate a plan for the given task description.
    async fn plan(&self, description: &str) -> Result<ExecutionPlan>;

    /// Short name used in logs.
    fn name(&self) -> &str;

    /// Check that a plan's derived metadata matches its steps.
    ///
    /// Fails on dangling dependencies, duplicates and cycles, and when the
    /// stored DAG view, critical path, groups or totals disagree with what
    /// the steps imply.
    fn validate_plan(&self, plan: &ExecutionPlan) -> Result<()> {
        let derived = ExecutionPlan::from_steps(plan.steps.clone())?;

        if derived.dag != plan.dag
            || derived.critical_path != plan.critical_path
            || derived.parallel_groups != plan.parallel_groups
            || derived.total_estimated_time != plan.total_estimated_time
            || (derived.total_estimated_cost - plan.total_estimated_cost).abs() > 1e-9
        {
            return Err(TollwayError::validation(
                "Plan metadata does not match its steps",
            ));
        }

        Ok(())
    }
}
