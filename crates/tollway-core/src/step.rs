//! Execution step types and builder.
//!
//! A step is one external service invocation inside a plan. Steps are
//! immutable once a plan has been assembled from them.

use std::collections::BTreeMap;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::{Result, TollwayError};

/// A single external service invocation within an [`ExecutionPlan`](crate::ExecutionPlan).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExecutionStep {
    /// Identifier, unique within its plan.
    pub id: String,

    /// The action requested from the service (e.g. "fetch_data").
    pub action: String,

    /// Static parameters passed to the service.
    #[serde(default)]
    pub params: BTreeMap<String, serde_json::Value>,

    /// Ids of the steps that must succeed before this one runs.
    #[serde(default)]
    pub dependencies: Vec<String>,

    /// Whether the step may run alongside its same-priority siblings.
    #[serde(default)]
    pub parallelizable: bool,

    /// Planned cost of the invocation.
    pub estimated_cost: f64,

    /// Planned duration of the invocation in milliseconds.
    pub estimated_time: u64,

    /// Key under which the output is published to later steps. Defaults to `id`.
    #[serde(default)]
    pub output_key: Option<String>,

    /// Parameter name -> upstream output key.
    #[serde(default)]
    pub input_mapping: BTreeMap<String, String>,

    /// Name of the service handling the step.
    #[serde(default)]
    pub service_name: Option<String>,

    /// Endpoint of the service handling the step.
    #[serde(default)]
    pub service_url: Option<String>,

    /// Backoff policy used when the executor runs with the retry strategy.
    #[serde(default)]
    pub retry_policy: RetryPolicy,
}

impl ExecutionStep {
    /// Create a new StepBuilder.
    pub fn builder(id: impl Into<String>, action: impl Into<String>) -> StepBuilder {
        StepBuilder::new(id, action)
    }

    /// The key this step's output is stored under.
    pub fn output_key(&self) -> &str {
        self.output_key.as_deref().unwrap_or(&self.id)
    }

    /// Whether the step waits on any other step.
    pub fn has_dependencies(&self) -> bool {
        !self.dependencies.is_empty()
    }
}

/// Bounded exponential backoff for a step.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RetryPolicy {
    /// Total attempts including the first one.
    pub max_attempts: u32,

    /// Factor applied to the delay after each failed attempt.
    pub backoff_multiplier: f64,

    /// Delay before the second attempt.
    pub initial_delay_ms: u64,

    /// Upper bound for any single delay.
    pub max_delay_ms: u64,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            backoff_multiplier: 2.0,
            initial_delay_ms: 1_000,
            max_delay_ms: 30_000,
        }
    }
}

impl RetryPolicy {
    /// A policy that never retries.
    pub fn none() -> Self {
        Self {
            max_attempts: 1,
            ..Self::default()
        }
    }

    /// Set the attempt limit.
    pub fn with_max_attempts(mut self, max_attempts: u32) -> Self {
        self.max_attempts = max_attempts;
        self
    }

    /// Set the initial delay and the cap.
    pub fn with_delays(mut self, initial_delay_ms: u64, max_delay_ms: u64) -> Self {
        self.initial_delay_ms = initial_delay_ms;
        self.max_delay_ms = max_delay_ms;
        self
    }

    /// Attempt limit, never below one.
    pub fn attempts(&self) -> u32 {
        self.max_attempts.max(1)
    }

    /// Delay to wait after the `failed_attempts`-th failure (1-based).
    pub fn delay_for(&self, failed_attempts: u32) -> Duration {
        let exponent = failed_attempts.saturating_sub(1).min(64) as i32;
        let raw = self.initial_delay_ms as f64 * self.backoff_multiplier.powi(exponent);
        let cap = self.max_delay_ms as f64;

        let millis = if raw.is_finite() && raw >= 0.0 {
            raw.min(cap)
        } else {
            cap
        };
        Duration::from_millis(millis as u64)
    }
}

/// Builder for creating steps with a fluent API.
#[derive(Debug)]
pub struct StepBuilder {
    step: ExecutionStep,
}

impl StepBuilder {
    /// Create a new StepBuilder.
    pub fn new(id: impl Into<String>, action: impl Into<String>) -> Self {
        Self {
            step: ExecutionStep {
                id: id.into(),
                action: action.into(),
                params: BTreeMap::new(),
                dependencies: Vec::new(),
                parallelizable: false,
                estimated_cost: 0.0,
                estimated_time: 0,
                output_key: None,
                input_mapping: BTreeMap::new(),
                service_name: None,
                service_url: None,
                retry_policy: RetryPolicy::default(),
            },
        }
    }

    /// Add a static parameter.
    pub fn param(mut self, name: impl Into<String>, value: serde_json::Value) -> Self {
        self.step.params.insert(name.into(), value);
        self
    }

    /// Add a dependency on another step.
    pub fn depends_on(mut self, step_id: impl Into<String>) -> Self {
        self.step.dependencies.push(step_id.into());
        self
    }

    /// Mark the step as parallelizable.
    pub fn parallelizable(mut self, parallelizable: bool) -> Self {
        self.step.parallelizable = parallelizable;
        self
    }

    /// Set the planned cost.
    pub fn cost(mut self, cost: f64) -> Self {
        self.step.estimated_cost = cost;
        self
    }

    /// Set the planned duration in milliseconds.
    pub fn time(mut self, time_ms: u64) -> Self {
        self.step.estimated_time = time_ms;
        self
    }

    /// Publish the output under a custom key.
    pub fn output_key(mut self, key: impl Into<String>) -> Self {
        self.step.output_key = Some(key.into());
        self
    }

    /// Feed an upstream output into a parameter.
    pub fn map_input(mut self, param: impl Into<String>, upstream_key: impl Into<String>) -> Self {
        self.step.input_mapping.insert(param.into(), upstream_key.into());
        self
    }

    /// Set the service handling the step.
    pub fn service(mut self, name: impl Into<String>, url: impl Into<String>) -> Self {
        self.step.service_name = Some(name.into());
        self.step.service_url = Some(url.into());
        self
    }

    /// Set the retry policy.
    pub fn retry_policy(mut self, policy: RetryPolicy) -> Self {
        self.step.retry_policy = policy;
        self
    }

    /// Build the step.
    pub fn build(self) -> Result<ExecutionStep> {
        let step = self.step;

        if step.id.trim().is_empty() {
            return Err(TollwayError::validation("Step id cannot be empty"));
        }
        if step.action.trim().is_empty() {
            return Err(TollwayError::validation(format!(
                "Step {} has an empty action",
                step.id
            )));
        }
        if !step.estimated_cost.is_finite() || step.estimated_cost < 0.0 {
            return Err(TollwayError::validation(format!(
                "Step {} has an invalid estimated cost: {}",
                step.id, step.estimated_cost
            )));
        }
        if step.dependencies.iter().any(|dep| dep == &step.id) {
            return Err(TollwayError::CycleDetected {
                path: vec![step.id.clone(), step.id],
            });
        }

        Ok(step)
    }
}
