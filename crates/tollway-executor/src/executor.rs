//! Chain executor.
//!
//! Runs the steps of an [`ExecutionPlan`] in plan order, gating each one on
//! its dependencies, under a cost cap and a plan-wide time budget.

use std::collections::{BTreeMap, HashMap, HashSet};
use std::time::Duration;

use futures::future::join_all;
use tokio::sync::watch;
use tokio::time::{sleep, timeout, Instant};
use tollway_core::{
    ChainExecutionResult, ErrorKind, ExecutionError, ExecutionPlan, ExecutionStep, StepResult,
    StepResults,
};
use tracing::{debug, info, warn};

use crate::config::{ChainConfig, FailureStrategy};
use crate::invoker::{InvocationRequest, InvokeError, StepInvoker};
use crate::validation::{validate_chain, ValidationReport};

/// Final outcome of one step after all of its attempts.
struct StepOutcome {
    result: Result<serde_json::Value, InvokeError>,
    attempts: u32,
    elapsed_ms: u64,
}

/// Executes plans against a [`StepInvoker`].
///
/// One executor can run many plans, concurrently if needed; all per-run state
/// lives on the stack of [`ChainExecutor::execute_with_cancel`].
pub struct ChainExecutor<I> {
    config: ChainConfig,
    invoker: I,
}

impl<I: StepInvoker> ChainExecutor<I> {
    /// Create an executor with default configuration.
    pub fn new(invoker: I) -> Self {
        Self::with_config(invoker, ChainConfig::default())
    }

    /// Create an executor with custom configuration.
    pub fn with_config(invoker: I, config: ChainConfig) -> Self {
        Self { config, invoker }
    }

    /// Get the executor configuration.
    pub fn config(&self) -> &ChainConfig {
        &self.config
    }

    /// Get the invoker.
    pub fn invoker(&self) -> &I {
        &self.invoker
    }

    /// Check the plan's structure without executing anything.
    pub fn validate_chain(&self, plan: &ExecutionPlan) -> ValidationReport {
        validate_chain(plan)
    }

    /// Execute a plan to completion.
    pub async fn execute(&self, plan: &ExecutionPlan) -> ChainExecutionResult {
        let (_cancel, cancel_rx) = watch::channel(false);
        self.execute_with_cancel(plan, cancel_rx).await
    }

    /// Execute a plan, stopping before the next dispatch once `cancel` is set.
    ///
    /// A step already in flight when cancellation arrives runs to completion
    /// and its result is recorded.
    pub async fn execute_with_cancel(
        &self,
        plan: &ExecutionPlan,
        cancel: watch::Receiver<bool>,
    ) -> ChainExecutionResult {
        if plan.total_estimated_cost > self.config.max_total_cost {
            warn!(
                "💸 Plan cost {:.4} exceeds budget {:.4}, rejecting",
                plan.total_estimated_cost, self.config.max_total_cost
            );
            return ChainExecutionResult::rejected(ExecutionError::for_plan(
                ErrorKind::Validation,
                format!(
                    "Estimated cost {:.4} exceeds maximum of {:.4}",
                    plan.total_estimated_cost, self.config.max_total_cost
                ),
            ));
        }

        let report = self.validate_chain(plan);
        if !report.valid {
            warn!("Plan failed validation: {}", report.messages().join("; "));
            return ChainExecutionResult::rejected_with(report.errors);
        }

        info!(
            steps = plan.len(),
            strategy = ?self.config.failure_strategy,
            "🚀 Executing plan"
        );

        let started = Instant::now();
        let deadline = started + Duration::from_millis(self.config.timeout_ms);

        let mut executed: HashSet<&str> = HashSet::with_capacity(plan.len());
        let mut outputs: HashMap<String, serde_json::Value> = HashMap::new();
        let mut step_results = StepResults::new();
        let mut errors: Vec<ExecutionError> = Vec::new();
        let mut total_cost = 0.0;

        for step in &plan.steps {
            if *cancel.borrow() {
                info!("🛑 Execution cancelled before step {}", step.id);
                errors.push(ExecutionError::for_step(
                    step.id.clone(),
                    ErrorKind::Cancelled,
                    "Execution cancelled before the step was dispatched",
                ));
                break;
            }

            if Instant::now() >= deadline {
                warn!("⏱️ Plan timeout of {}ms exhausted before step {}", self.config.timeout_ms, step.id);
                errors.push(ExecutionError::for_step(
                    step.id.clone(),
                    ErrorKind::Timeout,
                    format!("Plan timeout of {}ms exhausted", self.config.timeout_ms),
                ));
                break;
            }

            let unmet: Vec<&str> = step
                .dependencies
                .iter()
                .map(String::as_str)
                .filter(|dep| !executed.contains(dep))
                .collect();

            if !unmet.is_empty() {
                warn!("Step {} skipped, dependencies not met: {}", step.id, unmet.join(", "));
                errors.push(ExecutionError::for_step(
                    step.id.clone(),
                    ErrorKind::DependencyUnmet,
                    format!("Dependencies not met: {}", unmet.join(", ")),
                ));
                if self.config.failure_strategy == FailureStrategy::Abort {
                    break;
                }
                continue;
            }

            let params = resolve_params(step, &outputs);
            debug!(step = %step.id, params = ?params, "Dispatching step");

            let outcome = self.run_step(step, params, deadline).await;

            match outcome.result {
                Ok(output) => {
                    info!(
                        "  ✅ Step {} ({}) completed in {}ms after {} attempt(s)",
                        step.id, step.action, outcome.elapsed_ms, outcome.attempts
                    );
                    executed.insert(step.id.as_str());
                    outputs.insert(step.output_key().to_string(), output.clone());
                    total_cost += step.estimated_cost;
                    step_results.insert(StepResult::succeeded(
                        step.id.clone(),
                        output,
                        step.estimated_cost,
                        outcome.elapsed_ms,
                        outcome.attempts,
                    ));
                }
                Err(err) => {
                    warn!("  ❌ Step {} ({}) failed: {}", step.id, step.action, err);
                    let message = err.to_string();
                    step_results.insert(StepResult::failed(
                        step.id.clone(),
                        message.clone(),
                        outcome.elapsed_ms,
                        outcome.attempts,
                    ));
                    errors.push(ExecutionError::for_step(step.id.clone(), err.kind(), message));

                    if self.config.failure_strategy == FailureStrategy::Abort {
                        break;
                    }
                }
            }
        }

        let total_time = started.elapsed().as_millis() as u64;
        let success = errors.is_empty();

        info!(
            success,
            total_cost,
            total_time_ms = total_time,
            errors = errors.len(),
            "🏁 Plan execution finished"
        );

        ChainExecutionResult {
            success,
            total_cost,
            total_time,
            step_results,
            output: plan.derive_output(&outputs),
            errors,
        }
    }

    /// Run the parallelizable steps of `steps` concurrently.
    ///
    /// Dependencies are not consulted and each step resolves its inputs
    /// against an empty output map, so only static parameters reach the
    /// invoker. Non-parallelizable steps are left out of the result.
    pub async fn execute_parallel(&self, steps: &[ExecutionStep]) -> StepResults {
        let candidates: Vec<&ExecutionStep> = steps.iter().filter(|s| s.parallelizable).collect();
        debug!(
            "Running {} of {} steps in parallel",
            candidates.len(),
            steps.len()
        );

        let deadline = Instant::now() + Duration::from_millis(self.config.timeout_ms);
        let no_outputs = HashMap::new();

        let futures = candidates.iter().map(|step| {
            let params = resolve_params(step, &no_outputs);
            async move {
                let outcome = self.run_step(step, params, deadline).await;
                match outcome.result {
                    Ok(output) => StepResult::succeeded(
                        step.id.clone(),
                        output,
                        step.estimated_cost,
                        outcome.elapsed_ms,
                        outcome.attempts,
                    ),
                    Err(err) => StepResult::failed(
                        step.id.clone(),
                        err.to_string(),
                        outcome.elapsed_ms,
                        outcome.attempts,
                    ),
                }
            }
        });

        join_all(futures).await.into_iter().collect()
    }

    /// Invoke one step, retrying per its policy when the strategy allows.
    async fn run_step(
        &self,
        step: &ExecutionStep,
        params: BTreeMap<String, serde_json::Value>,
        deadline: Instant,
    ) -> StepOutcome {
        let started = Instant::now();
        let max_attempts = self.max_attempts(step);
        let step_timeout = Duration::from_millis(self.config.step_timeout_ms);
        let mut attempt = 0;

        let result = loop {
            attempt += 1;

            let call_timeout = step_timeout.min(deadline.saturating_duration_since(Instant::now()));
            let request = InvocationRequest::for_step(step, params.clone(), attempt);

            let result = match timeout(call_timeout, self.invoker.invoke(request)).await {
                Ok(result) => result,
                Err(_) => Err(InvokeError::Timeout {
                    elapsed_ms: call_timeout.as_millis() as u64,
                }),
            };

            let err = match result {
                Ok(output) => break Ok(output),
                Err(err) => err,
            };

            if attempt >= max_attempts || !err.is_retryable() {
                break Err(err);
            }

            let delay = step.retry_policy.delay_for(attempt);
            if Instant::now() + delay >= deadline {
                debug!("Step {} out of time for another attempt", step.id);
                break Err(err);
            }

            warn!(
                step = %step.id,
                attempt,
                max_attempts,
                delay_ms = delay.as_millis() as u64,
                error = %err,
                "Step attempt failed, retrying"
            );
            sleep(delay).await;
        };

        StepOutcome {
            result,
            attempts: attempt,
            elapsed_ms: started.elapsed().as_millis() as u64,
        }
    }

    fn max_attempts(&self, step: &ExecutionStep) -> u32 {
        match self.config.failure_strategy {
            FailureStrategy::Retry => step
                .retry_policy
                .attempts()
                .min(self.config.retry_attempts.max(1)),
            FailureStrategy::Abort | FailureStrategy::Continue => 1,
        }
    }
}

/// Static parameters overlaid with mapped upstream outputs.
///
/// A mapping whose upstream key has produced nothing leaves the parameter as
/// it was.
fn resolve_params(
    step: &ExecutionStep,
    outputs: &HashMap<String, serde_json::Value>,
) -> BTreeMap<String, serde_json::Value> {
    let mut params = step.params.clone();
    for (param, upstream_key) in &step.input_mapping {
        if let Some(value) = outputs.get(upstream_key) {
            params.insert(param.clone(), value.clone());
        }
    }
    params
}
