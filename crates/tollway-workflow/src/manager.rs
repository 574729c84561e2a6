//! Workflow manager.
//!
//! Drives a workflow through plan, approval and execution, persisting every
//! state change and publishing events for it.

use std::collections::HashMap;
use std::sync::Arc;

use chrono::Utc;
use tokio::sync::{Mutex, RwLock};
use tollway_core::{Result, TollwayError, WorkflowStatus};
use tollway_executor::{ChainExecutor, StepInvoker};
use tollway_planner::Planner;
use tracing::{info, warn};
use uuid::Uuid;

use crate::cancel::CancelHandle;
use crate::events::{EventSink, WorkflowEvent};
use crate::store::WorkflowStore;
use crate::workflow::Workflow;

/// Plans, approves, runs and cancels workflows.
pub struct WorkflowManager<P, I> {
    planner: P,
    executor: ChainExecutor<I>,
    store: Arc<dyn WorkflowStore>,
    events: Arc<dyn EventSink>,
    /// Cancel flags of the runs in flight.
    running: RwLock<HashMap<Uuid, CancelHandle>>,
    /// Serializes read-modify-write cycles on the store.
    transitions: Mutex<()>,
}

impl<P: Planner, I: StepInvoker> WorkflowManager<P, I> {
    /// Create a manager.
    pub fn new(
        planner: P,
        executor: ChainExecutor<I>,
        store: Arc<dyn WorkflowStore>,
        events: Arc<dyn EventSink>,
    ) -> Self {
        Self {
            planner,
            executor,
            store,
            events,
            running: RwLock::new(HashMap::new()),
            transitions: Mutex::new(()),
        }
    }

    /// Get the executor.
    pub fn executor(&self) -> &ChainExecutor<I> {
        &self.executor
    }

    /// Plan a description and park the workflow for approval.
    ///
    /// A planning error leaves the workflow `failed` rather than returning
    /// an error.
    pub async fn create(&self, description: &str) -> Result<Workflow> {
        let workflow = Workflow::new(description);
        let id = workflow.id;
        self.store.insert(workflow).await?;

        info!(workflow_id = %id, planner = self.planner.name(), "📋 Planning workflow");
        self.events
            .publish(WorkflowEvent::Created {
                workflow_id: id,
                description: description.to_string(),
                timestamp: Utc::now(),
            })
            .await;

        match self.planner.plan(description).await {
            Ok(plan) => {
                info!(
                    workflow_id = %id,
                    steps = plan.len(),
                    quoted_cost = plan.total_estimated_cost,
                    "Plan ready for approval"
                );
                self.transition(id, WorkflowStatus::AwaitingApproval, move |w| w.plan = plan)
                    .await
            }
            Err(e) => {
                warn!(workflow_id = %id, "❌ Planning failed: {}", e);
                self.transition(id, WorkflowStatus::Failed, move |w| {
                    w.error = Some(e.to_string())
                })
                .await
            }
        }
    }

    /// Accept the quoted plan.
    pub async fn approve(&self, id: Uuid) -> Result<Workflow> {
        self.transition(id, WorkflowStatus::Approved, |_| {}).await
    }

    /// Execute an approved workflow and record the outcome.
    ///
    /// If the workflow is cancelled while running, the late result is
    /// discarded and the workflow stays `cancelled`.
    pub async fn run(&self, id: Uuid) -> Result<Workflow> {
        let handle = CancelHandle::new();

        // The cancel flag is registered under the same lock as the move to
        // `executing`, so a concurrent `cancel` always finds it.
        let guard = self.transitions.lock().await;
        let mut workflow = self.load(id).await?;
        let from = workflow.transition(WorkflowStatus::Executing)?;
        self.store.update(workflow.clone()).await?;
        self.running
            .write()
            .await
            .entry(id)
            .or_insert_with(|| handle.clone());
        drop(guard);
        self.publish_transition(&workflow, from).await;

        info!(workflow_id = %id, steps = workflow.plan.len(), "🚀 Running workflow");
        let result = self
            .executor
            .execute_with_cancel(&workflow.plan, handle.subscribe())
            .await;
        self.release(id, &handle).await;

        if result.errors.iter().any(|e| e.kind.is_pre_execution()) {
            warn!(workflow_id = %id, "Plan rejected before any step ran");
        }

        let guard = self.transitions.lock().await;
        let mut current = self.load(id).await?;

        if current.status == WorkflowStatus::Cancelled {
            info!(
                workflow_id = %id,
                interrupted = handle.is_cancelled(),
                "Workflow was cancelled, discarding late result"
            );
            return Ok(current);
        }

        for step in result.step_results.iter() {
            let event = if step.success {
                WorkflowEvent::StepCompleted {
                    workflow_id: id,
                    step_id: step.step_id.clone(),
                    cost: step.cost,
                    time: step.time,
                    attempts: step.attempts,
                }
            } else {
                WorkflowEvent::StepFailed {
                    workflow_id: id,
                    step_id: step.step_id.clone(),
                    error: step.error.clone().unwrap_or_default(),
                    attempts: step.attempts,
                }
            };
            self.events.publish(event).await;
        }

        let target = if result.success && current.status == WorkflowStatus::Executing {
            WorkflowStatus::Completed
        } else {
            WorkflowStatus::Failed
        };
        let from = current.transition(target)?;
        current.record_result(result);
        self.store.update(current.clone()).await?;
        drop(guard);

        info!(
            workflow_id = %id,
            status = %current.status,
            actual_cost = current.actual_cost,
            actual_time_ms = current.actual_time,
            "🏁 Workflow finished"
        );
        self.publish_transition(&current, from).await;
        Ok(current)
    }

    /// Cancel a workflow from any non-terminal state.
    ///
    /// A running execution stops before its next step.
    pub async fn cancel(&self, id: Uuid, reason: impl Into<String>) -> Result<Workflow> {
        let reason = reason.into();
        info!(workflow_id = %id, reason = %reason, "🛑 Cancelling workflow");

        let workflow = self
            .transition(id, WorkflowStatus::Cancelled, move |w| w.error = Some(reason))
            .await?;

        if let Some(handle) = self.running.read().await.get(&id) {
            handle.cancel();
        }
        Ok(workflow)
    }

    /// Flag an executing workflow for an external compensator.
    ///
    /// When its run finishes, the workflow ends `failed`.
    pub async fn mark_rolling_back(&self, id: Uuid) -> Result<Workflow> {
        self.transition(id, WorkflowStatus::RollingBack, |_| {})
            .await
    }

    /// Get a workflow by ID.
    pub async fn get(&self, id: Uuid) -> Result<Workflow> {
        self.load(id).await
    }

    /// All workflows, oldest first.
    pub async fn list(&self) -> Result<Vec<Workflow>> {
        self.store.list().await
    }

    /// Whether a run of `id` is in flight.
    pub async fn is_running(&self, id: Uuid) -> bool {
        self.running.read().await.contains_key(&id)
    }

    /// Drop the registered cancel flag of `id` if it is still `handle`.
    async fn release(&self, id: Uuid, handle: &CancelHandle) {
        let mut running = self.running.write().await;
        if running.get(&id).is_some_and(|current| current.same_flag(handle)) {
            running.remove(&id);
        }
    }

    async fn load(&self, id: Uuid) -> Result<Workflow> {
        self.store
            .get(id)
            .await?
            .ok_or_else(|| TollwayError::NotFound {
                resource_type: "workflow".to_string(),
                id: id.to_string(),
            })
    }

    async fn transition<F>(&self, id: Uuid, next: WorkflowStatus, apply: F) -> Result<Workflow>
    where
        F: FnOnce(&mut Workflow) + Send,
    {
        let guard = self.transitions.lock().await;
        let mut workflow = self.load(id).await?;
        let from = workflow.transition(next)?;
        apply(&mut workflow);
        self.store.update(workflow.clone()).await?;
        drop(guard);

        self.publish_transition(&workflow, from).await;
        Ok(workflow)
    }

    async fn publish_transition(&self, workflow: &Workflow, from: WorkflowStatus) {
        let timestamp = workflow.updated_at;
        self.events
            .publish(WorkflowEvent::StatusChanged {
                workflow_id: workflow.id,
                from,
                to: workflow.status,
                timestamp,
            })
            .await;

        if workflow.status.is_terminal() {
            self.events
                .publish(WorkflowEvent::Finished {
                    workflow_id: workflow.id,
                    status: workflow.status,
                    actual_cost: workflow.actual_cost,
                    actual_time: workflow.actual_time,
                    timestamp,
                })
                .await;
        }
    }
}
