//! Workflow lifecycle record.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tollway_core::{ChainExecutionResult, ExecutionPlan, Result, TollwayError, WorkflowStatus};
use uuid::Uuid;

/// One plan plus its lifecycle state and what running it actually cost.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Workflow {
    /// Unique identifier.
    pub id: Uuid,

    /// The task description the plan was derived from.
    pub description: String,

    /// The plan; empty until planning succeeds.
    pub plan: ExecutionPlan,

    /// Current lifecycle state.
    pub status: WorkflowStatus,

    /// Cost of the steps that succeeded.
    pub actual_cost: f64,

    /// Wall-clock execution time in milliseconds.
    pub actual_time: u64,

    /// Result of the run, once it finished and was not cancelled.
    pub result: Option<ChainExecutionResult>,

    /// Why planning or execution failed, or why the workflow was cancelled.
    pub error: Option<String>,

    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,

    /// When a terminal state was reached.
    pub finished_at: Option<DateTime<Utc>>,
}

impl Workflow {
    /// A new workflow in the planning state.
    pub fn new(description: impl Into<String>) -> Self {
        let now = Utc::now();
        Self {
            id: Uuid::new_v4(),
            description: description.into(),
            plan: ExecutionPlan::empty(),
            status: WorkflowStatus::Planning,
            actual_cost: 0.0,
            actual_time: 0,
            result: None,
            error: None,
            created_at: now,
            updated_at: now,
            finished_at: None,
        }
    }

    /// Move to `next`, returning the previous status.
    pub fn transition(&mut self, next: WorkflowStatus) -> Result<WorkflowStatus> {
        if !self.status.can_transition_to(next) {
            return Err(TollwayError::InvalidTransition {
                from: self.status,
                to: next,
            });
        }

        let previous = self.status;
        let now = Utc::now();
        self.status = next;
        self.updated_at = now;
        if next.is_terminal() {
            self.finished_at = Some(now);
        }
        Ok(previous)
    }

    /// Store the outcome of a run.
    pub fn record_result(&mut self, result: ChainExecutionResult) {
        self.actual_cost = result.total_cost;
        self.actual_time = result.total_time;
        if !result.success {
            self.error = result.errors.first().map(|e| e.error.clone());
        }
        self.result = Some(result);
    }

    /// Estimated cost quoted for approval.
    pub fn quoted_cost(&self) -> f64 {
        self.plan.total_estimated_cost
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tollway_core::{ErrorKind, ExecutionError};

    #[test]
    fn test_happy_path_transitions() {
        let mut workflow = Workflow::new("fetch prices");

        assert_eq!(
            workflow.transition(WorkflowStatus::AwaitingApproval).unwrap(),
            WorkflowStatus::Planning
        );
        workflow.transition(WorkflowStatus::Approved).unwrap();
        workflow.transition(WorkflowStatus::Executing).unwrap();
        assert!(workflow.finished_at.is_none());

        workflow.transition(WorkflowStatus::Completed).unwrap();
        assert!(workflow.finished_at.is_some());
    }

    #[test]
    fn test_illegal_transition_is_rejected() {
        let mut workflow = Workflow::new("x");

        let err = workflow.transition(WorkflowStatus::Executing).unwrap_err();
        assert_eq!(
            err,
            TollwayError::InvalidTransition {
                from: WorkflowStatus::Planning,
                to: WorkflowStatus::Executing
            }
        );
        assert_eq!(workflow.status, WorkflowStatus::Planning);
    }

    #[test]
    fn test_terminal_states_are_final() {
        let mut workflow = Workflow::new("x");
        workflow.transition(WorkflowStatus::Cancelled).unwrap();

        assert!(workflow.transition(WorkflowStatus::Cancelled).is_err());
        assert!(workflow.transition(WorkflowStatus::Failed).is_err());
    }

    #[test]
    fn test_record_failed_result() {
        let mut workflow = Workflow::new("x");
        let mut result = ChainExecutionResult::rejected(ExecutionError::for_plan(
            ErrorKind::Validation,
            "over budget",
        ));
        result.total_time = 5;

        workflow.record_result(result);
        assert_eq!(workflow.error.as_deref(), Some("over budget"));
        assert_eq!(workflow.actual_time, 5);
        assert!(workflow.result.is_some());
    }
}
