//! Common types used across the Tollway workspace.

use std::fmt;

use serde::{Deserialize, Serialize};

/// Lifecycle state of a workflow wrapping one execution plan.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum WorkflowStatus {
    /// The plan is being produced.
    Planning,
    /// A plan exists and waits for the caller to accept its quoted cost.
    AwaitingApproval,
    /// The plan has been accepted and may start.
    Approved,
    /// Steps are being dispatched.
    Executing,
    /// Marker for an external compensator. No compensation runs in this workspace.
    RollingBack,
    /// Every step succeeded.
    Completed,
    /// Planning or execution failed.
    Failed,
    /// Cancelled by an explicit request.
    Cancelled,
}

impl WorkflowStatus {
    /// Returns true if this is a terminal state.
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            WorkflowStatus::Completed | WorkflowStatus::Failed | WorkflowStatus::Cancelled
        )
    }

    /// Returns true if the workflow is currently being processed.
    pub fn is_active(&self) -> bool {
        !self.is_terminal()
    }

    /// Whether the lifecycle allows moving from `self` to `next`.
    ///
    /// Every non-terminal state may move to [`WorkflowStatus::Cancelled`].
    pub fn can_transition_to(&self, next: WorkflowStatus) -> bool {
        use WorkflowStatus::*;

        if self.is_terminal() {
            return false;
        }
        if next == Cancelled {
            return true;
        }

        matches!(
            (self, next),
            (Planning, AwaitingApproval)
                | (Planning, Failed)
                | (AwaitingApproval, Approved)
                | (Approved, Executing)
                | (Executing, Completed)
                | (Executing, Failed)
                | (Executing, RollingBack)
                | (RollingBack, Failed)
        )
    }

    /// Snake-case name, matching the serialized form.
    pub fn as_str(&self) -> &'static str {
        match self {
            WorkflowStatus::Planning => "planning",
            WorkflowStatus::AwaitingApproval => "awaiting_approval",
            WorkflowStatus::Approved => "approved",
            WorkflowStatus::Executing => "executing",
            WorkflowStatus::RollingBack => "rolling_back",
            WorkflowStatus::Completed => "completed",
            WorkflowStatus::Failed => "failed",
            WorkflowStatus::Cancelled => "cancelled",
        }
    }
}

impl fmt::Display for WorkflowStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_workflow_status_terminal() {
        assert!(WorkflowStatus::Completed.is_terminal());
        assert!(WorkflowStatus::Failed.is_terminal());
        assert!(WorkflowStatus::Cancelled.is_terminal());
        assert!(!WorkflowStatus::Executing.is_terminal());
        assert!(WorkflowStatus::RollingBack.is_active());
    }

    #[test]
    fn test_happy_path_transitions() {
        use WorkflowStatus::*;
        let path = [Planning, AwaitingApproval, Approved, Executing, Completed];
        for pair in path.windows(2) {
            assert!(pair[0].can_transition_to(pair[1]), "{} -> {}", pair[0], pair[1]);
        }
    }

    #[test]
    fn test_rejected_transitions() {
        use WorkflowStatus::*;
        assert!(!Planning.can_transition_to(Executing));
        assert!(!AwaitingApproval.can_transition_to(Executing));
        assert!(!Completed.can_transition_to(Cancelled));
        assert!(!Failed.can_transition_to(Executing));
        assert!(!RollingBack.can_transition_to(Completed));
    }

    #[test]
    fn test_cancel_from_any_active_state() {
        use WorkflowStatus::*;
        for status in [Planning, AwaitingApproval, Approved, Executing, RollingBack] {
            assert!(status.can_transition_to(Cancelled));
        }
    }

    #[test]
    fn test_status_serialization() {
        let json = serde_json::to_string(&WorkflowStatus::AwaitingApproval).unwrap();
        assert_eq!(json, "\"awaiting_approval\"");
        assert_eq!(WorkflowStatus::RollingBack.to_string(), "rolling_back");
    }
}
