//! Workflow events and their publication.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tokio::sync::broadcast;
use tollway_core::WorkflowStatus;
use uuid::Uuid;

/// Something that happened to a workflow.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum WorkflowEvent {
    /// A workflow was registered and planning started.
    Created {
        workflow_id: Uuid,
        description: String,
        timestamp: DateTime<Utc>,
    },

    /// The lifecycle state changed.
    StatusChanged {
        workflow_id: Uuid,
        from: WorkflowStatus,
        to: WorkflowStatus,
        timestamp: DateTime<Utc>,
    },

    /// A step produced an output.
    StepCompleted {
        workflow_id: Uuid,
        step_id: String,
        cost: f64,
        time: u64,
        attempts: u32,
    },

    /// A step was attempted and failed.
    StepFailed {
        workflow_id: Uuid,
        step_id: String,
        error: String,
        attempts: u32,
    },

    /// A terminal state was reached.
    Finished {
        workflow_id: Uuid,
        status: WorkflowStatus,
        actual_cost: f64,
        actual_time: u64,
        timestamp: DateTime<Utc>,
    },
}

impl WorkflowEvent {
    /// The workflow this event belongs to.
    pub fn workflow_id(&self) -> Uuid {
        match self {
            WorkflowEvent::Created { workflow_id, .. }
            | WorkflowEvent::StatusChanged { workflow_id, .. }
            | WorkflowEvent::StepCompleted { workflow_id, .. }
            | WorkflowEvent::StepFailed { workflow_id, .. }
            | WorkflowEvent::Finished { workflow_id, .. } => *workflow_id,
        }
    }
}

/// Event publication collaborator.
#[async_trait]
pub trait EventSink: Send + Sync {
    /// Publish an event. Delivery is best effort.
    async fn publish(&self, event: WorkflowEvent);
}

/// Fans events out to any number of subscribers over a broadcast channel.
pub struct BroadcastEventSink {
    sender: broadcast::Sender<WorkflowEvent>,
}

impl BroadcastEventSink {
    /// Create a sink buffering up to `capacity` events per lagging subscriber.
    pub fn new(capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity.max(1));
        Self { sender }
    }

    /// Subscribe to events published from now on.
    pub fn subscribe(&self) -> broadcast::Receiver<WorkflowEvent> {
        self.sender.subscribe()
    }

    /// Number of active subscribers.
    pub fn subscriber_count(&self) -> usize {
        self.sender.receiver_count()
    }
}

impl Default for BroadcastEventSink {
    fn default() -> Self {
        Self::new(256)
    }
}

#[async_trait]
impl EventSink for BroadcastEventSink {
    async fn publish(&self, event: WorkflowEvent) {
        // No subscribers is not an error.
        let _ = self.sender.send(event);
    }
}
