//! # Tollway Workflow
//!
//! Lifecycle management around the planner and executor: a workflow is
//! planned, parked for approval of its quoted cost, executed, and finishes
//! `completed`, `failed` or `cancelled`.

pub mod cancel;
pub mod events;
pub mod manager;
pub mod store;
pub mod workflow;

pub use cancel::CancelHandle;
pub use events::{BroadcastEventSink, EventSink, WorkflowEvent};
pub use manager::WorkflowManager;
pub use store::{InMemoryWorkflowStore, WorkflowStore};
pub use workflow::Workflow;
