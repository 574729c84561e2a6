//! # Tollway Core
//!
//! Core types for the Tollway workflow engine.
//!
//! This crate provides the fundamental building blocks:
//! - [`ExecutionStep`] - One external service invocation
//! - [`ExecutionPlan`] - DAG of steps with cost/time bounds and critical path
//! - [`ChainExecutionResult`] - Outcome of running a plan
//! - [`StepGraph`] - Dependency graph queries shared by planner and executor
//! - [`TollwayError`] - Error types

pub mod dag;
pub mod error;
pub mod payment;
pub mod plan;
pub mod result;
pub mod step;
pub mod types;

// Re-exports for convenience
pub use dag::{MissingDependency, StepGraph};
pub use error::{Result, TollwayError};
pub use payment::PaymentRequirement;
pub use plan::ExecutionPlan;
pub use result::{ChainExecutionResult, ErrorKind, ExecutionError, StepResult, StepResults};
pub use step::{ExecutionStep, RetryPolicy, StepBuilder};
pub use types::*;

/// Prelude module for common imports
pub mod prelude {
    pub use crate::error::{Result, TollwayError};
    pub use crate::plan::ExecutionPlan;
    pub use crate::result::{ChainExecutionResult, ErrorKind, ExecutionError, StepResult, StepResults};
    pub use crate::step::{ExecutionStep, RetryPolicy, StepBuilder};
    pub use crate::types::WorkflowStatus;
}
