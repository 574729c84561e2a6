//! Error types for the Tollway workflow engine.
//!
//! Expected failure modes (unmet dependencies, failed service calls, budget
//! rejections) are reported inside [`ChainExecutionResult`](crate::ChainExecutionResult)
//! values. [`TollwayError`] covers contract violations and lifecycle misuse.

use thiserror::Error;

use crate::types::WorkflowStatus;

/// Main error type for Tollway operations.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum TollwayError {
    /// A plan or step failed structural validation.
    #[error("Validation failed: {message}")]
    Validation { message: String },

    /// The step dependency graph contains a cycle.
    #[error("Cycle detected in step dependencies: {}", path.join(" → "))]
    CycleDetected { path: Vec<String> },

    /// A planner could not produce a plan.
    #[error("Planning failed: {message}")]
    Planning { message: String },

    /// A workflow was asked to move to a state its lifecycle does not allow.
    #[error("Invalid workflow transition from {from} to {to}")]
    InvalidTransition {
        from: WorkflowStatus,
        to: WorkflowStatus,
    },

    /// Resource not found.
    #[error("Resource not found: {resource_type} with id {id}")]
    NotFound { resource_type: String, id: String },

    /// Configuration could not be read or parsed.
    #[error("Configuration error: {0}")]
    Config(String),

    /// Serialization/deserialization error.
    #[error("Serialization error: {0}")]
    Serialization(String),

    /// Internal error (should not happen).
    #[error("Internal error: {0}")]
    Internal(String),
}

impl TollwayError {
    /// Shorthand for a [`TollwayError::Validation`].
    pub fn validation(message: impl Into<String>) -> Self {
        TollwayError::Validation {
            message: message.into(),
        }
    }
}

/// Convenience Result type for Tollway operations.
pub type Result<T> = std::result::Result<T, TollwayError>;

impl From<serde_json::Error> for TollwayError {
    fn from(err: serde_json::Error) -> Self {
        TollwayError::Serialization(err.to_string())
    }
}
