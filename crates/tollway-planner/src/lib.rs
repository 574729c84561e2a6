//! # Tollway Planner
//!
//! Turns a task description into an execution plan.

pub mod catalog;
pub mod decomposer;
pub mod planner;

pub use catalog::{Capability, Category, CATALOG};
pub use decomposer::Decomposer;
pub use planner::{Planner, PlannerConfig};
