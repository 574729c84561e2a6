//! # Tollway Executor
//!
//! Runs execution plans: cost gate, structural validation, dependency-gated
//! sequential execution with retries and timeouts, and a fan-out mode for
//! parallelizable steps.
//!
//! ## Example
//!
//! ```rust,ignore
//! use tollway_executor::{ChainConfig, ChainExecutor, FnInvoker};
//!
//! let invoker = FnInvoker::new(|req| async move { call_service(req).await });
//! let executor = ChainExecutor::with_config(invoker, ChainConfig::load("tollway.toml")?);
//! let result = executor.execute(&plan).await;
//! ```

pub mod config;
pub mod executor;
pub mod invoker;
pub mod validation;

pub use config::{ChainConfig, FailureStrategy};
pub use executor::ChainExecutor;
pub use invoker::{FnInvoker, InvocationRequest, InvokeError, StepInvoker};
pub use validation::{validate_chain, ValidationReport};
