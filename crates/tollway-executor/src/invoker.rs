//! Step invocation collaborator.
//!
//! The executor never talks to services directly. It hands each resolved
//! step to a [`StepInvoker`], which performs the (usually HTTP) call and
//! classifies the answer.

use std::collections::BTreeMap;
use std::future::Future;
use std::sync::Arc;

use async_trait::async_trait;
use serde::Serialize;
use thiserror::Error;
use tollway_core::{ErrorKind, ExecutionStep, PaymentRequirement};

/// Everything an invoker needs to call the service behind a step.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct InvocationRequest {
    pub step_id: String,
    pub action: String,
    pub service_name: Option<String>,
    pub service_url: Option<String>,
    /// Static parameters merged with mapped upstream outputs.
    pub params: BTreeMap<String, serde_json::Value>,
    /// 1-based attempt number.
    pub attempt: u32,
}

impl InvocationRequest {
    /// Build a request for `step` with already resolved parameters.
    pub fn for_step(
        step: &ExecutionStep,
        params: BTreeMap<String, serde_json::Value>,
        attempt: u32,
    ) -> Self {
        Self {
            step_id: step.id.clone(),
            action: step.action.clone(),
            service_name: step.service_name.clone(),
            service_url: step.service_url.clone(),
            params,
            attempt,
        }
    }
}

/// Why an invocation did not produce an output.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum InvokeError {
    /// The service wants to be paid first.
    #[error("Payment required: {} {} to {} on {}", .0.amount, .0.asset, .0.pay_to, .0.network)]
    PaymentRequired(PaymentRequirement),

    /// The service answered with a failure.
    #[error("Service call failed with status {status}: {message}")]
    Service { status: u16, message: String },

    /// The per-call deadline elapsed.
    #[error("Service call timed out after {elapsed_ms}ms")]
    Timeout { elapsed_ms: u64 },

    /// The request never reached the service or the answer was unreadable.
    #[error("Transport error: {0}")]
    Transport(String),
}

impl InvokeError {
    /// Classify a non-success response.
    ///
    /// Status 402 with a complete payment body becomes
    /// [`InvokeError::PaymentRequired`]; anything else is a service failure.
    pub fn from_response(status: u16, body: &serde_json::Value) -> Self {
        if status == 402 {
            if let Ok(requirement) = PaymentRequirement::from_json(body) {
                return InvokeError::PaymentRequired(requirement);
            }
        }

        let message = body
            .get("error")
            .or_else(|| body.get("message"))
            .and_then(|m| m.as_str())
            .map(str::to_string)
            .unwrap_or_else(|| body.to_string());

        InvokeError::Service { status, message }
    }

    /// Error category recorded in the execution result.
    pub fn kind(&self) -> ErrorKind {
        match self {
            InvokeError::PaymentRequired(_) => ErrorKind::PaymentRequired,
            InvokeError::Service { .. } | InvokeError::Transport(_) => ErrorKind::ServiceCall,
            InvokeError::Timeout { .. } => ErrorKind::Timeout,
        }
    }

    /// Payment-required answers need an external payment before a retry can
    /// succeed, so they are not retried here.
    pub fn is_retryable(&self) -> bool {
        !matches!(self, InvokeError::PaymentRequired(_))
    }
}

/// Performs the external call behind a step.
#[async_trait]
pub trait StepInvoker: Send + Sync {
    /// Invoke the service and return its output.
    async fn invoke(&self, request: InvocationRequest) -> Result<serde_json::Value, InvokeError>;
}

#[async_trait]
impl<T: StepInvoker + ?Sized> StepInvoker for Arc<T> {
    async fn invoke(&self, request: InvocationRequest) -> Result<serde_json::Value, InvokeError> {
        (**self).invoke(request).await
    }
}

/// Adapts an async closure into a [`StepInvoker`].
pub struct FnInvoker<F> {
    f: F,
}

impl<F> FnInvoker<F> {
    /// Wrap a closure.
    pub fn new(f: F) -> Self {
        Self { f }
    }
}

#[async_trait]
impl<F, Fut> StepInvoker for FnInvoker<F>
where
    F: Fn(InvocationRequest) -> Fut + Send + Sync,
    Fut: Future<Output = Result<serde_json::Value, InvokeError>> + Send,
{
    async fn invoke(&self, request: InvocationRequest) -> Result<serde_json::Value, InvokeError> {
        (self.f)(request).await
    }
}
