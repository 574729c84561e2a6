//! Cooperative cancellation.

use std::sync::Arc;

use tokio::sync::watch;

/// Shared cancel flag for one run.
///
/// The executor holds a receiver and checks it before each dispatch; any
/// clone of the handle can raise the flag.
#[derive(Debug, Clone)]
pub struct CancelHandle {
    sender: Arc<watch::Sender<bool>>,
}

impl CancelHandle {
    /// A handle with the flag lowered.
    pub fn new() -> Self {
        let (sender, _) = watch::channel(false);
        Self {
            sender: Arc::new(sender),
        }
    }

    /// Raise the flag. Idempotent.
    pub fn cancel(&self) {
        self.sender.send_replace(true);
    }

    /// Whether the flag has been raised.
    pub fn is_cancelled(&self) -> bool {
        *self.sender.borrow()
    }

    /// Whether `other` raises the same flag as `self`.
    pub fn same_flag(&self, other: &CancelHandle) -> bool {
        Arc::ptr_eq(&self.sender, &other.sender)
    }

    /// A receiver to hand to the executor.
    pub fn subscribe(&self) -> watch::Receiver<bool> {
        self.sender.subscribe()
    }
}

impl Default for CancelHandle {
    fn default() -> Self {
        Self::new()
    }
}
