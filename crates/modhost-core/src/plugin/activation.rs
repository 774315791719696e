//! Capability activation.
//!
//! Runs a capability's load-time operation on a dedicated thread and waits
//! for it with an optional deadline. A timed-out operation keeps running in
//! the background; its module is never unloaded.

use std::time::Duration;

use tokio::sync::oneshot;

use super::capability::RawHandle;

/// Why a load-time operation failed.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ActivationFailure {
    /// The operation returned a non-zero status.
    #[error("returned status {0}")]
    Status(i32),

    /// The operation did not return in time.
    #[error("did not return within {0:?}")]
    TimedOut(Duration),

    /// The operation terminated without reporting a status.
    #[error("terminated abnormally: {0}")]
    Aborted(String),
}

/// Bounded-time runner for capability operations.
#[derive(Debug, Clone, Copy)]
pub struct Activator {
    timeout: Option<Duration>,
}

impl Activator {
    /// `None` waits for the operation without a deadline.
    pub fn new(timeout: Option<Duration>) -> Self {
        Self { timeout }
    }

    pub fn timeout(&self) -> Option<Duration> {
        self.timeout
    }

    /// Invoke the handle's operation once and wait for its outcome.
    pub async fn activate(&self, handle: RawHandle) -> Result<(), ActivationFailure> {
        let capability = handle.capability();
        let (tx, rx) = oneshot::channel();

        std::thread::Builder::new()
            .name(format!("modhost-{}", capability.operation()))
            .spawn(move || {
                let _ = tx.send(handle.invoke());
            })
            .map_err(|e| ActivationFailure::Aborted(format!("failed to spawn thread: {e}")))?;

        let outcome = match self.timeout {
            Some(limit) => match tokio::time::timeout(limit, rx).await {
                Ok(outcome) => outcome,
                Err(_) => return Err(ActivationFailure::TimedOut(limit)),
            },
            None => rx.await,
        };

        outcome.unwrap_or_else(|_| {
            Err(ActivationFailure::Aborted(
                "operation exited without reporting a status".to_string(),
            ))
        })
    }
}

impl Default for Activator {
    fn default() -> Self {
        Self::new(Some(Duration::from_millis(
            crate::config::defaults::ACTIVATION_TIMEOUT_MS,
        )))
    }
}
