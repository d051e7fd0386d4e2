//! Cancellation and external-stop signaling shared across a run.
//!
//! Cancellation is advisory-cooperative: setting the token does not interrupt
//! an in-flight agent operation; it is honored at the next checked suspension
//! point. The external stop handle is the lighter-weight mechanism — it ends
//! the run gracefully after the current turn via
//! [`ExternalTermination`](crate::termination::ExternalTermination).

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

pub use tokio_util::sync::CancellationToken;

/// Cloneable handle for stopping a running team from outside.
///
/// Transitions once from not-set to set and never back; all clones share the
/// same flag.
#[derive(Debug, Clone, Default)]
pub struct ExternalTerminationHandle {
    flag: Arc<AtomicBool>,
}

impl ExternalTerminationHandle {
    pub fn new() -> Self {
        Self::default()
    }

    /// Request a graceful stop. Idempotent.
    pub fn set(&self) {
        self.flag.store(true, Ordering::SeqCst);
    }

    pub fn is_set(&self) -> bool {
        self.flag.load(Ordering::SeqCst)
    }

    /// Clear the flag, allowing the paired condition to be reused.
    pub(crate) fn clear(&self) {
        self.flag.store(false, Ordering::SeqCst);
    }
}
