//! Cooperative cancellation.
//!
//! Cancellation in relnav is never exception-driven: a [`CancellationToken`]
//! is checked at defined loop boundaries (block starts, row delivery) and the
//! operation unwinds with [`Error::Cancelled`](crate::Error::Cancelled)
//! without applying partial results. Runtime-initiated cancellation through
//! `Cx` composes with this; both are checked at the same points.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

/// A shared flag signalling that the owning operation should stop.
///
/// Cloning is cheap; all clones observe the same flag. `cancel` is
/// idempotent.
#[derive(Debug, Clone, Default)]
pub struct CancellationToken {
    cancelled: Arc<AtomicBool>,
}

impl CancellationToken {
    /// A fresh, uncancelled token.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Request cancellation. Idempotent.
    pub fn cancel(&self) {
        self.cancelled.store(true, Ordering::SeqCst);
    }

    /// Whether cancellation has been requested.
    #[must_use]
    pub fn is_cancelled(&self) -> bool {
        self.cancelled.load(Ordering::SeqCst)
    }
}
