//! One-way cancellation latch.
//!
//! Cancellation here is cooperative: tripping a token never interrupts a
//! running job. The scheduler polls the token at defined points (the top of
//! every public operation, before each dequeue, before each execution) and
//! stops taking new work once it observes the trip.
//!
//! A token can be constructed by the caller and handed to
//! [`SerialScheduler::with_cancel_token`](crate::scheduler::SerialScheduler::with_cancel_token),
//! which lets the scheduler be cancelled from outside. The scheduler only
//! ever reads such a token; it never sets or resets it.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

/// A clonable, monotonic cancellation flag.
///
/// All clones share the same flag. Once [`cancel`](Self::cancel) has been
/// called, [`is_cancelled`](Self::is_cancelled) returns true forever; there
/// is no reset.
#[derive(Debug, Clone, Default)]
pub struct CancelToken {
    flag: Arc<AtomicBool>,
}

impl CancelToken {
    /// Creates a fresh, untripped token.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Trips the token. Idempotent; later calls are no-ops.
    pub fn cancel(&self) {
        if !self.flag.swap(true, Ordering::AcqRel) {
            tracing::trace!("cancel token tripped");
        }
    }

    /// Returns true once the token has been tripped.
    #[must_use]
    pub fn is_cancelled(&self) -> bool {
        self.flag.load(Ordering::Acquire)
    }
}
