//! Error types for the scheduler.
//!
//! There is exactly one scheduler-level error: [`SchedulerClosed`]. It is
//! raised synchronously by every public operation whose precondition fails,
//! and it is terminal: once a scheduler reports it, it reports it forever.
//!
//! Faults *inside* a work item are not scheduler errors. They travel through
//! the task's own result channel as a [`JoinError`] and never stop the drain
//! loop.

use std::any::Any;

use thiserror::Error;

/// The scheduler is cancelled or has already finished draining.
///
/// Every public operation on a terminal scheduler fails with this error;
/// there is no transition back.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
#[error("scheduler is cancelled or has already finished draining")]
pub struct SchedulerClosed;

/// Why a task's result never materialized.
///
/// Returned by [`JoinHandle::join`](crate::task::JoinHandle::join) when the
/// job did not run to completion.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[non_exhaustive]
pub enum JoinError {
    /// The job panicked. The payload is flattened to a message; the panic
    /// itself is contained and never unwinds into the drain loop.
    #[error("task panicked: {message}")]
    Panicked {
        /// Panic payload rendered as text, when it carried any.
        message: String,
    },
    /// The job was dropped without ever running: the scheduler was disposed,
    /// the submission was rejected, or the scheduler was dropped with the
    /// task still pending.
    #[error("task was discarded before it ran")]
    Discarded,
}

impl JoinError {
    /// Builds a `Panicked` error from a caught panic payload.
    pub(crate) fn panicked(payload: &(dyn Any + Send)) -> Self {
        let message = payload
            .downcast_ref::<&str>()
            .map(ToString::to_string)
            .or_else(|| payload.downcast_ref::<String>().cloned())
            .unwrap_or_else(|| "non-string panic payload".to_string());
        Self::Panicked { message }
    }

    /// Returns true if the task was discarded without running.
    #[must_use]
    pub fn is_discarded(&self) -> bool {
        matches!(self, Self::Discarded)
    }
}
