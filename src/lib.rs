//! Funnel work from many threads onto one owner thread.
//!
//! `onelane` is a minimal serializing scheduler: any number of producer
//! threads submit closures, and all of them execute strictly one at a time,
//! in submission order, on a single designated thread. It exists to let
//! multiple producers safely drive a resource that is not safe for
//! concurrent or re-entrant access (say, a handle or object graph that
//! assumes single-threaded use) by routing every operation through one
//! serialized execution point.
//!
//! # Shape
//!
//! - [`SerialScheduler`] owns an unbounded FIFO work queue and a small
//!   lifecycle state machine. The *owner thread* is whichever thread
//!   constructs the scheduler; no worker thread is spawned.
//! - Producers call [`SerialScheduler::spawn`] (closure in, [`JoinHandle`]
//!   out) or [`SerialScheduler::submit`] (a prebuilt [`Task`]) from any
//!   thread.
//! - The owner thread calls [`SerialScheduler::wait`] once: the queue
//!   closes and every buffered task runs, FIFO, on that thread.
//! - [`SerialScheduler::dispose`] is the stop-now path: close the queue and
//!   discard everything unrun.
//! - [`SerialScheduler::try_execute_inline`] lets re-entrant work raised on
//!   the owner thread itself run immediately instead of round-tripping
//!   through the queue.
//!
//! Cancellation is cooperative. Hand the scheduler a [`CancelToken`] at
//! construction and trip it at any time: the drain loop stops before the
//! next task, never mid-task, and the scheduler turns terminal. Terminal is
//! absorbing: every operation on a finished or cancelled scheduler fails
//! with [`SchedulerClosed`].
//!
//! # Example
//!
//! ```
//! use onelane::SerialScheduler;
//! use std::sync::Arc;
//! use std::thread;
//!
//! let scheduler = Arc::new(SerialScheduler::new());
//!
//! let producer = {
//!     let scheduler = Arc::clone(&scheduler);
//!     thread::spawn(move || scheduler.spawn(|| 2 + 2).expect("scheduler closed"))
//! };
//! let handle = producer.join().expect("producer panicked");
//!
//! // Drain on the owner thread; the task runs here.
//! scheduler.wait().expect("already drained");
//! assert_eq!(handle.join(), Ok(4));
//! ```
//!
//! Faults inside a task are contained per task: a panic is caught, surfaces
//! through that task's [`JoinHandle`] as [`JoinError::Panicked`], and the
//! drain loop proceeds to the next task.

pub mod cancel;
pub mod error;
pub mod scheduler;
pub mod task;

mod queue;

#[cfg(test)]
pub(crate) mod test_util;

pub use cancel::CancelToken;
pub use error::{JoinError, SchedulerClosed};
pub use scheduler::SerialScheduler;
pub use task::{JoinHandle, Task, TaskId, TaskState};
