//! Work items and their result channel.
//!
//! A [`Task`] is a cheaply clonable handle around an erased closure plus an
//! atomic state latch. The latch is what makes execution at-most-once: both
//! the drain loop and the inline path may hold the same task, and whichever
//! claims the `Pending -> Running` transition first runs the job; the other
//! sees a no-op.
//!
//! Every task carries its own fault channel. [`Task::new`] returns a
//! [`JoinHandle`] alongside the task; the job's return value, a caught
//! panic, or the fact that the job was discarded without running all arrive
//! through that handle. The scheduler never inspects any of it.

use std::fmt;
use std::panic::{self, AssertUnwindSafe};
use std::sync::atomic::{AtomicU64, AtomicU8, Ordering};
use std::sync::Arc;

use parking_lot::{Condvar, Mutex};

use crate::error::JoinError;

/// Process-unique identifier for a task, for introspection and logging.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct TaskId(u64);

impl TaskId {
    fn next() -> Self {
        static NEXT: AtomicU64 = AtomicU64::new(1);
        Self(NEXT.fetch_add(1, Ordering::Relaxed))
    }

    /// Returns the raw numeric id.
    #[must_use]
    pub const fn as_u64(self) -> u64 {
        self.0
    }
}

impl fmt::Display for TaskId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "task-{}", self.0)
    }
}

/// Observable lifecycle of a task.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TaskState {
    /// Buffered or held; the job has not started.
    Pending,
    /// The job is executing right now.
    Running,
    /// The job ran to completion (including a caught panic).
    Completed,
    /// The job was dropped without running.
    Discarded,
}

const STATE_PENDING: u8 = 0;
const STATE_RUNNING: u8 = 1;
const STATE_COMPLETED: u8 = 2;
const STATE_DISCARDED: u8 = 3;

fn decode_state(raw: u8) -> TaskState {
    match raw {
        STATE_PENDING => TaskState::Pending,
        STATE_RUNNING => TaskState::Running,
        STATE_COMPLETED => TaskState::Completed,
        _ => TaskState::Discarded,
    }
}

/// An executable unit of work submitted to the scheduler.
///
/// Clones share the same underlying job and state; the job still runs at
/// most once. Obtain one (with its result handle) from [`Task::new`].
#[derive(Clone)]
pub struct Task {
    inner: Arc<RawTask>,
}

struct RawTask {
    id: TaskId,
    state: AtomicU8,
    job: Mutex<Option<Box<dyn Job>>>,
}

impl Task {
    /// Wraps a closure into a task plus the handle its result arrives on.
    pub fn new<T, F>(f: F) -> (Self, JoinHandle<T>)
    where
        F: FnOnce() -> T + Send + 'static,
        T: Send + 'static,
    {
        let completion = Arc::new(Completion::new());
        let id = TaskId::next();
        let job: Box<dyn Job> = Box::new(JobFn {
            f: Some(f),
            completion: Arc::clone(&completion),
        });
        let task = Self {
            inner: Arc::new(RawTask {
                id,
                state: AtomicU8::new(STATE_PENDING),
                job: Mutex::new(Some(job)),
            }),
        };
        (task, JoinHandle { id, completion })
    }

    /// Returns this task's id.
    #[must_use]
    pub fn id(&self) -> TaskId {
        self.inner.id
    }

    /// Returns the task's current state.
    #[must_use]
    pub fn state(&self) -> TaskState {
        decode_state(self.inner.state.load(Ordering::Acquire))
    }

    /// Runs the job if this task is still pending.
    ///
    /// Returns true if this call claimed and executed the job, false if the
    /// task had already run, is running elsewhere, or was discarded. Panics
    /// inside the job are caught and delivered through the task's handle.
    pub(crate) fn run(&self) -> bool {
        if self
            .inner
            .state
            .compare_exchange(
                STATE_PENDING,
                STATE_RUNNING,
                Ordering::AcqRel,
                Ordering::Acquire,
            )
            .is_err()
        {
            return false;
        }

        let job = self.inner.job.lock().take();
        if let Some(job) = job {
            job.call();
        }
        self.inner.state.store(STATE_COMPLETED, Ordering::Release);
        true
    }

    /// Drops the job without running it, if still pending.
    ///
    /// The task's handle observes [`JoinError::Discarded`]. Returns true if
    /// this call did the discarding.
    pub(crate) fn discard(&self) -> bool {
        if self
            .inner
            .state
            .compare_exchange(
                STATE_PENDING,
                STATE_DISCARDED,
                Ordering::AcqRel,
                Ordering::Acquire,
            )
            .is_err()
        {
            return false;
        }

        // Dropping the job delivers `Discarded` through its completion cell.
        drop(self.inner.job.lock().take());
        true
    }
}

impl fmt::Debug for Task {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Task")
            .field("id", &self.inner.id)
            .field("state", &self.state())
            .finish_non_exhaustive()
    }
}

/// Owner side of a task's result channel.
///
/// Exactly one handle exists per task. The handle resolves once, whatever
/// path the task takes: a return value, a caught panic, or discard.
pub struct JoinHandle<T> {
    id: TaskId,
    completion: Arc<Completion<T>>,
}

impl<T> JoinHandle<T> {
    /// Returns the id of the task this handle belongs to.
    #[must_use]
    pub fn id(&self) -> TaskId {
        self.id
    }

    /// Returns true once the task's outcome is available.
    #[must_use]
    pub fn is_finished(&self) -> bool {
        self.completion.slot.lock().is_some()
    }

    /// Non-blocking probe for the task's outcome.
    ///
    /// Returns the outcome if the task has already resolved; hands the
    /// handle back unconsumed if the task is still pending, so the caller
    /// can keep polling or fall back to [`join`](Self::join). Like `join`,
    /// this consumes the outcome: the handle is a linear resource and the
    /// result is delivered exactly once.
    pub fn try_join(self) -> Result<Result<T, JoinError>, Self> {
        let outcome = self.completion.slot.lock().take();
        match outcome {
            Some(outcome) => Ok(outcome),
            None => Err(self),
        }
    }

    /// Blocks until the task resolves and returns its outcome.
    ///
    /// # Errors
    ///
    /// - [`JoinError::Panicked`] if the job panicked
    /// - [`JoinError::Discarded`] if the job was dropped without running
    ///
    /// # Blocking
    ///
    /// Blocks the calling thread until the task runs or is given up on.
    /// Every path that abandons a job (dispose, rejection, dropping the
    /// last task handle) delivers `Discarded`, so a scheduled task resolves
    /// as soon as its scheduler drains, disposes, or drops. Joining before
    /// any of those happen blocks until one does.
    pub fn join(self) -> Result<T, JoinError> {
        let mut slot = self.completion.slot.lock();
        while slot.is_none() {
            self.completion.resolved.wait(&mut slot);
        }
        slot.take().unwrap_or(Err(JoinError::Discarded))
    }
}

impl<T> fmt::Debug for JoinHandle<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("JoinHandle")
            .field("id", &self.id)
            .field("finished", &self.is_finished())
            .finish_non_exhaustive()
    }
}

/// Single-delivery result cell shared by a job and its handle.
struct Completion<T> {
    slot: Mutex<Option<Result<T, JoinError>>>,
    resolved: Condvar,
}

impl<T> Completion<T> {
    fn new() -> Self {
        Self {
            slot: Mutex::new(None),
            resolved: Condvar::new(),
        }
    }

    /// First delivery wins; later deliveries are dropped.
    fn deliver(&self, result: Result<T, JoinError>) {
        let mut slot = self.slot.lock();
        if slot.is_none() {
            *slot = Some(result);
            drop(slot);
            self.resolved.notify_all();
        }
    }
}

trait Job: Send {
    fn call(self: Box<Self>);
}

/// Erased closure plus the cell its outcome lands in.
///
/// Dropped without [`call`](Job::call) (dispose path, rejected submission,
/// scheduler drop), the `Drop` impl resolves the cell with `Discarded` so
/// the handle never hangs.
struct JobFn<T, F> {
    f: Option<F>,
    completion: Arc<Completion<T>>,
}

impl<T, F> Job for JobFn<T, F>
where
    F: FnOnce() -> T + Send + 'static,
    T: Send + 'static,
{
    fn call(mut self: Box<Self>) {
        let Some(f) = self.f.take() else {
            return;
        };
        let result = panic::catch_unwind(AssertUnwindSafe(f))
            .map_err(|payload| JoinError::panicked(payload.as_ref()));
        self.completion.deliver(result);
    }
}

impl<T, F> Drop for JobFn<T, F> {
    fn drop(&mut self) {
        if self.f.is_some() {
            self.completion.deliver(Err(JoinError::Discarded));
        }
    }
}
