//! The serial scheduler: one owner thread, strict FIFO, at-most-once.
//!
//! [`SerialScheduler`] funnels work from any number of producer threads onto
//! a single owner thread. Producers [`submit`](SerialScheduler::submit) (or
//! [`spawn`](SerialScheduler::spawn)) from anywhere; the owner thread calls
//! [`wait`](SerialScheduler::wait) once, which closes the queue and executes
//! everything buffered, one task at a time, in submission order.
//! [`dispose`](SerialScheduler::dispose) is the other way down: close the
//! queue and discard everything without running it.
//!
//! # Owner binding
//!
//! The owner thread is whichever thread *constructs* the scheduler; no
//! worker thread is spawned. Nothing forces `wait()` onto that thread: if
//! some other thread drains, tasks execute there instead, while
//! [`try_execute_inline`](SerialScheduler::try_execute_inline) keeps
//! matching against the recorded owner and refuses everyone else. Call
//! `wait()` from the constructing thread unless you know why you aren't.

use std::sync::atomic::{AtomicBool, AtomicU8, Ordering};
use std::thread::{self, ThreadId};

use tracing::{debug, trace};

use crate::cancel::CancelToken;
use crate::error::SchedulerClosed;
use crate::queue::TaskQueue;
use crate::task::{JoinHandle, Task};

// Lifecycle phases. Monotonically increasing; DONE is absorbing.
const PHASE_ACTIVE: u8 = 0;
const PHASE_DRAINING: u8 = 1;
const PHASE_CANCELLING: u8 = 2;
const PHASE_DONE: u8 = 3;

/// Funnels work from arbitrary threads onto the thread that built it.
///
/// Guarantees, absent cancellation: every task submitted before the queue
/// closes runs exactly once, in FIFO submission order, entirely on the
/// draining thread, with a happens-before edge between consecutive tasks.
/// No two tasks ever run concurrently, inline executions included.
///
/// The scheduler is `Sync`; share it behind an `Arc` and submit from any
/// thread.
#[derive(Debug)]
pub struct SerialScheduler {
    queue: TaskQueue,
    owner: ThreadId,
    phase: AtomicU8,
    cancelled: AtomicBool,
    external: Option<CancelToken>,
}

impl SerialScheduler {
    /// Creates a scheduler owned by the calling thread.
    #[must_use]
    pub fn new() -> Self {
        Self::build(None)
    }

    /// Creates a scheduler that additionally observes `token`.
    ///
    /// Tripping the token from outside cancels the scheduler: the drain
    /// loop stops before the next task and every subsequent operation fails
    /// with [`SchedulerClosed`]. The scheduler only ever reads the token.
    #[must_use]
    pub fn with_cancel_token(token: CancelToken) -> Self {
        Self::build(Some(token))
    }

    fn build(external: Option<CancelToken>) -> Self {
        let owner = thread::current().id();
        trace!(?owner, "scheduler created");
        Self {
            queue: TaskQueue::new(),
            owner,
            phase: AtomicU8::new(PHASE_ACTIVE),
            cancelled: AtomicBool::new(false),
            external,
        }
    }

    /// Returns the thread this scheduler was constructed on.
    #[must_use]
    pub fn owner_thread(&self) -> ThreadId {
        self.owner
    }

    /// Returns true once cancellation has been observed or requested,
    /// internally (`dispose`) or through an external token.
    #[must_use]
    pub fn is_cancelled(&self) -> bool {
        self.cancelled.load(Ordering::Acquire)
            || self
                .external
                .as_ref()
                .is_some_and(CancelToken::is_cancelled)
    }

    /// Returns true once the scheduler is terminal.
    #[must_use]
    pub fn is_done(&self) -> bool {
        self.phase.load(Ordering::Acquire) == PHASE_DONE
    }

    /// Shared precondition gate for every public operation.
    fn verify_open(&self) -> Result<(), SchedulerClosed> {
        if self.is_cancelled() || self.is_done() {
            return Err(SchedulerClosed);
        }
        Ok(())
    }

    /// Appends a task to the work queue.
    ///
    /// May be called from any thread and never blocks beyond the queue
    /// lock. A rejected task is consumed; its handle reports
    /// [`JoinError::Discarded`](crate::error::JoinError::Discarded).
    ///
    /// # Errors
    ///
    /// [`SchedulerClosed`] if the scheduler is cancelled, terminal, or the
    /// queue has already been closed by `wait`/`dispose`.
    pub fn submit(&self, task: Task) -> Result<(), SchedulerClosed> {
        self.verify_open()?;
        trace!(task = %task.id(), "submitting task");
        self.queue.push(task).map_err(|_rejected| SchedulerClosed)
    }

    /// Wraps `f` into a task, submits it, and returns its result handle.
    ///
    /// # Errors
    ///
    /// [`SchedulerClosed`] under the same conditions as
    /// [`submit`](Self::submit); the closure is dropped unrun.
    pub fn spawn<T, F>(&self, f: F) -> Result<JoinHandle<T>, SchedulerClosed>
    where
        F: FnOnce() -> T + Send + 'static,
        T: Send + 'static,
    {
        let (task, handle) = Task::new(f);
        self.submit(task)?;
        Ok(handle)
    }

    /// Runs `task` synchronously on the calling thread, if allowed.
    ///
    /// Returns true and executes iff the calling thread is the owner thread
    /// and the scheduler is neither cancelled nor terminal. From any other
    /// thread, or once cancelled, returns false without executing, and the
    /// caller should fall back to [`submit`](Self::submit).
    ///
    /// This is the re-entrancy escape hatch: a continuation raised from
    /// within the drain loop can run immediately instead of round-tripping
    /// through the queue, and the single-thread guarantee still holds
    /// because only the owner ever passes the gate. Pass
    /// `was_previously_queued = true` for a task that is also sitting in
    /// the queue; the task's at-most-once latch turns the later drain-loop
    /// pop into a no-op, so nothing runs twice. Also returns false if the
    /// task has already run or been discarded.
    pub fn try_execute_inline(&self, task: &Task, was_previously_queued: bool) -> bool {
        if thread::current().id() != self.owner {
            return false;
        }
        if self.is_cancelled() || self.is_done() {
            return false;
        }
        trace!(task = %task.id(), was_previously_queued, "executing task inline");
        task.run()
    }

    /// Closes the queue and drains it on the calling thread.
    ///
    /// Every buffered task executes one at a time, in submission order,
    /// until the queue is empty or cancellation is observed. Cancellation
    /// is checked before each dequeue and again before each execution;
    /// once observed, the loop stops with the remainder unexecuted (each
    /// leftover task resolves as discarded once its last handle drops,
    /// normally when the scheduler itself is dropped). The scheduler is
    /// terminal when this returns.
    ///
    /// Intended to be called exactly once, from the owner thread; see the
    /// module docs for what happens when it runs elsewhere.
    ///
    /// # Errors
    ///
    /// [`SchedulerClosed`] if the scheduler is cancelled, already draining,
    /// or already terminal.
    ///
    /// # Blocking
    ///
    /// Blocks the calling thread until draining completes.
    pub fn wait(&self) -> Result<(), SchedulerClosed> {
        self.verify_open()?;
        if self
            .phase
            .compare_exchange(
                PHASE_ACTIVE,
                PHASE_DRAINING,
                Ordering::AcqRel,
                Ordering::Acquire,
            )
            .is_err()
        {
            return Err(SchedulerClosed);
        }

        self.queue.close();
        debug!("draining task queue");

        let mut executed: u64 = 0;
        loop {
            if self.is_cancelled() {
                debug!(executed, "cancellation observed; leaving remainder unexecuted");
                break;
            }
            let Some(task) = self.queue.take() else {
                break;
            };
            if self.is_cancelled() {
                debug!(executed, "cancellation observed; leaving remainder unexecuted");
                break;
            }
            if task.run() {
                executed += 1;
            }
        }

        self.phase.store(PHASE_DONE, Ordering::Release);
        debug!(executed, "scheduler drained");
        Ok(())
    }

    /// Closes the queue and discards everything in it without executing.
    ///
    /// The stop-now path: unblocks any pending consumption, drops every
    /// buffered task (each handle resolves as
    /// [`JoinError::Discarded`](crate::error::JoinError::Discarded)), and
    /// leaves the scheduler terminal. An externally supplied
    /// [`CancelToken`] is not touched; disposal trips an internal latch
    /// only.
    ///
    /// # Errors
    ///
    /// [`SchedulerClosed`] if the scheduler is already terminal, e.g. after
    /// a completed `wait`.
    pub fn dispose(&self) -> Result<(), SchedulerClosed> {
        if self.is_done() {
            return Err(SchedulerClosed);
        }
        self.cancelled.store(true, Ordering::Release);
        // Done is absorbing: a drain finishing between the gate above and
        // here must not be overwritten. Losing both exchanges just means
        // the discard loop below finds a closed, empty queue.
        let _ = self
            .phase
            .compare_exchange(
                PHASE_ACTIVE,
                PHASE_CANCELLING,
                Ordering::AcqRel,
                Ordering::Acquire,
            )
            .or_else(|_| {
                self.phase.compare_exchange(
                    PHASE_DRAINING,
                    PHASE_CANCELLING,
                    Ordering::AcqRel,
                    Ordering::Acquire,
                )
            });
        self.queue.close();
        debug!("disposing scheduler; discarding pending tasks");

        let mut discarded: u64 = 0;
        while let Some(task) = self.queue.take() {
            if task.discard() {
                discarded += 1;
            }
        }

        self.phase.store(PHASE_DONE, Ordering::Release);
        debug!(discarded, "scheduler disposed");
        Ok(())
    }

    /// Snapshot of the tasks currently buffered, in queue order.
    ///
    /// The handles are cheap clones; inspect them via
    /// [`Task::id`](crate::task::Task::id) and
    /// [`Task::state`](crate::task::Task::state). No consistency guarantee
    /// versus concurrent submission or draining beyond "reflects some valid
    /// moment in time".
    ///
    /// # Errors
    ///
    /// [`SchedulerClosed`] if the scheduler is cancelled or terminal.
    pub fn scheduled_tasks(&self) -> Result<Vec<Task>, SchedulerClosed> {
        self.verify_open()?;
        Ok(self.queue.snapshot())
    }
}

impl Default for SerialScheduler {
    fn default() -> Self {
        Self::new()
    }
}
