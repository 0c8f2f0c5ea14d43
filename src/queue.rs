//! Unbounded, close-aware FIFO of pending tasks.
//!
//! Producers push from any thread; one consumer takes. [`TaskQueue::take`]
//! blocks while the queue is empty but still open, and returns `None` once
//! the queue is closed and drained. [`TaskQueue::close`] is one-shot and
//! wakes every blocked taker so shutdown never strands a thread.
//!
//! Invariant: once closed, nothing is ever added; items already buffered
//! remain consumable until drained.

use std::collections::VecDeque;

use parking_lot::{Condvar, Mutex};

use crate::task::Task;

#[derive(Debug)]
pub(crate) struct TaskQueue {
    inner: Mutex<QueueInner>,
    ready: Condvar,
}

#[derive(Debug)]
struct QueueInner {
    buffer: VecDeque<Task>,
    closed: bool,
}

impl TaskQueue {
    pub(crate) fn new() -> Self {
        Self {
            inner: Mutex::new(QueueInner {
                buffer: VecDeque::new(),
                closed: false,
            }),
            ready: Condvar::new(),
        }
    }

    /// Appends a task to the tail.
    ///
    /// Hands the task back if the queue has been closed. The queue is
    /// unbounded, so an open queue never refuses a push.
    pub(crate) fn push(&self, task: Task) -> Result<(), Task> {
        {
            let mut inner = self.inner.lock();
            if inner.closed {
                return Err(task);
            }
            inner.buffer.push_back(task);
        }
        // Release the lock before notifying.
        self.ready.notify_one();
        Ok(())
    }

    /// Takes the next task, blocking while the queue is empty but open.
    ///
    /// Returns `None` once the queue is closed and empty.
    pub(crate) fn take(&self) -> Option<Task> {
        let mut inner = self.inner.lock();
        loop {
            if let Some(task) = inner.buffer.pop_front() {
                return Some(task);
            }
            if inner.closed {
                return None;
            }
            self.ready.wait(&mut inner);
        }
    }

    /// Closes the queue to further insertions. Idempotent.
    ///
    /// Wakes every blocked taker so they can observe closed-and-empty.
    pub(crate) fn close(&self) {
        let already_closed = {
            let mut inner = self.inner.lock();
            std::mem::replace(&mut inner.closed, true)
        };
        if !already_closed {
            self.ready.notify_all();
        }
    }

    /// Snapshot of the currently buffered tasks, in queue order.
    ///
    /// Valid for some moment in time; concurrent pushes and takes may have
    /// moved on by the time the caller looks.
    pub(crate) fn snapshot(&self) -> Vec<Task> {
        self.inner.lock().buffer.iter().cloned().collect()
    }

    #[cfg(test)]
    fn len(&self) -> usize {
        self.inner.lock().buffer.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_util::init_test_logging;
    use std::sync::atomic::{AtomicBool, Ordering};
    use std::sync::Arc;

    fn make_task() -> Task {
        let (task, _handle) = Task::new(|| ());
        task
    }

    #[test]
    fn push_take_preserves_fifo_order() {
        init_test_logging();
        let queue = TaskQueue::new();

        let ids: Vec<_> = (0..5)
            .map(|_| {
                let task = make_task();
                let id = task.id();
                queue.push(task).expect("queue unexpectedly closed");
                id
            })
            .collect();

        queue.close();
        let drained: Vec<_> = std::iter::from_fn(|| queue.take().map(|t| t.id())).collect();
        assert_eq!(drained, ids);
    }

    #[test]
    fn push_after_close_hands_task_back() {
        init_test_logging();
        let queue = TaskQueue::new();
        queue.close();

        let task = make_task();
        let id = task.id();
        let rejected = queue.push(task).expect_err("push should fail when closed");
        assert_eq!(rejected.id(), id);
        assert_eq!(queue.len(), 0);
    }

    #[test]
    fn buffered_tasks_survive_close() {
        init_test_logging();
        let queue = TaskQueue::new();
        queue.push(make_task()).expect("push failed");
        queue.push(make_task()).expect("push failed");

        queue.close();
        assert!(queue.take().is_some());
        assert!(queue.take().is_some());
        assert!(queue.take().is_none());
    }

    #[test]
    fn close_wakes_blocked_taker() {
        init_test_logging();
        let queue = Arc::new(TaskQueue::new());
        let returned = Arc::new(AtomicBool::new(false));

        let taker = {
            let queue = Arc::clone(&queue);
            let returned = Arc::clone(&returned);
            std::thread::spawn(move || {
                assert!(queue.take().is_none());
                returned.store(true, Ordering::SeqCst);
            })
        };

        for _ in 0..1_000 {
            std::thread::yield_now();
        }
        assert!(!returned.load(Ordering::SeqCst), "take returned while open");

        queue.close();
        taker.join().expect("taker thread panicked");
        assert!(returned.load(Ordering::SeqCst));
    }

    #[test]
    fn blocked_taker_receives_later_push() {
        init_test_logging();
        let queue = Arc::new(TaskQueue::new());

        let taker = {
            let queue = Arc::clone(&queue);
            std::thread::spawn(move || queue.take().map(|t| t.id()))
        };

        for _ in 0..100 {
            std::thread::yield_now();
        }
        let task = make_task();
        let id = task.id();
        queue.push(task).expect("push failed");

        assert_eq!(taker.join().expect("taker thread panicked"), Some(id));
    }

    #[test]
    fn snapshot_reflects_queue_order() {
        init_test_logging();
        let queue = TaskQueue::new();
        let a = make_task();
        let b = make_task();
        let (a_id, b_id) = (a.id(), b.id());
        queue.push(a).expect("push failed");
        queue.push(b).expect("push failed");

        let ids: Vec<_> = queue.snapshot().iter().map(Task::id).collect();
        assert_eq!(ids, vec![a_id, b_id]);
        // Snapshot does not consume.
        assert_eq!(queue.len(), 2);
    }
}
