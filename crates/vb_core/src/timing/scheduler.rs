use std::sync::{Arc, Mutex};

use super::clock::Clock;

pub type TaskId = u64;

type TaskFn = Arc<dyn Fn() + Send + Sync>;

struct Task {
    id: TaskId,
    due_ms: u64,
    repeat_ms: Option<u64>,
    callback: TaskFn,
}

#[derive(Default)]
struct TimersInner {
    next_id: TaskId,
    tasks: Vec<Task>,
}

/// Cooperative timer scheduler. One-shot and repeating tasks are registered
/// with a delay and executed when the owner calls [`Timers::run_due`].
///
/// Callbacks run outside the internal lock, so a task may freely schedule or
/// cancel other tasks (including itself).
#[derive(Clone)]
pub struct Timers {
    clock: Arc<dyn Clock>,
    inner: Arc<Mutex<TimersInner>>,
}

impl Timers {
    pub fn new(clock: Arc<dyn Clock>) -> Self {
        Self { clock, inner: Arc::new(Mutex::new(TimersInner::default())) }
    }

    pub fn clock(&self) -> Arc<dyn Clock> {
        Arc::clone(&self.clock)
    }

    /// Schedule a task to run once after `delay_ms`.
    pub fn schedule_once<F>(&self, delay_ms: u64, callback: F) -> TaskHandle
    where
        F: Fn() + Send + Sync + 'static,
    {
        self.schedule(delay_ms, None, Arc::new(callback))
    }

    /// Schedule a task to run every `interval_ms` until cancelled.
    pub fn schedule_repeating<F>(&self, interval_ms: u64, callback: F) -> TaskHandle
    where
        F: Fn() + Send + Sync + 'static,
    {
        self.schedule(interval_ms, Some(interval_ms), Arc::new(callback))
    }

    fn schedule(&self, delay_ms: u64, repeat_ms: Option<u64>, callback: TaskFn) -> TaskHandle {
        let now = self.clock.now_ms();
        let mut inner = self.inner.lock().expect("timer lock poisoned");
        inner.next_id += 1;
        let id = inner.next_id;
        inner.tasks.push(Task { id, due_ms: now + delay_ms, repeat_ms, callback });
        TaskHandle { id, timers: self.clone() }
    }

    /// Remove a task. Returns false if it already fired or was cancelled.
    pub fn cancel(&self, id: TaskId) -> bool {
        let mut inner = self.inner.lock().expect("timer lock poisoned");
        let before = inner.tasks.len();
        inner.tasks.retain(|task| task.id != id);
        inner.tasks.len() != before
    }

    pub fn is_active(&self, id: TaskId) -> bool {
        let inner = self.inner.lock().expect("timer lock poisoned");
        inner.tasks.iter().any(|task| task.id == id)
    }

    /// Number of registered tasks. Useful for asserting teardown released
    /// every handle.
    pub fn pending(&self) -> usize {
        self.inner.lock().expect("timer lock poisoned").tasks.len()
    }

    /// Run every task whose deadline has passed; returns how many ran.
    /// Repeating tasks are re-armed (same id) before their callback runs,
    /// so a callback cancelling its own handle stops the repetition.
    pub fn run_due(&self) -> usize {
        let now = self.clock.now_ms();
        let due: Vec<TaskFn> = {
            let mut inner = self.inner.lock().expect("timer lock poisoned");
            let mut ready = Vec::new();
            let mut remaining = Vec::with_capacity(inner.tasks.len());
            for task in inner.tasks.drain(..) {
                if task.due_ms <= now {
                    ready.push(task.callback.clone());
                    if let Some(interval) = task.repeat_ms {
                        remaining.push(Task {
                            id: task.id,
                            due_ms: now + interval,
                            repeat_ms: task.repeat_ms,
                            callback: task.callback,
                        });
                    }
                } else {
                    remaining.push(task);
                }
            }
            inner.tasks = remaining;
            ready
        };

        for callback in &due {
            callback();
        }
        due.len()
    }
}

/// Cancellation handle for a scheduled task.
pub struct TaskHandle {
    id: TaskId,
    timers: Timers,
}

impl TaskHandle {
    pub fn id(&self) -> TaskId {
        self.id
    }

    pub fn cancel(&self) -> bool {
        self.timers.cancel(self.id)
    }

    pub fn is_active(&self) -> bool {
        self.timers.is_active(self.id)
    }
}
