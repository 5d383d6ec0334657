//! Per-channel delivery scheduler
//!
//! Holds one recurring task per bound stream. Nothing here sleeps: the
//! owner asks for the next due time, waits for it however it likes, then
//! drains due tasks with [`Scheduler::pop_due`]. Cancelling a task removes it
//! immediately, so a cancelled task can never fire.

use std::fmt;
use std::time::Duration;

use tokio::time::Instant;

use crate::media::MediaKind;

/// Handle to a scheduled task
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct TaskId(u64);

impl fmt::Display for TaskId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// Which stream slot a task delivers for
pub type Slot = MediaKind;

#[derive(Debug)]
struct ScheduledTask {
    id: TaskId,
    slot: Slot,
    interval: Duration,
    due: Instant,
}

/// Recurring timers keyed by [`TaskId`]
#[derive(Debug, Default)]
pub struct Scheduler {
    tasks: Vec<ScheduledTask>,
    next_id: u64,
}

impl Scheduler {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a task firing every `interval`, first in `interval` from now
    pub fn add(&mut self, slot: Slot, interval: Duration) -> TaskId {
        self.next_id += 1;
        let id = TaskId(self.next_id);
        self.tasks.push(ScheduledTask {
            id,
            slot,
            interval,
            due: Instant::now() + interval,
        });
        tracing::trace!(
            task = %id,
            slot = ?slot,
            interval_ms = interval.as_millis() as u64,
            "Task added"
        );
        id
    }

    /// Remove a task. Returns whether it existed.
    pub fn cancel(&mut self, id: TaskId) -> bool {
        let before = self.tasks.len();
        self.tasks.retain(|t| t.id != id);
        let removed = self.tasks.len() != before;
        if removed {
            tracing::trace!(task = %id, "Task cancelled");
        }
        removed
    }

    pub fn contains(&self, id: TaskId) -> bool {
        self.tasks.iter().any(|t| t.id == id)
    }

    /// Earliest due time of any task
    pub fn next_due(&self) -> Option<Instant> {
        self.tasks.iter().map(|t| t.due).min()
    }

    /// The earliest task due at or before `now`
    ///
    /// The task stays scheduled; call [`Scheduler::rearm`] to push it to its
    /// next interval or [`Scheduler::cancel`] to drop it.
    pub fn pop_due(&mut self, now: Instant) -> Option<(TaskId, Slot)> {
        self.tasks
            .iter()
            .filter(|t| t.due <= now)
            .min_by_key(|t| t.due)
            .map(|t| (t.id, t.slot))
    }

    /// Move a task to its next firing time
    pub fn rearm(&mut self, id: TaskId) {
        let now = Instant::now();
        if let Some(task) = self.tasks.iter_mut().find(|t| t.id == id) {
            task.due += task.interval;
            if task.due < now {
                // fell behind; don't burst to catch up
                task.due = now + task.interval;
            }
        }
    }

    pub fn len(&self) -> usize {
        self.tasks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tasks.is_empty()
    }
}
