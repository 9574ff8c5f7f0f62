use std::time::Duration;

use log::trace;

type TaskId = u64;

#[derive(Debug)]
struct ScheduledTask<T> {
    id: TaskId,
    due: Duration,
    task: T,
}

/// Single-shot, cancelable delayed tasks on a logical monotonic clock.
///
/// Nothing fires on its own: the owner moves the clock and pulls due tasks with
/// [`Scheduler::pop_due`], so every delayed mutation runs on the owner's turn.
/// Tasks due at the same instant come out in the order they were scheduled.
#[derive(Debug)]
pub struct Scheduler<T> {
    now: Duration,
    next_id: TaskId,
    pending: Vec<ScheduledTask<T>>,
}

impl<T> Default for Scheduler<T> {
    fn default() -> Self {
        Self {
            now: Duration::ZERO,
            next_id: 0,
            pending: Vec::new(),
        }
    }
}

impl<T: std::fmt::Debug> Scheduler<T> {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn now(&self) -> Duration {
        self.now
    }

    /// Moves the clock; never backwards.
    pub fn set_now(&mut self, now: Duration) {
        if now > self.now {
            self.now = now;
        }
    }

    pub fn schedule(&mut self, delay: Duration, task: T) {
        let id = self.next_id;
        self.next_id += 1;
        let due = self.now + delay;
        trace!(target: "scheduler", "Scheduling task {} at {:?}: {:?}", id, due, task);
        self.pending.push(ScheduledTask { id, due, task });
    }

    /// Drops tasks matching `predicate`, returning them in schedule order.
    pub fn cancel_where<F>(&mut self, mut predicate: F) -> Vec<T>
    where
        F: FnMut(&T) -> bool,
    {
        let mut cancelled = Vec::new();
        let mut kept = Vec::with_capacity(self.pending.len());
        for scheduled in self.pending.drain(..) {
            if predicate(&scheduled.task) {
                cancelled.push(scheduled.task);
            } else {
                kept.push(scheduled);
            }
        }
        self.pending = kept;
        cancelled
    }

    pub fn cancel_all(&mut self) -> usize {
        let count = self.pending.len();
        if count > 0 {
            trace!(target: "scheduler", "Cancelling {} pending tasks", count);
        }
        self.pending.clear();
        count
    }

    pub fn next_due(&self) -> Option<Duration> {
        self.pending.iter().map(|scheduled| scheduled.due).min()
    }

    /// Removes and returns the earliest task due at or before `until`.
    pub fn pop_due(&mut self, until: Duration) -> Option<(Duration, T)> {
        let index = self
            .pending
            .iter()
            .enumerate()
            .filter(|(_, scheduled)| scheduled.due <= until)
            .min_by_key(|(_, scheduled)| (scheduled.due, scheduled.id))
            .map(|(index, _)| index)?;
        let scheduled = self.pending.remove(index);
        Some((scheduled.due, scheduled.task))
    }
}
