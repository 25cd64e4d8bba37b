//! One-shot tasks waiting for a clock time before admission.

use std::time::Duration;

use crate::task::TaskRef;

/// Tasks held back until their release time, kept sorted by that time.
/// Tasks sharing a release time keep their insertion order.
#[derive(Debug, Default)]
pub struct DelayedTasks {
    entries: Vec<(Duration, TaskRef)>,
}

impl DelayedTasks {
    /// Create an empty set.
    pub fn new() -> Self {
        Self::default()
    }

    /// Hold `task` until clock time `release_at`.
    pub fn push(&mut self, task: TaskRef, release_at: Duration) {
        let pos = self.entries.partition_point(|(at, _)| *at <= release_at);
        self.entries.insert(pos, (release_at, task));
    }

    /// Remove and return every task whose release time has been reached,
    /// earliest first.
    pub fn take_due(&mut self, now: Duration) -> Vec<TaskRef> {
        let split = self.entries.partition_point(|(at, _)| *at <= now);
        self.entries.drain(..split).map(|(_, task)| task).collect()
    }

    /// Earliest pending release time.
    pub fn next_release(&self) -> Option<Duration> {
        self.entries.first().map(|(at, _)| *at)
    }

    /// Number of held tasks.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Whether nothing is held.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Drop every held task, returning how many were discarded.
    pub fn clear(&mut self) -> usize {
        let dropped = self.entries.len();
        self.entries.clear();
        dropped
    }
}
