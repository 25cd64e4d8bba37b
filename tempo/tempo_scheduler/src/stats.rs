//! Scheduler statistics.

use serde::Serialize;
use std::sync::atomic::{AtomicU64, Ordering};

use crate::worker::WorkerSnapshot;

/// Statistics about the scheduler and its workers
#[derive(Debug, Clone, Default, Serialize)]
pub struct SchedulerStats {
    /// Tasks admitted into a priority bin (delayed tasks count on release)
    pub tasks_submitted: u64,

    /// Regular tasks the dispatcher took out of a bin
    pub tasks_dispatched: u64,

    /// Dispatches that went to the overflow queue because no worker was idle
    pub tasks_overflowed: u64,

    /// Periodic firings
    pub periodic_fired: u64,

    /// Delayed tasks released into their bin
    pub delayed_released: u64,

    /// Executions finished across all workers
    pub tasks_executed: u64,

    /// Executions that faulted across all workers
    pub tasks_faulted: u64,

    /// Tasks taken from a sibling's queue
    pub tasks_stolen: u64,

    /// Tasks sitting in priority bins, blocked bin included
    pub pending_tasks: usize,

    /// Tasks waiting in the overflow queue
    pub overflow_tasks: usize,

    /// Registered periodic tasks
    pub periodic_tasks: usize,

    /// Delayed tasks not yet released
    pub delayed_tasks: usize,

    /// Per-worker view
    pub workers: Vec<WorkerSnapshot>,
}

#[derive(Debug, Default)]
pub(crate) struct SchedulerCounters {
    pub(crate) submitted: AtomicU64,
    pub(crate) dispatched: AtomicU64,
    pub(crate) overflowed: AtomicU64,
    pub(crate) periodic_fired: AtomicU64,
    pub(crate) delayed_released: AtomicU64,
}

impl SchedulerCounters {
    pub(crate) fn add(counter: &AtomicU64, value: u64) {
        counter.fetch_add(value, Ordering::Relaxed);
    }

    /// Fill the counter fields of `stats` and fold in the worker totals.
    pub(crate) fn fill(&self, stats: &mut SchedulerStats) {
        stats.tasks_submitted = self.submitted.load(Ordering::Relaxed);
        stats.tasks_dispatched = self.dispatched.load(Ordering::Relaxed);
        stats.tasks_overflowed = self.overflowed.load(Ordering::Relaxed);
        stats.periodic_fired = self.periodic_fired.load(Ordering::Relaxed);
        stats.delayed_released = self.delayed_released.load(Ordering::Relaxed);

        stats.tasks_executed = stats.workers.iter().map(|w| w.tasks_executed).sum();
        stats.tasks_faulted = stats.workers.iter().map(|w| w.tasks_faulted).sum();
        stats.tasks_stolen = stats.workers.iter().map(|w| w.tasks_stolen).sum();
    }
}
