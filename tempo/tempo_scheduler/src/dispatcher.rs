//! The dispatcher loop.
//!
//! One dedicated thread matches ready tasks to idle workers. Each pass,
//! under the dispatch lock:
//!
//! 1. releases delayed tasks whose time has come into their bins,
//! 2. takes one task from the most urgent non-empty bin and assigns it,
//! 3. fires every due, unpaused periodic task.
//!
//! The lock is released between passes. When a pass finds nothing ready the
//! dispatcher waits on its condition variable for a submission, a stop, the
//! next periodic or delayed due time, or the poll interval, whichever comes
//! first.

use log::{debug, info};
use parking_lot::{Condvar, Mutex};
use std::sync::Arc;
use std::time::Duration;
use tempo_core::Clock;

use crate::bins::PriorityBins;
use crate::delayed::DelayedTasks;
use crate::periodic::PeriodicRegistry;
use crate::stats::SchedulerCounters;
use crate::task::TaskRef;
use crate::worker::{Assignment, WorkerPool};

/// Everything guarded by the dispatch lock.
#[derive(Debug, Default)]
pub(crate) struct DispatchState {
    pub(crate) bins: PriorityBins,
    pub(crate) periodic: PeriodicRegistry,
    pub(crate) delayed: DelayedTasks,
    pub(crate) stopping: bool,
}

impl DispatchState {
    /// Whether anything could become dispatchable. Blocked tasks never count.
    pub(crate) fn has_work(&self) -> bool {
        self.bins.has_dispatchable() || !self.periodic.is_empty() || !self.delayed.is_empty()
    }

    /// Earliest clock time at which an unpaused periodic task or a delayed
    /// task becomes due.
    pub(crate) fn next_deadline(&self) -> Option<Duration> {
        match (self.periodic.next_due(), self.delayed.next_release()) {
            (Some(due), Some(release)) => Some(due.min(release)),
            (due, release) => due.or(release),
        }
    }
}

/// How long an idle dispatcher waits: until the next deadline, capped at the
/// poll interval.
pub(crate) fn idle_wait(deadline: Option<Duration>, now: Duration, poll: Duration) -> Duration {
    deadline.map_or(poll, |at| at.saturating_sub(now).min(poll))
}

/// State shared between the `Scheduler` handle and the dispatcher thread.
pub(crate) struct Shared {
    pub(crate) state: Mutex<DispatchState>,
    pub(crate) wake: Condvar,
    pub(crate) pool: Arc<WorkerPool>,
    pub(crate) clock: Arc<dyn Clock>,
    pub(crate) counters: SchedulerCounters,
    pub(crate) poll_interval: Duration,
}

/// What a single pass did.
#[derive(Debug, Default, PartialEq, Eq)]
pub(crate) struct PassReport {
    pub(crate) released: usize,
    pub(crate) dispatched: Option<Assignment>,
    pub(crate) fired: usize,
}

/// Run one dispatch pass at clock time `now`.
pub(crate) fn run_pass(
    state: &mut DispatchState,
    pool: &WorkerPool,
    now: Duration,
    counters: &SchedulerCounters,
) -> PassReport {
    let mut report = PassReport::default();

    for task in state.delayed.take_due(now) {
        let priority = state.bins.push(task);
        debug!("Released delayed task into bin: {}", priority);
        report.released += 1;
    }
    if report.released > 0 {
        SchedulerCounters::add(&counters.delayed_released, report.released as u64);
        SchedulerCounters::add(&counters.submitted, report.released as u64);
    }

    if let Some(task) = state.bins.pop_next() {
        let assignment = assign(pool, &task, counters);
        SchedulerCounters::add(&counters.dispatched, 1);
        report.dispatched = Some(assignment);
    }

    report.fired = state.periodic.fire_due(now, |task| {
        assign(pool, task, counters);
        info!("Executing periodic task {}", task.id());
    });
    SchedulerCounters::add(&counters.periodic_fired, report.fired as u64);

    report
}

fn assign(pool: &WorkerPool, task: &TaskRef, counters: &SchedulerCounters) -> Assignment {
    let assignment = pool.assign(Arc::clone(task));
    match assignment {
        Assignment::Worker(worker) => {
            info!("Assigning task {} to {}", task.id(), worker);
        }
        Assignment::Overflow => {
            SchedulerCounters::add(&counters.overflowed, 1);
            info!(
                "All workers busy, task {} queued for the next free worker",
                task.id()
            );
        }
    }
    assignment
}

/// Dispatcher thread main loop
pub(crate) fn dispatcher_loop(shared: Arc<Shared>) {
    shared.clock.start();
    debug!("Dispatcher: Starting");

    loop {
        let mut state = shared.state.lock();

        while !state.stopping && !state.has_work() {
            shared.wake.wait(&mut state);
        }

        if state.stopping && !state.has_work() {
            break;
        }

        let now = shared.clock.total_elapsed();
        let report = run_pass(&mut state, &shared.pool, now, &shared.counters);

        if report.dispatched.is_none() && !state.bins.has_dispatchable() {
            let wait = idle_wait(
                state.next_deadline(),
                shared.clock.total_elapsed(),
                shared.poll_interval,
            );
            // A zero wait means an entry is still behind schedule
            if !wait.is_zero() {
                shared.wake.wait_for(&mut state, wait);
            }
        }
    }

    shared.clock.stop();
    info!("Dispatcher thread exiting");
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::task::{Priority, Task};

    fn ms(value: u64) -> Duration {
        Duration::from_millis(value)
    }

    fn task(id: &str, priority: Priority) -> TaskRef {
        Arc::new(Task::with_id(id, || Ok(())).with_priority(priority))
    }

    fn queued_ids(pool: &WorkerPool) -> Vec<String> {
        let mut ids = Vec::new();
        for worker in pool.workers() {
            while let Some(message) = worker.queue().try_pop() {
                ids.push(message.into_task().unwrap().id().to_string());
            }
        }
        ids
    }

    #[test]
    fn test_one_regular_task_per_pass() {
        let pool = WorkerPool::new(1, true);
        let counters = SchedulerCounters::default();
        let mut state = DispatchState::default();
        state.bins.push(task("low", Priority::Low));
        state.bins.push(task("very-high", Priority::VeryHigh));

        let report = run_pass(&mut state, &pool, ms(0), &counters);
        assert_eq!(
            report.dispatched,
            Some(Assignment::Worker(pool.workers()[0].id()))
        );
        assert_eq!(state.bins.len(), 1);
        assert_eq!(queued_ids(&pool), vec!["very-high"]);

        // The only worker is reserved, so the next task overflows
        let report = run_pass(&mut state, &pool, ms(0), &counters);
        assert_eq!(report.dispatched, Some(Assignment::Overflow));
        assert_eq!(pool.overflow_len(), 1);
        assert!(!state.has_work());
    }

    #[test]
    fn test_regular_and_periodic_in_same_pass() {
        let pool = WorkerPool::new(2, true);
        let counters = SchedulerCounters::default();
        let mut state = DispatchState::default();
        state.bins.push(task("regular", Priority::Normal));
        state
            .periodic
            .insert(task("tick", Priority::Normal), ms(100), ms(0));

        let report = run_pass(&mut state, &pool, ms(100), &counters);
        assert!(report.dispatched.is_some());
        assert_eq!(report.fired, 1);
        assert_eq!(queued_ids(&pool), vec!["regular", "tick"]);
        assert_eq!(state.periodic.get("tick").unwrap().next_execution(), ms(200));
    }

    #[test]
    fn test_delayed_release_then_dispatch() {
        let pool = WorkerPool::new(1, true);
        let counters = SchedulerCounters::default();
        let mut state = DispatchState::default();
        state.delayed.push(task("later", Priority::High), ms(50));

        let report = run_pass(&mut state, &pool, ms(10), &counters);
        assert_eq!(report, PassReport::default());
        assert!(state.has_work());

        let report = run_pass(&mut state, &pool, ms(50), &counters);
        assert_eq!(report.released, 1);
        assert!(report.dispatched.is_some());
        assert!(!state.has_work());
    }

    #[test]
    fn test_next_deadline_covers_periodic_and_delayed() {
        let mut state = DispatchState::default();
        assert_eq!(state.next_deadline(), None);

        state.delayed.push(task("later", Priority::Normal), ms(300));
        assert_eq!(state.next_deadline(), Some(ms(300)));

        let tick = task("tick", Priority::Normal);
        state.periodic.insert(tick.clone(), ms(100), ms(50));
        assert_eq!(state.next_deadline(), Some(ms(150)));

        // Paused entries do not set a deadline
        tick.pause();
        assert_eq!(state.next_deadline(), Some(ms(300)));
    }

    #[test]
    fn test_idle_wait_is_capped_by_poll() {
        let poll = ms(100);
        assert_eq!(idle_wait(None, ms(0), poll), poll);
        assert_eq!(idle_wait(Some(ms(530)), ms(500), poll), ms(30));
        assert_eq!(idle_wait(Some(ms(900)), ms(500), poll), poll);
        assert_eq!(idle_wait(Some(ms(400)), ms(500), poll), Duration::ZERO);
    }

    #[test]
    fn test_blocked_tasks_are_not_work() {
        let pool = WorkerPool::new(1, true);
        let counters = SchedulerCounters::default();
        let mut state = DispatchState::default();
        state.bins.push(task("parked", Priority::Blocked));

        assert!(!state.has_work());
        let report = run_pass(&mut state, &pool, ms(0), &counters);
        assert!(report.dispatched.is_none());
        assert_eq!(state.bins.len(), 1);
    }
}
