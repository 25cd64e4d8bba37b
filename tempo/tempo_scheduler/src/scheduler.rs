//! The scheduler handle.
//!
//! A `Scheduler` owns the dispatcher thread and the worker pool. Every
//! admission and lifecycle call takes the dispatch lock only long enough to
//! mutate the bins, the periodic registry or the delayed set, then wakes the
//! dispatcher.

use log::{error, info, warn};
use parking_lot::{Condvar, Mutex};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::Duration;
use tempo_core::{Clock, SchedulerError, Stopwatch};

use crate::config::SchedulerConfig;
use crate::dispatcher::{dispatcher_loop, DispatchState, Shared};
use crate::message::ControlMessage;
use crate::stats::{SchedulerCounters, SchedulerStats};
use crate::task::{Priority, TaskRef};
use crate::worker::{WorkerPool, WorkerSnapshot};

/// Priority-aware scheduler backed by a work-stealing worker pool.
///
/// Dropping the scheduler performs the same shutdown as [`Scheduler::stop_all`].
pub struct Scheduler {
    shared: Arc<Shared>,
    config: SchedulerConfig,
    dispatcher: Mutex<Option<JoinHandle<()>>>,
    workers: Mutex<Vec<JoinHandle<()>>>,
    /// Held for the whole shutdown; `true` once it has completed.
    stopped: Mutex<bool>,
}

impl Scheduler {
    /// Create a scheduler with the default configuration and a real clock.
    pub fn new() -> tempo_core::Result<Self> {
        Self::with_config(SchedulerConfig::default())
    }

    /// Create a scheduler from `config` with a real clock.
    pub fn with_config(config: SchedulerConfig) -> tempo_core::Result<Self> {
        Self::with_clock(config, Arc::new(Stopwatch::new()))
    }

    /// Create a scheduler from `config` that reads time from `clock`.
    pub fn with_clock(config: SchedulerConfig, clock: Arc<dyn Clock>) -> tempo_core::Result<Self> {
        config.validate()?;

        let worker_count = config.effective_worker_threads();
        let pool = Arc::new(WorkerPool::new(worker_count, config.collect_stats));
        let shared = Arc::new(Shared {
            state: Mutex::new(DispatchState::default()),
            wake: Condvar::new(),
            pool: Arc::clone(&pool),
            clock,
            counters: SchedulerCounters::default(),
            poll_interval: config.dispatch_poll(),
        });

        let options = config.worker_options();
        let mut workers = Vec::with_capacity(worker_count);
        for index in 0..worker_count {
            match pool.spawn(index, &options) {
                Ok(handle) => workers.push(handle),
                Err(e) => {
                    error!("Failed to spawn worker {}: {}", index, e);
                    abort_workers(&pool, workers);
                    return Err(SchedulerError::WorkerSpawn(e.to_string()).into());
                }
            }
        }

        let dispatcher_shared = Arc::clone(&shared);
        let dispatcher = thread::Builder::new()
            .name("tempo-dispatcher".to_string())
            .spawn(move || dispatcher_loop(dispatcher_shared));
        let dispatcher = match dispatcher {
            Ok(handle) => handle,
            Err(e) => {
                error!("Failed to spawn dispatcher: {}", e);
                abort_workers(&pool, workers);
                return Err(SchedulerError::WorkerSpawn(e.to_string()).into());
            }
        };

        info!("Scheduler started with {} workers", worker_count);

        Ok(Self {
            shared,
            config,
            dispatcher: Mutex::new(Some(dispatcher)),
            workers: Mutex::new(workers),
            stopped: Mutex::new(false),
        })
    }

    /// Admit a one-shot task into the bin of its priority.
    ///
    /// Tasks with [`Priority::Blocked`] are parked until
    /// [`Scheduler::unblock_task`] promotes them.
    pub fn add_task(&self, task: impl Into<TaskRef>) -> Result<(), SchedulerError> {
        let task = task.into();
        {
            let mut state = self.shared.state.lock();
            self.admit(&mut state, task)?;
        }
        self.shared.wake.notify_one();
        Ok(())
    }

    /// Admit a one-shot task at a raw bin index, `0` being the most urgent.
    ///
    /// Indices outside the known levels are logged and rejected.
    pub fn add_task_at(&self, task: impl Into<TaskRef>, level: usize) -> Result<(), SchedulerError> {
        let task = task.into();
        let priority = Priority::try_from(level).map_err(|e| {
            error!("Invalid priority level: {} (task {})", level, task.id());
            e
        })?;
        task.set_priority(priority);
        self.add_task(task)
    }

    /// Admit several tasks under one lock, so the dispatcher orders them by
    /// priority no matter the order they are given in. Returns how many
    /// were admitted.
    pub fn add_tasks<I, T>(&self, tasks: I) -> Result<usize, SchedulerError>
    where
        I: IntoIterator<Item = T>,
        T: Into<TaskRef>,
    {
        let mut admitted = 0;
        {
            let mut state = self.shared.state.lock();
            for task in tasks {
                self.admit(&mut state, task.into())?;
                admitted += 1;
            }
        }
        if admitted > 0 {
            self.shared.wake.notify_one();
        }
        Ok(admitted)
    }

    /// Admit a one-shot task once `delay` of clock time has passed.
    pub fn add_delayed_task(
        &self,
        task: impl Into<TaskRef>,
        delay: Duration,
    ) -> Result<(), SchedulerError> {
        let task = task.into();
        {
            let mut state = self.shared.state.lock();
            if state.stopping {
                return Err(reject(&task));
            }
            let release_at = self.shared.clock.total_elapsed() + delay;
            info!("Task {} delayed by {:?}", task.id(), delay);
            state.delayed.push(task, release_at);
        }
        self.shared.wake.notify_one();
        Ok(())
    }

    /// Register `task` to fire every `interval` of clock time, first at
    /// now + `interval`. Registering an id again replaces its entry.
    pub fn schedule_task(
        &self,
        task: impl Into<TaskRef>,
        interval: Duration,
    ) -> Result<(), SchedulerError> {
        let task = task.into();
        if interval.is_zero() {
            error!("Rejected periodic task {}: zero interval", task.id());
            return Err(SchedulerError::InvalidInterval);
        }

        {
            let mut state = self.shared.state.lock();
            if state.stopping {
                return Err(reject(&task));
            }
            let now = self.shared.clock.total_elapsed();
            let id = task.id().clone();
            if state.periodic.insert(task, interval, now).is_some() {
                info!("Replaced periodic task {}", id);
            }
            info!("Scheduled periodic task {} every {:?}", id, interval);
        }
        self.shared.wake.notify_one();
        Ok(())
    }

    /// Remove a periodic task. One-shot tasks already queued or running are
    /// not affected.
    pub fn stop_task(&self, id: &str) -> Result<(), SchedulerError> {
        let removed = self.shared.state.lock().periodic.remove(id);
        match removed {
            Some(_) => {
                info!("Stopped periodic task {}", id);
                Ok(())
            }
            None => Err(not_found("Stop", id)),
        }
    }

    /// Stop firing a periodic task until it is resumed.
    pub fn pause_task(&self, id: &str) -> Result<(), SchedulerError> {
        let state = self.shared.state.lock();
        match state.periodic.get(id) {
            Some(entry) => {
                entry.task().pause();
                info!("Paused periodic task {}", id);
                Ok(())
            }
            None => Err(not_found("Pause", id)),
        }
    }

    /// Let a paused periodic task fire again.
    pub fn resume_task(&self, id: &str) -> Result<(), SchedulerError> {
        {
            let state = self.shared.state.lock();
            match state.periodic.get(id) {
                Some(entry) => {
                    entry.task().resume();
                    info!("Resumed periodic task {}", id);
                }
                None => return Err(not_found("Resume", id)),
            }
        }
        self.shared.wake.notify_one();
        Ok(())
    }

    /// Move a task parked in the blocked bin to the bin of `priority`.
    pub fn unblock_task(&self, id: &str, priority: Priority) -> Result<(), SchedulerError> {
        if !priority.is_dispatchable() {
            error!("Cannot unblock task {} into the blocked bin", id);
            return Err(SchedulerError::InvalidPriority(priority.index()));
        }

        {
            let mut state = self.shared.state.lock();
            let task = match state.bins.take_blocked(id) {
                Some(task) => task,
                None if state.bins.contains(id) => {
                    warn!("Unblock failed: task {} is not blocked", id);
                    return Err(SchedulerError::NotBlocked(id.into()));
                }
                None => return Err(not_found("Unblock", id)),
            };
            task.set_priority(priority);
            state.bins.push(task);
            info!("Task {} unblocked into bin: {}", id, priority);
        }
        self.shared.wake.notify_one();
        Ok(())
    }

    /// Send a copy of `message` to every worker's queue.
    pub fn post_message(&self, message: ControlMessage) {
        info!(
            "Posting {} to {} workers",
            message.kind(),
            self.shared.pool.len()
        );
        self.shared.pool.broadcast(&message);
    }

    /// Shut down: discard every task not yet started, then join the
    /// dispatcher and every worker. Workers finish their current task first.
    ///
    /// Safe to call more than once; later calls return once the first
    /// shutdown has finished.
    pub fn stop_all(&self) {
        let mut stopped = self.stopped.lock();
        if *stopped {
            return;
        }
        info!("Stopping all workers");

        let pool = &self.shared.pool;
        for worker in pool.workers() {
            worker.signal_stop();
        }

        let (pending, periodic, delayed) = {
            let mut state = self.shared.state.lock();
            state.stopping = true;
            (
                state.bins.clear(),
                state.periodic.clear(),
                state.delayed.clear(),
            )
        };
        self.shared.wake.notify_all();

        if let Some(handle) = self.dispatcher.lock().take() {
            if handle.join().is_err() {
                error!("Dispatcher thread panicked");
            }
        }

        let overflow = pool.drain_overflow();
        for handle in self.workers.lock().drain(..) {
            if handle.join().is_err() {
                error!("Worker thread panicked");
            }
        }
        let queued: usize = pool.workers().iter().map(|w| w.queue().clear()).sum();

        info!(
            "All tasks and threads have been cleared \
             (discarded {} pending, {} periodic, {} delayed, {} overflow, {} queued)",
            pending, periodic, delayed, overflow, queued
        );
        *stopped = true;
    }

    /// Whether the scheduler still admits work.
    pub fn is_running(&self) -> bool {
        !self.shared.state.lock().stopping
    }

    /// The configuration the scheduler was built from.
    pub fn config(&self) -> &SchedulerConfig {
        &self.config
    }

    /// The clock used for periodic and delayed timing.
    pub fn clock(&self) -> Arc<dyn Clock> {
        Arc::clone(&self.shared.clock)
    }

    /// Number of workers in the pool.
    pub fn worker_count(&self) -> usize {
        self.shared.pool.len()
    }

    /// Tasks waiting in priority bins, blocked bin included.
    pub fn pending_tasks(&self) -> usize {
        self.shared.state.lock().bins.len()
    }

    /// Per-worker view.
    pub fn worker_snapshots(&self) -> Vec<WorkerSnapshot> {
        self.shared
            .pool
            .workers()
            .iter()
            .map(|worker| worker.snapshot())
            .collect()
    }

    /// Snapshot of the scheduler counters and worker state.
    pub fn stats(&self) -> SchedulerStats {
        let mut stats = SchedulerStats {
            workers: self.worker_snapshots(),
            overflow_tasks: self.shared.pool.overflow_len(),
            ..Default::default()
        };
        {
            let state = self.shared.state.lock();
            stats.pending_tasks = state.bins.len();
            stats.periodic_tasks = state.periodic.len();
            stats.delayed_tasks = state.delayed.len();
        }
        self.shared.counters.fill(&mut stats);
        stats
    }

    fn admit(&self, state: &mut DispatchState, task: TaskRef) -> Result<(), SchedulerError> {
        if state.stopping {
            return Err(reject(&task));
        }
        let id = task.id().clone();
        let priority = state.bins.push(task);
        SchedulerCounters::add(&self.shared.counters.submitted, 1);
        info!("Task {} added to bin: {}", id, priority);
        Ok(())
    }
}

impl Drop for Scheduler {
    fn drop(&mut self) {
        self.stop_all();
    }
}

impl std::fmt::Debug for Scheduler {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Scheduler")
            .field("workers", &self.shared.pool.len())
            .field("config", &self.config)
            .finish_non_exhaustive()
    }
}

fn reject(task: &TaskRef) -> SchedulerError {
    error!("Rejected task {}: scheduler is shutting down", task.id());
    SchedulerError::ShuttingDown
}

fn not_found(operation: &str, id: &str) -> SchedulerError {
    warn!("{} failed: task not found with id: {}", operation, id);
    SchedulerError::TaskNotFound(id.into())
}

/// Stop and join workers spawned before a construction failure.
fn abort_workers(pool: &WorkerPool, handles: Vec<JoinHandle<()>>) {
    for worker in pool.workers() {
        worker.signal_stop();
    }
    for handle in handles {
        let _ = handle.join();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::task::Task;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::Instant;
    use tempo_core::ManualClock;

    fn config(workers: usize) -> SchedulerConfig {
        SchedulerConfig {
            worker_threads: Some(workers),
            dispatch_poll_ms: 5,
            steal_backoff_ms: 2,
            ..Default::default()
        }
    }

    fn wait_for(timeout: Duration, mut condition: impl FnMut() -> bool) -> bool {
        let start = Instant::now();
        while start.elapsed() < timeout {
            if condition() {
                return true;
            }
            thread::sleep(Duration::from_millis(5));
        }
        condition()
    }

    #[test]
    fn test_add_task_runs() {
        let scheduler = Scheduler::with_config(config(2)).unwrap();
        let counter = Arc::new(AtomicUsize::new(0));

        for i in 0..10 {
            let counter = counter.clone();
            scheduler
                .add_task(Task::with_id(format!("task-{}", i), move || {
                    counter.fetch_add(1, Ordering::SeqCst);
                    Ok(())
                }))
                .unwrap();
        }

        assert!(wait_for(Duration::from_secs(5), || {
            counter.load(Ordering::SeqCst) == 10
        }));

        let stats = scheduler.stats();
        assert_eq!(stats.tasks_submitted, 10);
        assert_eq!(stats.tasks_dispatched, 10);
        assert_eq!(stats.workers.len(), 2);
    }

    #[test]
    fn test_invalid_level_is_rejected() {
        let scheduler = Scheduler::with_config(config(1)).unwrap();
        let task = Task::with_id("bad", || Ok(()));

        assert_eq!(
            scheduler.add_task_at(task, Priority::COUNT),
            Err(SchedulerError::InvalidPriority(Priority::COUNT))
        );
        assert_eq!(scheduler.stats().tasks_submitted, 0);
    }

    #[test]
    fn test_add_task_at_sets_priority() {
        let scheduler = Scheduler::with_config(config(1)).unwrap();
        let task: TaskRef = Arc::new(Task::with_id("parked", || Ok(())));

        scheduler.add_task_at(task.clone(), 7).unwrap();
        assert_eq!(task.priority(), Priority::Blocked);
        assert_eq!(scheduler.pending_tasks(), 1);
    }

    #[test]
    fn test_zero_interval_is_rejected() {
        let scheduler = Scheduler::with_config(config(1)).unwrap();
        let result = scheduler.schedule_task(Task::with_id("tick", || Ok(())), Duration::ZERO);
        assert_eq!(result, Err(SchedulerError::InvalidInterval));
        assert_eq!(scheduler.stats().periodic_tasks, 0);
    }

    #[test]
    fn test_reschedule_replaces_entry() {
        let clock = Arc::new(ManualClock::new());
        let scheduler = Scheduler::with_clock(config(1), clock).unwrap();

        scheduler
            .schedule_task(Task::with_id("tick", || Ok(())), Duration::from_secs(10))
            .unwrap();
        scheduler
            .schedule_task(Task::with_id("tick", || Ok(())), Duration::from_secs(20))
            .unwrap();

        assert_eq!(scheduler.stats().periodic_tasks, 1);
    }

    #[test]
    fn test_stop_all_is_idempotent() {
        let scheduler = Scheduler::with_config(config(2)).unwrap();
        assert!(scheduler.is_running());

        scheduler.stop_all();
        scheduler.stop_all();

        assert!(!scheduler.is_running());
        for snapshot in scheduler.worker_snapshots() {
            assert!(snapshot.current_task.is_none());
        }
        assert_eq!(
            scheduler.add_task(Task::new(|| Ok(()))),
            Err(SchedulerError::ShuttingDown)
        );
        // Drop runs stop_all a third time
    }

    #[test]
    fn test_invalid_config_is_rejected() {
        let mut bad = config(1);
        bad.thread_name_prefix = String::new();
        let err = Scheduler::with_config(bad).unwrap_err();
        assert!(matches!(err, tempo_core::Error::Config(_)));
    }
}
