//! Worker threads and the pool they share.
//!
//! Each worker owns a [`WorkerQueue`] and executes one task at a time on
//! its dedicated thread. When its own queue is empty it pulls from the
//! pool's global overflow queue, then tries to steal a single task from a
//! sibling's queue, and only then waits (bounded) for new messages.

use log::{debug, info, trace};
use parking_lot::Mutex;
use serde::Serialize;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::Duration;
use tempo_core::{TaskId, WorkerId};

use crate::message::ControlMessage;
use crate::overflow::OverflowQueue;
use crate::queue::WorkerQueue;
use crate::task::TaskRef;

/// Lifecycle status reported by a worker.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum WorkerStatus {
    /// Idle and available for assignment
    Pooling,
    /// Executing a task, or reserved for one that was just assigned
    Running,
    /// Not pulling new work until resumed
    Paused,
    /// Stop was signaled; the thread is exiting or has exited
    Stopping,
}

/// Where a worker obtained the task it is executing.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum TaskSource {
    Local,
    Overflow,
    Stolen,
}

/// Point-in-time view of a worker
#[derive(Debug, Clone, Serialize)]
pub struct WorkerSnapshot {
    /// Worker identifier
    pub id: WorkerId,

    /// Reported status
    pub status: WorkerStatus,

    /// Task occupying the current-task slot, if any
    pub current_task: Option<TaskId>,

    /// Tasks waiting in the worker's own queue
    pub queued: usize,

    /// Executions finished on this worker
    pub tasks_executed: u64,

    /// Executions on this worker that faulted
    pub tasks_faulted: u64,

    /// Tasks taken from a sibling's queue
    pub tasks_stolen: u64,

    /// Tasks taken from the global overflow queue
    pub tasks_from_overflow: u64,
}

#[derive(Debug, Default)]
struct WorkerCounters {
    executed: AtomicU64,
    faulted: AtomicU64,
    stolen: AtomicU64,
    from_overflow: AtomicU64,
}

#[derive(Debug)]
struct WorkerState {
    status: WorkerStatus,
    paused: bool,
}

/// State of one worker shared between its thread, the dispatcher and its
/// siblings.
#[derive(Debug)]
pub struct Worker {
    id: WorkerId,
    queue: WorkerQueue,
    state: Mutex<WorkerState>,
    current: Mutex<Option<TaskRef>>,
    stop_flag: AtomicBool,
    collect_stats: bool,
    counters: WorkerCounters,
}

impl Worker {
    fn new(id: WorkerId, collect_stats: bool) -> Self {
        Self {
            id,
            queue: WorkerQueue::new(),
            state: Mutex::new(WorkerState {
                status: WorkerStatus::Pooling,
                paused: false,
            }),
            current: Mutex::new(None),
            stop_flag: AtomicBool::new(false),
            collect_stats,
            counters: WorkerCounters::default(),
        }
    }

    /// The worker's identifier.
    pub fn id(&self) -> WorkerId {
        self.id
    }

    /// The worker's reported status.
    pub fn status(&self) -> WorkerStatus {
        self.state.lock().status
    }

    /// The worker's private message queue.
    pub fn queue(&self) -> &WorkerQueue {
        &self.queue
    }

    /// Identifier of the task currently executing, if any.
    pub fn current_task(&self) -> Option<TaskId> {
        self.current.lock().as_ref().map(|task| task.id().clone())
    }

    /// Deliver a control message to this worker.
    pub fn post(&self, message: ControlMessage) {
        self.queue.push(message);
    }

    /// Hand `task` to this worker if it is idle.
    ///
    /// The status check and the enqueue happen under the worker's state
    /// lock, so an idle worker is claimed by at most one assignment. The
    /// task is handed back when the worker is not idle.
    pub fn try_assign(&self, task: TaskRef) -> Result<(), TaskRef> {
        let mut state = self.state.lock();
        if state.status != WorkerStatus::Pooling || state.paused || self.stop_requested() {
            return Err(task);
        }
        state.status = WorkerStatus::Running;
        self.queue.push(ControlMessage::Run(task));
        Ok(())
    }

    /// Ask the worker thread to exit. Pending messages are not executed.
    pub fn signal_stop(&self) {
        self.stop_flag.store(true, Ordering::SeqCst);
        self.state.lock().status = WorkerStatus::Stopping;
        self.queue.push(ControlMessage::Stop);
    }

    /// Whether stop has been signaled.
    pub fn stop_requested(&self) -> bool {
        self.stop_flag.load(Ordering::SeqCst)
    }

    /// Capture the worker's current state and counters.
    pub fn snapshot(&self) -> WorkerSnapshot {
        WorkerSnapshot {
            id: self.id,
            status: self.status(),
            current_task: self.current_task(),
            queued: self.queue.task_count(),
            tasks_executed: self.counters.executed.load(Ordering::Relaxed),
            tasks_faulted: self.counters.faulted.load(Ordering::Relaxed),
            tasks_stolen: self.counters.stolen.load(Ordering::Relaxed),
            tasks_from_overflow: self.counters.from_overflow.load(Ordering::Relaxed),
        }
    }

    fn is_paused(&self) -> bool {
        self.state.lock().paused
    }

    fn set_paused(&self, paused: bool) {
        let mut state = self.state.lock();
        state.paused = paused;
        if state.status != WorkerStatus::Stopping {
            state.status = if paused {
                WorkerStatus::Paused
            } else {
                WorkerStatus::Pooling
            };
        }
    }

    /// Return to `Pooling` when nothing is queued. Clears a reservation made
    /// by `try_assign` whose task was stolen before this worker reached it.
    fn mark_idle(&self) {
        let mut state = self.state.lock();
        if state.status == WorkerStatus::Running && !state.paused && self.queue.is_empty() {
            state.status = WorkerStatus::Pooling;
        }
    }

    /// Handle one message from the worker's own queue. Returns `false` when
    /// the loop must exit.
    fn handle(&self, message: ControlMessage) -> bool {
        match message {
            ControlMessage::Stop => return false,
            // Stop was signaled after this task was queued ahead of it
            ControlMessage::Run(_) if self.stop_requested() => return false,
            ControlMessage::Pause => {
                debug!("Worker {}: Paused", self.id);
                self.set_paused(true);
            }
            ControlMessage::Resume | ControlMessage::Pool => {
                if self.is_paused() {
                    debug!("Worker {}: Resumed", self.id);
                }
                self.set_paused(false);
            }
            ControlMessage::Run(task) => self.run_task(task, TaskSource::Local),
        }
        true
    }

    fn run_task(&self, task: TaskRef, source: TaskSource) {
        {
            let mut current = self.current.lock();
            debug_assert!(current.is_none(), "worker slot already occupied");
            *current = Some(task.clone());
        }
        {
            let mut state = self.state.lock();
            if state.status != WorkerStatus::Stopping {
                state.status = WorkerStatus::Running;
            }
        }

        trace!("Worker {}: Executing task {} ({:?})", self.id, task.id(), source);
        let outcome = task.execute();

        *self.current.lock() = None;
        {
            let mut state = self.state.lock();
            if state.status != WorkerStatus::Stopping {
                state.status = if state.paused {
                    WorkerStatus::Paused
                } else {
                    WorkerStatus::Pooling
                };
            }
        }

        if self.collect_stats {
            self.counters.executed.fetch_add(1, Ordering::Relaxed);
            if outcome.is_fault() {
                self.counters.faulted.fetch_add(1, Ordering::Relaxed);
            }
            match source {
                TaskSource::Stolen => {
                    self.counters.stolen.fetch_add(1, Ordering::Relaxed);
                }
                TaskSource::Overflow => {
                    self.counters.from_overflow.fetch_add(1, Ordering::Relaxed);
                }
                TaskSource::Local => {}
            }
        }

        debug!(
            "Worker {}: Task {} executed, returning to pool",
            self.id,
            task.id()
        );
    }
}

/// Outcome of offering a task to the pool.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Assignment {
    /// Queued on an idle worker
    Worker(WorkerId),
    /// No worker was idle; pushed to the global overflow queue
    Overflow,
}

/// Options for spawning worker threads
#[derive(Debug, Clone)]
pub struct WorkerOptions {
    /// Name prefix for worker threads
    pub thread_name_prefix: String,

    /// Bounded wait of a worker that found no work anywhere
    pub steal_backoff: Duration,
}

/// The set of workers plus the global overflow queue they share.
#[derive(Debug)]
pub struct WorkerPool {
    workers: Vec<Arc<Worker>>,
    overflow: OverflowQueue,
}

impl WorkerPool {
    /// Create `count` workers (at least one). Threads are spawned separately
    /// with [`WorkerPool::spawn`].
    pub fn new(count: usize, collect_stats: bool) -> Self {
        let workers = (0..count.max(1))
            .map(|index| Arc::new(Worker::new(WorkerId::new(index), collect_stats)))
            .collect();

        Self {
            workers,
            overflow: OverflowQueue::new(),
        }
    }

    /// All workers in index order.
    pub fn workers(&self) -> &[Arc<Worker>] {
        &self.workers
    }

    /// Number of workers.
    pub fn len(&self) -> usize {
        self.workers.len()
    }

    /// Always false; a pool has at least one worker.
    pub fn is_empty(&self) -> bool {
        self.workers.is_empty()
    }

    /// Give `task` to the first idle worker, or to the overflow queue when
    /// every worker is busy.
    ///
    /// While tasks wait in the overflow queue new tasks join them there, so
    /// a worker that frees up always starts the most urgent one.
    pub fn assign(&self, task: TaskRef) -> Assignment {
        let mut task = task;
        if self.overflow.is_empty() {
            for worker in &self.workers {
                match worker.try_assign(task) {
                    Ok(()) => return Assignment::Worker(worker.id()),
                    Err(returned) => task = returned,
                }
            }
        }
        self.push_overflow(task);
        Assignment::Overflow
    }

    /// Add a task to the global overflow queue.
    pub fn push_overflow(&self, task: TaskRef) {
        self.overflow.push(task);
    }

    /// Number of tasks waiting in the overflow queue.
    pub fn overflow_len(&self) -> usize {
        self.overflow.len()
    }

    /// Discard everything in the overflow queue, returning the count.
    pub fn drain_overflow(&self) -> usize {
        self.overflow.clear()
    }

    /// Send a copy of `message` to every worker.
    pub fn broadcast(&self, message: &ControlMessage) {
        for worker in &self.workers {
            worker.post(message.clone());
        }
    }

    /// Work for an idle worker: the overflow queue first, then a single task
    /// stolen from the first sibling with one queued, scanning from the
    /// thief's right-hand neighbour. A worker that has been told to stop
    /// gets nothing.
    pub(crate) fn next_shared_task(&self, thief: &Worker) -> Option<(TaskRef, TaskSource)> {
        if thief.stop_requested() {
            return None;
        }
        if let Some(task) = self.overflow.pop() {
            return Some((task, TaskSource::Overflow));
        }

        let count = self.workers.len();
        (1..count)
            .map(|offset| &self.workers[(thief.id.index() + offset) % count])
            .find_map(|sibling| sibling.queue.steal_task())
            .map(|task| {
                trace!("Worker {}: Stole task {}", thief.id, task.id());
                (task, TaskSource::Stolen)
            })
    }

    /// Spawn the thread for the worker at `index`.
    pub fn spawn(
        self: &Arc<Self>,
        index: usize,
        options: &WorkerOptions,
    ) -> std::io::Result<JoinHandle<()>> {
        let pool = Arc::clone(self);
        let worker = Arc::clone(&self.workers[index]);
        let backoff = options.steal_backoff;

        thread::Builder::new()
            .name(format!("{}-{}", options.thread_name_prefix, index))
            .spawn(move || worker_loop(&pool, &worker, backoff))
    }
}

/// Worker thread main loop
fn worker_loop(pool: &WorkerPool, worker: &Worker, backoff: Duration) {
    debug!("Worker {}: Starting", worker.id);

    loop {
        if worker.stop_requested() {
            break;
        }

        if worker.is_paused() {
            // Only control messages are consumed while paused
            if let Some(message) = worker.queue.pop_control(backoff) {
                if !worker.handle(message) {
                    break;
                }
            }
            continue;
        }

        if let Some(message) = worker.queue.try_pop() {
            if !worker.handle(message) {
                break;
            }
            continue;
        }

        if let Some((task, source)) = pool.next_shared_task(worker) {
            worker.run_task(task, source);
            continue;
        }

        worker.mark_idle();
        if let Some(message) = worker.queue.pop_timeout(backoff) {
            if !worker.handle(message) {
                break;
            }
        }
    }

    worker.state.lock().status = WorkerStatus::Stopping;
    info!("Worker {}: Shutting down", worker.id);
}
