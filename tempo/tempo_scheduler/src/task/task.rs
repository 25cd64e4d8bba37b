//! The unit of work executed by workers.

use crossbeam_channel::{unbounded, Receiver};
use log::{error, trace};
use parking_lot::Mutex;
use serde::Serialize;
use std::any::Any;
use std::fmt;
use std::panic::{self, AssertUnwindSafe};
use std::sync::Arc;
use tempo_core::TaskId;

use super::priority::Priority;

/// Shared handle to a task. Bins, worker slots and the periodic registry
/// all hold the same instance; the caller keeps its own handle to observe it.
pub type TaskRef = Arc<Task>;

type TaskBody = Box<dyn FnMut() -> anyhow::Result<()> + Send + 'static>;

/// Observable lifecycle state of a task.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum TaskState {
    /// Waiting to be executed
    Pending,
    /// Currently executing on a worker
    Running,
    /// Flagged paused; future periodic firings are skipped
    Paused,
    /// Executed at least once, whether or not the body faulted
    Completed,
}

/// Result of a single execution.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TaskOutcome {
    /// The body returned normally
    Succeeded,
    /// The body returned an error or panicked; carries the message
    Faulted(String),
}

impl TaskOutcome {
    /// Whether the execution faulted.
    pub fn is_fault(&self) -> bool {
        matches!(self, Self::Faulted(_))
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Phase {
    Pending,
    Running,
    Completed,
}

#[derive(Debug)]
struct TaskStatus {
    priority: Priority,
    phase: Phase,
    paused: bool,
    runs: u64,
    faults: u64,
    last_fault: Option<String>,
}

/// A prioritized, pausable unit of work.
///
/// The body runs once per call to [`Task::execute`]. Periodic tasks are
/// the same instance executed repeatedly. Faults, whether returned errors or
/// panics, are caught at this boundary: they are logged, counted, and the
/// task still ends up `Completed`.
pub struct Task {
    id: TaskId,
    status: Mutex<TaskStatus>,
    body: Mutex<TaskBody>,
}

impl Task {
    /// Create a task with a generated identifier and `Normal` priority.
    pub fn new<F>(body: F) -> Self
    where
        F: FnMut() -> anyhow::Result<()> + Send + 'static,
    {
        Self::with_id(TaskId::new(), body)
    }

    /// Create a task with a caller-chosen identifier.
    pub fn with_id<F>(id: impl Into<TaskId>, body: F) -> Self
    where
        F: FnMut() -> anyhow::Result<()> + Send + 'static,
    {
        Self {
            id: id.into(),
            status: Mutex::new(TaskStatus {
                priority: Priority::default(),
                phase: Phase::Pending,
                paused: false,
                runs: 0,
                faults: 0,
                last_fault: None,
            }),
            body: Mutex::new(Box::new(body)),
        }
    }

    /// Create a task whose successful results are delivered on a channel.
    ///
    /// Every successful execution sends one value. Faulted executions send
    /// nothing. Dropping the receiver does not affect the task.
    pub fn with_output<T, F>(id: impl Into<TaskId>, mut body: F) -> (Self, Receiver<T>)
    where
        T: Send + 'static,
        F: FnMut() -> anyhow::Result<T> + Send + 'static,
    {
        let (sender, receiver) = unbounded();
        let task = Self::with_id(id, move || {
            let value = body()?;
            let _ = sender.send(value);
            Ok(())
        });
        (task, receiver)
    }

    /// Builder-style priority setter.
    pub fn with_priority(self, priority: Priority) -> Self {
        self.set_priority(priority);
        self
    }

    /// The task's identifier.
    pub fn id(&self) -> &TaskId {
        &self.id
    }

    /// Current priority.
    pub fn priority(&self) -> Priority {
        self.status.lock().priority
    }

    /// Change the priority. Takes effect at the next admission into a bin.
    pub fn set_priority(&self, priority: Priority) {
        self.status.lock().priority = priority;
    }

    /// Flag the task paused. Does not interrupt an execution in progress.
    pub fn pause(&self) {
        self.status.lock().paused = true;
    }

    /// Clear the paused flag.
    pub fn resume(&self) {
        self.status.lock().paused = false;
    }

    /// Whether the paused flag is set.
    pub fn is_paused(&self) -> bool {
        self.status.lock().paused
    }

    /// Whether the task has finished at least one execution.
    pub fn is_completed(&self) -> bool {
        self.status.lock().phase == Phase::Completed
    }

    /// Current lifecycle state. A running task reports `Running` even if
    /// it has been flagged paused in the meantime.
    pub fn state(&self) -> TaskState {
        let status = self.status.lock();
        match status.phase {
            Phase::Running => TaskState::Running,
            _ if status.paused => TaskState::Paused,
            Phase::Pending => TaskState::Pending,
            Phase::Completed => TaskState::Completed,
        }
    }

    /// Number of finished executions, faulted ones included.
    pub fn run_count(&self) -> u64 {
        self.status.lock().runs
    }

    /// Number of executions that faulted.
    pub fn fault_count(&self) -> u64 {
        self.status.lock().faults
    }

    /// Message of the most recent fault, if any.
    pub fn last_fault(&self) -> Option<String> {
        self.status.lock().last_fault.clone()
    }

    /// Run the body once.
    ///
    /// Concurrent calls on the same task are serialized on the body lock.
    pub fn execute(&self) -> TaskOutcome {
        self.status.lock().phase = Phase::Running;

        let result = {
            let mut guard = self.body.lock();
            let body = &mut *guard;
            panic::catch_unwind(AssertUnwindSafe(|| body()))
        };

        let outcome = match result {
            Ok(Ok(())) => TaskOutcome::Succeeded,
            Ok(Err(e)) => TaskOutcome::Faulted(format!("{:#}", e)),
            Err(payload) => TaskOutcome::Faulted(panic_message(payload.as_ref())),
        };

        let mut status = self.status.lock();
        status.phase = Phase::Completed;
        status.runs += 1;
        match &outcome {
            TaskOutcome::Succeeded => {
                trace!("Task {} completed (run {})", self.id, status.runs);
            }
            TaskOutcome::Faulted(message) => {
                error!("Error executing task {}: {}", self.id, message);
                status.faults += 1;
                status.last_fault = Some(message.clone());
            }
        }

        outcome
    }
}

impl fmt::Debug for Task {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Task")
            .field("id", &self.id)
            .field("priority", &self.priority())
            .field("state", &self.state())
            .finish()
    }
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(message) = payload.downcast_ref::<&str>() {
        format!("panicked: {}", message)
    } else if let Some(message) = payload.downcast_ref::<String>() {
        format!("panicked: {}", message)
    } else {
        "panicked: <unknown panic>".to_string()
    }
}
