//! # Tempo Scheduler
//!
//! A priority-aware task scheduler backed by a pool of worker threads.
//!
//! Tasks are admitted into one of eight priority bins. A dedicated
//! dispatcher thread takes the most urgent task and hands it to an idle
//! worker, falling back to a shared overflow queue when every worker is
//! busy. Idle workers pull from the overflow queue and steal single tasks
//! from their siblings. Periodic tasks fire on a fixed cadence measured by
//! a pluggable [`Clock`](tempo_core::Clock).
//!
//! ## Crate Structure
//!
//! - **task**: Priorities and the task contract
//! - **message**: Control messages delivered to workers
//! - **queue**: The blocking per-worker message queue
//! - **worker**: Worker threads, the pool and work stealing
//! - **overflow**: Priority-ordered queue shared by busy workers
//! - **bins**: Per-priority FIFOs
//! - **periodic**: Registry of recurring tasks
//! - **delayed**: One-shot tasks held until a release time
//! - **scheduler**: The public scheduler handle
//! - **config**: Scheduler configuration
//! - **stats**: Statistics snapshots
//!
//! ```no_run
//! use std::time::Duration;
//! use tempo_scheduler::{Priority, Scheduler, Task};
//!
//! let scheduler = Scheduler::new()?;
//! scheduler.add_task(Task::new(|| Ok(())).with_priority(Priority::High))?;
//! scheduler.schedule_task(Task::with_id("heartbeat", || Ok(())), Duration::from_millis(250))?;
//! scheduler.stop_all();
//! # Ok::<(), tempo_core::Error>(())
//! ```

#![warn(missing_docs)]
#![warn(rust_2018_idioms)]

pub mod bins;
pub mod config;
pub mod delayed;
mod dispatcher;
pub mod message;
pub mod overflow;
pub mod periodic;
pub mod queue;
pub mod scheduler;
pub mod stats;
pub mod task;
pub mod worker;

// Re-export key types for convenience
pub use config::SchedulerConfig;
pub use message::{ControlMessage, MessageKind};
pub use scheduler::Scheduler;
pub use stats::SchedulerStats;
pub use task::{Priority, Task, TaskOutcome, TaskRef, TaskState};
pub use worker::{Assignment, WorkerSnapshot, WorkerStatus};
