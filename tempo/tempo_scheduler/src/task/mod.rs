//! Tasks and their priority model.
//!
//! A task is a body plus a small amount of synchronized state: priority,
//! lifecycle phase, paused flag and execution counters. Every mutator takes
//! the task's own lock; no global state is touched.

pub mod priority;
#[allow(clippy::module_inception)]
pub mod task;

pub use priority::Priority;
pub use task::{Task, TaskOutcome, TaskRef, TaskState};
