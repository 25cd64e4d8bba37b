//! # Tempo Core
//!
//! `tempo_core` provides the shared vocabulary of the Tempo task scheduler:
//! error types, identifier types and the clock collaborator used for
//! periodic due-time calculations.
//!
//! ## Crate Structure
//!
//! - **error**: Root error type and subsystem errors
//! - **id**: Strongly-typed identifiers for tasks and workers
//! - **clock**: The `Clock` trait plus a real and a simulated implementation

#![warn(missing_docs)]
#![warn(rust_2018_idioms)]

pub mod clock;
pub mod error;
pub mod id;

// Re-export key types for convenience
pub use clock::{Clock, ManualClock, Stopwatch};
pub use error::{ConfigError, Error, Result, SchedulerError};
pub use id::{TaskId, WorkerId};
