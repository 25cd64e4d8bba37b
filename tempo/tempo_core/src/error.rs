//! Error types for the Tempo scheduler.
//!
//! Errors are organized by subsystem. The root error type, `Error`, wraps
//! the subsystem errors so callers that drive several subsystems can use a
//! single `Result` type.

use crate::id::TaskId;
use thiserror::Error;

/// Root error type for Tempo.
#[derive(Debug, Error)]
pub enum Error {
    /// Scheduler admission and lifecycle errors
    #[error("Scheduler error: {0}")]
    Scheduler(#[from] SchedulerError),

    /// Configuration loading and validation errors
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    /// I/O errors
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// Errors surfaced by scheduler operations.
///
/// Every one of these is also logged at the point of detection, so callers
/// that treat the scheduler as fire-and-forget may discard them.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SchedulerError {
    /// The scheduler has been stopped and no longer admits work
    #[error("scheduler is shutting down")]
    ShuttingDown,

    /// A priority bin index outside the known levels
    #[error("invalid priority level: {0}")]
    InvalidPriority(usize),

    /// A periodic task was registered with a zero interval
    #[error("periodic interval must be greater than zero")]
    InvalidInterval,

    /// No task with the given identifier is known to the operation
    #[error("task not found: {0}")]
    TaskNotFound(TaskId),

    /// The task exists but is not parked in the blocked bin
    #[error("task is not blocked: {0}")]
    NotBlocked(TaskId),

    /// A worker or dispatcher thread could not be spawned
    #[error("failed to spawn thread: {0}")]
    WorkerSpawn(String),
}

/// Errors related to scheduler configuration.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ConfigError {
    /// The configuration source could not be read
    #[error("failed to read configuration: {0}")]
    Read(String),

    /// The configuration source is not valid TOML for the expected shape
    #[error("failed to parse configuration: {0}")]
    Parse(String),

    /// The configuration could not be rendered as TOML
    #[error("failed to render configuration: {0}")]
    Render(String),

    /// The configuration parsed but contains unusable values
    #[error("invalid configuration: {0}")]
    Invalid(String),
}

/// Result type used throughout Tempo.
pub type Result<T> = std::result::Result<T, Error>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_scheduler_error_wraps_into_root() {
        let err: Error = SchedulerError::TaskNotFound(TaskId::from("heartbeat")).into();
        assert_eq!(
            err.to_string(),
            "Scheduler error: task not found: heartbeat"
        );
    }

    #[test]
    fn test_config_error_display() {
        let err = ConfigError::Invalid("worker_threads must be at least 1".to_string());
        assert_eq!(
            err.to_string(),
            "invalid configuration: worker_threads must be at least 1"
        );

        let root: Error = err.into();
        assert!(matches!(root, Error::Config(ConfigError::Invalid(_))));

        let render = ConfigError::Render("unsupported value".to_string());
        assert_eq!(
            render.to_string(),
            "failed to render configuration: unsupported value"
        );
    }

    #[test]
    fn test_io_error_conversion() {
        let io = std::io::Error::new(std::io::ErrorKind::NotFound, "missing");
        let err: Error = io.into();
        assert!(matches!(err, Error::Io(_)));
    }
}
