//! Scheduler configuration.
//!
//! Every field has a default, so an empty TOML document is a valid
//! configuration.
//!
//! ```toml
//! worker_threads = 3
//! thread_name_prefix = "render-worker"
//! dispatch_poll_ms = 50
//! steal_backoff_ms = 10
//! collect_stats = true
//! ```

use log::info;
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;
use tempo_core::ConfigError;

use crate::worker::WorkerOptions;

/// Configuration for the scheduler
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SchedulerConfig {
    /// Number of worker threads; `None` uses hardware parallelism minus one
    pub worker_threads: Option<usize>,

    /// Name prefix for worker threads
    pub thread_name_prefix: String,

    /// Longest wait of a dispatcher pass that found nothing to dispatch
    pub dispatch_poll_ms: u64,

    /// Longest wait of a worker that found no work anywhere
    pub steal_backoff_ms: u64,

    /// Whether to collect execution statistics
    pub collect_stats: bool,
}

impl Default for SchedulerConfig {
    fn default() -> Self {
        Self {
            worker_threads: None,
            thread_name_prefix: "tempo-worker".to_string(),
            dispatch_poll_ms: 100,
            steal_backoff_ms: 10,
            collect_stats: true,
        }
    }
}

impl SchedulerConfig {
    /// Parse a configuration from TOML text and validate it.
    pub fn from_toml_str(source: &str) -> Result<Self, ConfigError> {
        let config: Self =
            toml::from_str(source).map_err(|e| ConfigError::Parse(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    /// Load a configuration from a TOML file.
    pub fn load(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        info!("Loading scheduler configuration from {}", path.display());

        let source = std::fs::read_to_string(path)
            .map_err(|e| ConfigError::Read(format!("{}: {}", path.display(), e)))?;
        Self::from_toml_str(&source)
    }

    /// Render the configuration as TOML.
    pub fn to_toml_string(&self) -> Result<String, ConfigError> {
        toml::to_string_pretty(self).map_err(|e| ConfigError::Render(e.to_string()))
    }

    /// Check that the values are usable.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.worker_threads == Some(0) {
            return Err(ConfigError::Invalid(
                "worker_threads must be at least 1".to_string(),
            ));
        }
        if self.thread_name_prefix.trim().is_empty() {
            return Err(ConfigError::Invalid(
                "thread_name_prefix must not be empty".to_string(),
            ));
        }
        if self.dispatch_poll_ms == 0 {
            return Err(ConfigError::Invalid(
                "dispatch_poll_ms must be greater than zero".to_string(),
            ));
        }
        if self.steal_backoff_ms == 0 {
            return Err(ConfigError::Invalid(
                "steal_backoff_ms must be greater than zero".to_string(),
            ));
        }
        Ok(())
    }

    /// Worker count after applying the hardware default. Never below one.
    pub fn effective_worker_threads(&self) -> usize {
        self.worker_threads
            .unwrap_or_else(|| num_cpus::get().saturating_sub(1))
            .max(1)
    }

    /// Bounded wait of an idle dispatcher pass.
    pub fn dispatch_poll(&self) -> Duration {
        Duration::from_millis(self.dispatch_poll_ms)
    }

    /// Bounded wait of an idle worker.
    pub fn steal_backoff(&self) -> Duration {
        Duration::from_millis(self.steal_backoff_ms)
    }

    pub(crate) fn worker_options(&self) -> WorkerOptions {
        WorkerOptions {
            thread_name_prefix: self.thread_name_prefix.clone(),
            steal_backoff: self.steal_backoff(),
        }
    }
}
