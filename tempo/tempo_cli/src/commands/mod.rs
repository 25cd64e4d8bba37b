//! Subcommand implementations

pub mod config;
pub mod priorities;
pub mod run;

use anyhow::{Context, Result};
use std::path::Path;
use tempo_scheduler::SchedulerConfig;

/// Load the configuration at `path`, or the defaults when no path is given.
pub fn load_config(path: Option<&Path>) -> Result<SchedulerConfig> {
    match path {
        Some(path) => SchedulerConfig::load(path)
            .with_context(|| format!("failed to load configuration from {}", path.display())),
        None => Ok(SchedulerConfig::default()),
    }
}
