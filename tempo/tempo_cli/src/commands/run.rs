//! The `run` command
//!
//! Submits a batch of short one-shot tasks spread across the dispatchable
//! priority levels, optionally registers a periodic heartbeat, lets the
//! scheduler work for a while and then prints its statistics.

use anyhow::{bail, Context, Result};
use clap::Args;
use std::path::PathBuf;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::thread;
use std::time::Duration;
use tempo_scheduler::{Priority, Scheduler, SchedulerStats, Task};
use tracing::info;

/// Arguments for the run command
#[derive(Args)]
pub struct RunArgs {
    /// Path to a TOML configuration file
    #[clap(long)]
    pub config: Option<PathBuf>,

    /// Number of one-shot tasks to submit
    #[clap(long, default_value_t = 20)]
    pub tasks: usize,

    /// Register a periodic heartbeat firing every MS milliseconds
    #[clap(long, value_name = "MS")]
    pub periodic_ms: Option<u64>,

    /// How long to let the scheduler run before stopping it
    #[clap(long, value_name = "MS", default_value_t = 500)]
    pub duration_ms: u64,

    /// Make every K-th task fail
    #[clap(long, value_name = "K")]
    pub fail_every: Option<usize>,

    /// Print statistics as JSON
    #[clap(long)]
    pub json: bool,
}

/// Run the demo workload.
pub fn execute(args: &RunArgs) -> Result<()> {
    if args.fail_every == Some(0) {
        bail!("--fail-every must be at least 1");
    }
    if args.periodic_ms == Some(0) {
        bail!("--periodic-ms must be at least 1");
    }

    let config = super::load_config(args.config.as_deref())?;
    let scheduler = Scheduler::with_config(config).context("failed to start scheduler")?;
    info!(
        workers = scheduler.worker_count(),
        tasks = args.tasks,
        "running demo workload"
    );

    let heartbeats = Arc::new(AtomicU64::new(0));
    if let Some(period) = args.periodic_ms {
        let heartbeats = heartbeats.clone();
        scheduler.schedule_task(
            Task::with_id("heartbeat", move || {
                heartbeats.fetch_add(1, Ordering::Relaxed);
                Ok(())
            }),
            Duration::from_millis(period),
        )?;
    }

    let levels: Vec<Priority> = Priority::ALL
        .into_iter()
        .filter(|p| p.is_dispatchable())
        .collect();
    let tasks = (0..args.tasks).map(|i| {
        let fails = args.fail_every.is_some_and(|k| (i + 1) % k == 0);
        Task::with_id(format!("demo-{}", i), move || {
            thread::sleep(Duration::from_millis(1));
            if fails {
                bail!("demo task {} failed on purpose", i);
            }
            Ok(())
        })
        .with_priority(levels[i % levels.len()])
    });
    scheduler.add_tasks(tasks)?;

    thread::sleep(Duration::from_millis(args.duration_ms));
    scheduler.stop_all();

    let stats = scheduler.stats();
    info!(
        heartbeats = heartbeats.load(Ordering::Relaxed),
        elapsed = ?scheduler.clock().total_elapsed(),
        "demo workload finished"
    );

    if args.json {
        println!("{}", serde_json::to_string_pretty(&stats)?);
    } else {
        print_stats(&stats);
    }
    Ok(())
}

fn print_stats(stats: &SchedulerStats) {
    println!("Scheduler statistics");
    println!("  tasks submitted:   {}", stats.tasks_submitted);
    println!("  tasks dispatched:  {}", stats.tasks_dispatched);
    println!("  tasks overflowed:  {}", stats.tasks_overflowed);
    println!("  periodic firings:  {}", stats.periodic_fired);
    println!("  tasks executed:    {}", stats.tasks_executed);
    println!("  tasks faulted:     {}", stats.tasks_faulted);
    println!("  tasks stolen:      {}", stats.tasks_stolen);
    println!("Workers");
    for worker in &stats.workers {
        println!(
            "  {:<10} executed={} faulted={} stolen={} from_overflow={}",
            worker.id.to_string(),
            worker.tasks_executed,
            worker.tasks_faulted,
            worker.tasks_stolen,
            worker.tasks_from_overflow
        );
    }
}
