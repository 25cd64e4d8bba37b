//! `tempo` command-line interface.

use anyhow::Result;
use clap::{Parser, Subcommand};
use tracing_subscriber::EnvFilter;

mod commands;

use commands::config::ConfigArgs;
use commands::run::RunArgs;

/// Tempo task scheduler
#[derive(Parser)]
#[clap(author, version, about)]
struct Cli {
    /// Log filter, e.g. `info` or `tempo_scheduler=debug` (defaults to RUST_LOG, then `warn`)
    #[clap(long, global = true)]
    log_level: Option<String>,

    #[clap(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run a demo workload and report scheduler statistics
    Run(RunArgs),

    /// Print the effective scheduler configuration
    Config(ConfigArgs),

    /// List priority levels in dispatch order
    Priorities,
}

fn init_logging(level: Option<&str>) {
    let filter = match level {
        Some(level) => EnvFilter::new(level),
        None => EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")),
    };

    // Scheduler crates log through `log`; the subscriber picks those records up too
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    init_logging(cli.log_level.as_deref());

    match cli.command {
        Commands::Run(args) => commands::run::execute(&args),
        Commands::Config(args) => commands::config::execute(&args),
        Commands::Priorities => {
            commands::priorities::execute();
            Ok(())
        }
    }
}
