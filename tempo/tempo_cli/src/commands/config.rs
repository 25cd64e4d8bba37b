//! The `config` command

use anyhow::Result;
use clap::Args;
use std::path::PathBuf;

/// Arguments for the config command
#[derive(Args)]
pub struct ConfigArgs {
    /// Path to a TOML configuration file
    #[clap(long)]
    pub config: Option<PathBuf>,
}

/// Print the configuration as TOML, followed by the resolved worker count.
pub fn execute(args: &ConfigArgs) -> Result<()> {
    let config = super::load_config(args.config.as_deref())?;

    print!("{}", config.to_toml_string()?);
    println!(
        "# effective worker threads: {}",
        config.effective_worker_threads()
    );
    Ok(())
}
