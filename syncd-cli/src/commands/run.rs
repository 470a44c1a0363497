//! `sync-daemon`: run the daemon in the foreground.

use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::{ArgAction, Args};

use syncd_core::DEFAULT_CONFIG_PATH;
use syncd_daemon::{start_blocking, DaemonOptions};

#[derive(Args, Debug)]
pub struct RunArgs {
    /// Path to the YAML configuration file.
    #[arg(long, default_value = DEFAULT_CONFIG_PATH)]
    pub config: PathBuf,

    /// Re-read the configuration periodically and reschedule on change.
    #[arg(long, default_value_t = true, action = ArgAction::Set)]
    pub config_auto_reload: bool,

    /// Log filter used when RUST_LOG is not set.
    #[arg(long, default_value = "info")]
    pub log_level: String,
}

impl RunArgs {
    pub fn run(self) -> Result<()> {
        let options = DaemonOptions::new(self.config.clone(), self.config_auto_reload)
            .with_log_level(self.log_level);
        start_blocking(options)
            .with_context(|| format!("daemon exited with error (config {})", self.config.display()))
    }
}
