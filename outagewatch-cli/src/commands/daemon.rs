//! `outagewatch daemon`: run the pipeline on an interval in the foreground.

use anyhow::{Context, Result};
use clap::Args;

use outagewatch_core::config;
use outagewatch_daemon::start_blocking;

/// Arguments for `outagewatch daemon`.
#[derive(Args, Debug)]
pub struct DaemonArgs {
    /// Override the configured interval.
    #[arg(long)]
    pub interval_minutes: Option<u64>,

    /// Commit locally without pulling or pushing.
    #[arg(long)]
    pub no_push: bool,
}

impl DaemonArgs {
    pub fn run(self) -> Result<()> {
        let home = crate::home()?;
        let mut cfg = config::load_at(&home).context("failed to load config")?;
        if let Some(minutes) = self.interval_minutes {
            cfg.interval_minutes = minutes;
        }
        if self.no_push {
            cfg.push = false;
        }

        println!(
            "Watching {}/{} every {} min. Ctrl-C to stop.",
            cfg.instance_id, cfg.view_id, cfg.interval_minutes
        );
        start_blocking(&home, cfg).context("daemon exited with error")?;
        Ok(())
    }
}
