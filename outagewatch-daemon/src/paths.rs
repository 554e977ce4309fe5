use std::path::{Path, PathBuf};
use std::time::Duration;

pub const LAST_RUN_FILE: &str = "last_run.json";

pub fn outagewatch_root(home: &Path) -> PathBuf {
    home.join(".outagewatch")
}

pub fn run_dir(home: &Path) -> PathBuf {
    outagewatch_root(home).join("run")
}

pub fn last_run_path(home: &Path) -> PathBuf {
    run_dir(home).join(LAST_RUN_FILE)
}

/// Scheduler period for a configured interval in minutes.
pub fn interval(minutes: u64) -> Duration {
    Duration::from_secs(minutes.max(1) * 60)
}
