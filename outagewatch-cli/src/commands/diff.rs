//! `outagewatch diff <old> <new>`: compare two records files.

use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::Args;

use outagewatch_sync::diff::{diff, read_snapshot, unified_diff};

/// Arguments for `outagewatch diff`.
#[derive(Args, Debug)]
pub struct DiffArgs {
    /// Previous records file; a missing file counts as empty.
    pub old: PathBuf,

    pub new: PathBuf,

    /// Print a line diff of the files instead of the change summary.
    #[arg(long)]
    pub unified: bool,
}

impl DiffArgs {
    pub fn run(self) -> Result<()> {
        if self.unified {
            let text = unified_diff(&self.old, &self.new).context("diff failed")?;
            if text.is_empty() {
                println!("No differences.");
                return Ok(());
            }
            print!("{text}");
            if !text.ends_with('\n') {
                println!();
            }
            return Ok(());
        }

        let previous = read_snapshot(&self.old)
            .with_context(|| format!("cannot read '{}'", self.old.display()))?;
        let current = read_snapshot(&self.new)
            .with_context(|| format!("cannot read '{}'", self.new.display()))?
            .with_context(|| format!("'{}' does not exist", self.new.display()))?;

        let changes = diff(previous.as_ref(), &current).context("diff failed")?;
        print!("{}", changes.render());
        Ok(())
    }
}
