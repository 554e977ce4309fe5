//! `outagewatch run [--dry-run] [--no-push]`: one pipeline cycle.

use anyhow::{Context, Result};
use chrono::Utc;
use clap::Args;

use outagewatch_core::config;
use outagewatch_daemon::{summary, RunSummary};
use outagewatch_fetch::UreqSource;
use outagewatch_sync::pipeline::{self, RunOptions, RunOutcome, RunReport};

const TRIGGER: &str = "manual";

/// Arguments for `outagewatch run`.
#[derive(Args, Debug)]
pub struct RunArgs {
    /// Fetch, transform and diff; print the commit message and write nothing.
    #[arg(long)]
    pub dry_run: bool,

    /// Commit locally without pulling or pushing.
    #[arg(long)]
    pub no_push: bool,

    /// Override the configured locale.
    #[arg(long)]
    pub locale: Option<String>,
}

impl RunArgs {
    pub fn run(self) -> Result<()> {
        let home = crate::home()?;
        let mut cfg = config::load_at(&home).context("failed to load config")?;
        if let Some(locale) = self.locale {
            cfg.locale = locale;
        }

        let mut options = RunOptions::from_config(&cfg);
        options.dry_run = self.dry_run;
        if self.no_push {
            options.push = false;
        }

        let started_at = Utc::now();
        let result = pipeline::run(&home, &cfg, UreqSource::new(), options);

        let summary = match &result {
            Ok(report) => RunSummary::from_report(TRIGGER, report),
            Err(err) => RunSummary::failed(TRIGGER, started_at, err),
        };
        if !self.dry_run {
            summary::write_at(&home, &summary).context("failed to record run summary")?;
        }

        let report = result.context("run failed")?;
        print_report(&report);
        Ok(())
    }
}

fn print_report(report: &RunReport) {
    match &report.outcome {
        RunOutcome::DryRun => {
            println!("Dry run: {} outages fetched, nothing written.", report.features);
            println!();
            print!("{}", report.message);
        }
        RunOutcome::NoChange => {
            println!("✓ No changes ({} outages)", report.features);
        }
        RunOutcome::Committed { commit, pushed } => {
            let short = commit.get(..12).unwrap_or(commit);
            println!("✓ Committed {short}: {}", report.changes.subject());
            if *pushed {
                println!("  Pushed.");
            } else {
                println!("  Not pushed (push disabled).");
            }
        }
    }
}
