//! `outagewatch status`: configured feed and last-run visibility.

use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use clap::Args;
use colored::Colorize;
use serde::Serialize;
use tabled::{settings::Style, Table, Tabled};

use outagewatch_core::{config, WatchConfig};
use outagewatch_daemon::{summary, RunStatus, RunSummary};

/// Arguments for `outagewatch status`.
#[derive(Args, Debug)]
pub struct StatusArgs {
    /// Emit machine-readable JSON.
    #[arg(long)]
    pub json: bool,
}

impl StatusArgs {
    pub fn run(self) -> Result<()> {
        let home = crate::home()?;
        let cfg = config::load_at(&home).context("failed to load config")?;
        let last_run = summary::read_at(&home).context("failed to read last run summary")?;

        if self.json {
            print_json(&cfg, last_run.as_ref())?;
            return Ok(());
        }
        print_table(&cfg, last_run.as_ref());
        Ok(())
    }
}

#[derive(Serialize)]
struct StatusJson<'a> {
    instance_id: &'a str,
    view_id: &'a str,
    repo: String,
    remote: &'a str,
    branch: &'a str,
    interval_minutes: u64,
    push: bool,
    last_run: Option<&'a RunSummary>,
    last_run_age: Option<String>,
}

#[derive(Tabled)]
struct LastRunRow {
    #[tabled(rename = "status")]
    status: String,
    #[tabled(rename = "trigger")]
    trigger: String,
    #[tabled(rename = "changes")]
    changes: String,
    #[tabled(rename = "outages")]
    features: usize,
    #[tabled(rename = "duration")]
    duration: String,
    #[tabled(rename = "finished")]
    finished: String,
}

fn print_json(cfg: &WatchConfig, last_run: Option<&RunSummary>) -> Result<()> {
    let payload = StatusJson {
        instance_id: &cfg.instance_id.0,
        view_id: &cfg.view_id.0,
        repo: cfg.repo.display().to_string(),
        remote: &cfg.remote,
        branch: &cfg.branch,
        interval_minutes: cfg.interval_minutes,
        push: cfg.push,
        last_run,
        last_run_age: last_run.map(|run| format_age(run.finished_at, Utc::now())),
    };
    println!(
        "{}",
        serde_json::to_string_pretty(&payload).context("failed to serialize status JSON")?
    );
    Ok(())
}

fn print_table(cfg: &WatchConfig, last_run: Option<&RunSummary>) {
    println!(
        "outagewatch v{} | {}/{} | every {} min",
        env!("CARGO_PKG_VERSION"),
        cfg.instance_id,
        cfg.view_id,
        cfg.interval_minutes,
    );
    let target = if cfg.push {
        format!("{} {}/{}", cfg.repo.display(), cfg.remote, cfg.branch)
    } else {
        format!("{} (push disabled)", cfg.repo.display())
    };
    println!("Repository: {target}");

    let Some(run) = last_run else {
        println!("No runs recorded yet.");
        return;
    };

    let row = LastRunRow {
        status: format!("{} {}", status_indicator(run.status), run.status.as_str()),
        trigger: run.trigger.clone(),
        changes: format!("+{} -{} ~{}", run.added, run.removed, run.changed),
        features: run.features,
        duration: format!("{:.1}s", run.duration_ms as f64 / 1000.0),
        finished: format!("{} ago", format_age(run.finished_at, Utc::now())),
    };
    let mut table = Table::new(vec![row]);
    table.with(Style::rounded());
    println!("{table}");

    if let Some(commit) = &run.commit {
        println!("Commit: {commit}{}", if run.pushed { " (pushed)" } else { "" });
    }
    if let Some(error) = &run.error {
        println!("{} {error}", "Error:".red().bold());
    }
}

fn status_indicator(status: RunStatus) -> String {
    match status {
        RunStatus::Committed => "■".green().bold().to_string(),
        RunStatus::NoChange => "■".bright_black().bold().to_string(),
        RunStatus::DryRun => "■".yellow().bold().to_string(),
        RunStatus::Failed => "■".red().bold().to_string(),
    }
}

fn format_age(timestamp: DateTime<Utc>, now: DateTime<Utc>) -> String {
    let seconds = now.signed_duration_since(timestamp).num_seconds().max(0);
    if seconds < 60 {
        return format!("{seconds}s");
    }
    if seconds < 60 * 60 {
        return format!("{}m", seconds / 60);
    }
    if seconds < 60 * 60 * 24 {
        return format!("{}h", seconds / (60 * 60));
    }
    format!("{}d", seconds / (60 * 60 * 24))
}
