//! outagewatch: track a Kubra outage map in a git repository.
//!
//! # Usage
//!
//! ```text
//! outagewatch init --instance <id> --view <id> --repo <path> [--remote ..] [--branch ..] [--force]
//! outagewatch fetch [--instance <id> --view <id>] [--raw]
//! outagewatch transform <geojson> [--locale EN-US]
//! outagewatch diff <old.json> <new.json> [--unified]
//! outagewatch run [--dry-run] [--no-push]
//! outagewatch daemon [--interval-minutes N]
//! outagewatch status [--json]
//! ```

mod commands;

use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};

use commands::{
    daemon::DaemonArgs, diff::DiffArgs, fetch::FetchArgs, init::InitArgs, run::RunArgs,
    status::StatusArgs, transform::TransformArgs,
};

// ---------------------------------------------------------------------------
// CLI entry point
// ---------------------------------------------------------------------------

#[derive(Parser, Debug)]
#[command(
    name = "outagewatch",
    version,
    about = "Scrape a Kubra outage map, diff it, and commit the changes to git",
    long_about = None,
)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Write ~/.outagewatch/config.yaml for a feed and data repository.
    Init(InitArgs),

    /// Scrape the feed and print it as GeoJSON.
    Fetch(FetchArgs),

    /// Flatten a GeoJSON file into outage records.
    Transform(TransformArgs),

    /// Compare two records files.
    Diff(DiffArgs),

    /// Fetch, transform, diff and commit once.
    Run(RunArgs),

    /// Run the pipeline on a fixed interval until interrupted.
    Daemon(DaemonArgs),

    /// Show the configured feed and the last run.
    Status(StatusArgs),
}

pub(crate) fn home() -> Result<PathBuf> {
    outagewatch_core::config::home().context("could not determine home directory")
}

// ---------------------------------------------------------------------------
// Main
// ---------------------------------------------------------------------------

fn main() -> Result<()> {
    let cli = Cli::parse();
    match cli.command {
        Commands::Init(args) => args.run(),
        Commands::Fetch(args) => {
            outagewatch_daemon::init_tracing();
            args.run()
        }
        Commands::Transform(args) => args.run(),
        Commands::Diff(args) => args.run(),
        Commands::Run(args) => {
            outagewatch_daemon::init_tracing();
            args.run()
        }
        Commands::Daemon(args) => {
            outagewatch_daemon::init_tracing();
            args.run()
        }
        Commands::Status(args) => args.run(),
    }
}
