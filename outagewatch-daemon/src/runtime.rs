use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use tokio::sync::{broadcast, mpsc};
use tokio::time::{Instant, MissedTickBehavior};

use outagewatch_core::WatchConfig;
use outagewatch_fetch::UreqSource;
use outagewatch_sync::pipeline::{self, RunOptions};
use outagewatch_sync::{RunReport, SyncError};

use crate::error::{io_err, DaemonError};
use crate::paths::{interval, run_dir};
use crate::summary::{self, RunSummary};

/// One pipeline run. Called on a blocking thread.
pub type Runner = Arc<dyn Fn() -> Result<RunReport, SyncError> + Send + Sync>;

#[derive(Debug)]
pub(crate) struct RunJob {
    pub(crate) trigger: &'static str,
}

/// Start the scheduler for `config` and block the current thread until it
/// exits (ctrl-c).
pub fn start_blocking(home: &Path, config: WatchConfig) -> Result<(), DaemonError> {
    config.validate()?;
    let period = interval(config.interval_minutes);
    let runner = pipeline_runner(home.to_path_buf(), config);

    let runtime = tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()
        .map_err(|e| io_err("tokio-runtime", e))?;
    runtime.block_on(run(home.to_path_buf(), period, runner))
}

/// The production runner: fetch over HTTP and publish per `config`.
pub fn pipeline_runner(home: PathBuf, config: WatchConfig) -> Runner {
    let source = UreqSource::new();
    let options = RunOptions::from_config(&config);
    Arc::new(move || pipeline::run(&home, &config, &source, options))
}

/// Run the scheduler until ctrl-c.
pub async fn run(home: PathBuf, period: Duration, runner: Runner) -> Result<(), DaemonError> {
    let (shutdown_tx, _) = broadcast::channel::<()>(16);
    run_with_shutdown(home, period, runner, shutdown_tx).await
}

/// Run the scheduler until something is sent on `shutdown`.
///
/// Three tasks: a ticker that requests a run every `period` (the first one
/// immediately), a single processor that executes runs one at a time, and a
/// ctrl-c handler. Any task ending brings the others down.
pub async fn run_with_shutdown(
    home: PathBuf,
    period: Duration,
    runner: Runner,
    shutdown: broadcast::Sender<()>,
) -> Result<(), DaemonError> {
    ensure_runtime_dirs(&home)?;
    tracing::info!(
        "outagewatch daemon started, running every {} min",
        period.as_secs() / 60
    );

    let (job_tx, job_rx) = mpsc::channel::<RunJob>(1);

    let ticker_handle = {
        let shutdown = shutdown.clone();
        let shutdown_rx = shutdown.subscribe();
        tokio::spawn(async move {
            let result = ticker_task(period, job_tx, shutdown_rx).await;
            let _ = shutdown.send(());
            result
        })
    };

    let processor_handle = {
        let shutdown = shutdown.clone();
        let shutdown_rx = shutdown.subscribe();
        tokio::spawn(async move {
            let result = processor_task(home, runner, job_rx, shutdown_rx).await;
            let _ = shutdown.send(());
            result
        })
    };

    let signal_handle = {
        let shutdown = shutdown.clone();
        let mut shutdown_rx = shutdown.subscribe();
        tokio::spawn(async move {
            tokio::select! {
                _ = shutdown_rx.recv() => Ok(()),
                signal = tokio::signal::ctrl_c() => {
                    match signal {
                        Ok(()) => {
                            tracing::info!("received ctrl-c, shutting down daemon");
                            let _ = shutdown.send(());
                            Ok(())
                        }
                        Err(err) => Err(DaemonError::Task {
                            task: "signal_handler",
                            reason: format!("ctrl-c handler failed: {err}"),
                        }),
                    }
                }
            }
        })
    };

    let (ticker_result, processor_result, signal_result) =
        tokio::join!(ticker_handle, processor_handle, signal_handle);

    handle_join("ticker", ticker_result)?;
    handle_join("processor", processor_result)?;
    handle_join("signal_handler", signal_result)?;
    tracing::info!("outagewatch daemon stopped");
    Ok(())
}

pub(crate) async fn ticker_task(
    period: Duration,
    job_tx: mpsc::Sender<RunJob>,
    mut shutdown_rx: broadcast::Receiver<()>,
) -> Result<(), DaemonError> {
    let mut ticker = tokio::time::interval_at(Instant::now(), period);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);
    let mut trigger = "startup";

    loop {
        tokio::select! {
            _ = shutdown_rx.recv() => break,
            _ = ticker.tick() => {
                match job_tx.try_send(RunJob { trigger }) {
                    Ok(()) => {}
                    Err(mpsc::error::TrySendError::Full(_)) => {
                        tracing::warn!("previous run still in progress, skipping this tick");
                    }
                    Err(mpsc::error::TrySendError::Closed(_)) => {
                        return Err(DaemonError::ChannelClosed("run jobs"));
                    }
                }
                trigger = "interval";
            }
        }
    }
    Ok(())
}

/// The only task that runs the pipeline, so publishes never overlap.
pub(crate) async fn processor_task(
    home: PathBuf,
    runner: Runner,
    mut job_rx: mpsc::Receiver<RunJob>,
    mut shutdown_rx: broadcast::Receiver<()>,
) -> Result<(), DaemonError> {
    loop {
        tokio::select! {
            _ = shutdown_rx.recv() => break,
            maybe_job = job_rx.recv() => {
                let Some(job) = maybe_job else { break };
                let started_at = Utc::now();
                let runner = runner.clone();
                let result = tokio::task::spawn_blocking(move || runner()).await;

                let summary = match result {
                    Ok(Ok(report)) => {
                        let summary = RunSummary::from_report(job.trigger, &report);
                        tracing::info!(
                            trigger = job.trigger,
                            status = summary.status.as_str(),
                            added = summary.added,
                            removed = summary.removed,
                            changed = summary.changed,
                            duration_ms = summary.duration_ms,
                            "run finished"
                        );
                        summary
                    }
                    Ok(Err(err)) => {
                        tracing::error!(trigger = job.trigger, "run failed: {err}");
                        RunSummary::failed(job.trigger, started_at, &err)
                    }
                    Err(err) => {
                        tracing::error!(trigger = job.trigger, "run task join error: {err}");
                        RunSummary::failed(job.trigger, started_at, &err)
                    }
                };

                if let Err(err) = summary::write_at(&home, &summary) {
                    tracing::warn!("could not record run summary: {err}");
                }
            }
        }
    }

    Ok(())
}

fn ensure_runtime_dirs(home: &Path) -> Result<(), DaemonError> {
    let run = run_dir(home);
    if !run.exists() {
        std::fs::create_dir_all(&run).map_err(|e| io_err(&run, e))?;
    }
    Ok(())
}

fn handle_join(
    task: &'static str,
    result: Result<Result<(), DaemonError>, tokio::task::JoinError>,
) -> Result<(), DaemonError> {
    match result {
        Ok(inner) => inner,
        Err(err) => Err(DaemonError::Task {
            task,
            reason: format!("join failure: {err}"),
        }),
    }
}

/// Install the stderr `fmt` subscriber (`RUST_LOG`, default `info`).
///
/// `log` records from the library crates are forwarded as well.
pub fn init_tracing() {
    use tracing_subscriber::{fmt, EnvFilter};

    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let _ = fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(std::io::stderr)
        .try_init();
}
