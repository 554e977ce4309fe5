//! Shared pipeline entrypoint used by CLI and daemon.
//!
//! fetch → transform → diff → write → commit → rebase → push. Nothing is
//! written unless fetch, transform and diff all succeed.

use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};

use outagewatch_core::{FeatureCollection, Snapshot, WatchConfig};
use outagewatch_fetch::{fetch_feature_collection, JsonSource};

use crate::diff::{diff, read_snapshot, ChangeSet};
use crate::error::SyncError;
use crate::hash_store;
use crate::publish::GitRepo;
use crate::transform::transform;
use crate::writer::{atomic_write, to_artifact_json, WriteResult};

/// Per-invocation switches.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RunOptions {
    /// Fetch, transform and diff only.
    pub dry_run: bool,
    /// Rebase onto and push to the remote after committing.
    pub push: bool,
}

impl RunOptions {
    pub fn from_config(config: &WatchConfig) -> Self {
        Self {
            dry_run: false,
            push: config.push,
        }
    }
}

/// How a run ended.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RunOutcome {
    /// Nothing committed and nothing left to push.
    NoChange,
    Committed { commit: String, pushed: bool },
    DryRun,
}

/// Everything a caller needs to report on a finished run.
#[derive(Debug, Clone)]
pub struct RunReport {
    pub outcome: RunOutcome,
    pub features: usize,
    pub changes: ChangeSet,
    /// Commit message (rendered even when nothing is committed).
    pub message: String,
    pub writes: Vec<WriteResult>,
    pub started_at: DateTime<Utc>,
    pub finished_at: DateTime<Utc>,
}

/// The output of fetch + transform + diff, before anything touches disk.
#[derive(Debug, Clone)]
pub struct Prepared {
    pub collection: FeatureCollection,
    pub snapshot: Snapshot,
    pub changes: ChangeSet,
}

/// Transform `collection` and diff it against the committed records file.
pub fn prepare(
    config: &WatchConfig,
    collection: FeatureCollection,
) -> Result<Prepared, SyncError> {
    let records = transform(&collection, &config.locale)?;
    let snapshot = Snapshot::from_records(&records)?;
    let previous = read_snapshot(&config.records_path())?;
    if previous.is_none() {
        tracing::info!(
            "no previous snapshot at {}",
            config.records_path().display()
        );
    }
    let changes = diff(previous.as_ref(), &snapshot)?;
    Ok(Prepared {
        collection,
        snapshot,
        changes,
    })
}

/// Run the full pipeline once.
///
/// This is the canonical entrypoint for both `outagewatch run` and the daemon
/// processor. `home` locates the hash store.
pub fn run<S: JsonSource>(
    home: &Path,
    config: &WatchConfig,
    source: S,
    options: RunOptions,
) -> Result<RunReport, SyncError> {
    config.validate()?;
    let started_at = Utc::now();

    let collection = fetch_feature_collection(
        source,
        &config.base_url,
        &config.instance_id,
        &config.view_id,
    )?;
    tracing::info!("fetched {} outages", collection.len());
    let features = collection.len();

    if options.dry_run {
        let prepared = prepare(config, collection)?;
        let message = prepared.changes.render();
        return Ok(RunReport {
            outcome: RunOutcome::DryRun,
            features,
            changes: prepared.changes,
            message,
            writes: Vec::new(),
            started_at,
            finished_at: Utc::now(),
        });
    }

    let repo = GitRepo::open(&config.repo, config.author.clone())?;
    let _lock = repo.lock()?;
    if options.push {
        repo.sync_with_remote(&config.remote, &config.branch)?;
    }
    let prepared = prepare(config, collection)?;
    let message = prepared.changes.render();

    let writes = write_artifacts(home, config, &prepared)?;
    let outcome = publish(&repo, config, options, &message)?;

    Ok(RunReport {
        outcome,
        features,
        changes: prepared.changes,
        message,
        writes,
        started_at,
        finished_at: Utc::now(),
    })
}

fn write_artifacts(
    home: &Path,
    config: &WatchConfig,
    prepared: &Prepared,
) -> Result<Vec<WriteResult>, SyncError> {
    let instance = config.instance_id.to_string();
    let mut store = hash_store::load_at(home, &instance)?;

    let raw = to_artifact_json(&prepared.collection)?;
    let records = prepared.snapshot.to_pretty_json()?;
    let writes = vec![
        atomic_write(&config.raw_path(), &raw, &mut store.files)?,
        atomic_write(&config.records_path(), &records, &mut store.files)?,
    ];

    store.synced_at = Utc::now();
    hash_store::save_at(home, &instance, &store)?;
    Ok(writes)
}

fn publish(
    repo: &GitRepo,
    config: &WatchConfig,
    options: RunOptions,
    message: &str,
) -> Result<RunOutcome, SyncError> {
    let artifacts: [PathBuf; 2] = [config.raw_file.clone(), config.records_file.clone()];
    let paths: Vec<&Path> = artifacts.iter().map(PathBuf::as_path).collect();
    repo.stage(&paths)?;

    let committed = if repo.has_staged_changes()? {
        let commit = repo.commit(message)?;
        tracing::info!("committed {commit}");
        Some(commit)
    } else {
        tracing::info!("nothing to commit");
        None
    };

    if !options.push {
        return Ok(match committed {
            Some(commit) => RunOutcome::Committed {
                commit,
                pushed: false,
            },
            None => RunOutcome::NoChange,
        });
    }

    if repo.remote_has_branch(&config.remote, &config.branch)? {
        repo.pull_rebase(&config.remote, &config.branch)?;
    }
    if repo.unpushed_commits(&config.remote, &config.branch)? == 0 {
        return Ok(RunOutcome::NoChange);
    }
    repo.push(&config.remote, &config.branch)?;
    let commit = repo.head()?;
    tracing::info!("pushed {commit} to {}/{}", config.remote, config.branch);
    Ok(RunOutcome::Committed {
        commit,
        pushed: true,
    })
}
