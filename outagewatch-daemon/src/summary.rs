//! Last-run summary persisted at `~/.outagewatch/run/last_run.json`.

use std::io::ErrorKind;
use std::path::Path;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use outagewatch_sync::{RunOutcome, RunReport};

use crate::error::{io_err, DaemonError};
use crate::paths::{last_run_path, run_dir};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RunStatus {
    Committed,
    NoChange,
    DryRun,
    Failed,
}

impl RunStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            RunStatus::Committed => "committed",
            RunStatus::NoChange => "no change",
            RunStatus::DryRun => "dry run",
            RunStatus::Failed => "failed",
        }
    }
}

/// What happened on the most recent run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RunSummary {
    /// `manual`, `startup` or `interval`.
    pub trigger: String,
    pub status: RunStatus,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub commit: Option<String>,
    #[serde(default)]
    pub pushed: bool,
    #[serde(default)]
    pub features: usize,
    #[serde(default)]
    pub added: usize,
    #[serde(default)]
    pub removed: usize,
    #[serde(default)]
    pub changed: usize,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    pub started_at: DateTime<Utc>,
    pub finished_at: DateTime<Utc>,
    pub duration_ms: i64,
}

impl RunSummary {
    pub fn from_report(trigger: &str, report: &RunReport) -> Self {
        let (status, commit, pushed) = match &report.outcome {
            RunOutcome::Committed { commit, pushed } => {
                (RunStatus::Committed, Some(commit.clone()), *pushed)
            }
            RunOutcome::NoChange => (RunStatus::NoChange, None, false),
            RunOutcome::DryRun => (RunStatus::DryRun, None, false),
        };
        Self {
            trigger: trigger.to_string(),
            status,
            commit,
            pushed,
            features: report.features,
            added: report.changes.added.len(),
            removed: report.changes.removed.len(),
            changed: report.changes.modified.len(),
            error: None,
            started_at: report.started_at,
            finished_at: report.finished_at,
            duration_ms: (report.finished_at - report.started_at).num_milliseconds(),
        }
    }

    pub fn failed(trigger: &str, started_at: DateTime<Utc>, error: impl ToString) -> Self {
        let finished_at = Utc::now();
        Self {
            trigger: trigger.to_string(),
            status: RunStatus::Failed,
            commit: None,
            pushed: false,
            features: 0,
            added: 0,
            removed: 0,
            changed: 0,
            error: Some(error.to_string()),
            started_at,
            finished_at,
            duration_ms: (finished_at - started_at).num_milliseconds(),
        }
    }
}

/// Atomically replace the last-run summary.
pub fn write_at(home: &Path, summary: &RunSummary) -> Result<(), DaemonError> {
    let dir = run_dir(home);
    std::fs::create_dir_all(&dir).map_err(|e| io_err(&dir, e))?;

    let path = last_run_path(home);
    let json = serde_json::to_string_pretty(summary)?;
    let tmp = path.with_extension("json.tmp");
    std::fs::write(&tmp, json).map_err(|e| io_err(&tmp, e))?;
    std::fs::rename(&tmp, &path).map_err(|e| io_err(&path, e))?;
    Ok(())
}

/// The last-run summary, `None` if nothing has run yet.
pub fn read_at(home: &Path) -> Result<Option<RunSummary>, DaemonError> {
    let path = last_run_path(home);
    match std::fs::read_to_string(&path) {
        Ok(json) => Ok(Some(serde_json::from_str(&json)?)),
        Err(err) if err.kind() == ErrorKind::NotFound => Ok(None),
        Err(err) => Err(io_err(&path, err)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use outagewatch_sync::diff::KeyedRecord;
    use outagewatch_sync::ChangeSet;
    use serde_json::Map;
    use tempfile::TempDir;

    fn report(outcome: RunOutcome) -> RunReport {
        let started_at = Utc::now();
        RunReport {
            outcome,
            features: 3,
            changes: ChangeSet {
                added: vec![KeyedRecord {
                    key: "30.1-97.7".into(),
                    record: Map::new(),
                }],
                ..ChangeSet::default()
            },
            message: "1 added, 0 removed, 0 changed\n".into(),
            writes: Vec::new(),
            started_at,
            finished_at: started_at + chrono::Duration::milliseconds(1500),
        }
    }

    #[test]
    fn summary_from_committed_report() {
        let summary = RunSummary::from_report(
            "interval",
            &report(RunOutcome::Committed {
                commit: "abc123".into(),
                pushed: true,
            }),
        );
        assert_eq!(summary.status, RunStatus::Committed);
        assert_eq!(summary.commit.as_deref(), Some("abc123"));
        assert!(summary.pushed);
        assert_eq!((summary.features, summary.added), (3, 1));
        assert_eq!(summary.duration_ms, 1500);
    }

    #[test]
    fn failed_summary_keeps_the_error() {
        let summary = RunSummary::failed("manual", Utc::now(), "HTTP 503 from https://k");
        assert_eq!(summary.status, RunStatus::Failed);
        assert_eq!(summary.error.as_deref(), Some("HTTP 503 from https://k"));
        assert!(summary.duration_ms >= 0);
    }

    #[test]
    fn write_then_read() {
        let home = TempDir::new().unwrap();
        assert!(read_at(home.path()).unwrap().is_none());

        let summary = RunSummary::from_report("startup", &report(RunOutcome::NoChange));
        write_at(home.path(), &summary).unwrap();
        assert_eq!(read_at(home.path()).unwrap(), Some(summary));

        let raw = std::fs::read_to_string(last_run_path(home.path())).unwrap();
        assert!(raw.contains("\"status\": \"no_change\""));
        assert!(!raw.contains("\"commit\""));
    }
}
