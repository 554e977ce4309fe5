//! Error types for outagewatch-sync.

use std::path::PathBuf;

use thiserror::Error;

use outagewatch_core::ConfigError;
use outagewatch_fetch::FetchError;

/// A feature that could not be flattened into a record.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("feature #{index}: {reason}")]
pub struct TransformError {
    pub index: usize,
    pub reason: String,
}

impl TransformError {
    pub(crate) fn new(index: usize, reason: impl Into<String>) -> Self {
        Self {
            index,
            reason: reason.into(),
        }
    }
}

/// A snapshot that cannot be keyed.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum DiffError {
    #[error("record #{index} of the {side} snapshot has no string `_id`")]
    MissingKey { side: &'static str, index: usize },
}

/// All errors that can arise from a pipeline run.
#[derive(Debug, Error)]
pub enum SyncError {
    #[error("config error: {0}")]
    Config(#[from] ConfigError),

    #[error("fetch failed: {0}")]
    Fetch(#[from] FetchError),

    #[error("transform failed: {0}")]
    Transform(#[from] TransformError),

    #[error("diff failed: {0}")]
    Diff(#[from] DiffError),

    /// An I/O error, with annotated path for context.
    #[error("I/O error at {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// A git invocation exited non-zero.
    #[error("`git {command}` failed: {stderr}")]
    Git { command: String, stderr: String },

    /// Another run holds the repository lock.
    #[error("another run holds the lock on {path}")]
    Locked { path: PathBuf },
}

/// Convenience constructor for [`SyncError::Io`].
pub(crate) fn io_err(path: impl Into<PathBuf>, source: std::io::Error) -> SyncError {
    SyncError::Io {
        path: path.into(),
        source,
    }
}
