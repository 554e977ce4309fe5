//! Hash-gated atomic artifact writer.
//!
//! ## `atomic_write` protocol
//!
//! 1. Normalise line endings and SHA-256 hash the content.
//! 2. Skip if the file on disk already has that hash. A file whose hash no
//!    longer matches the store was edited by someone else; that is logged.
//! 3. Write to `<path>.outagewatch.tmp`.
//! 4. Rename to the final path (atomic on POSIX).
//! 5. Record the new hash; the caller saves the store.

use std::io::ErrorKind;
use std::path::{Path, PathBuf};

use serde::Serialize;
use sha2::{Digest, Sha256};

use crate::diff::normalize_line_endings;
use crate::error::{io_err, SyncError};
use crate::hash_store::HashStore;

// ---------------------------------------------------------------------------
// Write result
// ---------------------------------------------------------------------------

/// Outcome of an individual file write.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum WriteResult {
    /// File was written (content changed or did not previously exist).
    Written { path: PathBuf },
    /// Content matches what is already there.
    Unchanged { path: PathBuf },
}

impl WriteResult {
    pub fn path(&self) -> &Path {
        match self {
            Self::Written { path } | Self::Unchanged { path } => path,
        }
    }

    pub fn is_written(&self) -> bool {
        matches!(self, Self::Written { .. })
    }
}

// ---------------------------------------------------------------------------
// Serialization
// ---------------------------------------------------------------------------

/// Pretty JSON with sorted object keys and a trailing newline.
///
/// Going through `Value` sorts struct fields too, not only maps.
pub fn to_artifact_json<T: Serialize>(value: &T) -> Result<String, SyncError> {
    let value = serde_json::to_value(value)?;
    let mut json = serde_json::to_string_pretty(&value)?;
    json.push('\n');
    Ok(json)
}

fn sha256_hex(content: &str) -> String {
    let mut h = Sha256::new();
    h.update(content.as_bytes());
    hex::encode(h.finalize())
}

// ---------------------------------------------------------------------------
// atomic_write
// ---------------------------------------------------------------------------

/// Atomically write `content` to `path` unless it is already there.
pub fn atomic_write(
    path: &Path,
    content: &str,
    store: &mut HashStore,
) -> Result<WriteResult, SyncError> {
    let tmp = PathBuf::from(format!("{}.outagewatch.tmp", path.display()));
    atomic_write_with_tmp(path, content, store, &tmp)
}

fn atomic_write_with_tmp(
    path: &Path,
    content: &str,
    store: &mut HashStore,
    tmp: &Path,
) -> Result<WriteResult, SyncError> {
    let normalized = normalize_line_endings(content);
    let content = normalized.as_str();
    let digest = sha256_hex(content);
    let key = path.to_string_lossy().to_string();

    let on_disk = match std::fs::read_to_string(path) {
        Ok(existing) => Some(sha256_hex(&normalize_line_endings(&existing))),
        Err(err) if err.kind() == ErrorKind::NotFound => None,
        Err(err) => return Err(io_err(path, err)),
    };
    if let (Some(stored), Some(found)) = (store.get(&key), on_disk.as_ref()) {
        if stored != found {
            tracing::warn!("{} was modified since it was last written", path.display());
        }
    }
    if on_disk.as_deref() == Some(digest.as_str()) {
        if store.get(&key) != Some(&digest) {
            store.insert(key, digest);
        }
        tracing::debug!("unchanged: {}", path.display());
        return Ok(WriteResult::Unchanged {
            path: path.to_path_buf(),
        });
    }

    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent).map_err(|e| io_err(parent, e))?;
    }
    if let Some(tmp_parent) = tmp.parent() {
        std::fs::create_dir_all(tmp_parent).map_err(|e| io_err(tmp_parent, e))?;
    }
    std::fs::write(tmp, content).map_err(|e| io_err(tmp, e))?;

    if let Err(e) = std::fs::rename(tmp, path) {
        let _ = std::fs::remove_file(tmp);
        return Err(io_err(path, e));
    }

    store.insert(key, digest);
    tracing::info!("wrote: {}", path.display());
    Ok(WriteResult::Written {
        path: path.to_path_buf(),
    })
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
