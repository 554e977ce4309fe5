//! Hash store: SHA-256 of the artifacts written for a feed.
//!
//! Persists a `HashStoreFile` JSON document at
//! `<home>/.outagewatch/hashes/<instance_id>.json`.
//! Writes use the same atomic `.tmp` + rename pattern as the config.

use std::collections::HashMap;
use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::{io_err, SyncError};

/// Artifact path → last written SHA-256 hex digest.
pub type HashStore = HashMap<String, String>;

/// On-disk hash store payload.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct HashStoreFile {
    pub synced_at: DateTime<Utc>,
    #[serde(default)]
    pub files: HashStore,
}

/// `~/.outagewatch/hashes/<instance_id>.json`
pub fn store_path_at(home: &Path, instance_id: &str) -> PathBuf {
    home.join(".outagewatch")
        .join("hashes")
        .join(format!("{instance_id}.json"))
}

/// Load the hash store; empty if the file does not yet exist.
pub fn load_at(home: &Path, instance_id: &str) -> Result<HashStoreFile, SyncError> {
    let path = store_path_at(home, instance_id);
    if !path.exists() {
        return Ok(HashStoreFile {
            synced_at: Utc::now(),
            files: HashMap::new(),
        });
    }
    let contents = std::fs::read_to_string(&path).map_err(|e| io_err(&path, e))?;
    Ok(serde_json::from_str(&contents)?)
}

/// Save the hash store atomically.
pub fn save_at(home: &Path, instance_id: &str, store: &HashStoreFile) -> Result<(), SyncError> {
    let path = store_path_at(home, instance_id);
    let Some(dir) = path.parent() else {
        return Err(io_err(
            path,
            std::io::Error::other("invalid hash store path"),
        ));
    };
    std::fs::create_dir_all(dir).map_err(|e| io_err(dir, e))?;

    let json = serde_json::to_string_pretty(store)?;
    let tmp = path.with_extension("json.tmp");
    std::fs::write(&tmp, &json).map_err(|e| io_err(&tmp, e))?;
    std::fs::rename(&tmp, &path).map_err(|e| io_err(&path, e))?;
    Ok(())
}
