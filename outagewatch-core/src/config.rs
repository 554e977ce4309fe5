//! YAML config for a watched feed.
//!
//! # Storage layout
//!
//! ```text
//! ~/.outagewatch/
//!   config.yaml   (mode 0600, created by `outagewatch init`)
//! ```
//!
//! # API pattern
//!
//! Every function takes an explicit `home: &Path` (`fn_at`), so tests can point
//! it at a `TempDir`. Binaries resolve the real one once with [`home`].

use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::ConfigError;
use crate::types::{InstanceId, ViewId};

pub const DEFAULT_BASE_URL: &str = "https://kubra.io";
pub const DEFAULT_INTERVAL_MINUTES: u64 = 20;

// ---------------------------------------------------------------------------
// 1. Config document
// ---------------------------------------------------------------------------

/// Identity used for commits when the data repository has none configured.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CommitAuthor {
    pub name: String,
    pub email: String,
}

/// Everything one pipeline run needs to know.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WatchConfig {
    pub instance_id: InstanceId,
    pub view_id: ViewId,
    /// Working copy of the data repository the artifacts are committed to.
    pub repo: PathBuf,
    #[serde(default = "default_remote")]
    pub remote: String,
    #[serde(default = "default_branch")]
    pub branch: String,
    #[serde(default = "default_raw_file")]
    pub raw_file: PathBuf,
    #[serde(default = "default_records_file")]
    pub records_file: PathBuf,
    #[serde(default = "default_locale")]
    pub locale: String,
    #[serde(default = "default_interval_minutes")]
    pub interval_minutes: u64,
    #[serde(default = "default_base_url")]
    pub base_url: String,
    #[serde(default = "default_push")]
    pub push: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub author: Option<CommitAuthor>,
    pub created_at: DateTime<Utc>,
}

fn default_remote() -> String {
    "origin".to_string()
}
fn default_branch() -> String {
    "main".to_string()
}
fn default_raw_file() -> PathBuf {
    PathBuf::from("outages.geojson")
}
fn default_records_file() -> PathBuf {
    PathBuf::from("outages.json")
}
fn default_locale() -> String {
    "EN-US".to_string()
}
fn default_interval_minutes() -> u64 {
    DEFAULT_INTERVAL_MINUTES
}
fn default_base_url() -> String {
    DEFAULT_BASE_URL.to_string()
}
fn default_push() -> bool {
    true
}

impl WatchConfig {
    /// A config with every optional field at its default.
    pub fn new(instance_id: InstanceId, view_id: ViewId, repo: PathBuf) -> Self {
        Self {
            instance_id,
            view_id,
            repo,
            remote: default_remote(),
            branch: default_branch(),
            raw_file: default_raw_file(),
            records_file: default_records_file(),
            locale: default_locale(),
            interval_minutes: default_interval_minutes(),
            base_url: default_base_url(),
            push: default_push(),
            author: None,
            created_at: Utc::now(),
        }
    }

    /// `<repo>/<raw_file>`
    pub fn raw_path(&self) -> PathBuf {
        self.repo.join(&self.raw_file)
    }

    /// `<repo>/<records_file>`
    pub fn records_path(&self) -> PathBuf {
        self.repo.join(&self.records_file)
    }

    /// Reject values no run could succeed with.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.instance_id.0.trim().is_empty() {
            return Err(ConfigError::Invalid {
                field: "instance_id",
                reason: "must not be empty".into(),
            });
        }
        if self.view_id.0.trim().is_empty() {
            return Err(ConfigError::Invalid {
                field: "view_id",
                reason: "must not be empty".into(),
            });
        }
        if self.interval_minutes == 0 {
            return Err(ConfigError::Invalid {
                field: "interval_minutes",
                reason: "must be at least 1".into(),
            });
        }
        if self.raw_file == self.records_file {
            return Err(ConfigError::Invalid {
                field: "records_file",
                reason: format!("must differ from raw_file ({})", self.raw_file.display()),
            });
        }
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// 2. Path helpers
// ---------------------------------------------------------------------------

/// `<home>/.outagewatch/`
///
/// Creates the directory (mode `0700`) if it does not yet exist.
pub fn root_dir_at(home: &Path) -> Result<PathBuf, ConfigError> {
    let dir = home.join(".outagewatch");
    if !dir.exists() {
        std::fs::create_dir_all(&dir)?;
        set_dir_permissions(&dir)?;
    }
    Ok(dir)
}

/// `<home>/.outagewatch/config.yaml`. Pure, no I/O.
pub fn config_path_at(home: &Path) -> PathBuf {
    home.join(".outagewatch").join("config.yaml")
}

// ---------------------------------------------------------------------------
// 3. Load
// ---------------------------------------------------------------------------

/// Load the config from an explicit file path.
///
/// Returns `ConfigError::ConfigNotFound` if absent,
/// `ConfigError::Parse` (with path + line context) if malformed YAML.
pub fn load_from(path: &Path) -> Result<WatchConfig, ConfigError> {
    if !path.exists() {
        return Err(ConfigError::ConfigNotFound {
            path: path.to_path_buf(),
        });
    }
    let contents = std::fs::read_to_string(path)?;
    let config: WatchConfig = serde_yaml::from_str(&contents).map_err(|e| ConfigError::Parse {
        path: path.to_path_buf(),
        source: e,
    })?;
    config.validate()?;
    Ok(config)
}

/// Load `<home>/.outagewatch/config.yaml`.
pub fn load_at(home: &Path) -> Result<WatchConfig, ConfigError> {
    load_from(&config_path_at(home))
}

// ---------------------------------------------------------------------------
// 4. Save (atomic)
// ---------------------------------------------------------------------------

/// Atomically save the config to `<home>/.outagewatch/config.yaml`.
///
/// Write flow: serialize → `.yaml.tmp` sibling → `chmod 0600` → `rename`.
pub fn save_at(home: &Path, config: &WatchConfig) -> Result<(), ConfigError> {
    config.validate()?;
    root_dir_at(home)?;
    let path = config_path_at(home);
    let tmp_path = path.with_file_name("config.yaml.tmp");

    let yaml = serde_yaml::to_string(config)?;
    std::fs::write(&tmp_path, yaml)?;
    set_file_permissions(&tmp_path)?;
    std::fs::rename(&tmp_path, &path)?;
    Ok(())
}

// ---------------------------------------------------------------------------
// 5. Init
// ---------------------------------------------------------------------------

/// Write a fresh config for the given feed and repository.
///
/// Idempotent: if a config already exists it is loaded and returned unchanged
/// unless `force` is set.
pub fn init_at(
    home: &Path,
    instance_id: InstanceId,
    view_id: ViewId,
    repo: PathBuf,
    force: bool,
) -> Result<WatchConfig, ConfigError> {
    let path = config_path_at(home);
    if path.exists() && !force {
        return load_from(&path);
    }
    let config = WatchConfig::new(instance_id, view_id, repo);
    save_at(home, &config)?;
    Ok(config)
}

// ---------------------------------------------------------------------------
// Helpers
// ---------------------------------------------------------------------------

/// The user's home directory.
pub fn home() -> Result<PathBuf, ConfigError> {
    dirs::home_dir().ok_or(ConfigError::HomeNotFound)
}

#[cfg(unix)]
fn set_dir_permissions(path: &Path) -> Result<(), ConfigError> {
    use std::os::unix::fs::PermissionsExt;
    std::fs::set_permissions(path, std::fs::Permissions::from_mode(0o700))?;
    Ok(())
}
#[cfg(not(unix))]
fn set_dir_permissions(_path: &Path) -> Result<(), ConfigError> {
    Ok(())
}

#[cfg(unix)]
fn set_file_permissions(path: &Path) -> Result<(), ConfigError> {
    use std::os::unix::fs::PermissionsExt;
    std::fs::set_permissions(path, std::fs::Permissions::from_mode(0o600))?;
    Ok(())
}
#[cfg(not(unix))]
fn set_file_permissions(_path: &Path) -> Result<(), ConfigError> {
    Ok(())
}

// ---------------------------------------------------------------------------
// Unit tests
// ---------------------------------------------------------------------------
