//! Config error-message, atomic-write-safety, and init integration tests.
//! Storage: ~/.outagewatch/config.yaml

use assert_fs::prelude::*;
use outagewatch_core::{
    config,
    types::{InstanceId, ViewId},
    ConfigError, WatchConfig,
};
use predicates::prelude::predicate;
use std::fs;
use std::path::PathBuf;

fn instance() -> InstanceId { InstanceId::from("0e0d6d5b-instance") }
fn view() -> ViewId { ViewId::from("a6cee9e4-view") }

// ---------------------------------------------------------------------------
// 1. Load error messages
// ---------------------------------------------------------------------------

#[test]
fn load_missing_config_mentions_init() {
    let home = assert_fs::TempDir::new().expect("tempdir");
    let err = config::load_at(home.path()).unwrap_err();
    assert!(matches!(err, ConfigError::ConfigNotFound { .. }), "got: {err}");
    assert!(err.to_string().contains("config.yaml"));
    assert!(err.to_string().contains("outagewatch init"));
}

#[test]
fn load_corrupt_yaml_returns_parse_error_with_path() {
    let home = assert_fs::TempDir::new().expect("tempdir");
    let dir = home.path().join(".outagewatch");
    fs::create_dir_all(&dir).expect("mkdir");
    fs::write(dir.join("config.yaml"), b": : corrupt : yaml : !!!\n  - broken: [unclosed")
        .expect("write");

    let err = config::load_at(home.path()).unwrap_err();
    assert!(matches!(err, ConfigError::Parse { .. }), "got: {err}");
    assert!(err.to_string().contains("config.yaml"), "must contain file path, got: {err}");
}

#[test]
fn load_rejects_empty_feed_identifier() {
    let home = assert_fs::TempDir::new().expect("tempdir");
    let dir = home.path().join(".outagewatch");
    fs::create_dir_all(&dir).expect("mkdir");
    fs::write(
        dir.join("config.yaml"),
        "instance_id: ''\nview_id: v\nrepo: /tmp/r\ncreated_at: 2024-01-01T00:00:00Z\n",
    )
    .expect("write");

    let err = config::load_at(home.path()).unwrap_err();
    assert!(
        matches!(err, ConfigError::Invalid { field: "instance_id", .. }),
        "got: {err}"
    );
}

// ---------------------------------------------------------------------------
// 2. Atomic write safety
// ---------------------------------------------------------------------------

#[test]
fn save_cleans_up_tmp_file() {
    let home = assert_fs::TempDir::new().expect("tempdir");
    let cfg = WatchConfig::new(instance(), view(), PathBuf::from("/data/repo"));
    config::save_at(home.path(), &cfg).expect("save");

    let tmp = config::config_path_at(home.path()).with_file_name("config.yaml.tmp");
    assert!(!tmp.exists(), ".tmp must be removed after successful save");
}

#[test]
fn mid_write_crash_leaves_original_intact() {
    let home = assert_fs::TempDir::new().expect("tempdir");
    let cfg = WatchConfig::new(instance(), view(), PathBuf::from("/data/repo"));
    config::save_at(home.path(), &cfg).expect("save");

    let path = config::config_path_at(home.path());
    let original_bytes = fs::read(&path).expect("read original");

    // Simulate crash: .tmp written but process died before rename
    let tmp = path.with_file_name("config.yaml.tmp");
    fs::write(&tmp, b"CRASH - INCOMPLETE WRITE").expect("write crash tmp");

    let current_bytes = fs::read(&path).expect("read after crash");
    assert_eq!(original_bytes, current_bytes, "original must be unchanged after crash");
    let loaded = config::load_at(home.path()).expect("load after crash");
    assert_eq!(loaded.instance_id, instance());
}

// ---------------------------------------------------------------------------
// 3. Init
// ---------------------------------------------------------------------------

#[test]
fn init_creates_config_yaml_with_mode_0600() {
    let home = assert_fs::TempDir::new().expect("home tempdir");
    let repo = assert_fs::TempDir::new().expect("repo tempdir");

    let cfg = config::init_at(home.path(), instance(), view(), repo.path().to_path_buf(), false)
        .expect("init");

    home.child(".outagewatch/config.yaml").assert(predicate::path::exists());

    let contents = fs::read_to_string(config::config_path_at(home.path())).expect("read");
    let loaded: WatchConfig = serde_yaml::from_str(&contents).expect("roundtrip");
    assert_eq!(loaded.repo, cfg.repo);
    assert_eq!(loaded.view_id, view());

    #[cfg(unix)]
    {
        use std::os::unix::fs::PermissionsExt;
        let mode = fs::metadata(config::config_path_at(home.path()))
            .expect("meta")
            .permissions()
            .mode()
            & 0o777;
        assert_eq!(mode, 0o600, "expected 0600, got {mode:o}");
    }
}

#[test]
fn init_is_idempotent_without_force() {
    let home = assert_fs::TempDir::new().expect("tempdir");

    config::init_at(home.path(), instance(), view(), PathBuf::from("/first"), false)
        .expect("first init");
    let second = config::init_at(
        home.path(),
        InstanceId::from("other"),
        view(),
        PathBuf::from("/second"),
        false,
    )
    .expect("second init");

    // First wins, idempotent
    assert_eq!(second.instance_id, instance());
    assert_eq!(second.repo, PathBuf::from("/first"));
}

#[test]
fn init_with_force_overwrites() {
    let home = assert_fs::TempDir::new().expect("tempdir");

    config::init_at(home.path(), instance(), view(), PathBuf::from("/first"), false)
        .expect("first init");
    let forced = config::init_at(
        home.path(),
        InstanceId::from("other"),
        view(),
        PathBuf::from("/second"),
        true,
    )
    .expect("forced init");

    assert_eq!(forced.instance_id, InstanceId::from("other"));
    let loaded = config::load_at(home.path()).expect("load");
    assert_eq!(loaded.repo, PathBuf::from("/second"));
}
