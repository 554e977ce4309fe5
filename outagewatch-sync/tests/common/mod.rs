#![allow(dead_code)]

use std::path::{Path, PathBuf};
use std::process::Command;

use outagewatch_core::{CommitAuthor, InstanceId, ViewId, WatchConfig};
use outagewatch_fetch::MemorySource;
use serde_json::{json, Value};
use tempfile::TempDir;

pub const BASE: &str = "https://kubra.test";
const VIEW: &str = "https://kubra.test/stormcenter/api/v1/stormcenters/inst/views/view";
/// The only zoom-7 tile covering the service area below.
pub const TILE: &str = "https://kubra.test/cluster/intv/public/cluster-2/0230103.json";

/// Encoded points and the `_id` each one produces.
pub const SACRAMENTO: (&str, &str) = ("_p~iF~ps|U", "38.5-120.2");
pub const GULF: (&str, &str) = ("_ulLnnqC", "2.2-0.75");
pub const BIGHT: (&str, &str) = ("_mqNvxq`@", "2.552-5.503");

pub fn outage(point: &str, n_out: u64) -> Value {
    json!({
        "id": format!("o-{point}"),
        "desc": {
            "cluster": false,
            "n_out": n_out,
            "cause": {"EN-US": "Weather", "orig": "WTHR"},
            "crew_status": {"EN-US": "Assigned", "orig": "ASSIGNED"}
        },
        "geom": {"p": [point]}
    })
}

/// A stormcenter view whose single tile holds `outages`.
pub fn feed(outages: Vec<Value>) -> MemorySource {
    MemorySource::new()
        .with(
            format!("{VIEW}/currentState?preview=false"),
            json!({
                "stormcenterDeploymentId": "dep1",
                "data": {
                    "interval_generation_data": "data/intv",
                    "cluster_interval_generation_data": "cluster/intv"
                },
                "datastatic": {"regions-key": "static/regions"}
            }),
        )
        .with(
            format!("{VIEW}/configuration/dep1?preview=false"),
            json!({"config": {"layers": {"data": {"interval_generation_data": [
                {"type": "CLUSTER_LAYER_1", "id": "cluster-2"}
            ]}}}}),
        )
        .with(
            format!("{BASE}/static/regions/regions-key/serviceareas.json"),
            json!({"file_data": [{"geom": {"a": [SACRAMENTO.0]}}]}),
        )
        .with(
            format!("{BASE}/data/intv/public/summary-1/data.json"),
            json!({"summaryFileData": {"totals": [{"total_outages": outages.len()}]}}),
        )
        .with(TILE, json!({ "file_data": outages }))
}

pub fn git(dir: &Path, args: &[&str]) -> String {
    let output = Command::new("git")
        .arg("-C")
        .arg(dir)
        .args(["-c", "user.name=Other", "-c", "user.email=other@example.com"])
        .args(args)
        .output()
        .expect("spawn git");
    assert!(
        output.status.success(),
        "git {args:?} failed: {}",
        String::from_utf8_lossy(&output.stderr)
    );
    String::from_utf8_lossy(&output.stdout).trim().to_string()
}

/// A bare remote plus a clone of it, and a scratch home.
pub struct Fixture {
    _root: TempDir,
    pub home: PathBuf,
    pub remote: PathBuf,
    pub work: PathBuf,
}

impl Fixture {
    pub fn new() -> Self {
        let _ = env_logger::builder().is_test(true).try_init();
        let root = TempDir::new().expect("tempdir");
        let home = root.path().join("home");
        let remote = root.path().join("remote.git");
        let work = root.path().join("work");
        std::fs::create_dir_all(&home).expect("home");
        git(root.path(), &["init", "--quiet", "--bare", "remote.git"]);
        git(root.path(), &["clone", "--quiet", "remote.git", "work"]);
        Self {
            _root: root,
            home,
            remote,
            work,
        }
    }

    pub fn config(&self) -> WatchConfig {
        let mut config = WatchConfig::new(
            InstanceId::from("inst"),
            ViewId::from("view"),
            self.work.clone(),
        );
        config.base_url = BASE.to_string();
        config.author = Some(CommitAuthor {
            name: "Outage Bot".into(),
            email: "bot@example.com".into(),
        });
        config
    }

    /// A second clone of the remote, as another machine would have.
    pub fn other_clone(&self, name: &str) -> PathBuf {
        let parent = self.remote.parent().expect("parent");
        git(parent, &["clone", "--quiet", "--branch", "main", "remote.git", name]);
        parent.join(name)
    }

    pub fn remote_subject(&self) -> String {
        git(&self.remote, &["log", "-1", "--format=%s", "main"])
    }

    pub fn remote_commit_count(&self) -> usize {
        git(&self.remote, &["rev-list", "--count", "main"])
            .parse()
            .expect("count")
    }
}
