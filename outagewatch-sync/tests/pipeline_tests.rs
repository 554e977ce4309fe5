mod common;

use std::fs;

use common::{feed, git, outage, Fixture, BIGHT, GULF, SACRAMENTO};
use outagewatch_fetch::MemorySource;
use outagewatch_sync::pipeline::{self, RunOptions, RunOutcome};
use outagewatch_sync::{GitRepo, SyncError, WriteResult};
use serde_json::Value;

const PUSH: RunOptions = RunOptions {
    dry_run: false,
    push: true,
};

fn records_on_disk(fx: &Fixture) -> Vec<Value> {
    let text = fs::read_to_string(fx.work.join("outages.json")).expect("records file");
    serde_json::from_str(&text).expect("records json")
}

#[test]
fn first_run_commits_everything_as_added_and_pushes() {
    let fx = Fixture::new();
    let source = feed(vec![outage(SACRAMENTO.0, 4), outage(GULF.0, 11)]);

    let report = pipeline::run(&fx.home, &fx.config(), &source, PUSH).expect("run");

    match &report.outcome {
        RunOutcome::Committed { commit, pushed } => {
            assert!(*pushed);
            assert_eq!(commit, &git(&fx.remote, &["rev-parse", "main"]));
        }
        other => panic!("expected a commit, got {other:?}"),
    }
    assert_eq!(report.features, 2);
    assert_eq!(report.changes.added.len(), 2);
    assert!(report.writes.iter().all(WriteResult::is_written));
    assert_eq!(fx.remote_subject(), "2 added, 0 removed, 0 changed");

    let records = records_on_disk(&fx);
    let ids: Vec<&str> = records.iter().filter_map(|r| r["_id"].as_str()).collect();
    assert_eq!(ids, vec![SACRAMENTO.1, GULF.1], "fetch order is kept");
    assert_eq!(records[0]["cause"], "Weather");
    assert_eq!(records[0]["crew_status_orig"], "ASSIGNED");
    assert_eq!(records[1]["n_out"], 11);

    let raw: Value = serde_json::from_str(
        &fs::read_to_string(fx.work.join("outages.geojson")).expect("raw file"),
    )
    .expect("raw json");
    assert_eq!(raw["type"], "FeatureCollection");
    assert_eq!(raw["features"][0]["properties"]["source"], common::TILE);
}

#[test]
fn identical_feed_is_a_successful_no_op() {
    let fx = Fixture::new();
    let source = feed(vec![outage(SACRAMENTO.0, 4)]);
    pipeline::run(&fx.home, &fx.config(), &source, PUSH).expect("first run");
    let head = git(&fx.work, &["rev-parse", "HEAD"]);

    let report = pipeline::run(&fx.home, &fx.config(), &source, PUSH).expect("second run");

    assert_eq!(report.outcome, RunOutcome::NoChange);
    assert!(report.changes.is_empty());
    assert_eq!(report.message, "no changes\n");
    assert!(report
        .writes
        .iter()
        .all(|w| matches!(w, WriteResult::Unchanged { .. })));
    assert_eq!(git(&fx.work, &["rev-parse", "HEAD"]), head);
    assert_eq!(fx.remote_commit_count(), 1);
}

#[test]
fn changed_feed_commits_the_rendered_diff() {
    let fx = Fixture::new();
    pipeline::run(
        &fx.home,
        &fx.config(),
        feed(vec![outage(SACRAMENTO.0, 4), outage(GULF.0, 11)]),
        PUSH,
    )
    .expect("first run");

    let report = pipeline::run(
        &fx.home,
        &fx.config(),
        feed(vec![outage(SACRAMENTO.0, 9), outage(BIGHT.0, 1)]),
        PUSH,
    )
    .expect("second run");

    assert_eq!(fx.remote_commit_count(), 2);
    assert_eq!(fx.remote_subject(), "1 added, 1 removed, 1 changed");
    let body = git(&fx.remote, &["log", "-1", "--format=%B", "main"]);
    assert_eq!(body, report.message.trim_end());
    assert!(body.contains(&format!("Added:\n  {}", BIGHT.1)));
    assert!(body.contains(&format!("Removed:\n  {}", GULF.1)));
    assert!(body.contains("n_out: 4 => 9"));
}

#[test]
fn dry_run_writes_and_publishes_nothing() {
    let fx = Fixture::new();
    let options = RunOptions {
        dry_run: true,
        push: true,
    };
    let report = pipeline::run(
        &fx.home,
        &fx.config(),
        feed(vec![outage(SACRAMENTO.0, 4)]),
        options,
    )
    .expect("dry run");

    assert_eq!(report.outcome, RunOutcome::DryRun);
    assert!(report.message.starts_with("1 added"));
    assert!(report.writes.is_empty());
    assert!(!fx.work.join("outages.json").exists());
    assert!(!fx.work.join("outages.geojson").exists());
    assert!(!fx.home.join(".outagewatch").exists());
}

#[test]
fn malformed_feature_aborts_before_writing() {
    let fx = Fixture::new();
    let mut bad = outage(GULF.0, 1);
    bad["desc"] = Value::String("garbled".into());

    let err = pipeline::run(
        &fx.home,
        &fx.config(),
        feed(vec![outage(SACRAMENTO.0, 4), bad]),
        PUSH,
    )
    .unwrap_err();

    match err {
        SyncError::Transform(e) => assert_eq!(e.index, 1),
        other => panic!("expected transform error, got {other}"),
    }
    assert!(!fx.work.join("outages.json").exists());
    assert!(!fx.work.join("outages.geojson").exists());
    assert!(lock_is_free(&fx));
}

#[test]
fn unreachable_feed_is_a_fetch_error() {
    let fx = Fixture::new();
    let err = pipeline::run(&fx.home, &fx.config(), MemorySource::new(), PUSH).unwrap_err();
    assert!(matches!(err, SyncError::Fetch(_)), "got: {err}");
}

#[test]
fn commit_without_push_leaves_remote_untouched() {
    let fx = Fixture::new();
    let options = RunOptions {
        dry_run: false,
        push: false,
    };
    let report = pipeline::run(
        &fx.home,
        &fx.config(),
        feed(vec![outage(SACRAMENTO.0, 4)]),
        options,
    )
    .expect("run");

    assert!(matches!(
        report.outcome,
        RunOutcome::Committed { pushed: false, .. }
    ));
    let heads = git(&fx.remote, &["for-each-ref", "refs/heads"]);
    assert!(heads.is_empty(), "remote should have no branches: {heads}");
}

#[test]
fn concurrent_unrelated_commit_is_rebased_onto() {
    let fx = Fixture::new();
    pipeline::run(&fx.home, &fx.config(), feed(vec![outage(SACRAMENTO.0, 4)]), PUSH)
        .expect("first run");

    let other = fx.other_clone("other");
    fs::write(other.join("README.md"), "outage history\n").expect("readme");
    git(&other, &["add", "README.md"]);
    git(&other, &["commit", "--quiet", "-m", "add readme"]);
    git(&other, &["push", "--quiet", "origin", "HEAD:main"]);

    pipeline::run(&fx.home, &fx.config(), feed(vec![outage(SACRAMENTO.0, 7)]), PUSH)
        .expect("second run");

    assert_eq!(fx.remote_commit_count(), 3);
    assert_eq!(fx.remote_subject(), "0 added, 0 removed, 1 changed");
    assert!(fx.work.join("README.md").exists());
}

#[test]
fn another_writers_snapshot_is_the_diff_base() {
    let fx = Fixture::new();
    pipeline::run(&fx.home, &fx.config(), feed(vec![outage(SACRAMENTO.0, 4)]), PUSH)
        .expect("first run");

    let other = fx.other_clone("other");
    fs::write(other.join("outages.json"), "[]\n").expect("overwrite");
    git(&other, &["commit", "--quiet", "-am", "someone else"]);
    git(&other, &["push", "--quiet", "origin", "HEAD:main"]);

    let report = pipeline::run(&fx.home, &fx.config(), feed(vec![outage(SACRAMENTO.0, 4)]), PUSH)
        .expect("second run");

    assert!(matches!(report.outcome, RunOutcome::Committed { pushed: true, .. }));
    assert_eq!(fx.remote_commit_count(), 3);
    assert_eq!(fx.remote_subject(), "1 added, 0 removed, 0 changed");
}

#[test]
fn stranded_conflicting_commit_does_not_block_later_runs() {
    let fx = Fixture::new();
    pipeline::run(&fx.home, &fx.config(), feed(vec![outage(SACRAMENTO.0, 4)]), PUSH)
        .expect("first run");

    // A local commit that never made it out, and a remote that moved on.
    fs::write(fx.work.join("outages.json"), "[1]\n").expect("local edit");
    git(&fx.work, &["commit", "--quiet", "-am", "stranded"]);
    let other = fx.other_clone("other");
    fs::write(other.join("outages.json"), "[]\n").expect("overwrite");
    git(&other, &["commit", "--quiet", "-am", "someone else"]);
    git(&other, &["push", "--quiet", "origin", "HEAD:main"]);

    let report = pipeline::run(&fx.home, &fx.config(), feed(vec![outage(SACRAMENTO.0, 4)]), PUSH)
        .expect("run after conflict");
    assert!(matches!(report.outcome, RunOutcome::Committed { pushed: true, .. }));
    assert_eq!(fx.remote_subject(), "1 added, 0 removed, 0 changed");

    pipeline::run(&fx.home, &fx.config(), feed(vec![outage(SACRAMENTO.0, 9)]), PUSH)
        .expect("next change");
    assert_eq!(fx.remote_subject(), "0 added, 0 removed, 1 changed");
    assert_eq!(fx.remote_commit_count(), 4);

    let git_dir = fx.work.join(".git");
    assert!(!git_dir.join("rebase-merge").exists());
    assert!(!git_dir.join("rebase-apply").exists());
    let log = git(&fx.remote, &["log", "--format=%s", "main"]);
    assert!(!log.contains("stranded"), "{log}");
}

#[test]
fn local_only_commit_is_pushed_once_push_is_enabled() {
    let fx = Fixture::new();
    let local = RunOptions {
        dry_run: false,
        push: false,
    };
    pipeline::run(&fx.home, &fx.config(), feed(vec![outage(SACRAMENTO.0, 4)]), local)
        .expect("local run");
    let head = git(&fx.work, &["rev-parse", "HEAD"]);

    let report = pipeline::run(&fx.home, &fx.config(), feed(vec![outage(SACRAMENTO.0, 4)]), PUSH)
        .expect("pushing run");

    assert!(report.changes.is_empty());
    assert_eq!(
        report.outcome,
        RunOutcome::Committed {
            commit: head.clone(),
            pushed: true
        }
    );
    assert_eq!(git(&fx.remote, &["rev-parse", "main"]), head);
}

fn lock_is_free(fx: &Fixture) -> bool {
    GitRepo::open(&fx.work, None)
        .and_then(|repo| repo.lock())
        .is_ok()
}

#[test]
fn held_lock_fails_fast() {
    let fx = Fixture::new();
    let held = GitRepo::open(&fx.work, None)
        .and_then(|repo| repo.lock())
        .expect("lock");

    let err = pipeline::run(&fx.home, &fx.config(), feed(vec![outage(SACRAMENTO.0, 4)]), PUSH)
        .unwrap_err();

    assert!(matches!(err, SyncError::Locked { .. }), "got: {err}");
    assert!(!fx.work.join("outages.json").exists());
    drop(held);
    assert!(lock_is_free(&fx));
}

#[test]
fn lock_file_of_a_dead_run_does_not_block() {
    let fx = Fixture::new();
    fs::write(fx.work.join(".git").join("outagewatch.lock"), "12345\n").expect("lock");

    let report = pipeline::run(&fx.home, &fx.config(), feed(vec![outage(SACRAMENTO.0, 4)]), PUSH)
        .expect("run");

    assert!(matches!(report.outcome, RunOutcome::Committed { pushed: true, .. }));
    assert!(lock_is_free(&fx));
}
