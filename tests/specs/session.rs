//! End-to-end session scenarios.

use crate::prelude::World;
use pcs_core::{history, paths, JobStatus, LogLevel, SessionState, SyncRole};
use serial_test::serial;

const HAPPY: &str = "\
sync_jobs:
  dummy_success: true
btrfs_snapshots:
  subvolumes: [\"@home\"]
dummy_success:
  tick_millis: 1
  phase_ticks: 2
";

#[tokio::test]
#[serial]
async fn s1_clean_session_completes_with_snapshots_and_released_locks() {
    let world = World::new(HAPPY).with_healthy_subvolume("@home");

    let report = world.run().await;

    assert_eq!(report.state, SessionState::Completed);
    assert_eq!(report.job_results["dummy_success"], JobStatus::Success);
    assert_eq!(report.job_results["install_on_target"], JobStatus::Success);

    // Log file exists and is JSON-lines
    assert!(report.log_file.exists());
    let content = std::fs::read_to_string(&report.log_file).unwrap();
    for line in content.lines() {
        let record: serde_json::Value = serde_json::from_str(line).unwrap();
        assert!(record["timestamp"].is_string());
        assert!(record["level"].is_string());
    }

    // PRE and POST snapshot folders created on both machines
    for exec in [&world.source, world.target()] {
        assert!(exec.ran_matching("pre-@home-"));
        assert!(exec.ran_matching("post-@home-"));
    }

    // Locks released: the local lock file is gone
    assert!(!paths::lock_path().exists());

    // Sync roles recorded on both sides
    assert_eq!(history::last_role().unwrap(), Some(SyncRole::Source));
    assert!(world.target().ran_matching("sync-history.json"));
}

#[tokio::test]
#[serial]
async fn s2_job_failing_at_sixty_percent_fails_the_session() {
    let mut world = World::new(
        "sync_jobs:\n  dummy_fail: true\nbtrfs_snapshots:\n  subvolumes: [\"@home\"]\n\
         dummy_fail:\n  fail_at_percent: 60\n  tick_millis: 1\n",
    )
    .with_healthy_subvolume("@home");

    let report = world.run().await;

    assert_eq!(report.state, SessionState::Failed);
    assert_eq!(report.job_results["dummy_fail"], JobStatus::Failed);

    // The last progress event for dummy_fail reached the failure point
    let percents = world.progress_percents("dummy_fail");
    assert!(*percents.last().unwrap() >= 60);

    // A CRITICAL record mentioning "60" exists in the log file
    let content = std::fs::read_to_string(&report.log_file).unwrap();
    let has_critical_60 = content.lines().any(|line| {
        let record: serde_json::Value = serde_json::from_str(line).unwrap();
        record["level"] == "CRITICAL"
            && record["event"].as_str().is_some_and(|e| e.contains("60"))
    });
    assert!(has_critical_60);

    // PRE snapshots remain; POST snapshots were never created
    assert!(world.source.ran_matching("pre-@home-"));
    assert!(!world.source.ran_matching("post-@home-"));
}

#[tokio::test]
#[serial]
async fn s5_newer_target_fails_validation_without_snapshots() {
    let world = World::new(HAPPY);
    // Target reports a newer version than the source
    let transport = pcs_exec::ScriptedTransport::new();
    transport.executor().respond("hostname", 0, "desktop\n", "");
    transport.executor().respond("mkdir -p", 0, "LOCKED\n", "");
    transport
        .executor()
        .respond("pc-switcher --version", 0, "pc-switcher 99.0.0\n", "");

    let transport_arc = std::sync::Arc::new(transport.clone());
    let report = pcs_engine::Orchestrator::new(
        world.config.clone(),
        "desktop",
        transport_arc.clone(),
        std::sync::Arc::new(world.source.clone()),
        std::sync::Arc::new(pcs_exec::RemoteExecutor::new(transport_arc)),
        world.bus.clone(),
        false,
        pcs_engine::OrchestratorOptions::default(),
    )
    .run()
    .await;

    assert_eq!(report.state, SessionState::Failed);
    assert!(report.failure.unwrap().contains("validation failed"));

    // Never entered EXECUTING: no snapshot command anywhere
    assert!(!world.source.ran_matching("btrfs subvolume snapshot"));
    assert!(!transport.executor().ran_matching("btrfs subvolume snapshot"));

    // The validation error names both versions
    let content = std::fs::read_to_string(&report.log_file).unwrap();
    assert!(content.contains("is newer than source"));
    assert!(content.contains("99.0.0"));
}

#[tokio::test]
#[serial]
async fn empty_sync_jobs_completes() {
    let world = World::new("btrfs_snapshots:\n  subvolumes: []\n");

    let report = world.run().await;

    assert_eq!(report.state, SessionState::Completed);
    // Only the version gate ran
    assert_eq!(report.job_results.len(), 1);
}

#[tokio::test]
#[serial]
async fn warning_logs_do_not_fail_a_session() {
    let mut world = World::new(
        "sync_jobs:\n  dummy_success: true\nbtrfs_snapshots:\n  subvolumes: []\n\
         dummy_success:\n  tick_millis: 1\n  phase_ticks: 4\n",
    );

    let report = world.run().await;

    assert_eq!(report.state, SessionState::Completed);
    let logs = world.logs();
    assert!(logs.iter().any(|l| l.level == LogLevel::Warning));
}

#[tokio::test]
#[serial]
async fn error_logs_fail_an_otherwise_successful_session() {
    let world = World::new(
        "sync_jobs:\n  dummy_success: true\nbtrfs_snapshots:\n  subvolumes: []\n\
         dummy_success:\n  tick_millis: 1\n  phase_ticks: 2\n  error_at_tick: 1\n",
    );

    let report = world.run().await;

    assert_eq!(report.state, SessionState::Failed);
    assert_eq!(report.job_results["dummy_success"], JobStatus::Success);
}
