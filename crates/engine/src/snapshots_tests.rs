// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;
use chrono::TimeZone;
use pcs_core::EventBus;
use pcs_exec::ScriptedExecutor;
use yare::parameterized;

fn envelope_with(
    subvolumes: &[&str],
    keep_recent: usize,
    max_age_days: Option<u32>,
    dry_run: bool,
) -> (SnapshotEnvelope, ScriptedExecutor, ScriptedExecutor) {
    let source = ScriptedExecutor::new(Host::Source);
    let target = ScriptedExecutor::new(Host::Target);
    let config = BtrfsConfig {
        subvolumes: subvolumes.iter().map(ToString::to_string).collect(),
        keep_recent,
        max_age_days,
        rollback_on_failure: false,
    };
    let started = Utc.with_ymd_and_hms(2025, 11, 29, 14, 30, 22).unwrap();
    let envelope = SnapshotEnvelope::new(
        Arc::new(source.clone()),
        Arc::new(target.clone()),
        config,
        EventBus::new(),
        SessionId::from("abc12345"),
        started,
        dry_run,
    );
    (envelope, source, target)
}

#[parameterized(
    root = { "@", "/" },
    home = { "@home", "/home" },
    var = { "@var", "/var" },
)]
fn mount_points_follow_convention(subvolume: &str, expected: &str) {
    assert_eq!(subvolume_to_mount_point(subvolume).unwrap(), expected);
}

#[test]
fn bare_names_are_invalid_subvolumes() {
    assert!(subvolume_to_mount_point("home").is_err());
}

#[test]
fn snapshot_name_contract() {
    let at = Utc.with_ymd_and_hms(2025, 11, 29, 14, 30, 22).unwrap();
    assert_eq!(
        snapshot_name(SnapshotPhase::Pre, "@home", at),
        "pre-@home-20251129T143022"
    );
    assert_eq!(
        snapshot_name(SnapshotPhase::Post, "@", at),
        "post-@-20251129T143022"
    );
}

#[test]
fn snapshot_path_parse_and_format_are_inverses() {
    let path = "/.snapshots/pc-switcher/20251129T143022-abc12345/pre-@home-20251129T143022";
    let info = parse_snapshot_path(path).unwrap();
    assert_eq!(info.subvolume, "@home");
    assert_eq!(info.phase, SnapshotPhase::Pre);
    assert_eq!(info.session_id.as_str(), "abc12345");
    assert_eq!(info.name(), "pre-@home-20251129T143022");
    assert_eq!(info.path, path);
}

#[parameterized(
    bad_phase = { "/.snapshots/pc-switcher/20251129T143022-abc12345/mid-@home-20251129T143022" },
    bad_session = { "/.snapshots/pc-switcher/20251129T143022-nothex/pre-@home-20251129T143022" },
    bad_timestamp = { "/.snapshots/pc-switcher/20251129T143022-abc12345/pre-@home-2025" },
    no_at_prefix = { "/.snapshots/pc-switcher/20251129T143022-abc12345/pre-home-20251129T143022" },
)]
fn malformed_paths_do_not_parse(path: &str) {
    assert!(parse_snapshot_path(path).is_none());
}

#[tokio::test]
async fn create_snapshots_both_hosts_every_subvolume() {
    let (envelope, source, target) = envelope_with(&["@", "@home"], 3, None, false);

    envelope.create(SnapshotPhase::Pre).await.unwrap();

    for exec in [&source, &target] {
        assert!(exec.ran_matching("sudo mkdir -p /.snapshots/pc-switcher/20251129T143022-abc12345"));
        assert!(exec.ran_matching("btrfs subvolume snapshot -r / /.snapshots"));
        assert!(exec.ran_matching("btrfs subvolume snapshot -r /home /.snapshots"));
        assert!(exec.ran_matching("/pre-@home-"));
    }
}

#[tokio::test]
async fn create_failure_is_critical() {
    let (envelope, source, _) = envelope_with(&["@home"], 3, None, false);
    source.respond(
        "sudo btrfs subvolume snapshot -r /home",
        1,
        "",
        "ERROR: cannot snapshot",
    );

    let err = envelope.create(SnapshotPhase::Pre).await.unwrap_err();
    assert!(matches!(err, EnvelopeError::SnapshotFailed { .. }));
}

#[tokio::test]
async fn disabled_envelope_does_nothing() {
    let (envelope, source, target) = envelope_with(&[], 3, None, false);
    assert!(!envelope.enabled());

    envelope.create(SnapshotPhase::Pre).await.unwrap();
    assert!(envelope.retain().await.unwrap().is_empty());
    assert!(source.calls().is_empty());
    assert!(target.calls().is_empty());
}

#[tokio::test]
async fn dry_run_logs_and_runs_nothing_state_changing() {
    let (envelope, source, _) = envelope_with(&["@home"], 3, None, true);
    envelope.create(SnapshotPhase::Pre).await.unwrap();
    assert!(!source.ran_matching("btrfs subvolume snapshot"));
}

#[tokio::test]
async fn validate_passes_on_healthy_hosts() {
    let (envelope, source, target) = envelope_with(&["@home"], 3, None, false);
    for exec in [&source, &target] {
        exec.respond("sudo btrfs subvolume show /.snapshots", 0, "/.snapshots", "");
        exec.respond("sudo btrfs subvolume show /home", 0, "@home\n", "");
    }
    assert!(envelope.validate().await.is_empty());
}

#[tokio::test]
async fn validate_creates_a_missing_snapshot_root() {
    let (envelope, source, target) = envelope_with(&["@home"], 3, None, false);
    for exec in [&source, &target] {
        exec.respond("sudo btrfs subvolume show /.snapshots", 1, "", "not found");
        exec.respond("sudo btrfs subvolume create /.snapshots", 0, "", "");
        exec.respond("sudo btrfs subvolume show /home", 0, "@home\n", "");
    }
    assert!(envelope.validate().await.is_empty());
    assert!(source.ran_matching("btrfs subvolume create /.snapshots"));
}

#[tokio::test]
async fn validate_flags_missing_subvolumes_per_host() {
    let (envelope, source, target) = envelope_with(&["@home"], 3, None, false);
    for exec in [&source, &target] {
        exec.respond("sudo btrfs subvolume show /.snapshots", 0, "ok", "");
    }
    source.respond("sudo btrfs subvolume show /home", 1, "", "no such subvolume");
    target.respond("sudo btrfs subvolume show /home", 0, "@home\n", "");

    let errors = envelope.validate().await;
    assert_eq!(errors.len(), 1);
    assert_eq!(errors[0].host, Host::Source);
    assert!(errors[0].message.contains("@home"));
}

#[tokio::test]
async fn validate_flags_wrong_subvolume_name() {
    let (envelope, source, target) = envelope_with(&["@home"], 3, None, false);
    for exec in [&source, &target] {
        exec.respond("sudo btrfs subvolume show /.snapshots", 0, "ok", "");
        exec.respond("sudo btrfs subvolume show /home", 0, "@data\n", "");
    }
    let errors = envelope.validate().await;
    assert_eq!(errors.len(), 2);
    assert!(errors[0].message.contains("is not subvolume"));
}

fn folder_listing() -> String {
    // Six session folders, timestamps strictly increasing
    [
        "20250101T000000-aaaa0001",
        "20250201T000000-aaaa0002",
        "20250301T000000-aaaa0003",
        "20250401T000000-aaaa0004",
        "20250501T000000-aaaa0005",
        "20250601T000000-aaaa0006",
    ]
    .join("\n")
}

#[tokio::test]
async fn retain_keeps_the_newest_folders() {
    let (envelope, source, target) = envelope_with(&["@home"], 2, None, false);
    for exec in [&source, &target] {
        exec.respond("ls -1 /.snapshots/pc-switcher 2>/dev/null", 0, &folder_listing(), "");
        // Each deleted folder holds one snapshot
        exec.respond("ls -1 /.snapshots/pc-switcher/2025", 0, "pre-@home-20250101T000000\n", "");
    }

    let deleted = envelope.retain().await.unwrap();

    // Four old folders deleted on each host
    assert_eq!(deleted.len(), 8);
    assert!(source.ran_matching("btrfs subvolume delete /.snapshots/pc-switcher/20250101T000000-aaaa0001/"));
    assert!(!source.ran_matching("delete /.snapshots/pc-switcher/20250601T000000-aaaa0006"));
    assert!(!source.ran_matching("delete /.snapshots/pc-switcher/20250501T000000-aaaa0005"));
    assert!(source.ran_matching("rmdir /.snapshots/pc-switcher/20250101T000000-aaaa0001"));
}

#[tokio::test]
async fn retain_is_idempotent_when_nothing_is_beyond_policy() {
    let (envelope, source, target) = envelope_with(&["@home"], 10, None, false);
    for exec in [&source, &target] {
        exec.respond("ls -1 /.snapshots/pc-switcher 2>/dev/null", 0, &folder_listing(), "");
    }
    let deleted = envelope.retain().await.unwrap();
    assert!(deleted.is_empty());
    assert!(!source.ran_matching("btrfs subvolume delete"));
}

#[tokio::test]
async fn retain_applies_the_age_policy() {
    // keep_recent covers everything, but all folders are from 2025 and far
    // older than one day
    let (envelope, source, target) = envelope_with(&["@home"], 10, Some(1), false);
    for exec in [&source, &target] {
        exec.respond("ls -1 /.snapshots/pc-switcher 2>/dev/null", 0, &folder_listing(), "");
        exec.respond("ls -1 /.snapshots/pc-switcher/2025", 0, "", "");
    }
    envelope.retain().await.unwrap();
    assert!(source.ran_matching("rmdir /.snapshots/pc-switcher/20250101T000000-aaaa0001"));
    assert!(source.ran_matching("rmdir /.snapshots/pc-switcher/20250601T000000-aaaa0006"));
}

#[tokio::test]
async fn rollback_restores_from_pre_snapshots_on_the_target() {
    let (envelope, source, target) = envelope_with(&["@home"], 3, None, false);
    target.respond(
        "ls -1 /.snapshots/pc-switcher/20251129T143022-abc12345",
        0,
        "pre-@home-20251129T143022\npost-@home-20251129T150000\n",
        "",
    );

    envelope.rollback().await.unwrap();

    assert!(target.ran_matching(
        "sudo btrfs subvolume snapshot /.snapshots/pc-switcher/20251129T143022-abc12345/pre-@home-20251129T143022"
    ));
    assert!(target.ran_matching("restore-@home"));
    assert!(source.calls().is_empty());
}

#[tokio::test]
async fn rollback_without_pre_snapshots_fails() {
    let (envelope, _, target) = envelope_with(&["@home"], 3, None, false);
    target.respond(
        "ls -1 /.snapshots/pc-switcher/20251129T143022-abc12345",
        0,
        "post-@home-20251129T150000\n",
        "",
    );
    let err = envelope.rollback().await.unwrap_err();
    assert!(matches!(err, EnvelopeError::RollbackFailed { .. }));
}
