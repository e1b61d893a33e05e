//! Snapshot retention scenarios.

use chrono::{TimeZone, Utc};
use pcs_core::{BtrfsConfig, EventBus, Host, SessionId};
use pcs_engine::snapshots::SnapshotEnvelope;
use pcs_exec::ScriptedExecutor;
use std::sync::Arc;

const SIX_FOLDERS: &str = "\
20250101T000000-aaaa0001
20250201T000000-aaaa0002
20250301T000000-aaaa0003
20250401T000000-aaaa0004
20250501T000000-aaaa0005
20250601T000000-aaaa0006";

fn envelope(keep_recent: usize) -> (SnapshotEnvelope, ScriptedExecutor, ScriptedExecutor) {
    let source = ScriptedExecutor::new(Host::Source);
    let target = ScriptedExecutor::new(Host::Target);
    let config = BtrfsConfig {
        subvolumes: vec!["@home".to_string()],
        keep_recent,
        max_age_days: None,
        rollback_on_failure: false,
    };
    let envelope = SnapshotEnvelope::new(
        Arc::new(source.clone()),
        Arc::new(target.clone()),
        config,
        EventBus::new(),
        SessionId::from("abc12345"),
        Utc.with_ymd_and_hms(2025, 11, 29, 14, 30, 22).unwrap(),
        false,
    );
    (envelope, source, target)
}

#[tokio::test]
async fn s6_retain_keeps_two_newest_and_deletes_contents_first() {
    let (envelope, source, target) = envelope(2);
    for exec in [&source, &target] {
        exec.respond("ls -1 /.snapshots/pc-switcher 2>/dev/null", 0, SIX_FOLDERS, "");
        exec.respond(
            "ls -1 /.snapshots/pc-switcher/2025",
            0,
            "pre-@home-20250101T000000\npost-@home-20250101T000100\n",
            "",
        );
    }

    let deleted = envelope.retain().await.unwrap();

    // Four folders deleted per host, two snapshots each
    assert_eq!(deleted.len(), 16);
    for old in [
        "20250101T000000-aaaa0001",
        "20250201T000000-aaaa0002",
        "20250301T000000-aaaa0003",
        "20250401T000000-aaaa0004",
    ] {
        assert!(source.ran_matching(&format!("rmdir /.snapshots/pc-switcher/{old}")));
        assert!(target.ran_matching(&format!("rmdir /.snapshots/pc-switcher/{old}")));
    }
    for kept in ["20250501T000000-aaaa0005", "20250601T000000-aaaa0006"] {
        assert!(!source.ran_matching(&format!("rmdir /.snapshots/pc-switcher/{kept}")));
    }

    // Snapshot subvolumes are deleted before their folder
    let calls = source.calls();
    let first_delete = calls
        .iter()
        .position(|c| c.contains("subvolume delete"))
        .unwrap();
    let first_rmdir = calls.iter().position(|c| c.contains("rmdir")).unwrap();
    assert!(first_delete < first_rmdir);
}

#[tokio::test]
async fn s6_second_retain_with_same_policy_deletes_nothing() {
    let (envelope, source, target) = envelope(2);
    // After the first pass only the two newest folders remain
    for exec in [&source, &target] {
        exec.respond(
            "ls -1 /.snapshots/pc-switcher 2>/dev/null",
            0,
            "20250501T000000-aaaa0005\n20250601T000000-aaaa0006",
            "",
        );
    }

    let deleted = envelope.retain().await.unwrap();
    assert!(deleted.is_empty());
    assert!(!source.ran_matching("subvolume delete"));
    assert!(!source.ran_matching("rmdir"));
}
