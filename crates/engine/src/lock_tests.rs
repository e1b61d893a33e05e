// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;
use pcs_core::SessionId;
use pcs_exec::ScriptedTransport;

fn holder(role: SyncRole, host: &str, id: &str) -> LockHolder {
    LockHolder::new(role, host, SessionId::from(id))
}

#[test]
fn holder_triple_round_trips() {
    let h = holder(SyncRole::Source, "hostB", "ab12cd34");
    assert_eq!(h.to_string(), "source:hostB:ab12cd34");
    assert_eq!(LockHolder::parse("source:hostB:ab12cd34").unwrap(), h);
}

#[test]
fn holder_parse_rejects_garbage() {
    assert!(LockHolder::parse("").is_none());
    assert!(LockHolder::parse("nonsense").is_none());
    assert!(LockHolder::parse("admin:host:1234").is_none());
}

#[test]
fn acquire_writes_the_holder_triple() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("pc-switcher.lock");
    let mut lock = SyncLock::new(&path);

    assert!(lock.acquire(&holder(SyncRole::Source, "laptop", "ab12cd34")).unwrap());
    assert!(lock.is_held());
    assert_eq!(
        std::fs::read_to_string(&path).unwrap(),
        "source:laptop:ab12cd34"
    );
}

#[test]
fn second_acquirer_is_refused_and_sees_the_holder() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("pc-switcher.lock");

    let mut a = SyncLock::new(&path);
    assert!(a.acquire(&holder(SyncRole::Source, "hostA", "aaaa1111")).unwrap());

    let mut b = SyncLock::new(&path);
    assert!(!b.acquire(&holder(SyncRole::Source, "hostB", "bbbb2222")).unwrap());
    assert!(!b.is_held());

    // B reads A's triple for diagnostics
    let current = b.holder().unwrap();
    assert_eq!(current.hostname, "hostA");

    // A releases; B's next acquire succeeds with its own holder
    a.release();
    assert!(b.acquire(&holder(SyncRole::Source, "hostB", "bbbb2222")).unwrap());
    assert_eq!(
        std::fs::read_to_string(&path).unwrap(),
        "source:hostB:bbbb2222"
    );
}

#[test]
fn release_removes_the_lock_file() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("pc-switcher.lock");
    let mut lock = SyncLock::new(&path);
    lock.acquire(&holder(SyncRole::Source, "laptop", "ab12cd34")).unwrap();
    lock.release();
    assert!(!path.exists());
}

#[test]
fn release_is_idempotent() {
    let dir = tempfile::tempdir().unwrap();
    let mut lock = SyncLock::new(dir.path().join("l"));
    lock.acquire(&holder(SyncRole::Source, "laptop", "ab12cd34")).unwrap();
    lock.release();
    lock.release();
}

#[test]
fn drop_releases_the_lock() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("pc-switcher.lock");
    {
        let mut lock = SyncLock::new(&path);
        lock.acquire(&holder(SyncRole::Source, "laptop", "ab12cd34")).unwrap();
    }
    let mut next = SyncLock::new(&path);
    assert!(next.acquire(&holder(SyncRole::Source, "laptop", "ffff9999")).unwrap());
}

#[test]
fn acquire_creates_missing_parent_directories() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("deep/nested/pc-switcher.lock");
    let mut lock = SyncLock::new(&path);
    assert!(lock.acquire(&holder(SyncRole::Source, "laptop", "ab12cd34")).unwrap());
}

#[tokio::test]
async fn remote_lock_acquires_when_the_shell_reports_locked() {
    let transport = ScriptedTransport::new();
    transport.executor().respond("mkdir -p", 0, "LOCKED\n", "");

    let outcome = RemoteLock::acquire(
        &transport,
        &holder(SyncRole::Target, "desktop", "ab12cd34"),
    )
    .await
    .unwrap();
    assert!(matches!(outcome, RemoteLockOutcome::Acquired(_)));
    assert!(transport.executor().ran_matching("flock -n 9"));
    assert!(transport
        .executor()
        .ran_matching("target:desktop:ab12cd34"));
}

#[tokio::test]
async fn remote_lock_contention_reports_the_current_holder() {
    let transport = ScriptedTransport::new();
    transport.executor().respond("mkdir -p", 0, "CONTENDED\n", "");
    transport
        .executor()
        .respond("cat ", 0, "source:other:11112222\n", "");

    let outcome = RemoteLock::acquire(
        &transport,
        &holder(SyncRole::Target, "desktop", "ab12cd34"),
    )
    .await
    .unwrap();
    match outcome {
        RemoteLockOutcome::Contended(Some(current)) => {
            assert_eq!(current.hostname, "other");
            assert_eq!(current.role, SyncRole::Source);
        }
        _ => panic!("expected contention with a readable holder"),
    }
}
