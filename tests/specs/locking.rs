//! Lock contention scenarios.

use pcs_core::{SessionId, SyncRole};
use pcs_engine::{LockHolder, SyncLock};

fn holder(host: &str, id: &str) -> LockHolder {
    LockHolder::new(SyncRole::Source, host, SessionId::from(id))
}

#[test]
fn s4_contender_sees_holder_then_acquires_after_release() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("pc-switcher.lock");

    // Process A holds the lock
    let mut a = SyncLock::new(&path);
    assert!(a.acquire(&holder("hostA", "ses1ses1")).unwrap());

    // B's acquire returns false and reads A's triple
    let mut b = SyncLock::new(&path);
    assert!(!b.acquire(&holder("hostB", "ses2ses2")).unwrap());
    assert_eq!(
        b.holder().unwrap().to_string(),
        "source:hostA:ses1ses1"
    );

    // A releases; B's next acquire succeeds with holder B
    a.release();
    assert!(b.acquire(&holder("hostB", "ses2ses2")).unwrap());
    assert_eq!(
        std::fs::read_to_string(&path).unwrap(),
        "source:hostB:ses2ses2"
    );
}

#[test]
fn crashed_holder_never_leaves_a_stale_lock() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("pc-switcher.lock");

    // The holder goes away without an explicit release(); closing the
    // descriptor is what frees the lock
    {
        let mut a = SyncLock::new(&path);
        assert!(a.acquire(&holder("hostA", "ses1ses1")).unwrap());
    }

    let mut b = SyncLock::new(&path);
    assert!(b.acquire(&holder("hostB", "ses2ses2")).unwrap());
}

#[test]
fn acquire_release_acquire_cycles_with_fresh_holders() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("pc-switcher.lock");
    let mut lock = SyncLock::new(&path);

    for round in 0..3 {
        let id = format!("aaaa000{round}");
        assert!(lock.acquire(&holder("laptop", &id)).unwrap());
        assert_eq!(
            std::fs::read_to_string(&path).unwrap(),
            format!("source:laptop:{id}")
        );
        lock.release();
    }
}
