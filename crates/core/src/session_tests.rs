// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;
use crate::model::JobStatus;

fn session() -> SyncSession {
    SyncSession::new("laptop", "desktop", vec!["dummy_success".into()], false)
}

#[test]
fn session_id_is_eight_hex_chars() {
    let id = SessionId::generate();
    assert_eq!(id.as_str().len(), 8);
    assert!(id.as_str().chars().all(|c| c.is_ascii_hexdigit()));
}

#[test]
fn session_ids_are_unique() {
    assert_ne!(SessionId::generate(), SessionId::generate());
}

#[test]
fn normal_lifecycle_transitions_are_accepted() {
    let mut s = session();
    s.set_state(SessionState::Validating).unwrap();
    s.set_state(SessionState::Executing).unwrap();
    s.set_state(SessionState::Cleanup).unwrap();
    s.set_state(SessionState::Completed).unwrap();
    assert!(s.state().is_terminal());
}

#[test]
fn skipping_states_is_rejected() {
    let mut s = session();
    let err = s.set_state(SessionState::Executing).unwrap_err();
    assert_eq!(err.from, SessionState::Initializing);
    assert_eq!(err.to, SessionState::Executing);
}

#[test]
fn failure_from_initializing_is_allowed() {
    let mut s = session();
    s.set_state(SessionState::Failed).unwrap();
}

#[test]
fn terminal_states_accept_no_transitions() {
    let mut s = session();
    s.set_state(SessionState::Failed).unwrap();
    assert!(s.set_state(SessionState::Validating).is_err());
    assert!(s.set_state(SessionState::Completed).is_err());
}

#[test]
fn abort_latch_is_monotonic() {
    let s = session();
    assert!(!s.abort_requested());
    s.request_abort();
    s.request_abort();
    assert!(s.abort_requested());
}

#[test]
fn error_latch_is_shared() {
    let s = session();
    let latch = s.error_latch();
    latch.store(true, std::sync::atomic::Ordering::SeqCst);
    assert!(s.has_errors());
}

#[test]
fn failed_result_latches_errors() {
    let mut s = session();
    s.record_result("dummy_fail", JobStatus::Failed);
    assert!(s.has_errors());
    assert_eq!(s.job_results()["dummy_fail"], JobStatus::Failed);
}

#[test]
fn successful_result_does_not_latch_errors() {
    let mut s = session();
    s.record_result("dummy_success", JobStatus::Success);
    assert!(!s.has_errors());
}
