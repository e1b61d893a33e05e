// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Sync session state and identifier.

use crate::model::{JobStatus, SessionState};
use chrono::{DateTime, Utc};
use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use thiserror::Error;

/// Unique identifier for a sync session: 8 lowercase hex characters.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct SessionId(String);

impl SessionId {
    /// Generate a fresh session id from a UUIDv4.
    pub fn generate() -> Self {
        let full = uuid::Uuid::new_v4().simple().to_string();
        Self(full[..8].to_string())
    }

    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for SessionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for SessionId {
    fn from(s: &str) -> Self {
        Self(s.to_string())
    }
}

/// Attempted state transition not allowed by the session lifecycle.
#[derive(Debug, Error)]
#[error("invalid session state transition: {from} -> {to}")]
pub struct InvalidTransition {
    pub from: SessionState,
    pub to: SessionState,
}

/// One sync operation from source to target.
///
/// State is mutated only by the orchestrator; the `has_errors` and
/// `abort_requested` latches are shared atomics so the logging sink and the
/// interrupt controller can set them from their own tasks. Both are
/// monotonic: once set they stay set.
#[derive(Debug)]
pub struct SyncSession {
    pub id: SessionId,
    pub started_at: DateTime<Utc>,
    pub source_hostname: String,
    pub target_hostname: String,
    pub enabled_jobs: Vec<String>,
    pub dry_run: bool,
    state: SessionState,
    job_results: IndexMap<String, JobStatus>,
    has_errors: Arc<AtomicBool>,
    abort_requested: Arc<AtomicBool>,
}

impl SyncSession {
    pub fn new(
        source_hostname: impl Into<String>,
        target_hostname: impl Into<String>,
        enabled_jobs: Vec<String>,
        dry_run: bool,
    ) -> Self {
        Self {
            id: SessionId::generate(),
            started_at: Utc::now(),
            source_hostname: source_hostname.into(),
            target_hostname: target_hostname.into(),
            enabled_jobs,
            dry_run,
            state: SessionState::Initializing,
            job_results: IndexMap::new(),
            has_errors: Arc::new(AtomicBool::new(false)),
            abort_requested: Arc::new(AtomicBool::new(false)),
        }
    }

    pub fn state(&self) -> SessionState {
        self.state
    }

    /// Transition to a new state, enforcing the lifecycle graph.
    pub fn set_state(&mut self, new_state: SessionState) -> Result<(), InvalidTransition> {
        use SessionState::*;
        let ok = matches!(
            (self.state, new_state),
            (Initializing, Validating)
                | (Initializing, Failed)
                | (Validating, Executing)
                | (Validating, Failed)
                | (Validating, Aborted)
                | (Executing, Cleanup)
                | (Executing, Failed)
                | (Cleanup, Completed)
                | (Cleanup, Aborted)
                | (Cleanup, Failed)
        );
        if !ok {
            return Err(InvalidTransition {
                from: self.state,
                to: new_state,
            });
        }
        self.state = new_state;
        Ok(())
    }

    /// Record the terminal result of a job that was entered.
    pub fn record_result(&mut self, job: impl Into<String>, status: JobStatus) {
        if status == JobStatus::Failed {
            self.mark_errors();
        }
        self.job_results.insert(job.into(), status);
    }

    pub fn job_results(&self) -> &IndexMap<String, JobStatus> {
        &self.job_results
    }

    pub fn has_errors(&self) -> bool {
        self.has_errors.load(Ordering::SeqCst)
    }

    /// Latch the error flag. Never cleared.
    pub fn mark_errors(&self) {
        self.has_errors.store(true, Ordering::SeqCst);
    }

    pub fn abort_requested(&self) -> bool {
        self.abort_requested.load(Ordering::SeqCst)
    }

    /// Latch the abort flag. Never cleared.
    pub fn request_abort(&self) {
        self.abort_requested.store(true, Ordering::SeqCst);
    }

    /// Shared handle to the error latch (given to the logging sink).
    pub fn error_latch(&self) -> Arc<AtomicBool> {
        Arc::clone(&self.has_errors)
    }

    /// Shared handle to the abort latch (given to the interrupt controller).
    pub fn abort_latch(&self) -> Arc<AtomicBool> {
        Arc::clone(&self.abort_requested)
    }
}

#[cfg(test)]
#[path = "session_tests.rs"]
mod tests;
