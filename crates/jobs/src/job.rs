// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! The job lifecycle contract.

use async_trait::async_trait;
use pcs_core::{ConfigError, ValidationError};
use pcs_exec::ExecError;
use schemars::schema::RootSchema;
use std::time::Duration;
use thiserror::Error;

/// Expected, recoverable failure of a job.
///
/// Anything else a job surfaces (a panic caught at the orchestrator
/// boundary, a transport drop) is treated as critical.
#[derive(Debug, Error)]
pub enum SyncError {
    /// The job declared its own operation failed.
    #[error("{0}")]
    Failed(String),

    /// An executor call failed underneath the job.
    #[error(transparent)]
    Exec(#[from] ExecError),

    /// The job observed its cancellation token and stopped early.
    #[error("aborted")]
    Aborted,
}

impl SyncError {
    pub fn failed(message: impl Into<String>) -> Self {
        SyncError::Failed(message.into())
    }

    /// Transport failures are fatal to the whole session.
    pub fn is_transport(&self) -> bool {
        matches!(self, SyncError::Exec(e) if e.is_transport())
    }
}

/// A pluggable unit of sync work.
///
/// Lifecycle on a single session:
///
/// ```text
/// validate_config() -> config errors      (phase 1, no I/O)
/// validate()        -> validation errors  (phase 2, read-only remote probes)
/// pre_sync()                              (source-side preparation)
/// sync()                                  (main work, streams progress)
/// post_sync()                             (target-side finalisation)
/// abort(deadline)                         (co-operative cancellation)
/// ```
///
/// Jobs receive their [`JobContext`](crate::JobContext) and cancellation
/// token once at construction and must not retain them across sessions.
#[async_trait]
pub trait SyncJob: Send + Sync {
    /// Stable job name, the key in `sync_jobs` configuration.
    fn name(&self) -> &'static str;

    /// Required jobs fail the whole session on error; optional jobs are
    /// recorded as failed and the session continues.
    fn required(&self) -> bool;

    /// JSON Schema of this job's configuration block.
    fn config_schema(&self) -> RootSchema;

    /// Phase-1 validation: check the configuration block against the
    /// schema. No side effects.
    fn validate_config(&self) -> Vec<ConfigError>;

    /// Phase-2 validation: check system state. May probe source and target
    /// read-only. Never fails the process; problems come back as entries.
    async fn validate(&self) -> Vec<ValidationError>;

    async fn pre_sync(&self) -> Result<(), SyncError>;

    async fn sync(&self) -> Result<(), SyncError>;

    async fn post_sync(&self) -> Result<(), SyncError>;

    /// Request co-operative cancellation. The orchestrator abandons the job
    /// if it has not returned by `deadline`.
    async fn abort(&self, deadline: Duration);
}

/// Parse a typed config block, mapping serde errors to [`ConfigError`]s.
pub(crate) fn parse_config<T: serde::de::DeserializeOwned>(
    job: &str,
    value: &serde_json::Value,
) -> Result<T, Vec<ConfigError>> {
    serde_json::from_value(value.clone()).map_err(|e| {
        vec![ConfigError {
            job: Some(job.to_string()),
            path: job.to_string(),
            message: e.to_string(),
        }]
    })
}
