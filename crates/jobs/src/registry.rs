// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Static registry of job implementations.
//!
//! The orchestrator looks implementations up by configured name, constructs
//! them with the session's [`JobContext`] and a fresh cancellation token,
//! and dispatches through the [`SyncJob`] capability.

use crate::context::JobContext;
use crate::disk::DiskSpaceMonitorJob;
use crate::dummy_fail::DummyFailJob;
use crate::dummy_success::DummySuccessJob;
use crate::install_on_target::InstallOnTargetJob;
use crate::job::SyncJob;
use tokio_util::sync::CancellationToken;

/// Constructor for a registered job.
pub type JobConstructor = fn(JobContext, CancellationToken) -> Box<dyn SyncJob>;

/// Every registered job, keyed by stable name.
pub const BUILTIN_JOBS: &[(&str, JobConstructor)] = &[
    (InstallOnTargetJob::NAME, |ctx, cancel| {
        Box::new(InstallOnTargetJob::new(ctx, cancel))
    }),
    (DiskSpaceMonitorJob::NAME, |ctx, cancel| {
        Box::new(DiskSpaceMonitorJob::new(ctx, cancel))
    }),
    (DummySuccessJob::NAME, |ctx, cancel| {
        Box::new(DummySuccessJob::new(ctx, cancel))
    }),
    (DummyFailJob::NAME, |ctx, cancel| {
        Box::new(DummyFailJob::new(ctx, cancel))
    }),
];

/// Whether `name` is a registered job.
pub fn is_known_job(name: &str) -> bool {
    BUILTIN_JOBS.iter().any(|(n, _)| *n == name)
}

/// Construct the job registered under `name`.
pub fn create_job(
    name: &str,
    ctx: JobContext,
    cancel: CancellationToken,
) -> Option<Box<dyn SyncJob>> {
    BUILTIN_JOBS
        .iter()
        .find(|(n, _)| *n == name)
        .map(|(_, constructor)| constructor(ctx, cancel))
}

#[cfg(test)]
#[path = "registry_tests.rs"]
mod tests;
