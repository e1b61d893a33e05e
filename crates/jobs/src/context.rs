// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Read-only bundle handed to every job for one session.

use pcs_core::{
    Event, EventBus, Host, LogEvent, LogLevel, LogOrigin, ProgressEvent, ProgressUpdate,
    SessionId,
};
use pcs_exec::Executor;
use std::sync::Arc;

/// Everything a job may touch during a session.
///
/// Owned by the orchestrator, borrowed by the job for the duration of a
/// lifecycle call. Jobs must not retain it across sessions. Jobs emit logs
/// and progress through the bus only; they never write to the terminal.
#[derive(Clone)]
pub struct JobContext {
    /// This job's configuration block.
    pub config: serde_json::Value,
    pub source: Arc<dyn Executor>,
    pub target: Arc<dyn Executor>,
    pub bus: EventBus,
    pub job_name: String,
    pub session_id: SessionId,
    pub source_hostname: String,
    pub target_hostname: String,
    pub dry_run: bool,
}

impl JobContext {
    pub fn executor(&self, host: Host) -> Arc<dyn Executor> {
        match host {
            Host::Source => Arc::clone(&self.source),
            Host::Target => Arc::clone(&self.target),
        }
    }

    pub fn hostname(&self, host: Host) -> &str {
        match host {
            Host::Source => &self.source_hostname,
            Host::Target => &self.target_hostname,
        }
    }

    /// Publish a log record for this job.
    pub fn log(&self, host: Host, level: LogLevel, message: impl Into<String>) {
        let origin = match host {
            Host::Source => LogOrigin::Source,
            Host::Target => LogOrigin::Target,
        };
        self.bus
            .publish(Event::Log(LogEvent::new(level, &self.job_name, origin, message)));
    }

    /// Publish a prepared log event (for records carrying context fields).
    pub fn log_event(&self, event: LogEvent) {
        self.bus.publish(Event::Log(event));
    }

    /// Publish a progress update for this job.
    pub fn progress(&self, update: ProgressUpdate) {
        self.bus
            .publish(Event::Progress(ProgressEvent::new(&self.job_name, update)));
    }
}
