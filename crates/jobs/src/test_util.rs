// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Shared helpers for job tests.

use crate::context::JobContext;
use pcs_core::{Event, EventBus, LogLevel, SessionId};
use pcs_exec::ScriptedExecutor;
use std::sync::Arc;
use tokio::sync::mpsc::UnboundedReceiver;

pub(crate) struct JobFixture {
    pub ctx: JobContext,
    pub source: ScriptedExecutor,
    pub target: ScriptedExecutor,
    pub events: UnboundedReceiver<Event>,
}

pub(crate) fn fixture(job_name: &str, config: serde_json::Value) -> JobFixture {
    let bus = EventBus::new();
    let events = bus.subscribe();
    let source = ScriptedExecutor::new(pcs_core::Host::Source);
    let target = ScriptedExecutor::new(pcs_core::Host::Target);
    let ctx = JobContext {
        config,
        source: Arc::new(source.clone()),
        target: Arc::new(target.clone()),
        bus,
        job_name: job_name.to_string(),
        session_id: SessionId::generate(),
        source_hostname: "laptop".to_string(),
        target_hostname: "desktop".to_string(),
        dry_run: false,
    };
    JobFixture {
        ctx,
        source,
        target,
        events,
    }
}

/// Drain currently queued events, returning (level, message) pairs for logs
/// and percents for progress updates.
pub(crate) fn drain_events(
    events: &mut UnboundedReceiver<Event>,
) -> (Vec<(LogLevel, String)>, Vec<Option<u8>>) {
    let mut logs = Vec::new();
    let mut percents = Vec::new();
    while let Ok(event) = events.try_recv() {
        match event {
            Event::Log(log) => logs.push((log.level, log.message)),
            Event::Progress(progress) => percents.push(progress.update.percent),
            _ => {}
        }
    }
    (logs, percents)
}
