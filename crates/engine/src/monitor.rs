// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Runtime disk-space watchdog.
//!
//! Runs for the duration of EXECUTING, re-checking free space on both
//! machines every `check_interval` seconds against the runtime threshold.
//! A breach publishes a CRITICAL record and latches a failure message the
//! orchestrator picks up between job lifecycle stages.

use parking_lot::Mutex;
use pcs_core::{Event, EventBus, Host, LogEvent, LogLevel, LogOrigin, Threshold};
use pcs_exec::Executor;
use pcs_jobs::disk::{check_disk_space, format_bytes};
use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::debug;

const JOB_NAME: &str = "disk_space_monitor";

/// Background free-space monitor for one session.
pub struct DiskWatchdog {
    cancel: CancellationToken,
    breach: Arc<Mutex<Option<String>>>,
    task: JoinHandle<()>,
}

impl DiskWatchdog {
    pub fn spawn(
        source: Arc<dyn Executor>,
        target: Arc<dyn Executor>,
        mount_point: String,
        runtime_minimum: Threshold,
        check_interval: Duration,
        bus: EventBus,
    ) -> Self {
        let cancel = CancellationToken::new();
        let breach = Arc::new(Mutex::new(None));

        let task = {
            let cancel = cancel.clone();
            let breach = Arc::clone(&breach);
            tokio::spawn(async move {
                loop {
                    tokio::select! {
                        _ = cancel.cancelled() => return,
                        _ = tokio::time::sleep(check_interval) => {}
                    }
                    for (host, executor) in
                        [(Host::Source, &source), (Host::Target, &target)]
                    {
                        match check_disk_space(executor.as_ref(), &mount_point).await {
                            Ok(space) => {
                                if !space.satisfies(&runtime_minimum) {
                                    let message = format!(
                                        "disk space {} on {host} below runtime minimum {}",
                                        format_bytes(space.available_bytes),
                                        runtime_minimum,
                                    );
                                    let origin = match host {
                                        Host::Source => LogOrigin::Source,
                                        Host::Target => LogOrigin::Target,
                                    };
                                    bus.publish(Event::Log(LogEvent::new(
                                        LogLevel::Critical,
                                        JOB_NAME,
                                        origin,
                                        message.clone(),
                                    )));
                                    *breach.lock() = Some(message);
                                    return;
                                }
                            }
                            Err(e) => {
                                // A failed probe is not a breach; keep watching
                                debug!(%host, error = %e, "disk check failed");
                            }
                        }
                    }
                }
            })
        };

        Self {
            cancel,
            breach,
            task,
        }
    }

    /// The breach message, when the runtime threshold was crossed.
    pub fn breach(&self) -> Option<String> {
        self.breach.lock().clone()
    }

    pub async fn stop(self) {
        self.cancel.cancel();
        let _ = self.task.await;
    }
}

#[cfg(test)]
#[path = "monitor_tests.rs"]
mod tests;
