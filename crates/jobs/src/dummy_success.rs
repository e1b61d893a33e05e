// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Dummy job for exercising the sync infrastructure.
//!
//! Simulates a staged source phase followed by a target phase, logging every
//! tick with WARNING milestones, and reporting progress at 0/25/50/75/100.
//! Tick duration and count are configurable so tests run fast.

use crate::context::JobContext;
use crate::job::{parse_config, SyncError, SyncJob};
use async_trait::async_trait;
use pcs_core::{ConfigError, Host, LogLevel, ProgressUpdate, ValidationError};
use schemars::schema::RootSchema;
use schemars::JsonSchema;
use serde::Deserialize;
use std::time::Duration;
use tokio_util::sync::CancellationToken;

#[derive(Debug, Clone, Deserialize, JsonSchema)]
#[serde(deny_unknown_fields, default)]
pub struct DummySuccessConfig {
    /// Milliseconds per tick.
    pub tick_millis: u64,
    /// Ticks per phase.
    pub phase_ticks: u32,
    /// Emit an ERROR record at this tick of the target phase. The job still
    /// succeeds; the session fails through the error latch.
    pub error_at_tick: Option<u32>,
}

impl Default for DummySuccessConfig {
    fn default() -> Self {
        Self {
            tick_millis: 2000,
            phase_ticks: 10,
            error_at_tick: None,
        }
    }
}

pub struct DummySuccessJob {
    ctx: JobContext,
    cancel: CancellationToken,
}

impl DummySuccessJob {
    pub const NAME: &'static str = "dummy_success";

    pub fn new(ctx: JobContext, cancel: CancellationToken) -> Self {
        Self { ctx, cancel }
    }

    fn config(&self) -> DummySuccessConfig {
        parse_config(Self::NAME, &self.ctx.config).unwrap_or_default()
    }

    async fn tick(&self, millis: u64) -> Result<(), SyncError> {
        tokio::select! {
            _ = tokio::time::sleep(Duration::from_millis(millis)) => Ok(()),
            _ = self.cancel.cancelled() => {
                self.ctx
                    .log(Host::Source, LogLevel::Warning, "termination requested");
                Err(SyncError::Aborted)
            }
        }
    }

    async fn run_phase(&self, host: Host, base_percent: u8) -> Result<(), SyncError> {
        let config = self.config();
        let warn_tick = 3.min(config.phase_ticks);
        for tick in 1..=config.phase_ticks {
            self.tick(config.tick_millis).await?;
            let elapsed_ms = u64::from(tick) * config.tick_millis;
            self.ctx.log(
                host,
                LogLevel::Info,
                format!("{host} phase: {}ms elapsed", elapsed_ms),
            );
            if tick == warn_tick {
                self.ctx
                    .log(host, LogLevel::Warning, format!("test warning on {host}"));
            }
            if host == Host::Target && config.error_at_tick == Some(tick) {
                self.ctx
                    .log(host, LogLevel::Error, "test error on target");
            }
            if tick == config.phase_ticks / 2 {
                self.ctx
                    .progress(ProgressUpdate::at_percent(base_percent + 25));
            }
        }
        Ok(())
    }
}

#[async_trait]
impl SyncJob for DummySuccessJob {
    fn name(&self) -> &'static str {
        Self::NAME
    }

    fn required(&self) -> bool {
        false
    }

    fn config_schema(&self) -> RootSchema {
        schemars::schema_for!(DummySuccessConfig)
    }

    fn validate_config(&self) -> Vec<ConfigError> {
        parse_config::<DummySuccessConfig>(Self::NAME, &self.ctx.config)
            .err()
            .unwrap_or_default()
    }

    async fn validate(&self) -> Vec<ValidationError> {
        Vec::new()
    }

    async fn pre_sync(&self) -> Result<(), SyncError> {
        self.ctx
            .log(Host::Source, LogLevel::Info, "pre-sync complete");
        Ok(())
    }

    async fn sync(&self) -> Result<(), SyncError> {
        self.ctx.progress(ProgressUpdate::at_percent(0));
        self.run_phase(Host::Source, 0).await?;
        self.ctx.progress(ProgressUpdate::at_percent(50));
        self.run_phase(Host::Target, 50).await?;
        self.ctx.progress(ProgressUpdate::at_percent(100));
        Ok(())
    }

    async fn post_sync(&self) -> Result<(), SyncError> {
        self.ctx
            .log(Host::Target, LogLevel::Info, "post-sync complete");
        Ok(())
    }

    async fn abort(&self, _deadline: Duration) {
        self.cancel.cancel();
    }
}

#[cfg(test)]
#[path = "dummy_success_tests.rs"]
mod tests;
