// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Dummy job that fails at a configurable progress percentage.
//!
//! Exercises error handling: progresses in 10% steps, then logs CRITICAL
//! and returns a failure once the configured percentage is reached.

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
pub struct DummyFailConfig {
    /// Percentage at which the job fails, 0-100.
    pub fail_at_percent: u8,
    /// Milliseconds per 10% step.
    pub tick_millis: u64,
}

impl Default for DummyFailConfig {
    fn default() -> Self {
        Self {
            fail_at_percent: 60,
            tick_millis: 1000,
        }
    }
}

pub struct DummyFailJob {
    ctx: JobContext,
    cancel: CancellationToken,
}

impl DummyFailJob {
    pub const NAME: &'static str = "dummy_fail";

    pub fn new(ctx: JobContext, cancel: CancellationToken) -> Self {
        Self { ctx, cancel }
    }

    fn config(&self) -> DummyFailConfig {
        parse_config(Self::NAME, &self.ctx.config).unwrap_or_default()
    }
}

#[async_trait]
impl SyncJob for DummyFailJob {
    fn name(&self) -> &'static str {
        Self::NAME
    }

    fn required(&self) -> bool {
        true
    }

    fn config_schema(&self) -> RootSchema {
        schemars::schema_for!(DummyFailConfig)
    }

    fn validate_config(&self) -> Vec<ConfigError> {
        match parse_config::<DummyFailConfig>(Self::NAME, &self.ctx.config) {
            Ok(config) if config.fail_at_percent > 100 => vec![ConfigError {
                job: Some(Self::NAME.to_string()),
                path: format!("{}.fail_at_percent", Self::NAME),
                message: "must be between 0 and 100".to_string(),
            }],
            Ok(_) => Vec::new(),
            Err(errors) => errors,
        }
    }

    async fn validate(&self) -> Vec<ValidationError> {
        Vec::new()
    }

    async fn pre_sync(&self) -> Result<(), SyncError> {
        let config = self.config();
        self.ctx.log(
            Host::Source,
            LogLevel::Info,
            format!("will fail at {}%", config.fail_at_percent),
        );
        Ok(())
    }

    async fn sync(&self) -> Result<(), SyncError> {
        let config = self.config();
        self.ctx.progress(ProgressUpdate::at_percent(0));

        for percent in (10..=100).step_by(10) {
            tokio::select! {
                _ = tokio::time::sleep(Duration::from_millis(config.tick_millis)) => {}
                _ = self.cancel.cancelled() => {
                    self.ctx.log(Host::Source, LogLevel::Warning, "cancelled");
                    return Err(SyncError::Aborted);
                }
            }
            let percent = percent as u8;
            self.ctx.progress(ProgressUpdate::at_percent(percent));
            self.ctx
                .log(Host::Source, LogLevel::Info, format!("progress: {percent}%"));

            if percent >= config.fail_at_percent {
                self.ctx.log(
                    Host::Source,
                    LogLevel::Critical,
                    format!("simulated failure at {percent}%"),
                );
                return Err(SyncError::failed(format!(
                    "dummy job failed at {percent}%"
                )));
            }
        }
        Ok(())
    }

    async fn post_sync(&self) -> Result<(), SyncError> {
        Ok(())
    }

    async fn abort(&self, _deadline: Duration) {
        self.cancel.cancel();
    }
}

#[cfg(test)]
#[path = "dummy_fail_tests.rs"]
mod tests;
