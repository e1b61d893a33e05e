// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Disk space checks for source and target.
//!
//! The job validates the preflight threshold on both hosts before any sync
//! work starts. The continuous runtime watchdog that re-checks
//! `runtime_minimum` during execution lives in the engine and reuses
//! [`check_disk_space`].

use crate::context::JobContext;
use crate::job::{parse_config, SyncError, SyncJob};
use async_trait::async_trait;
use pcs_core::{ConfigError, Host, LogLevel, Threshold, ValidationError};
use pcs_exec::Executor;
use schemars::schema::RootSchema;
use schemars::JsonSchema;
use serde::Deserialize;
use std::time::Duration;
use tokio_util::sync::CancellationToken;

/// Disk space for one mount point, from `df -B1`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DiskSpace {
    pub total_bytes: u64,
    pub used_bytes: u64,
    pub available_bytes: u64,
}

impl DiskSpace {
    /// Whether free space satisfies the threshold.
    pub fn satisfies(&self, threshold: &Threshold) -> bool {
        self.available_bytes >= threshold.required_bytes(self.total_bytes)
    }
}

/// Parse `df -B1` output for a mount point.
pub fn parse_df_output(output: &str, mount_point: &str) -> Option<DiskSpace> {
    for line in output.trim().lines().skip(1) {
        let parts: Vec<&str> = line.split_whitespace().collect();
        if parts.len() >= 6 && parts[5] == mount_point {
            return Some(DiskSpace {
                total_bytes: parts[1].parse().ok()?,
                used_bytes: parts[2].parse().ok()?,
                available_bytes: parts[3].parse().ok()?,
            });
        }
    }
    None
}

/// Check disk space for a mount point through an executor.
pub async fn check_disk_space(
    executor: &dyn Executor,
    mount_point: &str,
) -> Result<DiskSpace, SyncError> {
    let result = executor.run(&format!("df -B1 {mount_point}")).await?;
    if !result.success() {
        return Err(SyncError::failed(format!(
            "df failed for {mount_point}: {}",
            result.stderr.trim()
        )));
    }
    parse_df_output(&result.stdout, mount_point).ok_or_else(|| {
        SyncError::failed(format!("mount point {mount_point} not found in df output"))
    })
}

/// Human-readable byte count for log messages (GiB with two decimals).
pub fn format_bytes(bytes: u64) -> String {
    format!("{:.2}GiB", bytes as f64 / (1u64 << 30) as f64)
}

#[derive(Debug, Clone, Deserialize, JsonSchema)]
#[serde(deny_unknown_fields, default)]
pub struct DiskMonitorConfig {
    /// Free-space floor checked before any job runs.
    #[schemars(with = "String")]
    pub preflight_minimum: Threshold,
    /// Free-space floor enforced while jobs run.
    #[schemars(with = "String")]
    pub runtime_minimum: Threshold,
    /// Seconds between runtime checks.
    pub check_interval: u64,
    /// Mount point to watch.
    pub mount_point: String,
}

impl Default for DiskMonitorConfig {
    fn default() -> Self {
        Self {
            preflight_minimum: Threshold::Percent(20),
            runtime_minimum: Threshold::Percent(15),
            check_interval: 30,
            mount_point: "/".to_string(),
        }
    }
}

/// Preflight disk-space gate for both machines.
pub struct DiskSpaceMonitorJob {
    ctx: JobContext,
    cancel: CancellationToken,
}

impl DiskSpaceMonitorJob {
    pub const NAME: &'static str = "disk_space_monitor";

    pub fn new(ctx: JobContext, cancel: CancellationToken) -> Self {
        Self { ctx, cancel }
    }

    fn config(&self) -> DiskMonitorConfig {
        parse_config(Self::NAME, &self.ctx.config).unwrap_or_default()
    }

    async fn preflight(&self, host: Host, config: &DiskMonitorConfig) -> Option<ValidationError> {
        let executor = self.ctx.executor(host);
        match check_disk_space(executor.as_ref(), &config.mount_point).await {
            Ok(space) => {
                if space.satisfies(&config.preflight_minimum) {
                    None
                } else {
                    Some(ValidationError {
                        job: Self::NAME.to_string(),
                        host,
                        message: format!(
                            "free space {} below preflight minimum {} on {}",
                            format_bytes(space.available_bytes),
                            config.preflight_minimum,
                            self.ctx.hostname(host),
                        ),
                    })
                }
            }
            Err(e) => Some(ValidationError {
                job: Self::NAME.to_string(),
                host,
                message: e.to_string(),
            }),
        }
    }
}

#[async_trait]
impl SyncJob for DiskSpaceMonitorJob {
    fn name(&self) -> &'static str {
        Self::NAME
    }

    fn required(&self) -> bool {
        true
    }

    fn config_schema(&self) -> RootSchema {
        schemars::schema_for!(DiskMonitorConfig)
    }

    fn validate_config(&self) -> Vec<ConfigError> {
        parse_config::<DiskMonitorConfig>(Self::NAME, &self.ctx.config)
            .err()
            .unwrap_or_default()
    }

    async fn validate(&self) -> Vec<ValidationError> {
        let config = self.config();
        let mut errors = Vec::new();
        if let Some(e) = self.preflight(Host::Source, &config).await {
            errors.push(e);
        }
        if let Some(e) = self.preflight(Host::Target, &config).await {
            errors.push(e);
        }
        errors
    }

    async fn pre_sync(&self) -> Result<(), SyncError> {
        Ok(())
    }

    async fn sync(&self) -> Result<(), SyncError> {
        // One confirmation check at job position; continuous monitoring runs
        // in the engine watchdog for the rest of the session.
        let config = self.config();
        for host in [Host::Source, Host::Target] {
            let executor = self.ctx.executor(host);
            let space = check_disk_space(executor.as_ref(), &config.mount_point).await?;
            self.ctx.log(
                host,
                LogLevel::Full,
                format!(
                    "{} free on {}",
                    format_bytes(space.available_bytes),
                    config.mount_point
                ),
            );
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
#[path = "disk_tests.rs"]
mod tests;
