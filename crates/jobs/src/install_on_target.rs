// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Version gate: the first job of every session.
//!
//! Compares the source tool version against the target. An absent or older
//! target is installed/upgraded from the published install script for the
//! source version tag; a newer target fails validation, because syncing from
//! an older source to a newer target is never safe.

use crate::context::JobContext;
use crate::job::{parse_config, SyncError, SyncJob};
use async_trait::async_trait;
use parking_lot::Mutex;
use pcs_core::{ConfigError, Host, LogLevel, ToolVersion, ValidationError};
use schemars::schema::RootSchema;
use schemars::JsonSchema;
use serde::Deserialize;
use std::time::Duration;
use tokio_util::sync::CancellationToken;

/// GitHub repository the install script is published from.
const REPO: &str = "flaksit/pc-switcher";

/// Install timeout: the script bootstraps a toolchain on first install.
const INSTALL_TIMEOUT: Duration = Duration::from_secs(300);

#[derive(Debug, Clone, Deserialize, JsonSchema)]
#[serde(deny_unknown_fields, default)]
pub struct InstallConfig {
    /// Override for the repository slug (testing against forks).
    pub repository: String,
}

impl Default for InstallConfig {
    fn default() -> Self {
        Self {
            repository: REPO.to_string(),
        }
    }
}

/// What the gate decided during validation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum GateDecision {
    /// Target already at the source version.
    UpToDate,
    /// Target has no tool installed.
    Install(ToolVersion),
    /// Target is older than the source.
    Upgrade {
        from: ToolVersion,
        to: ToolVersion,
    },
}

pub struct InstallOnTargetJob {
    ctx: JobContext,
    cancel: CancellationToken,
    source_version: ToolVersion,
    decision: Mutex<Option<GateDecision>>,
}

impl InstallOnTargetJob {
    pub const NAME: &'static str = "install_on_target";

    pub fn new(ctx: JobContext, cancel: CancellationToken) -> Self {
        let source_version = ToolVersion::current().unwrap_or_else(|_| ToolVersion::zero());
        Self {
            ctx,
            cancel,
            source_version,
            decision: Mutex::new(None),
        }
    }

    /// The gate's decision, available after `validate()`.
    pub fn decision(&self) -> Option<GateDecision> {
        self.decision.lock().clone()
    }

    fn config(&self) -> InstallConfig {
        parse_config(Self::NAME, &self.ctx.config).unwrap_or_default()
    }

    async fn target_version(&self) -> Result<Option<ToolVersion>, SyncError> {
        let result = self.ctx.target.run("pc-switcher --version").await?;
        if !result.success() {
            return Ok(None);
        }
        match ToolVersion::from_output(&result.stdout) {
            Ok(version) => Ok(Some(version)),
            Err(_) => Ok(None),
        }
    }

    /// Published release tags on the repository, via `git ls-remote`.
    async fn published_versions(&self, repository: &str) -> Result<Vec<ToolVersion>, SyncError> {
        let cmd = format!("git ls-remote --tags https://github.com/{repository}.git");
        let result = self.ctx.target.run(&cmd).await?;
        if !result.success() {
            return Err(SyncError::failed(format!(
                "cannot list published releases: {}",
                result.stderr.trim()
            )));
        }
        let mut versions = Vec::new();
        for line in result.stdout.lines() {
            let Some(tag) = line.split("refs/tags/").nth(1) else {
                continue;
            };
            let tag = tag.trim_end_matches("^{}");
            if let Ok(version) = ToolVersion::parse(tag) {
                versions.push(version);
            }
        }
        versions.sort();
        versions.dedup();
        Ok(versions)
    }

    /// The exact source tag when published, otherwise the greatest published
    /// release <= the source version (development builds).
    async fn resolve_install_version(
        &self,
        repository: &str,
    ) -> Result<ToolVersion, SyncError> {
        let published = self.published_versions(repository).await?;
        if published.contains(&self.source_version) {
            return Ok(self.source_version.clone());
        }
        published
            .into_iter()
            .filter(|v| v <= &self.source_version)
            .next_back()
            .ok_or_else(|| {
                SyncError::failed(format!(
                    "no published release at or below {}",
                    self.source_version
                ))
            })
    }

    async fn install(&self, version: &ToolVersion) -> Result<(), SyncError> {
        let config = self.config();
        let install_version = self.resolve_install_version(&config.repository).await?;
        if install_version != *version {
            self.ctx.log(
                Host::Target,
                LogLevel::Warning,
                format!(
                    "tag {} not published, installing {} instead",
                    version.tag(),
                    install_version
                ),
            );
        }

        let token_prefix = match std::env::var("GITHUB_TOKEN") {
            Ok(token) if !token.is_empty() => {
                format!("GITHUB_TOKEN={} ", pcs_exec::shell_quote(&token))
            }
            _ => String::new(),
        };
        let url = format!(
            "https://raw.githubusercontent.com/{}/{}/install.sh",
            config.repository,
            install_version.tag()
        );
        let cmd = format!(
            "{token_prefix}curl -LsSf {url} | sh -s -- --version {install_version}"
        );

        if self.ctx.dry_run {
            self.ctx.log(
                Host::Target,
                LogLevel::Info,
                format!("[dry-run] would install {install_version} via {url}"),
            );
            return Ok(());
        }

        self.ctx.log(
            Host::Target,
            LogLevel::Info,
            format!("installing pc-switcher {install_version}"),
        );
        let result = self
            .ctx
            .target
            .run_with_timeout(&cmd, INSTALL_TIMEOUT)
            .await?;
        if !result.success() {
            return Err(SyncError::failed(format!(
                "install script failed (exit {}): {}",
                result.exit_code,
                result.stderr.trim()
            )));
        }

        // Verify by re-running --version
        match self.target_version().await? {
            Some(actual) if actual == install_version => {
                self.ctx.log(
                    Host::Target,
                    LogLevel::Info,
                    format!("target now at {actual}"),
                );
                Ok(())
            }
            Some(actual) => Err(SyncError::failed(format!(
                "install verification failed: target reports {actual}, expected {install_version}"
            ))),
            None => Err(SyncError::failed(
                "install verification failed: target reports no version",
            )),
        }
    }
}

#[async_trait]
impl SyncJob for InstallOnTargetJob {
    fn name(&self) -> &'static str {
        Self::NAME
    }

    fn required(&self) -> bool {
        true
    }

    fn config_schema(&self) -> RootSchema {
        schemars::schema_for!(InstallConfig)
    }

    fn validate_config(&self) -> Vec<ConfigError> {
        parse_config::<InstallConfig>(Self::NAME, &self.ctx.config)
            .err()
            .unwrap_or_default()
    }

    async fn validate(&self) -> Vec<ValidationError> {
        let target = match self.target_version().await {
            Ok(version) => version,
            Err(e) => {
                return vec![ValidationError {
                    job: Self::NAME.to_string(),
                    host: Host::Target,
                    message: format!("cannot determine target version: {e}"),
                }]
            }
        };

        let decision = match target {
            None => GateDecision::Install(self.source_version.clone()),
            Some(target_version) => {
                if target_version > self.source_version {
                    return vec![ValidationError {
                        job: Self::NAME.to_string(),
                        host: Host::Target,
                        message: format!(
                            "Target version {target_version} is newer than source {}",
                            self.source_version
                        ),
                    }];
                } else if target_version == self.source_version {
                    GateDecision::UpToDate
                } else {
                    GateDecision::Upgrade {
                        from: target_version,
                        to: self.source_version.clone(),
                    }
                }
            }
        };
        *self.decision.lock() = Some(decision);
        Vec::new()
    }

    async fn pre_sync(&self) -> Result<(), SyncError> {
        Ok(())
    }

    async fn sync(&self) -> Result<(), SyncError> {
        if self.cancel.is_cancelled() {
            return Err(SyncError::Aborted);
        }
        let decision = self.decision();
        match decision {
            None | Some(GateDecision::UpToDate) => {
                self.ctx.log(
                    Host::Target,
                    LogLevel::Info,
                    format!("target already at {}", self.source_version),
                );
                Ok(())
            }
            Some(GateDecision::Install(version)) => self.install(&version).await,
            Some(GateDecision::Upgrade { from, to }) => {
                self.ctx.log(
                    Host::Target,
                    LogLevel::Info,
                    format!("upgrading target {from} -> {to}"),
                );
                self.install(&to).await
            }
        }
    }

    async fn post_sync(&self) -> Result<(), SyncError> {
        Ok(())
    }

    async fn abort(&self, _deadline: Duration) {
        self.cancel.cancel();
    }
}

#[cfg(test)]
#[path = "install_on_target_tests.rs"]
mod tests;
