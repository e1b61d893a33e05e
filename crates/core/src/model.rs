// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Core types shared across the sync pipeline.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Logical role of a machine in the sync operation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Host {
    Source,
    Target,
}

impl fmt::Display for Host {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Host::Source => write!(f, "source"),
            Host::Target => write!(f, "target"),
        }
    }
}

/// Six-level logging hierarchy.
///
/// Level N includes all messages at level N and above. FULL is a custom
/// level between DEBUG and INFO carrying operational (file-level) detail.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
#[serde(rename_all = "UPPERCASE")]
pub enum LogLevel {
    Debug,
    Full,
    Info,
    Warning,
    Error,
    Critical,
}

impl LogLevel {
    pub fn as_str(&self) -> &'static str {
        match self {
            LogLevel::Debug => "DEBUG",
            LogLevel::Full => "FULL",
            LogLevel::Info => "INFO",
            LogLevel::Warning => "WARNING",
            LogLevel::Error => "ERROR",
            LogLevel::Critical => "CRITICAL",
        }
    }
}

impl fmt::Display for LogLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for LogLevel {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_uppercase().as_str() {
            "DEBUG" => Ok(LogLevel::Debug),
            "FULL" => Ok(LogLevel::Full),
            "INFO" => Ok(LogLevel::Info),
            "WARNING" => Ok(LogLevel::Warning),
            "ERROR" => Ok(LogLevel::Error),
            "CRITICAL" => Ok(LogLevel::Critical),
            other => Err(format!(
                "invalid log level: {other}. Valid levels: DEBUG, FULL, INFO, WARNING, ERROR, CRITICAL"
            )),
        }
    }
}

/// States a sync session can be in during its lifecycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum SessionState {
    Initializing,
    Validating,
    Executing,
    Cleanup,
    Completed,
    Aborted,
    Failed,
}

impl SessionState {
    /// Terminal states: COMPLETED, ABORTED, FAILED.
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            SessionState::Completed | SessionState::Aborted | SessionState::Failed
        )
    }
}

impl fmt::Display for SessionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            SessionState::Initializing => "INITIALIZING",
            SessionState::Validating => "VALIDATING",
            SessionState::Executing => "EXECUTING",
            SessionState::Cleanup => "CLEANUP",
            SessionState::Completed => "COMPLETED",
            SessionState::Aborted => "ABORTED",
            SessionState::Failed => "FAILED",
        };
        f.write_str(s)
    }
}

/// Terminal result of a single job within a session.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum JobStatus {
    Success,
    Skipped,
    Failed,
}

impl fmt::Display for JobStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            JobStatus::Success => write!(f, "SUCCESS"),
            JobStatus::Skipped => write!(f, "SKIPPED"),
            JobStatus::Failed => write!(f, "FAILED"),
        }
    }
}

/// Result of executing a command via an executor.
///
/// A non-zero exit code is data, not an error: callers inspect `success()`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CommandResult {
    pub exit_code: i32,
    pub stdout: String,
    pub stderr: String,
}

impl CommandResult {
    pub fn success(&self) -> bool {
        self.exit_code == 0
    }
}

/// Progress information emitted by jobs.
///
/// Rendering logic:
/// - `percent` set: progress bar with percentage
/// - `current` + `total` set: "45/100 items"
/// - `current` only: "45 items processed"
/// - `heartbeat`: activity indication only
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProgressUpdate {
    pub percent: Option<u8>,
    pub current: Option<u64>,
    pub total: Option<u64>,
    pub item: Option<String>,
    #[serde(default)]
    pub heartbeat: bool,
}

impl ProgressUpdate {
    /// A percentage update, clamped to the 0-100 range.
    pub fn at_percent(percent: u8) -> Self {
        Self {
            percent: Some(percent.min(100)),
            ..Self::default()
        }
    }

    /// An item-count update.
    pub fn items(current: u64, total: Option<u64>) -> Self {
        Self {
            current: Some(current),
            total,
            ..Self::default()
        }
    }

    /// Activity indication without a known position.
    pub fn heartbeat() -> Self {
        Self {
            heartbeat: true,
            ..Self::default()
        }
    }

    pub fn with_item(mut self, item: impl Into<String>) -> Self {
        self.item = Some(item.into());
        self
    }
}

/// Error from configuration (schema) validation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConfigError {
    /// Job the error belongs to; `None` for global config errors.
    pub job: Option<String>,
    /// Path to the invalid value (e.g. `btrfs_snapshots.keep_recent`).
    pub path: String,
    pub message: String,
}

impl fmt::Display for ConfigError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.job {
            Some(job) => write!(f, "[{job}] {}: {}", self.path, self.message),
            None => write!(f, "{}: {}", self.path, self.message),
        }
    }
}

/// Error from a job's system-state validation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ValidationError {
    pub job: String,
    pub host: Host,
    pub message: String,
}

impl fmt::Display for ValidationError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[{}] {}: {}", self.job, self.host, self.message)
    }
}

#[cfg(test)]
#[path = "model_tests.rs"]
mod tests;
