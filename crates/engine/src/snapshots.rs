// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Btrfs snapshot envelope: the PRE/POST safety net around all jobs.
//!
//! Snapshots live under `/.snapshots/pc-switcher/<timestamp>-<session_id>/`
//! on both machines, named `<phase>-<subvolume>-<timestamp>`. Retention
//! keeps the newest `keep_recent` session folders and everything younger
//! than `max_age_days`. In dry-run mode the envelope logs intended actions
//! and runs nothing state-changing.

use chrono::{DateTime, Duration as ChronoDuration, NaiveDateTime, Utc};
use pcs_core::{
    paths, BtrfsConfig, Event, EventBus, Host, LogEvent, LogLevel, LogOrigin, SessionId,
    ValidationError,
};
use pcs_exec::{ExecError, Executor};
use std::fmt;
use std::sync::Arc;
use thiserror::Error;

/// The job name snapshot records are logged under.
const JOB_NAME: &str = "btrfs_snapshots";

/// Phase in the sync workflow when a snapshot is created.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SnapshotPhase {
    Pre,
    Post,
}

impl fmt::Display for SnapshotPhase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SnapshotPhase::Pre => write!(f, "pre"),
            SnapshotPhase::Post => write!(f, "post"),
        }
    }
}

impl SnapshotPhase {
    fn parse(s: &str) -> Option<Self> {
        match s {
            "pre" => Some(SnapshotPhase::Pre),
            "post" => Some(SnapshotPhase::Post),
            _ => None,
        }
    }
}

/// Parsed metadata of one snapshot path.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SnapshotInfo {
    pub subvolume: String,
    pub phase: SnapshotPhase,
    pub timestamp: NaiveDateTime,
    pub session_id: SessionId,
    pub path: String,
}

impl SnapshotInfo {
    /// Snapshot directory name: `<phase>-<subvolume>-<timestamp>`.
    pub fn name(&self) -> String {
        format!(
            "{}-{}-{}",
            self.phase,
            self.subvolume,
            self.timestamp.format(paths::TIMESTAMP_FORMAT)
        )
    }
}

/// Snapshot name for a subvolume at a point in time.
pub fn snapshot_name(phase: SnapshotPhase, subvolume: &str, at: DateTime<Utc>) -> String {
    format!(
        "{phase}-{subvolume}-{}",
        at.format(paths::TIMESTAMP_FORMAT)
    )
}

/// Parse a full snapshot path back into its metadata.
///
/// Inverse of the name/folder contract:
/// `<root>/<ts>-<session_id>/<phase>-<subvolume>-<ts>`.
pub fn parse_snapshot_path(path: &str) -> Option<SnapshotInfo> {
    let mut segments = path.rsplit('/');
    let name = segments.next()?;
    let folder = segments.next()?;

    let (folder_ts, session_id) = folder.split_once('-')?;
    NaiveDateTime::parse_from_str(folder_ts, paths::TIMESTAMP_FORMAT).ok()?;
    if session_id.len() != 8 || !session_id.chars().all(|c| c.is_ascii_hexdigit()) {
        return None;
    }

    let (phase_str, rest) = name.split_once('-')?;
    let phase = SnapshotPhase::parse(phase_str)?;
    let (subvolume, ts) = rest.rsplit_once('-')?;
    if !subvolume.starts_with('@') {
        return None;
    }
    let timestamp = NaiveDateTime::parse_from_str(ts, paths::TIMESTAMP_FORMAT).ok()?;

    Some(SnapshotInfo {
        subvolume: subvolume.to_string(),
        phase,
        timestamp,
        session_id: SessionId::from(session_id),
        path: path.to_string(),
    })
}

/// Mount point for a logical subvolume name: `@` -> `/`, `@x` -> `/x`.
pub fn subvolume_to_mount_point(subvolume: &str) -> Result<String, EnvelopeError> {
    match subvolume.strip_prefix('@') {
        Some("") => Ok("/".to_string()),
        Some(rest) => Ok(format!("/{rest}")),
        None => Err(EnvelopeError::InvalidSubvolume(subvolume.to_string())),
    }
}

#[derive(Debug, Error)]
pub enum EnvelopeError {
    #[error("snapshot creation failed for {subvolume} on {host}: {message}")]
    SnapshotFailed {
        host: Host,
        subvolume: String,
        message: String,
    },
    #[error("rollback failed for {subvolume}: {message}")]
    RollbackFailed { subvolume: String, message: String },
    #[error("invalid subvolume name: {0} (must begin with '@')")]
    InvalidSubvolume(String),
    #[error(transparent)]
    Exec(#[from] ExecError),
}

/// Validates, creates, retains and deletes snapshots on source and target.
pub struct SnapshotEnvelope {
    source: Arc<dyn Executor>,
    target: Arc<dyn Executor>,
    config: BtrfsConfig,
    bus: EventBus,
    session_id: SessionId,
    session_folder: String,
    dry_run: bool,
}

impl SnapshotEnvelope {
    pub fn new(
        source: Arc<dyn Executor>,
        target: Arc<dyn Executor>,
        config: BtrfsConfig,
        bus: EventBus,
        session_id: SessionId,
        started_at: DateTime<Utc>,
        dry_run: bool,
    ) -> Self {
        let session_folder = paths::session_folder_name(started_at, &session_id);
        Self {
            source,
            target,
            config,
            bus,
            session_id,
            session_folder,
            dry_run,
        }
    }

    /// Disabled when no subvolumes are configured: no snapshots, no
    /// rollback safety net.
    pub fn enabled(&self) -> bool {
        !self.config.subvolumes.is_empty()
    }

    pub fn session_folder_path(&self) -> String {
        format!("{}/{}", paths::SNAPSHOT_ROOT, self.session_folder)
    }

    fn executor(&self, host: Host) -> &Arc<dyn Executor> {
        match host {
            Host::Source => &self.source,
            Host::Target => &self.target,
        }
    }

    fn log(&self, host: Host, level: LogLevel, message: impl Into<String>) {
        let origin = match host {
            Host::Source => LogOrigin::Source,
            Host::Target => LogOrigin::Target,
        };
        self.bus
            .publish(Event::Log(LogEvent::new(level, JOB_NAME, origin, message)));
    }

    /// Verify the snapshot root exists (create if missing) and every
    /// configured subvolume is mounted and really a subvolume, on both
    /// machines. Problems come back as entries, never as failures.
    pub async fn validate(&self) -> Vec<ValidationError> {
        let mut errors = Vec::new();
        for host in [Host::Source, Host::Target] {
            if let Some(e) = self.validate_root(host).await {
                errors.push(e);
            }
            for subvolume in &self.config.subvolumes {
                if let Some(e) = self.validate_subvolume(host, subvolume).await {
                    errors.push(e);
                }
            }
        }
        errors
    }

    async fn validate_root(&self, host: Host) -> Option<ValidationError> {
        let executor = self.executor(host);
        let error = |message: String| ValidationError {
            job: JOB_NAME.to_string(),
            host,
            message,
        };

        let show = executor
            .run("sudo btrfs subvolume show /.snapshots 2>&1")
            .await;
        match show {
            Ok(result) if result.success() => None,
            Ok(_) => {
                if self.dry_run {
                    self.log(
                        host,
                        LogLevel::Info,
                        "[dry-run] would create /.snapshots subvolume",
                    );
                    return None;
                }
                let create = executor
                    .run(&format!(
                        "sudo btrfs subvolume create /.snapshots && sudo mkdir -p {}",
                        paths::SNAPSHOT_ROOT
                    ))
                    .await;
                match create {
                    Ok(result) if result.success() => None,
                    Ok(result) => Some(error(format!(
                        "failed to create /.snapshots subvolume: {}",
                        result.stderr.trim()
                    ))),
                    Err(e) => Some(error(e.to_string())),
                }
            }
            Err(e) => Some(error(e.to_string())),
        }
    }

    async fn validate_subvolume(&self, host: Host, subvolume: &str) -> Option<ValidationError> {
        let error = |message: String| ValidationError {
            job: JOB_NAME.to_string(),
            host,
            message,
        };
        let mount_point = match subvolume_to_mount_point(subvolume) {
            Ok(m) => m,
            Err(e) => return Some(error(e.to_string())),
        };

        let result = self
            .executor(host)
            .run(&format!("sudo btrfs subvolume show {mount_point} 2>&1"))
            .await;
        match result {
            Ok(result) if !result.success() => Some(error(format!(
                "subvolume {subvolume} not found at {mount_point}: {}",
                result.stderr.trim()
            ))),
            Ok(result) if !result.stdout.contains(subvolume) => Some(error(format!(
                "path {mount_point} is not subvolume {subvolume}"
            ))),
            Ok(_) => None,
            Err(e) => Some(error(e.to_string())),
        }
    }

    /// Create read-only snapshots of every configured subvolume on source
    /// AND target. A failure of any one aborts the phase.
    pub async fn create(&self, phase: SnapshotPhase) -> Result<(), EnvelopeError> {
        if !self.enabled() {
            return Ok(());
        }
        let now = Utc::now();
        let folder = self.session_folder_path();

        for host in [Host::Source, Host::Target] {
            if self.dry_run {
                self.log(
                    host,
                    LogLevel::Info,
                    format!("[dry-run] would create {phase} snapshots under {folder}"),
                );
                continue;
            }
            let executor = self.executor(host);
            let mkdir = executor.run(&format!("sudo mkdir -p {folder}")).await?;
            if !mkdir.success() {
                return Err(EnvelopeError::SnapshotFailed {
                    host,
                    subvolume: String::new(),
                    message: format!("cannot create session folder: {}", mkdir.stderr.trim()),
                });
            }

            for subvolume in &self.config.subvolumes {
                let mount_point = subvolume_to_mount_point(subvolume)?;
                let snapshot_path = format!("{folder}/{}", snapshot_name(phase, subvolume, now));
                let result = executor
                    .run(&format!(
                        "sudo btrfs subvolume snapshot -r {mount_point} {snapshot_path}"
                    ))
                    .await?;
                if !result.success() {
                    return Err(EnvelopeError::SnapshotFailed {
                        host,
                        subvolume: subvolume.clone(),
                        message: result.stderr.trim().to_string(),
                    });
                }
                self.log(
                    host,
                    LogLevel::Full,
                    format!("created snapshot {snapshot_path}"),
                );
            }
        }
        self.log(
            Host::Source,
            LogLevel::Info,
            format!("{phase} snapshots complete for session {}", self.session_id),
        );
        Ok(())
    }

    /// Apply the retention policy on both machines.
    ///
    /// Session folders are ordered newest-first by their embedded
    /// timestamp; folders beyond `keep_recent` are deleted, as are folders
    /// older than `max_age_days` when configured. Within a folder every
    /// snapshot subvolume is deleted before the folder itself. Returns the
    /// deleted snapshot paths.
    pub async fn retain(&self) -> Result<Vec<String>, EnvelopeError> {
        if !self.enabled() {
            return Ok(Vec::new());
        }
        let mut deleted = Vec::new();
        for host in [Host::Source, Host::Target] {
            deleted.extend(self.retain_on(host).await?);
        }
        Ok(deleted)
    }

    async fn retain_on(&self, host: Host) -> Result<Vec<String>, EnvelopeError> {
        let executor = self.executor(host);
        let listing = executor
            .run(&format!(
                "ls -1 {} 2>/dev/null || true",
                paths::SNAPSHOT_ROOT
            ))
            .await?;

        // Newest first, by the timestamp embedded in the folder name
        let mut folders: Vec<(NaiveDateTime, String)> = listing
            .stdout
            .lines()
            .filter_map(|name| {
                let name = name.trim();
                let (ts, _) = name.split_once('-')?;
                let parsed = NaiveDateTime::parse_from_str(ts, paths::TIMESTAMP_FORMAT).ok()?;
                Some((parsed, name.to_string()))
            })
            .collect();
        folders.sort_by(|a, b| b.0.cmp(&a.0));

        let cutoff = self
            .config
            .max_age_days
            .map(|days| Utc::now().naive_utc() - ChronoDuration::days(i64::from(days)));

        let mut to_delete = Vec::new();
        for (index, (timestamp, name)) in folders.iter().enumerate() {
            let beyond_keep = index >= self.config.keep_recent;
            let too_old = cutoff.is_some_and(|cutoff| *timestamp < cutoff);
            if beyond_keep || too_old {
                to_delete.push(name.clone());
            }
        }

        let mut deleted = Vec::new();
        for name in to_delete {
            let folder = format!("{}/{name}", paths::SNAPSHOT_ROOT);
            if self.dry_run {
                self.log(
                    host,
                    LogLevel::Info,
                    format!("[dry-run] would delete session folder {folder}"),
                );
                continue;
            }
            let listing = executor
                .run(&format!("ls -1 {folder} 2>/dev/null || true"))
                .await?;
            for snapshot in listing.stdout.lines().filter(|l| !l.trim().is_empty()) {
                let path = format!("{folder}/{}", snapshot.trim());
                let result = executor
                    .run(&format!("sudo btrfs subvolume delete {path}"))
                    .await?;
                if result.success() {
                    self.log(host, LogLevel::Full, format!("deleted snapshot {path}"));
                    deleted.push(path);
                }
            }
            executor
                .run(&format!("sudo rmdir {folder} 2>/dev/null || true"))
                .await?;
        }
        Ok(deleted)
    }

    /// Restore the target's subvolumes from this session's PRE snapshots.
    ///
    /// Creates a writable snapshot `restore-<subvolume>` next to the PRE
    /// snapshots; swapping it in for the live subvolume is left to the
    /// operator, because the live subvolume is mounted.
    pub async fn rollback(&self) -> Result<(), EnvelopeError> {
        if !self.enabled() {
            return Ok(());
        }
        let folder = self.session_folder_path();
        let listing = self
            .target
            .run(&format!("ls -1 {folder} 2>/dev/null || true"))
            .await?;

        for subvolume in &self.config.subvolumes {
            let prefix = format!("pre-{subvolume}-");
            let Some(pre_name) = listing
                .stdout
                .lines()
                .map(str::trim)
                .find(|name| name.starts_with(&prefix))
            else {
                return Err(EnvelopeError::RollbackFailed {
                    subvolume: subvolume.clone(),
                    message: format!("no PRE snapshot in {folder}"),
                });
            };
            let pre_path = format!("{folder}/{pre_name}");
            let restore_path = format!("{folder}/restore-{subvolume}");

            if self.dry_run {
                self.log(
                    Host::Target,
                    LogLevel::Info,
                    format!("[dry-run] would restore {subvolume} from {pre_path}"),
                );
                continue;
            }
            let result = self
                .target
                .run(&format!(
                    "sudo btrfs subvolume snapshot {pre_path} {restore_path}"
                ))
                .await?;
            if !result.success() {
                return Err(EnvelopeError::RollbackFailed {
                    subvolume: subvolume.clone(),
                    message: result.stderr.trim().to_string(),
                });
            }
            self.log(
                Host::Target,
                LogLevel::Warning,
                format!(
                    "restored {subvolume} to {restore_path}; boot from it or swap it in \
                     to complete the rollback"
                ),
            );
        }
        Ok(())
    }
}

#[cfg(test)]
#[path = "snapshots_tests.rs"]
mod tests;
