// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Sync-role history tracking.
//!
//! Records whether this machine's last role in a sync was source or target.
//! Used to warn when a machine syncs out twice without receiving a sync
//! back first. State file: `<data>/sync-history.json`, shape
//! `{"last_role": "source"|"target"}`.

use crate::paths;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::io::Write;
use std::path::Path;
use thiserror::Error;

/// Role of this machine in a sync operation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SyncRole {
    Source,
    Target,
}

impl fmt::Display for SyncRole {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SyncRole::Source => write!(f, "source"),
            SyncRole::Target => write!(f, "target"),
        }
    }
}

#[derive(Debug, Error)]
pub enum HistoryError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("history file is corrupted")]
    Corrupted,
}

#[derive(Serialize, Deserialize)]
struct HistoryRecord {
    last_role: SyncRole,
}

/// Read the last recorded role.
///
/// `Ok(None)` when no history exists; `Err(Corrupted)` when the file exists
/// but cannot be understood (callers treat that as "unknown, warn").
pub fn last_role() -> Result<Option<SyncRole>, HistoryError> {
    last_role_at(&paths::history_path())
}

pub fn last_role_at(path: &Path) -> Result<Option<SyncRole>, HistoryError> {
    if !path.exists() {
        return Ok(None);
    }
    let text = std::fs::read_to_string(path)?;
    let record: HistoryRecord =
        serde_json::from_str(&text).map_err(|_| HistoryError::Corrupted)?;
    Ok(Some(record.last_role))
}

/// Record this machine's role in the most recent sync.
///
/// Atomic write: temp file in the same directory, then rename.
pub fn record_role(role: SyncRole) -> Result<(), HistoryError> {
    record_role_at(&paths::history_path(), role)
}

pub fn record_role_at(path: &Path, role: SyncRole) -> Result<(), HistoryError> {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)?;
    }
    let content = serde_json::to_string(&HistoryRecord { last_role: role })
        .map_err(|_| HistoryError::Corrupted)?;
    let tmp_path = path.with_extension("json.tmp");
    {
        let mut tmp = std::fs::File::create(&tmp_path)?;
        tmp.write_all(content.as_bytes())?;
        tmp.sync_all()?;
    }
    std::fs::rename(&tmp_path, path)?;
    Ok(())
}

/// Shell command that records a role on a remote machine over SSH.
pub fn record_role_command(role: SyncRole) -> String {
    format!(
        "mkdir -p ~/.local/share/pc-switcher && \
         printf '{{\"last_role\":\"%s\"}}' '{role}' > ~/.local/share/pc-switcher/sync-history.json"
    )
}

#[cfg(test)]
#[path = "history_tests.rs"]
mod tests;
