// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Filesystem layout for pc-switcher state.
//!
//! All state lives under a single data directory
//! (`~/.local/share/pc-switcher`). `PC_SWITCHER_DATA_DIR` overrides it for
//! test isolation; `XDG_RUNTIME_DIR` moves only the lock file.

use chrono::{DateTime, Utc};
use std::path::PathBuf;

use crate::session::SessionId;

/// Filename of the unified lock file, identical on source and target.
pub const LOCK_FILE_NAME: &str = "pc-switcher.lock";

/// Root of the snapshot tree on both machines.
pub const SNAPSHOT_ROOT: &str = "/.snapshots/pc-switcher";

/// Timestamp format shared by snapshot names, session folders and log files.
pub const TIMESTAMP_FORMAT: &str = "%Y%m%dT%H%M%S";

/// The data directory for pc-switcher state.
pub fn data_dir() -> PathBuf {
    if let Ok(dir) = std::env::var("PC_SWITCHER_DATA_DIR") {
        return PathBuf::from(dir);
    }
    dirs::data_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join("pc-switcher")
}

/// Default configuration file path: `~/.config/pc-switcher/config.yaml`.
pub fn default_config_path() -> PathBuf {
    dirs::config_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join("pc-switcher")
        .join("config.yaml")
}

/// Directory holding session log files.
pub fn logs_dir() -> PathBuf {
    data_dir().join("logs")
}

/// Log file path: `logs/sync-<YYYYMMDDThhmmss>-<session_id>.log`.
pub fn log_file_path(started_at: DateTime<Utc>, session_id: &SessionId) -> PathBuf {
    logs_dir().join(format!(
        "sync-{}-{}.log",
        started_at.format(TIMESTAMP_FORMAT),
        session_id
    ))
}

/// Lock file path.
///
/// `XDG_RUNTIME_DIR` is honoured as an alternate lock directory when set.
pub fn lock_path() -> PathBuf {
    if let Ok(runtime_dir) = std::env::var("XDG_RUNTIME_DIR") {
        if !runtime_dir.is_empty() {
            return PathBuf::from(runtime_dir)
                .join("pc-switcher")
                .join(LOCK_FILE_NAME);
        }
    }
    data_dir().join(LOCK_FILE_NAME)
}

/// Sync-role history file path.
pub fn history_path() -> PathBuf {
    data_dir().join("sync-history.json")
}

/// Session folder name under the snapshot root: `<timestamp>-<session_id>`.
pub fn session_folder_name(started_at: DateTime<Utc>, session_id: &SessionId) -> String {
    format!("{}-{}", started_at.format(TIMESTAMP_FORMAT), session_id)
}
