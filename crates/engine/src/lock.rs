// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Mutual-exclusion locks on source and target.
//!
//! One file, one name, on both machines. The OS advisory lock is the source
//! of truth; the holder triple written into the file is purely diagnostic.
//! Because the kernel releases the lock when the descriptor closes (process
//! exit, crash, or signal), stale lock files are impossible.
//!
//! The target-side lock runs the equivalent `flock` invocation over a held
//! remote shell, so it is released automatically when the SSH session ends.

use fs2::FileExt;
use pcs_core::{paths, SessionId, SyncRole};
use pcs_exec::{ExecError, RemoteHold, Transport};
use std::fmt;
use std::fs::File;
use std::io::Write;
use std::path::{Path, PathBuf};
use thiserror::Error;
use tracing::debug;

/// Lock file location on the target, shell-expanded remotely.
const REMOTE_LOCK_PATH: &str = "~/.local/share/pc-switcher/pc-switcher.lock";

#[derive(Debug, Error)]
pub enum LockError {
    #[error("IO error on lock file {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error(transparent)]
    Exec(#[from] ExecError),
}

/// The textual triple identifying who owns a lock.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LockHolder {
    pub role: SyncRole,
    pub hostname: String,
    pub session_id: SessionId,
}

impl LockHolder {
    pub fn new(role: SyncRole, hostname: impl Into<String>, session_id: SessionId) -> Self {
        Self {
            role,
            hostname: hostname.into(),
            session_id,
        }
    }

    /// Parse a `role:hostname:session_id` triple.
    pub fn parse(s: &str) -> Option<Self> {
        let mut parts = s.trim().splitn(3, ':');
        let role = match parts.next()? {
            "source" => SyncRole::Source,
            "target" => SyncRole::Target,
            _ => return None,
        };
        let hostname = parts.next()?.to_string();
        let session_id = SessionId::from(parts.next()?);
        Some(Self {
            role,
            hostname,
            session_id,
        })
    }
}

impl fmt::Display for LockHolder {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}:{}", self.role, self.hostname, self.session_id)
    }
}

/// Host-local file lock with OS-level advisory exclusivity.
pub struct SyncLock {
    path: PathBuf,
    // NOTE(lifetime): held to maintain the exclusive lock; released on drop
    file: Option<File>,
}

impl SyncLock {
    /// Lock at the default location (`$XDG_RUNTIME_DIR` or the data dir).
    pub fn at_default_path() -> Self {
        Self::new(paths::lock_path())
    }

    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            file: None,
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Acquire the lock non-blocking.
    ///
    /// Returns `false` when another process holds it; read
    /// [`SyncLock::holder`] for diagnostics. Open without truncation so a
    /// running holder's triple is not wiped before we own the lock.
    pub fn acquire(&mut self, holder: &LockHolder) -> Result<bool, LockError> {
        let io_err = |source| LockError::Io {
            path: self.path.clone(),
            source,
        };

        if let Some(parent) = self.path.parent() {
            std::fs::create_dir_all(parent).map_err(io_err)?;
        }
        let file = std::fs::OpenOptions::new()
            .read(true)
            .write(true)
            .create(true)
            .truncate(false)
            .open(&self.path)
            .map_err(io_err)?;

        match file.try_lock_exclusive() {
            Ok(()) => {}
            Err(e) if e.kind() == std::io::ErrorKind::WouldBlock => {
                return Ok(false);
            }
            Err(source) => return Err(io_err(source)),
        }

        // Truncate and write the holder triple now that we hold the lock
        file.set_len(0).map_err(io_err)?;
        let mut file = file;
        write!(file, "{holder}").map_err(io_err)?;
        file.sync_all().map_err(io_err)?;

        debug!(path = %self.path.display(), %holder, "lock acquired");
        self.file = Some(file);
        Ok(true)
    }

    /// Read the holder triple, for diagnostics on contention.
    pub fn holder(&self) -> Option<LockHolder> {
        let content = std::fs::read_to_string(&self.path).ok()?;
        LockHolder::parse(&content)
    }

    pub fn is_held(&self) -> bool {
        self.file.is_some()
    }

    /// Release the lock and remove the file. Safe to call repeatedly.
    pub fn release(&mut self) {
        if let Some(file) = self.file.take() {
            let _ = fs2::FileExt::unlock(&file);
            drop(file);
            let _ = std::fs::remove_file(&self.path);
            debug!(path = %self.path.display(), "lock released");
        }
    }
}

impl Drop for SyncLock {
    fn drop(&mut self) {
        self.release();
    }
}

/// Outcome of a remote lock attempt.
pub enum RemoteLockOutcome {
    Acquired(RemoteLock),
    /// Held by someone else; the holder triple when readable.
    Contended(Option<LockHolder>),
}

/// Target-side lock held through a persistent remote shell.
pub struct RemoteLock {
    hold: RemoteHold,
}

impl RemoteLock {
    /// The `flock` script held open on the target.
    ///
    /// fd 9 carries the advisory lock; the shell blocks on `read` until our
    /// stdin closes, then removes the file and exits, releasing the lock.
    fn script(holder: &LockHolder) -> String {
        format!(
            "mkdir -p ~/.local/share/pc-switcher && \
             exec 9>>{REMOTE_LOCK_PATH}; \
             if flock -n 9; then \
               printf '%s' '{holder}' > {REMOTE_LOCK_PATH}; \
               echo LOCKED; \
               read -r _; \
               rm -f {REMOTE_LOCK_PATH}; \
             else \
               echo CONTENDED; \
             fi"
        )
    }

    /// Acquire the target lock over the transport.
    pub async fn acquire(
        transport: &dyn Transport,
        holder: &LockHolder,
    ) -> Result<RemoteLockOutcome, LockError> {
        let hold = transport.hold_open(&Self::script(holder)).await?;
        if hold.first_line() == "LOCKED" {
            debug!(%holder, "target lock acquired");
            return Ok(RemoteLockOutcome::Acquired(RemoteLock { hold }));
        }

        let current = transport
            .run(&format!("cat {REMOTE_LOCK_PATH} 2>/dev/null || true"))
            .await?;
        Ok(RemoteLockOutcome::Contended(LockHolder::parse(
            &current.stdout,
        )))
    }

    /// Release the lock by closing the held shell's stdin.
    pub fn release(self) {
        self.hold.release();
    }
}

#[cfg(test)]
#[path = "lock_tests.rs"]
mod tests;
