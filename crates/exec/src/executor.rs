// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! The uniform command execution contract.
//!
//! Callers hold an `Arc<dyn Executor>` and must not assume which variant
//! they have. A non-zero exit code is returned as data in
//! [`CommandResult`]; only timeouts, spawn failures and transport failures
//! surface as [`ExecError`].

use async_trait::async_trait;
use pcs_core::{CommandResult, Host};
use std::time::Duration;
use thiserror::Error;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;

/// Errors from command execution.
#[derive(Debug, Error)]
pub enum ExecError {
    #[error("command timed out after {timeout:?}: {command}")]
    TimedOut { command: String, timeout: Duration },

    #[error("failed to spawn command {command}: {source}")]
    Spawn {
        command: String,
        #[source]
        source: std::io::Error,
    },

    /// SSH-level failure. Fatal to the session; no reconnection is attempted.
    #[error("transport failure: {message}")]
    Transport { message: String },
}

impl ExecError {
    pub fn transport(message: impl Into<String>) -> Self {
        ExecError::Transport {
            message: message.into(),
        }
    }

    pub fn is_transport(&self) -> bool {
        matches!(self, ExecError::Transport { .. })
    }
}

/// Handle to a streaming command.
///
/// Lines arrive on `lines` as they are produced; [`StreamHandle::wait`]
/// returns the final [`CommandResult`] (stdout already consumed by the
/// stream).
pub struct StreamHandle {
    pub lines: mpsc::Receiver<String>,
    pub(crate) done: JoinHandle<Result<CommandResult, ExecError>>,
}

impl StreamHandle {
    /// Wait for the command to finish.
    pub async fn wait(self) -> Result<CommandResult, ExecError> {
        match self.done.await {
            Ok(result) => result,
            Err(e) => Err(ExecError::transport(format!("stream task failed: {e}"))),
        }
    }
}

/// Uniform capability set for running shell commands on a host.
#[async_trait]
pub trait Executor: Send + Sync {
    /// Which machine this executor runs on.
    fn host(&self) -> Host;

    /// Run a command to completion and capture its output.
    async fn run(&self, cmd: &str) -> Result<CommandResult, ExecError>;

    /// Run a command with a deadline. Expiry kills the command and returns
    /// [`ExecError::TimedOut`].
    async fn run_with_timeout(
        &self,
        cmd: &str,
        timeout: Duration,
    ) -> Result<CommandResult, ExecError>;

    /// Run a command, streaming stdout line by line.
    async fn stream(&self, cmd: &str) -> Result<StreamHandle, ExecError>;

    /// Terminate every process this executor has started and not yet reaped.
    async fn terminate_all(&self);
}
