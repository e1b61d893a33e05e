// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Remote command execution over the SSH transport.

use crate::executor::{ExecError, Executor, StreamHandle};
use crate::ssh::Transport;
use crate::shell_quote;
use async_trait::async_trait;
use pcs_core::{CommandResult, Host};
use std::sync::Arc;
use std::time::Duration;

/// Process-name pattern used when reaping stragglers on the target.
pub const KILL_PATTERN: &str = "pc-switcher";

/// Runs commands on the target machine via the pooled SSH transport.
#[derive(Clone)]
pub struct RemoteExecutor {
    transport: Arc<dyn Transport>,
    login_shell: bool,
}

impl RemoteExecutor {
    pub fn new(transport: Arc<dyn Transport>) -> Self {
        Self {
            transport,
            login_shell: false,
        }
    }

    /// Wrap commands so the remote user's login environment (PATH, secrets)
    /// is sourced.
    pub fn with_login_shell(mut self) -> Self {
        self.login_shell = true;
        self
    }

    fn wrap(&self, cmd: &str) -> String {
        if self.login_shell {
            format!("sh -lc {}", shell_quote(cmd))
        } else {
            cmd.to_string()
        }
    }
}

#[async_trait]
impl Executor for RemoteExecutor {
    fn host(&self) -> Host {
        Host::Target
    }

    async fn run(&self, cmd: &str) -> Result<CommandResult, ExecError> {
        self.transport.run(&self.wrap(cmd)).await
    }

    async fn run_with_timeout(
        &self,
        cmd: &str,
        timeout: Duration,
    ) -> Result<CommandResult, ExecError> {
        self.transport.run_with_timeout(&self.wrap(cmd), timeout).await
    }

    async fn stream(&self, cmd: &str) -> Result<StreamHandle, ExecError> {
        self.transport.stream(&self.wrap(cmd)).await
    }

    async fn terminate_all(&self) {
        let _ = self.transport.kill_all_remote_processes(KILL_PATTERN).await;
    }
}

#[cfg(test)]
#[path = "remote_tests.rs"]
mod tests;
