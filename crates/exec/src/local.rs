// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Local command execution via `tokio::process`.

use crate::executor::{ExecError, Executor, StreamHandle};
use async_trait::async_trait;
use nix::sys::signal::{kill, Signal};
use nix::unistd::Pid;
use parking_lot::Mutex;
use pcs_core::{CommandResult, Host};
use std::collections::HashSet;
use std::process::Stdio;
use std::sync::Arc;
use std::time::Duration;
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::process::Command;
use tokio::sync::mpsc;
use tracing::debug;

/// Runs commands in a subprocess on the orchestrator host.
#[derive(Clone, Default)]
pub struct LocalExecutor {
    login_shell: bool,
    running: Arc<Mutex<HashSet<u32>>>,
}

impl LocalExecutor {
    pub fn new() -> Self {
        Self::default()
    }

    /// Wrap commands so the user's login environment is sourced.
    pub fn with_login_shell(mut self) -> Self {
        self.login_shell = true;
        self
    }

    fn command(&self, cmd: &str) -> Command {
        let mut command = Command::new("sh");
        command
            .arg(if self.login_shell { "-lc" } else { "-c" })
            .arg(cmd)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true);
        command
    }

    fn track(&self, pid: Option<u32>) -> Option<u32> {
        if let Some(pid) = pid {
            self.running.lock().insert(pid);
        }
        pid
    }

    fn untrack(&self, pid: Option<u32>) {
        if let Some(pid) = pid {
            self.running.lock().remove(&pid);
        }
    }

    async fn run_inner(
        &self,
        cmd: &str,
        timeout: Option<Duration>,
    ) -> Result<CommandResult, ExecError> {
        debug!(command = cmd, "spawning local command");
        let child = self.command(cmd).spawn().map_err(|source| ExecError::Spawn {
            command: cmd.to_string(),
            source,
        })?;
        let pid = self.track(child.id());

        let output = child.wait_with_output();
        let result = match timeout {
            None => output.await,
            Some(limit) => match tokio::time::timeout(limit, output).await {
                Ok(result) => result,
                Err(_) => {
                    // Dropping the output future kills the child (kill_on_drop)
                    self.untrack(pid);
                    return Err(ExecError::TimedOut {
                        command: cmd.to_string(),
                        timeout: limit,
                    });
                }
            },
        };
        self.untrack(pid);

        let output = result.map_err(|source| ExecError::Spawn {
            command: cmd.to_string(),
            source,
        })?;
        Ok(CommandResult {
            exit_code: output.status.code().unwrap_or(-1),
            stdout: String::from_utf8_lossy(&output.stdout).into_owned(),
            stderr: String::from_utf8_lossy(&output.stderr).into_owned(),
        })
    }
}

#[async_trait]
impl Executor for LocalExecutor {
    fn host(&self) -> Host {
        Host::Source
    }

    async fn run(&self, cmd: &str) -> Result<CommandResult, ExecError> {
        self.run_inner(cmd, None).await
    }

    async fn run_with_timeout(
        &self,
        cmd: &str,
        timeout: Duration,
    ) -> Result<CommandResult, ExecError> {
        self.run_inner(cmd, Some(timeout)).await
    }

    async fn stream(&self, cmd: &str) -> Result<StreamHandle, ExecError> {
        let mut child = self.command(cmd).spawn().map_err(|source| ExecError::Spawn {
            command: cmd.to_string(),
            source,
        })?;
        let pid = self.track(child.id());
        let stdout = child.stdout.take();
        let (tx, rx) = mpsc::channel(64);
        let command = cmd.to_string();
        let this = self.clone();

        let done = tokio::spawn(async move {
            let mut lines_out = Vec::new();
            if let Some(stdout) = stdout {
                let mut lines = BufReader::new(stdout).lines();
                while let Ok(Some(line)) = lines.next_line().await {
                    if tx.send(line.clone()).await.is_err() {
                        lines_out.push(line);
                        break;
                    }
                    lines_out.push(line);
                }
            }
            let output = child.wait_with_output().await;
            this.untrack(pid);
            let output = output.map_err(|source| ExecError::Spawn { command, source })?;
            Ok(CommandResult {
                exit_code: output.status.code().unwrap_or(-1),
                stdout: lines_out.join("\n"),
                stderr: String::from_utf8_lossy(&output.stderr).into_owned(),
            })
        });

        Ok(StreamHandle { lines: rx, done })
    }

    async fn terminate_all(&self) {
        let pids: Vec<u32> = self.running.lock().iter().copied().collect();
        for pid in pids {
            debug!(pid, "terminating local child");
            let _ = kill(Pid::from_raw(pid as i32), Signal::SIGTERM);
        }
    }
}

#[cfg(test)]
#[path = "local_tests.rs"]
mod tests;
