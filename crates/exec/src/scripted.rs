// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Scripted fakes for executor and transport, used by other crates' tests.
//!
//! Commands are matched by the first registered prefix; unmatched commands
//! succeed with empty output. Every command run is recorded for assertions.

use crate::executor::{ExecError, Executor, StreamHandle};
use crate::ssh::{RemoteHold, Transport};
use async_trait::async_trait;
use parking_lot::Mutex;
use pcs_core::{CommandResult, Host};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;

fn ok(stdout: &str) -> CommandResult {
    CommandResult {
        exit_code: 0,
        stdout: stdout.to_string(),
        stderr: String::new(),
    }
}

#[derive(Clone)]
enum Response {
    Result(CommandResult),
    TransportFailure(String),
}

#[derive(Default)]
struct Script {
    rules: Vec<(String, Response)>,
    calls: Vec<String>,
}

impl Script {
    fn respond_to(&mut self, prefix: &str, response: Response) {
        self.rules.push((prefix.to_string(), response));
    }

    fn run(&mut self, cmd: &str) -> Result<CommandResult, ExecError> {
        self.calls.push(cmd.to_string());
        let matching: Vec<usize> = self
            .rules
            .iter()
            .enumerate()
            .filter(|(_, (prefix, _))| cmd.starts_with(prefix.as_str()))
            .map(|(i, _)| i)
            .collect();
        let Some(&first) = matching.first() else {
            return Ok(ok(""));
        };
        // Duplicate-prefix rules are consumed in order; the last stays sticky
        let response = if matching.len() > 1 {
            self.rules.remove(first).1
        } else {
            self.rules[first].1.clone()
        };
        match response {
            Response::Result(result) => Ok(result),
            Response::TransportFailure(message) => Err(ExecError::transport(message)),
        }
    }
}

/// Scripted [`Executor`] with canned per-command responses and a call log.
#[derive(Clone)]
pub struct ScriptedExecutor {
    host: Host,
    script: Arc<Mutex<Script>>,
}

impl ScriptedExecutor {
    pub fn new(host: Host) -> Self {
        Self {
            host,
            script: Arc::new(Mutex::new(Script::default())),
        }
    }

    /// Register a canned result for commands starting with `prefix`.
    pub fn respond(&self, prefix: &str, exit_code: i32, stdout: &str, stderr: &str) {
        self.script.lock().respond_to(
            prefix,
            Response::Result(CommandResult {
                exit_code,
                stdout: stdout.to_string(),
                stderr: stderr.to_string(),
            }),
        );
    }

    /// Register a transport failure for commands starting with `prefix`.
    pub fn fail_transport(&self, prefix: &str, message: &str) {
        self.script
            .lock()
            .respond_to(prefix, Response::TransportFailure(message.to_string()));
    }

    /// Every command run so far, in order.
    pub fn calls(&self) -> Vec<String> {
        self.script.lock().calls.clone()
    }

    pub fn ran_matching(&self, needle: &str) -> bool {
        self.script.lock().calls.iter().any(|c| c.contains(needle))
    }
}

#[async_trait]
impl Executor for ScriptedExecutor {
    fn host(&self) -> Host {
        self.host
    }

    async fn run(&self, cmd: &str) -> Result<CommandResult, ExecError> {
        self.script.lock().run(cmd)
    }

    async fn run_with_timeout(
        &self,
        cmd: &str,
        _timeout: Duration,
    ) -> Result<CommandResult, ExecError> {
        self.script.lock().run(cmd)
    }

    async fn stream(&self, cmd: &str) -> Result<StreamHandle, ExecError> {
        let result = self.script.lock().run(cmd)?;
        let (tx, rx) = mpsc::channel(64);
        let done = tokio::spawn(async move {
            for line in result.stdout.lines() {
                let _ = tx.send(line.to_string()).await;
            }
            Ok(result)
        });
        Ok(StreamHandle { lines: rx, done })
    }

    async fn terminate_all(&self) {
        self.script.lock().calls.push("<terminate_all>".to_string());
    }
}

/// Scripted [`Transport`] backed by a [`ScriptedExecutor`].
///
/// `hold_open` answers with the scripted result's stdout first line, so lock
/// acquisition tests can script `LOCKED` or `CONTENDED`.
#[derive(Clone)]
pub struct ScriptedTransport {
    executor: ScriptedExecutor,
    connected: Arc<Mutex<bool>>,
    connect_failure: Arc<Mutex<Option<String>>>,
}

impl ScriptedTransport {
    pub fn new() -> Self {
        Self {
            executor: ScriptedExecutor::new(Host::Target),
            connected: Arc::new(Mutex::new(false)),
            connect_failure: Arc::new(Mutex::new(None)),
        }
    }

    /// The scripted executor answering this transport's commands.
    pub fn executor(&self) -> &ScriptedExecutor {
        &self.executor
    }

    /// Make `connect` fail with the given message.
    pub fn fail_connect(&self, message: &str) {
        *self.connect_failure.lock() = Some(message.to_string());
    }

    pub fn is_connected(&self) -> bool {
        *self.connected.lock()
    }
}

impl Default for ScriptedTransport {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl Transport for ScriptedTransport {
    async fn connect(&self) -> Result<(), ExecError> {
        if let Some(message) = self.connect_failure.lock().clone() {
            return Err(ExecError::transport(message));
        }
        *self.connected.lock() = true;
        Ok(())
    }

    async fn disconnect(&self) {
        *self.connected.lock() = false;
    }

    async fn run(&self, cmd: &str) -> Result<CommandResult, ExecError> {
        self.executor.run(cmd).await
    }

    async fn run_with_timeout(
        &self,
        cmd: &str,
        timeout: Duration,
    ) -> Result<CommandResult, ExecError> {
        self.executor.run_with_timeout(cmd, timeout).await
    }

    async fn stream(&self, cmd: &str) -> Result<StreamHandle, ExecError> {
        self.executor.stream(cmd).await
    }

    async fn hold_open(&self, cmd: &str) -> Result<RemoteHold, ExecError> {
        let result = self.executor.run(cmd).await?;
        let first_line = result.stdout.lines().next().unwrap_or_default().to_string();
        Ok(RemoteHold::detached(first_line))
    }

    async fn transfer_file(
        &self,
        local: &std::path::Path,
        remote: &str,
    ) -> Result<(), ExecError> {
        self.executor
            .run(&format!("<transfer {} -> {remote}>", local.display()))
            .await
            .map(|_| ())
    }

    async fn kill_all_remote_processes(&self, pattern: &str) -> Result<(), ExecError> {
        self.executor
            .run(&format!("pkill -f '{pattern}' || true"))
            .await
            .map(|_| ())
    }
}
