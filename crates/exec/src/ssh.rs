// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! SSH transport to the target machine.
//!
//! Owns one multiplexed connection (OpenSSH ControlMaster via the `openssh`
//! crate, so `~/.ssh/config` is respected). Concurrent remote sessions are
//! bounded by a semaphore so the remote sshd is never overloaded. Connection
//! state changes are published on the event bus; a detected disconnection is
//! fatal to the session and no reconnection is attempted.

use crate::executor::{ExecError, StreamHandle};
use async_trait::async_trait;
use openssh::{KnownHosts, Session, SessionBuilder, Stdio};
use parking_lot::Mutex;
use pcs_core::{CommandResult, ConnectionEvent, ConnectionStatus, Event, EventBus};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tokio::sync::{mpsc, oneshot, Semaphore};
use tracing::{debug, warn};

/// Default bound on concurrent multiplexed sessions.
const DEFAULT_MAX_SESSIONS: usize = 10;

/// Keepalive probe interval. OpenSSH's default ServerAliveCountMax of 3
/// supplies the missed-probe bound, so a half-open connection is detected
/// within ~45 s.
const KEEPALIVE_INTERVAL: Duration = Duration::from_secs(15);

/// Lifecycle operations the orchestrator needs from the target connection.
///
/// [`SshTransport`] is the production implementation; tests substitute a
/// scripted one.
#[async_trait]
pub trait Transport: Send + Sync {
    /// Establish the connection. Publishes `Connection{connected}`.
    async fn connect(&self) -> Result<(), ExecError>;

    /// Close the connection. Publishes `Connection{disconnected}`.
    async fn disconnect(&self);

    /// Run a command on the target and capture its output.
    async fn run(&self, cmd: &str) -> Result<CommandResult, ExecError>;

    /// Run a command with a deadline.
    async fn run_with_timeout(
        &self,
        cmd: &str,
        timeout: Duration,
    ) -> Result<CommandResult, ExecError>;

    /// Run a command, streaming stdout line by line.
    async fn stream(&self, cmd: &str) -> Result<StreamHandle, ExecError>;

    /// Start a command that is held open until released.
    ///
    /// The first stdout line is captured for the caller; the command then
    /// stays running (its stdin open) until [`RemoteHold::release`] or
    /// disconnect. Used for the target-side lock.
    async fn hold_open(&self, cmd: &str) -> Result<RemoteHold, ExecError>;

    /// Stream a local file to a path on the target.
    async fn transfer_file(
        &self,
        local: &std::path::Path,
        remote: &str,
    ) -> Result<(), ExecError>;

    /// Kill every process on the target matching `pattern`.
    async fn kill_all_remote_processes(&self, pattern: &str) -> Result<(), ExecError>;
}

/// A remote command held open on the transport.
///
/// Dropping the hold (or the SSH session) ends the remote command; the
/// remote side observes stdin EOF and exits.
pub struct RemoteHold {
    first_line: String,
    release_tx: Option<oneshot::Sender<()>>,
}

impl RemoteHold {
    pub(crate) fn new(first_line: String, release_tx: oneshot::Sender<()>) -> Self {
        Self {
            first_line,
            release_tx: Some(release_tx),
        }
    }

    /// Construct a hold that is not backed by a process (scripted tests).
    #[cfg(any(test, feature = "test-support"))]
    pub fn detached(first_line: impl Into<String>) -> Self {
        let (tx, _rx) = oneshot::channel();
        Self {
            first_line: first_line.into(),
            release_tx: Some(tx),
        }
    }

    /// First line the held command printed on stdout.
    pub fn first_line(&self) -> &str {
        &self.first_line
    }

    /// Release the held command.
    pub fn release(mut self) {
        if let Some(tx) = self.release_tx.take() {
            let _ = tx.send(());
        }
    }
}

/// One pooled SSH connection to the target.
pub struct SshTransport {
    target: String,
    bus: EventBus,
    session: Mutex<Option<Arc<Session>>>,
    semaphore: Arc<Semaphore>,
}

impl SshTransport {
    pub fn new(target: impl Into<String>, bus: EventBus) -> Self {
        Self {
            target: target.into(),
            bus,
            session: Mutex::new(None),
            semaphore: Arc::new(Semaphore::new(DEFAULT_MAX_SESSIONS)),
        }
    }

    fn session(&self) -> Result<Arc<Session>, ExecError> {
        self.session
            .lock()
            .clone()
            .ok_or_else(|| ExecError::transport("not connected to target"))
    }

    /// Map an openssh error to a fatal transport error, publishing the
    /// disconnection.
    fn transport_error(&self, error: openssh::Error) -> ExecError {
        warn!(target = %self.target, %error, "ssh transport failure");
        self.publish_disconnected();
        ExecError::transport(error.to_string())
    }

    fn publish_disconnected(&self) {
        self.bus.publish(Event::Connection(ConnectionEvent {
            status: ConnectionStatus::Disconnected,
            latency_ms: None,
        }));
    }

    async fn acquire(&self) -> Result<tokio::sync::OwnedSemaphorePermit, ExecError> {
        Arc::clone(&self.semaphore)
            .acquire_owned()
            .await
            .map_err(|_| ExecError::transport("session semaphore closed"))
    }
}

#[async_trait]
impl Transport for SshTransport {
    async fn connect(&self) -> Result<(), ExecError> {
        let started = Instant::now();
        let session = SessionBuilder::default()
            .known_hosts_check(KnownHosts::Add)
            .server_alive_interval(KEEPALIVE_INTERVAL)
            .connect_timeout(Duration::from_secs(30))
            .connect(&self.target)
            .await
            .map_err(|e| ExecError::transport(format!("cannot connect to {}: {e}", self.target)))?;
        let latency_ms = started.elapsed().as_secs_f64() * 1000.0;

        *self.session.lock() = Some(Arc::new(session));
        debug!(target = %self.target, latency_ms, "ssh connection established");
        self.bus.publish(Event::Connection(ConnectionEvent {
            status: ConnectionStatus::Connected,
            latency_ms: Some(latency_ms),
        }));
        Ok(())
    }

    async fn disconnect(&self) {
        let session = self.session.lock().take();
        if let Some(session) = session {
            if let Ok(session) = Arc::try_unwrap(session) {
                if let Err(e) = session.close().await {
                    warn!(%e, "error closing ssh session");
                }
            }
            self.publish_disconnected();
        }
    }

    async fn run(&self, cmd: &str) -> Result<CommandResult, ExecError> {
        let session = self.session()?;
        let _permit = self.acquire().await?;
        debug!(command = cmd, "running remote command");
        let output = session
            .shell(cmd)
            .output()
            .await
            .map_err(|e| self.transport_error(e))?;
        Ok(CommandResult {
            exit_code: output.status.code().unwrap_or(-1),
            stdout: String::from_utf8_lossy(&output.stdout).into_owned(),
            stderr: String::from_utf8_lossy(&output.stderr).into_owned(),
        })
    }

    async fn run_with_timeout(
        &self,
        cmd: &str,
        timeout: Duration,
    ) -> Result<CommandResult, ExecError> {
        match tokio::time::timeout(timeout, self.run(cmd)).await {
            Ok(result) => result,
            Err(_) => Err(ExecError::TimedOut {
                command: cmd.to_string(),
                timeout,
            }),
        }
    }

    async fn stream(&self, cmd: &str) -> Result<StreamHandle, ExecError> {
        let session = self.session()?;
        let permit = self.acquire().await?;
        let (tx, rx) = mpsc::channel(64);
        let command = cmd.to_string();

        let done = tokio::spawn(async move {
            let _permit = permit;
            let mut child = session
                .shell(&command)
                .stdout(Stdio::piped())
                .stderr(Stdio::piped())
                .spawn()
                .await
                .map_err(|e| ExecError::transport(e.to_string()))?;

            let mut lines_out = Vec::new();
            if let Some(stdout) = child.stdout().take() {
                let mut lines = BufReader::new(stdout).lines();
                while let Ok(Some(line)) = lines.next_line().await {
                    let _ = tx.send(line.clone()).await;
                    lines_out.push(line);
                }
            }
            let output = child
                .wait_with_output()
                .await
                .map_err(|e| ExecError::transport(e.to_string()))?;
            Ok(CommandResult {
                exit_code: output.status.code().unwrap_or(-1),
                stdout: lines_out.join("\n"),
                stderr: String::from_utf8_lossy(&output.stderr).into_owned(),
            })
        });

        Ok(StreamHandle { lines: rx, done })
    }

    async fn hold_open(&self, cmd: &str) -> Result<RemoteHold, ExecError> {
        let session = self.session()?;
        let permit = self.acquire().await?;
        let (line_tx, line_rx) = oneshot::channel::<Result<String, ExecError>>();
        let (release_tx, release_rx) = oneshot::channel::<()>();
        let command = cmd.to_string();

        tokio::spawn(async move {
            let _permit = permit;
            let child = session
                .shell(&command)
                .stdin(Stdio::piped())
                .stdout(Stdio::piped())
                .spawn()
                .await;
            let mut child = match child {
                Ok(child) => child,
                Err(e) => {
                    let _ = line_tx.send(Err(ExecError::transport(e.to_string())));
                    return;
                }
            };

            let first = match child.stdout().take() {
                Some(stdout) => BufReader::new(stdout)
                    .lines()
                    .next_line()
                    .await
                    .ok()
                    .flatten()
                    .unwrap_or_default(),
                None => String::new(),
            };
            let _ = line_tx.send(Ok(first));

            // Held until released; stdin EOF lets the remote command exit.
            let _ = release_rx.await;
            drop(child.stdin().take());
            if let Err(e) = child.wait().await {
                debug!(%e, "held remote command did not exit cleanly");
            }
        });

        let first_line = line_rx
            .await
            .map_err(|_| ExecError::transport("held command task dropped"))??;
        Ok(RemoteHold::new(first_line, release_tx))
    }

    async fn transfer_file(
        &self,
        local: &std::path::Path,
        remote: &str,
    ) -> Result<(), ExecError> {
        let session = self.session()?;
        let _permit = self.acquire().await?;

        let mut file = tokio::fs::File::open(local)
            .await
            .map_err(|source| ExecError::Spawn {
                command: format!("transfer {}", local.display()),
                source,
            })?;

        let cmd = format!("cat > {}", crate::shell_quote(remote));
        let mut child = session
            .shell(&cmd)
            .stdin(Stdio::piped())
            .spawn()
            .await
            .map_err(|e| self.transport_error(e))?;

        if let Some(mut stdin) = child.stdin().take() {
            tokio::io::copy(&mut file, &mut stdin)
                .await
                .map_err(|e| ExecError::transport(format!("file transfer failed: {e}")))?;
            stdin
                .shutdown()
                .await
                .map_err(|e| ExecError::transport(format!("file transfer failed: {e}")))?;
        }

        let status = child.wait().await.map_err(|e| self.transport_error(e))?;
        if !status.success() {
            return Err(ExecError::transport(format!(
                "remote write to {remote} exited with {status}"
            )));
        }
        Ok(())
    }

    async fn kill_all_remote_processes(&self, pattern: &str) -> Result<(), ExecError> {
        let cmd = format!("pkill -f {} || true", crate::shell_quote(pattern));
        self.run(&cmd).await.map(|_| ())
    }
}
