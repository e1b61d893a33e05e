// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Interrupt handling: graceful shutdown with double-signal forced kill.
//!
//! The first SIGINT latches the session's abort flag and cancels the
//! currently running job; the job gets a bounded window to wind down. A
//! second SIGINT within the force window terminates the process immediately
//! with the conventional 130 exit code.

use parking_lot::Mutex;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::signal::unix::{signal, SignalKind};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::debug;

/// Window in which a second interrupt forces immediate termination.
pub const FORCE_WINDOW: Duration = Duration::from_secs(2);

/// How long an aborting job may run before it is abandoned.
pub const ABORT_DEADLINE: Duration = Duration::from_secs(5);

/// Exit code for termination by SIGINT (128 + 2).
pub const SIGINT_EXIT_CODE: i32 = 130;

/// What a signal delivery should do.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum SignalAction {
    /// Latch abort, cancel the current job, keep running.
    Graceful,
    /// Terminate the process immediately.
    Force,
}

#[derive(Default)]
struct InterruptState {
    first_interrupt: Option<Instant>,
}

impl InterruptState {
    /// First signal, or a signal after the force window, is graceful; a
    /// second signal inside the window forces termination.
    fn on_signal(&mut self, now: Instant) -> SignalAction {
        if let Some(first) = self.first_interrupt {
            if now.duration_since(first) <= FORCE_WINDOW {
                return SignalAction::Force;
            }
        }
        self.first_interrupt = Some(now);
        SignalAction::Graceful
    }
}

/// The slot naming the currently running job.
///
/// A lookup key plus cancellation token, refreshed on every job start and
/// end; never an owning handle to the job itself.
type CurrentJob = Option<(String, CancellationToken)>;

/// Captures SIGINT for the duration of a session.
pub struct InterruptController {
    state: Arc<Mutex<InterruptState>>,
    current_job: Arc<Mutex<CurrentJob>>,
    abort_latch: Arc<AtomicBool>,
    listener: Option<JoinHandle<()>>,
}

impl InterruptController {
    /// Install the SIGINT listener. `abort_latch` is the session's
    /// monotonic abort flag.
    pub fn install(abort_latch: Arc<AtomicBool>) -> std::io::Result<Self> {
        let state = Arc::new(Mutex::new(InterruptState::default()));
        let current_job = Arc::new(Mutex::new(CurrentJob::None));

        let listener = {
            let state = Arc::clone(&state);
            let current_job = Arc::clone(&current_job);
            let abort_latch = Arc::clone(&abort_latch);
            let mut sigint = signal(SignalKind::interrupt())?;

            tokio::spawn(async move {
                while sigint.recv().await.is_some() {
                    let action = state.lock().on_signal(Instant::now());
                    match action {
                        SignalAction::Force => {
                            eprintln!("\nForce terminating immediately...");
                            std::process::exit(SIGINT_EXIT_CODE);
                        }
                        SignalAction::Graceful => {
                            abort_latch.store(true, Ordering::SeqCst);
                            eprintln!("\nInterrupt received. Initiating graceful shutdown...");
                            eprintln!(
                                "Press Ctrl+C again within {}s to force terminate.",
                                FORCE_WINDOW.as_secs()
                            );
                            let current = current_job.lock().clone();
                            if let Some((name, cancel)) = current {
                                debug!(job = %name, "cancelling current job");
                                cancel.cancel();
                            }
                        }
                    }
                }
            })
        };

        Ok(Self {
            state,
            current_job,
            abort_latch,
            listener: Some(listener),
        })
    }

    /// Record the job now running, replacing the previous slot.
    pub fn set_current_job(&self, name: impl Into<String>, cancel: CancellationToken) {
        *self.current_job.lock() = Some((name.into(), cancel));
    }

    /// Clear the slot between jobs.
    pub fn clear_current_job(&self) {
        *self.current_job.lock() = None;
    }

    pub fn abort_requested(&self) -> bool {
        self.abort_latch.load(Ordering::SeqCst)
    }

    /// Remove the listener. The prior signal disposition applies again once
    /// the stream is dropped.
    pub fn shutdown(mut self) {
        if let Some(listener) = self.listener.take() {
            listener.abort();
        }
    }

    #[cfg(test)]
    pub(crate) fn simulate_signal(&self, now: Instant) -> SignalAction {
        let action = self.state.lock().on_signal(now);
        if action == SignalAction::Graceful {
            self.abort_latch.store(true, Ordering::SeqCst);
            let current = self.current_job.lock().clone();
            if let Some((_, cancel)) = current {
                cancel.cancel();
            }
        }
        action
    }
}

impl Drop for InterruptController {
    fn drop(&mut self) {
        if let Some(listener) = self.listener.take() {
            listener.abort();
        }
    }
}

#[cfg(test)]
#[path = "signals_tests.rs"]
mod tests;
