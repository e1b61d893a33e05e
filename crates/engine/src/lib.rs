// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

// Allow panic!/unwrap/expect in test code
#![cfg_attr(test, allow(clippy::panic))]
#![cfg_attr(test, allow(clippy::unwrap_used))]
#![cfg_attr(test, allow(clippy::expect_used))]

//! pcs-engine: the sync session engine.
//!
//! Binds the executors, event bus, locks, snapshot envelope, interrupt
//! controller and logging sink into the session state machine driven by the
//! [`Orchestrator`].

pub mod lock;
pub mod logging;
pub mod monitor;
pub mod orchestrator;
pub mod signals;
pub mod snapshots;

pub use lock::{LockHolder, RemoteLock, RemoteLockOutcome, SyncLock};
pub use logging::{LogSink, SinkConfig};
pub use monitor::DiskWatchdog;
pub use orchestrator::{Orchestrator, OrchestratorOptions, SessionReport};
pub use signals::InterruptController;
pub use snapshots::{SnapshotEnvelope, SnapshotInfo, SnapshotPhase};
