// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

// Allow panic!/unwrap/expect in test code
#![cfg_attr(test, allow(clippy::panic))]
#![cfg_attr(test, allow(clippy::unwrap_used))]
#![cfg_attr(test, allow(clippy::expect_used))]

//! pcs-exec: command execution on source and target machines.
//!
//! Provides the uniform [`Executor`] contract, its local and remote
//! implementations, and the pooled SSH [`transport`](ssh::SshTransport) the
//! remote side runs on.

pub mod executor;
pub mod local;
pub mod remote;
pub mod ssh;

#[cfg(any(test, feature = "test-support"))]
pub mod scripted;

pub use executor::{ExecError, Executor, StreamHandle};
pub use local::LocalExecutor;
pub use remote::RemoteExecutor;
pub use ssh::{RemoteHold, SshTransport, Transport};

#[cfg(any(test, feature = "test-support"))]
pub use scripted::{ScriptedExecutor, ScriptedTransport};

/// Quote a string for safe interpolation into a POSIX shell command.
pub fn shell_quote(s: &str) -> String {
    format!("'{}'", s.replace('\'', "'\\''"))
}
