//! Behavioral specifications for the pc-switcher sync engine.
//!
//! These tests drive whole sessions through the public orchestrator API
//! against scripted executors and transports, verifying the state machine,
//! lock protocol, snapshot envelope and retention behave per contract.

#![allow(clippy::unwrap_used, clippy::expect_used, clippy::panic)]

#[path = "specs/prelude.rs"]
mod prelude;

#[path = "specs/session.rs"]
mod session;

#[path = "specs/locking.rs"]
mod locking;

#[path = "specs/retention.rs"]
mod retention;

#[path = "specs/thresholds.rs"]
mod thresholds;
