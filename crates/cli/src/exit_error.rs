// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Error type carrying a specific process exit code.

use std::fmt;

/// Bubbles a non-default exit code up to `main`.
///
/// `message: None` exits silently (the summary has already told the user
/// what happened).
#[derive(Debug)]
pub struct ExitError {
    pub code: i32,
    pub message: Option<String>,
}

impl ExitError {
    pub fn silent(code: i32) -> Self {
        Self {
            code,
            message: None,
        }
    }
}

impl fmt::Display for ExitError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.message {
            Some(message) => f.write_str(message),
            None => write!(f, "exit {}", self.code),
        }
    }
}

impl std::error::Error for ExitError {}
