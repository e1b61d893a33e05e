// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Tool version parsing and comparison for the version gate.

use semver::Version;
use std::fmt;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum VersionError {
    #[error("invalid version string: {0}")]
    Invalid(String),
    #[error("no version found in output: {0:?}")]
    NotFound(String),
}

/// A normalised pc-switcher version.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord)]
pub struct ToolVersion(Version);

impl ToolVersion {
    /// Parse a version string, tolerating a leading `v`.
    pub fn parse(s: &str) -> Result<Self, VersionError> {
        let trimmed = s.trim().trim_start_matches('v');
        Version::parse(trimmed)
            .map(Self)
            .map_err(|_| VersionError::Invalid(s.to_string()))
    }

    /// Extract a version from `pc-switcher --version` output.
    ///
    /// Accepts `pc-switcher 0.3.0`, `pc-switcher version 0.3.0`, or a bare
    /// `0.3.0`.
    pub fn from_output(output: &str) -> Result<Self, VersionError> {
        output
            .split_whitespace()
            .find_map(|token| Self::parse(token).ok())
            .ok_or_else(|| VersionError::NotFound(output.trim().to_string()))
    }

    /// The version of the running binary, from package metadata.
    pub fn current() -> Result<Self, VersionError> {
        Self::parse(env!("CARGO_PKG_VERSION"))
    }

    /// The zero version, below every published release.
    pub fn zero() -> Self {
        Self(Version::new(0, 0, 0))
    }

    /// Git tag for this version (`v<semver>`).
    pub fn tag(&self) -> String {
        format!("v{}", self.0)
    }
}

impl fmt::Display for ToolVersion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

#[cfg(test)]
#[path = "version_tests.rs"]
mod tests;
