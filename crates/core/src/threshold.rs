// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Disk-space threshold parsing and formatting.
//!
//! Thresholds are either a percentage of total space (`"20%"`) or an
//! absolute size with a unit suffix (`"50GiB"`). Bare numbers are rejected.
//! Formatting round-trips every canonical form.

use serde::de::Error as _;
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

/// Supported absolute-size units.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ByteUnit {
    GiB,
    MiB,
    GB,
    MB,
}

impl ByteUnit {
    pub fn multiplier(&self) -> u64 {
        match self {
            ByteUnit::GiB => 1 << 30,
            ByteUnit::MiB => 1 << 20,
            ByteUnit::GB => 1_000_000_000,
            ByteUnit::MB => 1_000_000,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            ByteUnit::GiB => "GiB",
            ByteUnit::MiB => "MiB",
            ByteUnit::GB => "GB",
            ByteUnit::MB => "MB",
        }
    }
}

#[derive(Debug, Error, PartialEq, Eq)]
#[error("invalid threshold format: {input} (expected \"20%\" or \"<n>GiB|MiB|GB|MB\")")]
pub struct ThresholdParseError {
    pub input: String,
}

/// A minimum-free-space requirement.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Threshold {
    /// Percentage of total space, 0-100.
    Percent(u8),
    /// Absolute size in the given unit.
    Bytes { value: u64, unit: ByteUnit },
}

impl Threshold {
    /// Bytes required on a filesystem of `total_bytes` capacity.
    pub fn required_bytes(&self, total_bytes: u64) -> u64 {
        match self {
            Threshold::Percent(p) => total_bytes / 100 * u64::from(*p),
            Threshold::Bytes { value, unit } => value.saturating_mul(unit.multiplier()),
        }
    }
}

impl FromStr for Threshold {
    type Err = ThresholdParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let err = || ThresholdParseError {
            input: s.to_string(),
        };
        if let Some(num) = s.strip_suffix('%') {
            let p: u8 = num.parse().map_err(|_| err())?;
            if p > 100 {
                return Err(err());
            }
            return Ok(Threshold::Percent(p));
        }
        for unit in [ByteUnit::GiB, ByteUnit::MiB, ByteUnit::GB, ByteUnit::MB] {
            if let Some(num) = s.strip_suffix(unit.as_str()) {
                let value: u64 = num.parse().map_err(|_| err())?;
                return Ok(Threshold::Bytes { value, unit });
            }
        }
        Err(err())
    }
}

impl fmt::Display for Threshold {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Threshold::Percent(p) => write!(f, "{p}%"),
            Threshold::Bytes { value, unit } => write!(f, "{value}{}", unit.as_str()),
        }
    }
}

impl Serialize for Threshold {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

impl<'de> Deserialize<'de> for Threshold {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let s = String::deserialize(deserializer)?;
        s.parse().map_err(D::Error::custom)
    }
}

#[cfg(test)]
#[path = "threshold_tests.rs"]
mod tests;
