// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Configuration loading and validation.
//!
//! The config file is YAML at `~/.config/pc-switcher/config.yaml`. Loading
//! accumulates every error before failing so the operator sees all problems
//! in one pass. `sync_jobs` preserves file order; that order is the job
//! execution order.

use crate::model::{ConfigError, LogLevel};
use crate::threshold::Threshold;
use indexmap::IndexMap;
use serde_yaml::Value;
use std::path::Path;
use thiserror::Error;

/// Disk space monitoring configuration.
#[derive(Debug, Clone, PartialEq)]
pub struct DiskConfig {
    pub preflight_minimum: Threshold,
    pub runtime_minimum: Threshold,
    /// Seconds between runtime checks.
    pub check_interval: u64,
}

impl Default for DiskConfig {
    fn default() -> Self {
        Self {
            preflight_minimum: Threshold::Percent(20),
            runtime_minimum: Threshold::Percent(15),
            check_interval: 30,
        }
    }
}

/// Btrfs snapshot envelope configuration.
#[derive(Debug, Clone, PartialEq)]
pub struct BtrfsConfig {
    /// Logical subvolume names, each beginning with `@`.
    pub subvolumes: Vec<String>,
    pub keep_recent: usize,
    pub max_age_days: Option<u32>,
    /// Restore the target from PRE snapshots when a required job fails.
    pub rollback_on_failure: bool,
}

impl Default for BtrfsConfig {
    fn default() -> Self {
        Self {
            subvolumes: vec!["@".to_string(), "@home".to_string()],
            keep_recent: 3,
            max_age_days: None,
            rollback_on_failure: false,
        }
    }
}

/// Parsed and validated configuration.
#[derive(Debug, Clone)]
pub struct Config {
    pub log_file_level: LogLevel,
    pub log_cli_level: LogLevel,
    /// Job name -> enabled, in file order.
    pub sync_jobs: IndexMap<String, bool>,
    pub disk: DiskConfig,
    pub btrfs_snapshots: BtrfsConfig,
    /// Per-job configuration blocks keyed by job name.
    pub job_configs: IndexMap<String, serde_json::Value>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            log_file_level: LogLevel::Full,
            log_cli_level: LogLevel::Info,
            sync_jobs: IndexMap::new(),
            disk: DiskConfig::default(),
            btrfs_snapshots: BtrfsConfig::default(),
            job_configs: IndexMap::new(),
        }
    }
}

/// Configuration loading or validation failed.
#[derive(Debug, Error)]
#[error("configuration validation failed:\n{}", format_errors(.errors))]
pub struct ConfigurationError {
    pub errors: Vec<ConfigError>,
}

fn format_errors(errors: &[ConfigError]) -> String {
    errors
        .iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join("\n")
}

/// Top-level keys that are not per-job config blocks.
const GLOBAL_KEYS: &[&str] = &[
    "log_file_level",
    "log_cli_level",
    "sync_jobs",
    "disk",
    "btrfs_snapshots",
];

impl Config {
    /// Load and validate the configuration file.
    ///
    /// All errors are accumulated and returned together.
    pub fn load(path: &Path) -> Result<Self, ConfigurationError> {
        let text = std::fs::read_to_string(path).map_err(|e| ConfigurationError {
            errors: vec![ConfigError {
                job: None,
                path: path.display().to_string(),
                message: format!("cannot read configuration file: {e}"),
            }],
        })?;
        Self::parse(&text)
    }

    /// Parse configuration from a YAML string.
    pub fn parse(text: &str) -> Result<Self, ConfigurationError> {
        let value: Value = serde_yaml::from_str(text).map_err(|e| ConfigurationError {
            errors: vec![ConfigError {
                job: None,
                path: "root".to_string(),
                message: format!("YAML syntax error: {e}"),
            }],
        })?;

        let mut errors = Vec::new();
        let mapping = match value {
            Value::Null => serde_yaml::Mapping::new(),
            Value::Mapping(m) => m,
            _ => {
                return Err(ConfigurationError {
                    errors: vec![ConfigError {
                        job: None,
                        path: "root".to_string(),
                        message: "configuration must be a mapping".to_string(),
                    }],
                })
            }
        };

        let mut config = Config::default();

        if let Some(v) = mapping.get("log_file_level") {
            match parse_level(v, "log_file_level") {
                Ok(level) => config.log_file_level = level,
                Err(e) => errors.push(e),
            }
        }
        if let Some(v) = mapping.get("log_cli_level") {
            match parse_level(v, "log_cli_level") {
                Ok(level) => config.log_cli_level = level,
                Err(e) => errors.push(e),
            }
        }
        if let Some(v) = mapping.get("sync_jobs") {
            match parse_sync_jobs(v) {
                Ok(jobs) => config.sync_jobs = jobs,
                Err(mut e) => errors.append(&mut e),
            }
        }
        if let Some(v) = mapping.get("disk") {
            match parse_disk(v) {
                Ok(disk) => config.disk = disk,
                Err(mut e) => errors.append(&mut e),
            }
        }
        if let Some(v) = mapping.get("btrfs_snapshots") {
            match parse_btrfs(v) {
                Ok(btrfs) => config.btrfs_snapshots = btrfs,
                Err(mut e) => errors.append(&mut e),
            }
        }

        // Remaining mapping-valued top-level keys are per-job config blocks.
        for (key, val) in &mapping {
            let Some(name) = key.as_str() else {
                errors.push(ConfigError {
                    job: None,
                    path: "root".to_string(),
                    message: "non-string top-level key".to_string(),
                });
                continue;
            };
            if GLOBAL_KEYS.contains(&name) {
                continue;
            }
            if !val.is_mapping() {
                errors.push(ConfigError {
                    job: None,
                    path: name.to_string(),
                    message: "unknown top-level key (job config blocks must be mappings)"
                        .to_string(),
                });
                continue;
            }
            match serde_json::to_value(val) {
                Ok(json) => {
                    config.job_configs.insert(name.to_string(), json);
                }
                Err(e) => errors.push(ConfigError {
                    job: Some(name.to_string()),
                    path: name.to_string(),
                    message: format!("invalid job config: {e}"),
                }),
            }
        }

        if errors.is_empty() {
            Ok(config)
        } else {
            Err(ConfigurationError { errors })
        }
    }

    /// Enabled job names, in declaration order.
    pub fn enabled_jobs(&self) -> Vec<String> {
        self.sync_jobs
            .iter()
            .filter(|(_, enabled)| **enabled)
            .map(|(name, _)| name.clone())
            .collect()
    }

    /// Job-specific config block, empty object when absent.
    pub fn job_config(&self, job_name: &str) -> serde_json::Value {
        self.job_configs
            .get(job_name)
            .cloned()
            .unwrap_or_else(|| serde_json::Value::Object(serde_json::Map::new()))
    }
}

fn parse_level(value: &Value, path: &str) -> Result<LogLevel, ConfigError> {
    let text = value.as_str().ok_or_else(|| ConfigError {
        job: None,
        path: path.to_string(),
        message: "log level must be a string".to_string(),
    })?;
    text.parse().map_err(|message| ConfigError {
        job: None,
        path: path.to_string(),
        message,
    })
}

fn parse_sync_jobs(value: &Value) -> Result<IndexMap<String, bool>, Vec<ConfigError>> {
    let mapping = value.as_mapping().ok_or_else(|| {
        vec![ConfigError {
            job: None,
            path: "sync_jobs".to_string(),
            message: "sync_jobs must be a mapping of job name to bool".to_string(),
        }]
    })?;
    let mut jobs = IndexMap::new();
    let mut errors = Vec::new();
    for (key, val) in mapping {
        let Some(name) = key.as_str() else {
            errors.push(ConfigError {
                job: None,
                path: "sync_jobs".to_string(),
                message: "job names must be strings".to_string(),
            });
            continue;
        };
        match val.as_bool() {
            Some(enabled) => {
                jobs.insert(name.to_string(), enabled);
            }
            None => errors.push(ConfigError {
                job: Some(name.to_string()),
                path: format!("sync_jobs.{name}"),
                message: "enabled flag must be a bool".to_string(),
            }),
        }
    }
    if errors.is_empty() {
        Ok(jobs)
    } else {
        Err(errors)
    }
}

fn parse_threshold_field(
    mapping: &serde_yaml::Mapping,
    field: &str,
    default: Threshold,
    errors: &mut Vec<ConfigError>,
) -> Threshold {
    let Some(v) = mapping.get(field) else {
        return default;
    };
    let Some(text) = v.as_str() else {
        errors.push(ConfigError {
            job: None,
            path: format!("disk.{field}"),
            message: "threshold must be a string like \"20%\" or \"50GiB\"".to_string(),
        });
        return default;
    };
    match text.parse() {
        Ok(t) => t,
        Err(e) => {
            errors.push(ConfigError {
                job: None,
                path: format!("disk.{field}"),
                message: format!("{e}"),
            });
            default
        }
    }
}

fn parse_disk(value: &Value) -> Result<DiskConfig, Vec<ConfigError>> {
    let mapping = value.as_mapping().ok_or_else(|| {
        vec![ConfigError {
            job: None,
            path: "disk".to_string(),
            message: "disk must be a mapping".to_string(),
        }]
    })?;
    let mut errors = Vec::new();
    let defaults = DiskConfig::default();
    let preflight_minimum = parse_threshold_field(
        mapping,
        "preflight_minimum",
        defaults.preflight_minimum,
        &mut errors,
    );
    let runtime_minimum = parse_threshold_field(
        mapping,
        "runtime_minimum",
        defaults.runtime_minimum,
        &mut errors,
    );
    let check_interval = match mapping.get("check_interval") {
        None => defaults.check_interval,
        Some(v) => match v.as_u64() {
            Some(n) if n > 0 => n,
            _ => {
                errors.push(ConfigError {
                    job: None,
                    path: "disk.check_interval".to_string(),
                    message: "check_interval must be a positive integer".to_string(),
                });
                defaults.check_interval
            }
        },
    };
    if errors.is_empty() {
        Ok(DiskConfig {
            preflight_minimum,
            runtime_minimum,
            check_interval,
        })
    } else {
        Err(errors)
    }
}

fn parse_btrfs(value: &Value) -> Result<BtrfsConfig, Vec<ConfigError>> {
    let mapping = value.as_mapping().ok_or_else(|| {
        vec![ConfigError {
            job: None,
            path: "btrfs_snapshots".to_string(),
            message: "btrfs_snapshots must be a mapping".to_string(),
        }]
    })?;
    let mut errors = Vec::new();
    let defaults = BtrfsConfig::default();

    let subvolumes = match mapping.get("subvolumes") {
        None => defaults.subvolumes,
        Some(v) => match v.as_sequence() {
            Some(seq) => {
                let mut names = Vec::new();
                for item in seq {
                    match item.as_str() {
                        Some(name) if name.starts_with('@') => names.push(name.to_string()),
                        Some(name) => errors.push(ConfigError {
                            job: None,
                            path: "btrfs_snapshots.subvolumes".to_string(),
                            message: format!("subvolume {name} must begin with '@'"),
                        }),
                        None => errors.push(ConfigError {
                            job: None,
                            path: "btrfs_snapshots.subvolumes".to_string(),
                            message: "subvolume names must be strings".to_string(),
                        }),
                    }
                }
                names
            }
            None => {
                errors.push(ConfigError {
                    job: None,
                    path: "btrfs_snapshots.subvolumes".to_string(),
                    message: "subvolumes must be a list".to_string(),
                });
                defaults.subvolumes
            }
        },
    };

    let keep_recent = match mapping.get("keep_recent") {
        None => defaults.keep_recent,
        Some(v) => match v.as_u64() {
            Some(n) => n as usize,
            None => {
                errors.push(ConfigError {
                    job: None,
                    path: "btrfs_snapshots.keep_recent".to_string(),
                    message: "keep_recent must be a non-negative integer".to_string(),
                });
                defaults.keep_recent
            }
        },
    };

    let max_age_days = match mapping.get("max_age_days") {
        None => None,
        Some(v) => match v.as_u64() {
            Some(n) => Some(n as u32),
            None => {
                errors.push(ConfigError {
                    job: None,
                    path: "btrfs_snapshots.max_age_days".to_string(),
                    message: "max_age_days must be a non-negative integer".to_string(),
                });
                None
            }
        },
    };

    let rollback_on_failure = match mapping.get("rollback_on_failure") {
        None => false,
        Some(v) => match v.as_bool() {
            Some(b) => b,
            None => {
                errors.push(ConfigError {
                    job: None,
                    path: "btrfs_snapshots.rollback_on_failure".to_string(),
                    message: "rollback_on_failure must be a bool".to_string(),
                });
                false
            }
        },
    };

    if errors.is_empty() {
        Ok(BtrfsConfig {
            subvolumes,
            keep_recent,
            max_age_days,
            rollback_on_failure,
        })
    } else {
        Err(errors)
    }
}

#[cfg(test)]
#[path = "config_tests.rs"]
mod tests;
