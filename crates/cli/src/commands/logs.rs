// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! `pc-switcher logs` - show recent session logs.

use anyhow::{Context, Result};
use clap::Args;
use pcs_core::paths;
use std::path::PathBuf;

#[derive(Args)]
pub struct LogsArgs {
    /// Print the contents of the newest log file
    #[arg(long = "last")]
    pub last: bool,
}

/// Session log files, newest first (the timestamp in the name sorts).
fn recent_logs(dir: &std::path::Path) -> Result<Vec<PathBuf>> {
    let mut files = Vec::new();
    if !dir.exists() {
        return Ok(files);
    }
    for entry in std::fs::read_dir(dir).context("cannot read log directory")? {
        let path = entry?.path();
        let name = path.file_name().and_then(|n| n.to_str()).unwrap_or("");
        if name.starts_with("sync-") && name.ends_with(".log") {
            files.push(path);
        }
    }
    files.sort();
    files.reverse();
    Ok(files)
}

pub fn run(args: LogsArgs) -> Result<()> {
    let dir = paths::logs_dir();
    let files = recent_logs(&dir)?;

    if files.is_empty() {
        println!("no session logs under {}", dir.display());
        return Ok(());
    }

    if args.last {
        let newest = &files[0];
        let content = std::fs::read_to_string(newest)
            .with_context(|| format!("cannot read {}", newest.display()))?;
        print!("{content}");
        return Ok(());
    }

    for path in files.iter().take(10) {
        println!("{}", path.display());
    }
    Ok(())
}

#[cfg(test)]
#[path = "logs_tests.rs"]
mod tests;
