// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! `pc-switcher update` - self-install the newest released version.

use crate::exit_error::ExitError;
use anyhow::Result;
use clap::Args;
use pcs_exec::{Executor, LocalExecutor};
use std::time::Duration;

const INSTALL_URL: &str =
    "https://raw.githubusercontent.com/flaksit/pc-switcher/main/install.sh";

const INSTALL_TIMEOUT: Duration = Duration::from_secs(300);

#[derive(Args)]
pub struct UpdateArgs {}

pub async fn run(_args: UpdateArgs) -> Result<()> {
    let token_prefix = match std::env::var("GITHUB_TOKEN") {
        Ok(token) if !token.is_empty() => {
            format!("GITHUB_TOKEN={} ", pcs_exec::shell_quote(&token))
        }
        _ => String::new(),
    };
    let cmd = format!("{token_prefix}curl -LsSf {INSTALL_URL} | sh");

    println!("updating pc-switcher to the newest released version...");
    let executor = LocalExecutor::new().with_login_shell();
    let result = executor.run_with_timeout(&cmd, INSTALL_TIMEOUT).await?;

    if !result.success() {
        return Err(ExitError {
            code: 1,
            message: Some(format!(
                "install script failed (exit {}): {}",
                result.exit_code,
                result.stderr.trim()
            )),
        }
        .into());
    }

    let version = executor.run("pc-switcher --version").await?;
    if version.success() {
        println!("now at {}", version.stdout.trim());
    }
    Ok(())
}
