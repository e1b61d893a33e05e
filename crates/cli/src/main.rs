// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

// Allow panic!/unwrap/expect in test code
#![cfg_attr(test, allow(clippy::panic))]
#![cfg_attr(test, allow(clippy::unwrap_used))]
#![cfg_attr(test, allow(clippy::expect_used))]

//! pc-switcher - workstation sync CLI

mod color;
mod commands;
mod exit_error;
mod summary;

use anyhow::Result;
use clap::{Parser, Subcommand};
use commands::{logs, sync, update};

#[derive(Parser)]
#[command(
    name = "pc-switcher",
    version,
    about = "Synchronise this workstation's state to another machine over SSH"
)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run a sync session against a target machine
    Sync(sync::SyncArgs),
    /// Show recent session logs
    Logs(logs::LogsArgs),
    /// Self-install the newest released version
    Update(update::UpdateArgs),
}

#[tokio::main]
async fn main() {
    if let Err(e) = run().await {
        let code = e
            .downcast_ref::<exit_error::ExitError>()
            .map_or(1, |c| c.code);
        let msg = format_error(&e);
        if !msg.is_empty() {
            eprintln!("Error: {}", msg);
        }
        std::process::exit(code);
    }
}

async fn run() -> Result<()> {
    let cli = Cli::parse();
    match cli.command {
        Commands::Sync(args) => sync::run(args).await,
        Commands::Logs(args) => logs::run(args),
        Commands::Update(args) => update::run(args).await,
    }
}

/// Render an error chain as a single line, skipping silent exit errors.
fn format_error(error: &anyhow::Error) -> String {
    if let Some(exit) = error.downcast_ref::<exit_error::ExitError>() {
        return exit.message.clone().unwrap_or_default();
    }
    error
        .chain()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join(": ")
}
