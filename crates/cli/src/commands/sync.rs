// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! `pc-switcher sync <target>` - run a sync session.

use crate::color;
use crate::exit_error::ExitError;
use crate::summary;
use anyhow::Result;
use clap::Args;
use pcs_core::{paths, Config, EventBus, SessionState};
use pcs_engine::{Orchestrator, OrchestratorOptions};
use pcs_exec::ssh::SshTransport;
use pcs_exec::{LocalExecutor, RemoteExecutor, Transport};
use pcs_engine::signals::SIGINT_EXIT_CODE;
use std::path::PathBuf;
use std::sync::Arc;

#[derive(Args)]
pub struct SyncArgs {
    /// Target machine (hostname or SSH config alias)
    pub target: String,

    /// Configuration file (default: ~/.config/pc-switcher/config.yaml)
    #[arg(long = "config", value_name = "PATH")]
    pub config: Option<PathBuf>,

    /// Log intended actions without changing any state
    #[arg(long = "dry-run")]
    pub dry_run: bool,
}

pub async fn run(args: SyncArgs) -> Result<()> {
    let config_path = args.config.unwrap_or_else(paths::default_config_path);
    let config = Config::load(&config_path)?;
    let colorize = color::should_colorize();

    let bus = EventBus::new();
    let transport: Arc<dyn Transport> =
        Arc::new(SshTransport::new(&args.target, bus.clone()));
    let source = Arc::new(LocalExecutor::new());
    let target = Arc::new(RemoteExecutor::new(Arc::clone(&transport)).with_login_shell());

    let report = Orchestrator::new(
        config,
        &args.target,
        transport,
        source,
        target,
        bus,
        args.dry_run,
        OrchestratorOptions { color: colorize },
    )
    .run()
    .await;

    summary::print(&report, colorize);

    match report.state {
        SessionState::Completed => Ok(()),
        SessionState::Aborted => Err(ExitError::silent(SIGINT_EXIT_CODE).into()),
        _ => Err(ExitError::silent(1).into()),
    }
}
