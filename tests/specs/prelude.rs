//! Shared fixtures for the behavioural specs.

use pcs_core::{Config, Event, EventBus, Host, ToolVersion};
use pcs_engine::{Orchestrator, OrchestratorOptions, SessionReport};
use pcs_exec::{RemoteExecutor, ScriptedExecutor, ScriptedTransport};
use std::sync::Arc;
use tokio::sync::mpsc::UnboundedReceiver;

/// A complete scripted environment for one session run.
pub struct World {
    pub config: Config,
    pub transport: ScriptedTransport,
    pub source: ScriptedExecutor,
    pub bus: EventBus,
    pub events: UnboundedReceiver<Event>,
    _data_dir: tempfile::TempDir,
}

impl World {
    /// Fresh world: isolated data dir, target at the source version, target
    /// lock free.
    pub fn new(config_yaml: &str) -> Self {
        let data_dir = tempfile::tempdir().unwrap();
        std::env::set_var("PC_SWITCHER_DATA_DIR", data_dir.path());
        std::env::remove_var("XDG_RUNTIME_DIR");

        let config = Config::parse(config_yaml).unwrap();
        let transport = ScriptedTransport::new();
        let source = ScriptedExecutor::new(Host::Source);
        let bus = EventBus::new();
        let events = bus.subscribe();

        transport.executor().respond(
            "pc-switcher --version",
            0,
            &format!("pc-switcher {}\n", ToolVersion::current().unwrap()),
            "",
        );
        transport.executor().respond("mkdir -p", 0, "LOCKED\n", "");
        transport.executor().respond("hostname", 0, "desktop\n", "");

        Self {
            config,
            transport,
            source,
            bus,
            events,
            _data_dir: data_dir,
        }
    }

    /// Script healthy btrfs probes for the given subvolume on both hosts.
    pub fn with_healthy_subvolume(self, subvolume: &str) -> Self {
        let mount = if subvolume == "@" {
            "/".to_string()
        } else {
            format!("/{}", &subvolume[1..])
        };
        for exec in [&self.source, self.transport.executor()] {
            exec.respond("sudo btrfs subvolume show /.snapshots", 0, "snapshots", "");
            exec.respond(
                &format!("sudo btrfs subvolume show {mount}"),
                0,
                &format!("{subvolume}\n"),
                "",
            );
        }
        self
    }

    pub fn target(&self) -> &ScriptedExecutor {
        self.transport.executor()
    }

    /// Run one session to its terminal state.
    pub async fn run(&self) -> SessionReport {
        let transport = Arc::new(self.transport.clone());
        Orchestrator::new(
            self.config.clone(),
            "desktop",
            transport.clone(),
            Arc::new(self.source.clone()),
            Arc::new(RemoteExecutor::new(transport)),
            self.bus.clone(),
            false,
            OrchestratorOptions::default(),
        )
        .run()
        .await
    }

    /// Collect the log events observed so far.
    pub fn logs(&mut self) -> Vec<pcs_core::LogEvent> {
        let mut logs = Vec::new();
        while let Ok(event) = self.events.try_recv() {
            if let Event::Log(log) = event {
                logs.push(log);
            }
        }
        logs
    }

    /// Collect the progress percents observed so far for `job`.
    pub fn progress_percents(&mut self, job: &str) -> Vec<u8> {
        let mut percents = Vec::new();
        while let Ok(event) = self.events.try_recv() {
            if let Event::Progress(progress) = event {
                if progress.job == job {
                    if let Some(percent) = progress.update.percent {
                        percents.push(percent);
                    }
                }
            }
        }
        percents
    }
}
