// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! The session orchestrator: drives the state machine, dispatches jobs,
//! and binds executors, locks, snapshots, signals and logging together.

use crate::lock::{LockHolder, RemoteLock, RemoteLockOutcome, SyncLock};
use crate::logging::{LogSink, SinkConfig};
use crate::monitor::DiskWatchdog;
use crate::signals::{InterruptController, ABORT_DEADLINE};
use crate::snapshots::{SnapshotEnvelope, SnapshotPhase};
use indexmap::IndexMap;
use pcs_core::{
    history, paths, Config, Event, JobStatus, LogEvent, LogLevel, LogOrigin, SessionId,
    SessionState, SyncRole, SyncSession, ValidationError,
};
use pcs_core::{ConfigError, EventBus};
use pcs_exec::{Executor, Transport};
use pcs_jobs::install_on_target::InstallOnTargetJob;
use pcs_jobs::{create_job, is_known_job, JobContext, SyncError, SyncJob};
use std::path::PathBuf;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio_util::sync::CancellationToken;

/// Presentation choices made by the CLI.
#[derive(Debug, Clone, Default)]
pub struct OrchestratorOptions {
    pub color: bool,
}

/// Outcome of one session, for the CLI summary.
#[derive(Debug)]
pub struct SessionReport {
    pub session_id: SessionId,
    pub state: SessionState,
    pub duration: Duration,
    pub job_results: IndexMap<String, JobStatus>,
    pub log_file: PathBuf,
    pub failure: Option<String>,
}

impl SessionReport {
    pub fn succeeded(&self) -> usize {
        self.job_results
            .values()
            .filter(|s| **s == JobStatus::Success)
            .count()
    }

    pub fn failed(&self) -> usize {
        self.job_results
            .values()
            .filter(|s| **s == JobStatus::Failed)
            .count()
    }
}

/// How EXECUTING ended.
enum ExecOutcome {
    Finished,
    Aborted,
    HardFailure(String),
    TransportFailure(String),
}

struct PreparedJob {
    name: String,
    job: Box<dyn SyncJob>,
    cancel: CancellationToken,
}

/// Binds L1-L9 and drives a single session to a terminal state.
pub struct Orchestrator {
    config: Config,
    target_destination: String,
    dry_run: bool,
    bus: EventBus,
    transport: Arc<dyn Transport>,
    source: Arc<dyn Executor>,
    target: Arc<dyn Executor>,
    options: OrchestratorOptions,
}

impl Orchestrator {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        config: Config,
        target_destination: impl Into<String>,
        transport: Arc<dyn Transport>,
        source: Arc<dyn Executor>,
        target: Arc<dyn Executor>,
        bus: EventBus,
        dry_run: bool,
        options: OrchestratorOptions,
    ) -> Self {
        Self {
            config,
            target_destination: target_destination.into(),
            dry_run,
            bus,
            transport,
            source,
            target,
            options,
        }
    }

    fn log(&self, level: LogLevel, message: impl Into<String>) {
        self.bus.publish(Event::Log(LogEvent::new(
            level,
            "orchestrator",
            LogOrigin::Orchestrator,
            message,
        )));
    }

    /// The ordered job list: the version gate first, then every enabled job.
    fn job_names(&self) -> Vec<String> {
        let mut names = vec![InstallOnTargetJob::NAME.to_string()];
        for name in self.config.enabled_jobs() {
            if name != InstallOnTargetJob::NAME {
                names.push(name);
            }
        }
        names
    }

    fn job_config_value(&self, name: &str) -> serde_json::Value {
        if name == "disk_space_monitor" {
            serde_json::json!({
                "preflight_minimum": self.config.disk.preflight_minimum.to_string(),
                "runtime_minimum": self.config.disk.runtime_minimum.to_string(),
                "check_interval": self.config.disk.check_interval,
            })
        } else {
            self.config.job_config(name)
        }
    }

    fn prepare_jobs(&self, session: &SyncSession) -> Result<Vec<PreparedJob>, Vec<ConfigError>> {
        let mut jobs = Vec::new();
        let mut errors = Vec::new();
        for name in &session.enabled_jobs {
            if !is_known_job(name) {
                errors.push(ConfigError {
                    job: Some(name.clone()),
                    path: format!("sync_jobs.{name}"),
                    message: "unknown job".to_string(),
                });
                continue;
            }
            let ctx = JobContext {
                config: self.job_config_value(name),
                source: Arc::clone(&self.source),
                target: Arc::clone(&self.target),
                bus: self.bus.clone(),
                job_name: name.clone(),
                session_id: session.id.clone(),
                source_hostname: session.source_hostname.clone(),
                target_hostname: session.target_hostname.clone(),
                dry_run: session.dry_run,
            };
            let cancel = CancellationToken::new();
            if let Some(job) = create_job(name, ctx, cancel.clone()) {
                jobs.push(PreparedJob {
                    name: name.clone(),
                    job,
                    cancel,
                });
            }
        }
        if errors.is_empty() {
            Ok(jobs)
        } else {
            Err(errors)
        }
    }

    /// Run one sync session to a terminal state.
    pub async fn run(self) -> SessionReport {
        let started = Instant::now();
        let mut session = SyncSession::new(
            local_hostname(),
            self.target_destination.clone(),
            self.job_names(),
            self.dry_run,
        );
        let log_file = paths::log_file_path(session.started_at, &session.id);

        let sink = match LogSink::spawn(
            &self.bus,
            SinkConfig {
                file_path: log_file.clone(),
                file_level: self.config.log_file_level,
                cli_level: self.config.log_cli_level,
                hostname: session.source_hostname.clone(),
                error_latch: session.error_latch(),
                color: self.options.color,
            },
        ) {
            Ok(sink) => sink,
            Err(e) => {
                let _ = session.set_state(SessionState::Failed);
                return SessionReport {
                    session_id: session.id.clone(),
                    state: SessionState::Failed,
                    duration: started.elapsed(),
                    job_results: IndexMap::new(),
                    log_file,
                    failure: Some(format!("cannot open log file: {e}")),
                };
            }
        };

        self.log(
            LogLevel::Info,
            format!(
                "session {} starting: {} -> {}{}",
                session.id,
                session.source_hostname,
                session.target_hostname,
                if self.dry_run { " (dry-run)" } else { "" }
            ),
        );

        let failure = self.drive(&mut session).await;

        if let Some(message) = &failure {
            self.log(LogLevel::Critical, message.clone());
        }
        self.log(
            LogLevel::Info,
            format!("session {} finished: {}", session.id, session.state()),
        );

        self.bus.close();
        sink.finish().await;

        SessionReport {
            session_id: session.id.clone(),
            state: session.state(),
            duration: started.elapsed(),
            job_results: session.job_results().clone(),
            log_file,
            failure,
        }
    }

    /// Drive the state machine. Returns the failure message for FAILED
    /// sessions.
    async fn drive(&self, session: &mut SyncSession) -> Option<String> {
        // -- INITIALIZING --------------------------------------------------
        self.warn_on_repeated_source_role();

        let mut source_lock = SyncLock::at_default_path();
        let source_holder = LockHolder::new(
            SyncRole::Source,
            session.source_hostname.clone(),
            session.id.clone(),
        );
        match source_lock.acquire(&source_holder) {
            Ok(true) => {}
            Ok(false) => {
                let holder = source_lock
                    .holder()
                    .map(|h| h.to_string())
                    .unwrap_or_else(|| "unknown".to_string());
                let _ = session.set_state(SessionState::Failed);
                return Some(format!("another sync is running (lock held by {holder})"));
            }
            Err(e) => {
                let _ = session.set_state(SessionState::Failed);
                return Some(format!("cannot acquire local lock: {e}"));
            }
        }

        if let Err(e) = self.transport.connect().await {
            let _ = session.set_state(SessionState::Failed);
            return Some(format!("cannot connect to target: {e}"));
        }

        // Resolve the target's real hostname for holder strings and logs
        if let Ok(result) = self.transport.run("hostname").await {
            let name = result.stdout.trim();
            if result.success() && !name.is_empty() {
                session.target_hostname = name.to_string();
            }
        }

        let target_holder = LockHolder::new(
            SyncRole::Target,
            session.target_hostname.clone(),
            session.id.clone(),
        );
        let remote_lock = match RemoteLock::acquire(self.transport.as_ref(), &target_holder).await
        {
            Ok(RemoteLockOutcome::Acquired(lock)) => Some(lock),
            Ok(RemoteLockOutcome::Contended(holder)) => {
                let holder = holder
                    .map(|h| h.to_string())
                    .unwrap_or_else(|| "unknown".to_string());
                let _ = session.set_state(SessionState::Failed);
                self.transport.disconnect().await;
                return Some(format!(
                    "target is busy (lock held by {holder})"
                ));
            }
            Err(e) => {
                let _ = session.set_state(SessionState::Failed);
                self.transport.disconnect().await;
                return Some(format!("cannot acquire target lock: {e}"));
            }
        };

        let controller = match InterruptController::install(session.abort_latch()) {
            Ok(controller) => controller,
            Err(e) => {
                let _ = session.set_state(SessionState::Failed);
                self.release_remote(remote_lock).await;
                return Some(format!("cannot install signal handlers: {e}"));
            }
        };

        // -- VALIDATING ----------------------------------------------------
        let _ = session.set_state(SessionState::Validating);

        let jobs = match self.prepare_jobs(session) {
            Ok(jobs) => jobs,
            Err(errors) => {
                for error in &errors {
                    self.log(LogLevel::Error, error.to_string());
                }
                let _ = session.set_state(SessionState::Failed);
                self.release_remote(remote_lock).await;
                controller.shutdown();
                return Some(format!(
                    "configuration failed with {} error(s)",
                    errors.len()
                ));
            }
        };

        let envelope = SnapshotEnvelope::new(
            Arc::clone(&self.source),
            Arc::clone(&self.target),
            self.config.btrfs_snapshots.clone(),
            self.bus.clone(),
            session.id.clone(),
            session.started_at,
            session.dry_run,
        );
        if !envelope.enabled() {
            self.log(
                LogLevel::Warning,
                "snapshot envelope disabled (no subvolumes configured); rollback unavailable",
            );
        }

        let mut config_errors = Vec::new();
        for prepared in &jobs {
            config_errors.extend(prepared.job.validate_config());
        }
        let mut validation_errors: Vec<ValidationError> = Vec::new();
        if config_errors.is_empty() {
            for prepared in &jobs {
                validation_errors.extend(prepared.job.validate().await);
            }
            if envelope.enabled() {
                validation_errors.extend(envelope.validate().await);
            }
        }

        if !config_errors.is_empty() || !validation_errors.is_empty() {
            for error in &config_errors {
                self.log(LogLevel::Error, error.to_string());
            }
            for error in &validation_errors {
                self.log(LogLevel::Error, error.to_string());
            }
            let count = config_errors.len() + validation_errors.len();
            let _ = session.set_state(SessionState::Failed);
            self.release_remote(remote_lock).await;
            controller.shutdown();
            return Some(format!("validation failed with {count} error(s)"));
        }

        if session.abort_requested() {
            let _ = session.set_state(SessionState::Aborted);
            self.release_remote(remote_lock).await;
            controller.shutdown();
            return None;
        }

        // -- EXECUTING -----------------------------------------------------
        let _ = session.set_state(SessionState::Executing);

        let outcome = if let Err(e) = envelope.create(SnapshotPhase::Pre).await {
            ExecOutcome::HardFailure(format!("pre-sync snapshots failed: {e}"))
        } else {
            self.execute_jobs(session, jobs, &controller).await
        };

        // -- CLEANUP -------------------------------------------------------
        let failure = self
            .cleanup(session, &envelope, remote_lock, outcome)
            .await;
        controller.shutdown();
        failure
    }

    async fn execute_jobs(
        &self,
        session: &mut SyncSession,
        jobs: Vec<PreparedJob>,
        controller: &InterruptController,
    ) -> ExecOutcome {
        let watchdog = if session.enabled_jobs.iter().any(|n| n == "disk_space_monitor") {
            Some(DiskWatchdog::spawn(
                Arc::clone(&self.source),
                Arc::clone(&self.target),
                "/".to_string(),
                self.config.disk.runtime_minimum,
                Duration::from_secs(self.config.disk.check_interval),
                self.bus.clone(),
            ))
        } else {
            None
        };

        let mut outcome = ExecOutcome::Finished;
        for prepared in jobs {
            if session.abort_requested() {
                outcome = ExecOutcome::Aborted;
                break;
            }
            if let Some(breach) = watchdog.as_ref().and_then(|w| w.breach()) {
                session.record_result(&prepared.name, JobStatus::Failed);
                outcome = ExecOutcome::HardFailure(breach);
                break;
            }

            let name = prepared.name.clone();
            let required = prepared.job.required();
            self.log(LogLevel::Info, format!("running job {name}"));
            controller.set_current_job(&name, prepared.cancel.clone());

            let job_outcome = self
                .run_job_lifecycle(prepared.job, prepared.cancel.clone())
                .await;
            controller.clear_current_job();

            match job_outcome {
                JobOutcome::Success => {
                    session.record_result(&name, JobStatus::Success);
                    self.log(LogLevel::Info, format!("job {name} succeeded"));
                }
                JobOutcome::Aborted => {
                    session.record_result(&name, JobStatus::Skipped);
                    outcome = ExecOutcome::Aborted;
                    break;
                }
                JobOutcome::Abandoned => {
                    session.record_result(&name, JobStatus::Skipped);
                    self.log(
                        LogLevel::Warning,
                        format!("job {name} did not stop within the abort deadline"),
                    );
                    let _ = self
                        .transport
                        .kill_all_remote_processes(pcs_exec::remote::KILL_PATTERN)
                        .await;
                    outcome = ExecOutcome::Aborted;
                    break;
                }
                JobOutcome::Failed { error, transport } => {
                    session.record_result(&name, JobStatus::Failed);
                    if transport {
                        self.log(
                            LogLevel::Critical,
                            format!("transport failure in job {name}: {error}"),
                        );
                        outcome = ExecOutcome::TransportFailure(error);
                        break;
                    }
                    if required {
                        self.log(
                            LogLevel::Critical,
                            format!("required job {name} failed: {error}"),
                        );
                        outcome = ExecOutcome::HardFailure(format!("job {name} failed: {error}"));
                        break;
                    }
                    self.log(LogLevel::Error, format!("job {name} failed: {error}"));
                    session.mark_errors();
                }
            }
        }

        if let Some(watchdog) = watchdog {
            if let Some(breach) = watchdog.breach() {
                if matches!(outcome, ExecOutcome::Finished) {
                    outcome = ExecOutcome::HardFailure(breach);
                }
            }
            watchdog.stop().await;
        }
        outcome
    }

    async fn run_job_lifecycle(
        &self,
        job: Box<dyn SyncJob>,
        cancel: CancellationToken,
    ) -> JobOutcome {
        let mut handle = tokio::spawn(async move {
            let result = async {
                job.pre_sync().await?;
                job.sync().await?;
                job.post_sync().await
            }
            .await;
            (job, result)
        });

        // Join normally, or once aborted give the job a bounded window
        let joined = tokio::select! {
            joined = &mut handle => Some(joined),
            _ = cancel.cancelled() => None,
        };
        let joined = match joined {
            Some(joined) => joined,
            None => match tokio::time::timeout(ABORT_DEADLINE, &mut handle).await {
                Ok(joined) => joined,
                Err(_) => {
                    handle.abort();
                    return JobOutcome::Abandoned;
                }
            },
        };

        match joined {
            Ok((_job, Ok(()))) => JobOutcome::Success,
            Ok((_job, Err(SyncError::Aborted))) => JobOutcome::Aborted,
            Ok((_job, Err(error))) => JobOutcome::Failed {
                transport: error.is_transport(),
                error: error.to_string(),
            },
            Err(join_error) => {
                let reason = if join_error.is_panic() {
                    "job panicked"
                } else {
                    "job task was cancelled"
                };
                JobOutcome::Failed {
                    transport: false,
                    error: reason.to_string(),
                }
            }
        }
    }

    async fn cleanup(
        &self,
        session: &mut SyncSession,
        envelope: &SnapshotEnvelope,
        remote_lock: Option<RemoteLock>,
        outcome: ExecOutcome,
    ) -> Option<String> {
        let _ = session.set_state(SessionState::Cleanup);

        let (aborted, hard_failure, transport_ok) = match &outcome {
            ExecOutcome::Finished => (session.abort_requested(), None, true),
            ExecOutcome::Aborted => (true, None, true),
            ExecOutcome::HardFailure(message) => (false, Some(message.clone()), true),
            ExecOutcome::TransportFailure(message) => (false, Some(message.clone()), false),
        };

        if aborted && transport_ok {
            let _ = self
                .transport
                .kill_all_remote_processes(pcs_exec::remote::KILL_PATTERN)
                .await;
        }

        let clean_finish = !aborted && hard_failure.is_none() && !session.has_errors();
        if clean_finish && transport_ok {
            if let Err(e) = envelope.create(SnapshotPhase::Post).await {
                session.mark_errors();
                self.log(LogLevel::Critical, format!("post-sync snapshots failed: {e}"));
            }
        }

        if hard_failure.is_some()
            && transport_ok
            && self.config.btrfs_snapshots.rollback_on_failure
            && !session.dry_run
        {
            self.log(LogLevel::Warning, "rolling back target to PRE snapshots");
            if let Err(e) = envelope.rollback().await {
                self.log(LogLevel::Error, format!("rollback failed: {e}"));
            }
        }

        if transport_ok {
            match envelope.retain().await {
                Ok(deleted) if !deleted.is_empty() => self.log(
                    LogLevel::Full,
                    format!("retention deleted {} snapshot(s)", deleted.len()),
                ),
                Ok(_) => {}
                Err(e) => self.log(LogLevel::Warning, format!("snapshot retention failed: {e}")),
            }
        }

        // Record sync roles after a clean run so the next invocation can
        // warn about repeated source-side syncs
        if clean_finish && !session.dry_run {
            if let Err(e) = history::record_role(SyncRole::Source) {
                self.log(LogLevel::Warning, format!("cannot record sync role: {e}"));
            }
            if transport_ok {
                let _ = self
                    .transport
                    .run(&history::record_role_command(SyncRole::Target))
                    .await;
            }
        }

        // Release the target lock first, then disconnect; the local lock
        // releases when the orchestrator's SyncLock drops
        self.release_remote(remote_lock).await;

        let final_state = if aborted {
            SessionState::Aborted
        } else if hard_failure.is_some() || session.has_errors() {
            SessionState::Failed
        } else {
            SessionState::Completed
        };
        let _ = session.set_state(final_state);
        hard_failure
    }

    async fn release_remote(&self, remote_lock: Option<RemoteLock>) {
        if let Some(lock) = remote_lock {
            lock.release();
        }
        self.transport.disconnect().await;
    }

    fn warn_on_repeated_source_role(&self) {
        match history::last_role() {
            Ok(Some(SyncRole::Source)) => self.log(
                LogLevel::Warning,
                "last sync from this machine was also as source; the target may hold newer state",
            ),
            Ok(_) => {}
            Err(_) => self.log(
                LogLevel::Warning,
                "sync-role history is unreadable; treating last role as unknown",
            ),
        }
    }
}

enum JobOutcome {
    Success,
    Aborted,
    Abandoned,
    Failed { error: String, transport: bool },
}

fn local_hostname() -> String {
    nix::unistd::gethostname()
        .ok()
        .and_then(|name| name.into_string().ok())
        .unwrap_or_else(|| "localhost".to_string())
}

#[cfg(test)]
#[path = "orchestrator_tests.rs"]
mod tests;
