// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Logging sink: the event-bus subscriber that materialises the unified
//! log stream.
//!
//! Writes two outputs with independent level filters: a structured
//! JSON-lines file for the session, and a human-readable stream on stderr.
//! Writing a record at ERROR or CRITICAL latches the session error flag;
//! this is the sole path by which log level drives final status.

use pcs_core::{Event, EventBus, LogLevel};
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tokio::task::JoinHandle;

/// ANSI 256-colour codes per level (muted palette).
fn level_color(level: LogLevel) -> u8 {
    match level {
        LogLevel::Debug => 240,
        LogLevel::Full => 245,
        LogLevel::Info => 74,
        LogLevel::Warning => 178,
        LogLevel::Error => 167,
        LogLevel::Critical => 196,
    }
}

const RESET: &str = "\x1b[0m";

fn fg256(code: u8) -> String {
    format!("\x1b[38;5;{code}m")
}

/// Sink configuration, decided by the CLI.
pub struct SinkConfig {
    pub file_path: PathBuf,
    pub file_level: LogLevel,
    pub cli_level: LogLevel,
    pub hostname: String,
    /// Latched when a record at ERROR+ is written.
    pub error_latch: Arc<AtomicBool>,
    pub color: bool,
}

/// Running sink task; consume with [`LogSink::finish`] after the bus closes.
pub struct LogSink {
    task: JoinHandle<()>,
    file_path: PathBuf,
}

impl LogSink {
    /// Subscribe to the bus and start writing.
    ///
    /// The log file (and its parent directory) is created immediately so
    /// the path can be reported even for sessions that fail early.
    pub fn spawn(bus: &EventBus, config: SinkConfig) -> std::io::Result<Self> {
        if let Some(parent) = config.file_path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let file = std::fs::File::create(&config.file_path)?;
        let file_path = config.file_path.clone();
        let mut rx = bus.subscribe();

        let task = tokio::spawn(async move {
            let mut writer = std::io::BufWriter::new(file);
            while let Some(event) = rx.recv().await {
                match &event {
                    Event::Shutdown => break,
                    _ => consume(&mut writer, &config, &event),
                }
            }
            let _ = writer.flush();
        });

        Ok(Self { task, file_path })
    }

    pub fn file_path(&self) -> &Path {
        &self.file_path
    }

    /// Wait for the sink to drain. Call after closing the bus.
    pub async fn finish(self) {
        let _ = self.task.await;
    }
}

fn consume(writer: &mut impl Write, config: &SinkConfig, event: &Event) {
    match event {
        Event::Log(log) => {
            if log.level >= LogLevel::Error {
                config.error_latch.store(true, Ordering::SeqCst);
            }
            if log.level >= config.file_level {
                if let Ok(line) = serde_json::to_string(&log.to_record(&config.hostname)) {
                    let _ = writeln!(writer, "{line}");
                    let _ = writer.flush();
                }
            }
            if log.level >= config.cli_level {
                eprintln!("{}", render_log(config, log));
            }
        }
        Event::Progress(progress) => {
            // Progress renders on the human stream only
            if config.cli_level <= LogLevel::Info {
                eprintln!("{}", render_progress(config, progress));
            }
        }
        Event::Connection(connection) => {
            if config.cli_level <= LogLevel::Info {
                let line = match connection.latency_ms {
                    Some(latency) => {
                        format!("ssh {} ({latency:.0}ms)", connection.status)
                    }
                    None => format!("ssh {}", connection.status),
                };
                eprintln!("{}", muted(config, &line));
            }
        }
        Event::Shutdown => {}
    }
}

fn muted(config: &SinkConfig, text: &str) -> String {
    if config.color {
        format!("{}{text}{RESET}", fg256(240))
    } else {
        text.to_string()
    }
}

fn render_log(config: &SinkConfig, log: &pcs_core::LogEvent) -> String {
    let time = log.timestamp.format("%H:%M:%S");
    let marker = format!("{:>8}", log.level.as_str());
    let origin = format!("{}/{}", log.job, log.host);
    if config.color {
        format!(
            "{time} {}{marker}{RESET} {}{origin}{RESET} {}",
            fg256(level_color(log.level)),
            fg256(245),
            log.message
        )
    } else {
        format!("{time} {marker} {origin} {}", log.message)
    }
}

fn render_progress(config: &SinkConfig, progress: &pcs_core::ProgressEvent) -> String {
    let update = &progress.update;
    let body = if let Some(percent) = update.percent {
        format!("{percent:>3}%")
    } else if let Some(current) = update.current {
        match update.total {
            Some(total) => format!("{current}/{total} items"),
            None => format!("{current} items processed"),
        }
    } else {
        "working...".to_string()
    };
    let item = update
        .item
        .as_deref()
        .map(|item| format!(" {item}"))
        .unwrap_or_default();
    muted(config, &format!("[{}] {body}{item}", progress.job))
}

#[cfg(test)]
#[path = "logging_tests.rs"]
mod tests;
