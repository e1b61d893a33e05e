// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Event types carried on the session event bus.
//!
//! Serializes with `{"type": "event:name", ...fields}` format for the
//! structured log stream.

use crate::model::{LogLevel, ProgressUpdate};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::fmt;

/// Where a log record originated.
///
/// Jobs log against source or target; the orchestrator logs under its own
/// name.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogOrigin {
    Source,
    Target,
    Orchestrator,
}

impl fmt::Display for LogOrigin {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            LogOrigin::Source => write!(f, "source"),
            LogOrigin::Target => write!(f, "target"),
            LogOrigin::Orchestrator => write!(f, "orchestrator"),
        }
    }
}

/// A structured log record published by a job or the orchestrator.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LogEvent {
    pub level: LogLevel,
    /// Job name, or "orchestrator".
    pub job: String,
    pub host: LogOrigin,
    pub message: String,
    #[serde(default, skip_serializing_if = "Map::is_empty")]
    pub context: Map<String, Value>,
    pub timestamp: DateTime<Utc>,
}

impl LogEvent {
    pub fn new(
        level: LogLevel,
        job: impl Into<String>,
        host: LogOrigin,
        message: impl Into<String>,
    ) -> Self {
        Self {
            level,
            job: job.into(),
            host,
            message: message.into(),
            context: Map::new(),
            timestamp: Utc::now(),
        }
    }

    pub fn with_context(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.context.insert(key.into(), value.into());
        self
    }

    /// Flatten to the JSON-lines record shape:
    /// `{timestamp, level, job, host, hostname, event, ...context}`.
    pub fn to_record(&self, hostname: &str) -> Value {
        let mut map = Map::new();
        map.insert(
            "timestamp".into(),
            Value::String(self.timestamp.to_rfc3339()),
        );
        map.insert("level".into(), Value::String(self.level.to_string()));
        map.insert("job".into(), Value::String(self.job.clone()));
        map.insert("host".into(), Value::String(self.host.to_string()));
        map.insert("hostname".into(), Value::String(hostname.to_string()));
        map.insert("event".into(), Value::String(self.message.clone()));
        for (k, v) in &self.context {
            map.insert(k.clone(), v.clone());
        }
        Value::Object(map)
    }
}

/// Progress update published by a job.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProgressEvent {
    pub job: String,
    pub update: ProgressUpdate,
    pub timestamp: DateTime<Utc>,
}

impl ProgressEvent {
    pub fn new(job: impl Into<String>, update: ProgressUpdate) -> Self {
        Self {
            job: job.into(),
            update,
            timestamp: Utc::now(),
        }
    }
}

/// SSH connection status change.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ConnectionStatus {
    Connected,
    Disconnected,
}

impl fmt::Display for ConnectionStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ConnectionStatus::Connected => write!(f, "connected"),
            ConnectionStatus::Disconnected => write!(f, "disconnected"),
        }
    }
}

/// Event published when the SSH connection state changes.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ConnectionEvent {
    pub status: ConnectionStatus,
    /// Round-trip time in milliseconds; `None` when disconnected.
    pub latency_ms: Option<f64>,
}

/// Events that flow through the session event bus.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum Event {
    #[serde(rename = "log")]
    Log(LogEvent),
    #[serde(rename = "progress")]
    Progress(ProgressEvent),
    #[serde(rename = "connection")]
    Connection(ConnectionEvent),
    /// Shutdown sentinel enqueued once when the bus closes.
    #[serde(rename = "shutdown")]
    Shutdown,
}

impl Event {
    pub fn name(&self) -> &'static str {
        match self {
            Event::Log(_) => "log",
            Event::Progress(_) => "progress",
            Event::Connection(_) => "connection",
            Event::Shutdown => "shutdown",
        }
    }
}

#[cfg(test)]
#[path = "event_tests.rs"]
mod tests;
