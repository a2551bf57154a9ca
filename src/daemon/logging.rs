//! Structured logging for daemon operation
//!
//! Events are emitted through the `log` facade as a short message followed by
//! a JSON payload; `env_logger` is the backend.

use crate::constants::{APP_NAME, DAEMON_CATEGORY};
use crate::mailbox::MailboxStats;
use crate::models::{Decision, ProcessEvent};
use anyhow::Result;
use log::{error, info, warn};
use serde_json::json;
use std::path::Path;

/// Install the `env_logger` backend. `RUST_LOG` takes precedence over `default_level`.
pub fn init_backend(default_level: &str) -> Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(default_level))
        .format_timestamp_millis()
        .try_init()
        .map_err(|e| anyhow::anyhow!("Failed to set logger: {}", e))
}

/// Log levels for daemon operations
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogLevel {
    Error,
    Warn,
    Info,
}

impl LogLevel {
    /// Level for a configured filter such as `warn` or `procgate=error`.
    /// Anything more verbose than `warn` maps to `Info`.
    pub fn from_filter(filter: &str) -> Self {
        let level = filter.rsplit('=').next().unwrap_or(filter).trim();
        match level.to_ascii_lowercase().as_str() {
            "error" | "off" => LogLevel::Error,
            "warn" => LogLevel::Warn,
            _ => LogLevel::Info,
        }
    }
}

/// Structured event logger for the daemon
#[derive(Debug, Clone)]
pub struct DaemonLogger {
    /// Minimum level emitted
    level: LogLevel,
}

impl DaemonLogger {
    pub fn new(level: LogLevel) -> Self {
        Self { level }
    }

    /// Log daemon startup event
    pub fn log_startup(&self, config_source: Option<&Path>, socket_path: &Path, pid: u32) {
        let message = json!({
            "event": "daemon_startup",
            "pid": pid,
            "config_path": config_source.map(|p| p.display().to_string()),
            "socket_path": socket_path.display().to_string(),
            "timestamp": chrono::Utc::now().to_rfc3339(),
        });

        self.log_structured(LogLevel::Info, "Daemon started", &message)
    }

    /// Log daemon shutdown event with the final handoff counters
    pub fn log_shutdown(&self, reason: &str, stats: &MailboxStats) {
        let message = json!({
            "event": "daemon_shutdown",
            "reason": reason,
            "stats": stats,
            "timestamp": chrono::Utc::now().to_rfc3339(),
        });

        self.log_structured(LogLevel::Info, "Daemon shutting down", &message)
    }

    /// Log an event handed to the decision service
    pub fn log_event_delivered(&self, event: &ProcessEvent) {
        let message = json!({
            "event": "process_event_delivered",
            "pid": event.process_id,
            "parent_pid": event.parent_process_id,
            "image_path": event.image_path.as_str(),
            "timestamp": chrono::Utc::now().to_rfc3339(),
        });

        self.log_structured(
            LogLevel::Info,
            &format!("Process event delivered: {}", event.image_path),
            &message,
        )
    }

    /// Log a verdict received from the decision service
    pub fn log_decision(&self, decision: &Decision) {
        let message = json!({
            "event": "decision_received",
            "pid": decision.process_id,
            "verdict": decision.verdict,
            "enforced": false,
            "timestamp": chrono::Utc::now().to_rfc3339(),
        });

        self.log_structured(
            LogLevel::Info,
            &format!("Decision received for pid {}", decision.process_id),
            &message,
        )
    }

    /// Log a request rejected on the control channel
    pub fn log_rejected(&self, request_id: &str, status: u32, reason: &str) {
        let message = json!({
            "event": "request_rejected",
            "request_id": request_id,
            "status": format!("{:#010x}", status),
            "reason": reason,
            "timestamp": chrono::Utc::now().to_rfc3339(),
        });

        self.log_structured(LogLevel::Warn, "Control request rejected", &message)
    }

    /// Log error events
    pub fn log_error(&self, error_message: &str, context: Option<&str>) {
        let message = json!({
            "event": "error",
            "message": error_message,
            "context": context,
            "timestamp": chrono::Utc::now().to_rfc3339(),
        });

        self.log_structured(LogLevel::Error, error_message, &message)
    }

    fn log_structured(&self, level: LogLevel, message: &str, data: &serde_json::Value) {
        if !self.should_log(level) {
            return;
        }

        let full_message = format!("{} | {}", message, data);
        let target = format!("{}::{}", APP_NAME, DAEMON_CATEGORY);
        match level {
            LogLevel::Error => error!(target: target.as_str(), "{}", full_message),
            LogLevel::Warn => warn!(target: target.as_str(), "{}", full_message),
            LogLevel::Info => info!(target: target.as_str(), "{}", full_message),
        }
    }

    fn should_log(&self, level: LogLevel) -> bool {
        matches!(
            (self.level, level),
            (LogLevel::Error, LogLevel::Error)
                | (LogLevel::Warn, LogLevel::Error | LogLevel::Warn)
                | (LogLevel::Info, _)
        )
    }
}

impl Default for DaemonLogger {
    fn default() -> Self {
        Self::new(LogLevel::Info)
    }
}
