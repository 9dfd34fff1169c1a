//! Alert boundary toward an external collaborator.
//!
//! The supervisor does not know how alerts are delivered (webhook, chat,
//! issue tracker); it only needs a [`Alerter::send_alert`] capability.
//! Alerts fire on recovery exhaustion (a service entered `Disabled`) and on
//! emergency recovery passes, carrying the health snapshot when one is at
//! hand.

use async_trait::async_trait;
use std::time::SystemTime;

use crate::health::SystemHealthSnapshot;

/// Severity attached to an outgoing alert.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum AlertSeverity {
    /// Informational.
    Info,
    /// Needs attention soon.
    Warning,
    /// Needs attention now.
    Critical,
}

impl AlertSeverity {
    /// Short stable label (snake_case).
    pub fn as_label(&self) -> &'static str {
        match self {
            AlertSeverity::Info => "info",
            AlertSeverity::Warning => "warning",
            AlertSeverity::Critical => "critical",
        }
    }
}

impl std::fmt::Display for AlertSeverity {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_label())
    }
}

/// Structured alert handed to the external collaborator.
#[derive(Debug, Clone)]
pub struct Alert {
    /// How urgent this is.
    pub severity: AlertSeverity,
    /// Affected service; `None` for system-wide alerts.
    pub service: Option<String>,
    /// Human-readable summary.
    pub message: String,
    /// Health snapshot at emission time, when available.
    pub snapshot: Option<SystemHealthSnapshot>,
    /// Emission time.
    pub at: SystemTime,
}

impl Alert {
    /// Creates an alert stamped with the current time.
    pub fn new(severity: AlertSeverity, message: impl Into<String>) -> Self {
        Self {
            severity,
            service: None,
            message: message.into(),
            snapshot: None,
            at: SystemTime::now(),
        }
    }

    /// Scopes the alert to one service.
    pub fn with_service(mut self, service: impl Into<String>) -> Self {
        self.service = Some(service.into());
        self
    }

    /// Attaches a health snapshot.
    pub fn with_snapshot(mut self, snapshot: SystemHealthSnapshot) -> Self {
        self.snapshot = Some(snapshot);
        self
    }
}

/// Capability required from the external alerting collaborator.
#[async_trait]
pub trait Alerter: Send + Sync + 'static {
    /// Delivers one alert. Failures are the collaborator's concern; the
    /// supervisor does not retry.
    async fn send_alert(&self, alert: &Alert);
}
