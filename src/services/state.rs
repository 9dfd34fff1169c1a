//! Live per-service state owned by the lifecycle manager.
//!
//! Every registered service has exactly one [`ServiceState`], created in
//! `Stopped` at registration time and mutated only through lifecycle and
//! recovery transition paths. Other components read it through the registry.
//!
//! ## Rules
//! - Counters are clamped, never wrapped: `consecutive_failures` saturates
//!   at the failure threshold, `recovery_attempt` at `max_retries + 1`.
//! - `total_restarts` is monotonic and survives enable/disable cycles.
//! - `Disabled` is terminal until an explicit enable.

use std::time::SystemTime;

/// Lifecycle status of a supervised service.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ServiceStatus {
    /// Not running; eligible for `start`.
    Stopped,
    /// Execution handle spawned, waiting for the readiness probe to pass.
    Starting,
    /// Healthy and serving.
    Running,
    /// A health check failed; failure accounting in progress.
    Unhealthy,
    /// A recovery attempt is executing.
    Recovering,
    /// Startup hang detected; recoverable through the same path as `Unhealthy`.
    Error,
    /// Recovery attempts exhausted; no checks are scheduled until `enable`.
    Disabled,
}

impl ServiceStatus {
    /// Short stable label (snake_case) for logs and events.
    pub fn as_label(&self) -> &'static str {
        match self {
            ServiceStatus::Stopped => "stopped",
            ServiceStatus::Starting => "starting",
            ServiceStatus::Running => "running",
            ServiceStatus::Unhealthy => "unhealthy",
            ServiceStatus::Recovering => "recovering",
            ServiceStatus::Error => "error",
            ServiceStatus::Disabled => "disabled",
        }
    }

    /// Whether the scheduler should probe this service.
    ///
    /// `Starting` is excluded (the readiness probe owns it), `Recovering` is
    /// excluded (the recovery loop owns it), `Stopped`/`Disabled` have
    /// nothing to probe.
    pub fn is_checkable(&self) -> bool {
        matches!(
            self,
            ServiceStatus::Running | ServiceStatus::Unhealthy | ServiceStatus::Error
        )
    }

    /// Whether the service participates in supervision at all.
    pub fn is_enabled(&self) -> bool {
        !matches!(self, ServiceStatus::Disabled)
    }

    /// Whether an execution handle may currently exist for this status.
    pub fn is_active(&self) -> bool {
        matches!(
            self,
            ServiceStatus::Starting
                | ServiceStatus::Running
                | ServiceStatus::Unhealthy
                | ServiceStatus::Recovering
                | ServiceStatus::Error
        )
    }
}

impl std::fmt::Display for ServiceStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_label())
    }
}

/// Mutable supervision state for one service.
#[derive(Debug, Clone)]
pub struct ServiceState {
    /// Current lifecycle status.
    pub status: ServiceStatus,
    /// Failed checks since the last passing one; reset on any success.
    pub consecutive_failures: u32,
    /// Restarts over the whole supervisor lifetime; never reset.
    pub total_restarts: u64,
    /// Attempts made in the current recovery cycle; reset on success or enable.
    pub recovery_attempt: u32,
    /// When `status` last changed.
    pub last_transition_at: SystemTime,
    /// When the last health check completed, if any.
    pub last_health_check_at: Option<SystemTime>,
    /// Detail string from the last failed check or recovery attempt.
    ///
    /// Kept after the service is disabled so `status()` can show why, until
    /// an explicit enable clears it.
    pub last_detail: Option<String>,
}

impl ServiceState {
    /// Fresh state in `Stopped`, as created at registration time.
    pub fn new() -> Self {
        Self {
            status: ServiceStatus::Stopped,
            consecutive_failures: 0,
            total_restarts: 0,
            recovery_attempt: 0,
            last_transition_at: SystemTime::now(),
            last_health_check_at: None,
            last_detail: None,
        }
    }

    /// Moves to `status`, stamping the transition time.
    pub(crate) fn transition(&mut self, status: ServiceStatus) {
        self.status = status;
        self.last_transition_at = SystemTime::now();
    }

    /// Records a failed check, saturating at `cap`.
    pub(crate) fn record_failure(&mut self, cap: u32) {
        self.consecutive_failures = self.consecutive_failures.saturating_add(1).min(cap);
    }

    /// Records a passing check.
    pub(crate) fn record_success(&mut self) {
        self.consecutive_failures = 0;
    }

    /// Bumps the recovery attempt counter, saturating at `cap`, and returns
    /// the new value.
    pub(crate) fn bump_recovery_attempt(&mut self, cap: u32) -> u32 {
        self.recovery_attempt = self.recovery_attempt.saturating_add(1).min(cap);
        self.recovery_attempt
    }

    /// Clears the per-cycle counters after a successful recovery.
    pub(crate) fn clear_recovery(&mut self) {
        self.recovery_attempt = 0;
        self.consecutive_failures = 0;
    }
}

impl Default for ServiceState {
    fn default() -> Self {
        Self::new()
    }
}
