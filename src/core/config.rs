//! Global supervisor configuration.
//!
//! [`Config`] centralizes every interval, timeout, and recovery threshold.
//! It is read-only after the supervisor is built; per-service deviations go
//! through [`ServiceSpec`](crate::ServiceSpec) overrides, which resolve
//! against these values.

use std::time::Duration;

use crate::policies::BackoffPolicy;

/// Runtime settings for the supervisor.
///
/// ## Field semantics
/// - `fast_interval`: probe cadence for critical-flagged services
/// - `regular_interval`: probe cadence for all enabled services
/// - `deep_interval`: cadence that also records a full health snapshot
/// - `check_timeout`: per-probe budget; exceeding it counts as unhealthy
/// - `start_timeout`: readiness budget before a starting service is moved
///   to `Error` (hang detection)
/// - `ready_poll`: spacing between readiness probes during startup
/// - `quiescence`: pause between stop and start inside a restart, letting
///   the old handle release ports and file locks
/// - `stop_grace`: how long `stop` waits for a handle before aborting it
/// - `shutdown_grace`: how long full shutdown waits for all services
/// - `failure_threshold`: failed checks tolerated before recovery begins
/// - `max_retries`: recovery attempts before a service is disabled
/// - `backoff`: delay schedule between recovery attempts
/// - `emergency_cooldown`: minimum spacing between emergency passes
/// - `snapshot_history`: ring-buffer capacity for deep-tick snapshots
/// - `bus_capacity`: event bus ring-buffer size (min 1, clamped by the bus)
#[derive(Clone, Debug)]
pub struct Config {
    /// Fast probe cadence (critical services only).
    pub fast_interval: Duration,
    /// Regular probe cadence (all enabled services).
    pub regular_interval: Duration,
    /// Deep cadence: regular sweep plus snapshot recording.
    pub deep_interval: Duration,
    /// Per-probe timeout; a timeout is an unhealthy result.
    pub check_timeout: Duration,
    /// Readiness budget during start; exceeding it is hang detection.
    pub start_timeout: Duration,
    /// Spacing between readiness probes while `Starting`.
    pub ready_poll: Duration,
    /// Pause between stop and start inside a restart.
    pub quiescence: Duration,
    /// Per-service stop budget before the handle is aborted.
    pub stop_grace: Duration,
    /// Whole-supervisor stop budget on shutdown.
    pub shutdown_grace: Duration,
    /// Failed checks tolerated before recovery begins.
    pub failure_threshold: u32,
    /// Recovery attempts before the service is disabled.
    pub max_retries: u32,
    /// Delay schedule between recovery attempts.
    pub backoff: BackoffPolicy,
    /// Minimum spacing between emergency recovery passes.
    pub emergency_cooldown: Duration,
    /// Snapshot ring-buffer capacity.
    pub snapshot_history: usize,
    /// Event bus capacity.
    pub bus_capacity: usize,
}

impl Default for Config {
    /// Defaults:
    ///
    /// - `fast_interval = 5s`, `regular_interval = 30s`, `deep_interval = 5min`
    /// - `check_timeout = 10s`, `start_timeout = 60s`, `ready_poll = 500ms`
    /// - `quiescence = 2s`, `stop_grace = 10s`, `shutdown_grace = 30s`
    /// - `failure_threshold = 2`, `max_retries = 3`
    /// - `backoff = 2s doubling, capped at 5min`
    /// - `emergency_cooldown = 60s`, `snapshot_history = 32`, `bus_capacity = 1024`
    fn default() -> Self {
        Self {
            fast_interval: Duration::from_secs(5),
            regular_interval: Duration::from_secs(30),
            deep_interval: Duration::from_secs(300),
            check_timeout: Duration::from_secs(10),
            start_timeout: Duration::from_secs(60),
            ready_poll: Duration::from_millis(500),
            quiescence: Duration::from_secs(2),
            stop_grace: Duration::from_secs(10),
            shutdown_grace: Duration::from_secs(30),
            failure_threshold: 2,
            max_retries: 3,
            backoff: BackoffPolicy::default(),
            emergency_cooldown: Duration::from_secs(60),
            snapshot_history: 32,
            bus_capacity: 1024,
        }
    }
}

impl Config {
    /// Bus capacity clamped to a minimum of 1.
    #[inline]
    pub fn bus_capacity_clamped(&self) -> usize {
        self.bus_capacity.max(1)
    }

    /// Snapshot history capacity clamped to a minimum of 1.
    #[inline]
    pub fn snapshot_history_clamped(&self) -> usize {
        self.snapshot_history.max(1)
    }
}
