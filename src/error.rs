//! Error types used by the supervisor runtime and supervised services.
//!
//! Two enums split the failure domains:
//!
//! - [`SupervisorError`]: errors raised by control operations and the
//!   orchestration runtime itself (registration conflicts, bad transitions,
//!   shutdown overruns).
//! - [`ServiceError`]: errors raised by a service's own execution body or
//!   recovery hook.
//!
//! Both provide `as_label` for stable snake_case identifiers in logs and
//! events. Health-check timeouts never appear here: the scheduler converts
//! them into an unhealthy report instead of propagating an error.

use std::time::Duration;
use thiserror::Error;

use crate::services::ServiceStatus;

/// Errors surfaced by supervisor control operations.
///
/// All variants except [`SupervisorError::GraceExceeded`] are local and
/// recoverable: the caller of the control operation sees them and may retry
/// (e.g. `DependencyNotReady` once the dependency is up).
#[non_exhaustive]
#[derive(Error, Debug)]
pub enum SupervisorError {
    /// A service with the same name is already registered.
    #[error("service {name:?} is already registered")]
    DuplicateService {
        /// Conflicting service name.
        name: String,
    },

    /// No service with this name exists in the registry.
    #[error("unknown service {name:?}")]
    UnknownService {
        /// Requested service name.
        name: String,
    },

    /// A declared dependency is not `Running` yet; the caller may retry later.
    #[error("service {name:?} requires dependency {dependency:?} to be running")]
    DependencyNotReady {
        /// Service that was asked to start.
        name: String,
        /// The dependency that is not `Running`.
        dependency: String,
    },

    /// The operation is not permitted from the service's current status
    /// (e.g. `start` on a `Disabled` service).
    #[error("service {name:?} is {status}, cannot {op}")]
    InvalidState {
        /// Target service name.
        name: String,
        /// Status the service was in when the operation was rejected.
        status: ServiceStatus,
        /// The rejected operation.
        op: &'static str,
    },

    /// The service did not report ready within the start timeout; it was
    /// moved to `Error` (hang detection).
    #[error("service {name:?} did not become ready within {timeout:?}")]
    StartTimedOut {
        /// Service that hung during startup.
        name: String,
        /// The configured start timeout.
        timeout: Duration,
    },

    /// All recovery attempts for a service were spent; the service is now
    /// `Disabled` until explicitly re-enabled.
    #[error("service {name:?} exhausted {attempts} recovery attempts; disabled")]
    RecoveryExhausted {
        /// Service that was disabled.
        name: String,
        /// Number of attempts that were made.
        attempts: u32,
    },

    /// Shutdown grace period was exceeded; some services had to be
    /// force-terminated.
    #[error("shutdown grace {grace:?} exceeded; stuck: {stuck:?}")]
    GraceExceeded {
        /// The configured shutdown grace.
        grace: Duration,
        /// Names of services that did not stop in time.
        stuck: Vec<String>,
    },
}

impl SupervisorError {
    /// Returns a short stable label (snake_case) for logs and events.
    pub fn as_label(&self) -> &'static str {
        match self {
            SupervisorError::DuplicateService { .. } => "duplicate_service",
            SupervisorError::UnknownService { .. } => "unknown_service",
            SupervisorError::DependencyNotReady { .. } => "dependency_not_ready",
            SupervisorError::InvalidState { .. } => "invalid_state",
            SupervisorError::StartTimedOut { .. } => "start_timed_out",
            SupervisorError::RecoveryExhausted { .. } => "recovery_exhausted",
            SupervisorError::GraceExceeded { .. } => "grace_exceeded",
        }
    }
}

/// Errors produced by a service's execution body or recovery hook.
///
/// `Timeout` and `Fail` are retryable; `Fatal` is not. `Canceled` marks a
/// cooperative exit during shutdown and is treated as a graceful stop.
#[non_exhaustive]
#[derive(Error, Debug)]
pub enum ServiceError {
    /// Execution exceeded its timeout.
    #[error("timed out after {timeout:?}")]
    Timeout {
        /// The timeout that was exceeded.
        timeout: Duration,
    },

    /// Recoverable failure; a retry may succeed.
    #[error("execution failed: {error}")]
    Fail {
        /// The underlying error message.
        error: String,
    },

    /// Non-recoverable failure; retrying will not help.
    #[error("fatal error (no retry): {error}")]
    Fatal {
        /// The underlying error message.
        error: String,
    },

    /// The service observed cancellation and exited cooperatively.
    #[error("context cancelled")]
    Canceled,
}

impl ServiceError {
    /// Returns a short stable label (snake_case) for logs and events.
    pub fn as_label(&self) -> &'static str {
        match self {
            ServiceError::Timeout { .. } => "service_timeout",
            ServiceError::Fail { .. } => "service_failed",
            ServiceError::Fatal { .. } => "service_fatal",
            ServiceError::Canceled => "service_canceled",
        }
    }

    /// Whether this error is safe to retry.
    pub fn is_retryable(&self) -> bool {
        matches!(self, ServiceError::Fail { .. } | ServiceError::Timeout { .. })
    }
}
