//! Service capability trait.
//!
//! A [`Service`] is one supervised unit of background work. The supervisor
//! only requires a bounded-time health probe; everything else has a default:
//! the execution body parks until cancelled (covering passive in-process
//! units), and recovery falls back to a restart when [`Service::recover`]
//! returns `None`.
//!
//! A service receives a [`CancellationToken`] in [`Service::run`] and should
//! check it periodically to exit promptly during stop/shutdown.

use async_trait::async_trait;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;

use crate::error::ServiceError;

/// Shared handle to a service implementation.
pub type ServiceRef = Arc<dyn Service>;

/// Result of one health probe.
#[derive(Debug, Clone)]
pub struct HealthReport {
    /// Whether the service considers itself operational.
    pub healthy: bool,
    /// Optional human-readable detail (failure reason, metrics hint).
    pub detail: Option<String>,
}

impl HealthReport {
    /// A passing report without detail.
    pub fn healthy() -> Self {
        Self {
            healthy: true,
            detail: None,
        }
    }

    /// A failing report carrying a reason.
    pub fn unhealthy(detail: impl Into<String>) -> Self {
        Self {
            healthy: false,
            detail: Some(detail.into()),
        }
    }

    /// Attaches detail to a report.
    pub fn with_detail(mut self, detail: impl Into<String>) -> Self {
        self.detail = Some(detail.into());
        self
    }
}

/// Result of one service-specific recovery attempt.
#[derive(Debug, Clone)]
pub struct RecoveryOutcome {
    /// Whether the recovery hook restored the service.
    pub succeeded: bool,
    /// Optional human-readable detail.
    pub detail: Option<String>,
}

impl RecoveryOutcome {
    /// A successful outcome.
    pub fn succeeded() -> Self {
        Self {
            succeeded: true,
            detail: None,
        }
    }

    /// A failed outcome carrying a reason.
    pub fn failed(detail: impl Into<String>) -> Self {
        Self {
            succeeded: false,
            detail: Some(detail.into()),
        }
    }
}

/// One supervised unit of background work.
///
/// ## Contract
/// - [`Service::check_health`] must return promptly; the scheduler wraps it
///   in a timeout and treats the timeout as `healthy: false`.
/// - [`Service::run`] is spawned as the execution handle when the service is
///   started, and is cancelled through its token on stop/restart.
/// - [`Service::recover`] returning `None` means "no soft recovery": the
///   coordinator restarts the execution handle instead.
///
/// # Example
/// ```
/// use async_trait::async_trait;
/// use healvisor::{HealthReport, Service};
///
/// struct FeedPoller;
///
/// #[async_trait]
/// impl Service for FeedPoller {
///     fn name(&self) -> &str { "feed-poller" }
///
///     async fn check_health(&self) -> HealthReport {
///         HealthReport::healthy()
///     }
/// }
/// ```
#[async_trait]
pub trait Service: Send + Sync + 'static {
    /// Stable, unique service name.
    fn name(&self) -> &str;

    /// Execution body behind the handle.
    ///
    /// The default implementation parks until the token is cancelled, which
    /// is the right shape for units whose work happens elsewhere (timers,
    /// widgets, external processes probed over the network).
    async fn run(&self, ctx: CancellationToken) -> Result<(), ServiceError> {
        ctx.cancelled().await;
        Ok(())
    }

    /// Bounded-time probe of current operational health.
    async fn check_health(&self) -> HealthReport;

    /// Optional service-specific recovery.
    ///
    /// Returning `None` (the default) makes the coordinator fall back to
    /// restarting the execution handle.
    async fn recover(&self) -> Option<RecoveryOutcome> {
        None
    }
}
