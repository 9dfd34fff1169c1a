//! Service specification for supervised execution.
//!
//! [`ServiceSpec`] bundles a [`ServiceRef`] with the static metadata the
//! supervisor needs: grouping kind, startup priority tier, auto-start and
//! critical flags, dependencies, and optional per-service overrides of the
//! global recovery settings. The spec is immutable after registration.
//!
//! A spec starts from [`ServiceSpec::new`] and is refined with `with_*`
//! builder methods; overrides left unset resolve against [`Config`] at the
//! point of use.

use std::time::Duration;

use crate::core::Config;
use crate::policies::BackoffPolicy;
use crate::services::service::ServiceRef;

/// Grouping label for a supervised unit.
///
/// Used for list filtering and priority conventions only; the supervisor
/// never branches on it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ServiceKind {
    /// Watchdog-style protective unit.
    Guardian,
    /// Scheduled automation (crawlers, bots).
    Automation,
    /// Passive monitor/probe.
    Monitor,
    /// Third-party/cloud integration.
    CloudIntegration,
    /// Generic background worker.
    Worker,
    /// Test fixture.
    Test,
}

impl ServiceKind {
    /// Short stable label (snake_case) for logs and filters.
    pub fn as_label(&self) -> &'static str {
        match self {
            ServiceKind::Guardian => "guardian",
            ServiceKind::Automation => "automation",
            ServiceKind::Monitor => "monitor",
            ServiceKind::CloudIntegration => "cloud_integration",
            ServiceKind::Worker => "worker",
            ServiceKind::Test => "test",
        }
    }
}

impl std::fmt::Display for ServiceKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_label())
    }
}

/// Specification for running a service under supervision.
///
/// ## Example
/// ```
/// use healvisor::{HealthReport, ServiceFn, ServiceKind, ServiceSpec};
///
/// let spec = ServiceSpec::new(
///     ServiceFn::new("price-feed", || async { HealthReport::healthy() }).arc(),
/// )
/// .with_kind(ServiceKind::Worker)
/// .with_priority(1)
/// .with_critical(true)
/// .with_dependencies(["config-store"]);
///
/// assert_eq!(spec.name(), "price-feed");
/// assert!(spec.auto_start());
/// ```
#[derive(Clone)]
pub struct ServiceSpec {
    service: ServiceRef,
    kind: ServiceKind,
    priority: u32,
    auto_start: bool,
    critical: bool,
    dependencies: Vec<String>,

    // Per-service overrides; `None` falls back to the global config.
    failure_threshold: Option<u32>,
    max_retries: Option<u32>,
    backoff: Option<BackoffPolicy>,
    check_timeout: Option<Duration>,
}

impl ServiceSpec {
    /// Creates a spec with defaults: `Worker` kind, priority 10, auto-start
    /// on, not critical, no dependencies, no overrides.
    pub fn new(service: ServiceRef) -> Self {
        Self {
            service,
            kind: ServiceKind::Worker,
            priority: 10,
            auto_start: true,
            critical: false,
            dependencies: Vec::new(),
            failure_threshold: None,
            max_retries: None,
            backoff: None,
            check_timeout: None,
        }
    }

    /// Convenience: the service's name.
    pub fn name(&self) -> &str {
        self.service.name()
    }

    /// Shared handle to the service implementation.
    pub fn service(&self) -> &ServiceRef {
        &self.service
    }

    /// Grouping kind.
    pub fn kind(&self) -> ServiceKind {
        self.kind
    }

    /// Startup tier; lower tiers start first, a tier completes before the
    /// next begins.
    pub fn priority(&self) -> u32 {
        self.priority
    }

    /// Whether bulk startup includes this service.
    pub fn auto_start(&self) -> bool {
        self.auto_start
    }

    /// Whether the fast cadence probes this service.
    pub fn critical(&self) -> bool {
        self.critical
    }

    /// Names of services that must be `Running` before this one starts.
    pub fn dependencies(&self) -> &[String] {
        &self.dependencies
    }

    /// Failed checks tolerated before recovery kicks in.
    pub fn failure_threshold(&self, cfg: &Config) -> u32 {
        self.failure_threshold.unwrap_or(cfg.failure_threshold)
    }

    /// Recovery attempts before the service is disabled.
    pub fn max_retries(&self, cfg: &Config) -> u32 {
        self.max_retries.unwrap_or(cfg.max_retries)
    }

    /// Backoff policy between recovery attempts.
    pub fn backoff(&self, cfg: &Config) -> BackoffPolicy {
        self.backoff.unwrap_or(cfg.backoff)
    }

    /// Per-probe timeout.
    pub fn check_timeout(&self, cfg: &Config) -> Duration {
        self.check_timeout.unwrap_or(cfg.check_timeout)
    }

    /// Sets the grouping kind.
    pub fn with_kind(mut self, kind: ServiceKind) -> Self {
        self.kind = kind;
        self
    }

    /// Sets the startup tier.
    pub fn with_priority(mut self, priority: u32) -> Self {
        self.priority = priority;
        self
    }

    /// Sets bulk-startup participation.
    pub fn with_auto_start(mut self, auto_start: bool) -> Self {
        self.auto_start = auto_start;
        self
    }

    /// Marks the service for the fast probe cadence.
    pub fn with_critical(mut self, critical: bool) -> Self {
        self.critical = critical;
        self
    }

    /// Declares dependencies that must be `Running` first.
    pub fn with_dependencies<I, S>(mut self, deps: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.dependencies = deps.into_iter().map(Into::into).collect();
        self
    }

    /// Overrides the global failure threshold for this service.
    pub fn with_failure_threshold(mut self, threshold: u32) -> Self {
        self.failure_threshold = Some(threshold);
        self
    }

    /// Overrides the global retry budget for this service.
    pub fn with_max_retries(mut self, max_retries: u32) -> Self {
        self.max_retries = Some(max_retries);
        self
    }

    /// Overrides the global backoff policy for this service.
    pub fn with_backoff(mut self, backoff: BackoffPolicy) -> Self {
        self.backoff = Some(backoff);
        self
    }

    /// Overrides the global probe timeout for this service.
    pub fn with_check_timeout(mut self, timeout: Duration) -> Self {
        self.check_timeout = Some(timeout);
        self
    }
}
