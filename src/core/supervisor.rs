//! Supervisor facade: the public control surface.
//!
//! [`Supervisor`] composes the registry, lifecycle manager, health
//! scheduler, recovery coordinator, and health aggregator behind one object
//! constructed once via [`SupervisorBuilder`](crate::SupervisorBuilder) and
//! shut down explicitly; supervisor lifetime is never an implicit global.
//!
//! ## Control surface
//! - [`Supervisor::register`]: add a service (in `Stopped`)
//! - [`Supervisor::start`] / [`Supervisor::start_all`]: bring services up,
//!   tier-ordered for bulk startup
//! - [`Supervisor::stop`] / [`Supervisor::restart`] / [`Supervisor::restart_all`]
//! - [`Supervisor::enable`] / [`Supervisor::disable`]
//! - [`Supervisor::status`] / [`Supervisor::list`] / [`Supervisor::history`]
//! - [`Supervisor::heal`]: force one aggregator pass immediately
//! - [`Supervisor::run`]: bulk start, monitor until an OS signal, then
//!   graceful shutdown
//!
//! ## Shutdown path
//! ```text
//! run(): start_monitoring() ─► start_all() ─► wait signal / cancel
//!            └─► shutdown(): publish ShutdownRequested
//!                            cancel runtime token (loops, recovery sleeps)
//!                            best-effort stop of every active service
//!                            ├─ within shutdown_grace ─► AllStoppedWithin
//!                            └─ past it ─► GraceExceeded { stuck }
//! ```

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use tokio::time;
use tokio_util::sync::CancellationToken;

use crate::core::aggregator::HealthAggregator;
use crate::core::config::Config;
use crate::core::lifecycle::LifecycleManager;
use crate::core::recovery::RecoveryCoordinator;
use crate::core::registry::{Registry, ServiceFilter};
use crate::core::scheduler::HealthScheduler;
use crate::core::shutdown;
use crate::error::SupervisorError;
use crate::events::{Bus, Event, EventKind};
use crate::health::{ServiceSnapshot, SystemHealthSnapshot};
use crate::services::{ServiceSpec, ServiceState};
use crate::subscribers::SubscriberSet;

/// Process-wide supervisor object; construct once, shut down explicitly.
pub struct Supervisor {
    pub(crate) cfg: Arc<Config>,
    pub(crate) bus: Bus,
    pub(crate) registry: Arc<Registry>,
    pub(crate) lifecycle: Arc<LifecycleManager>,
    pub(crate) recovery: Arc<RecoveryCoordinator>,
    pub(crate) aggregator: Arc<HealthAggregator>,
    pub(crate) scheduler: Arc<HealthScheduler>,
    pub(crate) subs: Arc<SubscriberSet>,
    pub(crate) runtime_token: CancellationToken,
    pub(crate) monitoring: AtomicBool,
}

impl Supervisor {
    /// Entry point: a builder over the given configuration.
    pub fn builder(cfg: Config) -> crate::core::builder::SupervisorBuilder {
        crate::core::builder::SupervisorBuilder::new(cfg)
    }

    /// Event bus handle, for ad-hoc subscriptions.
    pub fn bus(&self) -> &Bus {
        &self.bus
    }

    /// Registers a service; it starts out `Stopped`.
    pub async fn register(&self, spec: ServiceSpec) -> Result<(), SupervisorError> {
        let entry = self.registry.register(spec).await?;
        self.bus.publish(
            Event::now(EventKind::ServiceRegistered).with_service(entry.name()),
        );
        Ok(())
    }

    /// Starts one service (dependency-guarded).
    pub async fn start(&self, name: &str) -> Result<(), SupervisorError> {
        self.lifecycle.start(name).await
    }

    /// Tier-ordered bulk startup of every `auto_start` service.
    ///
    /// Per-service failures do not abort the pass; they are returned for the
    /// operator alongside the events already published.
    pub async fn start_all(&self) -> Vec<(String, SupervisorError)> {
        self.lifecycle.start_all().await
    }

    /// Stops one service, cancelling any in-flight recovery.
    pub async fn stop(&self, name: &str) -> Result<(), SupervisorError> {
        self.lifecycle.stop(name).await
    }

    /// Restarts one service (stop, quiescence delay, start).
    pub async fn restart(&self, name: &str) -> Result<(), SupervisorError> {
        self.lifecycle.restart(name).await
    }

    /// Restarts every currently active service, tier-ordered.
    pub async fn restart_all(&self) -> Vec<(String, SupervisorError)> {
        self.lifecycle.stop_all_active().await;
        time::sleep(self.cfg.quiescence).await;
        self.lifecycle.start_all().await
    }

    /// Re-arms a `Disabled` service; a counter-preserving no-op otherwise.
    pub async fn enable(&self, name: &str) -> Result<(), SupervisorError> {
        self.lifecycle.enable(name).await
    }

    /// Parks a service in `Disabled` until an explicit enable.
    pub async fn disable(&self, name: &str) -> Result<(), SupervisorError> {
        self.lifecycle.disable(name).await
    }

    /// Forces a recovery attempt for an `Unhealthy`/`Error` service right
    /// now, bypassing the failure-threshold accounting. A no-op when a
    /// recovery is already in flight or the service is not in a failed
    /// status.
    pub async fn recover(&self, name: &str) -> Result<(), SupervisorError> {
        self.registry.get(name).await?;
        self.recovery.force_recover(name).await;
        Ok(())
    }

    /// Fresh system snapshot with full per-service detail.
    pub async fn status(&self) -> SystemHealthSnapshot {
        self.registry.capture_snapshot().await
    }

    /// Live state of one service.
    pub async fn service_state(&self, name: &str) -> Result<ServiceState, SupervisorError> {
        Ok(self.registry.get(name).await?.state().await)
    }

    /// Filtered point-in-time service listing.
    pub async fn list(&self, filter: &ServiceFilter) -> Vec<ServiceSnapshot> {
        let mut out = Vec::new();
        for entry in self.registry.list(filter).await {
            out.push(entry.capture().await);
        }
        out
    }

    /// Buffered deep-sweep snapshots, oldest first.
    pub async fn history(&self) -> Vec<SystemHealthSnapshot> {
        self.aggregator.history().await
    }

    /// Forces one aggregator pass right now (deep semantics: the snapshot
    /// is recorded and an emergency may fire).
    pub async fn heal(&self) -> SystemHealthSnapshot {
        self.aggregator.evaluate(true).await
    }

    /// Spawns the probe loops and the subscriber fan-out listener.
    ///
    /// Idempotent; [`Supervisor::run`] calls it, embedders may call it
    /// directly when driving lifetime themselves.
    pub fn start_monitoring(&self) {
        if self.monitoring.swap(true, Ordering::SeqCst) {
            return;
        }

        let mut rx = self.bus.subscribe();
        let subs = Arc::clone(&self.subs);
        let token = self.runtime_token.clone();
        tokio::spawn(async move {
            loop {
                tokio::select! {
                    _ = token.cancelled() => break,
                    msg = rx.recv() => match msg {
                        Ok(ev) => subs.emit(Arc::new(ev)),
                        Err(tokio::sync::broadcast::error::RecvError::Closed) => break,
                        Err(tokio::sync::broadcast::error::RecvError::Lagged(_)) => continue,
                    }
                }
            }
        });

        self.scheduler.spawn(self.runtime_token.child_token());
    }

    /// Runs until an OS termination signal (or external cancel), then shuts
    /// down gracefully.
    pub async fn run(&self) -> Result<(), SupervisorError> {
        self.start_monitoring();
        self.start_all().await;

        tokio::select! {
            _ = shutdown::wait_for_shutdown_signal() => {}
            _ = self.runtime_token.cancelled() => {}
        }
        self.shutdown().await
    }

    /// Cancels every loop and pending recovery, then best-effort stops all
    /// active services within `shutdown_grace`.
    pub async fn shutdown(&self) -> Result<(), SupervisorError> {
        self.bus.publish(Event::now(EventKind::ShutdownRequested));
        self.runtime_token.cancel();

        let grace = self.cfg.shutdown_grace;
        match time::timeout(grace, self.lifecycle.stop_all_active()).await {
            Ok(()) => {
                self.bus.publish(Event::now(EventKind::AllStoppedWithin));
                Ok(())
            }
            Err(_) => {
                let mut stuck = Vec::new();
                for entry in self.registry.all().await {
                    if entry.status().await.is_active() {
                        stuck.push(entry.name().to_string());
                    }
                }
                stuck.sort_unstable();
                self.bus.publish(Event::now(EventKind::GraceExceeded));
                Err(SupervisorError::GraceExceeded { grace, stuck })
            }
        }
    }
}
