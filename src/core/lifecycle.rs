//! Lifecycle manager: owns execution handles and every status transition.
//!
//! ## State machine
//! ```text
//! Stopped ──start──► Starting ──ready──► Running ──check fails──► Unhealthy
//!    ▲                  │                   ▲                        │
//!    │                  └──start timeout──► Error ◄──┐               ▼
//!    │                                       │       │          Recovering
//!    │                                       └───────┴──────────┐   │
//!    │                                    (recovery path owns   │   │
//!    │                                     Unhealthy/Error)     │   ▼
//!    ├──────── stop (always allowed, cancels recovery) ◄────────┴─ ...
//!    │
//!    └──enable── Disabled ◄── recovery exhausted / operator disable
//! ```
//!
//! ## Rules
//! - Only `start`/`stop`/`restart` (and the recovery recycle path) touch the
//!   execution handle; nothing else may.
//! - Readiness = first passing health probe, polled every `ready_poll`,
//!   bounded by `start_timeout`; exceeding it is hang detection → `Error`.
//! - `restart` = stop, quiescence delay, start; the pause lets the old
//!   handle release ports and file locks before the new one claims them.
//! - `enable` on a non-`Disabled` service is a no-op and touches no counters.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::SystemTime;

use tokio::sync::Mutex;
use tokio::task::JoinHandle;
use tokio::time;
use tokio_util::sync::CancellationToken;

use crate::core::config::Config;
use crate::core::registry::{Registry, ServiceEntry};
use crate::error::{ServiceError, SupervisorError};
use crate::events::{Bus, Event, EventKind};
use crate::services::{HealthReport, ServiceStatus};

/// Execution handle for one started service.
struct ServiceHandle {
    join: JoinHandle<()>,
    cancel: CancellationToken,
}

/// Owns execution handles and performs all status transitions.
pub struct LifecycleManager {
    registry: Arc<Registry>,
    bus: Bus,
    cfg: Arc<Config>,
    runtime_token: CancellationToken,
    handles: Mutex<HashMap<String, ServiceHandle>>,
}

impl LifecycleManager {
    /// Creates the manager.
    pub fn new(
        registry: Arc<Registry>,
        bus: Bus,
        cfg: Arc<Config>,
        runtime_token: CancellationToken,
    ) -> Self {
        Self {
            registry,
            bus,
            cfg,
            runtime_token,
            handles: Mutex::new(HashMap::new()),
        }
    }

    /// Starts a `Stopped` service: dependency guard, handle spawn, readiness.
    ///
    /// Fails with `DependencyNotReady` when a declared dependency is not
    /// `Running` (the caller may retry later), with `InvalidState` from any
    /// status other than `Stopped`, and with `StartTimedOut` when the
    /// readiness probe does not pass within `start_timeout` (the service is
    /// then in `Error`).
    pub async fn start(&self, name: &str) -> Result<(), SupervisorError> {
        let entry = self.registry.get(name).await?;

        for dep in entry.spec().dependencies() {
            let dep_entry = self.registry.get(dep).await?;
            if dep_entry.status().await != ServiceStatus::Running {
                return Err(SupervisorError::DependencyNotReady {
                    name: name.to_string(),
                    dependency: dep.clone(),
                });
            }
        }

        {
            let mut st = entry.state_mut().await;
            if st.status != ServiceStatus::Stopped {
                return Err(SupervisorError::InvalidState {
                    name: name.to_string(),
                    status: st.status,
                    op: "start",
                });
            }
            st.transition(ServiceStatus::Starting);
        }
        self.publish(EventKind::ServiceStarting, &entry, ServiceStatus::Starting);

        self.spawn_handle(&entry).await;

        match self.wait_ready(&entry).await {
            Ok(()) => {
                {
                    let mut st = entry.state_mut().await;
                    if st.status != ServiceStatus::Starting {
                        // raced with an operator stop; leave their state alone
                        return Ok(());
                    }
                    st.transition(ServiceStatus::Running);
                }
                self.publish(EventKind::ServiceStarted, &entry, ServiceStatus::Running);
                Ok(())
            }
            Err(timeout) => {
                self.drop_handle(name).await;
                {
                    let mut st = entry.state_mut().await;
                    if st.status != ServiceStatus::Starting {
                        return Ok(());
                    }
                    st.last_detail = Some(format!("did not become ready within {timeout:?}"));
                    st.transition(ServiceStatus::Error);
                }
                self.bus.publish(
                    Event::now(EventKind::ServiceStartTimedOut)
                        .with_service(name)
                        .with_timeout(timeout)
                        .with_status(ServiceStatus::Error),
                );
                Err(SupervisorError::StartTimedOut {
                    name: name.to_string(),
                    timeout,
                })
            }
        }
    }

    /// Bulk tier-ordered startup of every `auto_start` service.
    ///
    /// Tiers run in ascending priority; all starts within a tier run
    /// concurrently and the tier completes before the next begins. Failures
    /// are collected, not fatal: one service never blocks its tier peers.
    pub async fn start_all(&self) -> Vec<(String, SupervisorError)> {
        let mut tiers: Vec<(u32, Vec<String>)> = Vec::new();
        for entry in self.registry.all().await {
            if !entry.spec().auto_start() || entry.status().await != ServiceStatus::Stopped {
                continue;
            }
            let priority = entry.spec().priority();
            let name = entry.name().to_string();
            match tiers.iter_mut().find(|(p, _)| *p == priority) {
                Some((_, names)) => names.push(name),
                None => tiers.push((priority, vec![name])),
            }
        }
        tiers.sort_unstable_by_key(|(p, _)| *p);

        let mut failures = Vec::new();
        for (_, names) in tiers {
            let results =
                futures::future::join_all(names.iter().map(|name| self.start(name))).await;
            for (name, res) in names.into_iter().zip(results) {
                if let Err(err) = res {
                    failures.push((name, err));
                }
            }
        }
        failures
    }

    /// Stops a service: cancels any in-flight recovery, tears the handle
    /// down within `stop_grace` (abort past it), forces `Stopped`.
    ///
    /// Always allowed; a no-op on `Stopped` and `Disabled` services.
    pub async fn stop(&self, name: &str) -> Result<(), SupervisorError> {
        let entry = self.registry.get(name).await?;
        entry.cancel_recovery().await;

        let status = entry.status().await;
        if matches!(status, ServiceStatus::Stopped | ServiceStatus::Disabled) {
            self.drop_handle(name).await;
            return Ok(());
        }

        self.drop_handle(name).await;
        entry.state_mut().await.transition(ServiceStatus::Stopped);
        self.publish(EventKind::ServiceStopped, &entry, ServiceStatus::Stopped);
        Ok(())
    }

    /// Operator restart: stop, quiescence delay, start.
    ///
    /// Counts toward `total_restarts` regardless of outcome.
    pub async fn restart(&self, name: &str) -> Result<(), SupervisorError> {
        let entry = self.registry.get(name).await?;
        entry.state_mut().await.total_restarts += 1;

        self.stop(name).await?;
        time::sleep(self.cfg.quiescence).await;
        self.start(name).await
    }

    /// Re-arms a `Disabled` service into `Stopped`, clearing the failure and
    /// recovery counters (`total_restarts` survives).
    ///
    /// A no-op on any other status: counters are left untouched.
    pub async fn enable(&self, name: &str) -> Result<(), SupervisorError> {
        let entry = self.registry.get(name).await?;
        {
            let mut st = entry.state_mut().await;
            if st.status != ServiceStatus::Disabled {
                return Ok(());
            }
            st.clear_recovery();
            st.last_detail = None;
            st.transition(ServiceStatus::Stopped);
        }
        self.publish(EventKind::ServiceEnabled, &entry, ServiceStatus::Stopped);
        Ok(())
    }

    /// Operator disable: tears the handle down and parks the service in
    /// `Disabled` until an explicit enable.
    pub async fn disable(&self, name: &str) -> Result<(), SupervisorError> {
        let entry = self.registry.get(name).await?;
        entry.cancel_recovery().await;
        self.drop_handle(name).await;
        {
            let mut st = entry.state_mut().await;
            if st.status == ServiceStatus::Disabled {
                return Ok(());
            }
            st.last_detail = Some("disabled by operator".to_string());
            st.transition(ServiceStatus::Disabled);
        }
        self.bus.publish(
            Event::now(EventKind::ServiceDisabled)
                .with_service(entry.name())
                .with_detail("disabled by operator")
                .with_status(ServiceStatus::Disabled),
        );
        Ok(())
    }

    /// Applies a health-check result to the service state.
    ///
    /// A passing probe resets the failure streak and clears `Unhealthy`/
    /// `Error` back to `Running` when no recovery owns the service. A
    /// failing probe moves `Running` to `Unhealthy` and records the detail.
    ///
    /// Returns `true` when the failure should flow into recovery accounting.
    pub async fn apply_health(&self, entry: &ServiceEntry, report: &HealthReport) -> bool {
        let recovering = entry.recovery_in_flight().await;
        let mut st = entry.state_mut().await;
        st.last_health_check_at = Some(SystemTime::now());

        if report.healthy {
            st.record_success();
            let cleared = matches!(
                st.status,
                ServiceStatus::Unhealthy | ServiceStatus::Error
            ) && !recovering;
            if cleared {
                st.transition(ServiceStatus::Running);
            }
            let status = st.status;
            drop(st);
            self.bus.publish(
                Event::now(EventKind::CheckPassed)
                    .with_service(entry.name())
                    .with_status(status),
            );
            false
        } else {
            if let Some(detail) = &report.detail {
                st.last_detail = Some(detail.clone());
            }
            let accountable = st.status.is_checkable();
            if st.status == ServiceStatus::Running {
                st.transition(ServiceStatus::Unhealthy);
            }
            let status = st.status;
            drop(st);
            let mut ev = Event::now(EventKind::CheckFailed)
                .with_service(entry.name())
                .with_status(status);
            if let Some(detail) = &report.detail {
                ev = ev.with_detail(detail.clone());
            }
            self.bus.publish(ev);
            accountable
        }
    }

    /// Recycles the execution handle for the recovery fallback path: tear
    /// down, quiescence delay, respawn, readiness, without touching the
    /// status (the recovery loop owns it).
    pub(crate) async fn recycle(&self, name: &str) -> Result<(), SupervisorError> {
        let entry = self.registry.get(name).await?;

        self.drop_handle(name).await;
        time::sleep(self.cfg.quiescence).await;
        self.spawn_handle(&entry).await;

        match self.wait_ready(&entry).await {
            Ok(()) => Ok(()),
            Err(timeout) => {
                self.drop_handle(name).await;
                Err(SupervisorError::StartTimedOut {
                    name: name.to_string(),
                    timeout,
                })
            }
        }
    }

    /// Best-effort stop of every service with a live status, for shutdown.
    pub(crate) async fn stop_all_active(&self) {
        let mut names = Vec::new();
        for entry in self.registry.all().await {
            if entry.status().await.is_active() {
                names.push(entry.name().to_string());
            }
        }
        futures::future::join_all(names.iter().map(|name| self.stop(name))).await;
    }

    /// Spawns the execution body and stores the handle.
    async fn spawn_handle(&self, entry: &Arc<ServiceEntry>) {
        let cancel = self.runtime_token.child_token();
        let service = Arc::clone(entry.spec().service());
        let bus = self.bus.clone();
        let name: Arc<str> = Arc::from(entry.name());

        let run_token = cancel.clone();
        let join = tokio::spawn(async move {
            match service.run(run_token.clone()).await {
                Ok(()) | Err(ServiceError::Canceled) => {
                    if !run_token.is_cancelled() {
                        bus.publish(
                            Event::now(EventKind::HandleExited).with_service(Arc::clone(&name)),
                        );
                    }
                }
                Err(err) => {
                    bus.publish(
                        Event::now(EventKind::HandleExited)
                            .with_service(Arc::clone(&name))
                            .with_detail(err.to_string()),
                    );
                }
            }
        });

        let mut handles = self.handles.lock().await;
        if let Some(stale) = handles.insert(
            entry.name().to_string(),
            ServiceHandle { join, cancel },
        ) {
            stale.cancel.cancel();
            stale.join.abort();
        }
    }

    /// Cancels and joins the handle, aborting past `stop_grace`.
    async fn drop_handle(&self, name: &str) {
        let handle = self.handles.lock().await.remove(name);
        let Some(ServiceHandle { join, cancel }) = handle else {
            return;
        };
        cancel.cancel();
        let mut join = join;
        if time::timeout(self.cfg.stop_grace, &mut join).await.is_err() {
            join.abort();
        }
    }

    /// Polls the health probe until it passes, bounded by `start_timeout`.
    async fn wait_ready(
        &self,
        entry: &Arc<ServiceEntry>,
    ) -> Result<(), std::time::Duration> {
        let budget = self.cfg.start_timeout;
        let service = Arc::clone(entry.spec().service());
        let probe_timeout = entry.spec().check_timeout(&self.cfg);
        let poll = self.cfg.ready_poll;

        let readiness = async {
            loop {
                match time::timeout(probe_timeout, service.check_health()).await {
                    Ok(report) if report.healthy => break,
                    _ => time::sleep(poll).await,
                }
            }
        };

        time::timeout(budget, readiness).await.map_err(|_| budget)
    }

    fn publish(&self, kind: EventKind, entry: &ServiceEntry, status: ServiceStatus) {
        self.bus.publish(
            Event::now(kind)
                .with_service(entry.name())
                .with_status(status),
        );
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicBool, Ordering};
    use std::sync::Mutex as StdMutex;
    use std::time::Duration;

    use super::*;
    use crate::core::builder::SupervisorBuilder;
    use crate::core::supervisor::Supervisor;
    use crate::policies::{BackoffPolicy, JitterPolicy};
    use crate::services::{HealthReport, ServiceFn, ServiceSpec};

    fn test_config() -> Config {
        Config {
            fast_interval: Duration::from_millis(25),
            regular_interval: Duration::from_millis(50),
            deep_interval: Duration::from_millis(100),
            check_timeout: Duration::from_millis(200),
            start_timeout: Duration::from_millis(300),
            ready_poll: Duration::from_millis(10),
            quiescence: Duration::from_millis(10),
            stop_grace: Duration::from_millis(200),
            shutdown_grace: Duration::from_millis(500),
            failure_threshold: 2,
            max_retries: 3,
            backoff: BackoffPolicy {
                first: Duration::from_millis(50),
                max: Duration::from_secs(5),
                factor: 2.0,
                jitter: JitterPolicy::None,
            },
            emergency_cooldown: Duration::from_millis(200),
            snapshot_history: 8,
            bus_capacity: 256,
        }
    }

    fn supervisor() -> Arc<Supervisor> {
        SupervisorBuilder::new(test_config()).build()
    }

    fn healthy_spec(name: &'static str) -> ServiceSpec {
        ServiceSpec::new(ServiceFn::new(name, || async { HealthReport::healthy() }).arc())
    }

    fn switchable_spec(name: &'static str, healthy: Arc<AtomicBool>) -> ServiceSpec {
        ServiceSpec::new(
            ServiceFn::new(name, move || {
                let healthy = Arc::clone(&healthy);
                async move {
                    if healthy.load(Ordering::SeqCst) {
                        HealthReport::healthy()
                    } else {
                        HealthReport::unhealthy("flipped off")
                    }
                }
            })
            .arc(),
        )
    }

    #[tokio::test]
    async fn start_brings_service_to_running() {
        let sup = supervisor();
        sup.register(healthy_spec("svc")).await.unwrap();

        sup.start("svc").await.unwrap();
        let st = sup.service_state("svc").await.unwrap();
        assert_eq!(st.status, ServiceStatus::Running);
    }

    #[tokio::test]
    async fn start_rejects_non_stopped_states() {
        let sup = supervisor();
        sup.register(healthy_spec("svc")).await.unwrap();
        sup.start("svc").await.unwrap();

        let err = sup.start("svc").await.unwrap_err();
        assert!(matches!(err, SupervisorError::InvalidState { .. }));
    }

    #[tokio::test]
    async fn dependency_must_be_running_first() {
        let sup = supervisor();
        sup.register(healthy_spec("base")).await.unwrap();
        sup.register(healthy_spec("edge").with_dependencies(["base"]))
            .await
            .unwrap();

        let err = sup.start("edge").await.unwrap_err();
        assert!(matches!(err, SupervisorError::DependencyNotReady { .. }));
        assert_eq!(
            sup.service_state("edge").await.unwrap().status,
            ServiceStatus::Stopped
        );

        sup.start("base").await.unwrap();
        sup.start("edge").await.unwrap();
        assert_eq!(
            sup.service_state("edge").await.unwrap().status,
            ServiceStatus::Running
        );
    }

    #[tokio::test]
    async fn start_timeout_is_hang_detection() {
        let sup = supervisor();
        sup.register(ServiceSpec::new(
            ServiceFn::new("hung", || async { HealthReport::unhealthy("never ready") }).arc(),
        ))
        .await
        .unwrap();

        let err = sup.start("hung").await.unwrap_err();
        assert!(matches!(err, SupervisorError::StartTimedOut { .. }));
        assert_eq!(
            sup.service_state("hung").await.unwrap().status,
            ServiceStatus::Error
        );
    }

    #[tokio::test]
    async fn restart_counts_and_returns_to_running() {
        let sup = supervisor();
        sup.register(healthy_spec("svc")).await.unwrap();
        sup.start("svc").await.unwrap();

        sup.restart("svc").await.unwrap();
        let st = sup.service_state("svc").await.unwrap();
        assert_eq!(st.status, ServiceStatus::Running);
        assert_eq!(st.total_restarts, 1);
    }

    #[tokio::test]
    async fn stop_is_idempotent_and_always_allowed() {
        let sup = supervisor();
        sup.register(healthy_spec("svc")).await.unwrap();
        sup.start("svc").await.unwrap();

        sup.stop("svc").await.unwrap();
        assert_eq!(
            sup.service_state("svc").await.unwrap().status,
            ServiceStatus::Stopped
        );
        sup.stop("svc").await.unwrap();
        assert_eq!(
            sup.service_state("svc").await.unwrap().status,
            ServiceStatus::Stopped
        );
    }

    #[tokio::test]
    async fn enable_is_a_noop_on_non_disabled_services() {
        let sup = supervisor();
        sup.register(healthy_spec("svc")).await.unwrap();
        sup.start("svc").await.unwrap();
        sup.restart("svc").await.unwrap();

        let before = sup.service_state("svc").await.unwrap();
        sup.enable("svc").await.unwrap();
        let after = sup.service_state("svc").await.unwrap();

        assert_eq!(after.status, before.status);
        assert_eq!(after.total_restarts, before.total_restarts);
        assert_eq!(after.consecutive_failures, before.consecutive_failures);
        assert_eq!(after.recovery_attempt, before.recovery_attempt);
    }

    #[tokio::test]
    async fn disable_then_enable_clears_cycle_counters_only() {
        let sup = supervisor();
        sup.register(healthy_spec("svc")).await.unwrap();
        sup.start("svc").await.unwrap();
        sup.restart("svc").await.unwrap();
        sup.disable("svc").await.unwrap();

        let st = sup.service_state("svc").await.unwrap();
        assert_eq!(st.status, ServiceStatus::Disabled);
        assert!(st.last_detail.is_some());

        sup.enable("svc").await.unwrap();
        let st = sup.service_state("svc").await.unwrap();
        assert_eq!(st.status, ServiceStatus::Stopped);
        assert_eq!(st.consecutive_failures, 0);
        assert_eq!(st.recovery_attempt, 0);
        assert_eq!(st.total_restarts, 1);
        assert!(st.last_detail.is_none());
    }

    #[tokio::test]
    async fn bulk_startup_completes_tiers_in_order() {
        let sup = supervisor();
        let order: Arc<StdMutex<Vec<&'static str>>> = Arc::new(StdMutex::new(Vec::new()));

        for (name, priority) in [("t2-a", 2u32), ("t1-a", 1), ("t1-b", 1), ("t3-a", 3)] {
            let order = Arc::clone(&order);
            let up = Arc::new(AtomicBool::new(false));
            let probe_up = Arc::clone(&up);
            sup.register(
                ServiceSpec::new(
                    ServiceFn::new(name, move || {
                        let up = Arc::clone(&probe_up);
                        async move {
                            if up.load(Ordering::SeqCst) {
                                HealthReport::healthy()
                            } else {
                                HealthReport::unhealthy("not up yet")
                            }
                        }
                    })
                    .with_run(move |ctx| {
                        let order = Arc::clone(&order);
                        let up = Arc::clone(&up);
                        async move {
                            order.lock().unwrap().push(name);
                            up.store(true, Ordering::SeqCst);
                            ctx.cancelled().await;
                            Ok(())
                        }
                    })
                    .arc(),
                )
                .with_priority(priority),
            )
            .await
            .unwrap();
        }

        let failures = sup.start_all().await;
        assert!(failures.is_empty(), "unexpected failures: {failures:?}");

        let order = order.lock().unwrap().clone();
        assert_eq!(order.len(), 4);
        let pos = |n: &str| order.iter().position(|x| *x == n).unwrap();
        assert!(pos("t1-a") < pos("t2-a"));
        assert!(pos("t1-b") < pos("t2-a"));
        assert!(pos("t2-a") < pos("t3-a"));
    }

    #[tokio::test]
    async fn failing_health_check_moves_running_to_unhealthy() {
        let sup = supervisor();
        let healthy = Arc::new(AtomicBool::new(true));
        sup.register(switchable_spec("svc", Arc::clone(&healthy)))
            .await
            .unwrap();
        sup.start("svc").await.unwrap();

        healthy.store(false, Ordering::SeqCst);
        let entry = sup.registry.get("svc").await.unwrap();
        let accountable = sup
            .lifecycle
            .apply_health(&entry, &HealthReport::unhealthy("probe down"))
            .await;

        assert!(accountable);
        let st = sup.service_state("svc").await.unwrap();
        assert_eq!(st.status, ServiceStatus::Unhealthy);
        assert_eq!(st.last_detail.as_deref(), Some("probe down"));

        // A passing check clears it straight back to Running.
        let accountable = sup
            .lifecycle
            .apply_health(&entry, &HealthReport::healthy())
            .await;
        assert!(!accountable);
        let st = sup.service_state("svc").await.unwrap();
        assert_eq!(st.status, ServiceStatus::Running);
        assert_eq!(st.consecutive_failures, 0);
    }
}
