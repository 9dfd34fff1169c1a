//! Recovery coordinator: failure accounting and single-flight recovery loops.
//!
//! ## Flow per unhealthy signal
//! ```text
//! on_unhealthy(name)
//!   ├─ recovery already in flight? ──► ignore (single-flight)
//!   ├─ consecutive_failures += 1 (clamped)
//!   ├─ below threshold? ──► stay Unhealthy (tolerates transient blips)
//!   └─ claim recovery slot ──► spawn recovery loop:
//!        loop {
//!          attempt += 1; total_restarts += 1; status = Recovering
//!          recover() hook if present, else recycle the handle
//!          ├─ success ──► Running, counters reset, done
//!          ├─ failure, attempts spent ──► Disabled + critical alert, done
//!          └─ failure ──► Unhealthy, sleep first×2^(attempt-1), again
//!        }
//! ```
//!
//! ## Rules
//! - At most one loop per service (the registry's recovery slot).
//! - The backoff sleep is cancellable (stop/shutdown) and can be cut short
//!   by an emergency pass (`hurry`), which never bypasses the single-flight
//!   or retry-budget invariants.
//! - Counters reset on success only; exhaustion parks the service in
//!   `Disabled` until an explicit enable.

use std::sync::Arc;

use tokio::time;
use tokio_util::sync::CancellationToken;

use crate::core::config::Config;
use crate::core::lifecycle::LifecycleManager;
use crate::core::registry::{Registry, ServiceEntry};
use crate::events::{Bus, Event, EventKind};
use crate::services::ServiceStatus;
use crate::subscribers::{Alert, AlertSeverity, Alerter};

/// Decides when and how unhealthy services are brought back.
pub struct RecoveryCoordinator {
    registry: Arc<Registry>,
    lifecycle: Arc<LifecycleManager>,
    bus: Bus,
    cfg: Arc<Config>,
    alerter: Option<Arc<dyn Alerter>>,
    runtime_token: CancellationToken,
}

impl RecoveryCoordinator {
    /// Creates the coordinator.
    pub fn new(
        registry: Arc<Registry>,
        lifecycle: Arc<LifecycleManager>,
        bus: Bus,
        cfg: Arc<Config>,
        alerter: Option<Arc<dyn Alerter>>,
        runtime_token: CancellationToken,
    ) -> Self {
        Self {
            registry,
            lifecycle,
            bus,
            cfg,
            alerter,
            runtime_token,
        }
    }

    /// Accounts one unhealthy result and starts recovery once the failure
    /// threshold is crossed.
    ///
    /// Signals arriving while a recovery is in flight are ignored; they
    /// neither stack attempts nor inflate the failure streak.
    pub async fn on_unhealthy(self: &Arc<Self>, name: &str) {
        let Ok(entry) = self.registry.get(name).await else {
            return;
        };
        if entry.recovery_in_flight().await {
            return;
        }

        let threshold = entry.spec().failure_threshold(&self.cfg);
        {
            let mut st = entry.state_mut().await;
            if !st.status.is_checkable() {
                return;
            }
            st.record_failure(threshold);
            if st.consecutive_failures < threshold {
                return;
            }
        }

        self.begin_recovery(&entry).await;
    }

    /// Forces recovery for an `Unhealthy`/`Error` service, bypassing the
    /// failure-threshold accounting (emergency path).
    ///
    /// When a recovery is already in flight, its pending backoff sleep is
    /// cut short instead, single-flight always wins.
    pub async fn force_recover(self: &Arc<Self>, name: &str) {
        let Ok(entry) = self.registry.get(name).await else {
            return;
        };
        if entry.recovery_in_flight().await {
            entry.hurry_recovery();
            return;
        }
        if !matches!(
            entry.status().await,
            ServiceStatus::Unhealthy | ServiceStatus::Error
        ) {
            return;
        }
        self.begin_recovery(&entry).await;
    }

    /// Claims the slot and spawns the recovery loop.
    async fn begin_recovery(self: &Arc<Self>, entry: &Arc<ServiceEntry>) {
        let Some(token) = entry.try_begin_recovery(&self.runtime_token).await else {
            return;
        };
        let this = Arc::clone(self);
        let entry = Arc::clone(entry);
        tokio::spawn(async move {
            this.run_recovery(&entry, token.clone()).await;
            entry.end_recovery().await;
        });
    }

    /// The per-service recovery loop; exactly one runs per service.
    async fn run_recovery(&self, entry: &Arc<ServiceEntry>, token: CancellationToken) {
        let name = entry.name().to_string();
        let max_retries = entry.spec().max_retries(&self.cfg);
        let backoff = entry.spec().backoff(&self.cfg);

        loop {
            if token.is_cancelled() {
                break;
            }

            let attempt = {
                let mut st = entry.state_mut().await;
                if !matches!(
                    st.status,
                    ServiceStatus::Unhealthy | ServiceStatus::Error | ServiceStatus::Recovering
                ) {
                    break;
                }
                st.total_restarts += 1;
                let attempt = st.bump_recovery_attempt(max_retries.saturating_add(1));
                st.transition(ServiceStatus::Recovering);
                attempt
            };
            self.bus.publish(
                Event::now(EventKind::RecoveryStarted)
                    .with_service(name.as_str())
                    .with_attempt(attempt)
                    .with_status(ServiceStatus::Recovering),
            );

            let result = tokio::select! {
                res = self.attempt(entry) => res,
                _ = token.cancelled() => break,
            };

            match result {
                Ok(()) => {
                    {
                        let mut st = entry.state_mut().await;
                        if st.status != ServiceStatus::Recovering {
                            break;
                        }
                        st.clear_recovery();
                        st.transition(ServiceStatus::Running);
                    }
                    self.bus.publish(
                        Event::now(EventKind::RecoverySucceeded)
                            .with_service(name.as_str())
                            .with_attempt(attempt)
                            .with_status(ServiceStatus::Running),
                    );
                    break;
                }
                Err(detail) => {
                    self.bus.publish(
                        Event::now(EventKind::RecoveryFailed)
                            .with_service(name.as_str())
                            .with_attempt(attempt)
                            .with_detail(detail.clone()),
                    );

                    if attempt >= max_retries {
                        self.exhaust(entry, attempt, detail).await;
                        break;
                    }

                    {
                        let mut st = entry.state_mut().await;
                        if st.status != ServiceStatus::Recovering {
                            break;
                        }
                        st.last_detail = Some(detail);
                        st.transition(ServiceStatus::Unhealthy);
                    }
                    let delay = backoff.next(attempt.saturating_sub(1));
                    self.bus.publish(
                        Event::now(EventKind::RecoveryScheduled)
                            .with_service(name.as_str())
                            .with_attempt(attempt)
                            .with_delay(delay)
                            .with_status(ServiceStatus::Unhealthy),
                    );

                    tokio::select! {
                        _ = time::sleep(delay) => {}
                        _ = entry.hurried() => {}
                        _ = token.cancelled() => break,
                    }
                }
            }
        }
    }

    /// One recovery attempt: the service hook when present, otherwise a
    /// handle recycle through the lifecycle manager.
    async fn attempt(&self, entry: &Arc<ServiceEntry>) -> Result<(), String> {
        let service = Arc::clone(entry.spec().service());
        let hook = time::timeout(self.cfg.start_timeout, service.recover());
        match hook.await {
            Err(_) => Err(format!(
                "recovery hook timed out after {:?}",
                self.cfg.start_timeout
            )),
            Ok(Some(outcome)) => {
                if outcome.succeeded {
                    Ok(())
                } else {
                    Err(outcome
                        .detail
                        .unwrap_or_else(|| "recovery hook reported failure".to_string()))
                }
            }
            Ok(None) => self
                .lifecycle
                .recycle(entry.name())
                .await
                .map_err(|err| err.to_string()),
        }
    }

    /// Retry budget spent: park in `Disabled` and raise a critical alert.
    async fn exhaust(&self, entry: &Arc<ServiceEntry>, attempts: u32, detail: String) {
        let name = entry.name().to_string();
        {
            let mut st = entry.state_mut().await;
            if st.status != ServiceStatus::Recovering {
                return;
            }
            st.last_detail = Some(detail.clone());
            st.transition(ServiceStatus::Disabled);
        }
        self.bus.publish(
            Event::now(EventKind::RecoveryExhausted)
                .with_service(name.as_str())
                .with_attempt(attempts)
                .with_detail(detail.clone())
                .with_status(ServiceStatus::Disabled),
        );
        self.bus.publish(
            Event::now(EventKind::ServiceDisabled)
                .with_service(name.as_str())
                .with_detail(detail.clone())
                .with_status(ServiceStatus::Disabled),
        );

        if let Some(alerter) = &self.alerter {
            let snapshot = self.registry.capture_snapshot().await;
            let alert = Alert::new(
                AlertSeverity::Critical,
                format!("service {name:?} disabled after {attempts} recovery attempts: {detail}"),
            )
            .with_service(name)
            .with_snapshot(snapshot);
            alerter.send_alert(&alert).await;
        }
    }
}
