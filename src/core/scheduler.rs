//! Health scheduler: fast/regular/deep probe cadences.
//!
//! Three independent loops tick against the registry:
//!
//! - **fast** (default 5s) probes only critical-flagged services;
//! - **regular** (default 30s) probes every enabled service and refreshes
//!   the aggregate grade;
//! - **deep** (default 5min) additionally records a full snapshot into the
//!   aggregator's history.
//!
//! ## Rules
//! - Probes for different services run concurrently (one `JoinSet` per
//!   sweep); probes for the same service never overlap (per-service
//!   single-flight guard; a busy service is skipped, not queued).
//! - A probe exceeding its timeout, or panicking, counts as unhealthy.
//! - A panic escaping a sweep halts that loop only; the other cadences keep
//!   running (`LoopHalted` is published).

use std::sync::Arc;
use std::time::Duration;

use futures::FutureExt;
use tokio::task::JoinSet;
use tokio::time::{self, MissedTickBehavior};
use tokio_util::sync::CancellationToken;

use crate::core::aggregator::HealthAggregator;
use crate::core::config::Config;
use crate::core::lifecycle::LifecycleManager;
use crate::core::recovery::RecoveryCoordinator;
use crate::core::registry::{Registry, ServiceEntry};
use crate::events::{Bus, Event, EventKind};
use crate::services::HealthReport;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Cadence {
    Fast,
    Regular,
    Deep,
}

impl Cadence {
    fn label(&self) -> &'static str {
        match self {
            Cadence::Fast => "fast",
            Cadence::Regular => "regular",
            Cadence::Deep => "deep",
        }
    }
}

/// Drives the periodic health probes.
pub struct HealthScheduler {
    registry: Arc<Registry>,
    lifecycle: Arc<LifecycleManager>,
    recovery: Arc<RecoveryCoordinator>,
    aggregator: Arc<HealthAggregator>,
    bus: Bus,
    cfg: Arc<Config>,
}

impl HealthScheduler {
    /// Creates the scheduler.
    pub fn new(
        registry: Arc<Registry>,
        lifecycle: Arc<LifecycleManager>,
        recovery: Arc<RecoveryCoordinator>,
        aggregator: Arc<HealthAggregator>,
        bus: Bus,
        cfg: Arc<Config>,
    ) -> Self {
        Self {
            registry,
            lifecycle,
            recovery,
            aggregator,
            bus,
            cfg,
        }
    }

    /// Spawns the three cadence loops; each stops on token cancellation.
    pub fn spawn(self: &Arc<Self>, token: CancellationToken) {
        self.spawn_loop(Cadence::Fast, self.cfg.fast_interval, token.clone());
        self.spawn_loop(Cadence::Regular, self.cfg.regular_interval, token.clone());
        self.spawn_loop(Cadence::Deep, self.cfg.deep_interval, token);
    }

    fn spawn_loop(self: &Arc<Self>, cadence: Cadence, period: Duration, token: CancellationToken) {
        let this = Arc::clone(self);
        tokio::spawn(async move {
            let mut interval = time::interval(period.max(Duration::from_millis(1)));
            interval.set_missed_tick_behavior(MissedTickBehavior::Delay);
            loop {
                tokio::select! {
                    _ = token.cancelled() => break,
                    _ = interval.tick() => {}
                }

                let sweep = std::panic::AssertUnwindSafe(this.sweep(cadence)).catch_unwind();
                if sweep.await.is_err() {
                    this.bus.publish(
                        Event::now(EventKind::LoopHalted)
                            .with_detail(format!("{} sweep panicked", cadence.label())),
                    );
                    break;
                }
            }
        });
    }

    /// One sweep: fan probes out, collect, then refresh the aggregate.
    async fn sweep(&self, cadence: Cadence) {
        let mut set = JoinSet::new();
        for entry in self.registry.all().await {
            if cadence == Cadence::Fast && !entry.spec().critical() {
                continue;
            }
            if !entry.status().await.is_checkable() {
                continue;
            }

            let lifecycle = Arc::clone(&self.lifecycle);
            let recovery = Arc::clone(&self.recovery);
            let bus = self.bus.clone();
            let timeout = entry.spec().check_timeout(&self.cfg);
            set.spawn(async move {
                probe_one(entry, lifecycle, recovery, bus, timeout).await;
            });
        }
        while set.join_next().await.is_some() {}

        match cadence {
            Cadence::Fast => {}
            Cadence::Regular => {
                self.aggregator.evaluate(false).await;
            }
            Cadence::Deep => {
                self.aggregator.evaluate(true).await;
            }
        }
    }
}

/// Probes one service and routes the result.
///
/// The probe itself runs on its own task so a panicking health check is
/// contained and reported as an unhealthy result.
async fn probe_one(
    entry: Arc<ServiceEntry>,
    lifecycle: Arc<LifecycleManager>,
    recovery: Arc<RecoveryCoordinator>,
    bus: Bus,
    timeout: Duration,
) {
    let Some(_flight) = entry.try_probe() else {
        return;
    };

    let service = Arc::clone(entry.spec().service());
    let mut probe = tokio::spawn(async move { service.check_health().await });

    let report = match time::timeout(timeout, &mut probe).await {
        Ok(Ok(report)) => report,
        Ok(Err(_panicked)) => HealthReport::unhealthy("health check panicked"),
        Err(_elapsed) => {
            probe.abort();
            bus.publish(
                Event::now(EventKind::CheckTimedOut)
                    .with_service(entry.name())
                    .with_timeout(timeout),
            );
            HealthReport::unhealthy(format!("health check timed out after {timeout:?}"))
        }
    };

    let needs_recovery = lifecycle.apply_health(&entry, &report).await;
    if needs_recovery {
        recovery.on_unhealthy(entry.name()).await;
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicBool, AtomicU32, Ordering};

    use tokio::time::sleep;

    use super::*;
    use crate::core::builder::SupervisorBuilder;
    use crate::core::supervisor::Supervisor;
    use crate::policies::{BackoffPolicy, JitterPolicy};
    use crate::services::{ServiceSpec, ServiceStatus};

    fn test_config() -> Config {
        Config {
            fast_interval: Duration::from_millis(25),
            regular_interval: Duration::from_millis(40),
            deep_interval: Duration::from_millis(80),
            check_timeout: Duration::from_millis(150),
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
            emergency_cooldown: Duration::from_secs(10),
            snapshot_history: 8,
            bus_capacity: 512,
        }
    }

    fn supervisor() -> Arc<Supervisor> {
        SupervisorBuilder::new(test_config()).build()
    }

    #[tokio::test]
    async fn running_services_are_probed_periodically() {
        let sup = supervisor();
        let probes = Arc::new(AtomicU32::new(0));
        let count = Arc::clone(&probes);
        sup.register(ServiceSpec::new(
            crate::services::ServiceFn::new("steady", move || {
                let count = Arc::clone(&count);
                async move {
                    count.fetch_add(1, Ordering::SeqCst);
                    HealthReport::healthy()
                }
            })
            .arc(),
        ))
        .await
        .unwrap();

        sup.start("steady").await.unwrap();
        let after_start = probes.load(Ordering::SeqCst);

        sup.start_monitoring();
        sleep(Duration::from_millis(200)).await;

        let st = sup.service_state("steady").await.unwrap();
        assert_eq!(st.status, ServiceStatus::Running);
        assert!(st.last_health_check_at.is_some());
        assert!(
            probes.load(Ordering::SeqCst) > after_start,
            "scheduler never probed the service"
        );
    }

    #[tokio::test]
    async fn critical_flag_gates_the_fast_cadence() {
        let sup = supervisor();
        let fast_probes = Arc::new(AtomicU32::new(0));
        let slow_probes = Arc::new(AtomicU32::new(0));

        let count = Arc::clone(&fast_probes);
        sup.register(
            ServiceSpec::new(
                crate::services::ServiceFn::new("hot", move || {
                    let count = Arc::clone(&count);
                    async move {
                        count.fetch_add(1, Ordering::SeqCst);
                        HealthReport::healthy()
                    }
                })
                .arc(),
            )
            .with_critical(true),
        )
        .await
        .unwrap();

        let count = Arc::clone(&slow_probes);
        sup.register(ServiceSpec::new(
            crate::services::ServiceFn::new("cold", move || {
                let count = Arc::clone(&count);
                async move {
                    count.fetch_add(1, Ordering::SeqCst);
                    HealthReport::healthy()
                }
            })
            .arc(),
        ))
        .await
        .unwrap();

        sup.start("hot").await.unwrap();
        sup.start("cold").await.unwrap();
        let hot_base = fast_probes.load(Ordering::SeqCst);
        let cold_base = slow_probes.load(Ordering::SeqCst);

        sup.start_monitoring();
        sleep(Duration::from_millis(300)).await;
        sup.shutdown().await.unwrap();

        let hot = fast_probes.load(Ordering::SeqCst) - hot_base;
        let cold = slow_probes.load(Ordering::SeqCst) - cold_base;
        assert!(
            hot > cold,
            "critical service should be probed more often (hot={hot} cold={cold})"
        );
    }

    #[tokio::test]
    async fn probe_timeout_counts_as_unhealthy() {
        let sup = supervisor();
        sup.register(
            ServiceSpec::new(
                crate::services::ServiceFn::new("tarpit", || async {
                    sleep(Duration::from_secs(5)).await;
                    HealthReport::healthy()
                })
                .arc(),
            )
            .with_check_timeout(Duration::from_millis(50)),
        )
        .await
        .unwrap();

        // Plant it Running; startup would never pass the readiness probe.
        {
            let entry = sup.registry.get("tarpit").await.unwrap();
            entry.state_mut().await.transition(ServiceStatus::Running);
        }

        let mut rx = sup.bus().subscribe();
        sup.start_monitoring();
        sleep(Duration::from_millis(200)).await;

        let st = sup.service_state("tarpit").await.unwrap();
        assert_ne!(st.status, ServiceStatus::Running);
        assert!(st.consecutive_failures >= 1 || st.status == ServiceStatus::Recovering);

        let mut timed_out = false;
        while let Ok(ev) = rx.try_recv() {
            if ev.kind == EventKind::CheckTimedOut {
                timed_out = true;
            }
        }
        assert!(timed_out, "no CheckTimedOut event observed");
    }

    #[tokio::test]
    async fn same_service_probes_never_overlap() {
        let sup = supervisor();
        let in_probe = Arc::new(AtomicBool::new(false));
        let overlapped = Arc::new(AtomicBool::new(false));

        let busy = Arc::clone(&in_probe);
        let clash = Arc::clone(&overlapped);
        sup.register(
            ServiceSpec::new(
                crate::services::ServiceFn::new("molasses", move || {
                    let busy = Arc::clone(&busy);
                    let clash = Arc::clone(&clash);
                    async move {
                        if busy.swap(true, Ordering::SeqCst) {
                            clash.store(true, Ordering::SeqCst);
                        }
                        sleep(Duration::from_millis(60)).await;
                        busy.store(false, Ordering::SeqCst);
                        HealthReport::healthy()
                    }
                })
                .arc(),
            )
            // probed by all three cadences at once
            .with_critical(true),
        )
        .await
        .unwrap();

        {
            let entry = sup.registry.get("molasses").await.unwrap();
            entry.state_mut().await.transition(ServiceStatus::Running);
        }

        sup.start_monitoring();
        sleep(Duration::from_millis(400)).await;

        assert!(
            !overlapped.load(Ordering::SeqCst),
            "two probes ran concurrently for one service"
        );
    }

    #[tokio::test]
    async fn disabled_services_are_never_probed() {
        let sup = supervisor();
        let probes = Arc::new(AtomicU32::new(0));
        let count = Arc::clone(&probes);
        sup.register(ServiceSpec::new(
            crate::services::ServiceFn::new("benched", move || {
                let count = Arc::clone(&count);
                async move {
                    count.fetch_add(1, Ordering::SeqCst);
                    HealthReport::healthy()
                }
            })
            .arc(),
        ))
        .await
        .unwrap();

        sup.disable("benched").await.unwrap();
        sup.start_monitoring();
        sleep(Duration::from_millis(200)).await;

        assert_eq!(probes.load(Ordering::SeqCst), 0);
        assert_eq!(
            sup.service_state("benched").await.unwrap().status,
            ServiceStatus::Disabled
        );
    }
}
