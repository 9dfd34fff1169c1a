//! Health aggregator: grade computation and emergency recovery.
//!
//! After every regular/deep sweep (and on demand through `heal()`) the
//! aggregator derives a fresh [`SystemHealthSnapshot`] from the registry,
//! publishes grade movements, and, when the grade sits at `critical` or
//! `failed`, launches an emergency recovery pass: every `Unhealthy`/`Error`
//! service is forced into recovery at once. Pending backoff sleeps are cut
//! short; the single-flight and retry-budget invariants still hold.
//!
//! A cooldown (default 60s) gates successive passes, so re-evaluating a
//! still-bad system is cheap and idempotent. Deep sweeps additionally record
//! the snapshot into a bounded ring buffer for `history()`.

use std::sync::Arc;
use std::time::Instant;

use tokio::sync::Mutex;

use crate::core::config::Config;
use crate::core::recovery::RecoveryCoordinator;
use crate::core::registry::Registry;
use crate::events::{Bus, Event, EventKind};
use crate::health::{HealthGrade, SnapshotHistory, SystemHealthSnapshot};
use crate::services::ServiceStatus;
use crate::subscribers::{Alert, AlertSeverity, Alerter};

struct AggregatorInner {
    last_grade: Option<HealthGrade>,
    last_emergency: Option<Instant>,
    history: SnapshotHistory,
}

/// Reduces per-service states into a system grade and drives emergencies.
pub struct HealthAggregator {
    registry: Arc<Registry>,
    recovery: Arc<RecoveryCoordinator>,
    bus: Bus,
    cfg: Arc<Config>,
    alerter: Option<Arc<dyn Alerter>>,
    inner: Mutex<AggregatorInner>,
}

impl HealthAggregator {
    /// Creates the aggregator.
    pub fn new(
        registry: Arc<Registry>,
        recovery: Arc<RecoveryCoordinator>,
        bus: Bus,
        cfg: Arc<Config>,
        alerter: Option<Arc<dyn Alerter>>,
    ) -> Self {
        let history = SnapshotHistory::new(cfg.snapshot_history_clamped());
        Self {
            registry,
            recovery,
            bus,
            cfg,
            alerter,
            inner: Mutex::new(AggregatorInner {
                last_grade: None,
                last_emergency: None,
                history,
            }),
        }
    }

    /// One aggregation pass; `deep` also records the snapshot into history.
    ///
    /// Returns the snapshot it computed.
    pub async fn evaluate(&self, deep: bool) -> SystemHealthSnapshot {
        let snapshot = self.registry.capture_snapshot().await;

        let fire = {
            let mut inner = self.inner.lock().await;

            if inner.last_grade != Some(snapshot.grade) {
                let mut ev = Event::now(EventKind::GradeChanged).with_grade(snapshot.grade);
                if let Some(prev) = inner.last_grade {
                    ev = ev.with_detail(prev.as_label());
                }
                self.bus.publish(ev);
            }
            inner.last_grade = Some(snapshot.grade);

            if deep {
                inner.history.push(snapshot.clone());
            }

            let cooled = inner
                .last_emergency
                .map_or(true, |at| at.elapsed() >= self.cfg.emergency_cooldown);
            let fire = snapshot.grade.is_emergency() && cooled;
            if fire {
                inner.last_emergency = Some(Instant::now());
            }
            fire
        };

        if fire {
            self.emergency(&snapshot).await;
        }
        snapshot
    }

    /// Buffered deep-sweep snapshots, oldest first.
    pub async fn history(&self) -> Vec<SystemHealthSnapshot> {
        self.inner.lock().await.history.to_vec()
    }

    /// Mass-recovery pass over every `Unhealthy`/`Error` service.
    async fn emergency(&self, snapshot: &SystemHealthSnapshot) {
        let mut targets: Vec<String> = snapshot
            .names_with_status(ServiceStatus::Unhealthy)
            .into_iter()
            .map(str::to_string)
            .collect();
        targets.extend(
            snapshot
                .names_with_status(ServiceStatus::Error)
                .into_iter()
                .map(str::to_string),
        );

        self.bus.publish(
            Event::now(EventKind::EmergencyTriggered)
                .with_grade(snapshot.grade)
                .with_attempt(targets.len() as u32),
        );

        for name in &targets {
            self.recovery.force_recover(name).await;
        }

        if let Some(alerter) = &self.alerter {
            let alert = Alert::new(
                AlertSeverity::Critical,
                format!(
                    "system health {} ({}/{} running); emergency recovery for {} service(s)",
                    snapshot.grade,
                    snapshot.running,
                    snapshot.registered,
                    targets.len()
                ),
            )
            .with_snapshot(snapshot.clone());
            alerter.send_alert(&alert).await;
        }
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Mutex as StdMutex;
    use std::time::Duration;

    use async_trait::async_trait;
    use tokio::time;

    use super::*;
    use crate::core::builder::SupervisorBuilder;
    use crate::core::supervisor::Supervisor;
    use crate::events::EventKind;
    use crate::policies::{BackoffPolicy, JitterPolicy};
    use crate::services::{HealthReport, RecoveryOutcome, ServiceFn, ServiceSpec};

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
            emergency_cooldown: Duration::from_millis(250),
            snapshot_history: 4,
            bus_capacity: 256,
        }
    }

    struct AlertProbe(StdMutex<Vec<Alert>>);

    #[async_trait]
    impl Alerter for AlertProbe {
        async fn send_alert(&self, alert: &Alert) {
            self.0.lock().unwrap().push(alert.clone());
        }
    }

    fn supervisor() -> Arc<Supervisor> {
        SupervisorBuilder::new(test_config()).build()
    }

    async fn plant(sup: &Arc<Supervisor>, name: &str, status: ServiceStatus) {
        let spec = ServiceSpec::new(
            ServiceFn::new(name.to_string(), || async { HealthReport::healthy() })
                .with_recover(|| async { RecoveryOutcome::succeeded() })
                .arc(),
        );
        sup.register(spec).await.unwrap();
        let entry = sup.registry.get(name).await.unwrap();
        entry.state_mut().await.transition(status);
    }

    #[tokio::test]
    async fn nine_running_one_disabled_grades_excellent() {
        let sup = supervisor();
        for i in 0..9 {
            plant(&sup, &format!("ok-{i}"), ServiceStatus::Running).await;
        }
        plant(&sup, "off", ServiceStatus::Disabled).await;

        let snapshot = sup.aggregator.evaluate(false).await;
        assert_eq!(snapshot.registered, 10);
        assert_eq!(snapshot.running, 9);
        assert_eq!(snapshot.grade, HealthGrade::Excellent);
    }

    #[tokio::test]
    async fn grade_changes_are_published_once() {
        let sup = supervisor();
        let mut rx = sup.bus().subscribe();
        plant(&sup, "up", ServiceStatus::Running).await;

        sup.aggregator.evaluate(false).await;
        sup.aggregator.evaluate(false).await;

        let mut changes = 0;
        while let Ok(ev) = rx.try_recv() {
            if ev.kind == EventKind::GradeChanged {
                changes += 1;
            }
        }
        assert_eq!(changes, 1, "unchanged grade must not re-publish");
    }

    #[tokio::test]
    async fn bad_grade_triggers_emergency_recovery_with_cooldown() {
        let probe = Arc::new(AlertProbe(StdMutex::new(Vec::new())));
        let mut cfg = test_config();
        // long enough that the whole test body fits inside one cooldown
        cfg.emergency_cooldown = Duration::from_secs(10);
        let sup = SupervisorBuilder::new(cfg)
            .with_alerter(Arc::clone(&probe) as Arc<dyn Alerter>)
            .build();
        let mut rx = sup.bus().subscribe();

        // 1 running + 3 unhealthy = 25% -> critical.
        plant(&sup, "up", ServiceStatus::Running).await;
        for i in 0..3 {
            plant(&sup, &format!("down-{i}"), ServiceStatus::Unhealthy).await;
        }

        let snapshot = sup.aggregator.evaluate(true).await;
        assert_eq!(snapshot.grade, HealthGrade::Critical);

        // Emergency forces recovery; the succeed-hooks bring everything back.
        let deadline = time::Instant::now() + Duration::from_secs(2);
        loop {
            let all_up = sup.status().await.running == 4;
            if all_up {
                break;
            }
            assert!(time::Instant::now() < deadline, "emergency never recovered fleet");
            time::sleep(Duration::from_millis(20)).await;
        }

        // Second evaluation inside the cooldown must not re-trigger.
        plant(&sup, "late-down", ServiceStatus::Unhealthy).await;
        for i in 0..12 {
            plant(&sup, &format!("pad-{i}"), ServiceStatus::Stopped).await;
        }
        sup.aggregator.evaluate(false).await;

        time::sleep(Duration::from_millis(100)).await;
        let mut emergencies = 0;
        while let Ok(ev) = rx.try_recv() {
            if ev.kind == EventKind::EmergencyTriggered {
                emergencies += 1;
            }
        }
        assert_eq!(emergencies, 1, "cooldown must gate the second pass");

        let alerts = probe.0.lock().unwrap();
        assert_eq!(alerts.len(), 1);
        assert_eq!(alerts[0].severity, AlertSeverity::Critical);
        assert!(alerts[0].snapshot.is_some());
        assert!(alerts[0].service.is_none(), "system-wide alert has no single service");
    }

    #[tokio::test]
    async fn deep_passes_record_history_shallow_ones_do_not() {
        let sup = supervisor();
        plant(&sup, "up", ServiceStatus::Running).await;

        sup.aggregator.evaluate(false).await;
        assert!(sup.aggregator.history().await.is_empty());

        sup.aggregator.evaluate(true).await;
        sup.aggregator.evaluate(true).await;
        let history = sup.aggregator.history().await;
        assert_eq!(history.len(), 2);

        // Ring buffer keeps the newest `snapshot_history` entries.
        for _ in 0..6 {
            sup.aggregator.evaluate(true).await;
        }
        assert_eq!(sup.aggregator.history().await.len(), 4);
    }
}
