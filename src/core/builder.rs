//! Builder wiring the supervisor runtime together.

use std::sync::atomic::AtomicBool;
use std::sync::Arc;

use tokio_util::sync::CancellationToken;

use crate::core::aggregator::HealthAggregator;
use crate::core::config::Config;
use crate::core::lifecycle::LifecycleManager;
use crate::core::recovery::RecoveryCoordinator;
use crate::core::registry::Registry;
use crate::core::scheduler::HealthScheduler;
use crate::core::supervisor::Supervisor;
use crate::events::Bus;
use crate::subscribers::{Alerter, Subscribe, SubscriberSet};

/// Builder for a [`Supervisor`].
///
/// Must be called inside a tokio runtime: subscriber workers are spawned at
/// build time.
pub struct SupervisorBuilder {
    cfg: Config,
    subscribers: Vec<Arc<dyn Subscribe>>,
    alerter: Option<Arc<dyn Alerter>>,
}

impl SupervisorBuilder {
    /// Creates a builder over the given configuration.
    pub fn new(cfg: Config) -> Self {
        Self {
            cfg,
            subscribers: Vec::new(),
            alerter: None,
        }
    }

    /// Sets event subscribers (logging, metrics, audit).
    pub fn with_subscribers(mut self, subscribers: Vec<Arc<dyn Subscribe>>) -> Self {
        self.subscribers = subscribers;
        self
    }

    /// Adds one event subscriber.
    pub fn with_subscriber(mut self, subscriber: Arc<dyn Subscribe>) -> Self {
        self.subscribers.push(subscriber);
        self
    }

    /// Sets the external alerting collaborator.
    pub fn with_alerter(mut self, alerter: Arc<dyn Alerter>) -> Self {
        self.alerter = Some(alerter);
        self
    }

    /// Wires and returns the supervisor.
    pub fn build(self) -> Arc<Supervisor> {
        let cfg = Arc::new(self.cfg);
        let bus = Bus::new(cfg.bus_capacity_clamped());
        let subs = Arc::new(SubscriberSet::new(self.subscribers, bus.clone()));
        let runtime_token = CancellationToken::new();

        let registry = Arc::new(Registry::new());
        let lifecycle = Arc::new(LifecycleManager::new(
            Arc::clone(&registry),
            bus.clone(),
            Arc::clone(&cfg),
            runtime_token.clone(),
        ));
        let recovery = Arc::new(RecoveryCoordinator::new(
            Arc::clone(&registry),
            Arc::clone(&lifecycle),
            bus.clone(),
            Arc::clone(&cfg),
            self.alerter.clone(),
            runtime_token.clone(),
        ));
        let aggregator = Arc::new(HealthAggregator::new(
            Arc::clone(&registry),
            Arc::clone(&recovery),
            bus.clone(),
            Arc::clone(&cfg),
            self.alerter,
        ));
        let scheduler = Arc::new(HealthScheduler::new(
            Arc::clone(&registry),
            Arc::clone(&lifecycle),
            Arc::clone(&recovery),
            Arc::clone(&aggregator),
            bus.clone(),
            Arc::clone(&cfg),
        ));

        Arc::new(Supervisor {
            cfg,
            bus,
            registry,
            lifecycle,
            recovery,
            aggregator,
            scheduler,
            subs,
            runtime_token,
            monitoring: AtomicBool::new(false),
        })
    }
}
