//! # healvisor
//!
//! **Healvisor** is a self-healing service supervisor for async Rust.
//!
//! It discovers a set of independently-failing background services, starts
//! them in priority order, polls their health on several cadences, and
//! automatically recovers or disables them on repeated failure. The crate is
//! a building block: monitored services stay external collaborators that
//! only implement a health probe (and, optionally, a recovery hook).
//!
//! ## Architecture
//! ### Overview
//! ```text
//!     ┌───────────────┐   ┌───────────────┐   ┌───────────────┐
//!     │  ServiceSpec  │   │  ServiceSpec  │   │  ServiceSpec  │
//!     │ (price feed)  │   │  (seo bot)    │   │ (gsc bridge)  │
//!     └───────┬───────┘   └───────┬───────┘   └───────┬───────┘
//!             ▼                   ▼                   ▼
//! ┌──────────────────────────────────────────────────────────────────┐
//! │  Supervisor (facade)                                             │
//! │  - Registry (arena of per-service state + single-flight locks)   │
//! │  - LifecycleManager (owns execution handles, all transitions)    │
//! │  - HealthScheduler (fast / regular / deep probe cadences)        │
//! │  - RecoveryCoordinator (threshold, backoff, disable-on-exhaust)  │
//! │  - HealthAggregator (grade, snapshots, emergency recovery)       │
//! └───────┬──────────────────────────────────────────────┬───────────┘
//!         │ publishes Events                             │ alerts
//!         ▼                                              ▼
//! ┌──────────────────────────┐                  ┌─────────────────────┐
//! │  Bus (broadcast channel) │                  │  Alerter capability │
//! └───────────┬──────────────┘                  │  (webhook, chat...) │
//!             ▼                                 └─────────────────────┘
//!      SubscriberSet ──► per-subscriber queues ──► on_event()
//! ```
//!
//! ### Service lifecycle
//! ```text
//! Stopped ──start──► Starting ──ready──► Running
//!                       │                   │ health check fails
//!                       └─timeout─► Error   ▼
//!                                       Unhealthy ── threshold crossed ──┐
//!                                           ▲                            ▼
//!                                           │ attempt fails,        Recovering
//!                                           │ backoff 2s·2ⁿ              │
//!                                           └────────────────────────────┤
//!                            success: Running, counters reset ◄──────────┤
//!                            attempts exhausted: Disabled + alert ◄──────┘
//! ```
//!
//! ## Features
//! | Area            | Description                                          | Key types                                   |
//! |-----------------|------------------------------------------------------|---------------------------------------------|
//! | **Services**    | Define supervised units as traits or closures.       | [`Service`], [`ServiceFn`], [`ServiceSpec`] |
//! | **Supervision** | Priority startup, probing, recovery, shutdown.       | [`Supervisor`], [`Config`]                  |
//! | **Policies**    | Exponential backoff with optional jitter.            | [`BackoffPolicy`], [`JitterPolicy`]         |
//! | **Health**      | Aggregate grading and snapshot history.              | [`HealthGrade`], [`SystemHealthSnapshot`]   |
//! | **Observers**   | Event fan-out and the alert boundary.                | [`Subscribe`], [`Alerter`], [`Event`]       |
//! | **Errors**      | Typed control-surface and service errors.            | [`SupervisorError`], [`ServiceError`]       |
//!
//! ## Optional features
//! - `logging`: exports the stdout [`LogWriter`] subscriber and
//!   [`LogAlerter`] _(demo/reference only)_.
//!
//! ## Example
//! ```no_run
//! use std::time::Duration;
//! use healvisor::{Config, HealthReport, ServiceFn, ServiceKind, ServiceSpec, Supervisor};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let mut cfg = Config::default();
//!     cfg.regular_interval = Duration::from_secs(10);
//!
//!     let sup = Supervisor::builder(cfg).build();
//!
//!     sup.register(
//!         ServiceSpec::new(
//!             ServiceFn::new("price-feed", || async {
//!                 // probe the poller; trivially healthy here
//!                 HealthReport::healthy()
//!             })
//!             .arc(),
//!         )
//!         .with_kind(ServiceKind::Worker)
//!         .with_priority(1)
//!         .with_critical(true),
//!     )
//!     .await?;
//!
//!     // Starts everything in priority order, monitors until SIGTERM/ctrl-c,
//!     // then shuts down gracefully.
//!     sup.run().await?;
//!     Ok(())
//! }
//! ```

mod core;
mod error;
mod events;
mod health;
mod policies;
mod services;
mod subscribers;

// ---- Public re-exports ----

pub use self::core::{Config, ServiceFilter, Supervisor, SupervisorBuilder};
pub use error::{ServiceError, SupervisorError};
pub use events::{Bus, Event, EventKind};
pub use health::{HealthGrade, ServiceSnapshot, SnapshotHistory, SystemHealthSnapshot};
pub use policies::{BackoffPolicy, JitterPolicy};
pub use services::{
    HealthReport, RecoveryOutcome, Service, ServiceFn, ServiceKind, ServiceRef, ServiceSpec,
    ServiceState, ServiceStatus,
};
pub use subscribers::{Alert, AlertSeverity, Alerter, Subscribe, SubscriberSet};

// Optional: stdout log subscriber / alert sink (demo/reference).
// Enable with: `--features logging`
#[cfg(feature = "logging")]
pub use subscribers::{LogAlerter, LogWriter};
