//! Minimal supervision: two services, priority-ordered startup, stdout logs.
//!
//! ```bash
//! cargo run --example basic --features logging
//! ```

use std::sync::Arc;
use std::time::Duration;

use healvisor::{
    Config, HealthReport, LogWriter, ServiceFn, ServiceKind, ServiceSpec, Subscribe, Supervisor,
};

#[tokio::main(flavor = "current_thread")]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let mut cfg = Config::default();
    cfg.fast_interval = Duration::from_secs(2);
    cfg.regular_interval = Duration::from_secs(5);

    let subs: Vec<Arc<dyn Subscribe>> = vec![Arc::new(LogWriter)];
    let sup = Supervisor::builder(cfg).with_subscribers(subs).build();

    sup.register(
        ServiceSpec::new(
            ServiceFn::new("config-store", || async { HealthReport::healthy() }).arc(),
        )
        .with_kind(ServiceKind::Worker)
        .with_priority(1),
    )
    .await?;

    sup.register(
        ServiceSpec::new(
            ServiceFn::new("price-feed", || async { HealthReport::healthy() }).arc(),
        )
        .with_kind(ServiceKind::Monitor)
        .with_priority(2)
        .with_critical(true)
        .with_dependencies(["config-store"]),
    )
    .await?;

    // Starts config-store before price-feed, probes until ctrl-c, then
    // stops everything gracefully.
    sup.run().await?;
    Ok(())
}
