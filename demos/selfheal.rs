//! Self-healing walkthrough: a service that breaks itself every few checks
//! and is restored by its recovery hook.
//!
//! ```bash
//! cargo run --example selfheal --features logging
//! ```
//!
//! Watch the event log: check failures accumulate to the threshold, a
//! recovery attempt fires, the service comes back, counters reset.

use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Arc;
use std::time::Duration;

use healvisor::{
    Config, HealthReport, LogAlerter, LogWriter, RecoveryOutcome, ServiceFn, ServiceSpec,
    Subscribe, Supervisor,
};

#[tokio::main(flavor = "current_thread")]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let mut cfg = Config::default();
    cfg.fast_interval = Duration::from_secs(1);
    cfg.regular_interval = Duration::from_secs(3);
    cfg.failure_threshold = 2;
    cfg.max_retries = 3;

    let subs: Vec<Arc<dyn Subscribe>> = vec![Arc::new(LogWriter)];
    let sup = Supervisor::builder(cfg)
        .with_subscribers(subs)
        .with_alerter(Arc::new(LogAlerter))
        .build();

    // Fails every 4th and 5th probe; the recovery hook "repairs" it by
    // resetting the counter.
    let ticks = Arc::new(AtomicU32::new(0));
    let probe_ticks = Arc::clone(&ticks);
    let repair_ticks = Arc::clone(&ticks);

    sup.register(
        ServiceSpec::new(
            ServiceFn::new("gremlin", move || {
                let ticks = Arc::clone(&probe_ticks);
                async move {
                    let n = ticks.fetch_add(1, Ordering::SeqCst) % 6;
                    if n == 4 || n == 5 {
                        HealthReport::unhealthy("gremlin chewed a cable")
                    } else {
                        HealthReport::healthy()
                    }
                }
            })
            .with_recover(move || {
                let ticks = Arc::clone(&repair_ticks);
                async move {
                    ticks.store(0, Ordering::SeqCst);
                    RecoveryOutcome::succeeded()
                }
            })
            .arc(),
        )
        .with_critical(true),
    )
    .await?;

    sup.run().await?;
    Ok(())
}
