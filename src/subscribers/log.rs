//! Stdout logging subscriber for debugging and demos.
//!
//! Enabled via the `logging` feature. Prints human-readable lines such as:
//!
//! ```text
//! [starting] service=price-feed
//! [check-failed] service=price-feed detail="upstream 502"
//! [recovery-scheduled] service=price-feed attempt=1 delay=2000ms
//! [disabled] service=price-feed detail="recovery exhausted"
//! [grade] degraded (was good)
//! ```
//!
//! Passing checks are deliberately not printed; at a 5s fast cadence they
//! would drown everything else. Implement a custom
//! [`Subscribe`](crate::Subscribe) for structured logging or metrics.

use async_trait::async_trait;

use crate::events::{Event, EventKind};
use crate::subscribers::{Alert, Alerter, Subscribe};

/// Simple stdout logging subscriber.
pub struct LogWriter;

#[async_trait]
impl Subscribe for LogWriter {
    async fn on_event(&self, e: &Event) {
        let svc = e.service.as_deref().unwrap_or("-");
        match e.kind {
            EventKind::ServiceRegistered => println!("[registered] service={svc}"),
            EventKind::ServiceStarting => println!("[starting] service={svc}"),
            EventKind::ServiceStarted => println!("[started] service={svc}"),
            EventKind::ServiceStartTimedOut => {
                println!("[start-timeout] service={svc} timeout_ms={:?}", e.timeout_ms)
            }
            EventKind::ServiceStopped => println!("[stopped] service={svc}"),
            EventKind::ServiceEnabled => println!("[enabled] service={svc}"),
            EventKind::ServiceDisabled => {
                println!("[disabled] service={svc} detail={:?}", e.detail)
            }
            EventKind::HandleExited => {
                println!("[handle-exited] service={svc} detail={:?}", e.detail)
            }
            EventKind::CheckPassed => {}
            EventKind::CheckFailed => {
                println!("[check-failed] service={svc} detail={:?}", e.detail)
            }
            EventKind::CheckTimedOut => {
                println!("[check-timeout] service={svc} timeout_ms={:?}", e.timeout_ms)
            }
            EventKind::RecoveryStarted => {
                println!("[recovery] service={svc} attempt={:?}", e.attempt)
            }
            EventKind::RecoveryFailed => println!(
                "[recovery-failed] service={svc} attempt={:?} detail={:?}",
                e.attempt, e.detail
            ),
            EventKind::RecoverySucceeded => {
                println!("[recovered] service={svc} attempt={:?}", e.attempt)
            }
            EventKind::RecoveryScheduled => println!(
                "[recovery-scheduled] service={svc} attempt={:?} delay_ms={:?}",
                e.attempt, e.delay_ms
            ),
            EventKind::RecoveryExhausted => {
                println!("[recovery-exhausted] service={svc} attempts={:?}", e.attempt)
            }
            EventKind::GradeChanged => {
                println!("[grade] {:?} (was {:?})", e.grade, e.detail)
            }
            EventKind::EmergencyTriggered => {
                println!("[emergency] grade={:?} targets={:?}", e.grade, e.attempt)
            }
            EventKind::ShutdownRequested => println!("[shutdown-requested]"),
            EventKind::AllStoppedWithin => println!("[all-stopped-within-grace]"),
            EventKind::GraceExceeded => println!("[grace-exceeded]"),
            EventKind::LoopHalted => println!("[loop-halted] detail={:?}", e.detail),
            EventKind::SubscriberPanicked => {
                println!("[subscriber-panicked] name={svc} detail={:?}", e.detail)
            }
            EventKind::SubscriberOverflow => {
                println!("[subscriber-overflow] name={svc} detail={:?}", e.detail)
            }
        }
    }

    fn name(&self) -> &'static str {
        "log_writer"
    }
}

/// Stdout alert sink, matching [`LogWriter`] in spirit.
pub struct LogAlerter;

#[async_trait]
impl Alerter for LogAlerter {
    async fn send_alert(&self, alert: &Alert) {
        println!(
            "[alert] severity={} service={:?} message={:?}",
            alert.severity, alert.service, alert.message
        );
    }
}
