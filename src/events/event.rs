//! Runtime events emitted by the supervisor, scheduler, and recovery loops.
//!
//! [`EventKind`] classifies events across five categories:
//! - **Lifecycle**: registration and start/stop/enable/disable transitions
//! - **Checks**: health-probe results and timeouts
//! - **Recovery**: attempt scheduling, outcomes, exhaustion
//! - **Aggregate**: grade changes and emergency passes
//! - **Runtime**: shutdown progress and subscriber faults
//!
//! Every event carries a globally unique, monotonically increasing `seq`;
//! use it to restore order when events are observed out of order.

use std::sync::atomic::{AtomicU64, Ordering as AtomicOrdering};
use std::sync::Arc;
use std::time::{Duration, SystemTime};

use crate::health::HealthGrade;
use crate::services::ServiceStatus;

/// Global sequence counter for event ordering.
static EVENT_SEQ: AtomicU64 = AtomicU64::new(0);

/// Classification of runtime events.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EventKind {
    // === Lifecycle ===
    /// Service registered. Sets `service`.
    ServiceRegistered,
    /// Start issued; waiting for readiness. Sets `service`.
    ServiceStarting,
    /// Readiness probe passed. Sets `service`.
    ServiceStarted,
    /// Readiness probe did not pass within the start timeout. Sets
    /// `service`, `timeout_ms`.
    ServiceStartTimedOut,
    /// Operator stop completed. Sets `service`.
    ServiceStopped,
    /// Disabled service re-armed. Sets `service`.
    ServiceEnabled,
    /// Service disabled (operator action or recovery exhaustion). Sets
    /// `service`, optionally `detail`.
    ServiceDisabled,
    /// Execution handle exited on its own before any stop was issued. Sets
    /// `service`, optionally `detail` (the error, when it failed).
    HandleExited,

    // === Checks ===
    /// Health probe passed. Sets `service`.
    CheckPassed,
    /// Health probe failed. Sets `service`, `detail`.
    CheckFailed,
    /// Health probe exceeded its timeout (counted as failed). Sets
    /// `service`, `timeout_ms`.
    CheckTimedOut,

    // === Recovery ===
    /// Recovery attempt starting. Sets `service`, `attempt`.
    RecoveryStarted,
    /// Recovery attempt failed. Sets `service`, `attempt`, `detail`.
    RecoveryFailed,
    /// Recovery attempt restored the service. Sets `service`, `attempt`.
    RecoverySucceeded,
    /// Next attempt scheduled after backoff. Sets `service`, `attempt`,
    /// `delay_ms`.
    RecoveryScheduled,
    /// Retry budget spent; service disabled. Sets `service`, `attempt`.
    RecoveryExhausted,

    // === Aggregate ===
    /// Aggregate grade moved. Sets `grade`, `detail` (previous grade label).
    GradeChanged,
    /// Emergency recovery pass launched. Sets `grade`, `attempt` (number of
    /// services targeted).
    EmergencyTriggered,

    // === Runtime ===
    /// Shutdown initiated (signal or explicit call).
    ShutdownRequested,
    /// Every service stopped within the shutdown grace.
    AllStoppedWithin,
    /// Shutdown grace exceeded; remaining handles aborted.
    GraceExceeded,
    /// A scheduling loop hit a fatal error and halted (others keep running).
    /// Sets `detail`.
    LoopHalted,
    /// Subscriber panicked while handling an event. Sets `service`
    /// (subscriber name), `detail`.
    SubscriberPanicked,
    /// Subscriber queue dropped an event. Sets `service` (subscriber name),
    /// `detail`.
    SubscriberOverflow,
}

/// Runtime event with optional metadata.
///
/// `seq` is a monotonic global sequence; `at` is wall-clock for logs. The
/// optional fields are populated per [`EventKind`].
#[derive(Debug, Clone)]
pub struct Event {
    /// Globally unique, monotonically increasing sequence number.
    pub seq: u64,
    /// Wall-clock timestamp.
    pub at: SystemTime,
    /// Event classification.
    pub kind: EventKind,

    /// Service (or subscriber) name, if applicable.
    pub service: Option<Arc<str>>,
    /// Human-readable detail (failure reasons, previous grade, ...).
    pub detail: Option<Arc<str>>,
    /// Recovery attempt number (1-based) or emergency target count.
    pub attempt: Option<u32>,
    /// Backoff delay in milliseconds.
    pub delay_ms: Option<u32>,
    /// Timeout in milliseconds.
    pub timeout_ms: Option<u32>,
    /// Status after a transition, when one happened.
    pub status: Option<ServiceStatus>,
    /// Aggregate grade, for aggregate events.
    pub grade: Option<HealthGrade>,
}

impl Event {
    /// Creates an event of the given kind, stamped with the current time and
    /// the next global sequence number.
    pub fn now(kind: EventKind) -> Self {
        Self {
            seq: EVENT_SEQ.fetch_add(1, AtomicOrdering::Relaxed),
            at: SystemTime::now(),
            kind,
            service: None,
            detail: None,
            attempt: None,
            delay_ms: None,
            timeout_ms: None,
            status: None,
            grade: None,
        }
    }

    /// Attaches a service (or subscriber) name.
    #[inline]
    pub fn with_service(mut self, service: impl Into<Arc<str>>) -> Self {
        self.service = Some(service.into());
        self
    }

    /// Attaches a human-readable detail.
    #[inline]
    pub fn with_detail(mut self, detail: impl Into<Arc<str>>) -> Self {
        self.detail = Some(detail.into());
        self
    }

    /// Attaches an attempt number.
    #[inline]
    pub fn with_attempt(mut self, attempt: u32) -> Self {
        self.attempt = Some(attempt);
        self
    }

    /// Attaches a backoff delay (stored as milliseconds).
    #[inline]
    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay_ms = Some(delay.as_millis().min(u128::from(u32::MAX)) as u32);
        self
    }

    /// Attaches a timeout (stored as milliseconds).
    #[inline]
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout_ms = Some(timeout.as_millis().min(u128::from(u32::MAX)) as u32);
        self
    }

    /// Attaches the post-transition status.
    #[inline]
    pub fn with_status(mut self, status: ServiceStatus) -> Self {
        self.status = Some(status);
        self
    }

    /// Attaches an aggregate grade.
    #[inline]
    pub fn with_grade(mut self, grade: HealthGrade) -> Self {
        self.grade = Some(grade);
        self
    }

    /// Creates a subscriber-overflow event.
    #[inline]
    pub fn subscriber_overflow(subscriber: &'static str, reason: &'static str) -> Self {
        Event::now(EventKind::SubscriberOverflow)
            .with_service(subscriber)
            .with_detail(reason)
    }

    /// Creates a subscriber-panic event.
    #[inline]
    pub fn subscriber_panicked(subscriber: &'static str, info: String) -> Self {
        Event::now(EventKind::SubscriberPanicked)
            .with_service(subscriber)
            .with_detail(info)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sequence_is_monotonic() {
        let a = Event::now(EventKind::CheckPassed);
        let b = Event::now(EventKind::CheckFailed);
        assert!(b.seq > a.seq);
    }

    #[test]
    fn builders_populate_fields() {
        let ev = Event::now(EventKind::RecoveryScheduled)
            .with_service("oracle")
            .with_attempt(2)
            .with_delay(Duration::from_millis(400))
            .with_detail("probe failed");

        assert_eq!(ev.service.as_deref(), Some("oracle"));
        assert_eq!(ev.attempt, Some(2));
        assert_eq!(ev.delay_ms, Some(400));
        assert_eq!(ev.detail.as_deref(), Some("probe failed"));
    }
}
