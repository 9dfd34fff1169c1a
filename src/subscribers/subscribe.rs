//! Subscriber trait.
//!
//! [`Subscribe`] is the extension point for plugging observers (logging,
//! metrics, audit trails) into the runtime. Each subscriber is driven by a
//! dedicated worker fed from a bounded queue owned by the
//! [`SubscriberSet`](crate::subscribers::SubscriberSet), so a slow
//! subscriber never blocks publishers or its peers; on overflow its events
//! are dropped and reported.

use async_trait::async_trait;

use crate::events::Event;

/// Contract for event subscribers.
///
/// Invoked from the subscriber's dedicated worker task; implementations
/// should prefer async I/O over blocking the runtime.
#[async_trait]
pub trait Subscribe: Send + Sync + 'static {
    /// Handles a single event.
    async fn on_event(&self, event: &Event);

    /// Human-readable name for logs and fault events.
    fn name(&self) -> &'static str {
        std::any::type_name::<Self>()
    }

    /// Preferred capacity of this subscriber's queue; events are dropped
    /// (and reported) on overflow.
    fn queue_capacity(&self) -> usize {
        1024
    }
}
