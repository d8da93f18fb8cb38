//! # Subscriber trait
//!
//! `Subscribe` is the extension point for reacting to master events (logging,
//! metrics, alerting on aborted reloads). Each subscriber is driven by its own
//! worker task fed by a bounded queue owned by the
//! [`SubscriberSet`](crate::subscribers::SubscriberSet).
//!
//! ## Contract
//! - Implementations may be slow; they never block the master loop nor other
//!   subscribers.
//! - When a subscriber's queue is full the event is **dropped** for that
//!   subscriber and a `SubscriberOverflow` event is published.

use crate::events::Event;
use async_trait::async_trait;

/// Contract for event subscribers.
#[async_trait]
pub trait Subscribe: Send + Sync + 'static {
    /// Handles a single event.
    async fn on_event(&self, event: &Event);

    /// Name used in overflow/panic reports.
    fn name(&self) -> &'static str {
        std::any::type_name::<Self>()
    }

    /// Capacity of this subscriber's queue (min 1).
    fn queue_capacity(&self) -> usize {
        1024
    }
}
