//! # Event subscribers.
//!
//! Everything the master does is published as an [`Event`](crate::Event) on the
//! [`Bus`](crate::Bus). Subscribers are the pluggable consumers of that stream.
//!
//! ## Architecture
//! ```text
//!   Master loop ── publish(Event) ──► Bus ──► subscriber_listener ──► SubscriberSet::emit
//!                                                                   ┌──────┼──────┐
//!                                                                   ▼      ▼      ▼
//!                                                               LogWriter Metrics Custom
//! ```
//!
//! ## Implementing custom subscribers
//! ```no_run
//! use herd::{Event, EventKind, Subscribe};
//! use async_trait::async_trait;
//!
//! struct ReloadAlerts;
//!
//! #[async_trait]
//! impl Subscribe for ReloadAlerts {
//!     async fn on_event(&self, event: &Event) {
//!         if event.kind == EventKind::ReloadAborted {
//!             // page someone
//!         }
//!     }
//!     fn name(&self) -> &'static str { "reload-alerts" }
//! }
//! ```

mod embedded;
mod subscribe;
mod subscriber_set;

pub use embedded::LogWriter;
pub use subscribe::Subscribe;
pub use subscriber_set::SubscriberSet;
