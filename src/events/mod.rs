//! Runtime events: types and broadcast bus.
//!
//! This module groups the event **data model** and the **bus** used to
//! publish/subscribe to events emitted by the master loop, the command backend
//! and subscriber workers.
//!
//! ## Contents
//! - [`EventKind`], [`Event`] event classification and payload metadata
//! - [`Bus`] thin wrapper over `tokio::sync::broadcast`
//!
//! ## Quick reference
//! - **Publishers**: the master loop (spawn, exit routing, reload steps, shutdown),
//!   `SubscriberSet` workers (overflow/panic).
//! - **Consumers**: the subscriber listener (fans out to `SubscriberSet`) and anything
//!   holding a receiver from [`MasterHandle::subscribe`](crate::MasterHandle::subscribe).

mod bus;
mod event;

pub use bus::Bus;
pub use event::{Event, EventKind};
