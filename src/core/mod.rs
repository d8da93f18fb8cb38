//! Runtime core: the master loop and everything around it.
//!
//! The public API from this module is [`Herd`] (with [`HerdBuilder`]),
//! [`MasterHandle`], [`Config`] / [`Settings`] and [`ReloadAdmission`].
//!
//! Internal modules:
//! - [`master`]: single-task event loop owning the pool, exit routing, shutdown;
//! - [`registry`]: live workers and their exit-route state;
//! - [`reload`]: rolling reload sequencing state machine;
//! - [`timers`]: cancellable kill / alive-check timers;
//! - [`signals`]: OS signal listeners and forwarders;
//! - [`worker`]: worker-side bootstrap and graceful self-stop.

mod admission;
mod builder;
mod config;
mod handle;
mod herd;
mod master;
mod registry;
mod reload;
mod signals;
mod timers;
mod worker;

pub use admission::ReloadAdmission;
pub use builder::HerdBuilder;
pub use config::{Config, Settings, parse_signal};
pub use handle::MasterHandle;
pub use herd::Herd;
pub use signals::wait_for_shutdown_signal;
