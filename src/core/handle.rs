//! # Handle for controlling a running master from other tasks.
//!
//! [`MasterHandle`] is the programmatic counterpart of the OS signals: the signal
//! forwarders installed by [`Herd::run`](crate::Herd::run) use it too.
//!
//! ```text
//! MasterHandle::reload()   ──┐
//! restart signal forwarder ──┼──► mpsc<Control> ──► master loop
//! MasterHandle::shutdown() ──┤
//! termination forwarder    ──┘
//! ```

use tokio::sync::{broadcast, mpsc};

use super::config::Settings;
use crate::error::ControlError;
use crate::events::{Bus, Event};

/// Command delivered to the master loop.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Control {
    /// Start a rolling reload (subject to the admission policy).
    Reload,
    /// Drain the pool and stop the master.
    Shutdown,
}

/// Cloneable handle to a master started by [`Herd::run`](crate::Herd::run).
///
/// Obtained from [`Herd::handle`](crate::Herd::handle) before the master runs,
/// so commands may be queued ahead of startup.
#[derive(Clone, Debug)]
pub struct MasterHandle {
    tx: mpsc::Sender<Control>,
    bus: Bus,
    settings: Settings,
}

impl MasterHandle {
    pub(crate) fn new(tx: mpsc::Sender<Control>, bus: Bus, settings: Settings) -> Self {
        Self { tx, bus, settings }
    }

    /// Requests a rolling reload, waiting for queue space.
    pub async fn reload(&self) -> Result<(), ControlError> {
        self.send(Control::Reload).await
    }

    /// Requests a rolling reload without waiting.
    pub fn try_reload(&self) -> Result<(), ControlError> {
        self.tx.try_send(Control::Reload).map_err(|e| match e {
            mpsc::error::TrySendError::Full(_) => ControlError::Full,
            mpsc::error::TrySendError::Closed(_) => ControlError::Closed,
        })
    }

    /// Requests a graceful shutdown of the pool.
    pub async fn shutdown(&self) -> Result<(), ControlError> {
        self.send(Control::Shutdown).await
    }

    /// Subscribes to runtime events published after this call.
    pub fn subscribe(&self) -> broadcast::Receiver<Event> {
        self.bus.subscribe()
    }

    /// Live settings read by the master.
    pub fn settings(&self) -> &Settings {
        &self.settings
    }

    async fn send(&self, cmd: Control) -> Result<(), ControlError> {
        self.tx.send(cmd).await.map_err(|_| ControlError::Closed)
    }
}
