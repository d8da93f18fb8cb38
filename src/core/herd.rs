//! # Herd: entry point for both the master and the worker role.
//!
//! The same binary runs in two roles, decided by the backend:
//! - **master**: keeps `size` workers alive, performs rolling reloads on the
//!   restart signal, drains the pool on shutdown;
//! - **worker**: runs the configured [`Handler`](crate::Handler) until told to stop.
//!
//! ## Master wiring
//! ```text
//! Herd::run()
//!   ├─ parse restart signal (fail early on unknown names)
//!   ├─ subscriber_listener: Bus.subscribe() ─► SubscriberSet::emit(&Event)
//!   ├─ forward_restart: restart signal ─► MasterHandle::reload()
//!   ├─ forward_shutdown: SIGINT/SIGTERM/SIGQUIT ─► MasterHandle::shutdown()
//!   └─ Master::run(): spawn pool, route exits, reload, drain
//!        └─ on return: cancel forwarders, flush subscribers
//! ```
//!
//! ## Example
//! ```rust,no_run
//! use std::time::Duration;
//! use tokio_util::sync::CancellationToken;
//! use herd::{Config, HandlerFn, Herd, WorkerError};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let cfg = Config {
//!         size: 4,
//!         timeout: Duration::from_secs(3),
//!         ..Config::default()
//!     };
//!
//!     let herd = Herd::builder(cfg)
//!         .with_handler(HandlerFn::arc(|ctx: CancellationToken| async move {
//!             ctx.cancelled().await;
//!             Ok::<_, WorkerError>(())
//!         }))
//!         .build();
//!
//!     herd.run().await?;
//!     Ok(())
//! }
//! ```

use std::sync::Arc;

use tokio::sync::{broadcast::error::RecvError, mpsc};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

use super::builder::HerdBuilder;
use super::config::{Config, Settings};
use super::handle::{Control, MasterHandle};
use super::master::Master;
use super::signals::{forward_restart, forward_shutdown};
use super::worker::run_worker;
use crate::backend::{CommandBackend, ProcessBackend, Role};
use crate::error::{BackendError, RuntimeError};
use crate::events::Bus;
use crate::handler::HandlerRef;
use crate::subscribers::{Subscribe, SubscriberSet};

/// A configured pool, ready to run in whichever role this process has.
pub struct Herd {
    settings: Settings,
    bus: Bus,
    subscribers: Vec<Arc<dyn Subscribe>>,
    handler: HandlerRef,
    backend: Option<Box<dyn ProcessBackend>>,
    control_tx: mpsc::Sender<Control>,
    control_rx: mpsc::Receiver<Control>,
}

impl Herd {
    /// Creates a builder.
    pub fn builder(cfg: Config) -> HerdBuilder {
        HerdBuilder::new(cfg)
    }

    pub(super) fn new_internal(
        settings: Settings,
        bus: Bus,
        subscribers: Vec<Arc<dyn Subscribe>>,
        handler: HandlerRef,
        backend: Option<Box<dyn ProcessBackend>>,
        control_tx: mpsc::Sender<Control>,
        control_rx: mpsc::Receiver<Control>,
    ) -> Self {
        Self {
            settings,
            bus,
            subscribers,
            handler,
            backend,
            control_tx,
            control_rx,
        }
    }

    /// Returns a handle for controlling the master once it runs.
    pub fn handle(&self) -> MasterHandle {
        MasterHandle::new(
            self.control_tx.clone(),
            self.bus.clone(),
            self.settings.clone(),
        )
    }

    /// Live settings shared with the master.
    pub fn settings(&self) -> &Settings {
        &self.settings
    }

    /// Role of this process.
    pub fn role(&self) -> Role {
        match &self.backend {
            Some(backend) => backend.role(),
            None => CommandBackend::detect_role(),
        }
    }

    /// Runs this process's role to completion.
    ///
    /// - master: returns after shutdown (`Ok`, or [`RuntimeError::GraceExceeded`])
    ///   or after a spawn failure ([`RuntimeError::Spawn`], pool already drained);
    /// - worker: returns once the entry point stopped on request, or with
    ///   [`RuntimeError::Worker`] if it failed.
    pub async fn run(self) -> Result<(), RuntimeError> {
        let Herd {
            settings,
            bus,
            subscribers,
            handler,
            backend,
            control_tx,
            control_rx,
        } = self;

        let backend: Box<dyn ProcessBackend> = match backend {
            Some(backend) => backend,
            None => Box::new(CommandBackend::new().map_err(|e| RuntimeError::Spawn {
                source: BackendError::Fork(e),
            })?),
        };

        match backend.role() {
            Role::Worker(id) => run_worker(id, handler, settings).await,
            Role::Master => {
                let handle = MasterHandle::new(control_tx, bus.clone(), settings.clone());
                run_master(backend, settings, bus, subscribers, handle, control_rx).await
            }
        }
    }
}

async fn run_master(
    backend: Box<dyn ProcessBackend>,
    settings: Settings,
    bus: Bus,
    subscribers: Vec<Arc<dyn Subscribe>>,
    handle: MasterHandle,
    control_rx: mpsc::Receiver<Control>,
) -> Result<(), RuntimeError> {
    let cfg = settings.snapshot();
    let restart = cfg.restart_signal()?;

    let token = CancellationToken::new();
    let listener = subscriber_listener(&bus, subscribers, token.clone());

    if cfg.handle_signals {
        let forwarded = forward_restart(restart, handle.clone(), token.clone())
            .and_then(|()| forward_shutdown(handle.clone(), token.clone()));
        if let Err(e) = forwarded {
            token.cancel();
            let _ = listener.await;
            return Err(e);
        }
    }
    drop(handle);

    let (master, inbox) = Master::new(backend, settings, bus, control_rx);
    let res = master.run(inbox).await;

    token.cancel();
    let _ = listener.await;
    res
}

/// Forwards bus events to the subscriber set until `token` is cancelled.
///
/// Already-published events are delivered before the listener stops.
fn subscriber_listener(
    bus: &Bus,
    subscribers: Vec<Arc<dyn Subscribe>>,
    token: CancellationToken,
) -> JoinHandle<()> {
    let mut rx = bus.subscribe();
    let set = SubscriberSet::new(subscribers, bus.clone());

    tokio::spawn(async move {
        loop {
            tokio::select! {
                biased;
                ev = rx.recv() => match ev {
                    Ok(ev) => set.emit(&ev),
                    Err(RecvError::Lagged(_)) => continue,
                    Err(RecvError::Closed) => break,
                },
                _ = token.cancelled() => break,
            }
        }
        set.shutdown().await;
    })
}
