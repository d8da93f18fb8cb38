//! # herd
//!
//! **Herd** keeps a pool of worker processes alive and replaces them one at a
//! time on a restart signal, so the service never drops below one worker short
//! of full strength.
//!
//! ## Architecture
//! ```text
//!                      ┌─────────────────────────────────────────┐
//!  restart signal ───► │  Master loop (single task)              │
//!  SIGTERM/INT/QUIT ─► │  - WorkerRegistry (state = exit route)  │ ──► Bus ──► SubscriberSet
//!  MasterHandle ─────► │  - ReloadSession (one step in flight)   │             (LogWriter, ...)
//!                      │  - Timers (kill / alive check)          │
//!                      └──────┬──────────────────────▲───────────┘
//!                 fork / disconnect / destroy        │ ExitNotice
//!                             ▼                      │
//!                      ┌─────────────────────────────┴───────────┐
//!                      │  ProcessBackend (CommandBackend, ...)   │
//!                      └──────┬──────────────┬──────────────┬────┘
//!                             ▼              ▼              ▼
//!                         worker-1       worker-2       worker-N
//!                      (Handler::start) (Handler::start) ...
//! ```
//!
//! ### Rolling reload
//! ```text
//! snapshot = steady workers in spawn order
//! for W in snapshot:
//!   ├─ W: Steady → Draining, graceful kill (disconnect, destroy after T)
//!   ├─ W exits → spawn W' in Probation, arm alive check T
//!   │    ├─ alive check fires → W' promoted to Steady, next W
//!   │    └─ W' exits first   → ReloadAborted, stop the sequence
//! top off: spawn (size − live) fresh workers
//! ```
//!
//! ## Features
//! | Area              | Description                                             | Key types / traits                         |
//! |-------------------|---------------------------------------------------------|--------------------------------------------|
//! | **Entry point**   | Run either role from the same binary.                   | [`Herd`], [`HerdBuilder`]                  |
//! | **Control**       | Trigger reloads / shutdown, read events, tune settings. | [`MasterHandle`], [`Settings`]             |
//! | **Workers**       | Code that runs inside each worker process.              | [`Handler`], [`HandlerFn`]                 |
//! | **Processes**     | How workers are created, stopped and observed.          | [`ProcessBackend`], [`CommandBackend`]     |
//! | **Events**        | Everything the master does, as a stream.                | [`Event`], [`EventKind`], [`Subscribe`]    |
//! | **Errors**        | Typed errors for the master, reloads and workers.       | [`RuntimeError`], [`ReloadError`]          |
//!
//! ## Example
//! ```rust,no_run
//! use std::sync::Arc;
//! use tokio_util::sync::CancellationToken;
//! use herd::{Config, HandlerFn, Herd, LogWriter, Subscribe, WorkerError};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let subs: Vec<Arc<dyn Subscribe>> = vec![Arc::new(LogWriter::new())];
//!
//!     let herd = Herd::builder(Config { size: 2, ..Config::default() })
//!         .with_subscribers(subs)
//!         .with_handler(HandlerFn::arc(|ctx: CancellationToken| async move {
//!             // serve until asked to stop
//!             ctx.cancelled().await;
//!             Ok::<_, WorkerError>(())
//!         }))
//!         .build();
//!
//!     herd.run().await?;
//!     Ok(())
//! }
//! ```

mod backend;
mod core;
mod error;
mod events;
mod handler;
mod subscribers;

// ---- Public re-exports ----

pub use backend::{
    CommandBackend, ExitNotice, ExitSender, ProcessBackend, Role, WORKER_ID_ENV, WorkerId,
};
pub use self::core::{
    Config, Herd, HerdBuilder, MasterHandle, ReloadAdmission, Settings, parse_signal,
    wait_for_shutdown_signal,
};
pub use error::{BackendError, ConfigError, ControlError, ReloadError, RuntimeError, WorkerError};
pub use events::{Bus, Event, EventKind};
pub use handler::{BoxHandlerFuture, Handler, HandlerFn, HandlerRef, NoopHandler};
pub use subscribers::{LogWriter, Subscribe, SubscriberSet};
