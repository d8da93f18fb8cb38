//! # Worker entry point abstraction.
//!
//! A [`Handler`] is invoked **once per worker process**, right after the fork and
//! before the worker installs its signal listeners. It receives a
//! [`CancellationToken`] that is cancelled when the worker is asked to stop
//! gracefully (restart signal, SIGTERM from the master, Ctrl-C).
//!
//! ## Contract
//! - `Ok(())` returned early: the worker stays up idle until asked to stop.
//! - `Err(_)`: the worker process exits with a non-zero code.
//! - After cancellation the handler has the configured timeout to return before
//!   the worker forces its own exit.

use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;

use tokio_util::sync::CancellationToken;

use crate::error::WorkerError;

/// Boxed future returned by [`Handler::start`].
pub type BoxHandlerFuture = Pin<Box<dyn Future<Output = Result<(), WorkerError>> + Send + 'static>>;

/// Shared handle to a worker entry point.
pub type HandlerRef = Arc<dyn Handler>;

/// # Worker entry point.
///
/// # Example
/// ```
/// use tokio_util::sync::CancellationToken;
/// use herd::{BoxHandlerFuture, Handler};
///
/// struct Serve;
///
/// impl Handler for Serve {
///     fn start(&self, ctx: CancellationToken) -> BoxHandlerFuture {
///         Box::pin(async move {
///             ctx.cancelled().await;
///             Ok(())
///         })
///     }
/// }
/// ```
pub trait Handler: Send + Sync + 'static {
    /// Starts the worker's work and returns the future driving it.
    ///
    /// Called exactly once per worker process.
    fn start(&self, ctx: CancellationToken) -> BoxHandlerFuture;
}

/// Entry point that returns immediately; the worker then idles until stopped.
#[derive(Debug, Default, Clone, Copy)]
pub struct NoopHandler;

impl Handler for NoopHandler {
    fn start(&self, _ctx: CancellationToken) -> BoxHandlerFuture {
        Box::pin(async { Ok(()) })
    }
}
