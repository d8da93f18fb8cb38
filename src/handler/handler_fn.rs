//! # Function-backed handler (`HandlerFn`)
//!
//! [`HandlerFn`] wraps a closure `F: Fn(CancellationToken) -> Fut`. The closure runs
//! synchronously inside [`Handler::start`], so any setup it does happens before
//! the worker installs its signal listeners.
//!
//! ## Example
//! ```rust
//! use tokio_util::sync::CancellationToken;
//! use herd::{HandlerFn, HandlerRef, WorkerError};
//!
//! let h: HandlerRef = HandlerFn::arc(|ctx: CancellationToken| async move {
//!     ctx.cancelled().await;
//!     Ok::<_, WorkerError>(())
//! });
//! # let _ = h;
//! ```

use std::future::Future;
use std::sync::Arc;

use tokio_util::sync::CancellationToken;

use super::handler::{BoxHandlerFuture, Handler};
use crate::error::WorkerError;

/// Function-backed handler implementation.
#[derive(Debug, Clone)]
pub struct HandlerFn<F> {
    f: F,
}

impl<F> HandlerFn<F> {
    /// Creates a new function-backed handler.
    pub fn new(f: F) -> Self {
        Self { f }
    }

    /// Creates the handler and returns it as a shared handle.
    pub fn arc(f: F) -> Arc<Self> {
        Arc::new(Self::new(f))
    }
}

impl<F, Fut> Handler for HandlerFn<F>
where
    F: Fn(CancellationToken) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = Result<(), WorkerError>> + Send + 'static,
{
    fn start(&self, ctx: CancellationToken) -> BoxHandlerFuture {
        Box::pin((self.f)(ctx))
    }
}
