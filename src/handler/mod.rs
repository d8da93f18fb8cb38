//! # Worker entry points.
//!
//! - [`Handler`] - trait implemented by worker entry points
//! - [`HandlerFn`] - closure-backed handler
//! - [`HandlerRef`] - shared reference to a handler (`Arc<dyn Handler>`)
//! - [`NoopHandler`] - default entry point that does nothing

mod handler;
mod handler_fn;

pub use handler::{BoxHandlerFuture, Handler, HandlerRef, NoopHandler};
pub use handler_fn::HandlerFn;
