//! # Worker-side bootstrap.
//!
//! Runs inside a worker process:
//! 1. start the entry point exactly once with a fresh [`CancellationToken`];
//! 2. listen for stop requests (restart signal, `SIGTERM`, `SIGINT`, `SIGQUIT`);
//! 3. on a stop request cancel the token and give the entry point `timeout` to
//!    return, else force the process to exit.
//!
//! ```text
//! handler.start(token) ──► work ─┬─ Ok  ──► idle until stop ──► Stopped
//!                                └─ Err ──► Failed (non-zero exit)
//! stop request ──► token.cancel() ──► work returns within T ──► Stopped
//!                                 └─► T elapsed ──────────────► Forced (exit 1)
//! ```

use std::future::Future;
use std::time::Duration;

use futures::future::BoxFuture;
use tokio_util::sync::CancellationToken;

use super::config::Settings;
use super::signals::{StopSignals, TERMINATION};
use crate::backend::WorkerId;
use crate::error::{RuntimeError, WorkerError};
use crate::handler::HandlerRef;

/// How a worker's serve loop ended.
#[derive(Debug)]
pub(crate) enum WorkerExit {
    /// Stopped on request and the entry point returned in time.
    Stopped,
    /// The entry point ignored cancellation for the whole timeout.
    Forced,
    /// The entry point returned an error.
    Failed(WorkerError),
}

/// Runs the worker role to completion.
pub(crate) async fn run_worker(
    id: WorkerId,
    handler: HandlerRef,
    settings: Settings,
) -> Result<(), RuntimeError> {
    let cfg = settings.snapshot();

    let stop: BoxFuture<'static, ()> = if cfg.handle_signals {
        let mut wanted = vec![cfg.restart_signal()?];
        wanted.extend(TERMINATION);
        let mut signals = StopSignals::install(&wanted)?;
        Box::pin(async move { signals.recv().await })
    } else {
        Box::pin(std::future::pending())
    };

    let token = CancellationToken::new();
    let work = handler.start(token.clone());

    match serve(work, stop, &token, cfg.timeout).await {
        WorkerExit::Stopped => Ok(()),
        WorkerExit::Forced => {
            tracing::warn!(worker = %id, timeout = ?cfg.timeout, "entry point ignored stop, forcing exit");
            std::process::exit(1)
        }
        WorkerExit::Failed(e) => Err(RuntimeError::Worker {
            error: e.to_string(),
        }),
    }
}

/// Drives the entry point against a stop request.
pub(crate) async fn serve<W, S>(
    work: W,
    stop: S,
    token: &CancellationToken,
    timeout: Duration,
) -> WorkerExit
where
    W: Future<Output = Result<(), WorkerError>>,
    S: Future<Output = ()>,
{
    tokio::pin!(work);
    tokio::pin!(stop);

    let finished = tokio::select! {
        res = &mut work => Some(res),
        _ = &mut stop => None,
    };
    if let Some(res) = finished {
        if let Err(e) = res {
            return WorkerExit::Failed(e);
        }
        stop.await;
        return WorkerExit::Stopped;
    }

    token.cancel();
    match tokio::time::timeout(timeout, work).await {
        Ok(Ok(())) => WorkerExit::Stopped,
        Ok(Err(e)) => WorkerExit::Failed(e),
        Err(_elapsed) => WorkerExit::Forced,
    }
}
