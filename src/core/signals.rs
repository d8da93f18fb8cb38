//! # OS signal handling.
//!
//! - [`wait_for_shutdown_signal`] completes on `SIGINT`, `SIGTERM` or `SIGQUIT`.
//! - [`forward_restart`] turns every delivery of the restart signal into
//!   [`MasterHandle::reload`].
//! - [`forward_shutdown`] turns the first termination signal into
//!   [`MasterHandle::shutdown`].
//! - [`StopSignals`] installs a set of listeners up front, so registration
//!   errors surface before anything waits on them.
//!
//! Forwarders stop when their token is cancelled.

use futures::future::select_all;
use nix::sys::signal::Signal;
use tokio::signal::unix::{SignalKind, signal};
use tokio_util::sync::CancellationToken;

use super::handle::MasterHandle;
use crate::error::RuntimeError;

/// Waits for a termination signal.
///
/// Each call creates independent signal listeners.
///
/// Returns `Ok(())` when any signal is received, or `Err` if signal registration fails.
pub async fn wait_for_shutdown_signal() -> std::io::Result<()> {
    let mut sigint = signal(SignalKind::interrupt())?;
    let mut sigterm = signal(SignalKind::terminate())?;
    let mut sigquit = signal(SignalKind::quit())?;

    tokio::select! {
        _ = sigint.recv()  => {},
        _ = sigterm.recv() => {},
        _ = sigquit.recv() => {},
    }
    Ok(())
}

/// Installs a listener for `sig`.
pub(crate) fn listen(sig: Signal) -> Result<tokio::signal::unix::Signal, RuntimeError> {
    signal(SignalKind::from_raw(sig as i32)).map_err(|source| RuntimeError::Signal {
        signal: sig.as_str().to_string(),
        source,
    })
}

/// Signals that ask a process to terminate.
pub(crate) const TERMINATION: [Signal; 3] = [Signal::SIGINT, Signal::SIGTERM, Signal::SIGQUIT];

/// Installed listeners for a fixed set of signals.
pub(crate) struct StopSignals {
    streams: Vec<tokio::signal::unix::Signal>,
}

impl StopSignals {
    /// Installs one listener per signal; fails on the first that cannot be installed.
    pub(crate) fn install(signals: &[Signal]) -> Result<Self, RuntimeError> {
        let streams = signals
            .iter()
            .map(|&sig| listen(sig))
            .collect::<Result<Vec<_>, _>>()?;
        Ok(Self { streams })
    }

    /// Completes on the first delivery of any installed signal.
    pub(crate) async fn recv(&mut self) {
        if self.streams.is_empty() {
            return std::future::pending().await;
        }
        let pending = self.streams.iter_mut().map(|s| Box::pin(s.recv()));
        select_all(pending).await;
    }
}

/// Forwards the restart signal to the master as reload requests.
pub(crate) fn forward_restart(
    sig: Signal,
    handle: MasterHandle,
    token: CancellationToken,
) -> Result<(), RuntimeError> {
    let mut stream = listen(sig)?;
    tokio::spawn(async move {
        loop {
            tokio::select! {
                _ = token.cancelled() => break,
                got = stream.recv() => {
                    if got.is_none() || handle.reload().await.is_err() {
                        break;
                    }
                }
            }
        }
    });
    Ok(())
}

/// Forwards the first termination signal to the master as a shutdown request.
pub(crate) fn forward_shutdown(
    handle: MasterHandle,
    token: CancellationToken,
) -> Result<(), RuntimeError> {
    let mut signals = StopSignals::install(&TERMINATION)?;
    tokio::spawn(async move {
        tokio::select! {
            _ = token.cancelled() => {}
            _ = signals.recv() => {
                let _ = handle.shutdown().await;
            }
        }
    });
    Ok(())
}
