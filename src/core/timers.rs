//! # Cancellable one-shot timers that post back into the master loop.
//!
//! ```text
//! arm(worker, kind, T) ──► tokio::spawn ─┬─ sleep(T) elapsed ──► TimerFired ──► master inbox
//!         │                              └─ token cancelled ──► (nothing)
//!         └──► DropGuard (cancel on drop)
//! ```
//!
//! ## Rules
//! - Dropping the guard cancels the timer; cancelling twice is harmless.
//! - A firing may already be queued when the guard is dropped, so the master
//!   validates every [`TimerFired`] against the current worker state.

use std::time::Duration;

use tokio::sync::mpsc;
use tokio_util::sync::{CancellationToken, DropGuard};

use crate::backend::WorkerId;

/// What a timer is guarding.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum TimerKind {
    /// Escalate a graceful stop to a forced destroy.
    Kill,
    /// Promote a replacement that stayed alive for the whole window.
    AliveCheck,
}

/// Message delivered to the master when a timer elapses.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) struct TimerFired {
    pub worker: WorkerId,
    pub kind: TimerKind,
}

/// Timer factory bound to the master's inbox.
pub(crate) struct Timers {
    tx: mpsc::UnboundedSender<TimerFired>,
}

impl Timers {
    /// Creates the factory and the receiving end consumed by the master loop.
    pub fn new() -> (Self, mpsc::UnboundedReceiver<TimerFired>) {
        let (tx, rx) = mpsc::unbounded_channel();
        (Self { tx }, rx)
    }

    /// Arms a timer; the returned guard cancels it when dropped.
    pub fn arm(&self, worker: WorkerId, kind: TimerKind, after: Duration) -> DropGuard {
        let token = CancellationToken::new();
        let cancelled = token.clone();
        let tx = self.tx.clone();

        tokio::spawn(async move {
            tokio::select! {
                _ = cancelled.cancelled() => {}
                _ = tokio::time::sleep(after) => {
                    let _ = tx.send(TimerFired { worker, kind });
                }
            }
        });
        token.drop_guard()
    }
}
