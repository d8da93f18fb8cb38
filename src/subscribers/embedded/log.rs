//! # LogWriter: renders events through `tracing`
//!
//! Levels:
//! - `info`: lifecycle (spawn, promote, reload progress, shutdown)
//! - `warn`: abnormal exits, forced kills, aborted reloads, subscriber trouble
//! - `error`: spawn failures, grace exceeded
//!
//! ## Example output (with `tracing_subscriber::fmt`)
//! ```text
//! INFO herd: worker spawned worker=worker-4 pid=4242
//! INFO herd: reload step worker=worker-1 position=1
//! INFO herd: stop requested worker=worker-1 timeout_ms=3000
//! INFO herd: worker exited worker=worker-1 route="drained" code=Some(0) signal=None
//! WARN herd: kill timeout hit, destroying worker=worker-2 timeout_ms=3000
//! WARN herd: reload aborted processed=2 reason="replacement worker-5 exited during alive check (code=Some(1), signal=None)"
//! ```

use async_trait::async_trait;
use tracing::{debug, error, info, warn};

use crate::events::{Event, EventKind};
use crate::subscribers::Subscribe;

/// Event writer subscriber.
#[derive(Default)]
pub struct LogWriter;

impl LogWriter {
    /// Construct a new [`LogWriter`].
    #[must_use]
    pub fn new() -> Self {
        Self
    }
}

#[async_trait]
impl Subscribe for LogWriter {
    async fn on_event(&self, e: &Event) {
        let worker = e.worker.map(|w| w.to_string()).unwrap_or_default();
        let reason = e.reason.as_deref().unwrap_or("");

        match e.kind {
            EventKind::WorkerSpawned => {
                info!(target: "herd", worker = %worker, pid = ?e.pid, "worker spawned");
            }
            EventKind::SpawnFailed => {
                error!(target: "herd", worker = %worker, reason, "spawn failed");
            }
            EventKind::WorkerExited => {
                if e.is_clean_exit() {
                    info!(target: "herd", worker = %worker, route = reason, code = ?e.exit_code, signal = ?e.exit_signal, "worker exited");
                } else {
                    warn!(target: "herd", worker = %worker, route = reason, code = ?e.exit_code, signal = ?e.exit_signal, "worker exited abnormally");
                }
            }
            EventKind::StopRequested => {
                info!(target: "herd", worker = %worker, timeout_ms = ?e.timeout_ms, reason, "stop requested");
            }
            EventKind::KillTimeoutHit => {
                warn!(target: "herd", worker = %worker, timeout_ms = ?e.timeout_ms, "kill timeout hit, destroying");
            }
            EventKind::WorkerPromoted => {
                info!(target: "herd", worker = %worker, "replacement promoted");
            }
            EventKind::ReloadRequested => {
                info!(target: "herd", "reload requested");
            }
            EventKind::ReloadSkipped => {
                info!(target: "herd", "reload already running, trigger skipped");
            }
            EventKind::ReloadQueued => {
                info!(target: "herd", "reload already running, trigger queued");
            }
            EventKind::ReloadStarted => {
                info!(target: "herd", workers = ?e.count, "reload started");
            }
            EventKind::ReloadStep => {
                info!(target: "herd", worker = %worker, position = ?e.count, "reload step");
            }
            EventKind::ReloadCompleted => {
                info!(target: "herd", processed = ?e.count, "reload completed");
            }
            EventKind::ReloadAborted => {
                warn!(target: "herd", processed = ?e.count, reason, "reload aborted");
            }
            EventKind::TopOff => {
                if e.count.unwrap_or(0) > 0 {
                    info!(target: "herd", spawned = ?e.count, "pool topped off");
                } else {
                    debug!(target: "herd", "pool at desired size");
                }
            }
            EventKind::ShutdownRequested => {
                info!(target: "herd", "shutdown requested");
            }
            EventKind::AllStoppedWithin => {
                info!(target: "herd", "all workers stopped within grace");
            }
            EventKind::GraceExceeded => {
                error!(target: "herd", grace_ms = ?e.timeout_ms, stuck = ?e.count, "grace exceeded");
            }
            EventKind::SubscriberOverflow => {
                warn!(target: "herd", reason, "subscriber overflow");
            }
            EventKind::SubscriberPanicked => {
                warn!(target: "herd", reason, "subscriber panicked");
            }
        }
    }

    fn name(&self) -> &'static str {
        "LogWriter"
    }
}
