//! # Runtime events emitted by the master loop.
//!
//! The [`EventKind`] enum classifies event types across four categories:
//! - **Worker lifecycle**: spawn, exit, promotion, graceful stop, forced kill
//! - **Rolling reload**: requested, started, skipped/queued, completed, aborted, top-off
//! - **Shutdown**: requested, drained within grace, grace exceeded
//! - **Subscriber health**: overflow, panic
//!
//! The [`Event`] struct carries additional metadata such as timestamps, worker id,
//! OS pid, exit status and counters.
//!
//! ## Ordering guarantees
//! Each event has a globally unique sequence number (`seq`) that increases monotonically.
//!
//! ## Example
//! ```rust
//! use std::time::Duration;
//! use herd::{Event, EventKind, WorkerId};
//!
//! let ev = Event::new(EventKind::KillTimeoutHit)
//!     .with_worker(WorkerId::new(3))
//!     .with_timeout(Duration::from_secs(3));
//!
//! assert_eq!(ev.kind, EventKind::KillTimeoutHit);
//! assert_eq!(ev.worker, Some(WorkerId::new(3)));
//! assert_eq!(ev.timeout_ms, Some(3000));
//! ```

use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering as AtomicOrdering};
use std::time::{Duration, SystemTime};

use crate::backend::{ExitNotice, WorkerId};

/// Global sequence counter for event ordering.
static EVENT_SEQ: AtomicU64 = AtomicU64::new(0);

/// Classification of runtime events.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EventKind {
    // === Subscriber events ===
    /// Subscriber panicked during event processing.
    ///
    /// Sets:
    /// - `reason`: subscriber name and panic message
    SubscriberPanicked,

    /// Subscriber dropped an event (queue full or worker closed).
    ///
    /// Sets:
    /// - `reason`: subscriber name and drop reason ("full", "closed")
    SubscriberOverflow,

    // === Worker lifecycle ===
    /// A worker process was forked and registered.
    ///
    /// Sets:
    /// - `worker`: new worker id
    /// - `pid`: OS process id reported by the backend
    WorkerSpawned,

    /// The backend could not fork a worker. The master drains and stops.
    ///
    /// Sets:
    /// - `worker`: id that was reserved for the worker
    /// - `reason`: backend error
    SpawnFailed,

    /// A worker process exited.
    ///
    /// Sets:
    /// - `worker`: worker id
    /// - `exit_code` / `exit_signal`: how it exited
    /// - `reason`: route that handled the exit ("crash", "drained", "probation", "stopped")
    WorkerExited,

    /// Graceful stop (disconnect) was requested and the kill timer armed.
    ///
    /// Sets:
    /// - `worker`: worker id
    /// - `timeout_ms`: kill timeout
    StopRequested,

    /// Worker ignored the graceful stop for the whole kill timeout; it is destroyed.
    ///
    /// Sets:
    /// - `worker`: worker id
    /// - `timeout_ms`: kill timeout that elapsed
    KillTimeoutHit,

    /// A replacement survived its alive-check window and joined the steady pool.
    ///
    /// Sets:
    /// - `worker`: promoted worker id
    WorkerPromoted,

    // === Rolling reload ===
    /// Restart trigger received (signal or handle).
    ReloadRequested,

    /// Reload trigger ignored because a session is already active.
    ReloadSkipped,

    /// Reload trigger remembered; it runs after the active session ends.
    ReloadQueued,

    /// A reload session started.
    ///
    /// Sets:
    /// - `count`: number of workers in the snapshot
    ReloadStarted,

    /// A worker is being replaced by the active session.
    ///
    /// Sets:
    /// - `worker`: worker being drained
    /// - `count`: 1-based position in the snapshot
    ReloadStep,

    /// Every snapshot entry was processed successfully.
    ///
    /// Sets:
    /// - `count`: number of snapshot entries processed
    ReloadCompleted,

    /// The session stopped on the first failed replacement.
    ///
    /// Sets:
    /// - `worker`: replacement that died
    /// - `count`: number of snapshot entries processed (including the failed one)
    /// - `reason`: error message
    ReloadAborted,

    /// Fresh workers spawned after a session to restore the desired size.
    ///
    /// Sets:
    /// - `count`: number of workers spawned
    TopOff,

    // === Shutdown events ===
    /// Shutdown requested (OS signal or handle).
    ShutdownRequested,

    /// All workers exited within the configured grace period.
    AllStoppedWithin,

    /// Grace period exceeded; some workers did not exit in time.
    GraceExceeded,
}

/// Runtime event with optional metadata.
///
/// - `seq`: monotonic global sequence for ordering
/// - `at`: wall-clock timestamp (for logs)
/// - other optional fields are set depending on the [`EventKind`]
#[derive(Clone, Debug)]
pub struct Event {
    /// Globally unique, monotonically increasing sequence number.
    pub seq: u64,
    /// Wall-clock timestamp.
    pub at: SystemTime,
    /// Event classification.
    pub kind: EventKind,

    /// Worker the event refers to, if applicable.
    pub worker: Option<WorkerId>,
    /// OS process id of the worker.
    pub pid: Option<u32>,
    /// Exit code (absent when the process was terminated by a signal).
    pub exit_code: Option<i32>,
    /// Terminating signal number.
    pub exit_signal: Option<i32>,
    /// Timeout in milliseconds (compact).
    pub timeout_ms: Option<u32>,
    /// Counter payload (snapshot size, position, spawned workers).
    pub count: Option<u32>,
    /// Human-readable reason (errors, overflow details, exit route).
    pub reason: Option<Arc<str>>,
}

impl Event {
    /// Creates a new event of the given kind with current timestamp and next sequence number.
    pub fn new(kind: EventKind) -> Self {
        Self {
            seq: EVENT_SEQ.fetch_add(1, AtomicOrdering::Relaxed),
            at: SystemTime::now(),
            kind,
            worker: None,
            pid: None,
            exit_code: None,
            exit_signal: None,
            timeout_ms: None,
            count: None,
            reason: None,
        }
    }

    /// Attaches a worker id.
    #[inline]
    pub fn with_worker(mut self, worker: WorkerId) -> Self {
        self.worker = Some(worker);
        self
    }

    /// Attaches an OS process id.
    #[inline]
    pub fn with_pid(mut self, pid: u32) -> Self {
        self.pid = Some(pid);
        self
    }

    /// Attaches the worker id and exit status of an exit notice.
    #[inline]
    pub fn with_exit(mut self, notice: &ExitNotice) -> Self {
        self.worker = Some(notice.worker);
        self.exit_code = notice.code;
        self.exit_signal = notice.signal;
        self
    }

    /// Attaches a timeout duration (stored as milliseconds).
    #[inline]
    pub fn with_timeout(mut self, d: Duration) -> Self {
        let ms = d.as_millis().min(u128::from(u32::MAX)) as u32;
        self.timeout_ms = Some(ms);
        self
    }

    /// Attaches a counter.
    #[inline]
    pub fn with_count(mut self, n: usize) -> Self {
        self.count = Some(u32::try_from(n).unwrap_or(u32::MAX));
        self
    }

    /// Attaches a human-readable reason.
    #[inline]
    pub fn with_reason(mut self, reason: impl Into<Arc<str>>) -> Self {
        self.reason = Some(reason.into());
        self
    }

    /// True when the exit carried in this event was clean (code 0, no signal).
    #[inline]
    pub fn is_clean_exit(&self) -> bool {
        self.exit_signal.is_none() && self.exit_code.unwrap_or(0) == 0
    }

    /// Creates a subscriber overflow event.
    #[inline]
    pub fn subscriber_overflow(subscriber: &'static str, reason: &'static str) -> Self {
        Event::new(EventKind::SubscriberOverflow)
            .with_reason(format!("subscriber={subscriber} reason={reason}"))
    }

    /// Creates a subscriber panic event.
    #[inline]
    pub fn subscriber_panicked(subscriber: &'static str, info: String) -> Self {
        Event::new(EventKind::SubscriberPanicked)
            .with_reason(format!("subscriber={subscriber} info={info}"))
    }
}
