//! # Process backend: the OS seam of the supervisor.
//!
//! The master never touches processes directly. It drives a [`ProcessBackend`]
//! that can:
//! - **fork** a worker and later report its exit as an [`ExitNotice`],
//! - **disconnect** a worker (graceful stop request),
//! - **destroy** a worker (forced termination),
//! - tell which [`Role`] the current process plays.
//!
//! ```text
//! master loop ── fork(id, exits) ──► backend ──► OS process
//!      ▲                                            │
//!      └──────────── ExitNotice { id, code, sig } ◄─┘ (exits channel)
//! ```
//!
//! [`CommandBackend`] is the production implementation; tests plug in scripted ones.

mod command;

use std::fmt;
use std::process::ExitStatus;
use std::str::FromStr;

use tokio::sync::mpsc;

use crate::error::BackendError;

pub use command::{CommandBackend, WORKER_ID_ENV};

/// Identity of one worker process, unique for the lifetime of the master.
///
/// Ids are assigned in spawn order and never reused, so a stale timer or exit
/// notice can always be told apart from a fresh worker.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct WorkerId(u64);

impl WorkerId {
    /// Wraps a raw id.
    pub const fn new(raw: u64) -> Self {
        Self(raw)
    }

    /// Returns the raw id.
    pub const fn get(self) -> u64 {
        self.0
    }
}

impl fmt::Display for WorkerId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "worker-{}", self.0)
    }
}

impl FromStr for WorkerId {
    type Err = std::num::ParseIntError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        s.trim().parse::<u64>().map(WorkerId)
    }
}

/// Exit notification delivered by the backend to the master.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ExitNotice {
    /// Worker that exited.
    pub worker: WorkerId,
    /// Exit code, absent when terminated by a signal.
    pub code: Option<i32>,
    /// Terminating signal number.
    pub signal: Option<i32>,
}

impl ExitNotice {
    /// Builds a notice from an OS exit status.
    pub fn from_status(worker: WorkerId, status: ExitStatus) -> Self {
        use std::os::unix::process::ExitStatusExt;

        Self {
            worker,
            code: status.code(),
            signal: status.signal(),
        }
    }

    /// Clean exit: code 0 and no terminating signal.
    pub fn is_clean(&self) -> bool {
        self.signal.is_none() && self.code.unwrap_or(0) == 0
    }
}

/// Sending half of the exit notification channel handed to [`ProcessBackend::fork`].
pub type ExitSender = mpsc::UnboundedSender<ExitNotice>;

/// Role of the current process inside the pool.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Role {
    /// Pool owner: spawns, supervises and reloads workers.
    Master,
    /// Forked worker running the entry point.
    Worker(WorkerId),
}

/// OS primitives used by the master.
///
/// All methods are called from the single master loop; implementations need no
/// internal locking for master-side state.
pub trait ProcessBackend: Send + 'static {
    /// Role of the calling process.
    fn role(&self) -> Role;

    /// Forks a worker identified by `worker` and returns its OS pid.
    ///
    /// Exactly one [`ExitNotice`] for `worker` must eventually be sent on `exits`.
    fn fork(&mut self, worker: WorkerId, exits: ExitSender) -> Result<u32, BackendError>;

    /// Asks the worker to stop gracefully.
    fn disconnect(&mut self, worker: WorkerId) -> Result<(), BackendError>;

    /// Forcibly terminates the worker.
    fn destroy(&mut self, worker: WorkerId) -> Result<(), BackendError>;

    /// Called once the master has processed the worker's exit.
    fn release(&mut self, _worker: WorkerId) {}
}
