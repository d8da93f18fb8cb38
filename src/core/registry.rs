//! # Worker registry: the master's live set of worker processes.
//!
//! Owned by the master loop and mutated only there:
//! - spawn → `insert`
//! - exit notice → `remove` (possibly followed by the insert of a replacement)
//!
//! ## Exit routing
//! Every worker carries exactly one [`WorkerState`]; the state *is* the exit route,
//! so a worker can never have two exit handlers (double respawn) or none (silent drop).
//! ```text
//!  spawn ──► Steady ──(reload step)──► Draining ──exit──► replacement spawned
//!              ▲                                              │
//!              └──────── promote (alive check passed) ◄── Probation ──exit──► reload aborted
//!  any state ──(shutdown)──► Stopping ──exit──► removed, no respawn
//! ```
//!
//! ## Rules
//! - Ids are allocated here, in spawn order, and never reused.
//! - Enumeration follows id order, i.e. spawn order.

use std::collections::BTreeMap;

use tokio_util::sync::DropGuard;

use crate::backend::WorkerId;

/// Lifecycle state of a worker, which doubles as its exit route.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum WorkerState {
    /// Serving; an exit is a crash and is respawned.
    Steady,
    /// Being replaced by a reload; an exit spawns its replacement.
    Draining,
    /// Replacement inside its alive-check window; an exit aborts the reload.
    Probation,
    /// Being stopped for shutdown; an exit just removes it.
    Stopping,
}

impl WorkerState {
    /// Stable label used in events.
    pub fn as_label(self) -> &'static str {
        match self {
            WorkerState::Steady => "crash",
            WorkerState::Draining => "drained",
            WorkerState::Probation => "probation",
            WorkerState::Stopping => "stopped",
        }
    }
}

/// One live or transitioning worker.
pub(crate) struct WorkerProcess {
    pub id: WorkerId,
    pub pid: u32,
    pub state: WorkerState,
    /// Armed while a graceful stop is pending.
    pub kill_timer: Option<DropGuard>,
    /// Armed while the worker is on probation.
    pub alive_timer: Option<DropGuard>,
}

impl WorkerProcess {
    pub fn new(id: WorkerId, pid: u32, state: WorkerState) -> Self {
        Self {
            id,
            pid,
            state,
            kill_timer: None,
            alive_timer: None,
        }
    }
}

/// Registry of live workers keyed by id.
#[derive(Default)]
pub(crate) struct WorkerRegistry {
    workers: BTreeMap<WorkerId, WorkerProcess>,
    last_id: u64,
}

impl WorkerRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Reserves the next worker id.
    pub fn next_id(&mut self) -> WorkerId {
        self.last_id += 1;
        WorkerId::new(self.last_id)
    }

    pub fn insert(&mut self, worker: WorkerProcess) {
        self.workers.insert(worker.id, worker);
    }

    /// Removes a worker; its timers are cancelled when the returned value drops.
    pub fn remove(&mut self, id: WorkerId) -> Option<WorkerProcess> {
        self.workers.remove(&id)
    }

    pub fn get_mut(&mut self, id: WorkerId) -> Option<&mut WorkerProcess> {
        self.workers.get_mut(&id)
    }

    pub fn state(&self, id: WorkerId) -> Option<WorkerState> {
        self.workers.get(&id).map(|w| w.state)
    }

    pub fn is_steady(&self, id: WorkerId) -> bool {
        self.state(id) == Some(WorkerState::Steady)
    }

    pub fn len(&self) -> usize {
        self.workers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.workers.is_empty()
    }

    /// All worker ids in spawn order.
    pub fn ids(&self) -> Vec<WorkerId> {
        self.workers.keys().copied().collect()
    }

    /// Ids of steady workers in spawn order (the reload snapshot).
    pub fn steady_ids(&self) -> Vec<WorkerId> {
        self.workers
            .values()
            .filter(|w| w.state == WorkerState::Steady)
            .map(|w| w.id)
            .collect()
    }
}
