//! # Rolling reload session: the sequencing state machine.
//!
//! A [`ReloadSession`] is created per trigger and owns the ordered snapshot of
//! workers to replace. It performs no I/O: the master feeds it events and acts on
//! the [`Action`]s it returns, which keeps "exactly one outstanding step"
//! structural.
//!
//! ```text
//!             advance()
//!   ┌──────────────────────────────┐
//!   ▼                              │
//! [cursor] ── Drain(W) ──► step = Draining(W)
//!                              │ drained(W, W')
//!                              ▼
//!                      step = Probation(W')
//!                     ┌────────┴─────────┐
//!           promoted(W')          replacement_died(W')
//!           cursor += 1                  │
//!           back to advance()      Aborted { processed = cursor + 1 }
//!
//! cursor == snapshot.len() ──► Completed { processed = len }
//! ```
//!
//! ## Rules
//! - Steps run strictly one after another.
//! - Entries that are no longer steady when their turn comes are skipped.
//! - The first failed replacement ends the session; nothing is rolled back.

use crate::backend::WorkerId;
use crate::error::ReloadError;

/// Step currently in flight.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Step {
    /// Waiting for the old worker to exit.
    Draining(WorkerId),
    /// Waiting for the replacement's alive check.
    Probation(WorkerId),
}

/// How a session ended.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) enum ReloadOutcome {
    Completed { processed: usize },
    Aborted { processed: usize, error: ReloadError },
}

/// What the master should do next.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) enum Action {
    /// Start the graceful kill of `worker` (1-based `position` in the snapshot).
    Drain { worker: WorkerId, position: usize },
    /// The session is over.
    Finish(ReloadOutcome),
}

pub(crate) struct ReloadSession {
    snapshot: Vec<WorkerId>,
    cursor: usize,
    step: Option<Step>,
}

impl ReloadSession {
    pub fn new(snapshot: Vec<WorkerId>) -> Self {
        Self {
            snapshot,
            cursor: 0,
            step: None,
        }
    }

    #[cfg(test)]
    pub fn step(&self) -> Option<Step> {
        self.step
    }

    /// Picks the next worker to drain, skipping entries `is_steady` rejects.
    pub fn advance(&mut self, is_steady: impl Fn(WorkerId) -> bool) -> Action {
        while let Some(&worker) = self.snapshot.get(self.cursor) {
            if is_steady(worker) {
                self.step = Some(Step::Draining(worker));
                return Action::Drain {
                    worker,
                    position: self.cursor + 1,
                };
            }
            self.cursor += 1;
        }
        self.step = None;
        Action::Finish(ReloadOutcome::Completed {
            processed: self.snapshot.len(),
        })
    }

    /// The draining worker exited and `replacement` was spawned.
    ///
    /// Returns `false` if `worker` is not the one being drained.
    pub fn drained(&mut self, worker: WorkerId, replacement: WorkerId) -> bool {
        if self.step != Some(Step::Draining(worker)) {
            return false;
        }
        self.step = Some(Step::Probation(replacement));
        true
    }

    /// The replacement passed its alive check; the step succeeded.
    ///
    /// Returns `false` if `replacement` is not on probation for this session.
    pub fn promoted(&mut self, replacement: WorkerId) -> bool {
        if self.step != Some(Step::Probation(replacement)) {
            return false;
        }
        self.step = None;
        self.cursor += 1;
        true
    }

    /// The replacement exited inside its window; the session ends.
    ///
    /// Returns `None` if `replacement` is not on probation for this session.
    pub fn replacement_died(
        &mut self,
        replacement: WorkerId,
        code: Option<i32>,
        signal: Option<i32>,
    ) -> Option<ReloadOutcome> {
        if self.step != Some(Step::Probation(replacement)) {
            return None;
        }
        self.step = None;
        Some(ReloadOutcome::Aborted {
            processed: self.cursor + 1,
            error: ReloadError::ReplacementDied {
                worker: replacement,
                code,
                signal,
            },
        })
    }
}
