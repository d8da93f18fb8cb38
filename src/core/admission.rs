//! # Reload admission policy
//!
//! At most one rolling reload runs at a time. When another trigger arrives while
//! a session is active, the admission policy decides what to do with it.
//!
//! ## Variants
//! - `DropIfRunning`: **ignore** the trigger (reported as `ReloadSkipped`).
//! - `Queue`: **remember** one pending trigger (reported as `ReloadQueued`); it starts
//!   a new session right after the active one ends. Repeated triggers coalesce.
//!
//! ## Invariants
//! - Reload sessions never overlap.
//! - An in-flight session is never cancelled by a new trigger.

/// Policy controlling reload triggers received during an active reload.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Default)]
pub enum ReloadAdmission {
    /// Skip the trigger if a reload is already running (default).
    ///
    /// Use when:
    /// - The running reload already picks up the new code/config
    /// - Operators tend to send the signal more than once
    #[default]
    DropIfRunning,

    /// Run one more reload after the active one.
    ///
    /// Use when:
    /// - A deploy may land while a previous reload is still rolling
    /// - Every trigger must be followed by a reload that started after it
    Queue,
}
