//! Error types used by the herd master, its backends and worker entry points.
//!
//! - [`RuntimeError`]: errors that end [`Herd::run`](crate::Herd::run).
//! - [`BackendError`]: failures of the [`ProcessBackend`](crate::ProcessBackend) primitives.
//! - [`ReloadError`]: the recoverable failure that aborts a rolling reload.
//! - [`WorkerError`]: errors returned by worker entry points.
//! - [`ConfigError`]: invalid configuration values.
//! - [`ControlError`]: a command could not reach the master loop.
//!
//! The runtime-facing enums provide `as_label` (stable snake_case label) and
//! `as_message` helpers for logs and metrics.

use std::io;
use std::time::Duration;

use thiserror::Error;

use crate::backend::WorkerId;

/// # Errors that terminate the master (or worker) run.
#[non_exhaustive]
#[derive(Error, Debug)]
pub enum RuntimeError {
    /// The backend could not create a worker. The pool is drained before this is returned.
    #[error("failed to spawn worker: {source}")]
    Spawn {
        /// Underlying backend failure.
        #[source]
        source: BackendError,
    },

    /// A signal listener could not be installed.
    #[error("failed to listen for {signal}: {source}")]
    Signal {
        /// Signal name.
        signal: String,
        /// Underlying I/O error.
        #[source]
        source: io::Error,
    },

    /// Shutdown grace period was exceeded; some workers were still registered.
    #[error("shutdown timeout {grace:?} exceeded; stuck: {stuck:?}")]
    GraceExceeded {
        /// The configured grace duration.
        grace: Duration,
        /// Workers that did not exit in time.
        stuck: Vec<WorkerId>,
    },

    /// The worker entry point failed inside a worker process.
    #[error("worker entry point failed: {error}")]
    Worker {
        /// The underlying error message.
        error: String,
    },

    /// Configuration could not be applied.
    #[error(transparent)]
    Config(#[from] ConfigError),
}

impl RuntimeError {
    /// Returns a short stable label (snake_case) for use in logs/metrics.
    ///
    /// # Example
    /// ```
    /// use herd::RuntimeError;
    /// use std::time::Duration;
    ///
    /// let err = RuntimeError::GraceExceeded { grace: Duration::from_secs(5), stuck: vec![] };
    /// assert_eq!(err.as_label(), "runtime_grace_exceeded");
    /// ```
    pub fn as_label(&self) -> &'static str {
        match self {
            RuntimeError::Spawn { .. } => "runtime_spawn_failed",
            RuntimeError::Signal { .. } => "runtime_signal_failed",
            RuntimeError::GraceExceeded { .. } => "runtime_grace_exceeded",
            RuntimeError::Worker { .. } => "runtime_worker_failed",
            RuntimeError::Config(_) => "runtime_config_invalid",
        }
    }

    /// Returns a human-readable message with details about the error.
    pub fn as_message(&self) -> String {
        match self {
            RuntimeError::Spawn { source } => format!("spawn failed: {source}"),
            RuntimeError::Signal { signal, source } => {
                format!("signal {signal} unavailable: {source}")
            }
            RuntimeError::GraceExceeded { grace, stuck } => {
                format!("grace exceeded after {grace:?}; stuck workers={stuck:?}")
            }
            RuntimeError::Worker { error } => format!("worker failed: {error}"),
            RuntimeError::Config(e) => format!("config: {e}"),
        }
    }
}

/// # Failures of the process backend primitives.
#[non_exhaustive]
#[derive(Error, Debug)]
pub enum BackendError {
    /// Creating the worker process failed.
    #[error("fork failed: {0}")]
    Fork(#[from] io::Error),

    /// Delivering a signal to a worker failed.
    #[error("signal delivery to pid {pid} failed: {errno}")]
    Signal {
        /// Target process id.
        pid: u32,
        /// OS error.
        errno: nix::errno::Errno,
    },

    /// The backend has no process for this worker.
    #[error("unknown worker {0}")]
    UnknownWorker(WorkerId),
}

impl BackendError {
    /// Returns a short stable label (snake_case) for use in logs/metrics.
    pub fn as_label(&self) -> &'static str {
        match self {
            BackendError::Fork(_) => "backend_fork_failed",
            BackendError::Signal { .. } => "backend_signal_failed",
            BackendError::UnknownWorker(_) => "backend_unknown_worker",
        }
    }
}

/// # Failure of a rolling reload step.
///
/// Recoverable: it aborts the remaining sequence only. The master keeps running
/// and the pool is topped off.
#[non_exhaustive]
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ReloadError {
    /// The replacement exited inside its alive-check window.
    #[error("replacement {worker} exited during alive check (code={code:?}, signal={signal:?})")]
    ReplacementDied {
        /// The replacement worker.
        worker: WorkerId,
        /// Its exit code.
        code: Option<i32>,
        /// Its terminating signal.
        signal: Option<i32>,
    },
}

impl ReloadError {
    /// Returns a short stable label (snake_case) for use in logs/metrics.
    ///
    /// # Example
    /// ```
    /// use herd::{ReloadError, WorkerId};
    ///
    /// let err = ReloadError::ReplacementDied { worker: WorkerId::new(4), code: Some(1), signal: None };
    /// assert_eq!(err.as_label(), "reload_replacement_died");
    /// ```
    pub fn as_label(&self) -> &'static str {
        match self {
            ReloadError::ReplacementDied { .. } => "reload_replacement_died",
        }
    }
}

/// # Errors returned by worker entry points.
#[non_exhaustive]
#[derive(Error, Debug)]
pub enum WorkerError {
    /// The entry point failed; the worker process exits with a non-zero code.
    #[error("execution failed: {error}")]
    Fail {
        /// The underlying error message.
        error: String,
    },
}

impl WorkerError {
    /// Builds a [`WorkerError::Fail`] from anything displayable.
    pub fn fail(error: impl std::fmt::Display) -> Self {
        WorkerError::Fail {
            error: error.to_string(),
        }
    }
}

/// # Invalid configuration values.
#[non_exhaustive]
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ConfigError {
    /// The restart signal name is not a known OS signal.
    #[error("unknown signal name {0:?}")]
    UnknownSignal(String),
}

/// Error returned by [`MasterHandle`](crate::MasterHandle) commands.
#[derive(Error, Debug, Clone, Copy, PartialEq, Eq)]
pub enum ControlError {
    /// Command queue is full (try again later or use the async variant).
    #[error("control queue full")]
    Full,

    /// The master loop is gone (it finished or was never started).
    #[error("master channel closed")]
    Closed,
}
