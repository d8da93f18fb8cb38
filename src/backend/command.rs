//! # Command backend: workers as re-executed copies of the current binary.
//!
//! Each worker is started as `current_exe <same args>` with [`WORKER_ID_ENV`] set,
//! which is how the child learns it is a worker (see [`CommandBackend::detect_role`]).
//! Listening sockets are expected to be shared through the OS (`SO_REUSEPORT`) and
//! are not passed by this backend.
//!
//! ## Primitives
//! ```text
//! fork        ─► tokio::process::Command::spawn + exit watcher task
//! disconnect  ─► SIGTERM to the worker pid
//! destroy     ─► cancels the watcher token ─► Child::start_kill (SIGKILL)
//! exit        ─► watcher sends ExitNotice { code, signal } on the exits channel
//! ```

use std::collections::HashMap;
use std::env;
use std::ffi::OsString;
use std::io;
use std::path::PathBuf;
use std::process::Stdio;

use nix::sys::signal::{Signal, kill};
use nix::unistd::Pid;
use tokio::process::Command;
use tokio_util::sync::CancellationToken;

use super::{ExitNotice, ExitSender, ProcessBackend, Role, WorkerId};
use crate::error::BackendError;

/// Environment variable carrying the worker id into forked workers.
pub const WORKER_ID_ENV: &str = "HERD_WORKER_ID";

/// Bookkeeping for one spawned child.
struct ChildEntry {
    pid: u32,
    destroy: CancellationToken,
}

/// Production [`ProcessBackend`] built on `tokio::process`.
pub struct CommandBackend {
    program: PathBuf,
    args: Vec<OsString>,
    role: Role,
    children: HashMap<WorkerId, ChildEntry>,
}

impl CommandBackend {
    /// Backend that re-executes the current binary with the current arguments.
    pub fn new() -> io::Result<Self> {
        let program = env::current_exe()?;
        let args = env::args_os().skip(1).collect();
        Ok(Self::with_program(program, args))
    }

    /// Backend that starts `program args..` for every worker.
    pub fn with_program(program: impl Into<PathBuf>, args: Vec<OsString>) -> Self {
        Self {
            program: program.into(),
            args,
            role: Self::detect_role(),
            children: HashMap::new(),
        }
    }

    /// Reads [`WORKER_ID_ENV`]: present and numeric means this process is a worker.
    pub fn detect_role() -> Role {
        env::var(WORKER_ID_ENV)
            .ok()
            .and_then(|raw| raw.parse::<WorkerId>().ok())
            .map_or(Role::Master, Role::Worker)
    }

    fn entry(&self, worker: WorkerId) -> Result<&ChildEntry, BackendError> {
        self.children
            .get(&worker)
            .ok_or(BackendError::UnknownWorker(worker))
    }
}

impl ProcessBackend for CommandBackend {
    fn role(&self) -> Role {
        self.role
    }

    fn fork(&mut self, worker: WorkerId, exits: ExitSender) -> Result<u32, BackendError> {
        let mut child = Command::new(&self.program)
            .args(&self.args)
            .env(WORKER_ID_ENV, worker.get().to_string())
            .stdin(Stdio::null())
            .kill_on_drop(true)
            .spawn()?;
        let pid = child
            .id()
            .ok_or_else(|| io::Error::other("worker exited before its pid was read"))?;

        let destroy = CancellationToken::new();
        let token = destroy.clone();
        tokio::spawn(async move {
            let status = tokio::select! {
                status = child.wait() => status,
                _ = token.cancelled() => {
                    let _ = child.start_kill();
                    child.wait().await
                }
            };
            let notice = match status {
                Ok(status) => ExitNotice::from_status(worker, status),
                // status unavailable
                Err(_) => ExitNotice {
                    worker,
                    code: None,
                    signal: None,
                },
            };
            let _ = exits.send(notice);
        });

        self.children.insert(worker, ChildEntry { pid, destroy });
        Ok(pid)
    }

    fn disconnect(&mut self, worker: WorkerId) -> Result<(), BackendError> {
        let pid = self.entry(worker)?.pid;
        kill(Pid::from_raw(pid as i32), Signal::SIGTERM)
            .map_err(|errno| BackendError::Signal { pid, errno })
    }

    fn destroy(&mut self, worker: WorkerId) -> Result<(), BackendError> {
        self.entry(worker)?.destroy.cancel();
        Ok(())
    }

    fn release(&mut self, worker: WorkerId) {
        self.children.remove(&worker);
    }
}
