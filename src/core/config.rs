//! # Pool configuration.
//!
//! [`Config`] holds the plain values; [`Settings`] is the shared, mutable view of
//! them that the master reads **at the point of use**:
//! - `size` when the pool is started and when it is topped off after a reload,
//! - `timeout` whenever a kill timer or an alive-check timer is armed,
//! - `admission` when a reload trigger arrives,
//! - `signal` once, when the master (or a worker) installs its listeners.
//!
//! ## Sentinel values
//! - `size = 0` → host CPU count
//! - `bus_capacity = 0` → clamped to 1

use std::str::FromStr;
use std::sync::{Arc, RwLock, RwLockReadGuard, RwLockWriteGuard};
use std::time::Duration;

use nix::sys::signal::Signal;

use super::admission::ReloadAdmission;
use crate::error::ConfigError;

/// Configuration for the pool master.
///
/// ## Field semantics
/// - `size`: desired number of workers (`0` = number of CPUs)
/// - `timeout`: kill timeout and alive-check window for replacements
/// - `signal`: name of the OS signal that triggers a rolling reload
/// - `grace`: how long shutdown waits for all workers to exit
/// - `bus_capacity`: event bus ring buffer size (min 1)
/// - `admission`: what a reload trigger does while a reload is running
/// - `handle_signals`: install OS signal listeners (disable for embedding and tests)
#[derive(Clone, Debug)]
pub struct Config {
    /// Desired number of workers.
    pub size: usize,
    /// Graceful-stop timeout before a worker is destroyed; also the alive-check window.
    pub timeout: Duration,
    /// Restart signal name, e.g. `"SIGHUP"` or `"USR2"`.
    pub signal: String,
    /// Maximum time to wait for the pool to drain on shutdown.
    pub grace: Duration,
    /// Capacity of the event bus broadcast channel.
    pub bus_capacity: usize,
    /// Policy for reload triggers that arrive during an active reload.
    pub admission: ReloadAdmission,
    /// Whether the master and workers listen for OS signals.
    pub handle_signals: bool,
}

impl Config {
    /// Desired pool size with the `0 = CPU count` sentinel resolved.
    #[inline]
    pub fn resolved_size(&self) -> usize {
        if self.size == 0 {
            num_cpus::get()
        } else {
            self.size
        }
    }

    /// Returns a bus capacity clamped to a minimum of 1.
    #[inline]
    pub fn bus_capacity_clamped(&self) -> usize {
        self.bus_capacity.max(1)
    }

    /// Parses the configured restart signal.
    pub fn restart_signal(&self) -> Result<Signal, ConfigError> {
        parse_signal(&self.signal)
    }
}

impl Default for Config {
    /// Default configuration:
    ///
    /// - `size` = host CPU count
    /// - `timeout = 3s`
    /// - `signal = "SIGHUP"`
    /// - `grace = 10s`
    /// - `bus_capacity = 1024`
    /// - `admission = ReloadAdmission::DropIfRunning`
    /// - `handle_signals = true`
    fn default() -> Self {
        Self {
            size: num_cpus::get(),
            timeout: Duration::from_secs(3),
            signal: "SIGHUP".to_string(),
            grace: Duration::from_secs(10),
            bus_capacity: 1024,
            admission: ReloadAdmission::default(),
            handle_signals: true,
        }
    }
}

/// Parses `"SIGHUP"`, `"sighup"` or `"HUP"` into a signal.
pub fn parse_signal(name: &str) -> Result<Signal, ConfigError> {
    let upper = name.trim().to_ascii_uppercase();
    let full = if upper.starts_with("SIG") {
        upper
    } else {
        format!("SIG{upper}")
    };
    Signal::from_str(&full).map_err(|_| ConfigError::UnknownSignal(name.to_string()))
}

/// Shared, live view of a [`Config`].
///
/// Cheap to clone. Setters take effect on the master's next action that reads
/// the value (spawn, kill, reload trigger, top-off).
#[derive(Clone, Debug, Default)]
pub struct Settings {
    inner: Arc<RwLock<Config>>,
}

impl Settings {
    /// Wraps a configuration.
    pub fn new(cfg: Config) -> Self {
        Self {
            inner: Arc::new(RwLock::new(cfg)),
        }
    }

    /// Returns a copy of the current configuration.
    pub fn snapshot(&self) -> Config {
        self.read().clone()
    }

    /// Desired pool size (CPU count sentinel resolved).
    pub fn size(&self) -> usize {
        self.read().resolved_size()
    }

    /// Sets the desired pool size; `0` resets it to the CPU count.
    pub fn set_size(&self, workers: usize) {
        self.write().size = if workers == 0 { num_cpus::get() } else { workers };
    }

    /// Kill timeout / alive-check window.
    pub fn timeout(&self) -> Duration {
        self.read().timeout
    }

    /// Sets the kill timeout / alive-check window.
    pub fn set_timeout(&self, timeout: Duration) {
        self.write().timeout = timeout;
    }

    /// Restart signal name.
    pub fn signal(&self) -> String {
        self.read().signal.clone()
    }

    /// Sets the restart signal; unknown names are rejected.
    ///
    /// The master binds the signal when it starts, so a change only affects
    /// processes started afterwards (including new workers).
    pub fn set_signal(&self, name: &str) -> Result<(), ConfigError> {
        parse_signal(name)?;
        self.write().signal = name.to_string();
        Ok(())
    }

    /// Shutdown grace period.
    pub fn grace(&self) -> Duration {
        self.read().grace
    }

    /// Sets the shutdown grace period.
    pub fn set_grace(&self, grace: Duration) {
        self.write().grace = grace;
    }

    /// Reload admission policy.
    pub fn admission(&self) -> ReloadAdmission {
        self.read().admission
    }

    /// Sets the reload admission policy.
    pub fn set_admission(&self, admission: ReloadAdmission) {
        self.write().admission = admission;
    }

    fn read(&self) -> RwLockReadGuard<'_, Config> {
        self.inner.read().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    fn write(&self) -> RwLockWriteGuard<'_, Config> {
        self.inner.write().unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}
