//! # Master loop: owns the pool and routes every worker exit.
//!
//! All master state (worker registry, reload session, shutdown flag) lives in
//! [`Master`] and is touched only from [`Master::run`], a single task. Inputs arrive
//! on three channels, polled in this order so an exit is always handled before a
//! timer for the same worker:
//!
//! ```text
//!   ProcessBackend watchers ── ExitNotice ──┐
//!   Timers (kill / alive)  ── TimerFired ──┼──► Master::run ──► Bus (events)
//!   MasterHandle / signals ── Control   ──┘        │
//!                                                  └──► ProcessBackend (fork / disconnect / destroy)
//! ```
//!
//! ## Exit routing (`on_exit`)
//! ```text
//! Steady    ──► respawn one worker (unless shutting down)
//! Draining  ──► spawn replacement in Probation, arm alive check, advance session
//! Probation ──► abort the reload session, top off
//! Stopping  ──► nothing
//! ```
//!
//! ## Graceful kill protocol (`kill`)
//! arm a kill timer for `timeout`, then ask the backend to disconnect. An exit
//! observed first drops the worker (and with it the timer); a timer that fires
//! first destroys the worker.
//!
//! ## Shutdown (`drain`)
//! stop respawning, drop any reload session, gracefully kill every worker, wait up
//! to `grace` for the registry to empty. Workers still registered after `grace`
//! are destroyed.

use tokio::sync::mpsc;

use super::admission::ReloadAdmission;
use super::config::Settings;
use super::handle::Control;
use super::registry::{WorkerProcess, WorkerRegistry, WorkerState};
use super::reload::{Action, ReloadOutcome, ReloadSession};
use super::timers::{TimerFired, TimerKind, Timers};
use crate::backend::{ExitNotice, ExitSender, ProcessBackend, WorkerId};
use crate::error::{ReloadError, RuntimeError};
use crate::events::{Bus, Event, EventKind};

/// Receiving ends consumed by [`Master::run`].
pub(crate) struct Inbox {
    exits: mpsc::UnboundedReceiver<ExitNotice>,
    timers: mpsc::UnboundedReceiver<TimerFired>,
    control: mpsc::Receiver<Control>,
}

pub(crate) struct Master {
    backend: Box<dyn ProcessBackend>,
    settings: Settings,
    bus: Bus,
    registry: WorkerRegistry,
    timers: Timers,
    exits_tx: ExitSender,
    session: Option<ReloadSession>,
    pending_reload: bool,
    shutting_down: bool,
}

impl Master {
    pub fn new(
        backend: Box<dyn ProcessBackend>,
        settings: Settings,
        bus: Bus,
        control: mpsc::Receiver<Control>,
    ) -> (Self, Inbox) {
        let (exits_tx, exits) = mpsc::unbounded_channel();
        let (timers, timer_rx) = Timers::new();

        let master = Self {
            backend,
            settings,
            bus,
            registry: WorkerRegistry::new(),
            timers,
            exits_tx,
            session: None,
            pending_reload: false,
            shutting_down: false,
        };
        let inbox = Inbox {
            exits,
            timers: timer_rx,
            control,
        };
        (master, inbox)
    }

    /// Starts the pool and serves until shutdown is requested or a spawn fails.
    ///
    /// The pool is drained in both cases; a spawn failure takes precedence over
    /// a drain timeout in the returned error.
    pub async fn run(mut self, inbox: Inbox) -> Result<(), RuntimeError> {
        let Inbox {
            mut exits,
            mut timers,
            mut control,
        } = inbox;

        let served = self.serve(&mut exits, &mut timers, &mut control).await;
        let drained = self.drain(&mut exits, &mut timers).await;
        served.and(drained)
    }

    async fn serve(
        &mut self,
        exits: &mut mpsc::UnboundedReceiver<ExitNotice>,
        timers: &mut mpsc::UnboundedReceiver<TimerFired>,
        control: &mut mpsc::Receiver<Control>,
    ) -> Result<(), RuntimeError> {
        for _ in 0..self.settings.size() {
            self.spawn(WorkerState::Steady)?;
        }

        let mut control_open = true;
        loop {
            tokio::select! {
                biased;
                Some(notice) = exits.recv() => self.on_exit(notice)?,
                Some(fired) = timers.recv() => self.on_timer(fired)?,
                cmd = control.recv(), if control_open => match cmd {
                    Some(Control::Reload) => self.on_reload_trigger()?,
                    Some(Control::Shutdown) => return Ok(()),
                    None => control_open = false,
                },
                else => return Ok(()),
            }
        }
    }

    /// Single dispatch point for worker exits.
    fn on_exit(&mut self, notice: ExitNotice) -> Result<(), RuntimeError> {
        let Some(worker) = self.registry.remove(notice.worker) else {
            return Ok(());
        };
        self.backend.release(notice.worker);

        self.bus.publish(
            Event::new(EventKind::WorkerExited)
                .with_exit(&notice)
                .with_pid(worker.pid)
                .with_reason(worker.state.as_label()),
        );

        match worker.state {
            WorkerState::Steady => {
                if !self.shutting_down {
                    self.spawn(WorkerState::Steady)?;
                }
            }
            WorkerState::Draining => self.replace_drained(notice.worker)?,
            WorkerState::Probation => {
                let outcome = self.session.as_mut().and_then(|s| {
                    s.replacement_died(notice.worker, notice.code, notice.signal)
                });
                if let Some(outcome) = outcome {
                    self.finish_session(outcome)?;
                }
            }
            WorkerState::Stopping => {}
        }
        Ok(())
    }

    fn on_timer(&mut self, fired: TimerFired) -> Result<(), RuntimeError> {
        let Some(worker) = self.registry.get_mut(fired.worker) else {
            return Ok(());
        };

        match fired.kind {
            TimerKind::Kill => {
                if worker.kill_timer.take().is_none() {
                    return Ok(());
                }
                let mut ev = Event::new(EventKind::KillTimeoutHit)
                    .with_worker(fired.worker)
                    .with_pid(worker.pid)
                    .with_timeout(self.settings.timeout());
                if let Err(e) = self.backend.destroy(fired.worker) {
                    ev = ev.with_reason(e.to_string());
                }
                self.bus.publish(ev);
                Ok(())
            }
            TimerKind::AliveCheck => {
                if worker.state != WorkerState::Probation || worker.alive_timer.take().is_none() {
                    return Ok(());
                }
                worker.state = WorkerState::Steady;
                self.bus.publish(
                    Event::new(EventKind::WorkerPromoted)
                        .with_worker(fired.worker)
                        .with_pid(worker.pid),
                );

                let promoted = self
                    .session
                    .as_mut()
                    .is_some_and(|s| s.promoted(fired.worker));
                if promoted {
                    self.advance_session()?;
                }
                Ok(())
            }
        }
    }

    fn on_reload_trigger(&mut self) -> Result<(), RuntimeError> {
        self.bus.publish(Event::new(EventKind::ReloadRequested));

        if self.session.is_some() {
            match self.settings.admission() {
                ReloadAdmission::DropIfRunning => {
                    self.bus.publish(Event::new(EventKind::ReloadSkipped));
                }
                ReloadAdmission::Queue => {
                    self.pending_reload = true;
                    self.bus.publish(Event::new(EventKind::ReloadQueued));
                }
            }
            return Ok(());
        }
        self.start_session()
    }

    fn start_session(&mut self) -> Result<(), RuntimeError> {
        let snapshot = self.registry.steady_ids();
        self.bus
            .publish(Event::new(EventKind::ReloadStarted).with_count(snapshot.len()));
        self.session = Some(ReloadSession::new(snapshot));
        self.advance_session()
    }

    fn advance_session(&mut self) -> Result<(), RuntimeError> {
        let Some(session) = self.session.as_mut() else {
            return Ok(());
        };
        let registry = &self.registry;

        match session.advance(|w| registry.is_steady(w)) {
            Action::Drain { worker, position } => {
                self.bus.publish(
                    Event::new(EventKind::ReloadStep)
                        .with_worker(worker)
                        .with_count(position),
                );
                if let Some(w) = self.registry.get_mut(worker) {
                    w.state = WorkerState::Draining;
                }
                self.kill(worker);
                Ok(())
            }
            Action::Finish(outcome) => self.finish_session(outcome),
        }
    }

    fn replace_drained(&mut self, old: WorkerId) -> Result<(), RuntimeError> {
        let replacement = self.spawn(WorkerState::Probation)?;
        let guard = self
            .timers
            .arm(replacement, TimerKind::AliveCheck, self.settings.timeout());
        if let Some(w) = self.registry.get_mut(replacement) {
            w.alive_timer = Some(guard);
        }
        if let Some(session) = self.session.as_mut() {
            session.drained(old, replacement);
        }
        Ok(())
    }

    fn finish_session(&mut self, outcome: ReloadOutcome) -> Result<(), RuntimeError> {
        self.session = None;

        match outcome {
            ReloadOutcome::Completed { processed } => {
                self.bus
                    .publish(Event::new(EventKind::ReloadCompleted).with_count(processed));
            }
            ReloadOutcome::Aborted { processed, error } => {
                let mut ev = Event::new(EventKind::ReloadAborted)
                    .with_count(processed)
                    .with_reason(error.to_string());
                let ReloadError::ReplacementDied { worker, .. } = &error;
                ev = ev.with_worker(*worker);
                self.bus.publish(ev);
            }
        }

        self.top_off()?;
        if std::mem::take(&mut self.pending_reload) {
            self.start_session()?;
        }
        Ok(())
    }

    /// Spawns fresh workers until the pool is back at its desired size.
    fn top_off(&mut self) -> Result<(), RuntimeError> {
        let missing = self.settings.size().saturating_sub(self.registry.len());
        self.bus
            .publish(Event::new(EventKind::TopOff).with_count(missing));
        for _ in 0..missing {
            self.spawn(WorkerState::Steady)?;
        }
        Ok(())
    }

    /// Starts the graceful kill protocol on a registered worker.
    fn kill(&mut self, worker: WorkerId) {
        if self.registry.state(worker).is_none() {
            return;
        }
        let timeout = self.settings.timeout();
        let guard = self.timers.arm(worker, TimerKind::Kill, timeout);
        let Some(w) = self.registry.get_mut(worker) else {
            return;
        };
        w.kill_timer = Some(guard);

        let mut ev = Event::new(EventKind::StopRequested)
            .with_worker(worker)
            .with_pid(w.pid)
            .with_timeout(timeout);
        if let Err(e) = self.backend.disconnect(worker) {
            ev = ev.with_reason(e.to_string());
        }
        self.bus.publish(ev);
    }

    fn spawn(&mut self, state: WorkerState) -> Result<WorkerId, RuntimeError> {
        let id = self.registry.next_id();
        match self.backend.fork(id, self.exits_tx.clone()) {
            Ok(pid) => {
                self.registry.insert(WorkerProcess::new(id, pid, state));
                self.bus.publish(
                    Event::new(EventKind::WorkerSpawned)
                        .with_worker(id)
                        .with_pid(pid),
                );
                Ok(id)
            }
            Err(source) => {
                self.bus.publish(
                    Event::new(EventKind::SpawnFailed)
                        .with_worker(id)
                        .with_reason(source.to_string()),
                );
                Err(RuntimeError::Spawn { source })
            }
        }
    }

    async fn drain(
        &mut self,
        exits: &mut mpsc::UnboundedReceiver<ExitNotice>,
        timers: &mut mpsc::UnboundedReceiver<TimerFired>,
    ) -> Result<(), RuntimeError> {
        self.shutting_down = true;
        self.session = None;
        self.pending_reload = false;
        self.bus.publish(Event::new(EventKind::ShutdownRequested));

        for id in self.registry.ids() {
            let Some(w) = self.registry.get_mut(id) else {
                continue;
            };
            w.state = WorkerState::Stopping;
            w.alive_timer = None;
            if w.kill_timer.is_none() {
                self.kill(id);
            }
        }

        let grace = self.settings.grace();
        match tokio::time::timeout(grace, self.reap(exits, timers)).await {
            Ok(reaped) => {
                reaped?;
                self.bus.publish(Event::new(EventKind::AllStoppedWithin));
                Ok(())
            }
            Err(_elapsed) => {
                let stuck = self.registry.ids();
                self.bus.publish(
                    Event::new(EventKind::GraceExceeded)
                        .with_timeout(grace)
                        .with_count(stuck.len()),
                );
                for &id in &stuck {
                    if let Err(e) = self.backend.destroy(id) {
                        tracing::warn!(worker = %id, error = %e, "failed to destroy stuck worker");
                    }
                }
                Err(RuntimeError::GraceExceeded { grace, stuck })
            }
        }
    }

    async fn reap(
        &mut self,
        exits: &mut mpsc::UnboundedReceiver<ExitNotice>,
        timers: &mut mpsc::UnboundedReceiver<TimerFired>,
    ) -> Result<(), RuntimeError> {
        while !self.registry.is_empty() {
            tokio::select! {
                biased;
                Some(notice) = exits.recv() => self.on_exit(notice)?,
                Some(fired) = timers.recv() => self.on_timer(fired)?,
                else => break,
            }
        }
        Ok(())
    }
}
