#![allow(dead_code)]

use std::collections::{BTreeSet, HashMap, HashSet};
use std::io;
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;

use tokio::sync::broadcast;
use tokio::task::JoinHandle;

use herd::{
    BackendError, Config, Event, ExitNotice, ExitSender, Herd, MasterHandle, ProcessBackend,
    Role, RuntimeError, WorkerId,
};

/// Backend call recorded by the scripted backend.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Op {
    Fork(WorkerId),
    Disconnect(WorkerId),
    Destroy(WorkerId),
}

pub fn id(raw: u64) -> WorkerId {
    WorkerId::new(raw)
}

#[derive(Default)]
struct State {
    ops: Vec<Op>,
    live: BTreeSet<WorkerId>,
    live_history: Vec<usize>,
    senders: HashMap<WorkerId, ExitSender>,
    forks: usize,
    die_on_fork: HashSet<usize>,
    die_after: HashMap<usize, Duration>,
    fail_fork_at: Option<usize>,
    ignore_disconnect: bool,
}

impl State {
    fn exit(&mut self, worker: WorkerId, code: Option<i32>, signal: Option<i32>) {
        if !self.live.remove(&worker) {
            return;
        }
        let live = self.live.len();
        self.live_history.push(live);
        if let Some(tx) = self.senders.remove(&worker) {
            let _ = tx.send(ExitNotice {
                worker,
                code,
                signal,
            });
        }
    }
}

/// In-memory process backend driven by the test.
///
/// Worker "processes" exit when disconnected (code 0) or destroyed (SIGKILL),
/// unless scripted otherwise.
#[derive(Clone, Default)]
pub struct ScriptedBackend {
    state: Arc<Mutex<State>>,
}

impl ScriptedBackend {
    pub fn new() -> Self {
        Self::default()
    }

    /// The `nth` fork (1-based) exits right after starting with code 1.
    pub fn die_on_fork(self, nth: usize) -> Self {
        self.lock().die_on_fork.insert(nth);
        self
    }

    /// The `nth` fork (1-based) exits with code 1 once `after` has passed.
    pub fn die_after_fork(self, nth: usize, after: Duration) -> Self {
        self.lock().die_after.insert(nth, after);
        self
    }

    /// The `nth` fork (1-based) fails.
    pub fn fail_fork_at(self, nth: usize) -> Self {
        self.lock().fail_fork_at = Some(nth);
        self
    }

    /// Workers ignore graceful stop requests.
    pub fn ignore_disconnect(self) -> Self {
        self.lock().ignore_disconnect = true;
        self
    }

    pub fn ops(&self) -> Vec<Op> {
        self.lock().ops.clone()
    }

    pub fn live(&self) -> Vec<WorkerId> {
        self.lock().live.iter().copied().collect()
    }

    pub fn forks(&self) -> usize {
        self.lock().forks
    }

    /// Live worker counts recorded after every fork and exit.
    pub fn live_history(&self) -> Vec<usize> {
        self.lock().live_history.clone()
    }

    /// Simulates a crash (exit code 1).
    pub fn crash(&self, worker: WorkerId) {
        self.lock().exit(worker, Some(1), None);
    }

    /// Simulates a worker that returns on its own with code 0.
    pub fn exit_clean(&self, worker: WorkerId) {
        self.lock().exit(worker, Some(0), None);
    }

    fn lock(&self) -> MutexGuard<'_, State> {
        self.state.lock().unwrap()
    }
}

impl ProcessBackend for ScriptedBackend {
    fn role(&self) -> Role {
        Role::Master
    }

    fn fork(&mut self, worker: WorkerId, exits: ExitSender) -> Result<u32, BackendError> {
        let mut guard = self.lock();
        let st = &mut *guard;
        st.forks += 1;
        let nth = st.forks;
        if st.fail_fork_at == Some(nth) {
            return Err(BackendError::Fork(io::Error::other("fork refused")));
        }

        st.ops.push(Op::Fork(worker));
        st.live.insert(worker);
        st.live_history.push(st.live.len());
        st.senders.insert(worker, exits);

        if st.die_on_fork.contains(&nth) {
            st.exit(worker, Some(1), None);
        }
        if let Some(&after) = st.die_after.get(&nth) {
            let state = Arc::clone(&self.state);
            tokio::spawn(async move {
                tokio::time::sleep(after).await;
                state.lock().unwrap().exit(worker, Some(1), None);
            });
        }
        Ok(1000 + worker.get() as u32)
    }

    fn disconnect(&mut self, worker: WorkerId) -> Result<(), BackendError> {
        let mut st = self.lock();
        st.ops.push(Op::Disconnect(worker));
        if !st.ignore_disconnect {
            st.exit(worker, Some(0), None);
        }
        Ok(())
    }

    fn destroy(&mut self, worker: WorkerId) -> Result<(), BackendError> {
        let mut st = self.lock();
        st.ops.push(Op::Destroy(worker));
        st.exit(worker, None, Some(9));
        Ok(())
    }
}

pub fn config(size: usize) -> Config {
    Config {
        size,
        timeout: Duration::from_millis(3000),
        grace: Duration::from_secs(10),
        handle_signals: false,
        ..Config::default()
    }
}

pub struct Running {
    pub handle: MasterHandle,
    pub events: broadcast::Receiver<Event>,
    pub join: JoinHandle<Result<(), RuntimeError>>,
}

/// Starts a master over `backend`, subscribed before the first event.
pub fn start(cfg: Config, backend: ScriptedBackend) -> Running {
    let herd = Herd::builder(cfg).with_backend(backend).build();
    let handle = herd.handle();
    let events = handle.subscribe();
    let join = tokio::spawn(herd.run());
    Running {
        handle,
        events,
        join,
    }
}

/// Collects events until one satisfies `done` (inclusive).
///
/// Panics after a minute of (virtual) time.
pub async fn collect_until(
    rx: &mut broadcast::Receiver<Event>,
    mut done: impl FnMut(&Event) -> bool,
) -> Vec<Event> {
    let fut = async {
        let mut seen = Vec::new();
        loop {
            let ev = rx.recv().await.expect("bus closed");
            let stop = done(&ev);
            seen.push(ev);
            if stop {
                return seen;
            }
        }
    };
    tokio::time::timeout(Duration::from_secs(60), fut)
        .await
        .expect("expected event never arrived")
}

/// Asserts that `elapsed` is `expected` up to timer-wheel rounding.
pub fn assert_elapsed(elapsed: Duration, expected: Duration) {
    assert!(
        elapsed >= expected && elapsed < expected + Duration::from_millis(5),
        "elapsed {elapsed:?}, expected {expected:?}"
    );
}

/// Drains events that are already buffered.
pub fn drain_buffered(rx: &mut broadcast::Receiver<Event>) -> Vec<Event> {
    let mut seen = Vec::new();
    while let Ok(ev) = rx.try_recv() {
        seen.push(ev);
    }
    seen
}

/// Shuts the master down and returns its result.
pub async fn stop(running: Running) -> Result<(), RuntimeError> {
    running.handle.shutdown().await.expect("master gone");
    running.join.await.expect("master panicked")
}
