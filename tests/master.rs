mod common;

use std::time::Duration;

use common::{
    Op, ScriptedBackend, assert_elapsed, collect_until, config, drain_buffered, id, start, stop,
};
use herd::{EventKind, ReloadAdmission, RuntimeError};

fn count(events: &[herd::Event], kind: EventKind) -> usize {
    events.iter().filter(|e| e.kind == kind).count()
}

async fn wait_filled(rx: &mut tokio::sync::broadcast::Receiver<herd::Event>, n: usize) {
    let mut spawned = 0;
    collect_until(rx, |e| {
        if e.kind == EventKind::WorkerSpawned {
            spawned += 1;
        }
        spawned == n
    })
    .await;
}

#[tokio::test(start_paused = true)]
async fn pool_converges_to_configured_size() {
    let backend = ScriptedBackend::new();
    let mut run = start(config(3), backend.clone());

    wait_filled(&mut run.events, 3).await;
    assert_eq!(backend.live(), vec![id(1), id(2), id(3)]);

    let mut events = run.handle.subscribe();
    assert!(stop(run).await.is_ok());

    let tail = drain_buffered(&mut events);
    assert_eq!(count(&tail, EventKind::ShutdownRequested), 1);
    assert_eq!(count(&tail, EventKind::StopRequested), 3);
    assert_eq!(count(&tail, EventKind::AllStoppedWithin), 1);
    assert!(backend.live().is_empty());
}

#[tokio::test(start_paused = true)]
async fn crash_is_respawned_exactly_once() {
    let backend = ScriptedBackend::new();
    let mut run = start(config(3), backend.clone());
    wait_filled(&mut run.events, 3).await;

    backend.crash(id(2));
    let seen = collect_until(&mut run.events, |e| e.kind == EventKind::WorkerSpawned).await;

    let exited = seen
        .iter()
        .find(|e| e.kind == EventKind::WorkerExited)
        .unwrap();
    assert_eq!(exited.worker, Some(id(2)));
    assert_eq!(exited.reason.as_deref(), Some("crash"));
    assert_eq!(exited.exit_code, Some(1));
    assert_eq!(seen.last().unwrap().worker, Some(id(4)));

    tokio::time::sleep(Duration::from_secs(30)).await;
    assert_eq!(backend.forks(), 4);
    assert_eq!(backend.live(), vec![id(1), id(3), id(4)]);

    assert!(stop(run).await.is_ok());
}

#[tokio::test(start_paused = true)]
async fn clean_exit_is_respawned_too() {
    let backend = ScriptedBackend::new();
    let mut run = start(config(2), backend.clone());
    wait_filled(&mut run.events, 2).await;

    backend.exit_clean(id(1));
    let seen = collect_until(&mut run.events, |e| e.kind == EventKind::WorkerSpawned).await;

    let exited = seen
        .iter()
        .find(|e| e.kind == EventKind::WorkerExited)
        .unwrap();
    assert!(exited.is_clean_exit());
    assert_eq!(backend.live(), vec![id(2), id(3)]);

    assert!(stop(run).await.is_ok());
}

#[tokio::test(start_paused = true)]
async fn rolling_reload_replaces_every_worker_in_order() {
    let backend = ScriptedBackend::new();
    let mut run = start(config(3), backend.clone());
    wait_filled(&mut run.events, 3).await;

    let started = tokio::time::Instant::now();
    run.handle.reload().await.unwrap();
    let seen = collect_until(&mut run.events, |e| e.kind == EventKind::TopOff).await;

    assert_eq!(
        backend.ops()[3..],
        [
            Op::Disconnect(id(1)),
            Op::Fork(id(4)),
            Op::Disconnect(id(2)),
            Op::Fork(id(5)),
            Op::Disconnect(id(3)),
            Op::Fork(id(6)),
        ]
    );
    assert_eq!(backend.live(), vec![id(4), id(5), id(6)]);

    let positions: Vec<_> = seen
        .iter()
        .filter(|e| e.kind == EventKind::ReloadStep)
        .map(|e| (e.worker, e.count))
        .collect();
    assert_eq!(
        positions,
        vec![(Some(id(1)), Some(1)), (Some(id(2)), Some(2)), (Some(id(3)), Some(3))]
    );

    let completed = seen
        .iter()
        .find(|e| e.kind == EventKind::ReloadCompleted)
        .unwrap();
    assert_eq!(completed.count, Some(3));
    assert_eq!(seen.last().unwrap().count, Some(0));
    assert_eq!(count(&seen, EventKind::WorkerPromoted), 3);

    // one alive-check window per step
    assert_elapsed(started.elapsed(), Duration::from_secs(9));

    // never below N-1 nor above N once the pool was filled
    let history = backend.live_history();
    assert!(history[3..].iter().all(|&n| (2..=3).contains(&n)));

    assert!(stop(run).await.is_ok());
}

#[tokio::test(start_paused = true)]
async fn failed_replacement_aborts_and_tops_off() {
    // forks 1-3 fill the pool, fork 4 replaces worker 1, fork 5 replaces worker 2 and dies
    let backend = ScriptedBackend::new().die_on_fork(5);
    let mut run = start(config(3), backend.clone());
    wait_filled(&mut run.events, 3).await;

    run.handle.reload().await.unwrap();
    let seen = collect_until(&mut run.events, |e| e.kind == EventKind::TopOff).await;

    let aborted = seen
        .iter()
        .find(|e| e.kind == EventKind::ReloadAborted)
        .unwrap();
    assert_eq!(aborted.worker, Some(id(5)));
    assert_eq!(aborted.count, Some(2));
    assert_eq!(count(&seen, EventKind::ReloadCompleted), 0);

    let top_off = seen.last().unwrap();
    assert_eq!(top_off.count, Some(1));

    tokio::time::sleep(Duration::from_secs(30)).await;
    assert_eq!(
        backend.ops()[3..],
        [
            Op::Disconnect(id(1)),
            Op::Fork(id(4)),
            Op::Disconnect(id(2)),
            Op::Fork(id(5)),
            Op::Fork(id(6)),
        ]
    );
    assert!(!backend.ops().contains(&Op::Disconnect(id(3))));
    assert_eq!(backend.live(), vec![id(3), id(4), id(6)]);

    assert!(stop(run).await.is_ok());
}

#[tokio::test(start_paused = true)]
async fn abort_at_first_step_restores_size_not_size_minus_processed() {
    // fork 4 replaces worker 1 and dies at once
    let backend = ScriptedBackend::new().die_on_fork(4);
    let mut run = start(config(3), backend.clone());
    wait_filled(&mut run.events, 3).await;

    run.handle.reload().await.unwrap();
    let seen = collect_until(&mut run.events, |e| e.kind == EventKind::TopOff).await;

    let aborted = seen
        .iter()
        .find(|e| e.kind == EventKind::ReloadAborted)
        .unwrap();
    assert_eq!(aborted.worker, Some(id(4)));
    assert_eq!(aborted.count, Some(1));
    assert_eq!(seen.last().unwrap().count, Some(1));

    tokio::time::sleep(Duration::from_secs(30)).await;
    assert!(!backend.ops().contains(&Op::Disconnect(id(2))));
    assert_eq!(backend.live(), vec![id(2), id(3), id(5)]);

    assert!(stop(run).await.is_ok());
}

#[tokio::test(start_paused = true)]
async fn replacement_dying_as_window_closes_aborts() {
    // fork 2 replaces worker 1 and exits exactly when its alive check is due
    let cfg = config(1);
    let backend = ScriptedBackend::new().die_after_fork(2, cfg.timeout);
    let mut run = start(cfg, backend.clone());
    wait_filled(&mut run.events, 1).await;

    run.handle.reload().await.unwrap();
    let seen = collect_until(&mut run.events, |e| {
        matches!(e.kind, EventKind::ReloadAborted | EventKind::ReloadCompleted)
    })
    .await;

    let last = seen.last().unwrap();
    assert_eq!(last.kind, EventKind::ReloadAborted);
    assert_eq!(last.worker, Some(id(2)));
    assert_eq!(count(&seen, EventKind::WorkerPromoted), 0);

    let exited = seen
        .iter()
        .rfind(|e| e.kind == EventKind::WorkerExited)
        .unwrap();
    assert_eq!(exited.worker, Some(id(2)));
    assert_eq!(exited.reason.as_deref(), Some("probation"));

    tokio::time::sleep(Duration::from_secs(30)).await;
    assert_eq!(backend.live(), vec![id(3)]);
    assert!(stop(run).await.is_ok());
}

#[tokio::test(start_paused = true)]
async fn stubborn_worker_is_destroyed_after_timeout() {
    let backend = ScriptedBackend::new().ignore_disconnect();
    let mut run = start(config(1), backend.clone());
    wait_filled(&mut run.events, 1).await;

    let started = tokio::time::Instant::now();
    run.handle.reload().await.unwrap();
    let seen = collect_until(&mut run.events, |e| e.kind == EventKind::KillTimeoutHit).await;
    assert_elapsed(started.elapsed(), Duration::from_secs(3));
    assert_eq!(seen.last().unwrap().worker, Some(id(1)));

    let seen = collect_until(&mut run.events, |e| e.kind == EventKind::ReloadCompleted).await;
    let exited = seen
        .iter()
        .find(|e| e.kind == EventKind::WorkerExited)
        .unwrap();
    assert_eq!(exited.exit_signal, Some(9));
    assert_eq!(
        backend.ops(),
        vec![
            Op::Fork(id(1)),
            Op::Disconnect(id(1)),
            Op::Destroy(id(1)),
            Op::Fork(id(2)),
        ]
    );

    // replacement ignores the graceful stop too; shutdown escalates within grace
    assert!(stop(run).await.is_ok());
    assert!(backend.ops().contains(&Op::Destroy(id(2))));
}

#[tokio::test(start_paused = true)]
async fn no_destroy_after_observed_exit() {
    let backend = ScriptedBackend::new();
    let mut run = start(config(1), backend.clone());
    wait_filled(&mut run.events, 1).await;

    run.handle.reload().await.unwrap();
    collect_until(&mut run.events, |e| e.kind == EventKind::TopOff).await;

    tokio::time::sleep(Duration::from_secs(30)).await;
    let later = drain_buffered(&mut run.events);
    assert_eq!(count(&later, EventKind::KillTimeoutHit), 0);
    assert!(!backend.ops().iter().any(|op| matches!(op, Op::Destroy(_))));
    assert_eq!(backend.forks(), 2);

    assert!(stop(run).await.is_ok());
}

#[tokio::test(start_paused = true)]
async fn retrigger_during_reload_is_skipped() {
    let backend = ScriptedBackend::new();
    let mut run = start(config(2), backend.clone());
    wait_filled(&mut run.events, 2).await;

    run.handle.reload().await.unwrap();
    run.handle.reload().await.unwrap();
    let seen = collect_until(&mut run.events, |e| e.kind == EventKind::TopOff).await;
    assert_eq!(count(&seen, EventKind::ReloadRequested), 2);
    assert_eq!(count(&seen, EventKind::ReloadSkipped), 1);
    assert_eq!(count(&seen, EventKind::ReloadStarted), 1);

    tokio::time::sleep(Duration::from_secs(30)).await;
    let later = drain_buffered(&mut run.events);
    assert_eq!(count(&later, EventKind::ReloadStarted), 0);
    assert_eq!(backend.forks(), 4);

    assert!(stop(run).await.is_ok());
}

#[tokio::test(start_paused = true)]
async fn retrigger_during_reload_is_queued() {
    let mut cfg = config(2);
    cfg.admission = ReloadAdmission::Queue;
    let backend = ScriptedBackend::new();
    let mut run = start(cfg, backend.clone());
    wait_filled(&mut run.events, 2).await;

    run.handle.reload().await.unwrap();
    run.handle.reload().await.unwrap();
    run.handle.reload().await.unwrap();

    let mut completed = 0;
    let seen = collect_until(&mut run.events, |e| {
        if e.kind == EventKind::ReloadCompleted {
            completed += 1;
        }
        completed == 2
    })
    .await;
    assert_eq!(count(&seen, EventKind::ReloadQueued), 2);
    assert_eq!(count(&seen, EventKind::ReloadStarted), 2);

    tokio::time::sleep(Duration::from_secs(30)).await;
    assert_eq!(backend.forks(), 6);
    assert_eq!(backend.live(), vec![id(5), id(6)]);

    assert!(stop(run).await.is_ok());
}

#[tokio::test(start_paused = true)]
async fn crash_outside_the_step_is_handled_during_reload() {
    let backend = ScriptedBackend::new();
    let mut run = start(config(3), backend.clone());
    wait_filled(&mut run.events, 3).await;

    run.handle.reload().await.unwrap();
    collect_until(&mut run.events, |e| {
        e.kind == EventKind::WorkerSpawned && e.worker == Some(id(4))
    })
    .await;

    // worker 4 is on probation; worker 3 is still waiting for its turn
    backend.crash(id(3));
    let seen = collect_until(&mut run.events, |e| e.kind == EventKind::TopOff).await;

    let crash = seen
        .iter()
        .find(|e| e.kind == EventKind::WorkerExited && e.worker == Some(id(3)))
        .unwrap();
    assert_eq!(crash.reason.as_deref(), Some("crash"));

    let completed = seen
        .iter()
        .find(|e| e.kind == EventKind::ReloadCompleted)
        .unwrap();
    assert_eq!(completed.count, Some(3));
    assert_eq!(seen.last().unwrap().count, Some(0));

    assert!(!backend.ops().contains(&Op::Disconnect(id(3))));
    assert_eq!(backend.live().len(), 3);

    assert!(stop(run).await.is_ok());
}

#[tokio::test(start_paused = true)]
async fn size_change_applies_at_top_off() {
    let backend = ScriptedBackend::new();
    let mut run = start(config(2), backend.clone());
    wait_filled(&mut run.events, 2).await;

    run.handle.settings().set_size(3);
    run.handle.reload().await.unwrap();
    let seen = collect_until(&mut run.events, |e| e.kind == EventKind::TopOff).await;

    let started = seen
        .iter()
        .find(|e| e.kind == EventKind::ReloadStarted)
        .unwrap();
    assert_eq!(started.count, Some(2));
    assert_eq!(seen.last().unwrap().count, Some(1));
    assert_eq!(backend.live(), vec![id(3), id(4), id(5)]);

    assert!(stop(run).await.is_ok());
}

#[tokio::test(start_paused = true)]
async fn spawn_failure_drains_and_returns_error() {
    let backend = ScriptedBackend::new().fail_fork_at(2);
    let run = start(config(3), backend.clone());

    let res = run.join.await.unwrap();
    assert!(matches!(res, Err(RuntimeError::Spawn { .. })));
    assert_eq!(backend.ops(), vec![Op::Fork(id(1)), Op::Disconnect(id(1))]);
    assert!(backend.live().is_empty());
}

#[tokio::test(start_paused = true)]
async fn shutdown_reports_stuck_workers_after_grace() {
    let mut cfg = config(2);
    cfg.grace = Duration::from_secs(1);
    let backend = ScriptedBackend::new().ignore_disconnect();
    let mut run = start(cfg, backend.clone());
    wait_filled(&mut run.events, 2).await;

    match stop(run).await {
        Err(RuntimeError::GraceExceeded { grace, stuck }) => {
            assert_eq!(grace, Duration::from_secs(1));
            assert_eq!(stuck, vec![id(1), id(2)]);
        }
        other => panic!("unexpected result {other:?}"),
    }

    // grace ran out before the kill timers: the master destroys what is left
    assert_eq!(
        backend.ops()[2..],
        [
            Op::Disconnect(id(1)),
            Op::Disconnect(id(2)),
            Op::Destroy(id(1)),
            Op::Destroy(id(2)),
        ]
    );
    assert!(backend.live().is_empty());
}
