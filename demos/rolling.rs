//! # Demo: rolling
//!
//! Runs a pool of workers from this very binary and reloads it on `SIGHUP`.
//!
//! Shows how to:
//! - build a [`Herd`] with a [`HandlerFn`] entry point;
//! - log master events with [`LogWriter`] through `tracing`;
//! - watch reload outcomes with a custom [`Subscribe`] implementation.
//!
//! ## Flow
//! ```text
//! cargo run --example rolling
//!   master ──► forks 3 × (same binary, HERD_WORKER_ID=n)
//!                 └─► worker: HandlerFn ticks until SIGTERM / SIGHUP
//!
//! kill -HUP <master pid>
//!   master ──► worker-1: SIGTERM ─► exit ─► worker-4 (alive check 2s) ─► worker-2 ...
//!
//! Ctrl-C ──► master drains the pool and exits
//! ```
//!
//! ## Run
//! ```bash
//! RUST_LOG=info cargo run --example rolling
//! # in another terminal
//! kill -HUP <pid printed at startup>
//! ```
//!
//! Set `DEMO_CRASH_ON_START=1` before sending `SIGHUP` to watch a reload abort:
//! replacements then exit immediately and the pool is topped off with fresh
//! workers instead.

use std::sync::Arc;
use std::time::Duration;

use herd::{
    Config, Event, EventKind, HandlerFn, Herd, LogWriter, Role, Subscribe, WorkerError,
};
use tokio_util::sync::CancellationToken;
use tracing_subscriber::EnvFilter;

/// Prints a one-line summary whenever a reload ends.
struct ReloadReport;

#[async_trait::async_trait]
impl Subscribe for ReloadReport {
    async fn on_event(&self, ev: &Event) {
        match ev.kind {
            EventKind::ReloadCompleted => {
                println!("[report] reload ok: {} workers replaced", ev.count.unwrap_or(0));
            }
            EventKind::ReloadAborted => {
                println!(
                    "[report] reload aborted at position {}: {}",
                    ev.count.unwrap_or(0),
                    ev.reason.as_deref().unwrap_or("<none>")
                );
            }
            _ => {}
        }
    }

    fn name(&self) -> &'static str {
        "reload-report"
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| "info".into()))
        .init();

    let cfg = Config {
        size: 3,
        timeout: Duration::from_secs(2),
        grace: Duration::from_secs(5),
        ..Config::default()
    };

    let subs: Vec<Arc<dyn Subscribe>> = vec![Arc::new(LogWriter::new()), Arc::new(ReloadReport)];
    let herd = Herd::builder(cfg)
        .with_subscribers(subs)
        .with_handler(HandlerFn::arc(|ctx: CancellationToken| async move {
            if std::env::var_os("DEMO_CRASH_ON_START").is_some() {
                return Err(WorkerError::fail("refusing to start"));
            }
            let pid = std::process::id();
            let mut tick = tokio::time::interval(Duration::from_secs(1));
            loop {
                tokio::select! {
                    _ = ctx.cancelled() => break,
                    _ = tick.tick() => tracing::debug!(pid, "serving"),
                }
            }
            tracing::info!(pid, "worker finished in-flight work");
            Ok(())
        }))
        .build();

    if herd.role() == Role::Master {
        println!("master pid {}; send SIGHUP to reload", std::process::id());
    }

    herd.run().await?;
    Ok(())
}
