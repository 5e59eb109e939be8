//! ghmr: re-review tracking for open pull requests.
//!
//! Entry point for the `ghmr` binary: a headless, line-driven review client.
//! Wires together configuration (`ghmr_core::config`), logging
//! (`tracing-subscriber`), the configured viewed-record store, the write queue,
//! the fixture pull request source (`fixture`) and the event bus (`event`).
//!
//! Usage: `ghmr <pulls.json>`. Commands are read from stdin, one per line;
//! logs go to stderr.
//!
//! # Startup sequence
//!
//! 1. Load config from XDG config. Errors are printed and defaults used.
//! 2. Install the tracing subscriber (`RUST_LOG` overrides `[log] level`).
//! 3. `register_sigterm()` returns `Arc<AtomicBool>` polled in the event loop.
//! 4. Open the store, then build the first snapshots before reading commands.
//! 5. Spawn the stdin and write-report tasks.
//!
//! Every exit path (`quit`, end of input, SIGTERM) leaves the loop via `break`
//! and reaches the final `flush()`, so no accepted toggle is lost on shutdown.

mod app;
mod commands;
mod event;
mod fixture;
mod render;
mod signals;

use std::io::{Error, ErrorKind};
use std::path::Path;
use std::sync::atomic::Ordering;
use std::sync::Arc;

use ghmr_core::config::{self, Config, StorageBackend, StorageConfig};
use ghmr_core::persistence::{JsonDirStore, MemoryStore, SqliteStore, ViewedStore};
use ghmr_core::reconciler::Reconciler;
use ghmr_core::snapshot::SnapshotBuilder;
use ghmr_core::write_queue::WriteQueue;
use tokio::sync::mpsc;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

use crate::commands::Dispatch;
use crate::event::AppEvent;

/// Loads the config file, falling back to defaults on any error.
///
/// Runs before logging is set up, so problems go straight to stderr.
fn load_config() -> Config {
    let path = config::config_path();
    Config::load(&path).unwrap_or_else(|err| {
        eprintln!("ghmr: {err}; using defaults");
        Config::default()
    })
}

fn init_tracing(config: &Config) {
    let filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(&config.log.level))
        .unwrap_or_else(|_| EnvFilter::new("info"));
    let builder = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false);
    if config.log.json {
        builder.json().init();
    } else {
        builder.init();
    }
}

/// Opens the store selected by `[storage] backend`.
async fn open_store(storage: &StorageConfig) -> std::io::Result<Arc<dyn ViewedStore>> {
    let path = storage.resolved_path(&config::data_dir());
    let store: Arc<dyn ViewedStore> = match storage.backend {
        StorageBackend::Sqlite => {
            if let Some(parent) = path.parent() {
                std::fs::create_dir_all(parent)?;
            }
            Arc::new(SqliteStore::open(&path).await.map_err(|e| Error::other(e.to_string()))?)
        }
        StorageBackend::Json => {
            Arc::new(JsonDirStore::open(&path).await.map_err(|e| Error::other(e.to_string()))?)
        }
        StorageBackend::Memory => Arc::new(MemoryStore::new()),
    };
    info!(backend = ?storage.backend, path = %path.display(), write_mode = ?storage.write_mode, "opened viewed store");
    Ok(store)
}

/// Flushes pending writes, then rebuilds every snapshot. A failed listing keeps
/// the old ones.
async fn refresh(builder: &SnapshotBuilder, state: &mut app::AppState) -> String {
    match state.refresh(builder).await {
        Ok(()) => render::pull_requests(&state.reconciler),
        Err(err) => {
            warn!(error = %err, "refresh failed; keeping previous snapshots");
            format!("error: {err}")
        }
    }
}

#[tokio::main]
async fn main() -> std::io::Result<()> {
    let fixture_path = std::env::args()
        .nth(1)
        .ok_or_else(|| Error::new(ErrorKind::InvalidInput, "usage: ghmr <pulls.json>"))?;

    // Step 1-2: config, then logging.
    let config = load_config();
    init_tracing(&config);

    // Step 3: SIGTERM flag, polled in the 50ms heartbeat arm below.
    let term_flag = signals::register_sigterm();

    // Step 4: store, write queue and first snapshots.
    let store = open_store(&config.storage).await?;
    let (report_tx, report_rx) = mpsc::unbounded_channel();
    let writer = WriteQueue::new(Arc::clone(&store), config.storage.write_mode).with_reports(report_tx);
    let source = Arc::new(fixture::JsonFixtureSource::new(Path::new(&fixture_path)));
    info!(fixture = %source.path().display(), "using fixture pull request source");
    let builder = SnapshotBuilder::new(source, store);

    let mut state = app::AppState::new(Reconciler::new(writer));
    println!("{}", refresh(&builder, &mut state).await);

    // Step 5: event channel plus its producers.
    let handler = event::EventHandler::new();
    event::spawn_stdin_task(handler.tx.clone());
    event::spawn_report_task(report_rx, handler.tx.clone());
    let mut rx = handler.rx;

    'event_loop: loop {
        tokio::select! {
            // Heartbeat: SIGTERM is checked at least every 50ms even when no
            // command arrives.
            _ = tokio::time::sleep(std::time::Duration::from_millis(50)) => {
                if term_flag.load(Ordering::Relaxed) {
                    info!("received SIGTERM");
                    break 'event_loop;
                }
            }
            maybe_event = rx.recv() => {
                match maybe_event {
                    Some(AppEvent::Command(command)) => match commands::dispatch(command, &mut state) {
                        Dispatch::Output(text) => println!("{text}"),
                        Dispatch::Refresh => println!("{}", refresh(&builder, &mut state).await),
                        Dispatch::Quit => break 'event_loop,
                    },
                    Some(AppEvent::Invalid(reason)) => println!("error: {reason}"),
                    Some(AppEvent::WriteResult(report)) => {
                        if let Err(err) = report.result {
                            println!("warning: saving review state for PR {} failed: {err}", report.pull_request);
                        }
                    }
                    Some(AppEvent::Quit) | None => break 'event_loop,
                }
            }
        }
    }

    // Single exit point: wait for every accepted toggle to reach the store.
    state.reconciler.flush().await;
    info!("pending writes flushed; exiting");
    Ok(())
}
