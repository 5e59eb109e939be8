//! Event bus for ghmr.
//!
//! User commands read from stdin and persistence write reports are normalised
//! into a single `AppEvent` enum and sent over a tokio unbounded MPSC channel.
//! The main loop receives from this channel and dispatches accordingly.

use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::sync::mpsc;

use ghmr_core::write_queue::WriteReport;

use crate::commands::Command;

/// All events the application can receive from any source.
#[derive(Debug)]
pub enum AppEvent {
    /// A parsed command line from stdin.
    Command(Command),
    /// A line that did not parse as a command, with the reason.
    Invalid(String),
    /// A persistence write finished (successfully or not).
    WriteResult(WriteReport),
    /// Stdin reached end of file or failed.
    Quit,
}

/// Holds the sender and receiver ends of the unified event channel.
///
/// The sender (`tx`) is cloned and distributed to background tasks;
/// the receiver (`rx`) is owned by the main event loop.
pub struct EventHandler {
    pub tx: mpsc::UnboundedSender<AppEvent>,
    pub rx: mpsc::UnboundedReceiver<AppEvent>,
}

impl EventHandler {
    pub fn new() -> Self {
        let (tx, rx) = mpsc::unbounded_channel();
        Self { tx, rx }
    }
}

impl Default for EventHandler {
    fn default() -> Self {
        Self::new()
    }
}

/// Spawns the task that reads commands from stdin, one per line.
///
/// Blank lines are skipped. End of input sends [`AppEvent::Quit`] and ends
/// the task. Send errors are ignored: the receiver is gone only once the main
/// loop has exited.
pub fn spawn_stdin_task(tx: mpsc::UnboundedSender<AppEvent>) {
    tokio::spawn(async move {
        let mut lines = BufReader::new(tokio::io::stdin()).lines();
        loop {
            match lines.next_line().await {
                Ok(Some(line)) => {
                    let event = match Command::parse(&line) {
                        Ok(Some(command)) => AppEvent::Command(command),
                        Ok(None) => continue,
                        Err(reason) => AppEvent::Invalid(reason),
                    };
                    let _ = tx.send(event);
                }
                Ok(None) => {
                    let _ = tx.send(AppEvent::Quit);
                    break;
                }
                Err(err) => {
                    tracing::error!(error = %err, "failed to read command from stdin");
                    let _ = tx.send(AppEvent::Quit);
                    break;
                }
            }
        }
    });
}

/// Forwards write reports from the write queue onto the event bus.
pub fn spawn_report_task(
    mut reports: mpsc::UnboundedReceiver<WriteReport>,
    tx: mpsc::UnboundedSender<AppEvent>,
) {
    tokio::spawn(async move {
        while let Some(report) = reports.recv().await {
            if tx.send(AppEvent::WriteResult(report)).is_err() {
                break;
            }
        }
    });
}
