//! Process signal handling for ghmr.

use signal_hook::consts::SIGTERM;
use signal_hook::flag::register;
use std::sync::{atomic::AtomicBool, Arc};

/// Register a SIGTERM handler that sets an `AtomicBool` flag.
///
/// Returns an `Arc<AtomicBool>` that transitions from `false` to `true` when
/// the process receives SIGTERM. The main loop polls it on its heartbeat and
/// flushes pending writes before exiting.
///
/// # Panics
///
/// Panics if the OS refuses to register the signal handler; treated as a fatal
/// initialisation error.
pub fn register_sigterm() -> Arc<AtomicBool> {
    let term = Arc::new(AtomicBool::new(false));
    // The handler only performs an atomic store, which is async-signal-safe.
    register(SIGTERM, Arc::clone(&term)).expect("Failed to register SIGTERM handler");
    term
}
