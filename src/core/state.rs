//! Shutdown state tracking.
//!
//! One SIGINT/SIGTERM handler set at program start flips the flag and wakes
//! the router loop through a registered one-shot channel.

use std::sync::OnceLock;
use std::sync::atomic::{AtomicBool, Ordering};

/// Shutdown has been requested (signal received)
static SHUTDOWN: AtomicBool = AtomicBool::new(false);

/// Shutdown signal sender for the router loop
static SHUTDOWN_TX: OnceLock<crossbeam::channel::Sender<()>> = OnceLock::new();

/// Setup the global signal handler. Call once at program start
///
/// The handler behavior depends on whether a shutdown channel has been
/// registered:
/// - Before `register_shutdown_channel()`: process exits immediately
/// - After: the router loop is woken and drives the orderly teardown
pub fn setup_shutdown_handler() -> anyhow::Result<()> {
    ctrlc::set_handler(handle_signal)
        .map_err(|e| anyhow::anyhow!("failed to set signal handler: {}", e))
}

/// Handler body. Exits directly only when no channel is registered yet,
/// i.e. nothing is running that could leave a child behind.
fn handle_signal() {
    SHUTDOWN.store(true, Ordering::SeqCst);

    if let Some(tx) = SHUTDOWN_TX.get() {
        crate::log!("watch"; "shutting down...");
        let _ = tx.send(());
    } else {
        // Nothing running yet (e.g. still parsing arguments)
        std::process::exit(0);
    }
}

/// Register the channel that wakes the router loop on shutdown
///
/// Call this after the orchestrator exists, before entering the watch loop
pub fn register_shutdown_channel(tx: crossbeam::channel::Sender<()>) {
    let _ = SHUTDOWN_TX.set(tx);
}

/// Check if shutdown has been requested
#[allow(dead_code)]
pub fn is_shutdown() -> bool {
    SHUTDOWN.load(Ordering::SeqCst)
}

// =============================================================================
// Tests
// =============================================================================
