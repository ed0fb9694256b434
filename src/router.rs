//! Change routing between the watcher and the orchestrator.
//!
//! Debounced change paths are screened against the pattern filter; relevant
//! ones raise a dirty flag that a periodic ticker converts into at most one
//! orchestrator trigger per interval.

use std::path::PathBuf;
use std::time::Duration;

use crossbeam::channel::{Receiver, tick};
use crossbeam::select;

use crate::debug;
use crate::filter::PatternFilter;
use crate::orchestrator::Orchestrator;

/// Interval at which accumulated relevant changes are turned into a trigger.
const TRIGGER_MS: u64 = 100;

/// Drive the main loop until shutdown or until the watcher goes away.
pub fn run(
    events_rx: &Receiver<PathBuf>,
    filter: &PatternFilter,
    orchestrator: &Orchestrator,
    shutdown_rx: &Receiver<()>,
) {
    let ticker = tick(Duration::from_millis(TRIGGER_MS));
    let mut has_changes = false;

    loop {
        select! {
            recv(events_rx) -> msg => match msg {
                Ok(path) => {
                    if filter.is_relevant(&path) {
                        debug!("watch"; "change: {}", path.display());
                        has_changes = true;
                    } else {
                        debug!("watch"; "filtered out: {}", path.display());
                    }
                }
                // Watcher thread gone, nothing left to route
                Err(_) => break,
            },
            recv(ticker) -> _ => {
                if has_changes {
                    has_changes = false;
                    orchestrator.trigger();
                }
            },
            recv(shutdown_rx) -> _ => break,
        }
    }
}

// ============================================================================
// Tests
// ============================================================================
