//! Pure timing and deduplication of raw change notifications.

use std::path::PathBuf;
use std::time::Duration;

use rustc_hash::FxHashSet;

/// Width of the debounce window. Raw filesystem events are coalesced for
/// this long before being flushed downstream.
pub(crate) const DEBOUNCE_MS: u64 = 100;

/// The debounce window as a `Duration`.
pub(crate) const fn window() -> Duration {
    Duration::from_millis(DEBOUNCE_MS)
}

/// Pure debouncer: only timing and deduplication, no business logic.
///
/// Editors tend to burst events per save (temp file, rename, write);
/// collapsing a window's worth of them bounds the rebuild rate.
#[derive(Default)]
pub(crate) struct Debouncer {
    /// Distinct paths touched since the last flush (dedup via set).
    pending: FxHashSet<PathBuf>,
}

impl Debouncer {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    /// Record a changed path. Duplicates within a window collapse into one.
    pub(crate) fn insert(&mut self, path: PathBuf) {
        self.pending.insert(path);
    }

    pub(crate) fn is_empty(&self) -> bool {
        self.pending.is_empty()
    }

    /// Drain the pending set for a flush, leaving it empty.
    ///
    /// Order within a window is unspecified.
    pub(crate) fn drain(&mut self) -> Vec<PathBuf> {
        self.pending.drain().collect()
    }
}
