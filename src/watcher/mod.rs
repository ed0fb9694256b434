//! Recursive filesystem watching on top of per-directory subscriptions.
//!
//! The underlying notification backends are non-recursive, so the tree
//! watcher maintains one subscription per directory and adjusts the set as
//! directories appear and disappear. Raw events pass through a debounce
//! window before being flushed downstream as plain changed paths.

mod debouncer;
mod walk;


use std::path::{Path, PathBuf};
use std::thread::JoinHandle;

use anyhow::{Context, Result};
use crossbeam::channel::{Receiver, Sender, bounded, tick, unbounded};
use crossbeam::select;
use notify::event::{EventKind, ModifyKind};
use notify::{RecommendedWatcher, RecursiveMode, Watcher};
use rustc_hash::FxHashSet;

use crate::debug;
use debouncer::Debouncer;
pub(crate) use debouncer::window;
use walk::{is_excluded, normalize};

// ============================================================================
// Tree watcher
// ============================================================================

/// Watches whole directory trees through non-recursive subscriptions.
///
/// Subscription failures on individual directories are logged and skipped;
/// only construction of the backend itself is fatal.
pub struct TreeWatcher {
    watcher: RecommendedWatcher,
    /// Directories currently subscribed. Guards against duplicate
    /// subscriptions and makes unsubscription idempotent.
    watched: FxHashSet<PathBuf>,
    excludes: Vec<PathBuf>,
    notify_rx: Receiver<notify::Result<notify::Event>>,
    debouncer: Debouncer,
}

impl TreeWatcher {
    pub fn new(excludes: Vec<PathBuf>) -> Result<Self> {
        let (tx, rx) = unbounded();
        let watcher = notify::recommended_watcher(move |res| {
            let _ = tx.send(res);
        })
        .context("failed to initialize filesystem notification backend")?;

        Ok(Self {
            watcher,
            watched: FxHashSet::default(),
            // Cleaned once here; every candidate path is cleaned the same
            // way before the prefix test
            excludes: excludes.iter().map(|p| normalize(p)).collect(),
            notify_rx: rx,
            debouncer: Debouncer::new(),
        })
    }

    /// Subscribe to `root` and every directory below it.
    ///
    /// Best-effort: unreadable subtrees and failed subscriptions are skipped
    /// with a debug note, never aborting the rest of the walk.
    pub fn add(&mut self, root: &Path) {
        for entry in walk::walk_dirs(root) {
            match entry {
                Ok(dir) => {
                    let dir = normalize(&dir);
                    if !is_excluded(&dir, &self.excludes) {
                        self.subscribe(&dir);
                    }
                }
                Err(e) => {
                    debug!("watch"; "skipping unreadable entry under {}: {}", root.display(), e);
                }
            }
        }
    }

    fn subscribe(&mut self, dir: &Path) {
        if self.watched.contains(dir) {
            return;
        }
        match self.watcher.watch(dir, RecursiveMode::NonRecursive) {
            Ok(()) => {
                debug!("watch"; "subscribed {}", dir.display());
                self.watched.insert(dir.to_path_buf());
            }
            Err(e) => {
                debug!("watch"; "failed to subscribe {}: {}", dir.display(), e);
            }
        }
    }

    fn unsubscribe(&mut self, dir: &Path) {
        if self.watched.remove(dir) {
            // The backend may have dropped the watch already when the
            // directory was deleted; stale-handle errors are expected.
            let _ = self.watcher.unwatch(dir);
            debug!("watch"; "unsubscribed {}", dir.display());
        }
    }

    /// Classify one raw notification and update debouncer and watch set.
    fn handle_event(&mut self, event: notify::Event) {
        // Pure metadata changes (chmod, utime) never affect build inputs
        if matches!(event.kind, EventKind::Modify(ModifyKind::Metadata(_))) {
            return;
        }

        let kind = event.kind;
        for path in event.paths {
            let path = normalize(&path);
            // Events for excluded paths can still arrive through the watch
            // on the parent directory; drop them here.
            if is_excluded(&path, &self.excludes) {
                continue;
            }

            match kind {
                EventKind::Create(_) => {
                    // Race: the path may be gone before we stat it
                    match std::fs::metadata(&path) {
                        Ok(meta) if meta.is_dir() => self.add(&path),
                        Ok(_) => self.debouncer.insert(path),
                        Err(_) => {}
                    }
                }
                EventKind::Remove(_) => {
                    self.unsubscribe(&path);
                    self.debouncer.insert(path);
                }
                EventKind::Modify(_) => {
                    self.debouncer.insert(path);
                }
                _ => {}
            }
        }
    }

    /// Move the watcher onto its own thread and return a handle for
    /// consuming debounced change paths.
    pub fn spawn(mut self) -> WatcherHandle {
        let (events_tx, events_rx) = unbounded();
        let (done_tx, done_rx) = bounded(1);

        let thread = std::thread::spawn(move || {
            self.run(&events_tx, &done_rx);
        });

        WatcherHandle {
            events_rx,
            done_tx,
            thread,
        }
    }

    fn run(&mut self, events_tx: &Sender<PathBuf>, done_rx: &Receiver<()>) {
        let notify_rx = self.notify_rx.clone();
        let ticker = tick(window());

        loop {
            select! {
                recv(notify_rx) -> msg => match msg {
                    Ok(Ok(event)) => self.handle_event(event),
                    Ok(Err(e)) => debug!("watch"; "notification error: {}", e),
                    Err(_) => break,
                },
                recv(ticker) -> _ => {
                    if self.debouncer.is_empty() {
                        continue;
                    }
                    for path in self.debouncer.drain() {
                        if events_tx.send(path).is_err() {
                            return;
                        }
                    }
                },
                recv(done_rx) -> _ => break,
            }
        }
    }
}

// ============================================================================
// Handle
// ============================================================================

/// Handle to a running tree watcher thread.
pub struct WatcherHandle {
    events_rx: Receiver<PathBuf>,
    done_tx: Sender<()>,
    thread: JoinHandle<()>,
}

impl WatcherHandle {
    /// Receiver of debounced changed paths.
    pub fn events(&self) -> Receiver<PathBuf> {
        self.events_rx.clone()
    }

    /// Stop the watcher thread and wait for it to finish.
    pub fn close(self) {
        let _ = self.done_tx.send(());
        let _ = self.thread.join();
    }
}
