//! Relance - rebuild and restart on save.
//!
//! Watches directory trees, reruns a build command when relevant files
//! change, then respawns a server process on success or serves the failing
//! build's output over a small diagnostic HTTP endpoint.

mod cli;
mod core;
mod filter;
mod logger;
mod orchestrator;
mod router;
mod watcher;

use anyhow::{Context, Result};
use clap::{ColorChoice, Parser};

use cli::Cli;
use filter::PatternFilter;
use orchestrator::Orchestrator;
use watcher::TreeWatcher;

fn main() -> Result<()> {
    // Setup global signal handler (before any blocking operations)
    core::setup_shutdown_handler()?;

    let cli = Cli::parse();
    logger::set_verbose(cli.verbose);

    // Set global color override based on CLI option
    match cli.color {
        ColorChoice::Always => owo_colors::set_override(true),
        ColorChoice::Never => owo_colors::set_override(false),
        ColorChoice::Auto => {} // owo-colors auto-detects TTY
    }

    let filter = PatternFilter::new(&cli.patterns, &cli.ignores).context("invalid file pattern")?;
    let directories = cli.watch_roots();

    let orchestrator = Orchestrator::new(cli.build, cli.server, cli.error_server);

    // Watcher construction failure (e.g. inotify exhaustion) aborts startup.
    let mut tree = TreeWatcher::new(cli.excludes).context("failed to create tree watcher")?;

    // Registered before the first build: a signal arriving mid-build must
    // reach the router loop and reap the children, not exit the process.
    let (shutdown_tx, shutdown_rx) = crossbeam::channel::bounded(1);
    core::register_shutdown_channel(shutdown_tx);

    // The initial build goes through the same entry point as every
    // re-trigger, before any directory is subscribed.
    orchestrator.trigger();

    for root in directories {
        log!("watch"; "watching {}", root.display());
        tree.add(&root);
    }

    let handle = tree.spawn();
    let events_rx = handle.events();
    router::run(&events_rx, &filter, &orchestrator, &shutdown_rx);

    handle.close();
    orchestrator.shutdown();
    Ok(())
}
