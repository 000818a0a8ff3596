//! fanout-walker - Bounded-Concurrency Directory Walker
//!
//! Entry point for the CLI application.

use anyhow::{Context, Result};
use clap::Parser;
use crossbeam_channel::{bounded, Receiver, RecvTimeoutError};
use fanout_walker::config::{CliArgs, WalkConfig};
use fanout_walker::progress::{print_failures, print_header, print_summary, ProgressReporter};
use fanout_walker::source::FileEntry;
use fanout_walker::walker::{WalkCoordinator, WalkProgress, WalkStats};
use std::process::ExitCode;
use std::sync::atomic::Ordering;
use std::thread;
use std::time::{Duration, Instant};
use tracing::{error, info, warn};
use tracing_subscriber::EnvFilter;

/// Spinner refresh interval
const PROGRESS_INTERVAL: Duration = Duration::from_millis(250);

fn main() -> ExitCode {
    match run() {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            error!("{:#}", e);
            eprintln!("Error: {:#}", e);
            ExitCode::FAILURE
        }
    }
}

fn run() -> Result<()> {
    // Parse CLI arguments
    let args = CliArgs::parse();

    // Setup logging
    setup_logging(args.verbose)?;

    // Validate and create config
    let config = WalkConfig::from_args(args).context("Invalid configuration")?;

    if config.show_progress {
        print_header(
            &config.root,
            config.scheduling.strategy(),
            config.scheduling.concurrency(),
        );
    }

    let coordinator = WalkCoordinator::new(config.scheduling);

    // Setup signal handler for graceful shutdown
    let shutdown_flag = coordinator.shutdown_flag();
    ctrlc::set_handler(move || {
        eprintln!("\nInterrupt received, shutting down...");
        shutdown_flag.store(true, Ordering::SeqCst);
    })
    .context("Failed to set signal handler")?;

    let progress = config.show_progress.then(ProgressReporter::new);
    if let Some(ref p) = progress {
        p.set_status(&format!("Walking {}...", config.root.display()));
    }

    let stats = coordinator.stats();
    let workers = config.scheduling.concurrency();
    let tree = config.tree();
    let list = config.list_leaves;
    let mut total_bytes = 0u64;

    let report = thread::scope(|s| {
        let (done_tx, done_rx) = bounded::<()>(0);

        if let Some(reporter) = progress.as_ref() {
            let stats = &*stats;
            s.spawn(move || report_progress(reporter, stats, workers, done_rx));
        }

        let mut sink = |entry: &FileEntry| {
            total_bytes += entry.size;
            if list {
                let line = entry.path.display().to_string();
                match progress.as_ref() {
                    Some(reporter) => reporter.println(&line),
                    None => println!("{}", line),
                }
            }
        };

        let result = coordinator.run(&tree, config.root_node(), &mut sink);
        drop(done_tx);
        result
    })
    .context("Walk failed")?;

    // Finish progress
    if let Some(ref p) = progress {
        if report.completed {
            p.finish("Walk completed");
        } else {
            p.finish("Walk interrupted");
        }
    }

    print_summary(&report.summary, total_bytes, report.duration, report.completed);

    if config.verbose {
        print_failures(&report.failures);
    }

    if !report.completed {
        info!(
            pending = report.pending.len(),
            "Walk was interrupted before completion"
        );
    }

    if !report.failures.is_empty() {
        info!(errors = report.failures.len(), "Walk completed with errors");
    }

    for e in &report.worker_errors {
        warn!(error = %e, "Worker error during walk");
    }

    Ok(())
}

/// Refresh the spinner until `done` disconnects
fn report_progress(reporter: &ProgressReporter, stats: &WalkStats, workers: usize, done: Receiver<()>) {
    let start = Instant::now();

    loop {
        match done.recv_timeout(PROGRESS_INTERVAL) {
            Err(RecvTimeoutError::Timeout) => {
                reporter.update(&WalkProgress::capture(stats, workers, start.elapsed()));
            }
            _ => break,
        }
    }
}

fn setup_logging(verbose: bool) -> Result<()> {
    let filter = if verbose {
        EnvFilter::new("fanout_walker=debug,warn")
    } else {
        EnvFilter::new("fanout_walker=info,warn")
    };

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_thread_ids(false)
        .with_file(false)
        .with_line_number(false)
        .with_writer(std::io::stderr)
        .init();

    Ok(())
}
