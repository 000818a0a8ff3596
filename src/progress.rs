//! Progress reporting for the tree walker
//!
//! Provides real-time progress display using indicatif progress bars.

use crate::config::Strategy;
use crate::error::NodeFailure;
use crate::walker::{WalkProgress, WalkSummary};
use console::style;
use humansize::{format_size, BINARY};
use indicatif::{ProgressBar, ProgressStyle};
use std::fmt::Debug;
use std::path::Path;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

/// Failures listed individually before the rest are summarised
const MAX_LISTED_FAILURES: usize = 20;

/// Progress reporter that displays walk status
pub struct ProgressReporter {
    /// Progress bar
    bar: ProgressBar,

    /// Set once the display is finished; later updates are ignored
    stop: Arc<AtomicBool>,
}

impl ProgressReporter {
    /// Create a new progress reporter
    pub fn new() -> Self {
        let bar = ProgressBar::new_spinner();

        let style = ProgressStyle::default_spinner()
            .template("{spinner:.green} [{elapsed_precise}] {msg}")
            .unwrap_or_else(|_| ProgressStyle::default_spinner())
            .tick_chars("⠋⠙⠹⠸⠼⠴⠦⠧⠇⠏");
        bar.set_style(style);
        bar.enable_steady_tick(Duration::from_millis(100));

        Self {
            bar,
            stop: Arc::new(AtomicBool::new(false)),
        }
    }

    /// Whether the display has been finished
    pub fn is_stopped(&self) -> bool {
        self.stop.load(Ordering::SeqCst)
    }

    /// Update the progress display
    pub fn update(&self, progress: &WalkProgress) {
        if self.is_stopped() {
            return;
        }
        self.bar.set_message(render(progress));
    }

    /// Set a status message
    pub fn set_status(&self, status: &str) {
        self.bar.set_message(status.to_string());
    }

    /// Finish the progress display with a final message
    pub fn finish(&self, message: &str) {
        self.stop.store(true, Ordering::SeqCst);
        self.bar.finish_with_message(message.to_string());
    }

    /// Finish and clear the progress display
    pub fn finish_and_clear(&self) {
        self.stop.store(true, Ordering::SeqCst);
        self.bar.finish_and_clear();
    }

    /// Print a line above the spinner without tearing it
    pub fn println(&self, line: &str) {
        self.bar.println(line);
    }
}

impl Default for ProgressReporter {
    fn default() -> Self {
        Self::new()
    }
}

fn render(progress: &WalkProgress) -> String {
    format!(
        "Expanded: {} | Leaves: {} | Failed: {} | Rate: {:.0}/s | In flight: {}/{}",
        format_number(progress.expanded),
        format_number(progress.leaves),
        format_number(progress.failures),
        progress.leaves_per_second(),
        progress.in_flight,
        progress.total_workers,
    )
}

/// Format a number with thousands separators
pub fn format_number(n: u64) -> String {
    let s = n.to_string();
    let mut out = String::with_capacity(s.len() + s.len() / 3);

    for (i, c) in s.chars().enumerate() {
        if i > 0 && (s.len() - i) % 3 == 0 {
            out.push(',');
        }
        out.push(c);
    }
    out
}

/// Print a summary of the walk results
pub fn print_summary(summary: &WalkSummary, total_bytes: u64, duration: Duration, completed: bool) {
    let duration_secs = duration.as_secs_f64();
    let rate = if duration_secs > 0.0 {
        summary.leaves_found as f64 / duration_secs
    } else {
        0.0
    };

    println!();
    if completed {
        println!("{}", style("Walk Complete").green().bold());
    } else {
        println!("{}", style("Walk Interrupted").yellow().bold());
    }
    println!("{}", style("─".repeat(50)).dim());
    println!(
        "  {} {}",
        style("Directories:").bold(),
        format_number(summary.nodes_expanded)
    );
    println!(
        "  {} {}",
        style("Files:").bold(),
        format_number(summary.leaves_found)
    );
    println!(
        "  {} {}",
        style("Total Size:").bold(),
        format_size(total_bytes, BINARY)
    );
    println!(
        "  {} {:.1}s ({:.0} files/sec)",
        style("Duration:").bold(),
        duration_secs,
        rate
    );
    println!(
        "  {} {}",
        style("Peak in flight:").bold(),
        summary.peak_in_flight
    );
    if summary.rounds > 0 {
        println!("  {} {}", style("Rounds:").bold(), summary.rounds);
    }
    if summary.failures > 0 {
        println!(
            "  {} {}",
            style("Errors:").yellow().bold(),
            format_number(summary.failures)
        );
    }
    if summary.skipped > 0 {
        println!(
            "  {} {}",
            style("Skipped:").yellow().bold(),
            format_number(summary.skipped)
        );
    }
    println!();
}

/// Print the nodes that failed to expand
pub fn print_failures<N: Debug>(failures: &[NodeFailure<N>]) {
    if failures.is_empty() {
        return;
    }

    println!("{}", style("Failures").red().bold());
    for failure in failures.iter().take(MAX_LISTED_FAILURES) {
        println!(
            "  {} {:?}: {}",
            style(format!("[{}]", failure.kind())).red(),
            failure.node,
            failure.error
        );
    }
    if failures.len() > MAX_LISTED_FAILURES {
        println!(
            "  {}",
            style(format!("... and {} more", failures.len() - MAX_LISTED_FAILURES)).dim()
        );
    }
    println!();
}

/// Print a header at the start of the walk
pub fn print_header(root: &Path, strategy: Strategy, workers: usize) {
    println!();
    println!(
        "{} {}",
        style("fanout-walker").cyan().bold(),
        env!("CARGO_PKG_VERSION")
    );
    println!("{}", style("─".repeat(50)).dim());
    println!("  {} {}", style("Root:").bold(), root.display());
    println!("  {} {}", style("Strategy:").bold(), strategy);
    println!("  {} {}", style("Workers:").bold(), workers);
    println!();
}
