//! Walk coordinator - picks a scheduler and assembles the report
//!
//! The coordinator is responsible for:
//! - Owning the shared statistics and the shutdown flag
//! - Running the configured scheduler over a tree source
//! - Turning the drained aggregate into a [`WalkReport`]

use crate::config::{Scheduling, Strategy};
use crate::error::{NodeFailure, Result, WorkerError};
use crate::source::{LeafSink, NullSink, TreeSource};
use crate::walker::aggregate::Harvest;
use crate::walker::batch::BatchScheduler;
use crate::walker::pool::PoolScheduler;
use crate::walker::worker::{WalkStats, WalkSummary};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::info;

/// What a scheduler hands back to the coordinator
pub(crate) struct SchedulerOutput<N, L> {
    pub harvest: Harvest<N, L>,
    pub worker_errors: Vec<WorkerError>,
    pub completed: bool,
}

/// Result of a finished walk
#[derive(Debug)]
pub struct WalkReport<N, L> {
    /// Every leaf discovered, unordered
    pub leaves: Vec<L>,

    /// Nodes that failed to expand
    pub failures: Vec<NodeFailure<N>>,

    /// Nodes never expanded because the walk was interrupted
    pub pending: Vec<N>,

    /// Workers that died or could not start
    pub worker_errors: Vec<WorkerError>,

    /// Final counters
    pub summary: WalkSummary,

    /// Time taken for the walk
    pub duration: Duration,

    /// Whether the walk completed (vs was interrupted)
    pub completed: bool,
}

impl<N, L> WalkReport<N, L> {
    /// Completed with no failed node and no lost worker
    pub fn is_clean(&self) -> bool {
        self.completed && self.failures.is_empty() && self.worker_errors.is_empty()
    }
}

/// Coordinates one walk
pub struct WalkCoordinator {
    /// Scheduler and its bound
    scheduling: Scheduling,

    /// Counters shared with every worker
    stats: Arc<WalkStats>,

    /// Shutdown signal
    shutdown: Arc<AtomicBool>,
}

impl WalkCoordinator {
    /// Create a new walk coordinator
    pub fn new(scheduling: Scheduling) -> Self {
        Self {
            scheduling,
            stats: Arc::new(WalkStats::default()),
            shutdown: Arc::new(AtomicBool::new(false)),
        }
    }

    /// Get a clone of the shutdown flag (for signal handlers)
    pub fn shutdown_flag(&self) -> Arc<AtomicBool> {
        Arc::clone(&self.shutdown)
    }

    /// Get the live counters (for progress display)
    pub fn stats(&self) -> Arc<WalkStats> {
        Arc::clone(&self.stats)
    }

    pub fn scheduling(&self) -> Scheduling {
        self.scheduling
    }

    /// Walk without streaming leaves anywhere
    pub fn walk<S: TreeSource>(self, source: &S, root: S::Node) -> Result<WalkReport<S::Node, S::Leaf>> {
        self.run(source, root, &mut NullSink)
    }

    /// Walk the tree from `root`, emitting every leaf into `sink` once
    pub fn run<S, K>(self, source: &S, root: S::Node, sink: &mut K) -> Result<WalkReport<S::Node, S::Leaf>>
    where
        S: TreeSource,
        K: LeafSink<S::Leaf> + Send,
    {
        let start_time = Instant::now();
        let concurrency = self.scheduling.concurrency();

        info!(
            strategy = %self.scheduling.strategy(),
            concurrency,
            root = ?root,
            "Starting walk"
        );

        let output = match self.scheduling.strategy() {
            Strategy::Batch => {
                BatchScheduler::new(concurrency, self.stats(), self.shutdown_flag())
                    .run(source, root, sink)?
            }
            Strategy::Pool => {
                PoolScheduler::new(concurrency, self.stats(), self.shutdown_flag())
                    .run(source, root, sink)?
            }
        };

        let duration = start_time.elapsed();
        let summary = self.stats.summary();

        info!(
            expanded = summary.nodes_expanded,
            leaves = output.harvest.leaves.len(),
            failures = output.harvest.failures.len(),
            peak_in_flight = summary.peak_in_flight,
            duration_ms = duration.as_millis() as u64,
            completed = output.completed,
            "Walk finished"
        );

        Ok(WalkReport {
            leaves: output.harvest.leaves,
            failures: output.harvest.failures,
            pending: output.harvest.pending,
            worker_errors: output.worker_errors,
            summary,
            duration,
            completed: output.completed,
        })
    }
}

/// Progress information for display
#[derive(Debug, Clone)]
pub struct WalkProgress {
    /// Nodes expanded
    pub expanded: u64,

    /// Leaves found
    pub leaves: u64,

    /// Failed expansions
    pub failures: u64,

    /// Expansions running right now
    pub in_flight: usize,

    /// Concurrency bound
    pub total_workers: usize,

    /// Elapsed time
    pub elapsed: Duration,
}

impl WalkProgress {
    /// Read the live counters
    pub fn capture(stats: &WalkStats, total_workers: usize, elapsed: Duration) -> Self {
        Self {
            expanded: stats.nodes_expanded.load(Ordering::Relaxed),
            leaves: stats.leaves_found.load(Ordering::Relaxed),
            failures: stats.failures.load(Ordering::Relaxed),
            in_flight: stats.in_flight.load(Ordering::Relaxed),
            total_workers,
            elapsed,
        }
    }

    /// Calculate leaves per second rate
    pub fn leaves_per_second(&self) -> f64 {
        let secs = self.elapsed.as_secs_f64();
        if secs > 0.0 {
            self.leaves as f64 / secs
        } else {
            0.0
        }
    }

    /// Calculate expansions per second rate
    pub fn expansions_per_second(&self) -> f64 {
        let secs = self.elapsed.as_secs_f64();
        if secs > 0.0 {
            self.expanded as f64 / secs
        } else {
            0.0
        }
    }
}
