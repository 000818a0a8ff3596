//! Barrier-synchronised batch scheduler
//!
//! Each round takes at most K pending branches from the aggregate,
//! expands them on K scoped threads, and waits for every one of them
//! before starting the next round. Peak concurrency is therefore exactly
//! bounded by K without a semaphore.
//!
//! ```text
//! Idle → Dispatching(batch) → Awaiting(batch) → Collecting ─┬→ Dispatching(next)
//!                                                           └→ Done
//! ```

use crate::error::{Result, WorkerError};
use crate::source::{LeafSink, TreeSource};
use crate::walker::aggregate::SharedAggregate;
use crate::walker::coordinator::SchedulerOutput;
use crate::walker::worker::{expand_one, LeafEmitter, WalkStats, Worker};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread;
use tracing::{debug, info, warn};

/// Expands the frontier in rounds of at most `limit` nodes
pub struct BatchScheduler {
    /// Concurrency bound K
    limit: usize,

    /// Shared counters
    stats: Arc<WalkStats>,

    /// Checked between rounds
    shutdown: Arc<AtomicBool>,
}

impl BatchScheduler {
    pub fn new(limit: usize, stats: Arc<WalkStats>, shutdown: Arc<AtomicBool>) -> Self {
        Self {
            limit: limit.max(1),
            stats,
            shutdown,
        }
    }

    /// Walk from `root` and emit every leaf into `sink` after the walk
    pub(crate) fn run<S, K>(&self, source: &S, root: S::Node, sink: &mut K) -> Result<SchedulerOutput<S::Node, S::Leaf>>
    where
        S: TreeSource,
        K: LeafSink<S::Leaf>,
    {
        let aggregate = SharedAggregate::new();
        aggregate.put_branch(root);

        let mut worker_errors = Vec::new();
        let mut completed = true;

        while !aggregate.is_branches_empty() {
            if self.shutdown.load(Ordering::Relaxed) {
                info!(pending = aggregate.pending_len(), "Shutdown signal received");
                completed = false;
                break;
            }

            let batch = aggregate.take_branches(self.limit);
            self.stats.record_round();
            debug!(
                size = batch.len(),
                pending = aggregate.pending_len(),
                "Dispatching batch"
            );

            worker_errors.extend(self.run_round(source, batch, &aggregate)?);
        }

        let harvest = aggregate.drain()?;
        let mut emitter = LeafEmitter::new(sink);
        for leaf in &harvest.leaves {
            emitter.emit(leaf);
        }
        worker_errors.extend(emitter.finish());

        Ok(SchedulerOutput {
            harvest,
            worker_errors,
            completed,
        })
    }

    /// Expand one batch concurrently and wait for all of it
    fn run_round<S>(
        &self,
        source: &S,
        batch: Vec<S::Node>,
        aggregate: &SharedAggregate<S::Node, S::Leaf>,
    ) -> Result<Vec<WorkerError>>
    where
        S: TreeSource,
    {
        let stats = &*self.stats;

        thread::scope(|s| -> Result<Vec<WorkerError>> {
            let mut workers = Vec::with_capacity(batch.len());
            for (id, node) in batch.into_iter().enumerate() {
                let worker = Worker::spawn(s, id, move || {
                    expand_one(source, node, aggregate, stats);
                    Ok(())
                })?;
                workers.push(worker);
            }

            // Barrier: the round ends only when every worker is done
            let mut errors = Vec::new();
            for worker in workers {
                if let Err(e) = worker.join() {
                    warn!(error = %e, "Worker failed to join cleanly");
                    errors.push(e);
                }
            }
            Ok(errors)
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ExpandError;
    use crate::source::{Expansion, MemoryTree, NullSink};
    use std::sync::atomic::AtomicUsize;
    use std::time::Duration;

    /// Wraps a source and records how many expansions overlap
    struct Gauged<'a> {
        inner: &'a MemoryTree,
        current: AtomicUsize,
        peak: AtomicUsize,
    }

    impl TreeSource for Gauged<'_> {
        type Node = String;
        type Leaf = String;

        fn expand(&self, node: &String) -> std::result::Result<Expansion<String, String>, ExpandError> {
            let now = self.current.fetch_add(1, Ordering::SeqCst) + 1;
            self.peak.fetch_max(now, Ordering::SeqCst);
            thread::sleep(Duration::from_millis(2));
            self.current.fetch_sub(1, Ordering::SeqCst);
            self.inner.expand(node)
        }
    }

    fn scheduler(limit: usize) -> BatchScheduler {
        BatchScheduler::new(
            limit,
            Arc::new(WalkStats::default()),
            Arc::new(AtomicBool::new(false)),
        )
    }

    #[test]
    fn test_batch_bounded_concurrency() {
        let tree = MemoryTree::uniform(3, 4, 1);
        let gauged = Gauged {
            inner: &tree,
            current: AtomicUsize::new(0),
            peak: AtomicUsize::new(0),
        };

        for limit in [1, 2, 4] {
            gauged.peak.store(0, Ordering::SeqCst);
            let sched = scheduler(limit);
            let out = sched.run(&gauged, "r".to_string(), &mut NullSink).unwrap();

            assert!(out.completed);
            assert_eq!(out.harvest.leaves.len(), tree.len());
            assert!(gauged.peak.load(Ordering::SeqCst) <= limit);
            assert!(sched.stats.summary().peak_in_flight <= limit);
        }
    }

    #[test]
    fn test_batch_rounds() {
        // 1 + 2 + 4 nodes, K = 2: rounds of 1, 2, 2, 2
        let tree = MemoryTree::uniform(2, 2, 0);
        let sched = scheduler(2);
        let out = sched.run(&tree, "r".to_string(), &mut NullSink).unwrap();

        assert!(out.harvest.leaves.is_empty());
        assert_eq!(sched.stats.summary().rounds, 4);
        assert_eq!(sched.stats.summary().nodes_expanded, 7);
    }

    #[test]
    fn test_batch_emits_after_walk() {
        let tree = MemoryTree::new()
            .with_node("root", ["x"], ["a"])
            .with_node("a", ["a1", "a2"], Vec::<&str>::new());

        let mut emitted = Vec::new();
        let out = scheduler(4)
            .run(&tree, "root".to_string(), &mut |leaf: &String| emitted.push(leaf.clone()))
            .unwrap();

        emitted.sort();
        let mut leaves = out.harvest.leaves;
        leaves.sort();
        assert_eq!(emitted, vec!["a1", "a2", "x"]);
        assert_eq!(emitted, leaves);
    }
}
