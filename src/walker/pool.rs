//! Persistent-worker scheduler
//!
//! N long-lived workers share one [`BlockingQueue`] of nodes. Each worker
//! loops: receive a node, expand it, push discovered branches back onto
//! the same queue, stream discovered leaves to an emitter thread.
//!
//! ```text
//!              ┌──────────────────────────────┐
//!     seed ──► │  BlockingQueue<Message<N>>   │ ◄──── branches
//!              └──────────────┬───────────────┘          │
//!                             │ receive                  │
//!        ┌────────────────────┼────────────────────┐     │
//!   ┌────▼────┐          ┌────▼────┐          ┌────▼────┐│
//!   │Worker 0 │          │Worker 1 │   ...    │Worker N ├┘
//!   └────┬────┘          └────┬────┘          └────┬────┘
//!        └──────── leaves ────┼────────────────────┘
//!                        ┌────▼─────┐
//!                        │ emitter  │ ──► LeafSink
//!                        └──────────┘
//! ```
//!
//! The coordinator waits on the [`TerminationDetector`] and, once no node
//! is queued or being expanded, sends one poison pill per worker.

use crate::error::{panic_message, ExpandError, ExpandOutcome, InvariantViolation, Result, WorkerError};
use crate::source::{LeafSink, TreeSource};
use crate::walker::aggregate::SharedAggregate;
use crate::walker::coordinator::SchedulerOutput;
use crate::walker::queue::{BlockingQueue, Message};
use crate::walker::termination::{Completion, TerminationDetector};
use crate::walker::worker::{expand_one, LeafEmitter, Route, WalkStats, Worker};
use crossbeam_channel::{unbounded, Sender};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread;
use std::time::Duration;
use tracing::{debug, info, warn};

/// How often the coordinator re-checks the shutdown flag while waiting
const POLL_INTERVAL: Duration = Duration::from_millis(100);

/// Routing used by pool workers
struct PoolRoute<'a, N, L> {
    queue: &'a BlockingQueue<Message<N>>,
    detector: &'a TerminationDetector,
    aggregate: &'a SharedAggregate<N, L>,
    leaves: Sender<L>,
}

impl<N, L> Route<N, L> for PoolRoute<'_, N, L> {
    fn leaf(&self, leaf: L) {
        if self.leaves.send(leaf).is_err() {
            debug!("Leaf emitter gone, dropping leaf");
        }
    }

    fn branch(&self, node: N) {
        // Counted before it becomes visible, so the parent's completion
        // can never make the tally reach zero while the child is pending
        self.detector.schedule();
        self.queue.send_work(node);
    }

    fn failure(&self, node: N, error: ExpandError) {
        self.aggregate.record_failure(node, error);
    }
}

/// Fixed pool of workers fed from a shared blocking queue
pub struct PoolScheduler {
    /// Pool size N
    workers: usize,

    /// Shared counters
    stats: Arc<WalkStats>,

    /// Interrupt flag
    shutdown: Arc<AtomicBool>,
}

impl PoolScheduler {
    pub fn new(workers: usize, stats: Arc<WalkStats>, shutdown: Arc<AtomicBool>) -> Self {
        Self {
            workers: workers.max(1),
            stats,
            shutdown,
        }
    }

    /// Walk from `root`, streaming every leaf into `sink` as it is found
    pub(crate) fn run<S, K>(&self, source: &S, root: S::Node, sink: &mut K) -> Result<SchedulerOutput<S::Node, S::Leaf>>
    where
        S: TreeSource,
        K: LeafSink<S::Leaf> + Send,
    {
        let queue = BlockingQueue::new();
        let detector = TerminationDetector::new();
        let aggregate = SharedAggregate::new();
        let stats = &*self.stats;
        let shutdown = &*self.shutdown;

        detector.schedule();
        queue.send_work(root);

        let (completion, worker_errors) = thread::scope(|s| -> Result<_> {
            let (leaf_tx, leaf_rx) = unbounded::<S::Leaf>();

            let emitter = {
                let aggregate = &aggregate;
                thread::Builder::new()
                    .name("leaf-emitter".into())
                    .spawn_scoped(s, move || {
                        let mut emitter = LeafEmitter::new(sink);
                        for leaf in leaf_rx {
                            emitter.emit(&leaf);
                            aggregate.put_leaf(leaf);
                        }
                        emitter.finish()
                    })?
            };

            let mut workers = Vec::with_capacity(self.workers);
            let mut worker_errors = Vec::new();

            for id in 0..self.workers {
                let presence = detector.enlist();
                let route = PoolRoute {
                    queue: &queue,
                    detector: &detector,
                    aggregate: &aggregate,
                    leaves: leaf_tx.clone(),
                };

                let spawned = Worker::spawn(s, id, move || {
                    let _presence = presence;
                    worker_loop(id, source, &route, stats, shutdown)
                });

                match spawned {
                    Ok(worker) => workers.push(worker),
                    Err(e) => {
                        warn!(error = %e, "Failed to spawn worker");
                        worker_errors.push(e);
                        break;
                    }
                }
            }
            drop(leaf_tx);

            info!(count = workers.len(), "Workers spawned");

            let completion = loop {
                if shutdown.load(Ordering::Relaxed) {
                    info!("Shutdown signal received");
                    break None;
                }
                if let Some(done) = detector.wait_timeout(POLL_INTERVAL) {
                    break Some(done);
                }
            };

            queue.broadcast_shutdown(workers.len());

            for worker in workers {
                if let Err(e) = worker.join() {
                    warn!(error = %e, "Worker failed to join cleanly");
                    worker_errors.push(e);
                }
            }

            // Every route sender is gone now, so the emitter drains and exits
            match emitter.join() {
                Ok(sink_failure) => worker_errors.extend(sink_failure),
                Err(payload) => worker_errors.push(WorkerError::EmitterPanicked {
                    message: panic_message(payload.as_ref()),
                }),
            }

            Ok((completion, worker_errors))
        })?;

        // Work enqueued behind the poison pills of an interrupted walk
        while let Some(message) = queue.try_receive() {
            if let Message::Work(node) = message {
                aggregate.put_branch(node);
            }
        }

        match completion {
            Some(Completion::Abandoned) => return Err(WorkerError::AllWorkersDead.into()),
            Some(Completion::Faulted(violation)) => return Err(violation.into()),
            Some(Completion::Finished) | None => {}
        }

        debug!(
            waits = queue.stats().wait_count(),
            dequeued = queue.stats().throughput(),
            "Queue drained"
        );

        // Nodes skipped after the shutdown flag still balance the detector,
        // so it can report Finished for a walk that was cut short
        let harvest = aggregate.drain()?;
        let completed = detector.is_complete() && harvest.pending.is_empty();

        Ok(SchedulerOutput {
            harvest,
            worker_errors,
            completed,
        })
    }
}

/// Main worker loop
fn worker_loop<S: TreeSource>(
    id: usize,
    source: &S,
    route: &PoolRoute<'_, S::Node, S::Leaf>,
    stats: &WalkStats,
    shutdown: &AtomicBool,
) -> std::result::Result<(), WorkerError> {
    debug!(worker = id, "Worker starting");
    let mut expanded = 0u64;

    loop {
        let node = match route.queue.receive() {
            Message::Work(node) => node,
            Message::Shutdown => break,
        };

        // Held until this node's branches are scheduled
        let _active = route
            .detector
            .begin()
            .map_err(|violation: InvariantViolation| WorkerError::Invariant {
                id,
                source: violation,
            })?;

        let outcome = if shutdown.load(Ordering::Relaxed) {
            stats.record_skip();
            route.aggregate.put_branch(node);
            ExpandOutcome::Skipped
        } else {
            expand_one(source, node, route, stats)
        };

        if outcome.is_success() {
            expanded += 1;
        }
    }

    debug!(worker = id, expanded, "Worker shutting down");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::source::{Expansion, MemoryTree, NullSink};
    use std::collections::HashSet;
    use std::sync::atomic::AtomicUsize;

    fn scheduler(workers: usize) -> PoolScheduler {
        PoolScheduler::new(
            workers,
            Arc::new(WalkStats::default()),
            Arc::new(AtomicBool::new(false)),
        )
    }

    #[test]
    fn test_pool_terminates_and_is_complete() {
        for workers in [1, 2, 4, 16] {
            let tree = MemoryTree::uniform(4, 3, 2);
            let sched = scheduler(workers);
            let out = sched.run(&tree, "r".to_string(), &mut NullSink).unwrap();

            assert!(out.completed);
            assert!(out.worker_errors.is_empty());
            assert!(out.harvest.pending.is_empty());

            let got: HashSet<String> = out.harvest.leaves.iter().cloned().collect();
            let want: HashSet<String> = tree.reachable_leaves("r").into_iter().collect();
            assert_eq!(out.harvest.leaves.len(), want.len());
            assert_eq!(got, want);
            assert!(sched.stats.summary().peak_in_flight <= workers);
        }
    }

    #[test]
    fn test_pool_streams_each_leaf_once() {
        let tree = MemoryTree::uniform(3, 2, 3);
        let mut emitted = Vec::new();

        let out = scheduler(4)
            .run(&tree, "r".to_string(), &mut |leaf: &String| emitted.push(leaf.clone()))
            .unwrap();

        let unique: HashSet<&String> = emitted.iter().collect();
        assert_eq!(unique.len(), emitted.len());
        assert_eq!(emitted.len(), out.harvest.leaves.len());
        assert_eq!(emitted.len(), 15 * 3);
    }

    #[test]
    fn test_pool_isolated_failure() {
        let tree = MemoryTree::new()
            .with_node("root", ["x"], ["A", "B"])
            .with_node("A", ["a1", "a2"], Vec::<&str>::new())
            .with_node("B", ["b1"], ["B/c"])
            .with_failure(
                "B/c",
                ExpandError::Io {
                    node: "B/c".into(),
                    reason: "simulated".into(),
                },
            );

        let out = scheduler(2).run(&tree, "root".to_string(), &mut NullSink).unwrap();

        let mut leaves = out.harvest.leaves;
        leaves.sort();
        assert_eq!(leaves, vec!["a1", "a2", "b1", "x"]);
        assert_eq!(out.harvest.failures.len(), 1);
        assert_eq!(out.harvest.failures[0].node, "B/c");
    }

    /// Source that sleeps so several workers are busy while the queue is empty
    struct Slow {
        inner: MemoryTree,
        calls: AtomicUsize,
    }

    impl TreeSource for Slow {
        type Node = String;
        type Leaf = String;

        fn expand(&self, node: &String) -> std::result::Result<Expansion<String, String>, ExpandError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            thread::sleep(Duration::from_millis(5));
            self.inner.expand(node)
        }
    }

    #[test]
    fn test_pool_empty_queue_is_not_done() {
        // Narrow chain: the queue is empty most of the time while one worker
        // is still expanding
        let mut tree = MemoryTree::new();
        for i in 0..10 {
            let next = format!("n{}", i + 1);
            tree = tree.with_node(&format!("n{}", i), [format!("leaf{}", i)], [next]);
        }
        tree = tree.with_node("n10", ["leaf10"], Vec::<&str>::new());

        let slow = Slow {
            inner: tree,
            calls: AtomicUsize::new(0),
        };
        let out = scheduler(8).run(&slow, "n0".to_string(), &mut NullSink).unwrap();

        assert!(out.completed);
        assert_eq!(out.harvest.leaves.len(), 11);
        assert_eq!(slow.calls.load(Ordering::SeqCst), 11);
    }

    /// Raises the shutdown flag inside an expansion that outlasts the
    /// coordinator's poll, so the pills are queued ahead of its branches
    struct Interrupting {
        inner: MemoryTree,
        shutdown: Arc<AtomicBool>,
    }

    impl TreeSource for Interrupting {
        type Node = String;
        type Leaf = String;

        fn expand(&self, node: &String) -> std::result::Result<Expansion<String, String>, ExpandError> {
            self.shutdown.store(true, Ordering::SeqCst);
            thread::sleep(POLL_INTERVAL * 3);
            self.inner.expand(node)
        }
    }

    #[test]
    fn test_branches_behind_pills_become_pending() {
        let shutdown = Arc::new(AtomicBool::new(false));
        let sched = PoolScheduler::new(1, Arc::new(WalkStats::default()), Arc::clone(&shutdown));
        let source = Interrupting {
            inner: MemoryTree::uniform(2, 3, 1),
            shutdown,
        };

        let out = sched.run(&source, "r".to_string(), &mut NullSink).unwrap();

        assert!(!out.completed);
        assert_eq!(out.harvest.leaves, vec!["r#0"]);
        let mut pending = out.harvest.pending;
        pending.sort();
        assert_eq!(pending, vec!["r/0", "r/1", "r/2"]);
        assert_eq!(sched.stats.summary().nodes_expanded, 1);
    }
}
