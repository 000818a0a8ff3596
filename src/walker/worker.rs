//! Expansion task and worker threads
//!
//! A single expansion:
//! - Calls the tree source exactly once for one node
//! - Routes leaves and branches to wherever the active scheduler wants them
//! - Turns a failure (or a panic inside the source) into a recorded
//!   [`NodeFailure`](crate::error::NodeFailure) instead of unwinding
//!   across the pool

use crate::error::{panic_message, ExpandError, ExpandOutcome, WorkerError};
use crate::source::{LeafSink, TreeSource};
use crate::walker::aggregate::SharedAggregate;
use std::panic::{self, AssertUnwindSafe};
use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};
use std::thread::{self, Scope, ScopedJoinHandle};
use tracing::{trace, warn};

/// Destination for the children of an expanded node
pub trait Route<N, L> {
    /// Accept one discovered leaf
    fn leaf(&self, leaf: L);

    /// Accept one branch that still needs expanding
    fn branch(&self, node: N);

    /// Accept a node whose expansion failed
    fn failure(&self, node: N, error: ExpandError);

    /// Accept all leaves of one expansion
    fn leaves(&self, leaves: Vec<L>) {
        for leaf in leaves {
            self.leaf(leaf);
        }
    }

    /// Accept all branches of one expansion
    fn branches(&self, nodes: Vec<N>) {
        for node in nodes {
            self.branch(node);
        }
    }
}

/// Batch routing: everything lands in the aggregate
impl<N, L> Route<N, L> for SharedAggregate<N, L> {
    fn leaf(&self, leaf: L) {
        self.put_leaf(leaf);
    }

    fn branch(&self, node: N) {
        self.put_branch(node);
    }

    fn failure(&self, node: N, error: ExpandError) {
        self.record_failure(node, error);
    }

    fn leaves(&self, leaves: Vec<L>) {
        self.put_leaves(leaves);
    }
}

/// Counters shared by every worker of one walk
#[derive(Debug, Default)]
pub struct WalkStats {
    /// Nodes expanded successfully
    pub nodes_expanded: AtomicU64,

    /// Leaves found
    pub leaves_found: AtomicU64,

    /// Branches found
    pub branches_found: AtomicU64,

    /// Expansions that failed
    pub failures: AtomicU64,

    /// Nodes dropped without expanding (interrupted walk)
    pub skipped: AtomicU64,

    /// Barrier rounds (batch scheduler only)
    pub rounds: AtomicU64,

    /// Expansions running right now
    pub in_flight: AtomicUsize,

    /// Highest value `in_flight` ever reached
    pub peak_in_flight: AtomicUsize,
}

impl WalkStats {
    /// Mark an expansion as running until the guard drops
    pub fn begin_expansion(&self) -> InFlightGuard<'_> {
        let now = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
        self.peak_in_flight.fetch_max(now, Ordering::SeqCst);
        InFlightGuard { stats: self }
    }

    fn record_expanded(&self, leaves: usize, branches: usize) {
        self.nodes_expanded.fetch_add(1, Ordering::Relaxed);
        self.leaves_found.fetch_add(leaves as u64, Ordering::Relaxed);
        self.branches_found
            .fetch_add(branches as u64, Ordering::Relaxed);
    }

    fn record_failure(&self) {
        self.failures.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn record_skip(&self) {
        self.skipped.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn record_round(&self) {
        self.rounds.fetch_add(1, Ordering::Relaxed);
    }

    /// Plain snapshot of the counters
    pub fn summary(&self) -> WalkSummary {
        WalkSummary {
            nodes_expanded: self.nodes_expanded.load(Ordering::Relaxed),
            leaves_found: self.leaves_found.load(Ordering::Relaxed),
            branches_found: self.branches_found.load(Ordering::Relaxed),
            failures: self.failures.load(Ordering::Relaxed),
            skipped: self.skipped.load(Ordering::Relaxed),
            rounds: self.rounds.load(Ordering::Relaxed),
            peak_in_flight: self.peak_in_flight.load(Ordering::SeqCst),
        }
    }
}

/// Decrements `in_flight` on drop
pub struct InFlightGuard<'a> {
    stats: &'a WalkStats,
}

impl Drop for InFlightGuard<'_> {
    fn drop(&mut self) {
        self.stats.in_flight.fetch_sub(1, Ordering::SeqCst);
    }
}

/// Snapshot of [`WalkStats`]
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct WalkSummary {
    pub nodes_expanded: u64,
    pub leaves_found: u64,
    pub branches_found: u64,
    pub failures: u64,
    pub skipped: u64,
    pub rounds: u64,
    pub peak_in_flight: usize,
}

/// Expand one node and route its children
///
/// Ownership of `node` moves in here and ends either in `route` (as a
/// failure) or is dropped after its children were routed.
pub fn expand_one<S, R>(source: &S, node: S::Node, route: &R, stats: &WalkStats) -> ExpandOutcome
where
    S: TreeSource + ?Sized,
    R: Route<S::Node, S::Leaf> + ?Sized,
{
    let result = {
        let _in_flight = stats.begin_expansion();
        panic::catch_unwind(AssertUnwindSafe(|| source.expand(&node)))
    };

    let result = result.unwrap_or_else(|payload| {
        Err(ExpandError::Panicked {
            node: format!("{:?}", node),
            message: panic_message(payload.as_ref()),
        })
    });

    match result {
        Ok(expansion) => {
            let leaves = expansion.leaves.len();
            let branches = expansion.branches.len();
            stats.record_expanded(leaves, branches);

            route.leaves(expansion.leaves);
            route.branches(expansion.branches);

            trace!(node = ?node, leaves, branches, "Node expanded");
            ExpandOutcome::Expanded { leaves, branches }
        }
        Err(error) => {
            stats.record_failure();
            let kind = error.kind();
            warn!(node = ?node, error = %error, "Node failed");
            route.failure(node, error);
            ExpandOutcome::Failed { kind }
        }
    }
}

/// Feeds leaves into a [`LeafSink`], containing a panic raised by it
///
/// After the first panic the sink is never called again. The caller keeps
/// every leaf regardless, so the report stays complete.
pub struct LeafEmitter<'a, K> {
    sink: &'a mut K,
    emitted: u64,
    failure: Option<WorkerError>,
}

impl<'a, K> LeafEmitter<'a, K> {
    pub fn new(sink: &'a mut K) -> Self {
        Self {
            sink,
            emitted: 0,
            failure: None,
        }
    }

    /// Hand one leaf to the sink unless it already failed
    pub fn emit<L>(&mut self, leaf: &L)
    where
        K: LeafSink<L>,
    {
        if self.failure.is_some() {
            return;
        }

        let sink = &mut *self.sink;
        match panic::catch_unwind(AssertUnwindSafe(|| sink.emit(leaf))) {
            Ok(()) => self.emitted += 1,
            Err(payload) => {
                let message = panic_message(payload.as_ref());
                warn!(
                    emitted = self.emitted,
                    message = %message,
                    "Leaf sink panicked, no further leaves will be emitted"
                );
                self.failure = Some(WorkerError::EmitterPanicked { message });
            }
        }
    }

    /// Leaves the sink accepted
    pub fn emitted(&self) -> u64 {
        self.emitted
    }

    /// The sink's panic, if it raised one
    pub fn finish(self) -> Option<WorkerError> {
        self.failure
    }
}

/// A named worker thread inside a [`std::thread::scope`]
pub struct Worker<'scope> {
    /// Worker ID
    id: usize,

    /// Thread handle
    handle: Option<ScopedJoinHandle<'scope, Result<(), WorkerError>>>,
}

impl<'scope> Worker<'scope> {
    /// Spawn a new worker thread running `body`
    pub fn spawn<'env, F>(scope: &'scope Scope<'scope, 'env>, id: usize, body: F) -> Result<Self, WorkerError>
    where
        F: FnOnce() -> Result<(), WorkerError> + Send + 'scope,
    {
        let handle = thread::Builder::new()
            .name(format!("walker-{}", id))
            .spawn_scoped(scope, body)
            .map_err(|e| WorkerError::InitFailed {
                id,
                reason: e.to_string(),
            })?;

        Ok(Self {
            id,
            handle: Some(handle),
        })
    }

    /// Get worker ID
    pub fn id(&self) -> usize {
        self.id
    }

    /// Wait for the worker to finish
    pub fn join(mut self) -> Result<(), WorkerError> {
        if let Some(handle) = self.handle.take() {
            match handle.join() {
                Ok(result) => result,
                Err(payload) => Err(WorkerError::Panicked {
                    id: self.id,
                    message: panic_message(payload.as_ref()),
                }),
            }
        } else {
            Ok(())
        }
    }
}
