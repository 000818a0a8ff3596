//! Shared result state of a walk
//!
//! Every operation takes the single internal lock for its whole
//! duration and only exposes compound operations, so no caller can
//! observe a half-applied update or race between "check" and "act".

use crate::error::{ExpandError, InvariantViolation, NodeFailure};
use parking_lot::Mutex;

/// Everything a walk accumulated, moved out by [`SharedAggregate::drain`]
#[derive(Debug)]
pub struct Harvest<N, L> {
    /// Discovered leaves, unordered
    pub leaves: Vec<L>,

    /// Branches never expanded (non-empty only after an interrupted walk)
    pub pending: Vec<N>,

    /// Nodes whose expansion failed
    pub failures: Vec<NodeFailure<N>>,
}

#[derive(Debug)]
struct State<N, L> {
    leaves: Vec<L>,
    branches: Vec<N>,
    failures: Vec<NodeFailure<N>>,
    drained: bool,
}

/// Mutex-guarded accumulator of leaves, pending branches and failures
#[derive(Debug)]
pub struct SharedAggregate<N, L> {
    state: Mutex<State<N, L>>,
}

impl<N, L> SharedAggregate<N, L> {
    pub fn new() -> Self {
        Self {
            state: Mutex::new(State {
                leaves: Vec::new(),
                branches: Vec::new(),
                failures: Vec::new(),
                drained: false,
            }),
        }
    }

    /// Append a discovered leaf
    pub fn put_leaf(&self, leaf: L) {
        self.state.lock().leaves.push(leaf);
    }

    /// Append several leaves under one lock acquisition
    pub fn put_leaves(&self, leaves: impl IntoIterator<Item = L>) {
        self.state.lock().leaves.extend(leaves);
    }

    /// Append a branch to the pending set
    pub fn put_branch(&self, node: N) {
        self.state.lock().branches.push(node);
    }

    /// Remove and return up to `n` pending branches
    ///
    /// Takes from the most recently added end, so the walk tends towards
    /// depth-first and keeps the pending set small.
    pub fn take_branches(&self, n: usize) -> Vec<N> {
        let mut state = self.state.lock();
        let keep = state.branches.len().saturating_sub(n);
        let mut taken = state.branches.split_off(keep);
        taken.reverse();
        taken
    }

    /// Snapshot of pending-branch emptiness
    pub fn is_branches_empty(&self) -> bool {
        self.state.lock().branches.is_empty()
    }

    /// Number of pending branches
    pub fn pending_len(&self) -> usize {
        self.state.lock().branches.len()
    }

    /// Number of leaves collected so far
    pub fn leaf_count(&self) -> usize {
        self.state.lock().leaves.len()
    }

    /// Record a node whose expansion failed
    pub fn record_failure(&self, node: N, error: ExpandError) {
        self.state
            .lock()
            .failures
            .push(NodeFailure::new(node, error));
    }

    /// Take ownership of everything accumulated and reset to empty
    ///
    /// Meant to be called exactly once, at the end of a walk. A second
    /// call is a logic error and yields [`InvariantViolation::AlreadyDrained`].
    pub fn drain(&self) -> Result<Harvest<N, L>, InvariantViolation> {
        let mut state = self.state.lock();
        if state.drained {
            return Err(InvariantViolation::AlreadyDrained);
        }
        state.drained = true;

        Ok(Harvest {
            leaves: std::mem::take(&mut state.leaves),
            pending: std::mem::take(&mut state.branches),
            failures: std::mem::take(&mut state.failures),
        })
    }
}

impl<N, L> Default for SharedAggregate<N, L> {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::thread;

    #[test]
    fn test_take_branches_bounded() {
        let agg: SharedAggregate<u32, ()> = SharedAggregate::new();
        for i in 0..5 {
            agg.put_branch(i);
        }

        let first = agg.take_branches(3);
        assert_eq!(first, vec![4, 3, 2]);
        assert_eq!(agg.pending_len(), 2);

        let rest = agg.take_branches(16);
        assert_eq!(rest, vec![1, 0]);
        assert!(agg.is_branches_empty());

        assert!(agg.take_branches(4).is_empty());
    }

    #[test]
    fn test_concurrent_takes_are_disjoint() {
        let agg: SharedAggregate<u32, ()> = SharedAggregate::new();
        for i in 0..1000 {
            agg.put_branch(i);
        }

        let mut all: Vec<u32> = thread::scope(|s| {
            let handles: Vec<_> = (0..8)
                .map(|_| {
                    s.spawn(|| {
                        let mut mine = Vec::new();
                        loop {
                            let batch = agg.take_branches(7);
                            if batch.is_empty() {
                                break;
                            }
                            mine.extend(batch);
                        }
                        mine
                    })
                })
                .collect();
            handles.into_iter().flat_map(|h| h.join().unwrap()).collect()
        });

        all.sort_unstable();
        assert_eq!(all, (0..1000).collect::<Vec<_>>());
    }

    #[test]
    fn test_drain_once() {
        let agg: SharedAggregate<String, String> = SharedAggregate::new();
        agg.put_leaf("x".into());
        agg.put_leaves(["y".to_string(), "z".to_string()]);
        agg.put_branch("pending".into());
        agg.record_failure(
            "bad".into(),
            ExpandError::NotFound {
                node: "bad".into(),
            },
        );

        let harvest = agg.drain().unwrap();
        assert_eq!(harvest.leaves, vec!["x", "y", "z"]);
        assert_eq!(harvest.pending, vec!["pending"]);
        assert_eq!(harvest.failures.len(), 1);
        assert_eq!(harvest.failures[0].node, "bad");

        assert_eq!(agg.leaf_count(), 0);
        assert!(matches!(agg.drain(), Err(InvariantViolation::AlreadyDrained)));
    }
}
