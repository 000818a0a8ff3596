//! Tree sources and leaf sinks
//!
//! A walk never inspects the tree itself. It only asks a [`TreeSource`]
//! to expand one node at a time into leaves and further branches, and
//! hands discovered leaves to a [`LeafSink`].
//!
//! Two sources ship with the crate:
//! - [`FsTree`]: one directory per expansion on the local filesystem
//! - [`MemoryTree`]: a scripted in-memory tree with injectable failures

pub mod fs;
pub mod memory;

pub use fs::{FileEntry, FsNode, FsTree};
pub use memory::MemoryTree;

use crate::error::ExpandError;
use std::fmt::Debug;

/// Children produced by one `expand` call
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Expansion<N, L> {
    /// Terminal items found under the node
    pub leaves: Vec<L>,

    /// Child nodes that need expanding in turn
    pub branches: Vec<N>,
}

impl<N, L> Expansion<N, L> {
    pub fn new(leaves: Vec<L>, branches: Vec<N>) -> Self {
        Self { leaves, branches }
    }

    /// An expansion with no children
    pub fn empty() -> Self {
        Self {
            leaves: Vec::new(),
            branches: Vec::new(),
        }
    }
}

impl<N, L> Default for Expansion<N, L> {
    fn default() -> Self {
        Self::empty()
    }
}

/// The collaborator that knows how to expand nodes
///
/// `expand` is called concurrently from several workers, each on a
/// different node, so implementations must be `Sync`.
pub trait TreeSource: Sync {
    /// A position in the tree
    type Node: Send + Debug;

    /// A terminal item
    type Leaf: Send;

    /// Expand one node into its leaves and branches
    fn expand(&self, node: &Self::Node) -> Result<Expansion<Self::Node, Self::Leaf>, ExpandError>;
}

/// Receives every discovered leaf exactly once
pub trait LeafSink<L> {
    fn emit(&mut self, leaf: &L);
}

impl<L, F: FnMut(&L)> LeafSink<L> for F {
    fn emit(&mut self, leaf: &L) {
        self(leaf)
    }
}

/// Sink that discards everything
#[derive(Debug, Default, Clone, Copy)]
pub struct NullSink;

impl<L> LeafSink<L> for NullSink {
    fn emit(&mut self, _leaf: &L) {}
}
