//! In-memory tree source
//!
//! Nodes and leaves are plain strings. Unknown nodes expand to
//! `NotFound`, and any node can be scripted to fail.

use super::{Expansion, TreeSource};
use crate::error::ExpandError;
use std::collections::HashMap;

#[derive(Debug, Clone, Default)]
struct Entry {
    leaves: Vec<String>,
    branches: Vec<String>,
}

/// A scripted tree with string nodes and leaves
#[derive(Debug, Clone, Default)]
pub struct MemoryTree {
    nodes: HashMap<String, Entry>,
    failures: HashMap<String, ExpandError>,
}

impl MemoryTree {
    pub fn new() -> Self {
        Self::default()
    }

    /// Define the children of `id`
    pub fn with_node<L, B>(mut self, id: &str, leaves: L, branches: B) -> Self
    where
        L: IntoIterator,
        L::Item: Into<String>,
        B: IntoIterator,
        B::Item: Into<String>,
    {
        self.nodes.insert(
            id.to_string(),
            Entry {
                leaves: leaves.into_iter().map(Into::into).collect(),
                branches: branches.into_iter().map(Into::into).collect(),
            },
        );
        self
    }

    /// Make every expansion of `id` fail with `error`
    pub fn with_failure(mut self, id: &str, error: ExpandError) -> Self {
        self.failures.insert(id.to_string(), error);
        self
    }

    /// Build a complete tree rooted at `"r"`
    ///
    /// Every node above `depth` has `fanout` branches; every node carries
    /// `leaves` leaves. Node ids are slash-separated child indices
    /// (`"r/0/1"`), leaf ids append `#k` (`"r/0/1#2"`).
    pub fn uniform(depth: u32, fanout: usize, leaves: usize) -> Self {
        let mut tree = Self::new();
        let mut level = vec!["r".to_string()];

        for d in 0..=depth {
            let mut next = Vec::with_capacity(level.len() * fanout);
            for id in level {
                let branches: Vec<String> = if d < depth {
                    (0..fanout).map(|i| format!("{}/{}", id, i)).collect()
                } else {
                    Vec::new()
                };
                let leaf_ids: Vec<String> = (0..leaves).map(|k| format!("{}#{}", id, k)).collect();
                next.extend(branches.iter().cloned());
                tree.nodes.insert(
                    id,
                    Entry {
                        leaves: leaf_ids,
                        branches,
                    },
                );
            }
            level = next;
        }

        tree
    }

    /// Every leaf reachable from `root`, skipping scripted failures
    pub fn reachable_leaves(&self, root: &str) -> Vec<String> {
        let mut out = Vec::new();
        let mut stack = vec![root.to_string()];
        while let Some(id) = stack.pop() {
            if self.failures.contains_key(&id) {
                continue;
            }
            if let Some(entry) = self.nodes.get(&id) {
                out.extend(entry.leaves.iter().cloned());
                stack.extend(entry.branches.iter().cloned());
            }
        }
        out
    }

    /// Number of defined nodes
    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }
}

impl TreeSource for MemoryTree {
    type Node = String;
    type Leaf = String;

    fn expand(&self, node: &String) -> Result<Expansion<String, String>, ExpandError> {
        if let Some(err) = self.failures.get(node) {
            return Err(err.clone());
        }

        self.nodes
            .get(node)
            .map(|entry| Expansion::new(entry.leaves.clone(), entry.branches.clone()))
            .ok_or_else(|| ExpandError::NotFound { node: node.clone() })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_uniform_shape() {
        // 1 + 2 + 4 + 8 nodes
        let tree = MemoryTree::uniform(3, 2, 1);
        assert_eq!(tree.len(), 15);
        assert_eq!(tree.reachable_leaves("r").len(), 15);

        let root = tree.expand(&"r".to_string()).unwrap();
        assert_eq!(root.branches, vec!["r/0", "r/1"]);
        assert_eq!(root.leaves, vec!["r#0"]);
    }

    #[test]
    fn test_scripted_failure() {
        let tree = MemoryTree::new()
            .with_node("root", ["x"], ["bad"])
            .with_failure(
                "bad",
                ExpandError::AccessDenied {
                    node: "bad".into(),
                },
            );

        assert!(tree.expand(&"root".to_string()).is_ok());
        assert!(matches!(
            tree.expand(&"bad".to_string()),
            Err(ExpandError::AccessDenied { .. })
        ));
        assert!(matches!(
            tree.expand(&"missing".to_string()),
            Err(ExpandError::NotFound { .. })
        ));
        assert_eq!(tree.reachable_leaves("root"), vec!["x"]);
    }
}
