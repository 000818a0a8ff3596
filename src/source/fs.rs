//! Local filesystem tree source
//!
//! Each expansion reads one directory. Subdirectories become branches;
//! regular files, symlinks and special files become leaves. Symlinks
//! are never followed, so cycles cannot occur.

use super::{Expansion, TreeSource};
use crate::error::ExpandError;
use regex::Regex;
use std::fs;
use std::path::{Path, PathBuf};
use tracing::trace;

/// A directory waiting to be read
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FsNode {
    /// Full path to the directory
    pub path: PathBuf,

    /// Depth from root (0 = root)
    pub depth: u32,
}

impl FsNode {
    /// Create a new directory node
    pub fn new(path: impl Into<PathBuf>, depth: u32) -> Self {
        Self {
            path: path.into(),
            depth,
        }
    }

    /// Create the root node
    pub fn root(path: impl Into<PathBuf>) -> Self {
        Self::new(path, 0)
    }
}

/// A non-directory entry found during the walk
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FileEntry {
    /// Full path to the entry
    pub path: PathBuf,

    /// Size in bytes (0 when metadata is unavailable)
    pub size: u64,
}

impl FileEntry {
    /// File name component, lossily converted
    pub fn name(&self) -> String {
        self.path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_default()
    }
}

/// Tree source backed by `std::fs::read_dir`
#[derive(Debug, Clone, Default)]
pub struct FsTree {
    /// Maximum branch depth to produce (unlimited if not set)
    max_depth: Option<u32>,

    /// Paths matching any of these are dropped entirely
    exclude_patterns: Vec<Regex>,
}

impl FsTree {
    pub fn new() -> Self {
        Self::default()
    }

    /// Stop producing branches deeper than `depth`
    pub fn with_max_depth(mut self, depth: Option<u32>) -> Self {
        self.max_depth = depth;
        self
    }

    /// Drop any path matching one of `patterns`
    pub fn with_excludes(mut self, patterns: Vec<Regex>) -> Self {
        self.exclude_patterns = patterns;
        self
    }

    /// Check if a path should be excluded
    pub fn is_excluded(&self, path: &Path) -> bool {
        if self.exclude_patterns.is_empty() {
            return false;
        }
        let text = path.to_string_lossy();
        self.exclude_patterns.iter().any(|re| re.is_match(&text))
    }

    fn within_depth(&self, depth: u32) -> bool {
        self.max_depth.map(|max| depth <= max).unwrap_or(true)
    }
}

impl TreeSource for FsTree {
    type Node = FsNode;
    type Leaf = FileEntry;

    fn expand(&self, node: &FsNode) -> Result<Expansion<FsNode, FileEntry>, ExpandError> {
        let display = || node.path.display().to_string();

        let reader = fs::read_dir(&node.path).map_err(|e| ExpandError::from_io(display(), &e))?;

        let mut expansion = Expansion::empty();
        let child_depth = node.depth + 1;

        for entry in reader {
            let entry = entry.map_err(|e| ExpandError::from_io(display(), &e))?;
            let path = entry.path();

            if self.is_excluded(&path) {
                trace!(path = %path.display(), "Excluded");
                continue;
            }

            // file_type() does not follow symlinks
            let file_type = entry
                .file_type()
                .map_err(|e| ExpandError::from_io(path.display().to_string(), &e))?;

            if file_type.is_dir() {
                if self.within_depth(child_depth) {
                    expansion.branches.push(FsNode::new(path, child_depth));
                }
            } else {
                let size = entry.metadata().map(|m| m.len()).unwrap_or(0);
                expansion.leaves.push(FileEntry { path, size });
            }
        }

        Ok(expansion)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::FailureKind;
    use tempfile::tempdir;

    #[test]
    fn test_expand_directory() {
        let dir = tempdir().unwrap();
        fs::write(dir.path().join("a.txt"), b"hello").unwrap();
        fs::create_dir(dir.path().join("sub")).unwrap();

        let tree = FsTree::new();
        let exp = tree.expand(&FsNode::root(dir.path())).unwrap();

        assert_eq!(exp.leaves.len(), 1);
        assert_eq!(exp.leaves[0].name(), "a.txt");
        assert_eq!(exp.leaves[0].size, 5);
        assert_eq!(exp.branches, vec![FsNode::new(dir.path().join("sub"), 1)]);
    }

    #[test]
    fn test_missing_directory() {
        let dir = tempdir().unwrap();
        let tree = FsTree::new();
        let err = tree
            .expand(&FsNode::root(dir.path().join("nope")))
            .unwrap_err();
        assert_eq!(err.kind(), FailureKind::NotFound);
    }

    #[test]
    fn test_max_depth() {
        let dir = tempdir().unwrap();
        fs::create_dir(dir.path().join("sub")).unwrap();

        let tree = FsTree::new().with_max_depth(Some(0));
        let exp = tree.expand(&FsNode::root(dir.path())).unwrap();
        assert!(exp.branches.is_empty());
    }

    #[test]
    fn test_exclude_pattern() {
        let dir = tempdir().unwrap();
        fs::create_dir(dir.path().join(".snapshot")).unwrap();
        fs::write(dir.path().join("keep.txt"), b"").unwrap();
        fs::write(dir.path().join("skip.tmp"), b"").unwrap();

        let tree = FsTree::new().with_excludes(vec![
            Regex::new(r"\.snapshot").unwrap(),
            Regex::new(r"\.tmp$").unwrap(),
        ]);
        let exp = tree.expand(&FsNode::root(dir.path())).unwrap();

        assert!(exp.branches.is_empty());
        assert_eq!(exp.leaves.len(), 1);
        assert_eq!(exp.leaves[0].name(), "keep.txt");
    }
}
