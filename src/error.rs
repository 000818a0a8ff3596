//! Error types for fanout-walker
//!
//! This module defines the error hierarchy for a walk:
//! - Per-node expansion failures reported by a tree source
//! - Invariant violations inside the scheduler (logic defects)
//! - Worker thread errors
//! - Configuration and CLI errors
//!
//! Design philosophy:
//! - Use thiserror for structured error types in library code
//! - A failed node is data, not a panic: it travels with the walk's results
//! - Invariant violations are fatal and always surface as `Err`

use std::fmt;
use thiserror::Error;

/// Top-level error type for the fanout-walker library
#[derive(Error, Debug)]
pub enum WalkerError {
    /// Configuration errors
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    /// Worker/concurrency errors
    #[error("Worker error: {0}")]
    Worker(#[from] WorkerError),

    /// Scheduler bookkeeping went wrong
    #[error("Invariant violated: {0}")]
    Invariant(#[from] InvariantViolation),

    /// I/O errors (thread spawning, etc.)
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// Failure of a single `expand` call on one node
///
/// The `node` field holds the node's debug rendering so the error stays
/// `Clone` and independent of the node type.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ExpandError {
    /// The source refused access to the node
    #[error("Permission denied: '{node}'")]
    AccessDenied { node: String },

    /// The node vanished or never existed
    #[error("Not found: '{node}'")]
    NotFound { node: String },

    /// Any other I/O failure while expanding
    #[error("Failed to expand '{node}': {reason}")]
    Io { node: String, reason: String },

    /// The source panicked while expanding the node
    #[error("Expansion of '{node}' panicked: {message}")]
    Panicked { node: String, message: String },
}

impl ExpandError {
    /// Classify this error
    pub fn kind(&self) -> FailureKind {
        match self {
            ExpandError::AccessDenied { .. } => FailureKind::Access,
            ExpandError::NotFound { .. } => FailureKind::NotFound,
            ExpandError::Io { .. } => FailureKind::Io,
            ExpandError::Panicked { .. } => FailureKind::Panicked,
        }
    }

    /// Map an `std::io::Error` raised while expanding `node`
    pub fn from_io(node: impl Into<String>, err: &std::io::Error) -> Self {
        let node = node.into();
        match err.kind() {
            std::io::ErrorKind::PermissionDenied => ExpandError::AccessDenied { node },
            std::io::ErrorKind::NotFound => ExpandError::NotFound { node },
            _ => ExpandError::Io {
                node,
                reason: err.to_string(),
            },
        }
    }
}

/// Coarse classification of a failed expansion, for reporting
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FailureKind {
    Access,
    NotFound,
    Io,
    Panicked,
}

impl fmt::Display for FailureKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            FailureKind::Access => "access denied",
            FailureKind::NotFound => "not found",
            FailureKind::Io => "i/o error",
            FailureKind::Panicked => "panicked",
        };
        f.write_str(name)
    }
}

/// A node whose expansion failed, kept together with its error
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NodeFailure<N> {
    /// The node that could not be expanded
    pub node: N,

    /// Why it failed
    pub error: ExpandError,
}

impl<N> NodeFailure<N> {
    pub fn new(node: N, error: ExpandError) -> Self {
        Self { node, error }
    }

    pub fn kind(&self) -> FailureKind {
        self.error.kind()
    }
}

/// Scheduler bookkeeping errors. Any of these indicates a bug.
#[derive(Error, Debug, Clone, Copy, PartialEq, Eq)]
pub enum InvariantViolation {
    /// `SharedAggregate::drain` was called more than once
    #[error("aggregate drained twice")]
    AlreadyDrained,

    /// A node was dequeued that was never scheduled
    #[error("dequeued a node that was never scheduled")]
    QueuedUnderflow,

    /// An expansion ended without having begun
    #[error("active-worker count dropped below zero")]
    ActiveUnderflow,
}

/// Configuration and CLI errors
#[derive(Error, Debug)]
pub enum ConfigError {
    /// Concurrency bound or pool size out of range
    #[error("Invalid concurrency {count}: must be between 1 and {max}")]
    InvalidConcurrency { count: usize, max: usize },

    /// Invalid exclude pattern
    #[error("Invalid exclude pattern '{pattern}': {reason}")]
    InvalidExcludePattern { pattern: String, reason: String },

    /// Root path missing or not a directory
    #[error("Invalid root '{path}': {reason}")]
    InvalidRoot { path: String, reason: String },
}

/// Worker thread errors
#[derive(Error, Debug)]
pub enum WorkerError {
    /// Worker panicked outside of an expansion
    #[error("Worker {id} panicked: {message}")]
    Panicked { id: usize, message: String },

    /// Worker initialization failed
    #[error("Failed to initialize worker {id}: {reason}")]
    InitFailed { id: usize, reason: String },

    /// The leaf sink panicked; later leaves were kept but not emitted
    #[error("Leaf sink panicked: {message}")]
    EmitterPanicked { message: String },

    /// All workers died with work still outstanding
    #[error("All workers have terminated unexpectedly")]
    AllWorkersDead,

    /// Worker hit a scheduler invariant violation
    #[error("Worker {id}: {source}")]
    Invariant {
        id: usize,
        source: InvariantViolation,
    },
}

/// Result type alias for WalkerError
pub type Result<T> = std::result::Result<T, WalkerError>;

/// Represents the outcome of expanding a single node
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ExpandOutcome {
    /// Node expanded; children were routed
    Expanded { leaves: usize, branches: usize },

    /// Node skipped without calling the source (walk interrupted)
    Skipped,

    /// Expansion failed; the node was recorded as a failure
    Failed { kind: FailureKind },
}

impl ExpandOutcome {
    /// Returns true if this outcome represents success
    pub fn is_success(&self) -> bool {
        matches!(self, ExpandOutcome::Expanded { .. })
    }
}

/// Render a panic payload as text
pub(crate) fn panic_message(payload: &(dyn std::any::Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        (*s).to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "unknown panic payload".to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io;

    #[test]
    fn test_expand_error_from_io() {
        let denied = io::Error::from(io::ErrorKind::PermissionDenied);
        assert_eq!(
            ExpandError::from_io("/secret", &denied).kind(),
            FailureKind::Access
        );

        let missing = io::Error::from(io::ErrorKind::NotFound);
        assert_eq!(
            ExpandError::from_io("/gone", &missing).kind(),
            FailureKind::NotFound
        );

        let other = io::Error::new(io::ErrorKind::Other, "disk on fire");
        let err = ExpandError::from_io("/hot", &other);
        assert_eq!(err.kind(), FailureKind::Io);
        assert!(err.to_string().contains("disk on fire"));
    }

    #[test]
    fn test_error_conversion() {
        let walker_err: WalkerError = InvariantViolation::AlreadyDrained.into();
        assert!(matches!(walker_err, WalkerError::Invariant(_)));

        let walker_err: WalkerError = WorkerError::AllWorkersDead.into();
        assert!(matches!(walker_err, WalkerError::Worker(_)));
    }

    #[test]
    fn test_panic_message() {
        let payload: Box<dyn std::any::Any + Send> = Box::new("boom");
        assert_eq!(panic_message(payload.as_ref()), "boom");

        let payload: Box<dyn std::any::Any + Send> = Box::new(String::from("bang"));
        assert_eq!(panic_message(payload.as_ref()), "bang");

        let payload: Box<dyn std::any::Any + Send> = Box::new(42u32);
        assert_eq!(panic_message(payload.as_ref()), "unknown panic payload");
    }
}
