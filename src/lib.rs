//! fanout-walker - Bounded-Concurrency Tree Expansion
//!
//! Walks any tree whose nodes are discovered by an "expand" operation
//! (a directory listing, a page of links, a category index) and collects
//! every leaf, while never running more than a fixed number of expansions
//! at once.
//!
//! # Features
//!
//! - **Two schedulers**: a batch scheduler that expands the frontier in
//!   barrier-separated rounds of at most K nodes, and a persistent pool of
//!   N workers sharing one blocking queue.
//!
//! - **Correct termination**: the pool stops only once no node is queued
//!   and no expansion is running, then releases every worker with a
//!   poison pill.
//!
//! - **Failure isolation**: a node that fails to expand (or whose source
//!   panics) is recorded and skipped; the rest of the tree is still walked.
//!
//! - **Pluggable sources**: anything implementing [`TreeSource`] can be
//!   walked. [`FsTree`] walks a local directory tree, [`MemoryTree`] is an
//!   in-memory fixture.
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────────┐
//! │                         TreeSource                              │
//! │                  expand(node) → leaves, branches                │
//! └─────────────────────────────┬───────────────────────────────────┘
//!                               │
//!                               ▼
//! ┌─────────────────────────────────────────────────────────────────┐
//! │                      Worker Threads                             │
//! │  ┌─────────┐  ┌─────────┐  ┌─────────┐         ┌─────────┐      │
//! │  │Worker 0 │  │Worker 1 │  │Worker 2 │  ...    │Worker N │      │
//! │  └────┬────┘  └────┬────┘  └────┬────┘         └────┬────┘      │
//! │       └────────────┼────────────┼────────────────────┘          │
//! │                    ▼            ▼                               │
//! │     ┌───────────────────┐   ┌──────────────────────────┐        │
//! │     │  BlockingQueue    │   │    SharedAggregate       │        │
//! │     │  (pool only)      │   │  leaves, failures,       │        │
//! │     │  + poison pills   │   │  pending branches        │        │
//! │     └───────────────────┘   └──────────────────────────┘        │
//! └─────────────────────────────────────────────────────────────────┘
//!                               │
//!                               ▼
//!                          WalkReport
//! ```
//!
//! # Example
//!
//! ```bash
//! # Pool of 2×CPU workers
//! fanout-walker /data
//!
//! # Batch rounds of 8, printing every file
//! fanout-walker /data -s batch -w 8 --list
//! ```

pub mod config;
pub mod error;
pub mod progress;
pub mod source;
pub mod walker;

pub use config::{CliArgs, Scheduling, Strategy, WalkConfig};
pub use error::{ExpandError, NodeFailure, Result, WalkerError};
pub use source::{Expansion, FsTree, LeafSink, MemoryTree, NullSink, TreeSource};
pub use walker::{WalkCoordinator, WalkReport};
