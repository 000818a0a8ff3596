//! Configuration types for fanout-walker
//!
//! This module defines:
//! - CLI argument parsing using clap derive macros
//! - Scheduler selection and concurrency bounds
//! - Runtime configuration with validation

use crate::error::ConfigError;
use crate::source::{FsNode, FsTree};
use clap::{Parser, ValueEnum};
use regex::Regex;
use std::fmt;
use std::path::PathBuf;

/// Maximum reasonable concurrency bound / pool size
pub const MAX_WORKERS: usize = 512;

/// Parallel tree walker with bounded concurrency
#[derive(Parser, Debug, Clone)]
#[command(
    name = "fanout-walker",
    version,
    about = "Parallel directory walker with bounded concurrency",
    long_about = "Walks a directory tree with a fixed number of concurrent workers.\n\n\
                  The 'pool' strategy keeps N long-lived workers fed from a shared queue.\n\
                  The 'batch' strategy expands at most N directories per round and waits\n\
                  for the whole round before starting the next.",
    after_help = "EXAMPLES:\n    \
        fanout-walker /data\n    \
        fanout-walker /data -s batch -w 4 --list\n    \
        fanout-walker /data --exclude '\\.git$' --max-depth 3"
)]
pub struct CliArgs {
    /// Directory to walk
    #[arg(value_name = "ROOT")]
    pub root: PathBuf,

    /// Scheduling strategy
    #[arg(short = 's', long, value_enum, default_value_t = Strategy::Pool)]
    pub strategy: Strategy,

    /// Concurrency bound (batch) or worker-pool size (pool)
    #[arg(
        short = 'w',
        long,
        default_value_t = default_workers(),
        value_name = "NUM"
    )]
    pub workers: usize,

    /// Maximum directory depth (unlimited if not set)
    #[arg(short = 'd', long, value_name = "NUM")]
    pub max_depth: Option<u32>,

    /// Exclude paths matching pattern (can be repeated)
    #[arg(long = "exclude", value_name = "PATTERN", action = clap::ArgAction::Append)]
    pub exclude_patterns: Vec<String>,

    /// Print every file found
    #[arg(short = 'l', long)]
    pub list: bool,

    /// Quiet mode - suppress progress output
    #[arg(short = 'q', long)]
    pub quiet: bool,

    /// Verbose output (show per-node failures)
    #[arg(short = 'v', long)]
    pub verbose: bool,
}

fn default_workers() -> usize {
    // Directory reads are I/O bound
    (num_cpus::get() * 2).min(MAX_WORKERS)
}

/// How the frontier is scheduled
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum Strategy {
    /// Rounds of at most K expansions separated by a barrier
    Batch,

    /// N persistent workers sharing one blocking queue
    Pool,
}

impl fmt::Display for Strategy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Strategy::Batch => f.write_str("batch"),
            Strategy::Pool => f.write_str("pool"),
        }
    }
}

/// Scheduler choice plus its concurrency bound, fixed for one walk
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Scheduling {
    strategy: Strategy,
    concurrency: usize,
}

impl Scheduling {
    /// Validate and build
    pub fn new(strategy: Strategy, concurrency: usize) -> Result<Self, ConfigError> {
        if concurrency == 0 || concurrency > MAX_WORKERS {
            return Err(ConfigError::InvalidConcurrency {
                count: concurrency,
                max: MAX_WORKERS,
            });
        }
        Ok(Self {
            strategy,
            concurrency,
        })
    }

    /// Batch scheduler with bound `k`
    pub fn batch(k: usize) -> Result<Self, ConfigError> {
        Self::new(Strategy::Batch, k)
    }

    /// Pool scheduler with `n` workers
    pub fn pool(n: usize) -> Result<Self, ConfigError> {
        Self::new(Strategy::Pool, n)
    }

    pub fn strategy(&self) -> Strategy {
        self.strategy
    }

    pub fn concurrency(&self) -> usize {
        self.concurrency
    }
}

/// Validated runtime configuration
#[derive(Debug, Clone)]
pub struct WalkConfig {
    /// Directory the walk starts from
    pub root: PathBuf,

    /// Scheduler and its bound
    pub scheduling: Scheduling,

    /// Maximum traversal depth
    pub max_depth: Option<u32>,

    /// Compiled exclude patterns
    pub exclude_patterns: Vec<Regex>,

    /// Print every leaf
    pub list_leaves: bool,

    /// Show progress indicator
    pub show_progress: bool,

    /// Verbose logging
    pub verbose: bool,
}

impl WalkConfig {
    /// Create and validate configuration from CLI arguments
    pub fn from_args(args: CliArgs) -> Result<Self, ConfigError> {
        if !args.root.is_dir() {
            return Err(ConfigError::InvalidRoot {
                path: args.root.display().to_string(),
                reason: "not a directory or not accessible".to_string(),
            });
        }

        let scheduling = Scheduling::new(args.strategy, args.workers)?;

        // Compile exclude patterns
        let exclude_patterns = args
            .exclude_patterns
            .iter()
            .map(|p| {
                Regex::new(p).map_err(|e| ConfigError::InvalidExcludePattern {
                    pattern: p.clone(),
                    reason: e.to_string(),
                })
            })
            .collect::<Result<Vec<_>, _>>()?;

        Ok(Self {
            root: args.root,
            scheduling,
            max_depth: args.max_depth,
            exclude_patterns,
            list_leaves: args.list,
            show_progress: !args.quiet,
            verbose: args.verbose,
        })
    }

    /// Build the filesystem source for this configuration
    pub fn tree(&self) -> FsTree {
        FsTree::new()
            .with_max_depth(self.max_depth)
            .with_excludes(self.exclude_patterns.clone())
    }

    /// Root node of the walk
    pub fn root_node(&self) -> FsNode {
        FsNode::root(self.root.clone())
    }
}
