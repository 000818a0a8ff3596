//! Bounded-concurrency tree expansion
//!
//! Two schedulers share the same building blocks:
//!
//! - [`BatchScheduler`]: rounds of at most K expansions, each round ending
//!   at a barrier before the next one is dispatched
//! - [`PoolScheduler`]: N persistent workers fed from one
//!   [`BlockingQueue`], stopped by poison pills once the
//!   [`TerminationDetector`] reports that no work is queued or running
//!
//! ```text
//!                     ┌─────────────────────────┐
//!                     │     WalkCoordinator     │
//!                     │  - picks the scheduler  │
//!                     │  - builds WalkReport    │
//!                     └───────────┬─────────────┘
//!                                 │
//!             ┌───────────────────┴───────────────────┐
//!             │                                       │
//!      ┌──────▼───────┐                       ┌───────▼──────┐
//!      │BatchScheduler│                       │PoolScheduler │
//!      │ scoped rounds│                       │ queue + pills│
//!      └──────┬───────┘                       └───────┬──────┘
//!             └───────────────┬───────────────────────┘
//!                       ┌─────▼──────┐
//!                       │ expand_one │ ──► SharedAggregate
//!                       └────────────┘
//! ```

pub mod aggregate;
pub mod batch;
pub mod coordinator;
pub mod pool;
pub mod queue;
pub mod termination;
pub mod worker;

pub use aggregate::{Harvest, SharedAggregate};
pub use batch::BatchScheduler;
pub use coordinator::{WalkCoordinator, WalkProgress, WalkReport};
pub use pool::PoolScheduler;
pub use queue::{BlockingQueue, Message, QueueStats};
pub use termination::{ActiveGuard, Completion, PresenceGuard, TerminationDetector};
pub use worker::{expand_one, Route, WalkStats, WalkSummary, Worker};
