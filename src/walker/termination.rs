//! Termination detection for the persistent-worker scheduler
//!
//! An empty queue does not mean the walk is done: a worker may be in the
//! middle of an expansion and about to enqueue more nodes. The detector
//! tracks, under one lock:
//!
//! - `queued`: nodes scheduled but not yet picked up
//! - `active`: expansions currently running
//! - `workers`: worker threads still alive
//!
//! Children are scheduled before their parent's expansion ends, so
//! `queued == 0 && active == 0` can only be observed once the frontier
//! is truly exhausted.

use crate::error::InvariantViolation;
use parking_lot::{Condvar, Mutex};
use std::time::Duration;
use tracing::error;

/// How a walk ended, as seen by the detector
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Completion {
    /// No queued nodes and no running expansion
    Finished,

    /// Every worker exited while work was still outstanding
    Abandoned,

    /// Bookkeeping went wrong
    Faulted(InvariantViolation),
}

#[derive(Debug, Default)]
struct Tally {
    queued: usize,
    active: usize,
    workers: usize,
    fault: Option<InvariantViolation>,
}

impl Tally {
    fn completion(&self) -> Option<Completion> {
        if let Some(fault) = self.fault {
            Some(Completion::Faulted(fault))
        } else if self.queued == 0 && self.active == 0 {
            Some(Completion::Finished)
        } else if self.workers == 0 {
            Some(Completion::Abandoned)
        } else {
            None
        }
    }
}

/// Tracks outstanding work and wakes the coordinator when it reaches zero
#[derive(Debug, Default)]
pub struct TerminationDetector {
    tally: Mutex<Tally>,
    changed: Condvar,
}

impl TerminationDetector {
    pub fn new() -> Self {
        Self::default()
    }

    /// Count a node about to be enqueued
    ///
    /// Must be called before the node becomes visible in the queue.
    pub fn schedule(&self) {
        self.tally.lock().queued += 1;
    }

    /// Move one scheduled node into the active state
    ///
    /// The returned guard ends the expansion when dropped, including
    /// during unwinding.
    pub fn begin(&self) -> Result<ActiveGuard<'_>, InvariantViolation> {
        let mut tally = self.tally.lock();
        let Some(queued) = tally.queued.checked_sub(1) else {
            tally.fault = Some(InvariantViolation::QueuedUnderflow);
            self.changed.notify_all();
            return Err(InvariantViolation::QueuedUnderflow);
        };
        tally.queued = queued;
        tally.active += 1;
        Ok(ActiveGuard { detector: self })
    }

    fn end(&self) {
        let mut tally = self.tally.lock();
        match tally.active.checked_sub(1) {
            Some(active) => tally.active = active,
            None => {
                error!("Active-worker count underflow");
                tally.fault = Some(InvariantViolation::ActiveUnderflow);
            }
        }
        if tally.completion().is_some() {
            self.changed.notify_all();
        }
    }

    /// Register a live worker; dropping the guard deregisters it
    pub fn enlist(&self) -> PresenceGuard<'_> {
        self.tally.lock().workers += 1;
        PresenceGuard { detector: self }
    }

    fn dismiss(&self) {
        let mut tally = self.tally.lock();
        tally.workers = tally.workers.saturating_sub(1);
        if tally.completion().is_some() {
            self.changed.notify_all();
        }
    }

    /// True when nothing is queued or running
    pub fn is_complete(&self) -> bool {
        matches!(self.tally.lock().completion(), Some(Completion::Finished))
    }

    /// Number of expansions in flight
    pub fn active(&self) -> usize {
        self.tally.lock().active
    }

    /// Number of scheduled nodes not yet picked up
    pub fn queued(&self) -> usize {
        self.tally.lock().queued
    }

    /// Block until the walk completes or `timeout` elapses
    pub fn wait_timeout(&self, timeout: Duration) -> Option<Completion> {
        let mut tally = self.tally.lock();
        if let Some(done) = tally.completion() {
            return Some(done);
        }
        let _ = self.changed.wait_for(&mut tally, timeout);
        tally.completion()
    }
}

/// Marks one expansion as running
#[must_use = "dropping the guard immediately ends the expansion"]
pub struct ActiveGuard<'a> {
    detector: &'a TerminationDetector,
}

impl Drop for ActiveGuard<'_> {
    fn drop(&mut self) {
        self.detector.end();
    }
}

/// Marks one worker thread as alive
#[must_use = "dropping the guard immediately deregisters the worker"]
pub struct PresenceGuard<'a> {
    detector: &'a TerminationDetector,
}

impl Drop for PresenceGuard<'_> {
    fn drop(&mut self) {
        self.detector.dismiss();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::thread;

    #[test]
    fn test_completion_lifecycle() {
        let detector = TerminationDetector::new();
        let _worker = detector.enlist();

        // Nothing scheduled yet
        assert!(detector.is_complete());

        detector.schedule();
        assert!(!detector.is_complete());

        let guard = detector.begin().unwrap();

        // Queue empty but expansion running
        assert_eq!(detector.queued(), 0);
        assert_eq!(detector.active(), 1);
        assert!(!detector.is_complete());

        // A child scheduled before the parent ends keeps the walk alive
        detector.schedule();
        drop(guard);
        assert!(!detector.is_complete());

        let child = detector.begin().unwrap();
        drop(child);
        assert!(detector.is_complete());
    }

    #[test]
    fn test_begin_without_schedule_faults() {
        let detector = TerminationDetector::new();
        let _worker = detector.enlist();

        assert!(matches!(
            detector.begin(),
            Err(InvariantViolation::QueuedUnderflow)
        ));
        assert_eq!(
            detector.wait_timeout(Duration::from_millis(1)),
            Some(Completion::Faulted(InvariantViolation::QueuedUnderflow))
        );
    }

    #[test]
    fn test_abandoned_when_workers_exit() {
        let detector = TerminationDetector::new();
        detector.schedule();

        let worker = detector.enlist();
        assert_eq!(detector.wait_timeout(Duration::from_millis(1)), None);

        drop(worker);
        assert_eq!(
            detector.wait_timeout(Duration::from_millis(1)),
            Some(Completion::Abandoned)
        );
    }

    #[test]
    fn test_guard_released_on_panic() {
        let detector = TerminationDetector::new();
        detector.schedule();

        thread::scope(|s| {
            let handle = s.spawn(|| {
                let _presence = detector.enlist();
                let _active = detector.begin().unwrap();
                panic!("expansion blew up");
            });
            assert!(handle.join().is_err());
        });

        assert_eq!(detector.active(), 0);
        assert!(detector.is_complete());
    }

    #[test]
    fn test_wait_wakes_on_finish() {
        let detector = TerminationDetector::new();
        let _worker = detector.enlist();
        detector.schedule();

        thread::scope(|s| {
            s.spawn(|| {
                thread::sleep(Duration::from_millis(20));
                let _active = detector.begin().unwrap();
            });

            let mut done = None;
            while done.is_none() {
                done = detector.wait_timeout(Duration::from_millis(100));
            }
            assert_eq!(done, Some(Completion::Finished));
        });
    }
}
