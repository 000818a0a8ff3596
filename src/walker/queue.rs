//! Blocking FIFO mailbox
//!
//! This module provides an unbounded queue with a blocking `receive`.
//! It is the frontier of the persistent-worker scheduler: workers both
//! consume nodes from it and push newly discovered branches back onto it.
//!
//! Shutdown is in-band: the coordinator sends one [`Message::Shutdown`]
//! per consumer, so a consumer blocked in `receive` always wakes up.

use parking_lot::{Condvar, Mutex};
use std::collections::VecDeque;
use std::sync::atomic::{AtomicU64, Ordering};

/// An item travelling through a [`BlockingQueue`]
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Message<T> {
    /// A unit of work
    Work(T),

    /// Poison pill: the consumer must leave its loop
    Shutdown,
}

/// Statistics for the queue
#[derive(Debug, Default)]
pub struct QueueStats {
    /// Total messages enqueued
    pub enqueued: AtomicU64,

    /// Total messages dequeued
    pub dequeued: AtomicU64,

    /// Times a receiver had to wait on an empty queue
    pub waits: AtomicU64,
}

impl QueueStats {
    /// Get queue throughput (dequeued messages)
    pub fn throughput(&self) -> u64 {
        self.dequeued.load(Ordering::Relaxed)
    }

    /// Get number of blocking waits
    pub fn wait_count(&self) -> u64 {
        self.waits.load(Ordering::Relaxed)
    }
}

/// Thread-safe FIFO with blocking receive
///
/// `send` never blocks. `receive` blocks until an item is present and
/// removes it, so each item is delivered to exactly one receiver.
#[derive(Debug)]
pub struct BlockingQueue<T> {
    items: Mutex<VecDeque<T>>,
    available: Condvar,
    stats: QueueStats,
}

impl<T> BlockingQueue<T> {
    /// Create an empty queue
    pub fn new() -> Self {
        Self {
            items: Mutex::new(VecDeque::new()),
            available: Condvar::new(),
            stats: QueueStats::default(),
        }
    }

    /// Enqueue an item and wake one waiting receiver
    pub fn send(&self, item: T) {
        {
            let mut items = self.items.lock();
            items.push_back(item);
        }
        self.stats.enqueued.fetch_add(1, Ordering::Relaxed);
        self.available.notify_one();
    }

    /// Block until an item is available, then remove and return the oldest
    pub fn receive(&self) -> T {
        let mut items = self.items.lock();
        loop {
            if let Some(item) = items.pop_front() {
                self.stats.dequeued.fetch_add(1, Ordering::Relaxed);
                return item;
            }
            self.stats.waits.fetch_add(1, Ordering::Relaxed);
            // Unlocks and parks atomically; spurious wakeups loop back
            self.available.wait(&mut items);
        }
    }

    /// Try to receive without blocking
    pub fn try_receive(&self) -> Option<T> {
        let item = self.items.lock().pop_front();
        if item.is_some() {
            self.stats.dequeued.fetch_add(1, Ordering::Relaxed);
        }
        item
    }

    /// Check if the queue is empty
    pub fn is_empty(&self) -> bool {
        self.items.lock().is_empty()
    }

    /// Get current queue length
    pub fn len(&self) -> usize {
        self.items.lock().len()
    }

    /// Get queue statistics
    pub fn stats(&self) -> &QueueStats {
        &self.stats
    }
}

impl<T> BlockingQueue<Message<T>> {
    /// Enqueue a unit of work
    pub fn send_work(&self, item: T) {
        self.send(Message::Work(item));
    }

    /// Send one poison pill per consumer
    pub fn broadcast_shutdown(&self, consumers: usize) {
        {
            let mut items = self.items.lock();
            items.extend((0..consumers).map(|_| Message::Shutdown));
        }
        self.stats
            .enqueued
            .fetch_add(consumers as u64, Ordering::Relaxed);
        self.available.notify_all();
    }
}

impl<T> Default for BlockingQueue<T> {
    fn default() -> Self {
        Self::new()
    }
}
