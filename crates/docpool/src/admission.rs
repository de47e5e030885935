//! Bounded handle accounting.
//!
//! A pool admits at most `capacity` live handles. Admission is a single
//! compare-and-swap on the outstanding counter and never waits: when no
//! slot is free the caller is turned away immediately. Each admitted handle
//! carries a [`Slot`] that gives its unit back when dropped.

use std::sync::Arc;
use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};
use std::time::Instant;

use parking_lot::Mutex;

/// Shared counters for one pool.
#[derive(Debug)]
pub(crate) struct Accounting {
    capacity: usize,

    /// Live handles. Never exceeds `capacity`.
    outstanding: AtomicUsize,

    /// Counter for generating handle IDs.
    next_handle_id: AtomicU64,

    /// When the pool was created.
    created_at: Instant,

    metrics: Mutex<MetricsInner>,
}

/// Internal metrics tracking.
#[derive(Debug, Default, Clone, Copy)]
pub(crate) struct MetricsInner {
    /// Handles admitted.
    pub(crate) handles_opened: u64,
    /// Handles released.
    pub(crate) handles_closed: u64,
    /// Opens turned away at capacity.
    pub(crate) admissions_rejected: u64,
    /// Dial attempts that reached the driver.
    pub(crate) dial_attempts: u64,
    /// Dial attempts that failed.
    pub(crate) dial_failures: u64,
}

impl Accounting {
    pub(crate) fn new(capacity: usize) -> Self {
        Self {
            capacity,
            outstanding: AtomicUsize::new(0),
            next_handle_id: AtomicU64::new(1),
            created_at: Instant::now(),
            metrics: Mutex::new(MetricsInner::default()),
        }
    }

    pub(crate) fn capacity(&self) -> usize {
        self.capacity
    }

    pub(crate) fn outstanding(&self) -> usize {
        self.outstanding.load(Ordering::Acquire)
    }

    pub(crate) fn created_at(&self) -> Instant {
        self.created_at
    }

    pub(crate) fn metrics(&self) -> MetricsInner {
        *self.metrics.lock()
    }

    pub(crate) fn record_dial(&self, succeeded: bool) {
        let mut metrics = self.metrics.lock();
        metrics.dial_attempts += 1;
        if !succeeded {
            metrics.dial_failures += 1;
        }
    }

    /// Reserve one unit without waiting.
    ///
    /// Returns `None` when `capacity` handles are already outstanding.
    pub(crate) fn try_admit(self: &Arc<Self>) -> Option<Slot> {
        let capacity = self.capacity;
        let admitted = self
            .outstanding
            .fetch_update(Ordering::AcqRel, Ordering::Acquire, |n| {
                (n < capacity).then_some(n + 1)
            })
            .is_ok();

        let mut metrics = self.metrics.lock();
        if !admitted {
            metrics.admissions_rejected += 1;
            return None;
        }
        metrics.handles_opened += 1;
        drop(metrics);

        Some(Slot {
            id: self.next_handle_id.fetch_add(1, Ordering::Relaxed),
            accounting: Arc::clone(self),
        })
    }

    fn release(&self) {
        self.outstanding.fetch_sub(1, Ordering::AcqRel);
        self.metrics.lock().handles_closed += 1;
    }
}

/// One admitted unit of pool capacity.
///
/// Dropping the slot releases the unit. A slot cannot be cloned, so each
/// unit is released exactly once.
#[derive(Debug)]
pub(crate) struct Slot {
    id: u64,
    accounting: Arc<Accounting>,
}

impl Slot {
    /// Process-unique id of the handle holding this slot.
    pub(crate) fn id(&self) -> u64 {
        self.id
    }
}

impl Drop for Slot {
    fn drop(&mut self) {
        self.accounting.release();
    }
}
