//! Session slots shared by all device tasks of a run.
//!
//! Each device task holds a slot for its whole retry loop, so the number of
//! devices being talked to at once stays under `max_concurrent_sessions`.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use tokio::sync::{OwnedSemaphorePermit, Semaphore};

/// Bounded admission for device sessions. Cheap to clone; clones share slots.
#[derive(Debug, Clone)]
pub struct ConcurrencyLimiter {
    inner: Arc<Inner>,
}

#[derive(Debug)]
struct Inner {
    capacity: usize,
    slots: Arc<Semaphore>,
    in_use: AtomicUsize,
    peak: AtomicUsize,
}

/// A held slot. Dropping it releases the slot.
#[derive(Debug)]
pub struct SessionSlot {
    inner: Arc<Inner>,
    _permit: OwnedSemaphorePermit,
}

impl Drop for SessionSlot {
    fn drop(&mut self) {
        self.inner.in_use.fetch_sub(1, Ordering::AcqRel);
    }
}

impl ConcurrencyLimiter {
    /// Create a limiter with `capacity` slots (at least one).
    pub fn new(capacity: usize) -> Self {
        let capacity = capacity.max(1);
        Self {
            inner: Arc::new(Inner {
                capacity,
                slots: Arc::new(Semaphore::new(capacity)),
                in_use: AtomicUsize::new(0),
                peak: AtomicUsize::new(0),
            }),
        }
    }

    /// Wait for a free slot.
    pub async fn acquire(&self) -> SessionSlot {
        let permit = Arc::clone(&self.inner.slots)
            .acquire_owned()
            .await
            .unwrap_or_else(|_| unreachable!("limiter semaphore is never closed"));
        let now = self.inner.in_use.fetch_add(1, Ordering::AcqRel) + 1;
        self.inner.peak.fetch_max(now, Ordering::AcqRel);
        SessionSlot {
            inner: Arc::clone(&self.inner),
            _permit: permit,
        }
    }

    /// Give a slot back. Same as dropping it.
    pub fn release(&self, slot: SessionSlot) {
        drop(slot);
    }

    pub fn capacity(&self) -> usize {
        self.inner.capacity
    }

    /// Slots currently held.
    pub fn in_use(&self) -> usize {
        self.inner.in_use.load(Ordering::Acquire)
    }

    pub fn available(&self) -> usize {
        self.inner.slots.available_permits()
    }

    /// Highest number of slots held at once since creation.
    pub fn peak(&self) -> usize {
        self.inner.peak.load(Ordering::Acquire)
    }
}
