//! Bounded circular buffer guarded by one mutex and two condition variables.
//!
//! This is the synchronization core the harness provokes priority inversion
//! around: producers block on `not_full`, consumers block on `not_empty`, and
//! the helper-registration protocol is addressed at the two condvars' opaque
//! identities. All five ring fields (`slots`, `head`, `tail`, `count`, plus
//! the closed bit) live under a single mutex; `tail = (head + count) % C`
//! holds at every step and is asserted on every operation.

use std::sync::{Condvar, Mutex};

use thiserror::Error;

/// Rejected buffer capacity. A zero-capacity ring would deadlock every `put`.
#[derive(Debug, Error, PartialEq, Eq)]
#[error("buffer capacity must be at least 1 (got {0})")]
pub struct CapacityError(pub usize);

/// The buffer was closed while the caller was blocked or about to block.
#[derive(Debug, Error, PartialEq, Eq)]
#[error("buffer closed")]
pub struct Closed;

/// Opaque identity of one of the buffer's condition variables.
///
/// This is what the helper-registration protocol hands to the kernel; it is
/// stable for the buffer's lifetime and never dereferenced by callers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct CvHandle(usize);

impl CvHandle {
    /// Raw address value passed through to the registration syscall.
    #[inline]
    #[must_use]
    pub fn as_usize(self) -> usize {
        self.0
    }
}

struct Ring<T> {
    slots: Box<[Option<T>]>,
    head: usize,
    tail: usize,
    count: usize,
    closed: bool,
}

impl<T> Ring<T> {
    fn check_invariants(&self) {
        let cap = self.slots.len();
        assert!(
            self.count <= cap,
            "ring count {} exceeds capacity {}",
            self.count,
            cap
        );
        assert_eq!(
            self.tail,
            (self.head + self.count) % cap,
            "ring indices out of sync (head {}, tail {}, count {})",
            self.head,
            self.tail,
            self.count
        );
    }
}

/// Fixed-capacity producer/consumer ring.
pub struct CircularBuffer<T> {
    ring: Mutex<Ring<T>>,
    not_empty: Condvar,
    not_full: Condvar,
    capacity: usize,
}

impl<T> CircularBuffer<T> {
    /// Create a buffer with the given capacity. Capacity must be at least 1.
    pub fn with_capacity(capacity: usize) -> Result<Self, CapacityError> {
        if capacity == 0 {
            return Err(CapacityError(capacity));
        }
        let mut slots = Vec::with_capacity(capacity);
        slots.resize_with(capacity, || None);
        Ok(Self {
            ring: Mutex::new(Ring {
                slots: slots.into_boxed_slice(),
                head: 0,
                tail: 0,
                count: 0,
                closed: false,
            }),
            not_empty: Condvar::new(),
            not_full: Condvar::new(),
            capacity,
        })
    }

    #[inline]
    #[must_use]
    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Number of occupied slots right now. Advisory outside the lock.
    #[must_use]
    pub fn occupancy(&self) -> usize {
        self.lock_ring().count
    }

    /// Identity of the condvar consumers block on.
    #[must_use]
    pub fn not_empty_handle(&self) -> CvHandle {
        CvHandle(&self.not_empty as *const Condvar as usize)
    }

    /// Identity of the condvar producers block on.
    #[must_use]
    pub fn not_full_handle(&self) -> CvHandle {
        CvHandle(&self.not_full as *const Condvar as usize)
    }

    /// Append an item, blocking while the ring is full.
    ///
    /// Wakes at most one consumer. The fullness predicate is re-checked on
    /// every wakeup; a wake never implies a free slot by itself.
    pub fn put(&self, item: T) -> Result<(), Closed> {
        let mut ring = self.lock_ring();
        while ring.count == self.capacity && !ring.closed {
            ring = match self.not_full.wait(ring) {
                Ok(guard) => guard,
                Err(poisoned) => poisoned.into_inner(),
            };
        }
        if ring.closed {
            return Err(Closed);
        }
        ring.check_invariants();
        let tail = ring.tail;
        debug_assert!(ring.slots[tail].is_none());
        ring.slots[tail] = Some(item);
        ring.tail = (tail + 1) % self.capacity;
        ring.count += 1;
        ring.check_invariants();
        drop(ring);
        self.not_empty.notify_one();
        Ok(())
    }

    /// Remove the oldest item, blocking while the ring is empty.
    ///
    /// Returns `None` once the buffer is closed and drained. Wakes at most
    /// one producer.
    pub fn take(&self) -> Option<T> {
        let mut ring = self.lock_ring();
        while ring.count == 0 && !ring.closed {
            ring = match self.not_empty.wait(ring) {
                Ok(guard) => guard,
                Err(poisoned) => poisoned.into_inner(),
            };
        }
        if ring.count == 0 {
            // Closed and drained.
            return None;
        }
        ring.check_invariants();
        let head = ring.head;
        let item = ring.slots[head].take();
        debug_assert!(item.is_some());
        ring.head = (head + 1) % self.capacity;
        ring.count -= 1;
        ring.check_invariants();
        drop(ring);
        self.not_full.notify_one();
        item
    }

    /// Close the buffer and wake every blocked thread.
    ///
    /// Subsequent `put` calls fail with [`Closed`]; `take` drains remaining
    /// items and then returns `None`. Both condvars are broadcast because
    /// every waiter must re-validate its predicate and observe the close.
    pub fn close(&self) {
        {
            let mut ring = self.lock_ring();
            ring.closed = true;
        }
        self.not_empty.notify_all();
        self.not_full.notify_all();
    }

    /// True once `close` has been called.
    #[must_use]
    pub fn is_closed(&self) -> bool {
        self.lock_ring().closed
    }

    fn lock_ring(&self) -> std::sync::MutexGuard<'_, Ring<T>> {
        match self.ring.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn zero_capacity_rejected() {
        assert_eq!(
            CircularBuffer::<u32>::with_capacity(0).err(),
            Some(CapacityError(0))
        );
    }

    #[test]
    fn put_take_roundtrip() {
        let buf = CircularBuffer::with_capacity(4).unwrap();
        buf.put(7u32).unwrap();
        assert_eq!(buf.occupancy(), 1);
        assert_eq!(buf.take(), Some(7));
        assert_eq!(buf.occupancy(), 0);
    }

    #[test]
    fn fifo_order_with_wraparound() {
        let buf = CircularBuffer::with_capacity(3).unwrap();
        // Fill, drain partially, refill to force head/tail wraparound.
        for i in 0..3u32 {
            buf.put(i).unwrap();
        }
        assert_eq!(buf.take(), Some(0));
        assert_eq!(buf.take(), Some(1));
        buf.put(3).unwrap();
        buf.put(4).unwrap();
        assert_eq!(buf.take(), Some(2));
        assert_eq!(buf.take(), Some(3));
        assert_eq!(buf.take(), Some(4));
    }

    #[test]
    fn occupancy_never_exceeds_capacity() {
        let buf = CircularBuffer::with_capacity(2).unwrap();
        buf.put(1u32).unwrap();
        buf.put(2u32).unwrap();
        assert_eq!(buf.occupancy(), buf.capacity());
        assert_eq!(buf.take(), Some(1));
        assert_eq!(buf.occupancy(), 1);
    }

    #[test]
    fn close_fails_put_and_drains_take() {
        let buf = CircularBuffer::with_capacity(2).unwrap();
        buf.put(1u32).unwrap();
        buf.close();
        assert_eq!(buf.put(2u32), Err(Closed));
        assert_eq!(buf.take(), Some(1));
        assert_eq!(buf.take(), None);
        assert_eq!(buf.take(), None);
    }

    #[test]
    fn cv_handles_are_distinct_and_stable() {
        let buf = CircularBuffer::<u32>::with_capacity(1).unwrap();
        let ne = buf.not_empty_handle();
        let nf = buf.not_full_handle();
        assert_ne!(ne, nf);
        assert_eq!(ne, buf.not_empty_handle());
        assert_eq!(nf, buf.not_full_handle());
    }
}
