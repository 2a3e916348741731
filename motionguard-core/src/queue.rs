//! Lock-Free Frame Queue Between the Sample Path and the Scoring Path
#![allow(unsafe_code)] // Required for the lock-free ring storage
//!
//! ## Overview
//!
//! Bounded single-producer/single-consumer ring carrying feature frames
//! from the high-rate estimation loop to the slower scoring task. The
//! producer is the per-sample path and must never block; the consumer may
//! stall on model inference or disk I/O without ever stalling ingestion.
//!
//! ## Backpressure: Drop-Oldest
//!
//! When the ring is full the producer advances the tail, discarding the
//! *oldest* frame, and takes its slot. For anomaly monitoring recency wins:
//! a frame from thirty seconds ago says little about the machine now, and
//! the latest fingerprint is the one an operator needs to see. Dropped
//! frames are counted so a chronically slow consumer is visible.
//!
//! ```text
//! ┌─────┬─────┬─────┬─────┬─────┬─────┬─────┬─────┐
//! │  0  │  1  │  2  │  3  │  4  │  5  │  6  │  7  │
//! └─────┴─────┴─────┴─────┴─────┴─────┴─────┴─────┘
//!          ↑                       ↑
//!        tail ──(full: advance)──  head
//! ```
//!
//! ## Memory Ordering
//!
//! - Producer writes the slot, then publishes head with `Release`.
//! - Consumer claims a slot with a CAS on tail; the CAS also resolves the
//!   race against the producer advancing tail during a drop; whichever
//!   side wins the CAS owns the old slot.
//! - Statistics use `Relaxed`; they never affect correctness.
//!
//! Frames are `Copy`, so an overwritten slot needs no destructor.

use core::cell::UnsafeCell;
use core::mem::MaybeUninit;
use core::sync::atomic::{AtomicU32, AtomicUsize, Ordering};

/// Lock-free SPSC ring with drop-oldest overflow
///
/// Capacity `N` must be a power of two; one slot is kept free to
/// distinguish full from empty, so the usable depth is `N - 1`.
pub struct FrameQueue<T: Copy, const N: usize> {
    buffer: UnsafeCell<[MaybeUninit<T>; N]>,
    /// Next write position (producer owned)
    head: AtomicUsize,
    /// Next read position (consumer owned, producer may advance on drop)
    tail: AtomicUsize,
    stats: QueueStats,
}

/// Queue health counters
pub struct QueueStats {
    /// Frames accepted from the producer
    pub pushed: AtomicU32,
    /// Frames handed to the consumer
    pub popped: AtomicU32,
    /// Oldest frames discarded to make room
    pub dropped_oldest: AtomicU32,
}

impl QueueStats {
    const fn new() -> Self {
        Self {
            pushed: AtomicU32::new(0),
            popped: AtomicU32::new(0),
            dropped_oldest: AtomicU32::new(0),
        }
    }
}

impl<T: Copy, const N: usize> FrameQueue<T, N> {
    /// Create an empty queue
    pub const fn new() -> Self {
        assert!(N.is_power_of_two(), "queue capacity must be a power of two");
        Self {
            buffer: UnsafeCell::new([MaybeUninit::uninit(); N]),
            head: AtomicUsize::new(0),
            tail: AtomicUsize::new(0),
            stats: QueueStats::new(),
        }
    }

    /// Push a frame, discarding the oldest queued frame if full
    ///
    /// Never blocks and never fails; the producer always makes progress.
    ///
    /// ## Safety contract
    /// Only one thread may push.
    pub fn push(&self, frame: T) {
        loop {
            let head = self.head.load(Ordering::Acquire);
            let next = (head + 1) & (N - 1);
            let tail = self.tail.load(Ordering::Acquire);

            if next == tail {
                // Full: reclaim the oldest slot. The CAS may lose to a
                // concurrent pop, which freed a slot either way.
                let reclaimed = (tail + 1) & (N - 1);
                if self
                    .tail
                    .compare_exchange(tail, reclaimed, Ordering::Release, Ordering::Relaxed)
                    .is_ok()
                {
                    self.stats.dropped_oldest.fetch_add(1, Ordering::Relaxed);
                }
                continue;
            }

            // Sole producer: the slot at head is ours
            unsafe {
                let buffer = &mut *self.buffer.get();
                buffer[head].write(frame);
            }
            self.head.store(next, Ordering::Release);
            self.stats.pushed.fetch_add(1, Ordering::Relaxed);
            return;
        }
    }

    /// Pop the oldest frame, or `None` when empty
    ///
    /// ## Safety contract
    /// Only one thread may pop.
    pub fn pop(&self) -> Option<T> {
        loop {
            let tail = self.tail.load(Ordering::Acquire);
            let head = self.head.load(Ordering::Acquire);

            if tail == head {
                return None;
            }

            let frame = unsafe {
                let buffer = &*self.buffer.get();
                buffer[tail].assume_init_read()
            };

            // Claim the slot; losing means the producer dropped it first
            let next = (tail + 1) & (N - 1);
            match self.tail.compare_exchange(
                tail,
                next,
                Ordering::Release,
                Ordering::Relaxed,
            ) {
                Ok(_) => {
                    self.stats.popped.fetch_add(1, Ordering::Relaxed);
                    return Some(frame);
                }
                Err(_) => core::hint::spin_loop(),
            }
        }
    }

    /// Frames currently queued
    pub fn len(&self) -> usize {
        let head = self.head.load(Ordering::Acquire);
        let tail = self.tail.load(Ordering::Acquire);
        if head >= tail {
            head - tail
        } else {
            N - tail + head
        }
    }

    /// True when nothing is queued
    pub fn is_empty(&self) -> bool {
        self.head.load(Ordering::Acquire) == self.tail.load(Ordering::Acquire)
    }

    /// Health counters
    pub fn stats(&self) -> &QueueStats {
        &self.stats
    }
}

// The queue performs its own synchronization
unsafe impl<T: Copy + Send, const N: usize> Send for FrameQueue<T, N> {}
unsafe impl<T: Copy + Send, const N: usize> Sync for FrameQueue<T, N> {}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn push_pop_fifo() {
        let queue: FrameQueue<u32, 8> = FrameQueue::new();
        queue.push(1);
        queue.push(2);
        queue.push(3);

        assert_eq!(queue.len(), 3);
        assert_eq!(queue.pop(), Some(1));
        assert_eq!(queue.pop(), Some(2));
        assert_eq!(queue.pop(), Some(3));
        assert_eq!(queue.pop(), None);
    }

    #[test]
    fn overflow_drops_oldest() {
        let queue: FrameQueue<u32, 4> = FrameQueue::new();

        // Usable depth is 3; pushing 5 drops the two oldest
        for i in 0..5 {
            queue.push(i);
        }

        assert_eq!(
            queue.stats().dropped_oldest.load(Ordering::Relaxed),
            2
        );
        assert_eq!(queue.pop(), Some(2));
        assert_eq!(queue.pop(), Some(3));
        assert_eq!(queue.pop(), Some(4));
        assert_eq!(queue.pop(), None);
    }

    #[test]
    fn empty_queue() {
        let queue: FrameQueue<u32, 4> = FrameQueue::new();
        assert!(queue.is_empty());
        assert_eq!(queue.pop(), None);
    }

    #[cfg(feature = "std")]
    #[test]
    fn concurrent_producer_consumer() {
        use std::sync::Arc;

        let queue: Arc<FrameQueue<u32, 64>> = Arc::new(FrameQueue::new());
        let producer_q = Arc::clone(&queue);

        let producer = std::thread::spawn(move || {
            for i in 0..10_000u32 {
                producer_q.push(i);
            }
        });

        let mut last_seen = None;
        let mut received = 0u32;
        while received < 1000 {
            if let Some(v) = queue.pop() {
                // Drop-oldest preserves ordering of what survives
                if let Some(prev) = last_seen {
                    assert!(v > prev);
                }
                last_seen = Some(v);
                received += 1;
            }
        }
        producer.join().unwrap();
    }
}
