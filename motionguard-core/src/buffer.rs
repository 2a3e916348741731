//! Fixed-Capacity Feature Window
//!
//! ## Overview
//!
//! The feature extractor consumes a sliding window of the most recent
//! (raw sample, filter state) pairs. This module provides that window as a
//! fixed-capacity ring: pushes overwrite the oldest entry once full, reads
//! iterate in chronological order, and nothing allocates.
//!
//! ## Design Rationale
//!
//! Overwrite-on-full is the right policy for a monitor: the most recent
//! motion is always the most relevant, and a stalled consumer must never
//! stop sample ingestion. The window is never partially consumed; the
//! extractor reads a snapshot of the tail while the ring keeps filling.
//!
//! Capacity is a compile-time constant so the ring can live inline in the
//! monitor without heap allocation; the *logical* window size used for
//! extraction is runtime configuration (validated to fit the capacity).

use crate::sample::WindowSample;

/// Hard capacity of the feature window ring (samples)
///
/// Sized for a several-second span at the ~100 Hz sensor rate. Power of
/// two so the wraparound arithmetic compiles to masking.
pub const WINDOW_CAPACITY: usize = 512;

/// Ring buffer over the last ≤ N window samples
///
/// ## Invariants
///
/// - `write_pos < N`
/// - `len <= N`
/// - Iteration yields entries oldest to newest
#[derive(Clone, Debug)]
pub struct FeatureWindow<const N: usize = WINDOW_CAPACITY> {
    data: [Option<WindowSample>; N],
    write_pos: usize,
    len: usize,
}

impl<const N: usize> FeatureWindow<N> {
    /// Create an empty window
    pub const fn new() -> Self {
        Self {
            data: [None; N],
            write_pos: 0,
            len: 0,
        }
    }

    /// Append a sample, overwriting the oldest entry when full
    pub fn push(&mut self, sample: WindowSample) {
        self.data[self.write_pos] = Some(sample);
        self.write_pos = (self.write_pos + 1) % N;
        if self.len < N {
            self.len += 1;
        }
    }

    /// Number of stored samples
    pub fn len(&self) -> usize {
        self.len
    }

    /// True when nothing has been pushed yet
    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// True once the ring has wrapped at least once
    pub fn is_full(&self) -> bool {
        self.len == N
    }

    /// Most recently pushed sample
    pub fn latest(&self) -> Option<&WindowSample> {
        if self.is_empty() {
            return None;
        }
        let idx = if self.write_pos == 0 {
            N - 1
        } else {
            self.write_pos - 1
        };
        self.data[idx].as_ref()
    }

    /// Discard all samples
    pub fn clear(&mut self) {
        self.write_pos = 0;
        self.len = 0;
    }

    /// Iterate oldest to newest over everything stored
    pub fn iter(&self) -> WindowIter<'_, N> {
        self.tail(self.len)
    }

    /// Iterate oldest to newest over the last `n` samples
    ///
    /// When fewer than `n` samples are stored, yields all of them. This is
    /// the extractor's view: the configured window size applied to the
    /// tail of the ring.
    pub fn tail(&self, n: usize) -> WindowIter<'_, N> {
        let take = n.min(self.len);
        WindowIter {
            window: self,
            logical: self.len - take,
            remaining: take,
        }
    }

    /// Resolve a logical index (0 = oldest stored) to a slot
    fn get(&self, logical: usize) -> Option<&WindowSample> {
        if logical >= self.len {
            return None;
        }
        let physical = if self.len < N {
            logical
        } else {
            (self.write_pos + logical) % N
        };
        self.data[physical].as_ref()
    }
}

impl<const N: usize> Default for FeatureWindow<N> {
    fn default() -> Self {
        Self::new()
    }
}

/// Chronological iterator over a window tail
pub struct WindowIter<'a, const N: usize> {
    window: &'a FeatureWindow<N>,
    logical: usize,
    remaining: usize,
}

impl<'a, const N: usize> Iterator for WindowIter<'a, N> {
    type Item = &'a WindowSample;

    fn next(&mut self) -> Option<Self::Item> {
        if self.remaining == 0 {
            return None;
        }
        let item = self.window.get(self.logical)?;
        self.logical += 1;
        self.remaining -= 1;
        Some(item)
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        (self.remaining, Some(self.remaining))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sample::{FilterState, RawSample, WindowSample};

    fn sample_at(t: u64) -> WindowSample {
        WindowSample {
            raw: RawSample::new(t, [0.0, 0.0, 9.81], [0.0; 3]),
            state: FilterState::default(),
        }
    }

    #[test]
    fn empty_window() {
        let window: FeatureWindow<8> = FeatureWindow::new();
        assert!(window.is_empty());
        assert!(window.latest().is_none());
        assert_eq!(window.iter().count(), 0);
    }

    #[test]
    fn overwrites_oldest_when_full() {
        let mut window: FeatureWindow<4> = FeatureWindow::new();
        for t in 0..6 {
            window.push(sample_at(t));
        }

        assert!(window.is_full());
        assert_eq!(window.len(), 4);

        let timestamps: heapless::Vec<u64, 4> =
            window.iter().map(|s| s.raw.timestamp).collect();
        assert_eq!(&timestamps[..], &[2, 3, 4, 5]);
        assert_eq!(window.latest().unwrap().raw.timestamp, 5);
    }

    #[test]
    fn tail_returns_most_recent() {
        let mut window: FeatureWindow<8> = FeatureWindow::new();
        for t in 0..8 {
            window.push(sample_at(t));
        }

        let timestamps: heapless::Vec<u64, 8> =
            window.tail(3).map(|s| s.raw.timestamp).collect();
        assert_eq!(&timestamps[..], &[5, 6, 7]);
    }

    #[test]
    fn tail_larger_than_fill_yields_all() {
        let mut window: FeatureWindow<8> = FeatureWindow::new();
        window.push(sample_at(1));
        window.push(sample_at(2));

        assert_eq!(window.tail(8).count(), 2);
    }

    #[test]
    fn clear_resets() {
        let mut window: FeatureWindow<4> = FeatureWindow::new();
        window.push(sample_at(1));
        window.clear();
        assert!(window.is_empty());
        assert_eq!(window.iter().count(), 0);
    }
}
