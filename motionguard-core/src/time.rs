//! Time handling for the monitoring loop
//!
//! Provides a clock abstraction so the same pipeline runs against a
//! hardware timer, the OS monotonic clock, or a fixed test clock:
//! - Monotonic OS clock (when `std` is available)
//! - Fixed/steppable clock (for deterministic tests)

/// Timestamp in milliseconds since device boot (monotonic)
pub type Timestamp = u64;

/// Convert the gap between two timestamps to seconds
///
/// Saturates at zero for out-of-order timestamps rather than wrapping.
#[inline]
pub fn dt_seconds(earlier: Timestamp, later: Timestamp) -> f32 {
    later.saturating_sub(earlier) as f32 / 1000.0
}

/// Source of monotonic time for the system
pub trait TimeSource {
    /// Current timestamp in milliseconds
    fn now(&self) -> Timestamp;
}

/// Monotonic clock backed by `std::time::Instant`
#[cfg(feature = "std")]
#[derive(Debug, Clone)]
pub struct MonotonicClock {
    origin: std::time::Instant,
}

#[cfg(feature = "std")]
impl MonotonicClock {
    pub fn new() -> Self {
        Self {
            origin: std::time::Instant::now(),
        }
    }
}

#[cfg(feature = "std")]
impl Default for MonotonicClock {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(feature = "std")]
impl TimeSource for MonotonicClock {
    fn now(&self) -> Timestamp {
        self.origin.elapsed().as_millis() as Timestamp
    }
}

/// Fixed time source for testing
///
/// Advances only when told to, making loop timing deterministic.
#[derive(Debug, Clone)]
pub struct FixedClock {
    timestamp: Timestamp,
}

impl FixedClock {
    pub fn new(timestamp: Timestamp) -> Self {
        Self { timestamp }
    }

    pub fn set(&mut self, timestamp: Timestamp) {
        self.timestamp = timestamp;
    }

    pub fn advance(&mut self, ms: u64) {
        self.timestamp += ms;
    }
}

impl TimeSource for FixedClock {
    fn now(&self) -> Timestamp {
        self.timestamp
    }
}

/// Fixed-period scheduler for the sampling loop
///
/// Tracks when the next sample is due against a [`TimeSource`] and
/// reports how long the caller should wait. A loop that falls behind
/// reschedules from the present rather than replaying missed periods.
#[derive(Debug, Clone)]
pub struct Pacer {
    period_ms: u64,
    next_due: Timestamp,
}

impl Pacer {
    /// Schedule the first sample one period from now
    pub fn new(clock: &impl TimeSource, period_ms: u64) -> Self {
        Self {
            period_ms,
            next_due: clock.now() + period_ms,
        }
    }

    /// Milliseconds until the next sample is due, advancing the schedule
    ///
    /// Returns zero when the deadline has already passed.
    pub fn wait_ms(&mut self, clock: &impl TimeSource) -> u64 {
        let now = clock.now();
        let wait = self.next_due.saturating_sub(now);
        self.next_due = self.next_due.max(now) + self.period_ms;
        wait
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fixed_clock_advances() {
        let mut clock = FixedClock::new(1000);
        assert_eq!(clock.now(), 1000);

        clock.advance(10);
        assert_eq!(clock.now(), 1010);
    }

    #[test]
    fn dt_is_seconds() {
        assert_eq!(dt_seconds(1000, 1010), 0.010);
        // Out-of-order timestamps saturate instead of going negative
        assert_eq!(dt_seconds(2000, 1000), 0.0);
    }

    #[cfg(feature = "std")]
    #[test]
    fn monotonic_clock_is_monotonic() {
        let clock = MonotonicClock::new();
        let a = clock.now();
        let b = clock.now();
        assert!(b >= a);
    }

    #[test]
    fn pacer_waits_out_the_full_period() {
        let clock = FixedClock::new(0);
        let mut pacer = Pacer::new(&clock, 10);
        assert_eq!(pacer.wait_ms(&clock), 10);
    }

    #[test]
    fn on_time_loop_keeps_the_cadence() {
        let mut clock = FixedClock::new(0);
        let mut pacer = Pacer::new(&clock, 10);

        clock.set(10);
        assert_eq!(pacer.wait_ms(&clock), 0);
        // Next sample is due a full period after the one just taken
        assert_eq!(pacer.wait_ms(&clock), 10);
    }

    #[test]
    fn stalled_loop_reschedules_from_now() {
        let mut clock = FixedClock::new(0);
        let mut pacer = Pacer::new(&clock, 10);

        // Three periods late: no replaying of the missed deadlines
        clock.set(35);
        assert_eq!(pacer.wait_ms(&clock), 0);
        assert_eq!(pacer.wait_ms(&clock), 10);
    }
}
