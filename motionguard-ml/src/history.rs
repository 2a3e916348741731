//! Score History and Trend Tracking
//!
//! A single frame over threshold can be a bump of the bench; a rising
//! trend over many frames is a failing bearing. This ring keeps recent
//! scores with an exponential moving average so callers can alert on
//! sustained drift instead of single spikes.

use heapless::HistoryBuffer;

/// Rolling window of recent anomaly scores
///
/// `N` is the ring capacity; the EMA spans the whole run regardless.
pub struct ScoreHistory<const N: usize = 100> {
    scores: HistoryBuffer<f32, N>,
    ema: f32,
    alpha: f32,
    count: u64,
}

impl<const N: usize> ScoreHistory<N> {
    /// Create a history with the given EMA smoothing factor
    ///
    /// `alpha` near 0 smooths heavily; near 1 tracks the latest score.
    pub fn new(alpha: f32) -> Self {
        Self {
            scores: HistoryBuffer::new(),
            ema: 0.0,
            alpha: alpha.clamp(0.0, 1.0),
            count: 0,
        }
    }

    /// Record one score
    pub fn add(&mut self, score: f32) {
        if !score.is_finite() {
            return;
        }
        self.scores.write(score);
        self.ema = if self.count == 0 {
            score
        } else {
            self.alpha * score + (1.0 - self.alpha) * self.ema
        };
        self.count += 1;
    }

    /// Exponential moving average over all recorded scores
    pub fn ema(&self) -> f32 {
        self.ema
    }

    /// Scores recorded since construction
    pub fn count(&self) -> u64 {
        self.count
    }

    /// Mean of the newest `window` scores in the ring
    pub fn recent_average(&self, window: usize) -> Option<f32> {
        let stored = self.scores.len();
        if stored == 0 || window == 0 {
            return None;
        }
        let take = window.min(stored);
        let sum: f32 = self.scores.oldest_ordered().skip(stored - take).sum();
        Some(sum / take as f32)
    }

    /// Slope of a least-squares line through the ring, per sample
    ///
    /// Positive means scores are climbing. Needs at least two samples.
    pub fn trend(&self) -> f32 {
        let n = self.scores.len();
        if n < 2 {
            return 0.0;
        }
        let n_f = n as f32;
        let mean_x = (n_f - 1.0) / 2.0;
        let mean_y: f32 = self.scores.oldest_ordered().sum::<f32>() / n_f;

        let mut num = 0.0;
        let mut den = 0.0;
        for (i, y) in self.scores.oldest_ordered().enumerate() {
            let dx = i as f32 - mean_x;
            num += dx * (y - mean_y);
            den += dx * dx;
        }
        if den > 0.0 {
            num / den
        } else {
            0.0
        }
    }

    /// Whether the trend is clearly upward
    pub fn is_rising(&self) -> bool {
        self.trend() > 1e-4
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ema_starts_at_first_score() {
        let mut history: ScoreHistory<16> = ScoreHistory::new(0.2);
        history.add(0.4);
        assert_eq!(history.ema(), 0.4);
    }

    #[test]
    fn rising_scores_have_positive_trend() {
        let mut history: ScoreHistory<32> = ScoreHistory::new(0.1);
        for i in 0..20 {
            history.add(0.1 + 0.02 * i as f32);
        }
        assert!(history.trend() > 0.0);
        assert!(history.is_rising());
    }

    #[test]
    fn flat_scores_have_no_trend() {
        let mut history: ScoreHistory<32> = ScoreHistory::new(0.1);
        for _ in 0..20 {
            history.add(0.25);
        }
        assert!(history.trend().abs() < 1e-6);
        assert!(!history.is_rising());
    }

    #[test]
    fn recent_average_uses_the_newest_scores() {
        let mut history: ScoreHistory<8> = ScoreHistory::new(0.5);
        for _ in 0..4 {
            history.add(0.1);
        }
        for _ in 0..4 {
            history.add(0.9);
        }
        let avg = history.recent_average(4).unwrap();
        assert!((avg - 0.9).abs() < 1e-6, "avg = {}", avg);
    }

    #[test]
    fn non_finite_scores_are_ignored() {
        let mut history: ScoreHistory<8> = ScoreHistory::new(0.5);
        history.add(0.5);
        history.add(f32::NAN);
        assert_eq!(history.count(), 1);
        assert!(history.ema().is_finite());
    }

    #[test]
    fn empty_history_is_inert() {
        let history: ScoreHistory<8> = ScoreHistory::new(0.5);
        assert_eq!(history.recent_average(4), None);
        assert_eq!(history.trend(), 0.0);
    }
}
