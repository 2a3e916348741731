//! Anomaly Scoring Boundary
//!
//! The monitor core never interprets fingerprints itself; it hands them
//! across this trait and records whatever comes back. Scoring models live
//! in separate crates (see `motionguard-ml`) so the core stays free of
//! model-format and training concerns.

use crate::features::{FeatureFrame, MotionFingerprint};
use crate::time::Timestamp;

/// Scores feature frames for anomaly
///
/// Implementations must be cheap enough to keep up with the extraction
/// cadence; anything slower should buffer internally and report
/// unavailable instead of blocking the caller.
pub trait AnomalyScorer: Send {
    /// Whether the scorer currently has a usable model loaded
    ///
    /// The monitor keeps running without scores while this is false, so a
    /// model can be hot-loaded later without restarting capture.
    fn is_available(&self) -> bool;

    /// Score one frame
    ///
    /// Returns a value in `[0, 1]` where 0 is nominal and 1 is maximally
    /// anomalous, or `None` when no model is available or the frame
    /// cannot be scored.
    fn score(&mut self, frame: &FeatureFrame) -> Option<f32>;
}

/// Scorer that never produces a score
///
/// Stand-in for deployments that capture fingerprints before a model has
/// been trained.
#[derive(Debug, Default)]
pub struct NullScorer;

impl AnomalyScorer for NullScorer {
    fn is_available(&self) -> bool {
        false
    }

    fn score(&mut self, _frame: &FeatureFrame) -> Option<f32> {
        None
    }
}

/// One scoring evaluation, as persisted to the journal
///
/// Every extracted fingerprint produces a record, scored or not, so a
/// capture run without a model still yields training data.
#[derive(Debug, Clone, Copy)]
#[cfg_attr(feature = "std", derive(serde::Serialize, serde::Deserialize))]
pub struct AnomalyRecord {
    /// End time of the evaluated window, milliseconds
    pub timestamp: Timestamp,
    /// Anomaly score in `[0, 1]`; absent when no model was available
    pub score: Option<f32>,
    /// Whether the score crossed the configured threshold
    pub threshold_exceeded: bool,
    /// The evaluated fingerprint
    pub fingerprint: MotionFingerprint,
    /// Fused orientation at the window end (w, x, y, z)
    pub orientation: [f32; 4],
    /// Filter covariance trace, a confidence hint for later triage
    pub covariance_trace: f32,
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sample::FilterState;

    #[test]
    fn null_scorer_reports_unavailable() {
        let mut scorer = NullScorer;
        assert!(!scorer.is_available());
        let frame = FeatureFrame {
            timestamp: 0,
            fingerprint: [0.0; 32],
            state: FilterState::default(),
        };
        assert_eq!(scorer.score(&frame), None);
    }

    #[cfg(feature = "std")]
    #[test]
    fn record_round_trips_through_json() {
        let record = AnomalyRecord {
            timestamp: 123_456,
            score: Some(0.91),
            threshold_exceeded: true,
            fingerprint: [0.25; 32],
            orientation: [1.0, 0.0, 0.0, 0.0],
            covariance_trace: 0.04,
        };
        let line = serde_json::to_string(&record).unwrap();
        let back: AnomalyRecord = serde_json::from_str(&line).unwrap();
        assert_eq!(back.timestamp, record.timestamp);
        assert_eq!(back.score, record.score);
        assert_eq!(back.fingerprint, record.fingerprint);
    }
}
