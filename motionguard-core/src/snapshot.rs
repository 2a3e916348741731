//! Shared Monitor Status
//!
//! A small read-mostly view of the monitor's health that other threads
//! (CLI status loops, exporters) can poll without touching the sampling
//! path. The sampling and scoring threads update it through an
//! `Arc<RwLock<..>>`; writers hold the lock for a field copy, never for
//! I/O.

use std::collections::VecDeque;
use std::sync::{Arc, RwLock};

use crate::calibration::CalibrationStatus;
use crate::sample::FilterState;
use crate::scoring::AnomalyRecord;

/// How many recent anomaly records the snapshot retains
pub const RECENT_CAPACITY: usize = 16;

/// Monitor lifecycle phase
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MonitorPhase {
    /// Constructed but not yet running
    Idle,
    /// Collecting the stationary calibration window
    Calibrating,
    /// Steady-state sampling and scoring
    Monitoring,
    /// Stop requested, draining in-flight frames
    ShuttingDown,
    /// Run loop has exited
    Stopped,
}

/// Point-in-time view of the monitor
#[derive(Debug, Clone)]
pub struct MonitorSnapshot {
    /// Current lifecycle phase of the run loop
    pub phase: MonitorPhase,
    /// Outcome of the startup calibration
    pub calibration: CalibrationStatus,
    /// Filter state as of the last processed sample
    pub filter: FilterState,
    /// Most recent anomaly score, if any frame has been scored
    pub last_score: Option<f32>,
    /// Most recently extracted fingerprint
    pub last_fingerprint: Option<crate::features::MotionFingerprint>,
    /// Samples consumed from the driver
    pub samples_processed: u64,
    /// Fingerprints extracted and queued
    pub frames_extracted: u64,
    /// Frames the scorer finished
    pub frames_scored: u64,
    /// Frames lost to queue overflow
    pub frames_dropped: u64,
    /// Records written past the anomaly threshold
    pub anomalies_total: u64,
    /// Consecutive sensor read failures at last check
    pub sensor_failures: u32,
    /// Ring of the latest anomaly records, newest last
    pub recent_anomalies: VecDeque<AnomalyRecord>,
}

impl Default for MonitorSnapshot {
    fn default() -> Self {
        Self {
            phase: MonitorPhase::Idle,
            calibration: CalibrationStatus::Uncalibrated,
            filter: FilterState::default(),
            last_score: None,
            last_fingerprint: None,
            samples_processed: 0,
            frames_extracted: 0,
            frames_scored: 0,
            frames_dropped: 0,
            anomalies_total: 0,
            sensor_failures: 0,
            recent_anomalies: VecDeque::with_capacity(RECENT_CAPACITY),
        }
    }
}

impl MonitorSnapshot {
    /// Append a threshold-crossing record, evicting the oldest past capacity
    pub fn push_anomaly(&mut self, record: AnomalyRecord) {
        if self.recent_anomalies.len() == RECENT_CAPACITY {
            self.recent_anomalies.pop_front();
        }
        self.recent_anomalies.push_back(record);
        self.anomalies_total += 1;
        if record.score.is_some() {
            self.last_score = record.score;
        }
    }
}

/// Handle shared between the monitor's threads and external observers
pub type SharedSnapshot = Arc<RwLock<MonitorSnapshot>>;

/// Create a fresh shared snapshot in the idle phase
pub fn shared() -> SharedSnapshot {
    Arc::new(RwLock::new(MonitorSnapshot::default()))
}

/// Apply `f` to the snapshot, ignoring a poisoned lock
///
/// A panicked reader must not take the sampling thread down with it.
pub fn update<F: FnOnce(&mut MonitorSnapshot)>(snapshot: &SharedSnapshot, f: F) {
    let mut guard = match snapshot.write() {
        Ok(guard) => guard,
        Err(poisoned) => poisoned.into_inner(),
    };
    f(&mut guard);
}

/// Clone the current snapshot contents
pub fn read(snapshot: &SharedSnapshot) -> MonitorSnapshot {
    match snapshot.read() {
        Ok(guard) => guard.clone(),
        Err(poisoned) => poisoned.into_inner().clone(),
    }
}
