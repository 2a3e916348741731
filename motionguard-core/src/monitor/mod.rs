//! Monitor Orchestration
//!
//! ## Overview
//!
//! Ties the whole pipeline together: calibrate once at startup, then run
//! the sampling loop (driver → calibration correction → attitude filter →
//! feature window) on the caller's thread while a scoring thread drains
//! extracted fingerprints from the frame queue, scores them, and journals
//! anomalies.
//!
//! ```text
//!           caller thread                    scoring thread
//!  ┌──────────────────────────────┐   ┌──────────────────────────┐
//!  │ driver.read() ─▶ correct     │   │ queue.pop()              │
//!  │  ─▶ ekf.predict / update     │ Q │  ─▶ scorer.score()       │
//!  │  ─▶ window.push              │──▶│  ─▶ snapshot / journal   │
//!  │  every cadence: extract ─▶ Q │   │                          │
//!  └──────────────────────────────┘   └──────────────────────────┘
//! ```
//!
//! ## Lifecycle
//!
//! Idle → Calibrating → Monitoring → ShuttingDown → Stopped. A stop
//! request is honored at every blocking point; shutdown waits for the
//! scoring thread to drain the queue so no extracted frame is silently
//! lost.
//!
//! ## Fault Handling
//!
//! Sensor read errors retry with bounded exponential backoff and only
//! become fatal after a configured run of consecutive failures. Filter
//! divergence resets internally. Journal I/O errors are logged and
//! monitoring continues; losing one record beats losing the run.

use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, Ordering};
use std::thread;
use std::time::Duration;

use crate::buffer::FeatureWindow;
use crate::calibration::{CalibrationProfile, Calibrator};
use crate::config::MonitorConfig;
use crate::driver::SensorDriver;
use crate::errors::{CalibrationError, MonitorError};
use crate::features::{ExtractorConfig, FeatureExtractor, FeatureFrame};
use crate::fusion::ekf::{AttitudeEkf, EkfConfig};
use crate::journal::AnomalyJournal;
use crate::queue::FrameQueue;
use crate::sample::{RawSample, WindowSample};
use crate::scoring::{AnomalyRecord, AnomalyScorer};
use crate::snapshot::{self, MonitorPhase, SharedSnapshot};
use crate::time::{dt_seconds, MonotonicClock, Pacer, Timestamp};
use crate::vec3;

/// Frame queue slots; power of two, sized for several seconds of
/// extraction cadence at 100 Hz
pub const FRAME_QUEUE_CAPACITY: usize = 64;

/// Sleep while polling an empty queue or a not-ready driver
const POLL_SLEEP: Duration = Duration::from_millis(1);

/// How long shutdown waits for the scoring thread to drain the queue
const DRAIN_TIMEOUT: Duration = Duration::from_secs(2);

/// The motion anomaly monitor
///
/// Owns the driver and scorer for its whole run. `run` blocks the calling
/// thread until a stop is requested, the optional sample limit is hit, or
/// a fatal error occurs.
pub struct Monitor<D: SensorDriver> {
    config: MonitorConfig,
    driver: D,
    scorer: Box<dyn AnomalyScorer>,
    journal_path: Option<PathBuf>,
    snapshot: SharedSnapshot,
    sample_limit: Option<u64>,
    pace: bool,
}

impl<D: SensorDriver> Monitor<D> {
    /// Build a monitor, validating the configuration up front
    pub fn new(
        config: MonitorConfig,
        driver: D,
        scorer: Box<dyn AnomalyScorer>,
    ) -> Result<Self, MonitorError> {
        config.validate()?;
        Ok(Self {
            config,
            driver,
            scorer,
            journal_path: None,
            snapshot: snapshot::shared(),
            sample_limit: None,
            pace: false,
        })
    }

    /// Persist anomaly records as NDJSON at `path`
    pub fn with_journal<P: Into<PathBuf>>(mut self, path: P) -> Self {
        self.journal_path = Some(path.into());
        self
    }

    /// Stop automatically after this many processed samples
    pub fn with_sample_limit(mut self, limit: u64) -> Self {
        self.sample_limit = Some(limit);
        self
    }

    /// Sleep one sample period per read
    ///
    /// Drivers that signal readiness through `WouldBlock` pace the loop
    /// themselves; free-running drivers (like the synthetic one) need
    /// this when wall-clock pacing matters.
    pub fn with_pacing(mut self) -> Self {
        self.pace = true;
        self
    }

    /// Handle for observing monitor status from other threads
    pub fn snapshot_handle(&self) -> SharedSnapshot {
        self.snapshot.clone()
    }

    /// Run the monitor until `stop` is set or the sample limit is reached
    pub fn run(&mut self, stop: &AtomicBool) -> Result<(), MonitorError> {
        let result = self.run_inner(stop);
        snapshot::update(&self.snapshot, |s| s.phase = MonitorPhase::Stopped);
        result
    }

    fn run_inner(&mut self, stop: &AtomicBool) -> Result<(), MonitorError> {
        let period_ms = self.config.sample_period_ms();
        let period_s = 1.0 / self.config.sample_rate_hz;

        snapshot::update(&self.snapshot, |s| s.phase = MonitorPhase::Calibrating);
        let profile = match self.calibrate(stop)? {
            Some(profile) => profile,
            // Stop arrived mid-calibration
            None => return Ok(()),
        };
        snapshot::update(&self.snapshot, |s| s.calibration = profile.status);
        log::info!(
            "calibrated over {} samples, gravity {:.3} m/s²",
            profile.sample_count,
            profile.gravity_magnitude
        );

        // The filter and extractor see bias-corrected samples, whose
        // magnitude at rest is the calibrated reference rather than the
        // raw measured one
        let gravity = vec3::norm(&profile.gravity);
        let ekf_config = EkfConfig {
            gravity,
            static_gate_min: self.config.static_gate_min,
            static_gate_max: self.config.static_gate_max,
            adaptation: self.config.adaptation,
        };
        let mut ekf = AttitudeEkf::with_profile(ekf_config, &profile);
        let extractor = FeatureExtractor::new(ExtractorConfig {
            window_size: self.config.window.size,
            min_samples: self.config.window.min_samples,
            sample_rate_hz: self.config.sample_rate_hz,
            band_edges_hz: self.config.band_edges_hz,
            gravity,
        });

        let queue: FrameQueue<FeatureFrame, FRAME_QUEUE_CAPACITY> = FrameQueue::new();
        let sampler_done = AtomicBool::new(false);
        let journal = match &self.journal_path {
            Some(path) => match AnomalyJournal::open(path) {
                Ok(journal) => Some(journal),
                Err(e) => {
                    log::error!("cannot open anomaly journal: {}; continuing without", e);
                    None
                }
            },
            None => None,
        };

        snapshot::update(&self.snapshot, |s| s.phase = MonitorPhase::Monitoring);

        let threshold = self.config.anomaly_threshold;
        let scorer = &mut self.scorer;
        let shared = &self.snapshot;
        let driver = &mut self.driver;
        let retry = self.config.sensor_retry;
        let sample_limit = self.sample_limit;
        let cadence = self.config.window.cadence;
        let pace = self.pace;

        let clock = MonotonicClock::new();
        let mut pacer = pace.then(|| Pacer::new(&clock, period_ms));

        let mut loop_result = Ok(());
        thread::scope(|scope| {
            scope.spawn(|| {
                score_loop(&queue, scorer, journal, shared, threshold, &sampler_done);
            });

            let mut window: FeatureWindow = FeatureWindow::new();
            let mut prev_ts: Option<Timestamp> = None;
            let mut samples: u64 = 0;
            let mut since_extraction = 0usize;
            let mut failures = 0u32;

            while !stop.load(Ordering::Relaxed) {
                if sample_limit.is_some_and(|limit| samples >= limit) {
                    break;
                }

                let raw = match read_with_retry(driver, &retry, stop, &mut failures) {
                    Ok(Some(raw)) => raw,
                    Ok(None) => break,
                    Err(e) => {
                        loop_result = Err(e);
                        break;
                    }
                };

                let corrected = profile.correct(&raw);
                if !corrected.is_finite() {
                    log::warn!("dropping non-finite sample at t={}", raw.timestamp);
                    continue;
                }

                let dt = match prev_ts {
                    Some(prev) => dt_seconds(prev, corrected.timestamp),
                    None => period_s,
                };
                prev_ts = Some(corrected.timestamp);

                ekf.predict(&corrected.gyro, dt);
                if let Err(e) = ekf.update(&corrected.accel) {
                    log::debug!("skipping attitude update: {}", e);
                }
                let state = ekf.state();
                window.push(WindowSample {
                    raw: corrected,
                    state,
                });
                samples += 1;
                since_extraction += 1;

                if since_extraction >= cadence {
                    match extractor.extract(&window) {
                        Ok(fingerprint) => {
                            since_extraction = 0;
                            queue.push(FeatureFrame {
                                timestamp: corrected.timestamp,
                                fingerprint,
                                state,
                            });
                            let dropped =
                                queue.stats().dropped_oldest.load(Ordering::Relaxed) as u64;
                            snapshot::update(shared, |s| {
                                s.frames_extracted += 1;
                                s.frames_dropped = dropped;
                                s.last_fingerprint = Some(fingerprint);
                            });
                        }
                        // Window still filling after startup or a clear
                        Err(e) => log::trace!("extraction deferred: {}", e),
                    }
                }

                snapshot::update(shared, |s| {
                    s.samples_processed = samples;
                    s.filter = state;
                    s.sensor_failures = failures;
                });

                if let Some(pacer) = pacer.as_mut() {
                    let wait = pacer.wait_ms(&clock);
                    if wait > 0 {
                        thread::sleep(Duration::from_millis(wait));
                    }
                }
            }

            snapshot::update(shared, |s| s.phase = MonitorPhase::ShuttingDown);
            sampler_done.store(true, Ordering::Release);
        });

        loop_result
    }

    /// Collect the stationary window, retrying up to the configured limit
    ///
    /// Returns `Ok(None)` when a stop request interrupts calibration.
    fn calibrate(
        &mut self,
        stop: &AtomicBool,
    ) -> Result<Option<CalibrationProfile>, MonitorError> {
        let attempts = self.config.calibration.max_attempts.max(1);
        let retry = self.config.sensor_retry;
        let clock = MonotonicClock::new();
        let mut pacer = self
            .pace
            .then(|| Pacer::new(&clock, self.config.sample_period_ms()));
        let mut failures = 0u32;
        let mut last_error = CalibrationError::InsufficientSamples {
            required: self.config.calibration.min_samples,
            available: 0,
        };

        for attempt in 1..=attempts {
            let mut calibrator = Calibrator::new(&self.config);
            calibrator.begin();

            let outcome = loop {
                if stop.load(Ordering::Relaxed) {
                    return Ok(None);
                }
                let raw = match read_with_retry(&mut self.driver, &retry, stop, &mut failures)
                {
                    Ok(Some(raw)) => raw,
                    Ok(None) => return Ok(None),
                    Err(e) => return Err(e),
                };
                if let Some(result) = calibrator.push(&raw) {
                    break result;
                }
                if let Some(pacer) = pacer.as_mut() {
                    let wait = pacer.wait_ms(&clock);
                    if wait > 0 {
                        thread::sleep(Duration::from_millis(wait));
                    }
                }
            };

            match outcome {
                Ok(profile) => return Ok(Some(profile)),
                Err(e) => {
                    log::warn!("calibration attempt {}/{} failed: {}", attempt, attempts, e);
                    last_error = e;
                }
            }
        }

        Err(MonitorError::CalibrationFailed {
            attempts,
            last: last_error,
        })
    }
}

/// Drain the frame queue, scoring and journaling every evaluation
///
/// Runs until the sampler signals done and the queue is empty, or the
/// drain timeout expires. Frames without a score (no model loaded) are
/// still journaled so a capture run yields training data.
fn score_loop(
    queue: &FrameQueue<FeatureFrame, FRAME_QUEUE_CAPACITY>,
    scorer: &mut Box<dyn AnomalyScorer>,
    mut journal: Option<AnomalyJournal>,
    shared: &SharedSnapshot,
    threshold: f32,
    sampler_done: &AtomicBool,
) {
    let mut drain_deadline: Option<std::time::Instant> = None;

    loop {
        if sampler_done.load(Ordering::Acquire) {
            let deadline =
                *drain_deadline.get_or_insert_with(|| std::time::Instant::now() + DRAIN_TIMEOUT);
            if std::time::Instant::now() > deadline {
                let left = queue.len();
                if left > 0 {
                    log::warn!("drain timeout expired with {} frames unscored", left);
                }
                return;
            }
        }

        let frame = match queue.pop() {
            Some(frame) => frame,
            None => {
                if sampler_done.load(Ordering::Acquire) {
                    return;
                }
                thread::sleep(POLL_SLEEP);
                continue;
            }
        };

        let score = scorer.score(&frame);
        let exceeded = score.is_some_and(|s| s >= threshold);
        let record = AnomalyRecord {
            timestamp: frame.timestamp,
            score,
            threshold_exceeded: exceeded,
            fingerprint: frame.fingerprint,
            orientation: frame.state.orientation,
            covariance_trace: frame.state.covariance_trace,
        };

        if let Some(journal) = journal.as_mut() {
            if let Err(e) = journal.append(&record) {
                log::error!("journal write failed: {}", e);
            }
        }

        snapshot::update(shared, |s| {
            if score.is_some() {
                s.frames_scored += 1;
                s.last_score = score;
            }
            if exceeded {
                s.push_anomaly(record);
            }
        });
        if exceeded {
            log::info!(
                "anomaly at t={} score {:.3}",
                record.timestamp,
                record.score.unwrap_or(0.0)
            );
        }
    }
}

/// Read one sample, absorbing transient failures with bounded backoff
///
/// `WouldBlock` polls until data is ready. Hard errors back off
/// exponentially from the configured initial delay and become a
/// [`MonitorError::SensorUnavailable`] once the consecutive-failure
/// budget is spent. Returns `Ok(None)` if a stop request arrives while
/// waiting.
fn read_with_retry<D: SensorDriver>(
    driver: &mut D,
    retry: &crate::config::SensorRetryConfig,
    stop: &AtomicBool,
    failures: &mut u32,
) -> Result<Option<RawSample>, MonitorError> {
    loop {
        match driver.read() {
            Ok(sample) => {
                *failures = 0;
                return Ok(Some(sample));
            }
            Err(nb::Error::WouldBlock) => {
                if stop.load(Ordering::Relaxed) {
                    return Ok(None);
                }
                thread::sleep(POLL_SLEEP);
            }
            Err(nb::Error::Other(e)) => {
                *failures += 1;
                if *failures >= retry.max_consecutive_failures {
                    return Err(MonitorError::SensorUnavailable {
                        consecutive_failures: *failures,
                        last: e,
                    });
                }
                let shift = (*failures - 1).min(16);
                let backoff_ms = retry
                    .backoff_initial_ms
                    .saturating_mul(1 << shift)
                    .min(retry.backoff_max_ms);
                log::warn!(
                    "sensor read failed ({}), retry {}/{} in {} ms",
                    e,
                    failures,
                    retry.max_consecutive_failures,
                    backoff_ms
                );
                if stop.load(Ordering::Relaxed) {
                    return Ok(None);
                }
                thread::sleep(Duration::from_millis(backoff_ms));
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::GRAVITY_MS2;
    use crate::driver::SyntheticDriver;
    use crate::errors::SensorIoError;
    use crate::features::FINGERPRINT_DIM;
    use crate::scoring::NullScorer;

    /// Scores the mean absolute slot value; crude but monotonic in
    /// vibration energy, which is all these tests need
    struct EnergyScorer;

    impl AnomalyScorer for EnergyScorer {
        fn is_available(&self) -> bool {
            true
        }

        fn score(&mut self, frame: &FeatureFrame) -> Option<f32> {
            let sum: f32 = frame.fingerprint.iter().map(|v| v.abs()).sum();
            Some((sum / FINGERPRINT_DIM as f32).min(1.0))
        }
    }

    fn fast_config() -> MonitorConfig {
        let mut config = MonitorConfig::default();
        // Short calibration window so tests finish quickly
        config.calibration.duration_s = 1.5;
        config.calibration.min_samples = 100;
        config.window.size = 128;
        config.window.cadence = 64;
        config.window.min_samples = 64;
        config
    }

    #[test]
    fn invalid_config_is_rejected_up_front() {
        let mut config = fast_config();
        config.window.size = 100;
        let result = Monitor::new(
            config,
            SyntheticDriver::stationary(1),
            Box::new(NullScorer),
        );
        assert!(matches!(result, Err(MonitorError::Config(_))));
    }

    #[test]
    fn full_run_extracts_and_scores_frames() {
        let driver = SyntheticDriver::stationary(11);
        let mut monitor = Monitor::new(fast_config(), driver, Box::new(EnergyScorer))
            .unwrap()
            .with_sample_limit(400);
        let handle = monitor.snapshot_handle();

        let stop = AtomicBool::new(false);
        monitor.run(&stop).unwrap();

        let view = snapshot::read(&handle);
        assert_eq!(view.phase, MonitorPhase::Stopped);
        assert_eq!(view.samples_processed, 400);
        assert!(view.frames_extracted >= 4, "extracted {}", view.frames_extracted);
        assert_eq!(view.frames_scored, view.frames_extracted);
        assert!(view.last_score.is_some());
    }

    #[test]
    fn null_scorer_still_monitors() {
        let driver = SyntheticDriver::stationary(5);
        let mut monitor = Monitor::new(fast_config(), driver, Box::new(NullScorer))
            .unwrap()
            .with_sample_limit(300);
        let handle = monitor.snapshot_handle();

        let stop = AtomicBool::new(false);
        monitor.run(&stop).unwrap();

        let view = snapshot::read(&handle);
        assert!(view.frames_extracted > 0);
        assert_eq!(view.frames_scored, 0);
        assert_eq!(view.last_score, None);
    }

    #[test]
    fn transient_sensor_faults_are_absorbed() {
        let mut driver = SyntheticDriver::stationary(8);
        driver.inject_faults(5, SensorIoError::Timeout);

        let mut monitor = Monitor::new(fast_config(), driver, Box::new(NullScorer))
            .unwrap()
            .with_sample_limit(250);
        let stop = AtomicBool::new(false);
        monitor.run(&stop).unwrap();
    }

    #[test]
    fn persistent_sensor_failure_is_fatal() {
        let mut config = fast_config();
        config.sensor_retry.max_consecutive_failures = 4;
        config.sensor_retry.backoff_initial_ms = 0;

        let mut driver = SyntheticDriver::stationary(8);
        driver.inject_faults(1000, SensorIoError::Bus);

        let mut monitor = Monitor::new(config, driver, Box::new(NullScorer)).unwrap();
        let stop = AtomicBool::new(false);
        let err = monitor.run(&stop).unwrap_err();
        assert!(matches!(
            err,
            MonitorError::SensorUnavailable {
                consecutive_failures: 4,
                last: SensorIoError::Bus,
            }
        ));
    }

    #[test]
    fn tilted_rest_calibrates_and_runs() {
        // Device resting on a 30° incline; gravity splits across y and z
        let g = GRAVITY_MS2;
        let driver = SyntheticDriver::new(21, [0.0, 0.5 * g, 0.866 * g], 10);
        let mut monitor = Monitor::new(fast_config(), driver, Box::new(EnergyScorer))
            .unwrap()
            .with_sample_limit(300);
        let handle = monitor.snapshot_handle();

        let stop = AtomicBool::new(false);
        monitor.run(&stop).unwrap();

        let view = snapshot::read(&handle);
        assert!(view.frames_extracted > 0);
        assert_eq!(view.filter.resets, 0);
    }

    #[test]
    fn stop_during_calibration_exits_cleanly() {
        let driver = SyntheticDriver::stationary(2);
        let mut monitor = Monitor::new(fast_config(), driver, Box::new(NullScorer)).unwrap();
        let handle = monitor.snapshot_handle();

        let stop = AtomicBool::new(true);
        monitor.run(&stop).unwrap();
        assert_eq!(snapshot::read(&handle).phase, MonitorPhase::Stopped);
    }
}
