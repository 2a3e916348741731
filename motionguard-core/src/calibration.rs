//! Stationary Self-Calibration
//!
//! ## Overview
//!
//! At startup the device is assumed stationary for a configured window
//! (~30 s at the nominal rate). During that window the calibrator
//! accumulates running statistics over the raw stream and derives:
//!
//! - **Gyro bias**: the mean angular rate. A stationary gyro should read
//!   zero, so the mean *is* the bias.
//! - **Accel bias**: computed *relative to gravity*, not by zeroing the
//!   axes. The mean acceleration vector points along local "down"; the
//!   bias is the excess along that direction so that the corrected vector
//!   keeps the measured direction but matches the expected magnitude:
//!
//!   ```text
//!   d    = mean_accel / ‖mean_accel‖         (gravity direction)
//!   bias = (‖mean_accel‖ − g) · d
//!   ```
//!
//!   Zeroing all three axes would erase the gravity reference the state
//!   estimator and tilt features depend on.
//!
//! ## Validation
//!
//! A window is accepted only when the device was plausibly stationary:
//! the measured gravity magnitude must fall inside a tolerance band around
//! 9.81 m/s² and the per-axis acceleration standard deviation must stay
//! under the jitter ceiling. Variance is tracked with Welford's algorithm
//! so a 30 s window needs no sample storage.
//!
//! ## State Machine
//!
//! ```text
//! Uncalibrated ──begin()──▶ Calibrating ──▶ Calibrated (terminal)
//!       ▲                        │
//!       └──────── begin() ◀── Failed (retryable)
//! ```

use libm::sqrtf;

use crate::config::{MonitorConfig, GRAVITY_MS2};
use crate::errors::CalibrationError;
use crate::sample::RawSample;
use crate::vec3::{self, Vec3};

/// Lifecycle of a calibration profile
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CalibrationStatus {
    /// No calibration attempted yet
    Uncalibrated,
    /// Accumulating stationary samples
    Calibrating,
    /// Profile produced and validated
    Calibrated,
    /// Last attempt rejected; retryable
    Failed,
}

/// Validated sensor calibration, read-only once produced
///
/// Owned exclusively by the [`Calibrator`] until `Calibrated`, then shared
/// read-only with the estimator for the process lifetime (or until the
/// orchestrator requests recalibration).
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CalibrationProfile {
    /// Accelerometer bias (m/s²), relative to expected gravity
    pub accel_bias: Vec3,
    /// Gyroscope bias (rad/s)
    pub gyro_bias: Vec3,
    /// Reference gravity vector in device frame ("down", magnitude g)
    pub gravity: Vec3,
    /// Gravity magnitude measured before bias removal (m/s²)
    pub gravity_magnitude: f32,
    /// Worst per-axis acceleration standard deviation over the window (m/s²)
    pub accel_stddev: f32,
    /// Lifecycle status; always `Calibrated` on a produced profile
    pub status: CalibrationStatus,
    /// Samples that contributed to the profile
    pub sample_count: u32,
}

impl CalibrationProfile {
    /// Apply bias correction to a raw sample
    #[inline]
    pub fn correct(&self, sample: &RawSample) -> RawSample {
        RawSample {
            timestamp: sample.timestamp,
            accel: vec3::sub(&sample.accel, &self.accel_bias),
            gyro: vec3::sub(&sample.gyro, &self.gyro_bias),
        }
    }
}

/// Accumulates stationary samples into a [`CalibrationProfile`]
///
/// Single writer: the orchestrator feeds it during the calibration phase
/// and nothing else touches it. Does not mutate any filter state.
pub struct Calibrator {
    status: CalibrationStatus,
    /// Samples to accumulate before concluding
    target_samples: u32,
    /// Minimum acceptable sample count
    min_samples: u32,
    /// Gravity magnitude tolerance, percent
    tolerance_pct: f32,
    /// Per-axis stddev ceiling (m/s²)
    jitter_limit: f32,

    // Welford accumulators
    count: u32,
    accel_mean: Vec3,
    accel_m2: Vec3,
    gyro_mean: Vec3,
}

impl Calibrator {
    pub fn new(config: &MonitorConfig) -> Self {
        Self {
            status: CalibrationStatus::Uncalibrated,
            target_samples: config.calibration_samples(),
            min_samples: config.calibration.min_samples,
            tolerance_pct: config.calibration.gravity_tolerance_pct,
            jitter_limit: config.calibration.jitter_limit,
            count: 0,
            accel_mean: vec3::ZERO,
            accel_m2: vec3::ZERO,
            gyro_mean: vec3::ZERO,
        }
    }

    /// Current lifecycle state
    pub fn status(&self) -> CalibrationStatus {
        self.status
    }

    /// Samples accumulated so far
    pub fn sample_count(&self) -> u32 {
        self.count
    }

    /// Start (or restart after failure) a calibration window
    pub fn begin(&mut self) {
        self.status = CalibrationStatus::Calibrating;
        self.count = 0;
        self.accel_mean = vec3::ZERO;
        self.accel_m2 = vec3::ZERO;
        self.gyro_mean = vec3::ZERO;
    }

    /// Feed one stationary sample
    ///
    /// Returns `Some` once the window concludes: either a validated
    /// profile or the reason the attempt was rejected. Non-finite samples
    /// are ignored rather than poisoning the accumulators.
    pub fn push(
        &mut self,
        sample: &RawSample,
    ) -> Option<Result<CalibrationProfile, CalibrationError>> {
        if self.status != CalibrationStatus::Calibrating || !sample.is_finite() {
            return None;
        }

        self.count += 1;
        let n = self.count as f32;
        for axis in 0..3 {
            let delta = sample.accel[axis] - self.accel_mean[axis];
            self.accel_mean[axis] += delta / n;
            let delta2 = sample.accel[axis] - self.accel_mean[axis];
            self.accel_m2[axis] += delta * delta2;

            self.gyro_mean[axis] += (sample.gyro[axis] - self.gyro_mean[axis]) / n;
        }

        if self.count < self.target_samples {
            return None;
        }

        let outcome = self.conclude();
        self.status = match outcome {
            Ok(_) => CalibrationStatus::Calibrated,
            Err(_) => CalibrationStatus::Failed,
        };
        Some(outcome)
    }

    /// Force the window to conclude with whatever has accumulated
    ///
    /// Used when the input stream ends early; applies the same validation
    /// as a full window.
    pub fn finish(&mut self) -> Result<CalibrationProfile, CalibrationError> {
        let outcome = self.conclude();
        self.status = match outcome {
            Ok(_) => CalibrationStatus::Calibrated,
            Err(_) => CalibrationStatus::Failed,
        };
        outcome
    }

    fn conclude(&self) -> Result<CalibrationProfile, CalibrationError> {
        if self.count < self.min_samples {
            return Err(CalibrationError::InsufficientSamples {
                required: self.min_samples,
                available: self.count,
            });
        }

        // Worst per-axis standard deviation gates stationarity
        let mut worst_stddev = 0.0f32;
        for axis in 0..3 {
            let variance = self.accel_m2[axis] / (self.count - 1).max(1) as f32;
            worst_stddev = worst_stddev.max(sqrtf(variance));
        }
        if worst_stddev > self.jitter_limit {
            return Err(CalibrationError::ExcessiveJitter {
                stddev: worst_stddev,
                limit: self.jitter_limit,
            });
        }

        let measured = vec3::norm(&self.accel_mean);
        let tolerance = GRAVITY_MS2 * self.tolerance_pct / 100.0;
        if (measured - GRAVITY_MS2).abs() > tolerance {
            return Err(CalibrationError::OutOfTolerance {
                measured,
                expected: GRAVITY_MS2,
                tolerance_pct: self.tolerance_pct,
            });
        }

        // Bias along the measured gravity direction only; the direction
        // itself is the reference "down" for the estimator
        let down = vec3::normalize(&self.accel_mean);
        let accel_bias = vec3::scale(&down, measured - GRAVITY_MS2);

        Ok(CalibrationProfile {
            accel_bias,
            gyro_bias: self.gyro_mean,
            gravity: vec3::scale(&down, GRAVITY_MS2),
            gravity_magnitude: measured,
            accel_stddev: worst_stddev,
            status: CalibrationStatus::Calibrated,
            sample_count: self.count,
        })
    }
}
