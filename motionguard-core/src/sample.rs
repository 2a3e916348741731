//! Sample Types Flowing Through the Monitoring Pipeline
//!
//! ## Overview
//!
//! This module defines the data carried from the sensor boundary through
//! calibration, state estimation, and feature extraction:
//!
//! ```text
//! SensorDriver → RawSample → Calibrator / AttitudeEkf → WindowSample
//!                                                           ↓
//!                                             FeatureWindow → fingerprint
//! ```
//!
//! ## Memory Model
//!
//! Every type here is `Copy` and small (a `WindowSample` is under 100
//! bytes), so samples move by value with no heap traffic. The high-rate
//! path touches nothing but these stack values.

use crate::time::Timestamp;
use crate::vec3::Vec3;

/// One raw 6-axis inertial sample from the sensor boundary
///
/// Acceleration is in m/s², angular rate in rad/s, both in the device
/// frame. Immutable once produced by the driver.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RawSample {
    /// Monotonic timestamp in milliseconds
    pub timestamp: Timestamp,
    /// Specific force measured by the accelerometer (m/s²)
    pub accel: Vec3,
    /// Angular rate measured by the gyroscope (rad/s)
    pub gyro: Vec3,
}

impl RawSample {
    /// Create a sample at a given timestamp
    pub const fn new(timestamp: Timestamp, accel: Vec3, gyro: Vec3) -> Self {
        Self {
            timestamp,
            accel,
            gyro,
        }
    }

    /// True if every axis reads a finite number
    pub fn is_finite(&self) -> bool {
        crate::vec3::is_finite(&self.accel) && crate::vec3::is_finite(&self.gyro)
    }
}

/// Snapshot of the estimator published alongside each raw sample
///
/// Produced once per update by [`crate::fusion::AttitudeEkf::state`];
/// consumers only ever see copies, never the live filter.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FilterState {
    /// Unit orientation quaternion (w, x, y, z), device to world
    pub orientation: [f32; 4],
    /// Bias-corrected angular velocity estimate (rad/s)
    pub angular_velocity: Vec3,
    /// Gravity-removed linear acceleration estimate, device frame (m/s²)
    pub linear_accel: Vec3,
    /// Trace of the state covariance (total uncertainty)
    pub covariance_trace: f32,
    /// Count of divergence resets since construction
    pub resets: u32,
    /// Count of gravity updates rejected by the quasi-static gate
    pub rejected_updates: u32,
}

impl Default for FilterState {
    fn default() -> Self {
        Self {
            orientation: [1.0, 0.0, 0.0, 0.0],
            angular_velocity: [0.0; 3],
            linear_accel: [0.0; 3],
            covariance_trace: 0.0,
            resets: 0,
            rejected_updates: 0,
        }
    }
}

/// A raw sample paired with the filter state at the time it was processed
///
/// This is the unit stored in the feature window: the extractor needs both
/// the raw signal (spectral content) and the estimated state (gravity
/// direction, linear acceleration).
#[derive(Debug, Clone, Copy)]
pub struct WindowSample {
    /// The raw reading as delivered by the driver
    pub raw: RawSample,
    /// Estimator snapshot after processing this reading
    pub state: FilterState,
}
