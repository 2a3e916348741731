//! Error Taxonomy for the Monitoring Pipeline
//!
//! ## Design Philosophy
//!
//! MotionGuard runs unattended at sensor rate, so the error system follows
//! a strict propagation policy:
//!
//! 1. **Small and Copy**: every error is a few words of inline data (no
//!    `String`), cheap to return from hot paths and to store in records.
//!
//! 2. **Local recovery first**: numeric instabilities in the filter are
//!    reset-and-continue, never fatal. A continuously-running monitor must
//!    not terminate on transient sensor noise.
//!
//! 3. **Only two fatal conditions**: persistent sensor unavailability and
//!    calibration that keeps failing after retries. Everything else is
//!    retried, skipped, or degraded gracefully.
//!
//! ## Recovery Map
//!
//! | Error                 | Policy                                        |
//! |-----------------------|-----------------------------------------------|
//! | `CalibrationError`    | retryable by restarting calibration           |
//! | `SensorIoError`       | retried with bounded backoff, fatal on streak |
//! | `FusionError`         | in-process covariance reset, logged           |
//! | `FeatureError`        | skip the window, continue                     |
//! | `ConfigError`         | rejected at startup, before any processing    |
//! | `MonitorError`        | surfaced to the operator, terminal            |

use thiserror_no_std::Error;

/// Why a calibration attempt was rejected
///
/// All variants are recoverable by re-running calibration once the device
/// is actually stationary.
#[derive(Error, Debug, Clone, Copy, PartialEq)]
pub enum CalibrationError {
    /// Corrected gravity magnitude outside the tolerance band
    #[error("gravity estimate {measured} m/s² outside ±{tolerance_pct}% of {expected} m/s²")]
    OutOfTolerance {
        /// Gravity magnitude after bias removal
        measured: f32,
        /// Local gravity constant
        expected: f32,
        /// Allowed deviation in percent
        tolerance_pct: f32,
    },

    /// Device was not still enough during the calibration window
    #[error("acceleration jitter {stddev} m/s² exceeds limit {limit} m/s²")]
    ExcessiveJitter {
        /// Worst per-axis standard deviation observed
        stddev: f32,
        /// Configured jitter ceiling
        limit: f32,
    },

    /// Calibration window ended before enough samples arrived
    #[error("insufficient samples: need {required}, have {available}")]
    InsufficientSamples {
        /// Minimum samples required by configuration
        required: u32,
        /// Samples actually accumulated
        available: u32,
    },
}

/// Transient failure at the sensor-driver boundary
///
/// The orchestrator retries these with bounded backoff and escalates to
/// [`MonitorError::SensorUnavailable`] after a configured streak.
#[derive(Error, Debug, Clone, Copy, PartialEq, Eq)]
pub enum SensorIoError {
    /// Bus-level transaction failed
    #[error("bus transaction failed")]
    Bus,
    /// Sensor did not respond in time
    #[error("sensor read timed out")]
    Timeout,
    /// Sensor responded with an unparseable or non-finite frame
    #[error("sensor returned invalid data")]
    BadData,
}

/// Numeric failure inside the state estimator
///
/// Never propagated out of the monitor loop: the filter resets the
/// affected state to a safe prior and continues.
#[derive(Error, Debug, Clone, Copy, PartialEq, Eq)]
pub enum FusionError {
    /// Covariance went non-finite or lost positive-definiteness
    #[error("covariance diverged; state reset to prior")]
    Divergence,
    /// Innovation covariance could not be inverted
    #[error("innovation covariance is singular")]
    SingularMatrix,
}

/// Failure to produce a fingerprint from a window
#[derive(Error, Debug, Clone, Copy, PartialEq, Eq)]
pub enum FeatureError {
    /// Window holds fewer samples than the configured minimum; the
    /// orchestrator skips scoring for this tick
    #[error("window underrun: need {required} samples, have {available}")]
    WindowUnderrun {
        /// Minimum window fill required
        required: usize,
        /// Samples currently in the window
        available: usize,
    },
}

/// Invalid configuration, rejected before the pipeline starts
#[derive(Error, Debug, Clone, Copy, PartialEq)]
pub enum ConfigError {
    /// Sample rate must be positive
    #[error("sample rate {0} Hz is not positive")]
    BadSampleRate(f32),
    /// Window size must be a power of two and fit the buffer capacity
    #[error("window size {size} invalid (must be a power of two ≤ {max})")]
    BadWindowSize {
        size: usize,
        max: usize,
    },
    /// Cadence must be at least one sample
    #[error("window cadence of {0} samples is invalid")]
    BadCadence(usize),
    /// Minimum window fill must be nonzero and fit inside the window
    #[error("window minimum of {min_samples} samples is invalid for window size {size}")]
    BadMinSamples {
        min_samples: usize,
        size: usize,
    },
    /// Band edges must ascend and stay below Nyquist
    #[error("PSD band edge {edge} Hz out of order or above Nyquist {nyquist} Hz")]
    BadBandEdge {
        edge: f32,
        nyquist: f32,
    },
    /// Score threshold must sit in [0, 1]
    #[error("anomaly threshold {0} outside [0, 1]")]
    BadThreshold(f32),
    /// Adaptation rate limit must sit in (0, 1)
    #[error("adaptation rate limit {0} outside (0, 1)")]
    BadAdaptationRate(f32),
    /// Quasi-static gate bounds must satisfy 0 < min < 1 < max
    #[error("quasi-static gate [{min}, {max}] does not bracket 1.0")]
    BadStaticGate {
        min: f32,
        max: f32,
    },
    /// Calibration window must cover at least the minimum sample count
    #[error("calibration duration {duration_s} s too short for {min_samples} samples")]
    BadCalibrationWindow {
        duration_s: f32,
        min_samples: u32,
    },
}

/// Terminal failures surfaced to the operator
#[derive(Error, Debug, Clone, Copy, PartialEq)]
pub enum MonitorError {
    /// Initial calibration failed after the configured retry budget
    #[error("calibration failed after {attempts} attempts: {last}")]
    CalibrationFailed {
        /// Attempts made before giving up
        attempts: u32,
        /// The final calibration failure
        last: CalibrationError,
    },
    /// Sensor kept failing past the consecutive-failure budget
    #[error("sensor unavailable after {consecutive_failures} consecutive failures: {last}")]
    SensorUnavailable {
        /// Failure streak length that triggered escalation
        consecutive_failures: u32,
        /// The final I/O failure
        last: SensorIoError,
    },
    /// Invalid configuration caught at startup
    #[error("invalid configuration: {0}")]
    Config(#[from] ConfigError),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn errors_stay_small() {
        // Errors travel through hot paths; keep them register-friendly
        assert!(core::mem::size_of::<CalibrationError>() <= 16);
        assert!(core::mem::size_of::<SensorIoError>() <= 4);
        assert!(core::mem::size_of::<FusionError>() <= 4);
        assert!(core::mem::size_of::<FeatureError>() <= 24);
    }

    #[cfg(feature = "std")]
    #[test]
    fn display_is_actionable() {
        let err = CalibrationError::InsufficientSamples {
            required: 3000,
            available: 150,
        };
        let text = format!("{err}");
        assert!(text.contains("3000"));
        assert!(text.contains("150"));
    }
}
