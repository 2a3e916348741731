//! Monitor Configuration
//!
//! ## Overview
//!
//! One explicit, validated configuration structure constructed at startup
//! and treated as immutable afterwards. There is no dynamic reloading: the
//! fingerprint contract (window size, band edges, normalization scales)
//! must stay fixed for the lifetime of a scoring model, so changing any of
//! these means restarting the pipeline.
//!
//! ## Validation
//!
//! `MonitorConfig::validate()` runs once before the pipeline starts and
//! rejects any field the estimator or extractor could not honor: window
//! sizes that are not powers of two (the FFT requires them), band edges
//! above Nyquist, gate bounds that do not bracket 1.0, and so on. After
//! validation the pipeline never re-checks these invariants.

use crate::buffer::WINDOW_CAPACITY;
use crate::errors::ConfigError;

/// Local gravity constant (m/s²)
pub const GRAVITY_MS2: f32 = 9.81;

/// Calibration phase settings
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CalibrationConfig {
    /// Stationary accumulation window in seconds
    pub duration_s: f32,
    /// Minimum samples before the window may conclude
    pub min_samples: u32,
    /// Allowed deviation of the corrected gravity magnitude, percent
    pub gravity_tolerance_pct: f32,
    /// Per-axis acceleration standard-deviation ceiling (m/s²)
    pub jitter_limit: f32,
    /// Retry budget for failed calibrations before escalating
    pub max_attempts: u32,
}

impl Default for CalibrationConfig {
    fn default() -> Self {
        Self {
            duration_s: 30.0,
            min_samples: 100,
            gravity_tolerance_pct: 10.0,
            jitter_limit: 0.5,
            max_attempts: 3,
        }
    }
}

/// Feature-window settings
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct WindowConfig {
    /// Samples per window; must be a power of two ≤ [`WINDOW_CAPACITY`]
    pub size: usize,
    /// Emit a fingerprint every this many samples
    pub cadence: usize,
    /// Windows holding fewer samples than this are skipped, not scored
    pub min_samples: usize,
}

impl Default for WindowConfig {
    fn default() -> Self {
        Self {
            size: 256,
            cadence: 256,
            min_samples: 64,
        }
    }
}

/// Rate limits for online Q/R adaptation
///
/// Adaptation must be slow relative to the filter dynamics or the two will
/// oscillate against each other; these bounds cap the per-update change.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct AdaptationConfig {
    /// Blend factor for the innovation-covariance estimate, in (0, 1)
    pub alpha: f32,
    /// Maximum multiplicative change of Q or R per update, in (0, 1)
    pub max_change: f32,
    /// Floor for process-noise diagonal entries
    pub q_floor: f32,
    /// Floor for measurement-noise diagonal entries
    pub r_floor: f32,
    /// Innovations accumulated before adaptation engages
    pub warmup: u32,
}

impl Default for AdaptationConfig {
    fn default() -> Self {
        Self {
            alpha: 0.02,
            max_change: 0.05,
            q_floor: 1e-8,
            r_floor: 1e-5,
            warmup: 32,
        }
    }
}

/// Sensor-boundary retry settings
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SensorRetryConfig {
    /// Consecutive failures before the monitor gives up
    pub max_consecutive_failures: u32,
    /// Initial backoff after a failed read, milliseconds
    pub backoff_initial_ms: u64,
    /// Backoff ceiling, milliseconds
    pub backoff_max_ms: u64,
}

impl Default for SensorRetryConfig {
    fn default() -> Self {
        Self {
            max_consecutive_failures: 50,
            backoff_initial_ms: 2,
            backoff_max_ms: 250,
        }
    }
}

/// Top-level monitor configuration
#[derive(Debug, Clone, PartialEq)]
pub struct MonitorConfig {
    /// Nominal sensor sample rate in Hz
    pub sample_rate_hz: f32,
    /// Calibration phase
    pub calibration: CalibrationConfig,
    /// Feature window sizing and cadence
    pub window: WindowConfig,
    /// PSD band edges in Hz, ascending; defines four bands
    pub band_edges_hz: [f32; 5],
    /// Anomaly score decision threshold in [0, 1]
    pub anomaly_threshold: f32,
    /// Q/R adaptation rate limits
    pub adaptation: AdaptationConfig,
    /// Quasi-static gate: accept gravity updates when
    /// `|accel| / gravity` falls inside `[static_gate_min, static_gate_max]`
    pub static_gate_min: f32,
    /// Upper bound of the quasi-static gate
    pub static_gate_max: f32,
    /// Sensor retry policy
    pub sensor_retry: SensorRetryConfig,
}

impl Default for MonitorConfig {
    fn default() -> Self {
        Self {
            sample_rate_hz: 100.0,
            calibration: CalibrationConfig::default(),
            window: WindowConfig::default(),
            band_edges_hz: [0.5, 5.0, 15.0, 30.0, 50.0],
            anomaly_threshold: 0.8,
            adaptation: AdaptationConfig::default(),
            static_gate_min: 0.8,
            static_gate_max: 1.2,
            sensor_retry: SensorRetryConfig::default(),
        }
    }
}

impl MonitorConfig {
    /// Validate every field against pipeline invariants
    ///
    /// Called once at startup; the pipeline assumes a validated config.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if !(self.sample_rate_hz > 0.0) || !self.sample_rate_hz.is_finite() {
            return Err(ConfigError::BadSampleRate(self.sample_rate_hz));
        }

        let w = self.window.size;
        if w < 2 || !w.is_power_of_two() || w > WINDOW_CAPACITY {
            return Err(ConfigError::BadWindowSize {
                size: w,
                max: WINDOW_CAPACITY,
            });
        }
        if self.window.cadence == 0 {
            return Err(ConfigError::BadCadence(self.window.cadence));
        }
        if self.window.min_samples == 0 || self.window.min_samples > w {
            return Err(ConfigError::BadMinSamples {
                min_samples: self.window.min_samples,
                size: w,
            });
        }

        let nyquist = self.sample_rate_hz / 2.0;
        let mut prev = -1.0;
        for &edge in &self.band_edges_hz {
            if edge <= prev || edge > nyquist {
                return Err(ConfigError::BadBandEdge { edge, nyquist });
            }
            prev = edge;
        }

        if !(0.0..=1.0).contains(&self.anomaly_threshold) {
            return Err(ConfigError::BadThreshold(self.anomaly_threshold));
        }

        let a = &self.adaptation;
        if !(a.alpha > 0.0 && a.alpha < 1.0) {
            return Err(ConfigError::BadAdaptationRate(a.alpha));
        }
        if !(a.max_change > 0.0 && a.max_change < 1.0) {
            return Err(ConfigError::BadAdaptationRate(a.max_change));
        }

        if !(self.static_gate_min > 0.0
            && self.static_gate_min < 1.0
            && self.static_gate_max > 1.0)
        {
            return Err(ConfigError::BadStaticGate {
                min: self.static_gate_min,
                max: self.static_gate_max,
            });
        }

        let c = &self.calibration;
        let window_samples = c.duration_s * self.sample_rate_hz;
        if window_samples < c.min_samples as f32 {
            return Err(ConfigError::BadCalibrationWindow {
                duration_s: c.duration_s,
                min_samples: c.min_samples,
            });
        }

        Ok(())
    }

    /// Expected sample period in milliseconds
    pub fn sample_period_ms(&self) -> u64 {
        (1000.0 / self.sample_rate_hz) as u64
    }

    /// Samples the calibration window should accumulate
    pub fn calibration_samples(&self) -> u32 {
        (self.calibration.duration_s * self.sample_rate_hz) as u32
    }
}
