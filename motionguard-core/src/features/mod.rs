//! Physics Fingerprint Extraction
//!
//! ## Overview
//!
//! Condenses a window of filtered inertial samples into a fixed 32-slot
//! fingerprint describing the motion's physical character. The slots mix
//! time-domain statistics, energy proxies, spectral shape, and posture so
//! that distinct activities land in distinct regions of the feature space
//! while the same activity repeated lands in the same one.
//!
//! ## Slot Layout
//!
//! ```text
//!  0..=4   accel magnitude: mean, rms, peak-to-peak, crest, zero-cross rate
//!  5..=9   gyro magnitude:  mean, rms, peak-to-peak, crest, zero-cross rate
//! 10..=11  kinetic energy proxy: mean, peak        (½·‖v‖², leaky-
//!          integrated linear acceleration)
//! 12       rotational energy proxy: mean           (½·‖ω‖²)
//! 13       mechanical work proxy: mean ‖a_lin · v‖ (mass-normalized
//!          power over the window)
//! 14       total spectral power of accel magnitude
//! 15..=18  band energies over the configured band edges
//! 19..=21  band energy ratios (bands 1..4 over total)
//! 22       spectral centroid
//! 23       spectral flatness
//! 24       dominant frequency
//! 25..=26  accel magnitude skewness, excess kurtosis
//! 27..=28  roll, pitch from the fused orientation
//! 29       mean relative gravity deviation |‖a‖ − g| / g
//! 30       orientation instability (mean quaternion step)
//! 31       accel magnitude standard deviation
//! ```
//!
//! Every slot is divided by a physical scale frozen at calibration time so
//! downstream scoring sees values of comparable magnitude regardless of
//! sensor range or local gravity.

pub mod fft;

use libm::{asinf, atan2f, sqrtf};

use crate::buffer::FeatureWindow;
use crate::errors::FeatureError;
use crate::time::Timestamp;
use crate::sample::FilterState;
use crate::vec3;

/// Fingerprint dimensionality
pub const FINGERPRINT_DIM: usize = 32;

/// Fixed-size physics fingerprint of one feature window
pub type MotionFingerprint = [f32; FINGERPRINT_DIM];

/// A fingerprint stamped with its window-end time and filter snapshot
///
/// This is the unit that crosses the frame queue from the sampling thread
/// to the scoring thread, so it stays `Copy` and heap-free.
#[derive(Debug, Clone, Copy)]
pub struct FeatureFrame {
    /// Timestamp of the newest sample in the window
    pub timestamp: Timestamp,
    /// Extracted fingerprint, already normalized
    pub fingerprint: MotionFingerprint,
    /// Filter state at the window end
    pub state: FilterState,
}

/// Reference angular rate used to scale gyro-derived slots, rad/s
const GYRO_SCALE: f32 = 10.0;
/// Reference linear velocity used to scale kinetic slots, m/s
const VEL_SCALE: f32 = 1.0;
/// Leak factor on the window-local velocity integrator; bounds the
/// drift a small accelerometer bias residual would otherwise accumulate
const VEL_LEAK: f32 = 0.995;
/// Crest factors rarely exceed this for IMU signals
const CREST_SCALE: f32 = 3.0;
/// Skewness scale for normalization
const SKEW_SCALE: f32 = 3.0;
/// Kurtosis scale for normalization
const KURT_SCALE: f32 = 10.0;

/// Per-slot divisors frozen when calibration completes
///
/// Derived from local gravity and the sample rate rather than from data,
/// so two devices calibrated in different orientations still produce
/// comparable fingerprints.
#[derive(Debug, Clone, Copy)]
pub struct NormalizationScales {
    scales: [f32; FINGERPRINT_DIM],
}

impl NormalizationScales {
    pub fn new(gravity: f32, sample_rate_hz: f32) -> Self {
        let g = gravity.max(1e-3);
        let nyquist = (sample_rate_hz * 0.5).max(1e-3);
        let mut s = [1.0f32; FINGERPRINT_DIM];

        // Accel magnitude stats
        s[0] = g;
        s[1] = g;
        s[2] = g;
        s[3] = CREST_SCALE;
        // s[4] zero-cross rate is already in [0, 1]

        // Gyro magnitude stats
        s[5] = GYRO_SCALE;
        s[6] = GYRO_SCALE;
        s[7] = GYRO_SCALE;
        s[8] = CREST_SCALE;

        // Energy proxies
        s[10] = 0.5 * VEL_SCALE * VEL_SCALE;
        s[11] = 0.5 * VEL_SCALE * VEL_SCALE;
        s[12] = 0.5 * GYRO_SCALE * GYRO_SCALE;
        s[13] = g * VEL_SCALE;

        // Spectral power slots share the squared-gravity scale
        for slot in s.iter_mut().take(19).skip(14) {
            *slot = g * g;
        }
        // Ratios 19..=21 dimensionless

        s[22] = nyquist;
        // s[23] flatness in [0, 1]
        s[24] = nyquist;
        s[25] = SKEW_SCALE;
        s[26] = KURT_SCALE;
        s[27] = core::f32::consts::PI;
        s[28] = core::f32::consts::PI;
        // s[29], s[30] already relative
        s[31] = g;

        Self { scales: s }
    }

    fn apply(&self, raw: &mut MotionFingerprint) {
        for (v, s) in raw.iter_mut().zip(self.scales.iter()) {
            *v /= s;
            if !v.is_finite() {
                *v = 0.0;
            }
        }
    }
}

/// Extractor configuration, a snapshot of the monitor config
#[derive(Debug, Clone, Copy)]
pub struct ExtractorConfig {
    /// Logical window size in samples, power of two
    pub window_size: usize,
    /// Minimum samples before extraction is attempted
    pub min_samples: usize,
    /// Sample rate in Hz
    pub sample_rate_hz: f32,
    /// Band edges in Hz, four bands
    pub band_edges_hz: [f32; 5],
    /// Local gravity magnitude
    pub gravity: f32,
}

/// Turns feature windows into normalized fingerprints
pub struct FeatureExtractor {
    config: ExtractorConfig,
    scales: NormalizationScales,
}

impl FeatureExtractor {
    pub fn new(config: ExtractorConfig) -> Self {
        let scales = NormalizationScales::new(config.gravity, config.sample_rate_hz);
        Self { config, scales }
    }

    /// Extract a fingerprint from the tail of `window`
    ///
    /// Fails with [`FeatureError::WindowUnderrun`] until enough samples
    /// have accumulated. Non-finite intermediate values are forced to
    /// zero so one bad sample cannot poison the whole fingerprint.
    pub fn extract<const N: usize>(
        &self,
        window: &FeatureWindow<N>,
    ) -> Result<MotionFingerprint, FeatureError> {
        let available = window.len().min(self.config.window_size);
        if available < self.config.min_samples {
            return Err(FeatureError::WindowUnderrun {
                required: self.config.min_samples,
                available,
            });
        }

        let n = available;
        let inv_n = 1.0 / n as f32;
        let mut fp: MotionFingerprint = [0.0; FINGERPRINT_DIM];

        // First pass: magnitudes, energies, posture accumulators. The
        // velocity proxy is window-local: it integrates filtered linear
        // acceleration from rest at the window start.
        let dt = 1.0 / self.config.sample_rate_hz;
        let mut vel = [0.0f32; 3];
        let mut accel_mag = [0.0f32; crate::buffer::WINDOW_CAPACITY];
        let mut accel_sum = 0.0;
        let mut gyro_sum = 0.0;
        let mut gyro_sq_sum = 0.0;
        let mut gyro_peak_hi = f32::MIN;
        let mut gyro_peak_lo = f32::MAX;
        let mut kinetic_sum = 0.0;
        let mut kinetic_peak = 0.0f32;
        let mut rotational_sum = 0.0;
        let mut work_sum = 0.0;
        let mut grav_dev_sum = 0.0;
        let mut quat_step_sum = 0.0;
        let mut prev_quat: Option<[f32; 4]> = None;
        let mut last_state = FilterState::default();

        for (i, sample) in window.tail(n).enumerate() {
            let a = vec3::norm(&sample.raw.accel);
            accel_mag[i] = a;
            accel_sum += a;

            let w = vec3::norm(&sample.state.angular_velocity);
            gyro_sum += w;
            gyro_sq_sum += w * w;
            gyro_peak_hi = gyro_peak_hi.max(w);
            gyro_peak_lo = gyro_peak_lo.min(w);

            let lin = &sample.state.linear_accel;
            for (v, a) in vel.iter_mut().zip(lin.iter()) {
                *v = VEL_LEAK * *v + a * dt;
            }
            let kinetic = 0.5 * vec3::dot(&vel, &vel);
            kinetic_sum += kinetic;
            kinetic_peak = kinetic_peak.max(kinetic);
            rotational_sum += 0.5 * w * w;
            work_sum += vec3::dot(lin, &vel).abs();

            grav_dev_sum += (a - self.config.gravity).abs() / self.config.gravity;

            let q = sample.state.orientation;
            if let Some(p) = prev_quat {
                let dot =
                    (p[0] * q[0] + p[1] * q[1] + p[2] * q[2] + p[3] * q[3]).abs();
                quat_step_sum += (1.0 - dot.min(1.0)).max(0.0);
            }
            prev_quat = Some(q);
            last_state = sample.state;
        }

        let mags = &accel_mag[..n];
        let accel_mean = accel_sum * inv_n;

        // Second pass on accel magnitude: central moments
        let mut m2 = 0.0;
        let mut m3 = 0.0;
        let mut m4 = 0.0;
        let mut peak_hi = f32::MIN;
        let mut peak_lo = f32::MAX;
        for &a in mags {
            let d = a - accel_mean;
            let d2 = d * d;
            m2 += d2;
            m3 += d2 * d;
            m4 += d2 * d2;
            peak_hi = peak_hi.max(a);
            peak_lo = peak_lo.min(a);
        }
        m2 *= inv_n;
        m3 *= inv_n;
        m4 *= inv_n;
        let stddev = sqrtf(m2);
        let accel_rms = sqrtf(mags.iter().map(|v| v * v).sum::<f32>() * inv_n);

        fp[0] = accel_mean;
        fp[1] = accel_rms;
        fp[2] = peak_hi - peak_lo;
        fp[3] = if accel_rms > 1e-9 { peak_hi / accel_rms } else { 0.0 };
        fp[4] = zero_crossing_rate(mags, accel_mean);

        let gyro_mean = gyro_sum * inv_n;
        let gyro_rms = sqrtf(gyro_sq_sum * inv_n);
        fp[5] = gyro_mean;
        fp[6] = gyro_rms;
        fp[7] = gyro_peak_hi - gyro_peak_lo;
        fp[8] = if gyro_rms > 1e-9 { gyro_peak_hi / gyro_rms } else { 0.0 };
        // Gyro magnitude is nonnegative; crossings counted about its mean
        fp[9] = {
            let mut gyro_mags = [0.0f32; crate::buffer::WINDOW_CAPACITY];
            for (i, sample) in window.tail(n).enumerate() {
                gyro_mags[i] = vec3::norm(&sample.state.angular_velocity);
            }
            zero_crossing_rate(&gyro_mags[..n], gyro_mean)
        };

        fp[10] = kinetic_sum * inv_n;
        fp[11] = kinetic_peak;
        fp[12] = rotational_sum * inv_n;
        fp[13] = work_sum * inv_n;

        // Spectral slots from the mean-removed accel magnitude. The FFT
        // needs a power-of-two length; a partially filled window uses its
        // largest power-of-two tail.
        let mut detrended = [0.0f32; crate::buffer::WINDOW_CAPACITY];
        for (d, &a) in detrended.iter_mut().zip(mags.iter()) {
            *d = a - accel_mean;
        }
        let m = if n.is_power_of_two() {
            n
        } else {
            (n + 1).next_power_of_two() / 2
        };
        let spectrum = fft::power_spectrum(&detrended[n - m..n], self.config.sample_rate_hz);
        let total = spectrum.total_power();
        fp[14] = total;
        let edges = &self.config.band_edges_hz;
        for b in 0..4 {
            fp[15 + b] = spectrum.band_power(edges[b], edges[b + 1]);
        }
        for b in 0..3 {
            fp[19 + b] = if total > 1e-12 { fp[16 + b] / total } else { 0.0 };
        }
        fp[22] = spectrum.centroid_hz();
        fp[23] = spectrum.flatness();
        fp[24] = spectrum.dominant_hz();

        // Shape of the accel magnitude distribution
        if stddev > 1e-9 {
            fp[25] = m3 / (stddev * stddev * stddev);
            fp[26] = m4 / (m2 * m2) - 3.0;
        }

        let (roll, pitch) = roll_pitch(&last_state.orientation);
        fp[27] = roll;
        fp[28] = pitch;
        fp[29] = grav_dev_sum * inv_n;
        fp[30] = if n > 1 {
            quat_step_sum / (n - 1) as f32
        } else {
            0.0
        };
        fp[31] = stddev;

        self.scales.apply(&mut fp);
        Ok(fp)
    }
}

/// Fraction of adjacent pairs that cross `level`
fn zero_crossing_rate(samples: &[f32], level: f32) -> f32 {
    if samples.len() < 2 {
        return 0.0;
    }
    let mut crossings = 0;
    for pair in samples.windows(2) {
        if (pair[0] - level) * (pair[1] - level) < 0.0 {
            crossings += 1;
        }
    }
    crossings as f32 / (samples.len() - 1) as f32
}

/// Roll and pitch in radians from a unit quaternion (w first)
fn roll_pitch(q: &[f32; 4]) -> (f32, f32) {
    let (w, x, y, z) = (q[0], q[1], q[2], q[3]);
    let roll = atan2f(2.0 * (w * x + y * z), 1.0 - 2.0 * (x * x + y * y));
    let sin_pitch = (2.0 * (w * y - z * x)).clamp(-1.0, 1.0);
    let pitch = asinf(sin_pitch);
    (roll, pitch)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::GRAVITY_MS2;
    use crate::sample::{RawSample, WindowSample};
    use libm::sinf;

    fn config() -> ExtractorConfig {
        ExtractorConfig {
            window_size: 256,
            min_samples: 64,
            sample_rate_hz: 100.0,
            band_edges_hz: [0.5, 5.0, 15.0, 30.0, 50.0],
            gravity: GRAVITY_MS2,
        }
    }

    fn stationary_sample(t: u64) -> WindowSample {
        WindowSample {
            raw: RawSample {
                timestamp: t * 10,
                accel: [0.0, 0.0, GRAVITY_MS2],
                gyro: [0.0; 3],
            },
            state: FilterState::default(),
        }
    }

    // Vibration rides along gravity so the accel magnitude oscillates at
    // the driving frequency itself
    fn vibrating_sample(t: u64, amp: f32, freq_hz: f32) -> WindowSample {
        let phase = 2.0 * core::f32::consts::PI * freq_hz * t as f32 / 100.0;
        let wobble = amp * sinf(phase);
        let mut state = FilterState::default();
        state.linear_accel = [0.0, 0.0, wobble];
        state.angular_velocity = [0.0, 0.1 * wobble, 0.0];
        WindowSample {
            raw: RawSample {
                timestamp: t * 10,
                accel: [0.0, 0.0, GRAVITY_MS2 + wobble],
                gyro: [0.0, 0.1 * wobble, 0.0],
            },
            state,
        }
    }

    fn fill<F: Fn(u64) -> WindowSample>(n: u64, f: F) -> FeatureWindow {
        let mut window = FeatureWindow::new();
        for t in 0..n {
            window.push(f(t));
        }
        window
    }

    #[test]
    fn underrun_is_reported() {
        let extractor = FeatureExtractor::new(config());
        let window = fill(10, stationary_sample);
        let err = extractor.extract(&window).unwrap_err();
        assert_eq!(
            err,
            FeatureError::WindowUnderrun {
                required: 64,
                available: 10
            }
        );
    }

    #[test]
    fn all_slots_finite_for_stationary_window() {
        let extractor = FeatureExtractor::new(config());
        let window = fill(256, stationary_sample);
        let fp = extractor.extract(&window).unwrap();
        assert_eq!(fp.len(), FINGERPRINT_DIM);
        for (i, v) in fp.iter().enumerate() {
            assert!(v.is_finite(), "slot {} not finite: {}", i, v);
        }
        // Stationary: accel mean near gravity, normalized near 1
        assert!((fp[0] - 1.0).abs() < 0.05, "slot 0 = {}", fp[0]);
        // No rotation at all
        assert_eq!(fp[5], 0.0);
        assert!(fp[29] < 0.05);
    }

    #[test]
    fn vibration_elevates_the_matching_band() {
        let extractor = FeatureExtractor::new(config());
        // 10 Hz vibration falls in band 1 (5..15 Hz)
        let window = fill(256, |t| vibrating_sample(t, 2.0, 10.0));
        let fp = extractor.extract(&window).unwrap();

        assert!(fp[16] > fp[15], "band 1 {} vs band 0 {}", fp[16], fp[15]);
        assert!(fp[16] > fp[17]);
        assert!(fp[16] > fp[18]);
        // Dominant frequency near 10 Hz, normalized by the 50 Hz Nyquist
        assert!((fp[24] - 0.2).abs() < 0.05, "slot 24 = {}", fp[24]);
    }

    #[test]
    fn five_hertz_sinusoid_elevates_the_covering_bands() {
        let extractor = FeatureExtractor::new(config());
        let quiet = extractor.extract(&fill(256, stationary_sample)).unwrap();
        // 2 m/s² at 5 Hz on top of gravity; 5 Hz sits on the default band
        // edge, so windowing leakage lands on both sides of it
        let fp = extractor
            .extract(&fill(256, |t| vibrating_sample(t, 2.0, 5.0)))
            .unwrap();

        let covering = fp[15] + fp[16];
        let quiet_covering = quiet[15] + quiet[16];
        assert!(
            covering > quiet_covering + 0.01,
            "bands around 5 Hz not elevated: {} vs {}",
            covering,
            quiet_covering
        );
        assert!(covering > 10.0 * (fp[17] + fp[18]));
        // Dominant frequency near 5 Hz, normalized by the 50 Hz Nyquist
        assert!((fp[24] - 0.1).abs() < 0.03, "slot 24 = {}", fp[24]);
    }

    #[test]
    fn stronger_vibration_means_larger_energy_slots() {
        let extractor = FeatureExtractor::new(config());
        let quiet = extractor
            .extract(&fill(256, |t| vibrating_sample(t, 0.5, 10.0)))
            .unwrap();
        let medium = extractor
            .extract(&fill(256, |t| vibrating_sample(t, 1.5, 10.0)))
            .unwrap();
        let loud = extractor
            .extract(&fill(256, |t| vibrating_sample(t, 3.0, 10.0)))
            .unwrap();

        for slot in [10usize, 14, 31] {
            assert!(
                quiet[slot] < medium[slot] && medium[slot] < loud[slot],
                "slot {} not monotonic: {} {} {}",
                slot,
                quiet[slot],
                medium[slot],
                loud[slot]
            );
        }
    }

    #[test]
    fn extraction_is_deterministic() {
        let extractor = FeatureExtractor::new(config());
        let window = fill(256, |t| vibrating_sample(t, 1.0, 7.0));
        let a = extractor.extract(&window).unwrap();
        let b = extractor.extract(&window).unwrap();
        assert_eq!(a, b);
    }

    #[test]
    fn window_uses_only_the_configured_tail() {
        let mut cfg = config();
        cfg.window_size = 128;
        let extractor = FeatureExtractor::new(cfg);

        // Old vibration followed by a quiet tail; only the tail counts
        let mut window: FeatureWindow = FeatureWindow::new();
        for t in 0..256 {
            window.push(vibrating_sample(t, 3.0, 10.0));
        }
        for t in 256..384 {
            window.push(stationary_sample(t));
        }
        let fp = extractor.extract(&window).unwrap();
        assert!(fp[14] < 1e-4, "residual spectral power {}", fp[14]);
    }
}
