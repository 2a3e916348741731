//! Sensor Driver Boundary
//!
//! The monitor reads 6-axis samples through [`SensorDriver`] and never
//! touches a bus directly. Hardware drivers implement the trait over I2C
//! or SPI using the `nb` non-blocking convention; [`SyntheticDriver`]
//! implements it in software for tests, demos, and soak runs.

use crate::errors::SensorIoError;
use crate::sample::RawSample;
use crate::time::Timestamp;
use crate::vec3::Vec3;

use libm::{cosf, logf, sinf, sqrtf};

/// Source of raw 6-axis samples
///
/// `read` follows the `nb` convention: `WouldBlock` means no sample is
/// ready yet and the caller should retry, a [`SensorIoError`] means the
/// transaction failed.
pub trait SensorDriver {
    fn read(&mut self) -> nb::Result<RawSample, SensorIoError>;
}

/// Deterministic xorshift32 noise source
///
/// Good enough for sensor noise shaping; a seeded run always produces the
/// same stream, which the integration tests rely on.
#[derive(Debug, Clone)]
struct XorShift32 {
    state: u32,
}

impl XorShift32 {
    fn new(seed: u32) -> Self {
        Self {
            state: if seed == 0 { 0x6d73_6721 } else { seed },
        }
    }

    fn next_u32(&mut self) -> u32 {
        let mut x = self.state;
        x ^= x << 13;
        x ^= x >> 17;
        x ^= x << 5;
        self.state = x;
        x
    }

    fn next_f32(&mut self) -> f32 {
        (self.next_u32() >> 8) as f32 / (1u32 << 24) as f32
    }

    /// Standard normal via Box-Muller
    fn next_gaussian(&mut self) -> f32 {
        let u1 = self.next_f32().max(1e-7);
        let u2 = self.next_f32();
        sqrtf(-2.0 * logf(u1)) * cosf(2.0 * core::f32::consts::PI * u2)
    }
}

/// Software IMU with configurable physics
///
/// Produces gravity plus Gaussian noise, optional constant biases, and an
/// optional sinusoidal vibration. Faults can be injected to exercise the
/// monitor's retry path. Timestamps advance by a fixed period per read.
pub struct SyntheticDriver {
    rng: XorShift32,
    /// Gravity vector the device "sits" in
    gravity: Vec3,
    accel_bias: Vec3,
    gyro_bias: Vec3,
    accel_noise_std: f32,
    gyro_noise_std: f32,
    /// Vibration amplitude in m/s² (zero disables)
    vibration_amp: f32,
    /// Vibration frequency in Hz
    vibration_hz: f32,
    period_ms: u64,
    sample_index: u64,
    /// Remaining reads that fail before recovery
    faults_pending: u32,
    fault_kind: SensorIoError,
}

impl SyntheticDriver {
    pub fn new(seed: u32, gravity: Vec3, period_ms: u64) -> Self {
        Self {
            rng: XorShift32::new(seed),
            gravity,
            accel_bias: [0.0; 3],
            gyro_bias: [0.0; 3],
            accel_noise_std: 0.02,
            gyro_noise_std: 0.002,
            vibration_amp: 0.0,
            vibration_hz: 0.0,
            period_ms,
            sample_index: 0,
            faults_pending: 0,
            fault_kind: SensorIoError::Bus,
        }
    }

    /// Stationary device sitting level, 100 Hz
    pub fn stationary(seed: u32) -> Self {
        Self::new(seed, [0.0, 0.0, crate::config::GRAVITY_MS2], 10)
    }

    pub fn with_accel_bias(mut self, bias: Vec3) -> Self {
        self.accel_bias = bias;
        self
    }

    pub fn with_gyro_bias(mut self, bias: Vec3) -> Self {
        self.gyro_bias = bias;
        self
    }

    pub fn with_noise(mut self, accel_std: f32, gyro_std: f32) -> Self {
        self.accel_noise_std = accel_std;
        self.gyro_noise_std = gyro_std;
        self
    }

    pub fn with_vibration(mut self, amp: f32, freq_hz: f32) -> Self {
        self.vibration_amp = amp;
        self.vibration_hz = freq_hz;
        self
    }

    /// Change the vibration mid-run, e.g. to simulate an anomaly onset
    pub fn set_vibration(&mut self, amp: f32, freq_hz: f32) {
        self.vibration_amp = amp;
        self.vibration_hz = freq_hz;
    }

    /// Make the next `count` reads fail with `kind`
    pub fn inject_faults(&mut self, count: u32, kind: SensorIoError) {
        self.faults_pending = count;
        self.fault_kind = kind;
    }

    /// Number of samples produced so far
    pub fn samples_produced(&self) -> u64 {
        self.sample_index
    }

    fn now(&self) -> Timestamp {
        self.sample_index * self.period_ms
    }
}

impl SensorDriver for SyntheticDriver {
    fn read(&mut self) -> nb::Result<RawSample, SensorIoError> {
        if self.faults_pending > 0 {
            self.faults_pending -= 1;
            return Err(nb::Error::Other(self.fault_kind));
        }

        let t_s = self.now() as f32 / 1000.0;
        let vib = if self.vibration_amp > 0.0 {
            self.vibration_amp * sinf(2.0 * core::f32::consts::PI * self.vibration_hz * t_s)
        } else {
            0.0
        };

        let mut accel = [0.0f32; 3];
        let mut gyro = [0.0f32; 3];
        for i in 0..3 {
            accel[i] = self.gravity[i]
                + self.accel_bias[i]
                + self.accel_noise_std * self.rng.next_gaussian();
            gyro[i] = self.gyro_bias[i] + self.gyro_noise_std * self.rng.next_gaussian();
        }
        // Vibration acts along x and couples weakly into roll rate
        accel[0] += vib;
        gyro[1] += 0.05 * vib;

        let sample = RawSample {
            timestamp: self.now(),
            accel,
            gyro,
        };
        self.sample_index += 1;
        Ok(sample)
    }
}
