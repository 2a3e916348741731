//! Online-Adaptive Attitude EKF
//!
//! Seven-state Extended Kalman Filter over unit quaternion plus gyroscope
//! bias:
//!
//! ```text
//! x = [q0 q1 q2 q3 | bx by bz]
//! ```
//!
//! Position and velocity are deliberately absent. Without an absolute
//! position reference they integrate accelerometer noise without bound and
//! poison the covariance; orientation and bias are the only states this
//! sensor suite can actually observe.
//!
//! ## Measurement Model
//!
//! The accelerometer observes the gravity direction in the body frame:
//!
//! ```text
//! h(q) = Rᵀ(q) · [0, 0, g]
//!      = g · [2(q1q3 − q0q2), 2(q2q3 + q0q1), q0² − q1² − q2² + q3²]
//! ```
//!
//! Updates only run while the sensor is quasi-static (‖a‖ near g);
//! during dynamic motion the accelerometer measures gravity plus linear
//! acceleration and would drag the attitude estimate toward garbage.
//!
//! ## Adaptation
//!
//! Measurement noise R tracks an exponential moving average of the
//! squared innovations. Process noise Q scales up when innovation energy
//! exceeds twice the predicted innovation covariance trace and decays
//! slowly otherwise. Both are rate-limited per update and floored so a
//! burst of bad samples cannot collapse the filter.

use libm::sqrtf;

use crate::config::AdaptationConfig;
use crate::calibration::CalibrationProfile;
use crate::errors::FusionError;
use crate::fusion::matrix::{self, SquareMatrix};
use crate::fusion::FusionResult;
use crate::sample::FilterState;
use crate::vec3::{self, Vec3};

/// Number of filter states
pub const STATE_DIM: usize = 7;

/// Number of observed dimensions (body-frame gravity)
pub const OBS_DIM: usize = 3;

/// Initial attitude variance
const P0_ATTITUDE: f32 = 1e-2;
/// Initial gyro bias variance
const P0_BIAS: f32 = 1e-3;
/// Default attitude process noise (per second)
const Q0_ATTITUDE: f32 = 1e-5;
/// Default bias process noise (per second)
const Q0_BIAS: f32 = 1e-8;
/// Default accelerometer measurement variance
const R0_ACCEL: f32 = 9e-2;
/// Process noise ceiling for adaptation
const Q_CEILING: f32 = 1e-2;
/// Covariance trace beyond this is treated as divergence
const MAX_TRACE: f32 = 1e4;
/// Prediction step clamp; protects against scheduler stalls
const MAX_DT: f32 = 0.25;

/// Filter configuration
#[derive(Debug, Clone, Copy)]
pub struct EkfConfig {
    /// Local gravity magnitude in m/s²
    pub gravity: f32,
    /// Lower bound of the quasi-static gate, as a fraction of gravity
    pub static_gate_min: f32,
    /// Upper bound of the quasi-static gate, as a fraction of gravity
    pub static_gate_max: f32,
    /// Noise adaptation tuning
    pub adaptation: AdaptationConfig,
}

impl Default for EkfConfig {
    fn default() -> Self {
        Self {
            gravity: crate::config::GRAVITY_MS2,
            static_gate_min: 0.8,
            static_gate_max: 1.2,
            adaptation: AdaptationConfig::default(),
        }
    }
}

/// What a measurement update did
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UpdateOutcome {
    /// Correction applied
    Applied,
    /// Sample outside the quasi-static gate; prediction stands
    Rejected,
    /// Covariance diverged and was reset to the prior
    Reset,
}

/// Online-adaptive attitude EKF
pub struct AttitudeEkf {
    config: EkfConfig,
    /// State vector: quaternion (w first) then gyro bias
    x: [f32; STATE_DIM],
    /// State covariance
    p: SquareMatrix<STATE_DIM>,
    /// Process noise diagonal (per second)
    q_diag: [f32; STATE_DIM],
    /// Measurement noise diagonal
    r_diag: [f32; OBS_DIM],
    /// EMA of squared innovations, drives R adaptation
    innov_sq: [f32; OBS_DIM],
    /// Updates applied so far; adaptation waits for warmup
    updates_applied: u32,
    /// Covariance resets since construction
    resets: u32,
    /// Samples rejected by the quasi-static gate
    rejected: u32,
    /// Last bias-corrected angular rate
    last_rate: Vec3,
    /// Last gravity-removed acceleration residual
    last_linear: Vec3,
}

impl AttitudeEkf {
    /// Create a filter at the identity orientation
    pub fn new(config: EkfConfig) -> Self {
        Self {
            config,
            x: [1.0, 0.0, 0.0, 0.0, 0.0, 0.0, 0.0],
            p: Self::prior_covariance(),
            q_diag: Self::prior_process_noise(),
            r_diag: [R0_ACCEL; OBS_DIM],
            innov_sq: [0.0; OBS_DIM],
            updates_applied: 0,
            resets: 0,
            rejected: 0,
            last_rate: [0.0; 3],
            last_linear: [0.0; 3],
        }
    }

    /// Create a filter seeded from a calibration profile
    ///
    /// The initial quaternion rotates the measured gravity direction onto
    /// the world vertical, and the gyro bias states start at the measured
    /// rest bias so the filter converges in a handful of steps.
    pub fn with_profile(config: EkfConfig, profile: &CalibrationProfile) -> Self {
        let mut ekf = Self::new(config);

        let down = vec3::normalize(&profile.gravity);
        ekf.x[0..4].copy_from_slice(&quat_from_down(&down));
        ekf.x[4] = profile.gyro_bias[0];
        ekf.x[5] = profile.gyro_bias[1];
        ekf.x[6] = profile.gyro_bias[2];
        // Samples reaching the filter are bias-corrected, so the expected
        // magnitude is the calibrated reference, not the raw measurement
        ekf.config.gravity = vec3::norm(&profile.gravity);
        ekf
    }

    fn prior_covariance() -> SquareMatrix<STATE_DIM> {
        let mut p = [[0.0; STATE_DIM]; STATE_DIM];
        for i in 0..4 {
            p[i][i] = P0_ATTITUDE;
        }
        for i in 4..STATE_DIM {
            p[i][i] = P0_BIAS;
        }
        p
    }

    fn prior_process_noise() -> [f32; STATE_DIM] {
        let mut q = [Q0_ATTITUDE; STATE_DIM];
        for item in q.iter_mut().skip(4) {
            *item = Q0_BIAS;
        }
        q
    }

    /// Propagate the state forward by `dt` seconds using a gyro sample
    pub fn predict(&mut self, gyro: &Vec3, dt: f32) {
        if !(dt > 0.0) || !vec3::is_finite(gyro) {
            return;
        }
        let dt = if dt > MAX_DT { MAX_DT } else { dt };

        let w = [
            gyro[0] - self.x[4],
            gyro[1] - self.x[5],
            gyro[2] - self.x[6],
        ];
        self.last_rate = w;

        // q̇ = ½ Ω(ω) q
        let (q0, q1, q2, q3) = (self.x[0], self.x[1], self.x[2], self.x[3]);
        let half_dt = 0.5 * dt;
        self.x[0] += half_dt * (-w[0] * q1 - w[1] * q2 - w[2] * q3);
        self.x[1] += half_dt * (w[0] * q0 + w[2] * q2 - w[1] * q3);
        self.x[2] += half_dt * (w[1] * q0 - w[2] * q1 + w[0] * q3);
        self.x[3] += half_dt * (w[2] * q0 + w[1] * q1 - w[0] * q2);
        self.normalize_quaternion();

        // Jacobian F = ∂f/∂x around the pre-update state
        let mut f = matrix::identity::<STATE_DIM>();
        // ∂q̇/∂q block, I + ½·dt·Ω
        f[0][1] = -half_dt * w[0];
        f[0][2] = -half_dt * w[1];
        f[0][3] = -half_dt * w[2];
        f[1][0] = half_dt * w[0];
        f[1][2] = half_dt * w[2];
        f[1][3] = -half_dt * w[1];
        f[2][0] = half_dt * w[1];
        f[2][1] = -half_dt * w[2];
        f[2][3] = half_dt * w[0];
        f[3][0] = half_dt * w[2];
        f[3][1] = half_dt * w[1];
        f[3][2] = -half_dt * w[0];
        // ∂q̇/∂b block, −½·dt·Ξ(q)
        f[0][4] = half_dt * q1;
        f[0][5] = half_dt * q2;
        f[0][6] = half_dt * q3;
        f[1][4] = -half_dt * q0;
        f[1][5] = half_dt * q3;
        f[1][6] = -half_dt * q2;
        f[2][4] = -half_dt * q3;
        f[2][5] = -half_dt * q0;
        f[2][6] = half_dt * q1;
        f[3][4] = half_dt * q2;
        f[3][5] = -half_dt * q1;
        f[3][6] = -half_dt * q0;

        // P = F·P·Fᵀ + Q·dt
        let mut fp = [[0.0; STATE_DIM]; STATE_DIM];
        let mut ft = [[0.0; STATE_DIM]; STATE_DIM];
        matrix::multiply(&f, &self.p, &mut fp);
        matrix::transpose(&f, &mut ft);
        matrix::multiply(&fp, &ft, &mut self.p);
        for i in 0..STATE_DIM {
            self.p[i][i] += self.q_diag[i] * dt;
        }
        matrix::make_symmetric(&mut self.p);

        self.health_check();
    }

    /// Correct the attitude with an accelerometer sample
    ///
    /// Samples outside the quasi-static gate are rejected: the filter then
    /// relies on gyro propagation alone until the motion settles.
    pub fn update(&mut self, accel: &Vec3) -> FusionResult<UpdateOutcome> {
        if !vec3::is_finite(accel) {
            self.rejected = self.rejected.saturating_add(1);
            return Ok(UpdateOutcome::Rejected);
        }

        let g = self.config.gravity;
        let h = self.predicted_gravity();
        self.last_linear = vec3::sub(accel, &h);

        let ratio = vec3::norm(accel) / g;
        if ratio < self.config.static_gate_min || ratio > self.config.static_gate_max {
            self.rejected = self.rejected.saturating_add(1);
            return Ok(UpdateOutcome::Rejected);
        }

        let y = self.last_linear;

        // H = ∂h/∂x, bias columns are zero
        let (q0, q1, q2, q3) = (self.x[0], self.x[1], self.x[2], self.x[3]);
        let mut hj = [[0.0; STATE_DIM]; OBS_DIM];
        hj[0][0] = -2.0 * g * q2;
        hj[0][1] = 2.0 * g * q3;
        hj[0][2] = -2.0 * g * q0;
        hj[0][3] = 2.0 * g * q1;
        hj[1][0] = 2.0 * g * q1;
        hj[1][1] = 2.0 * g * q0;
        hj[1][2] = 2.0 * g * q3;
        hj[1][3] = 2.0 * g * q2;
        hj[2][0] = 2.0 * g * q0;
        hj[2][1] = -2.0 * g * q1;
        hj[2][2] = -2.0 * g * q2;
        hj[2][3] = 2.0 * g * q3;

        // S = H·P·Hᵀ + R
        let mut ht = [[0.0; OBS_DIM]; STATE_DIM];
        matrix::transpose(&hj, &mut ht);
        let mut pht = [[0.0; OBS_DIM]; STATE_DIM];
        matrix::multiply(&self.p, &ht, &mut pht);
        let mut s = [[0.0; OBS_DIM]; OBS_DIM];
        matrix::multiply(&hj, &pht, &mut s);
        let hph_diag = [s[0][0], s[1][1], s[2][2]];
        for i in 0..OBS_DIM {
            s[i][i] += self.r_diag[i];
        }

        let mut s_inv = [[0.0; OBS_DIM]; OBS_DIM];
        if !matrix::invert3(&s, &mut s_inv) {
            return Err(FusionError::SingularMatrix);
        }

        // K = P·Hᵀ·S⁻¹
        let mut k = [[0.0; OBS_DIM]; STATE_DIM];
        matrix::multiply(&pht, &s_inv, &mut k);

        // x += K·y
        let mut dx = [0.0; STATE_DIM];
        matrix::matvec(&k, &y, &mut dx);
        for i in 0..STATE_DIM {
            self.x[i] += dx[i];
        }
        self.normalize_quaternion();

        // Joseph form: P = (I−KH)·P·(I−KH)ᵀ + K·R·Kᵀ
        let mut kh = [[0.0; STATE_DIM]; STATE_DIM];
        matrix::multiply(&k, &hj, &mut kh);
        let mut a = matrix::identity::<STATE_DIM>();
        for i in 0..STATE_DIM {
            for j in 0..STATE_DIM {
                a[i][j] -= kh[i][j];
            }
        }
        let mut ap = [[0.0; STATE_DIM]; STATE_DIM];
        matrix::multiply(&a, &self.p, &mut ap);
        let mut at = [[0.0; STATE_DIM]; STATE_DIM];
        matrix::transpose(&a, &mut at);
        matrix::multiply(&ap, &at, &mut self.p);
        // K·R·Kᵀ with diagonal R collapses to a weighted outer product
        for i in 0..STATE_DIM {
            for j in 0..STATE_DIM {
                let mut acc = 0.0;
                for m in 0..OBS_DIM {
                    acc += k[i][m] * self.r_diag[m] * k[j][m];
                }
                self.p[i][j] += acc;
            }
        }
        matrix::make_symmetric(&mut self.p);

        self.updates_applied = self.updates_applied.saturating_add(1);
        self.adapt(&y, &hph_diag, &s);

        if self.health_check() {
            return Ok(UpdateOutcome::Reset);
        }
        Ok(UpdateOutcome::Applied)
    }

    /// Innovation-driven noise adaptation, rate-limited per update
    fn adapt(&mut self, y: &[f32; OBS_DIM], hph_diag: &[f32; OBS_DIM], s: &SquareMatrix<OBS_DIM>) {
        let cfg = &self.config.adaptation;
        let alpha = cfg.alpha;

        for i in 0..OBS_DIM {
            self.innov_sq[i] = (1.0 - alpha) * self.innov_sq[i] + alpha * y[i] * y[i];
        }
        if self.updates_applied < cfg.warmup {
            return;
        }

        // R tracks E[y·yᵀ] − H·P·Hᵀ, floored and rate-limited
        for i in 0..OBS_DIM {
            let mut target = self.innov_sq[i] - hph_diag[i];
            if target < cfg.r_floor {
                target = cfg.r_floor;
            }
            let hi = self.r_diag[i] * (1.0 + cfg.max_change);
            let lo = self.r_diag[i] * (1.0 - cfg.max_change);
            self.r_diag[i] = target.clamp(lo, hi);
        }

        // Q inflates under sustained model mismatch, decays slowly otherwise
        let energy = y[0] * y[0] + y[1] * y[1] + y[2] * y[2];
        let factor = if energy > 2.0 * matrix::trace(s) {
            1.0 + cfg.max_change
        } else {
            1.0 - cfg.max_change * 0.1
        };
        for q in self.q_diag.iter_mut() {
            *q = (*q * factor).clamp(cfg.q_floor, Q_CEILING);
        }
    }

    /// Detect and recover from numerical divergence
    ///
    /// Returns true when the covariance had to be reset.
    fn health_check(&mut self) -> bool {
        let mut bad = false;
        for i in 0..STATE_DIM {
            if self.p[i][i] < 0.0 {
                bad = true;
            }
            for j in 0..STATE_DIM {
                if !self.p[i][j].is_finite() {
                    bad = true;
                }
            }
        }
        if !bad && matrix::trace(&self.p) > MAX_TRACE {
            bad = true;
        }
        if !bad {
            return false;
        }

        self.p = Self::prior_covariance();
        self.q_diag = Self::prior_process_noise();
        self.r_diag = [R0_ACCEL; OBS_DIM];
        self.innov_sq = [0.0; OBS_DIM];
        self.updates_applied = 0;
        self.resets = self.resets.saturating_add(1);
        if !self.x.iter().all(|v| v.is_finite()) {
            self.x = [1.0, 0.0, 0.0, 0.0, 0.0, 0.0, 0.0];
        }
        self.normalize_quaternion();

        #[cfg(feature = "std")]
        log::warn!(
            "attitude filter covariance diverged, reset to prior (reset #{})",
            self.resets
        );
        true
    }

    fn normalize_quaternion(&mut self) {
        let n = sqrtf(
            self.x[0] * self.x[0]
                + self.x[1] * self.x[1]
                + self.x[2] * self.x[2]
                + self.x[3] * self.x[3],
        );
        if n > 1e-9 && n.is_finite() {
            for v in self.x[0..4].iter_mut() {
                *v /= n;
            }
        } else {
            self.x[0..4].copy_from_slice(&[1.0, 0.0, 0.0, 0.0]);
        }
    }

    /// Gravity vector the current attitude predicts, body frame
    pub fn predicted_gravity(&self) -> Vec3 {
        let g = self.config.gravity;
        let (q0, q1, q2, q3) = (self.x[0], self.x[1], self.x[2], self.x[3]);
        [
            g * 2.0 * (q1 * q3 - q0 * q2),
            g * 2.0 * (q2 * q3 + q0 * q1),
            g * (q0 * q0 - q1 * q1 - q2 * q2 + q3 * q3),
        ]
    }

    /// Snapshot of the filter output for downstream consumers
    pub fn state(&self) -> FilterState {
        FilterState {
            orientation: [self.x[0], self.x[1], self.x[2], self.x[3]],
            angular_velocity: self.last_rate,
            linear_accel: self.last_linear,
            covariance_trace: matrix::trace(&self.p),
            resets: self.resets,
            rejected_updates: self.rejected,
        }
    }

    /// Current gyro bias estimate
    pub fn gyro_bias(&self) -> Vec3 {
        [self.x[4], self.x[5], self.x[6]]
    }

    /// Current measurement noise diagonal
    pub fn measurement_noise(&self) -> [f32; OBS_DIM] {
        self.r_diag
    }

    /// Overwrite one covariance entry. Fault-injection support for tests.
    pub fn inject_covariance(&mut self, row: usize, col: usize, value: f32) {
        if row < STATE_DIM && col < STATE_DIM {
            self.p[row][col] = value;
        }
    }
}

/// Quaternion rotating the body-frame down direction onto world vertical
fn quat_from_down(down: &Vec3) -> [f32; 4] {
    // Rotation taking `down` to +z; derived from the half-angle identity
    let ez = [0.0, 0.0, 1.0];
    let d = vec3::dot(down, &ez);
    if d < -0.9999 {
        // Antiparallel: rotate half a turn about x
        return [0.0, 1.0, 0.0, 0.0];
    }
    let c = [
        down[1] * ez[2] - down[2] * ez[1],
        down[2] * ez[0] - down[0] * ez[2],
        down[0] * ez[1] - down[1] * ez[0],
    ];
    let w = 1.0 + d;
    let n = sqrtf(w * w + c[0] * c[0] + c[1] * c[1] + c[2] * c[2]);
    [w / n, c[0] / n, c[1] / n, c[2] / n]
}
