//! Attitude Estimation from 6-Axis Inertial Data
//!
//! ## Overview
//!
//! This module hosts the online-adaptive Extended Kalman Filter that turns
//! calibrated accelerometer/gyroscope samples into a stable orientation
//! estimate, plus the small fixed-size matrix kernel it runs on.
//!
//! ## Filter Structure
//!
//! ```text
//! gyro ──▶ predict: integrate rate into quaternion, P = F·P·Fᵀ + Q·dt
//! accel ─▶ update:  gravity-direction observation (quasi-static gated)
//!                   y = a − Rᵀ(q)·g,  K = P·Hᵀ·S⁻¹,  Joseph-form P
//!                   ↓
//!          adapt:   R tracks innovation covariance, Q tracks residual
//!                   energy, both rate-limited
//! ```
//!
//! ## Numerical Stability
//!
//! - Quaternion re-normalized after every predict and update
//! - Joseph-form covariance update preserves symmetry and PSD-ness
//! - Covariance re-symmetrized each step
//! - Health check resets diverged covariance to the prior instead of
//!   propagating NaN through the pipeline; resets are logged and counted
//!
//! All operations work on fixed-size stack arrays; nothing here allocates.

pub mod ekf;

pub use ekf::{AttitudeEkf, UpdateOutcome};

use crate::errors::FusionError;

/// Result type for fusion operations
pub type FusionResult<T> = Result<T, FusionError>;

/// Fixed-size matrix kernel for the filter
///
/// Just the operations the EKF needs, on plain nested arrays. Row-major,
/// caller-provided output buffers, no allocation.
pub mod matrix {
    /// R×C matrix
    pub type Matrix<const R: usize, const C: usize> = [[f32; C]; R];

    /// Square matrix shorthand
    pub type SquareMatrix<const N: usize> = Matrix<N, N>;

    /// Column vector shorthand
    pub type Vector<const N: usize> = [f32; N];

    /// C = A × B
    pub fn multiply<const R: usize, const K: usize, const C: usize>(
        a: &Matrix<R, K>,
        b: &Matrix<K, C>,
        out: &mut Matrix<R, C>,
    ) {
        for i in 0..R {
            for j in 0..C {
                let mut acc = 0.0;
                for k in 0..K {
                    acc += a[i][k] * b[k][j];
                }
                out[i][j] = acc;
            }
        }
    }

    /// B = Aᵀ
    pub fn transpose<const R: usize, const C: usize>(
        a: &Matrix<R, C>,
        out: &mut Matrix<C, R>,
    ) {
        for i in 0..R {
            for j in 0..C {
                out[j][i] = a[i][j];
            }
        }
    }

    /// y = A × x
    pub fn matvec<const R: usize, const C: usize>(
        a: &Matrix<R, C>,
        x: &Vector<C>,
        out: &mut Vector<R>,
    ) {
        for i in 0..R {
            let mut acc = 0.0;
            for j in 0..C {
                acc += a[i][j] * x[j];
            }
            out[i] = acc;
        }
    }

    /// A ← (A + Aᵀ) / 2
    ///
    /// Covariance matrices must stay symmetric; floating-point drift is
    /// folded back after every update.
    pub fn make_symmetric<const N: usize>(a: &mut SquareMatrix<N>) {
        for i in 0..N {
            for j in (i + 1)..N {
                let avg = (a[i][j] + a[j][i]) * 0.5;
                a[i][j] = avg;
                a[j][i] = avg;
            }
        }
    }

    /// Identity matrix
    pub fn identity<const N: usize>() -> SquareMatrix<N> {
        let mut m = [[0.0; N]; N];
        for i in 0..N {
            m[i][i] = 1.0;
        }
        m
    }

    /// Invert a 3×3 matrix by cofactor expansion
    ///
    /// The innovation covariance is always 3×3, so the closed form beats
    /// elimination. Returns `false` when the determinant is too small.
    pub fn invert3(a: &SquareMatrix<3>, out: &mut SquareMatrix<3>) -> bool {
        let c00 = a[1][1] * a[2][2] - a[1][2] * a[2][1];
        let c01 = a[1][2] * a[2][0] - a[1][0] * a[2][2];
        let c02 = a[1][0] * a[2][1] - a[1][1] * a[2][0];

        let det = a[0][0] * c00 + a[0][1] * c01 + a[0][2] * c02;
        if det.abs() < 1e-12 || !det.is_finite() {
            return false;
        }
        let inv_det = 1.0 / det;

        out[0][0] = c00 * inv_det;
        out[1][0] = c01 * inv_det;
        out[2][0] = c02 * inv_det;
        out[0][1] = (a[0][2] * a[2][1] - a[0][1] * a[2][2]) * inv_det;
        out[1][1] = (a[0][0] * a[2][2] - a[0][2] * a[2][0]) * inv_det;
        out[2][1] = (a[0][1] * a[2][0] - a[0][0] * a[2][1]) * inv_det;
        out[0][2] = (a[0][1] * a[1][2] - a[0][2] * a[1][1]) * inv_det;
        out[1][2] = (a[0][2] * a[1][0] - a[0][0] * a[1][2]) * inv_det;
        out[2][2] = (a[0][0] * a[1][1] - a[0][1] * a[1][0]) * inv_det;

        true
    }

    /// Sum of diagonal entries
    pub fn trace<const N: usize>(a: &SquareMatrix<N>) -> f32 {
        let mut t = 0.0;
        for i in 0..N {
            t += a[i][i];
        }
        t
    }
}

#[cfg(test)]
mod tests {
    use super::matrix::*;

    #[test]
    fn multiply_and_transpose() {
        let a: Matrix<2, 3> = [[1.0, 2.0, 3.0], [4.0, 5.0, 6.0]];
        let b: Matrix<3, 2> = [[7.0, 8.0], [9.0, 10.0], [11.0, 12.0]];
        let mut c: Matrix<2, 2> = [[0.0; 2]; 2];

        multiply(&a, &b, &mut c);
        assert_eq!(c[0][0], 58.0);
        assert_eq!(c[1][1], 154.0);

        let mut at: Matrix<3, 2> = [[0.0; 2]; 3];
        transpose(&a, &mut at);
        assert_eq!(at[2][1], 6.0);
    }

    #[test]
    fn symmetrize() {
        let mut m: SquareMatrix<2> = [[1.0, 2.0], [4.0, 1.0]];
        make_symmetric(&mut m);
        assert_eq!(m[0][1], 3.0);
        assert_eq!(m[1][0], 3.0);
    }

    #[test]
    fn invert3_roundtrip() {
        let a: SquareMatrix<3> = [[2.0, 0.5, 0.0], [0.5, 3.0, 0.1], [0.0, 0.1, 1.5]];
        let mut inv = [[0.0; 3]; 3];
        assert!(invert3(&a, &mut inv));

        let mut product = [[0.0; 3]; 3];
        multiply(&a, &inv, &mut product);
        for i in 0..3 {
            for j in 0..3 {
                let expected = if i == j { 1.0 } else { 0.0 };
                assert!((product[i][j] - expected).abs() < 1e-5);
            }
        }
    }

    #[test]
    fn invert3_rejects_singular() {
        let a: SquareMatrix<3> = [[1.0, 2.0, 3.0], [2.0, 4.0, 6.0], [0.0, 0.0, 1.0]];
        let mut inv = [[0.0; 3]; 3];
        assert!(!invert3(&a, &mut inv));
    }

    #[test]
    fn trace_sums_diagonal() {
        let m: SquareMatrix<3> = identity();
        assert_eq!(trace(&m), 3.0);
    }
}
