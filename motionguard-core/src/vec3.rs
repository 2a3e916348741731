//! Small fixed-size vector helpers for the estimation hot path
//!
//! All inertial quantities in MotionGuard are 3-vectors. Rather than pull in
//! a linear-algebra crate, we operate on plain `[f32; 3]` arrays with free
//! functions, keeping the hot path allocation-free and `no_std` friendly.
//! Float math goes through `libm` so the same code runs without `std`.

use libm::sqrtf;

/// 3-component vector in device frame
pub type Vec3 = [f32; 3];

/// Zero vector
pub const ZERO: Vec3 = [0.0; 3];

/// Euclidean norm
#[inline]
pub fn norm(v: &Vec3) -> f32 {
    sqrtf(v[0] * v[0] + v[1] * v[1] + v[2] * v[2])
}

/// Dot product
#[inline]
pub fn dot(a: &Vec3, b: &Vec3) -> f32 {
    a[0] * b[0] + a[1] * b[1] + a[2] * b[2]
}

/// Component-wise subtraction: a - b
#[inline]
pub fn sub(a: &Vec3, b: &Vec3) -> Vec3 {
    [a[0] - b[0], a[1] - b[1], a[2] - b[2]]
}

/// Component-wise addition
#[inline]
pub fn add(a: &Vec3, b: &Vec3) -> Vec3 {
    [a[0] + b[0], a[1] + b[1], a[2] + b[2]]
}

/// Scalar multiply
#[inline]
pub fn scale(v: &Vec3, s: f32) -> Vec3 {
    [v[0] * s, v[1] * s, v[2] * s]
}

/// Normalize to unit length; returns the zero vector if the norm is
/// too small to divide by safely
pub fn normalize(v: &Vec3) -> Vec3 {
    let n = norm(v);
    if n < 1e-9 {
        return ZERO;
    }
    scale(v, 1.0 / n)
}

/// True if every component is a finite number
#[inline]
pub fn is_finite(v: &Vec3) -> bool {
    v[0].is_finite() && v[1].is_finite() && v[2].is_finite()
}
