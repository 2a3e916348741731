//! Gaussian Baseline Scorer
//!
//! One-pass fit over known-normal fingerprints, then constant-time
//! scoring per frame. Scores are normalized deviation energy clamped to
//! `[0, 1]`, matching the contract of the monitor's scoring boundary.

use motionguard_core::features::{FeatureFrame, MotionFingerprint, FINGERPRINT_DIM};
use motionguard_core::scoring::AnomalyScorer;

use crate::{ModelArtifact, ModelError, ModelResult};

/// Slots this quiet in training still get a usable deviation unit
const STDDEV_FLOOR: f32 = 1e-3;

/// Headroom multiplier applied to the worst in-sample training error
///
/// Normal operation then scores at most 1/MARGIN, leaving the upper half
/// of the score range for genuinely novel motion.
const ERROR_MARGIN: f32 = 2.0;

/// Per-slot Gaussian baseline over normal-motion fingerprints
pub struct BaselineScorer {
    mean: [f32; FINGERPRINT_DIM],
    inv_stddev: [f32; FINGERPRINT_DIM],
    error_scale: f32,
}

impl BaselineScorer {
    /// Build a scorer from a validated artifact
    pub fn from_artifact(artifact: &ModelArtifact) -> ModelResult<Self> {
        artifact.validate()?;

        let mut mean = [0.0; FINGERPRINT_DIM];
        let mut inv_stddev = [0.0; FINGERPRINT_DIM];
        for i in 0..FINGERPRINT_DIM {
            mean[i] = artifact.mean[i];
            inv_stddev[i] = 1.0 / artifact.stddev[i].max(STDDEV_FLOOR);
        }
        Ok(Self {
            mean,
            inv_stddev,
            error_scale: artifact.error_scale.max(f32::EPSILON),
        })
    }

    /// Fit a baseline over known-normal fingerprints
    ///
    /// Computes per-slot mean and standard deviation, then sets the error
    /// scale from the worst in-sample deviation energy with headroom.
    /// Returns the artifact; pair with [`Self::from_artifact`] to score.
    pub fn fit(fingerprints: &[MotionFingerprint]) -> ModelResult<ModelArtifact> {
        if fingerprints.is_empty() {
            return Err(ModelError::EmptyTrainingSet);
        }
        for (index, fp) in fingerprints.iter().enumerate() {
            if !fp.iter().all(|v| v.is_finite()) {
                return Err(ModelError::NonFiniteTrainingData { index });
            }
        }

        let n = fingerprints.len() as f32;
        let mut mean = [0.0f32; FINGERPRINT_DIM];
        for fp in fingerprints {
            for (m, v) in mean.iter_mut().zip(fp.iter()) {
                *m += v;
            }
        }
        for m in mean.iter_mut() {
            *m /= n;
        }

        let mut var = [0.0f32; FINGERPRINT_DIM];
        for fp in fingerprints {
            for i in 0..FINGERPRINT_DIM {
                let d = fp[i] - mean[i];
                var[i] += d * d;
            }
        }
        let mut stddev = [0.0f32; FINGERPRINT_DIM];
        for i in 0..FINGERPRINT_DIM {
            stddev[i] = libm::sqrtf(var[i] / n).max(STDDEV_FLOOR);
        }

        // Worst in-sample error defines what "still normal" means
        let mut worst = 0.0f32;
        for fp in fingerprints {
            worst = worst.max(deviation_energy(fp, &mean, &stddev));
        }
        let error_scale = (worst * ERROR_MARGIN).max(1.0);

        Ok(ModelArtifact {
            format_version: crate::artifact::FORMAT_VERSION,
            mean: mean.to_vec(),
            stddev: stddev.to_vec(),
            error_scale,
            training_samples: fingerprints.len() as u32,
        })
    }

    fn energy(&self, fingerprint: &MotionFingerprint) -> f32 {
        let mut acc = 0.0;
        for i in 0..FINGERPRINT_DIM {
            let z = (fingerprint[i] - self.mean[i]) * self.inv_stddev[i];
            acc += z * z;
        }
        acc / FINGERPRINT_DIM as f32
    }
}

impl AnomalyScorer for BaselineScorer {
    fn is_available(&self) -> bool {
        true
    }

    fn score(&mut self, frame: &FeatureFrame) -> Option<f32> {
        if !frame.fingerprint.iter().all(|v| v.is_finite()) {
            return None;
        }
        let score = self.energy(&frame.fingerprint) / self.error_scale;
        Some(score.min(1.0))
    }
}

/// Mean squared z-deviation of `fingerprint` from the baseline
fn deviation_energy(
    fingerprint: &MotionFingerprint,
    mean: &[f32; FINGERPRINT_DIM],
    stddev: &[f32; FINGERPRINT_DIM],
) -> f32 {
    let mut acc = 0.0;
    for i in 0..FINGERPRINT_DIM {
        let z = (fingerprint[i] - mean[i]) / stddev[i];
        acc += z * z;
    }
    acc / FINGERPRINT_DIM as f32
}
