//! Baseline Anomaly Scoring for MotionGuard Fingerprints
//!
//! ## Overview
//!
//! Implements the scoring side of the monitor's [`AnomalyScorer`]
//! boundary. The model here is deliberately simple: a per-slot Gaussian
//! baseline fit over fingerprints captured during known-normal operation.
//! A frame's score is its normalized deviation energy from that baseline,
//! clamped to `[0, 1]`.
//!
//! ```text
//! z_i   = (x_i − mean_i) / stddev_i
//! error = Σ z_i² / D
//! score = min(error / error_scale, 1.0)
//! ```
//!
//! `error_scale` is frozen at training time from the worst in-sample
//! error, so normal motion scores well below 1 and anything outside the
//! training envelope saturates quickly.
//!
//! ## Why a Gaussian Baseline?
//!
//! Richer models (autoencoders, isolation forests) score better on
//! complex multi-modal baselines, but they need a training pipeline the
//! edge box does not have. The Gaussian baseline trains in one pass over
//! a capture file, serializes to a few hundred bytes of JSON, and its
//! scores are directly interpretable as deviation energy. It is the
//! floor other models have to beat, and on single-activity deployments
//! it is usually enough.
//!
//! ## Model Lifecycle
//!
//! 1. Run the monitor with a [`NullScorer`] to capture normal operation
//! 2. Fit: [`BaselineScorer::fit`] over the captured fingerprints
//! 3. Persist: [`ModelArtifact::save`] writes the JSON artifact
//! 4. Deploy: [`ModelArtifact::load`] + [`BaselineScorer::from_artifact`]
//!
//! [`NullScorer`]: motionguard_core::scoring::NullScorer

#![deny(unsafe_code)]
#![warn(missing_docs)]

pub mod artifact;
pub mod baseline;
pub mod history;

pub use artifact::ModelArtifact;
pub use baseline::BaselineScorer;
pub use history::ScoreHistory;

use thiserror_no_std::Error;

/// Errors from model training, persistence, and loading
#[derive(Error, Debug)]
pub enum ModelError {
    /// Artifact file could not be read or written
    #[error("model artifact I/O failed: {0}")]
    Io(#[from] std::io::Error),

    /// Artifact is not valid JSON or not a model artifact
    #[error("model artifact malformed: {0}")]
    Format(#[from] serde_json::Error),

    /// Artifact dimensionality does not match the fingerprint layout
    #[error("model has {actual} slots, fingerprints have {expected}")]
    DimensionMismatch {
        /// Slots the runtime fingerprint carries
        expected: usize,
        /// Slots the artifact carries
        actual: usize,
    },

    /// Training requires at least one fingerprint
    #[error("cannot fit a baseline from an empty training set")]
    EmptyTrainingSet,

    /// Training data contains non-finite values
    #[error("training fingerprint {index} contains non-finite slots")]
    NonFiniteTrainingData {
        /// Index of the offending fingerprint
        index: usize,
    },
}

/// Result alias for model operations
pub type ModelResult<T> = Result<T, ModelError>;
