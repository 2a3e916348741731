//! Model Artifact Persistence
//!
//! A trained baseline serializes to a small JSON document so it can be
//! trained off-device, copied around, and inspected with ordinary text
//! tooling. The format carries an explicit version so future model kinds
//! can share the file extension without guessing.

use std::fs;
use std::path::Path;

use serde::{Deserialize, Serialize};

use motionguard_core::features::FINGERPRINT_DIM;

use crate::{ModelError, ModelResult};

/// Current artifact format version
pub const FORMAT_VERSION: u32 = 1;

/// Serialized form of a trained baseline model
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ModelArtifact {
    /// Artifact format version, see [`FORMAT_VERSION`]
    pub format_version: u32,
    /// Per-slot mean of the training fingerprints
    pub mean: Vec<f32>,
    /// Per-slot standard deviation, floored during training
    pub stddev: Vec<f32>,
    /// Deviation energy that maps to a score of 1.0
    pub error_scale: f32,
    /// Fingerprints the baseline was fit over
    pub training_samples: u32,
}

impl ModelArtifact {
    /// Check the artifact matches the runtime fingerprint layout
    pub fn validate(&self) -> ModelResult<()> {
        if self.mean.len() != FINGERPRINT_DIM {
            return Err(ModelError::DimensionMismatch {
                expected: FINGERPRINT_DIM,
                actual: self.mean.len(),
            });
        }
        if self.stddev.len() != FINGERPRINT_DIM {
            return Err(ModelError::DimensionMismatch {
                expected: FINGERPRINT_DIM,
                actual: self.stddev.len(),
            });
        }
        Ok(())
    }

    /// Load and validate an artifact from a JSON file
    pub fn load<P: AsRef<Path>>(path: P) -> ModelResult<Self> {
        let text = fs::read_to_string(path)?;
        let artifact: Self = serde_json::from_str(&text)?;
        artifact.validate()?;
        Ok(artifact)
    }

    /// Write the artifact as pretty-printed JSON
    pub fn save<P: AsRef<Path>>(&self, path: P) -> ModelResult<()> {
        let text = serde_json::to_string_pretty(self)?;
        fs::write(path, text)?;
        Ok(())
    }
}
