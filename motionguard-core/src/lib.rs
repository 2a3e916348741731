//! MotionGuard Core: IMU Motion Anomaly Monitoring
//!
//! ## Overview
//!
//! MotionGuard watches a 6-axis IMU for motion that does not belong. It
//! self-calibrates against gravity at startup, fuses the sample stream
//! through an online-adaptive attitude EKF, condenses windows of filtered
//! motion into 32-slot physics fingerprints, and hands those to a
//! pluggable scorer that decides how anomalous they are.
//!
//! ```text
//! IMU driver ──▶ calibration ──▶ adaptive EKF ──▶ feature window
//!                correction       (quaternion +        │
//!                                  gyro bias)          ▼ every cadence
//!                                               fingerprint extractor
//!                                                      │
//!                              frame queue (SPSC, drop-oldest)
//!                                                      │
//!                scoring thread ──▶ anomaly journal (NDJSON)
//!                                   + shared snapshot
//! ```
//!
//! ## Design Constraints
//!
//! Built for edge deployment next to the sensor:
//!
//! - **Fixed memory**: windows, queues, and matrices are const-sized;
//!   the sampling path never allocates
//! - **Fail soft**: sensor faults retry with backoff, filter divergence
//!   resets to the prior, a missing scorer degrades to capture-only
//! - **`no_std` core**: estimation and feature extraction build without
//!   the standard library; threading, journaling, and the orchestrator
//!   are gated behind the `std` feature (on by default)
//!
//! ## Quick Start
//!
//! ```no_run
//! use std::sync::atomic::AtomicBool;
//! use motionguard_core::config::MonitorConfig;
//! use motionguard_core::driver::SyntheticDriver;
//! use motionguard_core::monitor::Monitor;
//! use motionguard_core::scoring::NullScorer;
//!
//! let driver = SyntheticDriver::stationary(42);
//! let mut monitor = Monitor::new(MonitorConfig::default(), driver, Box::new(NullScorer))
//!     .unwrap()
//!     .with_journal("anomalies.ndjson")
//!     .with_pacing();
//!
//! let stop = AtomicBool::new(false);
//! monitor.run(&stop).unwrap();
//! ```

#![cfg_attr(not(feature = "std"), no_std)]
#![deny(unsafe_code)]
#![warn(missing_docs)]

pub mod buffer;
pub mod calibration;
pub mod config;
pub mod driver;
pub mod errors;
pub mod features;
pub mod fusion;
pub mod queue;
pub mod sample;
pub mod scoring;
pub mod time;
pub mod vec3;

#[cfg(feature = "std")]
pub mod journal;
#[cfg(feature = "std")]
pub mod monitor;
#[cfg(feature = "std")]
pub mod snapshot;

pub use buffer::{FeatureWindow, WINDOW_CAPACITY};
pub use calibration::{CalibrationProfile, CalibrationStatus, Calibrator};
pub use config::MonitorConfig;
pub use driver::{SensorDriver, SyntheticDriver};
pub use errors::{
    CalibrationError, ConfigError, FeatureError, FusionError, MonitorError, SensorIoError,
};
pub use features::{FeatureExtractor, FeatureFrame, MotionFingerprint, FINGERPRINT_DIM};
pub use fusion::{AttitudeEkf, UpdateOutcome};
pub use sample::{FilterState, RawSample, WindowSample};
pub use scoring::{AnomalyRecord, AnomalyScorer, NullScorer};
pub use time::{Pacer, TimeSource, Timestamp};

#[cfg(feature = "std")]
pub use monitor::Monitor;

/// Crate version, from the manifest
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
