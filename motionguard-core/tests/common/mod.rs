//! Shared helpers for the integration suites

use motionguard_core::calibration::{CalibrationProfile, Calibrator};
use motionguard_core::config::MonitorConfig;
use motionguard_core::driver::{SensorDriver, SyntheticDriver};
use motionguard_core::errors::CalibrationError;

/// Config with a short calibration window so suites run quickly
pub fn fast_config() -> MonitorConfig {
    let mut config = MonitorConfig::default();
    config.calibration.duration_s = 1.5;
    config.calibration.min_samples = 100;
    config.window.size = 128;
    config.window.cadence = 64;
    config.window.min_samples = 64;
    config
}

/// Run a driver through a full calibration pass
pub fn calibrate(
    config: &MonitorConfig,
    driver: &mut SyntheticDriver,
) -> Result<CalibrationProfile, CalibrationError> {
    let mut calibrator = Calibrator::new(config);
    calibrator.begin();
    loop {
        let sample = driver.read().expect("synthetic read");
        if let Some(result) = calibrator.push(&sample) {
            return result;
        }
    }
}
