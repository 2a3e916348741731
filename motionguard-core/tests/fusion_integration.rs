//! Attitude filter behavior over realistic sample streams

mod common;

use common::{calibrate, fast_config};

use motionguard_core::buffer::FeatureWindow;
use motionguard_core::config::GRAVITY_MS2;
use motionguard_core::driver::{SensorDriver, SyntheticDriver};
use motionguard_core::features::{ExtractorConfig, FeatureExtractor};
use motionguard_core::fusion::ekf::{AttitudeEkf, EkfConfig};
use motionguard_core::fusion::UpdateOutcome;
use motionguard_core::sample::WindowSample;
use motionguard_core::vec3;

fn ekf_from(driver: &mut SyntheticDriver) -> AttitudeEkf {
    let config = fast_config();
    let profile = calibrate(&config, driver).unwrap();
    let ekf_config = EkfConfig {
        gravity: vec3::norm(&profile.gravity),
        static_gate_min: config.static_gate_min,
        static_gate_max: config.static_gate_max,
        adaptation: config.adaptation,
    };
    AttitudeEkf::with_profile(ekf_config, &profile)
}

/// Feed `n` driver samples through predict and update
fn run(ekf: &mut AttitudeEkf, driver: &mut SyntheticDriver, n: usize) {
    for _ in 0..n {
        let sample = driver.read().unwrap();
        ekf.predict(&sample.gyro, 0.01);
        ekf.update(&sample.accel).unwrap();
    }
}

#[test]
fn long_stationary_run_stays_converged() {
    let mut driver = SyntheticDriver::stationary(201);
    let mut ekf = ekf_from(&mut driver);

    // Ten minutes of simulated stationary samples
    run(&mut ekf, &mut driver, 60_000);

    let state = ekf.state();
    assert_eq!(state.resets, 0);
    assert!(state.covariance_trace.is_finite());
    assert!(state.covariance_trace < 1.0);

    let h = ekf.predicted_gravity();
    assert!((h[2] - GRAVITY_MS2).abs() < 0.2, "h = {:?}", h);
}

#[test]
fn tilted_start_converges_to_the_measured_gravity() {
    let g = GRAVITY_MS2;
    let mut driver = SyntheticDriver::new(202, [0.0, 0.5 * g, 0.866 * g], 10);
    let mut ekf = ekf_from(&mut driver);

    run(&mut ekf, &mut driver, 1000);

    let h = ekf.predicted_gravity();
    let measured = [0.0, 0.5 * g, 0.866 * g];
    let err = vec3::norm(&vec3::sub(&h, &measured));
    assert!(err < 0.3, "gravity error {}", err);
}

#[test]
fn shaking_is_rejected_but_recovery_is_quick() {
    let mut driver = SyntheticDriver::stationary(203);
    let mut ekf = ekf_from(&mut driver);
    run(&mut ekf, &mut driver, 500);

    // Strong shaking, well outside the quasi-static gate
    driver.set_vibration(15.0, 8.0);
    let mut rejected = 0;
    for _ in 0..300 {
        let sample = driver.read().unwrap();
        ekf.predict(&sample.gyro, 0.01);
        if ekf.update(&sample.accel).unwrap() == UpdateOutcome::Rejected {
            rejected += 1;
        }
    }
    assert!(rejected > 100, "only {} rejected", rejected);

    // Back to rest: updates resume and the estimate is still sane
    driver.set_vibration(0.0, 0.0);
    run(&mut ekf, &mut driver, 500);
    let state = ekf.state();
    assert_eq!(state.resets, 0);
    let h = ekf.predicted_gravity();
    assert!((h[2] - GRAVITY_MS2).abs() < 0.3);
}

#[test]
fn covariance_corruption_heals_without_poisoning_output() {
    let mut driver = SyntheticDriver::stationary(204);
    let mut ekf = ekf_from(&mut driver);
    run(&mut ekf, &mut driver, 500);

    ekf.inject_covariance(0, 0, f32::NAN);
    run(&mut ekf, &mut driver, 500);

    let state = ekf.state();
    assert_eq!(state.resets, 1);
    assert!(state.covariance_trace.is_finite());
    assert!(state.orientation.iter().all(|v| v.is_finite()));
    let h = ekf.predicted_gravity();
    assert!((h[2] - GRAVITY_MS2).abs() < 0.3, "post-reset h = {:?}", h);
}

#[test]
fn gyro_bias_estimate_tracks_the_driver_bias() {
    let bias = [0.01, -0.015, 0.0];
    let mut driver = SyntheticDriver::stationary(205).with_gyro_bias(bias);
    let mut ekf = ekf_from(&mut driver);

    run(&mut ekf, &mut driver, 3000);

    let learned = ekf.gyro_bias();
    assert!((learned[0] - bias[0]).abs() < 0.01, "bx = {}", learned[0]);
    assert!((learned[1] - bias[1]).abs() < 0.01, "by = {}", learned[1]);
}

#[test]
fn biased_but_tolerated_sensor_runs_clean_after_correction() {
    let config = fast_config();
    // +0.85 m/s² of z bias: measured magnitude ~10.66, still inside the
    // 10% acceptance band, so calibration succeeds with a large bias
    let mut driver = SyntheticDriver::stationary(206).with_accel_bias([0.0, 0.0, 0.85]);
    let profile = calibrate(&config, &mut driver).unwrap();
    assert!(profile.gravity_magnitude > 10.5);

    let mut ekf = AttitudeEkf::with_profile(EkfConfig::default(), &profile);
    let extractor = FeatureExtractor::new(ExtractorConfig {
        window_size: 128,
        min_samples: 64,
        sample_rate_hz: 100.0,
        band_edges_hz: config.band_edges_hz,
        gravity: vec3::norm(&profile.gravity),
    });

    let mut window: FeatureWindow = FeatureWindow::new();
    for _ in 0..500 {
        let corrected = profile.correct(&driver.read().unwrap());
        ekf.predict(&corrected.gyro, 0.01);
        ekf.update(&corrected.accel).unwrap();
        window.push(WindowSample {
            raw: corrected,
            state: ekf.state(),
        });
    }

    // Corrected samples match the reference the filter expects, so the
    // sensor bias leaves no standing innovation behind
    let state = ekf.state();
    assert_eq!(state.rejected_updates, 0);
    assert_eq!(state.resets, 0);
    let h = ekf.predicted_gravity();
    assert!((vec3::norm(&h) - GRAVITY_MS2).abs() < 0.05, "h = {:?}", h);

    let fp = extractor.extract(&window).unwrap();
    assert!(fp[29] < 0.01, "gravity deviation at rest: {}", fp[29]);
}
