//! Property tests for fingerprint extraction

use proptest::prelude::*;

use motionguard_core::buffer::FeatureWindow;
use motionguard_core::config::GRAVITY_MS2;
use motionguard_core::features::{ExtractorConfig, FeatureExtractor, FINGERPRINT_DIM};
use motionguard_core::sample::{FilterState, RawSample, WindowSample};

fn extractor() -> FeatureExtractor {
    FeatureExtractor::new(ExtractorConfig {
        window_size: 128,
        min_samples: 64,
        sample_rate_hz: 100.0,
        band_edges_hz: [0.5, 5.0, 15.0, 30.0, 50.0],
        gravity: GRAVITY_MS2,
    })
}

prop_compose! {
    /// One physically plausible filtered sample
    fn arb_sample(t: u64)(
        ax in -20.0f32..20.0,
        ay in -20.0f32..20.0,
        az in -20.0f32..20.0,
        wx in -5.0f32..5.0,
        wy in -5.0f32..5.0,
        wz in -5.0f32..5.0,
    ) -> WindowSample {
        let mut state = FilterState::default();
        state.angular_velocity = [wx, wy, wz];
        state.linear_accel = [ax * 0.1, ay * 0.1, az * 0.1];
        WindowSample {
            raw: RawSample {
                timestamp: t * 10,
                accel: [ax, ay, az],
                gyro: [wx, wy, wz],
            },
            state,
        }
    }
}

fn arb_window() -> impl Strategy<Value = FeatureWindow> {
    prop::collection::vec(arb_sample(0), 64..256)
        .prop_map(|samples| {
            let mut window = FeatureWindow::new();
            for (t, mut sample) in samples.into_iter().enumerate() {
                sample.raw.timestamp = t as u64 * 10;
                window.push(sample);
            }
            window
        })
}

proptest! {
    /// Any finite input window yields exactly 32 finite slots
    #[test]
    fn fingerprints_are_always_finite(window in arb_window()) {
        let fp = extractor().extract(&window).unwrap();
        prop_assert_eq!(fp.len(), FINGERPRINT_DIM);
        for (i, v) in fp.iter().enumerate() {
            prop_assert!(v.is_finite(), "slot {} = {}", i, v);
        }
    }

    /// Extraction is a pure function of the window contents
    #[test]
    fn extraction_is_deterministic(window in arb_window()) {
        let a = extractor().extract(&window).unwrap();
        let b = extractor().extract(&window).unwrap();
        prop_assert_eq!(a, b);
    }

    /// Bounded slots stay in their documented ranges
    #[test]
    fn bounded_slots_stay_bounded(window in arb_window()) {
        let fp = extractor().extract(&window).unwrap();
        // Zero-crossing rates
        prop_assert!((0.0..=1.0).contains(&fp[4]));
        prop_assert!((0.0..=1.0).contains(&fp[9]));
        // Spectral flatness
        prop_assert!((0.0..=1.0 + 1e-3).contains(&fp[23]));
        // Band ratios
        for slot in 19..=21 {
            prop_assert!((0.0..=1.0 + 1e-3).contains(&fp[slot]), "slot {} = {}", slot, fp[slot]);
        }
        // Normalized dominant frequency cannot exceed Nyquist
        prop_assert!((0.0..=1.0 + 1e-3).contains(&fp[24]));
    }
}
