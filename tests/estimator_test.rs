//! Behaviour of the dot estimator on synthetic gaze samples


use gaze_dot_estimation::estimator::{
    DotSource, EstimateFailure, EstimatorConfig, FallbackPolicy, FusionMode, GazeSample,
};
use nalgebra::Point2;
use proptest::prelude::*;
use test_helpers::{converging_sample, eye, eye_looking_at, pixel_estimator, pixel_surface};

const SENTINEL: [f64; 3] = [0.0, 0.0, -1.0];

fn closest_approach_config() -> EstimatorConfig {
    EstimatorConfig {
        fusion: FusionMode::ClosestApproach,
        ..EstimatorConfig::default()
    }
}

fn fallback_config() -> EstimatorConfig {
    EstimatorConfig {
        fallback: FallbackPolicy::SingleRayFallback,
        ..EstimatorConfig::default()
    }
}

#[test]
fn test_converging_eyes_hit_display_centre() {
    for config in [EstimatorConfig::default(), closest_approach_config()] {
        let dot = pixel_estimator(config).estimate(&converging_sample()).unwrap();

        assert!((dot.point.x - 960.0).abs() < 1e-6, "{config:?}: {:?}", dot.point);
        assert!((dot.point.y - 540.0).abs() < 1e-6);
        assert_eq!(dot.source, DotSource::Both);
        assert!(pixel_surface().is_within_bounds(&dot.point));
    }
}

#[test]
fn test_sentinel_centres_give_no_eye_model() {
    let sample = GazeSample::from_sentinel([0.0, 0.0, -1.0], [0.0, 0.0, -1.0], SENTINEL, SENTINEL);
    assert!(!sample.has_eye_model());

    let result = pixel_estimator(EstimatorConfig::default()).estimate(&sample);
    assert_eq!(result, Err(EstimateFailure::NoEyeModel));
    assert_eq!(EstimateFailure::NoEyeModel.code(), "NO_EYE_MODEL");
}

#[test]
fn test_one_missing_eye_is_no_eye_model_even_with_fallback() {
    let good = eye([100.0, 0.0, 500.0], [-0.02, 0.0, -1.0]);
    for config in [EstimatorConfig::default(), fallback_config()] {
        let estimator = pixel_estimator(config);
        assert_eq!(
            estimator.estimate(&GazeSample::new(Some(good), None)),
            Err(EstimateFailure::NoEyeModel)
        );
        assert_eq!(
            estimator.estimate(&GazeSample::new(None, Some(good))),
            Err(EstimateFailure::NoEyeModel)
        );
    }
}

#[test]
fn test_rays_pointing_away_are_behind_origin() {
    let sample = GazeSample::new(
        Some(eye([100.0, 0.0, 500.0], [0.0, 0.0, 1.0])),
        Some(eye([-100.0, 0.0, 500.0], [0.0, 0.0, 1.0])),
    );
    for config in [EstimatorConfig::default(), closest_approach_config(), fallback_config()] {
        assert_eq!(
            pixel_estimator(config).estimate(&sample),
            Err(EstimateFailure::BehindOrigin)
        );
    }
}

#[test]
fn test_rays_parallel_to_display_are_degenerate() {
    let sample = GazeSample::new(
        Some(eye([100.0, 0.0, 500.0], [1.0, 0.0, 0.0])),
        Some(eye([-100.0, 0.0, 500.0], [1.0, 0.0, 0.0])),
    );
    for config in [EstimatorConfig::default(), closest_approach_config(), fallback_config()] {
        assert_eq!(
            pixel_estimator(config).estimate(&sample),
            Err(EstimateFailure::DegenerateRays)
        );
    }
}

#[test]
fn test_zero_gaze_is_degenerate() {
    let sample = GazeSample::new(
        Some(eye([100.0, 0.0, 500.0], [0.0, 0.0, 0.0])),
        Some(eye([-100.0, 0.0, 500.0], [0.0, 0.0, 0.0])),
    );
    assert_eq!(
        pixel_estimator(EstimatorConfig::default()).estimate(&sample),
        Err(EstimateFailure::DegenerateRays)
    );
}

#[test]
fn test_convergence_outside_display_is_out_of_bounds() {
    let sample = GazeSample::new(
        Some(eye_looking_at([100.0, 0.0, 500.0], (3000.0, 540.0))),
        Some(eye_looking_at([-100.0, 0.0, 500.0], (3000.0, 540.0))),
    );
    for config in [EstimatorConfig::default(), closest_approach_config()] {
        assert_eq!(
            pixel_estimator(config).estimate(&sample),
            Err(EstimateFailure::OutOfBounds)
        );
    }

    let above = GazeSample::new(
        Some(eye_looking_at([100.0, 0.0, 500.0], (960.0, -20.0))),
        Some(eye_looking_at([-100.0, 0.0, 500.0], (960.0, -20.0))),
    );
    assert_eq!(
        pixel_estimator(EstimatorConfig::default()).estimate(&above),
        Err(EstimateFailure::OutOfBounds)
    );
}

#[test]
fn test_display_corners_are_inside() {
    let estimator = pixel_estimator(EstimatorConfig::default());
    for corner in [(0.0, 0.0), (1920.0, 0.0), (0.0, 1080.0), (1920.0, 1080.0)] {
        let sample = GazeSample::new(
            Some(eye_looking_at([100.0, 0.0, 500.0], corner)),
            Some(eye_looking_at([-100.0, 0.0, 500.0], corner)),
        );
        let dot = estimator.estimate(&sample).unwrap();
        assert!((dot.point - Point2::new(corner.0, corner.1)).norm() < 1e-6);
    }
}

#[test]
fn test_single_ray_policy() {
    let sample = GazeSample::new(
        Some(eye_looking_at([100.0, 0.0, 500.0], (400.0, 300.0))),
        Some(eye([-100.0, 0.0, 500.0], [0.0, 0.0, 1.0])),
    );

    let strict = pixel_estimator(EstimatorConfig::default()).estimate(&sample);
    assert_eq!(strict, Err(EstimateFailure::BehindOrigin));

    let dot = pixel_estimator(fallback_config()).estimate(&sample).unwrap();
    assert_eq!(dot.source, DotSource::LeftOnly);
    assert!(dot.is_degraded());
    assert!((dot.point - Point2::new(400.0, 300.0)).norm() < 1e-6);

    let mirrored = GazeSample::new(sample.right, sample.left);
    let dot = pixel_estimator(fallback_config()).estimate(&mirrored).unwrap();
    assert_eq!(dot.source, DotSource::RightOnly);
}

#[test]
fn test_single_parallel_ray_is_degenerate_when_strict() {
    let sample = GazeSample::new(
        Some(eye_looking_at([100.0, 0.0, 500.0], (960.0, 540.0))),
        Some(eye([-100.0, 0.0, 500.0], [0.0, 1.0, 0.0])),
    );
    assert_eq!(
        pixel_estimator(EstimatorConfig::default()).estimate(&sample),
        Err(EstimateFailure::DegenerateRays)
    );
}

#[test]
fn test_closest_approach_diverging_rays_behind_origin() {
    // Both rays reach the display but the lines cross behind the eyes
    let sample = GazeSample::new(
        Some(eye([100.0, 0.0, 500.0], [0.02, 0.0, -1.0])),
        Some(eye([-100.0, 0.0, 500.0], [-0.02, 0.0, -1.0])),
    );

    let averaged = pixel_estimator(EstimatorConfig::default()).estimate(&sample).unwrap();
    assert!((averaged.point.x - 960.0).abs() < 1e-6);

    assert_eq!(
        pixel_estimator(closest_approach_config()).estimate(&sample),
        Err(EstimateFailure::BehindOrigin)
    );
}

#[test]
fn test_closest_approach_parallel_eyes_degenerate() {
    let sample = GazeSample::new(
        Some(eye([100.0, 0.0, 500.0], [0.0, 0.0, -1.0])),
        Some(eye([-100.0, 0.0, 500.0], [0.0, 0.0, -1.0])),
    );

    let averaged = pixel_estimator(EstimatorConfig::default()).estimate(&sample).unwrap();
    assert!((averaged.point - Point2::new(960.0, 540.0)).norm() < 1e-6);

    assert_eq!(
        pixel_estimator(closest_approach_config()).estimate(&sample),
        Err(EstimateFailure::DegenerateRays)
    );
}

#[test]
fn test_closest_approach_uses_vergence_point() {
    // Skew rays: vergence midpoint sits between them, projected from the
    // cyclopean eye it lands between the two plane hits
    let sample = GazeSample::new(
        Some(eye_looking_at([100.0, 10.0, 500.0], (900.0, 500.0))),
        Some(eye_looking_at([-100.0, -10.0, 500.0], (1000.0, 560.0))),
    );
    let dot = pixel_estimator(closest_approach_config()).estimate(&sample).unwrap();
    assert!(dot.point.x > 900.0 && dot.point.x < 1000.0, "{:?}", dot.point);
    assert!(dot.point.y > 500.0 && dot.point.y < 560.0, "{:?}", dot.point);
    assert!(dot.display_local.z.abs() < 1e-9);
}

#[test]
fn test_estimator_is_shareable() {
    fn assert_send_sync<T: Send + Sync>() {}
    assert_send_sync::<gaze_dot_estimation::estimator::DotEstimator>();

    let estimator = pixel_estimator(EstimatorConfig::default());
    let sample = converging_sample();
    let (est, smp) = (&estimator, &sample);
    let results: Vec<_> = std::thread::scope(|s| {
        let handles: Vec<_> = (0..4).map(move |_| s.spawn(move || est.estimate(smp))).collect();
        handles.into_iter().map(|h| h.join().unwrap()).collect()
    });
    assert!(results.windows(2).all(|w| w[0] == w[1]));
}

fn eye_center() -> impl Strategy<Value = (f64, f64)> {
    (-30.0..30.0f64, 300.0..800.0f64)
}

fn display_pixel() -> impl Strategy<Value = (f64, f64)> {
    (1.0..1919.0f64, 1.0..1079.0f64)
}

proptest! {
    #[test]
    fn prop_valid_dual_rays_land_inside(
        (ly, lz) in eye_center(),
        (ry, rz) in eye_center(),
        lx in 20.0..150.0f64,
        rx in -150.0..-20.0f64,
        left_target in display_pixel(),
        right_target in display_pixel(),
    ) {
        let sample = GazeSample::new(
            Some(eye_looking_at([lx, ly, lz], left_target)),
            Some(eye_looking_at([rx, ry, rz], right_target)),
        );
        let estimator = pixel_estimator(EstimatorConfig::default());
        let dot = estimator.estimate(&sample).unwrap();
        prop_assert!(pixel_surface().is_within_bounds(&dot.point));
        prop_assert_eq!(dot.source, DotSource::Both);
    }

    #[test]
    fn prop_shared_target_same_for_both_fusions(
        (ly, lz) in eye_center(),
        (ry, rz) in eye_center(),
        lx in 20.0..150.0f64,
        rx in -150.0..-20.0f64,
        target in (10.0..1910.0f64, 10.0..1070.0f64),
    ) {
        let sample = GazeSample::new(
            Some(eye_looking_at([lx, ly, lz], target)),
            Some(eye_looking_at([rx, ry, rz], target)),
        );
        let averaged = pixel_estimator(EstimatorConfig::default()).estimate(&sample).unwrap();
        let verged = pixel_estimator(closest_approach_config()).estimate(&sample).unwrap();
        prop_assert!((averaged.point - Point2::new(target.0, target.1)).norm() < 1e-6);
        prop_assert!((verged.point - Point2::new(target.0, target.1)).norm() < 1e-6);
    }

    #[test]
    fn prop_sentinel_always_no_eye_model(
        gaze0 in prop::array::uniform3(-1.0..1.0f64),
        gaze1 in prop::array::uniform3(-1.0..1.0f64),
        which in 0..3u8,
    ) {
        let real = [50.0, 0.0, 500.0];
        let (c0, c1) = match which {
            0 => (SENTINEL, real),
            1 => (real, SENTINEL),
            _ => (SENTINEL, SENTINEL),
        };
        let sample = GazeSample::from_sentinel(gaze0, gaze1, c0, c1);
        for config in [EstimatorConfig::default(), fallback_config(), closest_approach_config()] {
            prop_assert_eq!(pixel_estimator(config).estimate(&sample), Err(EstimateFailure::NoEyeModel));
        }
    }

    #[test]
    fn prop_estimate_is_idempotent(
        l in prop::array::uniform3(-200.0..200.0f64),
        r in prop::array::uniform3(-200.0..200.0f64),
        dl in prop::array::uniform3(-1.0..1.0f64),
        dr in prop::array::uniform3(-1.0..1.0f64),
        closest in any::<bool>(),
    ) {
        let config = if closest { closest_approach_config() } else { fallback_config() };
        let estimator = pixel_estimator(config);
        let sample = GazeSample::new(Some(eye(l, dl)), Some(eye(r, dr)));

        let first = estimator.estimate(&sample);
        let second = estimator.estimate(&sample);
        match (first, second) {
            (Ok(a), Ok(b)) => {
                prop_assert_eq!(a.point.x.to_bits(), b.point.x.to_bits());
                prop_assert_eq!(a.point.y.to_bits(), b.point.y.to_bits());
                prop_assert_eq!(a.source, b.source);
            }
            (Err(a), Err(b)) => prop_assert_eq!(a, b),
            (a, b) => prop_assert!(false, "results differ: {:?} vs {:?}", a, b),
        }
    }

    #[test]
    fn prop_successful_dots_are_in_bounds(
        l in prop::array::uniform3(-500.0..500.0f64),
        r in prop::array::uniform3(-500.0..500.0f64),
        dl in prop::array::uniform3(-1.0..1.0f64),
        dr in prop::array::uniform3(-1.0..1.0f64),
    ) {
        let sample = GazeSample::new(Some(eye(l, dl)), Some(eye(r, dr)));
        for config in [EstimatorConfig::default(), fallback_config(), closest_approach_config()] {
            if let Ok(dot) = pixel_estimator(config).estimate(&sample) {
                prop_assert!(pixel_surface().is_within_bounds(&dot.point));
            }
        }
    }
}
