//! Edge case tests for geometry, the estimator and pixel conversion


use gaze_dot_estimation::{
    estimator::{EstimateFailure, EstimatorConfig, EyeRay, FusionMode, GazeSample},
    geometry::{closest_approach, intersect_ray_plane, intersect_ray_sphere, Plane, Ray, RayMiss},
    utils::safe_cast::{f64_to_i32_clamp, to_pixel},
};
use nalgebra::{Point2, Point3, Vector3};
use test_helpers::{eye, pixel_estimator};

#[test]
fn test_non_finite_gaze_is_degenerate() {
    let estimator = pixel_estimator(EstimatorConfig::default());
    for bad in [f64::NAN, f64::INFINITY, f64::NEG_INFINITY] {
        let sample = GazeSample::new(
            Some(eye([100.0, 0.0, 500.0], [bad, 0.0, -1.0])),
            Some(eye([-100.0, 0.0, 500.0], [0.0, bad, -1.0])),
        );
        assert_eq!(estimator.estimate(&sample), Err(EstimateFailure::DegenerateRays));
    }
}

#[test]
fn test_non_finite_centre_never_produces_dot() {
    let estimator = pixel_estimator(EstimatorConfig::default());
    for bad in [f64::NAN, f64::INFINITY] {
        let sample = GazeSample::new(
            Some(EyeRay::new(Point3::new(bad, 0.0, 500.0), Vector3::new(0.0, 0.0, -1.0))),
            Some(EyeRay::new(Point3::new(0.0, 0.0, bad), Vector3::new(0.0, 0.0, -1.0))),
        );
        assert!(estimator.estimate(&sample).is_err());
    }

    // The sentinel path filters them before estimation
    assert!(EyeRay::from_sentinel([f64::INFINITY, 0.0, 500.0], [0.0, 0.0, -1.0]).is_none());
}

#[test]
fn test_eye_on_display_plane() {
    // Origin on the plane: t = 0 is a valid hit at the origin itself
    let estimator = pixel_estimator(EstimatorConfig::default());
    let sample = GazeSample::new(
        Some(eye([0.0, 0.0, 0.0], [0.0, 0.0, -1.0])),
        Some(eye([0.0, 0.0, 0.0], [0.0, 0.0, -1.0])),
    );
    let dot = estimator.estimate(&sample).unwrap();
    assert!((dot.point - Point2::new(960.0, 540.0)).norm() < 1e-9);
}

#[test]
fn test_tiny_and_huge_gaze_scales_agree() {
    let closest = EstimatorConfig {
        fusion: FusionMode::ClosestApproach,
        ..EstimatorConfig::default()
    };
    for config in [EstimatorConfig::default(), closest] {
        let estimator = pixel_estimator(config);
        let at_scale = |s: f64| {
            let sample = GazeSample::new(
                Some(eye([100.0, 0.0, 500.0], [-0.02 * s, 0.0, -s])),
                Some(eye([-100.0, 0.0, 500.0], [0.02 * s, 0.0, -s])),
            );
            estimator.estimate(&sample).unwrap().point
        };
        let reference = at_scale(1.0);
        for s in [1e-6, 1e-3, 1e-2, 1e6] {
            assert!((at_scale(s) - reference).norm() < 1e-6, "{config:?} at scale {s}");
        }
    }
}

#[test]
fn test_grazing_ray_tolerance() {
    let plane = Plane::xy();
    // cos to the normal is ~1e-9: below the default tolerance
    let grazing = Ray::new(Point3::new(0.0, 0.0, 1.0), Vector3::new(1.0, 0.0, -1e-9));
    assert_eq!(intersect_ray_plane(&grazing, &plane, 1e-6), Err(RayMiss::Parallel));
    // With zero tolerance the hit is far away but valid
    let hit = intersect_ray_plane(&grazing, &plane, 0.0).unwrap();
    assert!(hit.t > 1e8);
}

#[test]
fn test_degenerate_plane_normal() {
    let plane = Plane::new(Point3::origin(), Vector3::zeros());
    let ray = Ray::new(Point3::new(0.0, 0.0, 1.0), Vector3::new(0.0, 0.0, -1.0));
    assert_eq!(intersect_ray_plane(&ray, &plane, 1e-6), Err(RayMiss::Parallel));
}

#[test]
fn test_closest_approach_identical_rays() {
    let ray = Ray::new(Point3::new(1.0, 2.0, 3.0), Vector3::new(0.0, 0.0, -1.0));
    assert!(closest_approach(&ray, &ray, 1e-6).is_none());
    let opposite = Ray::new(Point3::new(5.0, 2.0, 3.0), Vector3::new(0.0, 0.0, 1.0));
    assert!(closest_approach(&ray, &opposite, 1e-6).is_none());
}

#[test]
fn test_sphere_from_inside() {
    // Origin inside the sphere: the exit point is returned
    let ray = Ray::new(Point3::origin(), Vector3::new(0.0, 0.0, 1.0));
    let hit = intersect_ray_sphere(&ray, &Point3::origin(), 12.0).unwrap();
    assert!((hit.t - 12.0).abs() < 1e-9);
}

#[test]
fn test_pixel_conversion_extremes() {
    assert!(to_pixel(&Point2::new(f64::MAX, 0.0)).is_err());
    assert!(to_pixel(&Point2::new(0.0, f64::NEG_INFINITY)).is_err());
    assert_eq!(f64_to_i32_clamp(f64::INFINITY, 0, 10), 0);
    assert_eq!(f64_to_i32_clamp(1e300, 0, 10), 10);
}
