//! Configuration file round trips and validation

use gaze_dot_estimation::{
    config::{Config, EXAMPLE_CONFIG},
    estimator::{FallbackPolicy, FusionMode},
    Error,
};
use std::path::PathBuf;

fn temp_path(name: &str) -> PathBuf {
    std::env::temp_dir().join(format!("gaze_dot_{}_{name}", std::process::id()))
}

#[test]
fn test_config_round_trip() {
    let mut config = Config::default();
    config.estimator.fusion = FusionMode::ClosestApproach;
    config.estimator.fallback = FallbackPolicy::SingleRayFallback;
    config.display.camera_mount.tilt_deg = 7.5;
    config.camera.intrinsics.fx = 912.0;

    let path = temp_path("round_trip.yaml");
    config.to_file(&path).unwrap();
    let loaded = Config::from_file(&path).unwrap();
    std::fs::remove_file(&path).ok();

    assert_eq!(loaded, config);
}

#[test]
fn test_example_config_parses() {
    let path = temp_path("example.yaml");
    std::fs::write(&path, EXAMPLE_CONFIG).unwrap();
    let config = Config::from_file(&path).unwrap();
    std::fs::remove_file(&path).ok();

    config.validate().unwrap();
    let surface = config.display_surface().unwrap();
    assert_eq!(surface.resolution(), (1920, 1080));
    assert_eq!(surface.size(), (310.0, 170.0));
}

#[test]
fn test_missing_file_is_io_error() {
    let result = Config::from_file(temp_path("does_not_exist.yaml"));
    assert!(matches!(result, Err(Error::Io(_))));
}

#[test]
fn test_malformed_yaml_is_config_error() {
    let path = temp_path("malformed.yaml");
    std::fs::write(&path, "display: [this is not a map").unwrap();
    let result = Config::from_file(&path);
    std::fs::remove_file(&path).ok();

    assert!(matches!(result, Err(Error::ConfigError(_))));
}

#[test]
fn test_unknown_fusion_rejected() {
    let path = temp_path("bad_fusion.yaml");
    std::fs::write(&path, "estimator:\n  fusion: median\n").unwrap();
    let result = Config::from_file(&path);
    std::fs::remove_file(&path).ok();

    assert!(result.is_err());
}

#[test]
fn test_validate_rejects_bad_estimator() {
    let mut config = Config::default();
    config.estimator.parallel_epsilon = f64::NAN;
    assert!(matches!(config.validate(), Err(Error::ConfigError(_))));
}

#[test]
fn test_validate_models_reports_missing_files() {
    let mut config = Config::default();
    config.models.face_cascade = temp_path("missing_cascade.xml");
    let err = config.validate_models().unwrap_err();
    assert!(err.to_string().contains("Face cascade"));
}
