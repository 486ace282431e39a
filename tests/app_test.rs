//! Frame loop behaviour with a scripted tracker


use gaze_dot_estimation::{
    app::{AppConfig, GazeDotApp, InputSource, RunStats},
    camera::CameraIntrinsics,
    estimator::{EstimateFailure, EstimatorConfig, GazeSample},
    tracking::{GazeTracker, TrackedFace},
    Error, Result,
};
use opencv::{core::Mat, core::Vector, imgcodecs, prelude::*};
use std::collections::VecDeque;
use test_helpers::{converging_sample, create_test_image, pixel_estimator};

/// Replays gaze samples, one per frame
#[derive(Default)]
struct ScriptedTracker {
    samples: VecDeque<GazeSample>,
    resets: usize,
}

impl ScriptedTracker {
    fn new(samples: Vec<GazeSample>) -> Self {
        Self {
            samples: samples.into(),
            resets: 0,
        }
    }
}

impl GazeTracker for ScriptedTracker {
    fn track(&mut self, _frame: &Mat, _intrinsics: &CameraIntrinsics) -> Result<TrackedFace> {
        let Some(gaze) = self.samples.pop_front() else {
            return Ok(TrackedFace::lost());
        };
        Ok(TrackedFace {
            detection_success: gaze.has_eye_model(),
            certainty: -0.8,
            face_box: None,
            landmarks: Vec::new(),
            head_pose: None,
            gaze,
        })
    }

    fn reset(&mut self) {
        self.resets += 1;
    }
}

fn headless(input: InputSource) -> AppConfig {
    AppConfig {
        headless: true,
        ..AppConfig::new(input)
    }
}

#[test]
fn test_process_frame_counts_dots_and_failures() {
    let tracker = ScriptedTracker::new(vec![converging_sample(), GazeSample::empty(), converging_sample()]);
    let mut app = GazeDotApp::new(
        headless(InputSource::Camera(0)),
        tracker,
        pixel_estimator(EstimatorConfig::default()),
    )
    .unwrap();

    let k = CameraIntrinsics::default().resolve(640, 480);
    let mut stats = RunStats::default();
    let mut dots = Vec::new();
    for _ in 0..4 {
        let mut frame = create_test_image(480, 640, opencv::core::CV_8UC3).unwrap();
        dots.push(app.process_frame(&mut frame, &k, &mut stats).unwrap());
    }

    assert!(dots[0].is_some());
    assert!(dots[1].is_none());
    assert!(dots[2].is_some());
    assert!(dots[3].is_none());

    assert_eq!(stats.frames, 4);
    assert_eq!(stats.dots, 2);
    assert_eq!(stats.failures(EstimateFailure::NoEyeModel), 2);
    assert_eq!(stats.total_failures(), 2);
}

#[test]
fn test_still_image_mode() {
    let path = std::env::temp_dir().join(format!("gaze_dot_{}_still.png", std::process::id()));
    let image = create_test_image(120, 160, opencv::core::CV_8UC3).unwrap();
    assert!(imgcodecs::imwrite(path.to_str().unwrap(), &image, &Vector::new()).unwrap());

    let tracker = ScriptedTracker::new(vec![converging_sample()]);
    let mut app = GazeDotApp::new(
        headless(InputSource::Image(path.clone())),
        tracker,
        pixel_estimator(EstimatorConfig::default()),
    )
    .unwrap();
    let stats = app.run().unwrap();
    std::fs::remove_file(&path).ok();

    assert_eq!(stats.len(), 1);
    assert_eq!(stats[0].frames, 1);
    assert_eq!(stats[0].dots, 1);
}

#[test]
fn test_missing_inputs_are_errors() {
    let missing = std::env::temp_dir().join("gaze_dot_missing_input.avi");

    let mut app = GazeDotApp::new(
        headless(InputSource::Files(vec![missing.clone()])),
        ScriptedTracker::default(),
        pixel_estimator(EstimatorConfig::default()),
    )
    .unwrap();
    assert!(matches!(app.run(), Err(Error::VideoError(_))));

    let mut app = GazeDotApp::new(
        headless(InputSource::Image(missing)),
        ScriptedTracker::default(),
        pixel_estimator(EstimatorConfig::default()),
    )
    .unwrap();
    assert!(matches!(app.run(), Err(Error::VideoError(_))));
    assert_eq!(app.tracker().resets, 0);
}

#[test]
#[ignore = "Requires a webcam"]
fn test_camera_source() {
    let mut app = GazeDotApp::new(
        headless(InputSource::Camera(0)),
        ScriptedTracker::new(vec![converging_sample(); 5]),
        pixel_estimator(EstimatorConfig::default()),
    )
    .unwrap();
    let stats = app.run().unwrap();
    assert!(stats[0].frames > 0);
}
