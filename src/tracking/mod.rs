//! Face and gaze tracking: turns camera frames into gaze samples.
//!
//! [`GazeTracker`] is the seam between the frame loop and whatever produces
//! eye rays. [`LandmarkGazeTracker`] is the bundled implementation:
//!
//! 1. Haar cascade face detection ([`face_detection`])
//! 2. 68-point landmarks from an `ONNX` model ([`mark_detection`])
//! 3. Head pose by `PnP` against a 3D face model ([`head_pose`])
//! 4. Eyeball spheres and pupil rays ([`eye_model`])

pub mod eye_model;
pub mod face_detection;
pub mod head_pose;
pub mod mark_detection;

use crate::{
    camera::CameraIntrinsics,
    estimator::GazeSample,
    utils::{is_inside_frame, refine_box},
    Result,
};
use eye_model::EyeModel;
use face_detection::{select_face, FaceDetector};
use head_pose::{reprojection_error, HeadPose, HeadPoseEstimator};
use mark_detection::MarkDetector;
use opencv::{
    core::{Mat, Point2f, Rect},
    imgproc,
    prelude::*,
};
use std::path::Path;

/// Margin added around detected faces before landmark detection
const FACE_BOX_SHIFT: f64 = 0.1;
/// Smallest face the cascade reports, pixels
const MIN_FACE_SIZE: i32 = 60;
/// Mean reprojection error, as a fraction of the face width, that counts as lost
pub const FIT_ERROR_TOLERANCE: f64 = 0.1;

/// Everything known about the face in one frame
#[derive(Debug, Clone, PartialEq)]
pub struct TrackedFace {
    /// A face was found and landmarks fitted
    pub detection_success: bool,
    /// Tracking quality in `[-1, 1]`, lower is more certain
    pub certainty: f64,
    /// Face region used for landmark detection
    pub face_box: Option<Rect>,
    /// 68 landmarks in frame pixels (empty when lost)
    pub landmarks: Vec<Point2f>,
    /// Head pose in camera space
    pub head_pose: Option<HeadPose>,
    /// Eye rays for the dot estimator
    pub gaze: GazeSample,
}

impl TrackedFace {
    /// No face in this frame
    #[must_use]
    pub fn lost() -> Self {
        Self {
            detection_success: false,
            certainty: 1.0,
            face_box: None,
            landmarks: Vec::new(),
            head_pose: None,
            gaze: GazeSample::empty(),
        }
    }
}

/// Source of per-frame gaze samples
pub trait GazeTracker {
    /// Track the face in one BGR frame
    ///
    /// # Errors
    ///
    /// Returns an error only for failures that are not a per-frame miss
    /// (an `OpenCV` or inference failure). A frame without a usable face is
    /// reported through [`TrackedFace::lost`].
    fn track(&mut self, frame: &Mat, intrinsics: &CameraIntrinsics) -> Result<TrackedFace>;

    /// Forget tracking history so the next frame starts from detection
    fn reset(&mut self);
}

/// Certainty from the head model fit.
///
/// The mean reprojection error is measured against the face width. A perfect
/// fit gives -1, an error of [`FIT_ERROR_TOLERANCE`] of the face width or more
/// gives 1. No fit at all is 1.
#[must_use]
pub fn fit_certainty(mean_error: Option<f64>, face_box: &Rect) -> f64 {
    let Some(error) = mean_error.filter(|e| e.is_finite()) else {
        return 1.0;
    };
    if face_box.width <= 0 {
        return 1.0;
    }
    let relative = error / f64::from(face_box.width);
    (2.0 * relative / FIT_ERROR_TOLERANCE - 1.0).clamp(-1.0, 1.0)
}

/// Landmark and eyeball-model based tracker
pub struct LandmarkGazeTracker {
    face_detector: FaceDetector,
    mark_detector: MarkDetector,
    pose_estimator: HeadPoseEstimator,
    eye_model: EyeModel,
    previous_face: Option<Rect>,
}

impl LandmarkGazeTracker {
    /// Load the cascade, landmark model and 3D face model
    ///
    /// # Errors
    ///
    /// Returns an error if any model cannot be loaded.
    pub fn new<P: AsRef<Path>>(face_cascade: P, face_landmarks: P, face_model_3d: P) -> Result<Self> {
        let face_detector = FaceDetector::new(face_cascade, MIN_FACE_SIZE)?;
        let mark_detector = MarkDetector::new(face_landmarks)?;
        let pose_estimator = HeadPoseEstimator::new(face_model_3d)?;
        let eye_model = EyeModel::with_default_radius(pose_estimator.model_points())?;

        Ok(Self {
            face_detector,
            mark_detector,
            pose_estimator,
            eye_model,
            previous_face: None,
        })
    }

    fn lose_track(&mut self) -> TrackedFace {
        self.previous_face = None;
        self.pose_estimator.reset();
        TrackedFace::lost()
    }
}

impl GazeTracker for LandmarkGazeTracker {
    fn track(&mut self, frame: &Mat, intrinsics: &CameraIntrinsics) -> Result<TrackedFace> {
        let mut gray = Mat::default();
        imgproc::cvt_color(frame, &mut gray, imgproc::COLOR_BGR2GRAY, 0)?;

        let faces = self.face_detector.detect(&gray)?;
        let Some(face) = select_face(&faces, self.previous_face) else {
            log::debug!("No face detected");
            return Ok(self.lose_track());
        };

        let face_box = refine_box(face, frame.cols(), frame.rows(), FACE_BOX_SHIFT);
        if !is_inside_frame(&face_box, frame.cols(), frame.rows()) {
            return Ok(self.lose_track());
        }
        self.previous_face = Some(face);

        let landmarks = self.mark_detector.detect(frame, face_box)?;

        let head_pose = match self.pose_estimator.estimate(&landmarks, intrinsics) {
            Ok(pose) => pose,
            Err(e) => {
                log::debug!("Head pose failed: {e}");
                self.pose_estimator.reset();
                return Ok(TrackedFace {
                    detection_success: true,
                    certainty: fit_certainty(None, &face_box),
                    face_box: Some(face_box),
                    landmarks,
                    head_pose: None,
                    gaze: GazeSample::empty(),
                });
            }
        };

        let error = reprojection_error(self.pose_estimator.model_points(), &landmarks, &head_pose, intrinsics);
        let certainty = fit_certainty(error, &face_box);
        log::debug!("Head model fit error {error:?} px, certainty {certainty:.2}");

        let gaze = self.eye_model.estimate(&gray, &landmarks, &head_pose, intrinsics)?;

        Ok(TrackedFace {
            detection_success: true,
            certainty,
            face_box: Some(face_box),
            landmarks,
            head_pose: Some(head_pose),
            gaze,
        })
    }

    fn reset(&mut self) {
        log::info!("Tracker reset");
        self.previous_face = None;
        self.pose_estimator.reset();
    }
}
