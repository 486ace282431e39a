//! Head pose recovery with `PnP` against a 68-point 3D face model.

use crate::{
    camera::CameraIntrinsics,
    constants::{MODEL_POINTS_TOTAL_VALUES, NUM_FACIAL_LANDMARKS},
    utils::safe_cast::usize_to_i32,
    Error, Result,
};
use nalgebra::{Isometry3, Matrix3, Point2, Point3, Rotation3, Translation3, UnitQuaternion, Vector3};
use opencv::{
    calib3d,
    core::{Mat, Point2f},
    prelude::*,
};
use std::fs;
use std::path::Path;

/// Rigid head pose: model coordinates to camera coordinates
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct HeadPose {
    /// Model-to-camera rotation
    pub rotation: Rotation3<f64>,
    /// Model origin in camera space
    pub translation: Vector3<f64>,
}

impl HeadPose {
    /// Pose as an isometry
    #[must_use]
    pub fn isometry(&self) -> Isometry3<f64> {
        Isometry3::from_parts(
            Translation3::from(self.translation),
            UnitQuaternion::from_rotation_matrix(&self.rotation),
        )
    }

    /// Map a model point into camera space
    #[must_use]
    pub fn transform_point(&self, point: &Point3<f64>) -> Point3<f64> {
        self.rotation * point + self.translation
    }

    /// Pitch, yaw and roll in degrees
    #[must_use]
    pub fn euler_degrees(&self) -> (f64, f64, f64) {
        let m = self.rotation.matrix();
        let pitch = (-m[(1, 2)]).clamp(-1.0, 1.0).asin();
        let yaw = m[(0, 2)].atan2(m[(2, 2)]);
        let roll = m[(1, 0)].atan2(m[(1, 1)]);
        (pitch.to_degrees(), yaw.to_degrees(), roll.to_degrees())
    }
}

/// Mean distance in pixels between the landmarks and the face model projected
/// with `pose`.
///
/// `None` when the counts differ, there are no landmarks, or a model point
/// lands behind the camera.
#[must_use]
#[allow(clippy::cast_precision_loss)] // At most 68 landmarks
pub fn reprojection_error(
    model_points: &[Point3<f64>],
    landmarks: &[Point2f],
    pose: &HeadPose,
    intrinsics: &CameraIntrinsics,
) -> Option<f64> {
    if landmarks.is_empty() || landmarks.len() != model_points.len() {
        return None;
    }

    let mut total = 0.0;
    for (model, mark) in model_points.iter().zip(landmarks) {
        let projected = intrinsics.project(&pose.transform_point(model))?;
        let observed = Point2::new(f64::from(mark.x), f64::from(mark.y));
        total += (projected - observed).norm();
    }
    Some(total / landmarks.len() as f64)
}

/// `PnP` head pose estimator
pub struct HeadPoseEstimator {
    model_points: Vec<Point3<f64>>,
    object_points: Mat,
    dist_coeffs: Mat,
    previous: Option<(Mat, Mat)>,
}

impl HeadPoseEstimator {
    /// Load the 3D face model (204 numbers, one per line, x y z per point)
    ///
    /// # Errors
    ///
    /// Returns an error if:
    /// - The model file cannot be read
    /// - The model file has the wrong number of values
    pub fn new<P: AsRef<Path>>(model_path: P) -> Result<Self> {
        log::info!(
            "Initializing HeadPoseEstimator with model: {}",
            model_path.as_ref().display()
        );
        let content = fs::read_to_string(model_path)?;
        Self::from_model_points(parse_model_points(&content)?)
    }

    /// Build from model points already in memory
    ///
    /// # Errors
    ///
    /// Returns an error if there are not exactly 68 points or `OpenCV` fails.
    pub fn from_model_points(model_points: Vec<Point3<f64>>) -> Result<Self> {
        if model_points.len() != NUM_FACIAL_LANDMARKS {
            return Err(Error::ModelValidationError(format!(
                "Expected {} model points, got {}",
                NUM_FACIAL_LANDMARKS,
                model_points.len()
            )));
        }

        let mut object_points =
            Mat::zeros(usize_to_i32(model_points.len())?, 3, opencv::core::CV_64F)?.to_mat()?;
        for (i, point) in model_points.iter().enumerate() {
            let row = usize_to_i32(i)?;
            *object_points.at_2d_mut::<f64>(row, 0)? = point.x;
            *object_points.at_2d_mut::<f64>(row, 1)? = point.y;
            *object_points.at_2d_mut::<f64>(row, 2)? = point.z;
        }

        // Assume no lens distortion
        let dist_coeffs = Mat::zeros(4, 1, opencv::core::CV_64F)?.to_mat()?;

        Ok(Self {
            model_points,
            object_points,
            dist_coeffs,
            previous: None,
        })
    }

    /// The 3D model
    #[must_use]
    pub fn model_points(&self) -> &[Point3<f64>] {
        &self.model_points
    }

    /// Forget the previous pose so the next solve starts from scratch
    pub fn reset(&mut self) {
        self.previous = None;
    }

    /// Solve for the head pose from 68 image landmarks.
    ///
    /// The previous solution seeds the iterative solver while tracking.
    ///
    /// # Errors
    ///
    /// Returns an error if:
    /// - The number of landmarks is not exactly 68
    /// - The PnP solver fails
    pub fn estimate(&mut self, landmarks: &[Point2f], intrinsics: &CameraIntrinsics) -> Result<HeadPose> {
        if landmarks.len() != NUM_FACIAL_LANDMARKS {
            return Err(Error::InvalidInput(format!(
                "Expected {} landmarks, got {}",
                NUM_FACIAL_LANDMARKS,
                landmarks.len()
            )));
        }

        let mut image_points = Mat::zeros(usize_to_i32(landmarks.len())?, 2, opencv::core::CV_64F)?.to_mat()?;
        for (i, point) in landmarks.iter().enumerate() {
            let row = usize_to_i32(i)?;
            *image_points.at_2d_mut::<f64>(row, 0)? = f64::from(point.x);
            *image_points.at_2d_mut::<f64>(row, 1)? = f64::from(point.y);
        }

        let camera_matrix = intrinsics.camera_matrix()?;
        let (mut rvec, mut tvec, use_guess) = match self.previous.take() {
            Some((r, t)) => (r, t, true),
            None => (Mat::default(), Mat::default(), false),
        };

        let solved = calib3d::solve_pnp(
            &self.object_points,
            &image_points,
            &camera_matrix,
            &self.dist_coeffs,
            &mut rvec,
            &mut tvec,
            use_guess,
            calib3d::SOLVEPNP_ITERATIVE,
        )?;
        if !solved {
            return Err(Error::TrackingError("PnP solver did not converge".to_string()));
        }

        let mut rotation_mat = Mat::default();
        calib3d::rodrigues(&rvec, &mut rotation_mat, &mut Mat::default())?;

        let mut m = Matrix3::zeros();
        for row in 0..3 {
            for col in 0..3 {
                m[(row, col)] = *rotation_mat.at_2d::<f64>(usize_to_i32(row)?, usize_to_i32(col)?)?;
            }
        }
        let translation = Vector3::new(
            *tvec.at_2d::<f64>(0, 0)?,
            *tvec.at_2d::<f64>(1, 0)?,
            *tvec.at_2d::<f64>(2, 0)?,
        );

        self.previous = Some((rvec, tvec));

        Ok(HeadPose {
            rotation: Rotation3::from_matrix(&m),
            translation,
        })
    }
}

/// Parse 3D model points: one number per line, malformed lines skipped
///
/// # Errors
///
/// Returns an error unless exactly 204 numbers are found.
pub fn parse_model_points(content: &str) -> Result<Vec<Point3<f64>>> {
    let values: Vec<f64> = content
        .lines()
        .filter_map(|line| line.trim().parse::<f64>().ok())
        .collect();

    if values.len() != MODEL_POINTS_TOTAL_VALUES {
        return Err(Error::ModelValidationError(format!(
            "Expected {} coordinate values ({} points × 3), got {}",
            MODEL_POINTS_TOTAL_VALUES,
            NUM_FACIAL_LANDMARKS,
            values.len()
        )));
    }

    Ok(values
        .chunks_exact(3)
        .map(|xyz| Point3::new(xyz[0], xyz[1], xyz[2]))
        .collect())
}
