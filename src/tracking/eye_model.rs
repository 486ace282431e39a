//! Eyeball model: eyeball centres from the head pose and gaze from the pupil.
//!
//! Each eyeball is a sphere of fixed radius sitting behind the six eye
//! landmarks of the face model. The pupil is found in the image, its camera
//! ray is intersected with the sphere, and the gaze is the direction from the
//! eyeball centre to that surface point.

use crate::{
    camera::CameraIntrinsics,
    constants::{EYEBALL_RADIUS_MM, LEFT_EYE_LANDMARKS, NUM_FACIAL_LANDMARKS, RIGHT_EYE_LANDMARKS},
    estimator::{EyeRay, GazeSample},
    geometry::{intersect_ray_sphere, Ray},
    tracking::head_pose::HeadPose,
    utils::safe_cast::f64_to_i32_clamp,
    Error, Result,
};
use nalgebra::{Point2, Point3, Vector3};
use opencv::{
    core::{self, Mat, Point, Point2f, Rect, Size},
    imgproc,
    prelude::*,
};
use std::ops::Range;

/// Landmark index of the nose tip
const NOSE_TIP: usize = 30;
/// Landmark index of the chin
const CHIN: usize = 8;
/// Padding around the eye landmarks when searching for the pupil, pixels
const EYE_PADDING: i32 = 2;
/// Smallest eye region worth searching
const MIN_EYE_WIDTH: i32 = 4;
const MIN_EYE_HEIGHT: i32 = 3;

/// Eyeball centres in face model coordinates
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct EyeModel {
    left_center: Point3<f64>,
    right_center: Point3<f64>,
    radius: f64,
}

impl EyeModel {
    /// Derive eyeball centres from a 68-point face model.
    ///
    /// "Left" and "right" are the subject's, so the left eye uses landmarks
    /// 42..48.
    ///
    /// # Errors
    ///
    /// Returns an error for a model without 68 points or one so flat that the
    /// face direction cannot be found.
    pub fn from_face_model(model_points: &[Point3<f64>], radius: f64) -> Result<Self> {
        if model_points.len() != NUM_FACIAL_LANDMARKS {
            return Err(Error::ModelValidationError(format!(
                "Eye model needs {} face points, got {}",
                NUM_FACIAL_LANDMARKS,
                model_points.len()
            )));
        }
        if !(radius.is_finite() && radius > 0.0) {
            return Err(Error::ModelValidationError(format!("Invalid eyeball radius {radius}")));
        }

        let left_eye = centroid(&model_points[LEFT_EYE_LANDMARKS]);
        let right_eye = centroid(&model_points[RIGHT_EYE_LANDMARKS]);
        let eyes_mid = nalgebra::center(&left_eye, &right_eye);

        let across = left_eye - right_eye;
        let down = model_points[CHIN] - eyes_mid;
        let mut forward = across
            .cross(&down)
            .try_normalize(crate::constants::EPSILON)
            .ok_or_else(|| Error::ModelValidationError("Face model is degenerate".to_string()))?;
        if forward.dot(&(model_points[NOSE_TIP] - eyes_mid)) < 0.0 {
            forward = -forward;
        }

        Ok(Self {
            left_center: left_eye - forward * radius,
            right_center: right_eye - forward * radius,
            radius,
        })
    }

    /// Default radius variant of [`EyeModel::from_face_model`]
    ///
    /// # Errors
    ///
    /// Same conditions as [`EyeModel::from_face_model`].
    pub fn with_default_radius(model_points: &[Point3<f64>]) -> Result<Self> {
        Self::from_face_model(model_points, EYEBALL_RADIUS_MM)
    }

    /// Eyeball radius
    #[must_use]
    pub const fn radius(&self) -> f64 {
        self.radius
    }

    /// Eyeball centres `(left, right)` in camera space
    #[must_use]
    pub fn eyeball_centers(&self, pose: &HeadPose) -> (Point3<f64>, Point3<f64>) {
        (pose.transform_point(&self.left_center), pose.transform_point(&self.right_center))
    }

    /// Estimate both eyes' gaze for one frame
    ///
    /// # Errors
    ///
    /// Returns an error if an `OpenCV` operation fails. An eye whose pupil
    /// cannot be found is reported as `None` in the sample instead.
    pub fn estimate(
        &self,
        gray: &Mat,
        landmarks: &[Point2f],
        pose: &HeadPose,
        intrinsics: &CameraIntrinsics,
    ) -> Result<GazeSample> {
        if landmarks.len() != NUM_FACIAL_LANDMARKS {
            return Ok(GazeSample::empty());
        }

        let (left_center, right_center) = self.eyeball_centers(pose);
        let left = self.estimate_eye(gray, landmarks, LEFT_EYE_LANDMARKS, &left_center, intrinsics)?;
        let right = self.estimate_eye(gray, landmarks, RIGHT_EYE_LANDMARKS, &right_center, intrinsics)?;
        Ok(GazeSample::new(left, right))
    }

    fn estimate_eye(
        &self,
        gray: &Mat,
        landmarks: &[Point2f],
        range: Range<usize>,
        center: &Point3<f64>,
        intrinsics: &CameraIntrinsics,
    ) -> Result<Option<EyeRay>> {
        let Some(pupil) = locate_pupil(gray, &landmarks[range])? else {
            return Ok(None);
        };
        Ok(gaze_from_pupil(center, self.radius, &pupil, intrinsics))
    }
}

fn centroid(points: &[Point3<f64>]) -> Point3<f64> {
    let sum = points.iter().fold(Vector3::zeros(), |acc, p| acc + p.coords);
    #[allow(clippy::cast_precision_loss)] // Six points
    let n = points.len() as f64;
    Point3::from(sum / n)
}

/// Bounding box of eye landmarks, padded and clipped to the frame.
/// `None` when the region is too small to search.
#[must_use]
pub fn eye_region(eye: &[Point2f], frame_width: i32, frame_height: i32) -> Option<Rect> {
    if eye.is_empty() || frame_width <= 0 || frame_height <= 0 {
        return None;
    }

    let (mut min_x, mut min_y) = (f64::INFINITY, f64::INFINITY);
    let (mut max_x, mut max_y) = (f64::NEG_INFINITY, f64::NEG_INFINITY);
    for p in eye {
        min_x = min_x.min(f64::from(p.x));
        min_y = min_y.min(f64::from(p.y));
        max_x = max_x.max(f64::from(p.x));
        max_y = max_y.max(f64::from(p.y));
    }

    let x0 = f64_to_i32_clamp(min_x.floor(), 0, frame_width) - EYE_PADDING;
    let y0 = f64_to_i32_clamp(min_y.floor(), 0, frame_height) - EYE_PADDING;
    let x1 = f64_to_i32_clamp(max_x.ceil(), 0, frame_width) + EYE_PADDING;
    let y1 = f64_to_i32_clamp(max_y.ceil(), 0, frame_height) + EYE_PADDING;

    let x0 = x0.max(0);
    let y0 = y0.max(0);
    let x1 = x1.min(frame_width);
    let y1 = y1.min(frame_height);

    let width = x1 - x0;
    let height = y1 - y0;
    if width < MIN_EYE_WIDTH || height < MIN_EYE_HEIGHT {
        return None;
    }
    Some(Rect::new(x0, y0, width, height))
}

/// Darkest point of the blurred eye region, in frame pixels
///
/// # Errors
///
/// Returns an error if an `OpenCV` operation fails.
pub fn locate_pupil(gray: &Mat, eye: &[Point2f]) -> Result<Option<Point2<f64>>> {
    let Some(region) = eye_region(eye, gray.cols(), gray.rows()) else {
        return Ok(None);
    };

    let roi = Mat::roi(gray, region)?;
    let eye_image = roi.try_clone()?;

    let mut blurred = Mat::default();
    imgproc::gaussian_blur(&eye_image, &mut blurred, Size::new(5, 5), 0.0, 0.0, core::BORDER_DEFAULT)?;

    let mut min_val = 0.0;
    let mut min_loc = Point::default();
    core::min_max_loc(&blurred, Some(&mut min_val), None, Some(&mut min_loc), None, &Mat::default())?;

    log::trace!("Pupil candidate {:?} intensity {min_val}", min_loc);

    Ok(Some(Point2::new(
        f64::from(region.x + min_loc.x),
        f64::from(region.y + min_loc.y),
    )))
}

/// Gaze of an eye whose pupil is seen at `pupil`: the camera ray through the
/// pupil is intersected with the eyeball sphere. `None` when it misses.
#[must_use]
pub fn gaze_from_pupil(
    center: &Point3<f64>,
    radius: f64,
    pupil: &Point2<f64>,
    intrinsics: &CameraIntrinsics,
) -> Option<EyeRay> {
    let ray = Ray::new(Point3::origin(), intrinsics.back_project(pupil));
    let hit = intersect_ray_sphere(&ray, center, radius)?;
    let gaze = (hit.point - center).try_normalize(crate::constants::EPSILON)?;
    Some(EyeRay::new(*center, gaze))
}
