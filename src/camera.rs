//! Pinhole camera intrinsics.

use crate::{
    constants::{DEFAULT_FOCAL_LENGTH, REFERENCE_HEIGHT, REFERENCE_WIDTH},
    utils::safe_cast::usize_to_i32,
    Result,
};
use nalgebra::{Point2, Point3, Vector3};
use opencv::{core::Mat, prelude::*};
use serde::{Deserialize, Serialize};

/// Focal lengths and optical centre in pixels. Zero means "unknown".
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct CameraIntrinsics {
    /// Focal length along x
    pub fx: f64,
    /// Focal length along y
    pub fy: f64,
    /// Optical centre x
    pub cx: f64,
    /// Optical centre y
    pub cy: f64,
}

impl CameraIntrinsics {
    /// Create intrinsics
    #[must_use]
    pub const fn new(fx: f64, fy: f64, cx: f64, cy: f64) -> Self {
        Self { fx, fy, cx, cy }
    }

    /// True when every parameter is set
    #[must_use]
    pub fn is_complete(&self) -> bool {
        self.fx != 0.0 && self.fy != 0.0 && self.cx != 0.0 && self.cy != 0.0
    }

    /// Fill unknown values from the frame size.
    ///
    /// A missing centre becomes the image centre. A missing focal length is
    /// guessed from a 500 px lens at 640x480, scaled to the frame and averaged
    /// so both axes share one value.
    #[must_use]
    pub fn resolve(&self, frame_width: i32, frame_height: i32) -> Self {
        let width = f64::from(frame_width);
        let height = f64::from(frame_height);
        let mut resolved = *self;

        if self.cx == 0.0 || self.cy == 0.0 {
            resolved.cx = width / 2.0;
            resolved.cy = height / 2.0;
        }

        if self.fx == 0.0 || self.fy == 0.0 {
            let fx = DEFAULT_FOCAL_LENGTH * (width / REFERENCE_WIDTH);
            let fy = DEFAULT_FOCAL_LENGTH * (height / REFERENCE_HEIGHT);
            let focal = (fx + fy) / 2.0;
            resolved.fx = focal;
            resolved.fy = focal;
        }

        if !self.is_complete() {
            log::info!(
                "Camera intrinsics resolved to fx={:.1} fy={:.1} cx={:.1} cy={:.1}",
                resolved.fx,
                resolved.fy,
                resolved.cx,
                resolved.cy
            );
        }

        resolved
    }

    /// Direction of the camera ray through a pixel (not normalised, `z = 1`)
    #[must_use]
    pub fn back_project(&self, pixel: &Point2<f64>) -> Vector3<f64> {
        Vector3::new((pixel.x - self.cx) / self.fx, (pixel.y - self.cy) / self.fy, 1.0)
    }

    /// Project a camera-space point to pixels. `None` at or behind the camera.
    #[must_use]
    pub fn project(&self, point: &Point3<f64>) -> Option<Point2<f64>> {
        if point.z <= 0.0 {
            return None;
        }
        Some(Point2::new(
            self.fx * point.x / point.z + self.cx,
            self.fy * point.y / point.z + self.cy,
        ))
    }

    /// 3x3 camera matrix for `OpenCV`
    ///
    /// # Errors
    ///
    /// Returns an error if the matrix cannot be allocated.
    pub fn camera_matrix(&self) -> Result<Mat> {
        let data: [f64; 9] = [self.fx, 0.0, self.cx, 0.0, self.fy, self.cy, 0.0, 0.0, 1.0];
        let mut matrix = Mat::zeros(3, 3, opencv::core::CV_64F)?.to_mat()?;
        for (idx, &value) in data.iter().enumerate() {
            *matrix.at_2d_mut::<f64>(usize_to_i32(idx / 3)?, usize_to_i32(idx % 3)?)? = value;
        }
        Ok(matrix)
    }
}
