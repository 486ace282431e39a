//! Calibrated model of the display the gaze dot is drawn on.
//!
//! The display-local frame has its origin at the top-left corner of the
//! active area, x to the right, y down and z into the screen, so the panel is
//! the plane `z = 0`. Lengths are in whatever unit the tracker reports eyeball
//! centres in (millimetres for the landmark tracker).

use crate::{
    geometry::{Plane, Ray},
    Error, Result,
};
use nalgebra::{Isometry3, Point2, Point3, Translation3, UnitQuaternion, Vector3};
use serde::{Deserialize, Serialize};

/// Where the camera sits relative to the display.
///
/// `position` is the camera centre in display-local coordinates. With all
/// angles zero the camera looks straight out of the screen at the user; the
/// angles rotate it about its own x (tilt), y (pan) and z (roll) axes.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CameraMount {
    /// Camera centre in display-local coordinates
    pub position: [f64; 3],
    /// Rotation about the camera x axis, degrees
    pub tilt_deg: f64,
    /// Rotation about the camera y axis, degrees
    pub pan_deg: f64,
    /// Rotation about the camera optical axis, degrees
    pub roll_deg: f64,
}

impl Default for CameraMount {
    fn default() -> Self {
        // Webcam centred on the top bezel of a 310 mm wide panel
        Self {
            position: [155.0, -10.0, 0.0],
            tilt_deg: 0.0,
            pan_deg: 0.0,
            roll_deg: 0.0,
        }
    }
}

impl CameraMount {
    /// Rigid transform taking camera-space points into display-local space
    #[must_use]
    pub fn camera_to_display(&self) -> Isometry3<f64> {
        // A user-facing camera has x and z flipped relative to the display
        let facing = UnitQuaternion::from_axis_angle(&Vector3::y_axis(), std::f64::consts::PI);
        let mount = UnitQuaternion::from_euler_angles(
            self.tilt_deg.to_radians(),
            self.pan_deg.to_radians(),
            self.roll_deg.to_radians(),
        );
        let [x, y, z] = self.position;
        Isometry3::from_parts(Translation3::new(x, y, z), facing * mount)
    }
}

/// Display surface calibration, fixed for a session
#[derive(Debug, Clone, PartialEq)]
pub struct DisplaySurface {
    camera_to_display: Isometry3<f64>,
    width: f64,
    height: f64,
    resolution: (u32, u32),
}

impl DisplaySurface {
    /// Create a display surface from an explicit camera-to-display transform.
    ///
    /// `size` is the physical extent of the active area in display-local
    /// units, `resolution` the pixel size of the canvas the dot is drawn on.
    ///
    /// # Errors
    ///
    /// Returns an error if the size is not positive and finite or the
    /// resolution has a zero dimension.
    pub fn new(camera_to_display: Isometry3<f64>, size: (f64, f64), resolution: (u32, u32)) -> Result<Self> {
        let (width, height) = size;
        if !(width.is_finite() && height.is_finite() && width > 0.0 && height > 0.0) {
            return Err(Error::CalibrationError(format!(
                "Display size must be positive, got {width} x {height}"
            )));
        }
        if resolution.0 == 0 || resolution.1 == 0 {
            return Err(Error::CalibrationError(format!(
                "Display resolution must be non-zero, got {}x{}",
                resolution.0, resolution.1
            )));
        }
        if !camera_to_display.translation.vector.iter().all(|v| v.is_finite()) {
            return Err(Error::CalibrationError(
                "Camera position must be finite".to_string(),
            ));
        }

        log::debug!(
            "Display surface {width}x{height} units, {}x{} px",
            resolution.0,
            resolution.1
        );

        Ok(Self {
            camera_to_display,
            width,
            height,
            resolution,
        })
    }

    /// Create a display surface from a physical camera mount
    ///
    /// # Errors
    ///
    /// Same conditions as [`DisplaySurface::new`].
    pub fn with_camera_mount(mount: &CameraMount, size: (f64, f64), resolution: (u32, u32)) -> Result<Self> {
        Self::new(mount.camera_to_display(), size, resolution)
    }

    /// Camera-to-display transform
    #[must_use]
    pub const fn camera_to_display(&self) -> &Isometry3<f64> {
        &self.camera_to_display
    }

    /// Physical size of the active area
    #[must_use]
    pub const fn size(&self) -> (f64, f64) {
        (self.width, self.height)
    }

    /// Canvas resolution in pixels
    #[must_use]
    pub const fn resolution(&self) -> (u32, u32) {
        self.resolution
    }

    /// The display plane in display-local coordinates
    #[must_use]
    pub fn plane(&self) -> Plane {
        Plane::xy()
    }

    /// Move a camera-space point into display-local space
    #[must_use]
    pub fn to_display_local(&self, point: &Point3<f64>) -> Point3<f64> {
        self.camera_to_display.transform_point(point)
    }

    /// Move a camera-space ray into display-local space
    #[must_use]
    pub fn ray_to_display_local(&self, ray: &Ray) -> Ray {
        Ray::new(
            self.camera_to_display.transform_point(&ray.origin),
            self.camera_to_display.transform_vector(&ray.direction),
        )
    }

    /// Scale a display-local point lying on the panel to canvas pixels
    #[must_use]
    pub fn local_to_pixels(&self, point: &Point3<f64>) -> Point2<f64> {
        Point2::new(
            point.x * f64::from(self.resolution.0) / self.width,
            point.y * f64::from(self.resolution.1) / self.height,
        )
    }

    /// Project a camera-space point orthogonally onto the panel, in pixels
    #[must_use]
    pub fn project_to_display(&self, point: &Point3<f64>) -> Point2<f64> {
        self.local_to_pixels(&self.to_display_local(point))
    }

    /// Whether a pixel position lies on the canvas (edges included)
    #[must_use]
    pub fn is_within_bounds(&self, point: &Point2<f64>) -> bool {
        point.x.is_finite()
            && point.y.is_finite()
            && (0.0..=f64::from(self.resolution.0)).contains(&point.x)
            && (0.0..=f64::from(self.resolution.1)).contains(&point.y)
    }
}
