//! Drawing: tracking overlay on camera frames and the dot canvas.

use crate::{
    camera::CameraIntrinsics,
    constants::{
        CANVAS_BACKGROUND, DOT_RADIUS, FPS_UPDATE_INTERVAL, GAZE_LINE_LENGTH_MM, VISUALISATION_BOUNDARY,
    },
    estimator::{DotEstimate, GazeSample},
    tracking::{head_pose::HeadPose, TrackedFace},
    utils::safe_cast::{f64_to_i32, to_pixel, u32_to_i32},
    Result,
};
use nalgebra::{Point2, Point3};
use opencv::{
    core::{Mat, Point, Scalar, CV_8UC3},
    imgproc::{self, FONT_HERSHEY_SIMPLEX, LINE_8, LINE_AA},
    prelude::*,
};
use std::time::Instant;

/// Box half-size at the back of the head, model units
const REAR_SIZE: f64 = 75.0;
/// Box half-size at the front of the head
const FRONT_SIZE: f64 = 100.0;
/// Depth of the box front relative to the model origin
const FRONT_DEPTH: f64 = 100.0;

/// Colour for a certainty value: blueish when certain, reddish when not (BGR)
#[must_use]
pub fn certainty_color(certainty: f64) -> Scalar {
    let vis = (certainty.clamp(-1.0, 1.0) + 1.0) / (VISUALISATION_BOUNDARY + 1.0);
    Scalar::new((1.0 - vis) * 255.0, 0.0, vis * 255.0, 0.0)
}

/// Line thickness for overlays on a frame `cols` pixels wide
#[must_use]
pub fn overlay_thickness(cols: i32) -> i32 {
    let thickness = (2.0 * f64::from(cols) / 640.0).ceil();
    f64_to_i32(thickness).unwrap_or(1).max(1)
}

/// Whether a face is reliable enough to draw
#[must_use]
pub fn should_draw(certainty: f64) -> bool {
    certainty < VISUALISATION_BOUNDARY
}

/// Frames-per-second counter, refreshed every few frames
#[derive(Debug)]
pub struct FpsCounter {
    last_update: Instant,
    frames: u64,
    fps: f64,
}

impl Default for FpsCounter {
    fn default() -> Self {
        Self::new()
    }
}

impl FpsCounter {
    /// Start counting now
    #[must_use]
    pub fn new() -> Self {
        Self {
            last_update: Instant::now(),
            frames: 0,
            fps: 0.0,
        }
    }

    /// Count a frame and return the current rate
    #[allow(clippy::cast_precision_loss)] // Frame counts stay small
    pub fn tick(&mut self) -> f64 {
        self.frames += 1;
        if self.frames % FPS_UPDATE_INTERVAL == 0 {
            let elapsed = self.last_update.elapsed().as_secs_f64();
            if elapsed > 0.0 {
                self.fps = FPS_UPDATE_INTERVAL as f64 / elapsed;
            }
            self.last_update = Instant::now();
        }
        self.fps
    }

    /// Last computed rate
    #[must_use]
    pub const fn fps(&self) -> f64 {
        self.fps
    }

    /// Restart counting, e.g. for a new input file
    pub fn reset(&mut self) {
        *self = Self::new();
    }
}

/// Draw the tracking overlay on a camera frame
///
/// # Errors
///
/// Returns an error if an `OpenCV` drawing call fails.
pub fn draw_tracking(frame: &mut Mat, face: &TrackedFace, intrinsics: &CameraIntrinsics, fps: f64) -> Result<()> {
    if should_draw(face.certainty) {
        let thickness = overlay_thickness(frame.cols());
        if let Some(pose) = &face.head_pose {
            draw_head_box(frame, pose, intrinsics, certainty_color(face.certainty), thickness)?;
        } else if let Some(face_box) = face.face_box {
            imgproc::rectangle(frame, face_box, certainty_color(face.certainty), thickness, LINE_8, 0)?;
        }

        if face.detection_success {
            draw_gaze(frame, &face.gaze, intrinsics)?;
        }
    }

    draw_fps(frame, fps)
}

/// Project a 3D box around the head and draw its edges
///
/// # Errors
///
/// Returns an error if an `OpenCV` drawing call fails.
pub fn draw_head_box(
    frame: &mut Mat,
    pose: &HeadPose,
    intrinsics: &CameraIntrinsics,
    color: Scalar,
    thickness: i32,
) -> Result<()> {
    let corners = |size: f64, depth: f64| {
        [
            Point3::new(-size, -size, depth),
            Point3::new(-size, size, depth),
            Point3::new(size, size, depth),
            Point3::new(size, -size, depth),
        ]
    };
    let rear = corners(REAR_SIZE, 0.0);
    let front = corners(FRONT_SIZE, FRONT_DEPTH);

    let project = |p: &Point3<f64>| intrinsics.project(&pose.transform_point(p));
    let (Some(rear), Some(front)) = (project_all(&rear, project), project_all(&front, project)) else {
        // Part of the box is behind the camera
        return Ok(());
    };

    for i in 0..4 {
        let j = (i + 1) % 4;
        imgproc::line(frame, rear[i], rear[j], color, thickness, LINE_AA, 0)?;
        imgproc::line(frame, front[i], front[j], color, thickness, LINE_AA, 0)?;
        imgproc::line(frame, rear[i], front[i], color, thickness, LINE_AA, 0)?;
    }

    Ok(())
}

fn project_all<F>(points: &[Point3<f64>; 4], project: F) -> Option<[Point; 4]>
where
    F: Fn(&Point3<f64>) -> Option<Point2<f64>>,
{
    let mut out = [Point::default(); 4];
    for (slot, p) in out.iter_mut().zip(points) {
        *slot = to_pixel(&project(p)?).ok()?;
    }
    Some(out)
}

/// Draw each modelled eye's gaze as a short line from the eyeball centre
///
/// # Errors
///
/// Returns an error if an `OpenCV` drawing call fails.
pub fn draw_gaze(frame: &mut Mat, gaze: &GazeSample, intrinsics: &CameraIntrinsics) -> Result<()> {
    let thickness = overlay_thickness(frame.cols());
    for eye in [gaze.left, gaze.right].into_iter().flatten() {
        let start = eye.eyeball_center;
        let end = start + eye.gaze * GAZE_LINE_LENGTH_MM;
        let (Some(p0), Some(p1)) = (intrinsics.project(&start), intrinsics.project(&end)) else {
            continue;
        };
        let (Ok(p0), Ok(p1)) = (to_pixel(&p0), to_pixel(&p1)) else {
            continue;
        };
        imgproc::line(frame, p0, p1, Scalar::new(110.0, 220.0, 0.0, 0.0), thickness, LINE_AA, 0)?;
    }
    Ok(())
}

/// Write "FPS:<n>" in the top-left corner
///
/// # Errors
///
/// Returns an error if the text cannot be drawn.
#[allow(clippy::cast_possible_truncation)] // Display only
pub fn draw_fps(frame: &mut Mat, fps: f64) -> Result<()> {
    let text = format!("FPS:{}", fps as i64);
    imgproc::put_text(
        frame,
        &text,
        Point::new(10, 20),
        FONT_HERSHEY_SIMPLEX,
        0.5,
        Scalar::new(0.0, 0.0, 255.0, 0.0),
        1,
        LINE_8,
        false,
    )?;
    Ok(())
}

/// Canvas at display resolution that shows the latest dot
pub struct DotCanvas {
    image: Mat,
    width: i32,
    height: i32,
}

impl DotCanvas {
    /// Create a grey canvas of the given pixel size
    ///
    /// # Errors
    ///
    /// Returns an error if the size does not fit an `OpenCV` matrix.
    pub fn new(resolution: (u32, u32)) -> Result<Self> {
        let width = u32_to_i32(resolution.0)?;
        let height = u32_to_i32(resolution.1)?;
        let image = Mat::new_rows_cols_with_default(height, width, CV_8UC3, Scalar::all(CANVAS_BACKGROUND))?;
        Ok(Self { image, width, height })
    }

    /// Canvas image
    #[must_use]
    pub const fn image(&self) -> &Mat {
        &self.image
    }

    /// Canvas size in pixels
    #[must_use]
    pub const fn size(&self) -> (i32, i32) {
        (self.width, self.height)
    }

    /// Draw a filled red dot
    ///
    /// # Errors
    ///
    /// Returns an error if the dot position is not representable in pixels.
    pub fn draw(&mut self, dot: &DotEstimate) -> Result<()> {
        let center = to_pixel(&dot.point)?;
        imgproc::circle(
            &mut self.image,
            center,
            DOT_RADIUS,
            Scalar::new(0.0, 0.0, 255.0, 0.0),
            -1,
            LINE_8,
            0,
        )?;
        Ok(())
    }

    /// Back to plain grey
    ///
    /// # Errors
    ///
    /// Returns an error if the fill fails.
    pub fn clear(&mut self) -> Result<()> {
        self.image.set_to(&Scalar::all(CANVAS_BACKGROUND), &Mat::default())?;
        Ok(())
    }
}
