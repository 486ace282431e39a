//! Gaze dot estimation: where on a calibrated display is a person looking?
//!
//! The library turns a pair of 3D gaze rays, one per eye, into a single
//! point on a display. It also ships the pieces of a webcam demo around that
//! core:
//! - `OpenCV` for capture, face detection, `PnP` and drawing
//! - ONNX Runtime for facial landmark inference
//! - nalgebra for all 3D geometry
//!
//! The pipeline per frame:
//! 1. Face detection and 68 facial landmarks
//! 2. Head pose from the landmarks (`PnP`)
//! 3. Eyeball centres and gaze directions from the eye model
//! 4. Dot estimation: both rays are moved into display space, intersected
//!    with the panel and fused into one pixel position
//!
//! # Examples
//!
//! ## Estimating a dot
//!
//! ```
//! use gaze_dot_estimation::{
//!     display::DisplaySurface,
//!     estimator::{DotEstimator, EstimatorConfig, EyeRay, GazeSample},
//! };
//! use nalgebra::{Isometry3, Point3, Vector3};
//!
//! # fn main() -> Result<(), Box<dyn std::error::Error>> {
//! // Display-local units equal to pixels, camera at the screen centre
//! let surface = DisplaySurface::new(
//!     Isometry3::translation(960.0, 540.0, 0.0),
//!     (1920.0, 1080.0),
//!     (1920, 1080),
//! )?;
//! let estimator = DotEstimator::new(surface, EstimatorConfig::default())?;
//!
//! let sample = GazeSample::new(
//!     Some(EyeRay::new(Point3::new(100.0, 0.0, 500.0), Vector3::new(-0.02, 0.0, -1.0))),
//!     Some(EyeRay::new(Point3::new(-100.0, 0.0, 500.0), Vector3::new(0.02, 0.0, -1.0))),
//! );
//!
//! match estimator.estimate(&sample) {
//!     Ok(dot) => println!("Dot at ({:.0}, {:.0})", dot.point.x, dot.point.y),
//!     Err(reason) => println!("No dot: {}", reason.code()),
//! }
//! # Ok(())
//! # }
//! ```
//!
//! ## Physical display with a webcam on the bezel
//!
//! ```
//! use gaze_dot_estimation::display::{CameraMount, DisplaySurface};
//!
//! # fn main() -> Result<(), Box<dyn std::error::Error>> {
//! let mount = CameraMount {
//!     position: [155.0, -10.0, 0.0],
//!     tilt_deg: 5.0,
//!     ..CameraMount::default()
//! };
//! let surface = DisplaySurface::with_camera_mount(&mount, (310.0, 170.0), (1920, 1080))?;
//! assert_eq!(surface.resolution(), (1920, 1080));
//! # Ok(())
//! # }
//! ```
//!
//! ## Tracking a webcam
//!
//! ```no_run
//! use gaze_dot_estimation::{
//!     camera::CameraIntrinsics,
//!     config::Config,
//!     estimator::DotEstimator,
//!     tracking::{GazeTracker, LandmarkGazeTracker},
//! };
//! use opencv::{core::Mat, prelude::*, videoio};
//!
//! # fn main() -> Result<(), Box<dyn std::error::Error>> {
//! let config = Config::default();
//! let estimator = DotEstimator::new(config.display_surface()?, config.estimator_config())?;
//! let mut tracker = LandmarkGazeTracker::new(
//!     &config.models.face_cascade,
//!     &config.models.face_landmarks,
//!     &config.models.face_model_3d,
//! )?;
//!
//! let mut cap = videoio::VideoCapture::new(0, videoio::CAP_ANY)?;
//! let mut frame = Mat::default();
//! while cap.read(&mut frame)? {
//!     let k = CameraIntrinsics::default().resolve(frame.cols(), frame.rows());
//!     let face = tracker.track(&frame, &k)?;
//!     if let Ok(dot) = estimator.estimate(&face.gaze) {
//!         println!("{:.0} {:.0}", dot.point.x, dot.point.y);
//!     }
//! }
//! # Ok(())
//! # }
//! ```

/// Ray, plane and closest-approach geometry
pub mod geometry;

/// Calibrated display surface and camera mounting
pub mod display;

/// Gaze fusion into an on-screen dot
pub mod estimator;

/// Pinhole camera intrinsics
pub mod camera;

/// Face, landmark, head pose and eye tracking
pub mod tracking;

/// Overlay drawing and the dot canvas
pub mod visualization;

/// Utility functions for image regions and numeric conversions
pub mod utils;

/// Error types and result handling
pub mod error;

/// Main application module
pub mod app;

/// Constants used throughout the application
pub mod constants;

/// Configuration management
pub mod config;

pub use error::{Error, Result};
