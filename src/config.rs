//! Configuration management for the gaze dot application

use crate::{
    camera::CameraIntrinsics,
    display::{CameraMount, DisplaySurface},
    estimator::EstimatorConfig,
    Error, Result,
};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Application configuration
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Model configuration
    pub models: ModelConfig,

    /// Camera configuration
    pub camera: CameraConfig,

    /// Display calibration
    pub display: DisplayConfig,

    /// Dot estimator policy
    pub estimator: EstimatorConfig,

    /// Window and overlay configuration
    pub visualization: VisualizationConfig,
}

/// Model file paths configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ModelConfig {
    /// Haar cascade used for face detection
    pub face_cascade: PathBuf,

    /// Path to facial landmarks ONNX model
    pub face_landmarks: PathBuf,

    /// Path to 3D face model points
    pub face_model_3d: PathBuf,
}

/// Camera configuration
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CameraConfig {
    /// Webcam index used when no file is given
    pub device: i32,

    /// Intrinsics; zeros are estimated from the frame size
    pub intrinsics: CameraIntrinsics,
}

/// Display calibration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DisplayConfig {
    /// Active area width, millimetres
    pub width_mm: f64,

    /// Active area height, millimetres
    pub height_mm: f64,

    /// Canvas width, pixels
    pub resolution_width: u32,

    /// Canvas height, pixels
    pub resolution_height: u32,

    /// Camera placement relative to the panel
    pub camera_mount: CameraMount,
}

/// Window and overlay configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct VisualizationConfig {
    /// Name of the camera window
    pub tracking_window: String,

    /// Name of the dot window
    pub dot_window: String,

    /// Four-character codec for recorded output
    pub output_codec: String,
}

impl Default for ModelConfig {
    fn default() -> Self {
        Self {
            face_cascade: PathBuf::from("assets/haarcascade_frontalface_default.xml"),
            face_landmarks: PathBuf::from("assets/face_landmarks.onnx"),
            face_model_3d: PathBuf::from("assets/model.txt"),
        }
    }
}

impl Default for DisplayConfig {
    fn default() -> Self {
        Self {
            width_mm: 310.0,
            height_mm: 170.0,
            resolution_width: 1920,
            resolution_height: 1080,
            camera_mount: CameraMount::default(),
        }
    }
}

impl Default for VisualizationConfig {
    fn default() -> Self {
        Self {
            tracking_window: "tracking_result".to_string(),
            dot_window: "Estimate".to_string(),
            output_codec: "DIVX".to_string(),
        }
    }
}

impl Config {
    /// Load configuration from a YAML file
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be read or parsed.
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let content = std::fs::read_to_string(path)?;

        serde_yaml::from_str(&content).map_err(|e| Error::ConfigError(format!("Failed to parse config: {e}")))
    }

    /// Save configuration to a YAML file
    ///
    /// # Errors
    ///
    /// Returns an error if serialization or the write fails.
    pub fn to_file<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        let content = serde_yaml::to_string(self)?;
        std::fs::write(path, content)?;
        Ok(())
    }

    /// Display calibration as a surface
    ///
    /// # Errors
    ///
    /// Returns an error if the calibration values are unusable.
    pub fn display_surface(&self) -> Result<DisplaySurface> {
        DisplaySurface::with_camera_mount(
            &self.display.camera_mount,
            (self.display.width_mm, self.display.height_mm),
            (self.display.resolution_width, self.display.resolution_height),
        )
    }

    /// Estimator policy
    #[must_use]
    pub const fn estimator_config(&self) -> EstimatorConfig {
        self.estimator
    }

    /// Validate values without touching the filesystem
    ///
    /// # Errors
    ///
    /// Returns an error naming the first invalid value.
    pub fn validate(&self) -> Result<()> {
        let k = &self.camera.intrinsics;
        if [k.fx, k.fy, k.cx, k.cy].iter().any(|v| !v.is_finite() || *v < 0.0) {
            return Err(Error::ConfigError(
                "Camera intrinsics must be finite and non-negative".to_string(),
            ));
        }
        if self.camera.device < 0 {
            return Err(Error::ConfigError("Camera device must be non-negative".to_string()));
        }

        if self.visualization.output_codec.chars().count() != 4 {
            return Err(Error::ConfigError(format!(
                "Output codec must have four characters, got {:?}",
                self.visualization.output_codec
            )));
        }

        self.display_surface()
            .map_err(|e| Error::ConfigError(format!("Invalid display calibration: {e}")))?;
        self.estimator
            .validate()
            .map_err(|e| Error::ConfigError(format!("Invalid estimator settings: {e}")))?;

        Ok(())
    }

    /// Check that every model file exists
    ///
    /// # Errors
    ///
    /// Returns an error for the first missing file.
    pub fn validate_models(&self) -> Result<()> {
        for (name, path) in [
            ("Face cascade", &self.models.face_cascade),
            ("Face landmarks model", &self.models.face_landmarks),
            ("3D face model", &self.models.face_model_3d),
        ] {
            if !path.exists() {
                return Err(Error::ConfigError(format!("{name} not found: {}", path.display())));
            }
        }
        Ok(())
    }
}

/// Example configuration file content
pub const EXAMPLE_CONFIG: &str = r#"# Gaze Dot Estimation Configuration

# Model paths
models:
  face_cascade: "assets/haarcascade_frontalface_default.xml"
  face_landmarks: "assets/face_landmarks.onnx"
  face_model_3d: "assets/model.txt"

# Camera; zero intrinsics are estimated from the frame size
camera:
  device: 0
  intrinsics:
    fx: 0.0
    fy: 0.0
    cx: 0.0
    cy: 0.0

# Display calibration (display-local frame: origin top-left of the
# active area, x right, y down, z into the screen)
display:
  width_mm: 310.0
  height_mm: 170.0
  resolution_width: 1920
  resolution_height: 1080
  camera_mount:
    position: [155.0, -10.0, 0.0]
    tilt_deg: 0.0
    pan_deg: 0.0
    roll_deg: 0.0

# Dot estimator: fusion is "average" or "closest_approach",
# fallback is "strict_dual_ray" or "single_ray_fallback"
estimator:
  fusion: "average"
  fallback: "strict_dual_ray"
  parallel_epsilon: 0.000001
  vergence_epsilon: 0.000001

# Windows and recording
visualization:
  tracking_window: "tracking_result"
  dot_window: "Estimate"
  output_codec: "DIVX"
"#;
