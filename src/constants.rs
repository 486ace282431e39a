//! Constants used throughout the application

/// Number of facial landmarks for full face
pub const NUM_FACIAL_LANDMARKS: usize = 68;

/// Total number of 3D model coordinates (68 points × 3 dimensions)
pub const MODEL_POINTS_TOTAL_VALUES: usize = 204;

/// Landmark index ranges of the 68-point annotation (half-open)
pub const RIGHT_EYE_LANDMARKS: std::ops::Range<usize> = 36..42;
pub const LEFT_EYE_LANDMARKS: std::ops::Range<usize> = 42..48;

/// Eyeball radius used by the eye model, millimetres
pub const EYEBALL_RADIUS_MM: f64 = 12.0;

/// Legacy "no eye model" eyeball centre reported by landmark trackers
pub const SENTINEL_EYE_CENTER: [f64; 3] = [0.0, 0.0, -1.0];

/// Focal length guess is `DEFAULT_FOCAL_LENGTH * width / REFERENCE_WIDTH`
pub const DEFAULT_FOCAL_LENGTH: f64 = 500.0;
pub const REFERENCE_WIDTH: f64 = 640.0;
pub const REFERENCE_HEIGHT: f64 = 480.0;

/// Certainty values below this are drawn (lower is more certain)
pub const VISUALISATION_BOUNDARY: f64 = 0.2;

/// FPS text is refreshed every this many frames
pub const FPS_UPDATE_INTERVAL: u64 = 10;

/// Length of the drawn gaze lines, millimetres
pub const GAZE_LINE_LENGTH_MM: f64 = 50.0;

/// Dot canvas appearance
pub const DOT_RADIUS: i32 = 32;
pub const CANVAS_BACKGROUND: f64 = 50.0;

/// Output video frame rate
pub const OUTPUT_VIDEO_FPS: f64 = 30.0;

/// Default tolerance for "parallel" tests on unit vectors
pub const PARALLEL_EPSILON: f64 = 1e-6;

/// Numeric precision epsilon
pub const EPSILON: f64 = 1e-10;
