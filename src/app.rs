//! Frame loop: track, estimate the dot, draw and record.

use crate::{
    camera::CameraIntrinsics,
    error::Result,
    estimator::{DotEstimate, DotEstimator, EstimateFailure},
    tracking::GazeTracker,
    visualization::{draw_tracking, DotCanvas, FpsCounter},
    Error,
};
use log::{debug, info, warn};
use opencv::{
    core::{Mat, Size},
    highgui::{self, WINDOW_NORMAL},
    imgcodecs,
    prelude::*,
    videoio::{self, VideoCapture, VideoWriter, CAP_PROP_BUFFERSIZE},
};
use std::collections::HashMap;
use std::path::{Path, PathBuf};

/// Where frames come from
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum InputSource {
    /// Video files, processed one after another
    Files(Vec<PathBuf>),
    /// Webcam index
    Camera(i32),
    /// A single still image
    Image(PathBuf),
}

/// Main application configuration
#[derive(Debug, Clone)]
pub struct AppConfig {
    /// Frame source
    pub input: InputSource,
    /// Recorded output, one path per input (the first is used for a camera)
    pub output_videos: Vec<PathBuf>,
    /// Four-character codec for recorded output
    pub codec: String,
    /// Camera intrinsics; zeros are estimated per source
    pub intrinsics: CameraIntrinsics,
    /// Do not show the tracking window
    pub quiet: bool,
    /// No windows at all; dots are logged
    pub headless: bool,
    /// Name of the tracking window
    pub tracking_window: String,
    /// Name of the dot window
    pub dot_window: String,
}

impl AppConfig {
    /// Configuration for a source with everything else at defaults
    #[must_use]
    pub fn new(input: InputSource) -> Self {
        Self {
            input,
            output_videos: Vec::new(),
            codec: "DIVX".to_string(),
            intrinsics: CameraIntrinsics::default(),
            quiet: false,
            headless: false,
            tracking_window: "tracking_result".to_string(),
            dot_window: "Estimate".to_string(),
        }
    }
}

/// Counters for one input source
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RunStats {
    /// Frames processed
    pub frames: u64,
    /// Frames that produced a dot
    pub dots: u64,
    /// Dots that used a single eye
    pub degraded_dots: u64,
    failures: HashMap<EstimateFailure, u64>,
}

impl RunStats {
    /// Count one frame's outcome
    pub fn record(&mut self, outcome: &std::result::Result<DotEstimate, EstimateFailure>) {
        self.frames += 1;
        match outcome {
            Ok(dot) => {
                self.dots += 1;
                if dot.is_degraded() {
                    self.degraded_dots += 1;
                }
            }
            Err(reason) => *self.failures.entry(*reason).or_insert(0) += 1,
        }
    }

    /// Frames that failed for `reason`
    #[must_use]
    pub fn failures(&self, reason: EstimateFailure) -> u64 {
        self.failures.get(&reason).copied().unwrap_or(0)
    }

    /// Frames without a dot
    #[must_use]
    pub fn total_failures(&self) -> u64 {
        self.failures.values().sum()
    }

    fn log_summary(&self, source: &str) {
        info!(
            "{source}: {} frames, {} dots ({} single-eye)",
            self.frames, self.dots, self.degraded_dots
        );
        for reason in EstimateFailure::ALL {
            let count = self.failures(reason);
            if count > 0 {
                info!("{source}: {} x {count}", reason.code());
            }
        }
    }
}

/// What the user asked for from the keyboard
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum KeyCommand {
    /// Keep going
    Continue,
    /// Restart the tracker
    Reset,
    /// Stop the application
    Quit,
}

impl KeyCommand {
    /// Interpret a `wait_key` result
    #[must_use]
    pub fn from_key(key: i32) -> Self {
        match u8::try_from(key & 0xff) {
            Ok(b'r') if key >= 0 => Self::Reset,
            Ok(b'q') if key >= 0 => Self::Quit,
            _ => Self::Continue,
        }
    }
}

/// Main application struct
pub struct GazeDotApp<T: GazeTracker> {
    config: AppConfig,
    tracker: T,
    estimator: DotEstimator,
    canvas: Option<DotCanvas>,
    fps: FpsCounter,
}

impl<T: GazeTracker> GazeDotApp<T> {
    /// Create the application and its windows
    ///
    /// # Errors
    ///
    /// Returns an error if the canvas or a window cannot be created.
    pub fn new(config: AppConfig, tracker: T, estimator: DotEstimator) -> Result<Self> {
        info!("Initializing Gaze Dot Estimation application");

        let canvas = if config.headless {
            None
        } else {
            if !config.quiet {
                highgui::named_window(&config.tracking_window, WINDOW_NORMAL)?;
            }
            highgui::named_window(&config.dot_window, WINDOW_NORMAL)?;
            Some(DotCanvas::new(estimator.surface().resolution())?)
        };

        Ok(Self {
            config,
            tracker,
            estimator,
            canvas,
            fps: FpsCounter::new(),
        })
    }

    /// The tracker in use
    pub fn tracker(&self) -> &T {
        &self.tracker
    }

    /// Process every configured source and return per-source statistics
    ///
    /// # Errors
    ///
    /// Returns an error if a source cannot be opened or a frame fails in a
    /// way that is not a per-frame miss.
    pub fn run(&mut self) -> Result<Vec<RunStats>> {
        info!("Starting main application loop");

        let mut all_stats = Vec::new();
        match self.config.input.clone() {
            InputSource::Image(path) => all_stats.push(self.run_image(&path)?),
            InputSource::Camera(device) => {
                info!("Opening camera {device}");
                let mut capture = VideoCapture::new(device, videoio::CAP_ANY)?;
                if !capture.is_opened()? {
                    return Err(Error::VideoError(format!("Failed to open camera {device}")));
                }
                capture.set(CAP_PROP_BUFFERSIZE, 1.0)?;

                // The first camera frame is often stale or black
                let mut discard = Mat::default();
                capture.read(&mut discard)?;

                let output = self.config.output_videos.first().cloned();
                let (stats, _) = self.run_capture(&mut capture, output.as_deref(), true)?;
                stats.log_summary(&format!("camera {device}"));
                all_stats.push(stats);
            }
            InputSource::Files(files) => {
                for (index, path) in files.iter().enumerate() {
                    let mut capture = open_video_file(path)?;
                    let output = self.config.output_videos.get(index).cloned();
                    let (stats, quit) = self.run_capture(&mut capture, output.as_deref(), false)?;
                    stats.log_summary(&path.display().to_string());
                    all_stats.push(stats);

                    // Next file starts from detection
                    self.tracker.reset();
                    self.fps.reset();

                    if quit {
                        info!("Exit requested by user");
                        break;
                    }
                }
            }
        }

        info!("Application shutting down");
        Ok(all_stats)
    }

    fn run_image(&mut self, path: &Path) -> Result<RunStats> {
        if !path.exists() {
            return Err(Error::VideoError(format!("Image not found: {}", path.display())));
        }
        let path_str = path
            .to_str()
            .ok_or_else(|| Error::InvalidInput(format!("Non UTF-8 image path: {}", path.display())))?;
        let mut frame = imgcodecs::imread(path_str, imgcodecs::IMREAD_COLOR)?;
        if frame.empty() {
            return Err(Error::VideoError(format!("Failed to read image: {}", path.display())));
        }

        let intrinsics = self.config.intrinsics.resolve(frame.cols(), frame.rows());
        let mut stats = RunStats::default();
        self.process_frame(&mut frame, &intrinsics, &mut stats)?;
        if !self.config.headless {
            highgui::wait_key(0)?;
        }
        stats.log_summary(&path.display().to_string());
        Ok(stats)
    }

    /// Returns the source's statistics and whether the user asked to quit
    fn run_capture(
        &mut self,
        capture: &mut VideoCapture,
        output: Option<&Path>,
        is_camera: bool,
    ) -> Result<(RunStats, bool)> {
        let mut stats = RunStats::default();
        let mut writer: Option<VideoWriter> = None;
        let mut intrinsics: Option<CameraIntrinsics> = None;

        loop {
            let mut frame = Mat::default();
            if !capture.read(&mut frame)? || frame.empty() {
                if is_camera {
                    warn!("Camera returned no frame");
                } else {
                    info!("End of video file reached");
                }
                break;
            }

            let k = *intrinsics.get_or_insert_with(|| self.config.intrinsics.resolve(frame.cols(), frame.rows()));
            if writer.is_none() {
                if let Some(path) = output {
                    writer = open_writer(path, &self.config.codec, frame.size()?);
                }
            }

            self.process_frame(&mut frame, &k, &mut stats)?;

            if let Some(w) = writer.as_mut() {
                w.write(&frame)?;
            }

            if !self.config.headless {
                match KeyCommand::from_key(highgui::wait_key(1)?) {
                    KeyCommand::Continue => {}
                    KeyCommand::Reset => self.tracker.reset(),
                    KeyCommand::Quit => return Ok((stats, true)),
                }
            }
        }

        Ok((stats, false))
    }

    /// Track one frame, estimate its dot and draw the results.
    ///
    /// The frame is annotated in place. A per-frame failure is counted in
    /// `stats` and returned as `None`.
    ///
    /// # Errors
    ///
    /// Returns an error if tracking or drawing fails.
    pub fn process_frame(
        &mut self,
        frame: &mut Mat,
        intrinsics: &CameraIntrinsics,
        stats: &mut RunStats,
    ) -> Result<Option<DotEstimate>> {
        let face = self.tracker.track(frame, intrinsics)?;
        let outcome = self.estimator.estimate(&face.gaze);
        stats.record(&outcome);

        let fps = self.fps.tick();
        draw_tracking(frame, &face, intrinsics, fps)?;

        let dot = match outcome {
            Ok(dot) => dot,
            Err(reason) => {
                debug!("Frame {}: no dot ({})", stats.frames, reason.code());
                if !self.config.headless && !self.config.quiet {
                    highgui::imshow(&self.config.tracking_window, &*frame)?;
                }
                return Ok(None);
            }
        };

        if self.config.headless {
            info!(
                "Frame {}: dot at ({:.1}, {:.1}){}",
                stats.frames,
                dot.point.x,
                dot.point.y,
                if dot.is_degraded() { " single eye" } else { "" }
            );
        } else {
            if !self.config.quiet {
                highgui::imshow(&self.config.tracking_window, &*frame)?;
            }
            if let Some(canvas) = self.canvas.as_mut() {
                canvas.draw(&dot)?;
                highgui::imshow(&self.config.dot_window, canvas.image())?;
                canvas.clear()?;
            }
        }

        Ok(Some(dot))
    }
}

/// Open a video file for reading
///
/// # Errors
///
/// Returns an error if the file is missing or cannot be decoded.
pub fn open_video_file(path: &Path) -> Result<VideoCapture> {
    if !path.exists() {
        return Err(Error::VideoError(format!("Video file not found: {}", path.display())));
    }
    info!("Opening video file: {}", path.display());
    let path_str = path
        .to_str()
        .ok_or_else(|| Error::InvalidInput(format!("Non UTF-8 video path: {}", path.display())))?;
    let capture = VideoCapture::from_file(path_str, videoio::CAP_ANY)?;
    if !capture.is_opened()? {
        return Err(Error::VideoError(format!("Failed to open video file: {}", path.display())));
    }
    Ok(capture)
}

/// `FOURCC` code for a four-character codec name
///
/// # Errors
///
/// Returns an error unless the name has exactly four characters.
pub fn fourcc(codec: &str) -> Result<i32> {
    let chars: Vec<char> = codec.chars().collect();
    let [c1, c2, c3, c4] = chars.as_slice() else {
        return Err(Error::InvalidInput(format!("Codec must have four characters: {codec:?}")));
    };
    Ok(VideoWriter::fourcc(*c1, *c2, *c3, *c4)?)
}

/// Open an output video. Failure is logged and recording skipped.
fn open_writer(path: &Path, codec: &str, size: Size) -> Option<VideoWriter> {
    let opened = path
        .to_str()
        .ok_or_else(|| Error::InvalidInput(format!("Non UTF-8 output path: {}", path.display())))
        .and_then(|p| {
            let writer = VideoWriter::new(p, fourcc(codec)?, crate::constants::OUTPUT_VIDEO_FPS, size, true)?;
            if writer.is_opened()? {
                Ok(writer)
            } else {
                Err(Error::VideoError("writer did not open".to_string()))
            }
        });

    match opened {
        Ok(writer) => {
            info!("Recording to {} ({codec})", path.display());
            Some(writer)
        }
        Err(e) => {
            warn!(
                "Could not open output video {}: {e}. Is the codec {codec} installed?",
                path.display()
            );
            None
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::estimator::{DotSource, EstimateFailure};
    use nalgebra::{Point2, Point3};

    #[test]
    fn test_key_commands() {
        assert_eq!(KeyCommand::from_key(i32::from(b'r')), KeyCommand::Reset);
        assert_eq!(KeyCommand::from_key(i32::from(b'q')), KeyCommand::Quit);
        assert_eq!(KeyCommand::from_key(-1), KeyCommand::Continue);
        assert_eq!(KeyCommand::from_key(i32::from(b'x')), KeyCommand::Continue);
    }

    #[test]
    fn test_run_stats() {
        let mut stats = RunStats::default();
        let dot = DotEstimate {
            point: Point2::new(1.0, 1.0),
            display_local: Point3::new(1.0, 1.0, 0.0),
            source: DotSource::LeftOnly,
        };
        stats.record(&Ok(dot));
        stats.record(&Err(EstimateFailure::NoEyeModel));
        stats.record(&Err(EstimateFailure::NoEyeModel));
        stats.record(&Err(EstimateFailure::OutOfBounds));

        assert_eq!(stats.frames, 4);
        assert_eq!(stats.dots, 1);
        assert_eq!(stats.degraded_dots, 1);
        assert_eq!(stats.failures(EstimateFailure::NoEyeModel), 2);
        assert_eq!(stats.failures(EstimateFailure::BehindOrigin), 0);
        assert_eq!(stats.total_failures(), 3);
    }

    #[test]
    fn test_fourcc() {
        assert!(fourcc("DIVX").is_ok());
        assert!(fourcc("MP4").is_err());
        assert!(fourcc("").is_err());
    }
}
