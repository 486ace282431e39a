//! Gaze dot estimation: track a face and show where on the display it looks.

use anyhow::{Context, Result};
use clap::Parser;
use gaze_dot_estimation::{
    app::{AppConfig, GazeDotApp, InputSource},
    config::Config,
    estimator::{DotEstimator, FallbackPolicy, FusionMode},
    tracking::LandmarkGazeTracker,
};
use log::info;
use std::path::PathBuf;

#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Video file to process (repeat for several files)
    #[arg(short = 'f', long = "file")]
    files: Vec<PathBuf>,

    /// Camera index to use when no file is given
    #[arg(long)]
    device: Option<i32>,

    /// Process a single still image
    #[arg(long, conflicts_with = "files")]
    image: Option<PathBuf>,

    /// Record the annotated frames (one path per input)
    #[arg(long = "out-video")]
    out_video: Vec<PathBuf>,

    /// Four-character codec for recorded video
    #[arg(long)]
    codec: Option<String>,

    /// Focal length x, pixels
    #[arg(long)]
    fx: Option<f64>,

    /// Focal length y, pixels
    #[arg(long)]
    fy: Option<f64>,

    /// Optical centre x, pixels
    #[arg(long)]
    cx: Option<f64>,

    /// Optical centre y, pixels
    #[arg(long)]
    cy: Option<f64>,

    /// Path to configuration file (YAML format)
    #[arg(short = 'C', long)]
    config: Option<PathBuf>,

    /// Fusion of the two eyes (average, closest_approach)
    #[arg(long)]
    fusion: Option<FusionMode>,

    /// Show a dot when only one eye reaches the display
    #[arg(long)]
    single_eye_fallback: bool,

    /// Do not show the tracking window
    #[arg(short, long)]
    quiet: bool,

    /// No windows; log dots instead
    #[arg(long)]
    headless: bool,

    /// Enable debug output
    #[arg(short, long)]
    debug: bool,
}

fn main() -> Result<()> {
    let args = Args::parse();

    if args.debug {
        env_logger::init_from_env(env_logger::Env::new().default_filter_or("debug"));
    } else {
        env_logger::init_from_env(env_logger::Env::new().default_filter_or("info"));
    }

    info!("Gaze Dot Estimation");

    let mut config = match &args.config {
        Some(path) => {
            info!("Loading configuration from: {}", path.display());
            Config::from_file(path).with_context(|| format!("loading {}", path.display()))?
        }
        None => Config::default(),
    };

    // Command line wins over the file
    let intrinsics = &mut config.camera.intrinsics;
    for (value, slot) in [
        (args.fx, &mut intrinsics.fx),
        (args.fy, &mut intrinsics.fy),
        (args.cx, &mut intrinsics.cx),
        (args.cy, &mut intrinsics.cy),
    ] {
        if let Some(v) = value {
            *slot = v;
        }
    }
    if let Some(device) = args.device {
        config.camera.device = device;
    }
    if let Some(codec) = &args.codec {
        config.visualization.output_codec.clone_from(codec);
    }
    if let Some(fusion) = args.fusion {
        config.estimator.fusion = fusion;
    }
    if args.single_eye_fallback {
        config.estimator.fallback = FallbackPolicy::SingleRayFallback;
    }

    config.validate().context("invalid configuration")?;
    config.validate_models()?;

    let input = if let Some(image) = args.image {
        InputSource::Image(image)
    } else if !args.files.is_empty() {
        InputSource::Files(args.files)
    } else {
        InputSource::Camera(config.camera.device)
    };

    let app_config = AppConfig {
        input,
        output_videos: args.out_video,
        codec: config.visualization.output_codec.clone(),
        intrinsics: config.camera.intrinsics,
        quiet: args.quiet,
        headless: args.headless,
        tracking_window: config.visualization.tracking_window.clone(),
        dot_window: config.visualization.dot_window.clone(),
    };

    let estimator = DotEstimator::new(config.display_surface()?, config.estimator_config())?;
    let tracker = LandmarkGazeTracker::new(
        &config.models.face_cascade,
        &config.models.face_landmarks,
        &config.models.face_model_3d,
    )?;

    let mut app = GazeDotApp::new(app_config, tracker, estimator)?;
    let stats = app.run()?;

    let frames: u64 = stats.iter().map(|s| s.frames).sum();
    let dots: u64 = stats.iter().map(|s| s.dots).sum();
    info!("Done: {dots} dots in {frames} frames");

    Ok(())
}
