//! 68-point facial landmark detection with an `ONNX` model.

use crate::{
    constants::NUM_FACIAL_LANDMARKS,
    utils::safe_cast::{i32_to_f32, usize_to_i32},
    Error, Result,
};
use ndarray::{Array4, CowArray};
use opencv::core::{Mat, Point2f, Rect, Size, CV_32F};
use opencv::imgproc::{self, InterpolationFlags};
use opencv::prelude::*;
use ort::{Environment, Session, Value};
use std::path::Path;
use std::sync::Arc;

/// Default landmark detector input size
const DEFAULT_LANDMARK_INPUT_SIZE: i32 = 128;

/// Facial landmark detector using `ONNX` Runtime
pub struct MarkDetector {
    session: Session,
    input_size: i32,
}

impl MarkDetector {
    /// Create a new landmark detector from an `ONNX` model file
    ///
    /// # Errors
    ///
    /// Returns an error if:
    /// - The ONNX model file cannot be loaded
    /// - The model has no inputs or outputs
    /// - The ONNX runtime environment cannot be created
    pub fn new<P: AsRef<Path>>(model_path: P) -> Result<Self> {
        log::info!(
            "Initializing MarkDetector with model: {}",
            model_path.as_ref().display()
        );
        let environment = Arc::new(
            Environment::builder()
                .with_name("mark_detector")
                .with_log_level(ort::LoggingLevel::Warning)
                .build()?,
        );

        let session = ort::SessionBuilder::new(&environment)?
            .with_optimization_level(ort::GraphOptimizationLevel::Level3)?
            .with_model_from_file(model_path)?;

        if session.inputs.is_empty() {
            return Err(Error::ModelError("Landmark model has no inputs".to_string()));
        }
        if session.outputs.is_empty() {
            return Err(Error::ModelError("Landmark model has no outputs".to_string()));
        }

        Ok(Self {
            session,
            input_size: DEFAULT_LANDMARK_INPUT_SIZE,
        })
    }

    /// Detect landmarks inside `face_box` of a BGR frame.
    ///
    /// Landmarks are returned in frame coordinates.
    ///
    /// # Errors
    ///
    /// Returns an error if preprocessing, inference or output decoding fails.
    pub fn detect(&self, frame: &Mat, face_box: Rect) -> Result<Vec<Point2f>> {
        let face_roi = Mat::roi(frame, face_box)?;
        let face_image = face_roi.try_clone()?;

        let input = self.preprocess(&face_image)?;
        let marks = self.forward(input)?;
        postprocess(&marks, face_box, self.input_size)
    }

    /// Resize, convert to RGB in [0, 1] and lay out as NHWC
    #[allow(clippy::cast_sign_loss)] // Input size is a positive constant
    fn preprocess(&self, face_image: &Mat) -> Result<Array4<f32>> {
        let size = self.input_size as usize;
        let channels = 3;

        let mut resized = Mat::default();
        imgproc::resize(
            face_image,
            &mut resized,
            Size::new(self.input_size, self.input_size),
            0.0,
            0.0,
            InterpolationFlags::INTER_LINEAR as i32,
        )?;

        let mut rgb_image = Mat::default();
        imgproc::cvt_color(&resized, &mut rgb_image, imgproc::COLOR_BGR2RGB, 0)?;

        let mut float_image = Mat::default();
        rgb_image.convert_to(&mut float_image, CV_32F, 1.0 / 255.0, 0.0)?;

        let mut data = vec![0.0f32; size * size * channels];
        for row in 0..size {
            for col in 0..size {
                let pixel = float_image.at_2d::<opencv::core::Vec3f>(usize_to_i32(row)?, usize_to_i32(col)?)?;
                let base = (row * size + col) * channels;
                data[base..base + channels].copy_from_slice(&pixel.0);
            }
        }

        Array4::from_shape_vec((1, size, size, channels), data)
            .map_err(|e| Error::ModelDataFormatError(format!("Failed to create array: {e}")))
    }

    /// Run the model and flatten its first output
    fn forward(&self, input: Array4<f32>) -> Result<Vec<f32>> {
        let cow_array = CowArray::from(input.into_dyn());
        let input_tensor = Value::from_array(self.session.allocator(), &cow_array)?;

        let outputs = self.session.run(vec![input_tensor])?;
        let marks_output = outputs
            .into_iter()
            .next()
            .ok_or_else(|| Error::ModelOutputError("No output from model".to_string()))?;

        let marks_tensor = marks_output.try_extract::<f32>()?;
        let marks_view = marks_tensor.view();
        let marks = marks_view
            .as_slice()
            .ok_or_else(|| Error::ModelOutputError("Failed to get output data".to_string()))?;

        Ok(marks.to_vec())
    }
}

/// Map model output (x, y pairs in input-size pixels) to frame coordinates
///
/// # Errors
///
/// Returns an error if the output holds fewer than 68 points.
pub fn postprocess(marks: &[f32], face_box: Rect, input_size: i32) -> Result<Vec<Point2f>> {
    if marks.len() < NUM_FACIAL_LANDMARKS * 2 {
        return Err(Error::ModelOutputError(format!(
            "Expected {} landmark values, got {}",
            NUM_FACIAL_LANDMARKS * 2,
            marks.len()
        )));
    }

    let input_size = i32_to_f32(input_size)?;
    let scale_x = i32_to_f32(face_box.width)? / input_size;
    let scale_y = i32_to_f32(face_box.height)? / input_size;
    let (left, top) = (i32_to_f32(face_box.x)?, i32_to_f32(face_box.y)?);

    Ok(marks
        .chunks_exact(2)
        .take(NUM_FACIAL_LANDMARKS)
        .map(|xy| Point2f::new(left + xy[0] * scale_x, top + xy[1] * scale_y))
        .collect())
}
