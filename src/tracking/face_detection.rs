//! Face detection with an `OpenCV` Haar cascade.

use crate::{Error, Result};
use opencv::{
    core::{Mat, Rect, Size, Vector},
    objdetect::{self, CascadeClassifier},
    prelude::*,
};
use std::path::Path;

/// Haar cascade face detector working on grayscale frames
pub struct FaceDetector {
    classifier: CascadeClassifier,
    scale_factor: f64,
    min_neighbors: i32,
    min_size: i32,
}

impl FaceDetector {
    /// Load a cascade file (e.g. `haarcascade_frontalface_default.xml`)
    ///
    /// # Errors
    ///
    /// Returns an error if the file is missing or is not a usable cascade.
    pub fn new<P: AsRef<Path>>(cascade_path: P, min_size: i32) -> Result<Self> {
        let path = cascade_path.as_ref();
        log::info!("Initializing FaceDetector with cascade: {}", path.display());

        if !path.exists() {
            return Err(Error::ModelError(format!("Face cascade not found: {}", path.display())));
        }
        let path_str = path
            .to_str()
            .ok_or_else(|| Error::InvalidInput(format!("Non UTF-8 cascade path: {}", path.display())))?;

        let classifier = CascadeClassifier::new(path_str)?;
        if classifier.empty()? {
            return Err(Error::ModelError(format!("Failed to load face cascade: {}", path.display())));
        }

        Ok(Self {
            classifier,
            scale_factor: 1.1,
            min_neighbors: 2,
            min_size,
        })
    }

    /// Detect faces in a grayscale frame, largest first
    ///
    /// # Errors
    ///
    /// Returns an error if the cascade evaluation fails.
    pub fn detect(&mut self, gray: &Mat) -> Result<Vec<Rect>> {
        let mut faces = Vector::<Rect>::new();
        self.classifier.detect_multi_scale(
            gray,
            &mut faces,
            self.scale_factor,
            self.min_neighbors,
            objdetect::CASCADE_SCALE_IMAGE,
            Size::new(self.min_size, self.min_size),
            Size::new(0, 0),
        )?;

        let mut faces = faces.to_vec();
        faces.sort_by_key(|r| std::cmp::Reverse(r.area()));
        Ok(faces)
    }
}

/// Pick the face to track: the one overlapping the previous box most,
/// otherwise the largest.
#[must_use]
pub fn select_face(faces: &[Rect], previous: Option<Rect>) -> Option<Rect> {
    if let Some(prev) = previous {
        let best = faces
            .iter()
            .map(|face| (intersection_area(face, &prev), face))
            .filter(|(overlap, _)| *overlap > 0)
            .max_by_key(|(overlap, _)| *overlap)
            .map(|(_, face)| *face);
        if best.is_some() {
            return best;
        }
    }

    faces.iter().max_by_key(|r| r.area()).copied()
}

fn intersection_area(a: &Rect, b: &Rect) -> i32 {
    let x0 = a.x.max(b.x);
    let y0 = a.y.max(b.y);
    let x1 = (a.x + a.width).min(b.x + b.width);
    let y1 = (a.y + a.height).min(b.y + b.height);
    (x1 - x0).max(0) * (y1 - y0).max(0)
}
