//! Utility functions for image regions and numeric conversions.

pub mod safe_cast;

use opencv::core::Rect;
use safe_cast::f64_to_i32_clamp;

/// Grow a face box by `shift` of its size on every side, make it square and
/// keep it inside a `max_width` x `max_height` frame.
///
/// Face detectors return tight boxes; the landmark model expects some margin
/// around the face.
#[must_use]
pub fn refine_box(face_box: Rect, max_width: i32, max_height: i32, shift: f64) -> Rect {
    let mut bbox = face_box;
    let x_shift = f64_to_i32_clamp(f64::from(bbox.width) * shift, 0, max_width);
    let y_shift = f64_to_i32_clamp(f64::from(bbox.height) * shift, 0, max_height);

    bbox.x = (bbox.x - x_shift).max(0);
    bbox.y = (bbox.y - y_shift).max(0);
    bbox.width = (bbox.width + 2 * x_shift).min(max_width - bbox.x);
    bbox.height = (bbox.height + 2 * y_shift).min(max_height - bbox.y);

    // Square, but never larger than the frame
    let side_length = bbox.width.max(bbox.height).min(max_width).min(max_height);
    bbox.width = side_length;
    bbox.height = side_length;

    if bbox.x + bbox.width > max_width {
        bbox.x = max_width - bbox.width;
    }
    if bbox.y + bbox.height > max_height {
        bbox.y = max_height - bbox.height;
    }

    bbox
}

/// Whether a rectangle lies fully inside a frame and has area
#[must_use]
pub fn is_inside_frame(rect: &Rect, frame_width: i32, frame_height: i32) -> bool {
    rect.width > 0
        && rect.height > 0
        && rect.x >= 0
        && rect.y >= 0
        && rect.x + rect.width <= frame_width
        && rect.y + rect.height <= frame_height
}
