//! Safe casting utilities for turning geometry into pixel coordinates

use crate::{Error, Result};
use nalgebra::Point2;

/// Safely convert usize to i32 with overflow checking
///
/// # Errors
///
/// Returns an error if the value exceeds i32::MAX
pub fn usize_to_i32(value: usize) -> Result<i32> {
    value
        .try_into()
        .map_err(|_| Error::InvalidInput(format!("Value {value} too large to fit in i32")))
}

/// Safely convert u32 to i32 with overflow checking
///
/// # Errors
///
/// Returns an error if the value exceeds i32::MAX
pub fn u32_to_i32(value: u32) -> Result<i32> {
    value
        .try_into()
        .map_err(|_| Error::InvalidInput(format!("Value {value} too large to fit in i32")))
}

/// Largest integer magnitude an f32 holds exactly
const F32_EXACT_INT: i32 = 1 << 24;

/// Convert i32 to f32, rejecting values f32 cannot represent exactly
///
/// # Errors
///
/// Returns an error if the magnitude exceeds 2^24
#[allow(clippy::cast_precision_loss)] // Range checked above
pub fn i32_to_f32(value: i32) -> Result<f32> {
    if (-F32_EXACT_INT..=F32_EXACT_INT).contains(&value) {
        Ok(value as f32)
    } else {
        Err(Error::InvalidInput(format!(
            "Value {value} cannot be represented exactly as f32"
        )))
    }
}

/// Safely convert f64 to i32 with bounds checking
///
/// # Errors
///
/// Returns an error if the value is not finite or outside i32 range
#[allow(clippy::cast_possible_truncation)] // Truncation after bounds check is safe
pub fn f64_to_i32(value: f64) -> Result<i32> {
    if value.is_finite() && value >= f64::from(i32::MIN) && value <= f64::from(i32::MAX) {
        Ok(value as i32)
    } else {
        Err(Error::InvalidInput(format!(
            "Value {value} cannot be safely converted to i32"
        )))
    }
}

/// Round and clamp f64 to i32 for pixel coordinates
#[must_use]
#[allow(clippy::cast_possible_truncation)] // Clamping ensures safe truncation
pub fn f64_to_i32_clamp(value: f64, min: i32, max: i32) -> i32 {
    let (min, max) = if min <= max { (min, max) } else { (max, min) };

    if !value.is_finite() {
        return min;
    }

    (value.round().clamp(f64::from(min), f64::from(max)) as i32).clamp(min, max)
}

/// Round a geometric point to an `OpenCV` pixel
///
/// # Errors
///
/// Returns an error if either coordinate is not representable as i32
pub fn to_pixel(point: &Point2<f64>) -> Result<opencv::core::Point> {
    Ok(opencv::core::Point::new(
        f64_to_i32(point.x.round())?,
        f64_to_i32(point.y.round())?,
    ))
}
