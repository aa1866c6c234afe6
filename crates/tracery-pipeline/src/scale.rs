//! Resampling to a percentage of the input size.
//!
//! Tracing cost grows with pixel count, so scaling down is the cheapest
//! way to trade detail for speed. 100% skips resampling entirely.

use image::imageops::{self, FilterType};

use crate::config::ScaleParameter;
use crate::error::PipelineError;
use crate::types::Bitmap;

/// Resampling filter: bilinear.
pub const SCALE_FILTER: FilterType = FilterType::Triangle;

/// Output size for `(width, height)` at `percent`.
///
/// Each axis is rounded half away from zero and clamped to at least 1.
#[must_use]
#[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
pub fn scaled_size(width: u32, height: u32, percent: f64) -> (u32, u32) {
    let axis = |len: u32| -> u32 {
        let scaled = (f64::from(len) * percent / 100.0).round();
        (scaled as u32).max(1)
    };
    (axis(width), axis(height))
}

/// Resample `input` to `percent` of its size.
///
/// # Errors
///
/// Returns [`PipelineError::InvalidParameter`] if the percentage is
/// outside `[1, 100]`.
#[must_use = "returns the scaled bitmap"]
pub fn scale(input: &Bitmap, percent: ScaleParameter) -> Result<Bitmap, PipelineError> {
    percent.validate()?;

    let (w, h) = input.dimensions();
    let (nw, nh) = scaled_size(w, h, percent.percent());
    log::debug!("scale: {w}x{h} -> {nw}x{nh} ({}%)", percent.percent());

    if (nw, nh) == (w, h) {
        return Ok(input.clone());
    }
    Ok(imageops::resize(input, nw, nh, SCALE_FILTER))
}
