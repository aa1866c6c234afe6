//! tracery-pipeline: Pure raster-to-vector pipeline (sans-IO).
//!
//! Converts a bitmap into traced color regions through:
//! color filters -> scaling -> posterization -> region tracing.
//!
//! This crate has **no I/O dependencies**. It operates on in-memory
//! bitmaps (or encoded bytes via [`decode`]) and returns structured
//! data. SVG serialization lives in `tracery-export`.

pub mod config;
pub mod diagnostics;
pub mod error;
pub mod filter;
pub mod pipeline;
pub mod posterize;
pub mod scale;
pub mod trace;
pub mod types;

pub use config::{
    FilterKind, FilterParameterSet, Mode, PipelineConfig, PosterizeParameterSet, ScaleParameter,
    TraceParameterSet,
};
pub use error::PipelineError;
pub use pipeline::{Pipeline, StagedResult};
pub use trace::{PixelBounds, Region, Trace, TracedRegion};
pub use types::{Bitmap, Color, Dimensions, Point, Segment, SubPath, VectorPath};

/// Decode raw image bytes (PNG, JPEG, BMP, WebP) into an RGBA [`Bitmap`].
///
/// # Errors
///
/// Returns [`PipelineError::EmptyInput`] if `bytes` is empty, or
/// [`PipelineError::UnsupportedImage`] if the format is unrecognized or
/// the data is corrupt.
pub fn decode(bytes: &[u8]) -> Result<Bitmap, PipelineError> {
    if bytes.is_empty() {
        return Err(PipelineError::EmptyInput);
    }
    let image = image::load_from_memory(bytes)?;
    Ok(image.to_rgba8())
}

/// Run every stage and keep each intermediate.
///
/// The whole configuration is validated before any stage runs, so an
/// invalid parameter never produces partial work.
///
/// # Errors
///
/// Returns [`PipelineError::InvalidParameter`] for the first
/// out-of-range parameter, in stage order.
pub fn process_staged(
    bitmap: &Bitmap,
    config: &PipelineConfig,
) -> Result<StagedResult, PipelineError> {
    config.validate()?;
    Ok(Pipeline::new(bitmap.clone(), config.clone())
        .filter()?
        .scale()?
        .posterize()?
        .trace()?
        .into_result())
}

/// Run every stage and return only the traced regions.
///
/// # Errors
///
/// Returns [`PipelineError::InvalidParameter`] for the first
/// out-of-range parameter, in stage order.
pub fn process(bitmap: &Bitmap, config: &PipelineConfig) -> Result<Trace, PipelineError> {
    process_staged(bitmap, config).map(|staged| staged.trace)
}
