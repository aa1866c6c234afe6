//! tracery: convert raster images to SVG.
//!
//! Sequences the `tracery-pipeline` stages (filters, scaling,
//! posterization, tracing) and the `tracery-export` SVG assembler.
//! [`run`] performs one conversion; [`Orchestrator`] adds
//! last-requested-wins supersession for interactive front ends.

pub mod orchestrator;

pub use orchestrator::{Orchestrator, Published, RunOutcome, RunToken};
pub use tracery_export::{SvgMetadata, assemble};
pub use tracery_pipeline::{
    Bitmap, Mode, PipelineConfig, PipelineError, Trace, decode, process, process_staged,
};

/// Convert `bitmap` into an SVG document.
///
/// # Errors
///
/// Returns [`PipelineError::InvalidParameter`] for the first out-of-range
/// parameter. No output is produced in that case.
pub fn run(bitmap: &Bitmap, config: &PipelineConfig) -> Result<String, PipelineError> {
    let trace = process(bitmap, config)?;
    Ok(assemble(&trace, config.mode, &SvgMetadata::default()))
}
