//! tracery-export: SVG assembler for traced regions (sans-IO).
//!
//! Converts a [`Trace`](tracery_pipeline::Trace) into a single SVG
//! document string.

pub mod svg;

pub use svg::{SvgMetadata, assemble, build_path_data};
