//! Bitmap to vector outlines.
//!
//! A quantized bitmap is split into 4-connected regions of one color
//! (Color mode) or of the foreground class (Monochrome mode). Regions
//! smaller than the turd size are absorbed into a neighbor. Every
//! remaining region's boundary cycles are fitted with a polygon and then
//! smoothed into line and cubic Bézier segments.

mod contour;
mod curve;
mod polygon;
mod regions;

use rayon::prelude::*;
use serde::{Deserialize, Serialize};

use crate::config::{Mode, TraceParameterSet};
use crate::error::PipelineError;
use crate::types::{Bitmap, Color, Dimensions, SubPath, VectorPath};

use contour::IPoint;
use regions::{Component, MONO_FOREGROUND, Segmentation};

/// Inclusive pixel bounds of a region.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct PixelBounds {
    /// Leftmost column.
    pub min_x: u32,
    /// Topmost row.
    pub min_y: u32,
    /// Rightmost column.
    pub max_x: u32,
    /// Bottom row.
    pub max_y: u32,
}

impl PixelBounds {
    /// Grow to include pixel `(x, y)`.
    pub const fn include(&mut self, x: u32, y: u32) {
        if x < self.min_x {
            self.min_x = x;
        }
        if x > self.max_x {
            self.max_x = x;
        }
        if y < self.min_y {
            self.min_y = y;
        }
        if y > self.max_y {
            self.max_y = y;
        }
    }

    /// Width in pixels.
    #[must_use]
    pub const fn width(&self) -> u32 {
        self.max_x - self.min_x + 1
    }

    /// Height in pixels.
    #[must_use]
    pub const fn height(&self) -> u32 {
        self.max_y - self.min_y + 1
    }
}

/// A maximal 4-connected set of same-class pixels.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Region {
    /// Fill color. Monochrome foreground regions are black.
    pub color: Color,
    /// Pixel count, after absorbing smaller neighbors.
    pub area: u32,
    /// Pixel bounds.
    pub bounds: PixelBounds,
    /// `(x, y)` of the topmost-leftmost pixel.
    pub first_pixel: (u32, u32),
}

/// A region and its outline.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TracedRegion {
    /// The region.
    pub region: Region,
    /// Outer contour first, then holes.
    pub path: VectorPath,
}

/// Output of [`trace`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Trace {
    /// Size of the traced bitmap.
    pub dimensions: Dimensions,
    /// Color mode only: the color painted behind every region.
    pub background: Option<Color>,
    /// Regions in raster order of their first pixel.
    pub regions: Vec<TracedRegion>,
}

impl Trace {
    /// Total number of segments across every region.
    #[must_use]
    pub fn segment_count(&self) -> usize {
        self.regions.iter().map(|r| r.path.segment_count()).sum()
    }
}

/// Fit one boundary cycle. Returns `None` for degenerate cycles.
fn fit_cycle(points: &[IPoint], params: &TraceParameterSet) -> Option<SubPath> {
    let geometry = polygon::PathGeometry::new(points)?;
    if geometry.len() < 4 {
        return None;
    }
    let lon = geometry.longest_straight();
    let po = geometry.best_polygon(&lon);
    if po.len() < 3 {
        return None;
    }
    let vertices = geometry.adjust_vertices(&po);
    let mut fitted = curve::smooth(&vertices, params.alpha_max);
    if params.opt_curve {
        fitted = curve::optimize(&fitted, params.opt_tolerance);
    }
    let sub = curve::to_subpath(&fitted)?;
    let finite = sub.start.is_finite()
        && sub
            .segments
            .iter()
            .all(|s| s.points().into_iter().all(crate::types::Point::is_finite));
    finite.then_some(sub)
}

fn trace_region(
    seg: &Segmentation,
    id: u32,
    component: &Component,
    mode: Mode,
    params: &TraceParameterSet,
) -> TracedRegion {
    let subpaths: Vec<SubPath> = contour::region_cycles(seg, id)
        .iter()
        .filter_map(|cycle| fit_cycle(cycle, params))
        .collect();
    let w = seg.width as usize;
    #[allow(clippy::cast_possible_truncation)]
    let first_pixel = ((component.first % w) as u32, (component.first / w) as u32);
    let color = match mode {
        Mode::Color => seg.palette[component.class as usize],
        Mode::Monochrome => Color::BLACK,
    };
    log::trace!(
        "trace: region {id} {color} area {} -> {} subpath(s)",
        component.area,
        subpaths.len()
    );
    TracedRegion {
        region: Region {
            color,
            area: component.area,
            bounds: component.bounds,
            first_pixel,
        },
        path: VectorPath { subpaths },
    }
}

/// Trace `input` into vector regions.
///
/// Zero surviving regions (a uniform bitmap, or everything below the turd
/// size) is a valid, empty result.
///
/// # Errors
///
/// Returns [`PipelineError::InvalidParameter`] if a trace parameter is
/// out of range.
#[must_use = "returns the traced regions"]
pub fn trace(
    input: &Bitmap,
    params: &TraceParameterSet,
    mode: Mode,
) -> Result<Trace, PipelineError> {
    params.validate()?;
    let dimensions = Dimensions::of(input);
    if dimensions.pixel_count() == 0 {
        return Ok(Trace {
            dimensions,
            background: None,
            regions: Vec::new(),
        });
    }

    let seg = regions::segment(input, mode, params.threshold, params.turd_size);
    let (background_class, background) = match mode {
        Mode::Color => {
            let class = seg.dominant_class();
            (class, class.map(|c| seg.palette[c as usize]))
        }
        Mode::Monochrome => (Some(regions::MONO_BACKGROUND), None),
    };

    let emitted: Vec<(u32, &Component)> = seg
        .components
        .iter()
        .enumerate()
        .filter(|(_, c)| {
            Some(c.class) != background_class
                && c.area >= params.turd_size
                && (mode == Mode::Color || c.class == MONO_FOREGROUND)
        })
        .map(|(id, c)| {
            #[allow(clippy::cast_possible_truncation)]
            let id = id as u32;
            (id, c)
        })
        .collect();

    let regions: Vec<TracedRegion> = emitted
        .par_iter()
        .map(|&(id, c)| trace_region(&seg, id, c, mode, params))
        .filter(|r| !r.path.is_empty())
        .collect();

    log::debug!(
        "trace: {}x{} {mode}, {} component(s), {} region(s) emitted, background {}",
        dimensions.width,
        dimensions.height,
        seg.components.len(),
        regions.len(),
        background.map_or_else(|| "none".to_owned(), |c| c.hex()),
    );

    Ok(Trace {
        dimensions,
        background,
        regions,
    })
}
