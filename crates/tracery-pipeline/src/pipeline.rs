//! Incremental pipeline: advance stage-by-stage, inspecting each
//! intermediate result before continuing.
//!
//! Unlike [`crate::process`] which runs the entire pipeline in one call,
//! [`Pipeline`] lets the caller drive execution one step at a time:
//!
//! ```rust
//! # use tracery_pipeline::{Bitmap, Pipeline, PipelineConfig, PipelineError};
//! # fn run(bitmap: Bitmap) -> Result<(), PipelineError> {
//! let staged = Pipeline::new(bitmap, PipelineConfig::default())
//!     .filter()?
//!     .scale()?
//!     .posterize()?
//!     .trace()?
//!     .into_result();
//! # Ok(())
//! # }
//! ```
//!
//! Each stage method consumes `self` and returns the next pipeline state,
//! carrying all previously computed intermediates. Every stage validates
//! its own parameter set, so an invalid value fails at the stage that
//! reads it.
//!
//! # Memory
//!
//! Every stage retains the bitmaps produced before it, so a presentation
//! layer can preview each step. Callers that only need the traced regions
//! should prefer [`crate::process`].

use serde::{Deserialize, Serialize};

use crate::config::{Mode, PipelineConfig};
use crate::diagnostics::StageMetrics;
use crate::error::PipelineError;
use crate::trace::Trace;
use crate::types::Bitmap;

// ───────────────────────── Stage 0: Pending ──────────────────────────

/// Pipeline state before any processing has occurred.
#[must_use = "pipeline stages are consumed by advancing; call .filter() to continue"]
pub struct Pending {
    config: PipelineConfig,
    original: Bitmap,
}

impl Pending {
    /// The input bitmap.
    #[must_use]
    pub const fn original(&self) -> &Bitmap {
        &self.original
    }

    /// Apply the color filters and advance to [`Filtered`].
    ///
    /// # Errors
    ///
    /// Returns [`PipelineError::InvalidParameter`] if a filter amount is
    /// out of range.
    pub fn filter(self) -> Result<Filtered, PipelineError> {
        let filtered = crate::filter::apply_filters(&self.original, &self.config.filters)?;
        Ok(Filtered {
            config: self.config,
            original: self.original,
            filtered,
        })
    }
}

// ───────────────────────── Stage 1: Filtered ─────────────────────────

/// Pipeline state after the color filters.
#[must_use = "pipeline stages are consumed by advancing; call .scale() to continue"]
pub struct Filtered {
    config: PipelineConfig,
    original: Bitmap,
    filtered: Bitmap,
}

impl Filtered {
    /// The filtered bitmap.
    #[must_use]
    pub const fn filtered(&self) -> &Bitmap {
        &self.filtered
    }

    /// Metrics for the filter stage.
    #[must_use]
    pub fn stage_metrics(&self) -> StageMetrics {
        StageMetrics::Filter {
            active: self
                .config
                .filters
                .active()
                .into_iter()
                .map(|(kind, amount)| format!("{kind}({amount})"))
                .collect(),
            width: self.filtered.width(),
            height: self.filtered.height(),
        }
    }

    /// Resample and advance to [`Scaled`].
    ///
    /// # Errors
    ///
    /// Returns [`PipelineError::InvalidParameter`] if the percentage is
    /// out of range.
    pub fn scale(self) -> Result<Scaled, PipelineError> {
        let scaled = crate::scale::scale(&self.filtered, self.config.scale)?;
        Ok(Scaled {
            config: self.config,
            original: self.original,
            filtered: self.filtered,
            scaled,
        })
    }
}

// ───────────────────────── Stage 2: Scaled ───────────────────────────

/// Pipeline state after scaling.
#[must_use = "pipeline stages are consumed by advancing; call .posterize() to continue"]
pub struct Scaled {
    config: PipelineConfig,
    original: Bitmap,
    filtered: Bitmap,
    scaled: Bitmap,
}

impl Scaled {
    /// The scaled bitmap.
    #[must_use]
    pub const fn scaled(&self) -> &Bitmap {
        &self.scaled
    }

    /// Metrics for the scale stage.
    #[must_use]
    pub fn stage_metrics(&self) -> StageMetrics {
        let percent = self.config.scale.percent();
        StageMetrics::Scale {
            original_width: self.filtered.width(),
            original_height: self.filtered.height(),
            width: self.scaled.width(),
            height: self.scaled.height(),
            percent,
            applied: percent < crate::config::MAX_SCALE_PERCENT,
        }
    }

    /// Quantize and advance to [`Posterized`].
    ///
    /// # Errors
    ///
    /// Returns [`PipelineError::InvalidParameter`] if a step count is out
    /// of range, even when posterization is disabled.
    pub fn posterize(self) -> Result<Posterized, PipelineError> {
        let posterized = crate::posterize::posterize(&self.scaled, &self.config.posterize)?;
        Ok(Posterized {
            config: self.config,
            original: self.original,
            filtered: self.filtered,
            scaled: self.scaled,
            posterized,
        })
    }
}

// ───────────────────────── Stage 3: Posterized ───────────────────────

/// Pipeline state after posterization.
#[must_use = "pipeline stages are consumed by advancing; call .trace() to continue"]
pub struct Posterized {
    config: PipelineConfig,
    original: Bitmap,
    filtered: Bitmap,
    scaled: Bitmap,
    posterized: Bitmap,
}

impl Posterized {
    /// The posterized bitmap: the tracer's input.
    #[must_use]
    pub const fn posterized(&self) -> &Bitmap {
        &self.posterized
    }

    /// Metrics for the posterize stage.
    #[must_use]
    pub fn stage_metrics(&self) -> StageMetrics {
        StageMetrics::Posterize {
            enabled: self.config.posterize.enabled,
            steps: self.config.posterize.steps(),
            distinct_colors: crate::diagnostics::distinct_colors(&self.posterized),
        }
    }

    /// Trace regions and advance to [`Traced`], the final stage.
    ///
    /// # Errors
    ///
    /// Returns [`PipelineError::InvalidParameter`] if a trace parameter
    /// is out of range.
    pub fn trace(self) -> Result<Traced, PipelineError> {
        let trace =
            crate::trace::trace(&self.posterized, &self.config.trace, self.config.mode)?;
        Ok(Traced {
            config: self.config,
            original: self.original,
            filtered: self.filtered,
            scaled: self.scaled,
            posterized: self.posterized,
            trace,
        })
    }
}

// ───────────────────────── Stage 4: Traced ───────────────────────────

/// Pipeline state after tracing: the final stage.
#[must_use = "call .into_result() to extract the StagedResult"]
pub struct Traced {
    config: PipelineConfig,
    original: Bitmap,
    filtered: Bitmap,
    scaled: Bitmap,
    posterized: Bitmap,
    trace: Trace,
}

impl Traced {
    /// The traced regions.
    #[must_use]
    pub const fn trace(&self) -> &Trace {
        &self.trace
    }

    /// Metrics for the trace stage.
    #[must_use]
    pub fn stage_metrics(&self) -> StageMetrics {
        StageMetrics::Trace {
            mode: self.config.mode.to_string(),
            turd_size: self.config.trace.turd_size,
            region_count: self.trace.regions.len(),
            subpath_count: self
                .trace
                .regions
                .iter()
                .map(|r| r.path.subpaths.len())
                .sum(),
            segment_count: self.trace.segment_count(),
            background: self.trace.background.map(crate::types::Color::hex),
        }
    }

    /// Consume the pipeline and return every intermediate.
    #[must_use]
    pub fn into_result(self) -> StagedResult {
        StagedResult {
            mode: self.config.mode,
            original: self.original,
            filtered: self.filtered,
            scaled: self.scaled,
            posterized: self.posterized,
            trace: self.trace,
        }
    }
}

// ──────────────────── PipelineStage trait + Stage enum ────────────────

/// Total number of stages in the pipeline.
pub const STAGE_COUNT: usize = 5;

/// The output produced by a single pipeline stage.
#[must_use]
pub enum StageOutput<'a> {
    /// The input bitmap.
    Source {
        /// The bitmap as supplied.
        bitmap: &'a Bitmap,
    },
    /// Color-filtered bitmap.
    Filtered {
        /// The filtered bitmap.
        bitmap: &'a Bitmap,
    },
    /// Scaled bitmap.
    Scaled {
        /// The scaled bitmap.
        bitmap: &'a Bitmap,
    },
    /// Posterized bitmap.
    Posterized {
        /// The posterized bitmap.
        bitmap: &'a Bitmap,
    },
    /// Traced regions.
    Traced {
        /// The trace.
        trace: &'a Trace,
    },
}

impl StageOutput<'_> {
    /// The preview bitmap for this stage, if it produced one.
    #[must_use]
    pub const fn bitmap(&self) -> Option<&Bitmap> {
        match self {
            Self::Source { bitmap }
            | Self::Filtered { bitmap }
            | Self::Scaled { bitmap }
            | Self::Posterized { bitmap } => Some(*bitmap),
            Self::Traced { .. } => None,
        }
    }
}

/// Trait implemented by every pipeline stage, enabling uniform iteration.
pub trait PipelineStage: Sized {
    /// Human-readable name of this stage (e.g. `"source"`, `"trace"`).
    const NAME: &str;

    /// Zero-based index of this stage.
    const INDEX: usize;

    /// The output this stage produced.
    fn output(&self) -> StageOutput<'_>;

    /// Stage-specific metrics, `None` for [`Pending`].
    fn metrics(&self) -> Option<StageMetrics>;

    /// Advance to the next stage. Returns `Ok(None)` at the final stage.
    ///
    /// # Errors
    ///
    /// Returns [`PipelineError::InvalidParameter`] when the next stage's
    /// parameters are out of range.
    fn next(self) -> Result<Option<Stage>, PipelineError>;

    /// Run all remaining stages to completion.
    ///
    /// # Errors
    ///
    /// Returns [`PipelineError`] if any remaining stage fails.
    fn complete(self) -> Result<StagedResult, PipelineError>;
}

impl PipelineStage for Pending {
    const NAME: &str = "source";
    const INDEX: usize = 0;

    fn output(&self) -> StageOutput<'_> {
        StageOutput::Source {
            bitmap: &self.original,
        }
    }

    fn metrics(&self) -> Option<StageMetrics> {
        None
    }

    fn next(self) -> Result<Option<Stage>, PipelineError> {
        Ok(Some(Stage::Filtered(self.filter()?)))
    }

    fn complete(self) -> Result<StagedResult, PipelineError> {
        self.filter()?.complete()
    }
}

impl PipelineStage for Filtered {
    const NAME: &str = "filter";
    const INDEX: usize = 1;

    fn output(&self) -> StageOutput<'_> {
        StageOutput::Filtered {
            bitmap: &self.filtered,
        }
    }

    fn metrics(&self) -> Option<StageMetrics> {
        Some(self.stage_metrics())
    }

    fn next(self) -> Result<Option<Stage>, PipelineError> {
        Ok(Some(Stage::Scaled(self.scale()?)))
    }

    fn complete(self) -> Result<StagedResult, PipelineError> {
        self.scale()?.complete()
    }
}

impl PipelineStage for Scaled {
    const NAME: &str = "scale";
    const INDEX: usize = 2;

    fn output(&self) -> StageOutput<'_> {
        StageOutput::Scaled {
            bitmap: &self.scaled,
        }
    }

    fn metrics(&self) -> Option<StageMetrics> {
        Some(self.stage_metrics())
    }

    fn next(self) -> Result<Option<Stage>, PipelineError> {
        Ok(Some(Stage::Posterized(self.posterize()?)))
    }

    fn complete(self) -> Result<StagedResult, PipelineError> {
        self.posterize()?.complete()
    }
}

impl PipelineStage for Posterized {
    const NAME: &str = "posterize";
    const INDEX: usize = 3;

    fn output(&self) -> StageOutput<'_> {
        StageOutput::Posterized {
            bitmap: &self.posterized,
        }
    }

    fn metrics(&self) -> Option<StageMetrics> {
        Some(self.stage_metrics())
    }

    fn next(self) -> Result<Option<Stage>, PipelineError> {
        Ok(Some(Stage::Traced(self.trace()?)))
    }

    fn complete(self) -> Result<StagedResult, PipelineError> {
        self.trace()?.complete()
    }
}

impl PipelineStage for Traced {
    const NAME: &str = "trace";
    const INDEX: usize = 4;

    fn output(&self) -> StageOutput<'_> {
        StageOutput::Traced { trace: &self.trace }
    }

    fn metrics(&self) -> Option<StageMetrics> {
        Some(self.stage_metrics())
    }

    fn next(self) -> Result<Option<Stage>, PipelineError> {
        Ok(None)
    }

    fn complete(self) -> Result<StagedResult, PipelineError> {
        Ok(self.into_result())
    }
}

/// Enum wrapping all pipeline stages for uniform, loopable access.
///
/// ```rust
/// # use tracery_pipeline::{Bitmap, Pipeline, PipelineConfig, PipelineError};
/// # use tracery_pipeline::pipeline::{Advance, Stage};
/// # fn run(bitmap: Bitmap) -> Result<(), PipelineError> {
/// let mut stage: Stage = Pipeline::new(bitmap, PipelineConfig::default()).into();
/// loop {
///     match stage.advance()? {
///         Advance::Next(next) => stage = next,
///         Advance::Complete(done) => { stage = done; break; }
///     }
/// }
/// let result = stage.complete()?;
/// # Ok(())
/// # }
/// ```
#[must_use]
pub enum Stage {
    /// See [`Pending`].
    Pending(Pending),
    /// See [`Filtered`].
    Filtered(Filtered),
    /// See [`Scaled`].
    Scaled(Scaled),
    /// See [`Posterized`].
    Posterized(Posterized),
    /// See [`Traced`].
    Traced(Traced),
}

/// Compile-time guard: adding a [`Stage`] variant breaks this match until
/// [`STAGE_COUNT`] is revisited.
#[allow(dead_code, clippy::match_same_arms)]
const fn _stage_count_guard(s: &Stage) {
    match s {
        Stage::Pending(_)
        | Stage::Filtered(_)
        | Stage::Scaled(_)
        | Stage::Posterized(_)
        | Stage::Traced(_) => {}
    }
}

/// Result of [`Stage::advance`]: either the next stage or the completed
/// final stage returned unchanged.
#[must_use]
pub enum Advance {
    /// The pipeline advanced to this next stage.
    Next(Stage),
    /// The pipeline was already at the final stage.
    Complete(Stage),
}

/// Delegate a method call to whichever `Stage` variant is active.
macro_rules! delegate {
    ($self:ident, $method:ident $(, $arg:expr)*) => {
        match $self {
            Self::Pending(s) => s.$method($($arg),*),
            Self::Filtered(s) => s.$method($($arg),*),
            Self::Scaled(s) => s.$method($($arg),*),
            Self::Posterized(s) => s.$method($($arg),*),
            Self::Traced(s) => s.$method($($arg),*),
        }
    };
}

impl Stage {
    /// Human-readable name of the current stage.
    #[must_use]
    pub fn name(&self) -> &'static str {
        delegate!(self, name)
    }

    /// Zero-based index of the current stage.
    #[must_use]
    pub fn index(&self) -> usize {
        delegate!(self, index)
    }

    /// The output this stage produced.
    pub fn output(&self) -> StageOutput<'_> {
        delegate!(self, output)
    }

    /// Stage-specific metrics, `None` for `Pending`.
    #[must_use]
    pub fn metrics(&self) -> Option<StageMetrics> {
        delegate!(self, metrics)
    }

    /// Whether the pipeline is at the final stage.
    #[must_use]
    pub const fn is_complete(&self) -> bool {
        matches!(self, Self::Traced(_))
    }

    /// Advance to the next stage, returning `Ok(None)` (and dropping the
    /// final stage) if already complete.
    ///
    /// # Errors
    ///
    /// Returns [`PipelineError`] if the stage transition fails.
    pub fn next(self) -> Result<Option<Self>, PipelineError> {
        delegate!(self, next)
    }

    /// Advance to the next stage, returning `self` unchanged if already
    /// complete.
    ///
    /// # Errors
    ///
    /// Returns [`PipelineError`] if the stage transition fails.
    pub fn advance(self) -> Result<Advance, PipelineError> {
        if self.is_complete() {
            return Ok(Advance::Complete(self));
        }
        // Only `Traced` returns `None`, and it was handled above.
        #[allow(clippy::unreachable)]
        let next = self
            .next()?
            .unwrap_or_else(|| unreachable!("non-final stage returned None from next()"));
        Ok(Advance::Next(next))
    }

    /// Run all remaining stages to completion.
    ///
    /// # Errors
    ///
    /// Returns [`PipelineError`] if any remaining stage fails.
    pub fn complete(self) -> Result<StagedResult, PipelineError> {
        delegate!(self, complete)
    }
}

// Private helper so the macro can call `.name()` and `.index()` on
// `&self`; associated constants are not reachable through a value.
trait StageMetadata {
    fn name(&self) -> &'static str;
    fn index(&self) -> usize;
}

impl<T: PipelineStage> StageMetadata for T {
    fn name(&self) -> &'static str {
        T::NAME
    }

    fn index(&self) -> usize {
        T::INDEX
    }
}

impl From<Pending> for Stage {
    fn from(s: Pending) -> Self {
        Self::Pending(s)
    }
}

impl From<Filtered> for Stage {
    fn from(s: Filtered) -> Self {
        Self::Filtered(s)
    }
}

impl From<Scaled> for Stage {
    fn from(s: Scaled) -> Self {
        Self::Scaled(s)
    }
}

impl From<Posterized> for Stage {
    fn from(s: Posterized) -> Self {
        Self::Posterized(s)
    }
}

impl From<Traced> for Stage {
    fn from(s: Traced) -> Self {
        Self::Traced(s)
    }
}

// ───────────────────── Pipeline entry point ──────────────────────────

/// Incremental raster-to-vector pipeline.
///
/// Created via [`Pipeline::new`], which stores the bitmap and config
/// without doing any processing. Each stage method consumes the current
/// state and returns the next, so stages cannot be skipped or reordered.
pub struct Pipeline;

impl Pipeline {
    /// Create a new pipeline from an input bitmap and config.
    #[allow(clippy::new_ret_no_self)]
    pub const fn new(bitmap: Bitmap, config: PipelineConfig) -> Pending {
        Pending {
            config,
            original: bitmap,
        }
    }
}

// ───────────────────────── StagedResult ──────────────────────────────

/// Every intermediate of one pipeline run.
#[derive(Debug, Clone, PartialEq)]
pub struct StagedResult {
    /// Output mode the run traced with.
    pub mode: Mode,
    /// Input bitmap.
    pub original: Bitmap,
    /// After color filters.
    pub filtered: Bitmap,
    /// After scaling.
    pub scaled: Bitmap,
    /// After posterization: the tracer's input.
    pub posterized: Bitmap,
    /// Traced regions.
    pub trace: Trace,
}

/// Serde-compatible proxy for `StagedResult`.
///
/// Bitmaps are represented as `(width, height, raw_pixel_bytes)` tuples
/// since `image::ImageBuffer` does not implement serde traits.
#[derive(Serialize, Deserialize)]
struct StagedResultProxy {
    mode: Mode,
    original: (u32, u32, Vec<u8>),
    filtered: (u32, u32, Vec<u8>),
    scaled: (u32, u32, Vec<u8>),
    posterized: (u32, u32, Vec<u8>),
    trace: Trace,
}

fn raw(bitmap: &Bitmap) -> (u32, u32, Vec<u8>) {
    (bitmap.width(), bitmap.height(), bitmap.as_raw().clone())
}

fn from_raw<E: serde::de::Error>(
    (width, height, data): (u32, u32, Vec<u8>),
    what: &str,
) -> Result<Bitmap, E> {
    Bitmap::from_raw(width, height, data)
        .ok_or_else(|| E::custom(format!("invalid {what} bitmap dimensions")))
}

impl Serialize for StagedResult {
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        StagedResultProxy {
            mode: self.mode,
            original: raw(&self.original),
            filtered: raw(&self.filtered),
            scaled: raw(&self.scaled),
            posterized: raw(&self.posterized),
            trace: self.trace.clone(),
        }
        .serialize(serializer)
    }
}

impl<'de> Deserialize<'de> for StagedResult {
    fn deserialize<D: serde::Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let proxy = StagedResultProxy::deserialize(deserializer)?;
        Ok(Self {
            mode: proxy.mode,
            original: from_raw(proxy.original, "original")?,
            filtered: from_raw(proxy.filtered, "filtered")?,
            scaled: from_raw(proxy.scaled, "scaled")?,
            posterized: from_raw(proxy.posterized, "posterized")?,
            trace: proxy.trace,
        })
    }
}
