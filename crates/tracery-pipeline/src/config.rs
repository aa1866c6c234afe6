//! Parameter sets and the bundled [`PipelineConfig`].
//!
//! Every parameter has a documented inclusive range and an initial value.
//! Ranges are checked by each set's `validate()`, which every stage calls
//! before touching a pixel.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::PipelineError;

/// Default brightness (percent, identity).
pub const DEFAULT_BRIGHTNESS: f64 = 100.0;
/// Default contrast (percent, identity).
pub const DEFAULT_CONTRAST: f64 = 100.0;
/// Default grayscale amount (percent, identity).
pub const DEFAULT_GRAYSCALE: f64 = 0.0;
/// Default hue rotation (degrees, identity).
pub const DEFAULT_HUE_ROTATE: f64 = 0.0;
/// Default invert amount (percent, identity).
pub const DEFAULT_INVERT: f64 = 0.0;
/// Default opacity (percent, identity).
pub const DEFAULT_OPACITY: f64 = 100.0;
/// Default saturation (percent, identity).
pub const DEFAULT_SATURATE: f64 = 100.0;
/// Default sepia amount (percent, identity).
pub const DEFAULT_SEPIA: f64 = 0.0;

/// Default posterize step count for the color channels.
pub const DEFAULT_COLOR_STEPS: u8 = 5;
/// Default posterize step count for alpha.
pub const DEFAULT_ALPHA_STEPS: u8 = 1;
/// Fewest posterize steps per channel.
pub const MIN_STEPS: u8 = 1;
/// Most posterize steps per channel.
pub const MAX_STEPS: u8 = 10;

/// Default scale percentage.
pub const DEFAULT_SCALE_PERCENT: f64 = 100.0;
/// Smallest scale percentage.
pub const MIN_SCALE_PERCENT: f64 = 1.0;
/// Largest scale percentage.
pub const MAX_SCALE_PERCENT: f64 = 100.0;

/// Default turd size in pixels.
pub const DEFAULT_TURD_SIZE: u32 = 2;
/// Smallest turd size.
pub const MIN_TURD_SIZE: u32 = 1;
/// Largest turd size.
pub const MAX_TURD_SIZE: u32 = 50;
/// Default potrace corner threshold.
pub const DEFAULT_ALPHA_MAX: f64 = 1.0;
/// Corner threshold at which no vertex is ever treated as a corner.
pub const MAX_ALPHA_MAX: f64 = 4.0 / 3.0;
/// Default curve-optimization tolerance.
pub const DEFAULT_OPT_TOLERANCE: f64 = 0.2;
/// Largest curve-optimization tolerance.
pub const MAX_OPT_TOLERANCE: f64 = 5.0;
/// Default monochrome luma threshold.
pub const DEFAULT_THRESHOLD: u8 = 128;

/// Reject non-finite values and values outside `[min, max]`.
pub(crate) fn check_range(name: &str, value: f64, min: f64, max: f64) -> Result<(), PipelineError> {
    if value.is_finite() && (min..=max).contains(&value) {
        Ok(())
    } else {
        Err(PipelineError::invalid(name, value, min, max))
    }
}

/// The eight color filters, in the fixed order they are applied.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FilterKind {
    /// Linear RGB multiplier.
    Brightness,
    /// Scale around mid-gray.
    Contrast,
    /// Blend toward luminance.
    Grayscale,
    /// Rotate hue by an angle in degrees.
    HueRotate,
    /// Blend toward the inverted color.
    Invert,
    /// Multiply alpha.
    Opacity,
    /// Scale saturation.
    Saturate,
    /// Blend toward a sepia tone.
    Sepia,
}

impl FilterKind {
    /// Application order.
    pub const ORDER: [Self; 8] = [
        Self::Brightness,
        Self::Contrast,
        Self::Grayscale,
        Self::HueRotate,
        Self::Invert,
        Self::Opacity,
        Self::Saturate,
        Self::Sepia,
    ];

    /// Parameter name used in errors and serialized configs.
    #[must_use]
    pub const fn name(self) -> &'static str {
        match self {
            Self::Brightness => "brightness",
            Self::Contrast => "contrast",
            Self::Grayscale => "grayscale",
            Self::HueRotate => "hue_rotate",
            Self::Invert => "invert",
            Self::Opacity => "opacity",
            Self::Saturate => "saturate",
            Self::Sepia => "sepia",
        }
    }

    /// Inclusive `(min, max)` range of the parameter.
    #[must_use]
    pub const fn range(self) -> (f64, f64) {
        match self {
            Self::Brightness | Self::Contrast | Self::Saturate => (0.0, 200.0),
            Self::Grayscale | Self::Invert | Self::Opacity | Self::Sepia => (0.0, 100.0),
            Self::HueRotate => (0.0, 360.0),
        }
    }

    /// The value at which the filter leaves pixels unchanged.
    #[must_use]
    pub const fn identity(self) -> f64 {
        match self {
            Self::Brightness => DEFAULT_BRIGHTNESS,
            Self::Contrast => DEFAULT_CONTRAST,
            Self::Grayscale => DEFAULT_GRAYSCALE,
            Self::HueRotate => DEFAULT_HUE_ROTATE,
            Self::Invert => DEFAULT_INVERT,
            Self::Opacity => DEFAULT_OPACITY,
            Self::Saturate => DEFAULT_SATURATE,
            Self::Sepia => DEFAULT_SEPIA,
        }
    }
}

impl fmt::Display for FilterKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Color adjustments, as CSS filter amounts.
///
/// Percentages are in the CSS sense: `100` for brightness means "unchanged",
/// `100` for invert means "fully inverted". Hue rotation is in degrees.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct FilterParameterSet {
    /// Brightness, percent in `[0, 200]`.
    pub brightness: f64,
    /// Contrast, percent in `[0, 200]`.
    pub contrast: f64,
    /// Grayscale, percent in `[0, 100]`.
    pub grayscale: f64,
    /// Hue rotation, degrees in `[0, 360]`.
    pub hue_rotate: f64,
    /// Invert, percent in `[0, 100]`.
    pub invert: f64,
    /// Opacity, percent in `[0, 100]`.
    pub opacity: f64,
    /// Saturation, percent in `[0, 200]`.
    pub saturate: f64,
    /// Sepia, percent in `[0, 100]`.
    pub sepia: f64,
}

impl Default for FilterParameterSet {
    fn default() -> Self {
        Self {
            brightness: DEFAULT_BRIGHTNESS,
            contrast: DEFAULT_CONTRAST,
            grayscale: DEFAULT_GRAYSCALE,
            hue_rotate: DEFAULT_HUE_ROTATE,
            invert: DEFAULT_INVERT,
            opacity: DEFAULT_OPACITY,
            saturate: DEFAULT_SATURATE,
            sepia: DEFAULT_SEPIA,
        }
    }
}

impl FilterParameterSet {
    /// The amount configured for `kind`.
    #[must_use]
    pub const fn get(&self, kind: FilterKind) -> f64 {
        match kind {
            FilterKind::Brightness => self.brightness,
            FilterKind::Contrast => self.contrast,
            FilterKind::Grayscale => self.grayscale,
            FilterKind::HueRotate => self.hue_rotate,
            FilterKind::Invert => self.invert,
            FilterKind::Opacity => self.opacity,
            FilterKind::Saturate => self.saturate,
            FilterKind::Sepia => self.sepia,
        }
    }

    /// Filters whose amount differs from identity, in application order.
    #[must_use]
    pub fn active(&self) -> Vec<(FilterKind, f64)> {
        FilterKind::ORDER
            .iter()
            .map(|&kind| (kind, self.get(kind)))
            .filter(|&(kind, value)| value != kind.identity())
            .collect()
    }

    /// Returns `true` when every filter sits at its identity value.
    #[must_use]
    pub fn is_identity(&self) -> bool {
        self.active().is_empty()
    }

    /// Check every amount against its range.
    ///
    /// # Errors
    ///
    /// Returns [`PipelineError::InvalidParameter`] for the first amount,
    /// in application order, that is non-finite or out of range.
    pub fn validate(&self) -> Result<(), PipelineError> {
        for kind in FilterKind::ORDER {
            let (min, max) = kind.range();
            check_range(kind.name(), self.get(kind), min, max)?;
        }
        Ok(())
    }
}

/// Per-channel posterization step counts.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct PosterizeParameterSet {
    /// When `false` the quantizer passes the bitmap through unchanged.
    pub enabled: bool,
    /// Red steps, `[1, 10]`.
    pub red: u8,
    /// Green steps, `[1, 10]`.
    pub green: u8,
    /// Blue steps, `[1, 10]`.
    pub blue: u8,
    /// Alpha steps, `[1, 10]`.
    pub alpha: u8,
}

impl Default for PosterizeParameterSet {
    fn default() -> Self {
        Self {
            enabled: true,
            red: DEFAULT_COLOR_STEPS,
            green: DEFAULT_COLOR_STEPS,
            blue: DEFAULT_COLOR_STEPS,
            alpha: DEFAULT_ALPHA_STEPS,
        }
    }
}

impl PosterizeParameterSet {
    /// Step counts as `[red, green, blue, alpha]`.
    #[must_use]
    pub const fn steps(&self) -> [u8; 4] {
        [self.red, self.green, self.blue, self.alpha]
    }

    /// Check every step count against `[1, 10]`.
    ///
    /// Step counts are validated even when posterization is disabled so a
    /// stored configuration is never silently out of range.
    ///
    /// # Errors
    ///
    /// Returns [`PipelineError::InvalidParameter`] for the first step
    /// count outside the range.
    pub fn validate(&self) -> Result<(), PipelineError> {
        let names = ["red", "green", "blue", "alpha"];
        for (name, steps) in names.into_iter().zip(self.steps()) {
            check_range(
                name,
                f64::from(steps),
                f64::from(MIN_STEPS),
                f64::from(MAX_STEPS),
            )?;
        }
        Ok(())
    }
}

/// Output size as a percentage of the input, `[1, 100]`.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ScaleParameter(pub f64);

impl Default for ScaleParameter {
    fn default() -> Self {
        Self(DEFAULT_SCALE_PERCENT)
    }
}

impl ScaleParameter {
    /// The percentage.
    #[must_use]
    pub const fn percent(self) -> f64 {
        self.0
    }

    /// # Errors
    ///
    /// Returns [`PipelineError::InvalidParameter`] if the percentage is
    /// non-finite or outside `[1, 100]`.
    pub fn validate(self) -> Result<(), PipelineError> {
        check_range("scale", self.0, MIN_SCALE_PERCENT, MAX_SCALE_PERCENT)
    }
}

/// Tracing parameters.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TraceParameterSet {
    /// Regions with fewer pixels than this are absorbed into a neighbor.
    pub turd_size: u32,
    /// Corner threshold: vertices whose smoothness is at or above this
    /// value stay sharp corners. `0` makes every vertex a corner.
    pub alpha_max: f64,
    /// Merge runs of curves into fewer Bézier segments.
    pub opt_curve: bool,
    /// How far a merged curve may deviate from the original ones.
    pub opt_tolerance: f64,
    /// Monochrome only: pixels with Rec. 601 luma below this are foreground.
    pub threshold: u8,
}

impl Default for TraceParameterSet {
    fn default() -> Self {
        Self {
            turd_size: DEFAULT_TURD_SIZE,
            alpha_max: DEFAULT_ALPHA_MAX,
            opt_curve: true,
            opt_tolerance: DEFAULT_OPT_TOLERANCE,
            threshold: DEFAULT_THRESHOLD,
        }
    }
}

impl TraceParameterSet {
    /// # Errors
    ///
    /// Returns [`PipelineError::InvalidParameter`] for an out-of-range turd
    /// size, corner threshold, or tolerance.
    pub fn validate(&self) -> Result<(), PipelineError> {
        check_range(
            "turd_size",
            f64::from(self.turd_size),
            f64::from(MIN_TURD_SIZE),
            f64::from(MAX_TURD_SIZE),
        )?;
        check_range("alpha_max", self.alpha_max, 0.0, MAX_ALPHA_MAX)?;
        check_range("opt_tolerance", self.opt_tolerance, 0.0, MAX_OPT_TOLERANCE)
    }
}

/// How traced regions become SVG paths.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Mode {
    /// One path per non-background color region, filled with its color.
    #[default]
    Color,
    /// Foreground/background split by luma; foreground paths are black.
    Monochrome,
}

impl fmt::Display for Mode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Color => "color",
            Self::Monochrome => "monochrome",
        })
    }
}

impl FromStr for Mode {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "color" | "colour" => Ok(Self::Color),
            "monochrome" | "mono" => Ok(Self::Monochrome),
            other => Err(format!("unknown mode {other:?} (expected color or monochrome)")),
        }
    }
}

/// Every parameter of one pipeline run.
///
/// A run clones the config it is given, so later edits never affect an
/// in-flight run.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PipelineConfig {
    /// Color or monochrome output.
    pub mode: Mode,
    /// Color adjustments.
    pub filters: FilterParameterSet,
    /// Output size.
    pub scale: ScaleParameter,
    /// Quantization.
    pub posterize: PosterizeParameterSet,
    /// Tracing.
    pub trace: TraceParameterSet,
}

impl PipelineConfig {
    /// Validate every parameter set, in stage order.
    ///
    /// # Errors
    ///
    /// Returns the first [`PipelineError::InvalidParameter`] found.
    pub fn validate(&self) -> Result<(), PipelineError> {
        self.filters.validate()?;
        self.scale.validate()?;
        self.posterize.validate()?;
        self.trace.validate()
    }
}
