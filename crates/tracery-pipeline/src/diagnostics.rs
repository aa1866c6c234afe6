//! Pipeline diagnostics: timing, counts, and other metrics for each stage.
//!
//! Every call to [`process_staged_with_diagnostics`] collects diagnostics
//! alongside the pipeline results. Timestamps come from a caller-supplied
//! [`Clock`] so the crate stays free of platform time sources.
//!
//! Durations are serialized as fractional seconds (`f64`) for JSON
//! compatibility, since `std::time::Duration` does not implement serde
//! traits.

use std::collections::HashSet;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::config::PipelineConfig;
use crate::error::PipelineError;
use crate::pipeline::{Pipeline, StagedResult};
use crate::types::Bitmap;

/// Serde support for `std::time::Duration` as fractional seconds.
mod duration_serde {
    use std::time::Duration;

    use serde::{Deserialize, Deserializer, Serialize, Serializer};

    /// Serialize a `Duration` as fractional seconds (`f64`).
    pub fn serialize<S: Serializer>(duration: &Duration, serializer: S) -> Result<S::Ok, S::Error> {
        duration.as_secs_f64().serialize(serializer)
    }

    /// Deserialize a `Duration` from fractional seconds (`f64`).
    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Duration, D::Error> {
        let secs = f64::deserialize(deserializer)?;
        Duration::try_from_secs_f64(secs).map_err(|_| {
            serde::de::Error::custom(
                "duration seconds must be finite, non-negative, and representable as a Duration",
            )
        })
    }
}

/// Source of timestamps for stage timing.
pub trait Clock {
    /// Opaque timestamp.
    type Instant;

    /// The current time.
    fn now(&self) -> Self::Instant;

    /// Time elapsed since `since`.
    fn elapsed(&self, since: &Self::Instant) -> Duration;
}

/// Diagnostics collected from a single pipeline run.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PipelineDiagnostics {
    /// Image decoding.
    pub decode: StageDiagnostics,
    /// Color filters.
    pub filter: StageDiagnostics,
    /// Scaling.
    pub scale: StageDiagnostics,
    /// Posterization.
    pub posterize: StageDiagnostics,
    /// Region tracing and curve fitting.
    pub trace: StageDiagnostics,
    /// Total wall-clock duration of the entire pipeline (seconds).
    #[serde(with = "duration_serde")]
    pub total_duration: Duration,
    /// Summary counts across all stages.
    pub summary: PipelineSummary,
}

/// Diagnostics for a single pipeline stage.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StageDiagnostics {
    /// Wall-clock duration of this stage (seconds).
    #[serde(with = "duration_serde")]
    pub duration: Duration,
    /// Stage-specific metrics (counts, sizes, etc.).
    pub metrics: StageMetrics,
}

/// Stage-specific metrics that vary by pipeline stage.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum StageMetrics {
    /// Image decoding metrics.
    Decode {
        /// Size of the input image bytes.
        input_bytes: usize,
        /// Decoded image width in pixels.
        width: u32,
        /// Decoded image height in pixels.
        height: u32,
        /// Total pixel count (`width * height`).
        pixel_count: u64,
    },
    /// Color filter metrics.
    Filter {
        /// Names of the non-identity filters that ran, in order.
        active: Vec<String>,
        /// Image width in pixels.
        width: u32,
        /// Image height in pixels.
        height: u32,
    },
    /// Scaling metrics.
    Scale {
        /// Width before scaling.
        original_width: u32,
        /// Height before scaling.
        original_height: u32,
        /// Width after scaling.
        width: u32,
        /// Height after scaling.
        height: u32,
        /// Requested percentage.
        percent: f64,
        /// Whether resampling actually happened (percent below 100).
        applied: bool,
    },
    /// Posterization metrics.
    Posterize {
        /// Whether quantization ran.
        enabled: bool,
        /// Red, green, blue, alpha step counts.
        steps: [u8; 4],
        /// Distinct RGBA values in the output.
        distinct_colors: usize,
    },
    /// Tracing metrics.
    Trace {
        /// Output mode.
        mode: String,
        /// Turd size used for the area cutoff.
        turd_size: u32,
        /// Number of emitted regions.
        region_count: usize,
        /// Number of closed sub-paths across all regions.
        subpath_count: usize,
        /// Number of line and curve segments across all regions.
        segment_count: usize,
        /// Background color, Color mode only.
        background: Option<String>,
    },
}

/// High-level summary counts for the entire pipeline.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PipelineSummary {
    /// Source image width in pixels.
    pub image_width: u32,
    /// Source image height in pixels.
    pub image_height: u32,
    /// Total source pixel count.
    pub pixel_count: u64,
    /// Width of the traced bitmap.
    pub output_width: u32,
    /// Height of the traced bitmap.
    pub output_height: u32,
    /// Number of emitted regions.
    pub region_count: usize,
    /// Segments across all emitted regions.
    pub segment_count: usize,
}

impl PipelineDiagnostics {
    /// Per-stage diagnostics in pipeline order, with display names.
    #[must_use]
    pub fn stages(&self) -> [(&'static str, &StageDiagnostics); 5] {
        [
            ("Decode", &self.decode),
            ("Filter", &self.filter),
            ("Scale", &self.scale),
            ("Posterize", &self.posterize),
            ("Trace", &self.trace),
        ]
    }

    /// Format diagnostics as a human-readable report.
    #[must_use]
    pub fn report(&self) -> String {
        let mut lines = Vec::new();

        lines.push(format!("Pipeline Diagnostics Report\n{}", "=".repeat(60)));
        lines.push(format!(
            "Image: {}x{} ({} pixels)",
            self.summary.image_width, self.summary.image_height, self.summary.pixel_count,
        ));
        lines.push(format!(
            "Total duration: {:.3}ms",
            duration_ms(self.total_duration),
        ));
        lines.push(String::new());

        lines.push(format!(
            "{:<24} {:>10} {:>10}  {}",
            "Stage", "Duration", "% Total", "Details"
        ));
        lines.push("-".repeat(80));

        let total_ms = duration_ms(self.total_duration);
        for (name, diag) in self.stages() {
            let ms = duration_ms(diag.duration);
            let pct = if total_ms > 0.0 {
                ms / total_ms * 100.0
            } else {
                0.0
            };
            let details = format_metrics(&diag.metrics);
            lines.push(format!("{name:<24} {ms:>8.3}ms {pct:>9.1}%  {details}"));
        }

        lines.push(String::new());
        lines.push(format!(
            "Output: {}x{}  |  Regions: {}  |  Segments: {}",
            self.summary.output_width,
            self.summary.output_height,
            self.summary.region_count,
            self.summary.segment_count,
        ));

        lines.join("\n")
    }
}

/// Convert a `Duration` to milliseconds as `f64`.
fn duration_ms(d: Duration) -> f64 {
    d.as_secs_f64() * 1000.0
}

/// Format stage metrics into a compact detail string.
fn format_metrics(metrics: &StageMetrics) -> String {
    match metrics {
        StageMetrics::Decode {
            input_bytes,
            width,
            height,
            ..
        } => format!("{input_bytes} bytes -> {width}x{height}"),
        StageMetrics::Filter { active, .. } => {
            if active.is_empty() {
                "identity".to_owned()
            } else {
                active.join(", ")
            }
        }
        StageMetrics::Scale {
            original_width,
            original_height,
            width,
            height,
            percent,
            applied,
        } => {
            if *applied {
                format!("{percent}% {original_width}x{original_height} -> {width}x{height}")
            } else {
                format!("{width}x{height} (not scaled)")
            }
        }
        StageMetrics::Posterize {
            enabled,
            steps,
            distinct_colors,
        } => {
            if *enabled {
                let [r, g, b, a] = steps;
                format!("steps r={r} g={g} b={b} a={a}, {distinct_colors} colors")
            } else {
                format!("disabled, {distinct_colors} colors")
            }
        }
        StageMetrics::Trace {
            mode,
            turd_size,
            region_count,
            subpath_count,
            segment_count,
            background,
        } => {
            let bg = background.as_deref().unwrap_or("none");
            format!(
                "{mode} turd={turd_size} {region_count} regions, {subpath_count} subpaths, {segment_count} segments, bg={bg}",
            )
        }
    }
}

/// Distinct RGBA values in a bitmap.
pub(crate) fn distinct_colors(bitmap: &Bitmap) -> usize {
    bitmap.pixels().map(|p| p.0).collect::<HashSet<_>>().len()
}

/// Decode `image_bytes`, run every stage, and time each one.
///
/// # Errors
///
/// Returns [`PipelineError::EmptyInput`] or
/// [`PipelineError::UnsupportedImage`] when decoding fails, and
/// [`PipelineError::InvalidParameter`] for the first out-of-range
/// parameter. The configuration is validated before decoding.
pub fn process_staged_with_diagnostics<C: Clock>(
    image_bytes: &[u8],
    config: &PipelineConfig,
    clock: &C,
) -> Result<(StagedResult, PipelineDiagnostics), PipelineError> {
    config.validate()?;
    let total_start = clock.now();

    let start = clock.now();
    let bitmap = crate::decode(image_bytes)?;
    let decode = StageDiagnostics {
        duration: clock.elapsed(&start),
        metrics: StageMetrics::Decode {
            input_bytes: image_bytes.len(),
            width: bitmap.width(),
            height: bitmap.height(),
            pixel_count: u64::from(bitmap.width()) * u64::from(bitmap.height()),
        },
    };

    let start = clock.now();
    let filtered = Pipeline::new(bitmap, config.clone()).filter()?;
    let filter = StageDiagnostics {
        duration: clock.elapsed(&start),
        metrics: filtered.stage_metrics(),
    };

    let start = clock.now();
    let scaled = filtered.scale()?;
    let scale = StageDiagnostics {
        duration: clock.elapsed(&start),
        metrics: scaled.stage_metrics(),
    };

    let start = clock.now();
    let posterized = scaled.posterize()?;
    let posterize = StageDiagnostics {
        duration: clock.elapsed(&start),
        metrics: posterized.stage_metrics(),
    };

    let start = clock.now();
    let traced = posterized.trace()?;
    let trace = StageDiagnostics {
        duration: clock.elapsed(&start),
        metrics: traced.stage_metrics(),
    };

    let total_duration = clock.elapsed(&total_start);
    let staged = traced.into_result();

    let summary = PipelineSummary {
        image_width: staged.original.width(),
        image_height: staged.original.height(),
        pixel_count: u64::from(staged.original.width()) * u64::from(staged.original.height()),
        output_width: staged.trace.dimensions.width,
        output_height: staged.trace.dimensions.height,
        region_count: staged.trace.regions.len(),
        segment_count: staged.trace.segment_count(),
    };

    log::debug!(
        "pipeline: {}x{} -> {} region(s) in {:.3}ms",
        summary.image_width,
        summary.image_height,
        summary.region_count,
        duration_ms(total_duration),
    );

    Ok((
        staged,
        PipelineDiagnostics {
            decode,
            filter,
            scale,
            posterize,
            trace,
            total_duration,
            summary,
        },
    ))
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use std::cell::Cell;

    use super::*;

    /// Advances one millisecond every time it is read.
    struct StepClock(Cell<u64>);

    impl Clock for StepClock {
        type Instant = u64;

        fn now(&self) -> u64 {
            let t = self.0.get();
            self.0.set(t + 1);
            t
        }

        fn elapsed(&self, since: &u64) -> Duration {
            Duration::from_millis(self.now() - since)
        }
    }

    fn png_bytes(img: &Bitmap) -> Vec<u8> {
        let mut buf = Vec::new();
        let encoder = image::codecs::png::PngEncoder::new(&mut buf);
        image::ImageEncoder::write_image(
            encoder,
            img.as_raw(),
            img.width(),
            img.height(),
            image::ExtendedColorType::Rgba8,
        )
        .unwrap();
        buf
    }

    fn red_block_png() -> Vec<u8> {
        png_bytes(&Bitmap::from_fn(4, 4, |x, y| {
            if (1..3).contains(&x) && (1..3).contains(&y) {
                image::Rgba([255, 0, 0, 255])
            } else {
                image::Rgba([255, 255, 255, 255])
            }
        }))
    }

    #[test]
    fn duration_ms_converts_correctly() {
        let d = Duration::from_millis(1234);
        assert!((duration_ms(d) - 1234.0).abs() < 0.01);
    }

    #[test]
    fn distinct_colors_counts_unique_pixels() {
        let img = Bitmap::from_fn(4, 1, |x, _| image::Rgba([u8::from(x > 1), 0, 0, 255]));
        assert_eq!(distinct_colors(&img), 2);
    }

    #[test]
    fn diagnostics_cover_every_stage() {
        let mut config = PipelineConfig::default();
        config.trace.turd_size = 1;
        let clock = StepClock(Cell::new(0));
        let (staged, diag) =
            process_staged_with_diagnostics(&red_block_png(), &config, &clock).unwrap();

        assert_eq!(staged.trace.regions.len(), 1);
        assert_eq!(diag.summary.region_count, 1);
        assert_eq!(diag.summary.image_width, 4);
        assert!(diag.stages().iter().all(|(_, s)| s.duration > Duration::ZERO));
        assert!(diag.total_duration >= diag.trace.duration);
        assert!(matches!(
            diag.filter.metrics,
            StageMetrics::Filter { ref active, .. } if active.is_empty()
        ));
        assert!(matches!(
            diag.scale.metrics,
            StageMetrics::Scale { applied: false, .. }
        ));
    }

    #[test]
    fn invalid_config_fails_before_decoding() {
        let mut config = PipelineConfig::default();
        config.scale.0 = 0.0;
        let clock = StepClock(Cell::new(0));
        let err = process_staged_with_diagnostics(&[], &config, &clock).unwrap_err();
        assert!(matches!(err, PipelineError::InvalidParameter { .. }));
    }

    #[test]
    fn report_names_every_stage() {
        let clock = StepClock(Cell::new(0));
        let (_, diag) =
            process_staged_with_diagnostics(&red_block_png(), &PipelineConfig::default(), &clock)
                .unwrap();
        let report = diag.report();
        assert!(report.contains("Pipeline Diagnostics Report"));
        for name in ["Decode", "Filter", "Scale", "Posterize", "Trace"] {
            assert!(report.contains(name), "{name} missing from report");
        }
    }

    #[test]
    fn diagnostics_serialize_durations_as_seconds() {
        let clock = StepClock(Cell::new(0));
        let (_, diag) =
            process_staged_with_diagnostics(&red_block_png(), &PipelineConfig::default(), &clock)
                .unwrap();
        let json = serde_json::to_value(&diag).unwrap();
        assert!((json["decode"]["duration"].as_f64().unwrap() - 0.001).abs() < 1e-9);
        let back: PipelineDiagnostics = serde_json::from_value(json).unwrap();
        assert_eq!(back.summary.region_count, diag.summary.region_count);
    }
}
