//! tracery: convert an image file to SVG from the command line.
//!
//! Runs the conversion pipeline on one image with configurable parameters,
//! optionally writes the SVG, and prints per-stage diagnostics. Useful for:
//!
//! - Batch conversion outside an interactive front end
//! - Tuning posterize steps, turd size and curve optimization
//! - Measuring per-stage durations to identify bottlenecks
//!
//! # Usage
//!
//! ```text
//! cargo run --release --bin tracery -- [OPTIONS] <IMAGE_PATH>
//! ```

#![allow(clippy::print_stdout, clippy::print_stderr)]

use std::path::PathBuf;
use std::process::ExitCode;
use std::time::{Duration, Instant};

use clap::{Parser, ValueEnum};
use tracery_pipeline::config;
use tracery_pipeline::diagnostics::{Clock, PipelineDiagnostics};

/// Convert a raster image into an SVG of filled color regions.
///
/// Prints per-stage timing and count diagnostics to stdout. Log output
/// is controlled with `RUST_LOG`.
#[derive(Parser)]
#[command(name = "tracery", version)]
struct Cli {
    /// Path to the input image (PNG, JPEG, BMP, WebP).
    image_path: PathBuf,

    /// Write the SVG document to this file.
    #[arg(long, short)]
    out: Option<PathBuf>,

    /// Output mode.
    #[arg(long, value_enum, default_value_t = CliMode::Color)]
    mode: CliMode,

    /// Brightness, percent (0-200).
    #[arg(long, default_value_t = config::DEFAULT_BRIGHTNESS)]
    brightness: f64,

    /// Contrast, percent (0-200).
    #[arg(long, default_value_t = config::DEFAULT_CONTRAST)]
    contrast: f64,

    /// Grayscale, percent (0-100).
    #[arg(long, default_value_t = config::DEFAULT_GRAYSCALE)]
    grayscale: f64,

    /// Hue rotation, degrees (0-360).
    #[arg(long, default_value_t = config::DEFAULT_HUE_ROTATE)]
    hue_rotate: f64,

    /// Invert, percent (0-100).
    #[arg(long, default_value_t = config::DEFAULT_INVERT)]
    invert: f64,

    /// Opacity, percent (0-100).
    #[arg(long, default_value_t = config::DEFAULT_OPACITY)]
    opacity: f64,

    /// Saturation, percent (0-200).
    #[arg(long, default_value_t = config::DEFAULT_SATURATE)]
    saturate: f64,

    /// Sepia, percent (0-100).
    #[arg(long, default_value_t = config::DEFAULT_SEPIA)]
    sepia: f64,

    /// Output size as a percentage of the input (1-100).
    #[arg(long, default_value_t = config::DEFAULT_SCALE_PERCENT)]
    scale: f64,

    /// Skip posterization.
    #[arg(long)]
    no_posterize: bool,

    /// Red posterize steps (1-10).
    #[arg(long, default_value_t = config::DEFAULT_COLOR_STEPS)]
    red: u8,

    /// Green posterize steps (1-10).
    #[arg(long, default_value_t = config::DEFAULT_COLOR_STEPS)]
    green: u8,

    /// Blue posterize steps (1-10).
    #[arg(long, default_value_t = config::DEFAULT_COLOR_STEPS)]
    blue: u8,

    /// Alpha posterize steps (1-10).
    #[arg(long, default_value_t = config::DEFAULT_ALPHA_STEPS)]
    alpha: u8,

    /// Regions smaller than this many pixels are absorbed (1-50).
    #[arg(long, default_value_t = config::DEFAULT_TURD_SIZE)]
    turd_size: u32,

    /// Corner threshold (0-1.3333). 0 keeps every vertex sharp.
    #[arg(long, default_value_t = config::DEFAULT_ALPHA_MAX)]
    alpha_max: f64,

    /// Disable Bézier curve merging.
    #[arg(long)]
    no_opt_curve: bool,

    /// Curve merging tolerance (0-5).
    #[arg(long, default_value_t = config::DEFAULT_OPT_TOLERANCE)]
    opt_tolerance: f64,

    /// Monochrome luma threshold (0-255).
    #[arg(long, default_value_t = config::DEFAULT_THRESHOLD)]
    threshold: u8,

    /// Number of runs for averaging.
    #[arg(long, default_value_t = 1, value_parser = clap::builder::RangedU64ValueParser::<usize>::new().range(1..))]
    runs: usize,

    /// Output diagnostics as JSON instead of a human-readable report.
    #[arg(long)]
    json: bool,

    /// Full pipeline config as a JSON string.
    ///
    /// When provided, all other pipeline parameter flags are ignored.
    /// Missing fields take their default values.
    #[arg(long)]
    config_json: Option<String>,
}

/// Output mode selection.
#[derive(Clone, Copy, ValueEnum)]
enum CliMode {
    /// One path per color region over a background rectangle.
    Color,
    /// Black foreground paths split by luma threshold.
    Monochrome,
}

impl From<CliMode> for tracery::Mode {
    fn from(mode: CliMode) -> Self {
        match mode {
            CliMode::Color => Self::Color,
            CliMode::Monochrome => Self::Monochrome,
        }
    }
}

/// Build a [`PipelineConfig`](tracery::PipelineConfig) from CLI arguments.
///
/// If `--config-json` is provided, the JSON is parsed directly and all
/// individual parameter flags are ignored. Otherwise, a config is
/// assembled from the individual flags.
fn config_from_cli(cli: &Cli) -> Result<tracery::PipelineConfig, String> {
    if let Some(ref json) = cli.config_json {
        return serde_json::from_str(json).map_err(|e| format!("Error parsing --config-json: {e}"));
    }

    Ok(tracery::PipelineConfig {
        mode: cli.mode.into(),
        filters: tracery_pipeline::FilterParameterSet {
            brightness: cli.brightness,
            contrast: cli.contrast,
            grayscale: cli.grayscale,
            hue_rotate: cli.hue_rotate,
            invert: cli.invert,
            opacity: cli.opacity,
            saturate: cli.saturate,
            sepia: cli.sepia,
        },
        scale: tracery_pipeline::ScaleParameter(cli.scale),
        posterize: tracery_pipeline::PosterizeParameterSet {
            enabled: !cli.no_posterize,
            red: cli.red,
            green: cli.green,
            blue: cli.blue,
            alpha: cli.alpha,
        },
        trace: tracery_pipeline::TraceParameterSet {
            turd_size: cli.turd_size,
            alpha_max: cli.alpha_max,
            opt_curve: !cli.no_opt_curve,
            opt_tolerance: cli.opt_tolerance,
            threshold: cli.threshold,
        },
    })
}

fn main() -> ExitCode {
    env_logger::init();
    let cli = Cli::parse();

    let config = match config_from_cli(&cli) {
        Ok(c) => c,
        Err(msg) => {
            eprintln!("{msg}");
            return ExitCode::FAILURE;
        }
    };

    let image_bytes = match std::fs::read(&cli.image_path) {
        Ok(bytes) => bytes,
        Err(e) => {
            eprintln!("Error reading {}: {e}", cli.image_path.display());
            return ExitCode::FAILURE;
        }
    };

    log::info!(
        "image {} ({} bytes), {} run(s)",
        cli.image_path.display(),
        image_bytes.len(),
        cli.runs,
    );
    log::debug!("config: {config:?}");

    let mut all_diagnostics = Vec::with_capacity(cli.runs);

    for run in 0..cli.runs {
        if cli.runs > 1 {
            eprintln!("--- Run {}/{} ---", run + 1, cli.runs);
        }

        match tracery_pipeline::diagnostics::process_staged_with_diagnostics(
            &image_bytes,
            &config,
            &StdClock,
        ) {
            Ok((staged, diagnostics)) => {
                if cli.json {
                    match serde_json::to_string_pretty(&diagnostics) {
                        Ok(json) => println!("{json}"),
                        Err(e) => {
                            eprintln!("Error serializing diagnostics: {e}");
                            return ExitCode::FAILURE;
                        }
                    }
                } else {
                    println!("{}", diagnostics.report());
                }

                // Write SVG on the first run only.
                if run == 0
                    && let Some(ref svg_path) = cli.out
                {
                    let title = cli
                        .image_path
                        .file_stem()
                        .and_then(|s| s.to_str())
                        .unwrap_or("tracery");
                    let desc = format!(
                        "{} mode, {} regions",
                        staged.mode,
                        staged.trace.regions.len()
                    );
                    let config_json = serde_json::to_string(&config).ok();
                    let metadata = tracery::SvgMetadata {
                        title: Some(title),
                        description: Some(&desc),
                        config_json: config_json.as_deref(),
                    };
                    let svg = tracery::assemble(&staged.trace, staged.mode, &metadata);
                    match std::fs::write(svg_path, &svg) {
                        Ok(()) => {
                            eprintln!(
                                "SVG written to {} ({} bytes)",
                                svg_path.display(),
                                svg.len(),
                            );
                        }
                        Err(e) => {
                            eprintln!("Error writing SVG to {}: {e}", svg_path.display());
                            return ExitCode::FAILURE;
                        }
                    }
                }

                all_diagnostics.push(diagnostics);
            }
            Err(e) => {
                eprintln!("Pipeline error: {e}");
                return ExitCode::FAILURE;
            }
        }

        if cli.runs > 1 {
            eprintln!();
        }
    }

    if cli.runs > 1 {
        print_multi_run_summary(&all_diagnostics);
    }

    ExitCode::SUCCESS
}

/// [`Clock`] implementation backed by [`std::time::Instant`].
struct StdClock;

impl Clock for StdClock {
    type Instant = Instant;

    fn now(&self) -> Instant {
        Instant::now()
    }

    fn elapsed(&self, since: &Instant) -> Duration {
        since.elapsed()
    }
}

/// Print aggregated statistics across multiple runs.
#[allow(clippy::cast_precision_loss)]
fn print_multi_run_summary(all_diagnostics: &[PipelineDiagnostics]) {
    println!();
    println!(
        "Summary ({} runs)\n{}",
        all_diagnostics.len(),
        "=".repeat(60),
    );

    if all_diagnostics.is_empty() {
        println!("Warning: no diagnostics to summarize");
        return;
    }

    let durations: Vec<f64> = all_diagnostics
        .iter()
        .map(|d| d.total_duration.as_secs_f64() * 1000.0)
        .collect();

    let min = durations.iter().copied().reduce(f64::min).unwrap_or(0.0);
    let max = durations.iter().copied().reduce(f64::max).unwrap_or(0.0);
    let mean = durations.iter().sum::<f64>() / durations.len() as f64;

    println!("Total duration: min={min:.3}ms  mean={mean:.3}ms  max={max:.3}ms");

    println!();
    println!("{:<24} {:>12}", "Stage", "Mean (ms)");
    println!("{}", "-".repeat(40));

    let runs = all_diagnostics.len() as f64;
    for (index, (name, _)) in all_diagnostics[0].stages().into_iter().enumerate() {
        let total: f64 = all_diagnostics
            .iter()
            .map(|d| d.stages()[index].1.duration.as_secs_f64() * 1000.0)
            .sum();
        println!("{name:<24} {:>10.3}ms", total / runs);
    }
}
