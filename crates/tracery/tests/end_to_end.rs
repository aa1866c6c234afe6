//! End-to-end: bitmap + config in, SVG text out.

#![allow(clippy::unwrap_used, clippy::expect_used)]

use std::sync::Barrier;

use image::Rgba;
use tracery::{Bitmap, Mode, Orchestrator, PipelineConfig, PipelineError, RunOutcome, run};

const RED: Rgba<u8> = Rgba([255, 0, 0, 255]);
const WHITE: Rgba<u8> = Rgba([255, 255, 255, 255]);

/// 4x4 white bitmap with a 2x2 red block at (1,1)-(2,2).
fn red_block() -> Bitmap {
    Bitmap::from_fn(4, 4, |x, y| {
        if (1..3).contains(&x) && (1..3).contains(&y) {
            RED
        } else {
            WHITE
        }
    })
}

fn config(mode: Mode, turd_size: u32) -> PipelineConfig {
    let mut config = PipelineConfig {
        mode,
        ..PipelineConfig::default()
    };
    config.posterize.enabled = false;
    config.trace.turd_size = turd_size;
    config
}

/// `(min, max)` over every number in every `d` attribute.
fn path_span(svg: &str) -> (f64, f64) {
    let nums: Vec<f64> = svg
        .split(" d=\"")
        .skip(1)
        .flat_map(|rest| {
            rest[..rest.find('"').unwrap()]
                .split(|c: char| !(c.is_ascii_digit() || c == '.' || c == '-'))
                .filter(|s| !s.is_empty())
                .map(|s| s.parse::<f64>().unwrap())
                .collect::<Vec<_>>()
        })
        .collect();
    assert!(!nums.is_empty(), "no path data in {svg}");
    (
        nums.iter().copied().fold(f64::INFINITY, f64::min),
        nums.iter().copied().fold(f64::NEG_INFINITY, f64::max),
    )
}

#[test]
fn red_block_color_mode() {
    let svg = run(&red_block(), &config(Mode::Color, 1)).unwrap();
    assert_eq!(svg.matches("<path").count(), 1);
    assert!(svg.contains(r##"fill="#ff0000""##));
    assert!(svg.contains("<rect"));
    assert!(svg.contains(r##"fill="#ffffff""##));
    let (min, max) = path_span(&svg);
    assert!((min - 1.0).abs() < 1e-9 && (max - 3.0).abs() < 1e-9, "{min}..{max}");
}

#[test]
fn red_block_monochrome_mode() {
    let svg = run(&red_block(), &config(Mode::Monochrome, 1)).unwrap();
    assert_eq!(svg.matches("<path").count(), 1);
    assert!(svg.contains(r##"fill="#000000""##));
    let (min, max) = path_span(&svg);
    assert!((min - 1.0).abs() < 1e-9 && (max - 3.0).abs() < 1e-9, "{min}..{max}");
}

#[test]
fn uniform_bitmap_gives_zero_paths() {
    let img = Bitmap::from_pixel(7, 5, Rgba([12, 34, 56, 255]));
    let svg = run(&img, &PipelineConfig::default()).unwrap();
    assert!(!svg.contains("<path"));
    assert!(svg.contains("<svg"));
}

#[test]
fn speck_kept_at_turd_size_one() {
    let img = Bitmap::from_fn(5, 5, |x, y| if (x, y) == (2, 2) { RED } else { WHITE });
    let svg = run(&img, &config(Mode::Color, 1)).unwrap();
    assert_eq!(svg.matches("<path").count(), 1);
    assert!(svg.contains(r##"fill="#ff0000""##));
}

#[test]
fn speck_absorbed_without_hole_at_turd_size_two() {
    let img = Bitmap::from_fn(5, 5, |x, y| if (x, y) == (2, 2) { RED } else { WHITE });
    let svg = run(&img, &config(Mode::Color, 2)).unwrap();
    // The speck becomes background: no path, and no hole cut into anything.
    assert!(!svg.contains("<path"));
    assert!(svg.contains(r##"fill="#ffffff""##));
}

#[test]
fn single_step_posterize_flattens_to_black() {
    let mut config = config(Mode::Color, 1);
    config.posterize.enabled = true;
    config.posterize.red = 1;
    config.posterize.green = 1;
    config.posterize.blue = 1;
    config.posterize.alpha = 1;
    let svg = run(&red_block(), &config).unwrap();
    // Every channel collapses to 0, so the bitmap is uniform.
    assert!(!svg.contains("<path"));
    assert!(svg.contains(r##"fill="#000000""##));
}

#[test]
fn default_posterize_keeps_primary_colors() {
    let mut config = PipelineConfig::default();
    config.trace.turd_size = 1;
    let svg = run(&red_block(), &config).unwrap();
    assert!(svg.contains(r##"fill="#ff0000""##));
}

#[test]
fn identical_input_gives_identical_svg() {
    let img = Bitmap::from_fn(32, 24, |x, y| {
        let v = u8::try_from((x * 7 + y * 13) % 256).unwrap();
        Rgba([v, v.wrapping_mul(3), 255 - v, 255])
    });
    let config = PipelineConfig::default();
    assert_eq!(run(&img, &config).unwrap(), run(&img, &config).unwrap());
}

#[test]
fn invalid_parameter_surfaces_typed_error() {
    let mut config = PipelineConfig::default();
    config.trace.turd_size = 51;
    let err = run(&red_block(), &config).unwrap_err();
    match err {
        PipelineError::InvalidParameter {
            name, value, max, ..
        } => {
            assert_eq!(name, "turd_size");
            assert!((value - 51.0).abs() < f64::EPSILON);
            assert!((max - 50.0).abs() < f64::EPSILON);
        }
        other => unreachable!("unexpected error {other}"),
    }
}

#[test]
fn scaled_output_uses_scaled_dimensions() {
    let img = Bitmap::from_pixel(40, 20, WHITE);
    let mut config = PipelineConfig::default();
    config.scale.0 = 25.0;
    let svg = run(&img, &config).unwrap();
    assert!(svg.contains(r#"viewBox="0 0 10 5""#));
}

#[test]
fn one_pixel_bitmap_converts_in_both_modes() {
    let img = Bitmap::from_pixel(1, 1, RED);
    let svg = run(&img, &PipelineConfig::default()).unwrap();
    assert!(svg.contains(r#"viewBox="0 0 1 1""#));
    assert!(svg.contains(r##"fill="#ff0000""##));
    assert!(!svg.contains("<path"));

    let svg = run(&img, &config(Mode::Monochrome, 1)).unwrap();
    assert_eq!(svg.matches("<path").count(), 1);
    assert!(svg.contains(r##"fill="#000000""##));
}

#[test]
fn minimum_scale_reduces_to_one_pixel() {
    let img = Bitmap::from_fn(50, 50, |x, _| if x < 25 { RED } else { WHITE });
    for mode in [Mode::Color, Mode::Monochrome] {
        let mut config = config(mode, 1);
        config.scale.0 = 1.0;
        let svg = run(&img, &config).unwrap();
        assert!(svg.contains(r#"viewBox="0 0 1 1""#), "{svg}");
        assert!(!svg.contains("NaN") && !svg.contains("inf"));
    }
}

#[test]
fn checkerboard_converts_without_error() {
    let img = Bitmap::from_fn(6, 6, |x, y| if (x + y) % 2 == 0 { RED } else { WHITE });
    let svg = run(&img, &config(Mode::Color, 1)).unwrap();
    // Equal areas: red comes first in raster order and becomes the background.
    assert!(svg.contains(r##"fill="#ff0000""##));
    assert!(svg.contains(r##"fill="#ffffff""##));
    assert_eq!(svg.matches("<path").count(), 18);

    let svg = run(&img, &config(Mode::Monochrome, 1)).unwrap();
    assert_eq!(svg.matches("<path").count(), 18);
}

#[test]
fn concurrent_requests_leave_newest_result() {
    const THREADS: usize = 6;
    let orchestrator = Orchestrator::new();
    let barrier = Barrier::new(THREADS);
    let img = red_block();

    std::thread::scope(|scope| {
        for i in 0..THREADS {
            let orchestrator = &orchestrator;
            let barrier = &barrier;
            let img = &img;
            scope.spawn(move || {
                barrier.wait();
                let mode = if i % 2 == 0 {
                    Mode::Color
                } else {
                    Mode::Monochrome
                };
                let token = orchestrator.request();
                let _outcome = orchestrator.run(token, img, &config(mode, 1)).unwrap();
            });
        }
    });

    // The last requested token is never superseded, so it always publishes.
    let latest = orchestrator.latest().unwrap();
    assert_eq!(latest.token.generation(), u64::try_from(THREADS).unwrap());
}

#[test]
fn superseded_run_does_not_overwrite_later_result() {
    let orchestrator = Orchestrator::new();
    let first = orchestrator.request();
    let second = orchestrator.request();

    let newer = orchestrator
        .run(second, &red_block(), &config(Mode::Monochrome, 1))
        .unwrap();
    let older = orchestrator
        .run(first, &red_block(), &config(Mode::Color, 1))
        .unwrap();

    assert!(matches!(newer, RunOutcome::Completed(_)));
    assert_eq!(older, RunOutcome::Superseded);
    let latest = orchestrator.latest().unwrap();
    assert_eq!(latest.token, second);
    assert!(latest.svg.contains(r##"fill="#000000""##));
}
