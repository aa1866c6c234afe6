//! Per-channel quantization.
//!
//! Each channel value `v` maps to the nearest of `steps` evenly spaced
//! levels in `[0, 255]`:
//!
//! ```text
//! level = round(v / 255 * (steps - 1)) * 255 / (steps - 1)
//! ```
//!
//! Both roundings are round-half-up in exact integer arithmetic, so the
//! table for a given step count is fully determined. A single step maps
//! every value to 0.

use rayon::prelude::*;

use crate::config::PosterizeParameterSet;
use crate::error::PipelineError;
use crate::types::Bitmap;

/// Quantize one channel value to `steps` levels.
#[must_use]
#[allow(clippy::cast_possible_truncation)]
pub const fn quantize(v: u8, steps: u8) -> u8 {
    if steps <= 1 {
        return 0;
    }
    let n = steps as u32 - 1;
    let v = v as u32;
    // round(v * n / 255), half up
    let idx = (2 * v * n + 255) / 510;
    // round(idx * 255 / n), half up
    let out = (2 * idx * 255 + n) / (2 * n);
    out as u8
}

/// Lookup table for one channel.
#[must_use]
pub fn lut(steps: u8) -> [u8; 256] {
    let mut table = [0u8; 256];
    for (v, slot) in (0..=u8::MAX).zip(table.iter_mut()) {
        *slot = quantize(v, steps);
    }
    table
}

/// Quantize every channel of `input`.
///
/// Returns an unchanged copy when posterization is disabled.
///
/// # Errors
///
/// Returns [`PipelineError::InvalidParameter`] if any step count is
/// outside `[1, 10]`.
#[must_use = "returns the posterized bitmap"]
pub fn posterize(input: &Bitmap, params: &PosterizeParameterSet) -> Result<Bitmap, PipelineError> {
    params.validate()?;

    let mut out = input.clone();
    if !params.enabled {
        log::debug!("posterize: disabled");
        return Ok(out);
    }
    log::debug!("posterize: steps {:?}", params.steps());
    if out.is_empty() {
        return Ok(out);
    }

    let tables = params.steps().map(lut);
    let row_len = out.width() as usize * 4;
    out.par_chunks_mut(row_len).for_each(|row| {
        for px in row.chunks_exact_mut(4) {
            for (c, table) in px.iter_mut().zip(&tables) {
                *c = table[usize::from(*c)];
            }
        }
    });
    Ok(out)
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use image::Rgba;

    use super::*;

    fn sample() -> Bitmap {
        Bitmap::from_fn(16, 16, |x, y| {
            #[allow(clippy::cast_possible_truncation)]
            let v = (y * 16 + x) as u8;
            Rgba([v, v.wrapping_mul(7), 255 - v, v.wrapping_add(100)])
        })
    }

    #[test]
    fn one_step_maps_to_zero() {
        assert!(lut(1).iter().all(|&v| v == 0));
    }

    #[test]
    fn two_steps_round_half_up() {
        assert_eq!(quantize(0, 2), 0);
        assert_eq!(quantize(127, 2), 0);
        assert_eq!(quantize(128, 2), 255);
        assert_eq!(quantize(255, 2), 255);
    }

    #[test]
    fn five_step_levels() {
        // levels 0, 63.75 -> 64, 127.5 -> 128, 191.25 -> 191, 255
        let mut levels: Vec<u8> = lut(5).to_vec();
        levels.dedup();
        assert_eq!(levels, vec![0, 64, 128, 191, 255]);
    }

    #[test]
    fn endpoints_are_fixed_for_multi_step() {
        for steps in 2..=10 {
            assert_eq!(quantize(0, steps), 0);
            assert_eq!(quantize(255, steps), 255);
        }
    }

    #[test]
    fn table_is_monotonic() {
        for steps in 1..=10 {
            let t = lut(steps);
            assert!(t.windows(2).all(|w| w[0] <= w[1]), "steps {steps}");
        }
    }

    #[test]
    fn idempotent() {
        let params = PosterizeParameterSet {
            enabled: true,
            red: 3,
            green: 7,
            blue: 10,
            alpha: 2,
        };
        let once = posterize(&sample(), &params).unwrap();
        let twice = posterize(&once, &params).unwrap();
        assert_eq!(once, twice);
    }

    #[test]
    fn every_table_is_idempotent() {
        for steps in 1..=10 {
            let t = lut(steps);
            for v in 0..=255u8 {
                let q = t[usize::from(v)];
                assert_eq!(t[usize::from(q)], q, "steps {steps}, v {v}");
            }
        }
    }

    #[test]
    fn disabled_is_passthrough() {
        let params = PosterizeParameterSet {
            enabled: false,
            ..PosterizeParameterSet::default()
        };
        let img = sample();
        assert_eq!(posterize(&img, &params).unwrap(), img);
    }

    #[test]
    fn default_flattens_alpha_to_zero() {
        let out = posterize(&sample(), &PosterizeParameterSet::default()).unwrap();
        assert!(out.pixels().all(|p| p.0[3] == 0));
    }

    #[test]
    fn single_step_collapses_red_to_black() {
        let params = PosterizeParameterSet {
            enabled: true,
            red: 1,
            green: 1,
            blue: 1,
            alpha: 1,
        };
        let img = Bitmap::from_pixel(2, 2, Rgba([255, 0, 0, 255]));
        let out = posterize(&img, &params).unwrap();
        assert!(out.pixels().all(|p| *p == Rgba([0, 0, 0, 0])));
    }

    #[test]
    fn out_of_range_steps_rejected() {
        let params = PosterizeParameterSet {
            red: 0,
            ..PosterizeParameterSet::default()
        };
        assert!(posterize(&sample(), &params).is_err());
    }
}
