//! Pointwise color filters.
//!
//! Implements the CSS Filter Effects functions `brightness`, `contrast`,
//! `grayscale`, `hue-rotate`, `invert`, `opacity`, `saturate` and `sepia`
//! on channel values normalized to `[0, 1]`. Filters run in the fixed
//! [`FilterKind::ORDER`], values are clamped after each filter, and the
//! result is rounded back to 8 bits once at the end.

use rayon::prelude::*;

use crate::config::{FilterKind, FilterParameterSet};
use crate::error::PipelineError;
use crate::types::Bitmap;

/// One compiled filter step.
#[derive(Debug, Clone, Copy, PartialEq)]
enum Op {
    /// `v * slope + intercept` on each color channel.
    Linear { slope: f64, intercept: f64 },
    /// 3x3 matrix on the RGB vector.
    Matrix([[f64; 3]; 3]),
    /// Multiply alpha.
    Opacity(f64),
}

impl Op {
    fn compile(kind: FilterKind, value: f64) -> Self {
        match kind {
            FilterKind::Brightness => Self::Linear {
                slope: value / 100.0,
                intercept: 0.0,
            },
            FilterKind::Contrast => {
                let c = value / 100.0;
                Self::Linear {
                    slope: c,
                    intercept: 0.5 - 0.5 * c,
                }
            }
            FilterKind::Invert => {
                let a = value / 100.0;
                Self::Linear {
                    slope: 2.0f64.mul_add(-a, 1.0),
                    intercept: a,
                }
            }
            FilterKind::Opacity => Self::Opacity(value / 100.0),
            FilterKind::Grayscale => Self::Matrix(grayscale_matrix(value / 100.0)),
            FilterKind::Sepia => Self::Matrix(sepia_matrix(value / 100.0)),
            FilterKind::Saturate => Self::Matrix(saturate_matrix(value / 100.0)),
            FilterKind::HueRotate => Self::Matrix(hue_rotate_matrix(value.to_radians())),
        }
    }

    fn apply(self, px: &mut [f64; 4]) {
        match self {
            Self::Linear { slope, intercept } => {
                for c in &mut px[..3] {
                    *c = c.mul_add(slope, intercept).clamp(0.0, 1.0);
                }
            }
            Self::Matrix(m) => {
                let [r, g, b, _] = *px;
                for (c, row) in px[..3].iter_mut().zip(m) {
                    *c = row[2]
                        .mul_add(b, row[1].mul_add(g, row[0] * r))
                        .clamp(0.0, 1.0);
                }
            }
            Self::Opacity(o) => px[3] = (px[3] * o).clamp(0.0, 1.0),
        }
    }
}

fn grayscale_matrix(amount: f64) -> [[f64; 3]; 3] {
    let k = 1.0 - amount;
    [
        [0.7874f64.mul_add(k, 0.2126), 0.7152f64.mul_add(-k, 0.7152), 0.0722f64.mul_add(-k, 0.0722)],
        [0.2126f64.mul_add(-k, 0.2126), 0.2848f64.mul_add(k, 0.7152), 0.0722f64.mul_add(-k, 0.0722)],
        [0.2126f64.mul_add(-k, 0.2126), 0.7152f64.mul_add(-k, 0.7152), 0.9278f64.mul_add(k, 0.0722)],
    ]
}

fn sepia_matrix(amount: f64) -> [[f64; 3]; 3] {
    let k = 1.0 - amount;
    [
        [0.607f64.mul_add(k, 0.393), 0.769f64.mul_add(-k, 0.769), 0.189f64.mul_add(-k, 0.189)],
        [0.349f64.mul_add(-k, 0.349), 0.314f64.mul_add(k, 0.686), 0.168f64.mul_add(-k, 0.168)],
        [0.272f64.mul_add(-k, 0.272), 0.534f64.mul_add(-k, 0.534), 0.869f64.mul_add(k, 0.131)],
    ]
}

fn saturate_matrix(s: f64) -> [[f64; 3]; 3] {
    [
        [0.787f64.mul_add(s, 0.213), 0.715f64.mul_add(-s, 0.715), 0.072f64.mul_add(-s, 0.072)],
        [0.213f64.mul_add(-s, 0.213), 0.285f64.mul_add(s, 0.715), 0.072f64.mul_add(-s, 0.072)],
        [0.213f64.mul_add(-s, 0.213), 0.715f64.mul_add(-s, 0.715), 0.928f64.mul_add(s, 0.072)],
    ]
}

fn hue_rotate_matrix(theta: f64) -> [[f64; 3]; 3] {
    let (sin, cos) = theta.sin_cos();
    [
        [
            0.213 + cos * 0.787 - sin * 0.213,
            0.715 - cos * 0.715 - sin * 0.715,
            0.072 - cos * 0.072 + sin * 0.928,
        ],
        [
            0.213 - cos * 0.213 + sin * 0.143,
            0.715 + cos * 0.285 + sin * 0.140,
            0.072 - cos * 0.072 - sin * 0.283,
        ],
        [
            0.213 - cos * 0.213 - sin * 0.787,
            0.715 - cos * 0.715 + sin * 0.715,
            0.072 + cos * 0.928 + sin * 0.072,
        ],
    ]
}

#[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
fn to_u8(v: f64) -> u8 {
    (v * 255.0).round().clamp(0.0, 255.0) as u8
}

/// Apply the color filters to `input`.
///
/// Filters at their identity value are skipped, so the default parameter
/// set returns an exact copy. Rows are processed in parallel.
///
/// # Errors
///
/// Returns [`PipelineError::InvalidParameter`] if any amount is out of
/// range; no pixel is processed in that case.
#[must_use = "returns the filtered bitmap"]
pub fn apply_filters(input: &Bitmap, params: &FilterParameterSet) -> Result<Bitmap, PipelineError> {
    params.validate()?;

    let ops: Vec<Op> = params
        .active()
        .into_iter()
        .map(|(kind, value)| Op::compile(kind, value))
        .collect();
    log::debug!(
        "filter: {}x{}, {} active filter(s)",
        input.width(),
        input.height(),
        ops.len(),
    );

    let mut out = input.clone();
    if ops.is_empty() || out.is_empty() {
        return Ok(out);
    }

    let row_len = out.width() as usize * 4;
    out.par_chunks_mut(row_len).for_each(|row| {
        for px in row.chunks_exact_mut(4) {
            let mut v = [
                f64::from(px[0]) / 255.0,
                f64::from(px[1]) / 255.0,
                f64::from(px[2]) / 255.0,
                f64::from(px[3]) / 255.0,
            ];
            for op in &ops {
                op.apply(&mut v);
            }
            for (dst, src) in px.iter_mut().zip(v) {
                *dst = to_u8(src);
            }
        }
    });

    Ok(out)
}
