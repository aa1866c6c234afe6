//! Bézier smoothing of a fitted polygon, and merging of curve runs.
//!
//! Each polygon vertex becomes either a sharp corner or a cubic curve
//! whose end points are the midpoints of the adjacent edges. The
//! smoothness `alpha` of a vertex measures how far it sticks out from the
//! line joining its neighbors; vertices at or above `alpha_max` stay
//! corners.

use crate::types::{Point, Segment, SubPath};

/// cos(179°): bends sharper than this are never merged.
const COS179: f64 = -0.999_847_695_156;

/// Shortest control-arm ratio for a curved vertex.
const MIN_ALPHA: f64 = 0.55;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Tag {
    Corner,
    Curve,
}

/// One vertex of a smoothed outline.
///
/// For a corner, the outline runs straight to `vertex` and then to
/// `c[2]`. For a curve it is the cubic `(c[0], c[1], c[2])`. Either way
/// the segment starts at the previous segment's `c[2]`.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CurveSegment {
    pub tag: Tag,
    pub c: [Point; 3],
    pub vertex: Point,
    pub alpha: f64,
}

fn sign(x: f64) -> i32 {
    if x > 0.0 {
        1
    } else if x < 0.0 {
        -1
    } else {
        0
    }
}

/// Twice the signed area of the triangle `(p0, p1, p2)`.
fn dpara(p0: Point, p1: Point, p2: Point) -> f64 {
    (p1.x - p0.x) * (p2.y - p0.y) - (p2.x - p0.x) * (p1.y - p0.y)
}

/// Cross product of `p1 - p0` and `p3 - p2`.
fn cprod(p0: Point, p1: Point, p2: Point, p3: Point) -> f64 {
    (p1.x - p0.x) * (p3.y - p2.y) - (p3.x - p2.x) * (p1.y - p0.y)
}

/// Dot product of `p1 - p0` and `p2 - p0`.
fn iprod(p0: Point, p1: Point, p2: Point) -> f64 {
    (p1.x - p0.x) * (p2.x - p0.x) + (p1.y - p0.y) * (p2.y - p0.y)
}

/// Dot product of `p1 - p0` and `p3 - p2`.
fn iprod1(p0: Point, p1: Point, p2: Point, p3: Point) -> f64 {
    (p1.x - p0.x) * (p3.x - p2.x) + (p1.y - p0.y) * (p3.y - p2.y)
}

/// Distance from `p2` to the line through `p0` along the L-infinity
/// normal of `p0 -> p2`, scaled the same way as [`dpara`].
fn ddenom(p0: Point, p2: Point) -> f64 {
    let rx = -f64::from(sign(p2.y - p0.y));
    let ry = f64::from(sign(p2.x - p0.x));
    ry * (p2.x - p0.x) - rx * (p2.y - p0.y)
}

fn bezier(t: f64, p0: Point, p1: Point, p2: Point, p3: Point) -> Point {
    let s = 1.0 - t;
    let (a, b, c, d) = (s * s * s, 3.0 * s * s * t, 3.0 * t * t * s, t * t * t);
    Point::new(
        a * p0.x + b * p1.x + c * p2.x + d * p3.x,
        a * p0.y + b * p1.y + c * p2.y + d * p3.y,
    )
}

/// Parameter `t` in `[0, 1]` where the curve's tangent is parallel to
/// `q0 -> q1`, or `-1` if there is none.
fn tangent(p0: Point, p1: Point, p2: Point, p3: Point, q0: Point, q1: Point) -> f64 {
    let a0 = cprod(p0, p1, q0, q1);
    let b0 = cprod(p1, p2, q0, q1);
    let c0 = cprod(p2, p3, q0, q1);

    let a = a0 - 2.0 * b0 + c0;
    let b = -2.0 * a0 + 2.0 * b0;
    let c = a0;
    let d = b * b - 4.0 * a * c;
    if a == 0.0 || d < 0.0 {
        return -1.0;
    }
    let s = d.sqrt();
    let r1 = (-b + s) / (2.0 * a);
    let r2 = (-b - s) / (2.0 * a);
    if (0.0..=1.0).contains(&r1) {
        r1
    } else if (0.0..=1.0).contains(&r2) {
        r2
    } else {
        -1.0
    }
}

/// Turn polygon vertices into corners and curves.
#[must_use]
pub fn smooth(vertices: &[Point], alpha_max: f64) -> Vec<CurveSegment> {
    let m = vertices.len();
    (0..m)
        .map(|j| {
            let vi = vertices[(j + m - 1) % m];
            let vj = vertices[j];
            let vk = vertices[(j + 1) % m];
            let p4 = vk.lerp(vj, 0.5);

            let denom = ddenom(vi, vk);
            let alpha = if denom == 0.0 {
                4.0 / 3.0
            } else {
                let dd = (dpara(vi, vj, vk) / denom).abs();
                let a = if dd > 1.0 { 1.0 - 1.0 / dd } else { 0.0 };
                a / 0.75
            };

            if alpha >= alpha_max {
                CurveSegment {
                    tag: Tag::Corner,
                    c: [vj, vj, p4],
                    vertex: vj,
                    alpha,
                }
            } else {
                let alpha = alpha.clamp(MIN_ALPHA, 1.0);
                let t = 0.5f64.mul_add(alpha, 0.5);
                CurveSegment {
                    tag: Tag::Curve,
                    c: [vi.lerp(vj, t), vk.lerp(vj, t), p4],
                    vertex: vj,
                    alpha,
                }
            }
        })
        .collect()
}

/// A candidate merged curve spanning several original segments.
#[derive(Debug, Clone, Copy)]
struct Merge {
    pen: f64,
    c: [Point; 2],
    s: f64,
    alpha: f64,
}

/// Running sums of the signed area under the smoothed outline.
fn cumulative_areas(curve: &[CurveSegment]) -> Vec<f64> {
    let m = curve.len();
    let p0 = curve[0].vertex;
    let mut areac = Vec::with_capacity(m + 1);
    let mut area = 0.0;
    areac.push(area);
    for i in 0..m {
        let i1 = (i + 1) % m;
        let next = &curve[i1];
        if next.tag == Tag::Curve {
            let alpha = next.alpha;
            area += 0.3 * alpha * (4.0 - alpha) * dpara(curve[i].c[2], next.vertex, next.c[2]) / 2.0;
            area += dpara(p0, curve[i].c[2], next.c[2]) / 2.0;
        }
        areac.push(area);
    }
    areac
}

/// Try to replace segments `i+1 ..= j` with a single curve from
/// `curve[i].c[2]` to `curve[j].c[2]`. Returns `None` when the run is not
/// convex, contains a corner, bends too far, or the merged curve strays
/// more than `tolerance` from the original.
fn merge_penalty(
    curve: &[CurveSegment],
    i: usize,
    j: usize,
    tolerance: f64,
    convc: &[i32],
    areac: &[f64],
) -> Option<Merge> {
    let m = curve.len();
    if i == j {
        return None;
    }
    let v = |k: usize| curve[k].vertex;

    let i1 = (i + 1) % m;
    let conv = convc[i1];
    if conv == 0 {
        return None;
    }
    let d = v(i).distance(v(i1));
    let mut k = i1;
    while k != j {
        let k1 = (k + 1) % m;
        let k2 = (k + 2) % m;
        if convc[k1] != conv {
            return None;
        }
        if sign(cprod(v(i), v(i1), v(k1), v(k2))) != conv {
            return None;
        }
        if iprod1(v(i), v(i1), v(k1), v(k2)) < d * v(k1).distance(v(k2)) * COS179 {
            return None;
        }
        k = k1;
    }

    let p0 = curve[i].c[2];
    let p1 = v(i1);
    let p2 = v(j);
    let p3 = curve[j].c[2];

    let mut area = areac[j] - areac[i];
    area -= dpara(v(0), curve[i].c[2], curve[j].c[2]) / 2.0;
    if i >= j {
        area += areac[m];
    }

    // Intersection o of p0p1 and p2p3: o = p0 + t (p1 - p0) = p3 + s (p2 - p3).
    let a1 = dpara(p0, p1, p2);
    let a2 = dpara(p0, p1, p3);
    let a3 = dpara(p0, p2, p3);
    let a4 = a1 + a3 - a2;
    if a2 == a1 {
        return None;
    }
    let t = a3 / (a3 - a4);
    let s = a2 / (a2 - a1);
    let tri = a2 * t / 2.0;
    if tri == 0.0 {
        return None;
    }

    let r = area / tri;
    let alpha = 2.0 - (4.0 - r / 0.3).sqrt();
    if !alpha.is_finite() {
        return None;
    }
    let c0 = p0.lerp(p1, t * alpha);
    let c1 = p3.lerp(p2, s * alpha);

    let mut pen = 0.0;

    // Tangency with the polygon edges.
    let mut k = i1;
    while k != j {
        let k1 = (k + 1) % m;
        let t = tangent(p0, c0, c1, p3, v(k), v(k1));
        if t < -0.5 {
            return None;
        }
        let pt = bezier(t, p0, c0, c1, p3);
        let d = v(k).distance(v(k1));
        if d == 0.0 {
            return None;
        }
        let d1 = dpara(v(k), v(k1), pt) / d;
        if d1.abs() > tolerance {
            return None;
        }
        if iprod(v(k), v(k1), pt) < 0.0 || iprod(v(k1), v(k), pt) < 0.0 {
            return None;
        }
        pen += d1 * d1;
        k = k1;
    }

    // Distance to the original curves' outermost points.
    let mut k = i;
    while k != j {
        let k1 = (k + 1) % m;
        let (e0, e1) = (curve[k].c[2], curve[k1].c[2]);
        let t = tangent(p0, c0, c1, p3, e0, e1);
        if t < -0.5 {
            return None;
        }
        let pt = bezier(t, p0, c0, c1, p3);
        let d = e0.distance(e1);
        if d == 0.0 {
            return None;
        }
        let mut d1 = dpara(e0, e1, pt) / d;
        let mut d2 = dpara(e0, e1, v(k1)) / d * 0.75 * curve[k1].alpha;
        if d2 < 0.0 {
            d1 = -d1;
            d2 = -d2;
        }
        if d1 < d2 - tolerance {
            return None;
        }
        if d1 < d2 {
            pen += (d1 - d2) * (d1 - d2);
        }
        k = k1;
    }

    Some(Merge {
        pen,
        c: [c0, c1],
        s,
        alpha,
    })
}

/// Merge runs of curves into the fewest segments that stay within
/// `tolerance`, breaking ties by the smallest penalty.
#[must_use]
pub fn optimize(curve: &[CurveSegment], tolerance: f64) -> Vec<CurveSegment> {
    let m = curve.len();
    if m == 0 {
        return Vec::new();
    }

    // +1 right turn, -1 left turn, 0 corner
    let convc: Vec<i32> = (0..m)
        .map(|i| match curve[i].tag {
            Tag::Curve => sign(dpara(
                curve[(i + m - 1) % m].vertex,
                curve[i].vertex,
                curve[(i + 1) % m].vertex,
            )),
            Tag::Corner => 0,
        })
        .collect();
    let areac = cumulative_areas(curve);

    let mut prev = vec![0usize; m + 1];
    let mut pen = vec![0.0f64; m + 1];
    let mut len = vec![0usize; m + 1];
    let mut best: Vec<Option<Merge>> = vec![None; m + 1];

    for j in 1..=m {
        prev[j] = j - 1;
        pen[j] = pen[j - 1];
        len[j] = len[j - 1] + 1;

        for i in (0..j - 1).rev() {
            let Some(o) = merge_penalty(curve, i, j % m, tolerance, &convc, &areac) else {
                break;
            };
            if len[j] > len[i] + 1 || (len[j] == len[i] + 1 && pen[j] > pen[i] + o.pen) {
                prev[j] = i;
                pen[j] = pen[i] + o.pen;
                len[j] = len[i] + 1;
                best[j] = Some(o);
            }
        }
    }

    let mut out = Vec::with_capacity(len[m]);
    let mut j = m;
    while j > 0 {
        let orig = curve[j % m];
        let seg = match best[j] {
            Some(o) if prev[j] != j - 1 => CurveSegment {
                tag: Tag::Curve,
                c: [o.c[0], o.c[1], orig.c[2]],
                vertex: orig.c[2].lerp(orig.vertex, o.s),
                alpha: o.alpha,
            },
            _ => orig,
        };
        out.push(seg);
        j = prev[j];
    }
    out.reverse();
    out
}

/// Convert to a closed sub-path starting at the last segment's end.
#[must_use]
pub fn to_subpath(curve: &[CurveSegment]) -> Option<SubPath> {
    let start = curve.last()?.c[2];
    let mut segments = Vec::with_capacity(curve.len() * 2);
    for seg in curve {
        match seg.tag {
            Tag::Corner => {
                segments.push(Segment::Line(seg.vertex));
                segments.push(Segment::Line(seg.c[2]));
            }
            Tag::Curve => segments.push(Segment::Cubic(seg.c[0], seg.c[1], seg.c[2])),
        }
    }
    Some(SubPath { start, segments })
}
