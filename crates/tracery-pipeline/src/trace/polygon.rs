//! Optimal polygon approximation of a closed boundary cycle.
//!
//! Steps, in order:
//!
//! 1. prefix sums of coordinates and their products, so any run of
//!    points can be fit with a line in constant time;
//! 2. for every point, the furthest point reachable by a straight
//!    subpath (one whose points stay within a unit-wide corridor);
//! 3. a dynamic program choosing the polygon with the fewest segments,
//!    breaking ties by the smallest total deviation;
//! 4. moving each polygon vertex within the unit square around its
//!    lattice position to best fit the two adjacent segments.

use std::ops::{Add, Mul, Sub};

use crate::types::Point;

use super::contour::IPoint;

/// Bound used when a pivot search finds no constraint.
const INFTY: i64 = 10_000_000;

/// `true` if `b` lies in the cyclic half-open range `[a, c)`.
const fn cyclic(a: usize, b: usize, c: usize) -> bool {
    if a <= c {
        a <= b && b < c
    } else {
        a <= b || b < c
    }
}

const fn xprod(a: IPoint, b: IPoint) -> i64 {
    a.x * b.y - a.y * b.x
}

/// Direction class of a step, used to detect when all four axis
/// directions have occurred.
#[allow(clippy::cast_sign_loss, clippy::cast_possible_truncation)]
const fn dir_index(dx: i64, dy: i64) -> usize {
    ((3 + 3 * dx + dy) / 2) as usize
}

#[derive(Debug, Clone, Copy, Default)]
struct Sums {
    x: f64,
    y: f64,
    x2: f64,
    xy: f64,
    y2: f64,
}

impl Add for Sums {
    type Output = Self;

    fn add(self, o: Self) -> Self {
        Self {
            x: self.x + o.x,
            y: self.y + o.y,
            x2: self.x2 + o.x2,
            xy: self.xy + o.xy,
            y2: self.y2 + o.y2,
        }
    }
}

impl Sub for Sums {
    type Output = Self;

    fn sub(self, o: Self) -> Self {
        Self {
            x: self.x - o.x,
            y: self.y - o.y,
            x2: self.x2 - o.x2,
            xy: self.xy - o.xy,
            y2: self.y2 - o.y2,
        }
    }
}

impl Mul<f64> for Sums {
    type Output = Self;

    fn mul(self, r: f64) -> Self {
        Self {
            x: self.x * r,
            y: self.y * r,
            x2: self.x2 * r,
            xy: self.xy * r,
            y2: self.y2 * r,
        }
    }
}

/// Symmetric 3x3 quadratic form over `(x, y, 1)`.
type Quad = [[f64; 3]; 3];

fn quadform(q: &Quad, w: Point) -> f64 {
    let v = [w.x, w.y, 1.0];
    let mut sum = 0.0;
    for (row, &vi) in q.iter().zip(&v) {
        for (&qij, &vj) in row.iter().zip(&v) {
            sum += vi * qij * vj;
        }
    }
    sum
}

fn add_outer(q: &mut Quad, v: [f64; 3], scale: f64) {
    for (row, &vl) in q.iter_mut().zip(&v) {
        for (cell, &vk) in row.iter_mut().zip(&v) {
            *cell += vl * vk / scale;
        }
    }
}

/// A boundary cycle with the prefix sums needed to fit lines to any run
/// of its points.
pub struct PathGeometry<'a> {
    pt: &'a [IPoint],
    /// `sums[i]` covers points `0..i`, relative to `pt[0]`.
    sums: Vec<Sums>,
}

impl<'a> PathGeometry<'a> {
    /// Returns `None` for an empty cycle.
    #[allow(clippy::cast_precision_loss)]
    pub fn new(pt: &'a [IPoint]) -> Option<Self> {
        let origin = *pt.first()?;
        let mut sums = Vec::with_capacity(pt.len() + 1);
        let mut acc = Sums::default();
        sums.push(acc);
        for p in pt {
            let x = (p.x - origin.x) as f64;
            let y = (p.y - origin.y) as f64;
            acc = acc
                + Sums {
                    x,
                    y,
                    x2: x * x,
                    xy: x * y,
                    y2: y * y,
                };
            sums.push(acc);
        }
        Some(Self { pt, sums })
    }

    /// Number of points.
    pub const fn len(&self) -> usize {
        self.pt.len()
    }

    /// Sums over points `i..=j` plus `r` full turns, and the point count.
    #[allow(clippy::cast_precision_loss)]
    fn window(&self, i: usize, j: usize, r: f64) -> (Sums, f64) {
        let n = self.len();
        let s = self.sums[j + 1] - self.sums[i] + self.sums[n] * r;
        let k = (j + 1) as f64 - i as f64 + r * n as f64;
        (s, k)
    }

    /// For each point `i`, the index just past the furthest point that
    /// can be reached from `i` by a straight subpath (cyclically).
    pub fn longest_straight(&self) -> Vec<usize> {
        let pt = self.pt;
        let n = pt.len();

        // nc[i]: next point after i that is not on an axis-aligned line
        // with i.
        let mut nc = vec![0usize; n];
        let mut k = 0;
        for i in (0..n).rev() {
            if pt[i].x != pt[k].x && pt[i].y != pt[k].y {
                k = i + 1;
            }
            nc[i] = k;
        }

        let mut pivk = vec![0usize; n];
        for i in (0..n).rev() {
            let mut ct = [0u32; 4];
            let next = pt[(i + 1) % n] - pt[i];
            ct[dir_index(next.x, next.y)] += 1;

            let mut constraint = [IPoint::default(); 2];
            let mut k = nc[i];
            let mut k1 = i;
            let mut cut = false;
            loop {
                let step = pt[k] - pt[k1];
                ct[dir_index(step.x.signum(), step.y.signum())] += 1;

                if ct.iter().all(|&c| c > 0) {
                    pivk[i] = k1;
                    cut = true;
                    break;
                }

                let cur = pt[k] - pt[i];
                if xprod(constraint[0], cur) < 0 || xprod(constraint[1], cur) > 0 {
                    break;
                }

                if cur.x.abs() > 1 || cur.y.abs() > 1 {
                    let off = IPoint::new(
                        cur.x + if cur.y >= 0 && (cur.y > 0 || cur.x < 0) { 1 } else { -1 },
                        cur.y + if cur.x <= 0 && (cur.x < 0 || cur.y < 0) { 1 } else { -1 },
                    );
                    if xprod(constraint[0], off) >= 0 {
                        constraint[0] = off;
                    }
                    let off = IPoint::new(
                        cur.x + if cur.y <= 0 && (cur.y < 0 || cur.x < 0) { 1 } else { -1 },
                        cur.y + if cur.x >= 0 && (cur.x > 0 || cur.y < 0) { 1 } else { -1 },
                    );
                    if xprod(constraint[1], off) <= 0 {
                        constraint[1] = off;
                    }
                }

                k1 = k;
                k = nc[k1];
                if !cyclic(k, i, k1) {
                    break;
                }
            }
            if cut {
                continue;
            }

            // k1 satisfied the constraints and k does not; find the last
            // point on the straight run k1..k that still does.
            let step = pt[k] - pt[k1];
            let dk = IPoint::new(step.x.signum(), step.y.signum());
            let cur = pt[k1] - pt[i];
            let a = xprod(constraint[0], cur);
            let b = xprod(constraint[0], dk);
            let c = xprod(constraint[1], cur);
            let d = xprod(constraint[1], dk);
            let mut j = INFTY;
            if b < 0 {
                j = a.div_euclid(-b);
            }
            if d > 0 {
                j = j.min((-c).div_euclid(d));
            }
            #[allow(clippy::cast_possible_wrap, clippy::cast_sign_loss)]
            let pivot = (k1 as i64 + j).rem_euclid(n as i64) as usize;
            pivk[i] = pivot;
        }

        // lon[i]: largest k such that every i' in [i, k) has k <= pivk[i'].
        let mut lon = vec![0usize; n];
        let mut j = pivk[n - 1];
        lon[n - 1] = j;
        for i in (0..n - 1).rev() {
            if cyclic(i + 1, pivk[i], j) {
                j = pivk[i];
            }
            lon[i] = j;
        }
        let mut i = n - 1;
        while cyclic((i + 1) % n, j, lon[i]) {
            lon[i] = j;
            if i == 0 {
                break;
            }
            i -= 1;
        }
        lon
    }

    /// Deviation of points `i..=j` from the straight segment `i -> j`.
    /// `j` may exceed `len()` by one turn.
    #[allow(clippy::cast_precision_loss)]
    fn penalty(&self, i: usize, j: usize) -> f64 {
        let n = self.len();
        let (j, r) = if j >= n { (j - n, 1.0) } else { (j, 0.0) };
        let (s, k) = self.window(i, j, r);

        let origin = self.pt[0];
        let (pi, pj) = (self.pt[i], self.pt[j]);
        let px = (pi.x + pj.x) as f64 / 2.0 - origin.x as f64;
        let py = (pi.y + pj.y) as f64 / 2.0 - origin.y as f64;
        let ey = (pj.x - pi.x) as f64;
        let ex = -((pj.y - pi.y) as f64);

        let a = (s.x2 - 2.0 * s.x * px) / k + px * px;
        let b = (s.xy - s.x * py - s.y * px) / k + px * py;
        let c = (s.y2 - 2.0 * s.y * py) / k + py * py;

        let sq = ex * ex * a + 2.0 * ex * ey * b + ey * ey * c;
        sq.max(0.0).sqrt()
    }

    /// Indices of the optimal polygon's vertices: fewest segments, then
    /// least total penalty. Every segment is a straight subpath.
    pub fn best_polygon(&self, lon: &[usize]) -> Vec<usize> {
        let n = self.len();

        // clip0[i]: furthest index reachable from i by one segment,
        // non-cyclic.
        let mut clip0 = vec![0usize; n];
        for (i, slot) in clip0.iter_mut().enumerate() {
            let mut c = (lon[(i + n - 1) % n] + n - 1) % n;
            if c == i {
                c = (i + 1) % n;
            }
            *slot = if c < i { n } else { c };
        }

        // clip1[j]: smallest i with j <= clip0[i].
        let mut clip1 = vec![0usize; n + 1];
        let mut j = 1;
        for (i, &c0) in clip0.iter().enumerate() {
            while j <= c0 {
                clip1[j] = i;
                j += 1;
            }
        }

        // seg0[j]: furthest index reachable from 0 with j segments.
        let mut seg0 = vec![0usize; n + 1];
        let mut i = 0;
        let mut m = 0;
        while i < n {
            seg0[m] = i;
            i = clip0[i];
            m += 1;
        }
        seg0[m] = n;

        // seg1[j]: smallest index from which n is reachable with m - j
        // segments.
        let mut seg1 = vec![0usize; m + 1];
        let mut i = n;
        for j in (1..=m).rev() {
            seg1[j] = i;
            i = clip1[i];
        }

        let mut pen = vec![0.0f64; n + 1];
        let mut prev = vec![0usize; n + 1];
        for j in 1..=m {
            for i in seg1[j]..=seg0[j] {
                let mut best = -1.0;
                for k in (clip1[i]..=seg0[j - 1]).rev() {
                    let this = self.penalty(k, i) + pen[k];
                    if best < 0.0 || this < best {
                        prev[i] = k;
                        best = this;
                    }
                }
                pen[i] = best;
            }
        }

        let mut po = vec![0usize; m];
        let mut i = n;
        for slot in po.iter_mut().rev() {
            i = prev[i];
            *slot = i;
        }
        po
    }

    /// Least-squares line through points `i..=j` (indices may wrap): the
    /// centroid relative to `pt[0]` and a unit direction, or a zero
    /// direction when the points have no dominant axis.
    #[allow(clippy::cast_possible_wrap, clippy::cast_precision_loss)]
    fn point_slope(&self, i: usize, j: usize) -> (Point, Point) {
        let n = self.len() as i64;
        let (mut i, mut j, mut r) = (i as i64, j as i64, 0i64);
        while j >= n {
            j -= n;
            r += 1;
        }
        while i >= n {
            i -= n;
            r -= 1;
        }
        #[allow(clippy::cast_sign_loss, clippy::cast_possible_truncation)]
        let (s, k) = self.window(i as usize, j as usize, r as f64);

        let ctr = Point::new(s.x / k, s.y / k);
        let mut a = (s.x2 - s.x * s.x / k) / k;
        let b = (s.xy - s.x * s.y / k) / k;
        let mut c = (s.y2 - s.y * s.y / k) / k;

        // larger eigenvalue
        let lambda2 = (a + c + (a - c).mul_add(a - c, 4.0 * b * b).sqrt()) / 2.0;
        a -= lambda2;
        c -= lambda2;

        let dir = if a.abs() >= c.abs() {
            let l = a.hypot(b);
            if l > 0.0 {
                Point::new(-b / l, a / l)
            } else {
                Point::new(0.0, 0.0)
            }
        } else {
            let l = c.hypot(b);
            if l > 0.0 {
                Point::new(-c / l, b / l)
            } else {
                Point::new(0.0, 0.0)
            }
        };
        (ctr, dir)
    }

    /// Place each polygon vertex at the point within the unit square
    /// around its lattice position that is closest to both adjacent
    /// fitted lines. Returns absolute coordinates.
    #[allow(clippy::cast_precision_loss)]
    pub fn adjust_vertices(&self, po: &[usize]) -> Vec<Point> {
        let n = self.len();
        let m = po.len();
        let origin = self.pt[0];
        let (x0, y0) = (origin.x as f64, origin.y as f64);

        // Each fitted segment as a quadratic form giving squared distance
        // to its line.
        let q: Vec<Quad> = (0..m)
            .map(|i| {
                let next = po[(i + 1) % m];
                let j = (next + n - po[i]) % n + po[i];
                let (ctr, dir) = self.point_slope(po[i], j);
                let d = dir.x * dir.x + dir.y * dir.y;
                let mut quad = [[0.0; 3]; 3];
                if d > 0.0 {
                    let v = [dir.y, -dir.x, dir.x * ctr.y - dir.y * ctr.x];
                    add_outer(&mut quad, v, d);
                }
                quad
            })
            .collect();

        (0..m)
            .map(|i| {
                let p = self.pt[po[i]];
                let s = Point::new((p.x - origin.x) as f64, (p.y - origin.y) as f64);
                let prev = (i + m - 1) % m;
                let mut quad = q[prev];
                for (row, other) in quad.iter_mut().zip(&q[i]) {
                    for (cell, o) in row.iter_mut().zip(other) {
                        *cell += o;
                    }
                }
                let best = minimize_in_square(&mut quad, s);
                Point::new(best.x + x0, best.y + y0)
            })
            .collect()
    }
}

/// Minimize `quad` over the unit square centered on `s`.
///
/// The determinant is computed without fused multiply-add so that
/// parallel lines give an exact zero.
#[allow(clippy::suboptimal_flops)]
fn minimize_in_square(quad: &mut Quad, s: Point) -> Point {
    let mut w = None;
    // Parallel lines make the form singular; add an orthogonal axis
    // through `s` until it is not. Two additions always suffice.
    for _ in 0..3 {
        let det = quad[0][0] * quad[1][1] - quad[0][1] * quad[1][0];
        if det != 0.0 {
            w = Some(Point::new(
                (-quad[0][2] * quad[1][1] + quad[1][2] * quad[0][1]) / det,
                (quad[0][2] * quad[1][0] - quad[1][2] * quad[0][0]) / det,
            ));
            break;
        }
        let (v0, v1) = if quad[0][0] > quad[1][1] {
            (-quad[0][1], quad[0][0])
        } else if quad[1][1] != 0.0 {
            (-quad[1][1], quad[1][0])
        } else {
            (1.0, 0.0)
        };
        let d = v0 * v0 + v1 * v1;
        add_outer(quad, [v0, v1, -v1 * s.y - v0 * s.x], d);
    }
    let w = w.unwrap_or(s);
    if (w.x - s.x).abs() <= 0.5 && (w.y - s.y).abs() <= 0.5 {
        return w;
    }

    // The free minimum lies outside the square: search its boundary.
    let mut min = quadform(quad, s);
    let mut best = s;
    if quad[0][0] != 0.0 {
        for z in [0.0, 1.0] {
            let y = s.y - 0.5 + z;
            let x = -quad[0][1].mul_add(y, quad[0][2]) / quad[0][0];
            let cand = quadform(quad, Point::new(x, y));
            if (x - s.x).abs() <= 0.5 && cand < min {
                min = cand;
                best = Point::new(x, y);
            }
        }
    }
    if quad[1][1] != 0.0 {
        for z in [0.0, 1.0] {
            let x = s.x - 0.5 + z;
            let y = -quad[1][0].mul_add(x, quad[1][2]) / quad[1][1];
            let cand = quadform(quad, Point::new(x, y));
            if (y - s.y).abs() <= 0.5 && cand < min {
                min = cand;
                best = Point::new(x, y);
            }
        }
    }
    for l in [0.0, 1.0] {
        for k in [0.0, 1.0] {
            let corner = Point::new(s.x - 0.5 + l, s.y - 0.5 + k);
            let cand = quadform(quad, corner);
            if cand < min {
                min = cand;
                best = corner;
            }
        }
    }
    best
}
