//! Boundary cycles of a labeled region.
//!
//! Every pixel edge separating the region from the outside becomes a
//! directed unit edge with the region on its right (y axis pointing down).
//! Outer boundaries therefore run clockwise on screen and holes counter
//! clockwise. At a vertex where two diagonal pixels meet, the walk turns
//! right, which keeps diagonal neighbors apart (4-connectivity).

use super::PixelBounds;
use super::regions::Segmentation;

/// An integer lattice point (a pixel corner).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct IPoint {
    pub x: i64,
    pub y: i64,
}

impl IPoint {
    pub const fn new(x: i64, y: i64) -> Self {
        Self { x, y }
    }
}

impl std::ops::Sub for IPoint {
    type Output = Self;

    fn sub(self, rhs: Self) -> Self {
        Self::new(self.x - rhs.x, self.y - rhs.y)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Dir {
    East,
    South,
    West,
    North,
}

impl Dir {
    /// Preference order when leaving a vertex with no incoming direction.
    const ALL: [Self; 4] = [Self::East, Self::South, Self::West, Self::North];

    const fn bit(self) -> u8 {
        match self {
            Self::East => 1,
            Self::South => 2,
            Self::West => 4,
            Self::North => 8,
        }
    }

    const fn right(self) -> Self {
        match self {
            Self::East => Self::South,
            Self::South => Self::West,
            Self::West => Self::North,
            Self::North => Self::East,
        }
    }

    const fn left(self) -> Self {
        match self {
            Self::East => Self::North,
            Self::North => Self::West,
            Self::West => Self::South,
            Self::South => Self::East,
        }
    }
}

/// Directed boundary edges on the vertex lattice of a bounding box.
struct EdgeGrid {
    origin: IPoint,
    stride: usize,
    out: Vec<u8>,
}

impl EdgeGrid {
    #[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
    fn build(seg: &Segmentation, id: u32, bounds: PixelBounds) -> Self {
        let bw = (bounds.max_x - bounds.min_x + 1) as usize;
        let bh = (bounds.max_y - bounds.min_y + 1) as usize;
        let stride = bw + 1;
        let mut out = vec![0u8; stride * (bh + 1)];
        let inside = |x: i64, y: i64| {
            x >= 0
                && y >= 0
                && x < i64::from(seg.width)
                && y < i64::from(seg.height)
                && seg.label_at(x as u32, y as u32) == id
        };

        for y in bounds.min_y..=bounds.max_y {
            for x in bounds.min_x..=bounds.max_x {
                if seg.label_at(x, y) != id {
                    continue;
                }
                let lx = (x - bounds.min_x) as usize;
                let ly = (y - bounds.min_y) as usize;
                let (gx, gy) = (i64::from(x), i64::from(y));
                if !inside(gx, gy - 1) {
                    out[ly * stride + lx] |= Dir::East.bit();
                }
                if !inside(gx + 1, gy) {
                    out[ly * stride + lx + 1] |= Dir::South.bit();
                }
                if !inside(gx, gy + 1) {
                    out[(ly + 1) * stride + lx + 1] |= Dir::West.bit();
                }
                if !inside(gx - 1, gy) {
                    out[(ly + 1) * stride + lx] |= Dir::North.bit();
                }
            }
        }

        Self {
            origin: IPoint::new(i64::from(bounds.min_x), i64::from(bounds.min_y)),
            stride,
            out,
        }
    }

    const fn step(&self, v: usize, dir: Dir) -> usize {
        match dir {
            Dir::East => v + 1,
            Dir::West => v - 1,
            Dir::South => v + self.stride,
            Dir::North => v - self.stride,
        }
    }

    #[allow(clippy::cast_possible_wrap)]
    const fn point(&self, v: usize) -> IPoint {
        IPoint::new(
            self.origin.x + (v % self.stride) as i64,
            self.origin.y + (v / self.stride) as i64,
        )
    }

    fn has(&self, v: usize, dir: Dir) -> bool {
        self.out[v] & dir.bit() != 0
    }

    /// Follow one cycle from `start`, consuming its edges. Returns the
    /// vertex before each unit step.
    fn follow(&mut self, start: usize) -> Vec<IPoint> {
        let mut points = Vec::new();
        let Some(mut dir) = Dir::ALL.into_iter().find(|&d| self.has(start, d)) else {
            return points;
        };
        let mut v = start;
        loop {
            points.push(self.point(v));
            self.out[v] &= !dir.bit();
            v = self.step(v, dir);
            if v == start {
                break;
            }
            let next = [dir.right(), dir, dir.left()]
                .into_iter()
                .find(|&d| self.has(v, d));
            let Some(next) = next else {
                break;
            };
            dir = next;
        }
        points
    }
}

/// Every boundary cycle of component `id`: the outer contour first, then
/// holes in raster order of their start vertex. Each cycle starts at its
/// topmost-leftmost vertex.
pub fn region_cycles(seg: &Segmentation, id: u32) -> Vec<Vec<IPoint>> {
    let bounds = seg.components[id as usize].bounds;
    let mut grid = EdgeGrid::build(seg, id, bounds);
    let mut cycles = Vec::new();
    for v in 0..grid.out.len() {
        while grid.out[v] != 0 {
            let cycle = grid.follow(v);
            if cycle.is_empty() {
                break;
            }
            cycles.push(cycle);
        }
    }
    cycles
}
