//! Shared types for the tracery pipeline.

use std::fmt;

use serde::{Deserialize, Serialize};

/// Re-export `RgbaImage` so downstream crates can reference bitmaps
/// without depending on `image` directly.
pub use image::RgbaImage;

/// An 8-bit RGBA raster. Every stage takes a `&Bitmap` and returns a
/// freshly allocated one.
pub type Bitmap = RgbaImage;

/// A 2D point in image coordinates.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Point {
    /// Horizontal position (pixels from left edge).
    pub x: f64,
    /// Vertical position (pixels from top edge).
    pub y: f64,
}

impl Point {
    /// Create a new point.
    #[must_use]
    pub const fn new(x: f64, y: f64) -> Self {
        Self { x, y }
    }

    /// Euclidean distance to another point.
    #[must_use]
    pub fn distance(self, other: Self) -> f64 {
        (self.x - other.x).hypot(self.y - other.y)
    }

    /// Linear interpolation: `self + t * (other - self)`.
    #[must_use]
    pub fn lerp(self, other: Self, t: f64) -> Self {
        Self::new(
            t.mul_add(other.x - self.x, self.x),
            t.mul_add(other.y - self.y, self.y),
        )
    }

    /// Returns `true` if both coordinates are finite.
    #[must_use]
    pub const fn is_finite(self) -> bool {
        self.x.is_finite() && self.y.is_finite()
    }
}

/// Image dimensions in pixels.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Dimensions {
    /// Width in pixels.
    pub width: u32,
    /// Height in pixels.
    pub height: u32,
}

impl Dimensions {
    /// Dimensions of a bitmap.
    #[must_use]
    pub fn of(bitmap: &Bitmap) -> Self {
        Self {
            width: bitmap.width(),
            height: bitmap.height(),
        }
    }

    /// Total pixel count.
    #[must_use]
    pub const fn pixel_count(self) -> u64 {
        self.width as u64 * self.height as u64
    }
}

/// A quantized RGBA color.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct Color {
    /// Red channel.
    pub r: u8,
    /// Green channel.
    pub g: u8,
    /// Blue channel.
    pub b: u8,
    /// Alpha channel.
    pub a: u8,
}

impl Color {
    /// Opaque black, the fixed monochrome foreground.
    pub const BLACK: Self = Self::rgba(0, 0, 0, 255);

    /// Opaque white.
    pub const WHITE: Self = Self::rgba(255, 255, 255, 255);

    /// Create a color from its four channels.
    #[must_use]
    pub const fn rgba(r: u8, g: u8, b: u8, a: u8) -> Self {
        Self { r, g, b, a }
    }

    /// `#rrggbb` hex notation (alpha is not included).
    #[must_use]
    pub fn hex(self) -> String {
        format!("#{:02x}{:02x}{:02x}", self.r, self.g, self.b)
    }
}

impl From<image::Rgba<u8>> for Color {
    fn from(pixel: image::Rgba<u8>) -> Self {
        let [r, g, b, a] = pixel.0;
        Self { r, g, b, a }
    }
}

impl From<Color> for image::Rgba<u8> {
    fn from(color: Color) -> Self {
        Self([color.r, color.g, color.b, color.a])
    }
}

impl fmt::Display for Color {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.hex())
    }
}

/// One drawing command of a closed sub-path.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub enum Segment {
    /// Straight line to the given point.
    Line(Point),
    /// Cubic Bézier curve with two control points and an end point.
    Cubic(Point, Point, Point),
}

impl Segment {
    /// The point this segment ends at.
    #[must_use]
    pub const fn end(&self) -> Point {
        match *self {
            Self::Line(p) | Self::Cubic(_, _, p) => p,
        }
    }

    /// All points of the segment (control points included).
    #[must_use]
    pub fn points(&self) -> Vec<Point> {
        match *self {
            Self::Line(p) => vec![p],
            Self::Cubic(c1, c2, p) => vec![c1, c2, p],
        }
    }
}

/// A single closed contour: a start point followed by segments. The
/// last segment ends back at `start`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SubPath {
    /// Where drawing begins.
    pub start: Point,
    /// Drawing commands in order.
    pub segments: Vec<Segment>,
}

impl SubPath {
    /// Number of segments.
    #[must_use]
    pub const fn len(&self) -> usize {
        self.segments.len()
    }

    /// Returns `true` if the sub-path has no segments.
    #[must_use]
    pub const fn is_empty(&self) -> bool {
        self.segments.is_empty()
    }
}

/// The outline of one region: outer contour first, then its holes.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct VectorPath {
    /// Closed sub-paths, drawn with the even-odd fill rule.
    pub subpaths: Vec<SubPath>,
}

impl VectorPath {
    /// Returns `true` if the path has no sub-paths.
    #[must_use]
    pub const fn is_empty(&self) -> bool {
        self.subpaths.is_empty()
    }

    /// Total number of segments across all sub-paths.
    #[must_use]
    pub fn segment_count(&self) -> usize {
        self.subpaths.iter().map(SubPath::len).sum()
    }

    /// Axis-aligned bounds over every start, control and end point, as
    /// `(min, max)`. Returns `None` for an empty path.
    #[must_use]
    pub fn control_bounds(&self) -> Option<(Point, Point)> {
        let mut points = self.subpaths.iter().flat_map(|sp| {
            std::iter::once(sp.start).chain(sp.segments.iter().flat_map(Segment::points))
        });
        let first = points.next()?;
        Some(points.fold((first, first), |(lo, hi), p| {
            (
                Point::new(lo.x.min(p.x), lo.y.min(p.y)),
                Point::new(hi.x.max(p.x), hi.y.max(p.y)),
            )
        }))
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn point_distance() {
        let a = Point::new(0.0, 0.0);
        let b = Point::new(3.0, 4.0);
        assert!((a.distance(b) - 5.0).abs() < f64::EPSILON);
    }

    #[test]
    fn point_lerp_endpoints_and_middle() {
        let a = Point::new(1.0, 1.0);
        let b = Point::new(3.0, 5.0);
        assert_eq!(a.lerp(b, 0.0), a);
        assert_eq!(a.lerp(b, 1.0), b);
        assert_eq!(a.lerp(b, 0.5), Point::new(2.0, 3.0));
    }

    #[test]
    fn dimensions_pixel_count() {
        let d = Dimensions {
            width: 640,
            height: 480,
        };
        assert_eq!(d.pixel_count(), 307_200);
    }

    #[test]
    fn color_hex_is_lowercase_rgb() {
        assert_eq!(Color::rgba(255, 0, 0, 255).hex(), "#ff0000");
        assert_eq!(Color::rgba(0x12, 0xab, 0xcd, 0).hex(), "#12abcd");
        assert_eq!(Color::BLACK.to_string(), "#000000");
    }

    #[test]
    fn color_converts_to_and_from_rgba_pixel() {
        let px = image::Rgba([1, 2, 3, 4]);
        let c = Color::from(px);
        assert_eq!(c, Color::rgba(1, 2, 3, 4));
        assert_eq!(image::Rgba::from(c), px);
    }

    #[test]
    fn control_bounds_cover_control_points() {
        let path = VectorPath {
            subpaths: vec![SubPath {
                start: Point::new(2.0, 1.0),
                segments: vec![
                    Segment::Cubic(Point::new(2.5, 1.0), Point::new(3.0, 1.5), Point::new(3.0, 2.0)),
                    Segment::Line(Point::new(1.0, 3.0)),
                    Segment::Line(Point::new(2.0, 1.0)),
                ],
            }],
        };
        let (lo, hi) = path.control_bounds().unwrap();
        assert_eq!(lo, Point::new(1.0, 1.0));
        assert_eq!(hi, Point::new(3.0, 3.0));
        assert_eq!(path.segment_count(), 3);
    }

    #[test]
    fn control_bounds_of_empty_path_is_none() {
        assert!(VectorPath::default().control_bounds().is_none());
    }

    #[test]
    fn vector_path_serde_round_trip() {
        let path = VectorPath {
            subpaths: vec![SubPath {
                start: Point::new(0.0, 0.0),
                segments: vec![Segment::Line(Point::new(1.0, 0.0))],
            }],
        };
        let json = serde_json::to_string(&path).unwrap();
        let back: VectorPath = serde_json::from_str(&json).unwrap();
        assert_eq!(path, back);
    }
}
