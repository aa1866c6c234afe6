//! SVG assembly.
//!
//! Serializes traced regions into an SVG string using the [`svg`] crate
//! for document construction and XML escaping.
//!
//! Each region becomes one filled `<path>` whose `d` attribute holds every
//! closed sub-path of the region (outer contour, then holes). Paths use
//! `fill-rule="evenodd"` so holes stay transparent. In Color mode the
//! background color is painted first as a full-size `<rect>`.
//!
//! Coordinates are rounded to three decimals before the `svg` crate's
//! path `Data` formats them, so identical traces produce byte-identical
//! documents.
//!
//! This is a pure function with no I/O; it returns a `String`.

use svg::Document;
use svg::node::element::path::Data;
use svg::node::element::{Description, Element, Path, Rectangle, Title};
use svg::node::{Node, Text, Value};

use tracery_pipeline::{Color, Mode, Point, Segment, SubPath, Trace, VectorPath};

/// Namespace of the embedded pipeline configuration element.
const CONFIG_NAMESPACE: &str = "https://github.com/tracery-svg/tracery/ns/1";

/// Metadata to embed in the SVG document.
///
/// All fields are optional. Text values are XML-escaped automatically by
/// the `svg` crate.
#[derive(Debug, Clone, Default)]
pub struct SvgMetadata<'a> {
    /// Document title, emitted as `<title>`.
    ///
    /// Typically the source image filename (without extension).
    pub title: Option<&'a str>,

    /// Document description, emitted as `<desc>`.
    pub description: Option<&'a str>,

    /// Serialized [`PipelineConfig`](tracery_pipeline::PipelineConfig)
    /// JSON, emitted inside `<metadata>` wrapped in a namespaced
    /// `<tracery:pipeline>` element so exported files carry their
    /// settings.
    pub config_json: Option<&'a str>,
}

/// Round a coordinate to three decimals for the `f32` path data, with
/// negative zero folded into zero.
#[allow(clippy::cast_possible_truncation)]
fn coord(v: f64) -> f32 {
    ((v * 1000.0).round() / 1000.0) as f32 + 0.0
}

fn xy(p: Point) -> (f32, f32) {
    (coord(p.x), coord(p.y))
}

fn push_subpath(data: Data, sub: &SubPath) -> Data {
    let mut data = data.move_to(xy(sub.start));
    for segment in &sub.segments {
        data = match *segment {
            Segment::Line(p) => data.line_to(xy(p)),
            Segment::Cubic(c1, c2, p) => {
                let ((x1, y1), (x2, y2), (x, y)) = (xy(c1), xy(c2), xy(p));
                data.cubic_curve_to((x1, y1, x2, y2, x, y))
            }
        };
    }
    data.close()
}

/// Build an SVG path `d` attribute string from a vector path.
///
/// Every sub-path starts with `M`, continues with `L` and `C` commands and
/// ends with `z`. Sub-paths without segments are skipped. Returns an
/// empty string when nothing is left.
///
/// Coordinates are rounded to three decimals before the [`svg`] crate
/// formats them, so identical paths give identical strings.
///
/// ```
/// use tracery_pipeline::{Point, Segment, SubPath, VectorPath};
/// use tracery_export::build_path_data;
///
/// let path = VectorPath {
///     subpaths: vec![SubPath {
///         start: Point::new(1.0, 1.0),
///         segments: vec![
///             Segment::Line(Point::new(3.0, 1.0)),
///             Segment::Line(Point::new(2.0, 2.5)),
///         ],
///     }],
/// };
/// assert_eq!(build_path_data(&path), "M1,1 L3,1 L2,2.5 z");
/// ```
#[must_use]
pub fn build_path_data(path: &VectorPath) -> String {
    let data = path
        .subpaths
        .iter()
        .filter(|s| !s.is_empty())
        .fold(Data::new(), push_subpath);
    String::from(Value::from(data))
}

fn filled_path(d: String, fill: Color) -> Path {
    Path::new()
        .set("d", d)
        .set("fill", fill.hex())
        .set("fill-rule", "evenodd")
}

/// Serialize a trace into an SVG document string.
///
/// The document is `width` x `height` with `viewBox="0 0 width height"`,
/// matching the traced bitmap's pixel grid.
///
/// - [`Mode::Color`]: a background `<rect>` when the trace has a
///   background color, then one `<path>` per region filled with the
///   region's opaque RGB color.
/// - [`Mode::Monochrome`]: one `<path>` per region filled with black.
///
/// A trace without regions still produces a valid, empty document.
///
/// ```
/// use tracery_pipeline::{Dimensions, Mode, Trace};
/// use tracery_export::{SvgMetadata, assemble};
///
/// let trace = Trace {
///     dimensions: Dimensions { width: 8, height: 6 },
///     background: None,
///     regions: Vec::new(),
/// };
/// let meta = SvgMetadata {
///     title: Some("empty"),
///     ..SvgMetadata::default()
/// };
/// let svg = assemble(&trace, Mode::Color, &meta);
/// assert!(svg.contains(r#"viewBox="0 0 8 6""#));
/// assert!(svg.contains("<title>empty</title>"));
/// ```
#[must_use]
pub fn assemble(trace: &Trace, mode: Mode, metadata: &SvgMetadata<'_>) -> String {
    let w = trace.dimensions.width;
    let h = trace.dimensions.height;
    let mut doc = Document::new()
        .set("width", w)
        .set("height", h)
        .set("viewBox", (0, 0, w, h));

    if let Some(title) = metadata.title {
        doc = doc.add(Title::new(title));
    }

    if let Some(description) = metadata.description {
        doc = doc.add(Description::new().add(Text::new(description)));
    }

    if let Some(config_json) = metadata.config_json {
        let mut pipeline_el = Element::new("tracery:pipeline");
        pipeline_el.assign("xmlns:tracery", CONFIG_NAMESPACE);
        pipeline_el.append(Text::new(config_json));
        let mut metadata_el = Element::new("metadata");
        metadata_el.append(pipeline_el);
        doc = doc.add(metadata_el);
    }

    if mode == Mode::Color
        && let Some(background) = trace.background
    {
        doc = doc.add(
            Rectangle::new()
                .set("width", w)
                .set("height", h)
                .set("fill", background.hex()),
        );
    }

    let mut paths = 0usize;
    for traced in &trace.regions {
        let d = build_path_data(&traced.path);
        if d.is_empty() {
            continue;
        }
        let fill = match mode {
            Mode::Color => traced.region.color,
            Mode::Monochrome => Color::BLACK,
        };
        doc = doc.add(filled_path(d, fill));
        paths += 1;
    }

    log::debug!("assemble: {w}x{h} {mode}, {paths} path(s)");

    // The svg crate omits the XML declaration, so we prepend it.
    format!("<?xml version=\"1.0\" encoding=\"UTF-8\"?>\n{doc}\n")
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use tracery_pipeline::{Dimensions, PixelBounds, Region, TracedRegion};

    use super::*;

    fn no_meta() -> SvgMetadata<'static> {
        SvgMetadata::default()
    }

    fn square(x0: f64, y0: f64, size: f64) -> SubPath {
        SubPath {
            start: Point::new(x0, y0),
            segments: vec![
                Segment::Line(Point::new(x0 + size, y0)),
                Segment::Line(Point::new(x0 + size, y0 + size)),
                Segment::Line(Point::new(x0, y0 + size)),
                Segment::Line(Point::new(x0, y0)),
            ],
        }
    }

    fn region(color: Color, subpaths: Vec<SubPath>) -> TracedRegion {
        TracedRegion {
            region: Region {
                color,
                area: 4,
                bounds: PixelBounds {
                    min_x: 1,
                    min_y: 1,
                    max_x: 2,
                    max_y: 2,
                },
                first_pixel: (1, 1),
            },
            path: VectorPath { subpaths },
        }
    }

    fn trace(background: Option<Color>, regions: Vec<TracedRegion>) -> Trace {
        Trace {
            dimensions: Dimensions {
                width: 4,
                height: 4,
            },
            background,
            regions,
        }
    }

    // --- coordinate rounding ---

    fn line_to(x: f64, y: f64) -> String {
        build_path_data(&VectorPath {
            subpaths: vec![SubPath {
                start: Point::new(0.0, 0.0),
                segments: vec![Segment::Line(Point::new(x, y))],
            }],
        })
    }

    #[test]
    fn coordinates_have_no_trailing_zeros() {
        assert_eq!(line_to(3.0, 1.5), "M0,0 L3,1.5 z");
        assert_eq!(line_to(1.25, 10.0), "M0,0 L1.25,10 z");
        assert_eq!(line_to(100.0, 0.0), "M0,0 L100,0 z");
    }

    #[test]
    fn coordinates_round_to_three_decimals() {
        assert_eq!(line_to(2.123_456, 2.999_9), "M0,0 L2.123,3 z");
        assert_eq!(line_to(0.000_4, 7.000_6), "M0,0 L0,7.001 z");
    }

    #[test]
    fn coordinates_have_no_negative_zero() {
        assert_eq!(line_to(-0.0, -0.000_2), "M0,0 L0,0 z");
        assert_eq!(line_to(-1.5, 2.0), "M0,0 L-1.5,2 z");
    }

    // --- build_path_data ---

    #[test]
    fn build_path_data_empty_path() {
        assert_eq!(build_path_data(&VectorPath::default()), "");
    }

    #[test]
    fn build_path_data_skips_empty_subpaths() {
        let path = VectorPath {
            subpaths: vec![
                SubPath {
                    start: Point::new(5.0, 5.0),
                    segments: Vec::new(),
                },
                square(0.0, 0.0, 1.0),
            ],
        };
        assert_eq!(build_path_data(&path), "M0,0 L1,0 L1,1 L0,1 L0,0 z");
    }

    #[test]
    fn build_path_data_cubic() {
        let path = VectorPath {
            subpaths: vec![SubPath {
                start: Point::new(2.0, 1.0),
                segments: vec![Segment::Cubic(
                    Point::new(2.55, 1.0),
                    Point::new(3.0, 1.45),
                    Point::new(3.0, 2.0),
                )],
            }],
        };
        assert_eq!(build_path_data(&path), "M2,1 C2.55,1,3,1.45,3,2 z");
    }

    #[test]
    fn build_path_data_hole_is_second_subpath() {
        let path = VectorPath {
            subpaths: vec![square(0.0, 0.0, 3.0), square(1.0, 1.0, 1.0)],
        };
        let d = build_path_data(&path);
        assert_eq!(d.matches('M').count(), 2);
        assert_eq!(d.matches('z').count(), 2);
        assert!(d.starts_with("M0,0"));
        assert!(d.contains(" M1,1"));
    }

    // --- Document structure ---

    #[test]
    fn empty_trace_is_valid_empty_document() {
        let svg = assemble(&trace(None, Vec::new()), Mode::Color, &no_meta());
        assert!(svg.starts_with(r#"<?xml version="1.0" encoding="UTF-8"?>"#));
        assert!(svg.contains(r#"xmlns="http://www.w3.org/2000/svg""#));
        assert!(svg.contains(r#"width="4""#));
        assert!(svg.contains(r#"height="4""#));
        assert!(svg.contains(r#"viewBox="0 0 4 4""#));
        assert!(!svg.contains("<path"));
        assert!(!svg.contains("<rect"));
    }

    #[test]
    fn color_mode_paints_background_then_regions() {
        let red = Color::rgba(255, 0, 0, 255);
        let t = trace(
            Some(Color::WHITE),
            vec![region(red, vec![square(1.0, 1.0, 2.0)])],
        );
        let svg = assemble(&t, Mode::Color, &no_meta());

        assert!(svg.contains(r##"fill="#ffffff""##));
        assert!(svg.contains(r##"fill="#ff0000""##));
        assert!(svg.contains(r#"fill-rule="evenodd""#));
        assert_eq!(svg.matches("<path").count(), 1);
        let rect = svg.find("<rect").unwrap();
        let path = svg.find("<path").unwrap();
        assert!(rect < path, "background must be painted first");
        assert!(svg.trim_end().ends_with("</svg>"));
    }

    #[test]
    fn fill_ignores_alpha() {
        let translucent = Color::rgba(0, 128, 255, 64);
        let t = trace(None, vec![region(translucent, vec![square(1.0, 1.0, 2.0)])]);
        let svg = assemble(&t, Mode::Color, &no_meta());
        assert!(svg.contains(r##"fill="#0080ff""##));
    }

    #[test]
    fn monochrome_mode_fills_black_without_background() {
        let t = trace(
            Some(Color::WHITE),
            vec![region(
                Color::rgba(10, 20, 30, 255),
                vec![square(1.0, 1.0, 2.0)],
            )],
        );
        let svg = assemble(&t, Mode::Monochrome, &no_meta());
        assert!(svg.contains(r##"fill="#000000""##));
        assert!(!svg.contains("<rect"));
        assert!(!svg.contains("#0a141e"));
    }

    #[test]
    fn one_path_per_region_in_order() {
        let a = Color::rgba(255, 0, 0, 255);
        let b = Color::rgba(0, 0, 255, 255);
        let t = trace(
            None,
            vec![
                region(a, vec![square(0.0, 0.0, 1.0)]),
                region(b, vec![square(2.0, 2.0, 1.0)]),
            ],
        );
        let svg = assemble(&t, Mode::Color, &no_meta());
        assert_eq!(svg.matches("<path").count(), 2);
        assert!(svg.find("#ff0000").unwrap() < svg.find("#0000ff").unwrap());
    }

    #[test]
    fn region_without_subpaths_is_skipped() {
        let t = trace(None, vec![region(Color::BLACK, Vec::new())]);
        let svg = assemble(&t, Mode::Color, &no_meta());
        assert!(!svg.contains("<path"));
    }

    #[test]
    fn assembly_is_byte_reproducible() {
        let t = trace(
            Some(Color::WHITE),
            vec![region(Color::rgba(1, 2, 3, 255), vec![square(0.5, 0.25, 1.125)])],
        );
        assert_eq!(
            assemble(&t, Mode::Color, &no_meta()),
            assemble(&t, Mode::Color, &no_meta())
        );
    }

    // --- Metadata ---

    #[test]
    fn title_and_desc_emitted() {
        let meta = SvgMetadata {
            title: Some("poster"),
            description: Some("turd=2"),
            ..SvgMetadata::default()
        };
        let svg = assemble(&trace(None, Vec::new()), Mode::Color, &meta);
        assert!(svg.contains("<title>poster</title>"));
        assert!(svg.contains("<desc>turd=2</desc>"));
    }

    #[test]
    fn title_and_desc_omitted_when_none() {
        let svg = assemble(&trace(None, Vec::new()), Mode::Color, &no_meta());
        assert!(!svg.contains("<title>"));
        assert!(!svg.contains("<desc>"));
        assert!(!svg.contains("<metadata>"));
    }

    #[test]
    fn special_characters_are_escaped() {
        let meta = SvgMetadata {
            title: Some("A <B> & C"),
            ..SvgMetadata::default()
        };
        let svg = assemble(&trace(None, Vec::new()), Mode::Color, &meta);
        assert!(svg.contains("<title>A &lt;B&gt; &amp; C</title>"));
    }

    #[test]
    fn config_json_is_wrapped_in_namespaced_element() {
        let meta = SvgMetadata {
            config_json: Some(r#"{"mode":"color"}"#),
            ..SvgMetadata::default()
        };
        let svg = assemble(&trace(None, Vec::new()), Mode::Color, &meta);
        assert!(svg.contains("<metadata>"));
        assert!(svg.contains(&format!(
            r#"<tracery:pipeline xmlns:tracery="{CONFIG_NAMESPACE}">"#
        )));
        assert!(svg.contains("</tracery:pipeline>"));
    }

    #[test]
    fn metadata_precedes_background_and_paths() {
        let meta = SvgMetadata {
            title: Some("t"),
            description: Some("d"),
            config_json: Some("{}"),
        };
        let t = trace(
            Some(Color::WHITE),
            vec![region(Color::BLACK, vec![square(1.0, 1.0, 1.0)])],
        );
        let svg = assemble(&t, Mode::Color, &meta);
        let title = svg.find("<title>").unwrap();
        let desc = svg.find("<desc>").unwrap();
        let metadata = svg.find("<metadata>").unwrap();
        let rect = svg.find("<rect").unwrap();
        let path = svg.find("<path").unwrap();
        assert!(title < desc && desc < metadata && metadata < rect && rect < path);
    }
}
