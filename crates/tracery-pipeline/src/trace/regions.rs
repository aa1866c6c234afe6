//! Segmentation: palette classes, 4-connected labeling, and absorption
//! of regions smaller than the turd size.

use std::cmp::Reverse;
use std::collections::{BTreeMap, BinaryHeap, HashMap};

use image::{ImageBuffer, Luma};
use imageproc::region_labelling::{Connectivity, connected_components};

use crate::config::Mode;
use crate::types::{Bitmap, Color};

use super::PixelBounds;

/// Class index of monochrome background pixels.
pub const MONO_BACKGROUND: u32 = 0;
/// Class index of monochrome foreground pixels.
pub const MONO_FOREGROUND: u32 = 1;

/// One 4-connected component of a class image.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Component {
    /// Palette class shared by every pixel.
    pub class: u32,
    /// Pixel count.
    pub area: u32,
    /// Raster index (`y * width + x`) of the topmost-leftmost pixel.
    pub first: usize,
    /// Inclusive pixel bounds.
    pub bounds: PixelBounds,
}

/// A labeled class image. Labels index `components`, which are in raster
/// order of their first pixel.
#[derive(Debug, Clone)]
pub struct Segmentation {
    pub width: u32,
    pub height: u32,
    pub labels: Vec<u32>,
    pub components: Vec<Component>,
    /// Class index to color.
    pub palette: Vec<Color>,
}

impl Segmentation {
    /// Label of pixel `(x, y)`.
    pub fn label_at(&self, x: u32, y: u32) -> u32 {
        self.labels[y as usize * self.width as usize + x as usize]
    }

    /// The class covering the most pixels; ties go to the class whose
    /// first surviving pixel comes first in raster order.
    pub fn dominant_class(&self) -> Option<u32> {
        let mut totals: BTreeMap<u32, (u64, usize)> = BTreeMap::new();
        for c in &self.components {
            let entry = totals.entry(c.class).or_insert((0, c.first));
            entry.0 += u64::from(c.area);
            entry.1 = entry.1.min(c.first);
        }
        totals
            .into_iter()
            .max_by(|(_, (area_a, first_a)), (_, (area_b, first_b))| {
                area_a.cmp(area_b).then_with(|| first_b.cmp(first_a))
            })
            .map(|(class, _)| class)
    }
}

/// Rec. 601 luma test in exact integer arithmetic:
/// `0.299 R + 0.587 G + 0.114 B < threshold`.
fn is_foreground(px: image::Rgba<u8>, threshold: u8) -> bool {
    let [r, g, b, _] = px.0;
    299 * u32::from(r) + 587 * u32::from(g) + 114 * u32::from(b) < 1000 * u32::from(threshold)
}

/// Assign each pixel a class index.
///
/// Color mode uses one class per distinct RGBA value in raster order of
/// first occurrence. Monochrome mode uses [`MONO_BACKGROUND`] and
/// [`MONO_FOREGROUND`].
pub fn classify(bitmap: &Bitmap, mode: Mode, threshold: u8) -> (Vec<u32>, Vec<Color>) {
    match mode {
        Mode::Color => {
            let mut palette = Vec::new();
            let mut index: HashMap<Color, u32> = HashMap::new();
            let classes = bitmap
                .pixels()
                .map(|&px| {
                    let color = Color::from(px);
                    *index.entry(color).or_insert_with(|| {
                        palette.push(color);
                        #[allow(clippy::cast_possible_truncation)]
                        let next = (palette.len() - 1) as u32;
                        next
                    })
                })
                .collect();
            (classes, palette)
        }
        Mode::Monochrome => {
            let classes = bitmap
                .pixels()
                .map(|&px| {
                    if is_foreground(px, threshold) {
                        MONO_FOREGROUND
                    } else {
                        MONO_BACKGROUND
                    }
                })
                .collect();
            (classes, vec![Color::WHITE, Color::BLACK])
        }
    }
}

/// 4-connected components of a class image, relabeled so that label
/// order is raster order of each component's first pixel.
pub fn label(width: u32, height: u32, classes: &[u32]) -> (Vec<u32>, Vec<Component>) {
    let w = width as usize;
    // Classes are shifted by one and framed by a one-pixel border of the
    // background value 0. imageproc numbers foreground labels from 1 but
    // sizes its forest to the pixel count, so the image must always
    // contain at least one background pixel.
    let class_image: ImageBuffer<Luma<u32>, Vec<u32>> =
        ImageBuffer::from_fn(width + 2, height + 2, |x, y| {
            if x == 0 || y == 0 || x > width || y > height {
                Luma([0])
            } else {
                Luma([classes[(y - 1) as usize * w + (x - 1) as usize] + 1])
            }
        });
    let raw = connected_components(&class_image, Connectivity::Four, Luma([0u32]));

    let mut remap = vec![u32::MAX; raw.as_raw().len() + 1];
    let mut labels = Vec::with_capacity(classes.len());
    let mut components: Vec<Component> = Vec::new();
    for i in 0..classes.len() {
        #[allow(clippy::cast_possible_truncation)]
        let (x, y) = ((i % w) as u32, (i / w) as u32);
        let raw_label = raw.get_pixel(x + 1, y + 1)[0];
        let slot = &mut remap[raw_label as usize];
        if *slot == u32::MAX {
            #[allow(clippy::cast_possible_truncation)]
            let next = components.len() as u32;
            *slot = next;
            components.push(Component {
                class: classes[i],
                area: 0,
                first: i,
                bounds: PixelBounds {
                    min_x: x,
                    min_y: y,
                    max_x: x,
                    max_y: y,
                },
            });
        }
        let id = *slot;
        let c = &mut components[id as usize];
        c.area += 1;
        c.bounds.include(x, y);
        labels.push(id);
    }
    (labels, components)
}

/// Shared border length between every pair of touching components.
fn borders(width: u32, height: u32, labels: &[u32], count: usize) -> Vec<BTreeMap<usize, u32>> {
    let (w, h) = (width as usize, height as usize);
    let mut adj = vec![BTreeMap::new(); count];
    let mut touch = |a: u32, b: u32| {
        if a != b {
            *adj[a as usize].entry(b as usize).or_insert(0) += 1;
            *adj[b as usize].entry(a as usize).or_insert(0) += 1;
        }
    };
    for y in 0..h {
        for x in 0..w {
            let i = y * w + x;
            if x + 1 < w {
                touch(labels[i], labels[i + 1]);
            }
            if y + 1 < h {
                touch(labels[i], labels[i + w]);
            }
        }
    }
    adj
}

fn root(owner: &mut [usize], mut c: usize) -> usize {
    while owner[c] != c {
        owner[c] = owner[owner[c]];
        c = owner[c];
    }
    c
}

/// Absorb every component smaller than `turd_size` into the neighbor it
/// shares the longest border with, smallest first. Rewrites `classes` and
/// returns the number of absorptions.
fn absorb_small(
    width: u32,
    height: u32,
    labels: &[u32],
    components: &[Component],
    classes: &mut [u32],
    turd_size: u32,
) -> usize {
    let k = components.len();
    let mut area: Vec<u32> = components.iter().map(|c| c.area).collect();
    let mut first: Vec<usize> = components.iter().map(|c| c.first).collect();
    let mut adj = borders(width, height, labels, k);
    let mut owner: Vec<usize> = (0..k).collect();

    let mut heap: BinaryHeap<Reverse<(u32, usize, usize)>> = (0..k)
        .filter(|&c| area[c] < turd_size)
        .map(|c| Reverse((area[c], first[c], c)))
        .collect();

    let mut merges = 0;
    while let Some(Reverse((a, f, c))) = heap.pop() {
        if owner[c] != c || area[c] != a || first[c] != f {
            continue;
        }
        let target = adj[c]
            .iter()
            .max_by(|(na, la), (nb, lb)| la.cmp(lb).then_with(|| first[**nb].cmp(&first[**na])))
            .map(|(&n, _)| n);
        let Some(t) = target else {
            continue;
        };

        for (n, len) in std::mem::take(&mut adj[c]) {
            adj[n].remove(&c);
            if n != t {
                *adj[t].entry(n).or_insert(0) += len;
                *adj[n].entry(t).or_insert(0) += len;
            }
        }
        area[t] += area[c];
        first[t] = first[t].min(first[c]);
        owner[c] = t;
        merges += 1;
        log::trace!("absorb component {c} (area {a}) into {t}");

        if area[t] < turd_size {
            heap.push(Reverse((area[t], first[t], t)));
        }
    }

    if merges > 0 {
        let class_of: Vec<u32> = (0..k)
            .map(|c| components[root(&mut owner, c)].class)
            .collect();
        for (class, &l) in classes.iter_mut().zip(labels) {
            *class = class_of[l as usize];
        }
    }
    merges
}

/// Classify, label, and absorb small components until none can be
/// absorbed.
pub fn segment(bitmap: &Bitmap, mode: Mode, threshold: u8, turd_size: u32) -> Segmentation {
    let (width, height) = bitmap.dimensions();
    let (mut classes, palette) = classify(bitmap, mode, threshold);
    loop {
        let (labels, components) = label(width, height, &classes);
        let merged = absorb_small(width, height, &labels, &components, &mut classes, turd_size);
        log::trace!(
            "segment: {} component(s), {merged} absorbed",
            components.len()
        );
        if merged == 0 {
            return Segmentation {
                width,
                height,
                labels,
                components,
                palette,
            };
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use image::Rgba;

    use super::*;

    const RED: Rgba<u8> = Rgba([255, 0, 0, 255]);
    const WHITE: Rgba<u8> = Rgba([255, 255, 255, 255]);
    const BLUE: Rgba<u8> = Rgba([0, 0, 255, 255]);

    fn from_rows(rows: &[&str]) -> Bitmap {
        let h = rows.len() as u32;
        let w = rows[0].len() as u32;
        Bitmap::from_fn(w, h, |x, y| match rows[y as usize].as_bytes()[x as usize] {
            b'R' => RED,
            b'B' => BLUE,
            _ => WHITE,
        })
    }

    #[test]
    fn palette_is_raster_order_of_first_occurrence() {
        let img = from_rows(&["WRB", "BRW"]);
        let (classes, palette) = classify(&img, Mode::Color, 128);
        assert_eq!(palette.len(), 3);
        assert_eq!(palette[0], Color::WHITE);
        assert_eq!(palette[1], Color::rgba(255, 0, 0, 255));
        assert_eq!(classes, vec![0, 1, 2, 2, 1, 0]);
    }

    #[test]
    fn alpha_separates_colors() {
        let img = Bitmap::from_fn(2, 1, |x, _| Rgba([9, 9, 9, if x == 0 { 255 } else { 0 }]));
        let (_, palette) = classify(&img, Mode::Color, 128);
        assert_eq!(palette.len(), 2);
    }

    #[test]
    fn monochrome_threshold_uses_luma() {
        // luma(255,0,0) = 76.245
        let img = Bitmap::from_fn(1, 1, |_, _| RED);
        let (at_76, _) = classify(&img, Mode::Monochrome, 76);
        let (at_77, _) = classify(&img, Mode::Monochrome, 77);
        assert_eq!(at_76, vec![MONO_BACKGROUND]);
        assert_eq!(at_77, vec![MONO_FOREGROUND]);
    }

    #[test]
    fn diagonal_pixels_are_separate_components() {
        let img = from_rows(&["RW", "WR"]);
        let (classes, _) = classify(&img, Mode::Color, 128);
        let (labels, comps) = label(2, 2, &classes);
        assert_eq!(comps.len(), 4);
        assert_eq!(labels, vec![0, 1, 2, 3]);
    }

    #[test]
    fn checkerboard_gives_one_component_per_pixel() {
        let img = from_rows(&["RWR", "WRW", "RWR"]);
        let (classes, _) = classify(&img, Mode::Color, 128);
        let (labels, comps) = label(3, 3, &classes);
        assert_eq!(comps.len(), 9);
        assert_eq!(labels, (0..9).collect::<Vec<u32>>());
        assert!(comps.iter().all(|c| c.area == 1));
    }

    #[test]
    fn single_pixel_is_one_component() {
        let img = from_rows(&["R"]);
        for mode in [Mode::Color, Mode::Monochrome] {
            let (classes, _) = classify(&img, mode, 128);
            let (labels, comps) = label(1, 1, &classes);
            assert_eq!(labels, vec![0]);
            assert_eq!(comps.len(), 1);
            assert_eq!(comps[0].area, 1);
            assert_eq!(comps[0].first, 0);
        }
    }

    #[test]
    fn labels_follow_raster_order() {
        let img = from_rows(&["WWW", "WRW", "WWW"]);
        let (classes, _) = classify(&img, Mode::Color, 128);
        let (labels, comps) = label(3, 3, &classes);
        assert_eq!(comps.len(), 2);
        assert_eq!(comps[0].area, 8);
        assert_eq!(comps[1].area, 1);
        assert_eq!(comps[1].first, 4);
        assert_eq!(labels[4], 1);
        assert_eq!(
            comps[0].bounds,
            PixelBounds {
                min_x: 0,
                min_y: 0,
                max_x: 2,
                max_y: 2
            }
        );
    }

    #[test]
    fn speck_is_absorbed_without_hole() {
        let img = from_rows(&["WWW", "WRW", "WWW"]);
        let seg = segment(&img, Mode::Color, 128, 2);
        assert_eq!(seg.components.len(), 1);
        assert_eq!(seg.components[0].area, 9);
        assert_eq!(seg.palette[seg.components[0].class as usize], Color::WHITE);
    }

    #[test]
    fn speck_is_kept_at_turd_size_one() {
        let img = from_rows(&["WWW", "WRW", "WWW"]);
        let seg = segment(&img, Mode::Color, 128, 1);
        assert_eq!(seg.components.len(), 2);
    }

    #[test]
    fn absorbed_into_longest_border() {
        // The single R touches B on three sides and W on one.
        let img = from_rows(&["BBW", "BRW", "BBW"]);
        let seg = segment(&img, Mode::Color, 128, 2);
        let r_pos = 4;
        let label = seg.labels[r_pos] as usize;
        assert_eq!(seg.palette[seg.components[label].class as usize], Color::rgba(0, 0, 255, 255));
    }

    #[test]
    fn equal_borders_prefer_earlier_neighbor() {
        // R touches W (left, first) and B (right) once each.
        let img = from_rows(&["WWRBB"]);
        let seg = segment(&img, Mode::Color, 128, 2);
        assert_eq!(seg.labels[2], seg.labels[0]);
    }

    #[test]
    fn absorption_merges_same_colored_neighbors() {
        // The R speck separates two W runs; once absorbed they join.
        let img = from_rows(&["WWRWW", "BBBBB"]);
        let seg = segment(&img, Mode::Color, 128, 2);
        assert_eq!(seg.components.len(), 2);
        assert_eq!(seg.components[0].area, 5);
    }

    #[test]
    fn lone_small_component_is_not_absorbed() {
        let img = from_rows(&["R"]);
        let seg = segment(&img, Mode::Color, 128, 5);
        assert_eq!(seg.components.len(), 1);
        assert_eq!(seg.components[0].area, 1);
    }

    #[test]
    fn dominant_class_breaks_ties_by_raster_order() {
        let img = from_rows(&["RRWW"]);
        let seg = segment(&img, Mode::Color, 128, 1);
        assert_eq!(seg.dominant_class(), Some(0));
        assert_eq!(seg.palette[0], Color::rgba(255, 0, 0, 255));
    }

    #[test]
    fn dominant_class_sums_disjoint_components() {
        let img = from_rows(&["RWWR", "RBBR", "RWWR"]);
        let seg = segment(&img, Mode::Color, 128, 1);
        let dominant = seg.dominant_class().unwrap();
        assert_eq!(seg.palette[dominant as usize], Color::rgba(255, 0, 0, 255));
    }
}
