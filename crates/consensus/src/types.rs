use geo_types::{Coord, LineString, Polygon};
use image::{GrayImage, ImageBuffer, Luma};
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

use crate::config::DecisionMode;

/// A 2D coordinate in pixel space, `[x, y]`.
pub type Point = [f32; 2];

/// Per-pixel real values in `[0, 1]`: occupancy ratios, sigmoid
/// probabilities, or anti-aliased boundary coverage.
pub type ProbabilityField = ImageBuffer<Luma<f32>, Vec<f32>>;

/// Value written for foreground pixels of every binary mask this crate
/// produces. Any non-zero pixel is read as foreground.
pub const FOREGROUND: u8 = 255;

/// One continuous pen motion: an open polyline.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
#[serde(transparent)]
pub struct Stroke {
    pub points: Vec<Point>,
}

impl Stroke {
    pub fn new(points: Vec<Point>) -> Self {
        Self { points }
    }

    pub fn first(&self) -> Option<Point> {
        self.points.first().copied()
    }

    /// A single-point stroke has coinciding first and last points.
    pub fn last(&self) -> Option<Point> {
        self.points.last().copied()
    }

    pub fn is_empty(&self) -> bool {
        self.points.is_empty()
    }
}

/// All strokes drawn by one volunteer on one image slice.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize, JsonSchema)]
#[serde(transparent)]
pub struct Annotation {
    pub strokes: Vec<Stroke>,
}

impl Annotation {
    pub fn new(strokes: Vec<Stroke>) -> Self {
        Self { strokes }
    }

    /// Build an annotation from raw point lists, one list per stroke.
    pub fn from_point_lists(lists: Vec<Vec<Point>>) -> Self {
        Self {
            strokes: lists.into_iter().map(Stroke::new).collect(),
        }
    }

    /// Scale every coordinate by independent x/y zoom factors.
    pub fn scaled(&self, zoom_x: f32, zoom_y: f32) -> Self {
        let strokes = self
            .strokes
            .iter()
            .map(|stroke| {
                Stroke::new(
                    stroke
                        .points
                        .iter()
                        .map(|&[x, y]| [x * zoom_x, y * zoom_y])
                        .collect(),
                )
            })
            .collect();
        Self { strokes }
    }

    pub fn len(&self) -> usize {
        self.strokes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.strokes.is_empty()
    }
}

/// A closed loop reconstructed from one or more strokes. The last point
/// connects back to the first through an implicit edge.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ClosedContour {
    pub points: Vec<Point>,
}

impl ClosedContour {
    pub fn new(points: Vec<Point>) -> Self {
        Self { points }
    }

    /// Convert to geo-types Polygon for geometric operations
    pub fn to_geo_polygon(&self) -> Polygon<f32> {
        let coords: Vec<Coord<f32>> = self
            .points
            .iter()
            .map(|&[x, y]| Coord { x, y })
            .collect();

        // Polygon::new closes the ring itself
        Polygon::new(LineString::new(coords), vec![])
    }

    /// Enclosed area in square pixels
    pub fn area(&self) -> f32 {
        use geo::Area;
        self.to_geo_polygon().unsigned_area()
    }

    /// Perimeter length, including the implicit closing edge
    pub fn perimeter(&self) -> f32 {
        let n = self.points.len();
        if n < 2 {
            return 0.0;
        }
        (0..n)
            .map(|i| {
                let [x0, y0] = self.points[i];
                let [x1, y1] = self.points[(i + 1) % n];
                ((x1 - x0).powi(2) + (y1 - y0).powi(2)).sqrt()
            })
            .sum()
    }

    /// Get the bounding box of the contour
    pub fn bounding_box(&self) -> ([f32; 2], [f32; 2]) {
        let mut min_x = f32::INFINITY;
        let mut min_y = f32::INFINITY;
        let mut max_x = f32::NEG_INFINITY;
        let mut max_y = f32::NEG_INFINITY;

        for &[x, y] in &self.points {
            min_x = min_x.min(x);
            min_y = min_y.min(y);
            max_x = max_x.max(x);
            max_y = max_y.max(y);
        }

        ([min_x, min_y], [max_x, max_y])
    }

    pub fn len(&self) -> usize {
        self.points.len()
    }

    pub fn is_empty(&self) -> bool {
        self.points.is_empty()
    }
}

/// Every volunteer's annotation for one slice, plus the raster size the
/// consensus is built at.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SliceAnnotations {
    pub name: String,
    pub width: u32,
    pub height: u32,
    pub annotations: Vec<Annotation>,
}

/// Physical pixel pitch attached to persisted labels.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct PixelSize {
    /// XY pitch, in `unit` per pixel
    pub xy: f64,
    /// Distance between consecutive slices, in `unit`
    pub z: f64,
    pub unit: String,
}

impl Default for PixelSize {
    fn default() -> Self {
        Self {
            xy: 1.0,
            z: 1.0,
            unit: String::new(),
        }
    }
}

/// Output of the forward pipeline for one slice.
#[derive(Debug, Clone)]
pub struct ConsensusLabel {
    pub name: String,
    /// Anti-aliased boundary coverage; this is the training label
    pub boundary: ProbabilityField,
    /// Field the decision rule was applied to, kept for diagnostics
    pub probability: ProbabilityField,
    /// Binary consensus interior
    pub interior: GrayImage,
    pub border_width: u32,
    pub mode: DecisionMode,
    pub pixel_size: PixelSize,
}

impl ConsensusLabel {
    pub fn width(&self) -> u32 {
        self.boundary.width()
    }

    pub fn height(&self) -> u32 {
        self.boundary.height()
    }

    /// Boundary label binarized at half coverage
    pub fn boundary_mask(&self) -> GrayImage {
        field_to_binary(&self.boundary, 0.5)
    }
}

/// A stack of same-sized 2D masks, depth first. A single 2D mask is a
/// stack of one slice.
#[derive(Debug, Clone, Default)]
pub struct MaskStack {
    pub slices: Vec<GrayImage>,
}

impl MaskStack {
    pub fn new(slices: Vec<GrayImage>) -> Self {
        Self { slices }
    }

    pub fn depth(&self) -> usize {
        self.slices.len()
    }
}

impl From<GrayImage> for MaskStack {
    fn from(slice: GrayImage) -> Self {
        Self { slices: vec![slice] }
    }
}

/// Whether any pixel of the mask is foreground
pub fn has_foreground(mask: &GrayImage) -> bool {
    mask.pixels().any(|p| p[0] > 0)
}

/// Count of foreground pixels
pub fn count_foreground(mask: &GrayImage) -> usize {
    mask.pixels().filter(|p| p[0] > 0).count()
}

/// Threshold an 8-bit image at 128 into a binary mask.
pub fn to_binary(image: &GrayImage) -> GrayImage {
    GrayImage::from_fn(image.width(), image.height(), |x, y| {
        Luma([if image.get_pixel(x, y)[0] >= 128 { FOREGROUND } else { 0 }])
    })
}

/// Threshold a real-valued field into a binary mask, `value >= threshold`.
pub fn field_to_binary(field: &ProbabilityField, threshold: f32) -> GrayImage {
    GrayImage::from_fn(field.width(), field.height(), |x, y| {
        Luma([if field.get_pixel(x, y)[0] >= threshold { FOREGROUND } else { 0 }])
    })
}

/// Quantize a `[0, 1]` field to 8 bits for storage or display.
pub fn field_to_luma8(field: &ProbabilityField) -> GrayImage {
    GrayImage::from_fn(field.width(), field.height(), |x, y| {
        Luma([(field.get_pixel(x, y)[0].clamp(0.0, 1.0) * 255.0).round() as u8])
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_annotation_scaling() {
        let annotation = Annotation::from_point_lists(vec![vec![[1.0, 2.0], [3.0, 4.0]]]);
        let scaled = annotation.scaled(2.0, 0.5);
        assert_eq!(scaled.strokes[0].points, vec![[2.0, 1.0], [6.0, 2.0]]);
    }

    #[test]
    fn test_annotation_json_is_nested_point_lists() {
        let json = "[[[0.0, 0.0], [1.0, 0.0]], [[1.0, 1.0]]]";
        let annotation: Annotation = serde_json::from_str(json).expect("Should parse");
        assert_eq!(annotation.len(), 2);
        assert_eq!(annotation.strokes[1].first(), annotation.strokes[1].last());
    }

    #[test]
    fn test_contour_measurements() {
        let square = ClosedContour::new(vec![[0.0, 0.0], [4.0, 0.0], [4.0, 4.0], [0.0, 4.0]]);
        assert!((square.area() - 16.0).abs() < 1e-4);
        assert!((square.perimeter() - 16.0).abs() < 1e-4);
        assert_eq!(square.bounding_box(), ([0.0, 0.0], [4.0, 4.0]));
    }

    #[test]
    fn test_binarization() {
        let mut image = GrayImage::new(2, 1);
        image.put_pixel(0, 0, Luma([127]));
        image.put_pixel(1, 0, Luma([128]));
        let binary = to_binary(&image);
        assert_eq!(binary.get_pixel(0, 0)[0], 0);
        assert_eq!(binary.get_pixel(1, 0)[0], FOREGROUND);
    }
}
