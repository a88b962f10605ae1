use image::GrayImage;
use crate::{
    algorithms::ImageprocContourExtractor,
    error::Result,
    traits::{BoundaryRenderer, ContourExtractor},
    types::{Annotation, Point, ProbabilityField},
};

/// Draws the external contours of a binary interior as anti-aliased lines.
///
/// Coverage of a pixel is `clamp(w/2 + 0.5 - d, 0, 1)` where `d` is the
/// distance from the pixel centre to the nearest segment, so pixels
/// within half the border width are fully covered and the next pixel
/// out is partially covered.
#[derive(Debug, Clone, Default)]
pub struct AntialiasedRenderer<E: ContourExtractor = ImageprocContourExtractor> {
    pub extractor: E,
}

impl<E: ContourExtractor> AntialiasedRenderer<E> {
    pub fn new(extractor: E) -> Self {
        Self { extractor }
    }
}

impl<E: ContourExtractor> BoundaryRenderer for AntialiasedRenderer<E> {
    fn render(&self, interior: &GrayImage, border_width: u32) -> Result<ProbabilityField> {
        let polylines = self.extractor.extract_contours(interior)?;
        Ok(draw_polylines(&polylines, interior.width(), interior.height(), border_width))
    }
}

/// Draw each stroke as a closed polyline onto a blank field.
pub fn draw_polylines(polylines: &Annotation, width: u32, height: u32, border_width: u32) -> ProbabilityField {
    let mut canvas = ProbabilityField::new(width, height);
    let half_width = border_width.max(1) as f32 / 2.0;

    for stroke in &polylines.strokes {
        let points = &stroke.points;
        match points.len() {
            0 => {}
            1 => draw_segment(&mut canvas, points[0], points[0], half_width),
            n => {
                for i in 0..n {
                    draw_segment(&mut canvas, points[i], points[(i + 1) % n], half_width);
                }
            }
        }
    }

    canvas
}

fn distance_to_segment(p: Point, a: Point, b: Point) -> f32 {
    let (dx, dy) = (b[0] - a[0], b[1] - a[1]);
    let length_sq = dx * dx + dy * dy;
    let t = if length_sq > 0.0 {
        (((p[0] - a[0]) * dx + (p[1] - a[1]) * dy) / length_sq).clamp(0.0, 1.0)
    } else {
        0.0
    };
    let (cx, cy) = (a[0] + t * dx, a[1] + t * dy);
    ((p[0] - cx).powi(2) + (p[1] - cy).powi(2)).sqrt()
}

fn draw_segment(canvas: &mut ProbabilityField, a: Point, b: Point, half_width: f32) {
    let (width, height) = canvas.dimensions();
    if width == 0 || height == 0 {
        return;
    }

    let reach = half_width + 0.5;
    let x_start = (a[0].min(b[0]) - reach).floor().max(0.0) as i64;
    let x_end = (a[0].max(b[0]) + reach).ceil().min(width as f32 - 1.0) as i64;
    let y_start = (a[1].min(b[1]) - reach).floor().max(0.0) as i64;
    let y_end = (a[1].max(b[1]) + reach).ceil().min(height as f32 - 1.0) as i64;

    for y in y_start..=y_end {
        for x in x_start..=x_end {
            let d = distance_to_segment([x as f32, y as f32], a, b);
            let coverage = (reach - d).clamp(0.0, 1.0);
            if coverage > 0.0 {
                let pixel = canvas.get_pixel_mut(x as u32, y as u32);
                pixel[0] = pixel[0].max(coverage);
            }
        }
    }
}

/// Render an anti-aliased field as an 8-bit binary boundary, `coverage >= 0.5`.
pub fn coverage_to_mask(field: &ProbabilityField) -> GrayImage {
    crate::types::field_to_binary(field, 0.5)
}

/// Convenience for callers holding plain 8-bit masks.
pub fn render_boundary_mask(interior: &GrayImage, border_width: u32) -> Result<GrayImage> {
    let field = AntialiasedRenderer::<ImageprocContourExtractor>::default().render(interior, border_width)?;
    Ok(coverage_to_mask(&field))
}
