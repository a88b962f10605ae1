use image::{GrayImage, Luma};
use imageproc::drawing::draw_line_segment_mut;
use crate::{
    traits::InteriorRasterizer,
    types::{ClosedContour, Point, FOREGROUND},
};

/// Even-odd scanline polygon fill.
///
/// Integer coordinates are pixel centres. The polygon outline itself is
/// drawn as well, so boundary pixels of a traced contour are always inside
/// the filled region. Anything outside the raster is clipped.
#[derive(Debug, Clone, Default)]
pub struct ScanlineRasterizer;

impl InteriorRasterizer for ScanlineRasterizer {
    fn rasterize(&self, contours: &[ClosedContour], width: u32, height: u32) -> GrayImage {
        let mut mask = GrayImage::new(width, height);
        for contour in contours {
            fill_contour(&mut mask, &contour.points);
        }
        mask
    }
}

/// Fill one closed polygon into `mask` with the foreground value.
pub fn fill_contour(mask: &mut GrayImage, points: &[Point]) {
    let (width, height) = mask.dimensions();
    if width == 0 || height == 0 {
        return;
    }

    match points {
        [] => return,
        [[x, y]] => {
            let (x, y) = (x.round(), y.round());
            if x >= 0.0 && y >= 0.0 && (x as u32) < width && (y as u32) < height {
                mask.put_pixel(x as u32, y as u32, Luma([FOREGROUND]));
            }
            return;
        }
        _ => {}
    }

    let min_y = points.iter().map(|p| p[1]).fold(f32::INFINITY, f32::min);
    let max_y = points.iter().map(|p| p[1]).fold(f32::NEG_INFINITY, f32::max);
    let y_start = min_y.ceil().max(0.0) as i64;
    let y_end = max_y.floor().min(height as f32 - 1.0) as i64;

    let mut crossings: Vec<f32> = Vec::new();
    for y in y_start..=y_end {
        let scan_y = y as f32;
        crossings.clear();

        for i in 0..points.len() {
            let p1 = points[i];
            let p2 = points[(i + 1) % points.len()];

            // half-open so shared vertices are counted once
            if (p1[1] <= scan_y && p2[1] > scan_y) || (p2[1] <= scan_y && p1[1] > scan_y) {
                let t = (scan_y - p1[1]) / (p2[1] - p1[1]);
                crossings.push(p1[0] + t * (p2[0] - p1[0]));
            }
        }

        crossings.sort_by(|a, b| a.total_cmp(b));

        for span in crossings.chunks_exact(2) {
            let x_start = span[0].ceil().max(0.0) as i64;
            let x_end = span[1].floor().min(width as f32 - 1.0) as i64;
            for x in x_start..=x_end {
                mask.put_pixel(x as u32, y as u32, Luma([FOREGROUND]));
            }
        }
    }

    for i in 0..points.len() {
        let [x0, y0] = points[i];
        let [x1, y1] = points[(i + 1) % points.len()];
        draw_line_segment_mut(mask, (x0, y0), (x1, y1), Luma([FOREGROUND]));
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::count_foreground;

    #[test]
    fn test_square_fill() {
        let square = ClosedContour::new(vec![[2.0, 2.0], [7.0, 2.0], [7.0, 7.0], [2.0, 7.0]]);
        let mask = ScanlineRasterizer.rasterize(&[square], 10, 10);

        assert_eq!(count_foreground(&mask), 36);
        assert_eq!(mask.get_pixel(2, 2)[0], FOREGROUND);
        assert_eq!(mask.get_pixel(7, 7)[0], FOREGROUND);
        assert_eq!(mask.get_pixel(1, 1)[0], 0);
        assert_eq!(mask.get_pixel(8, 5)[0], 0);
    }

    #[test]
    fn test_disjoint_contours_are_unioned() {
        let a = ClosedContour::new(vec![[0.0, 0.0], [3.0, 0.0], [3.0, 3.0], [0.0, 3.0]]);
        let b = ClosedContour::new(vec![[10.0, 10.0], [13.0, 10.0], [13.0, 13.0], [10.0, 13.0]]);
        let mask = ScanlineRasterizer.rasterize(&[a, b], 20, 20);

        assert_eq!(count_foreground(&mask), 32);
        assert_eq!(mask.get_pixel(6, 6)[0], 0);
    }

    #[test]
    fn test_contours_are_clipped_to_raster() {
        let huge = ClosedContour::new(vec![[-50.0, -50.0], [50.0, -50.0], [50.0, 50.0], [-50.0, 50.0]]);
        let mask = ScanlineRasterizer.rasterize(&[huge], 10, 10);
        assert_eq!(count_foreground(&mask), 100);
    }

    #[test]
    fn test_degenerate_contours() {
        let point = ClosedContour::new(vec![[4.0, 4.0]]);
        let segment = ClosedContour::new(vec![[0.0, 0.0], [0.0, 3.0]]);
        let outside = ClosedContour::new(vec![[40.0, 40.0]]);
        let mask = ScanlineRasterizer.rasterize(&[point, segment, outside], 10, 10);

        assert_eq!(mask.get_pixel(4, 4)[0], FOREGROUND);
        assert_eq!(count_foreground(&mask), 5);
    }
}
