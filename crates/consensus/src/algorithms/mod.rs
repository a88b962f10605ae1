pub mod extraction;
pub mod closing;
pub mod rasterization;
pub mod aggregation;
pub mod rendering;

pub use extraction::*;
pub use closing::*;
pub use rasterization::*;
pub use aggregation::*;
pub use rendering::*;

use std::sync::Arc;

use image::GrayImage;
use crate::{
    error::Result,
    types::{has_foreground, Annotation, ClosedContour},
    traits::{ContourCloser, ContourExtractor, InteriorRasterizer},
};

/// Closing plus filling, shared by the label pipeline (strokes to
/// interior) and by evaluation (boundary mask back to interior).
#[derive(Debug, Clone, Default)]
pub struct InteriorReconstructor<C, K, R>
where
    C: ContourExtractor,
    K: ContourCloser,
    R: InteriorRasterizer,
{
    pub contour_extractor: C,
    pub closer: K,
    pub rasterizer: R,
}

impl<C, K, R> InteriorReconstructor<C, K, R>
where
    C: ContourExtractor,
    K: ContourCloser,
    R: InteriorRasterizer,
{
    pub fn new(contour_extractor: C, closer: K, rasterizer: R) -> Self {
        Self {
            contour_extractor,
            closer,
            rasterizer,
        }
    }

    /// Forward direction: one annotator's strokes to an interior mask
    pub fn annotation_interior(&self, annotation: &Annotation, width: u32, height: u32) -> Result<GrayImage> {
        let contours = self.closer.close(annotation)?;
        Ok(self.rasterizer.rasterize(&contours, width, height))
    }

    /// Inverse direction: a boundary mask to the area it encloses.
    ///
    /// External contours of the boundary are re-closed with the same
    /// closer the forward direction uses, then filled.
    pub fn boundary_to_area(&self, boundary: &GrayImage) -> Result<GrayImage> {
        let (width, height) = boundary.dimensions();
        let contours = self.mask_contours(boundary)?;
        Ok(self.rasterizer.rasterize(&contours, width, height))
    }

    /// Closed external contours of every foreground region of a mask
    pub fn mask_contours(&self, mask: &GrayImage) -> Result<Vec<ClosedContour>> {
        if !has_foreground(mask) {
            return Ok(Vec::new());
        }
        let fragments = self.contour_extractor.extract_contours(mask)?;
        self.closer.close(&fragments)
    }
}

/// Reconstructor with shareable, swappable stages. The label pipeline
/// and the metrics built from it hold clones of the same stages.
pub type SharedReconstructor = InteriorReconstructor<
    Arc<dyn ContourExtractor>,
    Arc<dyn ContourCloser>,
    Arc<dyn InteriorRasterizer>,
>;

impl SharedReconstructor {
    /// Imageproc contours, nearest-endpoint closing, scanline fill
    pub fn standard() -> Self {
        Self::new(
            Arc::new(ImageprocContourExtractor),
            Arc::new(NearestEndpointCloser),
            Arc::new(ScanlineRasterizer),
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::Luma;
    use crate::types::{count_foreground, FOREGROUND};

    #[test]
    fn test_fill_extract_refill_is_stable() {
        let reconstructor = SharedReconstructor::standard();
        let shapes = vec![
            vec![[5.0, 5.0], [25.0, 5.0], [25.0, 20.0], [5.0, 20.0]],
            vec![[40.0, 10.0], [55.0, 25.0], [40.0, 40.0], [30.0, 25.0]],
        ];

        for shape in shapes {
            let contour = ClosedContour::new(shape);
            let filled = reconstructor.rasterizer.rasterize(&[contour], 64, 64);
            let refilled = reconstructor.boundary_to_area(&filled).expect("Should reconstruct");
            assert_eq!(filled, refilled);
        }
    }

    #[test]
    fn test_ring_boundary_reconstructs_disc() {
        let mut ring = GrayImage::new(40, 40);
        for i in 10..30 {
            for (x, y) in [(i, 10), (i, 29), (10, i), (29, i)] {
                ring.put_pixel(x, y, Luma([FOREGROUND]));
            }
        }

        let area = SharedReconstructor::standard().boundary_to_area(&ring).expect("Should reconstruct");
        assert_eq!(count_foreground(&area), 400);
    }

    #[test]
    fn test_blank_boundary_gives_blank_area() {
        let area = SharedReconstructor::standard()
            .boundary_to_area(&GrayImage::new(12, 12))
            .expect("Should reconstruct");
        assert_eq!(count_foreground(&area), 0);
    }
}
