use image::GrayImage;
use imageproc::contours::{find_contours, BorderType};
use crate::{
    error::Result,
    traits::ContourExtractor,
    types::{Annotation, Stroke},
};

/// Imageproc-based external contour extractor.
///
/// Follows the border of every top-level foreground region. Hole borders,
/// and regions nested inside holes, are dropped.
#[derive(Debug, Clone, Default)]
pub struct ImageprocContourExtractor;

impl ContourExtractor for ImageprocContourExtractor {
    fn extract_contours(&self, mask: &GrayImage) -> Result<Annotation> {
        let contours = find_contours::<i32>(mask);

        let strokes = contours
            .into_iter()
            .filter(|contour| contour.border_type == BorderType::Outer && contour.parent.is_none())
            .filter(|contour| !contour.points.is_empty())
            .map(|contour| {
                Stroke::new(
                    contour.points
                        .iter()
                        .map(|p| [p.x as f32, p.y as f32])
                        .collect(),
                )
            })
            .collect();

        Ok(Annotation::new(strokes))
    }
}
