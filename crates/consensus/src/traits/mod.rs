use std::sync::Arc;

use image::GrayImage;
use crate::{
    error::Result,
    types::{Annotation, ClosedContour, ProbabilityField},
};

/// Trait for contour extraction algorithms
pub trait ContourExtractor: Send + Sync {
    /// Extract the external boundary polylines of each foreground region,
    /// ignoring holes. Each polyline is returned as an open stroke.
    fn extract_contours(&self, mask: &GrayImage) -> Result<Annotation>;
}

/// Trait for closing fragmented strokes into loops
pub trait ContourCloser: Send + Sync {
    /// Chain the strokes of one annotation into closed contours
    fn close(&self, annotation: &Annotation) -> Result<Vec<ClosedContour>>;
}

/// Trait for filling closed contours into a binary mask
pub trait InteriorRasterizer: Send + Sync {
    /// Fill every contour into a new `width` x `height` mask, unioned
    fn rasterize(&self, contours: &[ClosedContour], width: u32, height: u32) -> GrayImage;
}

/// Trait for drawing a thresholded consensus as a boundary label
pub trait BoundaryRenderer: Send + Sync {
    /// Render the external boundary of `interior` as a line `border_width` pixels wide
    fn render(&self, interior: &GrayImage, border_width: u32) -> Result<ProbabilityField>;
}

impl<T: ContourExtractor + ?Sized> ContourExtractor for Arc<T> {
    fn extract_contours(&self, mask: &GrayImage) -> Result<Annotation> {
        (**self).extract_contours(mask)
    }
}

impl<T: ContourCloser + ?Sized> ContourCloser for Arc<T> {
    fn close(&self, annotation: &Annotation) -> Result<Vec<ClosedContour>> {
        (**self).close(annotation)
    }
}

impl<T: InteriorRasterizer + ?Sized> InteriorRasterizer for Arc<T> {
    fn rasterize(&self, contours: &[ClosedContour], width: u32, height: u32) -> GrayImage {
        (**self).rasterize(contours, width, height)
    }
}
