use std::sync::Arc;

use crate::{
    algorithms::{
        AntialiasedRenderer, ConsensusAggregator, DecisionRule, ImageprocContourExtractor,
        InteriorReconstructor, NearestEndpointCloser, ScanlineRasterizer,
    },
    config::{ConsensusConfig, DecisionMode},
    error::Result,
    pipeline::LabelPipeline,
    traits::{BoundaryRenderer, ContourCloser, ContourExtractor, InteriorRasterizer},
    types::PixelSize,
};

/// Builder for creating label pipelines with a fluent API
pub struct LabelPipelineBuilder {
    contour_extractor: Option<Arc<dyn ContourExtractor>>,
    closer: Option<Arc<dyn ContourCloser>>,
    rasterizer: Option<Arc<dyn InteriorRasterizer>>,
    renderer: Option<Box<dyn BoundaryRenderer>>,
    rule: DecisionRule,
    mode: DecisionMode,
    border_width: u32,
    pixel_size: PixelSize,
}

impl LabelPipelineBuilder {
    /// Create a new pipeline builder
    pub fn new() -> Self {
        Self {
            contour_extractor: None,
            closer: None,
            rasterizer: None,
            renderer: None,
            rule: DecisionRule::FixedThreshold,
            mode: DecisionMode::Fixed,
            border_width: 1,
            pixel_size: PixelSize::default(),
        }
    }

    /// Set the extractor used when a boundary is turned back into an
    /// area (replaces any existing one)
    pub fn set_contour_extractor<E>(mut self, extractor: E) -> Self
    where
        E: ContourExtractor + 'static,
    {
        self.contour_extractor = Some(Arc::new(extractor));
        self
    }

    /// Set the contour closer (replaces any existing one)
    pub fn set_closer<K>(mut self, closer: K) -> Self
    where
        K: ContourCloser + 'static,
    {
        self.closer = Some(Arc::new(closer));
        self
    }

    /// Set the interior rasterizer (replaces any existing one)
    pub fn set_rasterizer<R>(mut self, rasterizer: R) -> Self
    where
        R: InteriorRasterizer + 'static,
    {
        self.rasterizer = Some(Arc::new(rasterizer));
        self
    }

    /// Set the boundary renderer (replaces any existing one)
    pub fn set_renderer<B>(mut self, renderer: B) -> Self
    where
        B: BoundaryRenderer + 'static,
    {
        self.renderer = Some(Box::new(renderer));
        self
    }

    /// Validate a consensus configuration and use its decision rule
    pub fn with_config(mut self, config: &ConsensusConfig) -> Result<Self> {
        self.rule = config.decision_rule()?;
        self.mode = config.mode;
        Ok(self)
    }

    /// Rendered boundary width in pixels, at least one
    pub fn border_width(mut self, pixels: u32) -> Self {
        self.border_width = pixels.max(1);
        self
    }

    /// Physical pixel size recorded on every label
    pub fn pixel_size(mut self, pixel_size: PixelSize) -> Self {
        self.pixel_size = pixel_size;
        self
    }

    /// Build the pipeline with default components if not specified
    pub fn build(self) -> LabelPipeline {
        let contour_extractor = self.contour_extractor
            .unwrap_or_else(|| Arc::new(ImageprocContourExtractor));

        let closer = self.closer
            .unwrap_or_else(|| Arc::new(NearestEndpointCloser));

        let rasterizer = self.rasterizer
            .unwrap_or_else(|| Arc::new(ScanlineRasterizer));

        let renderer = self.renderer
            .unwrap_or_else(|| Box::new(AntialiasedRenderer::new(ImageprocContourExtractor)));

        LabelPipeline::new(
            InteriorReconstructor::new(contour_extractor, closer, rasterizer),
            ConsensusAggregator::new(self.rule),
            renderer,
            self.border_width,
            self.mode,
            self.pixel_size,
        )
    }
}

impl Default for LabelPipelineBuilder {
    fn default() -> Self {
        Self::new()
    }
}
