pub mod builder;

use image::GrayImage;
use rayon::prelude::*;
use tracing::{debug, warn};

use crate::{
    algorithms::{ConsensusAggregator, SharedReconstructor},
    config::DecisionMode,
    error::{ConsensusError, Result},
    traits::BoundaryRenderer,
    types::{ConsensusLabel, PixelSize, SliceAnnotations},
};

/// Forward label pipeline: every annotator's strokes on a slice are closed,
/// filled, aggregated, and rendered as a boundary label.
pub struct LabelPipeline {
    reconstructor: SharedReconstructor,
    aggregator: ConsensusAggregator,
    renderer: Box<dyn BoundaryRenderer>,
    border_width: u32,
    mode: DecisionMode,
    pixel_size: PixelSize,
}

impl LabelPipeline {
    /// Create a new pipeline builder
    pub fn builder() -> builder::LabelPipelineBuilder {
        builder::LabelPipelineBuilder::new()
    }

    pub fn new(
        reconstructor: SharedReconstructor,
        aggregator: ConsensusAggregator,
        renderer: Box<dyn BoundaryRenderer>,
        border_width: u32,
        mode: DecisionMode,
        pixel_size: PixelSize,
    ) -> Self {
        Self {
            reconstructor,
            aggregator,
            renderer,
            border_width,
            mode,
            pixel_size,
        }
    }

    pub fn border_width(&self) -> u32 {
        self.border_width
    }

    /// Closing and filling stages, shared with evaluation
    pub fn reconstructor(&self) -> &SharedReconstructor {
        &self.reconstructor
    }

    /// Build the consensus label of one slice.
    ///
    /// Any malformed annotation fails the whole slice. An annotator whose
    /// annotation has no strokes still counts towards the ratio.
    pub fn process(&self, slice: &SliceAnnotations) -> Result<ConsensusLabel> {
        if slice.annotations.is_empty() {
            return Err(ConsensusError::MissingConsensus);
        }

        let interiors = slice
            .annotations
            .par_iter()
            .map(|annotation| self.reconstructor.annotation_interior(annotation, slice.width, slice.height))
            .collect::<Result<Vec<GrayImage>>>()?;

        let consensus = self.aggregator.aggregate(&interiors)?;
        let boundary = self.renderer.render(&consensus.decision, self.border_width)?;
        debug!(
            slice = %slice.name,
            annotators = consensus.annotators,
            cutoff = consensus.cutoff,
            "built consensus label"
        );

        Ok(ConsensusLabel {
            name: slice.name.clone(),
            boundary,
            probability: consensus.probability,
            interior: consensus.decision,
            border_width: self.border_width,
            mode: self.mode,
            pixel_size: self.pixel_size.clone(),
        })
    }

    /// Process every slice independently. Failures are collected per slice
    /// and never abort the batch.
    pub fn process_batch(&self, slices: &[SliceAnnotations]) -> BatchReport {
        let results: Vec<(String, Result<ConsensusLabel>)> = slices
            .par_iter()
            .map(|slice| (slice.name.clone(), self.process(slice)))
            .collect();

        let mut report = BatchReport::default();
        for (name, result) in results {
            match result {
                Ok(label) => report.labels.push(label),
                Err(error) => {
                    warn!(slice = %name, %error, "slice skipped");
                    report.failures.push(SliceFailure { name, error });
                }
            }
        }
        report
    }

    /// Get information about the pipeline configuration
    pub fn info(&self) -> String {
        format!(
            "LabelPipeline: {} decision, border width {} px, pixel size {} {}",
            self.mode, self.border_width, self.pixel_size.xy, self.pixel_size.unit
        )
    }
}

/// A slice that produced no label
#[derive(Debug)]
pub struct SliceFailure {
    pub name: String,
    pub error: ConsensusError,
}

/// Outcome of a batch run, in input slice order.
#[derive(Debug, Default)]
pub struct BatchReport {
    pub labels: Vec<ConsensusLabel>,
    pub failures: Vec<SliceFailure>,
}

impl BatchReport {
    /// Slices with bad annotation data
    pub fn malformed(&self) -> impl Iterator<Item = &str> {
        self.failures
            .iter()
            .filter(|f| matches!(f.error, ConsensusError::MalformedAnnotation(_)))
            .map(|f| f.name.as_str())
    }

    /// Slices nobody annotated
    pub fn missing(&self) -> impl Iterator<Item = &str> {
        self.failures
            .iter()
            .filter(|f| f.error.is_missing())
            .map(|f| f.name.as_str())
    }

    pub fn malformed_count(&self) -> usize {
        self.malformed().count()
    }

    pub fn missing_count(&self) -> usize {
        self.missing().count()
    }

    /// Failures that are neither malformed nor missing input
    pub fn other_count(&self) -> usize {
        self.failures.len() - self.malformed_count() - self.missing_count()
    }
}
