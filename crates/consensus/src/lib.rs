//! # Annotation Consensus Library
//!
//! Turns many volunteers' freehand boundary strokes on the same image slice
//! into one consensus boundary label, and scores predicted boundaries
//! against such labels.
//!
//! ## Core Features
//!
//! - **Contour closing**: fragmented open strokes are chained into closed
//!   loops by greedy nearest-endpoint matching
//! - **Consensus**: per-annotator interiors are averaged into an occupancy
//!   ratio and thresholded (fixed 0.5, sigmoid, or sigmoid with Otsu cutoff)
//! - **Boundary labels**: the consensus interior is re-rendered as an
//!   anti-aliased line of configurable width
//! - **Evaluation**: boundary and reconstructed-area statistics, sharing the
//!   exact closing and filling code with the label pipeline
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use consensus::{Annotation, LabelPipeline, SliceAnnotations};
//!
//! let pipeline = LabelPipeline::builder()
//!     .border_width(3)
//!     .build();
//!
//! let slice = SliceAnnotations {
//!     name: "slice_000".to_string(),
//!     width: 512,
//!     height: 512,
//!     annotations: vec![Annotation::from_point_lists(vec![vec![
//!         [100.0, 100.0], [300.0, 100.0], [300.0, 300.0], [100.0, 300.0],
//!     ]])],
//! };
//!
//! let label = pipeline.process(&slice)?;
//! label.save("labels")?;
//! # Ok::<(), Box<dyn std::error::Error>>(())
//! ```
//!
//! ## Evaluation
//!
//! ```rust,no_run
//! use consensus::{load_mask_stack, SimilarityMetrics};
//!
//! let truth = load_mask_stack(&["truth/slice_000.png"])?;
//! let prediction = load_mask_stack(&["prediction/slice_000.png"])?;
//! let report = SimilarityMetrics::default().evaluate(&truth, &prediction)?;
//! println!("area F-measure {:.3}", report.area_fmeasure);
//! # Ok::<(), Box<dyn std::error::Error>>(())
//! ```

// Core modules
pub mod error;
pub mod types;
pub mod traits;
pub mod algorithms;
pub mod config;
pub mod metrics;
pub mod pipeline;
pub mod io;

// Re-exports for convenience
pub use error::{ConsensusError, Result};
pub use types::*;
pub use traits::*;
pub use algorithms::*;
pub use config::{ConsensusConfig, DecisionMode};
pub use metrics::{EvaluationReport, SimilarityMetrics};
pub use pipeline::{builder::LabelPipelineBuilder, BatchReport, LabelPipeline, SliceFailure};
pub use io::{load_mask, load_mask_stack, ContourSet, LabelMetadata, StoredLabel};

#[cfg(test)]
mod tests {
    use super::*;
    use image::{GrayImage, Luma};

    /// A 20x20 square drawn in two passes with a one pixel gap at each join
    fn fragmented_square() -> Annotation {
        Annotation::from_point_lists(vec![
            vec![[10.0, 10.0], [30.0, 10.0], [30.0, 30.0]],
            vec![[29.0, 30.0], [10.0, 30.0], [10.0, 11.0]],
        ])
    }

    fn closed_square(x0: f32) -> Annotation {
        Annotation::from_point_lists(vec![vec![
            [x0, 10.0],
            [x0 + 20.0, 10.0],
            [x0 + 20.0, 30.0],
            [x0, 30.0],
        ]])
    }

    fn slice() -> SliceAnnotations {
        SliceAnnotations {
            name: "slice_000".to_string(),
            width: 48,
            height: 48,
            annotations: vec![fragmented_square(), fragmented_square(), closed_square(11.0)],
        }
    }

    fn filled(x0: u32, y0: u32, side: u32) -> GrayImage {
        let mut mask = GrayImage::new(48, 48);
        for y in y0..y0 + side {
            for x in x0..x0 + side {
                mask.put_pixel(x, y, Luma([FOREGROUND]));
            }
        }
        mask
    }

    #[test]
    fn test_fragmented_strokes_reach_consensus() {
        let pipeline = LabelPipeline::builder().border_width(1).build();
        let label = pipeline.process(&slice()).expect("Should process");

        assert_eq!(label.interior, filled(10, 10, 21));
        assert_eq!(count_foreground(&label.boundary_mask()), 80);
    }

    #[test]
    fn test_inverse_path_recovers_interior() {
        let pipeline = LabelPipeline::builder().border_width(1).build();
        let label = pipeline.process(&slice()).expect("Should process");

        let area = SimilarityMetrics::default()
            .boundary_to_area(&label.boundary_mask())
            .expect("Should reconstruct");
        assert_eq!(area, label.interior);
    }

    #[test]
    fn test_evaluate_offset_prediction() {
        let pipeline = LabelPipeline::builder().border_width(1).build();
        let label = pipeline.process(&slice()).expect("Should process");

        let truth = MaskStack::from(label.boundary_mask());
        let prediction = MaskStack::from(render_boundary_mask(&filled(11, 10, 21), 1).expect("Should render"));
        let report = SimilarityMetrics::default()
            .evaluate(&truth, &prediction)
            .expect("Should evaluate");

        assert!((report.boundary_fmeasure - 0.5).abs() < 1e-9);
        assert!(report.area_fmeasure > report.boundary_fmeasure);
        assert!(report.average_distance > 0.0 && report.average_distance < 1.0);
    }

    #[test]
    fn test_otsu_mode_pipeline() {
        let config = ConsensusConfig::with_mode(DecisionMode::OtsuAuto);
        let pipeline = LabelPipeline::builder()
            .with_config(&config)
            .expect("Should accept config")
            .build();
        let label = pipeline.process(&slice()).expect("Should process");

        assert_eq!(label.mode, DecisionMode::OtsuAuto);
        assert!(has_foreground(&label.interior));
        assert!(label.interior.get_pixel(0, 0)[0] == 0);
    }

    #[test]
    fn test_consensus_contours_export() {
        let pipeline = LabelPipeline::builder().build();
        let label = pipeline.process(&slice()).expect("Should process");

        let contours = pipeline
            .reconstructor()
            .mask_contours(&label.interior)
            .expect("Should close");
        let set = ContourSet::new(label.name.clone(), contours, label.width(), label.height());
        let collection = set.to_geojson();

        assert_eq!(collection.features.len(), 1);
        let area = collection.features[0].properties.as_ref().expect("Should have properties")["area"]
            .as_f64()
            .expect("Should be a number");
        assert!((area - 400.0).abs() < 1e-3);
    }

    struct BlankRasterizer;

    impl InteriorRasterizer for BlankRasterizer {
        fn rasterize(&self, _contours: &[ClosedContour], width: u32, height: u32) -> GrayImage {
            GrayImage::new(width, height)
        }
    }

    #[test]
    fn test_pipeline_metrics_share_custom_stages() {
        let pipeline = LabelPipeline::builder()
            .border_width(1)
            .set_rasterizer(BlankRasterizer)
            .build();
        let outline = render_boundary_mask(&filled(10, 10, 21), 1).expect("Should render");

        let label = pipeline.process(&slice()).expect("Should process");
        assert!(!has_foreground(&label.interior));

        let shared = SimilarityMetrics::for_pipeline(&pipeline)
            .boundary_to_area(&outline)
            .expect("Should reconstruct");
        assert!(!has_foreground(&shared));

        let standard = SimilarityMetrics::default()
            .boundary_to_area(&outline)
            .expect("Should reconstruct");
        assert_eq!(standard, filled(10, 10, 21));
    }
}
