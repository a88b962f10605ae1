//! Agreement statistics between a ground-truth and a predicted boundary.
//!
//! Pixel-level statistics are computed directly on the boundary masks.
//! Area statistics first invert each boundary back to the interior it
//! encloses with a [`SharedReconstructor`], since raw boundary overlap is
//! overly sensitive to small positional offsets. Every statistic returns
//! [`ConsensusError::EmptyMetricDomain`] instead of a placeholder number
//! when its denominator or slice set is empty. Stacks are scored slice
//! by slice and averaged over the slices with foreground in both.

use image::GrayImage;
use rayon::prelude::*;
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::{
    algorithms::SharedReconstructor,
    error::{ConsensusError, Result},
    pipeline::LabelPipeline,
    types::{has_foreground, MaskStack},
};

/// Pixel confusion counts, truth vs prediction.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Confusion {
    pub tp: u64,
    pub fp: u64,
    pub fn_: u64,
    pub tn: u64,
}

impl Confusion {
    pub fn between(truth: &GrayImage, prediction: &GrayImage) -> Result<Self> {
        check_dimensions(truth, prediction)?;
        let mut confusion = Self::default();
        for (t, p) in truth.as_raw().iter().zip(prediction.as_raw()) {
            match (*t > 0, *p > 0) {
                (true, true) => confusion.tp += 1,
                (false, true) => confusion.fp += 1,
                (true, false) => confusion.fn_ += 1,
                (false, false) => confusion.tn += 1,
            }
        }
        Ok(confusion)
    }

    /// `2|A∩B| / (|A| + |B|)`
    pub fn fmeasure(&self) -> Result<f64> {
        let denominator = 2 * self.tp + self.fp + self.fn_;
        if denominator == 0 {
            return Err(ConsensusError::EmptyMetricDomain(
                "F-measure of two empty masks".to_string(),
            ));
        }
        Ok(2.0 * self.tp as f64 / denominator as f64)
    }

    /// `|A∩B| / |A|` and `|A∩B| / |B|`
    pub fn recall_precision(&self) -> Result<(f64, f64)> {
        let truth = self.tp + self.fn_;
        let predicted = self.tp + self.fp;
        if truth == 0 || predicted == 0 {
            return Err(ConsensusError::EmptyMetricDomain(format!(
                "recall/precision with {truth} truth and {predicted} predicted pixels"
            )));
        }
        Ok((self.tp as f64 / truth as f64, self.tp as f64 / predicted as f64))
    }

    /// `|A∩B| / |A∪B|`
    pub fn iou(&self) -> Result<f64> {
        let union = self.tp + self.fp + self.fn_;
        if union == 0 {
            return Err(ConsensusError::EmptyMetricDomain(
                "IoU of two empty masks".to_string(),
            ));
        }
        Ok(self.tp as f64 / union as f64)
    }

    /// Matthews correlation coefficient
    pub fn mcc(&self) -> Result<f64> {
        let (tp, fp, fn_, tn) = (self.tp as f64, self.fp as f64, self.fn_ as f64, self.tn as f64);
        let denominator = ((tp + fp) * (tp + fn_) * (tn + fp) * (tn + fn_)).sqrt();
        if denominator == 0.0 {
            return Err(ConsensusError::EmptyMetricDomain(
                "MCC with an empty confusion row or column".to_string(),
            ));
        }
        Ok((tp * tn - fp * fn_) / denominator)
    }
}

fn check_dimensions(a: &GrayImage, b: &GrayImage) -> Result<()> {
    if a.dimensions() != b.dimensions() {
        return Err(ConsensusError::DimensionMismatch {
            expected: a.dimensions(),
            found: b.dimensions(),
        });
    }
    Ok(())
}

fn check_depth(a: &MaskStack, b: &MaskStack) -> Result<()> {
    if a.depth() != b.depth() {
        return Err(ConsensusError::DimensionMismatch {
            expected: (a.depth() as u32, 1),
            found: (b.depth() as u32, 1),
        });
    }
    Ok(())
}

/// Boundary F-measure of two masks
pub fn fmeasure(a: &GrayImage, b: &GrayImage) -> Result<f64> {
    Confusion::between(a, b)?.fmeasure()
}

/// Recall and precision of `prediction` against `truth`
pub fn recall_precision(truth: &GrayImage, prediction: &GrayImage) -> Result<(f64, f64)> {
    Confusion::between(truth, prediction)?.recall_precision()
}

/// Intersection over union of two masks
pub fn iou(a: &GrayImage, b: &GrayImage) -> Result<f64> {
    Confusion::between(a, b)?.iou()
}

/// Matthews correlation of `prediction` against `truth`
pub fn mcc(truth: &GrayImage, prediction: &GrayImage) -> Result<f64> {
    Confusion::between(truth, prediction)?.mcc()
}

fn foreground_points(mask: &GrayImage) -> Vec<[f64; 2]> {
    mask.enumerate_pixels()
        .filter(|(_, _, p)| p[0] > 0)
        .map(|(x, y, _)| [x as f64, y as f64])
        .collect()
}

/// Distance from each point of `from` to its nearest point in `to`
fn nearest_distances(from: &[[f64; 2]], to: &[[f64; 2]]) -> Vec<f64> {
    from.par_iter()
        .map(|p| {
            to.iter()
                .map(|q| (p[0] - q[0]).powi(2) + (p[1] - q[1]).powi(2))
                .fold(f64::INFINITY, f64::min)
                .sqrt()
        })
        .collect()
}

fn directed_distances(a: &GrayImage, b: &GrayImage) -> Result<(Vec<f64>, Vec<f64>)> {
    check_dimensions(a, b)?;
    let (pa, pb) = (foreground_points(a), foreground_points(b));
    if pa.is_empty() || pb.is_empty() {
        return Err(ConsensusError::EmptyMetricDomain(format!(
            "nearest-point distance between {} and {} foreground pixels",
            pa.len(),
            pb.len()
        )));
    }
    Ok((nearest_distances(&pa, &pb), nearest_distances(&pb, &pa)))
}

fn mean(values: &[f64]) -> f64 {
    values.iter().sum::<f64>() / values.len() as f64
}

/// Symmetric average nearest-point distance: the mean over A of the
/// distance to the nearest point of B, averaged with the same from B to A.
pub fn average_nearest_distance(a: &GrayImage, b: &GrayImage) -> Result<f64> {
    let (ab, ba) = directed_distances(a, b)?;
    Ok((mean(&ab) + mean(&ba)) / 2.0)
}

/// Mean of the two directed Hausdorff distances.
pub fn hausdorff_distance(a: &GrayImage, b: &GrayImage) -> Result<f64> {
    let (ab, ba) = directed_distances(a, b)?;
    let max = |values: &[f64]| values.iter().copied().fold(0.0, f64::max);
    Ok((max(&ab) + max(&ba)) / 2.0)
}

/// Average a per-slice statistic over the slices where both stacks have
/// foreground. A single slice is measured directly.
pub fn mean_over_slices<F>(a: &MaskStack, b: &MaskStack, statistic: F) -> Result<f64>
where
    F: Fn(&GrayImage, &GrayImage) -> Result<f64> + Sync,
{
    check_depth(a, b)?;
    if let ([a], [b]) = (a.slices.as_slice(), b.slices.as_slice()) {
        return statistic(a, b);
    }

    let values = a
        .slices
        .par_iter()
        .zip(&b.slices)
        .filter(|(a, b)| has_foreground(a) && has_foreground(b))
        .map(|(a, b)| statistic(a, b))
        .collect::<Result<Vec<f64>>>()?;

    if values.is_empty() {
        return Err(ConsensusError::EmptyMetricDomain(
            "no slice has foreground in both stacks".to_string(),
        ));
    }
    debug!(slices = values.len(), depth = a.depth(), "averaged statistic over slices");
    Ok(mean(&values))
}

/// Every statistic for one truth/prediction pair
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EvaluationReport {
    pub average_distance: f64,
    pub hausdorff_distance: f64,
    pub boundary_fmeasure: f64,
    pub boundary_recall: f64,
    pub boundary_precision: f64,
    pub boundary_mcc: f64,
    pub area_fmeasure: f64,
    pub area_mcc: f64,
    pub area_iou: f64,
}

/// Similarity statistics with boundary-to-area inversion.
#[derive(Clone)]
pub struct SimilarityMetrics {
    pub reconstructor: SharedReconstructor,
}

impl Default for SimilarityMetrics {
    fn default() -> Self {
        Self::new(SharedReconstructor::standard())
    }
}

impl SimilarityMetrics {
    pub fn new(reconstructor: SharedReconstructor) -> Self {
        Self { reconstructor }
    }

    /// Metrics that invert boundaries with the pipeline's own stages
    pub fn for_pipeline(pipeline: &LabelPipeline) -> Self {
        Self::new(pipeline.reconstructor().clone())
    }

    /// Interior enclosed by a boundary mask
    pub fn boundary_to_area(&self, boundary: &GrayImage) -> Result<GrayImage> {
        self.reconstructor.boundary_to_area(boundary)
    }

    fn area_confusion(&self, a: &GrayImage, b: &GrayImage) -> Result<Confusion> {
        check_dimensions(a, b)?;
        Confusion::between(&self.boundary_to_area(a)?, &self.boundary_to_area(b)?)
    }

    /// F-measure of the reconstructed interiors
    pub fn fmeasure_area(&self, a: &GrayImage, b: &GrayImage) -> Result<f64> {
        self.area_confusion(a, b)?.fmeasure()
    }

    /// MCC of the reconstructed interiors
    pub fn mcc_area(&self, truth: &GrayImage, prediction: &GrayImage) -> Result<f64> {
        self.area_confusion(truth, prediction)?.mcc()
    }

    /// IoU of the reconstructed interiors
    pub fn iou_area(&self, a: &GrayImage, b: &GrayImage) -> Result<f64> {
        self.area_confusion(a, b)?.iou()
    }

    pub fn fmeasure_area_stack(&self, a: &MaskStack, b: &MaskStack) -> Result<f64> {
        mean_over_slices(a, b, |a, b| self.fmeasure_area(a, b))
    }

    pub fn mcc_area_stack(&self, truth: &MaskStack, prediction: &MaskStack) -> Result<f64> {
        mean_over_slices(truth, prediction, |a, b| self.mcc_area(a, b))
    }

    pub fn average_distance_stack(&self, a: &MaskStack, b: &MaskStack) -> Result<f64> {
        mean_over_slices(a, b, average_nearest_distance)
    }

    /// Compute every statistic, each averaged over qualifying slices.
    pub fn evaluate(&self, truth: &MaskStack, prediction: &MaskStack) -> Result<EvaluationReport> {
        Ok(EvaluationReport {
            average_distance: self.average_distance_stack(truth, prediction)?,
            hausdorff_distance: mean_over_slices(truth, prediction, hausdorff_distance)?,
            boundary_fmeasure: mean_over_slices(truth, prediction, fmeasure)?,
            boundary_recall: mean_over_slices(truth, prediction, |a, b| Ok(recall_precision(a, b)?.0))?,
            boundary_precision: mean_over_slices(truth, prediction, |a, b| Ok(recall_precision(a, b)?.1))?,
            boundary_mcc: mean_over_slices(truth, prediction, mcc)?,
            area_fmeasure: self.fmeasure_area_stack(truth, prediction)?,
            area_mcc: self.mcc_area_stack(truth, prediction)?,
            area_iou: mean_over_slices(truth, prediction, |a, b| self.iou_area(a, b))?,
        })
    }
}
