use image::{GrayImage, Luma};
use rayon::prelude::*;
use tracing::debug;

use crate::{
    error::{ConsensusError, Result},
    types::{field_to_binary, field_to_luma8, ProbabilityField},
};

/// Occupancy ratio at or above which the fixed rule marks a pixel interior.
pub const FIXED_THRESHOLD: f32 = 0.5;

/// Probability cutoff applied after the sigmoid transform.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Cutoff {
    Fixed(f32),
    /// Bimodal split of the probability histogram
    Otsu,
}

/// Per-pixel decision applied to the occupancy ratio `r`.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub enum DecisionRule {
    /// Interior where `r >= 0.5`
    #[default]
    FixedThreshold,
    /// `P(e) = exp(-e/T) / (1 + exp(-e/T))` with `e = target_ratio - r`,
    /// then binarized at `cutoff`
    Sigmoid {
        target_ratio: f32,
        temperature: f32,
        cutoff: Cutoff,
    },
}

/// Aggregated result for one slice.
#[derive(Debug, Clone)]
pub struct Consensus {
    /// Occupancy ratio (fixed rule) or sigmoid probability with values
    /// below the cutoff zeroed
    pub probability: ProbabilityField,
    /// Binary interior decision
    pub decision: GrayImage,
    /// Cutoff the decision was taken at
    pub cutoff: f32,
    pub annotators: usize,
}

/// Logistic occupancy probability for energy `e` at temperature `t`.
pub fn sigmoid_probability(energy: f32, temperature: f32) -> f32 {
    // exp(-e/t) / (1 + exp(-e/t)) without the inf/inf at large -e/t
    1.0 / (1.0 + (energy / temperature).exp())
}

/// Fraction of masks marking each pixel as interior.
pub fn occupancy_ratio(masks: &[GrayImage]) -> Result<ProbabilityField> {
    let first = masks.first().ok_or(ConsensusError::MissingConsensus)?;
    let (width, height) = first.dimensions();

    if let Some(mask) = masks.iter().find(|mask| mask.dimensions() != (width, height)) {
        return Err(ConsensusError::DimensionMismatch {
            expected: (width, height),
            found: mask.dimensions(),
        });
    }

    let len = width as usize * height as usize;
    let counts = masks
        .par_iter()
        .fold(
            || vec![0u32; len],
            |mut acc, mask| {
                for (count, pixel) in acc.iter_mut().zip(mask.as_raw()) {
                    if *pixel > 0 {
                        *count += 1;
                    }
                }
                acc
            },
        )
        .reduce(
            || vec![0u32; len],
            |mut a, b| {
                for (x, y) in a.iter_mut().zip(b) {
                    *x += y;
                }
                a
            },
        );

    let n = masks.len() as f32;
    Ok(ProbabilityField::from_fn(width, height, |x, y| {
        Luma([counts[y as usize * width as usize + x as usize] as f32 / n])
    }))
}

/// Probability cutoff used when the field has a single value.
pub const UNIFORM_CUTOFF: f32 = 0.5;

/// Otsu cutoff over a `[0, 1]` field, computed on its 8-bit histogram.
///
/// A field with one quantized value has no bimodal split; it is cut at
/// [`UNIFORM_CUTOFF`] instead.
pub fn otsu_cutoff(field: &ProbabilityField) -> f32 {
    let quantized = field_to_luma8(field);
    let min = quantized.pixels().map(|p| p[0]).min();
    let max = quantized.pixels().map(|p| p[0]).max();
    if min == max {
        return UNIFORM_CUTOFF;
    }

    let level = imageproc::contrast::otsu_level(&quantized);
    // pixels quantized strictly above `level` are foreground
    (level as f32 + 0.5) / 255.0
}

/// Combines per-annotator interior masks into a consensus decision.
#[derive(Debug, Clone, Default)]
pub struct ConsensusAggregator {
    pub rule: DecisionRule,
}

impl ConsensusAggregator {
    pub fn new(rule: DecisionRule) -> Self {
        Self { rule }
    }

    pub fn aggregate(&self, masks: &[GrayImage]) -> Result<Consensus> {
        let ratio = occupancy_ratio(masks)?;

        let (probability, cutoff) = match self.rule {
            DecisionRule::FixedThreshold => (ratio, FIXED_THRESHOLD),
            DecisionRule::Sigmoid { target_ratio, temperature, cutoff } => {
                let mut probability = ratio;
                for pixel in probability.pixels_mut() {
                    pixel[0] = sigmoid_probability(target_ratio - pixel[0], temperature);
                }

                let cutoff = match cutoff {
                    Cutoff::Fixed(value) => value,
                    Cutoff::Otsu => otsu_cutoff(&probability),
                };
                for pixel in probability.pixels_mut() {
                    if pixel[0] < cutoff {
                        pixel[0] = 0.0;
                    }
                }
                (probability, cutoff)
            }
        };

        let decision = field_to_binary(&probability, cutoff);
        debug!(annotators = masks.len(), cutoff, "aggregated consensus");

        Ok(Consensus {
            probability,
            decision,
            cutoff,
            annotators: masks.len(),
        })
    }
}
