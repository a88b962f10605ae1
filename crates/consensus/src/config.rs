use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use strum::{Display, EnumIter, EnumString, IntoStaticStr, VariantNames};

use crate::{
    algorithms::{Cutoff, DecisionRule},
    error::{ConsensusError, Result},
};

/// How the per-pixel occupancy ratio is turned into a binary decision.
#[derive(
    Debug, Clone, Copy, Default,
    Serialize, Deserialize, JsonSchema,
    Display, EnumString, EnumIter, VariantNames, IntoStaticStr,
    PartialEq, Eq
)]
#[serde(rename_all = "kebab-case")]
#[strum(serialize_all = "kebab-case")]
pub enum DecisionMode {
    /// Interior where at least half of the annotators agree
    #[default]
    Fixed,
    /// Logistic transform of the ratio, binarized at a fixed cutoff
    Sigmoid,
    /// Logistic transform of the ratio, binarized at an Otsu cutoff
    OtsuAuto,
}

impl DecisionMode {
    pub fn description(&self) -> &'static str {
        match self {
            Self::Fixed => "Pixel is interior when at least 50% of annotators mark it",
            Self::Sigmoid => "Sigmoid of (target ratio - occupancy) with temperature, fixed probability cutoff",
            Self::OtsuAuto => "Sigmoid of (target ratio - occupancy) with temperature, Otsu probability cutoff",
        }
    }
}

/// Serializable consensus settings, validated into a [`DecisionRule`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
#[serde(default)]
pub struct ConsensusConfig {
    pub mode: DecisionMode,
    #[schemars(range(min = 0.0, max = 1.0))]
    pub target_ratio: f32,
    /// Sharpness of the sigmoid; lower is closer to a step
    pub temperature: f32,
    /// Probability cutoff used by the `sigmoid` mode
    #[schemars(range(min = 0.0, max = 1.0))]
    pub cutoff: f32,
}

impl Default for ConsensusConfig {
    fn default() -> Self {
        Self {
            mode: DecisionMode::Fixed,
            target_ratio: 0.5,
            temperature: 0.125,
            cutoff: 0.05,
        }
    }
}

impl ConsensusConfig {
    pub fn with_mode(mode: DecisionMode) -> Self {
        Self { mode, ..Self::default() }
    }

    pub fn decision_rule(&self) -> Result<DecisionRule> {
        let sigmoid = |cutoff| -> Result<DecisionRule> {
            if !(0.0..=1.0).contains(&self.target_ratio) {
                return Err(ConsensusError::InvalidConfig(format!(
                    "target ratio {} outside [0, 1]",
                    self.target_ratio
                )));
            }
            if !(self.temperature > 0.0) {
                return Err(ConsensusError::InvalidConfig(format!(
                    "temperature must be positive, got {}",
                    self.temperature
                )));
            }
            Ok(DecisionRule::Sigmoid {
                target_ratio: self.target_ratio,
                temperature: self.temperature,
                cutoff,
            })
        };

        match self.mode {
            DecisionMode::Fixed => Ok(DecisionRule::FixedThreshold),
            DecisionMode::Sigmoid => {
                if !(0.0..=1.0).contains(&self.cutoff) {
                    return Err(ConsensusError::InvalidConfig(format!(
                        "cutoff {} outside [0, 1]",
                        self.cutoff
                    )));
                }
                sigmoid(Cutoff::Fixed(self.cutoff))
            }
            DecisionMode::OtsuAuto => sigmoid(Cutoff::Otsu),
        }
    }
}

/// Pixels per micron to pixel size in nanometres.
pub fn dpum_to_size_nm(dpum: f64) -> f64 {
    1000.0 / dpum
}

/// Pixel size in nanometres to pixels per micron.
pub fn size_nm_to_dpum(size_nm: f64) -> f64 {
    1000.0 / size_nm
}

/// Rendered boundary width in pixels for a physical width, never below one pixel.
pub fn border_width_px(border_width_nm: f64, pixel_size_nm: f64) -> Result<u32> {
    if !(pixel_size_nm > 0.0) || !border_width_nm.is_finite() {
        return Err(ConsensusError::InvalidConfig(format!(
            "cannot derive border width from {border_width_nm} nm at {pixel_size_nm} nm/pixel"
        )));
    }
    Ok((border_width_nm / pixel_size_nm).round().max(1.0) as u32)
}

/// Per-axis zoom for a reference image whose size differs from the
/// nominal size the annotations were drawn at.
pub fn corrected_zoom(zoom: f32, actual: (u32, u32), target: (u32, u32)) -> (f32, f32) {
    if actual == target || target.0 == 0 || target.1 == 0 {
        return (zoom, zoom);
    }
    (
        zoom * actual.0 as f32 / target.0 as f32,
        zoom * actual.1 as f32 / target.1 as f32,
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::str::FromStr;

    #[test]
    fn test_default_is_fixed_threshold() {
        let rule = ConsensusConfig::default().decision_rule().expect("Should validate");
        assert_eq!(rule, DecisionRule::FixedThreshold);
    }

    #[test]
    fn test_mode_parsing() {
        assert_eq!(DecisionMode::from_str("otsu-auto").expect("Should parse"), DecisionMode::OtsuAuto);
        assert_eq!(DecisionMode::Sigmoid.to_string(), "sigmoid");
        assert_eq!(DecisionMode::VARIANTS, &["fixed", "sigmoid", "otsu-auto"]);
    }

    #[test]
    fn test_rejects_non_positive_temperature() {
        let config = ConsensusConfig {
            temperature: 0.0,
            ..ConsensusConfig::with_mode(DecisionMode::Sigmoid)
        };
        assert!(matches!(config.decision_rule(), Err(ConsensusError::InvalidConfig(_))));
    }

    #[test]
    fn test_border_width_from_nanometres() {
        assert_eq!(border_width_px(40.0, 10.0).expect("Should convert"), 4);
        assert_eq!(border_width_px(2.0, 10.0).expect("Should convert"), 1);
        assert!(border_width_px(40.0, 0.0).is_err());
        assert!((dpum_to_size_nm(size_nm_to_dpum(12.5)) - 12.5).abs() < 1e-9);
    }

    #[test]
    fn test_zoom_correction() {
        assert_eq!(corrected_zoom(1.0, (2000, 2000), (2000, 2000)), (1.0, 1.0));
        assert_eq!(corrected_zoom(1.0, (1000, 500), (2000, 2000)), (0.5, 0.25));
    }
}
