//! Tunable parameters for sampling, clustering and scoring.
//!
//! Every value has a default, so a JSON file only needs the keys it changes:
//!
//! ```
//! use dominant_color_wasm::ExtractorConfig;
//!
//! let config = ExtractorConfig::from_json_str(r#"{ "sampleWidth": 50, "primary": { "countWeight": 2.0 } }"#)?;
//! assert_eq!(config.sample_width, 50);
//! assert_eq!(config.sample_height, 100);
//! assert_eq!(config.primary.count_weight, 2.0);
//! # Ok::<(), dominant_color_wasm::ExtractError>(())
//! ```

use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::{ExtractError, Result};

/// Complete configuration for one extraction.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct ExtractorConfig {
    /// Horizontal sampling grid size (columns read from the image at most)
    pub sample_width: u32,

    /// Vertical sampling grid size (rows read from the image at most)
    pub sample_height: u32,

    /// Scale of the value axis of the cone relative to its unit radius
    pub value_distance_multiplier: f64,

    /// Lloyd iteration bound; reaching it returns the last state
    pub max_iterations: usize,

    pub primary: PrimaryWeights,

    pub secondary: SecondaryWeights,

    /// Saturation below this fraction is penalized
    pub saturation_low_threshold: f64,

    /// Score multiplier applied to low-saturation clusters
    pub saturation_low_penalty: f64,

    /// Value below this fraction is penalized
    pub value_low_threshold: f64,

    /// Score multiplier applied to dark clusters
    pub value_low_penalty: f64,
}

/// Weights of the primary score `sf*ws + vf*wv + cf*wc`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct PrimaryWeights {
    pub saturation_weight: f64,
    pub value_weight: f64,
    pub count_weight: f64,
}

/// Weights of the secondary score.
///
/// `(sf*ws + vf*wv) * (cf*wc + distance*wd) - primaryScore*wp`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct SecondaryWeights {
    pub saturation_weight: f64,
    pub value_weight: f64,
    pub count_weight: f64,
    /// Reward for distance from the primary cluster in cone space
    pub pri_distance_weight: f64,
    /// Penalty for echoing the primary score
    pub pri_score_difference_weight: f64,
}

impl Default for ExtractorConfig {
    fn default() -> Self {
        Self {
            sample_width: 100,
            sample_height: 100,
            value_distance_multiplier: 0.6,
            max_iterations: 100,
            primary: PrimaryWeights::default(),
            secondary: SecondaryWeights::default(),
            saturation_low_threshold: 0.2,
            saturation_low_penalty: 0.6,
            value_low_threshold: 0.25,
            value_low_penalty: 0.5,
        }
    }
}

impl Default for PrimaryWeights {
    fn default() -> Self {
        Self {
            saturation_weight: 1.0,
            value_weight: 0.6,
            count_weight: 1.4,
        }
    }
}

impl Default for SecondaryWeights {
    fn default() -> Self {
        Self {
            saturation_weight: 1.0,
            value_weight: 0.6,
            count_weight: 0.5,
            pri_distance_weight: 1.0,
            pri_score_difference_weight: 0.25,
        }
    }
}

impl ExtractorConfig {
    /// Parse a configuration from JSON text. Missing keys keep their defaults.
    pub fn from_json_str(json: &str) -> Result<Self> {
        let config: Self = serde_json::from_str(json)
            .map_err(|e| ExtractError::config("invalid configuration JSON", e))?;
        config.validate()?;
        Ok(config)
    }

    /// Load configuration from JSON file
    pub fn from_json_file(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .map_err(|e| ExtractError::config(format!("cannot read {}", path.display()), e))?;
        Self::from_json_str(&content)
    }

    /// Save configuration to JSON file
    pub fn to_json_file(&self, path: &Path) -> Result<()> {
        let json = serde_json::to_string_pretty(self)
            .map_err(|e| ExtractError::config("cannot serialize configuration", e))?;
        std::fs::write(path, json)
            .map_err(|e| ExtractError::config(format!("cannot write {}", path.display()), e))
    }

    /// Reject values the pipeline cannot work with.
    pub fn validate(&self) -> Result<()> {
        if self.sample_width == 0 {
            return Err(ExtractError::invalid_parameter("sampleWidth", self.sample_width));
        }
        if self.sample_height == 0 {
            return Err(ExtractError::invalid_parameter("sampleHeight", self.sample_height));
        }
        if self.max_iterations == 0 {
            return Err(ExtractError::invalid_parameter("maxIterations", self.max_iterations));
        }

        let weights = [
            ("valueDistanceMultiplier", self.value_distance_multiplier),
            ("primary.saturationWeight", self.primary.saturation_weight),
            ("primary.valueWeight", self.primary.value_weight),
            ("primary.countWeight", self.primary.count_weight),
            ("secondary.saturationWeight", self.secondary.saturation_weight),
            ("secondary.valueWeight", self.secondary.value_weight),
            ("secondary.countWeight", self.secondary.count_weight),
            ("secondary.priDistanceWeight", self.secondary.pri_distance_weight),
            (
                "secondary.priScoreDifferenceWeight",
                self.secondary.pri_score_difference_weight,
            ),
            ("saturationLowPenalty", self.saturation_low_penalty),
            ("valueLowPenalty", self.value_low_penalty),
        ];
        if let Some((name, value)) = weights.iter().find(|(_, v)| !v.is_finite()) {
            return Err(ExtractError::invalid_parameter(*name, value));
        }

        let thresholds = [
            ("saturationLowThreshold", self.saturation_low_threshold),
            ("valueLowThreshold", self.value_low_threshold),
        ];
        if let Some((name, value)) = thresholds
            .iter()
            .find(|(_, v)| !(0.0..=1.0).contains(v))
        {
            return Err(ExtractError::invalid_parameter(*name, value));
        }

        Ok(())
    }
}
