use std::{fs, path::Path};

use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

use crate::error::{Result, RoadGapError};

/// Largest supported rounding precision. Node keys are stored as scaled `i128`s.
pub const MAX_PRECISION: u32 = 12;

/// Settings for one analysis run. Nothing here is global: every
/// [`Validator`](crate::Validator) carries its own copy.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema, PartialEq)]
#[serde(default)]
pub struct AnalysisConfig {
    /// Fractional digits kept when deciding whether two endpoints are the same node
    #[schemars(range(min = 0, max = 12))]
    pub precision: u32,
    /// Expected share of outliers handed to the anomaly model
    #[schemars(range(min = 0.0, max = 1.0))]
    pub contamination: f64,
    /// Percentile of the observed dangling gaps used as the data-derived threshold
    #[schemars(range(min = 0.0, max = 100.0))]
    pub gap_percentile: f64,
    /// Cap on the gap threshold as a fraction of the mean polyline length
    pub scale_fraction: f64,
    /// Threshold used when the mean polyline length is unusable
    pub fallback_threshold: f64,
    /// Minimum number of observed gaps before the percentile is trusted
    pub min_percentile_samples: usize,
    /// Minimum number of polylines before the anomaly model is fitted
    pub min_ml_samples: usize,
    /// Multiplier applied to a gap's confidence when the anomaly model agrees
    pub agreement_boost: f64,
    /// Confidence at or above which an issue is HIGH
    pub high_confidence: f64,
    /// Confidence at or above which an issue is MEDIUM
    pub medium_confidence: f64,
    pub forest: ForestConfig,
}

/// Isolation forest knobs.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema, PartialEq)]
#[serde(default)]
pub struct ForestConfig {
    #[schemars(range(min = 1))]
    pub trees: usize,
    /// Upper bound on the per-tree sub-sample size
    #[schemars(range(min = 2))]
    pub max_samples: usize,
    pub seed: u64,
}

impl Default for AnalysisConfig {
    fn default() -> Self {
        Self {
            precision: 6,
            contamination: 0.15,
            gap_percentile: 75.0,
            scale_fraction: 0.15,
            fallback_threshold: 5.0,
            min_percentile_samples: 4,
            min_ml_samples: 5,
            agreement_boost: 1.3,
            high_confidence: 0.7,
            medium_confidence: 0.4,
            forest: ForestConfig::default(),
        }
    }
}

impl Default for ForestConfig {
    fn default() -> Self {
        Self {
            trees: 100,
            max_samples: 256,
            seed: 42,
        }
    }
}

impl AnalysisConfig {
    /// Get the JSON schema for the configuration file
    pub fn schema() -> schemars::schema::RootSchema {
        schemars::schema_for!(AnalysisConfig)
    }

    pub fn validate(&self) -> Result<()> {
        let invalid = |msg: String| Err(RoadGapError::InvalidConfig(msg));

        if self.precision > MAX_PRECISION {
            return invalid(format!(
                "precision {} exceeds the maximum of {}",
                self.precision, MAX_PRECISION
            ));
        }
        if !(self.contamination > 0.0 && self.contamination <= 1.0) {
            return invalid(format!(
                "contamination must be in (0, 1], got {}",
                self.contamination
            ));
        }
        if !(0.0..=100.0).contains(&self.gap_percentile) {
            return invalid(format!(
                "gap_percentile must be in [0, 100], got {}",
                self.gap_percentile
            ));
        }
        if !(self.scale_fraction.is_finite() && self.scale_fraction > 0.0) {
            return invalid(format!(
                "scale_fraction must be positive, got {}",
                self.scale_fraction
            ));
        }
        if !(self.fallback_threshold.is_finite() && self.fallback_threshold > 0.0) {
            return invalid(format!(
                "fallback_threshold must be positive, got {}",
                self.fallback_threshold
            ));
        }
        if !(self.agreement_boost.is_finite() && self.agreement_boost >= 1.0) {
            return invalid(format!(
                "agreement_boost must be at least 1.0, got {}",
                self.agreement_boost
            ));
        }
        if !(0.0 <= self.medium_confidence
            && self.medium_confidence <= self.high_confidence
            && self.high_confidence <= 1.0)
        {
            return invalid(format!(
                "confidence bands must satisfy 0 <= medium ({}) <= high ({}) <= 1",
                self.medium_confidence, self.high_confidence
            ));
        }
        if self.min_ml_samples < 2 {
            return invalid("min_ml_samples must be at least 2".to_string());
        }
        if self.forest.trees == 0 {
            return invalid("forest.trees must be at least 1".to_string());
        }
        if self.forest.max_samples < 2 {
            return invalid("forest.max_samples must be at least 2".to_string());
        }
        Ok(())
    }

    /// Load configuration from TOML string
    pub fn from_toml(content: &str) -> Result<Self> {
        let config: AnalysisConfig = toml::from_str(content)?;
        config.validate()?;
        Ok(config)
    }

    /// Load configuration from JSON string
    pub fn from_json(content: &str) -> Result<Self> {
        let config: AnalysisConfig = serde_json::from_str(content)?;
        config.validate()?;
        Ok(config)
    }

    /// Auto-detect file format and load configuration
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path_ref = path.as_ref();
        match path_ref.extension().and_then(|ext| ext.to_str()) {
            Some("toml") => Self::from_toml(&fs::read_to_string(path_ref)?),
            Some("json") => Self::from_json(&fs::read_to_string(path_ref)?),
            _ => Err(RoadGapError::UnsupportedFileFormat),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_are_valid() {
        let config = AnalysisConfig::default();
        config.validate().expect("Defaults should validate");
        assert_eq!(config.precision, 6);
    }

    #[test]
    fn test_partial_toml_keeps_defaults() {
        let config = AnalysisConfig::from_toml(
            r#"
            contamination = 0.1

            [forest]
            seed = 7
            "#,
        )
        .expect("Should parse partial TOML");

        assert_eq!(config.contamination, 0.1);
        assert_eq!(config.precision, 6);
        assert_eq!(config.forest.seed, 7);
        assert_eq!(config.forest.trees, 100);
    }

    #[test]
    fn test_json_rejects_out_of_range_contamination() {
        let err = AnalysisConfig::from_json(r#"{ "contamination": 0.0 }"#)
            .expect_err("Zero contamination should be rejected");
        assert!(matches!(err, RoadGapError::InvalidConfig(_)));
    }

    #[test]
    fn test_boost_below_one_is_rejected() {
        let config = AnalysisConfig {
            agreement_boost: 0.9,
            ..AnalysisConfig::default()
        };
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_unknown_extension() {
        let err = AnalysisConfig::from_file("settings.yaml").expect_err("yaml is not supported");
        assert!(matches!(err, RoadGapError::UnsupportedFileFormat));
    }

    #[test]
    fn test_schema_mentions_fields() {
        let schema = serde_json::to_string(&AnalysisConfig::schema()).expect("Schema serializes");
        assert!(schema.contains("gap_percentile"));
        assert!(schema.contains("forest"));
    }
}
