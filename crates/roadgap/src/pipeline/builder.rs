use crate::{
    algorithms::IsolationForest,
    config::AnalysisConfig,
    error::Result,
    pipeline::Validator,
    traits::OutlierModel,
};

/// Builder for creating validators with a fluent API
#[derive(Debug, Clone)]
pub struct ValidatorBuilder<M: OutlierModel = IsolationForest> {
    config: AnalysisConfig,
    model: M,
}

impl ValidatorBuilder<IsolationForest> {
    /// Create a new validator builder with default settings
    pub fn new() -> Self {
        Self {
            config: AnalysisConfig::default(),
            model: IsolationForest::default(),
        }
    }

    /// Replace the whole configuration. The isolation forest is retuned from
    /// `config.forest`.
    pub fn config(mut self, config: AnalysisConfig) -> Self {
        self.model = IsolationForest::from(&config.forest);
        self.config = config;
        self
    }

    /// Seed for the isolation forest
    pub fn seed(mut self, seed: u64) -> Self {
        self.config.forest.seed = seed;
        self.model.seed = seed;
        self
    }
}

impl Default for ValidatorBuilder<IsolationForest> {
    fn default() -> Self {
        Self::new()
    }
}

impl<M: OutlierModel> ValidatorBuilder<M> {
    /// Fractional digits used for node identity and snapping
    pub fn precision(mut self, precision: u32) -> Self {
        self.config.precision = precision;
        self
    }

    /// Expected share of outliers
    pub fn contamination(mut self, contamination: f64) -> Self {
        self.config.contamination = contamination;
        self
    }

    /// Percentile and scale cap used for the gap threshold
    pub fn gap_threshold(mut self, percentile: f64, scale_fraction: f64) -> Self {
        self.config.gap_percentile = percentile;
        self.config.scale_fraction = scale_fraction;
        self
    }

    /// Confidence multiplier when both detectors agree
    pub fn agreement_boost(mut self, boost: f64) -> Self {
        self.config.agreement_boost = boost;
        self
    }

    /// Swap in another outlier model
    pub fn outlier_model<N: OutlierModel>(self, model: N) -> ValidatorBuilder<N> {
        ValidatorBuilder {
            config: self.config,
            model,
        }
    }

    /// Validate the configuration and build the validator
    pub fn build(self) -> Result<Validator<M>> {
        Validator::new(self.config, self.model)
    }
}
