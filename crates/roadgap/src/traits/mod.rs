use crate::error::Result;

/// Unsupervised outlier detector used by the anomaly stage.
///
/// Samples are rows of standardized features. Implementations fit a model on
/// one run's samples and score the same (or other) rows with it; a positive
/// score marks an outlier and larger means more anomalous.
pub trait OutlierModel: Send + Sync {
    type Fitted: Send + Sync;

    /// Fit a model; `contamination` is the expected share of outliers
    fn fit(&self, samples: &[Vec<f64>], contamination: f64) -> Result<Self::Fitted>;

    /// Score every sample against a fitted model
    fn score(&self, fitted: &Self::Fitted, samples: &[Vec<f64>]) -> Result<Vec<f64>>;
}
