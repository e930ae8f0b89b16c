use tracing::{debug, warn};

use crate::{
    config::AnalysisConfig,
    error::{AnalysisWarning, Result},
    stats,
    traits::OutlierModel,
    types::{Detection, FeatureRecord},
};

/// Stand-in for infinite gaps before standardization
pub const NON_FINITE_SENTINEL: f64 = 1e6;

/// Column order of the samples handed to the outlier model
pub const FEATURE_NAMES: [&str; 8] = [
    "length",
    "vertex_count",
    "vertex_density",
    "connectivity_score",
    "start_degree",
    "end_degree",
    "start_gap",
    "end_gap",
];

pub fn feature_vector(record: &FeatureRecord) -> Vec<f64> {
    [
        record.length,
        record.vertex_count as f64,
        record.vertex_density,
        record.connectivity_score,
        record.start_degree as f64,
        record.end_degree as f64,
        record.start_gap,
        record.end_gap,
    ]
    .into_iter()
    .map(|v| if v.is_finite() { v } else { NON_FINITE_SENTINEL })
    .collect()
}

/// Z-score every column in place. A constant column is only centred.
pub fn standardize(rows: &mut [Vec<f64>]) {
    let Some(dims) = rows.first().map(Vec::len) else {
        return;
    };
    for col in 0..dims {
        let column: Vec<f64> = rows.iter().map(|row| row[col]).collect();
        let (Some(mu), Some(sigma)) = (stats::mean(&column), stats::std_dev(&column)) else {
            continue;
        };
        for row in rows.iter_mut() {
            row[col] -= mu;
            if sigma > 0.0 {
                row[col] /= sigma;
            }
        }
    }
}

/// Contamination actually used for `n` samples: at least one expected outlier
/// or 5%, never more than configured.
pub fn effective_rate(configured: f64, n: usize) -> f64 {
    let floor = if n == 0 { 0.05 } else { (1.0 / n as f64).max(0.05) };
    configured.min(floor)
}

/// Confidence for an outlier score. [`AnomalyDetector::detect`] only passes
/// positive scores, the outliers under the [`OutlierModel`] contract; the 0.3
/// floor is for callers mapping a label from a model without a signed score.
pub fn anomaly_confidence(score: f64) -> f64 {
    if score > 0.0 {
        (score / 0.5).clamp(0.0, 1.0)
    } else {
        0.3
    }
}

/// Flags polylines whose feature vectors the outlier model isolates.
#[derive(Debug, Clone)]
pub struct AnomalyDetector {
    pub contamination: f64,
    pub min_samples: usize,
}

impl Default for AnomalyDetector {
    fn default() -> Self {
        Self::from_config(&AnalysisConfig::default())
    }
}

impl AnomalyDetector {
    pub fn from_config(config: &AnalysisConfig) -> Self {
        Self {
            contamination: config.contamination,
            min_samples: config.min_ml_samples,
        }
    }

    pub fn detect<M: OutlierModel>(
        &self,
        model: &M,
        features: &[FeatureRecord],
        warnings: &mut Vec<AnalysisWarning>,
    ) -> Result<Vec<Detection>> {
        let n = features.len();
        if n < self.min_samples {
            warn!(
                "Skipping anomaly stage: {} polylines, need {}",
                n, self.min_samples
            );
            warnings.push(AnalysisWarning::InsufficientSamples {
                count: n,
                required: self.min_samples,
            });
            return Ok(Vec::new());
        }

        let mut samples: Vec<Vec<f64>> = features.iter().map(feature_vector).collect();
        standardize(&mut samples);

        let rate = effective_rate(self.contamination, n);
        let fitted = model.fit(&samples, rate)?;
        let scores = model.score(&fitted, &samples)?;

        let detections: Vec<Detection> = features
            .iter()
            .zip(scores)
            // score > 0 marks an outlier, see `OutlierModel`
            .filter(|(_, score)| *score > 0.0)
            .map(|(record, score)| Detection::Anomaly {
                polyline_id: record.polyline_id,
                score,
                confidence: anomaly_confidence(score),
            })
            .collect();

        debug!(
            "Anomaly detector flagged {} of {} polylines at rate {:.4}",
            detections.len(),
            n,
            rate
        );
        Ok(detections)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::algorithms::IsolationForest;

    fn record(id: usize, length: f64, vertex_count: usize, gap: f64) -> FeatureRecord {
        FeatureRecord {
            polyline_id: id,
            length,
            vertex_count,
            vertex_density: vertex_count as f64 / length,
            start: [0.0, 0.0],
            end: [length, 0.0],
            start_degree: 2,
            end_degree: 1,
            start_gap: 0.0,
            end_gap: gap,
            start_nearest: Some(0),
            end_nearest: gap.is_finite().then_some(0),
            connectivity_score: 0.0,
        }
    }

    #[test]
    fn test_feature_vector_replaces_infinite_values() {
        let v = feature_vector(&record(0, 4.0, 2, f64::INFINITY));
        assert_eq!(v.len(), FEATURE_NAMES.len());
        assert_eq!(v[0], 4.0);
        assert_eq!(v[2], 0.5);
        assert_eq!(v[7], NON_FINITE_SENTINEL);
    }

    #[test]
    fn test_standardize() {
        let mut rows = vec![vec![1.0, 5.0], vec![3.0, 5.0]];
        standardize(&mut rows);
        assert_eq!(rows[0], vec![-1.0, 0.0]);
        assert_eq!(rows[1], vec![1.0, 0.0]);
    }

    #[test]
    fn test_effective_rate() {
        assert_eq!(effective_rate(0.15, 100), 0.05);
        assert_eq!(effective_rate(0.15, 10), 0.1);
        assert_eq!(effective_rate(0.15, 4), 0.15);
        assert_eq!(effective_rate(0.02, 10), 0.02);
    }

    #[test]
    fn test_anomaly_confidence() {
        assert_eq!(anomaly_confidence(0.25), 0.5);
        assert_eq!(anomaly_confidence(0.9), 1.0);
        assert_eq!(anomaly_confidence(0.0), 0.3);
        assert_eq!(anomaly_confidence(-0.1), 0.3);
    }

    #[test]
    fn test_flags_the_odd_polyline() {
        let mut features: Vec<FeatureRecord> = (0..10).map(|i| record(i, 10.0, 2, 3.0)).collect();
        features.push(record(10, 500.0, 40, 250.0));

        let detector = AnomalyDetector::default();
        let mut warnings = Vec::new();
        let detections = detector
            .detect(&IsolationForest::default(), &features, &mut warnings)
            .expect("Should run the anomaly stage");

        assert!(warnings.is_empty());
        assert_eq!(detections.len(), 1);
        match &detections[0] {
            Detection::Anomaly { polyline_id, score, confidence } => {
                assert_eq!(*polyline_id, 10);
                assert!(*score > 0.0);
                assert!((0.0..=1.0).contains(confidence));
            }
            other => panic!("unexpected detection {:?}", other),
        }
    }

    /// Returns preset scores regardless of the samples
    struct FixedScores(Vec<f64>);

    impl OutlierModel for FixedScores {
        type Fitted = ();

        fn fit(&self, _samples: &[Vec<f64>], _contamination: f64) -> Result<()> {
            Ok(())
        }

        fn score(&self, _fitted: &(), _samples: &[Vec<f64>]) -> Result<Vec<f64>> {
            Ok(self.0.clone())
        }
    }

    #[test]
    fn test_only_positive_scores_become_detections() {
        let features: Vec<FeatureRecord> = (0..5).map(|i| record(i, 10.0, 2, 1.0)).collect();
        let model = FixedScores(vec![0.25, 0.0, -0.4, 0.9, -0.01]);
        let mut warnings = Vec::new();
        let detections = AnomalyDetector::default()
            .detect(&model, &features, &mut warnings)
            .expect("Should run the anomaly stage");

        let flagged: Vec<(usize, f64)> = detections
            .iter()
            .map(|d| match d {
                Detection::Anomaly { polyline_id, confidence, .. } => (*polyline_id, *confidence),
                other => panic!("unexpected detection {:?}", other),
            })
            .collect();
        assert_eq!(flagged, vec![(0, 0.5), (3, 1.0)]);
    }

    #[test]
    fn test_small_networks_skip_the_stage() {
        let features: Vec<FeatureRecord> = (0..4).map(|i| record(i, 10.0, 2, 1.0)).collect();
        let detector = AnomalyDetector::default();
        let mut warnings = Vec::new();
        let detections = detector
            .detect(&IsolationForest::default(), &features, &mut warnings)
            .expect("Skipping is not an error");

        assert!(detections.is_empty());
        assert_eq!(
            warnings,
            vec![AnalysisWarning::InsufficientSamples { count: 4, required: 5 }]
        );
    }
}
