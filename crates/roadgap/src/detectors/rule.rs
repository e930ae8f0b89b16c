use tracing::{debug, warn};

use crate::{
    config::AnalysisConfig,
    error::AnalysisWarning,
    stats,
    types::{
        Detection, EndpointRole, FeatureRecord, GapClass, GapFinding, ThresholdEstimate,
        ThresholdSource,
    },
};

/// Flags dangling endpoints that sit close to, but not on, another curve.
///
/// The threshold is derived from the data: the configured percentile of the
/// gaps actually observed, capped by a fraction of the mean polyline length so
/// sparse networks do not turn legitimate dead ends into gaps.
#[derive(Debug, Clone)]
pub struct RuleGapDetector {
    pub percentile: f64,
    pub scale_fraction: f64,
    pub fallback_threshold: f64,
    pub min_percentile_samples: usize,
}

impl Default for RuleGapDetector {
    fn default() -> Self {
        Self::from_config(&AnalysisConfig::default())
    }
}

impl RuleGapDetector {
    pub fn from_config(config: &AnalysisConfig) -> Self {
        Self {
            percentile: config.gap_percentile,
            scale_fraction: config.scale_fraction,
            fallback_threshold: config.fallback_threshold,
            min_percentile_samples: config.min_percentile_samples,
        }
    }

    /// Zero means the endpoint touches another curve, infinity that there is
    /// no other curve. Every gap in between counts, however small.
    fn is_measurable(gap: f64) -> bool {
        gap.is_finite() && gap > 0.0
    }

    /// Positive, finite gaps at every dangling endpoint
    pub fn observed_gaps(&self, features: &[FeatureRecord]) -> Vec<f64> {
        features
            .iter()
            .flat_map(|f| EndpointRole::BOTH.map(|role| (f, role)))
            .filter(|(f, role)| f.is_dangling(*role))
            .map(|(f, role)| f.gap(role))
            .filter(|gap| Self::is_measurable(*gap))
            .collect()
    }

    pub fn estimate_threshold(
        &self,
        features: &[FeatureRecord],
        warnings: &mut Vec<AnalysisWarning>,
    ) -> ThresholdEstimate {
        let lengths: Vec<f64> = features.iter().map(|f| f.length).collect();

        let (scale_threshold, scale_source) = match stats::mean(&lengths) {
            Some(mean) if mean.is_finite() && mean > 0.0 => {
                (self.scale_fraction * mean, ThresholdSource::Scale)
            }
            _ => {
                warn!(
                    "Mean polyline length unusable, falling back to {}",
                    self.fallback_threshold
                );
                warnings.push(AnalysisWarning::DegenerateThreshold {
                    fallback: self.fallback_threshold,
                });
                (self.fallback_threshold, ThresholdSource::Fallback)
            }
        };

        let gaps = self.observed_gaps(features);
        let percentile_value = if gaps.len() >= self.min_percentile_samples {
            stats::percentile(&gaps, self.percentile)
        } else {
            None
        };

        let (gap_threshold, source) = match percentile_value {
            Some(p) if p < scale_threshold => (p, ThresholdSource::Percentile),
            _ => (scale_threshold, scale_source),
        };

        debug!(
            "Gap threshold {:.6} from {} ({} observed gaps, scale cap {:.6})",
            gap_threshold,
            source,
            gaps.len(),
            scale_threshold
        );

        ThresholdEstimate {
            gap_threshold,
            scale_threshold,
            percentile_value,
            sample_count: gaps.len(),
            source,
        }
    }

    pub fn detect(&self, features: &[FeatureRecord], threshold: &ThresholdEstimate) -> Vec<Detection> {
        let limit = threshold.gap_threshold;
        let mut detections = Vec::new();

        for f in features {
            for role in EndpointRole::BOTH {
                if !f.is_dangling(role) {
                    continue;
                }
                let gap = f.gap(role);
                if !Self::is_measurable(gap) || gap >= limit {
                    continue;
                }

                let class = if gap < limit / 2.0 {
                    GapClass::Undershoot
                } else {
                    GapClass::PotentialGap
                };

                detections.push(Detection::Gap {
                    polyline_id: f.polyline_id,
                    finding: GapFinding {
                        endpoint: role,
                        coord: f.coord(role),
                        gap_distance: gap,
                        nearest_polyline: f.nearest(role),
                        class,
                    },
                    confidence: (1.0 - gap / limit).clamp(0.0, 1.0),
                });
            }
        }

        debug!("Rule detector flagged {} endpoints", detections.len());
        detections
    }
}
