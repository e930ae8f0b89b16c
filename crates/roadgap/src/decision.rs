//! Fuses detector output into the final, ordered issue list.

use std::collections::{BTreeMap, HashMap};

use tracing::debug;

use crate::{
    config::AnalysisConfig,
    types::{Detection, Issue, IssueKey, IssueKind, PolylineId, SeverityBands},
};

#[derive(Debug, Clone)]
pub struct DecisionEngine {
    /// Confidence multiplier when both detectors flag a polyline
    pub boost: f64,
    pub bands: SeverityBands,
}

impl Default for DecisionEngine {
    fn default() -> Self {
        Self::from_config(&AnalysisConfig::default())
    }
}

impl DecisionEngine {
    pub fn from_config(config: &AnalysisConfig) -> Self {
        Self {
            boost: config.agreement_boost,
            bands: SeverityBands {
                high: config.high_confidence,
                medium: config.medium_confidence,
            },
        }
    }

    fn issue(&self, polyline_id: PolylineId, confidence: f64, kind: IssueKind) -> Issue {
        let confidence = confidence.clamp(0.0, 1.0);
        Issue {
            polyline_id,
            confidence,
            severity: self.bands.classify(confidence),
            kind,
        }
    }

    /// Merge, deduplicate, grade and order.
    ///
    /// When a polyline carries both a gap and an anomaly, every gap becomes a
    /// fused issue with boosted confidence and the anomaly is absorbed. Boosting
    /// never lowers a confidence.
    pub fn decide(&self, detections: Vec<Detection>) -> Vec<Issue> {
        let mut by_polyline: BTreeMap<PolylineId, Vec<Detection>> = BTreeMap::new();
        for detection in detections {
            by_polyline
                .entry(detection.polyline_id())
                .or_default()
                .push(detection);
        }

        let mut best: HashMap<IssueKey, Issue> = HashMap::new();
        let mut fused = 0usize;

        for (polyline_id, group) in by_polyline {
            let anomaly_score = group
                .iter()
                .filter_map(|d| match d {
                    Detection::Anomaly { score, .. } => Some(*score),
                    Detection::Gap { .. } => None,
                })
                .max_by(|a, b| a.total_cmp(b));
            let has_gap = group.iter().any(|d| matches!(d, Detection::Gap { .. }));

            let issues = group.into_iter().filter_map(|detection| match (detection, anomaly_score) {
                (Detection::Gap { finding, confidence, .. }, Some(score)) => {
                    fused += 1;
                    let boosted = (confidence * self.boost).min(1.0).max(confidence);
                    Some(self.issue(
                        polyline_id,
                        boosted,
                        IssueKind::Fused {
                            gap: finding,
                            anomaly_score: score,
                        },
                    ))
                }
                (Detection::Gap { finding, confidence, .. }, None) => {
                    Some(self.issue(polyline_id, confidence, IssueKind::Gap(finding)))
                }
                (Detection::Anomaly { .. }, _) if has_gap => None,
                (Detection::Anomaly { score, confidence, .. }, _) => Some(self.issue(
                    polyline_id,
                    confidence,
                    IssueKind::Anomaly {
                        anomaly_score: score,
                    },
                )),
            });

            for issue in issues {
                let key = issue.key();
                match best.get(&key) {
                    Some(existing) if existing.confidence >= issue.confidence => {}
                    _ => {
                        best.insert(key, issue);
                    }
                }
            }
        }

        let mut issues: Vec<Issue> = best.into_values().collect();
        issues.sort_by(|a, b| {
            b.confidence
                .total_cmp(&a.confidence)
                .then_with(|| a.key().cmp(&b.key()))
        });

        debug!("Decided {} issues, {} fused", issues.len(), fused);
        issues
    }
}
