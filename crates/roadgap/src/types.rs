use geo_types::{Coord, LineString};
use serde::{Deserialize, Serialize};
use strum::{Display, EnumString, IntoStaticStr};

use crate::error::AnalysisWarning;

/// Stable identifier assigned to a polyline in first-seen order.
pub type PolylineId = usize;

/// A validated road segment: an open curve with at least two vertices and
/// nonzero length. Immutable for the duration of a run.
#[derive(Debug, Clone, PartialEq)]
pub struct Polyline {
    pub id: PolylineId,
    pub line: LineString<f64>,
}

impl Polyline {
    pub fn new(id: PolylineId, line: LineString<f64>) -> Self {
        Self { id, line }
    }

    pub fn start(&self) -> Coord<f64> {
        self.line.0[0]
    }

    pub fn end(&self) -> Coord<f64> {
        self.line.0[self.line.0.len() - 1]
    }

    pub fn endpoint(&self, role: EndpointRole) -> Coord<f64> {
        match role {
            EndpointRole::Start => self.start(),
            EndpointRole::End => self.end(),
        }
    }

    pub fn vertex_count(&self) -> usize {
        self.line.0.len()
    }

    pub fn length(&self) -> f64 {
        use geo::EuclideanLength;
        self.line.euclidean_length()
    }

    /// Copy of this polyline with one endpoint moved
    pub fn with_endpoint(&self, role: EndpointRole, coord: Coord<f64>) -> Self {
        let mut coords = self.line.0.clone();
        let idx = match role {
            EndpointRole::Start => 0,
            EndpointRole::End => coords.len() - 1,
        };
        coords[idx] = coord;
        Self::new(self.id, LineString::new(coords))
    }
}

#[derive(
    Debug, Clone, Copy,
    Serialize, Deserialize,
    Display, EnumString, IntoStaticStr,
    PartialEq, Eq, Hash, PartialOrd, Ord
)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum EndpointRole {
    Start,
    End,
}

impl EndpointRole {
    pub const BOTH: [EndpointRole; 2] = [EndpointRole::Start, EndpointRole::End];
}

/// Per-polyline measurements shared by both detectors.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FeatureRecord {
    pub polyline_id: PolylineId,
    pub length: f64,
    pub vertex_count: usize,
    /// Vertices per unit length
    pub vertex_density: f64,
    pub start: [f64; 2],
    pub end: [f64; 2],
    pub start_degree: usize,
    pub end_degree: usize,
    /// Distance from the start point to the nearest other curve, infinite when alone
    pub start_gap: f64,
    pub end_gap: f64,
    pub start_nearest: Option<PolylineId>,
    pub end_nearest: Option<PolylineId>,
    /// Smaller of the two endpoint gaps
    pub connectivity_score: f64,
}

impl FeatureRecord {
    pub fn degree(&self, role: EndpointRole) -> usize {
        match role {
            EndpointRole::Start => self.start_degree,
            EndpointRole::End => self.end_degree,
        }
    }

    pub fn gap(&self, role: EndpointRole) -> f64 {
        match role {
            EndpointRole::Start => self.start_gap,
            EndpointRole::End => self.end_gap,
        }
    }

    pub fn nearest(&self, role: EndpointRole) -> Option<PolylineId> {
        match role {
            EndpointRole::Start => self.start_nearest,
            EndpointRole::End => self.end_nearest,
        }
    }

    pub fn coord(&self, role: EndpointRole) -> [f64; 2] {
        match role {
            EndpointRole::Start => self.start,
            EndpointRole::End => self.end,
        }
    }

    pub fn is_dangling(&self, role: EndpointRole) -> bool {
        self.degree(role) == 1
    }
}

#[derive(
    Debug, Clone, Copy,
    Serialize, Deserialize,
    Display, EnumString, IntoStaticStr,
    PartialEq, Eq, Hash, PartialOrd, Ord
)]
#[serde(rename_all = "UPPERCASE")]
#[strum(serialize_all = "UPPERCASE")]
pub enum Severity {
    Low,
    Medium,
    High,
}

/// Confidence cut-offs for each severity band.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SeverityBands {
    pub high: f64,
    pub medium: f64,
}

impl Default for SeverityBands {
    fn default() -> Self {
        Self {
            high: 0.7,
            medium: 0.4,
        }
    }
}

impl SeverityBands {
    pub fn classify(&self, confidence: f64) -> Severity {
        if confidence >= self.high {
            Severity::High
        } else if confidence >= self.medium {
            Severity::Medium
        } else {
            Severity::Low
        }
    }
}

/// How close a dangling endpoint sits relative to the active threshold.
#[derive(
    Debug, Clone, Copy,
    Serialize, Deserialize,
    Display, EnumString, IntoStaticStr,
    PartialEq, Eq, Hash
)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
#[strum(serialize_all = "SCREAMING_SNAKE_CASE")]
pub enum GapClass {
    /// Below half the threshold
    Undershoot,
    PotentialGap,
}

#[derive(
    Debug, Clone, Copy,
    Serialize, Deserialize,
    Display, EnumString, IntoStaticStr,
    PartialEq, Eq, Hash
)]
pub enum IssueSource {
    #[serde(rename = "rule")]
    #[strum(serialize = "rule")]
    Rule,
    #[serde(rename = "ml")]
    #[strum(serialize = "ml")]
    Ml,
    #[serde(rename = "rule+ml")]
    #[strum(serialize = "rule+ml")]
    RuleMl,
}

/// A dangling endpoint measured against the nearest other curve.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct GapFinding {
    pub endpoint: EndpointRole,
    pub coord: [f64; 2],
    pub gap_distance: f64,
    pub nearest_polyline: Option<PolylineId>,
    pub class: GapClass,
}

/// What a detector reported, before fusion and severity assignment.
#[derive(Debug, Clone, PartialEq)]
pub enum Detection {
    Gap {
        polyline_id: PolylineId,
        finding: GapFinding,
        confidence: f64,
    },
    Anomaly {
        polyline_id: PolylineId,
        score: f64,
        confidence: f64,
    },
}

impl Detection {
    pub fn polyline_id(&self) -> PolylineId {
        match self {
            Detection::Gap { polyline_id, .. } | Detection::Anomaly { polyline_id, .. } => {
                *polyline_id
            }
        }
    }
}

/// Issue payload. Only the variants that concern an endpoint carry one.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "source")]
pub enum IssueKind {
    #[serde(rename = "rule")]
    Gap(GapFinding),
    #[serde(rename = "ml")]
    Anomaly { anomaly_score: f64 },
    #[serde(rename = "rule+ml")]
    Fused {
        #[serde(flatten)]
        gap: GapFinding,
        anomaly_score: f64,
    },
}

/// Deduplication key: a polyline endpoint, or the whole segment.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct IssueKey {
    pub polyline_id: PolylineId,
    pub endpoint: Option<EndpointRole>,
}

/// Final verdict for one polyline endpoint or segment.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Issue {
    pub polyline_id: PolylineId,
    pub confidence: f64,
    pub severity: Severity,
    #[serde(flatten)]
    pub kind: IssueKind,
}

impl Issue {
    pub fn source(&self) -> IssueSource {
        match self.kind {
            IssueKind::Gap(_) => IssueSource::Rule,
            IssueKind::Anomaly { .. } => IssueSource::Ml,
            IssueKind::Fused { .. } => IssueSource::RuleMl,
        }
    }

    pub fn gap(&self) -> Option<&GapFinding> {
        match &self.kind {
            IssueKind::Gap(gap) | IssueKind::Fused { gap, .. } => Some(gap),
            IssueKind::Anomaly { .. } => None,
        }
    }

    pub fn endpoint(&self) -> Option<EndpointRole> {
        self.gap().map(|gap| gap.endpoint)
    }

    pub fn anomaly_score(&self) -> Option<f64> {
        match self.kind {
            IssueKind::Anomaly { anomaly_score } | IssueKind::Fused { anomaly_score, .. } => {
                Some(anomaly_score)
            }
            IssueKind::Gap(_) => None,
        }
    }

    pub fn key(&self) -> IssueKey {
        IssueKey {
            polyline_id: self.polyline_id,
            endpoint: self.endpoint(),
        }
    }
}

/// Proposed snap of a dangling endpoint onto the nearest other curve.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FixSuggestion {
    pub polyline_id: PolylineId,
    pub endpoint: EndpointRole,
    pub original: [f64; 2],
    pub snapped: [f64; 2],
    pub target_polyline: PolylineId,
    /// Distance the endpoint moves
    pub residual_distance: f64,
}

#[derive(
    Debug, Clone, Copy,
    Serialize, Deserialize,
    Display, EnumString, IntoStaticStr,
    PartialEq, Eq
)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum ThresholdSource {
    /// Percentile of observed gaps, below the scale cap
    Percentile,
    /// Scale cap from the mean polyline length
    Scale,
    /// Fixed constant, the mean length was unusable
    Fallback,
}

/// The gap threshold used for a run and how it was derived.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ThresholdEstimate {
    pub gap_threshold: f64,
    pub scale_threshold: f64,
    pub percentile_value: Option<f64>,
    /// Number of usable dangling gaps
    pub sample_count: usize,
    pub source: ThresholdSource,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct Bounds {
    pub min: [f64; 2],
    pub max: [f64; 2],
}

/// Aggregate figures for the analysed network.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct NetworkStats {
    pub segment_count: usize,
    pub total_length: f64,
    pub average_length: f64,
    pub min_length: f64,
    pub max_length: f64,
    /// Distinct endpoint nodes after rounding
    pub total_nodes: usize,
    pub connected_nodes: usize,
    pub dangling_nodes: usize,
    pub bounds: Option<Bounds>,
}

/// Everything one analysis produces.
#[derive(Debug, Clone, Serialize)]
pub struct AnalysisReport {
    /// Ordered by descending confidence
    pub issues: Vec<Issue>,
    /// Parallel to the endpoint issues, in the same order
    pub fixes: Vec<FixSuggestion>,
    pub features: Vec<FeatureRecord>,
    pub stats: NetworkStats,
    pub threshold: ThresholdEstimate,
    pub warnings: Vec<AnalysisWarning>,
    #[serde(skip)]
    pub polylines: Vec<Polyline>,
    #[serde(skip)]
    pub precision: u32,
}

impl AnalysisReport {
    pub fn issues_from(&self, source: IssueSource) -> impl Iterator<Item = &Issue> + '_ {
        self.issues.iter().filter(move |issue| issue.source() == source)
    }

    /// Issues that concern a concrete endpoint (rule or fused)
    pub fn gap_issues(&self) -> impl Iterator<Item = &Issue> + '_ {
        self.issues.iter().filter(|issue| issue.gap().is_some())
    }

    pub fn count_by_severity(&self, severity: Severity) -> usize {
        self.issues.iter().filter(|issue| issue.severity == severity).count()
    }
}
