pub mod builder;

use geo_types::LineString;
use tracing::{debug, info, warn};

use crate::{
    algorithms::IsolationForest,
    config::AnalysisConfig,
    decision::DecisionEngine,
    detectors::{AnomalyDetector, RuleGapDetector},
    error::{AnalysisWarning, Result, RoadGapError},
    features::extract_features,
    fix::suggest_fixes,
    index::EndpointIndex,
    io::{Ingested, ingest_lines, parse_network},
    spatial::SegmentIndex,
    traits::OutlierModel,
    types::{AnalysisReport, FeatureRecord, NetworkStats, Polyline},
};

/// Everything derived for a single request. Built fresh by every call to
/// [`Validator::analyze`] and dropped with it.
pub struct AnalysisContext<'a> {
    pub config: &'a AnalysisConfig,
    pub polylines: Vec<Polyline>,
    pub index: EndpointIndex,
    pub segments: SegmentIndex,
    pub features: Vec<FeatureRecord>,
}

impl<'a> AnalysisContext<'a> {
    pub fn new(config: &'a AnalysisConfig, polylines: Vec<Polyline>) -> Self {
        let index = EndpointIndex::build(&polylines, config.precision);
        let segments = SegmentIndex::build(&polylines);
        let features = extract_features(&polylines, &index, &segments);
        Self {
            config,
            polylines,
            index,
            segments,
            features,
        }
    }
}

/// Immutable, reusable gap validator
#[derive(Debug, Clone)]
pub struct Validator<M: OutlierModel = IsolationForest> {
    config: AnalysisConfig,
    model: M,
}

impl Validator<IsolationForest> {
    /// Create a new validator builder
    pub fn builder() -> builder::ValidatorBuilder<IsolationForest> {
        builder::ValidatorBuilder::new()
    }

    /// Validator with the default isolation forest tuned from `config.forest`
    pub fn from_config(config: AnalysisConfig) -> Result<Self> {
        let model = IsolationForest::from(&config.forest);
        Self::new(config, model)
    }
}

impl<M: OutlierModel> Validator<M> {
    pub fn new(config: AnalysisConfig, model: M) -> Result<Self> {
        config.validate()?;
        Ok(Self { config, model })
    }

    pub fn config(&self) -> &AnalysisConfig {
        &self.config
    }

    pub fn model(&self) -> &M {
        &self.model
    }

    /// Analyze every `LINESTRING` found in `text`
    pub fn analyze(&self, text: &str) -> Result<AnalysisReport> {
        let ingested = parse_network(text, self.config.precision);
        self.run(ingested)
    }

    /// Analyze line strings that are already in memory. They go through the
    /// same checks as parsed text; rejected ones become warnings.
    pub fn analyze_lines(&self, lines: Vec<LineString<f64>>) -> Result<AnalysisReport> {
        let ingested = ingest_lines(lines, self.config.precision);
        self.run(ingested)
    }

    fn run(&self, ingested: Ingested) -> Result<AnalysisReport> {
        let Ingested { polylines, errors } = ingested;
        let mut warnings: Vec<AnalysisWarning> =
            errors.into_iter().map(AnalysisWarning::Parse).collect();

        if polylines.is_empty() {
            warn!("No usable polylines, {} fragments rejected", warnings.len());
            return Err(RoadGapError::EmptyInput);
        }

        info!("Analyzing {} polylines", polylines.len());
        let ctx = AnalysisContext::new(&self.config, polylines);
        debug!(
            "Endpoint index: {} nodes, {} dangling",
            ctx.index.node_count(),
            ctx.index.dangling_count()
        );

        let rule = RuleGapDetector::from_config(ctx.config);
        let threshold = rule.estimate_threshold(&ctx.features, &mut warnings);
        let mut detections = rule.detect(&ctx.features, &threshold);

        let anomaly = AnomalyDetector::from_config(ctx.config);
        detections.extend(anomaly.detect(&self.model, &ctx.features, &mut warnings)?);

        let issues = DecisionEngine::from_config(ctx.config).decide(detections);
        let fixes = suggest_fixes(&issues, &ctx.polylines, &ctx.segments, ctx.config.precision);
        let stats = NetworkStats::compute(&ctx.polylines, &ctx.index);

        info!(
            "Found {} issues ({} fixable) across {} polylines",
            issues.len(),
            fixes.len(),
            stats.segment_count
        );

        let AnalysisContext {
            polylines,
            features,
            ..
        } = ctx;

        Ok(AnalysisReport {
            issues,
            fixes,
            features,
            stats,
            threshold,
            warnings,
            polylines,
            precision: self.config.precision,
        })
    }
}
