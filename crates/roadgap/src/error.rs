use serde::Serialize;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum RoadGapError {
    #[error("No valid polylines found in input")]
    EmptyInput,

    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    #[error("Outlier model error: {0}")]
    Model(String),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("TOML error: {0}")]
    TomlDe(#[from] toml::de::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Unsupported file format. Please use .toml or .json files")]
    UnsupportedFileFormat,
}

pub type Result<T> = std::result::Result<T, RoadGapError>;

/// A single input fragment that could not be turned into a polyline.
#[derive(Error, Debug, Clone, PartialEq, Serialize)]
#[error("fragment {fragment}: {reason}")]
pub struct ParseError {
    /// Position of the fragment in the input, counting every `LINESTRING` seen
    pub fragment: usize,
    pub reason: String,
}

/// Conditions that degrade an analysis without failing it.
#[derive(Error, Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum AnalysisWarning {
    #[error("skipped geometry, {0}")]
    Parse(ParseError),

    #[error("anomaly stage skipped: {count} polylines, at least {required} required")]
    InsufficientSamples { count: usize, required: usize },

    #[error("mean polyline length is degenerate, using fallback threshold {fallback}")]
    DegenerateThreshold { fallback: f64 },
}
