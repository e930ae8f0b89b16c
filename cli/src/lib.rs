use std::{fs, path::Path};

use roadgap::{AnalysisConfig, AnalysisReport, RoadGapError, Severity};
use thiserror::Error;

#[derive(Error, Debug)]
pub enum CliError {
    #[error(transparent)]
    Analysis(#[from] RoadGapError),
    #[error(transparent)]
    SerdeError(#[from] serde_json::Error),
    #[error(transparent)]
    IoError(#[from] std::io::Error),
}

/// Command-line settings that take precedence over the configuration file
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ConfigOverrides {
    pub precision: Option<u32>,
    pub contamination: Option<f64>,
}

/// Defaults, then the optional `.toml`/`.json` file, then flag overrides.
/// The result is validated.
pub fn resolve_config(path: Option<&Path>, overrides: &ConfigOverrides) -> Result<AnalysisConfig, CliError> {
    let mut config = match path {
        Some(path) => AnalysisConfig::from_file(path)?,
        None => AnalysisConfig::default(),
    };
    if let Some(precision) = overrides.precision {
        config.precision = precision;
    }
    if let Some(contamination) = overrides.contamination {
        config.contamination = contamination;
    }
    config.validate()?;
    Ok(config)
}

/// One line per issue, most confident first
pub fn issue_lines(report: &AnalysisReport) -> Vec<String> {
    report
        .issues
        .iter()
        .map(|issue| {
            let location = match issue.gap() {
                Some(gap) => format!(
                    "{} at ({}, {}) gap {:.6} {}",
                    gap.endpoint, gap.coord[0], gap.coord[1], gap.gap_distance, gap.class
                ),
                None => format!("segment score {:.4}", issue.anomaly_score().unwrap_or_default()),
            };
            format!(
                "[{}] polyline {} {} ({}, confidence {:.2})",
                issue.severity,
                issue.polyline_id,
                location,
                issue.source(),
                issue.confidence
            )
        })
        .collect()
}

pub fn severity_summary(report: &AnalysisReport) -> String {
    format!(
        "{} issues: {} HIGH, {} MEDIUM, {} LOW",
        report.issues.len(),
        report.count_by_severity(Severity::High),
        report.count_by_severity(Severity::Medium),
        report.count_by_severity(Severity::Low)
    )
}

/// Save the full report as pretty JSON
pub fn write_report<P: AsRef<Path>>(report: &AnalysisReport, path: P) -> Result<(), CliError> {
    fs::write(path, serde_json::to_string_pretty(report)?)?;
    Ok(())
}

/// Save the network with every fix applied
pub fn write_corrected<P: AsRef<Path>>(report: &AnalysisReport, path: P) -> Result<(), CliError> {
    fs::write(path, report.corrected_wkt())?;
    Ok(())
}
