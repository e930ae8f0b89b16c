use std::sync::LazyLock;

use geo_types::LineString;
use regex::Regex;
use tracing::{debug, warn};
use ::wkt::{ToWkt, TryFromWkt};

use crate::{
    error::ParseError,
    fix::apply_fixes,
    index::NodeKey,
    types::{AnalysisReport, FixSuggestion, Polyline},
};

static LINESTRING_BODY: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)LINESTRING\s*\(([^)]*)\)").expect("LINESTRING pattern is valid")
});

static WHITESPACE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\s+").expect("whitespace pattern is valid"));

/// Result of reading a WKT blob: the accepted polylines and the fragments
/// that were skipped.
#[derive(Debug, Clone, Default)]
pub struct Ingested {
    pub polylines: Vec<Polyline>,
    pub errors: Vec<ParseError>,
}

/// Extract every `LINESTRING(...)` from `text`.
///
/// The keyword is matched case-insensitively and coordinate lists may span
/// several lines. Fragments that fail to parse or are degenerate are reported
/// in [`Ingested::errors`] and do not stop the scan. Ids follow first-seen
/// order among accepted fragments.
pub fn parse_network(text: &str, precision: u32) -> Ingested {
    let mut ingested = Ingested::default();

    for (fragment, caps) in LINESTRING_BODY.captures_iter(text).enumerate() {
        let body = WHITESPACE.replace_all(caps[1].trim(), " ");
        let normalized = format!("LINESTRING({})", body);

        let line = match LineString::<f64>::try_from_wkt_str(&normalized) {
            Ok(line) => line,
            Err(e) => {
                let error = ParseError {
                    fragment,
                    reason: format!("invalid WKT: {}", e),
                };
                warn!("Could not parse geometry: {}", error);
                ingested.errors.push(error);
                continue;
            }
        };

        match validate_line(&line, precision) {
            Ok(()) => {
                let id = ingested.polylines.len();
                ingested.polylines.push(Polyline::new(id, line));
            }
            Err(reason) => {
                let error = ParseError { fragment, reason };
                warn!("Rejected geometry: {}", error);
                ingested.errors.push(error);
            }
        }
    }

    debug!(
        "Parsed {} polylines, skipped {} fragments",
        ingested.polylines.len(),
        ingested.errors.len()
    );
    ingested
}

/// Accept already-built line strings, applying the same checks as text input
pub fn ingest_lines(lines: Vec<LineString<f64>>, precision: u32) -> Ingested {
    let mut ingested = Ingested::default();
    for (fragment, line) in lines.into_iter().enumerate() {
        match validate_line(&line, precision) {
            Ok(()) => {
                let id = ingested.polylines.len();
                ingested.polylines.push(Polyline::new(id, line));
            }
            Err(reason) => ingested.errors.push(ParseError { fragment, reason }),
        }
    }
    ingested
}

/// A usable road segment is a finite, open curve of nonzero length with at
/// least two vertices.
fn validate_line(line: &LineString<f64>, precision: u32) -> Result<(), String> {
    use geo::EuclideanLength;

    if line.0.len() < 2 {
        return Err(format!("expected at least 2 vertices, found {}", line.0.len()));
    }
    if line.0.iter().any(|c| !c.x.is_finite() || !c.y.is_finite()) {
        return Err("non-finite coordinate".to_string());
    }
    if line.0.iter().any(|c| NodeKey::checked(*c, precision).is_none()) {
        return Err(format!("coordinate out of range at precision {precision}"));
    }
    let length = line.euclidean_length();
    if !(length > 0.0) {
        return Err("zero-length geometry".to_string());
    }
    let first = NodeKey::from_coord(line.0[0], precision);
    let last = NodeKey::from_coord(line.0[line.0.len() - 1], precision);
    if first == last {
        return Err("closed ring, expected an open curve".to_string());
    }
    Ok(())
}

/// Serialize polylines back to text, one `LINESTRING` per line in id order
pub fn write_network(polylines: &[Polyline]) -> String {
    polylines
        .iter()
        .map(|p| p.line.wkt_string())
        .collect::<Vec<_>>()
        .join("\n")
}

/// Corrected export: every polyline, with snapped endpoints replaced
pub fn corrected_wkt(polylines: &[Polyline], fixes: &[FixSuggestion], precision: u32) -> String {
    write_network(&apply_fixes(polylines, fixes, precision))
}

impl AnalysisReport {
    /// Re-serialize the analysed network with every fix applied
    pub fn corrected_wkt(&self) -> String {
        corrected_wkt(&self.polylines, &self.fixes, self.precision)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parses_multiline_mixed_case() {
        let text = "linestring(0 0,\n   10 0)\nLineString (10 0, 20\t0, 30 5)";
        let ingested = parse_network(text, 6);

        assert!(ingested.errors.is_empty());
        assert_eq!(ingested.polylines.len(), 2);
        assert_eq!(ingested.polylines[0].id, 0);
        assert_eq!(ingested.polylines[1].id, 1);
        assert_eq!(ingested.polylines[1].vertex_count(), 3);
        assert_eq!(ingested.polylines[1].end().x, 30.0);
    }

    #[test]
    fn test_bad_fragments_are_skipped() {
        let text = "LINESTRING(0 0, 1 1)\n\
                    LINESTRING(5 5)\n\
                    LINESTRING(a b, c d)\n\
                    LINESTRING(2 2, 2 2)\n\
                    LINESTRING(0 0, 4 0, 4 4, 0 0)\n\
                    LINESTRING(9 9, 10 10)";
        let ingested = parse_network(text, 6);

        assert_eq!(ingested.polylines.len(), 2);
        assert_eq!(ingested.polylines[1].start().x, 9.0);
        assert_eq!(ingested.polylines[1].id, 1);

        let fragments: Vec<usize> = ingested.errors.iter().map(|e| e.fragment).collect();
        assert_eq!(fragments, vec![1, 2, 3, 4]);
    }

    #[test]
    fn test_far_coordinates_stay_open_curves() {
        let text = "LINESTRING(10000000000000 0, 20000000000000 0)\n\
                    LINESTRING(30000000000000 0, 40000000000000 0)";
        let ingested = parse_network(text, 6);
        assert!(ingested.errors.is_empty());
        assert_eq!(ingested.polylines.len(), 2);
    }

    #[test]
    fn test_unrepresentable_coordinates_are_rejected() {
        let huge = format!("1{}", "0".repeat(40));
        let text = format!("LINESTRING({huge} 0, 2{} 0)\nLINESTRING(0 0, 1 0)", "0".repeat(40));
        let ingested = parse_network(&text, 6);

        assert_eq!(ingested.polylines.len(), 1);
        assert_eq!(ingested.errors.len(), 1);
        assert_eq!(ingested.errors[0].fragment, 0);
        assert!(ingested.errors[0].reason.contains("out of range"));
    }

    #[test]
    fn test_no_geometry() {
        let ingested = parse_network("POINT(1 2)\nnothing here", 6);
        assert!(ingested.polylines.is_empty());
        assert!(ingested.errors.is_empty());
    }

    #[test]
    fn test_write_network_round_trips_through_parser() {
        let ingested = parse_network("LINESTRING(0 0, 10.5 0, 10.5 -3.25)", 6);
        let text = write_network(&ingested.polylines);
        let reparsed = parse_network(&text, 6);
        assert_eq!(reparsed.polylines, ingested.polylines);
    }
}
