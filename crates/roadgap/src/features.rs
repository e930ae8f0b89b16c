//! Per-polyline feature extraction.
//!
//! The endpoint gap scan is the expensive part: every endpoint is measured
//! against the curve of every other polyline through the segment R-tree.

use rayon::prelude::*;

use crate::{
    index::EndpointIndex,
    spatial::SegmentIndex,
    types::{EndpointRole, FeatureRecord, Polyline},
};

/// Compute one [`FeatureRecord`] per polyline, in id order
pub fn extract_features(
    polylines: &[Polyline],
    index: &EndpointIndex,
    segments: &SegmentIndex,
) -> Vec<FeatureRecord> {
    let nearest_curve = |point, own| match segments.nearest_other(point, own) {
        Some(nearest) => (nearest.distance, Some(nearest.polyline_id)),
        None => (f64::INFINITY, None),
    };

    polylines
        .par_iter()
        .map(|polyline| {
            let length = polyline.length();
            let vertex_count = polyline.vertex_count();
            let start = polyline.start();
            let end = polyline.end();

            let (start_gap, start_nearest) = nearest_curve(start, polyline.id);
            let (end_gap, end_nearest) = nearest_curve(end, polyline.id);

            FeatureRecord {
                polyline_id: polyline.id,
                length,
                vertex_count,
                vertex_density: vertex_count as f64 / length,
                start: [start.x, start.y],
                end: [end.x, end.y],
                start_degree: index.degree_at(polyline.endpoint(EndpointRole::Start)),
                end_degree: index.degree_at(polyline.endpoint(EndpointRole::End)),
                start_gap,
                end_gap,
                start_nearest,
                end_nearest,
                connectivity_score: start_gap.min(end_gap),
            }
        })
        .collect()
}
