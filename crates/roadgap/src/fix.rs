//! Snap suggestions for endpoint gaps, and applying them.

use std::collections::HashSet;

use geo::EuclideanDistance;
use geo_types::{Coord, Point};
use tracing::{debug, warn};

use crate::{
    index::{NodeKey, round_coord},
    spatial::SegmentIndex,
    types::{FixSuggestion, Issue, Polyline, PolylineId},
};

/// True nearest point to `point` on any polyline other than `own`.
///
/// Ties go to the lowest polyline id. `None` when there is no other polyline.
pub fn nearest_projection(
    point: Coord<f64>,
    own: PolylineId,
    segments: &SegmentIndex,
) -> Option<(PolylineId, Coord<f64>, f64)> {
    let nearest = segments.nearest_other(point, own)?;
    let projected = nearest.projection(point).unwrap_or(nearest.line.start);
    Some((nearest.polyline_id, projected, nearest.distance))
}

/// One suggestion per issue that names an endpoint, in issue order
pub fn suggest_fixes(
    issues: &[Issue],
    polylines: &[Polyline],
    segments: &SegmentIndex,
    precision: u32,
) -> Vec<FixSuggestion> {
    let fixes: Vec<FixSuggestion> = issues
        .iter()
        .filter_map(|issue| {
            let role = issue.endpoint()?;
            let polyline = polylines.get(issue.polyline_id)?;
            let original = polyline.endpoint(role);
            let (target, projected, _) = nearest_projection(original, polyline.id, segments)?;
            let snapped = round_coord(projected, precision);
            let residual = Point::from(original).euclidean_distance(&Point::from(snapped));

            Some(FixSuggestion {
                polyline_id: polyline.id,
                endpoint: role,
                original: [original.x, original.y],
                snapped: [snapped.x, snapped.y],
                target_polyline: target,
                residual_distance: residual,
            })
        })
        .collect();

    debug!("Suggested {} fixes", fixes.len());
    fixes
}

/// Copy of `polylines` with the fixes applied in order.
///
/// A fix is skipped when its endpoint already sits on the snap point of an
/// earlier fix: two endpoints reaching for each other meet at the first
/// target instead of trading places.
pub fn apply_fixes(polylines: &[Polyline], fixes: &[FixSuggestion], precision: u32) -> Vec<Polyline> {
    let mut corrected = polylines.to_vec();
    let mut snapped_nodes: HashSet<NodeKey> = HashSet::new();

    for fix in fixes {
        let Some(polyline) = corrected.get_mut(fix.polyline_id) else {
            warn!("Fix refers to unknown polyline {}", fix.polyline_id);
            continue;
        };
        let current = polyline.endpoint(fix.endpoint);
        if snapped_nodes.contains(&NodeKey::from_coord(current, precision)) {
            debug!(
                "Polyline {} {} already joined, skipping",
                fix.polyline_id, fix.endpoint
            );
            continue;
        }

        let snapped = Coord {
            x: fix.snapped[0],
            y: fix.snapped[1],
        };
        *polyline = polyline.with_endpoint(fix.endpoint, snapped);
        snapped_nodes.insert(NodeKey::from_coord(snapped, precision));
    }

    corrected
}
