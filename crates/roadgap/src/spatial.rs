//! R-tree over polyline segments for nearest-curve queries.
//!
//! Segments come back in order of squared distance, so a query stops at the
//! first segment of another polyline plus anything tied with it. The result
//! matches an exhaustive scan: the smallest distance, lowest polyline id.

use geo::{Closest, ClosestPoint, EuclideanDistance};
use geo_types::{Coord, Line, Point};
use rstar::{AABB, PointDistance, RTree, RTreeObject};

use crate::types::{Polyline, PolylineId};

struct SegmentEntry {
    polyline_id: PolylineId,
    segment: usize,
    line: Line<f64>,
}

impl RTreeObject for SegmentEntry {
    type Envelope = AABB<[f64; 2]>;

    fn envelope(&self) -> Self::Envelope {
        AABB::from_corners(
            [self.line.start.x, self.line.start.y],
            [self.line.end.x, self.line.end.y],
        )
    }
}

impl PointDistance for SegmentEntry {
    fn distance_2(&self, point: &[f64; 2]) -> f64 {
        let d = Point::new(point[0], point[1]).euclidean_distance(&self.line);
        d * d
    }
}

/// Closest segment of another polyline to a query point.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct NearestSegment {
    pub polyline_id: PolylineId,
    pub line: Line<f64>,
    pub distance: f64,
}

impl NearestSegment {
    /// True nearest point on the segment
    pub fn projection(&self, point: Coord<f64>) -> Option<Coord<f64>> {
        match self.line.closest_point(&Point::from(point)) {
            Closest::Intersection(q) | Closest::SinglePoint(q) => Some(q.0),
            Closest::Indeterminate => None,
        }
    }
}

pub struct SegmentIndex {
    tree: RTree<SegmentEntry>,
}

impl SegmentIndex {
    pub fn build(polylines: &[Polyline]) -> Self {
        let entries: Vec<SegmentEntry> = polylines
            .iter()
            .flat_map(|p| {
                p.line.lines().enumerate().map(|(segment, line)| SegmentEntry {
                    polyline_id: p.id,
                    segment,
                    line,
                })
            })
            .collect();
        Self {
            tree: RTree::bulk_load(entries),
        }
    }

    pub fn segment_count(&self) -> usize {
        self.tree.size()
    }

    /// Nearest segment belonging to any polyline other than `own`
    pub fn nearest_other(&self, point: Coord<f64>, own: PolylineId) -> Option<NearestSegment> {
        let p = Point::from(point);
        let mut cutoff: Option<f64> = None;
        let mut best: Option<((f64, PolylineId, usize), Line<f64>)> = None;

        for (entry, d2) in self.tree.nearest_neighbor_iter_with_distance_2(&[point.x, point.y]) {
            if entry.polyline_id == own {
                continue;
            }
            // Keep every segment tied at the first squared distance
            match cutoff {
                Some(limit) if d2 > limit => break,
                Some(_) => {}
                None => cutoff = Some(d2),
            }
            let rank = (p.euclidean_distance(&entry.line), entry.polyline_id, entry.segment);
            if best.is_none_or(|(best_rank, _)| rank < best_rank) {
                best = Some((rank, entry.line));
            }
        }

        best.map(|((distance, polyline_id, _), line)| NearestSegment {
            polyline_id,
            line,
            distance,
        })
    }
}
