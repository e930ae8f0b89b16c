//! Endpoint index: which polylines start or end at each rounded coordinate.

use std::collections::HashMap;

use geo_types::Coord;
use serde::Serialize;

use crate::types::{EndpointRole, Polyline, PolylineId};

/// A coordinate rounded to a fixed number of fractional digits, stored as
/// scaled integers so that node identity never depends on float hashing.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
pub struct NodeKey {
    pub x: i128,
    pub y: i128,
}

impl NodeKey {
    /// Key for a coordinate already known to fit, see [`NodeKey::checked`]
    pub fn from_coord(coord: Coord<f64>, precision: u32) -> Self {
        let scale = scale(precision);
        Self {
            x: (coord.x * scale).round() as i128,
            y: (coord.y * scale).round() as i128,
        }
    }

    /// `None` when a scaled component does not fit in an `i128`. The plain
    /// cast saturates, which would merge distinct far-away nodes.
    pub fn checked(coord: Coord<f64>, precision: u32) -> Option<Self> {
        let scale = scale(precision);
        Some(Self {
            x: scaled_component(coord.x, scale)?,
            y: scaled_component(coord.y, scale)?,
        })
    }

    pub fn to_coord(self, precision: u32) -> Coord<f64> {
        let scale = scale(precision);
        Coord {
            x: self.x as f64 / scale,
            y: self.y as f64 / scale,
        }
    }
}

fn scale(precision: u32) -> f64 {
    10f64.powi(precision as i32)
}

fn scaled_component(value: f64, scale: f64) -> Option<i128> {
    let scaled = (value * scale).round();
    // i128::MAX as f64 is 2^127, the first value out of range
    (scaled.is_finite() && scaled.abs() < i128::MAX as f64).then_some(scaled as i128)
}

/// Round a coordinate to `precision` fractional digits
pub fn round_coord(coord: Coord<f64>, precision: u32) -> Coord<f64> {
    NodeKey::from_coord(coord, precision).to_coord(precision)
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Registration {
    pub polyline_id: PolylineId,
    pub role: EndpointRole,
}

#[derive(Debug, Clone)]
pub struct EndpointIndex {
    precision: u32,
    nodes: HashMap<NodeKey, Vec<Registration>>,
}

impl EndpointIndex {
    pub fn build(polylines: &[Polyline], precision: u32) -> Self {
        let mut nodes: HashMap<NodeKey, Vec<Registration>> = HashMap::new();

        for polyline in polylines {
            for role in EndpointRole::BOTH {
                let key = NodeKey::from_coord(polyline.endpoint(role), precision);
                nodes.entry(key).or_default().push(Registration {
                    polyline_id: polyline.id,
                    role,
                });
            }
        }

        Self { precision, nodes }
    }

    pub fn precision(&self) -> u32 {
        self.precision
    }

    pub fn key(&self, coord: Coord<f64>) -> NodeKey {
        NodeKey::from_coord(coord, self.precision)
    }

    pub fn registrations(&self, key: &NodeKey) -> &[Registration] {
        self.nodes.get(key).map(Vec::as_slice).unwrap_or(&[])
    }

    pub fn degree(&self, key: &NodeKey) -> usize {
        self.registrations(key).len()
    }

    pub fn degree_at(&self, coord: Coord<f64>) -> usize {
        self.degree(&self.key(coord))
    }

    pub fn is_dangling(&self, coord: Coord<f64>) -> bool {
        self.degree_at(coord) == 1
    }

    /// Number of distinct endpoint nodes
    pub fn node_count(&self) -> usize {
        self.nodes.len()
    }

    pub fn dangling_count(&self) -> usize {
        self.nodes.values().filter(|regs| regs.len() == 1).count()
    }

    pub fn junction_count(&self) -> usize {
        self.nodes.values().filter(|regs| regs.len() >= 2).count()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use geo_types::line_string;

    fn polylines(lines: Vec<geo_types::LineString<f64>>) -> Vec<Polyline> {
        lines
            .into_iter()
            .enumerate()
            .map(|(id, line)| Polyline::new(id, line))
            .collect()
    }

    #[test]
    fn test_shared_endpoint_is_junction() {
        let lines = polylines(vec![
            line_string![(x: 0.0, y: 0.0), (x: 10.0, y: 0.0)],
            line_string![(x: 10.0, y: 0.0), (x: 20.0, y: 0.0)],
        ]);
        let index = EndpointIndex::build(&lines, 6);

        assert_eq!(index.degree_at(Coord { x: 10.0, y: 0.0 }), 2);
        assert!(index.is_dangling(Coord { x: 0.0, y: 0.0 }));
        assert_eq!(index.node_count(), 3);
        assert_eq!(index.junction_count(), 1);
        assert_eq!(index.dangling_count(), 2);
    }

    #[test]
    fn test_rounding_absorbs_float_noise() {
        let lines = polylines(vec![
            line_string![(x: 0.0, y: 0.0), (x: 1.0000000001, y: 2.0)],
            line_string![(x: 0.9999999999, y: 2.0), (x: 5.0, y: 5.0)],
        ]);
        let index = EndpointIndex::build(&lines, 6);
        assert_eq!(index.degree_at(Coord { x: 1.0, y: 2.0 }), 2);

        // Genuinely distinct nodes stay apart
        let coarse = polylines(vec![
            line_string![(x: 0.0, y: 0.0), (x: 1.00001, y: 2.0)],
            line_string![(x: 1.0, y: 2.0), (x: 5.0, y: 5.0)],
        ]);
        let index = EndpointIndex::build(&coarse, 6);
        assert_eq!(index.degree_at(Coord { x: 1.0, y: 2.0 }), 1);
    }

    #[test]
    fn test_degrees_match_brute_force() {
        let lines = polylines(vec![
            line_string![(x: 0.0, y: 0.0), (x: 1.0, y: 1.0)],
            line_string![(x: 1.0, y: 1.0), (x: 2.0, y: 0.0)],
            line_string![(x: 1.0, y: 1.0), (x: 1.0, y: 3.0), (x: 0.0, y: 0.0)],
            line_string![(x: 7.5, y: -2.25), (x: 2.0, y: 0.0)],
        ]);
        let index = EndpointIndex::build(&lines, 6);

        let all_keys: Vec<NodeKey> = lines
            .iter()
            .flat_map(|p| [p.start(), p.end()])
            .map(|c| NodeKey::from_coord(c, 6))
            .collect();

        for polyline in &lines {
            for role in EndpointRole::BOTH {
                let key = NodeKey::from_coord(polyline.endpoint(role), 6);
                let brute = all_keys.iter().filter(|k| **k == key).count();
                assert_eq!(index.degree(&key), brute);
            }
        }
    }

    #[test]
    fn test_far_coordinates_keep_distinct_keys() {
        // Beyond i64 once scaled by 10^6
        let a = NodeKey::checked(Coord { x: 2.0e13, y: 0.0 }, 6).expect("Should fit");
        let b = NodeKey::checked(Coord { x: 3.0e13, y: 0.0 }, 6).expect("Should fit");
        assert_ne!(a, b);
        assert_eq!(a.x, 20_000_000_000_000_000_000);
        assert_eq!(a, NodeKey::from_coord(Coord { x: 2.0e13, y: 0.0 }, 6));
    }

    #[test]
    fn test_checked_key_rejects_unrepresentable() {
        assert!(NodeKey::checked(Coord { x: 1.0e33, y: 0.0 }, 6).is_none());
        assert!(NodeKey::checked(Coord { x: 0.0, y: -1.0e33 }, 6).is_none());
        assert!(NodeKey::checked(Coord { x: f64::MAX, y: 0.0 }, 0).is_none());
        assert!(NodeKey::checked(Coord { x: 1.0e33, y: 0.0 }, 0).is_some());
    }

    #[test]
    fn test_checked_key_accepts_projected_coordinates() {
        let utm = Coord { x: 500_000.123456, y: 9_999_999.654321 };
        let key = NodeKey::checked(utm, 12).expect("Projected metres fit at precision 12");
        assert_eq!(key, NodeKey::from_coord(utm, 12));
        assert_eq!(NodeKey::from_coord(utm, 6).y, 9_999_999_654_321);
    }

    #[test]
    fn test_round_coord() {
        let rounded = round_coord(Coord { x: 1.23456789, y: -0.0000004 }, 6);
        assert_eq!(rounded.x, 1.234568);
        assert_eq!(rounded.y, 0.0);
    }
}
