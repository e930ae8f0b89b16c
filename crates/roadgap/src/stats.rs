//! Descriptive statistics with explicit behaviour on empty and single-element
//! inputs, plus the network summary built on top of them.

use geo::BoundingRect;

use crate::{
    index::EndpointIndex,
    types::{Bounds, NetworkStats, Polyline},
};

/// Arithmetic mean. `None` for an empty slice.
pub fn mean(values: &[f64]) -> Option<f64> {
    if values.is_empty() {
        return None;
    }
    Some(values.iter().sum::<f64>() / values.len() as f64)
}

/// Population standard deviation. `None` for an empty slice, `0.0` for one value.
pub fn std_dev(values: &[f64]) -> Option<f64> {
    let mu = mean(values)?;
    let variance = values.iter().map(|v| (v - mu).powi(2)).sum::<f64>() / values.len() as f64;
    Some(variance.sqrt())
}

/// Percentile with linear interpolation between closest ranks.
///
/// `p` is clamped to `[0, 100]`. Returns `None` for an empty slice and the
/// single value for a one-element slice.
pub fn percentile(values: &[f64], p: f64) -> Option<f64> {
    if values.is_empty() {
        return None;
    }
    let mut sorted = values.to_vec();
    sorted.sort_by(|a, b| a.total_cmp(b));

    let rank = (p.clamp(0.0, 100.0) / 100.0) * (sorted.len() - 1) as f64;
    let lo = rank.floor() as usize;
    let hi = rank.ceil() as usize;
    let frac = rank - lo as f64;
    Some(sorted[lo] + (sorted[hi] - sorted[lo]) * frac)
}

impl NetworkStats {
    pub fn compute(polylines: &[Polyline], index: &EndpointIndex) -> Self {
        let lengths: Vec<f64> = polylines.iter().map(Polyline::length).collect();
        let total_length: f64 = lengths.iter().sum();

        let bounds = polylines
            .iter()
            .filter_map(|p| p.line.bounding_rect())
            .map(|rect| Bounds {
                min: [rect.min().x, rect.min().y],
                max: [rect.max().x, rect.max().y],
            })
            .reduce(|a, b| Bounds {
                min: [a.min[0].min(b.min[0]), a.min[1].min(b.min[1])],
                max: [a.max[0].max(b.max[0]), a.max[1].max(b.max[1])],
            });

        Self {
            segment_count: polylines.len(),
            total_length,
            average_length: mean(&lengths).unwrap_or(0.0),
            min_length: lengths.iter().copied().reduce(f64::min).unwrap_or(0.0),
            max_length: lengths.iter().copied().reduce(f64::max).unwrap_or(0.0),
            total_nodes: index.node_count(),
            connected_nodes: index.junction_count(),
            dangling_nodes: index.dangling_count(),
            bounds,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use geo_types::line_string;

    #[test]
    fn test_empty_inputs() {
        assert_eq!(mean(&[]), None);
        assert_eq!(std_dev(&[]), None);
        assert_eq!(percentile(&[], 50.0), None);
    }

    #[test]
    fn test_single_value() {
        assert_eq!(mean(&[4.0]), Some(4.0));
        assert_eq!(std_dev(&[4.0]), Some(0.0));
        assert_eq!(percentile(&[4.0], 75.0), Some(4.0));
    }

    #[test]
    fn test_percentile_interpolates() {
        let values = [10.3, 0.3, 10.0, 0.3];
        // sorted: 0.3, 0.3, 10.0, 10.3; rank 2.25
        let p75 = percentile(&values, 75.0).expect("non-empty");
        assert!((p75 - 10.075).abs() < 1e-9);
        assert_eq!(percentile(&values, 0.0), Some(0.3));
        assert_eq!(percentile(&values, 100.0), Some(10.3));
        assert_eq!(percentile(&values, 250.0), Some(10.3));
    }

    #[test]
    fn test_population_std() {
        let sd = std_dev(&[2.0, 4.0, 4.0, 4.0, 5.0, 5.0, 7.0, 9.0]).expect("non-empty");
        assert!((sd - 2.0).abs() < 1e-12);
    }

    #[test]
    fn test_network_stats() {
        let polylines = vec![
            Polyline::new(0, line_string![(x: 0.0, y: 0.0), (x: 3.0, y: 4.0)]),
            Polyline::new(1, line_string![(x: 3.0, y: 4.0), (x: 3.0, y: 9.0), (x: -1.0, y: 9.0)]),
        ];
        let index = EndpointIndex::build(&polylines, 6);
        let stats = NetworkStats::compute(&polylines, &index);

        assert_eq!(stats.segment_count, 2);
        assert!((stats.total_length - 14.0).abs() < 1e-12);
        assert!((stats.average_length - 7.0).abs() < 1e-12);
        assert!((stats.min_length - 5.0).abs() < 1e-12);
        assert!((stats.max_length - 9.0).abs() < 1e-12);
        assert_eq!(stats.total_nodes, 3);
        assert_eq!(stats.connected_nodes, 1);
        assert_eq!(stats.dangling_nodes, 2);
        assert_eq!(
            stats.bounds,
            Some(Bounds {
                min: [-1.0, 0.0],
                max: [3.0, 9.0]
            })
        );
    }
}
