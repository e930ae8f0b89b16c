use rand::{Rng, SeedableRng, rngs::StdRng, seq::index};
use rayon::prelude::*;

use crate::{
    config::ForestConfig,
    error::{Result, RoadGapError},
    stats,
    traits::OutlierModel,
};

const EULER_GAMMA: f64 = 0.577_215_664_901_532_9;

/// Isolation forest: anomalies are the points that random axis-aligned splits
/// separate from the rest in the fewest steps.
#[derive(Debug, Clone, PartialEq)]
pub struct IsolationForest {
    pub trees: usize,
    pub max_samples: usize,
    pub seed: u64,
}

impl Default for IsolationForest {
    fn default() -> Self {
        Self::from(&ForestConfig::default())
    }
}

impl From<&ForestConfig> for IsolationForest {
    fn from(config: &ForestConfig) -> Self {
        Self {
            trees: config.trees,
            max_samples: config.max_samples,
            seed: config.seed,
        }
    }
}

#[derive(Debug, Clone)]
enum TreeNode {
    Leaf {
        size: usize,
    },
    Split {
        feature: usize,
        threshold: f64,
        left: usize,
        right: usize,
    },
}

#[derive(Debug, Clone)]
struct IsolationTree {
    nodes: Vec<TreeNode>,
}

/// A fitted forest plus the offset that turns raw scores into decisions.
#[derive(Debug, Clone)]
pub struct FittedForest {
    trees: Vec<IsolationTree>,
    sample_size: usize,
    dims: usize,
    offset: f64,
}

impl FittedForest {
    /// Raw score in (0, 1]; values near 1 are isolated quickly
    fn raw_score(&self, sample: &[f64]) -> f64 {
        let mean_path = self
            .trees
            .iter()
            .map(|tree| tree.path_length(sample))
            .sum::<f64>()
            / self.trees.len() as f64;
        let norm = average_path_length(self.sample_size);
        if norm <= 0.0 {
            return 0.5;
        }
        2f64.powf(-mean_path / norm)
    }

    pub fn offset(&self) -> f64 {
        self.offset
    }
}

/// Expected path length of an unsuccessful BST search over `n` points
fn average_path_length(n: usize) -> f64 {
    match n {
        0 | 1 => 0.0,
        2 => 1.0,
        _ => {
            let n = n as f64;
            2.0 * ((n - 1.0).ln() + EULER_GAMMA) - 2.0 * (n - 1.0) / n
        }
    }
}

impl IsolationTree {
    fn grow(samples: &[Vec<f64>], rows: Vec<usize>, max_depth: usize, rng: &mut StdRng) -> Self {
        let mut nodes = Vec::new();
        Self::grow_node(samples, rows, 0, max_depth, rng, &mut nodes);
        Self { nodes }
    }

    fn grow_node(
        samples: &[Vec<f64>],
        rows: Vec<usize>,
        depth: usize,
        max_depth: usize,
        rng: &mut StdRng,
        nodes: &mut Vec<TreeNode>,
    ) -> usize {
        let id = nodes.len();
        nodes.push(TreeNode::Leaf { size: rows.len() });
        if depth >= max_depth || rows.len() <= 1 {
            return id;
        }

        // Only features that still vary inside this node can split it
        let dims = samples[rows[0]].len();
        let splittable: Vec<(usize, f64, f64)> = (0..dims)
            .filter_map(|feature| {
                let (lo, hi) = rows.iter().fold((f64::INFINITY, f64::NEG_INFINITY), |(lo, hi), &r| {
                    let v = samples[r][feature];
                    (lo.min(v), hi.max(v))
                });
                (hi > lo).then_some((feature, lo, hi))
            })
            .collect();
        if splittable.is_empty() {
            return id;
        }

        let (feature, lo, hi) = splittable[rng.random_range(0..splittable.len())];
        let threshold = rng.random_range(lo..hi);
        let (left_rows, right_rows): (Vec<usize>, Vec<usize>) =
            rows.into_iter().partition(|&r| samples[r][feature] <= threshold);

        let left = Self::grow_node(samples, left_rows, depth + 1, max_depth, rng, nodes);
        let right = Self::grow_node(samples, right_rows, depth + 1, max_depth, rng, nodes);
        nodes[id] = TreeNode::Split {
            feature,
            threshold,
            left,
            right,
        };
        id
    }

    fn path_length(&self, sample: &[f64]) -> f64 {
        let mut node = 0;
        let mut depth = 0.0;
        loop {
            match &self.nodes[node] {
                TreeNode::Leaf { size } => return depth + average_path_length(*size),
                TreeNode::Split {
                    feature,
                    threshold,
                    left,
                    right,
                } => {
                    node = if sample[*feature] <= *threshold { *left } else { *right };
                    depth += 1.0;
                }
            }
        }
    }
}

fn check_dims(samples: &[Vec<f64>], dims: usize) -> Result<()> {
    if let Some(row) = samples.iter().find(|row| row.len() != dims) {
        return Err(RoadGapError::Model(format!(
            "expected {} features per sample, found {}",
            dims,
            row.len()
        )));
    }
    Ok(())
}

impl OutlierModel for IsolationForest {
    type Fitted = FittedForest;

    fn fit(&self, samples: &[Vec<f64>], contamination: f64) -> Result<FittedForest> {
        let n = samples.len();
        if n == 0 {
            return Err(RoadGapError::Model("cannot fit on zero samples".to_string()));
        }
        if self.trees == 0 {
            return Err(RoadGapError::Model("forest needs at least one tree".to_string()));
        }
        let dims = samples[0].len();
        check_dims(samples, dims)?;

        let sample_size = self.max_samples.min(n).max(1);
        let max_depth = (sample_size as f64).log2().ceil().max(0.0) as usize;

        // One seeded stream per tree keeps the forest independent of scheduling
        let trees: Vec<IsolationTree> = (0..self.trees)
            .into_par_iter()
            .map(|t| {
                let mut rng = StdRng::seed_from_u64(self.seed.wrapping_add(t as u64));
                let rows = index::sample(&mut rng, n, sample_size).into_vec();
                IsolationTree::grow(samples, rows, max_depth, &mut rng)
            })
            .collect();

        let mut fitted = FittedForest {
            trees,
            sample_size,
            dims,
            offset: 0.0,
        };

        let raw: Vec<f64> = samples.par_iter().map(|s| fitted.raw_score(s)).collect();
        let cutoff = 100.0 * (1.0 - contamination.clamp(0.0, 1.0));
        fitted.offset = stats::percentile(&raw, cutoff).unwrap_or(0.5);
        Ok(fitted)
    }

    fn score(&self, fitted: &FittedForest, samples: &[Vec<f64>]) -> Result<Vec<f64>> {
        check_dims(samples, fitted.dims)?;
        Ok(samples
            .par_iter()
            .map(|s| fitted.raw_score(s) - fitted.offset)
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn cluster_with_outlier() -> Vec<Vec<f64>> {
        let mut samples: Vec<Vec<f64>> = (0..30)
            .map(|i| {
                let t = i as f64;
                vec![(t * 0.37).sin() * 0.5, (t * 0.71).cos() * 0.5]
            })
            .collect();
        samples.push(vec![25.0, -30.0]);
        samples
    }

    #[test]
    fn test_average_path_length() {
        assert_eq!(average_path_length(1), 0.0);
        assert_eq!(average_path_length(2), 1.0);
        let c256 = average_path_length(256);
        assert!(c256 > 10.0 && c256 < 11.0);
    }

    #[test]
    fn test_outlier_scores_highest() {
        let samples = cluster_with_outlier();
        let forest = IsolationForest::default();
        let fitted = forest.fit(&samples, 0.05).expect("Should fit");
        let scores = forest.score(&fitted, &samples).expect("Should score");

        let (best, _) = scores
            .iter()
            .enumerate()
            .max_by(|a, b| a.1.total_cmp(b.1))
            .expect("non-empty");
        assert_eq!(best, samples.len() - 1);
        assert!(scores[best] > 0.0);

        let flagged = scores.iter().filter(|s| **s > 0.0).count();
        assert!(flagged >= 1 && flagged <= 2);
    }

    #[test]
    fn test_fit_is_deterministic() {
        let samples = cluster_with_outlier();
        let forest = IsolationForest {
            trees: 25,
            max_samples: 16,
            seed: 9,
        };
        let a = forest.score(&forest.fit(&samples, 0.1).expect("fit"), &samples).expect("score");
        let b = forest.score(&forest.fit(&samples, 0.1).expect("fit"), &samples).expect("score");
        assert_eq!(a, b);
    }

    #[test]
    fn test_constant_samples_do_not_split() {
        let samples = vec![vec![1.0, 2.0]; 8];
        let forest = IsolationForest::default();
        let fitted = forest.fit(&samples, 0.15).expect("Should fit");
        let scores = forest.score(&fitted, &samples).expect("Should score");
        assert!(scores.iter().all(|s| *s == 0.0));
    }

    #[test]
    fn test_mismatched_dimensions() {
        let forest = IsolationForest::default();
        let err = forest
            .fit(&[vec![1.0, 2.0], vec![1.0]], 0.1)
            .expect_err("ragged rows should fail");
        assert!(matches!(err, RoadGapError::Model(_)));
        assert!(forest.fit(&[], 0.1).is_err());
    }
}
