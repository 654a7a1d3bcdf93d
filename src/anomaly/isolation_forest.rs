//! Isolation forest outlier model
//!
//! Points that are easy to isolate with random axis-aligned splits sit on
//! short paths and score as outliers. Trees are stored as flat node arenas so
//! a fitted forest serializes to plain JSON.

use rand::rngs::StdRng;
use rand::seq::index;
use rand::{Rng, SeedableRng};
use serde::{Deserialize, Serialize};
use statrs::statistics::{Data, OrderStatistics};

/// Euler–Mascheroni constant.
const EULER_GAMMA: f64 = 0.577_215_664_901_532_9;

/// Forest hyper-parameters.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ForestParams {
    pub n_estimators: usize,
    pub max_samples: usize,
    pub contamination: f64,
    pub seed: u64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "node", rename_all = "snake_case")]
enum Node {
    Split {
        feature: usize,
        threshold: f64,
        left: usize,
        right: usize,
    },
    Leaf {
        size: usize,
    },
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
struct IsolationTree {
    nodes: Vec<Node>,
}

impl IsolationTree {
    fn grow(data: &[Vec<f64>], rows: Vec<usize>, max_depth: usize, rng: &mut StdRng) -> Self {
        let mut tree = Self { nodes: Vec::new() };
        tree.build(data, rows, 0, max_depth, rng);
        tree
    }

    /// Append the subtree for `rows` and return its root index.
    fn build(
        &mut self,
        data: &[Vec<f64>],
        rows: Vec<usize>,
        depth: usize,
        max_depth: usize,
        rng: &mut StdRng,
    ) -> usize {
        let id = self.nodes.len();
        if depth >= max_depth || rows.len() <= 1 {
            self.nodes.push(Node::Leaf { size: rows.len() });
            return id;
        }

        let n_features = data[rows[0]].len();
        let candidates: Vec<(usize, f64, f64)> = (0..n_features)
            .filter_map(|f| {
                let (lo, hi) = rows.iter().fold((f64::INFINITY, f64::NEG_INFINITY), |(lo, hi), &r| {
                    (lo.min(data[r][f]), hi.max(data[r][f]))
                });
                (lo < hi).then_some((f, lo, hi))
            })
            .collect();

        if candidates.is_empty() {
            self.nodes.push(Node::Leaf { size: rows.len() });
            return id;
        }

        let (feature, lo, hi) = candidates[rng.gen_range(0..candidates.len())];
        let threshold = lo + rng.gen::<f64>() * (hi - lo);
        let (left_rows, right_rows): (Vec<usize>, Vec<usize>) =
            rows.into_iter().partition(|&r| data[r][feature] <= threshold);

        // Placeholder, patched once both children exist
        self.nodes.push(Node::Leaf { size: 0 });
        let left = self.build(data, left_rows, depth + 1, max_depth, rng);
        let right = self.build(data, right_rows, depth + 1, max_depth, rng);
        self.nodes[id] = Node::Split {
            feature,
            threshold,
            left,
            right,
        };
        id
    }

    fn path_length(&self, point: &[f64]) -> f64 {
        let mut node = 0;
        let mut depth = 0.0;
        loop {
            match self.nodes[node] {
                Node::Split {
                    feature,
                    threshold,
                    left,
                    right,
                } => {
                    node = if point[feature] <= threshold { left } else { right };
                    depth += 1.0;
                }
                Node::Leaf { size } => return depth + average_path_length(size),
            }
        }
    }
}

/// Average path length of an unsuccessful BST search over `n` points.
pub fn average_path_length(n: usize) -> f64 {
    match n {
        0 | 1 => 0.0,
        2 => 1.0,
        _ => {
            let n = n as f64;
            2.0 * ((n - 1.0).ln() + EULER_GAMMA) - 2.0 * (n - 1.0) / n
        }
    }
}

/// Quantile `q` in [0, 1] with linear interpolation between order
/// statistics (numpy's default estimator). NaN for an empty input.
pub fn linear_quantile(values: Vec<f64>, q: f64) -> f64 {
    let n = values.len();
    if n == 0 {
        return f64::NAN;
    }
    let mut data = Data::new(values);
    let h = (n - 1) as f64 * q.clamp(0.0, 1.0);
    let lo = h.floor() as usize;
    let frac = h - lo as f64;
    let below = data.order_statistic(lo + 1);
    if frac == 0.0 || lo + 1 >= n {
        return below;
    }
    let above = data.order_statistic(lo + 2);
    below + frac * (above - below)
}

/// A fitted isolation forest with its decision offset.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IsolationForest {
    trees: Vec<IsolationTree>,
    sample_size: usize,
    offset: f64,
}

impl IsolationForest {
    /// Fit on row-major `data`. Every row must have the same width.
    ///
    /// Deterministic for identical data and seed.
    pub fn fit(data: &[Vec<f64>], params: ForestParams) -> Self {
        let n = data.len();
        let sample_size = params.max_samples.min(n).max(1);
        let max_depth = (sample_size as f64).log2().ceil().max(0.0) as usize;
        let mut rng = StdRng::seed_from_u64(params.seed);

        let trees = (0..params.n_estimators)
            .map(|_| {
                let rows = if n == 0 {
                    Vec::new()
                } else {
                    index::sample(&mut rng, n, sample_size).into_vec()
                };
                IsolationTree::grow(data, rows, max_depth, &mut rng)
            })
            .collect();

        let mut forest = Self {
            trees,
            sample_size,
            offset: 0.0,
        };

        let training: Vec<f64> = data.iter().map(|x| forest.score_sample(x)).collect();
        forest.offset = if training.is_empty() {
            -0.5
        } else {
            linear_quantile(training, params.contamination)
        };
        forest
    }

    /// Raw score in [-1, 0); lower = more anomalous.
    pub fn score_sample(&self, point: &[f64]) -> f64 {
        let norm = average_path_length(self.sample_size);
        if self.trees.is_empty() || norm == 0.0 {
            return -1.0;
        }
        let mean_depth = self
            .trees
            .iter()
            .map(|t| t.path_length(point))
            .sum::<f64>()
            / self.trees.len() as f64;
        -(2f64.powf(-mean_depth / norm))
    }

    /// `score_sample - offset`; negative means outlier.
    pub fn decision_function(&self, point: &[f64]) -> f64 {
        self.score_sample(point) - self.offset
    }

    pub fn offset(&self) -> f64 {
        self.offset
    }

    pub fn n_trees(&self) -> usize {
        self.trees.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand_distr::{Distribution, Normal};

    fn params() -> ForestParams {
        ForestParams {
            n_estimators: 50,
            max_samples: 128,
            contamination: 0.05,
            seed: 7,
        }
    }

    fn cloud(n: usize) -> Vec<Vec<f64>> {
        let mut rng = StdRng::seed_from_u64(1);
        let normal = Normal::new(0.0, 1.0).expect("valid distribution");
        (0..n)
            .map(|_| vec![normal.sample(&mut rng), normal.sample(&mut rng)])
            .collect()
    }

    #[test]
    fn test_average_path_length() {
        assert_eq!(average_path_length(0), 0.0);
        assert_eq!(average_path_length(1), 0.0);
        assert_eq!(average_path_length(2), 1.0);
        let c256 = average_path_length(256);
        assert!((c256 - 10.244).abs() < 0.01, "c(256) = {c256}");
    }

    #[test]
    fn test_linear_quantile_interpolates() {
        let values = vec![4.0, 1.0, 3.0, 2.0, 5.0];
        assert_eq!(linear_quantile(values.clone(), 0.0), 1.0);
        assert_eq!(linear_quantile(values.clone(), 0.5), 3.0);
        assert_eq!(linear_quantile(values.clone(), 1.0), 5.0);
        // h = 4 * 0.05 = 0.2, between 1.0 and 2.0
        assert!((linear_quantile(values.clone(), 0.05) - 1.2).abs() < 1e-12);
        assert!((linear_quantile(values, 0.3) - 2.2).abs() < 1e-12);
        assert!(linear_quantile(Vec::new(), 0.5).is_nan());
    }

    #[test]
    fn test_offset_is_contamination_quantile_of_training_scores() {
        let data = cloud(101);
        let forest = IsolationForest::fit(&data, params());
        let mut scores: Vec<f64> = data.iter().map(|x| forest.score_sample(x)).collect();
        scores.sort_by(f64::total_cmp);
        // 100 * 0.05 = 5 exactly: the sixth-lowest training score
        assert_eq!(forest.offset(), scores[5]);
    }

    #[test]
    fn test_outlier_scores_lowest() {
        let mut data = cloud(300);
        data.push(vec![25.0, -25.0]);
        let forest = IsolationForest::fit(&data, params());
        let outlier = forest.decision_function(&data[300]);
        assert!(outlier < 0.0);
        let centre = forest.decision_function(&[0.0, 0.0]);
        assert!(centre > 0.0);
        assert!(outlier < centre);
    }

    #[test]
    fn test_contamination_sets_flagged_fraction() {
        let data = cloud(400);
        let forest = IsolationForest::fit(&data, params());
        let flagged = data
            .iter()
            .filter(|x| forest.decision_function(x) < 0.0)
            .count();
        assert!((10..=30).contains(&flagged), "flagged {flagged} of 400");
    }

    #[test]
    fn test_fit_is_deterministic() {
        let data = cloud(200);
        let a = IsolationForest::fit(&data, params());
        let b = IsolationForest::fit(&data, params());
        assert_eq!(a, b);
        for x in &data {
            assert_eq!(a.score_sample(x).to_bits(), b.score_sample(x).to_bits());
        }
    }

    #[test]
    fn test_serde_roundtrip_preserves_scores() {
        let data = cloud(150);
        let forest = IsolationForest::fit(&data, params());
        let json = serde_json::to_string(&forest).expect("serialize");
        let restored: IsolationForest = serde_json::from_str(&json).expect("deserialize");
        assert_eq!(forest.n_trees(), restored.n_trees());
        for x in data.iter().take(20) {
            assert_eq!(forest.decision_function(x), restored.decision_function(x));
        }
    }
}
