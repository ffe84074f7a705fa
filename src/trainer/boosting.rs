//! Gradient-boosted regression trees on the logistic loss.
//!
//! Each round fits a depth-limited tree to the loss gradient and hessian of
//! a random row subsample; leaf weights are `-G / (H + λ)`. Predictions are
//! `sigmoid(Σ learning_rate · tree(x))`.

use super::Classifier;
use super::logistic::sigmoid;
use crate::config::BoostingConfig;
use crate::error::{PipelineError, Result};
use ndarray::{Array1, Array2, ArrayView1};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use tracing::debug;

/// A node of a regression tree, stored in an arena indexed by position.
#[derive(Debug, Clone, PartialEq)]
pub enum TreeNode {
    Leaf {
        value: f64,
    },
    Split {
        feature: usize,
        threshold: f64,
        left: usize,
        right: usize,
    },
}

#[derive(Debug, Clone, Default)]
pub struct RegressionTree {
    nodes: Vec<TreeNode>,
}

impl RegressionTree {
    pub fn predict(&self, row: ArrayView1<f64>) -> f64 {
        let mut idx = 0;
        loop {
            match self.nodes.get(idx) {
                Some(TreeNode::Leaf { value }) => return *value,
                Some(TreeNode::Split {
                    feature,
                    threshold,
                    left,
                    right,
                }) => {
                    idx = if row[*feature] < *threshold { *left } else { *right };
                }
                None => return 0.0,
            }
        }
    }

    pub fn depth(&self) -> usize {
        fn walk(nodes: &[TreeNode], idx: usize) -> usize {
            match &nodes[idx] {
                TreeNode::Leaf { .. } => 0,
                TreeNode::Split { left, right, .. } => 1 + walk(nodes, *left).max(walk(nodes, *right)),
            }
        }
        if self.nodes.is_empty() { 0 } else { walk(&self.nodes, 0) }
    }
}

struct SplitCandidate {
    feature: usize,
    threshold: f64,
    gain: f64,
}

/// Grows one tree from per-row gradients and hessians.
struct TreeBuilder<'a> {
    x: &'a Array2<f64>,
    grad: &'a [f64],
    hess: &'a [f64],
    config: &'a BoostingConfig,
    nodes: Vec<TreeNode>,
}

impl TreeBuilder<'_> {
    fn leaf_weight(&self, g: f64, h: f64) -> f64 {
        -g / (h + self.config.lambda)
    }

    fn score(&self, g: f64, h: f64) -> f64 {
        g * g / (h + self.config.lambda)
    }

    fn grow(&mut self, rows: &[usize], depth: usize) -> usize {
        let g: f64 = rows.iter().map(|&i| self.grad[i]).sum();
        let h: f64 = rows.iter().map(|&i| self.hess[i]).sum();

        let id = self.nodes.len();
        self.nodes.push(TreeNode::Leaf {
            value: self.leaf_weight(g, h),
        });

        if depth >= self.config.max_depth || rows.len() < 2 {
            return id;
        }
        let Some(split) = self.best_split(rows, g, h) else {
            return id;
        };

        let (left_rows, right_rows): (Vec<usize>, Vec<usize>) = rows
            .iter()
            .copied()
            .partition(|&i| self.x[[i, split.feature]] < split.threshold);

        let left = self.grow(&left_rows, depth + 1);
        let right = self.grow(&right_rows, depth + 1);
        self.nodes[id] = TreeNode::Split {
            feature: split.feature,
            threshold: split.threshold,
            left,
            right,
        };
        id
    }

    /// Exact greedy search over midpoints between distinct feature values.
    fn best_split(&self, rows: &[usize], g_total: f64, h_total: f64) -> Option<SplitCandidate> {
        let parent = self.score(g_total, h_total);
        let mut best: Option<SplitCandidate> = None;

        for feature in 0..self.x.ncols() {
            let mut sorted = rows.to_vec();
            sorted.sort_by(|&a, &b| self.x[[a, feature]].total_cmp(&self.x[[b, feature]]));

            let (mut gl, mut hl) = (0.0, 0.0);
            for pair in sorted.windows(2) {
                let (i, next) = (pair[0], pair[1]);
                gl += self.grad[i];
                hl += self.hess[i];

                let (v, v_next) = (self.x[[i, feature]], self.x[[next, feature]]);
                if v == v_next {
                    continue;
                }
                let (gr, hr) = (g_total - gl, h_total - hl);
                if hl < self.config.min_child_weight || hr < self.config.min_child_weight {
                    continue;
                }

                let gain = 0.5 * (self.score(gl, hl) + self.score(gr, hr) - parent);
                if gain > 1e-12 && best.as_ref().is_none_or(|b| gain > b.gain) {
                    best = Some(SplitCandidate {
                        feature,
                        threshold: (v + v_next) / 2.0,
                        gain,
                    });
                }
            }
        }

        best
    }
}

#[derive(Debug, Clone)]
pub struct GradientBoostedTrees {
    config: BoostingConfig,
    trees: Vec<RegressionTree>,
    fitted: bool,
}

impl GradientBoostedTrees {
    pub fn new(config: BoostingConfig) -> Self {
        Self {
            config,
            trees: Vec::new(),
            fitted: false,
        }
    }

    pub fn n_trees(&self) -> usize {
        self.trees.len()
    }

    fn margin(&self, row: ArrayView1<f64>) -> f64 {
        self.trees
            .iter()
            .map(|t| self.config.learning_rate * t.predict(row))
            .sum()
    }

    pub fn predict_proba(&self, x: &Array2<f64>) -> Result<Array1<f64>> {
        if !self.fitted {
            return Err(PipelineError::NotFitted);
        }
        Ok(x.rows().into_iter().map(|row| sigmoid(self.margin(row))).collect())
    }
}

impl Classifier for GradientBoostedTrees {
    fn name(&self) -> &str {
        "Gradient Boosted Trees"
    }

    fn fit(&mut self, x: &Array2<f64>, y: &Array1<f64>) -> Result<()> {
        if x.nrows() != y.len() {
            return Err(PipelineError::DimensionMismatch {
                expected: x.nrows(),
                got: y.len(),
            });
        }
        if x.nrows() == 0 {
            return Err(PipelineError::InsufficientData { rows: 0, needed: 1 });
        }

        let n = x.nrows();
        let subsample = self.config.subsample.clamp(0.0, 1.0);
        let mut rng = StdRng::seed_from_u64(self.config.seed);
        let mut margins = vec![0.0; n];
        self.trees.clear();

        for round in 0..self.config.n_estimators {
            let (grad, hess): (Vec<f64>, Vec<f64>) = margins
                .iter()
                .zip(y.iter())
                .map(|(&m, &label)| {
                    let p = sigmoid(m);
                    (p - label, (p * (1.0 - p)).max(1e-16))
                })
                .unzip();

            let rows: Vec<usize> = (0..n).filter(|_| rng.gen_bool(subsample)).collect();
            if rows.is_empty() {
                debug!("round {}: empty subsample", round);
                continue;
            }

            let mut builder = TreeBuilder {
                x,
                grad: &grad,
                hess: &hess,
                config: &self.config,
                nodes: Vec::new(),
            };
            builder.grow(&rows, 0);
            let tree = RegressionTree {
                nodes: builder.nodes,
            };

            for (i, m) in margins.iter_mut().enumerate() {
                *m += self.config.learning_rate * tree.predict(x.row(i));
            }
            self.trees.push(tree);
        }

        debug!(
            "boosting fit: {} trees, deepest {}",
            self.n_trees(),
            self.trees.iter().map(RegressionTree::depth).max().unwrap_or(0)
        );
        self.fitted = true;
        Ok(())
    }

    fn predict(&self, x: &Array2<f64>) -> Result<Array1<u8>> {
        Ok(self.predict_proba(x)?.mapv(|p| u8::from(p > 0.5)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn small_config() -> BoostingConfig {
        BoostingConfig {
            n_estimators: 60,
            learning_rate: 0.3,
            subsample: 1.0,
            min_child_weight: 0.1,
            ..BoostingConfig::default()
        }
    }

    /// Label is 1 when the first feature exceeds 0.5; second feature is noise.
    fn threshold_data() -> (Array2<f64>, Array1<f64>) {
        let n = 40;
        let mut values = Vec::with_capacity(n * 2);
        let mut labels = Vec::with_capacity(n);
        for i in 0..n {
            let a = i as f64 / n as f64;
            values.push(a);
            values.push(((i * 7) % 11) as f64);
            labels.push(if a > 0.5 { 1.0 } else { 0.0 });
        }
        (
            Array2::from_shape_vec((n, 2), values).unwrap(),
            Array1::from_vec(labels),
        )
    }

    #[test]
    fn test_learns_a_threshold() {
        let (x, y) = threshold_data();
        let mut model = GradientBoostedTrees::new(small_config());
        model.fit(&x, &y).unwrap();

        let pred = model.predict(&x).unwrap();
        let correct = pred
            .iter()
            .zip(y.iter())
            .filter(|(p, t)| f64::from(**p) == **t)
            .count();
        assert_eq!(correct, y.len());
        assert_eq!(model.n_trees(), 60);
    }

    #[test]
    fn test_trees_respect_max_depth() {
        let (x, y) = threshold_data();
        let mut config = small_config();
        config.max_depth = 2;
        let mut model = GradientBoostedTrees::new(config);
        model.fit(&x, &y).unwrap();
        assert!(model.trees.iter().all(|t| t.depth() <= 2));
    }

    #[test]
    fn test_seeded_subsample_is_reproducible() {
        let (x, y) = threshold_data();
        let config = BoostingConfig {
            subsample: 0.8,
            ..small_config()
        };
        let mut a = GradientBoostedTrees::new(config.clone());
        let mut b = GradientBoostedTrees::new(config);
        a.fit(&x, &y).unwrap();
        b.fit(&x, &y).unwrap();
        assert_eq!(a.predict_proba(&x).unwrap(), b.predict_proba(&x).unwrap());
    }

    #[test]
    fn test_single_class_training_predicts_that_class() {
        let x = Array2::from_shape_vec((4, 1), vec![0.0, 1.0, 2.0, 3.0]).unwrap();
        let y = Array1::from_vec(vec![1.0; 4]);
        let mut model = GradientBoostedTrees::new(small_config());
        model.fit(&x, &y).unwrap();
        assert_eq!(model.predict(&x).unwrap().to_vec(), vec![1, 1, 1, 1]);
    }

    #[test]
    fn test_tree_predict_walks_splits() {
        let tree = RegressionTree {
            nodes: vec![
                TreeNode::Split {
                    feature: 0,
                    threshold: 0.5,
                    left: 1,
                    right: 2,
                },
                TreeNode::Leaf { value: -1.0 },
                TreeNode::Leaf { value: 2.0 },
            ],
        };
        let row = Array1::from_vec(vec![0.2]);
        assert_eq!(tree.predict(row.view()), -1.0);
        let row = Array1::from_vec(vec![0.7]);
        assert_eq!(tree.predict(row.view()), 2.0);
        assert_eq!(tree.depth(), 1);
    }
}
