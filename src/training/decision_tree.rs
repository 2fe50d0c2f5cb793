//! Classification tree used as the random forest base learner

use ndarray::{Array1, Array2, ArrayView1};
use rand::seq::index::sample;
use rand::SeedableRng;
use rand_chacha::ChaCha8Rng;
use rayon::prelude::*;
use serde::{Deserialize, Serialize};

use crate::error::{AutoopError, Result};

/// Decision tree node
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum TreeNode {
    /// Leaf node predicting a class index
    Leaf { class: usize, n_samples: usize },
    /// Internal node with split
    Split {
        feature_idx: usize,
        threshold: f64,
        left: Box<TreeNode>,
        right: Box<TreeNode>,
        n_samples: usize,
        impurity: f64,
    },
}

/// Impurity criterion
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq)]
pub enum Criterion {
    Gini,
    Entropy,
}

impl Criterion {
    fn impurity(&self, counts: &[usize], total: usize) -> f64 {
        if total == 0 {
            return 0.0;
        }
        let n = total as f64;
        match self {
            Criterion::Gini => {
                1.0 - counts
                    .iter()
                    .map(|&c| (c as f64 / n).powi(2))
                    .sum::<f64>()
            }
            Criterion::Entropy => -counts
                .iter()
                .filter(|&&c| c > 0)
                .map(|&c| {
                    let p = c as f64 / n;
                    p * p.ln()
                })
                .sum::<f64>(),
        }
    }
}

/// CART classification tree over class indices `0..n_classes`.
///
/// When `max_features` is set, each split considers a random feature
/// subset drawn from a `ChaCha8Rng` seeded with `random_state`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DecisionTree {
    root: Option<TreeNode>,
    /// Maximum depth
    pub max_depth: Option<usize>,
    /// Minimum samples to split
    pub min_samples_split: usize,
    /// Minimum samples in leaf
    pub min_samples_leaf: usize,
    /// Features considered per split
    pub max_features: Option<usize>,
    pub criterion: Criterion,
    pub random_state: u64,
    n_features: usize,
    n_classes: usize,
    feature_importances: Option<Array1<f64>>,
}

impl Default for DecisionTree {
    fn default() -> Self {
        Self::new()
    }
}

impl DecisionTree {
    pub fn new() -> Self {
        Self {
            root: None,
            max_depth: None,
            min_samples_split: 2,
            min_samples_leaf: 1,
            max_features: None,
            criterion: Criterion::Gini,
            random_state: 42,
            n_features: 0,
            n_classes: 0,
            feature_importances: None,
        }
    }

    pub fn with_max_depth(mut self, depth: Option<usize>) -> Self {
        self.max_depth = depth;
        self
    }

    pub fn with_min_samples_split(mut self, min_samples: usize) -> Self {
        self.min_samples_split = min_samples.max(2);
        self
    }

    pub fn with_min_samples_leaf(mut self, min_samples: usize) -> Self {
        self.min_samples_leaf = min_samples.max(1);
        self
    }

    pub fn with_max_features(mut self, max_features: Option<usize>) -> Self {
        self.max_features = max_features;
        self
    }

    pub fn with_criterion(mut self, criterion: Criterion) -> Self {
        self.criterion = criterion;
        self
    }

    pub fn with_random_state(mut self, seed: u64) -> Self {
        self.random_state = seed;
        self
    }

    /// Fit on `x` and per-row class indices
    pub fn fit(&mut self, x: &Array2<f64>, labels: &[usize], n_classes: usize) -> Result<&mut Self> {
        let n_samples = x.nrows();
        if n_samples != labels.len() {
            return Err(AutoopError::ShapeError {
                expected: format!("labels length = {}", n_samples),
                actual: format!("labels length = {}", labels.len()),
            });
        }
        if n_samples == 0 {
            return Err(AutoopError::InvalidInput("cannot fit a tree on zero samples".to_string()));
        }
        if let Some(&bad) = labels.iter().find(|&&l| l >= n_classes) {
            return Err(AutoopError::InvalidInput(format!(
                "class index {} out of range for {} classes",
                bad, n_classes
            )));
        }

        self.n_features = x.ncols();
        self.n_classes = n_classes;

        let mut rng = ChaCha8Rng::seed_from_u64(self.random_state);
        let mut importances = vec![0.0; self.n_features];
        let indices: Vec<usize> = (0..n_samples).collect();
        let root = self.build_tree(x, labels, &indices, 0, &mut importances, &mut rng);
        self.root = Some(root);

        let total: f64 = importances.iter().sum();
        if total > 0.0 {
            for imp in &mut importances {
                *imp /= total;
            }
        }
        self.feature_importances = Some(Array1::from_vec(importances));

        Ok(self)
    }

    fn class_counts(&self, labels: &[usize], indices: &[usize]) -> Vec<usize> {
        let mut counts = vec![0usize; self.n_classes];
        for &i in indices {
            counts[labels[i]] += 1;
        }
        counts
    }

    fn build_tree(
        &self,
        x: &Array2<f64>,
        labels: &[usize],
        indices: &[usize],
        depth: usize,
        importances: &mut [f64],
        rng: &mut ChaCha8Rng,
    ) -> TreeNode {
        let n_samples = indices.len();
        let counts = self.class_counts(labels, indices);
        let leaf = TreeNode::Leaf {
            class: majority(&counts),
            n_samples,
        };

        let is_pure = counts.iter().filter(|&&c| c > 0).count() <= 1;
        let should_stop = n_samples < self.min_samples_split
            || n_samples < 2 * self.min_samples_leaf
            || self.max_depth.map_or(false, |d| depth >= d)
            || is_pure;
        if should_stop {
            return leaf;
        }

        let parent_impurity = self.criterion.impurity(&counts, n_samples);
        let candidates = self.candidate_features(rng);

        let (feature_idx, threshold, gain) =
            match self.find_best_split(x, labels, indices, &candidates, parent_impurity) {
                Some(split) => split,
                None => return leaf,
            };

        let (left_indices, right_indices): (Vec<usize>, Vec<usize>) = indices
            .iter()
            .partition(|&&i| x[[i, feature_idx]] <= threshold);

        importances[feature_idx] += n_samples as f64 * gain;

        let left = Box::new(self.build_tree(x, labels, &left_indices, depth + 1, importances, rng));
        let right = Box::new(self.build_tree(x, labels, &right_indices, depth + 1, importances, rng));

        TreeNode::Split {
            feature_idx,
            threshold,
            left,
            right,
            n_samples,
            impurity: parent_impurity,
        }
    }

    fn candidate_features(&self, rng: &mut ChaCha8Rng) -> Vec<usize> {
        match self.max_features {
            Some(m) if m < self.n_features => {
                let mut picked = sample(rng, self.n_features, m.max(1)).into_vec();
                picked.sort_unstable();
                picked
            }
            _ => (0..self.n_features).collect(),
        }
    }

    /// Best `(feature, threshold, gain)` over the candidate features. Each
    /// feature is scanned once in sorted order; ties keep the earlier
    /// feature and the lower threshold.
    fn find_best_split(
        &self,
        x: &Array2<f64>,
        labels: &[usize],
        indices: &[usize],
        candidates: &[usize],
        parent_impurity: f64,
    ) -> Option<(usize, f64, f64)> {
        let n = indices.len();
        let total_counts = self.class_counts(labels, indices);

        let feature_results: Vec<Option<(usize, f64, f64)>> = candidates
            .par_iter()
            .map(|&feature_idx| {
                let mut order: Vec<usize> = indices.to_vec();
                order.sort_by(|&a, &b| x[[a, feature_idx]].total_cmp(&x[[b, feature_idx]]));

                let mut left_counts = vec![0usize; self.n_classes];
                let mut best: Option<(f64, f64)> = None;

                for pos in 0..n - 1 {
                    left_counts[labels[order[pos]]] += 1;
                    let left_n = pos + 1;
                    let right_n = n - left_n;

                    let here = x[[order[pos], feature_idx]];
                    let next = x[[order[pos + 1], feature_idx]];
                    if here == next {
                        continue;
                    }
                    if left_n < self.min_samples_leaf || right_n < self.min_samples_leaf {
                        continue;
                    }

                    let right_counts: Vec<usize> = total_counts
                        .iter()
                        .zip(&left_counts)
                        .map(|(t, l)| t - l)
                        .collect();
                    let weighted = (left_n as f64 * self.criterion.impurity(&left_counts, left_n)
                        + right_n as f64 * self.criterion.impurity(&right_counts, right_n))
                        / n as f64;
                    let gain = parent_impurity - weighted;

                    if gain > 1e-12 && best.map_or(true, |(g, _)| gain > g) {
                        best = Some((gain, (here + next) / 2.0));
                    }
                }

                best.map(|(gain, threshold)| (feature_idx, threshold, gain))
            })
            .collect();

        let mut best: Option<(usize, f64, f64)> = None;
        for candidate in feature_results.into_iter().flatten() {
            if best.map_or(true, |b| candidate.2 > b.2) {
                best = Some(candidate);
            }
        }
        best
    }

    /// Predicted class index for every row
    pub fn predict_classes(&self, x: &Array2<f64>) -> Result<Vec<usize>> {
        let root = self.root.as_ref().ok_or(AutoopError::ModelNotFitted)?;
        if x.ncols() != self.n_features {
            return Err(AutoopError::ShapeError {
                expected: format!("{} features", self.n_features),
                actual: format!("{} features", x.ncols()),
            });
        }
        Ok(x.rows().into_iter().map(|row| predict_sample(root, row)).collect())
    }

    pub fn feature_importances(&self) -> Option<&Array1<f64>> {
        self.feature_importances.as_ref()
    }

    pub fn depth(&self) -> usize {
        self.root.as_ref().map_or(0, node_depth)
    }

    pub fn is_fitted(&self) -> bool {
        self.root.is_some()
    }
}

fn predict_sample(node: &TreeNode, sample: ArrayView1<f64>) -> usize {
    match node {
        TreeNode::Leaf { class, .. } => *class,
        TreeNode::Split {
            feature_idx,
            threshold,
            left,
            right,
            ..
        } => {
            if sample[*feature_idx] <= *threshold {
                predict_sample(left, sample)
            } else {
                predict_sample(right, sample)
            }
        }
    }
}

fn node_depth(node: &TreeNode) -> usize {
    match node {
        TreeNode::Leaf { .. } => 1,
        TreeNode::Split { left, right, .. } => 1 + node_depth(left).max(node_depth(right)),
    }
}

/// Most frequent class; ties go to the smallest index
pub(crate) fn majority(counts: &[usize]) -> usize {
    let mut best = 0usize;
    for (class, &count) in counts.iter().enumerate() {
        if count > counts[best] {
            best = class;
        }
    }
    best
}
