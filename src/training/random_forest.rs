//! Random forest classifier

use ndarray::{Array1, Array2, Axis};
use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha8Rng;
use rayon::prelude::*;
use serde::{Deserialize, Serialize};

use super::decision_tree::{majority, Criterion, DecisionTree};
use super::{
    check_features, check_samples, decode_model, encode_model, ClassLayout, Hyperparameters,
    Model, ModelKind,
};
use crate::error::{AutoopError, Result};

/// Bagged ensemble of classification trees with per-split feature
/// subsampling (`sqrt(n_features)` by default).
///
/// Tree `i` draws its bootstrap sample and feature subsets from a
/// `ChaCha8Rng` seeded with `random_state + i`, so a fixed seed gives the
/// same forest regardless of thread scheduling.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RandomForest {
    trees: Vec<DecisionTree>,
    /// Number of trees
    pub n_estimators: usize,
    /// Maximum depth per tree
    pub max_depth: Option<usize>,
    /// Minimum samples to split
    pub min_samples_split: usize,
    /// Minimum samples in leaf
    pub min_samples_leaf: usize,
    /// Bootstrap sampling
    pub bootstrap: bool,
    pub criterion: Criterion,
    pub random_state: u64,
    layout: ClassLayout,
    n_features: usize,
    feature_importances: Option<Array1<f64>>,
}

impl Default for RandomForest {
    fn default() -> Self {
        Self::new(100)
    }
}

impl RandomForest {
    pub fn new(n_estimators: usize) -> Self {
        Self {
            trees: Vec::new(),
            n_estimators,
            max_depth: None,
            min_samples_split: 2,
            min_samples_leaf: 1,
            bootstrap: true,
            criterion: Criterion::Gini,
            random_state: 42,
            layout: ClassLayout::default(),
            n_features: 0,
            feature_importances: None,
        }
    }

    pub fn from_hyperparameters(params: &Hyperparameters) -> Result<Self> {
        let n_estimators = params.get_usize("n_estimators", 100)?;
        if n_estimators == 0 {
            return Err(AutoopError::InvalidInput(
                "n_estimators must be at least 1".to_string(),
            ));
        }
        let max_depth = match params.get("max_depth") {
            Some(_) => Some(params.get_usize("max_depth", 0)?),
            None => None,
        };
        Ok(Self::new(n_estimators)
            .with_max_depth(max_depth)
            .with_min_samples_split(params.get_usize("min_samples_split", 2)?)
            .with_min_samples_leaf(params.get_usize("min_samples_leaf", 1)?)
            .with_bootstrap(params.get_bool("bootstrap", true))
            .with_random_state(params.get_usize("seed", 42)? as u64))
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

    pub fn with_bootstrap(mut self, bootstrap: bool) -> Self {
        self.bootstrap = bootstrap;
        self
    }

    pub fn with_random_state(mut self, seed: u64) -> Self {
        self.random_state = seed;
        self
    }

    pub fn from_bytes(bytes: &[u8]) -> Result<Self> {
        decode_model(bytes)
    }

    pub fn feature_importances(&self) -> Option<&Array1<f64>> {
        self.feature_importances.as_ref()
    }

    fn compute_feature_importances(&mut self) {
        let mut total = vec![0.0; self.n_features];
        for tree in &self.trees {
            if let Some(imp) = tree.feature_importances() {
                for (t, v) in total.iter_mut().zip(imp.iter()) {
                    *t += v;
                }
            }
        }
        let n_trees = self.trees.len().max(1) as f64;
        self.feature_importances = Some(Array1::from_vec(total).mapv(|v| v / n_trees));
    }
}

impl Model for RandomForest {
    fn kind(&self) -> ModelKind {
        ModelKind::RandomForest
    }

    fn fit(&mut self, x: &Array2<f64>, y: &Array2<f64>) -> Result<()> {
        check_samples(x, y)?;
        let (layout, labels) = ClassLayout::fit(y);
        let n_samples = x.nrows();
        let n_features = x.ncols();
        let n_classes = layout.n_classes();
        let max_features = ((n_features as f64).sqrt().ceil() as usize).max(1);

        let base_seed = self.random_state;
        let bootstrap = self.bootstrap;
        let template = DecisionTree::new()
            .with_max_depth(self.max_depth)
            .with_min_samples_split(self.min_samples_split)
            .with_min_samples_leaf(self.min_samples_leaf)
            .with_criterion(self.criterion)
            .with_max_features(Some(max_features));

        let trees: Vec<DecisionTree> = (0..self.n_estimators)
            .into_par_iter()
            .map(|tree_idx| -> Result<DecisionTree> {
                let seed = base_seed.wrapping_add(tree_idx as u64);
                let mut rng = ChaCha8Rng::seed_from_u64(seed);

                let sample_indices: Vec<usize> = if bootstrap {
                    (0..n_samples).map(|_| rng.gen_range(0..n_samples)).collect()
                } else {
                    (0..n_samples).collect()
                };
                let x_boot = x.select(Axis(0), &sample_indices);
                let y_boot: Vec<usize> = sample_indices.iter().map(|&i| labels[i]).collect();

                let mut tree = template.clone().with_random_state(rng.gen());
                tree.fit(&x_boot, &y_boot, n_classes)?;
                Ok(tree)
            })
            .collect::<Result<Vec<_>>>()?;

        self.trees = trees;
        self.layout = layout;
        self.n_features = n_features;
        self.compute_feature_importances();
        Ok(())
    }

    /// Majority vote across trees; ties go to the smallest label
    fn predict(&self, x: &Array2<f64>) -> Result<Array2<f64>> {
        if self.trees.is_empty() {
            return Err(AutoopError::ModelNotFitted);
        }
        check_features(self.n_features, x)?;

        let per_tree: Vec<Vec<usize>> = self
            .trees
            .par_iter()
            .map(|tree| tree.predict_classes(x))
            .collect::<Result<Vec<_>>>()?;

        let n_classes = self.layout.n_classes();
        let predictions: Vec<usize> = (0..x.nrows())
            .map(|row| {
                let mut votes = vec![0usize; n_classes];
                for tree_preds in &per_tree {
                    votes[tree_preds[row]] += 1;
                }
                majority(&votes)
            })
            .collect();

        Ok(self.layout.encode(&predictions))
    }

    fn is_fitted(&self) -> bool {
        !self.trees.is_empty()
    }

    fn hyperparameters(&self) -> Hyperparameters {
        let mut params = Hyperparameters::new()
            .with("n_estimators", self.n_estimators as f64)
            .with("min_samples_split", self.min_samples_split as f64)
            .with("min_samples_leaf", self.min_samples_leaf as f64)
            .with("bootstrap", if self.bootstrap { 1.0 } else { 0.0 })
            .with("seed", self.random_state as f64);
        if let Some(depth) = self.max_depth {
            params.set("max_depth", depth as f64);
        }
        params
    }

    fn to_bytes(&self) -> Result<Vec<u8>> {
        encode_model(self)
    }
}
