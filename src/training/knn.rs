//! K-Nearest Neighbors classifier

use ndarray::{Array2, ArrayView1};
use rayon::prelude::*;
use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use std::collections::BinaryHeap;

use super::{
    argmax, check_features, check_samples, decode_model, encode_model, ClassLayout,
    Hyperparameters, Model, ModelKind,
};
use crate::error::{AutoopError, Result};

/// Distance metric for KNN
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub enum DistanceMetric {
    /// Euclidean distance (L2)
    Euclidean,
    /// Manhattan distance (L1)
    Manhattan,
    /// Minkowski distance with parameter p
    Minkowski(f64),
}

impl DistanceMetric {
    fn from_p(p: f64) -> Self {
        if p == 1.0 {
            DistanceMetric::Manhattan
        } else if p == 2.0 {
            DistanceMetric::Euclidean
        } else {
            DistanceMetric::Minkowski(p)
        }
    }

    fn p(&self) -> f64 {
        match self {
            DistanceMetric::Manhattan => 1.0,
            DistanceMetric::Euclidean => 2.0,
            DistanceMetric::Minkowski(p) => *p,
        }
    }
}

/// Weighting scheme for neighbors
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub enum WeightScheme {
    /// All neighbors have equal weight
    Uniform,
    /// Closer neighbors have more weight (inverse distance)
    Distance,
}

/// K-Nearest Neighbors classifier. Stores the training set and predicts by
/// majority vote of the `k` closest rows; vote ties go to the smallest label.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct KNearestNeighbors {
    /// Number of neighbors
    pub n_neighbors: usize,
    pub metric: DistanceMetric,
    pub weights: WeightScheme,
    x_train: Option<Array2<f64>>,
    y_train: Vec<usize>,
    layout: ClassLayout,
}

impl Default for KNearestNeighbors {
    fn default() -> Self {
        Self::with_k(5)
    }
}

impl KNearestNeighbors {
    pub fn with_k(k: usize) -> Self {
        Self {
            n_neighbors: k,
            metric: DistanceMetric::Euclidean,
            weights: WeightScheme::Uniform,
            x_train: None,
            y_train: Vec::new(),
            layout: ClassLayout::default(),
        }
    }

    pub fn from_hyperparameters(params: &Hyperparameters) -> Result<Self> {
        let k = params.get_usize("k", 5)?;
        if k == 0 {
            return Err(AutoopError::InvalidInput("k must be at least 1".to_string()));
        }
        let p = params.get_or("p", 2.0);
        if p <= 0.0 {
            return Err(AutoopError::InvalidInput(format!("p must be positive, got {}", p)));
        }
        let weights = if params.get_bool("distance_weights", false) {
            WeightScheme::Distance
        } else {
            WeightScheme::Uniform
        };
        Ok(Self::with_k(k)
            .with_metric(DistanceMetric::from_p(p))
            .with_weights(weights))
    }

    pub fn with_metric(mut self, metric: DistanceMetric) -> Self {
        self.metric = metric;
        self
    }

    pub fn with_weights(mut self, weights: WeightScheme) -> Self {
        self.weights = weights;
        self
    }

    pub fn from_bytes(bytes: &[u8]) -> Result<Self> {
        decode_model(bytes)
    }
}

impl Model for KNearestNeighbors {
    fn kind(&self) -> ModelKind {
        ModelKind::KNearestNeighbors
    }

    fn fit(&mut self, x: &Array2<f64>, y: &Array2<f64>) -> Result<()> {
        check_samples(x, y)?;
        let (layout, labels) = ClassLayout::fit(y);
        self.x_train = Some(x.clone());
        self.y_train = labels;
        self.layout = layout;
        Ok(())
    }

    /// Predict class labels (parallelized over test samples)
    fn predict(&self, x: &Array2<f64>) -> Result<Array2<f64>> {
        let x_train = self.x_train.as_ref().ok_or(AutoopError::ModelNotFitted)?;
        check_features(x_train.ncols(), x)?;

        let k = self.n_neighbors.min(x_train.nrows()).max(1);
        let n_classes = self.layout.n_classes();

        let predictions: Vec<usize> = (0..x.nrows())
            .into_par_iter()
            .map(|i| {
                let neighbors = find_k_nearest(x.row(i), x_train, &self.y_train, k, self.metric);
                vote_classify(&neighbors, n_classes, self.weights)
            })
            .collect();

        Ok(self.layout.encode(&predictions))
    }

    fn is_fitted(&self) -> bool {
        self.x_train.is_some()
    }

    fn hyperparameters(&self) -> Hyperparameters {
        Hyperparameters::new()
            .with("k", self.n_neighbors as f64)
            .with("p", self.metric.p())
            .with(
                "distance_weights",
                if self.weights == WeightScheme::Distance { 1.0 } else { 0.0 },
            )
    }

    fn to_bytes(&self) -> Result<Vec<u8>> {
        encode_model(self)
    }
}

/// Max-heap entry for partial sort (keeps k smallest distances)
#[derive(PartialEq)]
struct DistLabel(f64, usize);

impl Eq for DistLabel {}
impl PartialOrd for DistLabel {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}
impl Ord for DistLabel {
    fn cmp(&self, other: &Self) -> Ordering {
        self.0.total_cmp(&other.0)
    }
}

/// Find k nearest neighbors using a max-heap. Equal distances keep the
/// earlier training row.
fn find_k_nearest(
    point: ArrayView1<f64>,
    x_train: &Array2<f64>,
    y_train: &[usize],
    k: usize,
    metric: DistanceMetric,
) -> Vec<(f64, usize)> {
    let mut heap = BinaryHeap::with_capacity(k + 1);

    for (i, row) in x_train.rows().into_iter().enumerate() {
        let dist = compute_distance(point, row, metric);
        if heap.len() < k {
            heap.push(DistLabel(dist, y_train[i]));
        } else if let Some(top) = heap.peek() {
            if dist < top.0 {
                heap.pop();
                heap.push(DistLabel(dist, y_train[i]));
            }
        }
    }

    heap.into_sorted_vec().into_iter().map(|dl| (dl.0, dl.1)).collect()
}

fn compute_distance(a: ArrayView1<f64>, b: ArrayView1<f64>, metric: DistanceMetric) -> f64 {
    match metric {
        DistanceMetric::Euclidean => a
            .iter()
            .zip(b.iter())
            .map(|(ai, bi)| {
                let d = ai - bi;
                d * d
            })
            .sum::<f64>()
            .sqrt(),
        DistanceMetric::Manhattan => a.iter().zip(b.iter()).map(|(ai, bi)| (ai - bi).abs()).sum(),
        DistanceMetric::Minkowski(p) => a
            .iter()
            .zip(b.iter())
            .map(|(ai, bi)| (ai - bi).abs().powf(p))
            .sum::<f64>()
            .powf(1.0 / p),
    }
}

/// Weighted majority vote over class indices
fn vote_classify(neighbors: &[(f64, usize)], n_classes: usize, weights: WeightScheme) -> usize {
    let mut votes = vec![0.0; n_classes];
    for &(dist, label) in neighbors {
        let weight = match weights {
            WeightScheme::Uniform => 1.0,
            WeightScheme::Distance => 1.0 / (dist + 1e-10),
        };
        if let Some(v) = votes.get_mut(label) {
            *v += weight;
        }
    }
    argmax(&votes)
}
