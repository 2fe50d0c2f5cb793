//! Model training
//!
//! Every model implements the [`Model`] trait. Targets and predictions are
//! always 2-D:
//! - regression models take and return a single `(n, 1)` column
//! - classifiers take either a `(n, 1)` label column or a `(n, k)` one-hot
//!   matrix and predict in the same layout they were fitted on
//!
//! Models are created through the [`ModelRegistry`], an enum-keyed factory map.

mod decision_tree;
mod hyperparameters;
mod knn;
mod linear_models;
mod nearest_centroid;
mod random_forest;
mod registry;

pub use decision_tree::{Criterion, DecisionTree, TreeNode};
pub use hyperparameters::Hyperparameters;
pub use knn::KNearestNeighbors;
pub use linear_models::{ElasticNet, LogisticRegression, MultipleLinearRegression};
pub use nearest_centroid::NearestCentroid;
pub use random_forest::RandomForest;
pub use registry::{ModelFactory, ModelKind, ModelLoader, ModelRegistry};

use ndarray::{Array1, Array2, Axis};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use std::fmt;

use crate::error::{AutoopError, Result};

/// Prediction task a model performs
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TaskKind {
    Classification,
    Regression,
}

impl fmt::Display for TaskKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TaskKind::Classification => write!(f, "classification"),
            TaskKind::Regression => write!(f, "regression"),
        }
    }
}

/// Capability shared by all trainable models
pub trait Model: Send + Sync + fmt::Debug {
    /// Registry key of this model
    fn kind(&self) -> ModelKind;

    fn task_kind(&self) -> TaskKind {
        self.kind().task_kind()
    }

    /// Fit on `x` of shape `(n, p)` and `y` of shape `(n, k)`
    fn fit(&mut self, x: &Array2<f64>, y: &Array2<f64>) -> Result<()>;

    /// Predict with the layout of the fitted target
    fn predict(&self, x: &Array2<f64>) -> Result<Array2<f64>>;

    fn is_fitted(&self) -> bool;

    /// Hyperparameters the model was built with
    fn hyperparameters(&self) -> Hyperparameters;

    /// Serialize fitted state; restore through [`ModelRegistry::restore`]
    fn to_bytes(&self) -> Result<Vec<u8>>;
}

pub(crate) fn encode_model<T: Serialize>(model: &T) -> Result<Vec<u8>> {
    Ok(bincode::serialize(model)?)
}

pub(crate) fn decode_model<T: DeserializeOwned>(bytes: &[u8]) -> Result<T> {
    Ok(bincode::deserialize(bytes)?)
}

pub(crate) fn check_samples(x: &Array2<f64>, y: &Array2<f64>) -> Result<()> {
    if x.nrows() != y.nrows() {
        return Err(AutoopError::ShapeError {
            expected: format!("y rows = {}", x.nrows()),
            actual: format!("y rows = {}", y.nrows()),
        });
    }
    if x.nrows() == 0 {
        return Err(AutoopError::InvalidInput(
            "cannot fit a model on zero samples".to_string(),
        ));
    }
    Ok(())
}

pub(crate) fn check_features(expected: usize, x: &Array2<f64>) -> Result<()> {
    if x.ncols() != expected {
        return Err(AutoopError::ShapeError {
            expected: format!("{} features", expected),
            actual: format!("{} features", x.ncols()),
        });
    }
    Ok(())
}

/// Single-column regression target as a vector
pub(crate) fn regression_target(y: &Array2<f64>) -> Result<Array1<f64>> {
    if y.ncols() != 1 {
        return Err(AutoopError::InvalidInput(format!(
            "regression models need a single target column, got {}",
            y.ncols()
        )));
    }
    Ok(y.column(0).to_owned())
}

pub(crate) fn as_column(values: Array1<f64>) -> Array2<f64> {
    values.insert_axis(Axis(1))
}

/// Row labels of a target or prediction matrix: the value itself for a
/// single column, the argmax column index for one-hot rows. Ties and
/// all-zero rows resolve to the lowest index.
pub fn decode_labels(y: &Array2<f64>) -> Vec<f64> {
    if y.ncols() == 1 {
        return y.column(0).to_vec();
    }
    y.rows()
        .into_iter()
        .map(|row| {
            let mut best = 0usize;
            for (j, &v) in row.iter().enumerate() {
                if v > row[best] {
                    best = j;
                }
            }
            best as f64
        })
        .collect()
}

/// Class bookkeeping shared by the classifiers: the sorted distinct labels
/// seen at fit time and the width of the target layout.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub(crate) struct ClassLayout {
    pub classes: Vec<f64>,
    pub n_outputs: usize,
}

impl ClassLayout {
    /// Build the layout and map every row to its class index
    pub fn fit(y: &Array2<f64>) -> (Self, Vec<usize>) {
        let labels = decode_labels(y);
        let mut classes = labels.clone();
        classes.sort_by(|a, b| a.total_cmp(b));
        classes.dedup();

        let layout = Self {
            classes,
            n_outputs: y.ncols(),
        };
        let indices = labels
            .iter()
            .map(|label| layout.index_of(*label).unwrap_or(0))
            .collect();
        (layout, indices)
    }

    pub fn n_classes(&self) -> usize {
        self.classes.len()
    }

    pub fn index_of(&self, label: f64) -> Option<usize> {
        self.classes
            .binary_search_by(|c| c.total_cmp(&label))
            .ok()
    }

    /// Turn predicted class indices back into the fitted target layout
    pub fn encode(&self, class_indices: &[usize]) -> Array2<f64> {
        let mut out = Array2::zeros((class_indices.len(), self.n_outputs.max(1)));
        for (row, &idx) in class_indices.iter().enumerate() {
            let label = self.classes.get(idx).copied().unwrap_or(0.0);
            if self.n_outputs <= 1 {
                out[[row, 0]] = label;
            } else {
                let col = label as usize;
                if col < self.n_outputs {
                    out[[row, col]] = 1.0;
                }
            }
        }
        out
    }
}

/// Index of the largest score; ties go to the lowest index
pub(crate) fn argmax(scores: &[f64]) -> usize {
    let mut best = 0usize;
    for (i, s) in scores.iter().enumerate() {
        if s.partial_cmp(&scores[best]) == Some(Ordering::Greater) {
            best = i;
        }
    }
    best
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::array;

    #[test]
    fn test_decode_labels() {
        assert_eq!(decode_labels(&array![[3.0], [1.0]]), vec![3.0, 1.0]);
        assert_eq!(
            decode_labels(&array![[0.0, 1.0, 0.0], [1.0, 0.0, 0.0], [0.0, 0.0, 0.0]]),
            vec![1.0, 0.0, 0.0]
        );
    }

    #[test]
    fn test_class_layout_roundtrip_one_hot() {
        let y = array![[0.0, 0.0, 1.0], [1.0, 0.0, 0.0], [0.0, 0.0, 1.0]];
        let (layout, idx) = ClassLayout::fit(&y);
        assert_eq!(layout.classes, vec![0.0, 2.0]);
        assert_eq!(idx, vec![1, 0, 1]);
        assert_eq!(layout.encode(&idx), y);
    }

    #[test]
    fn test_class_layout_label_column() {
        let y = array![[5.0], [2.0], [5.0]];
        let (layout, idx) = ClassLayout::fit(&y);
        assert_eq!(idx, vec![1, 0, 1]);
        assert_eq!(layout.encode(&[0, 1]), array![[2.0], [5.0]]);
    }

    #[test]
    fn test_argmax_tie_prefers_first() {
        assert_eq!(argmax(&[1.0, 3.0, 3.0]), 1);
        assert_eq!(argmax(&[]), 0);
    }

    #[test]
    fn test_regression_target_requires_single_column() {
        assert!(regression_target(&array![[1.0, 0.0]]).is_err());
        assert_eq!(regression_target(&array![[1.0], [2.0]]).unwrap(), array![1.0, 2.0]);
    }
}
