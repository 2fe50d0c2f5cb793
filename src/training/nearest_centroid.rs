//! Nearest centroid classifier

use ndarray::{Array2, Axis};
use serde::{Deserialize, Serialize};

use super::{
    check_features, check_samples, decode_model, encode_model, ClassLayout, Hyperparameters,
    Model, ModelKind,
};
use crate::error::{AutoopError, Result};

/// Assigns each row to the class whose training mean is closest in
/// Euclidean distance. Equidistant classes resolve to the smallest label.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct NearestCentroid {
    /// Class centroids (n_classes × n_features)
    centroids: Option<Array2<f64>>,
    layout: ClassLayout,
}

impl NearestCentroid {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn centroids(&self) -> Option<&Array2<f64>> {
        self.centroids.as_ref()
    }

    pub fn from_bytes(bytes: &[u8]) -> Result<Self> {
        decode_model(bytes)
    }
}

impl Model for NearestCentroid {
    fn kind(&self) -> ModelKind {
        ModelKind::NearestCentroid
    }

    fn fit(&mut self, x: &Array2<f64>, y: &Array2<f64>) -> Result<()> {
        check_samples(x, y)?;
        let (layout, labels) = ClassLayout::fit(y);

        let mut sums = Array2::<f64>::zeros((layout.n_classes(), x.ncols()));
        let mut counts = vec![0usize; layout.n_classes()];
        for (row, &class) in x.axis_iter(Axis(0)).zip(labels.iter()) {
            let mut target = sums.row_mut(class);
            target += &row;
            counts[class] += 1;
        }
        for (class, &count) in counts.iter().enumerate() {
            if count > 0 {
                let mut centroid = sums.row_mut(class);
                centroid /= count as f64;
            }
        }

        self.centroids = Some(sums);
        self.layout = layout;
        Ok(())
    }

    fn predict(&self, x: &Array2<f64>) -> Result<Array2<f64>> {
        let centroids = self.centroids.as_ref().ok_or(AutoopError::ModelNotFitted)?;
        check_features(centroids.ncols(), x)?;

        let predictions: Vec<usize> = x
            .axis_iter(Axis(0))
            .map(|row| {
                let mut best = 0usize;
                let mut best_dist = f64::INFINITY;
                for (class, centroid) in centroids.axis_iter(Axis(0)).enumerate() {
                    let dist: f64 = row
                        .iter()
                        .zip(centroid.iter())
                        .map(|(a, b)| (a - b) * (a - b))
                        .sum();
                    if dist < best_dist {
                        best_dist = dist;
                        best = class;
                    }
                }
                best
            })
            .collect();

        Ok(self.layout.encode(&predictions))
    }

    fn is_fitted(&self) -> bool {
        self.centroids.is_some()
    }

    fn hyperparameters(&self) -> Hyperparameters {
        Hyperparameters::new()
    }

    fn to_bytes(&self) -> Result<Vec<u8>> {
        encode_model(self)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::array;

    #[test]
    fn test_centroids_are_class_means() {
        let x = array![[0.0, 0.0], [2.0, 2.0], [10.0, 10.0], [12.0, 12.0]];
        let y = array![[1.0, 0.0], [1.0, 0.0], [0.0, 1.0], [0.0, 1.0]];
        let mut model = NearestCentroid::new();
        model.fit(&x, &y).unwrap();

        assert_eq!(model.centroids().unwrap(), &array![[1.0, 1.0], [11.0, 11.0]]);
        assert_eq!(
            model.predict(&array![[3.0, 3.0], [9.0, 9.0]]).unwrap(),
            array![[1.0, 0.0], [0.0, 1.0]]
        );
    }

    #[test]
    fn test_equidistant_resolves_to_first_class() {
        let x = array![[0.0], [2.0]];
        let y = array![[4.0], [9.0]];
        let mut model = NearestCentroid::new();
        model.fit(&x, &y).unwrap();
        assert_eq!(model.predict(&array![[1.0]]).unwrap(), array![[4.0]]);
    }

    #[test]
    fn test_predict_before_fit() {
        let model = NearestCentroid::new();
        assert!(matches!(
            model.predict(&array![[1.0]]),
            Err(AutoopError::ModelNotFitted)
        ));
    }
}
