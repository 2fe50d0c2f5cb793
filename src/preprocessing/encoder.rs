//! One-hot encoding for categorical columns

use ndarray::Array2;
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;

use crate::error::{AutoopError, Result};

/// One-hot encoder with a vocabulary fixed at fit time.
///
/// Categories are kept in ascending order, so the output column for a
/// category does not depend on the row order it was first seen in.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OneHotEncoder {
    /// Observed categories, sorted
    pub categories: Vec<String>,
    is_fitted: bool,
}

impl Default for OneHotEncoder {
    fn default() -> Self {
        Self::new()
    }
}

impl OneHotEncoder {
    pub fn new() -> Self {
        Self {
            categories: Vec::new(),
            is_fitted: false,
        }
    }

    /// Record the distinct values of `values`
    pub fn fit(&mut self, values: &[String]) -> Result<&mut Self> {
        let distinct: BTreeSet<&str> = values.iter().map(|s| s.as_str()).collect();
        self.categories = distinct.into_iter().map(|s| s.to_string()).collect();
        self.is_fitted = true;
        Ok(self)
    }

    /// Encode `values` as an `(n, n_categories)` indicator matrix.
    /// Categories outside the vocabulary produce an all-zero row.
    pub fn transform(&self, values: &[String]) -> Result<Array2<f64>> {
        if !self.is_fitted {
            return Err(AutoopError::ModelNotFitted);
        }

        let mut out = Array2::zeros((values.len(), self.categories.len()));
        for (row, value) in values.iter().enumerate() {
            if let Ok(col) = self.categories.binary_search(value) {
                out[[row, col]] = 1.0;
            }
        }
        Ok(out)
    }

    pub fn fit_transform(&mut self, values: &[String]) -> Result<Array2<f64>> {
        self.fit(values)?;
        self.transform(values)
    }

    /// Output width
    pub fn n_categories(&self) -> usize {
        self.categories.len()
    }

    pub fn is_fitted(&self) -> bool {
        self.is_fitted
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::array;

    fn strings(values: &[&str]) -> Vec<String> {
        values.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn test_one_hot_encoding() {
        let values = strings(&["a", "b", "a", "b", "a"]);
        let mut encoder = OneHotEncoder::new();
        let encoded = encoder.fit_transform(&values).unwrap();

        assert_eq!(
            encoded,
            array![[1.0, 0.0], [0.0, 1.0], [1.0, 0.0], [0.0, 1.0], [1.0, 0.0]]
        );
    }

    #[test]
    fn test_categories_sorted() {
        let mut encoder = OneHotEncoder::new();
        encoder.fit(&strings(&["red", "blue", "green", "blue"])).unwrap();
        assert_eq!(encoder.categories, strings(&["blue", "green", "red"]));
    }

    #[test]
    fn test_unseen_category_is_zero_row() {
        let mut encoder = OneHotEncoder::new();
        encoder.fit(&strings(&["a", "b"])).unwrap();

        let encoded = encoder.transform(&strings(&["c", "b"])).unwrap();
        assert_eq!(encoded, array![[0.0, 0.0], [0.0, 1.0]]);
    }

    #[test]
    fn test_transform_before_fit() {
        let encoder = OneHotEncoder::new();
        assert!(matches!(
            encoder.transform(&strings(&["a"])),
            Err(AutoopError::ModelNotFitted)
        ));
    }
}
