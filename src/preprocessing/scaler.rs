//! Standardization for numerical columns

use ndarray::Array2;
use serde::{Deserialize, Serialize};
use tracing::warn;

use crate::error::{AutoopError, Result};

/// Z-score scaler: `(x - mean) / std` with the population standard deviation.
///
/// A column with zero variance is marked `degenerate` and transforms to all
/// zeros instead of dividing by zero.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StandardScaler {
    /// Fitted mean
    pub mean: f64,
    /// Fitted standard deviation
    pub scale: f64,
    /// True when the fitted column had zero variance
    pub degenerate: bool,
    is_fitted: bool,
}

impl Default for StandardScaler {
    fn default() -> Self {
        Self::new()
    }
}

impl StandardScaler {
    pub fn new() -> Self {
        Self {
            mean: 0.0,
            scale: 1.0,
            degenerate: false,
            is_fitted: false,
        }
    }

    pub fn fit(&mut self, values: &[f64]) -> Result<&mut Self> {
        if values.is_empty() {
            return Err(AutoopError::InvalidInput(
                "cannot fit a scaler on an empty column".to_string(),
            ));
        }

        let n = values.len() as f64;
        let mean = values.iter().sum::<f64>() / n;
        let variance = values.iter().map(|v| (v - mean).powi(2)).sum::<f64>() / n;
        let std = variance.sqrt();

        // `sum / n` can leave rounding noise in the spread of a constant column
        let constant = values.iter().all(|v| *v == values[0]);

        self.mean = mean;
        self.degenerate = constant || std == 0.0;
        self.scale = if self.degenerate { 1.0 } else { std };
        self.is_fitted = true;

        if self.degenerate {
            warn!(mean, "zero-variance column, standardized output is constant 0");
        }
        Ok(self)
    }

    /// Standardize `values` into an `(n, 1)` matrix
    pub fn transform(&self, values: &[f64]) -> Result<Array2<f64>> {
        if !self.is_fitted {
            return Err(AutoopError::ModelNotFitted);
        }

        let mut out = Array2::zeros((values.len(), 1));
        if !self.degenerate {
            for (row, value) in values.iter().enumerate() {
                out[[row, 0]] = (value - self.mean) / self.scale;
            }
        }
        Ok(out)
    }

    pub fn fit_transform(&mut self, values: &[f64]) -> Result<Array2<f64>> {
        self.fit(values)?;
        self.transform(values)
    }

    /// Map standardized values back to the original units
    pub fn inverse_transform(&self, scaled: &Array2<f64>) -> Result<Array2<f64>> {
        if !self.is_fitted {
            return Err(AutoopError::ModelNotFitted);
        }
        Ok(scaled.mapv(|v| v * self.scale + self.mean))
    }

    pub fn is_fitted(&self) -> bool {
        self.is_fitted
    }
}
