//! Regression metrics, computed over every element of the target matrix

use ndarray::{Array2, Zip};

use super::{check_inputs, Metric, MetricKind};
use crate::error::Result;

#[derive(Debug, Clone, Copy, Default)]
pub struct MeanSquaredError;

impl Metric for MeanSquaredError {
    fn kind(&self) -> MetricKind {
        MetricKind::MeanSquaredError
    }

    fn evaluate(&self, predictions: &Array2<f64>, ground_truth: &Array2<f64>) -> Result<f64> {
        check_inputs(predictions, ground_truth)?;
        let mut sum = 0.0;
        Zip::from(predictions)
            .and(ground_truth)
            .for_each(|&p, &t| sum += (p - t).powi(2));
        Ok(sum / predictions.len() as f64)
    }
}

#[derive(Debug, Clone, Copy, Default)]
pub struct MeanAbsoluteError;

impl Metric for MeanAbsoluteError {
    fn kind(&self) -> MetricKind {
        MetricKind::MeanAbsoluteError
    }

    fn evaluate(&self, predictions: &Array2<f64>, ground_truth: &Array2<f64>) -> Result<f64> {
        check_inputs(predictions, ground_truth)?;
        let mut sum = 0.0;
        Zip::from(predictions)
            .and(ground_truth)
            .for_each(|&p, &t| sum += (p - t).abs());
        Ok(sum / predictions.len() as f64)
    }
}

/// Coefficient of determination, `1 - ss_res / ss_tot`, with the total sum
/// of squares taken around the ground-truth mean. A constant ground truth
/// scores 0.
#[derive(Debug, Clone, Copy, Default)]
pub struct RSquared;

impl Metric for RSquared {
    fn kind(&self) -> MetricKind {
        MetricKind::RSquared
    }

    fn evaluate(&self, predictions: &Array2<f64>, ground_truth: &Array2<f64>) -> Result<f64> {
        check_inputs(predictions, ground_truth)?;
        let mean = ground_truth.sum() / ground_truth.len() as f64;

        let mut ss_res = 0.0;
        let mut ss_tot = 0.0;
        Zip::from(predictions).and(ground_truth).for_each(|&p, &t| {
            ss_res += (t - p).powi(2);
            ss_tot += (t - mean).powi(2);
        });

        if ss_tot > 0.0 {
            Ok(1.0 - ss_res / ss_tot)
        } else {
            Ok(0.0)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::array;

    #[test]
    fn test_mse_and_mae() {
        let truth = array![[1.0], [2.0], [3.0], [4.0]];
        let pred = array![[1.0], [3.0], [3.0], [2.0]];
        assert_eq!(MeanSquaredError.evaluate(&pred, &truth).unwrap(), 1.25);
        assert_eq!(MeanAbsoluteError.evaluate(&pred, &truth).unwrap(), 0.75);
    }

    #[test]
    fn test_r_squared_perfect_and_mean() {
        let truth = array![[1.0], [2.0], [3.0]];
        assert_eq!(RSquared.evaluate(&truth, &truth).unwrap(), 1.0);

        let mean_pred = array![[2.0], [2.0], [2.0]];
        assert_eq!(RSquared.evaluate(&mean_pred, &truth).unwrap(), 0.0);
    }

    #[test]
    fn test_r_squared_uses_ground_truth_mean() {
        // swapping the arguments changes the score
        let truth = array![[0.0], [0.0], [3.0]];
        let pred = array![[0.0], [0.0], [2.0]];
        let r2 = RSquared.evaluate(&pred, &truth).unwrap();
        assert!((r2 - 5.0 / 6.0).abs() < 1e-12);
        let swapped = RSquared.evaluate(&truth, &pred).unwrap();
        assert!((swapped - 0.625).abs() < 1e-12);
    }

    #[test]
    fn test_constant_truth_scores_zero() {
        let truth = array![[5.0], [5.0]];
        let pred = array![[4.0], [6.0]];
        assert_eq!(RSquared.evaluate(&pred, &truth).unwrap(), 0.0);
    }
}
