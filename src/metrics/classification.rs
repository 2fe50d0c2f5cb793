//! Classification metrics

use ndarray::Array2;

use super::{check_inputs, Metric, MetricKind};
use crate::error::Result;
use crate::training::decode_labels;

/// Fraction of rows predicted exactly
#[derive(Debug, Clone, Copy, Default)]
pub struct Accuracy;

impl Metric for Accuracy {
    fn kind(&self) -> MetricKind {
        MetricKind::Accuracy
    }

    fn evaluate(&self, predictions: &Array2<f64>, ground_truth: &Array2<f64>) -> Result<f64> {
        check_inputs(predictions, ground_truth)?;
        let correct = predictions
            .rows()
            .into_iter()
            .zip(ground_truth.rows())
            .filter(|(p, t)| p == t)
            .count();
        Ok(correct as f64 / predictions.nrows() as f64)
    }
}

/// Per-class true positives, predicted counts and actual counts, keyed by
/// the sorted union of labels
struct ClassCounts {
    true_positives: Vec<usize>,
    predicted: Vec<usize>,
    actual: Vec<usize>,
}

impl ClassCounts {
    fn from(predictions: &Array2<f64>, ground_truth: &Array2<f64>) -> Self {
        let pred = decode_labels(predictions);
        let truth = decode_labels(ground_truth);

        let mut classes: Vec<f64> = pred.iter().chain(truth.iter()).copied().collect();
        classes.sort_by(|a, b| a.total_cmp(b));
        classes.dedup();
        let index = |label: f64| {
            classes
                .binary_search_by(|c| c.total_cmp(&label))
                .unwrap_or(0)
        };

        let mut counts = ClassCounts {
            true_positives: vec![0; classes.len()],
            predicted: vec![0; classes.len()],
            actual: vec![0; classes.len()],
        };
        for (&p, &t) in pred.iter().zip(truth.iter()) {
            let (pi, ti) = (index(p), index(t));
            counts.predicted[pi] += 1;
            counts.actual[ti] += 1;
            if pi == ti {
                counts.true_positives[pi] += 1;
            }
        }
        counts
    }
}

/// Macro-averaged precision over every label seen in either argument.
/// A class that is never predicted scores 0.
#[derive(Debug, Clone, Copy, Default)]
pub struct Precision;

impl Metric for Precision {
    fn kind(&self) -> MetricKind {
        MetricKind::Precision
    }

    fn evaluate(&self, predictions: &Array2<f64>, ground_truth: &Array2<f64>) -> Result<f64> {
        check_inputs(predictions, ground_truth)?;
        let counts = ClassCounts::from(predictions, ground_truth);
        let per_class: Vec<f64> = counts
            .true_positives
            .iter()
            .zip(&counts.predicted)
            .map(|(&tp, &n)| if n > 0 { tp as f64 / n as f64 } else { 0.0 })
            .collect();
        Ok(per_class.iter().sum::<f64>() / per_class.len() as f64)
    }
}

/// Macro-averaged recall over the labels present in the ground truth
#[derive(Debug, Clone, Copy, Default)]
pub struct Recall;

impl Metric for Recall {
    fn kind(&self) -> MetricKind {
        MetricKind::Recall
    }

    fn evaluate(&self, predictions: &Array2<f64>, ground_truth: &Array2<f64>) -> Result<f64> {
        check_inputs(predictions, ground_truth)?;
        let counts = ClassCounts::from(predictions, ground_truth);
        let per_class: Vec<f64> = counts
            .true_positives
            .iter()
            .zip(&counts.actual)
            .filter(|(_, &n)| n > 0)
            .map(|(&tp, &n)| tp as f64 / n as f64)
            .collect();
        Ok(per_class.iter().sum::<f64>() / per_class.len() as f64)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::array;

    #[test]
    fn test_accuracy_one_hot_rows() {
        let truth = array![[1.0, 0.0], [0.0, 1.0], [1.0, 0.0], [0.0, 1.0]];
        let pred = array![[1.0, 0.0], [0.0, 1.0], [0.0, 1.0], [0.0, 1.0]];
        assert_eq!(Accuracy.evaluate(&pred, &truth).unwrap(), 0.75);
    }

    #[test]
    fn test_precision_and_recall() {
        // truth: 0 0 1 1 ; pred: 0 1 1 1
        let truth = array![[0.0], [0.0], [1.0], [1.0]];
        let pred = array![[0.0], [1.0], [1.0], [1.0]];

        // precision: class0 1/1, class1 2/3
        let precision = Precision.evaluate(&pred, &truth).unwrap();
        assert!((precision - (1.0 + 2.0 / 3.0) / 2.0).abs() < 1e-12);

        // recall: class0 1/2, class1 2/2
        let recall = Recall.evaluate(&pred, &truth).unwrap();
        assert!((recall - 0.75).abs() < 1e-12);
    }

    #[test]
    fn test_precision_unpredicted_class_scores_zero() {
        let truth = array![[1.0, 0.0], [0.0, 1.0]];
        let pred = array![[1.0, 0.0], [1.0, 0.0]];
        assert_eq!(Precision.evaluate(&pred, &truth).unwrap(), 0.25);
        assert_eq!(Recall.evaluate(&pred, &truth).unwrap(), 0.5);
    }
}
