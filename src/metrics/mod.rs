//! Evaluation metrics
//!
//! Every metric is called as `evaluate(predictions, ground_truth)`. Both
//! matrices share the target layout produced by the pipeline: a single
//! column for regression and label targets, one-hot rows for categorical
//! targets.

mod classification;
mod regression;

pub use classification::{Accuracy, Precision, Recall};
pub use regression::{MeanAbsoluteError, MeanSquaredError, RSquared};

use ndarray::Array2;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

use crate::error::{AutoopError, Result};
use crate::training::TaskKind;

/// A scalar score over predictions and ground truth
pub trait Metric: Send + Sync + fmt::Debug {
    fn kind(&self) -> MetricKind;

    fn display_name(&self) -> &'static str {
        self.kind().display_name()
    }

    /// Score `predictions` against `ground_truth`, in that argument order
    fn evaluate(&self, predictions: &Array2<f64>, ground_truth: &Array2<f64>) -> Result<f64>;
}

/// Every built-in metric
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MetricKind {
    Accuracy,
    Precision,
    Recall,
    MeanSquaredError,
    MeanAbsoluteError,
    RSquared,
}

impl MetricKind {
    pub const ALL: [MetricKind; 6] = [
        MetricKind::Accuracy,
        MetricKind::Precision,
        MetricKind::Recall,
        MetricKind::MeanSquaredError,
        MetricKind::MeanAbsoluteError,
        MetricKind::RSquared,
    ];

    pub fn display_name(&self) -> &'static str {
        match self {
            MetricKind::Accuracy => "Accuracy",
            MetricKind::Precision => "Precision",
            MetricKind::Recall => "Recall",
            MetricKind::MeanSquaredError => "Mean Squared Error",
            MetricKind::MeanAbsoluteError => "Mean Absolute Error",
            MetricKind::RSquared => "R Squared",
        }
    }

    pub fn task_kind(&self) -> TaskKind {
        match self {
            MetricKind::Accuracy | MetricKind::Precision | MetricKind::Recall => {
                TaskKind::Classification
            }
            MetricKind::MeanSquaredError | MetricKind::MeanAbsoluteError | MetricKind::RSquared => {
                TaskKind::Regression
            }
        }
    }
}

impl fmt::Display for MetricKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.display_name())
    }
}

impl FromStr for MetricKind {
    type Err = AutoopError;

    fn from_str(s: &str) -> Result<Self> {
        let key: String = s
            .chars()
            .filter(|c| !matches!(c, ' ' | '_' | '-'))
            .flat_map(|c| c.to_lowercase())
            .collect();
        match key.as_str() {
            "accuracy" | "acc" => Ok(MetricKind::Accuracy),
            "precision" => Ok(MetricKind::Precision),
            "recall" => Ok(MetricKind::Recall),
            "meansquarederror" | "mse" => Ok(MetricKind::MeanSquaredError),
            "meanabsoluteerror" | "mae" => Ok(MetricKind::MeanAbsoluteError),
            "rsquared" | "r2" => Ok(MetricKind::RSquared),
            _ => Err(AutoopError::InvalidInput(format!("unknown metric '{}'", s))),
        }
    }
}

/// Builds a metric instance
pub type MetricFactory = fn() -> Box<dyn Metric>;

/// Enum-keyed factory map for metrics
#[derive(Clone)]
pub struct MetricRegistry {
    entries: BTreeMap<MetricKind, MetricFactory>,
}

impl Default for MetricRegistry {
    fn default() -> Self {
        Self::with_defaults()
    }
}

impl fmt::Debug for MetricRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("MetricRegistry")
            .field("kinds", &self.entries.keys().collect::<Vec<_>>())
            .finish()
    }
}

impl MetricRegistry {
    pub fn empty() -> Self {
        Self {
            entries: BTreeMap::new(),
        }
    }

    pub fn with_defaults() -> Self {
        let mut registry = Self::empty();
        registry.register(MetricKind::Accuracy, || Box::new(Accuracy));
        registry.register(MetricKind::Precision, || Box::new(Precision));
        registry.register(MetricKind::Recall, || Box::new(Recall));
        registry.register(MetricKind::MeanSquaredError, || Box::new(MeanSquaredError));
        registry.register(MetricKind::MeanAbsoluteError, || Box::new(MeanAbsoluteError));
        registry.register(MetricKind::RSquared, || Box::new(RSquared));
        registry
    }

    pub fn register(&mut self, kind: MetricKind, factory: MetricFactory) {
        self.entries.insert(kind, factory);
    }

    pub fn lookup(&self, kind: MetricKind) -> Result<Box<dyn Metric>> {
        self.entries
            .get(&kind)
            .map(|factory| factory())
            .ok_or_else(|| AutoopError::InvalidInput(format!("metric '{}' is not registered", kind)))
    }

    pub fn kinds(&self) -> Vec<MetricKind> {
        self.entries.keys().copied().collect()
    }

    pub fn for_task(&self, task: TaskKind) -> Vec<MetricKind> {
        self.entries
            .keys()
            .copied()
            .filter(|k| k.task_kind() == task)
            .collect()
    }
}

/// Shared precondition: same shape, at least one row
pub(crate) fn check_inputs(predictions: &Array2<f64>, ground_truth: &Array2<f64>) -> Result<()> {
    if predictions.dim() != ground_truth.dim() {
        return Err(AutoopError::InvalidInput(format!(
            "predictions {:?} and ground truth {:?} differ in shape",
            predictions.dim(),
            ground_truth.dim()
        )));
    }
    if predictions.nrows() == 0 {
        return Err(AutoopError::InvalidInput(
            "cannot evaluate a metric on zero rows".to_string(),
        ));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::array;

    #[test]
    fn test_parse_metric_kind() {
        assert_eq!("mse".parse::<MetricKind>().unwrap(), MetricKind::MeanSquaredError);
        assert_eq!("R Squared".parse::<MetricKind>().unwrap(), MetricKind::RSquared);
        assert!("f1".parse::<MetricKind>().is_err());
    }

    #[test]
    fn test_registry_lookup() {
        let registry = MetricRegistry::with_defaults();
        for kind in MetricKind::ALL {
            let metric = registry.lookup(kind).unwrap();
            assert_eq!(metric.kind(), kind);
            assert_eq!(metric.display_name(), kind.display_name());
        }
        assert_eq!(registry.for_task(TaskKind::Regression).len(), 3);
    }

    #[test]
    fn test_shape_mismatch() {
        let err = Accuracy
            .evaluate(&array![[1.0], [0.0]], &array![[1.0]])
            .unwrap_err();
        assert!(matches!(err, AutoopError::InvalidInput(_)));
    }
}
