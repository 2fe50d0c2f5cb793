//! Pipeline orchestration
//!
//! A [`Pipeline`] drives one run through the stages
//! `Configured -> Encoded -> Split -> Trained -> Evaluated`. Each stage
//! checks that its prerequisite ran and fails with
//! [`AutoopError::StageNotReady`] otherwise. Running an earlier stage again
//! discards everything computed after it.
//!
//! ```no_run
//! use autoop::prelude::*;
//!
//! # fn main() -> autoop::Result<()> {
//! let dataset = Dataset::from_csv_path("people.csv".as_ref())?;
//! let features = detect_feature_types(&dataset)?;
//! let (target, inputs): (Vec<_>, Vec<_>) = features.into_iter().partition(|f| f.name == "age");
//!
//! let model = ModelRegistry::with_defaults().lookup(ModelKind::MultipleLinearRegression)?;
//! let config = PipelineConfig::new(dataset, target[0].clone(), model)
//!     .with_input_features(inputs)
//!     .with_metric(Box::new(MeanSquaredError))
//!     .with_split(0.8);
//!
//! let result = Pipeline::new(config)?.execute()?;
//! # Ok(())
//! # }
//! ```

mod export;
mod restore;

pub use export::{PipelineManifest, CONFIG_ARTIFACT, CONFIG_TYPE, MODEL_TYPE};
pub use restore::RestoredPipeline;

use std::collections::BTreeSet;
use std::fmt;

use ndarray::{concatenate, s, Array2, ArrayView2, Axis};
use serde::Serialize;
use tracing::{debug, info};

use crate::dataset::Dataset;
use crate::error::{AutoopError, Result};
use crate::features::{ColumnData, Feature, FeatureKind};
use crate::metrics::{Metric, MetricKind};
use crate::preprocessing::{preprocess_features, EncodedFeature, EncoderRecord};
use crate::training::{Model, TaskKind};

/// Train fraction used when none is given
pub const DEFAULT_SPLIT: f64 = 0.8;

/// Immutable description of one run
#[derive(Debug)]
pub struct PipelineConfig {
    dataset: Dataset,
    target: Feature,
    input_features: Vec<Feature>,
    model: Box<dyn Model>,
    metrics: Vec<Box<dyn Metric>>,
    split: f64,
}

impl PipelineConfig {
    pub fn new(dataset: Dataset, target: Feature, model: Box<dyn Model>) -> Self {
        Self {
            dataset,
            target,
            input_features: Vec::new(),
            model,
            metrics: Vec::new(),
            split: DEFAULT_SPLIT,
        }
    }

    pub fn with_input_features(mut self, features: Vec<Feature>) -> Self {
        self.input_features = features;
        self
    }

    pub fn with_metric(mut self, metric: Box<dyn Metric>) -> Self {
        self.metrics.push(metric);
        self
    }

    pub fn with_metrics(mut self, metrics: Vec<Box<dyn Metric>>) -> Self {
        self.metrics.extend(metrics);
        self
    }

    /// Fraction of rows, counted from the top, used for training
    pub fn with_split(mut self, split: f64) -> Self {
        self.split = split;
        self
    }

    pub fn dataset(&self) -> &Dataset {
        &self.dataset
    }

    pub fn target(&self) -> &Feature {
        &self.target
    }

    pub fn input_features(&self) -> &[Feature] {
        &self.input_features
    }

    pub fn model(&self) -> &dyn Model {
        self.model.as_ref()
    }

    pub fn metric_kinds(&self) -> Vec<MetricKind> {
        self.metrics.iter().map(|m| m.kind()).collect()
    }

    pub fn split(&self) -> f64 {
        self.split
    }

    fn validate(&self) -> Result<()> {
        let task = self.model.task_kind();
        let compatible = matches!(
            (self.target.kind, task),
            (FeatureKind::Categorical, TaskKind::Classification)
                | (FeatureKind::Numerical, TaskKind::Regression)
        );
        if !compatible {
            return Err(AutoopError::IncompatibleModel {
                feature_kind: self.target.kind,
                task_kind: task,
            });
        }
        if self.input_features.is_empty() {
            return Err(AutoopError::EmptyInputFeatures);
        }
        if !(self.split > 0.0 && self.split < 1.0) {
            return Err(AutoopError::InvalidInput(format!(
                "split must lie in (0, 1), got {}",
                self.split
            )));
        }
        if self.metrics.is_empty() {
            return Err(AutoopError::InvalidInput(
                "at least one metric is required".to_string(),
            ));
        }

        let mut seen = BTreeSet::new();
        for feature in &self.input_features {
            if feature.name == self.target.name {
                return Err(AutoopError::InvalidInput(format!(
                    "target '{}' is also an input feature",
                    feature.name
                )));
            }
            if !seen.insert(feature.name.as_str()) {
                return Err(AutoopError::InvalidInput(format!(
                    "input feature '{}' is listed twice",
                    feature.name
                )));
            }
        }
        Ok(())
    }
}

/// Where a pipeline is in its run
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum PipelineStage {
    Configured,
    Encoded,
    Split,
    Trained,
    Evaluated,
}

impl PipelineStage {
    pub fn as_str(&self) -> &'static str {
        match self {
            PipelineStage::Configured => "configured",
            PipelineStage::Encoded => "encoded",
            PipelineStage::Split => "split",
            PipelineStage::Trained => "trained",
            PipelineStage::Evaluated => "evaluated",
        }
    }
}

impl fmt::Display for PipelineStage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One metric's score
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct MetricScore {
    pub kind: MetricKind,
    pub value: f64,
}

/// Outcome of [`Pipeline::evaluate`]
#[derive(Debug, Clone, PartialEq)]
pub struct PipelineResult {
    /// Scores on the test partition, in configuration order
    pub metrics: Vec<MetricScore>,
    /// Scores on the train partition
    pub train_metrics: Vec<MetricScore>,
    pub test_predictions: Array2<f64>,
    pub train_predictions: Array2<f64>,
}

impl PipelineResult {
    /// Test score for `kind`, if it was configured
    pub fn metric(&self, kind: MetricKind) -> Option<f64> {
        self.metrics.iter().find(|m| m.kind == kind).map(|m| m.value)
    }
}

/// Train/test halves of one matrix
#[derive(Debug, Clone)]
struct Partition {
    train: Array2<f64>,
    test: Array2<f64>,
}

/// Mutable working state of a run
#[derive(Debug, Default)]
struct PipelineRun {
    /// Every encoded feature, target included, sorted by name
    encoded: Vec<EncodedFeature>,
    target: Option<Array2<f64>>,
    /// One matrix per input feature, sorted by name
    inputs: Vec<Array2<f64>>,
    target_split: Option<Partition>,
    input_splits: Vec<Partition>,
    result: Option<PipelineResult>,
}

/// Single-owner state machine for one configured run
#[derive(Debug)]
pub struct Pipeline {
    config: PipelineConfig,
    stage: PipelineStage,
    run: PipelineRun,
}

/// Concatenate `(n, k_i)` matrices column-wise into one `(n, sum k_i)` matrix
pub fn compact(matrices: &[Array2<f64>]) -> Result<Array2<f64>> {
    if matrices.is_empty() {
        return Err(AutoopError::EmptyInputFeatures);
    }
    let views: Vec<ArrayView2<f64>> = matrices.iter().map(|m| m.view()).collect();
    Ok(concatenate(Axis(1), &views)?)
}

impl Pipeline {
    /// Validate the configuration.
    ///
    /// Fails with [`AutoopError::IncompatibleModel`] when the target kind
    /// does not match the model's task, [`AutoopError::EmptyInputFeatures`]
    /// without inputs, and [`AutoopError::InvalidInput`] for a split outside
    /// `(0, 1)`, an empty metric list or overlapping feature names.
    pub fn new(config: PipelineConfig) -> Result<Self> {
        config.validate()?;
        Ok(Self {
            config,
            stage: PipelineStage::Configured,
            run: PipelineRun::default(),
        })
    }

    pub fn config(&self) -> &PipelineConfig {
        &self.config
    }

    pub fn stage(&self) -> PipelineStage {
        self.stage
    }

    fn require(&self, stage: &'static str, required: PipelineStage) -> Result<()> {
        if self.stage < required {
            return Err(AutoopError::StageNotReady {
                stage,
                required: required.as_str(),
            });
        }
        Ok(())
    }

    /// Encode the target and every input feature
    pub fn encode(&mut self) -> Result<()> {
        let mut features = Vec::with_capacity(self.config.input_features.len() + 1);
        features.push(self.config.target.clone());
        features.extend(self.config.input_features.iter().cloned());

        let encoded = preprocess_features(&features, &self.config.dataset)?;

        let mut target = None;
        let mut inputs = Vec::with_capacity(encoded.len().saturating_sub(1));
        for feature in &encoded {
            if feature.name == self.config.target.name {
                target = Some(feature.data.clone());
            } else {
                inputs.push(feature.data.clone());
            }
        }
        let target = target.ok_or_else(|| {
            AutoopError::FeatureNotFound(self.config.target.name.clone())
        })?;

        info!(
            dataset = %self.config.dataset.name(),
            features = encoded.len(),
            rows = target.nrows(),
            "encoded features"
        );
        self.run = PipelineRun {
            encoded,
            target: Some(target),
            inputs,
            ..PipelineRun::default()
        };
        self.stage = PipelineStage::Encoded;
        Ok(())
    }

    /// Sequential split: the first `floor(split * n)` rows train, the rest
    /// test. Row order is preserved.
    pub fn split(&mut self) -> Result<()> {
        self.require("split", PipelineStage::Encoded)?;
        let target = self.run.target.as_ref().ok_or(AutoopError::StageNotReady {
            stage: "split",
            required: "encoded",
        })?;

        let n_rows = target.nrows();
        let n_train = (self.config.split * n_rows as f64).floor() as usize;
        if n_train == 0 || n_train == n_rows {
            return Err(AutoopError::InvalidInput(format!(
                "split {} of {} rows leaves an empty partition",
                self.config.split, n_rows
            )));
        }

        let target_split = split_rows(target, n_train)?;
        let input_splits = self
            .run
            .inputs
            .iter()
            .map(|m| split_rows(m, n_train))
            .collect::<Result<Vec<_>>>()?;

        info!(train = n_train, test = n_rows - n_train, "split rows");
        self.run.target_split = Some(target_split);
        self.run.input_splits = input_splits;
        self.run.result = None;
        self.stage = PipelineStage::Split;
        Ok(())
    }

    /// Fit the model on the train partition
    pub fn train(&mut self) -> Result<()> {
        self.require("train", PipelineStage::Split)?;
        let y_train = match &self.run.target_split {
            Some(p) => &p.train,
            None => {
                return Err(AutoopError::StageNotReady {
                    stage: "train",
                    required: "split",
                })
            }
        };
        let train_inputs: Vec<Array2<f64>> =
            self.run.input_splits.iter().map(|p| p.train.clone()).collect();
        let x_train = compact(&train_inputs)?;

        debug!(rows = x_train.nrows(), cols = x_train.ncols(), "training matrix");
        self.config.model.fit(&x_train, y_train)?;

        info!(model = %self.config.model.kind(), "trained model");
        self.run.result = None;
        self.stage = PipelineStage::Trained;
        Ok(())
    }

    /// Predict both partitions and score every configured metric
    pub fn evaluate(&mut self) -> Result<&PipelineResult> {
        self.require("evaluate", PipelineStage::Trained)?;
        let target = self.run.target_split.as_ref().ok_or(AutoopError::StageNotReady {
            stage: "evaluate",
            required: "trained",
        })?;

        let test_inputs: Vec<Array2<f64>> =
            self.run.input_splits.iter().map(|p| p.test.clone()).collect();
        let train_inputs: Vec<Array2<f64>> =
            self.run.input_splits.iter().map(|p| p.train.clone()).collect();

        let test_predictions = self.config.model.predict(&compact(&test_inputs)?)?;
        let train_predictions = self.config.model.predict(&compact(&train_inputs)?)?;

        let metrics = self.score(&test_predictions, &target.test)?;
        let train_metrics = self.score(&train_predictions, &target.train)?;

        for score in &metrics {
            info!(metric = %score.kind, value = score.value, "test score");
        }

        self.stage = PipelineStage::Evaluated;
        Ok(self.run.result.insert(PipelineResult {
            metrics,
            train_metrics,
            test_predictions,
            train_predictions,
        }))
    }

    fn score(&self, predictions: &Array2<f64>, ground_truth: &Array2<f64>) -> Result<Vec<MetricScore>> {
        self.config
            .metrics
            .iter()
            .map(|metric| {
                Ok(MetricScore {
                    kind: metric.kind(),
                    value: metric.evaluate(predictions, ground_truth)?,
                })
            })
            .collect()
    }

    /// Run every stage in order
    pub fn execute(&mut self) -> Result<PipelineResult> {
        self.encode()?;
        self.split()?;
        self.train()?;
        Ok(self.evaluate()?.clone())
    }

    /// Result of the last evaluation
    pub fn result(&self) -> Option<&PipelineResult> {
        self.run.result.as_ref()
    }

    /// Encoded features, target included, sorted by name
    pub fn encoded_features(&self) -> &[EncodedFeature] {
        &self.run.encoded
    }

    /// Fitted encoder of one feature
    pub fn encoder(&self, name: &str) -> Option<&EncoderRecord> {
        self.run
            .encoded
            .iter()
            .find(|e| e.name == name)
            .map(|e| &e.record)
    }

    /// Predict on new data by replaying the fitted input encoders
    pub fn predict(&self, dataset: &Dataset) -> Result<Array2<f64>> {
        self.require("predict", PipelineStage::Trained)?;
        let records: Vec<(&Feature, &EncoderRecord)> = self
            .sorted_inputs()
            .into_iter()
            .map(|f| {
                self.encoder(&f.name)
                    .map(|r| (f, r))
                    .ok_or_else(|| AutoopError::FeatureNotFound(f.name.clone()))
            })
            .collect::<Result<_>>()?;
        let x = replay_encoders(&records, dataset)?;
        self.config.model.predict(&x)
    }

    fn sorted_inputs(&self) -> Vec<&Feature> {
        let mut inputs: Vec<&Feature> = self.config.input_features.iter().collect();
        inputs.sort_by(|a, b| a.name.cmp(&b.name));
        inputs
    }
}

fn split_rows(matrix: &Array2<f64>, n_train: usize) -> Result<Partition> {
    if n_train > matrix.nrows() {
        return Err(AutoopError::ShapeError {
            expected: format!("at least {} rows", n_train),
            actual: format!("{} rows", matrix.nrows()),
        });
    }
    Ok(Partition {
        train: matrix.slice(s![..n_train, ..]).to_owned(),
        test: matrix.slice(s![n_train.., ..]).to_owned(),
    })
}

/// Encode `dataset` with stored records, in the given feature order, and
/// compact the result
pub(crate) fn replay_encoders(
    records: &[(&Feature, &EncoderRecord)],
    dataset: &Dataset,
) -> Result<Array2<f64>> {
    let df = dataset.read()?;
    let matrices = records
        .iter()
        .map(|(feature, record)| {
            let data = ColumnData::from_frame(&df, &feature.name, feature.kind)?;
            record.transform(&data)
        })
        .collect::<Result<Vec<_>>>()?;
    compact(&matrices)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::features::detect_feature_types;
    use crate::metrics::{Accuracy, MeanSquaredError, RSquared};
    use crate::training::{ModelKind, ModelRegistry};
    use ndarray::array;

    fn people() -> Dataset {
        Dataset::from_csv_bytes(
            "people",
            "datasets/people.csv",
            b"age,color\n1,a\n2,b\n3,a\n4,b\n5,a\n".to_vec(),
        )
    }

    fn feature(features: &[Feature], name: &str) -> Feature {
        features.iter().find(|f| f.name == name).unwrap().clone()
    }

    fn regression_pipeline() -> Pipeline {
        let ds = people();
        let features = detect_feature_types(&ds).unwrap();
        let model = ModelRegistry::with_defaults()
            .lookup(ModelKind::MultipleLinearRegression)
            .unwrap();
        let config = PipelineConfig::new(ds, feature(&features, "age"), model)
            .with_input_features(vec![feature(&features, "color")])
            .with_metric(Box::new(MeanSquaredError))
            .with_split(0.8);
        Pipeline::new(config).unwrap()
    }

    #[test]
    fn test_compact_concatenates_columns() {
        let a = array![[1.0], [2.0]];
        let b = array![[3.0, 4.0], [5.0, 6.0]];
        assert_eq!(compact(&[a, b]).unwrap(), array![[1.0, 3.0, 4.0], [2.0, 5.0, 6.0]]);
        assert!(matches!(compact(&[]), Err(AutoopError::EmptyInputFeatures)));
    }

    #[test]
    fn test_stage_order_enforced() {
        let mut pipeline = regression_pipeline();
        assert_eq!(pipeline.stage(), PipelineStage::Configured);
        assert!(matches!(
            pipeline.split(),
            Err(AutoopError::StageNotReady { stage: "split", required: "encoded" })
        ));
        assert!(matches!(pipeline.train(), Err(AutoopError::StageNotReady { .. })));
        assert!(matches!(pipeline.evaluate(), Err(AutoopError::StageNotReady { .. })));

        pipeline.encode().unwrap();
        assert!(matches!(pipeline.train(), Err(AutoopError::StageNotReady { .. })));
    }

    #[test]
    fn test_split_sizes() {
        let mut pipeline = regression_pipeline();
        pipeline.encode().unwrap();
        pipeline.split().unwrap();

        let target = pipeline.run.target_split.as_ref().unwrap();
        assert_eq!(target.train.nrows(), 4);
        assert_eq!(target.test.nrows(), 1);
        for part in &pipeline.run.input_splits {
            assert_eq!(part.train.nrows() + part.test.nrows(), 5);
            assert_eq!(part.train.ncols(), 2);
        }
    }

    #[test]
    fn test_reencode_resets_downstream() {
        let mut pipeline = regression_pipeline();
        pipeline.execute().unwrap();
        assert_eq!(pipeline.stage(), PipelineStage::Evaluated);

        pipeline.encode().unwrap();
        assert_eq!(pipeline.stage(), PipelineStage::Encoded);
        assert!(pipeline.result().is_none());
        assert!(pipeline.run.target_split.is_none());
    }

    #[test]
    fn test_incompatible_model() {
        let ds = people();
        let features = detect_feature_types(&ds).unwrap();
        let model = ModelRegistry::with_defaults()
            .lookup(ModelKind::NearestCentroid)
            .unwrap();
        let config = PipelineConfig::new(ds, feature(&features, "age"), model)
            .with_input_features(vec![feature(&features, "color")])
            .with_metric(Box::new(Accuracy));
        let err = Pipeline::new(config).unwrap_err();
        let message = err.to_string();
        assert!(message.contains("numerical"));
        assert!(message.contains("classification"));
    }

    #[test]
    fn test_invalid_configurations() {
        let ds = people();
        let registry = ModelRegistry::with_defaults();
        let model = || registry.lookup(ModelKind::MultipleLinearRegression).unwrap();

        let no_inputs = PipelineConfig::new(ds.clone(), Feature::numerical("age"), model())
            .with_metric(Box::new(RSquared));
        assert!(matches!(Pipeline::new(no_inputs), Err(AutoopError::EmptyInputFeatures)));

        let bad_split = PipelineConfig::new(ds.clone(), Feature::numerical("age"), model())
            .with_input_features(vec![Feature::categorical("color")])
            .with_metric(Box::new(RSquared))
            .with_split(1.0);
        assert!(matches!(Pipeline::new(bad_split), Err(AutoopError::InvalidInput(_))));

        let no_metrics = PipelineConfig::new(ds.clone(), Feature::numerical("age"), model())
            .with_input_features(vec![Feature::categorical("color")]);
        assert!(matches!(Pipeline::new(no_metrics), Err(AutoopError::InvalidInput(_))));

        let target_as_input = PipelineConfig::new(ds, Feature::numerical("age"), model())
            .with_input_features(vec![Feature::numerical("age")])
            .with_metric(Box::new(RSquared));
        assert!(matches!(Pipeline::new(target_as_input), Err(AutoopError::InvalidInput(_))));
    }

    #[test]
    fn test_predict_matches_evaluation() {
        let mut pipeline = regression_pipeline();
        let result = pipeline.execute().unwrap();

        let all = pipeline.predict(&people()).unwrap();
        assert_eq!(all.slice(s![4.., ..]), result.test_predictions);
        assert_eq!(all.slice(s![..4, ..]), result.train_predictions);
    }
}
