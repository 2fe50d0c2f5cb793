//! Rebuild a trained pipeline from its exported artifacts

use std::collections::BTreeMap;

use ndarray::Array2;
use tracing::info;

use super::export::{encoder_feature, PipelineManifest, CONFIG_TYPE, MODEL_TYPE};
use super::replay_encoders;
use crate::artifact::Artifact;
use crate::dataset::Dataset;
use crate::error::{AutoopError, Result};
use crate::features::{Feature, FeatureKind};
use crate::preprocessing::EncoderRecord;
use crate::training::{argmax, Model, ModelRegistry};

/// A fitted model with the encoders it was trained behind.
///
/// Prediction replays the stored encoders on raw data; nothing is refit.
#[derive(Debug)]
pub struct RestoredPipeline {
    manifest: PipelineManifest,
    encoders: BTreeMap<String, EncoderRecord>,
    model: Box<dyn Model>,
}

impl RestoredPipeline {
    /// Restore with the built-in model registry
    pub fn from_artifacts(artifacts: &[Artifact]) -> Result<Self> {
        Self::from_artifacts_with(artifacts, &ModelRegistry::with_defaults())
    }

    pub fn from_artifacts_with(artifacts: &[Artifact], models: &ModelRegistry) -> Result<Self> {
        let config = artifacts
            .iter()
            .find(|a| a.type_tag == CONFIG_TYPE)
            .ok_or_else(|| AutoopError::ArtifactNotFound("pipeline_config".to_string()))?;
        let manifest = PipelineManifest::from_bytes(&config.data)?;

        let mut encoders = BTreeMap::new();
        for artifact in artifacts {
            if let Some(feature) = encoder_feature(&artifact.name) {
                encoders.insert(feature.to_string(), EncoderRecord::from_bytes(&artifact.data)?);
            }
        }
        for feature in manifest.input_features.iter().chain([&manifest.target_feature]) {
            match encoders.get(&feature.name) {
                Some(record) if record.feature_kind() == feature.kind => {}
                Some(record) => {
                    return Err(AutoopError::InvalidInput(format!(
                        "encoder for '{}' is a {}, expected a {} encoder",
                        feature.name,
                        record.type_tag(),
                        feature.kind
                    )))
                }
                None => {
                    return Err(AutoopError::ArtifactNotFound(format!(
                        "encoder:{}",
                        feature.name
                    )))
                }
            }
        }

        let model_artifact = artifacts
            .iter()
            .find(|a| a.type_tag == MODEL_TYPE)
            .ok_or_else(|| AutoopError::ArtifactNotFound("model".to_string()))?;
        let model = models.restore(manifest.model_kind, &model_artifact.data)?;

        info!(
            pipeline = %manifest.name,
            model = %manifest.model_kind,
            encoders = encoders.len(),
            "restored pipeline"
        );
        Ok(Self {
            manifest,
            encoders,
            model,
        })
    }

    pub fn manifest(&self) -> &PipelineManifest {
        &self.manifest
    }

    pub fn model(&self) -> &dyn Model {
        self.model.as_ref()
    }

    pub fn encoder(&self, feature: &str) -> Option<&EncoderRecord> {
        self.encoders.get(feature)
    }

    /// Predictions in the encoded target space, the same values the live
    /// pipeline produces for the same rows
    pub fn predict(&self, dataset: &Dataset) -> Result<Array2<f64>> {
        let mut inputs: Vec<&Feature> = self.manifest.input_features.iter().collect();
        inputs.sort_by(|a, b| a.name.cmp(&b.name));

        let records = inputs
            .into_iter()
            .map(|f| {
                self.encoders
                    .get(&f.name)
                    .map(|r| (f, r))
                    .ok_or_else(|| AutoopError::ArtifactNotFound(format!("encoder:{}", f.name)))
            })
            .collect::<Result<Vec<_>>>()?;

        let x = replay_encoders(&records, dataset)?;
        self.model.predict(&x)
    }

    /// Predictions mapped back to the target's original values: category
    /// names for categorical targets, unscaled numbers for numerical ones
    pub fn predict_labels(&self, dataset: &Dataset) -> Result<Vec<String>> {
        let predictions = self.predict(dataset)?;
        let target = &self.manifest.target_feature;
        let record = self
            .encoders
            .get(&target.name)
            .ok_or_else(|| AutoopError::ArtifactNotFound(format!("encoder:{}", target.name)))?;

        match (target.kind, record) {
            (FeatureKind::Categorical, EncoderRecord::OneHotEncoder(encoder)) => predictions
                .rows()
                .into_iter()
                .map(|row| {
                    let idx = argmax(&row.to_vec());
                    encoder.categories.get(idx).cloned().ok_or_else(|| {
                        AutoopError::ShapeError {
                            expected: format!("{} categories", encoder.categories.len()),
                            actual: format!("{} columns", row.len()),
                        }
                    })
                })
                .collect(),
            (FeatureKind::Numerical, EncoderRecord::StandardScaler(scaler)) => Ok(scaler
                .inverse_transform(&predictions)?
                .iter()
                .map(|v| v.to_string())
                .collect()),
            _ => Err(AutoopError::InvalidInput(format!(
                "target '{}' has a mismatched encoder",
                target.name
            ))),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::features::detect_feature_types;
    use crate::metrics::{MeanSquaredError, Precision};
    use crate::pipeline::{Pipeline, PipelineConfig};
    use crate::training::ModelKind;

    fn dataset() -> Dataset {
        Dataset::from_csv_bytes(
            "shapes",
            "datasets/shapes.csv",
            b"x,y,shape,area\n1,1,square,1\n1,3,rect,3\n2,2,square,4\n2,4,rect,8\n3,3,square,9\n3,5,rect,15\n"
                .to_vec(),
        )
    }

    fn trained(target: &str, kind: ModelKind) -> Pipeline {
        let ds = dataset();
        let features = detect_feature_types(&ds).unwrap();
        let (t, inputs): (Vec<_>, Vec<_>) =
            features.into_iter().partition(|f| f.name == target);
        let model = ModelRegistry::with_defaults().lookup(kind).unwrap();
        let metric: Box<dyn crate::metrics::Metric> = match kind.task_kind() {
            crate::training::TaskKind::Regression => Box::new(MeanSquaredError),
            crate::training::TaskKind::Classification => Box::new(Precision),
        };
        let config = PipelineConfig::new(ds, t[0].clone(), model)
            .with_input_features(inputs)
            .with_metric(metric)
            .with_split(0.5);
        let mut pipeline = Pipeline::new(config).unwrap();
        pipeline.execute().unwrap();
        pipeline
    }

    #[test]
    fn test_restored_predictions_match() {
        let pipeline = trained("shape", ModelKind::KNearestNeighbors);
        let restored = RestoredPipeline::from_artifacts(&pipeline.artifacts("shapes").unwrap()).unwrap();
        assert_eq!(
            restored.predict(&dataset()).unwrap(),
            pipeline.predict(&dataset()).unwrap()
        );
        assert_eq!(restored.manifest().model_kind, ModelKind::KNearestNeighbors);
    }

    #[test]
    fn test_predict_labels_categorical() {
        let pipeline = trained("shape", ModelKind::NearestCentroid);
        let restored = RestoredPipeline::from_artifacts(&pipeline.artifacts("shapes").unwrap()).unwrap();
        let labels = restored.predict_labels(&dataset()).unwrap();
        assert_eq!(labels.len(), 6);
        assert!(labels.iter().all(|l| l == "square" || l == "rect"));
    }

    #[test]
    fn test_predict_labels_numerical_unscaled() {
        let pipeline = trained("area", ModelKind::MultipleLinearRegression);
        let restored = RestoredPipeline::from_artifacts(&pipeline.artifacts("shapes").unwrap()).unwrap();
        let labels = restored.predict_labels(&dataset()).unwrap();
        let values: Vec<f64> = labels.iter().map(|l| l.parse().unwrap()).collect();
        // area is 1..15, so unscaled predictions sit well away from the
        // standardized range
        assert!(values.iter().any(|v| v.abs() > 3.0));
    }

    #[test]
    fn test_missing_model_artifact() {
        let pipeline = trained("shape", ModelKind::NearestCentroid);
        let artifacts: Vec<Artifact> = pipeline
            .artifacts("shapes")
            .unwrap()
            .into_iter()
            .filter(|a| a.type_tag != MODEL_TYPE)
            .collect();
        assert!(matches!(
            RestoredPipeline::from_artifacts(&artifacts),
            Err(AutoopError::ArtifactNotFound(_))
        ));
    }

    #[test]
    fn test_missing_encoder_artifact() {
        let pipeline = trained("shape", ModelKind::NearestCentroid);
        let artifacts: Vec<Artifact> = pipeline
            .artifacts("shapes")
            .unwrap()
            .into_iter()
            .filter(|a| a.name != "encoder:x")
            .collect();
        assert!(matches!(
            RestoredPipeline::from_artifacts(&artifacts),
            Err(AutoopError::ArtifactNotFound(_))
        ));
    }
}
