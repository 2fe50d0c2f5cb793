//! Artifact export
//!
//! Produces in-memory artifacts for a pipeline; persisting them is the
//! caller's business (see [`crate::artifact::ArtifactStore`]).

use serde::{Deserialize, Serialize};

use super::Pipeline;
use crate::artifact::{sha256_hex, Artifact};
use crate::error::{AutoopError, Result};
use crate::features::Feature;
use crate::metrics::MetricKind;
use crate::training::{Hyperparameters, ModelKind};

/// Name of the configuration artifact
pub const CONFIG_ARTIFACT: &str = "pipeline_config";
/// Type tag of the configuration artifact
pub const CONFIG_TYPE: &str = "pipeline_config";
/// Type tag of model artifacts
pub const MODEL_TYPE: &str = "model";

const ENCODER_PREFIX: &str = "encoder:";

/// Serialized form of a pipeline configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PipelineManifest {
    pub name: String,
    pub dataset: String,
    pub input_features: Vec<Feature>,
    pub target_feature: Feature,
    pub split: f64,
    pub model_kind: ModelKind,
    pub hyperparameters: Hyperparameters,
    pub metrics: Vec<MetricKind>,
}

impl PipelineManifest {
    pub fn to_bytes(&self) -> Result<Vec<u8>> {
        Ok(serde_json::to_vec_pretty(self)?)
    }

    pub fn from_bytes(bytes: &[u8]) -> Result<Self> {
        Ok(serde_json::from_slice(bytes)?)
    }
}

/// Feature name carried by an encoder artifact's name
pub(crate) fn encoder_feature(artifact_name: &str) -> Option<&str> {
    artifact_name.strip_prefix(ENCODER_PREFIX)
}

fn model_artifact_name(kind: ModelKind) -> String {
    format!("pipeline_model_{}", kind.slug())
}

fn finish(artifact: Artifact, pipeline_name: &str) -> Artifact {
    let checksum = sha256_hex(&artifact.data);
    artifact
        .with_tag(pipeline_name)
        .with_metadata("pipeline", pipeline_name)
        .with_metadata("sha256", checksum)
}

impl Pipeline {
    /// Configuration as it will be exported under `name`
    pub fn manifest(&self, name: &str) -> PipelineManifest {
        let strip = |f: &Feature| Feature::new(f.name.clone(), f.kind);
        PipelineManifest {
            name: name.to_string(),
            dataset: self.config.dataset.name().to_string(),
            input_features: self.config.input_features.iter().map(strip).collect(),
            target_feature: strip(&self.config.target),
            split: self.config.split,
            model_kind: self.config.model.kind(),
            hyperparameters: self.config.model.hyperparameters(),
            metrics: self.config.metric_kinds(),
        }
    }

    /// Export every fitted encoder, the configuration and the model.
    ///
    /// Always returns `encoded_features().len() + 2` artifacts with unique
    /// names, all stored under `pipelines/{name}/` and tagged with `name`.
    pub fn artifacts(&self, name: &str) -> Result<Vec<Artifact>> {
        if name.is_empty() || name.contains('/') {
            return Err(AutoopError::InvalidInput(format!(
                "invalid pipeline name '{}'",
                name
            )));
        }
        let root = format!("pipelines/{}", name);
        let mut artifacts = Vec::with_capacity(self.run.encoded.len() + 2);

        for encoded in &self.run.encoded {
            let artifact = Artifact::new(
                format!("{}{}", ENCODER_PREFIX, encoded.name),
                encoded.record.type_tag(),
                format!("{}/encoders/{}.json", root, encoded.name),
                encoded.record.to_bytes()?,
            )
            .with_metadata("feature", encoded.name.clone())
            .with_metadata("feature_kind", encoded.record.feature_kind().to_string());
            artifacts.push(finish(artifact, name));
        }

        let manifest = self.manifest(name);
        artifacts.push(finish(
            Artifact::new(
                CONFIG_ARTIFACT,
                CONFIG_TYPE,
                format!("{}/config.json", root),
                manifest.to_bytes()?,
            ),
            name,
        ));

        let kind = self.config.model.kind();
        let model = Artifact::new(
            model_artifact_name(kind),
            MODEL_TYPE,
            format!("{}/model.bin", root),
            self.config.model.to_bytes()?,
        )
        .with_metadata("model_kind", kind.slug())
        .with_metadata("fitted", self.config.model.is_fitted().to_string());
        artifacts.push(finish(model, name));

        Ok(artifacts)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dataset::Dataset;
    use crate::features::detect_feature_types;
    use crate::metrics::Accuracy;
    use crate::pipeline::PipelineConfig;
    use crate::training::ModelRegistry;
    use std::collections::BTreeSet;

    fn classifier() -> Pipeline {
        let ds = Dataset::from_csv_bytes(
            "fruit",
            "datasets/fruit.csv",
            b"weight,size,label\n1,1,apple\n2,1,apple\n9,5,melon\n8,6,melon\n1,2,apple\n9,6,melon\n"
                .to_vec(),
        );
        let features = detect_feature_types(&ds).unwrap();
        let (target, inputs): (Vec<_>, Vec<_>) =
            features.into_iter().partition(|f| f.name == "label");
        let model = ModelRegistry::with_defaults()
            .lookup(ModelKind::NearestCentroid)
            .unwrap();
        let config = PipelineConfig::new(ds, target[0].clone(), model)
            .with_input_features(inputs)
            .with_metric(Box::new(Accuracy))
            .with_split(0.5);
        Pipeline::new(config).unwrap()
    }

    #[test]
    fn test_artifact_count_and_names() {
        let mut pipeline = classifier();
        pipeline.execute().unwrap();
        let artifacts = pipeline.artifacts("fruit").unwrap();

        assert_eq!(artifacts.len(), pipeline.encoded_features().len() + 2);
        let names: BTreeSet<&str> = artifacts.iter().map(|a| a.name.as_str()).collect();
        assert_eq!(names.len(), artifacts.len());
        assert!(names.contains("encoder:label"));
        assert!(names.contains("pipeline_config"));
        assert!(names.contains("pipeline_model_nearest_centroid"));

        for artifact in &artifacts {
            assert!(artifact.asset_path.starts_with("pipelines/fruit/"));
            assert!(artifact.has_tag("fruit"));
            assert_eq!(artifact.metadata["sha256"], artifact.checksum());
        }
    }

    #[test]
    fn test_encoder_type_tags() {
        let mut pipeline = classifier();
        pipeline.encode().unwrap();
        let artifacts = pipeline.artifacts("fruit").unwrap();
        let tag = |name: &str| {
            artifacts
                .iter()
                .find(|a| a.name == name)
                .map(|a| a.type_tag.clone())
                .unwrap()
        };
        assert_eq!(tag("encoder:label"), "OneHotEncoder");
        assert_eq!(tag("encoder:weight"), "StandardScaler");
        assert_eq!(tag("pipeline_model_nearest_centroid"), MODEL_TYPE);
    }

    #[test]
    fn test_manifest_roundtrip() {
        let pipeline = classifier();
        let manifest = pipeline.manifest("fruit");
        let back = PipelineManifest::from_bytes(&manifest.to_bytes().unwrap()).unwrap();
        assert_eq!(back, manifest);
        assert_eq!(back.metrics, vec![MetricKind::Accuracy]);
    }

    #[test]
    fn test_rejects_bad_names() {
        let pipeline = classifier();
        assert!(pipeline.artifacts("").is_err());
        assert!(pipeline.artifacts("a/b").is_err());
    }
}
