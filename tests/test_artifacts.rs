//! Integration tests for artifact persistence on disk

use autoop::artifact::{
    Artifact, ArtifactRegistry, ArtifactStore, AutoMLSystem, Database, LocalStorage, Storage,
    DEFAULT_VERSION,
};
use autoop::config::SystemConfig;
use autoop::dataset::{Dataset, DATASET_TYPE};
use autoop::error::AutoopError;
use autoop::prelude::*;

fn open(dir: &std::path::Path) -> AutoMLSystem<LocalStorage> {
    AutoMLSystem::open(SystemConfig::default().with_assets_root(dir)).unwrap()
}

#[test]
fn test_system_survives_reopen() {
    let dir = tempfile::tempdir().unwrap();
    let dataset = Dataset::from_csv_bytes("toy", "datasets/toy.csv", b"a,b\n1,x\n2,y\n".to_vec());

    let id = {
        let system = open(dir.path());
        system.add_dataset(&dataset).unwrap()
    };

    let system = open(dir.path());
    let datasets = system.datasets().unwrap();
    assert_eq!(datasets, vec![dataset]);

    let artifact = system.registry().get(&id).unwrap();
    assert_eq!(artifact.type_tag, DATASET_TYPE);
    assert_eq!(artifact.version, DEFAULT_VERSION);
}

#[test]
fn test_layout_on_disk() {
    let dir = tempfile::tempdir().unwrap();
    let system = open(dir.path());
    let artifact = Artifact::new("m", "model", "models/m.bin", vec![1, 2, 3]);
    system.registry().put(&artifact).unwrap();

    let objects = LocalStorage::new(dir.path().join("objects")).unwrap();
    assert_eq!(objects.list("").unwrap(), vec!["models/m.bin@v0.00".to_string()]);

    let dbo = LocalStorage::new(dir.path().join("dbo")).unwrap();
    assert_eq!(dbo.list("").unwrap(), vec![format!("artifacts/{}", artifact.id())]);
}

#[test]
fn test_delete_removes_blob_and_entry() {
    let dir = tempfile::tempdir().unwrap();
    let system = open(dir.path());
    let artifact = Artifact::new("m", "model", "models/m.bin", vec![9]);
    system.registry().put(&artifact).unwrap();
    system.registry().delete(&artifact.id()).unwrap();

    assert!(system.registry().list(None).unwrap().is_empty());
    let reopened = open(dir.path());
    assert!(matches!(
        reopened.registry().get(&artifact.id()),
        Err(AutoopError::ArtifactNotFound(_))
    ));
}

#[test]
fn test_registry_over_local_storage() {
    let dir = tempfile::tempdir().unwrap();
    let registry = ArtifactRegistry::new(
        LocalStorage::new(dir.path().join("blobs")).unwrap(),
        Database::new(LocalStorage::new(dir.path().join("meta")).unwrap()).unwrap(),
    );

    for (i, tag) in ["OneHotEncoder", "StandardScaler", "model"].iter().enumerate() {
        registry
            .put(&Artifact::new(format!("a{}", i), *tag, format!("p/a{}", i), vec![i as u8]))
            .unwrap();
    }
    assert_eq!(registry.list(None).unwrap().len(), 3);
    assert_eq!(registry.list(Some("model")).unwrap()[0].data, vec![2]);
    assert!(registry.list(Some("dataset")).unwrap().is_empty());
}

#[test]
fn test_saved_pipeline_roundtrip_on_disk() {
    let dir = tempfile::tempdir().unwrap();
    let ds = Dataset::from_csv_bytes(
        "people",
        "datasets/people.csv",
        b"age,color\n1,a\n2,b\n3,a\n4,b\n5,a\n".to_vec(),
    );
    let features = detect_feature_types(&ds).unwrap();
    let (target, inputs): (Vec<_>, Vec<_>) = features.into_iter().partition(|f| f.name == "color");

    let expected = {
        let system = open(dir.path());
        let model = system.models().lookup(ModelKind::KNearestNeighbors).unwrap();
        let config = PipelineConfig::new(ds.clone(), target[0].clone(), model)
            .with_input_features(inputs)
            .with_metric(system.metrics().lookup(MetricKind::Accuracy).unwrap())
            .with_split(0.6);
        let mut pipeline = Pipeline::new(config).unwrap();
        pipeline.execute().unwrap();
        for artifact in pipeline.artifacts("colors").unwrap() {
            system.registry().put(&artifact).unwrap();
        }
        pipeline.predict(&ds).unwrap()
    };

    let system = open(dir.path());
    let artifacts = system.registry().find_by_tag("colors").unwrap();
    let restored = RestoredPipeline::from_artifacts_with(&artifacts, system.models()).unwrap();
    assert_eq!(restored.predict(&ds).unwrap(), expected);
}

#[test]
fn test_dataset_from_non_dataset_artifact() {
    let artifact = Artifact::new("cfg", "pipeline_config", "pipelines/x/config.json", b"{}".to_vec());
    assert!(matches!(
        Dataset::from_artifact(artifact),
        Err(AutoopError::InvalidInput(_))
    ));
}
