//! Application context owning the artifact registry and factory maps

use tracing::info;

use super::{ArtifactRegistry, ArtifactStore, Database, LocalStorage, MemoryStorage, Storage};
use crate::config::SystemConfig;
use crate::dataset::{Dataset, DATASET_TYPE};
use crate::error::Result;
use crate::metrics::MetricRegistry;
use crate::training::ModelRegistry;

/// Explicitly constructed context passed to whatever needs persistence or
/// model/metric lookup. The entry point owns its lifetime.
pub struct AutoMLSystem<S: Storage> {
    config: SystemConfig,
    registry: ArtifactRegistry<S>,
    models: ModelRegistry,
    metrics: MetricRegistry,
}

impl AutoMLSystem<LocalStorage> {
    /// On-disk system under `config.assets_root`
    pub fn open(config: SystemConfig) -> Result<Self> {
        config.validate()?;
        let objects = LocalStorage::new(config.objects_path())?;
        let database = Database::new(LocalStorage::new(config.database_path())?)?;
        info!(root = %config.assets_root.display(), "opened artifact store");
        Ok(Self::with_parts(config, ArtifactRegistry::new(objects, database)))
    }
}

impl AutoMLSystem<MemoryStorage> {
    pub fn in_memory() -> Result<Self> {
        let database = Database::new(MemoryStorage::new())?;
        Ok(Self::with_parts(
            SystemConfig::default(),
            ArtifactRegistry::new(MemoryStorage::new(), database),
        ))
    }
}

impl<S: Storage> AutoMLSystem<S> {
    pub fn with_parts(config: SystemConfig, registry: ArtifactRegistry<S>) -> Self {
        Self {
            config,
            registry,
            models: ModelRegistry::with_defaults(),
            metrics: MetricRegistry::with_defaults(),
        }
    }

    pub fn config(&self) -> &SystemConfig {
        &self.config
    }

    pub fn registry(&self) -> &ArtifactRegistry<S> {
        &self.registry
    }

    pub fn models(&self) -> &ModelRegistry {
        &self.models
    }

    pub fn metrics(&self) -> &MetricRegistry {
        &self.metrics
    }

    /// Register a dataset and return its artifact id
    pub fn add_dataset(&self, dataset: &Dataset) -> Result<String> {
        let artifact = dataset.to_artifact();
        self.registry.put(&artifact)?;
        Ok(artifact.id())
    }

    pub fn datasets(&self) -> Result<Vec<Dataset>> {
        self.registry
            .list(Some(DATASET_TYPE))?
            .into_iter()
            .map(Dataset::from_artifact)
            .collect()
    }
}
