//! Artifact registry: metadata in a [`Database`], payloads in a [`Storage`]

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use tracing::info;

use super::{Artifact, Database, Storage};
use crate::error::{AutoopError, Result};

/// Database collection holding artifact entries
pub const ARTIFACT_COLLECTION: &str = "artifacts";

/// Persisted view of an artifact: everything except the payload
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ArtifactEntry {
    pub name: String,
    pub type_tag: String,
    pub asset_path: String,
    pub version: String,
    pub tags: Vec<String>,
    pub metadata: BTreeMap<String, String>,
}

impl ArtifactEntry {
    fn from_artifact(artifact: &Artifact) -> Self {
        Self {
            name: artifact.name.clone(),
            type_tag: artifact.type_tag.clone(),
            asset_path: artifact.asset_path.clone(),
            version: artifact.version.clone(),
            tags: artifact.tags.clone(),
            metadata: artifact.metadata.clone(),
        }
    }

    fn into_artifact(self, data: Vec<u8>) -> Artifact {
        Artifact {
            name: self.name,
            type_tag: self.type_tag,
            data,
            asset_path: self.asset_path,
            version: self.version,
            tags: self.tags,
            metadata: self.metadata,
        }
    }

    pub fn id(&self) -> String {
        super::artifact_id(&self.asset_path, &self.version)
    }
}

/// Persistence interface for artifacts
pub trait ArtifactStore {
    /// Insert or replace the artifact with the same id
    fn put(&self, artifact: &Artifact) -> Result<()>;

    fn get(&self, id: &str) -> Result<Artifact>;

    /// All artifacts, optionally restricted to one type tag
    fn list(&self, type_filter: Option<&str>) -> Result<Vec<Artifact>>;

    fn delete(&self, id: &str) -> Result<()>;
}

/// [`ArtifactStore`] backed by one storage for payloads and a database for
/// entries.
///
/// Payloads are stored under `{asset_path}` suffixed with the version, so
/// two versions of the same asset do not overwrite each other.
pub struct ArtifactRegistry<S: Storage> {
    storage: S,
    database: Database<S>,
}

impl<S: Storage> ArtifactRegistry<S> {
    pub fn new(storage: S, database: Database<S>) -> Self {
        Self { storage, database }
    }

    fn blob_key(entry: &ArtifactEntry) -> String {
        format!("{}@{}", entry.asset_path, entry.version)
    }

    /// Entries without payloads, ordered by id
    pub fn entries(&self, type_filter: Option<&str>) -> Result<Vec<(String, ArtifactEntry)>> {
        let mut entries: Vec<(String, ArtifactEntry)> =
            self.database.list(ARTIFACT_COLLECTION)?;
        if let Some(filter) = type_filter {
            entries.retain(|(_, e)| e.type_tag == filter);
        }
        Ok(entries)
    }

    /// Artifacts carrying `tag`
    pub fn find_by_tag(&self, tag: &str) -> Result<Vec<Artifact>> {
        self.entries(None)?
            .into_iter()
            .filter(|(_, e)| e.tags.iter().any(|t| t == tag))
            .map(|(_, e)| self.hydrate(e))
            .collect()
    }

    fn hydrate(&self, entry: ArtifactEntry) -> Result<Artifact> {
        let data = self.storage.load(&Self::blob_key(&entry))?;
        Ok(entry.into_artifact(data))
    }

    pub fn database(&self) -> &Database<S> {
        &self.database
    }
}

impl<S: Storage> ArtifactStore for ArtifactRegistry<S> {
    fn put(&self, artifact: &Artifact) -> Result<()> {
        if artifact.asset_path.is_empty() {
            return Err(AutoopError::InvalidInput(format!(
                "artifact '{}' has no asset path",
                artifact.name
            )));
        }
        let mut entry = ArtifactEntry::from_artifact(artifact);
        entry
            .metadata
            .entry("registered_at".to_string())
            .or_insert_with(|| chrono::Utc::now().to_rfc3339());

        let id = artifact.id();
        self.storage.save(&artifact.data, &Self::blob_key(&entry))?;
        self.database.set(ARTIFACT_COLLECTION, &id, &entry)?;
        info!(id = %id, name = %artifact.name, type_tag = %artifact.type_tag, "registered artifact");
        Ok(())
    }

    fn get(&self, id: &str) -> Result<Artifact> {
        let entry: ArtifactEntry = self
            .database
            .get(ARTIFACT_COLLECTION, id)?
            .ok_or_else(|| AutoopError::ArtifactNotFound(id.to_string()))?;
        self.hydrate(entry)
    }

    fn list(&self, type_filter: Option<&str>) -> Result<Vec<Artifact>> {
        self.entries(type_filter)?
            .into_iter()
            .map(|(_, e)| self.hydrate(e))
            .collect()
    }

    fn delete(&self, id: &str) -> Result<()> {
        let entry: ArtifactEntry = self
            .database
            .get(ARTIFACT_COLLECTION, id)?
            .ok_or_else(|| AutoopError::ArtifactNotFound(id.to_string()))?;
        self.storage.delete(&Self::blob_key(&entry))?;
        self.database.delete(ARTIFACT_COLLECTION, id)?;
        info!(id, name = %entry.name, "deleted artifact");
        Ok(())
    }
}
