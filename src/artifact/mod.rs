//! Artifacts and their persistence
//!
//! An [`Artifact`] is a named, versioned, opaque blob with tags and string
//! metadata. Persistence is split in two: payloads go to a path-addressed
//! [`Storage`], metadata entries go to a [`Database`] collection. The
//! [`ArtifactRegistry`] ties both together behind the [`ArtifactStore`]
//! interface, and [`AutoMLSystem`] is the context object that owns it.

mod database;
mod registry;
mod storage;
mod system;

pub use database::Database;
pub use registry::{ArtifactEntry, ArtifactRegistry, ArtifactStore, ARTIFACT_COLLECTION};
pub use storage::{LocalStorage, MemoryStorage, Storage};
pub use system::AutoMLSystem;

use std::collections::BTreeMap;

use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use base64::Engine;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

/// Version assigned to artifacts that do not set one
pub const DEFAULT_VERSION: &str = "v0.00";

/// Named, versioned blob plus metadata
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Artifact {
    pub name: String,
    /// Kind of payload, e.g. `dataset`, `model`, `OneHotEncoder`
    pub type_tag: String,
    pub data: Vec<u8>,
    /// Logical location of the payload in blob storage
    pub asset_path: String,
    pub version: String,
    pub tags: Vec<String>,
    pub metadata: BTreeMap<String, String>,
}

impl Artifact {
    pub fn new(
        name: impl Into<String>,
        type_tag: impl Into<String>,
        asset_path: impl Into<String>,
        data: Vec<u8>,
    ) -> Self {
        Self {
            name: name.into(),
            type_tag: type_tag.into(),
            data,
            asset_path: asset_path.into(),
            version: DEFAULT_VERSION.to_string(),
            tags: Vec::new(),
            metadata: BTreeMap::new(),
        }
    }

    /// Stable identifier: URL-safe base64 of the asset path, a colon, and
    /// the version
    pub fn id(&self) -> String {
        artifact_id(&self.asset_path, &self.version)
    }

    pub fn with_version(mut self, version: impl Into<String>) -> Self {
        self.version = version.into();
        self
    }

    pub fn with_tags<I, T>(mut self, tags: I) -> Self
    where
        I: IntoIterator<Item = T>,
        T: Into<String>,
    {
        self.tags = tags.into_iter().map(Into::into).collect();
        self
    }

    pub fn with_tag(mut self, tag: impl Into<String>) -> Self {
        self.tags.push(tag.into());
        self
    }

    pub fn with_metadata(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.metadata.insert(key.into(), value.into());
        self
    }

    pub fn has_tag(&self, tag: &str) -> bool {
        self.tags.iter().any(|t| t == tag)
    }

    /// Hex sha256 of the payload
    pub fn checksum(&self) -> String {
        sha256_hex(&self.data)
    }
}

/// Identifier for an asset path and version, see [`Artifact::id`]
pub fn artifact_id(asset_path: &str, version: &str) -> String {
    format!("{}:{}", URL_SAFE_NO_PAD.encode(asset_path.as_bytes()), version)
}

pub(crate) fn sha256_hex(data: &[u8]) -> String {
    Sha256::digest(data)
        .iter()
        .map(|b| format!("{:02x}", b))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_artifact_defaults() {
        let artifact = Artifact::new("iris", "dataset", "datasets/iris.csv", b"a,b\n".to_vec());
        assert_eq!(artifact.version, DEFAULT_VERSION);
        assert!(artifact.tags.is_empty());
        assert!(artifact.metadata.is_empty());
    }

    #[test]
    fn test_id_is_path_safe() {
        let artifact = Artifact::new("m", "model", "pipelines/p/model.bin", Vec::new());
        let id = artifact.id();
        assert_eq!(id, format!("{}:v0.00", URL_SAFE_NO_PAD.encode("pipelines/p/model.bin")));
        assert!(!id.contains('/'));

        let bumped = artifact.with_version("v1.00");
        assert!(bumped.id().ends_with(":v1.00"));
    }

    #[test]
    fn test_builders() {
        let artifact = Artifact::new("a", "model", "x", vec![1, 2, 3])
            .with_tags(["demo"])
            .with_tag("latest")
            .with_metadata("model_kind", "random_forest");
        assert!(artifact.has_tag("demo"));
        assert!(artifact.has_tag("latest"));
        assert_eq!(artifact.metadata["model_kind"], "random_forest");
        assert_eq!(artifact.checksum().len(), 64);
    }
}
