//! Tabular datasets stored as CSV bytes
//!
//! A [`Dataset`] is an immutable named table. Its payload is the CSV encoding
//! of a polars [`DataFrame`]; the frame is materialised on demand with
//! [`Dataset::read`].

use std::io::Cursor;
use std::path::Path;

use polars::prelude::*;
use serde::{Deserialize, Serialize};

use crate::artifact::Artifact;
use crate::error::{AutoopError, Result};

/// Type tag carried by dataset artifacts
pub const DATASET_TYPE: &str = "dataset";

/// Immutable named table backed by CSV bytes
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Dataset {
    name: String,
    asset_path: String,
    version: String,
    data: Vec<u8>,
}

impl Dataset {
    /// Wrap raw CSV bytes
    pub fn from_csv_bytes(
        name: impl Into<String>,
        asset_path: impl Into<String>,
        data: Vec<u8>,
    ) -> Self {
        Self {
            name: name.into(),
            asset_path: asset_path.into(),
            version: crate::artifact::DEFAULT_VERSION.to_string(),
            data,
        }
    }

    /// Encode a DataFrame as CSV and wrap it
    pub fn from_dataframe(
        name: impl Into<String>,
        asset_path: impl Into<String>,
        df: &mut DataFrame,
    ) -> Result<Self> {
        let mut buf = Vec::new();
        CsvWriter::new(&mut buf).include_header(true).finish(df)?;
        Ok(Self::from_csv_bytes(name, asset_path, buf))
    }

    /// Load a CSV file from disk. The file stem becomes the dataset name.
    pub fn from_csv_path(path: &Path) -> Result<Self> {
        let data = std::fs::read(path)?;
        let name = path
            .file_stem()
            .and_then(|s| s.to_str())
            .unwrap_or("dataset")
            .to_string();
        let file_name = path
            .file_name()
            .and_then(|s| s.to_str())
            .unwrap_or("dataset.csv");
        let asset_path = format!("datasets/{}", file_name);
        Ok(Self::from_csv_bytes(name, asset_path, data))
    }

    /// Reinterpret a generic artifact as a dataset.
    ///
    /// Fails with [`AutoopError::InvalidInput`] unless the artifact carries the
    /// `dataset` type tag.
    pub fn from_artifact(artifact: Artifact) -> Result<Self> {
        if artifact.type_tag != DATASET_TYPE {
            return Err(AutoopError::InvalidInput(format!(
                "artifact '{}' has type '{}', expected '{}'",
                artifact.name, artifact.type_tag, DATASET_TYPE
            )));
        }
        Ok(Self {
            name: artifact.name,
            asset_path: artifact.asset_path,
            version: artifact.version,
            data: artifact.data,
        })
    }

    /// Package the dataset as an artifact for the registry
    pub fn to_artifact(&self) -> Artifact {
        Artifact::new(
            self.name.clone(),
            DATASET_TYPE,
            self.asset_path.clone(),
            self.data.clone(),
        )
        .with_version(self.version.clone())
    }

    pub fn with_version(mut self, version: impl Into<String>) -> Self {
        self.version = version.into();
        self
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn asset_path(&self) -> &str {
        &self.asset_path
    }

    pub fn version(&self) -> &str {
        &self.version
    }

    /// Raw CSV payload
    pub fn bytes(&self) -> &[u8] {
        &self.data
    }

    /// Parse the CSV payload into a DataFrame
    pub fn read(&self) -> Result<DataFrame> {
        let df = CsvReadOptions::default()
            .with_has_header(true)
            .with_infer_schema_length(None)
            .into_reader_with_file_handle(Cursor::new(self.data.clone()))
            .finish()?;
        Ok(df)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_from_dataframe_and_read() {
        let mut df = df!(
            "age" => &[1i64, 2, 3],
            "color" => &["a", "b", "a"]
        )
        .unwrap();

        let ds = Dataset::from_dataframe("people", "datasets/people.csv", &mut df).unwrap();
        assert_eq!(ds.name(), "people");
        assert_eq!(ds.version(), "v0.00");

        let back = ds.read().unwrap();
        assert_eq!(back.height(), 3);
        assert_eq!(back.width(), 2);
        assert_eq!(back.get_column_names()[1].as_str(), "color");
    }

    #[test]
    fn test_artifact_roundtrip() {
        let ds = Dataset::from_csv_bytes("toy", "datasets/toy.csv", b"x,y\n1,2\n".to_vec());
        let artifact = ds.to_artifact();
        assert_eq!(artifact.type_tag, DATASET_TYPE);

        let restored = Dataset::from_artifact(artifact).unwrap();
        assert_eq!(restored, ds);
    }

    #[test]
    fn test_from_artifact_rejects_other_types() {
        let artifact = Artifact::new("m", "model", "models/m.bin", vec![1, 2, 3]);
        let err = Dataset::from_artifact(artifact).unwrap_err();
        assert!(matches!(err, AutoopError::InvalidInput(_)));
    }
}
