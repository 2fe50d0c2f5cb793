//! Error types for the autoop pipeline engine

use thiserror::Error;

use crate::features::FeatureKind;
use crate::training::TaskKind;

/// Result type alias for autoop operations
pub type Result<T> = std::result::Result<T, AutoopError>;

/// Main error type for the pipeline engine
#[derive(Error, Debug)]
pub enum AutoopError {
    #[error("Invalid input: {0}")]
    InvalidInput(String),

    #[error(
        "Incompatible model: target feature is {feature_kind} but the model performs {task_kind}"
    )]
    IncompatibleModel {
        feature_kind: FeatureKind,
        task_kind: TaskKind,
    },

    #[error("At least one input feature is required")]
    EmptyInputFeatures,

    #[error("Model not fitted")]
    ModelNotFitted,

    #[error("Pipeline stage '{stage}' requires the '{required}' stage to run first")]
    StageNotReady {
        stage: &'static str,
        required: &'static str,
    },

    #[error("Invalid shape: expected {expected}, got {actual}")]
    ShapeError { expected: String, actual: String },

    #[error("Feature not found: {0}")]
    FeatureNotFound(String),

    #[error("Artifact not found: {0}")]
    ArtifactNotFound(String),

    #[error("Data error: {0}")]
    DataError(String),

    #[error("Serialization error: {0}")]
    SerializationError(String),

    #[error("Computation error: {0}")]
    ComputationError(String),

    #[error("Configuration error: {0}")]
    ConfigError(String),

    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),
}

impl From<polars::error::PolarsError> for AutoopError {
    fn from(err: polars::error::PolarsError) -> Self {
        AutoopError::DataError(err.to_string())
    }
}

impl From<serde_json::Error> for AutoopError {
    fn from(err: serde_json::Error) -> Self {
        AutoopError::SerializationError(err.to_string())
    }
}

impl From<bincode::Error> for AutoopError {
    fn from(err: bincode::Error) -> Self {
        AutoopError::SerializationError(err.to_string())
    }
}

impl From<ndarray::ShapeError> for AutoopError {
    fn from(err: ndarray::ShapeError) -> Self {
        AutoopError::ShapeError {
            expected: "valid shape".to_string(),
            actual: err.to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = AutoopError::DataError("test error".to_string());
        assert_eq!(err.to_string(), "Data error: test error");
    }

    #[test]
    fn test_incompatible_model_names_both_kinds() {
        let err = AutoopError::IncompatibleModel {
            feature_kind: FeatureKind::Categorical,
            task_kind: TaskKind::Regression,
        };
        let msg = err.to_string();
        assert!(msg.contains("categorical"));
        assert!(msg.contains("regression"));
    }

    #[test]
    fn test_error_from_io() {
        let io_err = std::io::Error::new(std::io::ErrorKind::NotFound, "file not found");
        let err: AutoopError = io_err.into();
        assert!(matches!(err, AutoopError::IoError(_)));
    }
}
