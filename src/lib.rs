//! autoop - tabular AutoML pipeline engine
//!
//! This crate turns a CSV dataset plus a target/input/model/metric choice
//! into a trained, evaluated and exportable pipeline:
//! - Feature type detection (numerical vs categorical)
//! - One-hot and standard-scaler encoding with replayable encoder records
//! - Sequential train/test split, training and evaluation
//! - Artifact export and a local artifact store
//!
//! # Modules
//!
//! ## Core
//! - [`features`] - Column type detection
//! - [`preprocessing`] - Feature encoders
//! - [`pipeline`] - Pipeline state machine, export and restore
//!
//! ## Collaborators
//! - [`training`] - Model trait, model registry and built-in models
//! - [`metrics`] - Metric trait, metric registry and built-in metrics
//! - [`dataset`] - CSV-backed datasets
//! - [`artifact`] - Artifacts, storage backends and the artifact registry
//!
//! ## Services
//! - [`config`] - System configuration
//! - [`cli`] - Command-line interface

// Core error handling
pub mod error;
pub mod config;

// Data
pub mod artifact;
pub mod dataset;
pub mod features;
pub mod preprocessing;

// Models and scoring
pub mod training;
pub mod metrics;

// Orchestration
pub mod pipeline;

// Services
pub mod cli;

pub use error::{AutoopError, Result};

/// Prelude for common imports
pub mod prelude {
    pub use crate::artifact::{Artifact, ArtifactStore, AutoMLSystem, Storage};
    pub use crate::dataset::Dataset;
    pub use crate::error::{AutoopError, Result};
    pub use crate::features::{detect_feature_types, Feature, FeatureKind};
    pub use crate::metrics::{
        Accuracy, MeanAbsoluteError, MeanSquaredError, Metric, MetricKind, MetricRegistry,
        Precision, RSquared, Recall,
    };
    pub use crate::pipeline::{Pipeline, PipelineConfig, PipelineResult, RestoredPipeline};
    pub use crate::preprocessing::{preprocess_features, EncoderRecord};
    pub use crate::training::{Hyperparameters, Model, ModelKind, ModelRegistry, TaskKind};
}
