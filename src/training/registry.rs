//! Model kinds and the factory map that builds them

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

use super::{
    ElasticNet, Hyperparameters, KNearestNeighbors, LogisticRegression, Model,
    MultipleLinearRegression, NearestCentroid, RandomForest, TaskKind,
};
use crate::error::{AutoopError, Result};

/// Every model family the engine can train
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ModelKind {
    MultipleLinearRegression,
    ElasticNet,
    LogisticRegression,
    KNearestNeighbors,
    NearestCentroid,
    RandomForest,
}

impl ModelKind {
    pub const ALL: [ModelKind; 6] = [
        ModelKind::MultipleLinearRegression,
        ModelKind::ElasticNet,
        ModelKind::LogisticRegression,
        ModelKind::KNearestNeighbors,
        ModelKind::NearestCentroid,
        ModelKind::RandomForest,
    ];

    pub fn task_kind(&self) -> TaskKind {
        match self {
            ModelKind::MultipleLinearRegression | ModelKind::ElasticNet => TaskKind::Regression,
            ModelKind::LogisticRegression
            | ModelKind::KNearestNeighbors
            | ModelKind::NearestCentroid
            | ModelKind::RandomForest => TaskKind::Classification,
        }
    }

    pub fn display_name(&self) -> &'static str {
        match self {
            ModelKind::MultipleLinearRegression => "Multiple Linear Regression",
            ModelKind::ElasticNet => "Elastic Net",
            ModelKind::LogisticRegression => "Logistic Regression",
            ModelKind::KNearestNeighbors => "K Nearest Neighbors",
            ModelKind::NearestCentroid => "Nearest Centroid",
            ModelKind::RandomForest => "Random Forest",
        }
    }

    /// Stable identifier used in artifact names and metadata
    pub fn slug(&self) -> &'static str {
        match self {
            ModelKind::MultipleLinearRegression => "multiple_linear_regression",
            ModelKind::ElasticNet => "elastic_net",
            ModelKind::LogisticRegression => "logistic_regression",
            ModelKind::KNearestNeighbors => "k_nearest_neighbors",
            ModelKind::NearestCentroid => "nearest_centroid",
            ModelKind::RandomForest => "random_forest",
        }
    }
}

impl fmt::Display for ModelKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.display_name())
    }
}

impl FromStr for ModelKind {
    type Err = AutoopError;

    /// Accepts display names, slugs and short aliases, ignoring case,
    /// spaces, dashes and underscores
    fn from_str(s: &str) -> Result<Self> {
        let key: String = s
            .chars()
            .filter(|c| !matches!(c, ' ' | '_' | '-'))
            .flat_map(|c| c.to_lowercase())
            .collect();
        match key.as_str() {
            "multiplelinearregression" | "linearregression" | "linear" | "ols" => {
                Ok(ModelKind::MultipleLinearRegression)
            }
            "elasticnet" | "enet" => Ok(ModelKind::ElasticNet),
            "logisticregression" | "logistic" => Ok(ModelKind::LogisticRegression),
            "knearestneighbors" | "knn" | "kneighbors" => Ok(ModelKind::KNearestNeighbors),
            "nearestcentroid" | "centroid" => Ok(ModelKind::NearestCentroid),
            "randomforest" | "rf" => Ok(ModelKind::RandomForest),
            _ => Err(AutoopError::InvalidInput(format!("unknown model '{}'", s))),
        }
    }
}

/// Builds a fresh, unfitted model
pub type ModelFactory = fn(&Hyperparameters) -> Result<Box<dyn Model>>;

/// Rebuilds a fitted model from its serialized bytes
pub type ModelLoader = fn(&[u8]) -> Result<Box<dyn Model>>;

#[derive(Clone, Copy)]
struct ModelEntry {
    factory: ModelFactory,
    loader: ModelLoader,
}

/// Enum-keyed factory map for models.
///
/// `with_defaults` registers every built-in [`ModelKind`]; `register`
/// replaces or adds an entry.
#[derive(Clone)]
pub struct ModelRegistry {
    entries: BTreeMap<ModelKind, ModelEntry>,
}

impl Default for ModelRegistry {
    fn default() -> Self {
        Self::with_defaults()
    }
}

impl fmt::Debug for ModelRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ModelRegistry")
            .field("kinds", &self.entries.keys().collect::<Vec<_>>())
            .finish()
    }
}

impl ModelRegistry {
    /// Registry with no entries
    pub fn empty() -> Self {
        Self {
            entries: BTreeMap::new(),
        }
    }

    pub fn with_defaults() -> Self {
        let mut registry = Self::empty();
        registry.register(
            ModelKind::MultipleLinearRegression,
            |p| Ok(Box::new(MultipleLinearRegression::from_hyperparameters(p))),
            |b| Ok(Box::new(MultipleLinearRegression::from_bytes(b)?)),
        );
        registry.register(
            ModelKind::ElasticNet,
            |p| Ok(Box::new(ElasticNet::from_hyperparameters(p)?)),
            |b| Ok(Box::new(ElasticNet::from_bytes(b)?)),
        );
        registry.register(
            ModelKind::LogisticRegression,
            |p| Ok(Box::new(LogisticRegression::from_hyperparameters(p)?)),
            |b| Ok(Box::new(LogisticRegression::from_bytes(b)?)),
        );
        registry.register(
            ModelKind::KNearestNeighbors,
            |p| Ok(Box::new(KNearestNeighbors::from_hyperparameters(p)?)),
            |b| Ok(Box::new(KNearestNeighbors::from_bytes(b)?)),
        );
        registry.register(
            ModelKind::NearestCentroid,
            |_| Ok(Box::new(NearestCentroid::new())),
            |b| Ok(Box::new(NearestCentroid::from_bytes(b)?)),
        );
        registry.register(
            ModelKind::RandomForest,
            |p| Ok(Box::new(RandomForest::from_hyperparameters(p)?)),
            |b| Ok(Box::new(RandomForest::from_bytes(b)?)),
        );
        registry
    }

    pub fn register(&mut self, kind: ModelKind, factory: ModelFactory, loader: ModelLoader) {
        self.entries.insert(kind, ModelEntry { factory, loader });
    }

    fn entry(&self, kind: ModelKind) -> Result<&ModelEntry> {
        self.entries.get(&kind).ok_or_else(|| {
            AutoopError::InvalidInput(format!("model '{}' is not registered", kind))
        })
    }

    /// Fresh model with default hyperparameters
    pub fn lookup(&self, kind: ModelKind) -> Result<Box<dyn Model>> {
        self.lookup_with(kind, &Hyperparameters::new())
    }

    pub fn lookup_with(&self, kind: ModelKind, params: &Hyperparameters) -> Result<Box<dyn Model>> {
        (self.entry(kind)?.factory)(params)
    }

    /// Deserialize a fitted model of the given kind
    pub fn restore(&self, kind: ModelKind, bytes: &[u8]) -> Result<Box<dyn Model>> {
        (self.entry(kind)?.loader)(bytes)
    }

    /// Registered kinds, in declaration order
    pub fn kinds(&self) -> Vec<ModelKind> {
        self.entries.keys().copied().collect()
    }

    pub fn for_task(&self, task: TaskKind) -> Vec<ModelKind> {
        self.entries
            .keys()
            .copied()
            .filter(|k| k.task_kind() == task)
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::array;

    #[test]
    fn test_parse_model_kind() {
        assert_eq!("knn".parse::<ModelKind>().unwrap(), ModelKind::KNearestNeighbors);
        assert_eq!(
            "Multiple Linear Regression".parse::<ModelKind>().unwrap(),
            ModelKind::MultipleLinearRegression
        );
        assert_eq!("random_forest".parse::<ModelKind>().unwrap(), ModelKind::RandomForest);
        assert!("svm".parse::<ModelKind>().is_err());
    }

    #[test]
    fn test_lookup_returns_fresh_models() {
        let registry = ModelRegistry::with_defaults();
        for kind in ModelKind::ALL {
            let model = registry.lookup(kind).unwrap();
            assert_eq!(model.kind(), kind);
            assert_eq!(model.task_kind(), kind.task_kind());
            assert!(!model.is_fitted());
        }
    }

    #[test]
    fn test_for_task() {
        let registry = ModelRegistry::with_defaults();
        assert_eq!(
            registry.for_task(TaskKind::Regression),
            vec![ModelKind::MultipleLinearRegression, ModelKind::ElasticNet]
        );
        assert_eq!(registry.for_task(TaskKind::Classification).len(), 4);
    }

    #[test]
    fn test_lookup_with_hyperparameters() {
        let registry = ModelRegistry::with_defaults();
        let params = Hyperparameters::new().with("k", 3.0);
        let model = registry.lookup_with(ModelKind::KNearestNeighbors, &params).unwrap();
        assert_eq!(model.hyperparameters().get("k"), Some(3.0));
    }

    #[test]
    fn test_restore_roundtrip() {
        let registry = ModelRegistry::with_defaults();
        let x = array![[0.0], [1.0], [10.0], [11.0]];
        let y = array![[1.0, 0.0], [1.0, 0.0], [0.0, 1.0], [0.0, 1.0]];

        let mut model = registry.lookup(ModelKind::NearestCentroid).unwrap();
        model.fit(&x, &y).unwrap();
        let restored = registry
            .restore(ModelKind::NearestCentroid, &model.to_bytes().unwrap())
            .unwrap();
        assert_eq!(restored.predict(&x).unwrap(), model.predict(&x).unwrap());
    }

    #[test]
    fn test_unregistered_kind() {
        let registry = ModelRegistry::empty();
        assert!(registry.lookup(ModelKind::ElasticNet).is_err());
    }
}
