//! System configuration
//!
//! Resolution order: defaults, then an optional JSON file, then the
//! `AUTOOP_ASSETS` environment variable, then explicit overrides from the
//! caller (the CLI's `--assets`).

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::error::{AutoopError, Result};

/// Environment variable that overrides the assets root
pub const ASSETS_ENV: &str = "AUTOOP_ASSETS";

/// Where artifacts live and how runs are set up by default
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SystemConfig {
    /// Root of the on-disk asset tree
    pub assets_root: PathBuf,
    /// Blob directory, relative to `assets_root`
    pub objects_dir: String,
    /// Metadata directory, relative to `assets_root`
    pub database_dir: String,
    /// Train fraction used when a run does not set one
    pub default_split: f64,
    /// Default tracing filter
    pub log_filter: String,
}

impl Default for SystemConfig {
    fn default() -> Self {
        Self {
            assets_root: PathBuf::from("./assets"),
            objects_dir: "objects".to_string(),
            database_dir: "dbo".to_string(),
            default_split: 0.8,
            log_filter: "autoop=info".to_string(),
        }
    }
}

impl SystemConfig {
    /// Read a JSON config file. Missing keys fall back to defaults.
    pub fn from_file(path: &Path) -> Result<Self> {
        let raw = std::fs::read_to_string(path).map_err(|e| {
            AutoopError::ConfigError(format!("cannot read {}: {}", path.display(), e))
        })?;
        let config: Self = serde_json::from_str(&raw).map_err(|e| {
            AutoopError::ConfigError(format!("invalid config {}: {}", path.display(), e))
        })?;
        config.validate()?;
        Ok(config)
    }

    /// Defaults or the given file, with environment overrides applied
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let config = match path {
            Some(p) => Self::from_file(p)?,
            None => Self::default(),
        };
        Ok(config.with_env())
    }

    pub fn with_env(mut self) -> Self {
        if let Ok(root) = std::env::var(ASSETS_ENV) {
            if !root.trim().is_empty() {
                self.assets_root = PathBuf::from(root);
            }
        }
        self
    }

    pub fn with_assets_root(mut self, root: impl Into<PathBuf>) -> Self {
        self.assets_root = root.into();
        self
    }

    pub fn with_default_split(mut self, split: f64) -> Result<Self> {
        self.default_split = split;
        self.validate()?;
        Ok(self)
    }

    pub fn validate(&self) -> Result<()> {
        if !(self.default_split > 0.0 && self.default_split < 1.0) {
            return Err(AutoopError::ConfigError(format!(
                "default_split must lie in (0, 1), got {}",
                self.default_split
            )));
        }
        if self.objects_dir == self.database_dir {
            return Err(AutoopError::ConfigError(
                "objects_dir and database_dir must differ".to_string(),
            ));
        }
        Ok(())
    }

    pub fn objects_path(&self) -> PathBuf {
        self.assets_root.join(&self.objects_dir)
    }

    pub fn database_path(&self) -> PathBuf {
        self.assets_root.join(&self.database_dir)
    }
}
