//! Per-instance model hyperparameters

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use crate::error::{AutoopError, Result};

/// Named numeric hyperparameters.
///
/// Each model owns its own value; an empty set means "use the model's
/// defaults".
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Hyperparameters {
    values: BTreeMap<String, f64>,
}

impl Hyperparameters {
    pub fn new() -> Self {
        Self::default()
    }

    /// Builder-style insert
    pub fn with(mut self, key: impl Into<String>, value: f64) -> Self {
        self.set(key, value);
        self
    }

    pub fn set(&mut self, key: impl Into<String>, value: f64) {
        self.values.insert(key.into(), value);
    }

    pub fn get(&self, key: &str) -> Option<f64> {
        self.values.get(key).copied()
    }

    pub fn get_or(&self, key: &str, default: f64) -> f64 {
        self.get(key).unwrap_or(default)
    }

    /// Read a non-negative integer parameter
    pub fn get_usize(&self, key: &str, default: usize) -> Result<usize> {
        match self.get(key) {
            None => Ok(default),
            Some(v) if v >= 0.0 && v.fract() == 0.0 => Ok(v as usize),
            Some(v) => Err(AutoopError::InvalidInput(format!(
                "hyperparameter '{}' must be a non-negative integer, got {}",
                key, v
            ))),
        }
    }

    /// Read a flag; any non-zero value is true
    pub fn get_bool(&self, key: &str, default: bool) -> bool {
        self.get(key).map(|v| v != 0.0).unwrap_or(default)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&String, &f64)> {
        self.values.iter()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    /// Parse a `key=value` assignment
    pub fn parse_assignment(raw: &str) -> Result<(String, f64)> {
        let (key, value) = raw.split_once('=').ok_or_else(|| {
            AutoopError::InvalidInput(format!("expected key=value, got '{}'", raw))
        })?;
        let key = key.trim();
        if key.is_empty() {
            return Err(AutoopError::InvalidInput(format!("missing key in '{}'", raw)));
        }
        let value = match value.trim() {
            "true" => 1.0,
            "false" => 0.0,
            other => other.parse::<f64>().map_err(|_| {
                AutoopError::InvalidInput(format!("'{}' is not a number", other))
            })?,
        };
        Ok((key.to_string(), value))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_independent_instances() {
        let mut a = Hyperparameters::new();
        a.set("k", 3.0);
        let b = Hyperparameters::new();
        assert_eq!(a.get("k"), Some(3.0));
        assert!(b.is_empty());
    }

    #[test]
    fn test_get_usize() {
        let params = Hyperparameters::new().with("k", 3.0).with("bad", 2.5);
        assert_eq!(params.get_usize("k", 5).unwrap(), 3);
        assert_eq!(params.get_usize("missing", 5).unwrap(), 5);
        assert!(params.get_usize("bad", 5).is_err());
    }

    #[test]
    fn test_parse_assignment() {
        assert_eq!(
            Hyperparameters::parse_assignment("alpha = 0.5").unwrap(),
            ("alpha".to_string(), 0.5)
        );
        assert_eq!(
            Hyperparameters::parse_assignment("fit_intercept=false").unwrap(),
            ("fit_intercept".to_string(), 0.0)
        );
        assert!(Hyperparameters::parse_assignment("alpha").is_err());
        assert!(Hyperparameters::parse_assignment("alpha=abc").is_err());
    }
}
