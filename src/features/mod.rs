//! Feature typing
//!
//! Every usable column of a [`Dataset`](crate::dataset::Dataset) is described
//! by a [`Feature`]: its name and whether it is numerical or categorical.

mod detector;

pub use detector::detect_feature_types;

use polars::prelude::*;
use serde::{Deserialize, Serialize};
use std::fmt;

use crate::error::{AutoopError, Result};

/// Semantic kind of a column
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FeatureKind {
    Numerical,
    Categorical,
}

impl fmt::Display for FeatureKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FeatureKind::Numerical => write!(f, "numerical"),
            FeatureKind::Categorical => write!(f, "categorical"),
        }
    }
}

/// Raw values of one column, already typed
#[derive(Debug, Clone, PartialEq)]
pub enum ColumnData {
    Numerical(Vec<f64>),
    Categorical(Vec<String>),
}

impl ColumnData {
    pub fn len(&self) -> usize {
        match self {
            ColumnData::Numerical(v) => v.len(),
            ColumnData::Categorical(v) => v.len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn kind(&self) -> FeatureKind {
        match self {
            ColumnData::Numerical(_) => FeatureKind::Numerical,
            ColumnData::Categorical(_) => FeatureKind::Categorical,
        }
    }

    /// Read a named column from a frame and coerce it to `kind`
    pub fn from_frame(df: &DataFrame, name: &str, kind: FeatureKind) -> Result<Self> {
        let column = df
            .column(name)
            .map_err(|_| AutoopError::FeatureNotFound(name.to_string()))?;
        Self::from_series(column.as_materialized_series(), kind)
    }

    /// Coerce a series to `kind`. Missing values are an error here; the
    /// detector drops such columns before they reach this point.
    pub fn from_series(series: &Series, kind: FeatureKind) -> Result<Self> {
        let name = series.name().as_str();
        if series.null_count() > 0 {
            return Err(AutoopError::DataError(format!(
                "column '{}' contains {} missing values",
                name,
                series.null_count()
            )));
        }

        match kind {
            FeatureKind::Numerical => {
                if is_numeric_dtype(series.dtype()) {
                    let casted = series.cast(&DataType::Float64)?;
                    let values: Vec<f64> = casted.f64()?.into_no_null_iter().collect();
                    Ok(ColumnData::Numerical(values))
                } else {
                    let strings = string_values(series)?;
                    let values = strings
                        .iter()
                        .map(|s| {
                            parse_number(s).ok_or_else(|| {
                                AutoopError::DataError(format!(
                                    "column '{}' value '{}' is not numeric",
                                    name, s
                                ))
                            })
                        })
                        .collect::<Result<Vec<f64>>>()?;
                    Ok(ColumnData::Numerical(values))
                }
            }
            FeatureKind::Categorical => Ok(ColumnData::Categorical(string_values(series)?)),
        }
    }
}

/// One typed column of a dataset
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Feature {
    /// Column name, unique within a dataset
    pub name: String,
    /// Detected kind
    pub kind: FeatureKind,
    /// Values cached by the detector
    #[serde(skip)]
    values: Option<ColumnData>,
}

impl Feature {
    pub fn new(name: impl Into<String>, kind: FeatureKind) -> Self {
        Self {
            name: name.into(),
            kind,
            values: None,
        }
    }

    pub fn numerical(name: impl Into<String>) -> Self {
        Self::new(name, FeatureKind::Numerical)
    }

    pub fn categorical(name: impl Into<String>) -> Self {
        Self::new(name, FeatureKind::Categorical)
    }

    pub(crate) fn with_values(mut self, values: ColumnData) -> Self {
        self.values = Some(values);
        self
    }

    /// Cached raw values, if the feature came from the detector
    pub fn values(&self) -> Option<&ColumnData> {
        self.values.as_ref()
    }

    /// Cached values, or the column read from `df`
    pub fn column_data(&self, df: &DataFrame) -> Result<ColumnData> {
        match &self.values {
            Some(values) => Ok(values.clone()),
            None => ColumnData::from_frame(df, &self.name, self.kind),
        }
    }
}

pub(crate) fn is_numeric_dtype(dtype: &DataType) -> bool {
    matches!(
        dtype,
        DataType::Int8
            | DataType::Int16
            | DataType::Int32
            | DataType::Int64
            | DataType::UInt8
            | DataType::UInt16
            | DataType::UInt32
            | DataType::UInt64
            | DataType::Float32
            | DataType::Float64
    )
}

/// Parse a string as a finite number after trimming surrounding whitespace
pub(crate) fn parse_number(raw: &str) -> Option<f64> {
    raw.trim().parse::<f64>().ok().filter(|v| v.is_finite())
}

fn string_values(series: &Series) -> Result<Vec<String>> {
    let casted = match series.dtype() {
        DataType::String => series.clone(),
        _ => series.cast(&DataType::String)?,
    };
    Ok(casted
        .str()?
        .into_no_null_iter()
        .map(|s| s.to_string())
        .collect())
}
