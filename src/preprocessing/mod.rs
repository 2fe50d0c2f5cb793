//! Feature encoding
//!
//! Turns typed [`Feature`]s into numeric matrices:
//! - categorical columns are one-hot encoded ([`OneHotEncoder`])
//! - numerical columns are standardized ([`StandardScaler`])
//!
//! Each fitted encoder is captured in an [`EncoderRecord`] that can be
//! replayed on new data to reproduce the exact same transform.

mod encoder;
mod scaler;

pub use encoder::OneHotEncoder;
pub use scaler::StandardScaler;

use ndarray::Array2;
use polars::prelude::DataFrame;
use serde::{Deserialize, Serialize};

use crate::dataset::Dataset;
use crate::error::{AutoopError, Result};
use crate::features::{ColumnData, Feature, FeatureKind};

/// Serializable fitted state of one feature's encoder
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum EncoderRecord {
    OneHotEncoder(OneHotEncoder),
    StandardScaler(StandardScaler),
}

impl EncoderRecord {
    /// Fit the encoder matching the column's kind
    pub fn fit(data: &ColumnData) -> Result<(Self, Array2<f64>)> {
        match data {
            ColumnData::Categorical(values) => {
                let mut encoder = OneHotEncoder::new();
                let encoded = encoder.fit_transform(values)?;
                Ok((EncoderRecord::OneHotEncoder(encoder), encoded))
            }
            ColumnData::Numerical(values) => {
                let mut scaler = StandardScaler::new();
                let encoded = scaler.fit_transform(values)?;
                Ok((EncoderRecord::StandardScaler(scaler), encoded))
            }
        }
    }

    /// Replay the fitted transform on raw column values
    pub fn transform(&self, data: &ColumnData) -> Result<Array2<f64>> {
        match (self, data) {
            (EncoderRecord::OneHotEncoder(encoder), ColumnData::Categorical(values)) => {
                encoder.transform(values)
            }
            (EncoderRecord::StandardScaler(scaler), ColumnData::Numerical(values)) => {
                scaler.transform(values)
            }
            _ => Err(AutoopError::InvalidInput(format!(
                "{} cannot encode {} data",
                self.type_tag(),
                data.kind()
            ))),
        }
    }

    /// Artifact type tag: `OneHotEncoder` or `StandardScaler`
    pub fn type_tag(&self) -> &'static str {
        match self {
            EncoderRecord::OneHotEncoder(_) => "OneHotEncoder",
            EncoderRecord::StandardScaler(_) => "StandardScaler",
        }
    }

    /// Kind of column this record encodes
    pub fn feature_kind(&self) -> FeatureKind {
        match self {
            EncoderRecord::OneHotEncoder(_) => FeatureKind::Categorical,
            EncoderRecord::StandardScaler(_) => FeatureKind::Numerical,
        }
    }

    /// Number of output columns
    pub fn width(&self) -> usize {
        match self {
            EncoderRecord::OneHotEncoder(encoder) => encoder.n_categories(),
            EncoderRecord::StandardScaler(_) => 1,
        }
    }

    pub fn to_bytes(&self) -> Result<Vec<u8>> {
        Ok(serde_json::to_vec(self)?)
    }

    pub fn from_bytes(bytes: &[u8]) -> Result<Self> {
        Ok(serde_json::from_slice(bytes)?)
    }
}

/// Encoded matrix for one feature, with the encoder that produced it
#[derive(Debug, Clone)]
pub struct EncodedFeature {
    pub name: String,
    /// `(n_rows, k)` matrix
    pub data: Array2<f64>,
    pub record: EncoderRecord,
}

/// Encode every feature and return the results sorted by feature name.
///
/// The sort fixes the column order of any later concatenation, whatever
/// order the features were passed in.
pub fn preprocess_features(features: &[Feature], dataset: &Dataset) -> Result<Vec<EncodedFeature>> {
    let mut frame: Option<DataFrame> = None;
    let mut encoded = Vec::with_capacity(features.len());

    for feature in features {
        let data = match feature.values() {
            Some(values) => values.clone(),
            None => {
                let df = match frame.take() {
                    Some(df) => df,
                    None => dataset.read()?,
                };
                let data = feature.column_data(&df)?;
                frame = Some(df);
                data
            }
        };

        if data.kind() != feature.kind {
            return Err(AutoopError::InvalidInput(format!(
                "feature '{}' is declared {} but holds {} data",
                feature.name,
                feature.kind,
                data.kind()
            )));
        }

        let (record, matrix) = EncoderRecord::fit(&data)?;
        encoded.push(EncodedFeature {
            name: feature.name.clone(),
            data: matrix,
            record,
        });
    }

    encoded.sort_by(|a, b| a.name.cmp(&b.name));
    Ok(encoded)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::features::detect_feature_types;
    use ndarray::array;

    fn toy_dataset() -> Dataset {
        Dataset::from_csv_bytes(
            "toy",
            "datasets/toy.csv",
            b"color,age\na,1\nb,2\na,3\nb,4\na,5\n".to_vec(),
        )
    }

    #[test]
    fn test_preprocess_sorted_by_name() {
        let ds = toy_dataset();
        let features = detect_feature_types(&ds).unwrap();
        let encoded = preprocess_features(&features, &ds).unwrap();

        let names: Vec<&str> = encoded.iter().map(|e| e.name.as_str()).collect();
        assert_eq!(names, vec!["age", "color"]);
        assert_eq!(encoded[0].record.type_tag(), "StandardScaler");
        assert_eq!(encoded[1].record.type_tag(), "OneHotEncoder");
        assert_eq!(
            encoded[1].data,
            array![[1.0, 0.0], [0.0, 1.0], [1.0, 0.0], [0.0, 1.0], [1.0, 0.0]]
        );
    }

    #[test]
    fn test_uncached_features_read_dataset() {
        let ds = toy_dataset();
        let features = vec![Feature::categorical("color"), Feature::numerical("age")];
        let encoded = preprocess_features(&features, &ds).unwrap();
        assert_eq!(encoded[0].data.dim(), (5, 1));
        assert_eq!(encoded[1].data.dim(), (5, 2));
    }

    #[test]
    fn test_record_replay_is_exact() {
        let ds = toy_dataset();
        let features = detect_feature_types(&ds).unwrap();
        let encoded = preprocess_features(&features, &ds).unwrap();

        for enc in &encoded {
            let feature = features.iter().find(|f| f.name == enc.name).unwrap();
            let bytes = enc.record.to_bytes().unwrap();
            let record = EncoderRecord::from_bytes(&bytes).unwrap();
            let replayed = record.transform(feature.values().unwrap()).unwrap();
            assert_eq!(replayed, enc.data);
        }
    }

    #[test]
    fn test_fractional_scaler_records_replay_exactly() {
        use rand::prelude::*;
        use rand_chacha::ChaCha8Rng;

        let mut rng = ChaCha8Rng::seed_from_u64(11);
        for _ in 0..400 {
            let values: Vec<f64> = (0..9).map(|_| rng.gen::<f64>() * 200.0 - 100.0).collect();
            let data = ColumnData::Numerical(values);
            let (record, encoded) = EncoderRecord::fit(&data).unwrap();

            let decoded = EncoderRecord::from_bytes(&record.to_bytes().unwrap()).unwrap();
            assert_eq!(decoded, record);
            assert_eq!(decoded.transform(&data).unwrap(), encoded);
        }
    }

    #[test]
    fn test_record_kind_mismatch() {
        let (record, _) = EncoderRecord::fit(&ColumnData::Numerical(vec![1.0, 2.0])).unwrap();
        let err = record
            .transform(&ColumnData::Categorical(vec!["x".into()]))
            .unwrap_err();
        assert!(matches!(err, AutoopError::InvalidInput(_)));
    }
}
