//! Column type detection

use polars::prelude::*;
use tracing::debug;

use super::{is_numeric_dtype, parse_number, ColumnData, Feature, FeatureKind};
use crate::dataset::Dataset;
use crate::error::Result;

/// Classify every usable column of `dataset`, in column order.
///
/// Columns with missing values are dropped. Native numeric columns are
/// numerical; string columns are numerical when every value parses as a
/// number after trimming, categorical otherwise. Columns of any other
/// storage type are skipped.
pub fn detect_feature_types(dataset: &Dataset) -> Result<Vec<Feature>> {
    let df = dataset.read()?;
    let mut features = Vec::with_capacity(df.width());

    for column in df.get_columns() {
        let series = column.as_materialized_series();
        let name = series.name().as_str();

        if series.null_count() > 0 {
            debug!(column = name, missing = series.null_count(), "dropping column with missing values");
            continue;
        }

        match classify(series)? {
            Some(values) => {
                debug!(column = name, kind = %values.kind(), "detected feature");
                features.push(Feature::new(name, values.kind()).with_values(values));
            }
            None => {
                debug!(column = name, dtype = %series.dtype(), "column rejected: unsupported type");
            }
        }
    }

    Ok(features)
}

fn classify(series: &Series) -> Result<Option<ColumnData>> {
    let dtype = series.dtype();

    if is_numeric_dtype(dtype) {
        let values = match ColumnData::from_series(series, FeatureKind::Numerical)? {
            ColumnData::Numerical(values) => values,
            ColumnData::Categorical(_) => return Ok(None),
        };
        // NaN cells count as missing
        if values.iter().any(|v| v.is_nan()) {
            debug!(column = series.name().as_str(), "dropping column with NaN values");
            return Ok(None);
        }
        return Ok(Some(ColumnData::Numerical(values)));
    }

    if matches!(dtype, DataType::String) {
        let strings: Vec<String> = series
            .str()?
            .into_no_null_iter()
            .map(|s| s.to_string())
            .collect();
        let parsed: Option<Vec<f64>> = strings.iter().map(|s| parse_number(s)).collect();
        return Ok(Some(match parsed {
            Some(values) => ColumnData::Numerical(values),
            None => ColumnData::Categorical(strings),
        }));
    }

    Ok(None)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn dataset(csv: &str) -> Dataset {
        Dataset::from_csv_bytes("test", "datasets/test.csv", csv.as_bytes().to_vec())
    }

    #[test]
    fn test_detects_numerical_and_categorical() {
        let ds = dataset("age,color\n1,a\n2,b\n3,a\n4,b\n5,a\n");
        let features = detect_feature_types(&ds).unwrap();

        assert_eq!(features.len(), 2);
        assert_eq!(features[0].name, "age");
        assert_eq!(features[0].kind, FeatureKind::Numerical);
        assert_eq!(features[1].name, "color");
        assert_eq!(features[1].kind, FeatureKind::Categorical);
    }

    #[test]
    fn test_column_order_is_preserved() {
        let ds = dataset("z,a,m\n1,x,2\n2,y,3\n");
        let names: Vec<String> = detect_feature_types(&ds)
            .unwrap()
            .into_iter()
            .map(|f| f.name)
            .collect();
        assert_eq!(names, vec!["z", "a", "m"]);
    }

    #[test]
    fn test_missing_values_drop_column() {
        let ds = dataset("x,y\n1,1\n,2\n3,3\n");
        let features = detect_feature_types(&ds).unwrap();
        assert_eq!(features.len(), 1);
        assert_eq!(features[0].name, "y");
    }

    #[test]
    fn test_padded_numbers_are_numerical() {
        let df = df!("n" => &[" 1", "2 ", " 3.5 "]).unwrap();
        let ds = Dataset::from_dataframe("pad", "datasets/pad.csv", &mut df.clone()).unwrap();
        let features = detect_feature_types(&ds).unwrap();
        assert_eq!(features[0].kind, FeatureKind::Numerical);
        assert_eq!(
            features[0].values(),
            Some(&ColumnData::Numerical(vec![1.0, 2.0, 3.5]))
        );
    }

    #[test]
    fn test_mixed_strings_are_categorical() {
        let ds = dataset("c\n1\ntwo\n3\n");
        let features = detect_feature_types(&ds).unwrap();
        assert_eq!(features[0].kind, FeatureKind::Categorical);
    }

    #[test]
    fn test_boolean_column_is_rejected() {
        let ds = dataset("flag,x\ntrue,1\nfalse,2\n");
        let features = detect_feature_types(&ds).unwrap();
        assert_eq!(features.len(), 1);
        assert_eq!(features[0].name, "x");
    }
}
