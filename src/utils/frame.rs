//! Conversions between polars tables and ndarray matrices

use crate::error::{Result, TabularError};
use ndarray::{Array1, Array2};
use polars::prelude::*;
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;

/// Column names in table order
pub fn column_names(df: &DataFrame) -> Vec<String> {
    df.get_columns().iter().map(|c| c.name().to_string()).collect()
}

/// Whether the table has a column called `name`
pub fn has_column(df: &DataFrame, name: &str) -> bool {
    df.get_columns().iter().any(|c| c.name().as_str() == name)
}

/// Materialize a column as `Option<f64>` values, casting integer columns.
pub fn numeric_values(df: &DataFrame, name: &str) -> Result<Vec<Option<f64>>> {
    let series = df
        .column(name)
        .map_err(|_| TabularError::FeatureNotFound(name.to_string()))?
        .as_materialized_series()
        .strict_cast(&DataType::Float64)
        .map_err(|e| TabularError::DataError(format!("column '{}' is not numeric: {}", name, e)))?;
    let ca = series.f64()?;
    Ok(ca.into_iter().map(|v| v.filter(|x| !x.is_nan())).collect())
}

/// Materialize a column as `Option<String>` values
pub fn string_values(df: &DataFrame, name: &str) -> Result<Vec<Option<String>>> {
    let series = df
        .column(name)
        .map_err(|_| TabularError::FeatureNotFound(name.to_string()))?
        .as_materialized_series()
        .cast(&DataType::String)?;
    let ca = series.str()?;
    Ok(ca.into_iter().map(|v| v.map(str::to_string)).collect())
}

/// Convert an all-numeric table without missing cells into a row-major matrix
pub fn to_feature_matrix(df: &DataFrame) -> Result<Array2<f64>> {
    let n_rows = df.height();
    let n_cols = df.width();
    let mut x = Array2::zeros((n_rows, n_cols));

    for (j, column) in df.get_columns().iter().enumerate() {
        let name = column.name().as_str();
        for (i, value) in numeric_values(df, name)?.into_iter().enumerate() {
            x[[i, j]] = value.ok_or_else(|| {
                TabularError::DataError(format!("column '{}' has a missing value at row {}", name, i))
            })?;
        }
    }

    Ok(x)
}

/// Build a table from a matrix and its column names
pub fn from_feature_matrix(x: &Array2<f64>, names: &[String]) -> Result<DataFrame> {
    if x.ncols() != names.len() {
        return Err(TabularError::ShapeError {
            expected: format!("{} columns", names.len()),
            actual: format!("{} columns", x.ncols()),
        });
    }
    // a zero-column frame cannot carry the row count
    if names.is_empty() && x.nrows() > 0 {
        return Err(TabularError::ShapeError {
            expected: "at least one column".to_string(),
            actual: format!("{} rows with no columns", x.nrows()),
        });
    }

    let columns: Vec<Column> = names
        .iter()
        .enumerate()
        .map(|(j, name)| Column::new(name.as_str().into(), x.column(j).to_vec()))
        .collect();

    Ok(DataFrame::new(columns)?)
}

/// Label values as strings; missing labels are rejected
pub fn label_strings(labels: &Series) -> Result<Vec<String>> {
    let as_str = labels.cast(&DataType::String)?;
    as_str
        .str()?
        .into_iter()
        .enumerate()
        .map(|(i, v)| {
            v.map(str::to_string).ok_or_else(|| {
                TabularError::DataError(format!("label '{}' is missing at row {}", labels.name(), i))
            })
        })
        .collect()
}

/// Mapping between class labels and the integer codes used by the models.
/// Codes follow the sorted order of the labels.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LabelEncoding {
    name: String,
    classes: Vec<String>,
}

impl LabelEncoding {
    /// Collect the classes present in `labels`
    pub fn fit(labels: &Series) -> Result<Self> {
        let classes: BTreeSet<String> = label_strings(labels)?.into_iter().collect();
        Ok(Self {
            name: labels.name().to_string(),
            classes: classes.into_iter().collect(),
        })
    }

    pub fn classes(&self) -> &[String] {
        &self.classes
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Encode labels as class codes
    pub fn encode(&self, labels: &Series) -> Result<Array1<i64>> {
        label_strings(labels)?
            .iter()
            .map(|label| {
                self.classes
                    .binary_search(label)
                    .map(|idx| idx as i64)
                    .map_err(|_| TabularError::DataError(format!("unknown class label '{}'", label)))
            })
            .collect::<Result<Vec<i64>>>()
            .map(Array1::from_vec)
    }

    /// Class label for a code
    pub fn decode_one(&self, code: i64) -> Result<&str> {
        usize::try_from(code)
            .ok()
            .and_then(|idx| self.classes.get(idx))
            .map(String::as_str)
            .ok_or_else(|| TabularError::DataError(format!("unknown class code {}", code)))
    }

    /// Decode class codes back into a string label column
    pub fn decode(&self, codes: &Array1<i64>) -> Result<Series> {
        let values = codes
            .iter()
            .map(|&c| self.decode_one(c).map(str::to_string))
            .collect::<Result<Vec<String>>>()?;
        Ok(Series::new(self.name.as_str().into(), values))
    }
}
