//! Stage transformations
//!
//! Every function here is a pure table-in, table-out step. The registry
//! wraps them into scoped [`Stage`](super::Stage)s; none of them knows how it
//! is invoked.

use crate::error::{Result, TabularError};
use crate::schema::Schema;
use crate::utils::frame::{has_column, numeric_values, string_values};
use polars::prelude::*;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

use super::scaler::{Scaler, ScalerType};

/// Placeholder category for missing categorical values
pub const MISSING_CATEGORY: &str = "missing";

/// Suffix of the indicator column collecting categories outside the encoded set
pub const OTHER_CATEGORY: &str = "__other";

/// Strategy for filling missing values
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ImputeStrategy {
    /// Column mean (numeric only)
    Mean,
    /// Column median (numeric only)
    Median,
    /// Most frequent value
    MostFrequent,
    /// Zero for numeric columns, [`MISSING_CATEGORY`] for categorical ones
    Constant,
}

/// Drop columns whose share of missing values is at least `threshold`
pub fn drop_mostly_missing_columns(df: DataFrame, threshold: f64) -> Result<DataFrame> {
    let height = df.height();
    if height == 0 {
        return Ok(df);
    }

    let to_drop: Vec<String> = df
        .get_columns()
        .iter()
        .filter(|c| c.null_count() as f64 / height as f64 >= threshold)
        .map(|c| c.name().to_string())
        .collect();

    drop_columns(df, &to_drop)
}

/// Drop columns holding a single distinct value
pub fn drop_constant_features(df: DataFrame) -> Result<DataFrame> {
    if df.height() < 2 {
        return Ok(df);
    }

    let mut to_drop = Vec::new();
    for column in df.get_columns() {
        if column.as_materialized_series().n_unique()? <= 1 {
            to_drop.push(column.name().to_string());
        }
    }

    drop_columns(df, &to_drop)
}

fn drop_columns(mut df: DataFrame, names: &[String]) -> Result<DataFrame> {
    for name in names {
        df.drop_in_place(name)?;
    }
    Ok(df)
}

/// Fill missing values of a numeric column
pub fn impute_numeric(mut df: DataFrame, column: &str, strategy: ImputeStrategy) -> Result<DataFrame> {
    let values = numeric_values(&df, column)?;

    let mut observed: Vec<f64> = values.iter().flatten().copied().collect();
    let fill = match strategy {
        ImputeStrategy::Mean => {
            if observed.is_empty() {
                0.0
            } else {
                observed.iter().sum::<f64>() / observed.len() as f64
            }
        }
        ImputeStrategy::Median => median(&mut observed).unwrap_or(0.0),
        ImputeStrategy::MostFrequent => most_frequent_number(&observed).unwrap_or(0.0),
        ImputeStrategy::Constant => 0.0,
    };

    let filled: Vec<f64> = values.into_iter().map(|v| v.unwrap_or(fill)).collect();
    df.with_column(Series::new(column.into(), filled))?;
    Ok(df)
}

/// Fill missing values of a categorical column. Values are stored as strings.
pub fn impute_categorical(mut df: DataFrame, column: &str, strategy: ImputeStrategy) -> Result<DataFrame> {
    let values = string_values(&df, column)?;

    let fill = match strategy {
        ImputeStrategy::MostFrequent => {
            most_frequent_label(values.iter().flatten()).unwrap_or_else(|| MISSING_CATEGORY.to_string())
        }
        ImputeStrategy::Constant => MISSING_CATEGORY.to_string(),
        ImputeStrategy::Mean | ImputeStrategy::Median => {
            return Err(TabularError::ConfigError(format!(
                "{:?} imputation is not defined for categorical column '{}'",
                strategy, column
            )));
        }
    };

    let filled: Vec<String> = values.into_iter().map(|v| v.unwrap_or_else(|| fill.clone())).collect();
    df.with_column(Series::new(column.into(), filled))?;
    Ok(df)
}

/// One-hot encode the schema's categorical features.
///
/// Categories come from the feature's `allowedValues` when declared, otherwise
/// the `max_categories` most frequent values (ties broken by name). Values
/// outside that set go to a `<column>__other` indicator, which is only added
/// when such values exist. Missing values encode as all zeros.
pub fn encode_categorical(df: DataFrame, schema: &Schema, max_categories: usize) -> Result<DataFrame> {
    let mut df = df;

    for column in schema.categorical_features() {
        if !has_column(&df, column) {
            continue;
        }

        let values = string_values(&df, column)?;
        let categories = match schema.feature(column) {
            Some(feature) if !feature.allowed_values.is_empty() => feature.allowed_values.clone(),
            _ => top_categories(&values, max_categories),
        };

        let has_other = values
            .iter()
            .flatten()
            .any(|v| !categories.iter().any(|c| c == v));

        df.drop_in_place(column)?;

        for category in &categories {
            let indicator: Vec<f64> = values
                .iter()
                .map(|v| if v.as_deref() == Some(category.as_str()) { 1.0 } else { 0.0 })
                .collect();
            add_indicator(&mut df, format!("{}_{}", column, category), indicator)?;
        }

        if has_other {
            let indicator: Vec<f64> = values
                .iter()
                .map(|v| match v {
                    Some(v) if !categories.iter().any(|c| c == v) => 1.0,
                    _ => 0.0,
                })
                .collect();
            add_indicator(&mut df, format!("{}{}", column, OTHER_CATEGORY), indicator)?;
        }
    }

    Ok(df)
}

fn add_indicator(df: &mut DataFrame, name: String, values: Vec<f64>) -> Result<()> {
    if has_column(df, &name) {
        return Err(TabularError::DataError(format!(
            "encoded column '{}' collides with an existing column",
            name
        )));
    }
    df.with_column(Series::new(name.into(), values))?;
    Ok(())
}

fn top_categories(values: &[Option<String>], max_categories: usize) -> Vec<String> {
    let mut counts: HashMap<&str, usize> = HashMap::new();
    for v in values.iter().flatten() {
        *counts.entry(v.as_str()).or_insert(0) += 1;
    }

    let mut ranked: Vec<(&str, usize)> = counts.into_iter().collect();
    ranked.sort_by(|a, b| b.1.cmp(&a.1).then_with(|| a.0.cmp(b.0)));
    ranked
        .into_iter()
        .take(max_categories.max(1))
        .map(|(v, _)| v.to_string())
        .collect()
}

/// Scale the schema's numeric features
pub fn scale_numeric(df: DataFrame, schema: &Schema, scaler_type: &ScalerType) -> Result<DataFrame> {
    let mut df = df;
    let columns: Vec<&str> = schema
        .numeric_features()
        .into_iter()
        .filter(|c| has_column(&df, c))
        .collect();

    for column in &columns {
        let values = numeric_values(&df, column)?;
        df.with_column(Series::new((*column).into(), values))?;
    }

    let mut scaler = Scaler::new(scaler_type.clone());
    scaler.fit_transform(&df, &columns)
}

/// Remove rows whose z-score in `column` exceeds `threshold`, dropping the
/// matching labels. Missing values are kept.
pub fn remove_outliers_zscore(
    df: DataFrame,
    column: &str,
    labels: Series,
    threshold: f64,
) -> Result<(DataFrame, Series)> {
    if labels.len() != df.height() {
        return Err(TabularError::DataError(format!(
            "{} labels for {} rows",
            labels.len(),
            df.height()
        )));
    }

    let values = numeric_values(&df, column)?;
    let observed: Vec<f64> = values.iter().flatten().copied().collect();
    if observed.len() < 2 {
        return Ok((df, labels));
    }

    let n = observed.len() as f64;
    let mean = observed.iter().sum::<f64>() / n;
    let std = (observed.iter().map(|v| (v - mean).powi(2)).sum::<f64>() / n).sqrt();
    if std == 0.0 {
        return Ok((df, labels));
    }

    let keep: Vec<bool> = values
        .iter()
        .map(|v| v.map_or(true, |x| ((x - mean) / std).abs() <= threshold))
        .collect();
    if keep.iter().all(|&k| k) {
        return Ok((df, labels));
    }

    let mask = BooleanChunked::from_slice("keep".into(), &keep);
    Ok((df.filter(&mask)?, labels.filter(&mask)?))
}

fn median(values: &mut [f64]) -> Option<f64> {
    if values.is_empty() {
        return None;
    }
    values.sort_by(|a, b| a.total_cmp(b));
    let mid = values.len() / 2;
    if values.len() % 2 == 0 {
        Some((values[mid - 1] + values[mid]) / 2.0)
    } else {
        Some(values[mid])
    }
}

fn most_frequent_number(values: &[f64]) -> Option<f64> {
    let mut sorted = values.to_vec();
    sorted.sort_by(|a, b| a.total_cmp(b));

    let mut best: Option<(f64, usize)> = None;
    let mut i = 0;
    while i < sorted.len() {
        let mut j = i;
        while j < sorted.len() && sorted[j] == sorted[i] {
            j += 1;
        }
        if best.map_or(true, |(_, count)| j - i > count) {
            best = Some((sorted[i], j - i));
        }
        i = j;
    }
    best.map(|(v, _)| v)
}

fn most_frequent_label<'a>(values: impl Iterator<Item = &'a String>) -> Option<String> {
    let mut counts: HashMap<&str, usize> = HashMap::new();
    for v in values {
        *counts.entry(v.as_str()).or_insert(0) += 1;
    }
    counts
        .into_iter()
        .max_by(|a, b| a.1.cmp(&b.1).then_with(|| b.0.cmp(a.0)))
        .map(|(v, _)| v.to_string())
}
