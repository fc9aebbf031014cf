//! Dataset schema
//!
//! The schema names the predictor columns (with their data types) and the
//! target column. It is loaded once from the input schema directory, never
//! mutated, and saved next to the trained model so inference sees the same
//! feature set.

use crate::error::{Result, TabularError};
use polars::prelude::*;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::fs;
use std::path::{Path, PathBuf};
use tracing::debug;

/// File name used when persisting a schema
pub const SCHEMA_FILE_NAME: &str = "schema.json";

/// Declared data type of a feature column
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum FeatureType {
    Numeric,
    Categorical,
    Text,
    Datetime,
}

/// A single predictor column
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Feature {
    pub name: String,
    pub data_type: FeatureType,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(default = "default_nullable")]
    pub nullable: bool,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub allowed_values: Vec<String>,
}

fn default_nullable() -> bool {
    true
}

impl Feature {
    pub fn numeric(name: impl Into<String>) -> Self {
        Self::new(name, FeatureType::Numeric)
    }

    pub fn categorical(name: impl Into<String>) -> Self {
        Self::new(name, FeatureType::Categorical)
    }

    pub fn new(name: impl Into<String>, data_type: FeatureType) -> Self {
        Self {
            name: name.into(),
            data_type,
            description: None,
            nullable: true,
            allowed_values: Vec::new(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
struct IdColumn {
    name: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
struct TargetColumn {
    name: String,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    classes: Vec<String>,
}

/// Immutable description of a dataset's features and target
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Schema {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    title: Option<String>,
    #[serde(default = "default_model_category")]
    model_category: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    id: Option<IdColumn>,
    target: TargetColumn,
    features: Vec<Feature>,
}

fn default_model_category() -> String {
    "classification".to_string()
}

impl Schema {
    /// Build and validate a schema
    pub fn new(target: impl Into<String>, features: Vec<Feature>) -> Result<Self> {
        let schema = Self {
            title: None,
            model_category: default_model_category(),
            id: None,
            target: TargetColumn {
                name: target.into(),
                classes: Vec::new(),
            },
            features,
        };
        schema.validate()?;
        Ok(schema)
    }

    /// Set the id column (excluded from training)
    pub fn with_id(mut self, id: impl Into<String>) -> Result<Self> {
        self.id = Some(IdColumn { name: id.into() });
        self.validate()?;
        Ok(self)
    }

    /// Declare the expected target classes
    pub fn with_target_classes(mut self, classes: Vec<String>) -> Self {
        self.target.classes = classes;
        self
    }

    pub fn with_title(mut self, title: impl Into<String>) -> Self {
        self.title = Some(title.into());
        self
    }

    pub fn title(&self) -> Option<&str> {
        self.title.as_deref()
    }

    pub fn model_category(&self) -> &str {
        &self.model_category
    }

    pub fn id(&self) -> Option<&str> {
        self.id.as_ref().map(|c| c.name.as_str())
    }

    pub fn target(&self) -> &str {
        &self.target.name
    }

    pub fn target_classes(&self) -> &[String] {
        &self.target.classes
    }

    pub fn features(&self) -> &[Feature] {
        &self.features
    }

    /// Feature names in schema order
    pub fn feature_names(&self) -> Vec<&str> {
        self.features.iter().map(|f| f.name.as_str()).collect()
    }

    pub fn numeric_features(&self) -> Vec<&str> {
        self.features_of(FeatureType::Numeric)
    }

    pub fn categorical_features(&self) -> Vec<&str> {
        self.features_of(FeatureType::Categorical)
    }

    fn features_of(&self, data_type: FeatureType) -> Vec<&str> {
        self.features
            .iter()
            .filter(|f| f.data_type == data_type)
            .map(|f| f.name.as_str())
            .collect()
    }

    pub fn feature(&self, name: &str) -> Option<&Feature> {
        self.features.iter().find(|f| f.name == name)
    }

    fn validate(&self) -> Result<()> {
        if self.target.name.trim().is_empty() {
            return Err(TabularError::ConfigError("schema target name is empty".to_string()));
        }
        if self.features.is_empty() {
            return Err(TabularError::ConfigError("schema declares no features".to_string()));
        }

        let mut seen = HashSet::new();
        for feature in &self.features {
            if feature.name.trim().is_empty() {
                return Err(TabularError::ConfigError("schema feature name is empty".to_string()));
            }
            if !seen.insert(feature.name.as_str()) {
                return Err(TabularError::ConfigError(format!(
                    "feature '{}' is declared more than once",
                    feature.name
                )));
            }
        }

        if seen.contains(self.target.name.as_str()) {
            return Err(TabularError::ConfigError(format!(
                "target '{}' is also declared as a feature",
                self.target.name
            )));
        }
        if let Some(id) = self.id() {
            if id == self.target.name || seen.contains(id) {
                return Err(TabularError::ConfigError(format!(
                    "id column '{}' overlaps with the target or a feature",
                    id
                )));
            }
        }

        Ok(())
    }

    /// Split a raw training table into the feature table (schema order) and
    /// the label column.
    pub fn select_training_data(&self, df: &DataFrame) -> Result<(DataFrame, Series)> {
        let present: HashSet<&str> = df.get_columns().iter().map(|c| c.name().as_str()).collect();

        let missing: Vec<&str> = self
            .feature_names()
            .into_iter()
            .chain(std::iter::once(self.target()))
            .filter(|name| !present.contains(name))
            .collect();
        if !missing.is_empty() {
            return Err(TabularError::DataError(format!(
                "training data is missing schema columns: {}",
                missing.join(", ")
            )));
        }

        let features = df.select(self.feature_names())?;
        let labels = df.column(self.target())?.as_materialized_series().clone();

        if labels.null_count() > 0 {
            return Err(TabularError::DataError(format!(
                "target column '{}' has {} missing values",
                self.target(),
                labels.null_count()
            )));
        }

        Ok((features, labels))
    }
}

/// Load the schema from the single JSON file found in `input_dir`
pub fn load_schema(input_dir: impl AsRef<Path>) -> Result<Schema> {
    let path = find_schema_file(input_dir.as_ref())?;
    debug!(path = %path.display(), "Reading schema");
    let json = fs::read_to_string(&path)?;
    let schema: Schema = serde_json::from_str(&json)
        .map_err(|e| TabularError::ConfigError(format!("invalid schema {}: {}", path.display(), e)))?;
    schema.validate()?;
    Ok(schema)
}

/// Persist the schema as `schema.json` inside `output_dir`, creating it if needed
pub fn save_schema(schema: &Schema, output_dir: impl AsRef<Path>) -> Result<PathBuf> {
    let output_dir = output_dir.as_ref();
    fs::create_dir_all(output_dir)?;
    let path = output_dir.join(SCHEMA_FILE_NAME);
    let json = serde_json::to_string_pretty(schema)?;
    fs::write(&path, json)?;
    Ok(path)
}

fn find_schema_file(dir: &Path) -> Result<PathBuf> {
    if !dir.is_dir() {
        return Err(TabularError::ConfigError(format!(
            "schema directory {} does not exist",
            dir.display()
        )));
    }

    let mut candidates: Vec<PathBuf> = fs::read_dir(dir)?
        .filter_map(|entry| entry.ok().map(|e| e.path()))
        .filter(|p| p.is_file() && p.extension().map_or(false, |ext| ext.eq_ignore_ascii_case("json")))
        .collect();
    candidates.sort();

    match candidates.len() {
        0 => Err(TabularError::ConfigError(format!(
            "no schema file found in {}",
            dir.display()
        ))),
        1 => Ok(candidates.remove(0)),
        n => Err(TabularError::ConfigError(format!(
            "expected one schema file in {}, found {}",
            dir.display(),
            n
        ))),
    }
}
