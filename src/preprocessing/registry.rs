//! Stage registry and pipeline builder
//!
//! The registry knows every stage by name and builds the ordered pipeline for
//! a schema. The default order is:
//!
//! 1. `drop_mostly_missing_columns` (NONE)
//! 2. `drop_constant_features` (NONE, optional)
//! 3. `impute_numeric` (COLUMN) for each numeric feature
//! 4. `impute_categorical` (COLUMN) for each categorical feature
//! 5. `encode_categorical` (SCHEMA)
//! 6. `scale_numeric` (SCHEMA)
//! 7. `remove_outliers_zscore` (COLUMN, label-mutating) for each numeric feature
//!
//! Column-scoped stages follow the schema's feature order.

use crate::error::{Result, TabularError};
use crate::schema::{FeatureType, Schema};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

use super::config::PreprocessingConfig;
use super::stage::{ScopeTag, Stage, StageScope, StageSpec, Transform};
use super::transforms;

pub const DROP_MOSTLY_MISSING_COLUMNS: &str = "drop_mostly_missing_columns";
pub const DROP_CONSTANT_FEATURES: &str = "drop_constant_features";
pub const IMPUTE_NUMERIC: &str = "impute_numeric";
pub const IMPUTE_CATEGORICAL: &str = "impute_categorical";
pub const ENCODE_CATEGORICAL: &str = "encode_categorical";
pub const SCALE_NUMERIC: &str = "scale_numeric";
pub const REMOVE_OUTLIERS_ZSCORE: &str = "remove_outliers_zscore";

/// Every registered stage name
pub const STAGE_NAMES: &[&str] = &[
    DROP_MOSTLY_MISSING_COLUMNS,
    DROP_CONSTANT_FEATURES,
    IMPUTE_NUMERIC,
    IMPUTE_CATEGORICAL,
    ENCODE_CATEGORICAL,
    SCALE_NUMERIC,
    REMOVE_OUTLIERS_ZSCORE,
];

/// File name of the persisted stage plan
pub const PIPELINE_FILE_NAME: &str = "pipeline.json";

/// Builds preprocessing pipelines from a schema
#[derive(Debug, Clone, Default)]
pub struct StageRegistry {
    config: PreprocessingConfig,
}

impl StageRegistry {
    pub fn new(config: PreprocessingConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &PreprocessingConfig {
        &self.config
    }

    /// Look up a registered transform by stage name
    pub fn transform_for(&self, name: &str) -> Result<Transform> {
        let config = &self.config;
        let transform = match name {
            DROP_MOSTLY_MISSING_COLUMNS => {
                let threshold = config.missing_ratio_threshold;
                Transform::table(move |df| transforms::drop_mostly_missing_columns(df, threshold))
            }
            DROP_CONSTANT_FEATURES => Transform::table(transforms::drop_constant_features),
            IMPUTE_NUMERIC => {
                let strategy = config.numeric_impute_strategy;
                Transform::column(move |df, column| transforms::impute_numeric(df, column, strategy))
            }
            IMPUTE_CATEGORICAL => {
                let strategy = config.categorical_impute_strategy;
                Transform::column(move |df, column| transforms::impute_categorical(df, column, strategy))
            }
            ENCODE_CATEGORICAL => {
                let max_categories = config.max_onehot_categories;
                Transform::schema(move |df, schema| transforms::encode_categorical(df, schema, max_categories))
            }
            SCALE_NUMERIC => {
                let scaler_type = config.scaler_type.clone();
                Transform::schema(move |df, schema| transforms::scale_numeric(df, schema, &scaler_type))
            }
            REMOVE_OUTLIERS_ZSCORE => {
                let threshold = config.outlier_threshold;
                Transform::column_with_labels(move |df, column, labels| {
                    transforms::remove_outliers_zscore(df, column, labels, threshold)
                })
            }
            other => {
                return Err(TabularError::ConfigError(format!(
                    "no stage registered under '{}' (known: {})",
                    other,
                    STAGE_NAMES.join(", ")
                )))
            }
        };
        Ok(transform)
    }

    /// Build the ordered pipeline for `schema`
    pub fn build_pipeline(&self, schema: &Schema) -> Result<Vec<Stage>> {
        check_supported_features(schema)?;

        if let Some(specs) = &self.config.stages {
            return specs.iter().map(|spec| self.resolve(spec, schema)).collect();
        }

        let mut stages = vec![self.stage(DROP_MOSTLY_MISSING_COLUMNS, StageScope::Table)?];
        if self.config.drop_constant_features {
            stages.push(self.stage(DROP_CONSTANT_FEATURES, StageScope::Table)?);
        }
        for column in schema.numeric_features() {
            stages.push(self.stage(IMPUTE_NUMERIC, StageScope::Column(column.to_string()))?);
        }
        for column in schema.categorical_features() {
            stages.push(self.stage(IMPUTE_CATEGORICAL, StageScope::Column(column.to_string()))?);
        }
        stages.push(self.stage(ENCODE_CATEGORICAL, StageScope::Schema)?);
        stages.push(self.stage(SCALE_NUMERIC, StageScope::Schema)?);
        if self.config.handle_outliers {
            for column in schema.numeric_features() {
                stages.push(self.stage(REMOVE_OUTLIERS_ZSCORE, StageScope::Column(column.to_string()))?);
            }
        }

        Ok(stages)
    }

    /// Resolve a stage description against the catalogue and the schema
    pub fn resolve(&self, spec: &StageSpec, schema: &Schema) -> Result<Stage> {
        let tag: ScopeTag = spec.scope.parse()?;
        let transform = self.transform_for(&spec.name)?;
        if transform.scope_tag() != tag {
            return Err(TabularError::ConfigError(format!(
                "stage '{}' is {}-scoped, not {}",
                spec.name,
                transform.scope_tag(),
                tag
            )));
        }

        let scope = StageScope::from_tag(tag, spec.column.as_deref())?;
        if let Some(column) = scope.column() {
            if schema.feature(column).is_none() {
                return Err(TabularError::ConfigError(format!(
                    "stage '{}' targets '{}', which is not a schema feature",
                    spec.name, column
                )));
            }
        }

        Ok(Stage::new(spec.name.clone(), scope, transform))
    }

    fn stage(&self, name: &str, scope: StageScope) -> Result<Stage> {
        Ok(Stage::new(name, scope, self.transform_for(name)?))
    }
}

/// Build the pipeline for `schema` with `config`
pub fn build_pipeline(schema: &Schema, config: &PreprocessingConfig) -> Result<Vec<Stage>> {
    StageRegistry::new(config.clone()).build_pipeline(schema)
}

fn check_supported_features(schema: &Schema) -> Result<()> {
    let unsupported: Vec<String> = schema
        .features()
        .iter()
        .filter(|f| !matches!(f.data_type, FeatureType::Numeric | FeatureType::Categorical))
        .map(|f| format!("{} ({:?})", f.name, f.data_type))
        .collect();

    if unsupported.is_empty() {
        Ok(())
    } else {
        Err(TabularError::ConfigError(format!(
            "no registered stage handles features: {}",
            unsupported.join(", ")
        )))
    }
}

/// Resolved preprocessing setup persisted next to the model
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PipelinePlan {
    pub config: PreprocessingConfig,
    pub stages: Vec<StageSpec>,
}

impl PipelinePlan {
    pub fn new(config: &PreprocessingConfig, stages: &[Stage]) -> Self {
        Self {
            config: config.clone(),
            stages: stages.iter().map(Stage::spec).collect(),
        }
    }

    /// Write the plan as `pipeline.json` inside `dir`, creating it if needed
    pub fn save(&self, dir: &Path) -> Result<PathBuf> {
        std::fs::create_dir_all(dir)?;
        let path = dir.join(PIPELINE_FILE_NAME);
        std::fs::write(&path, serde_json::to_string_pretty(self)?)?;
        Ok(path)
    }

    pub fn load(dir: &Path) -> Result<Self> {
        let json = std::fs::read_to_string(dir.join(PIPELINE_FILE_NAME))?;
        Ok(serde_json::from_str(&json)?)
    }

    /// Rebuild executable stages from the plan
    pub fn stages(&self, schema: &Schema) -> Result<Vec<Stage>> {
        let registry = StageRegistry::new(self.config.clone());
        self.stages.iter().map(|spec| registry.resolve(spec, schema)).collect()
    }
}
