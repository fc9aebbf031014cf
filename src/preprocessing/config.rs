//! Preprocessing configuration

use serde::{Deserialize, Serialize};
use super::{ImputeStrategy, ScalerType, StageSpec};
use crate::synthetic::RebalanceConfig;

/// Configuration for data preprocessing
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PreprocessingConfig {
    /// Strategy for handling missing numeric values
    pub numeric_impute_strategy: ImputeStrategy,

    /// Strategy for handling missing categorical values
    pub categorical_impute_strategy: ImputeStrategy,

    /// Type of scaler to use for numeric features
    pub scaler_type: ScalerType,

    /// Maximum number of one-hot columns per categorical feature
    /// (excluding the overflow indicator)
    pub max_onehot_categories: usize,

    /// Columns with at least this share of missing values are dropped
    pub missing_ratio_threshold: f64,

    /// Whether to drop single-valued columns
    pub drop_constant_features: bool,

    /// Whether to remove outlier rows
    pub handle_outliers: bool,

    /// Outlier threshold (number of standard deviations)
    pub outlier_threshold: f64,

    /// Class imbalance correction applied after the pipeline
    pub rebalance: RebalanceConfig,

    /// Explicit stage order; the registry's default order is used when unset
    #[serde(skip_serializing_if = "Option::is_none")]
    pub stages: Option<Vec<StageSpec>>,
}

impl Default for PreprocessingConfig {
    fn default() -> Self {
        Self {
            numeric_impute_strategy: ImputeStrategy::Mean,
            categorical_impute_strategy: ImputeStrategy::MostFrequent,
            scaler_type: ScalerType::Standard,
            max_onehot_categories: 10,
            missing_ratio_threshold: 0.95,
            drop_constant_features: true,
            handle_outliers: true,
            outlier_threshold: 3.0,
            rebalance: RebalanceConfig::default(),
            stages: None,
        }
    }
}

impl PreprocessingConfig {
    /// Create a new configuration with default values
    pub fn new() -> Self {
        Self::default()
    }

    /// Builder method to set numeric impute strategy
    pub fn with_numeric_impute(mut self, strategy: ImputeStrategy) -> Self {
        self.numeric_impute_strategy = strategy;
        self
    }

    /// Builder method to set categorical impute strategy
    pub fn with_categorical_impute(mut self, strategy: ImputeStrategy) -> Self {
        self.categorical_impute_strategy = strategy;
        self
    }

    /// Builder method to set scaler type
    pub fn with_scaler(mut self, scaler_type: ScalerType) -> Self {
        self.scaler_type = scaler_type;
        self
    }

    /// Builder method to enable outlier handling
    pub fn with_outlier_handling(mut self, threshold: f64) -> Self {
        self.handle_outliers = true;
        self.outlier_threshold = threshold;
        self
    }

    /// Builder method to disable outlier handling
    pub fn without_outlier_handling(mut self) -> Self {
        self.handle_outliers = false;
        self
    }

    pub fn with_rebalance(mut self, rebalance: RebalanceConfig) -> Self {
        self.rebalance = rebalance;
        self
    }

    /// Builder method to pin the stage order
    pub fn with_stages(mut self, stages: Vec<StageSpec>) -> Self {
        self.stages = Some(stages);
        self
    }
}
