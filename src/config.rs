//! Training run configuration
//!
//! Every path the trainer touches lives in [`TrainingPaths`]. Defaults are
//! derived from a single root directory and each one can be overridden with
//! the matching `with_*` builder.

use crate::error::{Result, TabularError};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Environment variable that relocates the default root directory
pub const ROOT_DIR_ENV: &str = "MODEL_INPUTS_OUTPUTS";

/// Default root directory when [`ROOT_DIR_ENV`] is unset
pub const DEFAULT_ROOT_DIR: &str = "model_inputs_outputs";

/// Paths used by a training run
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TrainingPaths {
    pub input_schema_dir: PathBuf,
    pub saved_schema_dir: PathBuf,
    pub model_config_file: PathBuf,
    pub train_dir: PathBuf,
    pub preprocessing_config_file: PathBuf,
    pub preprocessing_dir: PathBuf,
    pub predictor_dir: PathBuf,
    pub default_hyperparameters_file: PathBuf,
    pub hpt_config_file: PathBuf,
    pub hpt_results_dir: PathBuf,
    /// Read by the external explainer step, not by the trainer
    pub explainer_config_file: PathBuf,
    pub explainer_dir: PathBuf,
    pub train_error_file: PathBuf,
}

impl TrainingPaths {
    /// Standard layout below `root`
    pub fn from_root(root: impl AsRef<Path>) -> Self {
        let root = root.as_ref();
        let inputs = root.join("inputs");
        let model = root.join("model");
        let artifacts = model.join("artifacts");
        let config = root.join("config");
        let outputs = root.join("outputs");

        Self {
            input_schema_dir: inputs.join("schema"),
            saved_schema_dir: artifacts.join("schema"),
            model_config_file: config.join("model_config.json"),
            train_dir: inputs.join("data").join("training"),
            preprocessing_config_file: config.join("preprocessing.json"),
            preprocessing_dir: artifacts.join("preprocessing"),
            predictor_dir: artifacts.join("predictor"),
            default_hyperparameters_file: config.join("default_hyperparameters.json"),
            hpt_config_file: config.join("hpt.json"),
            hpt_results_dir: outputs.join("hpt_outputs"),
            explainer_config_file: config.join("explainer.json"),
            explainer_dir: artifacts.join("explainer"),
            train_error_file: outputs.join("errors").join("train_error.log"),
        }
    }
}

impl Default for TrainingPaths {
    fn default() -> Self {
        let root = std::env::var_os(ROOT_DIR_ENV)
            .map(PathBuf::from)
            .unwrap_or_else(|| PathBuf::from(DEFAULT_ROOT_DIR));
        Self::from_root(root)
    }
}

/// Configuration for a single training run
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct TrainingConfig {
    pub paths: TrainingPaths,
    /// Run hyperparameter tuning before the final fit
    pub run_tuning: bool,
}

impl TrainingConfig {
    pub fn new() -> Self {
        Self::default()
    }

    /// All paths below `root`
    pub fn from_root(root: impl AsRef<Path>) -> Self {
        Self {
            paths: TrainingPaths::from_root(root),
            run_tuning: false,
        }
    }

    pub fn with_run_tuning(mut self, run_tuning: bool) -> Self {
        self.run_tuning = run_tuning;
        self
    }

    pub fn with_input_schema_dir(mut self, path: impl Into<PathBuf>) -> Self {
        self.paths.input_schema_dir = path.into();
        self
    }

    pub fn with_saved_schema_dir(mut self, path: impl Into<PathBuf>) -> Self {
        self.paths.saved_schema_dir = path.into();
        self
    }

    pub fn with_model_config_file(mut self, path: impl Into<PathBuf>) -> Self {
        self.paths.model_config_file = path.into();
        self
    }

    pub fn with_train_dir(mut self, path: impl Into<PathBuf>) -> Self {
        self.paths.train_dir = path.into();
        self
    }

    pub fn with_preprocessing_config_file(mut self, path: impl Into<PathBuf>) -> Self {
        self.paths.preprocessing_config_file = path.into();
        self
    }

    pub fn with_preprocessing_dir(mut self, path: impl Into<PathBuf>) -> Self {
        self.paths.preprocessing_dir = path.into();
        self
    }

    pub fn with_predictor_dir(mut self, path: impl Into<PathBuf>) -> Self {
        self.paths.predictor_dir = path.into();
        self
    }

    pub fn with_default_hyperparameters_file(mut self, path: impl Into<PathBuf>) -> Self {
        self.paths.default_hyperparameters_file = path.into();
        self
    }

    pub fn with_hpt_config_file(mut self, path: impl Into<PathBuf>) -> Self {
        self.paths.hpt_config_file = path.into();
        self
    }

    pub fn with_hpt_results_dir(mut self, path: impl Into<PathBuf>) -> Self {
        self.paths.hpt_results_dir = path.into();
        self
    }

    pub fn with_explainer_config_file(mut self, path: impl Into<PathBuf>) -> Self {
        self.paths.explainer_config_file = path.into();
        self
    }

    pub fn with_explainer_dir(mut self, path: impl Into<PathBuf>) -> Self {
        self.paths.explainer_dir = path.into();
        self
    }

    pub fn with_train_error_file(mut self, path: impl Into<PathBuf>) -> Self {
        self.paths.train_error_file = path.into();
        self
    }
}

/// Model-level settings read from the model config file
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ModelConfig {
    /// Seed for every randomized step (rebalancing, tuning folds).
    /// Without it those steps draw from OS entropy and runs are not reproducible.
    #[serde(default)]
    pub seed_value: Option<u64>,
}

/// Read a JSON config file, falling back to `T::default()` when it does not exist
pub fn read_json_or_default<T>(path: &Path) -> Result<T>
where
    T: serde::de::DeserializeOwned + Default,
{
    if !path.exists() {
        return Ok(T::default());
    }
    let json = std::fs::read_to_string(path)?;
    serde_json::from_str(&json)
        .map_err(|e| TabularError::ConfigError(format!("invalid config {}: {}", path.display(), e)))
}
