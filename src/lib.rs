//! Tabular KNN - schema-driven training for k-nearest-neighbour classifiers
//!
//! A training run reads a schema and a training CSV, threads the features
//! and labels through a preprocessing pipeline of scope-tagged stages,
//! corrects class imbalance, fits a KNN classifier and saves the artifacts.
//!
//! # Modules
//!
//! - [`schema`] - Dataset schema loading and saving
//! - [`preprocessing`] - Stage contract, registry, executor and transforms
//! - [`synthetic`] - Class imbalance correction (SMOTE, random over/under sampling)
//! - [`training`] - KNN classifier, tuning and the training orchestrator
//! - [`config`] - Paths and run configuration
//! - [`utils`] - CSV loading, table/matrix conversion, error log
//! - [`cli`] - Command-line interface

pub mod error;

pub mod config;
pub mod schema;

pub mod preprocessing;
pub mod synthetic;
pub mod training;

pub mod utils;

pub mod cli;

pub use error::{Result, TabularError};

/// Re-export commonly used types
pub mod prelude {
    pub use crate::error::{Result, TabularError};

    pub use crate::config::{ModelConfig, TrainingConfig, TrainingPaths};
    pub use crate::schema::{load_schema, save_schema, Feature, FeatureType, Schema};

    pub use crate::preprocessing::{
        build_pipeline, PipelinePlan, PreprocessingConfig, ScopeTag, Stage, StageRegistry, StageScope,
        StageSpec, Transform,
    };

    pub use crate::synthetic::{ImbalanceCorrector, RebalanceConfig, ResampleStrategy, Sampler};

    pub use crate::training::{
        run_training, Classifier, KNNConfig, Trainer, TrainingReport, TrainingState, WeightScheme,
    };

    pub use crate::utils::{log_error, read_csv_in_directory, ErrorRecord};
}
