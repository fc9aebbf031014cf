//! Training orchestrator
//!
//! Drives one training run from the schema and training CSV to a saved
//! predictor. The run moves through
//! `Init → SchemaLoaded → DataLoaded → PipelineRun → Rebalanced → ModelFit → Saved`
//! and ends in `Failed` from any state on error. This is the only place errors
//! are logged and wrapped; everything below it propagates them unchanged.

use crate::config::{read_json_or_default, ModelConfig, TrainingConfig};
use crate::error::{Result, TabularError, TRAINING_ERROR_PREFIX};
use crate::preprocessing::{self, PipelinePlan, PreprocessingConfig, StageRegistry};
use crate::schema::{load_schema, save_schema};
use crate::synthetic::ImbalanceCorrector;
use crate::utils::frame::{column_names, label_strings};
use crate::utils::{log_error, read_csv_in_directory};
use polars::prelude::Series;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::time::Instant;
use tracing::{error, info, warn};

use super::classifier::Classifier;
use super::knn::KNNConfig;
use super::tuning::{Tuner, TuningGrid};

/// Where a training run currently is
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum TrainingState {
    Init,
    SchemaLoaded,
    DataLoaded,
    PipelineRun,
    Rebalanced,
    ModelFit,
    Saved,
    Failed,
}

impl fmt::Display for TrainingState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Debug::fmt(self, f)
    }
}

/// Summary of a successful run
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TrainingReport {
    pub rows_loaded: usize,
    pub rows_after_pipeline: usize,
    pub rows_after_rebalance: usize,
    pub class_counts_before: BTreeMap<String, usize>,
    pub class_counts_after: BTreeMap<String, usize>,
    pub feature_names: Vec<String>,
    pub hyperparameters: KNNConfig,
    pub tuned: bool,
    pub elapsed_secs: f64,
}

/// Runs the training workflow for one [`TrainingConfig`]
#[derive(Debug)]
pub struct Trainer {
    config: TrainingConfig,
    state: TrainingState,
}

impl Trainer {
    pub fn new(config: TrainingConfig) -> Self {
        Self {
            config,
            state: TrainingState::Init,
        }
    }

    pub fn config(&self) -> &TrainingConfig {
        &self.config
    }

    pub fn state(&self) -> TrainingState {
        self.state
    }

    /// Run the whole workflow.
    ///
    /// On failure the error is logged, appended to the train error file and
    /// returned as [`TabularError::TrainingFailed`] with the original error as
    /// its source. A failure to write that record is only logged as a warning.
    pub fn run(&mut self) -> Result<TrainingReport> {
        self.state = TrainingState::Init;
        info!("Starting training run");

        match self.execute() {
            Ok(report) => {
                info!(
                    rows = report.rows_after_rebalance,
                    features = report.feature_names.len(),
                    k = report.hyperparameters.n_neighbors,
                    elapsed_secs = report.elapsed_secs,
                    "Training completed"
                );
                Ok(report)
            }
            Err(err) => {
                let failed_in = self.state;
                self.state = TrainingState::Failed;
                error!(state = %failed_in, error = %err, "{}", TRAINING_ERROR_PREFIX);

                let error_file = &self.config.paths.train_error_file;
                if let Err(log_err) = log_error(TRAINING_ERROR_PREFIX, &err, error_file) {
                    warn!(
                        path = %error_file.display(),
                        error = %log_err,
                        "Could not write training error record"
                    );
                }

                Err(TabularError::TrainingFailed {
                    message: err.to_string(),
                    source: Box::new(err),
                })
            }
        }
    }

    fn advance(&mut self, state: TrainingState) {
        info!(from = %self.state, to = %state, "Training state change");
        self.state = state;
    }

    fn execute(&mut self) -> Result<TrainingReport> {
        let start = Instant::now();
        let paths = self.config.paths.clone();

        let schema = load_schema(&paths.input_schema_dir)?;
        save_schema(&schema, &paths.saved_schema_dir)?;
        self.advance(TrainingState::SchemaLoaded);

        let model_config: ModelConfig = read_json_or_default(&paths.model_config_file)?;
        let preprocessing_config: PreprocessingConfig =
            read_json_or_default(&paths.preprocessing_config_file)?;
        let default_hyperparameters: KNNConfig =
            read_json_or_default(&paths.default_hyperparameters_file)?;

        let data = read_csv_in_directory(&paths.train_dir)?;
        let (features, labels) = schema.select_training_data(&data)?;
        let rows_loaded = features.height();
        let class_counts_before = count_labels(&labels)?;
        info!(
            rows = rows_loaded,
            features = features.width(),
            classes = class_counts_before.len(),
            "Training data loaded"
        );
        self.advance(TrainingState::DataLoaded);

        let registry = StageRegistry::new(preprocessing_config.clone());
        let stages = registry.build_pipeline(&schema)?;
        PipelinePlan::new(&preprocessing_config, &stages).save(&paths.preprocessing_dir)?;
        let (features, labels) = preprocessing::run(features, labels, &schema, &stages)?;
        let rows_after_pipeline = features.height();
        self.advance(TrainingState::PipelineRun);

        let mut rebalance = preprocessing_config.rebalance.clone();
        if rebalance.seed.is_none() {
            rebalance.seed = model_config.seed_value;
        }
        let (features, labels) = ImbalanceCorrector::new(rebalance).rebalance(features, labels)?;
        let class_counts_after = count_labels(&labels)?;
        self.advance(TrainingState::Rebalanced);

        let hyperparameters = if self.config.run_tuning {
            let grid: TuningGrid = read_json_or_default(&paths.hpt_config_file)?;
            let results = Tuner::new(grid)
                .with_seed(model_config.seed_value)
                .tune(&features, &labels)?;
            results.save(&paths.hpt_results_dir)?;
            results.best_config
        } else {
            default_hyperparameters
        };

        let mut classifier = Classifier::new(hyperparameters.clone());
        classifier.fit(&features, &labels)?;
        self.advance(TrainingState::ModelFit);

        classifier.save(&paths.predictor_dir)?;
        self.advance(TrainingState::Saved);

        Ok(TrainingReport {
            rows_loaded,
            rows_after_pipeline,
            rows_after_rebalance: features.height(),
            class_counts_before,
            class_counts_after,
            feature_names: column_names(&features),
            hyperparameters,
            tuned: self.config.run_tuning,
            elapsed_secs: start.elapsed().as_secs_f64(),
        })
    }
}

/// Run training with `config`
pub fn run_training(config: TrainingConfig) -> Result<TrainingReport> {
    Trainer::new(config).run()
}

fn count_labels(labels: &Series) -> Result<BTreeMap<String, usize>> {
    let mut counts = BTreeMap::new();
    for label in label_strings(labels)? {
        *counts.entry(label).or_insert(0) += 1;
    }
    Ok(counts)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schema::{Feature, Schema};
    use crate::utils::read_error_log;
    use std::fs;
    use std::path::Path;

    fn write_inputs(root: &Path, csv: &str) {
        let schema = Schema::new("y", vec![Feature::numeric("a"), Feature::categorical("c")]).unwrap();
        save_schema(&schema, root.join("inputs").join("schema")).unwrap();
        let train_dir = root.join("inputs").join("data").join("training");
        fs::create_dir_all(&train_dir).unwrap();
        fs::write(train_dir.join("train.csv"), csv).unwrap();
    }

    const CSV: &str = "a,c,y\n1.0,r,0\n1.2,g,0\n0.8,r,0\n1.1,g,0\n0.9,r,0\n5.0,b,1\n5.2,b,1\n";

    #[test]
    fn test_successful_run_reaches_saved() {
        let dir = tempfile::tempdir().unwrap();
        write_inputs(dir.path(), CSV);

        let mut trainer = Trainer::new(TrainingConfig::from_root(dir.path()));
        let report = trainer.run().unwrap();

        assert_eq!(trainer.state(), TrainingState::Saved);
        assert_eq!(report.rows_loaded, 7);
        assert_eq!(report.class_counts_before["0"], 5);
        assert_eq!(report.class_counts_after["0"], report.class_counts_after["1"]);
        assert!(!report.tuned);

        let paths = &trainer.config().paths;
        assert!(paths.predictor_dir.join("predictor.json").exists());
        assert!(paths.saved_schema_dir.join("schema.json").exists());
        assert!(paths.preprocessing_dir.join("pipeline.json").exists());
    }

    #[test]
    fn test_missing_data_fails_and_logs() {
        let dir = tempfile::tempdir().unwrap();
        let schema = Schema::new("y", vec![Feature::numeric("a")]).unwrap();
        save_schema(&schema, dir.path().join("inputs").join("schema")).unwrap();

        let config = TrainingConfig::from_root(dir.path());
        let error_file = config.paths.train_error_file.clone();
        let mut trainer = Trainer::new(config);
        let err = trainer.run().unwrap_err();

        assert_eq!(trainer.state(), TrainingState::Failed);
        assert!(err.to_string().starts_with(TRAINING_ERROR_PREFIX));
        assert!(matches!(err, TabularError::TrainingFailed { .. }));

        let records = read_error_log(&error_file).unwrap();
        assert_eq!(records.len(), 1);
        assert!(!records[0].error_detail.is_empty());
    }
}
