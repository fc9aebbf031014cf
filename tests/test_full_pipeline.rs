//! End-to-end training runs against a temporary inputs/outputs tree

use std::fs;
use std::path::Path;
use tabular_knn::config::TrainingConfig;
use tabular_knn::error::{TabularError, TRAINING_ERROR_PREFIX};
use tabular_knn::preprocessing::PipelinePlan;
use tabular_knn::schema::{load_schema, save_schema, Feature, Schema};
use tabular_knn::training::{Classifier, Trainer, TrainingState};
use tabular_knn::utils::read_error_log;

const SCHEMA_JSON: &str = r#"{
  "title": "Toy binary problem",
  "modelCategory": "binary_classification",
  "id": {"name": "id"},
  "target": {"name": "y", "classes": ["0", "1"]},
  "features": [
    {"name": "a", "dataType": "NUMERIC"},
    {"name": "b", "dataType": "CATEGORICAL"}
  ]
}"#;

const TRAIN_CSV: &str = "\
id,a,b,y
1,1.0,red,0
2,,blue,0
3,1.4,red,0
4,0.9,blue,0
5,1.1,red,0
6,,red,0
7,1.3,blue,0
8,1.2,red,0
9,6.0,green,1
10,6.4,green,1
";

const PREPROCESSING_JSON: &str = r#"{
  "stages": [
    {"name": "impute_numeric", "scope": "COLUMN", "column": "a"},
    {"name": "encode_categorical", "scope": "SCHEMA"}
  ]
}"#;

fn write_inputs(root: &Path, csv: &str) -> TrainingConfig {
    let config = TrainingConfig::from_root(root);
    let paths = &config.paths;

    fs::create_dir_all(&paths.input_schema_dir).unwrap();
    fs::write(paths.input_schema_dir.join("toy_schema.json"), SCHEMA_JSON).unwrap();
    fs::create_dir_all(&paths.train_dir).unwrap();
    fs::write(paths.train_dir.join("train.csv"), csv).unwrap();

    fs::create_dir_all(paths.preprocessing_config_file.parent().unwrap()).unwrap();
    fs::write(&paths.preprocessing_config_file, PREPROCESSING_JSON).unwrap();
    fs::write(&paths.model_config_file, r#"{"seed_value": 42}"#).unwrap();
    fs::write(&paths.default_hyperparameters_file, r#"{"n_neighbors": 3}"#).unwrap();

    config
}

// ============================================================================
// Successful runs
// ============================================================================

#[test]
fn test_end_to_end_imbalanced_run() {
    let dir = tempfile::tempdir().unwrap();
    let config = write_inputs(dir.path(), TRAIN_CSV);
    let paths = config.paths.clone();

    let mut trainer = Trainer::new(config);
    let report = trainer.run().unwrap();
    assert_eq!(trainer.state(), TrainingState::Saved);

    // neither stage drops rows
    assert_eq!(report.rows_loaded, 10);
    assert_eq!(report.rows_after_pipeline, 10);
    assert_eq!(report.class_counts_before["0"], 8);
    assert_eq!(report.class_counts_before["1"], 2);

    let major = report.class_counts_after["0"] as f64;
    let minor = report.class_counts_after["1"] as f64;
    assert!(major / minor <= 6.0 / 4.0);
    assert_eq!(report.hyperparameters.n_neighbors, 3);
    assert_eq!(report.feature_names, vec!["a", "b_red", "b_blue", "b_green"]);

    let classifier = Classifier::load(&paths.predictor_dir).unwrap();
    assert_eq!(classifier.classes(), &["0".to_string(), "1".to_string()]);

    let plan = PipelinePlan::load(&paths.preprocessing_dir).unwrap();
    assert_eq!(plan.stages.len(), 2);
    assert_eq!(plan.stages[0].column.as_deref(), Some("a"));
}

#[test]
fn test_saved_schema_matches_input() {
    let dir = tempfile::tempdir().unwrap();
    let config = write_inputs(dir.path(), TRAIN_CSV);
    let paths = config.paths.clone();

    Trainer::new(config).run().unwrap();

    let input = load_schema(&paths.input_schema_dir).unwrap();
    let saved = load_schema(&paths.saved_schema_dir).unwrap();
    assert_eq!(input, saved);
    assert_eq!(saved.id(), Some("id"));
}

#[test]
fn test_schema_round_trip() {
    let dir = tempfile::tempdir().unwrap();
    let schema = Schema::new("y", vec![Feature::numeric("a"), Feature::categorical("b")])
        .unwrap()
        .with_title("round trip");

    save_schema(&schema, dir.path()).unwrap();
    assert_eq!(load_schema(dir.path()).unwrap(), schema);
}

#[test]
fn test_missing_predictor_dir_is_created_and_rerun_succeeds() {
    let dir = tempfile::tempdir().unwrap();
    let config = write_inputs(dir.path(), TRAIN_CSV);
    let predictor_dir = config.paths.predictor_dir.clone();
    assert!(!predictor_dir.exists());

    Trainer::new(config.clone()).run().unwrap();
    assert!(predictor_dir.join("predictor.json").exists());

    Trainer::new(config).run().unwrap();
    assert!(predictor_dir.join("predictor.json").exists());
}

#[test]
fn test_seeded_runs_produce_identical_models() {
    let first = tempfile::tempdir().unwrap();
    let second = tempfile::tempdir().unwrap();
    let config_a = write_inputs(first.path(), TRAIN_CSV);
    let config_b = write_inputs(second.path(), TRAIN_CSV);

    let model_a = config_a.paths.predictor_dir.join("predictor.json");
    let model_b = config_b.paths.predictor_dir.join("predictor.json");
    Trainer::new(config_a).run().unwrap();
    Trainer::new(config_b).run().unwrap();

    assert_eq!(fs::read_to_string(model_a).unwrap(), fs::read_to_string(model_b).unwrap());
}

#[test]
fn test_run_with_tuning_writes_results() {
    let dir = tempfile::tempdir().unwrap();
    let config = write_inputs(dir.path(), TRAIN_CSV).with_run_tuning(true);
    fs::write(
        &config.paths.hpt_config_file,
        r#"{"n_neighbors": [1, 3], "weights": ["uniform"], "n_folds": 2}"#,
    )
    .unwrap();
    let results_dir = config.paths.hpt_results_dir.clone();

    let report = Trainer::new(config).run().unwrap();
    assert!(report.tuned);
    assert!([1, 3].contains(&report.hyperparameters.n_neighbors));
    assert!(results_dir.join("hpt_results.json").exists());
}

// ============================================================================
// Failures
// ============================================================================

#[test]
fn test_malformed_column_fails_run_and_records_error() {
    let dir = tempfile::tempdir().unwrap();
    let csv = TRAIN_CSV.replace("1,1.0,red,0", "1,not-a-number,red,0");
    let config = write_inputs(dir.path(), &csv);
    let error_file = config.paths.train_error_file.clone();
    let predictor_dir = config.paths.predictor_dir.clone();

    let mut trainer = Trainer::new(config);
    let err = trainer.run().unwrap_err();

    assert_eq!(trainer.state(), TrainingState::Failed);
    assert!(!predictor_dir.join("predictor.json").exists());

    let message = err.to_string();
    assert!(message.starts_with(&format!("{} Error:", TRAINING_ERROR_PREFIX)));
    assert!(message.contains("impute_numeric"));

    match &err {
        TabularError::TrainingFailed { source, .. } => {
            assert!(matches!(**source, TabularError::StageExecution { .. }));
            assert!(message.contains(&source.to_string()));
        }
        other => panic!("expected TrainingFailed, got {:?}", other),
    }

    let records = read_error_log(&error_file).unwrap();
    assert_eq!(records.len(), 1);
    assert_eq!(records[0].error_type, "StageExecutionError");
    assert!(!records[0].error_detail.is_empty());
}

#[test]
fn test_pipeline_dropping_every_feature_fails_clearly() {
    let dir = tempfile::tempdir().unwrap();
    let config = TrainingConfig::from_root(dir.path());
    let paths = config.paths.clone();

    let schema = Schema::new("y", vec![Feature::numeric("a")]).unwrap();
    save_schema(&schema, &paths.input_schema_dir).unwrap();
    fs::create_dir_all(&paths.train_dir).unwrap();
    let mut csv = String::from("a,y\n");
    for i in 0..10 {
        csv.push_str(&format!("1.0,{}\n", if i < 8 { 0 } else { 1 }));
    }
    fs::write(paths.train_dir.join("train.csv"), csv).unwrap();

    // default pipeline drops the constant column
    let mut trainer = Trainer::new(config);
    let err = trainer.run().unwrap_err();
    assert_eq!(trainer.state(), TrainingState::Failed);
    assert!(!paths.predictor_dir.join("predictor.json").exists());

    match &err {
        TabularError::TrainingFailed { source, .. } => {
            assert!(matches!(**source, TabularError::DataError(_)));
        }
        other => panic!("expected TrainingFailed, got {:?}", other),
    }
    assert!(err.to_string().contains("removed every feature column"));

    let records = read_error_log(&paths.train_error_file).unwrap();
    assert_eq!(records[0].error_type, "DataError");
}

#[test]
fn test_failures_append_to_error_log() {
    let dir = tempfile::tempdir().unwrap();
    let config = TrainingConfig::from_root(dir.path());
    let error_file = config.paths.train_error_file.clone();

    assert!(Trainer::new(config.clone()).run().is_err());
    assert!(Trainer::new(config).run().is_err());

    let records = read_error_log(&error_file).unwrap();
    assert_eq!(records.len(), 2);
    assert!(records.iter().all(|r| r.error_type == "ConfigurationError"));
}
