//! Hyperparameter tuning for the KNN classifier
//!
//! Grid search over the number of neighbors and the weighting scheme, scored
//! by mean stratified k-fold accuracy.

use crate::error::{Result, TabularError};
use crate::utils::frame::{to_feature_matrix, LabelEncoding};
use chrono::{DateTime, Utc};
use ndarray::{Array1, Array2, Axis};
use polars::prelude::{DataFrame, Series};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Instant;
use tracing::{debug, info};

use super::cross_validation::StratifiedKFold;
use super::knn::{DistanceMetric, KNNClassifier, KNNConfig, WeightScheme};

/// File name of the tuning results inside the HPT output directory
pub const HPT_RESULTS_FILE_NAME: &str = "hpt_results.json";

/// Search space, read from the HPT config file
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TuningGrid {
    pub n_neighbors: Vec<usize>,
    pub weights: Vec<WeightScheme>,
    pub metric: DistanceMetric,
    pub n_folds: usize,
}

impl Default for TuningGrid {
    fn default() -> Self {
        Self {
            n_neighbors: vec![1, 3, 5, 7, 9, 11, 15],
            weights: vec![WeightScheme::Uniform, WeightScheme::Distance],
            metric: DistanceMetric::Euclidean,
            n_folds: 5,
        }
    }
}

impl TuningGrid {
    fn candidates(&self) -> Vec<KNNConfig> {
        self.n_neighbors
            .iter()
            .filter(|&&k| k > 0)
            .flat_map(|&k| {
                self.weights.iter().map(move |&weights| KNNConfig {
                    n_neighbors: k,
                    metric: self.metric,
                    weights,
                })
            })
            .collect()
    }
}

/// Score of one candidate
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Trial {
    pub config: KNNConfig,
    pub fold_scores: Vec<f64>,
    pub mean_score: f64,
}

/// Outcome of a tuning run
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TuningResults {
    pub metric: String,
    pub n_folds: usize,
    pub trials: Vec<Trial>,
    pub best_config: KNNConfig,
    pub best_score: f64,
    pub completed_at: DateTime<Utc>,
}

impl TuningResults {
    /// Write the results as `hpt_results.json` inside `dir`, creating it if needed
    pub fn save(&self, dir: impl AsRef<Path>) -> Result<PathBuf> {
        let dir = dir.as_ref();
        std::fs::create_dir_all(dir)?;
        let path = dir.join(HPT_RESULTS_FILE_NAME);
        std::fs::write(&path, serde_json::to_string_pretty(self)?)?;
        Ok(path)
    }
}

/// Grid-search tuner
pub struct Tuner {
    grid: TuningGrid,
    seed: Option<u64>,
}

impl Tuner {
    pub fn new(grid: TuningGrid) -> Self {
        Self { grid, seed: None }
    }

    pub fn with_seed(mut self, seed: Option<u64>) -> Self {
        self.seed = seed;
        self
    }

    /// Evaluate every candidate on the same folds and return the best one.
    /// Ties keep the earlier candidate in grid order.
    pub fn tune(&self, features: &DataFrame, labels: &Series) -> Result<TuningResults> {
        let start = Instant::now();
        let candidates = self.grid.candidates();
        if candidates.is_empty() {
            return Err(TabularError::ConfigError(
                "tuning search space is empty".to_string(),
            ));
        }

        let x = to_feature_matrix(features)?;
        let y = LabelEncoding::fit(labels)?.encode(labels)?;

        let n_folds = self.grid.n_folds.min(y.len());
        let splits = StratifiedKFold::new(n_folds)
            .with_random_state(self.seed)
            .split(&y)?;

        let mut trials = Vec::with_capacity(candidates.len());
        for config in candidates {
            let mut fold_scores = Vec::with_capacity(splits.len());
            for split in &splits {
                let (x_train, y_train) = take_rows(&x, &y, &split.train_indices);
                let (x_test, y_test) = take_rows(&x, &y, &split.test_indices);

                let mut model = KNNClassifier::new(config.clone());
                model.fit(&x_train, &y_train)?;
                fold_scores.push(accuracy(&y_test, &model.predict(&x_test)?));
            }
            let mean_score = fold_scores.iter().sum::<f64>() / fold_scores.len() as f64;
            debug!(
                k = config.n_neighbors,
                weights = ?config.weights,
                mean_score,
                "Tuning trial complete"
            );
            trials.push(Trial {
                config,
                fold_scores,
                mean_score,
            });
        }

        let best = trials
            .iter()
            .fold(None, |best: Option<&Trial>, trial| match best {
                Some(b) if b.mean_score >= trial.mean_score => Some(b),
                _ => Some(trial),
            })
            .ok_or_else(|| TabularError::ModelError("no tuning trial completed".to_string()))?;
        let best_config = best.config.clone();
        let best_score = best.mean_score;

        info!(
            trials = trials.len(),
            folds = n_folds,
            best_k = best_config.n_neighbors,
            best_weights = ?best_config.weights,
            best_score,
            elapsed_ms = start.elapsed().as_millis() as u64,
            "Hyperparameter tuning complete"
        );

        Ok(TuningResults {
            metric: "accuracy".to_string(),
            n_folds,
            trials,
            best_config,
            best_score,
            completed_at: Utc::now(),
        })
    }
}

fn take_rows(x: &Array2<f64>, y: &Array1<i64>, rows: &[usize]) -> (Array2<f64>, Array1<i64>) {
    (x.select(Axis(0), rows), y.select(Axis(0), rows))
}

fn accuracy(y_true: &Array1<i64>, y_pred: &Array1<i64>) -> f64 {
    if y_true.is_empty() {
        return 0.0;
    }
    let correct = y_true.iter().zip(y_pred.iter()).filter(|(a, b)| a == b).count();
    correct as f64 / y_true.len() as f64
}
