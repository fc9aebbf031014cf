//! Model training module
//!
//! - K-Nearest Neighbors classifier over integer class codes
//! - Table-level [`Classifier`] that maps codes back to class labels
//! - Stratified k-fold cross-validation and grid-search tuning
//! - The [`Trainer`] orchestrating a full training run

mod classifier;
mod engine;
pub mod cross_validation;
pub mod knn;
pub mod tuning;

pub use classifier::{Classifier, PREDICTOR_FILE_NAME};
pub use cross_validation::{CVSplit, StratifiedKFold};
pub use engine::{run_training, Trainer, TrainingReport, TrainingState};
pub use knn::{DistanceMetric, KNNClassifier, KNNConfig, WeightScheme};
pub use tuning::{Trial, Tuner, TuningGrid, TuningResults, HPT_RESULTS_FILE_NAME};
