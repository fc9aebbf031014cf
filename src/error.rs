//! Error types for the tabular KNN trainer

use thiserror::Error;

/// Result type alias for trainer operations
pub type Result<T> = std::result::Result<T, TabularError>;

/// Message prefix used by the training orchestrator when it wraps a failure
pub const TRAINING_ERROR_PREFIX: &str = "Error occurred during training.";

/// Main error type for the trainer
#[derive(Error, Debug)]
pub enum TabularError {
    /// Invalid schema, preprocessing or pipeline setup. Not retryable.
    #[error("Configuration error: {0}")]
    ConfigError(String),

    /// Malformed or misaligned feature/label data. Not retryable.
    #[error("Data error: {0}")]
    DataError(String),

    /// A pipeline stage failed
    #[error("Stage '{stage}'{} failed: {source}", column_suffix(.column))]
    StageExecution {
        stage: String,
        column: Option<String>,
        #[source]
        source: Box<TabularError>,
    },

    /// Classifier fit/predict/save failure
    #[error("Model error: {0}")]
    ModelError(String),

    /// Wrapped failure surfaced by the training orchestrator
    #[error("{} Error: {message}", TRAINING_ERROR_PREFIX)]
    TrainingFailed {
        message: String,
        #[source]
        source: Box<TabularError>,
    },

    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    SerializationError(String),

    #[error("Invalid shape: expected {expected}, got {actual}")]
    ShapeError { expected: String, actual: String },

    #[error("Feature not found: {0}")]
    FeatureNotFound(String),

    #[error("Model not fitted")]
    ModelNotFitted,

    #[error("Validation error: {0}")]
    ValidationError(String),
}

fn column_suffix(column: &Option<String>) -> String {
    match column {
        Some(c) => format!(" on column '{}'", c),
        None => String::new(),
    }
}

impl TabularError {
    /// Stable name of the error kind, written to the error log as `error_type`
    pub fn kind(&self) -> &'static str {
        match self {
            TabularError::ConfigError(_) => "ConfigurationError",
            TabularError::DataError(_) => "DataError",
            TabularError::StageExecution { .. } => "StageExecutionError",
            TabularError::ModelError(_) => "ModelError",
            TabularError::TrainingFailed { .. } => "TrainingError",
            TabularError::IoError(_) => "IoError",
            TabularError::SerializationError(_) => "SerializationError",
            TabularError::ShapeError { .. } => "ShapeError",
            TabularError::FeatureNotFound(_) => "FeatureNotFound",
            TabularError::ModelNotFitted => "ModelNotFitted",
            TabularError::ValidationError(_) => "ValidationError",
        }
    }

    /// Innermost error in a chain of stage/training wrappers
    pub fn root_cause(&self) -> &TabularError {
        match self {
            TabularError::StageExecution { source, .. }
            | TabularError::TrainingFailed { source, .. } => source.root_cause(),
            other => other,
        }
    }
}

impl From<polars::error::PolarsError> for TabularError {
    fn from(err: polars::error::PolarsError) -> Self {
        TabularError::DataError(err.to_string())
    }
}

impl From<serde_json::Error> for TabularError {
    fn from(err: serde_json::Error) -> Self {
        TabularError::SerializationError(err.to_string())
    }
}
