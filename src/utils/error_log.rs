//! Structured error records for failed runs

use crate::error::{Result, TabularError};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::error::Error as _;
use std::fs::OpenOptions;
use std::io::Write;
use std::path::Path;

/// One line of the error log
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ErrorRecord {
    pub message: String,
    pub error_type: String,
    pub error_detail: String,
    pub timestamp: DateTime<Utc>,
}

impl ErrorRecord {
    /// Build a record from an error, flattening its cause chain into `error_detail`
    pub fn new(message: impl Into<String>, error: &TabularError) -> Self {
        let mut detail = error.to_string();
        let mut cause = error.source();
        while let Some(inner) = cause {
            detail.push_str("\ncaused by: ");
            detail.push_str(&inner.to_string());
            cause = inner.source();
        }

        Self {
            message: message.into(),
            error_type: error.kind().to_string(),
            error_detail: detail,
            timestamp: Utc::now(),
        }
    }
}

/// Append an error record as one JSON line to `path`, creating parent directories
pub fn log_error(message: &str, error: &TabularError, path: &Path) -> Result<ErrorRecord> {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)?;
    }

    let record = ErrorRecord::new(message, error);
    let mut file = OpenOptions::new().create(true).append(true).open(path)?;
    writeln!(file, "{}", serde_json::to_string(&record)?)?;
    Ok(record)
}

/// Read every record from an error log
pub fn read_error_log(path: &Path) -> Result<Vec<ErrorRecord>> {
    std::fs::read_to_string(path)?
        .lines()
        .filter(|line| !line.trim().is_empty())
        .map(|line| serde_json::from_str(line).map_err(TabularError::from))
        .collect()
}
