//! Table-level KNN classifier
//!
//! Wraps [`KNNClassifier`] with the feature names and class labels seen during
//! fit, so predictions can be made from a polars table and come back as the
//! original class labels.

use crate::error::{Result, TabularError};
use crate::utils::frame::{column_names, to_feature_matrix, LabelEncoding};
use polars::prelude::{DataFrame, Series};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Instant;
use tracing::info;

use super::knn::{KNNClassifier, KNNConfig};

/// File name of the saved predictor inside the predictor directory
pub const PREDICTOR_FILE_NAME: &str = "predictor.json";

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Classifier {
    feature_names: Vec<String>,
    encoding: Option<LabelEncoding>,
    model: KNNClassifier,
}

impl Classifier {
    pub fn new(config: KNNConfig) -> Self {
        Self {
            feature_names: Vec::new(),
            encoding: None,
            model: KNNClassifier::new(config),
        }
    }

    pub fn config(&self) -> &KNNConfig {
        self.model.config()
    }

    pub fn feature_names(&self) -> &[String] {
        &self.feature_names
    }

    /// Class labels in code order; empty before fit
    pub fn classes(&self) -> &[String] {
        self.encoding.as_ref().map(|e| e.classes()).unwrap_or(&[])
    }

    pub fn is_fitted(&self) -> bool {
        self.encoding.is_some() && self.model.is_fitted()
    }

    /// Fit on a fully numeric feature table and its labels
    pub fn fit(&mut self, features: &DataFrame, labels: &Series) -> Result<&mut Self> {
        let start = Instant::now();

        if features.height() != labels.len() {
            return Err(TabularError::ModelError(format!(
                "feature table has {} rows but labels have {}",
                features.height(),
                labels.len()
            )));
        }
        if features.height() == 0 || features.width() == 0 {
            return Err(TabularError::ModelError(format!(
                "cannot fit on an empty table ({} x {})",
                features.height(),
                features.width()
            )));
        }

        let x = to_feature_matrix(features).map_err(model_error)?;
        let encoding = LabelEncoding::fit(labels).map_err(model_error)?;
        let y = encoding.encode(labels).map_err(model_error)?;
        self.model.fit(&x, &y).map_err(model_error)?;

        self.feature_names = column_names(features);
        self.encoding = Some(encoding);

        info!(
            rows = x.nrows(),
            features = x.ncols(),
            classes = self.classes().len(),
            k = self.config().n_neighbors,
            elapsed_ms = start.elapsed().as_millis() as u64,
            "Classifier fitted"
        );
        Ok(self)
    }

    /// Predict class labels for `features`
    pub fn predict(&self, features: &DataFrame) -> Result<Vec<String>> {
        let encoding = self.encoding.as_ref().ok_or(TabularError::ModelNotFitted)?;

        let names = column_names(features);
        if names != self.feature_names {
            return Err(TabularError::ShapeError {
                expected: format!("columns {:?}", self.feature_names),
                actual: format!("columns {:?}", names),
            });
        }

        let x = to_feature_matrix(features)?;
        self.model
            .predict(&x)?
            .iter()
            .map(|&code| encoding.decode_one(code).map(str::to_string))
            .collect()
    }

    /// Write the model as `predictor.json` inside `dir`, creating it if needed
    pub fn save(&self, dir: impl AsRef<Path>) -> Result<PathBuf> {
        let dir = dir.as_ref();
        std::fs::create_dir_all(dir).map_err(|e| model_error(e.into()))?;
        let path = dir.join(PREDICTOR_FILE_NAME);
        let json = serde_json::to_string(self).map_err(|e| model_error(e.into()))?;
        std::fs::write(&path, json).map_err(|e| model_error(e.into()))?;
        Ok(path)
    }

    /// Read a model written by [`Classifier::save`]. Failures are model errors.
    pub fn load(dir: impl AsRef<Path>) -> Result<Self> {
        let json = std::fs::read_to_string(dir.as_ref().join(PREDICTOR_FILE_NAME))
            .map_err(|e| model_error(e.into()))?;
        serde_json::from_str(&json).map_err(|e| model_error(e.into()))
    }
}

fn model_error(error: TabularError) -> TabularError {
    match error {
        TabularError::ModelError(_) => error,
        other => TabularError::ModelError(other.to_string()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use polars::prelude::*;

    fn data() -> (DataFrame, Series) {
        let df = df! {
            "a" => &[0.0, 0.1, 0.2, 5.0, 5.1, 5.2],
            "b" => &[1.0, 1.1, 0.9, 6.0, 6.1, 5.9],
        }
        .unwrap();
        let labels = Series::new("y".into(), &["low", "low", "low", "high", "high", "high"]);
        (df, labels)
    }

    #[test]
    fn test_fit_predict_returns_labels() {
        let (df, labels) = data();
        let mut clf = Classifier::new(KNNConfig::default().with_k(3));
        clf.fit(&df, &labels).unwrap();

        assert_eq!(clf.classes(), &["high".to_string(), "low".to_string()]);
        let predictions = clf.predict(&df).unwrap();
        assert_eq!(predictions, vec!["low", "low", "low", "high", "high", "high"]);
    }

    #[test]
    fn test_fit_errors_are_model_errors() {
        let (df, labels) = data();
        let mut clf = Classifier::new(KNNConfig::default());

        let short = labels.head(Some(3));
        assert!(matches!(clf.fit(&df, &short), Err(TabularError::ModelError(_))));

        let text = df!("a" => &["x", "y"]).unwrap();
        let two = labels.head(Some(2));
        assert!(matches!(clf.fit(&text, &two), Err(TabularError::ModelError(_))));

        let missing = df!("a" => &[Some(1.0), None]).unwrap();
        assert!(matches!(clf.fit(&missing, &two), Err(TabularError::ModelError(_))));

        let empty = DataFrame::empty();
        let none = labels.head(Some(0));
        assert!(matches!(clf.fit(&empty, &none), Err(TabularError::ModelError(_))));
    }

    #[test]
    fn test_predict_checks_columns() {
        let (df, labels) = data();
        let mut clf = Classifier::new(KNNConfig::default().with_k(1));
        assert!(matches!(clf.predict(&df), Err(TabularError::ModelNotFitted)));

        clf.fit(&df, &labels).unwrap();
        let swapped = df.select(["b", "a"]).unwrap();
        assert!(matches!(clf.predict(&swapped), Err(TabularError::ShapeError { .. })));
    }

    #[test]
    fn test_save_creates_directory() {
        let dir = tempfile::tempdir().unwrap();
        let target = dir.path().join("model").join("artifacts").join("predictor");

        let (df, labels) = data();
        let mut clf = Classifier::new(KNNConfig::default().with_k(3));
        clf.fit(&df, &labels).unwrap();

        let path = clf.save(&target).unwrap();
        assert!(path.ends_with(PREDICTOR_FILE_NAME));

        let loaded = Classifier::load(&target).unwrap();
        assert_eq!(loaded.feature_names(), clf.feature_names());
        assert_eq!(loaded.predict(&df).unwrap(), clf.predict(&df).unwrap());
    }

    #[test]
    fn test_save_into_blocked_path_is_model_error() {
        let dir = tempfile::tempdir().unwrap();
        let blocked = dir.path().join("predictor");
        std::fs::write(&blocked, "not a directory").unwrap();

        let (df, labels) = data();
        let mut clf = Classifier::new(KNNConfig::default().with_k(3));
        clf.fit(&df, &labels).unwrap();

        let err = clf.save(&blocked).unwrap_err();
        assert!(matches!(err, TabularError::ModelError(_)));
        assert_eq!(err.kind(), "ModelError");
    }

    #[test]
    fn test_load_missing_model_is_model_error() {
        let dir = tempfile::tempdir().unwrap();
        let err = Classifier::load(dir.path()).unwrap_err();
        assert!(matches!(err, TabularError::ModelError(_)));
    }
}
