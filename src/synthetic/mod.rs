//! Class imbalance correction
//!
//! Samplers work on ndarray matrices with integer class codes:
//! - SMOTE (Synthetic Minority Over-sampling Technique)
//! - Random oversampling
//! - Random undersampling
//!
//! [`ImbalanceCorrector`] applies the configured sampler to a preprocessed
//! polars table and its label column.

mod random_sampling;
mod smote;

pub use random_sampling::{RandomOverSampler, RandomUnderSampler};
pub use smote::SMOTE;

use crate::error::{Result, TabularError};
use crate::utils::frame::{column_names, from_feature_matrix, to_feature_matrix, LabelEncoding};
use ndarray::{Array1, Array2};
use polars::prelude::{DataFrame, Series};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use tracing::{info, warn};

/// Result of resampling
#[derive(Debug, Clone)]
pub struct ResampleResult {
    /// Resampled features
    pub x: Array2<f64>,
    /// Resampled labels
    pub y: Array1<i64>,
    /// Number of synthetic samples generated per class, in class order
    pub n_synthetic: Vec<usize>,
}

/// Trait for samplers
pub trait Sampler: Send + Sync {
    /// Fit the sampler on data
    fn fit(&mut self, x: &Array2<f64>, y: &Array1<i64>) -> Result<()>;

    /// Resample data
    fn resample(&self, x: &Array2<f64>, y: &Array1<i64>) -> Result<ResampleResult>;

    /// Fit and resample in one step
    fn fit_resample(&mut self, x: &Array2<f64>, y: &Array1<i64>) -> Result<ResampleResult> {
        self.fit(x, y)?;
        self.resample(x, y)
    }
}

/// Class distribution, ordered by class code
pub fn class_counts(y: &Array1<i64>) -> BTreeMap<i64, usize> {
    let mut counts = BTreeMap::new();
    for &label in y.iter() {
        *counts.entry(label).or_insert(0) += 1;
    }
    counts
}

/// Row indices for each class, ordered by class code
pub fn class_indices(y: &Array1<i64>) -> BTreeMap<i64, Vec<usize>> {
    let mut indices = BTreeMap::new();
    for (i, &label) in y.iter().enumerate() {
        indices.entry(label).or_insert_with(Vec::new).push(i);
    }
    indices
}

/// Ratio of the largest to the smallest class count (1.0 for empty input)
pub fn imbalance_ratio<V: Copy + Into<f64>>(counts: impl IntoIterator<Item = V>) -> f64 {
    let counts: Vec<f64> = counts.into_iter().map(Into::into).collect();
    let max = counts.iter().copied().fold(f64::NAN, f64::max);
    let min = counts.iter().copied().fold(f64::NAN, f64::min);
    if counts.is_empty() || min <= 0.0 {
        1.0
    } else {
        max / min
    }
}

/// Which sampler the imbalance corrector uses
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ResampleStrategy {
    #[default]
    Smote,
    RandomOver,
    RandomUnder,
    None,
}

/// Imbalance correction settings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RebalanceConfig {
    pub strategy: ResampleStrategy,
    /// Neighbors considered by SMOTE
    pub k_neighbors: usize,
    /// Unseeded runs draw from OS entropy
    pub seed: Option<u64>,
}

impl Default for RebalanceConfig {
    fn default() -> Self {
        Self {
            strategy: ResampleStrategy::Smote,
            k_neighbors: 5,
            seed: None,
        }
    }
}

impl RebalanceConfig {
    pub fn new(strategy: ResampleStrategy) -> Self {
        Self {
            strategy,
            ..Self::default()
        }
    }

    pub fn with_seed(mut self, seed: Option<u64>) -> Self {
        self.seed = seed;
        self
    }

    pub fn with_k_neighbors(mut self, k: usize) -> Self {
        self.k_neighbors = k;
        self
    }
}

/// Applies the configured sampler to a feature table and its labels
#[derive(Debug, Clone, Default)]
pub struct ImbalanceCorrector {
    config: RebalanceConfig,
}

impl ImbalanceCorrector {
    pub fn new(config: RebalanceConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &RebalanceConfig {
        &self.config
    }

    fn sampler(&self) -> Option<Box<dyn Sampler>> {
        let seed = self.config.seed;
        match self.config.strategy {
            ResampleStrategy::Smote => Some(Box::new(
                SMOTE::new().with_k_neighbors(self.config.k_neighbors).with_seed(seed),
            )),
            ResampleStrategy::RandomOver => Some(Box::new(RandomOverSampler::new().with_seed(seed))),
            ResampleStrategy::RandomUnder => Some(Box::new(RandomUnderSampler::new().with_seed(seed))),
            ResampleStrategy::None => None,
        }
    }

    /// Rebalance `features` and `labels`.
    ///
    /// The features must be fully numeric with no missing cells. Empty,
    /// single-class and already balanced inputs come back unchanged. A table
    /// with rows but no feature columns is a [`TabularError::DataError`].
    pub fn rebalance(&self, features: DataFrame, labels: Series) -> Result<(DataFrame, Series)> {
        if features.width() == 0 && !labels.is_empty() {
            return Err(TabularError::DataError(format!(
                "preprocessing removed every feature column ({} labelled rows left)",
                labels.len()
            )));
        }

        let sampler = match self.sampler() {
            Some(sampler) => sampler,
            None => return Ok((features, labels)),
        };

        let encoding = LabelEncoding::fit(&labels)?;
        let y = encoding.encode(&labels)?;
        let counts = class_counts(&y);

        if counts.len() < 2 {
            warn!(
                classes = counts.len(),
                rows = y.len(),
                "Fewer than two classes, skipping imbalance correction"
            );
            return Ok((features, labels));
        }
        if counts.values().min() == counts.values().max() {
            info!(rows = y.len(), "Classes already balanced");
            return Ok((features, labels));
        }

        let names = column_names(&features);
        let x = to_feature_matrix(&features)?;

        let mut sampler = sampler;
        let result = sampler.fit_resample(&x, &y)?;

        let new_counts = class_counts(&result.y);
        info!(
            strategy = ?self.config.strategy,
            rows_before = y.len(),
            rows_after = result.y.len(),
            ratio_before = imbalance_ratio(counts.values().map(|&c| c as u32)),
            ratio_after = imbalance_ratio(new_counts.values().map(|&c| c as u32)),
            "Imbalance correction complete"
        );

        let features = from_feature_matrix(&result.x, &names)?;
        let labels = encoding.decode(&result.y)?;
        Ok((features, labels))
    }
}
