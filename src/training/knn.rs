//! K-Nearest Neighbors classifier

use ndarray::{Array1, Array2, ArrayView1};
use rayon::prelude::*;
use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use std::collections::{BTreeMap, BinaryHeap};

use crate::error::{Result, TabularError};

/// Distance metric for KNN
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DistanceMetric {
    /// Euclidean distance (L2)
    #[default]
    Euclidean,
    /// Manhattan distance (L1)
    Manhattan,
    /// Minkowski distance with parameter p
    Minkowski(f64),
    /// Cosine similarity (converted to distance)
    Cosine,
}

/// Weighting scheme for neighbors
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum WeightScheme {
    /// All neighbors have equal weight
    #[default]
    Uniform,
    /// Closer neighbors have more weight (inverse distance)
    Distance,
}

/// KNN hyperparameters
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct KNNConfig {
    pub n_neighbors: usize,
    pub metric: DistanceMetric,
    pub weights: WeightScheme,
}

impl Default for KNNConfig {
    fn default() -> Self {
        Self {
            n_neighbors: 5,
            metric: DistanceMetric::Euclidean,
            weights: WeightScheme::Uniform,
        }
    }
}

impl KNNConfig {
    pub fn with_k(mut self, k: usize) -> Self {
        self.n_neighbors = k;
        self
    }

    pub fn with_weights(mut self, weights: WeightScheme) -> Self {
        self.weights = weights;
        self
    }

    pub fn with_metric(mut self, metric: DistanceMetric) -> Self {
        self.metric = metric;
        self
    }
}

/// K-Nearest Neighbors Classifier over integer class codes
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct KNNClassifier {
    config: KNNConfig,
    x_train: Option<Array2<f64>>,
    y_train: Option<Array1<i64>>,
    classes: Vec<i64>,
}

impl KNNClassifier {
    pub fn new(config: KNNConfig) -> Self {
        Self {
            config,
            x_train: None,
            y_train: None,
            classes: Vec::new(),
        }
    }

    /// Create with default config and specified k
    pub fn with_k(k: usize) -> Self {
        Self::new(KNNConfig::default().with_k(k))
    }

    pub fn config(&self) -> &KNNConfig {
        &self.config
    }

    pub fn classes(&self) -> &[i64] {
        &self.classes
    }

    pub fn is_fitted(&self) -> bool {
        self.x_train.is_some()
    }

    /// Fit the classifier (stores training data)
    pub fn fit(&mut self, x: &Array2<f64>, y: &Array1<i64>) -> Result<()> {
        if x.nrows() != y.len() {
            return Err(TabularError::ShapeError {
                expected: format!("{} labels", x.nrows()),
                actual: format!("{} labels", y.len()),
            });
        }
        if x.nrows() == 0 {
            return Err(TabularError::ModelError("cannot fit on an empty training set".to_string()));
        }
        if self.config.n_neighbors == 0 {
            return Err(TabularError::ModelError("n_neighbors must be at least 1".to_string()));
        }

        let mut classes: Vec<i64> = y.to_vec();
        classes.sort_unstable();
        classes.dedup();

        self.x_train = Some(x.clone());
        self.y_train = Some(y.clone());
        self.classes = classes;
        Ok(())
    }

    fn training_data(&self, x: &Array2<f64>) -> Result<(&Array2<f64>, &Array1<i64>)> {
        let (x_train, y_train) = match (&self.x_train, &self.y_train) {
            (Some(x_train), Some(y_train)) => (x_train, y_train),
            _ => return Err(TabularError::ModelNotFitted),
        };
        if x.ncols() != x_train.ncols() {
            return Err(TabularError::ShapeError {
                expected: format!("{} features", x_train.ncols()),
                actual: format!("{} features", x.ncols()),
            });
        }
        Ok((x_train, y_train))
    }

    /// Predict class codes (parallelized over samples)
    pub fn predict(&self, x: &Array2<f64>) -> Result<Array1<i64>> {
        let (x_train, y_train) = self.training_data(x)?;
        let KNNConfig { n_neighbors, metric, weights } = self.config;

        let predictions: Vec<i64> = (0..x.nrows())
            .into_par_iter()
            .map(|i| {
                let neighbors = find_k_nearest(x.row(i), x_train, y_train, n_neighbors, metric);
                vote_classify(&neighbors, weights)
            })
            .collect();

        Ok(Array1::from_vec(predictions))
    }

    /// Predict class probabilities, one column per entry of [`Self::classes`]
    pub fn predict_proba(&self, x: &Array2<f64>) -> Result<Array2<f64>> {
        let (x_train, y_train) = self.training_data(x)?;
        let KNNConfig { n_neighbors, metric, weights } = self.config;
        let classes = &self.classes;

        let probs: Vec<f64> = (0..x.nrows())
            .into_par_iter()
            .flat_map_iter(|i| {
                let neighbors = find_k_nearest(x.row(i), x_train, y_train, n_neighbors, metric);
                class_probs_from(&neighbors, classes, weights)
            })
            .collect();

        Array2::from_shape_vec((x.nrows(), classes.len()), probs)
            .map_err(|e| TabularError::ModelError(e.to_string()))
    }
}

/// Max-heap entry for partial sort (keeps k smallest distances).
/// Ties on distance fall back to the training row index.
struct Neighbor {
    dist: f64,
    row: usize,
    label: i64,
}

impl PartialEq for Neighbor {
    fn eq(&self, other: &Self) -> bool {
        self.cmp(other) == Ordering::Equal
    }
}
impl Eq for Neighbor {}
impl PartialOrd for Neighbor {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}
impl Ord for Neighbor {
    fn cmp(&self, other: &Self) -> Ordering {
        self.dist
            .partial_cmp(&other.dist)
            .unwrap_or(Ordering::Equal)
            .then(self.row.cmp(&other.row))
    }
}

/// Find k nearest neighbors using a max-heap, O(n log k)
fn find_k_nearest(
    point: ArrayView1<f64>,
    x_train: &Array2<f64>,
    y_train: &Array1<i64>,
    k: usize,
    metric: DistanceMetric,
) -> Vec<(f64, i64)> {
    let mut heap = BinaryHeap::with_capacity(k + 1);

    for (row, train) in x_train.rows().into_iter().enumerate() {
        heap.push(Neighbor {
            dist: compute_distance(point, train, metric),
            row,
            label: y_train[row],
        });
        if heap.len() > k {
            heap.pop();
        }
    }

    heap.into_sorted_vec()
        .into_iter()
        .map(|n| (n.dist, n.label))
        .collect()
}

/// Compute distance between two points using the specified metric
fn compute_distance(a: ArrayView1<f64>, b: ArrayView1<f64>, metric: DistanceMetric) -> f64 {
    match metric {
        DistanceMetric::Euclidean => a
            .iter()
            .zip(b.iter())
            .map(|(ai, bi)| {
                let d = ai - bi;
                d * d
            })
            .sum::<f64>()
            .sqrt(),
        DistanceMetric::Manhattan => a.iter().zip(b.iter()).map(|(ai, bi)| (ai - bi).abs()).sum(),
        DistanceMetric::Minkowski(p) => a
            .iter()
            .zip(b.iter())
            .map(|(ai, bi)| (ai - bi).abs().powf(p))
            .sum::<f64>()
            .powf(1.0 / p),
        DistanceMetric::Cosine => {
            let mut dot = 0.0;
            let mut norm_a = 0.0;
            let mut norm_b = 0.0;
            for (ai, bi) in a.iter().zip(b.iter()) {
                dot += ai * bi;
                norm_a += ai * ai;
                norm_b += bi * bi;
            }
            let denom = norm_a.sqrt() * norm_b.sqrt();
            if denom > 0.0 {
                1.0 - (dot / denom)
            } else {
                1.0
            }
        }
    }
}

fn neighbor_weight(dist: f64, weights: WeightScheme) -> f64 {
    match weights {
        WeightScheme::Uniform => 1.0,
        WeightScheme::Distance => 1.0 / (dist + 1e-10),
    }
}

/// Weighted majority vote; ties go to the smallest class code
fn vote_classify(neighbors: &[(f64, i64)], weights: WeightScheme) -> i64 {
    let mut votes: BTreeMap<i64, f64> = BTreeMap::new();
    for &(dist, label) in neighbors {
        *votes.entry(label).or_insert(0.0) += neighbor_weight(dist, weights);
    }
    votes
        .into_iter()
        .fold(None, |best: Option<(i64, f64)>, (label, score)| match best {
            Some((_, best_score)) if best_score >= score => best,
            _ => Some((label, score)),
        })
        .map(|(label, _)| label)
        .unwrap_or(0)
}

fn class_probs_from(neighbors: &[(f64, i64)], classes: &[i64], weights: WeightScheme) -> Vec<f64> {
    let mut counts = vec![0.0; classes.len()];
    let mut total = 0.0;
    for &(dist, label) in neighbors {
        if let Ok(idx) = classes.binary_search(&label) {
            let weight = neighbor_weight(dist, weights);
            counts[idx] += weight;
            total += weight;
        }
    }
    if total > 0.0 {
        counts.iter_mut().for_each(|c| *c /= total);
    }
    counts
}

#[cfg(test)]
mod tests {
    use super::*;

    fn create_classification_data() -> (Array2<f64>, Array1<i64>) {
        // two well separated clusters
        let x = Array2::from_shape_vec(
            (20, 2),
            vec![
                1.0, 1.0, 1.5, 1.5, 2.0, 2.0, 2.5, 2.5, 1.0, 2.0,
                1.5, 2.5, 2.0, 1.5, 2.5, 1.0, 1.2, 1.8, 1.8, 1.2,
                8.0, 8.0, 8.5, 8.5, 9.0, 9.0, 9.5, 9.5, 8.0, 9.0,
                8.5, 9.5, 9.0, 8.5, 9.5, 8.0, 8.2, 8.8, 8.8, 8.2,
            ],
        )
        .unwrap();

        let y = Array1::from_vec(vec![0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 1, 1, 1, 1, 1, 1, 1, 1, 1, 1]);

        (x, y)
    }

    #[test]
    fn test_knn_classifier() {
        let (x, y) = create_classification_data();

        let mut knn = KNNClassifier::with_k(3);
        knn.fit(&x, &y).unwrap();

        let predictions = knn.predict(&x).unwrap();
        assert_eq!(predictions, y);
        assert_eq!(knn.classes(), &[0, 1]);
    }

    #[test]
    fn test_distance_metrics() {
        let a = Array1::from_vec(vec![0.0, 0.0]);
        let b = Array1::from_vec(vec![3.0, 4.0]);

        let euclid = compute_distance(a.view(), b.view(), DistanceMetric::Euclidean);
        let manhattan = compute_distance(a.view(), b.view(), DistanceMetric::Manhattan);
        assert!((euclid - 5.0).abs() < 1e-9);
        assert!((manhattan - 7.0).abs() < 1e-9);
    }

    #[test]
    fn test_weighted_knn() {
        let (x, y) = create_classification_data();

        let mut knn = KNNClassifier::new(KNNConfig::default().with_weights(WeightScheme::Distance));
        knn.fit(&x, &y).unwrap();

        let query = Array2::from_shape_vec((2, 2), vec![1.1, 1.1, 9.1, 9.1]).unwrap();
        assert_eq!(knn.predict(&query).unwrap().to_vec(), vec![0, 1]);
    }

    #[test]
    fn test_predict_proba_rows_sum_to_one() {
        let (x, y) = create_classification_data();

        let mut knn = KNNClassifier::with_k(4);
        knn.fit(&x, &y).unwrap();

        let probs = knn.predict_proba(&x).unwrap();
        assert_eq!(probs.shape(), &[20, 2]);
        for row in probs.rows() {
            assert!((row.sum() - 1.0).abs() < 1e-9);
        }
    }

    #[test]
    fn test_tie_goes_to_smallest_class() {
        let x = Array2::from_shape_vec((2, 1), vec![0.0, 2.0]).unwrap();
        let y = Array1::from_vec(vec![7, 3]);

        let mut knn = KNNClassifier::with_k(2);
        knn.fit(&x, &y).unwrap();
        let query = Array2::from_shape_vec((1, 1), vec![1.0]).unwrap();
        assert_eq!(knn.predict(&query).unwrap()[0], 3);
    }

    #[test]
    fn test_errors() {
        let (x, y) = create_classification_data();
        let knn = KNNClassifier::with_k(3);
        assert!(matches!(knn.predict(&x), Err(TabularError::ModelNotFitted)));

        let mut knn = KNNClassifier::with_k(3);
        let short = Array1::from_vec(vec![0, 1]);
        assert!(matches!(knn.fit(&x, &short), Err(TabularError::ShapeError { .. })));

        knn.fit(&x, &y).unwrap();
        let wide = Array2::zeros((1, 3));
        assert!(matches!(knn.predict(&wide), Err(TabularError::ShapeError { .. })));
    }
}
