//! SMOTE (Synthetic Minority Over-sampling Technique)

use crate::error::{Result, TabularError};
use crate::synthetic::{class_counts, class_indices, ResampleResult, Sampler};
use ndarray::{Array1, Array2, ArrayView1};
use rand::prelude::*;
use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use std::collections::{BTreeMap, BinaryHeap};

/// Ordered float for BinaryHeap-based partial sort
#[derive(Debug, Clone, Copy)]
struct DistIdx(f64, usize);

impl PartialEq for DistIdx {
    fn eq(&self, other: &Self) -> bool {
        self.cmp(other) == Ordering::Equal
    }
}
impl Eq for DistIdx {}
impl PartialOrd for DistIdx {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}
impl Ord for DistIdx {
    // ties broken by index so neighbor sets do not depend on scan order
    fn cmp(&self, other: &Self) -> Ordering {
        self.0
            .partial_cmp(&other.0)
            .unwrap_or(Ordering::Equal)
            .then(self.1.cmp(&other.1))
    }
}

/// Interpolates new minority samples between a sample and one of its
/// same-class nearest neighbors
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SMOTE {
    k_neighbors: usize,
    /// Ratio of each class's target count to the majority count
    sampling_strategy: f64,
    seed: Option<u64>,
    target_counts: Option<BTreeMap<i64, usize>>,
}

impl SMOTE {
    pub fn new() -> Self {
        Self {
            k_neighbors: 5,
            sampling_strategy: 1.0,
            seed: None,
            target_counts: None,
        }
    }

    pub fn with_k_neighbors(mut self, k: usize) -> Self {
        self.k_neighbors = k.max(1);
        self
    }

    /// Set sampling strategy (ratio)
    pub fn with_sampling_strategy(mut self, ratio: f64) -> Self {
        self.sampling_strategy = ratio.clamp(0.1, 1.0);
        self
    }

    pub fn with_seed(mut self, seed: Option<u64>) -> Self {
        self.seed = seed;
        self
    }

    fn distance(a: ArrayView1<f64>, b: ArrayView1<f64>) -> f64 {
        a.iter()
            .zip(b.iter())
            .map(|(ai, bi)| (ai - bi).powi(2))
            .sum::<f64>()
            .sqrt()
    }

    /// k nearest rows of `x` among `candidates`, excluding `point` itself
    fn find_neighbors(x: &Array2<f64>, point: usize, candidates: &[usize], k: usize) -> Vec<usize> {
        let mut heap: BinaryHeap<DistIdx> = BinaryHeap::with_capacity(k + 1);
        let row = x.row(point);

        for &i in candidates {
            if i == point {
                continue;
            }
            let dist = Self::distance(row, x.row(i));
            heap.push(DistIdx(dist, i));
            if heap.len() > k {
                heap.pop();
            }
        }

        let mut neighbors: Vec<usize> = heap.into_iter().map(|DistIdx(_, i)| i).collect();
        neighbors.sort_unstable();
        neighbors
    }

    fn interpolate(point: ArrayView1<f64>, neighbor: ArrayView1<f64>, gap: f64) -> Vec<f64> {
        point
            .iter()
            .zip(neighbor.iter())
            .map(|(&p, &n)| p + gap * (n - p))
            .collect()
    }
}

impl Default for SMOTE {
    fn default() -> Self {
        Self::new()
    }
}

impl Sampler for SMOTE {
    fn fit(&mut self, _x: &Array2<f64>, y: &Array1<i64>) -> Result<()> {
        let counts = class_counts(y);
        if counts.len() < 2 {
            return Err(TabularError::ValidationError(
                "Need at least 2 classes for SMOTE".to_string(),
            ));
        }

        let max_count = counts.values().copied().max().unwrap_or(0);
        let target = (max_count as f64 * self.sampling_strategy) as usize;
        let targets = counts
            .iter()
            .map(|(&class, &count)| (class, target.max(count)))
            .collect();

        self.target_counts = Some(targets);
        Ok(())
    }

    fn resample(&self, x: &Array2<f64>, y: &Array1<i64>) -> Result<ResampleResult> {
        let targets = self
            .target_counts
            .as_ref()
            .ok_or_else(|| TabularError::ValidationError("SMOTE not fitted".to_string()))?;

        let mut rng = match self.seed {
            Some(seed) => StdRng::seed_from_u64(seed),
            None => StdRng::from_entropy(),
        };

        let indices = class_indices(y);
        let counts = class_counts(y);
        let n_features = x.ncols();

        let mut synthetic_x: Vec<Vec<f64>> = Vec::new();
        let mut synthetic_y: Vec<i64> = Vec::new();
        let mut n_synthetic = Vec::with_capacity(targets.len());

        for (&class, &target_count) in targets {
            let current_count = counts.get(&class).copied().unwrap_or(0);
            let n_to_generate = target_count.saturating_sub(current_count);
            let class_idx = match indices.get(&class) {
                Some(idx) if n_to_generate > 0 => idx,
                _ => {
                    n_synthetic.push(0);
                    continue;
                }
            };

            let k = self.k_neighbors.min(class_idx.len().saturating_sub(1)).max(1);
            let neighbor_sets: Vec<Vec<usize>> = class_idx
                .iter()
                .map(|&i| Self::find_neighbors(x, i, class_idx, k))
                .collect();

            for _ in 0..n_to_generate {
                let pick = rng.gen_range(0..class_idx.len());
                let sample = x.row(class_idx[pick]);
                let neighbors = &neighbor_sets[pick];

                // a lone sample has nobody to interpolate towards
                let row = if neighbors.is_empty() {
                    sample.to_vec()
                } else {
                    let neighbor = neighbors[rng.gen_range(0..neighbors.len())];
                    let gap: f64 = rng.gen();
                    Self::interpolate(sample, x.row(neighbor), gap)
                };
                synthetic_x.push(row);
                synthetic_y.push(class);
            }

            n_synthetic.push(n_to_generate);
        }

        // original rows first, then synthetic ones
        let n_original = x.nrows();
        let n_total = n_original + synthetic_x.len();
        let result_x = Array2::from_shape_fn((n_total, n_features), |(i, j)| {
            if i < n_original {
                x[[i, j]]
            } else {
                synthetic_x[i - n_original][j]
            }
        });

        let mut all_y: Vec<i64> = y.iter().copied().collect();
        all_y.extend_from_slice(&synthetic_y);

        Ok(ResampleResult {
            x: result_x,
            y: Array1::from_vec(all_y),
            n_synthetic,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn create_imbalanced_data() -> (Array2<f64>, Array1<i64>) {
        // 20 majority around (0, 0), 5 minority around (10, 10)
        let mut data = Vec::new();
        let mut labels = Vec::new();

        for i in 0..20 {
            data.push((i % 5) as f64);
            data.push((i / 5) as f64);
            labels.push(0i64);
        }

        for i in 0..5 {
            data.push(10.0 + (i % 3) as f64);
            data.push(10.0 + (i / 3) as f64);
            labels.push(1i64);
        }

        let x = Array2::from_shape_vec((25, 2), data).unwrap();
        let y = Array1::from_vec(labels);

        (x, y)
    }

    #[test]
    fn test_smote_balances_classes() {
        let (x, y) = create_imbalanced_data();

        let mut smote = SMOTE::new().with_k_neighbors(3).with_seed(Some(42));
        let result = smote.fit_resample(&x, &y).unwrap();

        let counts = class_counts(&result.y);
        assert_eq!(counts[&0], 20);
        assert_eq!(counts[&1], 20);
        assert_eq!(result.n_synthetic, vec![0, 15]);
    }

    #[test]
    fn test_synthetic_samples_stay_in_minority_hull() {
        let (x, y) = create_imbalanced_data();

        let mut smote = SMOTE::new().with_seed(Some(7));
        let result = smote.fit_resample(&x, &y).unwrap();

        for i in x.nrows()..result.x.nrows() {
            assert!(result.x[[i, 0]] >= 10.0 && result.x[[i, 0]] <= 12.0);
            assert!(result.x[[i, 1]] >= 10.0 && result.x[[i, 1]] <= 11.0);
        }
    }

    #[test]
    fn test_smote_preserves_original() {
        let (x, y) = create_imbalanced_data();

        let mut smote = SMOTE::new().with_seed(Some(42));
        let result = smote.fit_resample(&x, &y).unwrap();

        assert_eq!(result.x.slice(ndarray::s![..x.nrows(), ..]), x);
        assert_eq!(result.y.slice(ndarray::s![..y.len()]), y);
    }

    #[test]
    fn test_same_seed_same_output() {
        let (x, y) = create_imbalanced_data();

        let first = SMOTE::new().with_seed(Some(3)).fit_resample(&x, &y).unwrap();
        let second = SMOTE::new().with_seed(Some(3)).fit_resample(&x, &y).unwrap();
        assert_eq!(first.x, second.x);
        assert_eq!(first.y, second.y);
    }

    #[test]
    fn test_single_minority_sample_terminates() {
        let x = Array2::from_shape_vec((4, 1), vec![0.0, 1.0, 2.0, 9.0]).unwrap();
        let y = Array1::from_vec(vec![0, 0, 0, 1]);

        let result = SMOTE::new().with_seed(Some(1)).fit_resample(&x, &y).unwrap();
        assert_eq!(result.y.len(), 6);
        assert_eq!(result.x[[4, 0]], 9.0);
        assert_eq!(result.x[[5, 0]], 9.0);
    }

    #[test]
    fn test_duplicate_rows_still_have_neighbors() {
        let x = Array2::from_shape_vec((5, 1), vec![0.0, 1.0, 2.0, 5.0, 5.0]).unwrap();
        let y = Array1::from_vec(vec![0, 0, 0, 1, 1]);

        let result = SMOTE::new().with_seed(Some(1)).fit_resample(&x, &y).unwrap();
        assert_eq!(result.y.len(), 6);
        assert_eq!(result.x[[5, 0]], 5.0);
    }

    #[test]
    fn test_single_class_rejected() {
        let x = Array2::zeros((3, 1));
        let y = Array1::from_vec(vec![1, 1, 1]);
        assert!(SMOTE::new().fit_resample(&x, &y).is_err());
    }
}
