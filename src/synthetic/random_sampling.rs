//! Random sampling methods

use crate::error::{Result, TabularError};
use crate::synthetic::{class_counts, class_indices, ResampleResult, Sampler};
use ndarray::{Array1, Array2, Axis};
use rand::prelude::*;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

fn rng_for(seed: Option<u64>) -> StdRng {
    match seed {
        Some(seed) => StdRng::seed_from_u64(seed),
        None => StdRng::from_entropy(),
    }
}

/// Random oversampler (duplicates minority samples)
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RandomOverSampler {
    sampling_strategy: f64,
    seed: Option<u64>,
    target_counts: Option<BTreeMap<i64, usize>>,
}

impl RandomOverSampler {
    pub fn new() -> Self {
        Self {
            sampling_strategy: 1.0,
            seed: None,
            target_counts: None,
        }
    }

    /// Set sampling strategy
    pub fn with_sampling_strategy(mut self, ratio: f64) -> Self {
        self.sampling_strategy = ratio.clamp(0.1, 1.0);
        self
    }

    pub fn with_seed(mut self, seed: Option<u64>) -> Self {
        self.seed = seed;
        self
    }
}

impl Default for RandomOverSampler {
    fn default() -> Self {
        Self::new()
    }
}

impl Sampler for RandomOverSampler {
    fn fit(&mut self, _x: &Array2<f64>, y: &Array1<i64>) -> Result<()> {
        let counts = class_counts(y);
        let max_count = counts.values().copied().max().unwrap_or(0);
        let target = (max_count as f64 * self.sampling_strategy) as usize;

        self.target_counts = Some(
            counts
                .iter()
                .map(|(&class, &count)| (class, target.max(count)))
                .collect(),
        );
        Ok(())
    }

    fn resample(&self, x: &Array2<f64>, y: &Array1<i64>) -> Result<ResampleResult> {
        let targets = self
            .target_counts
            .as_ref()
            .ok_or_else(|| TabularError::ValidationError("Sampler not fitted".to_string()))?;

        let mut rng = rng_for(self.seed);
        let indices = class_indices(y);
        let counts = class_counts(y);

        let mut selected: Vec<usize> = (0..y.len()).collect();
        let mut n_synthetic = Vec::with_capacity(targets.len());

        for (&class, &target_count) in targets {
            let n_to_add = target_count.saturating_sub(counts.get(&class).copied().unwrap_or(0));
            match indices.get(&class) {
                Some(class_idx) if n_to_add > 0 => {
                    selected.extend((0..n_to_add).map(|_| class_idx[rng.gen_range(0..class_idx.len())]));
                    n_synthetic.push(n_to_add);
                }
                _ => n_synthetic.push(0),
            }
        }

        Ok(ResampleResult {
            x: x.select(Axis(0), &selected),
            y: y.select(Axis(0), &selected),
            n_synthetic,
        })
    }
}

/// Random undersampler (removes majority samples)
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RandomUnderSampler {
    /// Ratio of minority count to kept count per class
    sampling_strategy: f64,
    seed: Option<u64>,
}

impl RandomUnderSampler {
    pub fn new() -> Self {
        Self {
            sampling_strategy: 1.0,
            seed: None,
        }
    }

    /// Set sampling strategy
    pub fn with_sampling_strategy(mut self, ratio: f64) -> Self {
        self.sampling_strategy = ratio.clamp(0.1, 1.0);
        self
    }

    pub fn with_seed(mut self, seed: Option<u64>) -> Self {
        self.seed = seed;
        self
    }
}

impl Default for RandomUnderSampler {
    fn default() -> Self {
        Self::new()
    }
}

impl Sampler for RandomUnderSampler {
    fn fit(&mut self, _x: &Array2<f64>, _y: &Array1<i64>) -> Result<()> {
        Ok(())
    }

    fn resample(&self, x: &Array2<f64>, y: &Array1<i64>) -> Result<ResampleResult> {
        let mut rng = rng_for(self.seed);
        let counts = class_counts(y);
        let indices = class_indices(y);

        let min_count = counts.values().copied().min().unwrap_or(0);
        let target_count = (min_count as f64 / self.sampling_strategy) as usize;

        let mut selected: Vec<usize> = Vec::with_capacity(target_count * indices.len());
        for class_idx in indices.values() {
            let n_to_keep = target_count.min(class_idx.len());
            let mut shuffled = class_idx.clone();
            shuffled.shuffle(&mut rng);
            selected.extend(shuffled.into_iter().take(n_to_keep));
        }

        // keep the surviving rows in their original order
        selected.sort_unstable();

        Ok(ResampleResult {
            x: x.select(Axis(0), &selected),
            y: y.select(Axis(0), &selected),
            n_synthetic: vec![0; counts.len()],
        })
    }
}
