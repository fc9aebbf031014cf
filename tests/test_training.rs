//! Integration tests for rebalancing, the classifier and tuning

use polars::prelude::*;
use std::collections::BTreeMap;
use tabular_knn::synthetic::{imbalance_ratio, ImbalanceCorrector, RebalanceConfig, ResampleStrategy};
use tabular_knn::training::{Classifier, KNNConfig, Tuner, TuningGrid, WeightScheme};

fn blobs(n_major: usize, n_minor: usize) -> (DataFrame, Series) {
    let mut x1 = Vec::new();
    let mut x2 = Vec::new();
    let mut labels = Vec::new();
    for i in 0..n_major {
        x1.push((i % 4) as f64 * 0.25);
        x2.push((i % 3) as f64 * 0.25);
        labels.push("major");
    }
    for i in 0..n_minor {
        x1.push(5.0 + (i % 2) as f64 * 0.3);
        x2.push(5.0 + (i % 3) as f64 * 0.2);
        labels.push("minor");
    }
    let df = df!("x1" => x1, "x2" => x2).unwrap();
    (df, Series::new("target".into(), labels))
}

fn counts(labels: &Series) -> BTreeMap<String, usize> {
    let mut counts = BTreeMap::new();
    for label in labels.str().unwrap().into_iter().flatten() {
        *counts.entry(label.to_string()).or_insert(0) += 1;
    }
    counts
}

// ============================================================================
// Rebalancing
// ============================================================================

#[test]
fn test_every_strategy_keeps_alignment_and_never_worsens_ratio() {
    let (df, labels) = blobs(24, 4);
    let before = imbalance_ratio(counts(&labels).values().map(|&c| c as u32));

    for strategy in [
        ResampleStrategy::Smote,
        ResampleStrategy::RandomOver,
        ResampleStrategy::RandomUnder,
        ResampleStrategy::None,
    ] {
        let corrector = ImbalanceCorrector::new(RebalanceConfig::new(strategy).with_seed(Some(42)));
        let (out, out_labels) = corrector.rebalance(df.clone(), labels.clone()).unwrap();
        let after = imbalance_ratio(counts(&out_labels).values().map(|&c| c as u32));

        assert_eq!(out.height(), out_labels.len(), "{:?}", strategy);
        assert_eq!(out.width(), 2);
        assert!(after <= before, "{:?} worsened the ratio", strategy);
    }
}

#[test]
fn test_seeded_smote_twice_is_identical() {
    let (df, labels) = blobs(24, 4);
    let config = RebalanceConfig::default().with_seed(Some(2024));

    let (a, la) = ImbalanceCorrector::new(config.clone()).rebalance(df.clone(), labels.clone()).unwrap();
    let (b, lb) = ImbalanceCorrector::new(config).rebalance(df, labels).unwrap();

    assert!(a.equals(&b));
    assert!(la.equals(&lb));
}

// ============================================================================
// Classifier
// ============================================================================

#[test]
fn test_classifier_after_rebalancing() {
    let (df, labels) = blobs(24, 4);
    let corrector = ImbalanceCorrector::new(RebalanceConfig::default().with_seed(Some(7)));
    let (df, labels) = corrector.rebalance(df, labels).unwrap();

    let mut clf = Classifier::new(KNNConfig::default());
    clf.fit(&df, &labels).unwrap();

    let query = df!("x1" => &[0.1, 5.1], "x2" => &[0.2, 5.1]).unwrap();
    assert_eq!(clf.predict(&query).unwrap(), vec!["major", "minor"]);
}

// ============================================================================
// Tuning
// ============================================================================

#[test]
fn test_tuner_picks_a_candidate_from_the_grid() {
    let (df, labels) = blobs(20, 10);
    let grid = TuningGrid {
        n_neighbors: vec![1, 5, 9],
        weights: vec![WeightScheme::Distance],
        n_folds: 5,
        ..TuningGrid::default()
    };

    let results = Tuner::new(grid).with_seed(Some(3)).tune(&df, &labels).unwrap();
    assert_eq!(results.trials.len(), 3);
    assert!([1, 5, 9].contains(&results.best_config.n_neighbors));
    assert_eq!(results.best_config.weights, WeightScheme::Distance);
    assert!(results.trials.iter().all(|t| t.fold_scores.len() == 5));
    assert!(results.best_score >= 0.9);
}
