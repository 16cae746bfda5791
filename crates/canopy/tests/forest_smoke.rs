//! Forest-level quality smoke: bagged honest trees must beat the trivial
//! mean predictor on held-out (out-of-bag) rows.

use canopy::testing::synthetic_regression;
use canopy::{Forest, ForestParams, NoProgress, TreeParams};

fn variance(values: impl Iterator<Item = f64> + Clone) -> f64 {
    let n = values.clone().count() as f64;
    let mean = values.clone().sum::<f64>() / n;
    values.map(|v| (v - mean) * (v - mean)).sum::<f64>() / n
}

#[test]
fn standard_forest_oob_beats_the_mean() {
    let data = synthetic_regression(300, &[2.0, -1.0, 0.5], 0.1, 42);
    let tree_params = TreeParams {
        mtry: 2,
        min_node_size_to_split_spt: 5,
        min_node_size_to_split_avg: 5,
        ..TreeParams::default()
    };
    let forest_params = ForestParams {
        n_trees: 50,
        ..ForestParams::default()
    };
    let forest = Forest::grow(&data, tree_params, forest_params, 42, &NoProgress).unwrap();
    assert_eq!(forest.failed_trees(), 0);

    let oob = forest.oob_predictions(&data, false).unwrap();
    let outcome_variance = variance((0..data.n_rows()).map(|i| data.outcome(i)));
    assert!(
        oob.mse < outcome_variance / 2.0,
        "oob mse {} vs outcome variance {}",
        oob.mse,
        outcome_variance
    );
}

#[test]
fn honest_forest_aggregates_oob_predictions() {
    let data = synthetic_regression(200, &[1.0, 1.0], 0.1, 7);
    let tree_params = TreeParams {
        mtry: 1,
        min_node_size_to_split_spt: 5,
        min_node_size_to_split_avg: 5,
        ..TreeParams::default()
    };
    let forest_params = ForestParams {
        n_trees: 40,
        oob_honest: true,
        double_bootstrap: true,
        ..ForestParams::default()
    };
    let forest = Forest::grow(&data, tree_params, forest_params, 7, &NoProgress).unwrap();

    // Double-bootstrap honesty leaves ~13.5% per tree; with 40 trees
    // essentially every row collects some OOB predictions.
    let oob = forest.oob_predictions(&data, true).unwrap();
    let covered = oob.counts.iter().filter(|&&c| c > 0).count();
    assert!(covered > 180, "covered {covered} rows of 200");

    let outcome_variance = variance((0..data.n_rows()).map(|i| data.outcome(i)));
    assert!(oob.mse < outcome_variance, "mse {}", oob.mse);
}

#[test]
fn forest_predictions_are_reproducible_across_builds() {
    let data = synthetic_regression(120, &[1.0, -1.0], 0.05, 3);
    let build = || {
        Forest::grow(
            &data,
            TreeParams {
                mtry: 2,
                split_middle: true,
                ..TreeParams::default()
            },
            ForestParams {
                n_trees: 12,
                ..ForestParams::default()
            },
            99,
            &NoProgress,
        )
        .unwrap()
    };
    let a = build();
    let b = build();
    let x = canopy::testing::random_features(10, 2, 5, -1.0, 1.0);
    assert_eq!(
        a.predict(x.view(), &data).unwrap(),
        b.predict(x.view(), &data).unwrap()
    );
}
