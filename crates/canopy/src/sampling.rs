//! Random sampling helpers: weighted feature draws for split candidates and
//! row draws for forest-level bagging.
//!
//! All helpers take the caller's PRNG so that a tree build consumes a single
//! seeded generator in a fixed order, keeping construction bitwise
//! reproducible.

use rand::distributions::{Distribution, WeightedIndex};
use rand::Rng;

// =============================================================================
// Feature Sampling
// =============================================================================

/// Draw `mtry` distinct feature indices by weighted sampling.
///
/// `weights[k]` is the sampling weight of column `variables[k]`. Draws are
/// rejected until the set reaches `mtry` distinct columns, so the weights
/// shape the marginal inclusion probabilities without replacement.
///
/// # Panics
///
/// Panics if fewer than `mtry` distinct columns are available or the weights
/// are not a valid sampling distribution (all zero, negative, or empty).
pub fn sample_features<R: Rng>(
    mtry: usize,
    weights: &[f64],
    variables: &[usize],
    rng: &mut R,
) -> Vec<usize> {
    debug_assert_eq!(weights.len(), variables.len());

    let mut reachable: Vec<usize> = variables
        .iter()
        .zip(weights)
        .filter(|(_, &w)| w > 0.0)
        .map(|(&c, _)| c)
        .collect();
    reachable.sort_unstable();
    reachable.dedup();
    assert!(
        reachable.len() >= mtry,
        "cannot draw {mtry} distinct features from {} positively weighted columns",
        reachable.len()
    );

    let dist = WeightedIndex::new(weights.iter().copied())
        .expect("feature weights must form a sampling distribution");

    let mut features: Vec<usize> = Vec::with_capacity(mtry);
    while features.len() < mtry {
        let column = variables[dist.sample(rng)];
        if !features.contains(&column) {
            features.push(column);
        }
    }
    features
}

// =============================================================================
// Row Sampling
// =============================================================================

/// Draw `size` indices from `0..n` with replacement.
pub fn bootstrap_sample<R: Rng>(n: usize, size: usize, rng: &mut R) -> Vec<usize> {
    (0..size).map(|_| rng.gen_range(0..n)).collect()
}

/// Draw `size` indices from `pool` with replacement.
pub fn bootstrap_from<R: Rng>(pool: &[usize], size: usize, rng: &mut R) -> Vec<usize> {
    (0..size).map(|_| pool[rng.gen_range(0..pool.len())]).collect()
}

/// Draw `k` distinct indices from `0..n` via a partial Fisher-Yates shuffle.
///
/// Returns the sample sorted ascending.
pub fn sample_without_replacement<R: Rng>(n: usize, k: usize, rng: &mut R) -> Vec<usize> {
    debug_assert!(k <= n);
    let mut indices: Vec<usize> = (0..n).collect();
    for i in 0..k {
        let j = rng.gen_range(i..n);
        indices.swap(i, j);
    }
    let mut sampled = indices[..k].to_vec();
    sampled.sort_unstable();
    sampled
}

/// Keep `k` of the entries of `items`, chosen uniformly, preserving order.
///
/// Used to cap the number of candidate cut points a kernel evaluates.
pub fn subsample_in_place<R: Rng, T: Copy + Ord>(items: &mut Vec<T>, k: usize, rng: &mut R) {
    if items.len() <= k {
        return;
    }
    let n = items.len();
    for i in 0..k {
        let j = rng.gen_range(i..n);
        items.swap(i, j);
    }
    items.truncate(k);
    items.sort_unstable();
}
