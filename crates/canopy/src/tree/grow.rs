//! Recursive partitioner driving tree growth.
//!
//! Per node: terminal tests, weighted feature sampling, kernel dispatch on
//! (categorical, linear, has NAs), best-of-mtry reduction, index
//! partitioning with NA routing, the min-split-gain gate for ridge leaves,
//! monotone bound propagation, NA-direction randomization, and recursion.
//!
//! One PRNG threads through the whole build; every random decision (feature
//! draws, random cut points, tie reservoirs, NA-direction draws) consumes it
//! in a fixed order, which makes growth bitwise reproducible.

use rand::{Rng, SeedableRng};
use rand_xoshiro::Xoshiro256PlusPlus;

use crate::data::TrainingData;
use crate::error::GrowError;
use crate::sampling::sample_features;
use crate::tree::node::{NaDirection, Node};
use crate::tree::ridge::{calculate_rss, RidgeState};
use crate::tree::split::{
    best_split_categorical, best_split_impute, best_split_impute_categorical, best_split_numeric,
    best_split_ridge, best_split_ridge_categorical, BestSplits, ChosenSplit, MonotoneBounds,
    MonotoneInfo, SplitCtx,
};
use crate::tree::TreeParams;

// =============================================================================
// Grower
// =============================================================================

pub(crate) struct Grower<'a> {
    data: &'a TrainingData,
    params: &'a TreeParams,
    rng: Xoshiro256PlusPlus,
    leaf_count: usize,
    monotone_splits: bool,
}

impl<'a> Grower<'a> {
    pub fn new(data: &'a TrainingData, params: &'a TreeParams, seed: u64) -> Self {
        let monotone_splits = data.monotonic_constraints().iter().any(|&c| c != 0);
        Self {
            data,
            params,
            rng: Xoshiro256PlusPlus::seed_from_u64(seed),
            leaf_count: 0,
            monotone_splits,
        }
    }

    /// Grow the whole tree; returns the root and the number of leaves.
    pub fn grow(
        mut self,
        averaging: Vec<usize>,
        splitting: Vec<usize>,
    ) -> Result<(Node, usize), GrowError> {
        let ridge = if self.params.linear {
            Some(RidgeState::from_partition(self.data, &splitting))
        } else {
            None
        };
        let root = self.partition(averaging, splitting, 1, ridge, MonotoneBounds::unbounded())?;
        Ok((root, self.leaf_count))
    }

    /// Seal the current partition as a leaf: assign the next id, store the
    /// averaging mean as its weight, fit ridge coefficients when linear.
    fn seal_leaf(&mut self, averaging: Vec<usize>, splitting: Vec<usize>) -> Result<Node, GrowError> {
        let weight = self.data.partition_mean(&averaging);
        if !weight.is_finite() {
            return Err(GrowError::NonFiniteLeafMean {
                count: averaging.len(),
            });
        }
        self.leaf_count += 1;
        let mut node = Node::leaf(averaging, splitting, self.leaf_count, weight);
        if self.params.linear {
            node.set_ridge_coefficients(self.data, self.params.overfit_penalty)
                .expect("freshly sealed node is a leaf");
        }
        Ok(node)
    }

    fn partition(
        &mut self,
        averaging: Vec<usize>,
        splitting: Vec<usize>,
        depth: usize,
        ridge: Option<RidgeState>,
        bounds: MonotoneBounds,
    ) -> Result<Node, GrowError> {
        let params = self.params;

        // Terminal tests.
        if averaging.len() < params.min_node_size_avg
            || splitting.len() < params.min_node_size_spt
            || depth == params.max_depth
        {
            return self.seal_leaf(averaging, splitting);
        }

        // Sample mtry features from the depth-appropriate distribution.
        let (weights, variables) = if depth >= params.interaction_depth {
            self.data.deep_feature_weights()
        } else {
            self.data.feature_weights()
        };
        let features = sample_features(params.mtry, weights, variables, &mut self.rng);

        // Score every sampled feature with the kernel matching its regime.
        let ctx = SplitCtx {
            data: self.data,
            min_spt: params.min_node_size_to_split_spt,
            min_avg: params.min_node_size_to_split_avg,
            split_middle: params.split_middle,
            max_obs: params.max_obs,
            overfit_penalty: params.overfit_penalty,
            monotone: if self.monotone_splits {
                Some(MonotoneInfo {
                    constraints: self.data.monotonic_constraints(),
                    bounds,
                    monotone_avg: self.data.monotone_avg(),
                })
            } else {
                None
            },
        };
        let mut best = BestSplits::new(features.len());
        for (slot, &feature) in features.iter().enumerate() {
            let categorical = self.data.is_categorical(feature);
            match (categorical, params.linear, params.has_nas) {
                (true, true, _) => best_split_ridge_categorical(
                    &ctx,
                    &averaging,
                    &splitting,
                    slot,
                    feature,
                    &mut best,
                    &mut self.rng,
                    ridge.as_ref().expect("linear growth carries a ridge state"),
                ),
                (false, true, _) => best_split_ridge(
                    &ctx,
                    &averaging,
                    &splitting,
                    slot,
                    feature,
                    &mut best,
                    &mut self.rng,
                    ridge.as_ref().expect("linear growth carries a ridge state"),
                ),
                (true, false, true) => best_split_impute_categorical(
                    &ctx,
                    &averaging,
                    &splitting,
                    slot,
                    feature,
                    &mut best,
                    &mut self.rng,
                ),
                (true, false, false) => best_split_categorical(
                    &ctx,
                    &averaging,
                    &splitting,
                    slot,
                    feature,
                    &mut best,
                    &mut self.rng,
                ),
                (false, false, true) => best_split_impute(
                    &ctx,
                    &averaging,
                    &splitting,
                    slot,
                    feature,
                    &mut best,
                    &mut self.rng,
                ),
                (false, false, false) => best_split_numeric(
                    &ctx,
                    &averaging,
                    &splitting,
                    slot,
                    feature,
                    &mut best,
                    &mut self.rng,
                ),
            }
        }

        // No admissible split anywhere: seal.
        let chosen = match best.resolve(&mut self.rng) {
            Some(chosen) => chosen,
            None => return self.seal_leaf(averaging, splitting),
        };

        let categorical = self.data.is_categorical(chosen.feature);

        // Partition both samples; NA routing counts come from the splitting
        // side only.
        let (avg_left, avg_right, _, _) =
            self.split_set(&averaging, &chosen, categorical);
        let (spt_left, spt_right, na_left, na_right) =
            self.split_set(&splitting, &chosen, categorical);

        // Degenerate partition guard.
        if avg_left.is_empty() || avg_right.is_empty() || spt_left.is_empty() || spt_right.is_empty()
        {
            return self.seal_leaf(averaging, splitting);
        }

        // Min-split-gain gate (ridge leaves only).
        if params.min_split_gain > 0.0 {
            let gain = r_squared_gain(
                self.data,
                &splitting,
                &spt_left,
                &spt_right,
                params.overfit_penalty,
            );
            if gain < params.min_split_gain {
                return self.seal_leaf(averaging, splitting);
            }
        }

        // Monotone bound propagation, from the splitting-partition means.
        let (bounds_left, bounds_right) = if self.monotone_splits {
            let mean_left = self.data.partition_mean(&spt_left);
            let mean_right = self.data.partition_mean(&spt_right);
            bounds.child_bounds(
                self.data.monotonic_constraints()[chosen.feature],
                mean_left,
                mean_right,
            )
        } else {
            (bounds, bounds)
        };

        // If no NAs reached this split but a default is requested, pick a
        // direction with probability proportional to the averaging child
        // sizes, from the recursion PRNG.
        let mut na_default = chosen.na_dir;
        if params.na_direction && na_left == 0 && na_right == 0 {
            let total = avg_left.len() + avg_right.len();
            na_default = Some(if self.rng.gen_range(0..total) < avg_left.len() {
                NaDirection::Left
            } else {
                NaDirection::Right
            });
        }

        // Each child owns a fresh ridge accumulator over its partition.
        let (ridge_left, ridge_right) = if params.linear {
            (
                Some(RidgeState::from_partition(self.data, &spt_left)),
                Some(RidgeState::from_partition(self.data, &spt_right)),
            )
        } else {
            (None, None)
        };

        let left = self.partition(avg_left, spt_left, depth + 1, ridge_left, bounds_left)?;
        let right = self.partition(avg_right, spt_right, depth + 1, ridge_right, bounds_right)?;

        Ok(Node::split(
            chosen.feature,
            chosen.value,
            left,
            right,
            na_left,
            na_right,
            na_default,
        ))
    }

    /// Partition one index set by the winning split.
    ///
    /// Numeric features route `value < cut` left; categorical features route
    /// `value == cut` left. Missing values follow the kernel's NA direction
    /// and are counted per side.
    fn split_set(
        &self,
        indices: &[usize],
        chosen: &ChosenSplit,
        categorical: bool,
    ) -> (Vec<usize>, Vec<usize>, usize, usize) {
        let mut left = Vec::new();
        let mut right = Vec::new();
        let mut na_left = 0usize;
        let mut na_right = 0usize;

        for &i in indices {
            let v = self.data.point(i, chosen.feature);
            if self.params.has_nas && v.is_nan() {
                match chosen.na_dir {
                    Some(NaDirection::Left) => {
                        left.push(i);
                        na_left += 1;
                    }
                    Some(NaDirection::Right) => {
                        right.push(i);
                        na_right += 1;
                    }
                    // No direction was scored for this feature; the
                    // observation drops out of both children.
                    None => {}
                }
            } else if (categorical && v == chosen.value) || (!categorical && v < chosen.value) {
                left.push(i);
            } else {
                right.push(i);
            }
        }

        (left, right, na_left, na_right)
    }
}

/// `R²(children) − R²(parent)` from fresh ridge fits on the splitting
/// partitions. A singular child fit yields negative infinity, which the
/// gate treats as "no gain".
fn r_squared_gain(
    data: &TrainingData,
    parent: &[usize],
    left: &[usize],
    right: &[usize],
    penalty: f64,
) -> f64 {
    let (rss_parent, rss_left, rss_right) = match (
        calculate_rss(data, parent, penalty),
        calculate_rss(data, left, penalty),
        calculate_rss(data, right, penalty),
    ) {
        (Some(p), Some(l), Some(r)) => (p, l, r),
        _ => return f64::NEG_INFINITY,
    };

    let mean = data.partition_mean(parent);
    let tss: f64 = parent
        .iter()
        .map(|&i| {
            let d = data.outcome(i) - mean;
            d * d
        })
        .sum();
    if tss == 0.0 {
        return f64::NEG_INFINITY;
    }

    let r_squared_parent = 1.0 - rss_parent / tss;
    let r_squared_children = 1.0 - (rss_left + rss_right) / tss;
    r_squared_children - r_squared_parent
}
