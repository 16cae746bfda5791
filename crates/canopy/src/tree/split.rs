//! Split-search kernels and the best-of-mtry reduction.
//!
//! Each kernel scores candidate splits for one feature and folds them into a
//! per-feature [`BestSplits`] record. Splits are scored as *improvement*
//! (reduction in squared error, higher is better); candidates tied within
//! [`SPLIT_TIE_EPSILON`] are reservoir-sampled uniformly. Four regimes:
//!
//! - CART on numeric and categorical features;
//! - imputation-aware variants that score NA observations routed left and
//!   right and keep the better direction;
//! - ridge variants scoring children by the residual sum of squares of a
//!   penalized linear fit, updated incrementally from the parent
//!   accumulators.
//!
//! The kernels signal inadmissibility only through the NaN best-value
//! sentinel; the partitioner reacts by sealing a leaf.

use rand::Rng;

use crate::data::TrainingData;
use crate::sampling::subsample_in_place;
use crate::tree::node::NaDirection;
use crate::tree::ridge::{extended_lin_obs, RidgeState};

/// Two improvements within this distance are considered tied.
pub(crate) const SPLIT_TIE_EPSILON: f64 = 1e-10;

// =============================================================================
// Monotone Bounds
// =============================================================================

/// Admissible range for child means, inherited from ancestor splits.
#[derive(Debug, Clone, Copy)]
pub(crate) struct MonotoneBounds {
    pub lower: f64,
    pub upper: f64,
}

impl Default for MonotoneBounds {
    fn default() -> Self {
        Self::unbounded()
    }
}

impl MonotoneBounds {
    pub fn unbounded() -> Self {
        Self {
            lower: f64::NEG_INFINITY,
            upper: f64::INFINITY,
        }
    }

    #[inline]
    pub fn contains(&self, mean: f64) -> bool {
        mean >= self.lower && mean <= self.upper
    }

    #[inline]
    pub fn clamp(&self, mean: f64) -> f64 {
        mean.max(self.lower).min(self.upper)
    }

    /// Bounds passed to the children after splitting on a constrained
    /// feature. The candidate means are projected through the parent bounds
    /// before the midpoint is formed.
    pub fn child_bounds(
        &self,
        constraint: i8,
        mean_left: f64,
        mean_right: f64,
    ) -> (MonotoneBounds, MonotoneBounds) {
        let mid = (self.clamp(mean_left) + self.clamp(mean_right)) / 2.0;
        match constraint {
            1 => (
                MonotoneBounds {
                    lower: self.lower,
                    upper: mid,
                },
                MonotoneBounds {
                    lower: mid,
                    upper: self.upper,
                },
            ),
            -1 => (
                MonotoneBounds {
                    lower: mid,
                    upper: self.upper,
                },
                MonotoneBounds {
                    lower: self.lower,
                    upper: mid,
                },
            ),
            _ => (*self, *self),
        }
    }
}

/// Monotone context threaded through the kernels.
#[derive(Debug, Clone, Copy)]
pub(crate) struct MonotoneInfo<'a> {
    pub constraints: &'a [i8],
    pub bounds: MonotoneBounds,
    pub monotone_avg: bool,
}

impl MonotoneInfo<'_> {
    /// Whether a candidate with the given child means may be taken.
    fn admits(&self, feature: usize, mean_left: f64, mean_right: f64) -> bool {
        let constraint = self.constraints[feature];
        if constraint == 1 && mean_left > mean_right {
            return false;
        }
        if constraint == -1 && mean_left < mean_right {
            return false;
        }
        self.bounds.contains(mean_left) && self.bounds.contains(mean_right)
    }
}

// =============================================================================
// Kernel Context
// =============================================================================

/// Read-only inputs shared by every kernel invocation at one node.
pub(crate) struct SplitCtx<'a> {
    pub data: &'a TrainingData,
    /// Minimum splitting observations a child must keep.
    pub min_spt: usize,
    /// Minimum averaging observations a child must keep.
    pub min_avg: usize,
    /// Draw the cut uniformly inside the candidate interval instead of its
    /// midpoint.
    pub split_middle: bool,
    /// Cap on candidate cut points per feature.
    pub max_obs: usize,
    /// Ridge penalty for the linear kernels.
    pub overfit_penalty: f64,
    /// Monotone context, present only when any feature is constrained.
    pub monotone: Option<MonotoneInfo<'a>>,
}

// =============================================================================
// BestSplits
// =============================================================================

/// Per-feature running bests over one mtry sample.
pub(crate) struct BestSplits {
    improvement: Vec<f64>,
    value: Vec<f64>,
    feature: Vec<usize>,
    count: Vec<usize>,
    na_dir: Vec<Option<NaDirection>>,
}

/// The winning split after the best-of-mtry reduction.
#[derive(Debug, Clone, Copy, PartialEq)]
pub(crate) struct ChosenSplit {
    pub feature: usize,
    pub value: f64,
    pub improvement: f64,
    pub na_dir: Option<NaDirection>,
}

impl BestSplits {
    pub fn new(mtry: usize) -> Self {
        Self {
            improvement: vec![f64::NEG_INFINITY; mtry],
            // A feature with no admissible candidate keeps the NaN sentinel.
            value: vec![f64::NAN; mtry],
            feature: vec![usize::MAX; mtry],
            count: vec![0; mtry],
            na_dir: vec![None; mtry],
        }
    }

    /// Fold one admissible candidate into slot `slot`.
    ///
    /// Strictly better candidates replace the slot; ties within
    /// [`SPLIT_TIE_EPSILON`] are reservoir-sampled with the slot counter.
    pub fn update<R: Rng>(
        &mut self,
        slot: usize,
        feature: usize,
        value: f64,
        improvement: f64,
        na_dir: Option<NaDirection>,
        rng: &mut R,
    ) {
        if !improvement.is_finite() {
            return;
        }
        let diff = improvement - self.improvement[slot];
        if diff > SPLIT_TIE_EPSILON {
            self.improvement[slot] = improvement;
            self.value[slot] = value;
            self.feature[slot] = feature;
            self.count[slot] = 1;
            self.na_dir[slot] = na_dir;
        } else if diff.abs() <= SPLIT_TIE_EPSILON {
            self.count[slot] += 1;
            if rng.gen_range(0..self.count[slot]) == 0 {
                self.value[slot] = value;
                self.feature[slot] = feature;
                self.na_dir[slot] = na_dir;
            }
        }
    }

    /// Best-of-mtry reduction with a global tie reservoir over the
    /// accumulated per-feature counters.
    ///
    /// Returns `None` when every slot still carries the NaN sentinel.
    pub fn resolve<R: Rng>(&self, rng: &mut R) -> Option<ChosenSplit> {
        let mut chosen: Option<usize> = None;
        let mut best_improvement = f64::NEG_INFINITY;
        let mut cumulative = 0usize;

        for slot in 0..self.value.len() {
            if self.value[slot].is_nan() {
                continue;
            }
            let diff = self.improvement[slot] - best_improvement;
            if diff > SPLIT_TIE_EPSILON {
                chosen = Some(slot);
                best_improvement = self.improvement[slot];
                cumulative = self.count[slot];
            } else if diff.abs() <= SPLIT_TIE_EPSILON {
                cumulative += self.count[slot];
                if rng.gen_range(0..cumulative) < self.count[slot] {
                    chosen = Some(slot);
                }
            }
        }

        chosen.map(|slot| ChosenSplit {
            feature: self.feature[slot],
            value: self.value[slot],
            improvement: self.improvement[slot],
            na_dir: self.na_dir[slot],
        })
    }
}

// =============================================================================
// Shared Helpers
// =============================================================================

/// CART improvement of a candidate partition: `nL·ȳL² + nR·ȳR² − n·ȳ²`,
/// written with sums to avoid forming the means twice.
#[inline]
fn cart_improvement(
    n_left: f64,
    sum_left: f64,
    n_right: f64,
    sum_right: f64,
    n_total: f64,
    sum_total: f64,
) -> f64 {
    sum_left * sum_left / n_left + sum_right * sum_right / n_right
        - sum_total * sum_total / n_total
}

/// Indices sorted ascending by the feature value.
fn sort_by_feature(data: &TrainingData, indices: &[usize], feature: usize) -> Vec<usize> {
    let mut sorted = indices.to_vec();
    sorted.sort_by(|&a, &b| {
        data.point(a, feature)
            .partial_cmp(&data.point(b, feature))
            .unwrap_or(std::cmp::Ordering::Equal)
    });
    sorted
}

/// Split `indices` into (sorted observed, NA indices) on one feature.
fn partition_missing(
    data: &TrainingData,
    indices: &[usize],
    feature: usize,
) -> (Vec<usize>, Vec<usize>) {
    let mut observed = Vec::with_capacity(indices.len());
    let mut missing = Vec::new();
    for &i in indices {
        if data.point(i, feature).is_nan() {
            missing.push(i);
        } else {
            observed.push(i);
        }
    }
    let observed = sort_by_feature(data, &observed, feature);
    (observed, missing)
}

/// Distinct feature level with its splitting-set statistics.
struct Level {
    value: f64,
    count: usize,
    sum: f64,
    /// Observation indices of this level (filled only by the ridge kernel).
    members: Vec<usize>,
}

/// Group sorted observations into levels of exactly equal feature values.
fn gather_levels(
    data: &TrainingData,
    sorted: &[usize],
    feature: usize,
    keep_members: bool,
) -> Vec<Level> {
    let mut levels: Vec<Level> = Vec::new();
    for &i in sorted {
        let v = data.point(i, feature);
        let y = data.outcome(i);
        match levels.last_mut() {
            Some(level) if level.value == v => {
                level.count += 1;
                level.sum += y;
                if keep_members {
                    level.members.push(i);
                }
            }
            _ => levels.push(Level {
                value: v,
                count: 1,
                sum: y,
                members: if keep_members { vec![i] } else { Vec::new() },
            }),
        }
    }
    levels
}

/// Per-level (count, sum) of the averaging sample for one level value.
fn level_stats(levels: &[Level], value: f64) -> (usize, f64) {
    match levels.binary_search_by(|l| {
        l.value
            .partial_cmp(&value)
            .unwrap_or(std::cmp::Ordering::Equal)
    }) {
        Ok(pos) => (levels[pos].count, levels[pos].sum),
        Err(_) => (0, 0.0),
    }
}

/// Candidate adjacency positions (between distinct neighbours), capped at
/// `max_obs` via uniform subsampling.
fn candidate_positions<R: Rng>(
    values: &[f64],
    max_obs: usize,
    rng: &mut R,
) -> Vec<usize> {
    let mut cuts: Vec<usize> = (0..values.len().saturating_sub(1))
        .filter(|&k| values[k] < values[k + 1])
        .collect();
    subsample_in_place(&mut cuts, max_obs, rng);
    cuts
}

// =============================================================================
// CART Kernels
// =============================================================================

/// Numeric CART kernel (no missing values at this node).
pub(crate) fn best_split_numeric<R: Rng>(
    ctx: &SplitCtx<'_>,
    avg: &[usize],
    spt: &[usize],
    slot: usize,
    feature: usize,
    best: &mut BestSplits,
    rng: &mut R,
) {
    let spt_sorted = sort_by_feature(ctx.data, spt, feature);
    let avg_sorted = sort_by_feature(ctx.data, avg, feature);
    scan_numeric(ctx, &spt_sorted, &avg_sorted, None, slot, feature, best, rng);
}

/// Imputation-aware numeric kernel: NAs are excluded from the scan, then
/// each candidate is scored with the NA pool routed left and routed right.
pub(crate) fn best_split_impute<R: Rng>(
    ctx: &SplitCtx<'_>,
    avg: &[usize],
    spt: &[usize],
    slot: usize,
    feature: usize,
    best: &mut BestSplits,
    rng: &mut R,
) {
    let (spt_sorted, spt_missing) = partition_missing(ctx.data, spt, feature);
    let (avg_sorted, _avg_missing) = partition_missing(ctx.data, avg, feature);
    let pool = NaPool {
        count: spt_missing.len(),
        sum: spt_missing.iter().map(|&i| ctx.data.outcome(i)).sum(),
    };
    scan_numeric(
        ctx,
        &spt_sorted,
        &avg_sorted,
        Some(pool),
        slot,
        feature,
        best,
        rng,
    );
}

/// NA observations of the splitting set, pooled for the impute kernels.
#[derive(Clone, Copy)]
struct NaPool {
    count: usize,
    sum: f64,
}

#[allow(clippy::too_many_arguments)]
fn scan_numeric<R: Rng>(
    ctx: &SplitCtx<'_>,
    spt_sorted: &[usize],
    avg_sorted: &[usize],
    na: Option<NaPool>,
    slot: usize,
    feature: usize,
    best: &mut BestSplits,
    rng: &mut R,
) {
    let n = spt_sorted.len();
    if n < 2 {
        return;
    }

    let values: Vec<f64> = spt_sorted
        .iter()
        .map(|&i| ctx.data.point(i, feature))
        .collect();
    let avg_values: Vec<f64> = avg_sorted
        .iter()
        .map(|&i| ctx.data.point(i, feature))
        .collect();

    let mut prefix = vec![0.0; n + 1];
    for (k, &i) in spt_sorted.iter().enumerate() {
        prefix[k + 1] = prefix[k] + ctx.data.outcome(i);
    }
    let spt_total = prefix[n];
    let avg_total: f64 = avg_sorted.iter().map(|&i| ctx.data.outcome(i)).sum();

    let na_count = na.map_or(0, |p| p.count);
    let na_sum = na.map_or(0.0, |p| p.sum);
    let n_total = (n + na_count) as f64;
    let sum_total = spt_total + na_sum;

    let cuts = candidate_positions(&values, ctx.max_obs, rng);

    let mut avg_ptr = 0usize;
    let mut avg_sum_left = 0.0;

    for &k in &cuts {
        let lo = values[k];
        let hi = values[k + 1];
        let cut = if ctx.split_middle {
            rng.gen_range(lo..hi)
        } else {
            (lo + hi) / 2.0
        };

        while avg_ptr < avg_values.len() && avg_values[avg_ptr] < cut {
            avg_sum_left += ctx.data.outcome(avg_sorted[avg_ptr]);
            avg_ptr += 1;
        }

        let n_left = k + 1;
        let n_right = n - n_left;
        let nav_left = avg_ptr;
        let nav_right = avg_sorted.len() - nav_left;
        if n_left < ctx.min_spt
            || n_right < ctx.min_spt
            || nav_left < ctx.min_avg
            || nav_right < ctx.min_avg
        {
            continue;
        }

        let sum_left = prefix[n_left];
        let sum_right = spt_total - sum_left;

        // Means checked against the monotone bounds; the averaging means
        // when the bound applies to the averaging side.
        let check_means = |sl: f64, nl: f64, sr: f64, nr: f64| -> (f64, f64) {
            if ctx.monotone.map_or(false, |m| m.monotone_avg) {
                (
                    avg_sum_left / nav_left as f64,
                    (avg_total - avg_sum_left) / nav_right as f64,
                )
            } else {
                (sl / nl, sr / nr)
            }
        };

        match na {
            None => {
                let improvement = cart_improvement(
                    n_left as f64,
                    sum_left,
                    n_right as f64,
                    sum_right,
                    n_total,
                    sum_total,
                );
                if let Some(m) = &ctx.monotone {
                    let (ml, mr) =
                        check_means(sum_left, n_left as f64, sum_right, n_right as f64);
                    if !m.admits(feature, ml, mr) {
                        continue;
                    }
                }
                best.update(slot, feature, cut, improvement, None, rng);
            }
            Some(pool) if pool.count == 0 => {
                // No NAs reached this node: score plainly and leave the
                // direction unset for the partitioner to randomize.
                let improvement = cart_improvement(
                    n_left as f64,
                    sum_left,
                    n_right as f64,
                    sum_right,
                    n_total,
                    sum_total,
                );
                if let Some(m) = &ctx.monotone {
                    let (ml, mr) =
                        check_means(sum_left, n_left as f64, sum_right, n_right as f64);
                    if !m.admits(feature, ml, mr) {
                        continue;
                    }
                }
                best.update(slot, feature, cut, improvement, None, rng);
            }
            Some(pool) => {
                // Score the NA pool routed each way and keep the better
                // admissible configuration.
                let configs = [
                    (
                        NaDirection::Left,
                        (n_left + pool.count) as f64,
                        sum_left + pool.sum,
                        n_right as f64,
                        sum_right,
                    ),
                    (
                        NaDirection::Right,
                        n_left as f64,
                        sum_left,
                        (n_right + pool.count) as f64,
                        sum_right + pool.sum,
                    ),
                ];
                let mut chosen: Option<(NaDirection, f64)> = None;
                for (dir, nl, sl, nr, sr) in configs {
                    let improvement = cart_improvement(nl, sl, nr, sr, n_total, sum_total);
                    if let Some(m) = &ctx.monotone {
                        let (ml, mr) = check_means(sl, nl, sr, nr);
                        if !m.admits(feature, ml, mr) {
                            continue;
                        }
                    }
                    match chosen {
                        Some((_, prev)) if prev >= improvement => {}
                        _ => chosen = Some((dir, improvement)),
                    }
                }
                if let Some((dir, improvement)) = chosen {
                    best.update(slot, feature, cut, improvement, Some(dir), rng);
                }
            }
        }
    }
}

/// Categorical CART kernel: one-vs-rest per level present in the splitting
/// set.
pub(crate) fn best_split_categorical<R: Rng>(
    ctx: &SplitCtx<'_>,
    avg: &[usize],
    spt: &[usize],
    slot: usize,
    feature: usize,
    best: &mut BestSplits,
    rng: &mut R,
) {
    let spt_sorted = sort_by_feature(ctx.data, spt, feature);
    let avg_sorted = sort_by_feature(ctx.data, avg, feature);
    let spt_levels = gather_levels(ctx.data, &spt_sorted, feature, false);
    let avg_levels = gather_levels(ctx.data, &avg_sorted, feature, false);
    scan_categorical(
        ctx,
        &spt_levels,
        &avg_levels,
        spt.len(),
        avg.len(),
        0,
        None,
        slot,
        feature,
        best,
        rng,
    );
}

/// Imputation-aware categorical kernel.
pub(crate) fn best_split_impute_categorical<R: Rng>(
    ctx: &SplitCtx<'_>,
    avg: &[usize],
    spt: &[usize],
    slot: usize,
    feature: usize,
    best: &mut BestSplits,
    rng: &mut R,
) {
    let (spt_sorted, spt_missing) = partition_missing(ctx.data, spt, feature);
    let (avg_sorted, avg_missing) = partition_missing(ctx.data, avg, feature);
    let spt_levels = gather_levels(ctx.data, &spt_sorted, feature, false);
    let avg_levels = gather_levels(ctx.data, &avg_sorted, feature, false);
    let pool = NaPool {
        count: spt_missing.len(),
        sum: spt_missing.iter().map(|&i| ctx.data.outcome(i)).sum(),
    };
    scan_categorical(
        ctx,
        &spt_levels,
        &avg_levels,
        spt_sorted.len() + spt_missing.len(),
        avg_sorted.len(),
        avg_missing.len(),
        Some(pool),
        slot,
        feature,
        best,
        rng,
    );
}

#[allow(clippy::too_many_arguments)]
fn scan_categorical<R: Rng>(
    ctx: &SplitCtx<'_>,
    spt_levels: &[Level],
    avg_levels: &[Level],
    n_spt_total: usize,
    n_avg_observed: usize,
    _n_avg_missing: usize,
    na: Option<NaPool>,
    slot: usize,
    feature: usize,
    best: &mut BestSplits,
    rng: &mut R,
) {
    if spt_levels.len() < 2 {
        return;
    }

    let na_count = na.map_or(0, |p| p.count);
    let na_sum = na.map_or(0.0, |p| p.sum);
    let spt_observed: f64 = spt_levels.iter().map(|l| l.sum).sum();
    let n_observed = n_spt_total - na_count;
    let n_total = n_spt_total as f64;
    let sum_total = spt_observed + na_sum;

    let mut candidates: Vec<usize> = (0..spt_levels.len()).collect();
    subsample_in_place(&mut candidates, ctx.max_obs, rng);

    for &pos in &candidates {
        let level = &spt_levels[pos];
        let n_left = level.count;
        let n_right = n_observed - n_left;
        let (nav_left, _) = level_stats(&avg_levels, level.value);
        let nav_right = n_avg_observed - nav_left;
        if n_left < ctx.min_spt
            || n_right < ctx.min_spt
            || nav_left < ctx.min_avg
            || nav_right < ctx.min_avg
        {
            continue;
        }

        let sum_left = level.sum;
        let sum_right = spt_observed - sum_left;

        match na {
            Some(pool) if pool.count > 0 => {
                let configs = [
                    (
                        NaDirection::Left,
                        (n_left + pool.count) as f64,
                        sum_left + pool.sum,
                        n_right as f64,
                        sum_right,
                    ),
                    (
                        NaDirection::Right,
                        n_left as f64,
                        sum_left,
                        (n_right + pool.count) as f64,
                        sum_right + pool.sum,
                    ),
                ];
                let mut chosen: Option<(NaDirection, f64)> = None;
                for (dir, nl, sl, nr, sr) in configs {
                    let improvement = cart_improvement(nl, sl, nr, sr, n_total, sum_total);
                    match chosen {
                        Some((_, prev)) if prev >= improvement => {}
                        _ => chosen = Some((dir, improvement)),
                    }
                }
                if let Some((dir, improvement)) = chosen {
                    best.update(slot, feature, level.value, improvement, Some(dir), rng);
                }
            }
            _ => {
                let improvement = cart_improvement(
                    n_left as f64,
                    sum_left,
                    n_right as f64,
                    sum_right,
                    n_total,
                    sum_total,
                );
                best.update(slot, feature, level.value, improvement, None, rng);
            }
        }
    }
}

// =============================================================================
// Ridge Kernels
// =============================================================================

/// Ridge kernel on a numeric feature.
///
/// Children are scored by `RSS = yᵀy − sᵀ(G + λI')⁻¹s`; the left
/// accumulators grow observation-by-observation as the cut advances and the
/// right side is derived by subtraction from the parent, so the sample is
/// never rescanned. Candidates leaving a child with fewer than
/// `num_linear_features + 1` observations are ill-posed and rejected, as are
/// candidates whose penalized Gram matrix is not positive definite.
#[allow(clippy::too_many_arguments)]
pub(crate) fn best_split_ridge<R: Rng>(
    ctx: &SplitCtx<'_>,
    avg: &[usize],
    spt: &[usize],
    slot: usize,
    feature: usize,
    best: &mut BestSplits,
    rng: &mut R,
    parent: &RidgeState,
) {
    let spt_sorted = sort_by_feature(ctx.data, spt, feature);
    let avg_sorted = sort_by_feature(ctx.data, avg, feature);
    let n = spt_sorted.len();
    if n < 2 {
        return;
    }

    let parent_rss = match parent.rss(ctx.overfit_penalty) {
        Some(rss) => rss,
        None => return,
    };
    let dim = parent.dim();

    let values: Vec<f64> = spt_sorted
        .iter()
        .map(|&i| ctx.data.point(i, feature))
        .collect();
    let avg_values: Vec<f64> = avg_sorted
        .iter()
        .map(|&i| ctx.data.point(i, feature))
        .collect();
    let cuts = candidate_positions(&values, ctx.max_obs, rng);

    let mut left = RidgeState::empty(dim);
    let mut pos = 0usize;
    let mut avg_ptr = 0usize;

    for &k in &cuts {
        let lo = values[k];
        let hi = values[k + 1];
        let cut = if ctx.split_middle {
            rng.gen_range(lo..hi)
        } else {
            (lo + hi) / 2.0
        };

        while pos <= k {
            let i = spt_sorted[pos];
            left.add(&extended_lin_obs(ctx.data, i), ctx.data.outcome(i));
            pos += 1;
        }
        while avg_ptr < avg_values.len() && avg_values[avg_ptr] < cut {
            avg_ptr += 1;
        }

        let n_left = k + 1;
        let n_right = n - n_left;
        let nav_left = avg_ptr;
        let nav_right = avg_sorted.len() - nav_left;
        if n_left < ctx.min_spt.max(dim)
            || n_right < ctx.min_spt.max(dim)
            || nav_left < ctx.min_avg
            || nav_right < ctx.min_avg
        {
            continue;
        }

        let right = parent.minus(&left);
        let (rss_left, rss_right) = match (
            left.rss(ctx.overfit_penalty),
            right.rss(ctx.overfit_penalty),
        ) {
            (Some(l), Some(r)) => (l, r),
            _ => continue,
        };

        let improvement = parent_rss - rss_left - rss_right;
        best.update(slot, feature, cut, improvement, None, rng);
    }
}

/// Ridge kernel on a categorical feature: one-vs-rest per level, with the
/// level accumulator built once and the complement taken from the parent.
#[allow(clippy::too_many_arguments)]
pub(crate) fn best_split_ridge_categorical<R: Rng>(
    ctx: &SplitCtx<'_>,
    avg: &[usize],
    spt: &[usize],
    slot: usize,
    feature: usize,
    best: &mut BestSplits,
    rng: &mut R,
    parent: &RidgeState,
) {
    let spt_sorted = sort_by_feature(ctx.data, spt, feature);
    let avg_sorted = sort_by_feature(ctx.data, avg, feature);
    let spt_levels = gather_levels(ctx.data, &spt_sorted, feature, true);
    let avg_levels = gather_levels(ctx.data, &avg_sorted, feature, false);
    if spt_levels.len() < 2 {
        return;
    }

    let parent_rss = match parent.rss(ctx.overfit_penalty) {
        Some(rss) => rss,
        None => return,
    };
    let dim = parent.dim();
    let n = spt_sorted.len();

    let mut candidates: Vec<usize> = (0..spt_levels.len()).collect();
    subsample_in_place(&mut candidates, ctx.max_obs, rng);

    for &pos in &candidates {
        let level = &spt_levels[pos];
        let n_left = level.count;
        let n_right = n - n_left;
        let (nav_left, _) = level_stats(&avg_levels, level.value);
        let nav_right = avg.len() - nav_left;
        if n_left < ctx.min_spt.max(dim)
            || n_right < ctx.min_spt.max(dim)
            || nav_left < ctx.min_avg
            || nav_right < ctx.min_avg
        {
            continue;
        }

        let mut left = RidgeState::empty(dim);
        for &i in &level.members {
            left.add(&extended_lin_obs(ctx.data, i), ctx.data.outcome(i));
        }
        let right = parent.minus(&left);
        let (rss_left, rss_right) = match (
            left.rss(ctx.overfit_penalty),
            right.rss(ctx.overfit_penalty),
        ) {
            (Some(l), Some(r)) => (l, r),
            _ => continue,
        };

        let improvement = parent_rss - rss_left - rss_right;
        best.update(slot, feature, level.value, improvement, None, rng);
    }
}
