//! Thin forest-level fan-out over the tree core: per-tree sample draws,
//! parallel tree construction, aggregate prediction, and OOB aggregation.
//!
//! Each tree receives an independent seed derived from the forest seed and
//! its tree index, so the forest is bitwise reproducible no matter how rayon
//! schedules the builds. A failed tree aborts that tree only; the failure is
//! reported through the injected [`ProgressSink`] and counted.

use rand::seq::SliceRandom;
use rand::SeedableRng;
use rand_xoshiro::Xoshiro256PlusPlus;
use rayon::prelude::*;

use crate::data::TrainingData;
use crate::error::{ConfigError, GrowError, PredictError};
use crate::sampling::{bootstrap_sample, sample_without_replacement};
use crate::tree::{PredictionRequest, Tree, TreeParams};

/// Per-tree seed spacing (golden-ratio increment).
const TREE_SEED_STRIDE: u64 = 0x9E37_79B9_7F4A_7C15;

// =============================================================================
// ProgressSink
// =============================================================================

/// Injected sink for forest-construction progress.
///
/// The core never writes to a global stream; hosts that want progress output
/// implement this trait.
pub trait ProgressSink: Sync {
    /// Called after tree `index` finished building.
    fn on_tree_built(&self, index: usize) {
        let _ = index;
    }

    /// Called when tree `index` failed; the tree is skipped.
    fn on_tree_failed(&self, index: usize, error: &GrowError) {
        let _ = (index, error);
    }
}

/// Sink that ignores all progress.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoProgress;

impl ProgressSink for NoProgress {}

// =============================================================================
// ForestParams
// =============================================================================

/// Forest-level sampling configuration.
#[derive(Debug, Clone, PartialEq)]
pub struct ForestParams {
    /// Number of trees.
    pub n_trees: usize,
    /// Draw per-tree samples with replacement.
    pub replace: bool,
    /// Observations drawn per tree.
    pub sample_size: usize,
    /// Fraction of each sample used for splitting; the rest averages.
    /// `1.0` disables the honesty partition (both sets equal the sample).
    pub split_ratio: f64,
    /// Bootstrap the splitting set and average over its out-of-bag rows.
    pub oob_honest: bool,
    /// With `oob_honest`, draw the averaging set as a second independent
    /// bootstrap instead of the out-of-bag complement.
    pub double_bootstrap: bool,
}

impl Default for ForestParams {
    fn default() -> Self {
        Self {
            n_trees: 500,
            replace: true,
            sample_size: 0,
            split_ratio: 1.0,
            oob_honest: false,
            double_bootstrap: false,
        }
    }
}

impl ForestParams {
    fn effective_sample_size(&self, n_rows: usize) -> usize {
        if self.sample_size == 0 {
            n_rows
        } else {
            self.sample_size
        }
    }

    fn validate(&self) -> Result<(), ConfigError> {
        if self.n_trees == 0 {
            return Err(ConfigError::NTreesZero);
        }
        if !(0.0..=1.0).contains(&self.split_ratio) {
            return Err(ConfigError::InvalidSplitRatio {
                got: self.split_ratio,
            });
        }
        Ok(())
    }
}

// =============================================================================
// Forest
// =============================================================================

/// Aggregated OOB predictions over a forest.
#[derive(Debug, Clone)]
pub struct OobPredictions {
    /// Mean OOB prediction per training row; NaN where no tree left the row
    /// out of bag.
    pub predictions: Vec<f64>,
    /// Number of trees that predicted each row out of bag.
    pub counts: Vec<usize>,
    /// Mean squared error over the rows with at least one OOB prediction.
    pub mse: f64,
}

/// A bagged ensemble of honest trees.
#[derive(Debug, Clone)]
pub struct Forest {
    trees: Vec<Tree>,
    tree_params: TreeParams,
    params: ForestParams,
    seed: u64,
    failed_trees: usize,
}

impl Forest {
    /// Grow a forest; tree builds fan out in parallel.
    pub fn grow(
        data: &TrainingData,
        tree_params: TreeParams,
        params: ForestParams,
        seed: u64,
        sink: &dyn ProgressSink,
    ) -> Result<Self, GrowError> {
        params.validate()?;

        let n_trees = params.n_trees;
        let mut forest = Self {
            trees: Vec::new(),
            tree_params,
            params,
            seed,
            failed_trees: 0,
        };
        forest.add_trees(data, n_trees, sink)?;
        Ok(forest)
    }

    /// Grow `n_trees` additional trees, continuing the seed sequence.
    pub fn add_trees(
        &mut self,
        data: &TrainingData,
        n_trees: usize,
        sink: &dyn ProgressSink,
    ) -> Result<(), GrowError> {
        if n_trees == 0 {
            return Ok(());
        }
        let first = self.trees.len() + self.failed_trees;
        let tree_params = self.tree_params.clone();
        let params = self.params.clone();
        let seed = self.seed;

        let built: Vec<(usize, Result<Tree, GrowError>)> = (first..first + n_trees)
            .into_par_iter()
            .map(|index| {
                let tree_seed = seed.wrapping_add((index as u64).wrapping_mul(TREE_SEED_STRIDE));
                let mut rng = Xoshiro256PlusPlus::seed_from_u64(tree_seed);
                let (splitting, averaging) = draw_samples(data.n_rows(), &params, &mut rng);
                let result =
                    Tree::grow(data, tree_params.clone(), splitting, averaging, tree_seed);
                match &result {
                    Ok(_) => sink.on_tree_built(index),
                    Err(error) => sink.on_tree_failed(index, error),
                }
                (index, result)
            })
            .collect();

        let mut first_error = None;
        for (_, result) in built {
            match result {
                Ok(tree) => self.trees.push(tree),
                Err(error) => {
                    self.failed_trees += 1;
                    first_error.get_or_insert(error);
                }
            }
        }

        if self.trees.is_empty() {
            return Err(first_error.expect("no trees and no error is impossible"));
        }
        Ok(())
    }

    /// The grown trees.
    #[inline]
    pub fn trees(&self) -> &[Tree] {
        &self.trees
    }

    /// Number of trees that failed to build and were skipped.
    #[inline]
    pub fn failed_trees(&self) -> usize {
        self.failed_trees
    }

    /// Forest seed.
    #[inline]
    pub fn seed(&self) -> u64 {
        self.seed
    }

    /// Mean prediction over all trees.
    pub fn predict<'a>(
        &self,
        x_new: ndarray::ArrayView2<'a, f64>,
        data: &'a TrainingData,
    ) -> Result<Vec<f64>, PredictError> {
        let request = PredictionRequest::default();
        let per_tree: Vec<Vec<f64>> = self
            .trees
            .par_iter()
            .map(|tree| tree.predict(x_new, data, &request).map(|p| p.values))
            .collect::<Result<_, _>>()?;

        let n_rows = x_new.nrows();
        let mut mean = vec![0.0; n_rows];
        for values in &per_tree {
            for (m, v) in mean.iter_mut().zip(values) {
                *m += v;
            }
        }
        let scale = 1.0 / self.trees.len() as f64;
        for m in &mut mean {
            *m *= scale;
        }
        Ok(mean)
    }

    /// Aggregate out-of-bag predictions over the training rows.
    ///
    /// The OOB regime follows the forest's sampling configuration: grouped
    /// when the data carries groups, honest or double-bootstrap honest when
    /// configured, standard otherwise. `double_oob` requests the stricter
    /// complement (rows in neither sample).
    pub fn oob_predictions(
        &self,
        data: &TrainingData,
        double_oob: bool,
    ) -> Result<OobPredictions, PredictError> {
        let n_rows = data.n_rows();
        let all_index: Vec<usize> = (0..n_rows).collect();

        let per_tree: Vec<(Vec<usize>, Vec<f64>)> = self
            .trees
            .par_iter()
            .map(|tree| {
                let oob = if data.has_groups() {
                    let double = if self.params.oob_honest {
                        double_oob
                    } else {
                        true
                    };
                    tree.out_of_group_index(data.groups(), &all_index, double)
                } else if self.params.oob_honest {
                    if double_oob {
                        tree.double_oob_index(&all_index)
                    } else {
                        tree.honest_oob_index(&all_index)
                    }
                } else {
                    tree.oob_index(&all_index)
                };

                let request = PredictionRequest {
                    update_index: Some(&oob),
                    ..Default::default()
                };
                let prediction = tree.predict(data.features(), data, &request)?;
                Ok((oob, prediction.values))
            })
            .collect::<Result<_, PredictError>>()?;

        let mut sums = vec![0.0; n_rows];
        let mut counts = vec![0usize; n_rows];
        for (oob, values) in &per_tree {
            for &row in oob {
                sums[row] += values[row];
                counts[row] += 1;
            }
        }

        let mut predictions = vec![f64::NAN; n_rows];
        let mut squared_error = 0.0;
        let mut n_scored = 0usize;
        for row in 0..n_rows {
            if counts[row] > 0 {
                let mean = sums[row] / counts[row] as f64;
                predictions[row] = mean;
                let residual = mean - data.outcome(row);
                squared_error += residual * residual;
                n_scored += 1;
            }
        }
        let mse = if n_scored > 0 {
            squared_error / n_scored as f64
        } else {
            f64::NAN
        };

        Ok(OobPredictions {
            predictions,
            counts,
            mse,
        })
    }
}

// =============================================================================
// Per-tree Sample Draws
// =============================================================================

/// Draw the splitting and averaging index sets for one tree.
fn draw_samples(
    n_rows: usize,
    params: &ForestParams,
    rng: &mut Xoshiro256PlusPlus,
) -> (Vec<usize>, Vec<usize>) {
    let size = params.effective_sample_size(n_rows);

    if params.oob_honest {
        let splitting = bootstrap_sample(n_rows, size, rng);
        let averaging = if params.double_bootstrap {
            bootstrap_sample(n_rows, size, rng)
        } else {
            // Out-of-bag complement of the splitting bootstrap.
            let mut sampled = splitting.clone();
            sampled.sort_unstable();
            sampled.dedup();
            let mut complement = Vec::new();
            let mut cursor = 0;
            for row in 0..n_rows {
                while cursor < sampled.len() && sampled[cursor] < row {
                    cursor += 1;
                }
                if cursor >= sampled.len() || sampled[cursor] != row {
                    complement.push(row);
                }
            }
            complement
        };
        return (splitting, averaging);
    }

    let mut sample = if params.replace {
        bootstrap_sample(n_rows, size, rng)
    } else {
        sample_without_replacement(n_rows, size.min(n_rows), rng)
    };

    if params.split_ratio >= 1.0 {
        let splitting = sample.clone();
        return (splitting, sample);
    }

    // Honesty partition: shuffle, then cut at the split ratio.
    sample.shuffle(rng);
    let cut = ((params.split_ratio * sample.len() as f64).round() as usize)
        .clamp(1, sample.len().saturating_sub(1));
    let averaging = sample.split_off(cut);
    (sample, averaging)
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::Array2;

    fn noisy_line(n: usize) -> TrainingData {
        // Deterministic wiggle around y = 2x.
        let x: Vec<f64> = (0..n).map(|i| i as f64 / n as f64).collect();
        let y: Vec<f64> = x
            .iter()
            .enumerate()
            .map(|(i, &v)| 2.0 * v + if i % 2 == 0 { 0.05 } else { -0.05 })
            .collect();
        TrainingData::new(Array2::from_shape_vec((n, 1), x).unwrap(), y).unwrap()
    }

    fn small_params(n_trees: usize) -> ForestParams {
        ForestParams {
            n_trees,
            ..ForestParams::default()
        }
    }

    #[test]
    fn forest_grows_requested_trees() {
        let data = noisy_line(50);
        let forest = Forest::grow(
            &data,
            TreeParams::default(),
            small_params(10),
            42,
            &NoProgress,
        )
        .unwrap();
        assert_eq!(forest.trees().len(), 10);
        assert_eq!(forest.failed_trees(), 0);
    }

    #[test]
    fn forest_is_reproducible() {
        let data = noisy_line(50);
        let grow = || {
            Forest::grow(
                &data,
                TreeParams::default(),
                small_params(5),
                42,
                &NoProgress,
            )
            .unwrap()
        };
        let a = grow();
        let b = grow();
        for (ta, tb) in a.trees().iter().zip(b.trees()) {
            assert_eq!(ta.flatten(), tb.flatten());
        }
    }

    #[test]
    fn forest_prediction_tracks_target() {
        let data = noisy_line(100);
        let forest = Forest::grow(
            &data,
            TreeParams::default(),
            small_params(20),
            42,
            &NoProgress,
        )
        .unwrap();
        let x = Array2::from_shape_vec((1, 1), vec![0.5]).unwrap();
        let prediction = forest.predict(x.view(), &data).unwrap();
        assert!((prediction[0] - 1.0).abs() < 0.3, "got {}", prediction[0]);
    }

    #[test]
    fn oob_beats_predicting_nothing() {
        let data = noisy_line(100);
        let forest = Forest::grow(
            &data,
            TreeParams::default(),
            small_params(30),
            42,
            &NoProgress,
        )
        .unwrap();
        let oob = forest.oob_predictions(&data, false).unwrap();
        // Every row should be OOB for some tree with 30 bootstraps.
        assert!(oob.counts.iter().all(|&c| c > 0));
        // Outcome variance of y = 2x + wiggle over [0,1] is about 0.33;
        // the forest must do much better.
        assert!(oob.mse < 0.1, "mse = {}", oob.mse);
    }

    #[test]
    fn honest_sampling_separates_sets() {
        let data = noisy_line(60);
        let params = ForestParams {
            n_trees: 3,
            oob_honest: true,
            ..ForestParams::default()
        };
        let forest =
            Forest::grow(&data, TreeParams::default(), params, 42, &NoProgress).unwrap();
        for tree in forest.trees() {
            // The averaging set is the splitting bootstrap's complement.
            for i in tree.averaging_index() {
                assert!(tree.splitting_index().binary_search(i).is_err());
            }
        }
    }

    #[test]
    fn split_ratio_partitions_the_sample() {
        let data = noisy_line(60);
        let params = ForestParams {
            n_trees: 3,
            replace: false,
            split_ratio: 0.5,
            ..ForestParams::default()
        };
        let forest =
            Forest::grow(&data, TreeParams::default(), params, 42, &NoProgress).unwrap();
        for tree in forest.trees() {
            assert_eq!(
                tree.splitting_index().len() + tree.averaging_index().len(),
                60
            );
            for i in tree.averaging_index() {
                assert!(tree.splitting_index().binary_search(i).is_err());
            }
        }
    }

    #[test]
    fn progress_sink_sees_every_tree() {
        use std::sync::atomic::{AtomicUsize, Ordering};

        struct Counter(AtomicUsize);
        impl ProgressSink for Counter {
            fn on_tree_built(&self, _index: usize) {
                self.0.fetch_add(1, Ordering::Relaxed);
            }
        }

        let data = noisy_line(40);
        let sink = Counter(AtomicUsize::new(0));
        Forest::grow(&data, TreeParams::default(), small_params(7), 42, &sink).unwrap();
        assert_eq!(sink.0.load(Ordering::Relaxed), 7);
    }
}
