//! Honest regression tree: growth, prediction, OOB index machinery, and the
//! flat-record (de)serialization.
//!
//! A [`Tree`] owns its root [`Node`] and the originally sampled averaging
//! and splitting index vectors. Growth is single-threaded and deterministic:
//! one seeded PRNG drives feature sampling, cut randomization, and tie
//! breaking in a fixed order, so two builds from identical inputs produce
//! bytewise-identical flat records.

mod flat;
mod grow;
mod node;
mod oob;
mod predict;
mod ridge;
mod split;

pub use flat::FlatTree;
pub use node::{LeafSamples, NaDirection, Node};
pub use predict::{Prediction, PredictionRequest};

use crate::data::TrainingData;
use crate::error::{ConfigError, GrowError};
use grow::Grower;

// =============================================================================
// TreeParams
// =============================================================================

/// Construction inputs for a single tree.
///
/// Depth is 1-based: the root sits at depth 1 and `max_depth = 1` grows a
/// single leaf.
#[derive(Debug, Clone, PartialEq)]
pub struct TreeParams {
    /// Number of features sampled at each split candidate.
    pub mtry: usize,
    /// Minimum splitting observations for a node to be kept as a leaf.
    pub min_node_size_spt: usize,
    /// Minimum averaging observations for a node to be kept as a leaf.
    pub min_node_size_avg: usize,
    /// Minimum splitting observations either child of a split must keep.
    pub min_node_size_to_split_spt: usize,
    /// Minimum averaging observations either child of a split must keep.
    pub min_node_size_to_split_avg: usize,
    /// Minimum `R²(children) − R²(parent)` for a split to be kept.
    /// Must be 0 unless `linear` is set.
    pub min_split_gain: f64,
    /// Maximum leaf depth (1-based).
    pub max_depth: usize,
    /// Depth at which feature sampling switches to the deep weights.
    pub interaction_depth: usize,
    /// Draw cut points uniformly inside the candidate interval instead of
    /// taking the midpoint.
    pub split_middle: bool,
    /// Cap on candidate cut points per feature.
    pub max_obs: usize,
    /// Whether the training data carries missing values.
    pub has_nas: bool,
    /// Record a default NA direction even at splits that saw no NAs.
    pub na_direction: bool,
    /// Grow ridge (linear) leaves.
    pub linear: bool,
    /// Ridge penalty λ, used in split scoring and leaf fitting.
    pub overfit_penalty: f64,
}

impl Default for TreeParams {
    fn default() -> Self {
        Self {
            mtry: 1,
            min_node_size_spt: 1,
            min_node_size_avg: 1,
            min_node_size_to_split_spt: 1,
            min_node_size_to_split_avg: 1,
            min_split_gain: 0.0,
            max_depth: 99,
            interaction_depth: 99,
            split_middle: false,
            max_obs: usize::MAX,
            has_nas: false,
            na_direction: false,
            linear: false,
            overfit_penalty: 1.0,
        }
    }
}

impl TreeParams {
    /// Validate against the data and the sampled index sets.
    pub fn validate(
        &self,
        data: &TrainingData,
        splitting: &[usize],
        averaging: &[usize],
    ) -> Result<(), ConfigError> {
        for (value, name) in [
            (self.min_node_size_avg, "min_node_size_avg"),
            (self.min_node_size_spt, "min_node_size_spt"),
            (self.min_node_size_to_split_avg, "min_node_size_to_split_avg"),
            (self.min_node_size_to_split_spt, "min_node_size_to_split_spt"),
        ] {
            if value == 0 {
                return Err(ConfigError::MinNodeSizeZero { name });
            }
        }
        if averaging.is_empty() {
            return Err(ConfigError::EmptyIndexSet {
                name: "averaging_index",
            });
        }
        if splitting.is_empty() {
            return Err(ConfigError::EmptyIndexSet {
                name: "splitting_index",
            });
        }
        if self.min_node_size_to_split_avg > averaging.len() {
            return Err(ConfigError::MinNodeSizeExceedsSample {
                name: "min_node_size_to_split_avg",
                sample: "averaging",
                got: self.min_node_size_to_split_avg,
                limit: averaging.len(),
            });
        }
        if self.min_node_size_to_split_spt > splitting.len() {
            return Err(ConfigError::MinNodeSizeExceedsSample {
                name: "min_node_size_to_split_spt",
                sample: "splitting",
                got: self.min_node_size_to_split_spt,
                limit: splitting.len(),
            });
        }
        if self.max_depth == 0 {
            return Err(ConfigError::MaxDepthZero);
        }
        if self.min_split_gain != 0.0 && !self.linear {
            return Err(ConfigError::MinSplitGainWithoutLinear);
        }
        if self.mtry == 0 {
            return Err(ConfigError::MtryZero);
        }
        if self.mtry > data.n_cols() {
            return Err(ConfigError::MtryExceedsFeatures {
                got: self.mtry,
                limit: data.n_cols(),
            });
        }
        if self.max_obs == 0 {
            return Err(ConfigError::MaxObsZero);
        }
        Ok(())
    }
}

// =============================================================================
// Tree
// =============================================================================

/// A grown (or reconstructed) honest regression tree.
#[derive(Debug, Clone, PartialEq)]
pub struct Tree {
    root: Node,
    /// Originally sampled averaging indices, sorted ascending.
    averaging_index: Vec<usize>,
    /// Originally sampled splitting indices, sorted ascending.
    splitting_index: Vec<usize>,
    seed: u64,
    leaf_count: usize,
    params: TreeParams,
}

impl Tree {
    /// Grow a tree over the given splitting and averaging samples.
    ///
    /// Construction is deterministic in `(data, params, indices, seed)`.
    pub fn grow(
        data: &TrainingData,
        params: TreeParams,
        splitting_index: Vec<usize>,
        averaging_index: Vec<usize>,
        seed: u64,
    ) -> Result<Self, GrowError> {
        params.validate(data, &splitting_index, &averaging_index)?;

        let grower = Grower::new(data, &params, seed);
        let (root, leaf_count) = grower.grow(averaging_index.clone(), splitting_index.clone())?;

        // OOB computation needs sorted input; sort once at the end of growth.
        let mut averaging_index = averaging_index;
        let mut splitting_index = splitting_index;
        averaging_index.sort_unstable();
        splitting_index.sort_unstable();

        Ok(Self {
            root,
            averaging_index,
            splitting_index,
            seed,
            leaf_count,
            params,
        })
    }

    pub(crate) fn from_parts(
        root: Node,
        mut averaging_index: Vec<usize>,
        mut splitting_index: Vec<usize>,
        seed: u64,
        leaf_count: usize,
        params: TreeParams,
    ) -> Self {
        averaging_index.sort_unstable();
        splitting_index.sort_unstable();
        Self {
            root,
            averaging_index,
            splitting_index,
            seed,
            leaf_count,
            params,
        }
    }

    /// The root node.
    #[inline]
    pub fn root(&self) -> &Node {
        &self.root
    }

    /// Construction parameters.
    #[inline]
    pub fn params(&self) -> &TreeParams {
        &self.params
    }

    /// Seed this tree was grown with.
    #[inline]
    pub fn seed(&self) -> u64 {
        self.seed
    }

    /// Number of leaves; leaf ids run dense from 1 to this count.
    #[inline]
    pub fn leaf_count(&self) -> usize {
        self.leaf_count
    }

    /// Sampled averaging indices, sorted ascending.
    #[inline]
    pub fn averaging_index(&self) -> &[usize] {
        &self.averaging_index
    }

    /// Sampled splitting indices, sorted ascending.
    #[inline]
    pub fn splitting_index(&self) -> &[usize] {
        &self.splitting_index
    }
}
