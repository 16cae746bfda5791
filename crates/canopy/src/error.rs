//! Error types for tree construction, node access, and prediction.
//!
//! Construction-time configuration problems are fatal for the tree being
//! built and surface as [`ConfigError`]. Structural misuse of the node sum
//! type (asking a leaf for its split feature and the like) surfaces as
//! [`NodeError::InvalidNodeKind`]. Degenerate data (an all-NaN feature, a
//! single-valued feature) is *not* an error: the partitioner records it as a
//! sealed leaf.

// =============================================================================
// Configuration Errors
// =============================================================================

/// Validation error for tree-construction inputs.
///
/// All variants abort the tree being constructed; the partial tree is
/// discarded. The forest-level caller may retry with a different bootstrap.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum ConfigError {
    /// A minimum node size was set to 0.
    #[error("{name} cannot be set to 0")]
    MinNodeSizeZero { name: &'static str },

    /// A minimum node size exceeds the corresponding sample.
    #[error("{name} cannot exceed total elements in the {sample} samples: {name}={got}, sample size={limit}")]
    MinNodeSizeExceedsSample {
        name: &'static str,
        sample: &'static str,
        got: usize,
        limit: usize,
    },

    /// `max_depth` was set to 0.
    #[error("max_depth cannot be set to 0")]
    MaxDepthZero,

    /// `min_split_gain` is only meaningful for ridge (linear) leaves.
    #[error("min_split_gain cannot be set without setting linear to true")]
    MinSplitGainWithoutLinear,

    /// `mtry` was set to 0.
    #[error("mtry cannot be set to 0")]
    MtryZero,

    /// `mtry` exceeds the number of features.
    #[error("mtry cannot exceed total amount of features: mtry={got}, features={limit}")]
    MtryExceedsFeatures { got: usize, limit: usize },

    /// An index set (splitting or averaging) was empty.
    #[error("{name} size cannot be 0")]
    EmptyIndexSet { name: &'static str },

    /// `max_obs` was set to 0.
    #[error("max_obs cannot be set to 0")]
    MaxObsZero,

    /// `n_trees` was set to 0.
    #[error("n_trees cannot be set to 0")]
    NTreesZero,

    /// `split_ratio` must lie in `[0, 1]`.
    #[error("split_ratio must be in [0, 1], got {got}")]
    InvalidSplitRatio { got: f64 },
}

// =============================================================================
// Node Access Errors
// =============================================================================

/// Structural access error on the node sum type.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum NodeError {
    /// A leaf-only accessor was called on a split node or vice versa.
    #[error("invalid node kind: {accessor} requires a {required} node")]
    InvalidNodeKind {
        accessor: &'static str,
        required: &'static str,
    },
}

// =============================================================================
// Data Errors
// =============================================================================

/// Shape or content problem in the training-data container.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum DataError {
    /// Feature matrix and outcome vector disagree on the number of rows.
    #[error("outcome length {outcome} does not match feature rows {rows}")]
    OutcomeLengthMismatch { outcome: usize, rows: usize },

    /// The container has no rows.
    #[error("training data must contain at least one observation")]
    Empty,

    /// A per-feature vector has the wrong length.
    #[error("{name} length {got} does not match feature count {expected}")]
    FeatureVectorLengthMismatch {
        name: &'static str,
        got: usize,
        expected: usize,
    },

    /// A column index refers past the feature count.
    #[error("{name} contains column {col} but there are only {n_cols} features")]
    ColumnOutOfBounds {
        name: &'static str,
        col: usize,
        n_cols: usize,
    },

    /// The groups vector has the wrong length.
    #[error("groups length {got} does not match row count {expected}")]
    GroupsLengthMismatch { got: usize, expected: usize },
}

// =============================================================================
// Growth Errors
// =============================================================================

/// Error raised while growing a tree.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum GrowError {
    /// Invalid construction inputs.
    #[error(transparent)]
    Config(#[from] ConfigError),

    /// A leaf mean came out non-finite, indicating corrupt outcomes upstream.
    #[error("non-finite leaf mean over {count} averaging observations")]
    NonFiniteLeafMean { count: usize },
}

// =============================================================================
// Prediction Errors
// =============================================================================

/// Error raised while predicting with a tree.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum PredictError {
    /// The prediction matrix disagrees with the training feature count.
    #[error("prediction input has {got} columns but training data has {expected}")]
    FeatureCountMismatch { got: usize, expected: usize },

    /// A row index in `update_index` is out of bounds for the input.
    #[error("update index {index} is out of bounds for {n_rows} prediction rows")]
    UpdateIndexOutOfBounds { index: usize, n_rows: usize },

    /// Weight-matrix accumulation needs the leaf averaging indices, which a
    /// reconstructed tree no longer carries.
    #[error("weight matrix accumulation requires a grown tree with owned leaf indices")]
    WeightMatrixRequiresGrownTree,
}

// =============================================================================
// Reconstruction Errors
// =============================================================================

/// Error raised while rebuilding a tree from its flat record.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum ReconstructError {
    /// A record vector ran out of entries mid-reconstruction.
    #[error("flat record truncated: ran out of {field} entries")]
    Truncated { field: &'static str },

    /// Entries remained after the pre-order walk completed.
    #[error("flat record has {remaining} unconsumed var_id entries")]
    TrailingEntries { remaining: usize },

    /// Invalid construction inputs accompanying the record.
    #[error(transparent)]
    Config(#[from] ConfigError),
}
