//! Training-data container consumed by the tree builder and predictor.
//!
//! [`TrainingData`] owns the feature matrix (sample-major, `[n_rows,
//! n_cols]`), the outcome vector, and the per-feature metadata the split
//! search needs: the categorical column set, the linear-feature subset for
//! ridge leaves, two feature-sampling distributions (the second takes over
//! once recursion depth reaches the interaction depth), monotone
//! constraints, and group memberships.
//!
//! Construction validates shape agreement once; afterwards the container is
//! read-only and may be shared freely across parallel tree builds.

use ndarray::{Array2, ArrayView2};

use crate::error::DataError;

// =============================================================================
// TrainingData
// =============================================================================

/// Read-only training data for growing and evaluating trees.
///
/// # Example
///
/// ```
/// use canopy::TrainingData;
/// use ndarray::array;
///
/// // 4 observations, 2 features
/// let x = array![[1.0, 10.0], [2.0, 20.0], [3.0, 30.0], [4.0, 40.0]];
/// let y = vec![1.0, 2.0, 3.0, 4.0];
/// let data = TrainingData::new(x, y).unwrap();
///
/// assert_eq!(data.n_rows(), 4);
/// assert_eq!(data.n_cols(), 2);
/// assert_eq!(data.point(2, 1), 30.0);
/// ```
#[derive(Debug, Clone)]
pub struct TrainingData {
    /// Feature values, `[n_rows, n_cols]`. Entries may be NaN.
    features: Array2<f64>,
    /// Outcome per observation.
    outcome: Vec<f64>,
    /// Sorted categorical column indices.
    cat_cols: Vec<usize>,
    /// Columns entering ridge leaves, in coefficient order.
    lin_cols: Vec<usize>,
    /// Sampling weights used while `depth < interaction_depth`.
    feature_weights: Vec<f64>,
    /// Columns the shallow weights refer to.
    feature_weight_vars: Vec<usize>,
    /// Sampling weights used once `depth >= interaction_depth`.
    deep_feature_weights: Vec<f64>,
    /// Columns the deep weights refer to.
    deep_feature_weight_vars: Vec<usize>,
    /// Per-feature monotone constraint: -1, 0, or +1.
    monotonic_constraints: Vec<i8>,
    /// Check monotone bounds against averaging means instead of splitting means.
    monotone_avg: bool,
    /// Group membership per observation; all zeros means "no groups".
    groups: Vec<usize>,
}

impl TrainingData {
    /// Create a container from a sample-major feature matrix and outcomes.
    ///
    /// All metadata starts at its defaults: no categorical columns, every
    /// column is a linear feature, uniform feature weights for both
    /// distributions, no monotone constraints, no groups. Use the `with_*`
    /// methods to override.
    pub fn new(features: Array2<f64>, outcome: Vec<f64>) -> Result<Self, DataError> {
        let n_rows = features.nrows();
        let n_cols = features.ncols();
        if n_rows == 0 || n_cols == 0 {
            return Err(DataError::Empty);
        }
        if outcome.len() != n_rows {
            return Err(DataError::OutcomeLengthMismatch {
                outcome: outcome.len(),
                rows: n_rows,
            });
        }

        Ok(Self {
            features,
            outcome,
            cat_cols: Vec::new(),
            lin_cols: (0..n_cols).collect(),
            feature_weights: vec![1.0; n_cols],
            feature_weight_vars: (0..n_cols).collect(),
            deep_feature_weights: vec![1.0; n_cols],
            deep_feature_weight_vars: (0..n_cols).collect(),
            monotonic_constraints: vec![0; n_cols],
            monotone_avg: false,
            groups: vec![0; n_rows],
        })
    }

    /// Mark columns as categorical (routed by equality at splits).
    pub fn with_categorical_cols(mut self, mut cols: Vec<usize>) -> Result<Self, DataError> {
        self.check_cols("categorical_cols", &cols)?;
        cols.sort_unstable();
        cols.dedup();
        self.cat_cols = cols;
        Ok(self)
    }

    /// Restrict the linear-feature subset used by ridge leaves.
    ///
    /// Coefficient vectors follow the order given here, intercept last.
    pub fn with_linear_cols(mut self, cols: Vec<usize>) -> Result<Self, DataError> {
        self.check_cols("linear_cols", &cols)?;
        self.lin_cols = cols;
        Ok(self)
    }

    /// Set the shallow feature-sampling distribution.
    pub fn with_feature_weights(
        mut self,
        weights: Vec<f64>,
        variables: Vec<usize>,
    ) -> Result<Self, DataError> {
        self.check_weights("feature_weights", &weights, &variables)?;
        self.feature_weights = weights;
        self.feature_weight_vars = variables;
        Ok(self)
    }

    /// Set the deep feature-sampling distribution (used once depth reaches
    /// the interaction depth).
    pub fn with_deep_feature_weights(
        mut self,
        weights: Vec<f64>,
        variables: Vec<usize>,
    ) -> Result<Self, DataError> {
        self.check_weights("deep_feature_weights", &weights, &variables)?;
        self.deep_feature_weights = weights;
        self.deep_feature_weight_vars = variables;
        Ok(self)
    }

    /// Set per-feature monotone constraints (-1, 0, +1).
    pub fn with_monotonic_constraints(
        mut self,
        constraints: Vec<i8>,
        monotone_avg: bool,
    ) -> Result<Self, DataError> {
        if constraints.len() != self.n_cols() {
            return Err(DataError::FeatureVectorLengthMismatch {
                name: "monotonic_constraints",
                got: constraints.len(),
                expected: self.n_cols(),
            });
        }
        self.monotonic_constraints = constraints;
        self.monotone_avg = monotone_avg;
        Ok(self)
    }

    /// Set group memberships. Group id 0 everywhere means "no groups".
    pub fn with_groups(mut self, groups: Vec<usize>) -> Result<Self, DataError> {
        if groups.len() != self.n_rows() {
            return Err(DataError::GroupsLengthMismatch {
                got: groups.len(),
                expected: self.n_rows(),
            });
        }
        self.groups = groups;
        Ok(self)
    }

    fn check_cols(&self, name: &'static str, cols: &[usize]) -> Result<(), DataError> {
        for &c in cols {
            if c >= self.n_cols() {
                return Err(DataError::ColumnOutOfBounds {
                    name,
                    col: c,
                    n_cols: self.n_cols(),
                });
            }
        }
        Ok(())
    }

    fn check_weights(
        &self,
        name: &'static str,
        weights: &[f64],
        variables: &[usize],
    ) -> Result<(), DataError> {
        if weights.len() != variables.len() {
            return Err(DataError::FeatureVectorLengthMismatch {
                name,
                got: weights.len(),
                expected: variables.len(),
            });
        }
        self.check_cols(name, variables)
    }

    // =========================================================================
    // Accessors
    // =========================================================================

    /// Number of observations.
    #[inline]
    pub fn n_rows(&self) -> usize {
        self.features.nrows()
    }

    /// Number of features.
    #[inline]
    pub fn n_cols(&self) -> usize {
        self.features.ncols()
    }

    /// Feature value of observation `i` at column `j`. May be NaN.
    #[inline]
    pub fn point(&self, i: usize, j: usize) -> f64 {
        self.features[[i, j]]
    }

    /// Outcome of observation `i`.
    #[inline]
    pub fn outcome(&self, i: usize) -> f64 {
        self.outcome[i]
    }

    /// The full feature matrix, sample-major.
    #[inline]
    pub fn features(&self) -> ArrayView2<'_, f64> {
        self.features.view()
    }

    /// Linear-feature values of observation `i`, in coefficient order.
    pub fn lin_obs(&self, i: usize) -> Vec<f64> {
        self.lin_cols.iter().map(|&j| self.features[[i, j]]).collect()
    }

    /// Columns entering ridge leaves, in coefficient order.
    #[inline]
    pub fn lin_cols(&self) -> &[usize] {
        &self.lin_cols
    }

    /// Number of linear features (ridge coefficient vectors have one more
    /// entry for the intercept).
    #[inline]
    pub fn num_linear_features(&self) -> usize {
        self.lin_cols.len()
    }

    /// Sorted categorical column indices.
    #[inline]
    pub fn cat_cols(&self) -> &[usize] {
        &self.cat_cols
    }

    /// Whether column `j` is categorical.
    #[inline]
    pub fn is_categorical(&self, j: usize) -> bool {
        self.cat_cols.binary_search(&j).is_ok()
    }

    /// Shallow sampling weights and the columns they refer to.
    #[inline]
    pub fn feature_weights(&self) -> (&[f64], &[usize]) {
        (&self.feature_weights, &self.feature_weight_vars)
    }

    /// Deep sampling weights and the columns they refer to.
    #[inline]
    pub fn deep_feature_weights(&self) -> (&[f64], &[usize]) {
        (&self.deep_feature_weights, &self.deep_feature_weight_vars)
    }

    /// Per-feature monotone constraints (-1, 0, +1).
    #[inline]
    pub fn monotonic_constraints(&self) -> &[i8] {
        &self.monotonic_constraints
    }

    /// Whether monotone bounds apply to averaging means.
    #[inline]
    pub fn monotone_avg(&self) -> bool {
        self.monotone_avg
    }

    /// Group memberships; all zeros means "no groups".
    #[inline]
    pub fn groups(&self) -> &[usize] {
        &self.groups
    }

    /// Whether any observation carries a non-zero group id.
    #[inline]
    pub fn has_groups(&self) -> bool {
        self.groups.iter().any(|&g| g != 0)
    }

    /// Arithmetic mean of outcomes over the supplied indices.
    pub fn partition_mean(&self, indices: &[usize]) -> f64 {
        let sum: f64 = indices.iter().map(|&i| self.outcome[i]).sum();
        sum / indices.len() as f64
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::array;

    fn small() -> TrainingData {
        let x = array![[1.0, 5.0], [2.0, 6.0], [3.0, 7.0], [4.0, 8.0]];
        TrainingData::new(x, vec![10.0, 20.0, 30.0, 40.0]).unwrap()
    }

    #[test]
    fn shape_accessors() {
        let data = small();
        assert_eq!(data.n_rows(), 4);
        assert_eq!(data.n_cols(), 2);
        assert_eq!(data.point(1, 1), 6.0);
        assert_eq!(data.outcome(3), 40.0);
    }

    #[test]
    fn outcome_length_mismatch() {
        let x = array![[1.0], [2.0]];
        let err = TrainingData::new(x, vec![1.0]).unwrap_err();
        assert!(matches!(err, DataError::OutcomeLengthMismatch { .. }));
    }

    #[test]
    fn partition_mean_over_subset() {
        let data = small();
        assert_eq!(data.partition_mean(&[0, 3]), 25.0);
        assert_eq!(data.partition_mean(&[1]), 20.0);
    }

    #[test]
    fn categorical_membership() {
        let data = small().with_categorical_cols(vec![1]).unwrap();
        assert!(data.is_categorical(1));
        assert!(!data.is_categorical(0));
    }

    #[test]
    fn categorical_out_of_bounds() {
        let err = small().with_categorical_cols(vec![5]).unwrap_err();
        assert!(matches!(err, DataError::ColumnOutOfBounds { .. }));
    }

    #[test]
    fn lin_obs_follows_subset_order() {
        let data = small().with_linear_cols(vec![1, 0]).unwrap();
        assert_eq!(data.lin_obs(2), vec![7.0, 3.0]);
        assert_eq!(data.num_linear_features(), 2);
    }

    #[test]
    fn default_weights_are_uniform() {
        let data = small();
        let (w, vars) = data.feature_weights();
        assert_eq!(w, &[1.0, 1.0]);
        assert_eq!(vars, &[0, 1]);
    }

    #[test]
    fn groups_default_to_none() {
        let data = small();
        assert!(!data.has_groups());
        let grouped = small().with_groups(vec![1, 1, 2, 2]).unwrap();
        assert!(grouped.has_groups());
    }
}
