//! Batch tree walker producing point predictions, terminal-node ids, ridge
//! coefficient vectors, and honest weight-matrix entries.
//!
//! The walker routes a whole batch of rows down the tree at once,
//! partitioning the row set at each split, so every node is visited at most
//! once per batch. Prediction is read-only on the tree and may run from
//! multiple threads concurrently.

use ndarray::{Array2, ArrayView2};

use crate::data::TrainingData;
use crate::error::PredictError;
use crate::tree::node::{LeafSamples, NaDirection, Node, NodeKind};
use crate::tree::Tree;

// =============================================================================
// Request / Response
// =============================================================================

/// What a prediction call should produce beyond point predictions.
#[derive(Debug, Clone, Copy, Default)]
pub struct PredictionRequest<'a> {
    /// Rows of the input to predict; `None` predicts every row.
    pub update_index: Option<&'a [usize]>,
    /// Record the terminal leaf id per row.
    pub collect_terminal_nodes: bool,
    /// Record the ridge coefficient vector per row (linear trees).
    pub collect_coefficients: bool,
    /// Accumulate the honest weight matrix `[n_rows, n_train]`.
    pub collect_weight_matrix: bool,
    /// Sorted training indices excluded from weight accumulation to
    /// preserve honesty.
    pub oob_exclusions: Option<&'a [usize]>,
}

/// Outputs of one prediction call. Rows not selected by `update_index` keep
/// zeros in every output.
#[derive(Debug, Clone)]
pub struct Prediction {
    /// Point prediction per row.
    pub values: Vec<f64>,
    /// Terminal leaf id per row, if requested.
    pub terminal_nodes: Option<Vec<usize>>,
    /// Ridge coefficients per row, if requested; empty vectors for rows
    /// predicted by constant leaves.
    pub coefficients: Option<Vec<Vec<f64>>>,
    /// Honest weight matrix, if requested.
    pub weight_matrix: Option<Array2<f64>>,
}

impl Tree {
    /// Walk the tree for a batch of new observations.
    ///
    /// Routing at a split: a present value goes left when `< split_value`
    /// (numeric) or `== split_value` (categorical); a missing value follows
    /// the recorded default NA direction, right when none was recorded.
    pub fn predict<'a>(
        &self,
        x_new: ArrayView2<'a, f64>,
        data: &'a TrainingData,
        request: &PredictionRequest<'a>,
    ) -> Result<Prediction, PredictError> {
        if x_new.ncols() != data.n_cols() {
            return Err(PredictError::FeatureCountMismatch {
                got: x_new.ncols(),
                expected: data.n_cols(),
            });
        }
        let n_rows = x_new.nrows();

        let rows: Vec<usize> = match request.update_index {
            Some(indices) => {
                for &r in indices {
                    if r >= n_rows {
                        return Err(PredictError::UpdateIndexOutOfBounds {
                            index: r,
                            n_rows,
                        });
                    }
                }
                indices.to_vec()
            }
            None => (0..n_rows).collect(),
        };

        let mut output = Prediction {
            values: vec![0.0; n_rows],
            terminal_nodes: request.collect_terminal_nodes.then(|| vec![0; n_rows]),
            coefficients: request
                .collect_coefficients
                .then(|| vec![Vec::new(); n_rows]),
            weight_matrix: request
                .collect_weight_matrix
                .then(|| Array2::zeros((n_rows, data.n_rows()))),
        };

        let walker = Walker {
            x_new,
            data,
            linear: self.params().linear,
            exclusions: request.oob_exclusions.unwrap_or(&[]),
        };
        walker.walk(self.root(), rows, &mut output)?;
        Ok(output)
    }
}

// =============================================================================
// Walker
// =============================================================================

struct Walker<'a> {
    x_new: ArrayView2<'a, f64>,
    data: &'a TrainingData,
    linear: bool,
    exclusions: &'a [usize],
}

impl Walker<'_> {
    fn walk(
        &self,
        node: &Node,
        rows: Vec<usize>,
        output: &mut Prediction,
    ) -> Result<(), PredictError> {
        if rows.is_empty() {
            return Ok(());
        }
        match node.kind() {
            NodeKind::Leaf {
                averaging,
                id,
                weight,
                ridge,
                ..
            } => self.fill_leaf(rows, averaging, *id, *weight, ridge.as_deref(), output),
            NodeKind::Split {
                feature,
                value,
                left,
                right,
                na_default,
                ..
            } => {
                let categorical = self.data.is_categorical(*feature);
                let mut left_rows = Vec::new();
                let mut right_rows = Vec::new();
                for r in rows {
                    let v = self.x_new[[r, *feature]];
                    let goes_left = if v.is_nan() {
                        matches!(na_default, Some(NaDirection::Left))
                    } else if categorical {
                        v == *value
                    } else {
                        v < *value
                    };
                    if goes_left {
                        left_rows.push(r);
                    } else {
                        right_rows.push(r);
                    }
                }
                self.walk(left, left_rows, output)?;
                self.walk(right, right_rows, output)
            }
        }
    }

    fn fill_leaf(
        &self,
        rows: Vec<usize>,
        averaging: &LeafSamples,
        id: usize,
        weight: f64,
        ridge: Option<&[f64]>,
        output: &mut Prediction,
    ) -> Result<(), PredictError> {
        for &r in &rows {
            let value = match (self.linear, ridge) {
                (true, Some(beta)) => {
                    // β · [lin_obs(r), 1], reading the linear features from
                    // the prediction input.
                    let mut acc = beta[beta.len() - 1];
                    for (slot, &col) in self.data.lin_cols().iter().enumerate() {
                        acc += beta[slot] * self.x_new[[r, col]];
                    }
                    acc
                }
                // Reconstructed linear trees carry no coefficients and
                // fall back to the stored leaf weight.
                _ => weight,
            };
            output.values[r] = value;

            if let Some(terminal) = output.terminal_nodes.as_mut() {
                terminal[r] = id;
            }
            if let Some(coefficients) = output.coefficients.as_mut() {
                if let Some(beta) = ridge {
                    coefficients[r] = beta.to_vec();
                }
            }
            if let Some(matrix) = output.weight_matrix.as_mut() {
                let indices = averaging
                    .indices()
                    .ok_or(PredictError::WeightMatrixRequiresGrownTree)?;
                let share = 1.0 / indices.len() as f64;
                for &t in indices {
                    if self.exclusions.binary_search(&t).is_ok() {
                        continue;
                    }
                    matrix[[r, t]] += share;
                }
            }
        }
        Ok(())
    }
}
