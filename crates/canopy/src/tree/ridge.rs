//! Ridge-regression accumulators used by split scoring and leaf fitting.
//!
//! A [`RidgeState`] carries the sufficient statistics of a ridge fit over a
//! set of observations: `G = Σ xᵢ xᵢᵀ` and `s = Σ yᵢ xᵢ`, where `xᵢ` is the
//! linear-feature vector of observation `i` extended with a trailing 1 for
//! the intercept, together with `Σ yᵢ²` and the observation count. Split
//! kernels update these incrementally as the candidate cut moves by one
//! observation, so a full pass over a feature scores every cut without
//! rescanning the sample.
//!
//! The ridge penalty is applied through `λI'` where `I'` carries a zero in
//! the intercept position, so the intercept is never shrunk.

use ndarray::{Array1, Array2};

use crate::data::TrainingData;

// =============================================================================
// RidgeState
// =============================================================================

/// Sufficient statistics of a ridge fit over one observation set.
#[derive(Debug, Clone)]
pub(crate) struct RidgeState {
    /// Gram matrix of extended linear-feature vectors, `dim x dim`.
    g: Array2<f64>,
    /// Outcome-weighted sum of extended vectors, length `dim`.
    s: Array1<f64>,
    /// Sum of squared outcomes.
    yty: f64,
    /// Number of accumulated observations.
    n: usize,
}

impl RidgeState {
    /// An empty accumulator for `dim = num_linear_features + 1`.
    pub fn empty(dim: usize) -> Self {
        Self {
            g: Array2::zeros((dim, dim)),
            s: Array1::zeros(dim),
            yty: 0.0,
            n: 0,
        }
    }

    /// Accumulate the full partition in one pass.
    pub fn from_partition(data: &TrainingData, indices: &[usize]) -> Self {
        let dim = data.num_linear_features() + 1;
        let mut state = Self::empty(dim);
        for &i in indices {
            state.add(&extended_lin_obs(data, i), data.outcome(i));
        }
        state
    }

    /// Side length of `G` (`num_linear_features + 1`).
    #[inline]
    pub fn dim(&self) -> usize {
        self.s.len()
    }

    /// Number of accumulated observations.
    #[inline]
    pub fn count(&self) -> usize {
        self.n
    }

    /// Add one observation with extended feature vector `x` and outcome `y`.
    pub fn add(&mut self, x: &[f64], y: f64) {
        debug_assert_eq!(x.len(), self.dim());
        for (r, &xr) in x.iter().enumerate() {
            for (c, &xc) in x.iter().enumerate() {
                self.g[[r, c]] += xr * xc;
            }
            self.s[r] += y * xr;
        }
        self.yty += y * y;
        self.n += 1;
    }

    /// The complement accumulator: `self - other`, used to derive the right
    /// child from the parent and the left child.
    pub fn minus(&self, other: &Self) -> Self {
        debug_assert_eq!(self.dim(), other.dim());
        Self {
            g: &self.g - &other.g,
            s: &self.s - &other.s,
            yty: self.yty - other.yty,
            n: self.n - other.n,
        }
    }

    /// Solve the penalized normal equations `(G + λI') β = s`.
    ///
    /// Returns `None` when the penalized Gram matrix is not positive
    /// definite; callers treat such a candidate as inadmissible.
    pub fn solve(&self, penalty: f64) -> Option<Vec<f64>> {
        let dim = self.dim();
        let mut a = self.g.clone();
        for d in 0..dim - 1 {
            a[[d, d]] += penalty;
        }
        cholesky_solve(&a, &self.s)
    }

    /// Residual sum of squares of the ridge fit: `yᵀy − sᵀβ`.
    pub fn rss(&self, penalty: f64) -> Option<f64> {
        let beta = self.solve(penalty)?;
        let fitted: f64 = beta.iter().zip(self.s.iter()).map(|(b, s)| b * s).sum();
        Some(self.yty - fitted)
    }
}

/// Linear-feature vector of observation `i` with a trailing 1 appended.
pub(crate) fn extended_lin_obs(data: &TrainingData, i: usize) -> Vec<f64> {
    let mut x = data.lin_obs(i);
    x.push(1.0);
    x
}

/// Ridge RSS of a fresh fit over `indices`, used by the min-split-gain gate.
pub(crate) fn calculate_rss(
    data: &TrainingData,
    indices: &[usize],
    penalty: f64,
) -> Option<f64> {
    RidgeState::from_partition(data, indices).rss(penalty)
}

// =============================================================================
// Cholesky Solve
// =============================================================================

/// Solve `A x = b` for symmetric positive definite `A` via Cholesky.
///
/// Returns `None` when a pivot drops below tolerance, signalling that the
/// system is singular or indefinite.
fn cholesky_solve(a: &Array2<f64>, b: &Array1<f64>) -> Option<Vec<f64>> {
    let dim = b.len();
    debug_assert_eq!(a.nrows(), dim);
    debug_assert_eq!(a.ncols(), dim);

    // Lower-triangular factor L with A = L Lᵀ.
    let mut l = Array2::<f64>::zeros((dim, dim));
    for r in 0..dim {
        for c in 0..=r {
            let mut sum = a[[r, c]];
            for k in 0..c {
                sum -= l[[r, k]] * l[[c, k]];
            }
            if r == c {
                if sum <= 1e-12 {
                    return None;
                }
                l[[r, c]] = sum.sqrt();
            } else {
                l[[r, c]] = sum / l[[c, c]];
            }
        }
    }

    // Forward substitution: L z = b.
    let mut z = vec![0.0; dim];
    for r in 0..dim {
        let mut sum = b[r];
        for k in 0..r {
            sum -= l[[r, k]] * z[k];
        }
        z[r] = sum / l[[r, r]];
    }

    // Back substitution: Lᵀ x = z.
    let mut x = vec![0.0; dim];
    for r in (0..dim).rev() {
        let mut sum = z[r];
        for k in r + 1..dim {
            sum -= l[[k, r]] * x[k];
        }
        x[r] = sum / l[[r, r]];
    }

    Some(x)
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;
    use ndarray::{array, Array2};

    fn linear_data() -> TrainingData {
        // y = 2 x0 - x1 + 3, exactly
        let mut rows = Vec::new();
        let mut y = Vec::new();
        for i in 0..6 {
            let x0 = i as f64;
            let x1 = (i as f64 * 1.7) % 5.0;
            rows.push([x0, x1]);
            y.push(2.0 * x0 - x1 + 3.0);
        }
        let flat: Vec<f64> = rows.iter().flatten().copied().collect();
        let x = Array2::from_shape_vec((6, 2), flat).unwrap();
        TrainingData::new(x, y).unwrap()
    }

    #[test]
    fn cholesky_solves_identity() {
        let a = array![[1.0, 0.0], [0.0, 1.0]];
        let b = array![3.0, -2.0];
        let x = cholesky_solve(&a, &b).unwrap();
        assert_relative_eq!(x[0], 3.0, epsilon = 1e-12);
        assert_relative_eq!(x[1], -2.0, epsilon = 1e-12);
    }

    #[test]
    fn cholesky_rejects_singular() {
        let a = array![[1.0, 1.0], [1.0, 1.0]];
        let b = array![1.0, 1.0];
        assert!(cholesky_solve(&a, &b).is_none());
    }

    #[test]
    fn exact_linear_fit_recovers_coefficients() {
        let data = linear_data();
        let indices: Vec<usize> = (0..6).collect();
        let state = RidgeState::from_partition(&data, &indices);
        let beta = state.solve(1e-8).unwrap();
        assert_relative_eq!(beta[0], 2.0, epsilon = 1e-4);
        assert_relative_eq!(beta[1], -1.0, epsilon = 1e-4);
        assert_relative_eq!(beta[2], 3.0, epsilon = 1e-4);
    }

    #[test]
    fn exact_fit_has_near_zero_rss() {
        let data = linear_data();
        let indices: Vec<usize> = (0..6).collect();
        let rss = calculate_rss(&data, &indices, 1e-8).unwrap();
        assert!(rss.abs() < 1e-6, "rss = {rss}");
    }

    #[test]
    fn incremental_update_matches_rescan() {
        let data = linear_data();
        let all: Vec<usize> = (0..6).collect();
        let total = RidgeState::from_partition(&data, &all);

        let mut left = RidgeState::empty(total.dim());
        for &i in &all[..3] {
            left.add(&extended_lin_obs(&data, i), data.outcome(i));
        }
        let right = total.minus(&left);

        let direct_right = RidgeState::from_partition(&data, &all[3..]);
        assert_relative_eq!(
            right.rss(1e-3).unwrap(),
            direct_right.rss(1e-3).unwrap(),
            epsilon = 1e-8
        );
        assert_eq!(right.count(), 3);
    }

    #[test]
    fn intercept_is_not_penalized() {
        // One observation with x = 0: only the intercept explains y. A huge
        // penalty must not shrink the intercept toward zero.
        let x = Array2::from_shape_vec((3, 1), vec![0.0, 0.0, 0.0]).unwrap();
        let data = TrainingData::new(x, vec![5.0, 5.0, 5.0]).unwrap();
        let state = RidgeState::from_partition(&data, &[0, 1, 2]);
        let beta = state.solve(1e6).unwrap();
        assert_relative_eq!(beta[1], 5.0, epsilon = 1e-9);
    }
}
