//! Synthetic data generators for tests and examples.

use ndarray::Array2;
use rand::prelude::*;
use rand_xoshiro::Xoshiro256PlusPlus;

use crate::data::TrainingData;

/// Random sample-major features, uniform in `[min, max]`.
pub fn random_features(rows: usize, cols: usize, seed: u64, min: f64, max: f64) -> Array2<f64> {
    assert!(max >= min);
    let mut rng = Xoshiro256PlusPlus::seed_from_u64(seed);
    let width = max - min;
    let flat: Vec<f64> = (0..rows * cols).map(|_| min + rng.gen::<f64>() * width).collect();
    Array2::from_shape_vec((rows, cols), flat).expect("shape matches generated length")
}

/// Linear outcome `y = bias + Σ coef·x + noise` with uniform noise in
/// `[-noise_amplitude, noise_amplitude]`.
pub fn linear_outcome(
    features: &Array2<f64>,
    coefficients: &[f64],
    bias: f64,
    noise_amplitude: f64,
    seed: u64,
) -> Vec<f64> {
    assert_eq!(features.ncols(), coefficients.len());
    let mut rng = Xoshiro256PlusPlus::seed_from_u64(seed);
    (0..features.nrows())
        .map(|r| {
            let mut y = bias;
            for (c, &coef) in coefficients.iter().enumerate() {
                y += coef * features[[r, c]];
            }
            if noise_amplitude > 0.0 {
                y += (rng.gen::<f64>() * 2.0 - 1.0) * noise_amplitude;
            }
            y
        })
        .collect()
}

/// Training data from a random linear model.
pub fn synthetic_regression(
    rows: usize,
    coefficients: &[f64],
    noise_amplitude: f64,
    seed: u64,
) -> TrainingData {
    let features = random_features(rows, coefficients.len(), seed, -1.0, 1.0);
    let outcome = linear_outcome(&features, coefficients, 0.0, noise_amplitude, seed ^ 0x51EED);
    TrainingData::new(features, outcome).expect("synthetic shapes agree")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn features_respect_bounds() {
        let x = random_features(50, 3, 42, -2.0, 2.0);
        assert!(x.iter().all(|&v| (-2.0..=2.0).contains(&v)));
    }

    #[test]
    fn generation_is_reproducible() {
        let a = random_features(10, 2, 7, 0.0, 1.0);
        let b = random_features(10, 2, 7, 0.0, 1.0);
        assert_eq!(a, b);
    }

    #[test]
    fn noiseless_outcome_is_exact() {
        let x = random_features(20, 2, 42, -1.0, 1.0);
        let y = linear_outcome(&x, &[3.0, -2.0], 0.5, 0.0, 42);
        for r in 0..20 {
            let expected = 0.5 + 3.0 * x[[r, 0]] - 2.0 * x[[r, 1]];
            assert!((y[r] - expected).abs() < 1e-12);
        }
    }
}
