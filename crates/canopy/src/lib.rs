//! canopy: an honest random-forest regression core.
//!
//! The engine grows regression trees under *honesty*: every tree partitions
//! its observations into a splitting set (used to choose cut points) and an
//! averaging set (used to compute leaf values), optionally via a double
//! bootstrap. Leaves may hold a ridge-regression fit over a chosen set of
//! linear features instead of a constant, and missing values and monotone
//! constraints are handled inside split selection rather than bolted on.
//!
//! # Key Types
//!
//! - [`TrainingData`] - Read-only feature/outcome container with split
//!   metadata
//! - [`Tree`] / [`TreeParams`] - Single-tree growth, prediction, OOB
//!   indices, flat records
//! - [`Forest`] / [`ForestParams`] - Thin parallel fan-out with bagging and
//!   OOB aggregation
//! - [`FlatTree`] - Pre-order record for serialization and reconstruction
//!
//! # Growing a Tree
//!
//! ```
//! use canopy::{PredictionRequest, TrainingData, Tree, TreeParams};
//! use ndarray::Array2;
//!
//! let x: Vec<f64> = (1..=10).map(|v| v as f64).collect();
//! let y = x.clone();
//! let data = TrainingData::new(Array2::from_shape_vec((10, 1), x).unwrap(), y).unwrap();
//!
//! let params = TreeParams { max_depth: 2, ..TreeParams::default() };
//! let rows: Vec<usize> = (0..10).collect();
//! let tree = Tree::grow(&data, params, rows.clone(), rows, 42).unwrap();
//!
//! let x_new = Array2::from_shape_vec((1, 1), vec![2.5]).unwrap();
//! let out = tree.predict(x_new.view(), &data, &PredictionRequest::default()).unwrap();
//! assert_eq!(out.values[0], 3.0);
//! ```

pub mod data;
pub mod error;
pub mod forest;
pub mod sampling;
pub mod testing;
pub mod tree;

pub use data::TrainingData;
pub use error::{
    ConfigError, DataError, GrowError, NodeError, PredictError, ReconstructError,
};
pub use forest::{Forest, ForestParams, NoProgress, OobPredictions, ProgressSink};
pub use tree::{
    FlatTree, LeafSamples, NaDirection, Node, Prediction, PredictionRequest, Tree, TreeParams,
};

// Re-export the matrix types prediction inputs are built from.
pub use ndarray;
