//! Tree node sum type: a node is a leaf or a split, never both.
//!
//! Leaves own the averaging and splitting index sets that reached them (or
//! just the set sizes after reconstruction from a flat record), the leaf
//! weight, and optionally a ridge coefficient vector. Splits own their
//! children. Kind-checked accessors return
//! [`NodeError::InvalidNodeKind`](crate::error::NodeError) when called on
//! the wrong kind.
//!
//! The trinary fields (`left_value`, `center`, `na_center`) are carried for
//! three-way kernels; the binary CART and ridge kernels never populate them.

use crate::data::TrainingData;
use crate::error::NodeError;
use crate::tree::ridge::RidgeState;

// =============================================================================
// LeafSamples
// =============================================================================

/// Sample indices held by a leaf.
///
/// Grown trees own the actual index vectors; reconstructed trees only know
/// how many observations each leaf held.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LeafSamples {
    /// Owned observation indices (grown tree).
    Indices(Vec<usize>),
    /// Only the count survived reconstruction.
    Count(usize),
}

impl LeafSamples {
    /// Number of observations in this sample.
    #[inline]
    pub fn len(&self) -> usize {
        match self {
            LeafSamples::Indices(v) => v.len(),
            LeafSamples::Count(n) => *n,
        }
    }

    /// Whether the sample is empty.
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// The owned indices, if this leaf still carries them.
    #[inline]
    pub fn indices(&self) -> Option<&[usize]> {
        match self {
            LeafSamples::Indices(v) => Some(v),
            LeafSamples::Count(_) => None,
        }
    }
}

// =============================================================================
// NaDirection
// =============================================================================

/// Default routing for observations missing the split feature.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NaDirection {
    Left,
    Right,
}

impl NaDirection {
    /// Integer flag used by the flat record: -1 left, +1 right, 0 unset.
    #[inline]
    pub fn to_flag(dir: Option<NaDirection>) -> i32 {
        match dir {
            Some(NaDirection::Left) => -1,
            Some(NaDirection::Right) => 1,
            None => 0,
        }
    }

    /// Parse the flat-record flag.
    #[inline]
    pub fn from_flag(flag: i32) -> Option<NaDirection> {
        match flag {
            -1 => Some(NaDirection::Left),
            1 => Some(NaDirection::Right),
            _ => None,
        }
    }
}

// =============================================================================
// Node
// =============================================================================

#[derive(Debug, Clone, PartialEq)]
pub(crate) enum NodeKind {
    Leaf {
        averaging: LeafSamples,
        splitting: LeafSamples,
        id: usize,
        weight: f64,
        ridge: Option<Vec<f64>>,
    },
    Split {
        feature: usize,
        value: f64,
        left_value: Option<f64>,
        left: Box<Node>,
        right: Box<Node>,
        center: Option<Box<Node>>,
        na_left: usize,
        na_center: usize,
        na_right: usize,
        na_default: Option<NaDirection>,
    },
}

/// A node of a grown or reconstructed tree.
#[derive(Debug, Clone, PartialEq)]
pub struct Node {
    kind: NodeKind,
}

impl Node {
    // =========================================================================
    // Constructors
    // =========================================================================

    /// Seal a leaf owning its sample index sets.
    pub fn leaf(averaging: Vec<usize>, splitting: Vec<usize>, id: usize, weight: f64) -> Self {
        Self {
            kind: NodeKind::Leaf {
                averaging: LeafSamples::Indices(averaging),
                splitting: LeafSamples::Indices(splitting),
                id,
                weight,
                ridge: None,
            },
        }
    }

    /// Seal a leaf knowing only its sample sizes (reconstruction path).
    pub fn leaf_from_counts(
        averaging_count: usize,
        splitting_count: usize,
        id: usize,
        weight: f64,
    ) -> Self {
        Self {
            kind: NodeKind::Leaf {
                averaging: LeafSamples::Count(averaging_count),
                splitting: LeafSamples::Count(splitting_count),
                id,
                weight,
                ridge: None,
            },
        }
    }

    /// Build a binary split node.
    pub fn split(
        feature: usize,
        value: f64,
        left: Node,
        right: Node,
        na_left: usize,
        na_right: usize,
        na_default: Option<NaDirection>,
    ) -> Self {
        Self::split_full(
            feature, value, None, left, right, None, na_left, 0, na_right, na_default,
        )
    }

    /// Build a split node with the trinary fields spelled out.
    ///
    /// Binary splits leave `left_value` and `center` empty; a three-way
    /// kernel would populate them together with `na_center`.
    #[allow(clippy::too_many_arguments)]
    pub fn split_full(
        feature: usize,
        value: f64,
        left_value: Option<f64>,
        left: Node,
        right: Node,
        center: Option<Node>,
        na_left: usize,
        na_center: usize,
        na_right: usize,
        na_default: Option<NaDirection>,
    ) -> Self {
        Self {
            kind: NodeKind::Split {
                feature,
                value,
                left_value,
                left: Box::new(left),
                right: Box::new(right),
                center: center.map(Box::new),
                na_left,
                na_center,
                na_right,
                na_default,
            },
        }
    }

    #[inline]
    pub(crate) fn kind(&self) -> &NodeKind {
        &self.kind
    }

    // =========================================================================
    // Kind-checked Accessors
    // =========================================================================

    /// Whether this node is a leaf.
    #[inline]
    pub fn is_leaf(&self) -> bool {
        matches!(self.kind, NodeKind::Leaf { .. })
    }

    fn require_split<T>(
        &self,
        accessor: &'static str,
        f: impl FnOnce(&NodeKind) -> T,
    ) -> Result<T, NodeError> {
        match &self.kind {
            NodeKind::Split { .. } => Ok(f(&self.kind)),
            NodeKind::Leaf { .. } => Err(NodeError::InvalidNodeKind {
                accessor,
                required: "split",
            }),
        }
    }

    fn require_leaf<T>(
        &self,
        accessor: &'static str,
        f: impl FnOnce(&NodeKind) -> T,
    ) -> Result<T, NodeError> {
        match &self.kind {
            NodeKind::Leaf { .. } => Ok(f(&self.kind)),
            NodeKind::Split { .. } => Err(NodeError::InvalidNodeKind {
                accessor,
                required: "leaf",
            }),
        }
    }

    /// Split feature index.
    pub fn split_feature(&self) -> Result<usize, NodeError> {
        self.require_split("split_feature", |k| match k {
            NodeKind::Split { feature, .. } => *feature,
            _ => unreachable!(),
        })
    }

    /// Split value.
    pub fn split_value(&self) -> Result<f64, NodeError> {
        self.require_split("split_value", |k| match k {
            NodeKind::Split { value, .. } => *value,
            _ => unreachable!(),
        })
    }

    /// Left split value of a trinary split, if one was recorded.
    pub fn left_split_value(&self) -> Result<Option<f64>, NodeError> {
        self.require_split("left_split_value", |k| match k {
            NodeKind::Split { left_value, .. } => *left_value,
            _ => unreachable!(),
        })
    }

    /// Left child.
    pub fn left_child(&self) -> Result<&Node, NodeError> {
        match &self.kind {
            NodeKind::Split { left, .. } => Ok(left),
            NodeKind::Leaf { .. } => Err(NodeError::InvalidNodeKind {
                accessor: "left_child",
                required: "split",
            }),
        }
    }

    /// Right child.
    pub fn right_child(&self) -> Result<&Node, NodeError> {
        match &self.kind {
            NodeKind::Split { right, .. } => Ok(right),
            NodeKind::Leaf { .. } => Err(NodeError::InvalidNodeKind {
                accessor: "right_child",
                required: "split",
            }),
        }
    }

    /// Center child of a trinary split, if present.
    pub fn center_child(&self) -> Result<Option<&Node>, NodeError> {
        match &self.kind {
            NodeKind::Split { center, .. } => Ok(center.as_deref()),
            NodeKind::Leaf { .. } => Err(NodeError::InvalidNodeKind {
                accessor: "center_child",
                required: "split",
            }),
        }
    }

    /// Count of NA observations routed left at this split.
    pub fn na_left_count(&self) -> Result<usize, NodeError> {
        self.require_split("na_left_count", |k| match k {
            NodeKind::Split { na_left, .. } => *na_left,
            _ => unreachable!(),
        })
    }

    /// Count of NA observations routed right at this split.
    pub fn na_right_count(&self) -> Result<usize, NodeError> {
        self.require_split("na_right_count", |k| match k {
            NodeKind::Split { na_right, .. } => *na_right,
            _ => unreachable!(),
        })
    }

    /// Count of NA observations routed to the center child.
    pub fn na_center_count(&self) -> Result<usize, NodeError> {
        self.require_split("na_center_count", |k| match k {
            NodeKind::Split { na_center, .. } => *na_center,
            _ => unreachable!(),
        })
    }

    /// Default NA routing the predictor uses for new missing values.
    pub fn na_default_direction(&self) -> Result<Option<NaDirection>, NodeError> {
        self.require_split("na_default_direction", |k| match k {
            NodeKind::Split { na_default, .. } => *na_default,
            _ => unreachable!(),
        })
    }

    /// Leaf id (dense from 1 in seal order).
    pub fn node_id(&self) -> Result<usize, NodeError> {
        self.require_leaf("node_id", |k| match k {
            NodeKind::Leaf { id, .. } => *id,
            _ => unreachable!(),
        })
    }

    /// Leaf weight (the averaging-set mean, or the reconstructed weight).
    pub fn weight(&self) -> Result<f64, NodeError> {
        self.require_leaf("weight", |k| match k {
            NodeKind::Leaf { weight, .. } => *weight,
            _ => unreachable!(),
        })
    }

    /// Size of the leaf's averaging sample.
    pub fn average_count(&self) -> Result<usize, NodeError> {
        self.require_leaf("average_count", |k| match k {
            NodeKind::Leaf { averaging, .. } => averaging.len(),
            _ => unreachable!(),
        })
    }

    /// Size of the leaf's splitting sample.
    pub fn split_count(&self) -> Result<usize, NodeError> {
        self.require_leaf("split_count", |k| match k {
            NodeKind::Leaf { splitting, .. } => splitting.len(),
            _ => unreachable!(),
        })
    }

    /// The leaf's averaging sample.
    pub fn averaging_samples(&self) -> Result<&LeafSamples, NodeError> {
        match &self.kind {
            NodeKind::Leaf { averaging, .. } => Ok(averaging),
            NodeKind::Split { .. } => Err(NodeError::InvalidNodeKind {
                accessor: "averaging_samples",
                required: "leaf",
            }),
        }
    }

    /// The leaf's splitting sample.
    pub fn splitting_samples(&self) -> Result<&LeafSamples, NodeError> {
        match &self.kind {
            NodeKind::Leaf { splitting, .. } => Ok(splitting),
            NodeKind::Split { .. } => Err(NodeError::InvalidNodeKind {
                accessor: "splitting_samples",
                required: "leaf",
            }),
        }
    }

    /// Ridge coefficients of a linear leaf, intercept last.
    pub fn ridge_coefficients(&self) -> Result<Option<&[f64]>, NodeError> {
        match &self.kind {
            NodeKind::Leaf { ridge, .. } => Ok(ridge.as_deref()),
            NodeKind::Split { .. } => Err(NodeError::InvalidNodeKind {
                accessor: "ridge_coefficients",
                required: "leaf",
            }),
        }
    }

    /// Recursive sum of averaging counts over all leaf descendants.
    ///
    /// Used to normalize weight-matrix rows.
    pub fn average_count_always(&self) -> usize {
        match &self.kind {
            NodeKind::Leaf { averaging, .. } => averaging.len(),
            NodeKind::Split {
                left, right, center, ..
            } => {
                left.average_count_always()
                    + right.average_count_always()
                    + center.as_ref().map_or(0, |c| c.average_count_always())
            }
        }
    }

    // =========================================================================
    // Ridge Leaf Fitting
    // =========================================================================

    /// Fit and store ridge coefficients over this leaf's averaging set.
    ///
    /// Solves `β = (G + λI')⁻¹ s` with `I'` zero in the intercept position.
    /// When the penalized system is singular the leaf keeps a constant fit:
    /// zero slopes with the leaf weight as intercept. Reconstructed leaves
    /// (counts only) are left untouched.
    pub fn set_ridge_coefficients(
        &mut self,
        data: &TrainingData,
        overfit_penalty: f64,
    ) -> Result<(), NodeError> {
        match &mut self.kind {
            NodeKind::Leaf {
                averaging,
                weight,
                ridge,
                ..
            } => {
                if let LeafSamples::Indices(avg) = averaging {
                    let state = RidgeState::from_partition(data, avg);
                    let beta = state.solve(overfit_penalty).unwrap_or_else(|| {
                        let mut constant = vec![0.0; data.num_linear_features() + 1];
                        *constant.last_mut().expect("coefficient vector is nonempty") = *weight;
                        constant
                    });
                    *ridge = Some(beta);
                }
                Ok(())
            }
            NodeKind::Split { .. } => Err(NodeError::InvalidNodeKind {
                accessor: "set_ridge_coefficients",
                required: "leaf",
            }),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::Array2;

    fn leaf(id: usize, weight: f64) -> Node {
        Node::leaf(vec![0, 1], vec![2, 3], id, weight)
    }

    #[test]
    fn leaf_accessors() {
        let node = leaf(1, 2.5);
        assert!(node.is_leaf());
        assert_eq!(node.node_id().unwrap(), 1);
        assert_eq!(node.weight().unwrap(), 2.5);
        assert_eq!(node.average_count().unwrap(), 2);
        assert_eq!(node.split_count().unwrap(), 2);
        assert_eq!(node.averaging_samples().unwrap().indices(), Some(&[0, 1][..]));
    }

    #[test]
    fn leaf_rejects_split_accessors() {
        let node = leaf(1, 2.5);
        assert!(node.split_feature().is_err());
        assert!(node.split_value().is_err());
        assert!(node.left_child().is_err());
        assert!(node.na_left_count().is_err());
    }

    #[test]
    fn split_accessors() {
        let node = Node::split(
            3,
            0.5,
            leaf(1, -1.0),
            leaf(2, 1.0),
            2,
            1,
            Some(NaDirection::Left),
        );
        assert!(!node.is_leaf());
        assert_eq!(node.split_feature().unwrap(), 3);
        assert_eq!(node.split_value().unwrap(), 0.5);
        assert_eq!(node.na_left_count().unwrap(), 2);
        assert_eq!(node.na_right_count().unwrap(), 1);
        assert_eq!(node.na_center_count().unwrap(), 0);
        assert_eq!(node.na_default_direction().unwrap(), Some(NaDirection::Left));
        assert_eq!(node.left_child().unwrap().weight().unwrap(), -1.0);
        assert_eq!(node.center_child().unwrap(), None);
        assert_eq!(node.left_split_value().unwrap(), None);
    }

    #[test]
    fn split_rejects_leaf_accessors() {
        let node = Node::split(0, 0.5, leaf(1, 0.0), leaf(2, 0.0), 0, 0, None);
        assert!(node.node_id().is_err());
        assert!(node.weight().is_err());
        assert!(node.average_count().is_err());
        assert!(node.ridge_coefficients().is_err());
    }

    #[test]
    fn average_count_always_sums_leaves() {
        let node = Node::split(0, 0.5, leaf(1, 0.0), leaf(2, 0.0), 0, 0, None);
        assert_eq!(node.average_count_always(), 4);
    }

    #[test]
    fn split_full_carries_trinary_fields() {
        let node = Node::split_full(
            2,
            1.0,
            Some(0.25),
            leaf(1, -1.0),
            leaf(3, 1.0),
            Some(leaf(2, 0.0)),
            1,
            2,
            3,
            Some(NaDirection::Right),
        );
        assert_eq!(node.left_split_value().unwrap(), Some(0.25));
        assert_eq!(node.na_center_count().unwrap(), 2);
        let center = node.center_child().unwrap().unwrap();
        assert_eq!(center.node_id().unwrap(), 2);
        // The center leaf participates in the recursive averaging count.
        assert_eq!(node.average_count_always(), 6);
    }

    #[test]
    fn reconstructed_leaf_exposes_counts_only() {
        let node = Node::leaf_from_counts(7, 9, 1, 0.25);
        assert_eq!(node.average_count().unwrap(), 7);
        assert_eq!(node.split_count().unwrap(), 9);
        assert_eq!(node.averaging_samples().unwrap().indices(), None);
    }

    #[test]
    fn na_direction_flags_round_trip() {
        for dir in [None, Some(NaDirection::Left), Some(NaDirection::Right)] {
            assert_eq!(NaDirection::from_flag(NaDirection::to_flag(dir)), dir);
        }
    }

    #[test]
    fn ridge_fit_length_matches_linear_features() {
        let x = Array2::from_shape_vec((4, 2), vec![1.0, 0.0, 2.0, 0.0, 3.0, 0.0, 4.0, 0.0])
            .unwrap();
        let data = TrainingData::new(x, vec![2.0, 4.0, 6.0, 8.0]).unwrap();
        let mut node = Node::leaf(vec![0, 1, 2, 3], vec![0, 1, 2, 3], 1, 5.0);
        node.set_ridge_coefficients(&data, 1e-6).unwrap();
        let beta = node.ridge_coefficients().unwrap().unwrap();
        assert_eq!(beta.len(), data.num_linear_features() + 1);
    }

    #[test]
    fn ridge_fit_on_split_is_invalid() {
        let x = Array2::from_shape_vec((2, 1), vec![1.0, 2.0]).unwrap();
        let data = TrainingData::new(x, vec![1.0, 2.0]).unwrap();
        let mut node = Node::split(0, 1.5, leaf(1, 0.0), leaf(2, 0.0), 0, 0, None);
        assert!(node.set_ridge_coefficients(&data, 1.0).is_err());
    }
}
