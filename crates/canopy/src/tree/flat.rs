//! Flat pre-order record of a tree and its reconstruction.
//!
//! The record flattens the tree into parallel vectors. Every node visit
//! consumes one entry of each per-node vector; leaves additionally consume a
//! second `var_ids` entry and one `weights` entry:
//!
//! - leaf: `var_ids` carries `-averaging_count` then `-splitting_count`,
//!   and the next `weights` entry is the leaf's prediction weight;
//! - split: `var_ids` carries `feature + 1` (1-based) and the per-node
//!   vectors carry the split value, the trinary left split value, NA counts
//!   (left, center, right), and the default NA direction.
//!
//! The trinary metadata rides in `left_split_vals` / `na_center_counts`
//! (0.0 and 0 at binary splits and leaves). Center children themselves have
//! no record encoding: the `var_ids` grammar is strictly two children per
//! split, and no kernel emits three-way partitions.
//!
//! Sample index vectors are stored 1-based. Pre-order recursion with a FIFO
//! cursor makes the reconstruction unambiguous.

use serde::{Deserialize, Serialize};

use crate::error::ReconstructError;
use crate::tree::node::{NaDirection, Node, NodeKind};
use crate::tree::{Tree, TreeParams};

// =============================================================================
// FlatTree
// =============================================================================

/// Pre-order flat record of one tree.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FlatTree {
    /// Node tags: `feature + 1` for splits, negative counts for leaves.
    pub var_ids: Vec<i32>,
    /// Split value per node record (0.0 placeholder at leaves).
    pub split_vals: Vec<f64>,
    /// Trinary left split value per node record (0.0 when absent).
    pub left_split_vals: Vec<f64>,
    /// NA observations routed left per node record.
    pub na_left_counts: Vec<i32>,
    /// NA observations routed to the center child per node record.
    pub na_center_counts: Vec<i32>,
    /// NA observations routed right per node record.
    pub na_right_counts: Vec<i32>,
    /// Default NA direction per node record: -1 left, +1 right, 0 unset.
    pub na_default_directions: Vec<i32>,
    /// Sampled averaging indices, 1-based.
    pub averaging_sample_index: Vec<usize>,
    /// Sampled splitting indices, 1-based.
    pub splitting_sample_index: Vec<usize>,
    /// Leaf prediction weights in pre-order leaf order.
    pub weights: Vec<f64>,
    /// Seed the tree was grown with.
    pub seed: u64,
}

impl Tree {
    /// Flatten the tree into its pre-order record.
    pub fn flatten(&self) -> FlatTree {
        let mut flat = FlatTree {
            var_ids: Vec::new(),
            split_vals: Vec::new(),
            left_split_vals: Vec::new(),
            na_left_counts: Vec::new(),
            na_center_counts: Vec::new(),
            na_right_counts: Vec::new(),
            na_default_directions: Vec::new(),
            averaging_sample_index: self.averaging_index().iter().map(|&i| i + 1).collect(),
            splitting_sample_index: self.splitting_index().iter().map(|&i| i + 1).collect(),
            weights: Vec::new(),
            seed: self.seed(),
        };
        write_node(self.root(), &mut flat);
        flat
    }

    /// Rebuild a tree from its flat record and the growth parameters.
    ///
    /// Leaf ids are reassigned by the same left-to-right counter growth
    /// uses, so terminal-node outputs match the original tree.
    pub fn reconstruct(params: TreeParams, flat: &FlatTree) -> Result<Tree, ReconstructError> {
        let mut cursor = Cursor {
            flat,
            var_pos: 0,
            node_pos: 0,
            weight_pos: 0,
            leaf_count: 0,
        };
        let root = cursor.read_node()?;
        if cursor.var_pos != flat.var_ids.len() {
            return Err(ReconstructError::TrailingEntries {
                remaining: flat.var_ids.len() - cursor.var_pos,
            });
        }

        let averaging: Vec<usize> = flat
            .averaging_sample_index
            .iter()
            .map(|&i| i - 1)
            .collect();
        let splitting: Vec<usize> = flat
            .splitting_sample_index
            .iter()
            .map(|&i| i - 1)
            .collect();

        Ok(Tree::from_parts(
            root,
            averaging,
            splitting,
            flat.seed,
            cursor.leaf_count,
            params,
        ))
    }
}

fn write_node(node: &Node, flat: &mut FlatTree) {
    match node.kind() {
        NodeKind::Leaf {
            averaging,
            splitting,
            weight,
            ..
        } => {
            flat.var_ids.push(-(averaging.len() as i32));
            flat.var_ids.push(-(splitting.len() as i32));
            flat.split_vals.push(0.0);
            flat.left_split_vals.push(0.0);
            flat.na_left_counts.push(0);
            flat.na_center_counts.push(0);
            flat.na_right_counts.push(0);
            flat.na_default_directions.push(0);
            flat.weights.push(*weight);
        }
        NodeKind::Split {
            feature,
            value,
            left_value,
            left,
            right,
            na_left,
            na_center,
            na_right,
            na_default,
            ..
        } => {
            flat.var_ids.push(*feature as i32 + 1);
            flat.split_vals.push(*value);
            flat.left_split_vals.push(left_value.unwrap_or(0.0));
            flat.na_left_counts.push(*na_left as i32);
            flat.na_center_counts.push(*na_center as i32);
            flat.na_right_counts.push(*na_right as i32);
            flat.na_default_directions.push(NaDirection::to_flag(*na_default));
            write_node(left, flat);
            write_node(right, flat);
        }
    }
}

// =============================================================================
// Cursor
// =============================================================================

struct Cursor<'a> {
    flat: &'a FlatTree,
    /// Position in `var_ids`.
    var_pos: usize,
    /// Position in the per-node vectors.
    node_pos: usize,
    /// Position in `weights`.
    weight_pos: usize,
    leaf_count: usize,
}

impl Cursor<'_> {
    fn next_var_id(&mut self) -> Result<i32, ReconstructError> {
        let id = self
            .flat
            .var_ids
            .get(self.var_pos)
            .copied()
            .ok_or(ReconstructError::Truncated { field: "var_ids" })?;
        self.var_pos += 1;
        Ok(id)
    }

    fn read_node(&mut self) -> Result<Node, ReconstructError> {
        let var_id = self.next_var_id()?;

        let split_val = self
            .flat
            .split_vals
            .get(self.node_pos)
            .copied()
            .ok_or(ReconstructError::Truncated { field: "split_vals" })?;
        let left_split_val = self
            .flat
            .left_split_vals
            .get(self.node_pos)
            .copied()
            .ok_or(ReconstructError::Truncated {
                field: "left_split_vals",
            })?;
        let na_left = self
            .flat
            .na_left_counts
            .get(self.node_pos)
            .copied()
            .ok_or(ReconstructError::Truncated {
                field: "na_left_counts",
            })?;
        let na_center = self
            .flat
            .na_center_counts
            .get(self.node_pos)
            .copied()
            .ok_or(ReconstructError::Truncated {
                field: "na_center_counts",
            })?;
        let na_right = self
            .flat
            .na_right_counts
            .get(self.node_pos)
            .copied()
            .ok_or(ReconstructError::Truncated {
                field: "na_right_counts",
            })?;
        let na_direction = self
            .flat
            .na_default_directions
            .get(self.node_pos)
            .copied()
            .ok_or(ReconstructError::Truncated {
                field: "na_default_directions",
            })?;
        self.node_pos += 1;

        if var_id < 0 {
            let averaging_count = var_id.unsigned_abs() as usize;
            let splitting_count = self.next_var_id()?.unsigned_abs() as usize;
            let weight = self
                .flat
                .weights
                .get(self.weight_pos)
                .copied()
                .ok_or(ReconstructError::Truncated { field: "weights" })?;
            self.weight_pos += 1;
            self.leaf_count += 1;
            Ok(Node::leaf_from_counts(
                averaging_count,
                splitting_count,
                self.leaf_count,
                weight,
            ))
        } else {
            let left = self.read_node()?;
            let right = self.read_node()?;
            // 0.0 is the "absent" placeholder for the trinary left value.
            let left_value = if left_split_val == 0.0 {
                None
            } else {
                Some(left_split_val)
            };
            Ok(Node::split_full(
                var_id as usize - 1,
                split_val,
                left_value,
                left,
                right,
                None,
                na_left as usize,
                na_center as usize,
                na_right as usize,
                NaDirection::from_flag(na_direction),
            ))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data::TrainingData;
    use crate::tree::PredictionRequest;
    use ndarray::Array2;

    fn ramp_tree(max_depth: usize, seed: u64) -> (TrainingData, Tree) {
        let n = 10;
        let x: Vec<f64> = (1..=n).map(|v| v as f64).collect();
        let y = x.clone();
        let data =
            TrainingData::new(Array2::from_shape_vec((n, 1), x).unwrap(), y).unwrap();
        let idx: Vec<usize> = (0..n).collect();
        let params = TreeParams {
            max_depth,
            ..TreeParams::default()
        };
        let tree = Tree::grow(&data, params, idx.clone(), idx, seed).unwrap();
        (data, tree)
    }

    #[test]
    fn depth_two_record_layout() {
        let (_, tree) = ramp_tree(2, 42);
        let flat = tree.flatten();
        // Split record, then two leaves of two var_id entries each.
        assert_eq!(flat.var_ids.len(), 5);
        assert_eq!(flat.var_ids[0], 1);
        assert!(flat.var_ids[1] < 0 && flat.var_ids[2] < 0);
        assert_eq!(flat.split_vals[0], 5.5);
        assert_eq!(flat.weights, vec![3.0, 8.0]);
        assert_eq!(flat.averaging_sample_index[0], 1);
        assert_eq!(flat.seed, 42);
        // Binary trees carry only placeholders in the trinary columns.
        assert_eq!(flat.left_split_vals, vec![0.0; 3]);
        assert_eq!(flat.na_center_counts, vec![0; 3]);
    }

    #[test]
    fn trinary_metadata_survives_the_round_trip() {
        // No kernel emits three-way partitions yet, so build the split
        // directly with a left split value and center NA count.
        let root = Node::split_full(
            0,
            5.0,
            Some(2.5),
            Node::leaf_from_counts(3, 3, 1, -1.0),
            Node::leaf_from_counts(4, 4, 2, 1.0),
            None,
            1,
            2,
            0,
            Some(NaDirection::Left),
        );
        let tree = Tree::from_parts(
            root,
            (0..7).collect(),
            (0..7).collect(),
            9,
            2,
            TreeParams::default(),
        );

        let flat = tree.flatten();
        assert_eq!(flat.left_split_vals[0], 2.5);
        assert_eq!(flat.na_center_counts[0], 2);

        let rebuilt = Tree::reconstruct(TreeParams::default(), &flat).unwrap();
        assert_eq!(rebuilt.root().left_split_value().unwrap(), Some(2.5));
        assert_eq!(rebuilt.root().na_center_count().unwrap(), 2);
        assert_eq!(rebuilt.flatten(), flat);
    }

    #[test]
    fn flatten_reconstruct_flatten_is_identity() {
        let (_, tree) = ramp_tree(4, 7);
        let flat = tree.flatten();
        let rebuilt = Tree::reconstruct(tree.params().clone(), &flat).unwrap();
        assert_eq!(rebuilt.flatten(), flat);
        assert_eq!(rebuilt.leaf_count(), tree.leaf_count());
    }

    #[test]
    fn reconstructed_tree_predicts_identically() {
        let (data, tree) = ramp_tree(4, 7);
        let rebuilt = Tree::reconstruct(tree.params().clone(), &tree.flatten()).unwrap();

        let x = Array2::from_shape_vec((3, 1), vec![2.5, 5.5, 9.0]).unwrap();
        let request = PredictionRequest {
            collect_terminal_nodes: true,
            ..Default::default()
        };
        let original = tree.predict(x.view(), &data, &request).unwrap();
        let roundtrip = rebuilt.predict(x.view(), &data, &request).unwrap();
        assert_eq!(original.values, roundtrip.values);
        assert_eq!(original.terminal_nodes, roundtrip.terminal_nodes);
    }

    #[test]
    fn identical_builds_have_identical_records() {
        let (_, a) = ramp_tree(4, 99);
        let (_, b) = ramp_tree(4, 99);
        assert_eq!(a.flatten(), b.flatten());
    }

    #[test]
    fn truncated_record_is_rejected() {
        let (_, tree) = ramp_tree(3, 42);
        let mut flat = tree.flatten();
        flat.var_ids.pop();
        assert!(matches!(
            Tree::reconstruct(tree.params().clone(), &flat),
            Err(ReconstructError::Truncated { .. })
        ));
    }

    #[test]
    fn trailing_entries_are_rejected() {
        let (_, tree) = ramp_tree(3, 42);
        let mut flat = tree.flatten();
        flat.var_ids.push(-1);
        assert!(matches!(
            Tree::reconstruct(tree.params().clone(), &flat),
            Err(ReconstructError::TrailingEntries { .. })
        ));
    }

    #[test]
    fn record_round_trips_through_json() {
        let (_, tree) = ramp_tree(3, 42);
        let flat = tree.flatten();
        let json = serde_json::to_string(&flat).unwrap();
        let parsed: FlatTree = serde_json::from_str(&json).unwrap();
        assert_eq!(parsed, flat);
    }

    #[test]
    fn na_metadata_survives_the_round_trip() {
        let mut x: Vec<f64> = (1..=10).map(|v| v as f64).collect();
        x[5] = f64::NAN;
        let y: Vec<f64> = (1..=10).map(|v| v as f64).collect();
        let data =
            TrainingData::new(Array2::from_shape_vec((10, 1), x).unwrap(), y).unwrap();
        let idx: Vec<usize> = (0..10).collect();
        let params = TreeParams {
            max_depth: 2,
            has_nas: true,
            na_direction: true,
            ..TreeParams::default()
        };
        let tree = Tree::grow(&data, params, idx.clone(), idx, 42).unwrap();
        let rebuilt = Tree::reconstruct(tree.params().clone(), &tree.flatten()).unwrap();
        assert_eq!(
            rebuilt.root().na_default_direction().unwrap(),
            tree.root().na_default_direction().unwrap()
        );
        assert_eq!(
            rebuilt.root().na_left_count().unwrap(),
            tree.root().na_left_count().unwrap()
        );
    }
}
