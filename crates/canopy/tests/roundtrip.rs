//! Flat-record round trips and bytewise determinism on multi-feature trees.

use canopy::testing::{random_features, synthetic_regression};
use canopy::{PredictionRequest, Tree, TreeParams};

fn grown_tree(seed: u64) -> (canopy::TrainingData, Tree) {
    let data = synthetic_regression(150, &[1.5, -2.0, 0.5], 0.1, 7);
    let rows: Vec<usize> = (0..150).collect();
    let params = TreeParams {
        mtry: 2,
        max_depth: 6,
        min_node_size_to_split_spt: 5,
        min_node_size_to_split_avg: 5,
        ..TreeParams::default()
    };
    let tree = Tree::grow(&data, params, rows.clone(), rows, seed).unwrap();
    (data, tree)
}

#[test]
fn flatten_reconstruct_is_identity_on_the_record() {
    let (_, tree) = grown_tree(42);
    let flat = tree.flatten();
    let rebuilt = Tree::reconstruct(tree.params().clone(), &flat).unwrap();
    assert_eq!(rebuilt.flatten(), flat);
}

#[test]
fn reconstructed_tree_predicts_identically_on_random_input() {
    let (data, tree) = grown_tree(42);
    let rebuilt = Tree::reconstruct(tree.params().clone(), &tree.flatten()).unwrap();

    let x_new = random_features(40, 3, 99, -1.5, 1.5);
    let request = PredictionRequest {
        collect_terminal_nodes: true,
        ..Default::default()
    };
    let original = tree.predict(x_new.view(), &data, &request).unwrap();
    let roundtrip = rebuilt.predict(x_new.view(), &data, &request).unwrap();

    assert_eq!(original.values, roundtrip.values);
    assert_eq!(original.terminal_nodes, roundtrip.terminal_nodes);
}

#[test]
fn identical_builds_are_bytewise_equal() {
    let (_, a) = grown_tree(13);
    let (_, b) = grown_tree(13);
    let bytes_a = serde_json::to_vec(&a.flatten()).unwrap();
    let bytes_b = serde_json::to_vec(&b.flatten()).unwrap();
    assert_eq!(bytes_a, bytes_b);
}

#[test]
fn flat_record_book_keeping_is_consistent() {
    let (_, tree) = grown_tree(42);
    let flat = tree.flatten();

    // One weight per leaf, two var_ids per leaf and one per split.
    let leaves = flat.weights.len();
    assert_eq!(leaves, tree.leaf_count());
    let splits = leaves - 1;
    assert_eq!(flat.var_ids.len(), 2 * leaves + splits);
    assert_eq!(flat.split_vals.len(), leaves + splits);
    assert_eq!(flat.left_split_vals.len(), leaves + splits);
    assert_eq!(flat.na_left_counts.len(), leaves + splits);
    assert_eq!(flat.na_center_counts.len(), leaves + splits);
    assert_eq!(flat.na_right_counts.len(), leaves + splits);
    assert_eq!(flat.na_default_directions.len(), leaves + splits);

    // Sample indices are 1-based.
    assert!(flat.averaging_sample_index.iter().all(|&i| i >= 1));
    assert!(flat.splitting_sample_index.iter().all(|&i| i >= 1));
}

#[test]
fn leaves_respect_depth_and_size_invariants() {
    let (_, tree) = grown_tree(42);
    let params = tree.params().clone();

    fn check(node: &canopy::Node, depth: usize, params: &TreeParams) {
        if node.is_leaf() {
            assert!(depth <= params.max_depth, "leaf at depth {depth}");
            assert!(node.average_count().unwrap() >= 1);
            assert!(node.split_count().unwrap() >= 1);
        } else {
            // Children of a kept split respect the to-split minimums.
            for child in [node.left_child().unwrap(), node.right_child().unwrap()] {
                if child.is_leaf() {
                    assert!(
                        child.split_count().unwrap() >= params.min_node_size_to_split_spt
                    );
                    assert!(
                        child.average_count().unwrap() >= params.min_node_size_to_split_avg
                    );
                }
                check(child, depth + 1, params);
            }
        }
    }
    check(tree.root(), 1, &params);
}
