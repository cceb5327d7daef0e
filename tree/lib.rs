/*!
This crate implements regression models built from binned decision trees: a gradient boosted [`Regressor`](struct.Regressor.html) and a bagged [`Forest`](struct.Forest.html). Both share the same single tree trainer, which fits a tree to a target by greedily choosing the split with the largest reduction in squared error.

Features are `f64` values where `NaN` marks a missing value. Before training, each feature's values are sorted into at most `max_valid_bins_for_number_features` bins, and missing values get their own bin, so missing values never cause training to fail. Each split learns which direction missing values should be sent.
*/

#![allow(clippy::tabs_in_doc_comments)]

use thiserror::Error;

mod binning;
mod forest;
mod regressor;
mod train_tree;

pub use self::forest::{Forest, ForestTrainOptions};
pub use self::regressor::Regressor;

/// These are the options that control the shape of each tree.
#[derive(Debug, Clone, PartialEq)]
pub struct TreeOptions {
	/// This option sets the L2 regularization value, which shrinks leaf values toward zero.
	pub l2_regularization: f64,
	/// The depth of a single tree will never exceed this value.
	pub max_depth: usize,
	/// When computing the bin thresholds for number features, this is the maximum number of bins for valid values to create. It must be between 2 and 255.
	pub max_valid_bins_for_number_features: usize,
	/// A split will only be considered valid if the number of training examples sent to each of the resulting children is at least this value.
	pub min_examples_per_child: usize,
	/// A node will only be split if the best split achieves at least this minimum gain.
	pub min_gain_to_split: f64,
}

impl Default for TreeOptions {
	fn default() -> Self {
		Self {
			l2_regularization: 0.0,
			max_depth: 5,
			max_valid_bins_for_number_features: 255,
			min_examples_per_child: 20,
			min_gain_to_split: 0.0,
		}
	}
}

/// These are the options passed to `Regressor::train`.
#[derive(Debug, Clone, PartialEq)]
pub struct TrainOptions {
	pub tree: TreeOptions,
	/// The learning rate scales the leaf values to control the effect each tree has on the output.
	pub learning_rate: f64,
	/// This is the number of rounds of training. One tree is trained per round.
	pub max_rounds: usize,
}

impl Default for TrainOptions {
	fn default() -> Self {
		Self {
			tree: TreeOptions::default(),
			learning_rate: 0.1,
			max_rounds: 100,
		}
	}
}

#[derive(Debug, Error, PartialEq)]
pub enum TrainError {
	#[error("cannot train on zero examples")]
	NoExamples,
	#[error("there are {n_features} rows of features but {n_labels} labels")]
	LengthMismatch { n_features: usize, n_labels: usize },
	#[error("the label of example {row} is not a finite number")]
	NonFiniteLabel { row: usize },
}

/// Trees are stored as a `Vec` of `Node`s. Each branch in the tree has two indexes into the `Vec`, one for each of its children. The root is the first node.
#[derive(Debug, Clone, PartialEq)]
pub struct Tree {
	pub nodes: Vec<Node>,
}

impl Tree {
	/// Make a prediction for a given example.
	pub fn predict(&self, features: &[f64]) -> f64 {
		// Start at the root node.
		let mut node_index = 0;
		// Traverse the tree until we get to a leaf.
		loop {
			match &self.nodes[node_index] {
				Node::Branch(BranchNode {
					left_child_index,
					right_child_index,
					split,
				}) => {
					node_index = match split.direction(features[split.feature_index]) {
						SplitDirection::Left => *left_child_index,
						SplitDirection::Right => *right_child_index,
					};
				}
				Node::Leaf(LeafNode { value, .. }) => return *value,
			}
		}
	}
}

/// A node is either a branch or a leaf.
#[derive(Debug, Clone, PartialEq)]
pub enum Node {
	Branch(BranchNode),
	Leaf(LeafNode),
}

/// A `BranchNode` is a branch in a tree.
#[derive(Debug, Clone, PartialEq)]
pub struct BranchNode {
	pub left_child_index: usize,
	pub right_child_index: usize,
	pub split: BranchSplit,
}

/// A split takes the value of a single feature, compares it with a `split_value`, and if the value is <= `split_value`, the example is sent left, and if it is > `split_value`, it is sent right. Missing values are sent in `invalid_values_direction`.
#[derive(Debug, Clone, PartialEq)]
pub struct BranchSplit {
	pub feature_index: usize,
	pub split_value: f64,
	pub invalid_values_direction: SplitDirection,
}

impl BranchSplit {
	pub fn direction(&self, value: f64) -> SplitDirection {
		if value.is_nan() {
			self.invalid_values_direction
		} else if value <= self.split_value {
			SplitDirection::Left
		} else {
			SplitDirection::Right
		}
	}
}

#[derive(Clone, Copy, Debug, PartialEq)]
pub enum SplitDirection {
	Left,
	Right,
}

/// The leaves in a tree hold the values to output for examples that get sent to them.
#[derive(Debug, Clone, PartialEq)]
pub struct LeafNode {
	pub value: f64,
	/// The number of training examples that reached this leaf.
	pub n_examples: usize,
}

pub(crate) fn validate_labels(
	n_examples: usize,
	labels: &[f64],
) -> Result<(), TrainError> {
	if n_examples != labels.len() {
		return Err(TrainError::LengthMismatch {
			n_features: n_examples,
			n_labels: labels.len(),
		});
	}
	if n_examples == 0 {
		return Err(TrainError::NoExamples);
	}
	if let Some(row) = labels.iter().position(|label| !label.is_finite()) {
		return Err(TrainError::NonFiniteLabel { row });
	}
	Ok(())
}

#[test]
fn test_tree_predict() {
	let tree = Tree {
		nodes: vec![
			Node::Branch(BranchNode {
				left_child_index: 1,
				right_child_index: 2,
				split: BranchSplit {
					feature_index: 1,
					split_value: 0.5,
					invalid_values_direction: SplitDirection::Right,
				},
			}),
			Node::Leaf(LeafNode {
				value: -1.0,
				n_examples: 3,
			}),
			Node::Leaf(LeafNode {
				value: 1.0,
				n_examples: 2,
			}),
		],
	};
	assert_eq!(tree.predict(&[9.0, 0.5]), -1.0);
	assert_eq!(tree.predict(&[9.0, 0.6]), 1.0);
	assert_eq!(tree.predict(&[9.0, f64::NAN]), 1.0);
}
