use crate::{
	binning::BinningInstruction, BranchNode, BranchSplit, LeafNode, Node, SplitDirection, Tree,
	TreeOptions,
};
use num_traits::ToPrimitive;

/// The data a single tree is trained on. `targets` are the values the tree's leaves should predict. `examples` may contain an index more than once, which gives that example more weight.
pub struct TrainTreeInput<'a> {
	pub binned_features: &'a [Vec<u8>],
	pub binning_instructions: &'a [BinningInstruction],
	pub targets: &'a [f64],
	pub examples: Vec<usize>,
	/// The indexes of the features the tree may split on.
	pub feature_indexes: &'a [usize],
	pub options: &'a TreeOptions,
}

/// The sum of targets and the number of examples in a node or bin.
#[derive(Clone, Copy, Debug, Default, PartialEq)]
struct BinStats {
	sum: f64,
	count: usize,
}

impl BinStats {
	fn add(&mut self, other: BinStats) {
		self.sum += other.sum;
		self.count += other.count;
	}

	fn minus(self, other: BinStats) -> BinStats {
		BinStats {
			sum: self.sum - other.sum,
			count: self.count - other.count,
		}
	}

	/// The reduction in squared error from predicting this node's regularized mean instead of zero.
	fn score(&self, l2_regularization: f64) -> f64 {
		let denominator = self.count.to_f64().unwrap_or(f64::NAN) + l2_regularization;
		if denominator > 0.0 {
			self.sum * self.sum / denominator
		} else {
			0.0
		}
	}

	fn leaf_value(&self, l2_regularization: f64) -> f64 {
		let denominator = self.count.to_f64().unwrap_or(f64::NAN) + l2_regularization;
		if denominator > 0.0 {
			self.sum / denominator
		} else {
			0.0
		}
	}
}

#[derive(Debug)]
struct BestSplit {
	feature_index: usize,
	/// Examples in valid bins up to and including this bin are sent left.
	split_bin: usize,
	invalid_values_direction: SplitDirection,
}

/// Train a tree that fits `targets` by choosing, at each node, the split with the largest reduction in squared error.
pub fn train_tree(input: TrainTreeInput) -> Tree {
	let mut nodes = Vec::new();
	let examples = input.examples.clone();
	grow(&input, &mut nodes, examples, 0);
	Tree { nodes }
}

fn grow(input: &TrainTreeInput, nodes: &mut Vec<Node>, examples: Vec<usize>, depth: usize) -> usize {
	let options = input.options;
	let mut stats = BinStats::default();
	for example in examples.iter() {
		stats.add(BinStats {
			sum: input.targets[*example],
			count: 1,
		});
	}
	let node_index = nodes.len();
	let min_examples_per_child = options.min_examples_per_child.max(1);
	let best_split = if depth < options.max_depth && examples.len() >= 2 * min_examples_per_child {
		choose_best_split(input, &examples, stats)
	} else {
		None
	};
	let best_split = match best_split {
		Some(best_split) => best_split,
		None => {
			nodes.push(Node::Leaf(LeafNode {
				value: stats.leaf_value(options.l2_regularization),
				n_examples: examples.len(),
			}));
			return node_index;
		}
	};
	// Reserve this node's slot. It is replaced with the branch once the children have been grown.
	nodes.push(Node::Leaf(LeafNode {
		value: 0.0,
		n_examples: 0,
	}));
	let binned_feature = &input.binned_features[best_split.feature_index];
	let (left_examples, right_examples): (Vec<usize>, Vec<usize>) =
		examples.into_iter().partition(|example| {
			bin_direction(
				binned_feature[*example],
				best_split.split_bin,
				best_split.invalid_values_direction,
			) == SplitDirection::Left
		});
	let left_child_index = grow(input, nodes, left_examples, depth + 1);
	let right_child_index = grow(input, nodes, right_examples, depth + 1);
	let thresholds = &input.binning_instructions[best_split.feature_index].thresholds;
	nodes[node_index] = Node::Branch(BranchNode {
		left_child_index,
		right_child_index,
		split: BranchSplit {
			feature_index: best_split.feature_index,
			split_value: thresholds[best_split.split_bin - 1],
			invalid_values_direction: best_split.invalid_values_direction,
		},
	});
	node_index
}

fn bin_direction(
	bin: u8,
	split_bin: usize,
	invalid_values_direction: SplitDirection,
) -> SplitDirection {
	match bin {
		0 => invalid_values_direction,
		bin if (bin as usize) <= split_bin => SplitDirection::Left,
		_ => SplitDirection::Right,
	}
}

fn choose_best_split(
	input: &TrainTreeInput,
	examples: &[usize],
	node_stats: BinStats,
) -> Option<BestSplit> {
	let options = input.options;
	let l2 = options.l2_regularization;
	let min_examples_per_child = options.min_examples_per_child.max(1);
	let node_score = node_stats.score(l2);
	let mut best_split: Option<BestSplit> = None;
	let mut best_gain = options.min_gain_to_split;
	for feature_index in input.feature_indexes.iter().copied() {
		let instruction = &input.binning_instructions[feature_index];
		let binned_feature = &input.binned_features[feature_index];
		let mut bin_stats = vec![BinStats::default(); instruction.n_bins()];
		for example in examples.iter() {
			bin_stats[binned_feature[*example] as usize].add(BinStats {
				sum: input.targets[*example],
				count: 1,
			});
		}
		for invalid_values_direction in [SplitDirection::Left, SplitDirection::Right].iter() {
			let mut left = match invalid_values_direction {
				SplitDirection::Left => bin_stats[0],
				SplitDirection::Right => BinStats::default(),
			};
			// The last valid bin cannot be a split point because every valid value would be sent left.
			for split_bin in 1..instruction.n_valid_bins() {
				left.add(bin_stats[split_bin]);
				let right = node_stats.minus(left);
				if left.count < min_examples_per_child || right.count < min_examples_per_child {
					continue;
				}
				let gain = left.score(l2) + right.score(l2) - node_score;
				if gain > best_gain {
					best_gain = gain;
					best_split = Some(BestSplit {
						feature_index,
						split_bin,
						invalid_values_direction: *invalid_values_direction,
					});
				}
			}
			// Without missing values in this node both directions give the same splits.
			if bin_stats[0].count == 0 {
				break;
			}
		}
	}
	best_split
}

#[cfg(test)]
fn train_example(options: &TreeOptions) -> Tree {
	use crate::binning::{compute_binned_features, compute_binning_instructions};
	use ndarray::prelude::*;
	let features = arr2(&[
		[1.0, 0.0],
		[2.0, 1.0],
		[3.0, 0.0],
		[4.0, 1.0],
		[f64::NAN, 0.0],
		[f64::NAN, 1.0],
	]);
	let targets = [1.0, 1.0, 5.0, 5.0, 5.0, 5.0];
	let binning_instructions = compute_binning_instructions(features.view(), 255);
	let binned_features = compute_binned_features(features.view(), &binning_instructions);
	train_tree(TrainTreeInput {
		binned_features: &binned_features,
		binning_instructions: &binning_instructions,
		targets: &targets,
		examples: (0..6).collect(),
		feature_indexes: &[0, 1],
		options,
	})
}

#[test]
fn test_train_tree() {
	let options = TreeOptions {
		min_examples_per_child: 1,
		..Default::default()
	};
	let tree = train_example(&options);
	insta::assert_debug_snapshot!(tree, @r###"
 Tree {
     nodes: [
         Branch(
             BranchNode {
                 left_child_index: 1,
                 right_child_index: 2,
                 split: BranchSplit {
                     feature_index: 0,
                     split_value: 2.5,
                     invalid_values_direction: Right,
                 },
             },
         ),
         Leaf(
             LeafNode {
                 value: 1.0,
                 n_examples: 2,
             },
         ),
         Leaf(
             LeafNode {
                 value: 5.0,
                 n_examples: 4,
             },
         ),
     ],
 }
 "###);
	assert_eq!(tree.predict(&[f64::NAN, 0.0]), 5.0);
}

#[test]
fn test_train_tree_respects_limits() {
	let options = TreeOptions {
		min_examples_per_child: 1,
		max_depth: 0,
		..Default::default()
	};
	let tree = train_example(&options);
	assert_eq!(
		tree.nodes,
		vec![Node::Leaf(LeafNode {
			value: 22.0 / 6.0,
			n_examples: 6,
		})]
	);
	let options = TreeOptions {
		min_examples_per_child: 1,
		l2_regularization: 2.0,
		..Default::default()
	};
	let tree = train_example(&options);
	assert_eq!(tree.predict(&[1.0, 0.0]), 2.0 / 4.0);
}
