use crate::{
	binning::{compute_binned_features, compute_binning_instructions},
	regressor::predict_row,
	train_tree::{train_tree, TrainTreeInput},
	validate_labels, TrainError, Tree, TreeOptions,
};
use itertools::izip;
use ndarray::prelude::*;
use num_traits::ToPrimitive;
use rand::{seq::SliceRandom, Rng, SeedableRng};
use rand_xoshiro::Xoshiro256Plus;
use rayon::prelude::*;

/// These are the options passed to `Forest::train`.
#[derive(Debug, Clone, PartialEq)]
pub struct ForestTrainOptions {
	pub tree: TreeOptions,
	pub n_trees: usize,
	/// The fraction of features each tree may split on. At least one feature is always used.
	pub feature_fraction: f64,
	/// The seed for drawing each tree's bootstrap sample and features.
	pub seed: u64,
}

impl Default for ForestTrainOptions {
	fn default() -> Self {
		Self {
			tree: TreeOptions {
				max_depth: 12,
				min_examples_per_child: 1,
				..Default::default()
			},
			n_trees: 100,
			feature_fraction: 1.0,
			seed: 42,
		}
	}
}

/// A `Forest` averages the predictions of trees that are each trained on a bootstrap sample of the training examples.
#[derive(Debug, Clone)]
pub struct Forest {
	pub trees: Vec<Tree>,
}

impl Forest {
	/// Train a forest. Trees are trained in parallel, and each tree draws from its own random number generator, so the result depends only on the seed.
	pub fn train(
		features: ArrayView2<f64>,
		labels: ArrayView1<f64>,
		options: &ForestTrainOptions,
	) -> Result<Forest, TrainError> {
		let labels: Vec<f64> = labels.iter().copied().collect();
		validate_labels(features.nrows(), &labels)?;
		let n_examples = labels.len();
		let n_features = features.ncols();
		let binning_instructions = compute_binning_instructions(
			features,
			options.tree.max_valid_bins_for_number_features,
		);
		let binned_features = compute_binned_features(features, &binning_instructions);
		let n_features_per_tree = (options.feature_fraction * n_features.to_f64().unwrap_or(0.0))
			.round()
			.to_usize()
			.unwrap_or(n_features)
			.max(1)
			.min(n_features);
		let trees = (0..options.n_trees)
			.into_par_iter()
			.map(|tree_index| {
				let mut rng =
					Xoshiro256Plus::seed_from_u64(options.seed.wrapping_add(tree_index as u64));
				let examples: Vec<usize> = (0..n_examples)
					.map(|_| rng.gen_range(0, n_examples))
					.collect();
				let mut feature_indexes: Vec<usize> = (0..n_features).collect();
				feature_indexes.shuffle(&mut rng);
				feature_indexes.truncate(n_features_per_tree);
				feature_indexes.sort_unstable();
				train_tree(TrainTreeInput {
					binned_features: &binned_features,
					binning_instructions: &binning_instructions,
					targets: &labels,
					examples,
					feature_indexes: &feature_indexes,
					options: &options.tree,
				})
			})
			.collect();
		Ok(Forest { trees })
	}

	/// Write predictions into `predictions` for the input `features`. Each prediction is the mean of the trees' predictions.
	pub fn predict(&self, features: ArrayView2<f64>, mut predictions: ArrayViewMut1<f64>) {
		let n_trees = self.trees.len().to_f64().unwrap_or(f64::NAN);
		for (prediction, features) in izip!(predictions.iter_mut(), features.axis_iter(Axis(0))) {
			*prediction = self
				.trees
				.iter()
				.map(|tree| predict_row(tree, features))
				.sum::<f64>()
				/ n_trees;
		}
	}
}

#[test]
fn test_forest() {
	let features = Array2::from_shape_fn((60, 3), |(i, j)| match j {
		0 => i as f64,
		1 => (i % 7) as f64,
		_ => f64::NAN,
	});
	let labels = features.map_axis(Axis(1), |row| if row[0] < 30.0 { -2.0 } else { 2.0 });
	let options = ForestTrainOptions {
		n_trees: 20,
		..Default::default()
	};
	let forest = Forest::train(features.view(), labels.view(), &options).unwrap();
	assert_eq!(forest.trees.len(), 20);
	let mut predictions = Array1::zeros(60);
	forest.predict(features.view(), predictions.view_mut());
	// Rows near the step at 30 may be missing from many bootstrap samples.
	for (row, (prediction, label)) in izip!(predictions.iter(), labels.iter()).enumerate() {
		if row < 25 || row >= 35 {
			assert_eq!(prediction.signum(), label.signum());
		}
	}
	// The same seed always produces the same forest.
	let again = Forest::train(features.view(), labels.view(), &options).unwrap();
	assert_eq!(forest.trees, again.trees);
}
