use crate::{
	binning::{compute_binned_features, compute_binning_instructions},
	train_tree::{train_tree, TrainTreeInput},
	validate_labels, TrainError, TrainOptions, Tree,
};
use itertools::izip;
use ndarray::prelude::*;
use num_traits::ToPrimitive;

/// `Regressor`s are gradient boosted ensembles of trees trained on squared error. Each tree is fit to the residuals of the trees before it.
#[derive(Debug, Clone)]
pub struct Regressor {
	/// The initial prediction of the model given no trained trees. The bias is calculated using the mean value of the target column in the training dataset.
	pub bias: f64,
	/// The trees for this model.
	pub trees: Vec<Tree>,
	/// The training losses in each round of training this model.
	pub losses: Vec<f64>,
}

impl Regressor {
	/// Train a regressor.
	pub fn train(
		features: ArrayView2<f64>,
		labels: ArrayView1<f64>,
		options: &TrainOptions,
	) -> Result<Regressor, TrainError> {
		let labels: Vec<f64> = labels.iter().copied().collect();
		validate_labels(features.nrows(), &labels)?;
		let n_examples = labels.len();
		let binning_instructions = compute_binning_instructions(
			features,
			options.tree.max_valid_bins_for_number_features,
		);
		let binned_features = compute_binned_features(features, &binning_instructions);
		let feature_indexes: Vec<usize> = (0..features.ncols()).collect();
		let bias = labels.iter().sum::<f64>() / n_examples.to_f64().unwrap_or(f64::NAN);
		let mut predictions = vec![bias; n_examples];
		let mut residuals = vec![0.0; n_examples];
		let mut trees = Vec::with_capacity(options.max_rounds);
		let mut losses = Vec::with_capacity(options.max_rounds);
		for _ in 0..options.max_rounds {
			for (residual, label, prediction) in
				izip!(residuals.iter_mut(), labels.iter(), predictions.iter())
			{
				*residual = label - prediction;
			}
			let mut tree = train_tree(TrainTreeInput {
				binned_features: &binned_features,
				binning_instructions: &binning_instructions,
				targets: &residuals,
				examples: (0..n_examples).collect(),
				feature_indexes: &feature_indexes,
				options: &options.tree,
			});
			tree.scale_leaves(options.learning_rate);
			for (prediction, features) in izip!(predictions.iter_mut(), features.axis_iter(Axis(0)))
			{
				*prediction += predict_row(&tree, features);
			}
			trees.push(tree);
			losses.push(compute_loss(&labels, &predictions));
		}
		Ok(Regressor {
			bias,
			trees,
			losses,
		})
	}

	/// Write predictions into `predictions` for the input `features`.
	pub fn predict(&self, features: ArrayView2<f64>, mut predictions: ArrayViewMut1<f64>) {
		predictions.fill(self.bias);
		for (prediction, features) in izip!(predictions.iter_mut(), features.axis_iter(Axis(0))) {
			for tree in &self.trees {
				*prediction += predict_row(tree, features);
			}
		}
	}
}

impl Tree {
	fn scale_leaves(&mut self, factor: f64) {
		for node in self.nodes.iter_mut() {
			if let crate::Node::Leaf(leaf) = node {
				leaf.value *= factor;
			}
		}
	}
}

pub(crate) fn predict_row(tree: &Tree, features: ArrayView1<f64>) -> f64 {
	match features.as_slice() {
		Some(features) => tree.predict(features),
		None => tree.predict(&features.to_vec()),
	}
}

/// Half the mean squared error, the loss minimized by gradient boosting.
fn compute_loss(labels: &[f64], predictions: &[f64]) -> f64 {
	let mut loss = 0.0;
	for (label, prediction) in labels.iter().zip(predictions) {
		loss += 0.5 * (label - prediction).powi(2);
	}
	loss / labels.len().to_f64().unwrap_or(f64::NAN)
}

#[test]
fn test_regressor() {
	let features = Array2::from_shape_fn((40, 2), |(i, j)| {
		if j == 0 {
			i as f64
		} else if i % 4 == 0 {
			f64::NAN
		} else {
			(i % 3) as f64
		}
	});
	let labels = features.map_axis(Axis(1), |row| if row[0] < 20.0 { 1.0 } else { 3.0 });
	let options = TrainOptions {
		max_rounds: 50,
		tree: crate::TreeOptions {
			min_examples_per_child: 2,
			..Default::default()
		},
		..Default::default()
	};
	let model = Regressor::train(features.view(), labels.view(), &options).unwrap();
	assert_eq!(model.bias, 2.0);
	assert_eq!(model.trees.len(), 50);
	assert!(model.losses.windows(2).all(|pair| pair[1] <= pair[0]));
	let mut predictions = Array1::zeros(40);
	model.predict(features.view(), predictions.view_mut());
	for (prediction, label) in izip!(predictions.iter(), labels.iter()) {
		assert!((prediction - label).abs() < 0.01);
	}
}

#[test]
fn test_regressor_rejects_missing_labels() {
	let features = arr2(&[[1.0], [2.0]]);
	let labels = arr1(&[1.0, f64::NAN]);
	let result = Regressor::train(features.view(), labels.view(), &TrainOptions::default());
	assert_eq!(result.unwrap_err(), TrainError::NonFiniteLabel { row: 1 });
}
