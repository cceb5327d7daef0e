use super::{EarlyStoppingMonitor, TrainError, TrainOptions};
use itertools::izip;
use ndarray::prelude::*;
use num_traits::ToPrimitive;

/// This struct describes a linear regressor model. You can train one by calling `Regressor::train`.
#[derive(Debug, Clone)]
pub struct Regressor {
	pub bias: f64,
	pub weights: Array1<f64>,
	/// These are the mean values of each feature in the training set.
	pub means: Vec<f64>,
	/// These are the loss values for each epoch, computed on the standardized features.
	pub losses: Vec<f64>,
}

impl Regressor {
	/// Train a linear regressor.
	pub fn train(
		features: ArrayView2<f64>,
		labels: ArrayView1<f64>,
		options: &TrainOptions,
	) -> Result<Self, TrainError> {
		validate(features, labels, options)?;
		let n_examples = features.nrows().to_f64().unwrap_or(f64::NAN);
		let n_features = features.ncols();

		// Standardize each feature to zero mean and unit variance. Constant features are left at zero and keep a weight of zero.
		let means: Vec<f64> = features
			.axis_iter(Axis(1))
			.map(|column| column.sum() / n_examples)
			.collect();
		let std_devs: Vec<f64> = izip!(features.axis_iter(Axis(1)), means.iter())
			.map(|(column, mean)| {
				(column.iter().map(|value| (value - mean).powi(2)).sum::<f64>() / n_examples).sqrt()
			})
			.collect();
		let mut standardized = Array2::<f64>::zeros((features.nrows(), n_features).f());
		for (mut standardized_column, column, mean, std_dev) in izip!(
			standardized.axis_iter_mut(Axis(1)),
			features.axis_iter(Axis(1)),
			means.iter(),
			std_devs.iter(),
		) {
			if *std_dev > 0.0 {
				for (a, b) in izip!(standardized_column.iter_mut(), column.iter()) {
					*a = (b - mean) / std_dev;
				}
			}
		}
		let label_mean = labels.sum() / n_examples;
		let mut residuals = labels.mapv(|label| label - label_mean);

		let mut weights = Array1::<f64>::zeros(n_features);
		let mut losses = Vec::new();
		let mut early_stopping_monitor = EarlyStoppingMonitor::new(
			options.min_decrease_in_loss_for_significant_change,
			options.n_epochs_without_improvement_to_stop,
		);
		for _ in 0..options.max_epochs {
			for (feature_index, column) in standardized.axis_iter(Axis(1)).enumerate() {
				if std_devs[feature_index] == 0.0 {
					continue;
				}
				let weight = weights[feature_index];
				let rho = column.dot(&residuals) / n_examples + weight;
				let updated = soft_threshold(rho, options.l1_regularization)
					/ (1.0 + options.l2_regularization);
				let delta = updated - weight;
				if delta != 0.0 {
					residuals.scaled_add(-delta, &column);
					weights[feature_index] = updated;
				}
			}
			let loss = residuals.dot(&residuals) / (2.0 * n_examples)
				+ options.l1_regularization * weights.iter().map(|w| w.abs()).sum::<f64>()
				+ options.l2_regularization / 2.0 * weights.dot(&weights);
			losses.push(loss);
			if early_stopping_monitor.update(loss) {
				break;
			}
		}

		// Convert the weights back to the scale of the original features.
		let weights: Array1<f64> = izip!(weights.iter(), std_devs.iter())
			.map(|(weight, std_dev)| if *std_dev > 0.0 { weight / std_dev } else { 0.0 })
			.collect();
		let bias = label_mean
			- izip!(weights.iter(), means.iter())
				.map(|(weight, mean)| weight * mean)
				.sum::<f64>();
		Ok(Self {
			bias,
			weights,
			means,
			losses,
		})
	}

	/// Write predictions into `predictions` for the input `features`.
	pub fn predict(&self, features: ArrayView2<f64>, mut predictions: ArrayViewMut1<f64>) {
		predictions.fill(self.bias);
		ndarray::linalg::general_mat_vec_mul(1.0, &features, &self.weights, 1.0, &mut predictions);
	}
}

fn validate(
	features: ArrayView2<f64>,
	labels: ArrayView1<f64>,
	options: &TrainOptions,
) -> Result<(), TrainError> {
	if features.nrows() != labels.len() {
		return Err(TrainError::LengthMismatch {
			n_features: features.nrows(),
			n_labels: labels.len(),
		});
	}
	if features.nrows() == 0 {
		return Err(TrainError::NoExamples);
	}
	let regularization = [options.l1_regularization, options.l2_regularization];
	if regularization
		.iter()
		.any(|value| !value.is_finite() || *value < 0.0)
	{
		return Err(TrainError::InvalidRegularization);
	}
	if let Some(((row, column), _)) = features.indexed_iter().find(|(_, value)| !value.is_finite()) {
		return Err(TrainError::NonFiniteFeature { row, column });
	}
	if let Some(row) = labels.iter().position(|label| !label.is_finite()) {
		return Err(TrainError::NonFiniteLabel { row });
	}
	Ok(())
}

fn soft_threshold(value: f64, threshold: f64) -> f64 {
	if value > threshold {
		value - threshold
	} else if value < -threshold {
		value + threshold
	} else {
		0.0
	}
}

#[cfg(test)]
fn example() -> (Array2<f64>, Array1<f64>) {
	let features = arr2(&[
		[1.0, 0.0],
		[2.0, 1.0],
		[3.0, 0.0],
		[4.0, 1.0],
		[5.0, 0.0],
		[6.0, 1.0],
	]);
	let labels = features.map_axis(Axis(1), |row| 1.0 + 2.0 * row[0] - 3.0 * row[1]);
	(features, labels)
}

#[test]
fn test_ordinary_least_squares() {
	let (features, labels) = example();
	let model = Regressor::train(features.view(), labels.view(), &TrainOptions::default()).unwrap();
	assert!((model.bias - 1.0).abs() < 1e-4);
	assert!((model.weights[0] - 2.0).abs() < 1e-4);
	assert!((model.weights[1] + 3.0).abs() < 1e-4);
	let mut predictions = Array1::zeros(features.nrows());
	model.predict(features.view(), predictions.view_mut());
	for (prediction, label) in izip!(predictions.iter(), labels.iter()) {
		assert!((prediction - label).abs() < 1e-3);
	}
}

#[test]
fn test_regularization_shrinks_weights() {
	let (features, labels) = example();
	let ridge = Regressor::train(
		features.view(),
		labels.view(),
		&TrainOptions {
			l2_regularization: 1.0,
			..Default::default()
		},
	)
	.unwrap();
	assert!(ridge.weights[0].abs() < 2.0);
	let lasso = Regressor::train(
		features.view(),
		labels.view(),
		&TrainOptions {
			l1_regularization: 100.0,
			..Default::default()
		},
	)
	.unwrap();
	assert_eq!(lasso.weights, arr1(&[0.0, 0.0]));
	let mean = labels.sum() / labels.len() as f64;
	assert!((lasso.bias - mean).abs() < 1e-12);
}

#[test]
fn test_constant_feature() {
	let features = arr2(&[[1.0, 7.0], [2.0, 7.0], [3.0, 7.0]]);
	let labels = arr1(&[2.0, 4.0, 6.0]);
	let model = Regressor::train(features.view(), labels.view(), &TrainOptions::default()).unwrap();
	assert_eq!(model.weights[1], 0.0);
	assert!((model.weights[0] - 2.0).abs() < 1e-6);
}

#[test]
fn test_rejects_missing_values() {
	let features = arr2(&[[1.0], [f64::NAN]]);
	let labels = arr1(&[1.0, 2.0]);
	let result = Regressor::train(features.view(), labels.view(), &TrainOptions::default());
	assert_eq!(
		result.unwrap_err(),
		TrainError::NonFiniteFeature { row: 1, column: 0 }
	);
	let empty = Array2::<f64>::zeros((0, 1));
	let result = Regressor::train(
		empty.view(),
		Array1::zeros(0).view(),
		&TrainOptions::default(),
	);
	assert_eq!(result.unwrap_err(), TrainError::NoExamples);
}
