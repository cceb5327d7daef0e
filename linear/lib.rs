/*!
This crate is an implementation of linear regression with optional L1 and L2 regularization, which covers ordinary least squares, ridge, and lasso. There is a single model type, [`Regressor`](struct.Regressor.html).

Training uses cyclic coordinate descent on standardized features, minimizing

`(1 / 2n) * |y - Xw|² + l1 * |w|₁ + (l2 / 2) * |w|²`

The weights are converted back to the scale of the original features when training finishes, so predictions take unscaled features. Training is deterministic: the same features and labels always produce the same model.
*/

#![allow(clippy::tabs_in_doc_comments)]

use thiserror::Error;

mod early_stopping;
mod regressor;

pub use self::early_stopping::EarlyStoppingMonitor;
pub use self::regressor::Regressor;

/// These are the options passed to `Regressor::train`.
#[derive(Debug, Clone, PartialEq)]
pub struct TrainOptions {
	/// This is the L1 regularization value. A positive value drives small weights to exactly zero.
	pub l1_regularization: f64,
	/// This is the L2 regularization value. A positive value shrinks all weights toward zero.
	pub l2_regularization: f64,
	/// This is the maximum number of passes over all the features.
	pub max_epochs: usize,
	/// Training stops once the loss fails to decrease by at least this much for `n_epochs_without_improvement_to_stop` epochs in a row.
	pub min_decrease_in_loss_for_significant_change: f64,
	pub n_epochs_without_improvement_to_stop: usize,
}

impl Default for TrainOptions {
	fn default() -> Self {
		Self {
			l1_regularization: 0.0,
			l2_regularization: 0.0,
			max_epochs: 1000,
			min_decrease_in_loss_for_significant_change: 1e-12,
			n_epochs_without_improvement_to_stop: 2,
		}
	}
}

#[derive(Debug, Error, PartialEq)]
pub enum TrainError {
	#[error("cannot train on zero examples")]
	NoExamples,
	#[error("there are {n_features} rows of features but {n_labels} labels")]
	LengthMismatch { n_features: usize, n_labels: usize },
	#[error("feature {column} of example {row} is not a finite number")]
	NonFiniteFeature { row: usize, column: usize },
	#[error("the label of example {row} is not a finite number")]
	NonFiniteLabel { row: usize },
	#[error("regularization must be finite and non-negative")]
	InvalidRegularization,
}
