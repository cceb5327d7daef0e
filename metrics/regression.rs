use super::{mean_variance::MeanVariance, Metric, StreamingMetric};
use ndarray::prelude::*;
use num_traits::ToPrimitive;

/**
`RegressionMetrics` accumulates the errors between predictions and labels along with the running means and variances of both, so that all of its outputs can be produced from a single pass over the data. Partial results computed on separate chunks can be combined with `merge()`.
*/
#[derive(Debug, Clone, Default)]
pub struct RegressionMetrics {
	labels: MeanVariance,
	predictions: MeanVariance,
	/// The sum of products of deviations from the label and prediction means.
	comoment: f64,
	absolute_error: f64,
	squared_error: f64,
}

pub struct RegressionMetricsInput<'a> {
	pub predictions: ArrayView1<'a, f64>,
	pub labels: ArrayView1<'a, f64>,
}

/**
| field           | definition                          |
|-----------------|-------------------------------------|
| `mse`           | mean of (prediction - label)²       |
| `rmse`          | √mse                                |
| `mae`           | mean of abs(prediction - label)     |
| `r2`            | 1 - SSE / SST                       |
| `pearson_r`     | cov(prediction, label) / (σp σl)    |
| `baseline_rmse` | rmse of always predicting the mean  |

`r2` is `NaN` when the labels have zero variance and `pearson_r` is `NaN` when either the labels or the predictions do. Every field is `NaN` for empty input.
*/
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RegressionMetricsOutput {
	pub mse: f64,
	pub rmse: f64,
	pub mae: f64,
	pub r2: f64,
	pub pearson_r: f64,
	pub baseline_rmse: f64,
}

impl RegressionMetrics {
	pub fn new() -> Self {
		Self::default()
	}
}

impl<'a> StreamingMetric<'a> for RegressionMetrics {
	type Input = RegressionMetricsInput<'a>;
	type Output = RegressionMetricsOutput;

	fn update(&mut self, input: Self::Input) {
		let RegressionMetricsInput {
			predictions,
			labels,
		} = input;
		for (prediction, label) in predictions.iter().zip(labels.iter()) {
			let previous_prediction_mean = self.predictions.mean;
			self.predictions.update(*prediction);
			self.labels.update(*label);
			self.comoment += (prediction - previous_prediction_mean) * (label - self.labels.mean);
			let error = prediction - label;
			self.absolute_error += error.abs();
			self.squared_error += error * error;
		}
	}

	fn merge(&mut self, other: Self) {
		let n_a = self.labels.n.to_f64().unwrap_or(0.0);
		let n_b = other.labels.n.to_f64().unwrap_or(0.0);
		if n_a + n_b > 0.0 {
			self.comoment += other.comoment
				+ (other.predictions.mean - self.predictions.mean)
					* (other.labels.mean - self.labels.mean)
					* (n_a * n_b / (n_a + n_b));
		}
		self.labels.merge(other.labels);
		self.predictions.merge(other.predictions);
		self.absolute_error += other.absolute_error;
		self.squared_error += other.squared_error;
	}

	fn finalize(self) -> Self::Output {
		let n = self.labels.n.to_f64().unwrap_or(0.0);
		if n == 0.0 {
			return RegressionMetricsOutput {
				mse: f64::NAN,
				rmse: f64::NAN,
				mae: f64::NAN,
				r2: f64::NAN,
				pearson_r: f64::NAN,
				baseline_rmse: f64::NAN,
			};
		}
		let mse = self.squared_error / n;
		let mae = self.absolute_error / n;
		let r2 = if self.labels.m2 > 0.0 {
			1.0 - self.squared_error / self.labels.m2
		} else {
			f64::NAN
		};
		let pearson_r = if self.labels.m2 > 0.0 && self.predictions.m2 > 0.0 {
			(self.comoment / (self.labels.m2 * self.predictions.m2).sqrt()).max(-1.0).min(1.0)
		} else {
			f64::NAN
		};
		RegressionMetricsOutput {
			mse,
			rmse: mse.sqrt(),
			mae,
			r2,
			pearson_r,
			baseline_rmse: self.labels.variance().sqrt(),
		}
	}
}

impl<'a> Metric<'a> for RegressionMetrics {
	type Input = RegressionMetricsInput<'a>;
	type Output = RegressionMetricsOutput;

	fn compute(input: Self::Input) -> Self::Output {
		let mut metrics = RegressionMetrics::new();
		metrics.update(input);
		metrics.finalize()
	}
}

#[cfg(test)]
fn assert_close(a: f64, b: f64) {
	assert!((a - b).abs() < 1e-9, "{} != {}", a, b);
}

#[test]
fn test_regression_metrics() {
	let labels = arr1(&[1.0, 2.0, 3.0, 4.0]);
	let predictions = arr1(&[1.5, 1.5, 3.5, 3.5]);
	let output = RegressionMetrics::compute(RegressionMetricsInput {
		predictions: predictions.view(),
		labels: labels.view(),
	});
	assert_close(output.mse, 0.25);
	assert_close(output.rmse, 0.5);
	assert_close(output.mae, 0.5);
	// SST is 5 and SSE is 1.
	assert_close(output.r2, 0.8);
	// cov is 4 and the sums of squares are 5 and 4.
	assert_close(output.pearson_r, 4.0 / 20.0f64.sqrt());
	assert_close(output.baseline_rmse, 1.25f64.sqrt());
}

#[test]
fn test_mae_uses_absolute_errors() {
	let labels = arr1(&[0.0, 0.0]);
	let predictions = arr1(&[1.0, -1.0]);
	let output = RegressionMetrics::compute(RegressionMetricsInput {
		predictions: predictions.view(),
		labels: labels.view(),
	});
	assert_close(output.mae, 1.0);
	assert!(output.r2.is_nan());
	assert!(output.pearson_r.is_nan());
}

#[test]
fn test_merge_matches_single_pass() {
	let labels = arr1(&[3.0, -1.0, 2.5, 7.0, 0.5, 4.0]);
	let predictions = arr1(&[2.5, 0.0, 2.0, 8.0, 1.0, 3.0]);
	let full = RegressionMetrics::compute(RegressionMetricsInput {
		predictions: predictions.view(),
		labels: labels.view(),
	});
	let mut left = RegressionMetrics::new();
	left.update(RegressionMetricsInput {
		predictions: predictions.slice(s![..2]),
		labels: labels.slice(s![..2]),
	});
	let mut right = RegressionMetrics::new();
	right.update(RegressionMetricsInput {
		predictions: predictions.slice(s![2..]),
		labels: labels.slice(s![2..]),
	});
	left.merge(right);
	let merged = left.finalize();
	assert_close(merged.rmse, full.rmse);
	assert_close(merged.mae, full.mae);
	assert_close(merged.r2, full.r2);
	assert_close(merged.pearson_r, full.pearson_r);
}

#[test]
fn test_empty_input() {
	let output = RegressionMetrics::new().finalize();
	assert!(output.rmse.is_nan());
	assert!(output.pearson_r.is_nan());
}
