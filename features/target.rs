use super::{categorical_column, lookup_options, EncodeError, EncodeOutput};
use ic50_dataframe::{CategoricalColumn, DataFrame, NumberColumn};
use ic50_metrics::{Mean, StreamingMetric};
use itertools::izip;
use num_traits::ToPrimitive;
use rand::{seq::SliceRandom, SeedableRng};
use rand_xoshiro::Xoshiro256Plus;
use std::collections::BTreeMap;

/// These are the options for fitting a target encoding.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TargetEncodingOptions {
	/// The number of folds used to compute out-of-fold encodings for the training rows. Must be at least 2.
	pub n_folds: usize,
	/// The category count at which a category's own mean and the prior receive equal weight.
	pub min_samples_leaf: f64,
	/// How quickly the weight moves from the prior to the category mean as the count grows. Must be positive.
	pub smoothing: f64,
	/// The seed for assigning training rows to folds.
	pub seed: u64,
}

impl Default for TargetEncodingOptions {
	fn default() -> Self {
		Self {
			n_folds: 5,
			min_samples_leaf: 20.0,
			smoothing: 10.0,
			seed: 42,
		}
	}
}

impl TargetEncodingOptions {
	/// Check that there are at least 2 folds and that smoothing is a positive finite number.
	pub fn validate(&self) -> Result<(), EncodeError> {
		if self.n_folds < 2 {
			return Err(EncodeError::InvalidFolds {
				n_folds: self.n_folds,
			});
		}
		if !(self.smoothing.is_finite() && self.smoothing > 0.0) {
			return Err(EncodeError::InvalidSmoothing {
				smoothing: self.smoothing,
			});
		}
		Ok(())
	}
}

/**
A `TargetMapping` encodes each category as a smoothed mean of the target over the training rows that hold it. The category mean is blended with a prior using the weight

`λ = 1 / (1 + exp(-(count - min_samples_leaf) / smoothing))`

`smoothed_mean = λ * category_mean + (1 - λ) * prior`

so that rare categories are pulled toward the prior. In the persisted mapping the prior is the global training mean, and a value that is missing or was not seen in training is encoded as the global mean.

The training rows themselves are never encoded with this mapping. Instead they are split into folds, and each row is encoded with statistics computed only from the rows in the other folds, with the mean of those rows as the prior. This keeps a row's own target out of its feature.
*/
#[derive(Debug, Clone, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct TargetMapping {
	pub global_mean: f64,
	pub min_samples_leaf: f64,
	pub smoothing: f64,
	pub columns: Vec<TargetColumnMapping>,
}

#[derive(Debug, Clone, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct TargetColumnMapping {
	pub source_column_name: String,
	pub smoothed_means: BTreeMap<String, f64>,
}

impl TargetColumnMapping {
	pub fn feature_name(&self) -> String {
		format!("{}_TargetEnc", self.source_column_name)
	}
}

/// The weight given to a category's own mean. It increases monotonically from 0 to 1 with `count`.
pub fn smoothing_weight(count: f64, min_samples_leaf: f64, smoothing: f64) -> f64 {
	1.0 / (1.0 + (-(count - min_samples_leaf) / smoothing).exp())
}

/// Blend a category's mean with the prior. A category with no rows receives the prior.
pub fn smoothed_mean(
	count: f64,
	category_mean: f64,
	prior: f64,
	min_samples_leaf: f64,
	smoothing: f64,
) -> f64 {
	if count == 0.0 {
		return prior;
	}
	let weight = smoothing_weight(count, min_samples_leaf, smoothing);
	weight * category_mean + (1.0 - weight) * prior
}

/// The count and target sum of each option of a categorical column.
#[derive(Debug, Clone, Copy, Default)]
struct CategoryStats {
	count: usize,
	sum: f64,
}

impl CategoryStats {
	fn add(&mut self, target: f64) {
		self.count += 1;
		self.sum += target;
	}

	fn without(self, other: CategoryStats) -> CategoryStats {
		CategoryStats {
			count: self.count - other.count,
			sum: self.sum - other.sum,
		}
	}

	fn count(&self) -> f64 {
		self.count.to_f64().unwrap_or(f64::NAN)
	}

	fn mean(&self) -> f64 {
		self.sum / self.count()
	}
}

/// Randomly assign each of `n_rows` rows to one of `n_folds` folds of nearly equal size.
pub fn assign_folds(n_rows: usize, n_folds: usize, seed: u64) -> Vec<usize> {
	let mut permutation: Vec<usize> = (0..n_rows).collect();
	let mut rng = Xoshiro256Plus::seed_from_u64(seed);
	permutation.shuffle(&mut rng);
	let mut folds = vec![0; n_rows];
	for (position, row) in permutation.into_iter().enumerate() {
		folds[row] = position % n_folds;
	}
	folds
}

impl TargetMapping {
	/**
	Fit a target encoding of `columns` against the numeric column `target_column` of `train`. The returned features hold the out-of-fold encoding of the training rows. The returned mapping holds the encoding computed from every training row, for use on other rows.
	*/
	pub fn fit(
		train: &DataFrame,
		columns: &[String],
		target_column: &str,
		options: TargetEncodingOptions,
	) -> Result<(EncodeOutput, TargetMapping), EncodeError> {
		options.validate()?;
		let target = train
			.column(target_column)
			.ok_or_else(|| EncodeError::MissingColumn {
				column: target_column.to_owned(),
			})?
			.as_number()
			.ok_or_else(|| EncodeError::NotNumeric {
				column: target_column.to_owned(),
			})?;
		let target = target.data.as_slice();
		let global_mean = mean_of_present(target.iter().copied()).ok_or_else(|| {
			EncodeError::EmptyTarget {
				column: target_column.to_owned(),
			}
		})?;
		let folds = assign_folds(train.nrows(), options.n_folds, options.seed);
		// Each fold's prior is the mean of the targets outside of it.
		let fold_priors: Vec<f64> = (0..options.n_folds)
			.map(|fold| {
				let outside = izip!(target.iter(), folds.iter())
					.filter(|(_, row_fold)| **row_fold != fold)
					.map(|(target, _)| *target);
				mean_of_present(outside).unwrap_or(global_mean)
			})
			.collect();
		let mut output = EncodeOutput::default();
		let mut mapping_columns = Vec::with_capacity(columns.len());
		for column_name in columns {
			let column = categorical_column(train, column_name)?;
			let (features, n_fallbacks) =
				encode_out_of_fold(column, target, &folds, &fold_priors, &options);
			let smoothed_means = full_smoothed_means(column, target, global_mean, &options);
			tracing::debug!(
				column = column_name.as_str(),
				n_categories = smoothed_means.len(),
				n_fallbacks,
				"fit target encoding"
			);
			let mapping = TargetColumnMapping {
				source_column_name: column_name.clone(),
				smoothed_means,
			};
			output
				.features
				.push(NumberColumn::new(mapping.feature_name(), features));
			output
				.fallbacks
				.insert(column_name.clone(), n_fallbacks);
			mapping_columns.push(mapping);
		}
		let mapping = TargetMapping {
			global_mean,
			min_samples_leaf: options.min_samples_leaf,
			smoothing: options.smoothing,
			columns: mapping_columns,
		};
		Ok((output, mapping))
	}

	/// Encode `frame` using the smoothed means learned from every training row.
	pub fn apply(&self, frame: &DataFrame) -> Result<EncodeOutput, EncodeError> {
		let mut output = EncodeOutput::default();
		for mapping in self.columns.iter() {
			let column = categorical_column(frame, &mapping.source_column_name)?;
			let values = lookup_options(column, &mapping.smoothed_means);
			let mut n_fallbacks = 0;
			let data = column
				.data
				.iter()
				.map(|value| match value.and_then(|value| values[value.get() - 1]) {
					Some(smoothed_mean) => smoothed_mean,
					None => {
						n_fallbacks += 1;
						self.global_mean
					}
				})
				.collect();
			output
				.features
				.push(NumberColumn::new(mapping.feature_name(), data));
			output
				.fallbacks
				.insert(mapping.source_column_name.clone(), n_fallbacks);
		}
		Ok(output)
	}
}

fn mean_of_present(values: impl Iterator<Item = f64>) -> Option<f64> {
	let mut mean = Mean::default();
	for value in values.filter(|value| !value.is_nan()) {
		mean.update(value);
	}
	mean.finalize()
}

fn category_stats(
	column: &CategoricalColumn,
	target: &[f64],
	mut include: impl FnMut(usize) -> bool,
) -> Vec<CategoryStats> {
	let mut stats = vec![CategoryStats::default(); column.options.len()];
	for (row, (value, target)) in column.data.iter().zip(target.iter()).enumerate() {
		if let Some(value) = value {
			if !target.is_nan() && !column.options[value.get() - 1].is_empty() && include(row) {
				stats[value.get() - 1].add(*target);
			}
		}
	}
	stats
}

/// Encode every training row with statistics from the rows outside of its fold. Returns the features and the number of rows that received their fold's prior.
fn encode_out_of_fold(
	column: &CategoricalColumn,
	target: &[f64],
	folds: &[usize],
	fold_priors: &[f64],
	options: &TargetEncodingOptions,
) -> (Vec<f64>, usize) {
	let total = category_stats(column, target, |_| true);
	let in_fold: Vec<Vec<CategoryStats>> = (0..options.n_folds)
		.map(|fold| category_stats(column, target, |row| folds[row] == fold))
		.collect();
	let mut n_fallbacks = 0;
	let features = izip!(column.data.iter(), folds.iter())
		.map(|(value, fold)| {
			let prior = fold_priors[*fold];
			let stats = value.map(|value| {
				let index = value.get() - 1;
				total[index].without(in_fold[*fold][index])
			});
			match stats {
				Some(stats) if stats.count > 0 => smoothed_mean(
					stats.count(),
					stats.mean(),
					prior,
					options.min_samples_leaf,
					options.smoothing,
				),
				_ => {
					n_fallbacks += 1;
					prior
				}
			}
		})
		.collect();
	(features, n_fallbacks)
}

fn full_smoothed_means(
	column: &CategoricalColumn,
	target: &[f64],
	global_mean: f64,
	options: &TargetEncodingOptions,
) -> BTreeMap<String, f64> {
	let stats = category_stats(column, target, |_| true);
	column
		.options
		.iter()
		.zip(stats)
		.filter(|(_, stats)| stats.count > 0)
		.map(|(option, stats)| {
			let value = smoothed_mean(
				stats.count(),
				stats.mean(),
				global_mean,
				options.min_samples_leaf,
				options.smoothing,
			);
			(option.clone(), value)
		})
		.collect()
}

#[test]
fn test_target_encoding_shrinks_small_categories() {
	let frame = super::example_frame();
	let (output, mapping) = TargetMapping::fit(
		&frame,
		&["C".to_owned()],
		"ln_ic50",
		TargetEncodingOptions::default(),
	)
	.unwrap();
	assert_eq!(mapping.global_mean, 5.5);
	let category_means = [("A", 1.5), ("B", 4.0), ("C", 7.5), ("D", 10.0)];
	for (category, category_mean) in category_means.iter() {
		let value = mapping.columns[0].smoothed_means[*category];
		assert!((value - 5.5).abs() < 1.0, "{} = {}", category, value);
		assert!((value - 5.5).abs() < (category_mean - 5.5f64).abs());
	}
	assert_eq!(output.features[0].name, "C_TargetEnc");
	assert_eq!(output.features[0].data.len(), 10);
	assert!(output.features[0]
		.data
		.iter()
		.all(|value| (value - 5.5).abs() < 2.0));
}

#[test]
fn test_out_of_fold_encoding_excludes_own_target() {
	use ic50_dataframe::Column;
	// Each category holds exactly one row, so every training row falls back to its fold's prior.
	let frame = DataFrame::from_columns(vec![
		Column::Categorical(CategoricalColumn::from_labels(
			"cell_line".to_owned(),
			vec![Some("a"), Some("b"), Some("c"), Some("d")],
		)),
		Column::Number(NumberColumn::new(
			"ln_ic50".to_owned(),
			vec![0.0, 100.0, 200.0, 300.0],
		)),
	])
	.unwrap();
	let options = TargetEncodingOptions {
		n_folds: 2,
		..Default::default()
	};
	let (output, _) =
		TargetMapping::fit(&frame, &["cell_line".to_owned()], "ln_ic50", options).unwrap();
	let folds = assign_folds(4, 2, options.seed);
	for row in 0..4 {
		let outside: Vec<f64> = (0..4)
			.filter(|other| folds[*other] != folds[row])
			.map(|other| other as f64 * 100.0)
			.collect();
		let prior = outside.iter().sum::<f64>() / outside.len() as f64;
		assert!((output.features[0].data[row] - prior).abs() < 1e-9);
	}
	assert_eq!(output.fallbacks["cell_line"], 4);
}

#[test]
fn test_smoothing_weight_is_monotonic() {
	let mut previous = 0.0;
	for count in 0..200 {
		let weight = smoothing_weight(count as f64, 20.0, 10.0);
		assert!(weight > previous && weight < 1.0);
		previous = weight;
	}
	assert!((smoothing_weight(20.0, 20.0, 10.0) - 0.5).abs() < 1e-12);
	assert!(smoothed_mean(1000.0, 3.0, 0.0, 20.0, 10.0) > 2.999);
	assert!(smoothed_mean(1.0, 3.0, 0.0, 20.0, 10.0) < 0.5);
}

#[test]
fn test_missing_targets_and_unseen_categories() {
	use ic50_dataframe::Column;
	let train = DataFrame::from_columns(vec![
		Column::Categorical(CategoricalColumn::from_labels(
			"drug".to_owned(),
			vec![Some("x"), Some("x"), Some("y"), None],
		)),
		Column::Number(NumberColumn::new(
			"ln_ic50".to_owned(),
			vec![1.0, f64::NAN, 3.0, 5.0],
		)),
	])
	.unwrap();
	let (output, mapping) = TargetMapping::fit(
		&train,
		&["drug".to_owned()],
		"ln_ic50",
		TargetEncodingOptions::default(),
	)
	.unwrap();
	assert_eq!(mapping.global_mean, 3.0);
	assert!(output.features[0].data.iter().all(|value| value.is_finite()));
	let test = DataFrame::from_columns(vec![Column::Categorical(CategoricalColumn::from_labels(
		"drug".to_owned(),
		vec![Some("z"), None, Some("y")],
	))])
	.unwrap();
	let output = mapping.apply(&test).unwrap();
	assert_eq!(output.features[0].data[0], 3.0);
	assert_eq!(output.features[0].data[1], 3.0);
	assert_eq!(
		output.features[0].data[2],
		mapping.columns[0].smoothed_means["y"]
	);
	assert_eq!(output.fallbacks["drug"], 2);
}

#[test]
fn test_invalid_options() {
	let frame = super::example_frame();
	let columns = ["C".to_owned()];
	let result = TargetMapping::fit(
		&frame,
		&columns,
		"ln_ic50",
		TargetEncodingOptions {
			n_folds: 1,
			..Default::default()
		},
	);
	assert_eq!(result.unwrap_err(), EncodeError::InvalidFolds { n_folds: 1 });
	let result = TargetMapping::fit(
		&frame,
		&columns,
		"ln_ic50",
		TargetEncodingOptions {
			smoothing: 0.0,
			..Default::default()
		},
	);
	assert_eq!(
		result.unwrap_err(),
		EncodeError::InvalidSmoothing { smoothing: 0.0 }
	);
	assert!(TargetEncodingOptions {
		smoothing: f64::NAN,
		..Default::default()
	}
	.validate()
	.is_err());
	assert_eq!(TargetEncodingOptions::default().validate(), Ok(()));
	let result = TargetMapping::fit(&frame, &columns, "C", TargetEncodingOptions::default());
	assert_eq!(
		result.unwrap_err(),
		EncodeError::NotNumeric {
			column: "C".to_owned()
		}
	);
}

#[test]
fn test_test_rows_do_not_change_the_mapping() {
	let frame = super::example_frame();
	let train = frame.take_rows(&[0, 2, 3, 5, 6, 7, 8, 9]).unwrap();
	let test_a = frame.take_rows(&[1, 4]).unwrap();
	let test_b = frame.take_rows(&[4, 4, 1]).unwrap();
	let columns = ["C".to_owned()];
	let fit = || TargetMapping::fit(&train, &columns, "ln_ic50", TargetEncodingOptions::default());
	let (train_a, mapping_a) = fit().unwrap();
	mapping_a.apply(&test_a).unwrap();
	let (train_b, mapping_b) = fit().unwrap();
	mapping_b.apply(&test_b).unwrap();
	assert_eq!(mapping_a, mapping_b);
	assert_eq!(train_a, train_b);
}
