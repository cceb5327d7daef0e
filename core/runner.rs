use crate::{
	config::{LinearModelOptions, ModelOptions, TreeModelOptions},
	strategy::Strategy,
	Error,
};
use ic50_dataframe::{CategoricalColumn, Column, DataFrame, NumberColumn};
use ic50_metrics::{Metric, RegressionMetrics, RegressionMetricsInput};
use ndarray::prelude::*;
use num_traits::ToPrimitive;
use rayon::prelude::*;
use std::{path::Path, time::Instant};

/// The regression models the runner can fit.
#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ModelKind {
	LinearRegression,
	Ridge,
	Lasso,
	RandomForest,
	GradientBoosting,
}

impl ModelKind {
	pub const ALL: [ModelKind; 5] = [
		ModelKind::LinearRegression,
		ModelKind::Ridge,
		ModelKind::Lasso,
		ModelKind::RandomForest,
		ModelKind::GradientBoosting,
	];

	pub fn as_str(&self) -> &'static str {
		match self {
			ModelKind::LinearRegression => "linear_regression",
			ModelKind::Ridge => "ridge",
			ModelKind::Lasso => "lasso",
			ModelKind::RandomForest => "random_forest",
			ModelKind::GradientBoosting => "gradient_boosting",
		}
	}
}

impl std::fmt::Display for ModelKind {
	fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
		f.write_str(self.as_str())
	}
}

impl std::str::FromStr for ModelKind {
	type Err = Error;
	fn from_str(name: &str) -> Result<ModelKind, Error> {
		ModelKind::ALL
			.iter()
			.find(|model| model.as_str() == name)
			.copied()
			.ok_or_else(|| Error::UnknownModel {
				name: name.to_owned(),
			})
	}
}

/// The reasons a single model can fail. These never abort a run, they are recorded in the model's result row.
#[derive(Debug, thiserror::Error)]
pub enum ModelError {
	#[error("column \"{0}\" is not numeric")]
	NonNumeric(String),
	#[error("target column \"{0}\" is missing")]
	MissingTarget(String),
	#[error(transparent)]
	Linear(#[from] ic50_linear::TrainError),
	#[error(transparent)]
	Tree(#[from] ic50_tree::TrainError),
	#[error(transparent)]
	DataFrame(#[from] ic50_dataframe::DataFrameError),
}

/// One row of the results table. A model that failed has no metrics and holds its error message instead.
#[derive(Debug, Clone, PartialEq)]
pub struct ResultRow {
	pub strategy: Strategy,
	pub model: ModelKind,
	pub rmse: Option<f64>,
	pub mae: Option<f64>,
	pub r2: Option<f64>,
	pub pearson_r: Option<f64>,
	pub elapsed_seconds: f64,
	pub n_features: usize,
	pub error: Option<String>,
}

/// The numeric matrices a model is fit and scored on. Rows with a missing target have been removed.
#[derive(Debug)]
struct Matrices {
	features: Array2<f64>,
	labels: Array1<f64>,
}

impl Matrices {
	fn from_dataframe(dataframe: &DataFrame, target_column: &str) -> Result<Matrices, ModelError> {
		let target = dataframe
			.column(target_column)
			.ok_or_else(|| ModelError::MissingTarget(target_column.to_owned()))?
			.as_number()
			.ok_or_else(|| ModelError::NonNumeric(target_column.to_owned()))?;
		let rows: Vec<usize> = target
			.data
			.iter()
			.enumerate()
			.filter(|(_, value)| value.is_finite())
			.map(|(row, _)| row)
			.collect();
		let features = DataFrame::from_columns(
			dataframe
				.columns
				.iter()
				.filter(|column| column.name() != target_column)
				.cloned()
				.collect(),
		)?
		.take_rows(&rows)?;
		if let Some(column) = features
			.columns
			.iter()
			.find(|column| column.as_number().is_none())
		{
			return Err(ModelError::NonNumeric(column.name().to_owned()));
		}
		let features = features
			.to_array()
			.ok_or_else(|| ModelError::NonNumeric(target_column.to_owned()))?;
		let labels = rows.iter().map(|row| target.data[*row]).collect();
		Ok(Matrices { features, labels })
	}
}

fn linear_options(
	defaults: ic50_linear::TrainOptions,
	options: Option<&LinearModelOptions>,
) -> ic50_linear::TrainOptions {
	let options = options.cloned().unwrap_or_default();
	ic50_linear::TrainOptions {
		l1_regularization: options.l1_regularization.unwrap_or(defaults.l1_regularization),
		l2_regularization: options.l2_regularization.unwrap_or(defaults.l2_regularization),
		max_epochs: options.max_epochs.unwrap_or(defaults.max_epochs),
		..defaults
	}
}

fn tree_options(defaults: ic50_tree::TreeOptions, options: &TreeModelOptions) -> ic50_tree::TreeOptions {
	ic50_tree::TreeOptions {
		l2_regularization: options.l2_regularization.unwrap_or(defaults.l2_regularization),
		max_depth: options.max_depth.unwrap_or(defaults.max_depth),
		min_examples_per_child: options
			.min_examples_per_child
			.unwrap_or(defaults.min_examples_per_child),
		..defaults
	}
}

/// Fit `model` on `train` and predict `test`.
fn fit_predict(
	model: ModelKind,
	options: &ModelOptions,
	train: &Matrices,
	test: ArrayView2<f64>,
) -> Result<Array1<f64>, ModelError> {
	let mut predictions = Array1::zeros(test.nrows());
	match model {
		ModelKind::LinearRegression | ModelKind::Ridge | ModelKind::Lasso => {
			let train_options = match model {
				ModelKind::Ridge => linear_options(
					ic50_linear::TrainOptions {
						l2_regularization: 0.1,
						..Default::default()
					},
					options.ridge.as_ref(),
				),
				ModelKind::Lasso => linear_options(
					ic50_linear::TrainOptions {
						l1_regularization: 0.01,
						..Default::default()
					},
					options.lasso.as_ref(),
				),
				_ => ic50_linear::TrainOptions::default(),
			};
			let regressor = ic50_linear::Regressor::train(
				train.features.view(),
				train.labels.view(),
				&train_options,
			)?;
			regressor.predict(test, predictions.view_mut());
		}
		ModelKind::RandomForest => {
			let defaults = ic50_tree::ForestTrainOptions::default();
			let config = options.random_forest.clone().unwrap_or_default();
			let train_options = ic50_tree::ForestTrainOptions {
				tree: tree_options(defaults.tree.clone(), &config),
				n_trees: config.n_trees.unwrap_or(defaults.n_trees),
				feature_fraction: config.feature_fraction.unwrap_or(defaults.feature_fraction),
				..defaults
			};
			let forest = ic50_tree::Forest::train(
				train.features.view(),
				train.labels.view(),
				&train_options,
			)?;
			forest.predict(test, predictions.view_mut());
		}
		ModelKind::GradientBoosting => {
			let defaults = ic50_tree::TrainOptions::default();
			let config = options.gradient_boosting.clone().unwrap_or_default();
			let train_options = ic50_tree::TrainOptions {
				tree: tree_options(defaults.tree.clone(), &config),
				learning_rate: config.learning_rate.unwrap_or(defaults.learning_rate),
				max_rounds: config.max_rounds.unwrap_or(defaults.max_rounds),
			};
			let regressor = ic50_tree::Regressor::train(
				train.features.view(),
				train.labels.view(),
				&train_options,
			)?;
			regressor.predict(test, predictions.view_mut());
		}
	}
	Ok(predictions)
}

/// These are the inputs to [`run_models`](fn.run_models.html).
pub struct RunModelsInput<'a> {
	pub strategy: Strategy,
	pub train: &'a DataFrame,
	pub test: &'a DataFrame,
	pub target_column: &'a str,
	pub models: &'a [ModelKind],
	pub options: &'a ModelOptions,
}

/**
Fit every model on the encoded training rows of one strategy and score it on the encoded test rows. Models are fit in parallel, and the rows are returned in the order of `models`. A model that fails produces a row holding its error and does not stop the others.
*/
pub fn run_models(input: RunModelsInput) -> Vec<ResultRow> {
	let RunModelsInput {
		strategy,
		train,
		test,
		target_column,
		models,
		options,
	} = input;
	let n_features = train.ncols().saturating_sub(1);
	let matrices = Matrices::from_dataframe(train, target_column)
		.and_then(|train| Ok((train, Matrices::from_dataframe(test, target_column)?)));
	models
		.par_iter()
		.map(|model| {
			let start = Instant::now();
			let result = match &matrices {
				Ok((train, test)) => fit_predict(*model, options, train, test.features.view())
					.map(|predictions| {
						RegressionMetrics::compute(RegressionMetricsInput {
							predictions: predictions.view(),
							labels: test.labels.view(),
						})
					})
					.map_err(|error| error.to_string()),
				Err(error) => Err(error.to_string()),
			};
			let elapsed_seconds = start.elapsed().as_secs_f64();
			match result {
				Ok(metrics) => {
					tracing::info!(
						strategy = strategy.as_str(),
						model = model.as_str(),
						rmse = metrics.rmse,
						elapsed_seconds,
						"fit model"
					);
					ResultRow {
						strategy,
						model: *model,
						rmse: Some(metrics.rmse),
						mae: Some(metrics.mae),
						r2: Some(metrics.r2),
						pearson_r: Some(metrics.pearson_r),
						elapsed_seconds,
						n_features,
						error: None,
					}
				}
				Err(error) => {
					tracing::warn!(
						strategy = strategy.as_str(),
						model = model.as_str(),
						error = error.as_str(),
						"skipping model"
					);
					ResultRow {
						strategy,
						model: *model,
						rmse: None,
						mae: None,
						r2: None,
						pearson_r: None,
						elapsed_seconds,
						n_features,
						error: Some(error),
					}
				}
			}
		})
		.collect()
}

/// Sort the rows that succeeded by ascending RMSE. Failed rows follow in their original order.
pub fn rank_results(rows: &[ResultRow]) -> Vec<ResultRow> {
	let mut ranked: Vec<ResultRow> = rows.iter().filter(|row| row.rmse.is_some()).cloned().collect();
	ranked.sort_by(|a, b| {
		let a = a.rmse.unwrap_or(f64::INFINITY);
		let b = b.rmse.unwrap_or(f64::INFINITY);
		a.total_cmp(&b)
	});
	ranked.extend(rows.iter().filter(|row| row.rmse.is_none()).cloned());
	ranked
}

/// Convert the results to a dataframe with one column per field. Missing metrics are `NaN`.
pub fn results_dataframe(rows: &[ResultRow]) -> Result<DataFrame, Error> {
	let number = |name: &str, values: Vec<f64>| Column::Number(NumberColumn::new(name.to_owned(), values));
	let metric = |get: fn(&ResultRow) -> Option<f64>| -> Vec<f64> {
		rows.iter().map(|row| get(row).unwrap_or(f64::NAN)).collect()
	};
	let columns = vec![
		Column::Categorical(CategoricalColumn::from_labels(
			"strategy".to_owned(),
			rows.iter().map(|row| Some(row.strategy.as_str())),
		)),
		Column::Categorical(CategoricalColumn::from_labels(
			"model".to_owned(),
			rows.iter().map(|row| Some(row.model.as_str())),
		)),
		number("rmse", metric(|row| row.rmse)),
		number("mae", metric(|row| row.mae)),
		number("r2", metric(|row| row.r2)),
		number("pearson_r", metric(|row| row.pearson_r)),
		number(
			"elapsed_seconds",
			rows.iter().map(|row| row.elapsed_seconds).collect(),
		),
		number(
			"n_features",
			rows.iter()
				.map(|row| row.n_features.to_f64().unwrap_or(f64::NAN))
				.collect(),
		),
		Column::Categorical(CategoricalColumn::from_labels(
			"error".to_owned(),
			rows.iter().map(|row| row.error.as_deref()),
		)),
	];
	Ok(DataFrame::from_columns(columns)?)
}

pub fn write_results(rows: &[ResultRow], path: &Path) -> Result<(), Error> {
	results_dataframe(rows)?.to_path(path)?;
	Ok(())
}

#[cfg(test)]
fn encoded_example() -> DataFrame {
	DataFrame::from_columns(vec![
		Column::Number(NumberColumn::new(
			"dose".to_owned(),
			(0..60).map(|i| (i % 10) as f64).collect(),
		)),
		Column::Number(NumberColumn::new(
			"tissue_lung".to_owned(),
			(0..60).map(|i| (i % 2) as f64).collect(),
		)),
		Column::Number(NumberColumn::new(
			"ln_ic50".to_owned(),
			(0..60)
				.map(|i| {
					if i == 7 {
						f64::NAN
					} else {
						1.0 + 0.5 * (i % 10) as f64 - 2.0 * (i % 2) as f64
					}
				})
				.collect(),
		)),
	])
	.unwrap()
}

#[test]
fn test_run_models() {
	let dataframe = encoded_example();
	let train = dataframe.take_rows(&(0..48).collect::<Vec<_>>()).unwrap();
	let test = dataframe.take_rows(&(48..60).collect::<Vec<_>>()).unwrap();
	let rows = run_models(RunModelsInput {
		strategy: Strategy::AllOneHot,
		train: &train,
		test: &test,
		target_column: "ln_ic50",
		models: &ModelKind::ALL,
		options: &ModelOptions::default(),
	});
	let models: Vec<ModelKind> = rows.iter().map(|row| row.model).collect();
	assert_eq!(models, ModelKind::ALL.to_vec());
	for row in rows.iter() {
		assert_eq!(row.error, None, "{}", row.model);
		assert_eq!(row.n_features, 2);
	}
	// The labels are an exact linear function of the features.
	assert!(rows[0].rmse.unwrap() < 1e-3);
	assert!(rows[0].r2.unwrap() > 0.999);
}

#[test]
fn test_failed_models_are_recorded() {
	let dataframe = encoded_example();
	let mut train = dataframe.take_rows(&(0..48).collect::<Vec<_>>()).unwrap();
	if let Column::Number(column) = &mut train.columns[0] {
		column.data[3] = f64::NAN;
	}
	let test = dataframe.take_rows(&(48..60).collect::<Vec<_>>()).unwrap();
	let rows = run_models(RunModelsInput {
		strategy: Strategy::OneHotTarget,
		train: &train,
		test: &test,
		target_column: "ln_ic50",
		models: &[ModelKind::LinearRegression, ModelKind::GradientBoosting],
		options: &ModelOptions::default(),
	});
	assert!(rows[0].rmse.is_none());
	assert!(rows[0].error.as_ref().unwrap().contains("not a finite number"));
	assert!(rows[1].rmse.is_some());
	let ranked = rank_results(&rows);
	assert_eq!(ranked[0].model, ModelKind::GradientBoosting);
	assert_eq!(ranked[1].model, ModelKind::LinearRegression);
}

#[test]
fn test_write_results() {
	let rows = vec![ResultRow {
		strategy: Strategy::OneHotFrequency,
		model: ModelKind::Lasso,
		rmse: None,
		mae: None,
		r2: None,
		pearson_r: None,
		elapsed_seconds: 0.5,
		n_features: 12,
		error: Some("cannot train on zero examples".to_owned()),
	}];
	let dir = tempfile::tempdir().unwrap();
	let path = dir.path().join("results.csv");
	write_results(&rows, &path).unwrap();
	insta::assert_snapshot!(std::fs::read_to_string(&path).unwrap(), @r###"
 strategy,model,rmse,mae,r2,pearson_r,elapsed_seconds,n_features,error
 one_hot_frequency,lasso,,,,,0.5,12,cannot train on zero examples
 "###);
}
