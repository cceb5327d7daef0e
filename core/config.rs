/*!
This module defines the `Config` struct, which is read from a YAML file and configures every step of the pipeline.

```yaml
target: ln_ic50
column_types:
  cosmic_id: categorical
  ln_ic50: nullable_number
tiers:
  low: [msi_status, screen_medium]
  medium: [tissue, cancer_type]
  high: [cell_line, drug_name]
split:
  ratio: 0.8
  seed: 42
target_encoding:
  n_folds: 5
  min_samples_leaf: 20
  smoothing: 10
strategies: [all_one_hot, one_hot_target]
models: [ridge, gradient_boosting]
```
*/

use crate::{
	runner::ModelKind,
	strategy::{ColumnTiers, Strategy},
	Error,
};
use ic50_dataframe::{ColumnType, FromCsvOptions};
use ic50_features::TargetEncodingOptions;
use std::{collections::BTreeMap, path::Path};

#[derive(Debug, Clone, PartialEq, serde::Deserialize)]
#[serde(deny_unknown_fields)]
pub struct Config {
	pub target: String,
	pub column_types: Option<BTreeMap<String, ColumnType>>,
	#[serde(default)]
	pub tiers: ColumnTiers,
	#[serde(default)]
	pub split: SplitConfig,
	#[serde(default)]
	pub target_encoding: TargetEncodingConfig,
	pub strategies: Option<Vec<String>>,
	pub models: Option<Vec<String>>,
	#[serde(default)]
	pub model_options: ModelOptions,
}

#[derive(Debug, Clone, PartialEq, serde::Deserialize)]
#[serde(deny_unknown_fields)]
pub struct SplitConfig {
	#[serde(default = "default_ratio")]
	pub ratio: f64,
	#[serde(default = "default_seed")]
	pub seed: u64,
}

impl Default for SplitConfig {
	fn default() -> Self {
		Self {
			ratio: default_ratio(),
			seed: default_seed(),
		}
	}
}

fn default_ratio() -> f64 {
	0.8
}

fn default_seed() -> u64 {
	42
}

#[derive(Debug, Clone, Default, PartialEq, serde::Deserialize)]
#[serde(deny_unknown_fields)]
pub struct TargetEncodingConfig {
	pub n_folds: Option<usize>,
	pub min_samples_leaf: Option<f64>,
	pub smoothing: Option<f64>,
}

/// Hyperparameters for the models. Any value that is not set uses the model's default.
#[derive(Debug, Clone, Default, PartialEq, serde::Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ModelOptions {
	pub ridge: Option<LinearModelOptions>,
	pub lasso: Option<LinearModelOptions>,
	pub random_forest: Option<TreeModelOptions>,
	pub gradient_boosting: Option<TreeModelOptions>,
}

#[derive(Debug, Clone, Default, PartialEq, serde::Deserialize)]
#[serde(deny_unknown_fields)]
pub struct LinearModelOptions {
	pub l1_regularization: Option<f64>,
	pub l2_regularization: Option<f64>,
	pub max_epochs: Option<usize>,
}

#[derive(Debug, Clone, Default, PartialEq, serde::Deserialize)]
#[serde(deny_unknown_fields)]
pub struct TreeModelOptions {
	pub learning_rate: Option<f64>,
	pub l2_regularization: Option<f64>,
	pub max_depth: Option<usize>,
	pub max_rounds: Option<usize>,
	pub n_trees: Option<usize>,
	pub min_examples_per_child: Option<usize>,
	pub feature_fraction: Option<f64>,
}

impl Config {
	pub fn from_path(path: &Path) -> Result<Config, Error> {
		let text = std::fs::read_to_string(path)?;
		serde_yaml::from_str(&text).map_err(|source| Error::InvalidConfig {
			path: path.to_owned(),
			source,
		})
	}

	/// The strategies to run, in the order given, or all four in canonical order.
	pub fn strategies(&self) -> Result<Vec<Strategy>, Error> {
		match &self.strategies {
			Some(names) => names.iter().map(|name| name.parse()).collect(),
			None => Ok(Strategy::ALL.to_vec()),
		}
	}

	/// The models to fit, in the order given, or all of them.
	pub fn models(&self) -> Result<Vec<ModelKind>, Error> {
		match &self.models {
			Some(names) => names.iter().map(|name| name.parse()).collect(),
			None => Ok(ModelKind::ALL.to_vec()),
		}
	}

	/// Target encoding options. Folds are assigned with the seed of the split they encode.
	pub fn target_encoding_options(&self, seed: u64) -> TargetEncodingOptions {
		let defaults = TargetEncodingOptions::default();
		TargetEncodingOptions {
			n_folds: self.target_encoding.n_folds.unwrap_or(defaults.n_folds),
			min_samples_leaf: self
				.target_encoding
				.min_samples_leaf
				.unwrap_or(defaults.min_samples_leaf),
			smoothing: self.target_encoding.smoothing.unwrap_or(defaults.smoothing),
			seed,
		}
	}

	pub fn csv_options(&self) -> FromCsvOptions<'static> {
		FromCsvOptions {
			column_types: self.column_types.clone(),
			..Default::default()
		}
	}
}

#[test]
fn test_config() {
	let yaml = r#"
target: ln_ic50
column_types:
  cosmic_id: categorical
tiers:
  low: [msi_status]
  high: [cell_line, drug_name]
target_encoding:
  n_folds: 3
models: [ridge, gradient_boosting]
model_options:
  ridge:
    l2_regularization: 0.5
"#;
	let config: Config = serde_yaml::from_str(yaml).unwrap();
	assert_eq!(config.split, SplitConfig::default());
	assert_eq!(config.tiers.high, vec!["cell_line", "drug_name"]);
	assert!(config.tiers.medium.is_empty());
	assert_eq!(config.strategies().unwrap(), Strategy::ALL.to_vec());
	assert_eq!(
		config.models().unwrap(),
		vec![ModelKind::Ridge, ModelKind::GradientBoosting]
	);
	let options = config.target_encoding_options(7);
	assert_eq!(options.n_folds, 3);
	assert_eq!(options.min_samples_leaf, 20.0);
	assert_eq!(options.seed, 7);
	assert_eq!(
		config.csv_options().column_types.unwrap()["cosmic_id"],
		ColumnType::Categorical
	);
}

#[test]
fn test_config_unknown_names() {
	let config: Config =
		serde_yaml::from_str("target: ln_ic50\nstrategies: [all_target]\nmodels: [svm]\n").unwrap();
	assert!(matches!(
		config.strategies(),
		Err(Error::UnknownStrategy { name }) if name == "all_target"
	));
	assert!(matches!(
		config.models(),
		Err(Error::UnknownModel { name }) if name == "svm"
	));
}

#[test]
fn test_config_from_path() {
	let dir = tempfile::tempdir().unwrap();
	let path = dir.path().join("config.yaml");
	std::fs::write(&path, "target: [not, a, string]\n").unwrap();
	let error = Config::from_path(&path).unwrap_err();
	assert!(matches!(error, Error::InvalidConfig { .. }));
	assert_eq!(error.kind(), crate::ErrorKind::Configuration);
}
