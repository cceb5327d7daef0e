/*!
The pipeline steps. Each step reads the artifacts of the step before it from the output directory and refuses to run if they are missing.

| artifact                              | written by |
|---------------------------------------|------------|
| `split.json`                          | split      |
| `encoded/<strategy>/train.csv`        | encode     |
| `encoded/<strategy>/test.csv`         | encode     |
| `encoded/<strategy>/mappings.json`    | encode     |
| `results.csv`                         | run        |
*/

use crate::{
	config::Config,
	runner::{run_models, write_results, ResultRow, RunModelsInput},
	split::{split, SplitRecord},
	strategy::{encode, EncodeInput, MappingBundle, Strategy},
	Error,
};
use chrono::Utc;
use ic50_dataframe::{DataFrame, FromCsvOptions};
use std::path::{Path, PathBuf};

/// The locations of every artifact under an output directory.
#[derive(Debug, Clone)]
pub struct Artifacts {
	root: PathBuf,
}

impl Artifacts {
	pub fn new(root: &Path) -> Artifacts {
		Artifacts {
			root: root.to_owned(),
		}
	}

	pub fn split(&self) -> PathBuf {
		self.root.join("split.json")
	}

	pub fn encoded_dir(&self, strategy: Strategy) -> PathBuf {
		self.root.join("encoded").join(strategy.as_str())
	}

	pub fn encoded_train(&self, strategy: Strategy) -> PathBuf {
		self.encoded_dir(strategy).join("train.csv")
	}

	pub fn encoded_test(&self, strategy: Strategy) -> PathBuf {
		self.encoded_dir(strategy).join("test.csv")
	}

	pub fn mappings(&self, strategy: Strategy) -> PathBuf {
		self.encoded_dir(strategy).join("mappings.json")
	}

	pub fn results(&self) -> PathBuf {
		self.root.join("results.csv")
	}
}

fn require(path: PathBuf, step: &'static str) -> Result<PathBuf, Error> {
	if path.exists() {
		Ok(path)
	} else {
		Err(Error::MissingArtifact {
			artifact: path,
			step,
		})
	}
}

/// Load the cleaned dataset with the column types declared in the config.
pub fn load_dataset(config: &Config, data_path: &Path) -> Result<DataFrame, Error> {
	let data_path = require(data_path.to_owned(), "data preparation")?;
	let dataframe = DataFrame::from_path(&data_path, config.csv_options())?;
	tracing::info!(
		path = %data_path.display(),
		n_rows = dataframe.nrows(),
		n_columns = dataframe.ncols(),
		"loaded dataset"
	);
	if dataframe.nrows() == 0 {
		return Err(Error::EmptyDataset);
	}
	Ok(dataframe)
}

/// Split the dataset and persist the split.
pub fn run_split_step(
	config: &Config,
	data_path: &Path,
	out_dir: &Path,
) -> Result<SplitRecord, Error> {
	let dataframe = load_dataset(config, data_path)?;
	let split = split(dataframe.nrows(), config.split.ratio, config.split.seed)?;
	let record = SplitRecord::new(&split, Utc::now());
	std::fs::create_dir_all(out_dir)?;
	let artifacts = Artifacts::new(out_dir);
	record.write(&artifacts.split())?;
	tracing::info!(
		seed = record.seed,
		n_train = record.n_train,
		n_test = record.n_test,
		"wrote split"
	);
	Ok(record)
}

/// Encode the persisted split with every configured strategy and persist the encoded rows and mappings.
pub fn run_encode_step(
	config: &Config,
	data_path: &Path,
	out_dir: &Path,
) -> Result<Vec<Strategy>, Error> {
	let strategies = config.strategies()?;
	config.tiers.validate()?;
	config
		.target_encoding_options(config.split.seed)
		.validate()?;
	let artifacts = Artifacts::new(out_dir);
	let record = SplitRecord::read(&require(artifacts.split(), "split")?)?;
	if record.seed != config.split.seed || record.ratio != config.split.ratio {
		tracing::warn!(
			recorded_seed = record.seed,
			recorded_ratio = record.ratio,
			"the persisted split differs from the config and is used as is"
		);
	}
	let dataframe = load_dataset(config, data_path)?;
	let (train, test) = record.split().slices(&dataframe)?;
	for strategy in strategies.iter().copied() {
		let encoded = encode(EncodeInput {
			train: &train,
			test: &test,
			strategy,
			tiers: &config.tiers,
			target_column: &config.target,
			target_encoding: config.target_encoding_options(record.seed),
		})?;
		std::fs::create_dir_all(artifacts.encoded_dir(strategy))?;
		encoded.train.to_path(&artifacts.encoded_train(strategy))?;
		encoded.test.to_path(&artifacts.encoded_test(strategy))?;
		encoded.mappings.write(&artifacts.mappings(strategy))?;
	}
	Ok(strategies)
}

/// Fit and score every configured model on every configured strategy's encoded rows, and persist the results.
pub fn run_models_step(config: &Config, out_dir: &Path) -> Result<Vec<ResultRow>, Error> {
	let strategies = config.strategies()?;
	let models = config.models()?;
	let artifacts = Artifacts::new(out_dir);
	// Check every artifact before fitting anything.
	for strategy in strategies.iter().copied() {
		require(artifacts.encoded_train(strategy), "encode")?;
		require(artifacts.encoded_test(strategy), "encode")?;
		require(artifacts.mappings(strategy), "encode")?;
	}
	let mut rows = Vec::new();
	for strategy in strategies.iter().copied() {
		let mappings = MappingBundle::read(&artifacts.mappings(strategy))?;
		let train = DataFrame::from_path(&artifacts.encoded_train(strategy), FromCsvOptions::default())?;
		let test = DataFrame::from_path(&artifacts.encoded_test(strategy), FromCsvOptions::default())?;
		rows.extend(run_models(RunModelsInput {
			strategy,
			train: &train,
			test: &test,
			target_column: &mappings.target_column,
			models: &models,
			options: &config.model_options,
		}));
	}
	write_results(&rows, &artifacts.results())?;
	tracing::info!(n_results = rows.len(), "wrote results");
	Ok(rows)
}

/// Run the split, encode, and run steps in order.
pub fn run_all(config: &Config, data_path: &Path, out_dir: &Path) -> Result<Vec<ResultRow>, Error> {
	run_split_step(config, data_path, out_dir)?;
	run_encode_step(config, data_path, out_dir)?;
	run_models_step(config, out_dir)
}

#[cfg(test)]
fn write_dataset(dir: &Path) -> PathBuf {
	use std::fmt::Write;
	let tissues = ["lung", "skin", "blood", "breast"];
	let drugs = ["Erlotinib", "Nilotinib", "Sorafenib"];
	let mut csv = String::from("cell_line,tissue,drug,msi,dose,ln_ic50\n");
	for i in 0..60 {
		let tissue = tissues[i % tissues.len()];
		let drug = drugs[i % drugs.len()];
		let msi = if i % 5 == 0 { "" } else { "MSS" };
		let ln_ic50 = if i == 11 {
			"NA".to_owned()
		} else {
			format!("{}", (i % 4) as f64 - 0.5 * (i % 3) as f64)
		};
		writeln!(
			csv,
			"CL{},{},{},{},{},{}",
			i % 12,
			tissue,
			drug,
			msi,
			(i % 7) as f64 * 0.25,
			ln_ic50
		)
		.unwrap();
	}
	let path = dir.join("gdsc.csv");
	std::fs::write(&path, csv).unwrap();
	path
}

#[cfg(test)]
fn test_config() -> Config {
	serde_yaml::from_str(
		r#"
target: ln_ic50
column_types:
  ln_ic50: nullable_number
tiers:
  low: [msi, tissue]
  medium: [drug]
  high: [cell_line]
target_encoding:
  n_folds: 3
models: [ridge, gradient_boosting]
model_options:
  gradient_boosting:
    max_rounds: 10
    min_examples_per_child: 2
"#,
	)
	.unwrap()
}

#[test]
fn test_steps_require_upstream_artifacts() {
	let dir = tempfile::tempdir().unwrap();
	let data_path = write_dataset(dir.path());
	let out_dir = dir.path().join("out");
	let config = test_config();
	let error = run_encode_step(&config, &data_path, &out_dir).unwrap_err();
	assert!(matches!(error, Error::MissingArtifact { step: "split", .. }));
	let error = run_models_step(&config, &out_dir).unwrap_err();
	assert!(matches!(error, Error::MissingArtifact { step: "encode", .. }));
	let error = run_split_step(&config, &dir.path().join("missing.csv"), &out_dir).unwrap_err();
	assert!(matches!(
		error,
		Error::MissingArtifact {
			step: "data preparation",
			..
		}
	));
}

#[test]
fn test_run_all() {
	let dir = tempfile::tempdir().unwrap();
	let data_path = write_dataset(dir.path());
	let out_dir = dir.path().join("out");
	let config = test_config();
	let rows = run_all(&config, &data_path, &out_dir).unwrap();
	assert_eq!(rows.len(), 4 * 2);
	assert!(rows.iter().all(|row| row.error.is_none()));
	let artifacts = Artifacts::new(&out_dir);
	let record = SplitRecord::read(&artifacts.split()).unwrap();
	assert_eq!(record.n_train, 48);
	assert_eq!(record.n_test, 12);
	for strategy in Strategy::ALL.iter().copied() {
		let train =
			DataFrame::from_path(&artifacts.encoded_train(strategy), FromCsvOptions::default())
				.unwrap();
		assert_eq!(train.nrows(), 48);
		assert!(train.columns.iter().all(|column| column.as_number().is_some()));
		assert_eq!(train.column_names().last(), Some(&"ln_ic50"));
	}
	let results = std::fs::read_to_string(artifacts.results()).unwrap();
	assert_eq!(results.lines().count(), 1 + 8);
	// Rerunning the encode step replays the persisted split.
	let before = std::fs::read_to_string(artifacts.mappings(Strategy::OneHotTarget)).unwrap();
	run_encode_step(&config, &data_path, &out_dir).unwrap();
	let after = std::fs::read_to_string(artifacts.mappings(Strategy::OneHotTarget)).unwrap();
	assert_eq!(before, after);
}

#[test]
fn test_invalid_target_encoding_fails_before_encoding() {
	let dir = tempfile::tempdir().unwrap();
	let data_path = write_dataset(dir.path());
	let out_dir = dir.path().join("out");
	let mut config = test_config();
	config.target_encoding.n_folds = Some(1);
	run_split_step(&config, &data_path, &out_dir).unwrap();
	let error = run_encode_step(&config, &data_path, &out_dir).unwrap_err();
	assert!(matches!(
		error,
		Error::Encode(ic50_features::EncodeError::InvalidFolds { n_folds: 1 })
	));
	assert_eq!(error.kind(), crate::ErrorKind::Configuration);
	assert!(!out_dir.join("encoded").exists());
}
