use crate::strategy::Tier;
use ic50_dataframe::DataFrameError;
use ic50_features::EncodeError;
use std::path::PathBuf;
use thiserror::Error;

/// Every error the pipeline can fail with. Use [`Error::kind`](enum.Error.html#method.kind) to tell configuration mistakes apart from problems with the input data.
#[derive(Debug, Error)]
pub enum Error {
	#[error("split ratio must be strictly between 0 and 1 but was {ratio}")]
	InvalidRatio { ratio: f64 },
	#[error("unknown strategy \"{name}\", expected one of all_one_hot, one_hot_frequency, one_hot_target, one_hot_frequency_target")]
	UnknownStrategy { name: String },
	#[error("unknown model \"{name}\", expected one of linear_regression, ridge, lasso, random_forest, gradient_boosting")]
	UnknownModel { name: String },
	#[error("column \"{column}\" is assigned to the {first} tier and again to the {second} tier")]
	ColumnTierConflict {
		column: String,
		first: Tier,
		second: Tier,
	},
	#[error("required column \"{column}\" is missing from the {table} rows")]
	MissingColumn { column: String, table: &'static str },
	#[error("column \"{column}\" must be {expected}")]
	InvalidColumnType {
		column: String,
		expected: &'static str,
	},
	#[error("invalid config file {path}: {source}")]
	InvalidConfig {
		path: PathBuf,
		source: serde_yaml::Error,
	},
	#[error("the dataset has no rows")]
	EmptyDataset,
	#[error("{artifact} does not exist, run the {step} step first")]
	MissingArtifact {
		artifact: PathBuf,
		step: &'static str,
	},
	#[error("invalid split record: {reason}")]
	InvalidSplitRecord { reason: String },
	#[error(transparent)]
	Encode(#[from] EncodeError),
	#[error(transparent)]
	DataFrame(#[from] DataFrameError),
	#[error("json error: {0}")]
	Json(#[from] serde_json::Error),
	#[error("io error: {0}")]
	Io(#[from] std::io::Error),
}

/// The broad class of an [`Error`](enum.Error.html).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
	/// The configuration is invalid. Nothing was fit.
	Configuration,
	/// An input file or upstream artifact is missing, empty, or corrupt.
	Input,
	Io,
}

impl Error {
	pub fn kind(&self) -> ErrorKind {
		match self {
			Error::InvalidRatio { .. }
			| Error::UnknownStrategy { .. }
			| Error::UnknownModel { .. }
			| Error::ColumnTierConflict { .. }
			| Error::MissingColumn { .. }
			| Error::InvalidColumnType { .. }
			| Error::InvalidConfig { .. } => ErrorKind::Configuration,
			Error::Encode(EncodeError::EmptyTarget { .. }) => ErrorKind::Input,
			Error::Encode(_) => ErrorKind::Configuration,
			Error::EmptyDataset
			| Error::MissingArtifact { .. }
			| Error::InvalidSplitRecord { .. }
			| Error::Json(_) => ErrorKind::Input,
			Error::DataFrame(DataFrameError::Io(_)) | Error::Io(_) => ErrorKind::Io,
			Error::DataFrame(_) => ErrorKind::Input,
		}
	}
}

#[test]
fn test_error_kind() {
	assert_eq!(
		Error::InvalidRatio { ratio: 1.5 }.kind(),
		ErrorKind::Configuration
	);
	assert_eq!(
		Error::Encode(EncodeError::InvalidFolds { n_folds: 1 }).kind(),
		ErrorKind::Configuration
	);
	assert_eq!(Error::EmptyDataset.kind(), ErrorKind::Input);
	let error = Error::MissingArtifact {
		artifact: PathBuf::from("out/split.json"),
		step: "split",
	};
	assert_eq!(error.kind(), ErrorKind::Input);
	insta::assert_snapshot!(error.to_string(), @"out/split.json does not exist, run the split step first");
}
