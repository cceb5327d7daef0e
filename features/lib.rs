/*!
This crate implements the three categorical encoders used to turn drug sensitivity records into numeric features: [`OneHotMapping`](struct.OneHotMapping.html), [`FrequencyMapping`](struct.FrequencyMapping.html) and [`TargetMapping`](struct.TargetMapping.html).

Every encoder has two modes. `fit` looks only at training rows and returns the encoded training features together with a mapping. `apply` encodes any other rows using a mapping and never looks at their targets. The mapping is the only state that flows from training rows to test rows, and it is never changed after it is fit.

Values that are missing, or that were not seen in training, are not errors. Each encoder substitutes a fallback value for them and reports how many rows it did so for in [`EncodeOutput::fallbacks`](struct.EncodeOutput.html#structfield.fallbacks).
*/

#![allow(clippy::tabs_in_doc_comments)]

use ic50_dataframe::{CategoricalColumn, DataFrame, NumberColumn};
use std::collections::BTreeMap;
use thiserror::Error;

mod frequency;
mod one_hot;
mod target;

pub use self::frequency::*;
pub use self::one_hot::*;
pub use self::target::*;

/// The numeric columns produced by an encoder, in the order of the source columns it was given.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct EncodeOutput {
	pub features: Vec<NumberColumn>,
	/// The number of rows that received the fallback encoding, keyed by source column name.
	pub fallbacks: BTreeMap<String, usize>,
}

impl EncodeOutput {
	pub fn n_fallbacks(&self) -> usize {
		self.fallbacks.values().sum()
	}
}

#[derive(Debug, Error, PartialEq)]
pub enum EncodeError {
	#[error("column \"{column}\" does not exist")]
	MissingColumn { column: String },
	#[error("column \"{column}\" must be categorical to be encoded")]
	NotCategorical { column: String },
	#[error("target column \"{column}\" must be numeric")]
	NotNumeric { column: String },
	#[error("target encoding needs at least 2 folds but {n_folds} were requested")]
	InvalidFolds { n_folds: usize },
	#[error("target encoding smoothing must be a positive number but was {smoothing}")]
	InvalidSmoothing { smoothing: f64 },
	#[error("target column \"{column}\" has no values in the training rows")]
	EmptyTarget { column: String },
}

/// The fitted state of one encoder, as persisted next to the encoded data.
#[derive(Debug, Clone, PartialEq, serde::Serialize, serde::Deserialize)]
#[serde(tag = "encoder", rename_all = "snake_case")]
pub enum Mapping {
	OneHot(OneHotMapping),
	Frequency(FrequencyMapping),
	Target(TargetMapping),
}

impl Mapping {
	/// Encode `frame` with this mapping. The frame's target, if it has one, is never read.
	pub fn apply(&self, frame: &DataFrame) -> Result<EncodeOutput, EncodeError> {
		match self {
			Mapping::OneHot(mapping) => mapping.apply(frame),
			Mapping::Frequency(mapping) => mapping.apply(frame),
			Mapping::Target(mapping) => mapping.apply(frame),
		}
	}

	/// The source columns this mapping encodes.
	pub fn source_column_names(&self) -> Vec<&str> {
		match self {
			Mapping::OneHot(mapping) => mapping
				.columns
				.iter()
				.map(|column| column.source_column_name.as_str())
				.collect(),
			Mapping::Frequency(mapping) => mapping
				.columns
				.iter()
				.map(|column| column.source_column_name.as_str())
				.collect(),
			Mapping::Target(mapping) => mapping
				.columns
				.iter()
				.map(|column| column.source_column_name.as_str())
				.collect(),
		}
	}
}

pub(crate) fn categorical_column<'a>(
	frame: &'a DataFrame,
	name: &str,
) -> Result<&'a CategoricalColumn, EncodeError> {
	frame
		.column(name)
		.ok_or_else(|| EncodeError::MissingColumn {
			column: name.to_owned(),
		})?
		.as_categorical()
		.ok_or_else(|| EncodeError::NotCategorical {
			column: name.to_owned(),
		})
}

/// Count the rows holding each of the column's options. Categories are the options with a nonzero count. An empty label is a missing value and is never counted.
pub(crate) fn option_counts(column: &CategoricalColumn) -> Vec<usize> {
	let mut counts = vec![0; column.options.len()];
	for value in column.data.iter().flatten() {
		let index = value.get() - 1;
		if !column.options[index].is_empty() {
			counts[index] += 1;
		}
	}
	counts
}

/// Look up each of the column's options in `table`, so rows can be encoded by option index instead of by string.
pub(crate) fn lookup_options<T: Copy>(
	column: &CategoricalColumn,
	table: &BTreeMap<String, T>,
) -> Vec<Option<T>> {
	column
		.options
		.iter()
		.map(|option| {
			if option.is_empty() {
				None
			} else {
				table.get(option).copied()
			}
		})
		.collect()
}

#[cfg(test)]
pub(crate) fn example_frame() -> DataFrame {
	use ic50_dataframe::Column;
	DataFrame::from_columns(vec![
		Column::Categorical(CategoricalColumn::from_labels(
			"C".to_owned(),
			vec!["A", "A", "B", "B", "B", "C", "C", "C", "C", "D"]
				.into_iter()
				.map(Some),
		)),
		Column::Number(NumberColumn::new(
			"ln_ic50".to_owned(),
			(1..=10).map(|value| value as f64).collect(),
		)),
	])
	.unwrap()
}

#[test]
fn test_mapping_json() {
	let frame = example_frame();
	let (_, mapping) = OneHotMapping::fit(&frame, &["C".to_owned()]).unwrap();
	let mapping = Mapping::OneHot(mapping);
	let json = serde_json::to_string(&mapping).unwrap();
	insta::assert_snapshot!(json, @r###"{"encoder":"one_hot","columns":[{"source_column_name":"C","categories":["A","B","C","D"]}]}"###);
	let parsed: Mapping = serde_json::from_str(&json).unwrap();
	assert_eq!(parsed, mapping);
	assert_eq!(parsed.source_column_names(), vec!["C"]);
}

#[test]
fn test_empty_labels_are_missing() {
	use ic50_dataframe::Column;
	let options = vec!["".to_owned(), "lung".to_owned(), "skin".to_owned()];
	let index = |i: usize| std::num::NonZeroUsize::new(i);
	// Build the column directly so that the empty label is one of its options.
	let tissue = CategoricalColumn {
		name: "tissue".to_owned(),
		options,
		data: vec![index(1), index(2), index(3), index(1)],
	};
	assert_eq!(option_counts(&tissue), vec![0, 1, 1]);
	let train = DataFrame::from_columns(vec![
		Column::Categorical(tissue),
		Column::Number(NumberColumn::new(
			"ln_ic50".to_owned(),
			vec![1.0, 2.0, 3.0, 4.0],
		)),
	])
	.unwrap();
	let columns = ["tissue".to_owned()];
	let (output, mapping) = OneHotMapping::fit(&train, &columns).unwrap();
	assert_eq!(mapping.columns[0].categories, vec!["lung", "skin"]);
	assert_eq!(output.features[0].name, "tissue_lung");
	assert_eq!(output.fallbacks["tissue"], 2);
	let (output, mapping) = FrequencyMapping::fit(&train, &columns).unwrap();
	assert!(!mapping.columns[0].frequencies.contains_key(""));
	assert_eq!(output.fallbacks["tissue"], 2);
	let (_, mapping) =
		TargetMapping::fit(&train, &columns, "ln_ic50", TargetEncodingOptions::default()).unwrap();
	assert!(!mapping.columns[0].smoothed_means.contains_key(""));
	let output = mapping.apply(&train).unwrap();
	assert_eq!(output.features[0].data[0], mapping.global_mean);
	assert_eq!(output.fallbacks["tissue"], 2);
}

#[test]
fn test_missing_and_non_categorical_columns() {
	let frame = example_frame();
	assert_eq!(
		OneHotMapping::fit(&frame, &["tissue".to_owned()]).unwrap_err(),
		EncodeError::MissingColumn {
			column: "tissue".to_owned()
		}
	);
	assert_eq!(
		FrequencyMapping::fit(&frame, &["ln_ic50".to_owned()]).unwrap_err(),
		EncodeError::NotCategorical {
			column: "ln_ic50".to_owned()
		}
	);
}
