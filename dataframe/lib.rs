/*!
This crate provides a small columnar dataframe, a two dimensional table where each column has its own declared type, like a spreadsheet. It implements only what the drug sensitivity pipeline needs: loading a csv against an explicit schema, selecting rows by index, converting numeric columns to an `ndarray` matrix, and writing a frame back out as csv.
*/

#![allow(clippy::tabs_in_doc_comments)]

use ndarray::prelude::*;
use std::num::NonZeroUsize;
use thiserror::Error;

mod load;
mod write;

pub use self::load::*;

#[derive(Debug, Clone, PartialEq)]
pub struct DataFrame {
	pub columns: Vec<Column>,
}

#[derive(Debug, Clone, PartialEq)]
pub enum Column {
	Number(NumberColumn),
	Categorical(CategoricalColumn),
}

/// A `NumberColumn` stores `f64` values. Missing values are stored as `NaN`.
#[derive(Debug, Clone, PartialEq)]
pub struct NumberColumn {
	pub name: String,
	pub data: Vec<f64>,
}

/**
A `CategoricalColumn` stores each value as an index into `options`, the column's distinct labels sorted in byte order. Indexes are offset by one so that `None` can represent a missing value without taking extra space.

| value     | data      |
|-----------|-----------|
| ""        | None      |
| "breast"  | Some(1)   |
| "lung"    | Some(2)   |
*/
#[derive(Debug, Clone, PartialEq)]
pub struct CategoricalColumn {
	pub name: String,
	pub options: Vec<String>,
	pub data: Vec<Option<NonZeroUsize>>,
}

/// This is the type declared for a column when a csv is loaded.
#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Deserialize, serde::Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ColumnType {
	/// Every row must hold a finite number.
	Number,
	/// Rows may hold a finite number or a missing value.
	NullableNumber,
	/// Rows hold a string label or a missing value.
	Categorical,
}

#[derive(Debug, Error)]
pub enum DataFrameError {
	#[error("io error: {0}")]
	Io(#[from] std::io::Error),
	#[error("csv error: {0}")]
	Csv(#[from] csv::Error),
	#[error("column \"{column}\" is declared as a number but row {row} is missing a value")]
	MissingValue { column: String, row: usize },
	#[error("column \"{column}\" is declared as a number but row {row} holds \"{value}\"")]
	InvalidNumber {
		column: String,
		row: usize,
		value: String,
	},
	#[error("row {row} of column \"{column}\" is not valid utf-8")]
	InvalidUtf8 { column: String, row: usize },
	#[error("row index {index} is out of bounds for a dataframe with {n_rows} rows")]
	RowOutOfBounds { index: usize, n_rows: usize },
	#[error("column \"{column}\" has {len} rows but the dataframe has {n_rows}")]
	LengthMismatch {
		column: String,
		len: usize,
		n_rows: usize,
	},
}

impl DataFrame {
	/// Create a dataframe from columns, checking that they all have the same length.
	pub fn from_columns(columns: Vec<Column>) -> Result<Self, DataFrameError> {
		if let Some(first) = columns.first() {
			let n_rows = first.len();
			for column in columns.iter() {
				if column.len() != n_rows {
					return Err(DataFrameError::LengthMismatch {
						column: column.name().to_owned(),
						len: column.len(),
						n_rows,
					});
				}
			}
		}
		Ok(Self { columns })
	}

	pub fn ncols(&self) -> usize {
		self.columns.len()
	}

	pub fn nrows(&self) -> usize {
		self.columns.first().map(|column| column.len()).unwrap_or(0)
	}

	pub fn column_names(&self) -> Vec<&str> {
		self.columns.iter().map(|column| column.name()).collect()
	}

	pub fn column(&self, name: &str) -> Option<&Column> {
		self.columns.iter().find(|column| column.name() == name)
	}

	pub fn column_index(&self, name: &str) -> Option<usize> {
		self.columns.iter().position(|column| column.name() == name)
	}

	/// Build a new dataframe holding the rows at `indices`, in the order given. The source dataframe is left untouched.
	pub fn take_rows(&self, indices: &[usize]) -> Result<Self, DataFrameError> {
		let n_rows = self.nrows();
		if let Some(index) = indices.iter().find(|index| **index >= n_rows) {
			return Err(DataFrameError::RowOutOfBounds {
				index: *index,
				n_rows,
			});
		}
		let columns = self
			.columns
			.iter()
			.map(|column| column.take_rows(indices))
			.collect();
		Ok(Self { columns })
	}

	/// Convert the dataframe to a matrix with one row per example and one column per dataframe column. This returns `None` if any column is not a number column.
	pub fn to_array(&self) -> Option<Array2<f64>> {
		let mut array = Array2::zeros((self.nrows(), self.ncols()));
		for (mut array_column, column) in array.axis_iter_mut(Axis(1)).zip(self.columns.iter()) {
			let column = column.as_number()?;
			for (a, b) in array_column.iter_mut().zip(column.data.iter()) {
				*a = *b;
			}
		}
		Some(array)
	}
}

impl Column {
	pub fn len(&self) -> usize {
		match self {
			Self::Number(s) => s.data.len(),
			Self::Categorical(s) => s.data.len(),
		}
	}

	pub fn is_empty(&self) -> bool {
		self.len() == 0
	}

	pub fn name(&self) -> &str {
		match self {
			Self::Number(s) => s.name.as_str(),
			Self::Categorical(s) => s.name.as_str(),
		}
	}

	pub fn as_number(&self) -> Option<&NumberColumn> {
		match self {
			Self::Number(s) => Some(s),
			_ => None,
		}
	}

	pub fn as_categorical(&self) -> Option<&CategoricalColumn> {
		match self {
			Self::Categorical(s) => Some(s),
			_ => None,
		}
	}

	fn take_rows(&self, indices: &[usize]) -> Self {
		match self {
			Self::Number(column) => Self::Number(NumberColumn {
				name: column.name.clone(),
				data: indices.iter().map(|index| column.data[*index]).collect(),
			}),
			Self::Categorical(column) => Self::Categorical(CategoricalColumn {
				name: column.name.clone(),
				options: column.options.clone(),
				data: indices.iter().map(|index| column.data[*index]).collect(),
			}),
		}
	}
}

impl NumberColumn {
	pub fn new(name: String, data: Vec<f64>) -> Self {
		Self { name, data }
	}
}

impl CategoricalColumn {
	/// Create a categorical column from string labels, where `None` or an empty label marks a missing value.
	pub fn from_labels<'a>(name: String, labels: impl IntoIterator<Item = Option<&'a str>>) -> Self {
		let labels: Vec<Option<&str>> = labels
			.into_iter()
			.map(|label| label.filter(|label| !label.is_empty()))
			.collect();
		let mut options: Vec<String> = labels
			.iter()
			.filter_map(|label| label.map(|label| label.to_owned()))
			.collect();
		options.sort();
		options.dedup();
		let data = labels
			.iter()
			.map(|label| {
				label.and_then(|label| {
					options
						.binary_search_by(|option| option.as_str().cmp(label))
						.ok()
						.and_then(|position| NonZeroUsize::new(position + 1))
				})
			})
			.collect();
		Self {
			name,
			options,
			data,
		}
	}

	/// Retrieve the label for the value at `index`.
	pub fn value(&self, index: usize) -> Option<&str> {
		self.data[index].map(|option| self.options[option.get() - 1].as_str())
	}

	/// Iterate over the labels in this column, yielding `None` for missing values.
	pub fn iter(&self) -> impl Iterator<Item = Option<&str>> {
		self.data
			.iter()
			.map(move |value| value.map(|option| self.options[option.get() - 1].as_str()))
	}
}

#[test]
fn test_take_rows() {
	let dataframe = DataFrame::from_columns(vec![
		Column::Number(NumberColumn::new("dose".to_owned(), vec![1.0, 2.0, 3.0])),
		Column::Categorical(CategoricalColumn::from_labels(
			"tissue".to_owned(),
			vec![Some("lung"), None, Some("breast")],
		)),
	])
	.unwrap();
	let taken = dataframe.take_rows(&[2, 0]).unwrap();
	assert_eq!(taken.nrows(), 2);
	assert_eq!(taken.column("dose").unwrap().as_number().unwrap().data, vec![3.0, 1.0]);
	let tissue = taken.column("tissue").unwrap().as_categorical().unwrap();
	assert_eq!(tissue.iter().collect::<Vec<_>>(), vec![Some("breast"), Some("lung")]);
	assert!(matches!(
		dataframe.take_rows(&[3]),
		Err(DataFrameError::RowOutOfBounds {
			index: 3,
			n_rows: 3
		})
	));
}

#[test]
fn test_from_labels_sorts_options_by_bytes() {
	let column = CategoricalColumn::from_labels(
		"cell_line".to_owned(),
		vec![Some("b"), Some("B"), Some("a"), None],
	);
	insta::assert_debug_snapshot!(column.options, @r###"
 [
     "B",
     "a",
     "b",
 ]
 "###);
	assert_eq!(column.value(0), Some("b"));
	assert_eq!(column.value(3), None);
}

#[test]
fn test_from_labels_treats_empty_labels_as_missing() {
	let column = CategoricalColumn::from_labels(
		"tissue".to_owned(),
		vec![Some(""), Some("lung"), Some("skin"), Some("")],
	);
	assert_eq!(column.options, vec!["lung".to_owned(), "skin".to_owned()]);
	assert_eq!(
		column.iter().collect::<Vec<_>>(),
		vec![None, Some("lung"), Some("skin"), None]
	);
}

#[test]
fn test_to_array() {
	let dataframe = DataFrame::from_columns(vec![
		Column::Number(NumberColumn::new("a".to_owned(), vec![1.0, 2.0])),
		Column::Number(NumberColumn::new("b".to_owned(), vec![3.0, 4.0])),
	])
	.unwrap();
	assert_eq!(dataframe.to_array().unwrap(), arr2(&[[1.0, 3.0], [2.0, 4.0]]));
	let mismatched = DataFrame::from_columns(vec![
		Column::Number(NumberColumn::new("a".to_owned(), vec![1.0, 2.0])),
		Column::Number(NumberColumn::new("b".to_owned(), vec![3.0])),
	]);
	assert!(matches!(mismatched, Err(DataFrameError::LengthMismatch { .. })));
}
