use super::*;
use std::{
	collections::{BTreeMap, BTreeSet},
	path::Path,
};

#[derive(Clone, Debug)]
pub struct FromCsvOptions<'a> {
	/// The declared type for each column. Columns that are not listed here have their type inferred.
	pub column_types: Option<BTreeMap<String, ColumnType>>,
	/// Values that are treated as missing.
	pub invalid_values: &'a [&'a str],
}

impl<'a> Default for FromCsvOptions<'a> {
	fn default() -> Self {
		Self {
			column_types: None,
			invalid_values: DEFAULT_INVALID_VALUES,
		}
	}
}

/// These values are the default values that are considered missing.
pub const DEFAULT_INVALID_VALUES: &[&str] = &[
	"", "null", "NULL", "n/a", "N/A", "NA", "nan", "-nan", "NaN", "-NaN", "?",
];

impl DataFrame {
	pub fn from_path(path: &Path, options: FromCsvOptions) -> Result<Self, DataFrameError> {
		Self::from_csv(&mut csv::Reader::from_path(path)?, options)
	}

	/**
	Load a dataframe from a csv reader. The reader is read twice. The first pass infers the type of every column without a declared type and collects the distinct labels of every categorical column. The second pass parses the values.
	*/
	pub fn from_csv<R>(
		reader: &mut csv::Reader<R>,
		options: FromCsvOptions,
	) -> Result<Self, DataFrameError>
	where
		R: std::io::Read + std::io::Seek,
	{
		let column_names: Vec<String> = reader
			.headers()?
			.into_iter()
			.map(|column_name| column_name.to_owned())
			.collect();
		let start_position = reader.position().clone();
		let invalid_values = options.invalid_values;

		// Retrieve any column types present in the options.
		let declared_column_types: Vec<Option<ColumnType>> = column_names
			.iter()
			.map(|column_name| {
				options
					.column_types
					.as_ref()
					.and_then(|column_types| column_types.get(column_name).cloned())
			})
			.collect();

		// Number columns with a declared type need no stats. Every other column needs the first pass.
		let mut infer_stats: Vec<Option<InferStats>> = declared_column_types
			.iter()
			.map(|column_type| match column_type {
				Some(ColumnType::Number) | Some(ColumnType::NullableNumber) => None,
				Some(ColumnType::Categorical) => Some(InferStats::categorical()),
				None => Some(InferStats::new()),
			})
			.collect();
		let mut n_rows = 0;
		let mut record = csv::StringRecord::new();
		while reader.read_record(&mut record)? {
			n_rows += 1;
			for (stats, value) in infer_stats.iter_mut().zip(record.iter()) {
				if let Some(stats) = stats {
					stats.update(value, invalid_values);
				}
			}
		}
		reader.seek(start_position)?;

		// Create the empty columns.
		let mut columns: Vec<Column> = column_names
			.into_iter()
			.zip(declared_column_types.iter())
			.zip(infer_stats.into_iter())
			.map(|((name, column_type), stats)| match (column_type, stats) {
				(Some(ColumnType::Number), _) | (Some(ColumnType::NullableNumber), _) => {
					Column::Number(NumberColumn::new(name, Vec::with_capacity(n_rows)))
				}
				(_, Some(stats)) => stats.finalize(name, n_rows),
				(_, None) => Column::Number(NumberColumn::new(name, Vec::with_capacity(n_rows))),
			})
			.collect();
		let nullable: Vec<bool> = declared_column_types
			.iter()
			.map(|column_type| *column_type != Some(ColumnType::Number))
			.collect();

		// Read each csv record and insert the values into the columns of the dataframe.
		let mut record = csv::ByteRecord::new();
		let mut row = 0;
		while reader.read_byte_record(&mut record)? {
			for ((column, value), nullable) in
				columns.iter_mut().zip(record.iter()).zip(nullable.iter())
			{
				let value = std::str::from_utf8(value).map_err(|_| DataFrameError::InvalidUtf8 {
					column: column.name().to_owned(),
					row,
				})?;
				let is_invalid = invalid_values.contains(&value);
				match column {
					Column::Number(column) => {
						let value = if is_invalid {
							if !*nullable {
								return Err(DataFrameError::MissingValue {
									column: column.name.clone(),
									row,
								});
							}
							f64::NAN
						} else {
							match lexical::parse::<f64, _>(value) {
								Ok(parsed) if parsed.is_finite() => parsed,
								_ => {
									return Err(DataFrameError::InvalidNumber {
										column: column.name.clone(),
										row,
										value: value.to_owned(),
									})
								}
							}
						};
						column.data.push(value);
					}
					Column::Categorical(column) => {
						let value = if is_invalid {
							None
						} else {
							column
								.options
								.binary_search_by(|option| option.as_str().cmp(value))
								.ok()
								.and_then(|position| NonZeroUsize::new(position + 1))
						};
						column.data.push(value);
					}
				}
			}
			row += 1;
		}
		Ok(DataFrame { columns })
	}
}

#[derive(Clone, Debug)]
struct InferStats {
	column_type: InferColumnType,
	unique_values: BTreeSet<String>,
}

#[derive(PartialEq, Clone, Copy, Debug)]
enum InferColumnType {
	Unknown,
	Number,
	Categorical,
}

impl InferStats {
	fn new() -> Self {
		Self {
			column_type: InferColumnType::Unknown,
			unique_values: BTreeSet::new(),
		}
	}

	fn categorical() -> Self {
		Self {
			column_type: InferColumnType::Categorical,
			unique_values: BTreeSet::new(),
		}
	}

	fn update(&mut self, value: &str, invalid_values: &[&str]) {
		if invalid_values.contains(&value) {
			return;
		}
		if !self.unique_values.contains(value) {
			self.unique_values.insert(value.to_owned());
		}
		if self.column_type != InferColumnType::Categorical {
			let is_number = lexical::parse::<f64, _>(value)
				.map(|value| value.is_finite())
				.unwrap_or(false);
			self.column_type = if is_number {
				InferColumnType::Number
			} else {
				InferColumnType::Categorical
			};
		}
	}

	fn finalize(self, name: String, n_rows: usize) -> Column {
		match self.column_type {
			// A column with no valid values carries no information, so it is loaded as an all missing number column.
			InferColumnType::Unknown | InferColumnType::Number => {
				Column::Number(NumberColumn::new(name, Vec::with_capacity(n_rows)))
			}
			InferColumnType::Categorical => Column::Categorical(CategoricalColumn {
				name,
				options: self.unique_values.into_iter().collect(),
				data: Vec::with_capacity(n_rows),
			}),
		}
	}
}

#[test]
fn test_infer() {
	let csv = r#"dose,tissue,ln_ic50
1,lung,2.5
2,breast,
"#;
	let df = DataFrame::from_csv(
		&mut csv::Reader::from_reader(std::io::Cursor::new(csv)),
		FromCsvOptions::default(),
	)
	.unwrap();
	insta::assert_debug_snapshot!(df, @r###"
 DataFrame {
     columns: [
         Number(
             NumberColumn {
                 name: "dose",
                 data: [
                     1.0,
                     2.0,
                 ],
             },
         ),
         Categorical(
             CategoricalColumn {
                 name: "tissue",
                 options: [
                     "breast",
                     "lung",
                 ],
                 data: [
                     Some(
                         2,
                     ),
                     Some(
                         1,
                     ),
                 ],
             },
         ),
         Number(
             NumberColumn {
                 name: "ln_ic50",
                 data: [
                     2.5,
                     NaN,
                 ],
             },
         ),
     ],
 }
 "###);
}

#[test]
fn test_column_types() {
	let csv = r#"cosmic_id,dose
906826,1.5
687983,
"#;
	let mut column_types = BTreeMap::new();
	column_types.insert("cosmic_id".to_owned(), ColumnType::Categorical);
	column_types.insert("dose".to_owned(), ColumnType::NullableNumber);
	let df = DataFrame::from_csv(
		&mut csv::Reader::from_reader(std::io::Cursor::new(csv)),
		FromCsvOptions {
			column_types: Some(column_types),
			..Default::default()
		},
	)
	.unwrap();
	let cosmic_id = df.column("cosmic_id").unwrap().as_categorical().unwrap();
	assert_eq!(cosmic_id.options, vec!["687983".to_owned(), "906826".to_owned()]);
	assert_eq!(cosmic_id.value(0), Some("906826"));
	let dose = df.column("dose").unwrap().as_number().unwrap();
	assert_eq!(dose.data[0], 1.5);
	assert!(dose.data[1].is_nan());
}

#[test]
fn test_missing_value_in_number_column() {
	let csv = "dose\n1.5\n\"\"\n";
	let mut column_types = BTreeMap::new();
	column_types.insert("dose".to_owned(), ColumnType::Number);
	let result = DataFrame::from_csv(
		&mut csv::Reader::from_reader(std::io::Cursor::new(csv)),
		FromCsvOptions {
			column_types: Some(column_types),
			..Default::default()
		},
	);
	assert!(matches!(
		result,
		Err(DataFrameError::MissingValue { row: 1, .. })
	));
}

#[test]
fn test_invalid_number() {
	let csv = "dose\n1.5\nhigh\n";
	let mut column_types = BTreeMap::new();
	column_types.insert("dose".to_owned(), ColumnType::NullableNumber);
	let result = DataFrame::from_csv(
		&mut csv::Reader::from_reader(std::io::Cursor::new(csv)),
		FromCsvOptions {
			column_types: Some(column_types),
			..Default::default()
		},
	);
	assert!(matches!(
		result,
		Err(DataFrameError::InvalidNumber { row: 1, .. })
	));
}
