use super::{categorical_column, option_counts, EncodeError, EncodeOutput};
use fnv::{FnvHashMap, FnvHashSet};
use ic50_dataframe::{DataFrame, NumberColumn};

/**
A `OneHotMapping` stores, for each source column, the sorted list of categories observed in the training rows. A column with `k` categories is encoded as `k - 1` indicator features, one for every category except the last in byte order, which serves as the reference. A value that is missing or was not seen in training is encoded as the reference, with every indicator zero.

# Example

Training categories: `["A", "B", "C"]`

| value   | C_A | C_B |
|---------|-----|-----|
| "A"     | 1   | 0   |
| "B"     | 0   | 1   |
| "C"     | 0   | 0   |
| "Z"     | 0   | 0   |
| missing | 0   | 0   |
*/
#[derive(Debug, Clone, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct OneHotMapping {
	pub columns: Vec<OneHotColumnMapping>,
}

#[derive(Debug, Clone, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct OneHotColumnMapping {
	pub source_column_name: String,
	/// The categories observed in training, sorted in byte order.
	pub categories: Vec<String>,
}

impl OneHotColumnMapping {
	/// The names of the indicator features, `<column>_<category>` for every category but the last.
	pub fn feature_names(&self) -> Vec<String> {
		let n_indicators = self.categories.len().saturating_sub(1);
		self.categories[..n_indicators]
			.iter()
			.map(|category| format!("{}_{}", self.source_column_name, category))
			.collect()
	}
}

impl OneHotMapping {
	/// Learn the categories of `columns` from `train` and encode it.
	pub fn fit(
		train: &DataFrame,
		columns: &[String],
	) -> Result<(EncodeOutput, OneHotMapping), EncodeError> {
		let mut mapping_columns = Vec::with_capacity(columns.len());
		for column_name in columns {
			let column = categorical_column(train, column_name)?;
			let mut categories: Vec<String> = column
				.options
				.iter()
				.zip(option_counts(column))
				.filter(|(_, count)| *count > 0)
				.map(|(option, _)| option.clone())
				.collect();
			categories.sort();
			tracing::debug!(
				column = column_name.as_str(),
				n_categories = categories.len(),
				"fit one hot encoding"
			);
			mapping_columns.push(OneHotColumnMapping {
				source_column_name: column_name.clone(),
				categories,
			});
		}
		let mapping = OneHotMapping {
			columns: mapping_columns,
		};
		let output = mapping.apply(train)?;
		Ok((output, mapping))
	}

	/// Encode `frame` using the categories learned in training.
	pub fn apply(&self, frame: &DataFrame) -> Result<EncodeOutput, EncodeError> {
		let mut output = EncodeOutput::default();
		for mapping in self.columns.iter() {
			let column = categorical_column(frame, &mapping.source_column_name)?;
			let feature_names = mapping.feature_names();
			let indicator_indexes: FnvHashMap<&str, usize> = mapping.categories
				[..feature_names.len()]
				.iter()
				.enumerate()
				.map(|(index, category)| (category.as_str(), index))
				.collect();
			let known: FnvHashSet<&str> = mapping
				.categories
				.iter()
				.map(|category| category.as_str())
				.collect();
			let n_rows = column.data.len();
			let mut features: Vec<Vec<f64>> = vec![vec![0.0; n_rows]; feature_names.len()];
			let mut n_fallbacks = 0;
			for (row, value) in column.iter().enumerate() {
				match value {
					Some(value) if known.contains(value) => {
						if let Some(index) = indicator_indexes.get(value) {
							features[*index][row] = 1.0;
						}
					}
					_ => n_fallbacks += 1,
				}
			}
			output.features.extend(
				feature_names
					.into_iter()
					.zip(features)
					.map(|(name, data)| NumberColumn::new(name, data)),
			);
			output
				.fallbacks
				.insert(mapping.source_column_name.clone(), n_fallbacks);
		}
		Ok(output)
	}
}

#[test]
fn test_one_hot() {
	use ic50_dataframe::{CategoricalColumn, Column};
	let train = DataFrame::from_columns(vec![Column::Categorical(CategoricalColumn::from_labels(
		"tissue".to_owned(),
		vec![Some("lung"), Some("breast"), Some("skin"), None, Some("lung")],
	))])
	.unwrap();
	let (output, mapping) = OneHotMapping::fit(&train, &["tissue".to_owned()]).unwrap();
	insta::assert_debug_snapshot!(output, @r###"
 EncodeOutput {
     features: [
         NumberColumn {
             name: "tissue_breast",
             data: [
                 0.0,
                 1.0,
                 0.0,
                 0.0,
                 0.0,
             ],
         },
         NumberColumn {
             name: "tissue_lung",
             data: [
                 1.0,
                 0.0,
                 0.0,
                 0.0,
                 1.0,
             ],
         },
     ],
     fallbacks: {
         "tissue": 1,
     },
 }
 "###);
	let test = DataFrame::from_columns(vec![Column::Categorical(CategoricalColumn::from_labels(
		"tissue".to_owned(),
		vec![Some("bone"), Some("skin"), Some("breast")],
	))])
	.unwrap();
	let output = mapping.apply(&test).unwrap();
	assert_eq!(output.features[0].data, vec![0.0, 0.0, 1.0]);
	assert_eq!(output.features[1].data, vec![0.0, 0.0, 0.0]);
	assert_eq!(output.fallbacks["tissue"], 1);
}

#[test]
fn test_one_hot_drops_last_category() {
	let frame = super::example_frame();
	let (output, mapping) = OneHotMapping::fit(&frame, &["C".to_owned()]).unwrap();
	assert_eq!(mapping.columns[0].categories, vec!["A", "B", "C", "D"]);
	let names: Vec<&str> = output
		.features
		.iter()
		.map(|feature| feature.name.as_str())
		.collect();
	assert_eq!(names, vec!["C_A", "C_B", "C_C"]);
	for row in 0..frame.nrows() {
		let ones: f64 = output.features.iter().map(|feature| feature.data[row]).sum();
		assert!(ones <= 1.0);
	}
	// The last row holds the reference category "D".
	assert!(output.features.iter().all(|feature| feature.data[9] == 0.0));
}

#[test]
fn test_one_hot_single_category() {
	use ic50_dataframe::{CategoricalColumn, Column};
	let train = DataFrame::from_columns(vec![Column::Categorical(CategoricalColumn::from_labels(
		"msi".to_owned(),
		vec![Some("MSS"), Some("MSS")],
	))])
	.unwrap();
	let (output, _) = OneHotMapping::fit(&train, &["msi".to_owned()]).unwrap();
	assert!(output.features.is_empty());
	assert_eq!(output.fallbacks["msi"], 0);
}

#[test]
fn test_one_hot_ignores_options_absent_from_rows() {
	use ic50_dataframe::{CategoricalColumn, Column};
	let full = DataFrame::from_columns(vec![Column::Categorical(CategoricalColumn::from_labels(
		"drug".to_owned(),
		vec![Some("Erlotinib"), Some("Nilotinib"), Some("Sorafenib")],
	))])
	.unwrap();
	let train = full.take_rows(&[0, 2]).unwrap();
	let (_, mapping) = OneHotMapping::fit(&train, &["drug".to_owned()]).unwrap();
	assert_eq!(mapping.columns[0].categories, vec!["Erlotinib", "Sorafenib"]);
}
