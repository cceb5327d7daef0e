use super::{categorical_column, lookup_options, option_counts, EncodeError, EncodeOutput};
use ic50_dataframe::{DataFrame, NumberColumn};
use num_traits::ToPrimitive;
use std::collections::BTreeMap;

/// The step added per rank so that categories with equal counts still receive distinct values.
pub const FREQUENCY_TIE_BREAK: f64 = 1e-8;

/**
A `FrequencyMapping` encodes each category as the share of non-missing training rows that hold it, plus a tie-breaker of `rank * 1e-8`, where `rank` is the category's 1-based position in byte order. The tie-breaker keeps two categories with the same count from receiving the same value. A value that is missing or was not seen in training is encoded as the smallest adjusted frequency in the mapping.

# Example

| value | count | rank | adjusted frequency |
|-------|-------|------|--------------------|
| "A"   | 1     | 1    | 0.25 + 1e-8        |
| "B"   | 2     | 2    | 0.50 + 2e-8        |
| "C"   | 1     | 3    | 0.25 + 3e-8        |
*/
#[derive(Debug, Clone, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct FrequencyMapping {
	pub columns: Vec<FrequencyColumnMapping>,
}

#[derive(Debug, Clone, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct FrequencyColumnMapping {
	pub source_column_name: String,
	pub frequencies: BTreeMap<String, f64>,
}

impl FrequencyColumnMapping {
	pub fn feature_name(&self) -> String {
		format!("{}_FreqEnc", self.source_column_name)
	}

	/// The value given to missing and unseen categories.
	pub fn fallback(&self) -> f64 {
		self.frequencies
			.values()
			.copied()
			.fold(None, |min: Option<f64>, value| {
				Some(min.map_or(value, |min| min.min(value)))
			})
			.unwrap_or(0.0)
	}
}

impl FrequencyMapping {
	/// Compute the adjusted frequency of every category of `columns` in `train` and encode it.
	pub fn fit(
		train: &DataFrame,
		columns: &[String],
	) -> Result<(EncodeOutput, FrequencyMapping), EncodeError> {
		let mut mapping_columns = Vec::with_capacity(columns.len());
		for column_name in columns {
			let column = categorical_column(train, column_name)?;
			let mut counts: Vec<(&str, usize)> = column
				.options
				.iter()
				.zip(option_counts(column))
				.filter(|(_, count)| *count > 0)
				.map(|(option, count)| (option.as_str(), count))
				.collect();
			counts.sort_by(|a, b| a.0.cmp(b.0));
			let n_values = counts.iter().map(|(_, count)| count).sum::<usize>();
			let n_values = n_values.to_f64().unwrap_or(f64::NAN);
			let frequencies = counts
				.iter()
				.enumerate()
				.map(|(index, (category, count))| {
					let rank = (index + 1).to_f64().unwrap_or(f64::NAN);
					let frequency = count.to_f64().unwrap_or(f64::NAN) / n_values;
					((*category).to_owned(), frequency + rank * FREQUENCY_TIE_BREAK)
				})
				.collect::<BTreeMap<_, _>>();
			tracing::debug!(
				column = column_name.as_str(),
				n_categories = frequencies.len(),
				"fit frequency encoding"
			);
			mapping_columns.push(FrequencyColumnMapping {
				source_column_name: column_name.clone(),
				frequencies,
			});
		}
		let mapping = FrequencyMapping {
			columns: mapping_columns,
		};
		let output = mapping.apply(train)?;
		Ok((output, mapping))
	}

	/// Encode `frame` using the frequencies learned in training.
	pub fn apply(&self, frame: &DataFrame) -> Result<EncodeOutput, EncodeError> {
		let mut output = EncodeOutput::default();
		for mapping in self.columns.iter() {
			let column = categorical_column(frame, &mapping.source_column_name)?;
			let fallback = mapping.fallback();
			let values = lookup_options(column, &mapping.frequencies);
			let mut n_fallbacks = 0;
			let data = column
				.data
				.iter()
				.map(|value| {
					match value.and_then(|value| values[value.get() - 1]) {
						Some(frequency) => frequency,
						None => {
							n_fallbacks += 1;
							fallback
						}
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

#[test]
fn test_frequency() {
	let frame = super::example_frame();
	let (output, mapping) = FrequencyMapping::fit(&frame, &["C".to_owned()]).unwrap();
	let frequencies = &mapping.columns[0].frequencies;
	assert!(frequencies["B"] > frequencies["A"]);
	assert!(frequencies["C"] > frequencies["B"]);
	assert!(frequencies["D"] < frequencies["A"]);
	let raw_sum: f64 = frequencies
		.values()
		.enumerate()
		.map(|(index, value)| value - (index + 1) as f64 * FREQUENCY_TIE_BREAK)
		.sum();
	assert!((raw_sum - 1.0).abs() < 1e-12);
	assert_eq!(output.features[0].name, "C_FreqEnc");
	assert_eq!(output.features[0].data[0], frequencies["A"]);
	assert_eq!(output.features[0].data[9], frequencies["D"]);
	assert_eq!(output.fallbacks["C"], 0);
}

#[test]
fn test_frequency_ties_are_broken_by_rank() {
	use ic50_dataframe::{CategoricalColumn, Column};
	let train = DataFrame::from_columns(vec![Column::Categorical(CategoricalColumn::from_labels(
		"drug".to_owned(),
		vec![Some("Sorafenib"), Some("Erlotinib"), Some("Nilotinib"), Some("Nilotinib")],
	))])
	.unwrap();
	let (output, mapping) = FrequencyMapping::fit(&train, &["drug".to_owned()]).unwrap();
	let frequencies = &mapping.columns[0].frequencies;
	// Erlotinib and Sorafenib both hold one row. Erlotinib sorts first, so it gets the smaller value.
	assert!(frequencies["Erlotinib"] < frequencies["Sorafenib"]);
	assert_eq!(frequencies["Erlotinib"], 0.25 + FREQUENCY_TIE_BREAK);
	assert_eq!(frequencies["Sorafenib"], 0.25 + 3.0 * FREQUENCY_TIE_BREAK);
	assert_ne!(output.features[0].data[0], output.features[0].data[1]);
	assert_eq!(mapping.columns[0].fallback(), frequencies["Erlotinib"]);
}

#[test]
fn test_frequency_fallback() {
	use ic50_dataframe::{CategoricalColumn, Column};
	let train = DataFrame::from_columns(vec![Column::Categorical(CategoricalColumn::from_labels(
		"cell_line".to_owned(),
		vec![Some("A549"), Some("A549"), Some("HeLa"), None],
	))])
	.unwrap();
	let (output, mapping) = FrequencyMapping::fit(&train, &["cell_line".to_owned()]).unwrap();
	let hela = 1.0 / 3.0 + 2.0 * FREQUENCY_TIE_BREAK;
	assert_eq!(mapping.columns[0].fallback(), hela);
	assert_eq!(output.features[0].data[3], hela);
	assert_eq!(output.fallbacks["cell_line"], 1);
	let test = DataFrame::from_columns(vec![Column::Categorical(CategoricalColumn::from_labels(
		"cell_line".to_owned(),
		vec![Some("MCF7"), Some("A549")],
	))])
	.unwrap();
	let output = mapping.apply(&test).unwrap();
	assert_eq!(output.features[0].data[0], hela);
	assert_eq!(
		output.features[0].data[1],
		2.0 / 3.0 + FREQUENCY_TIE_BREAK
	);
	assert_eq!(output.fallbacks["cell_line"], 1);
}
