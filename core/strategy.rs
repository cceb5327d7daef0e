use crate::Error;
use ic50_dataframe::{Column, DataFrame, NumberColumn};
use ic50_features::{
	EncodeOutput, FrequencyMapping, Mapping, OneHotMapping, TargetEncodingOptions, TargetMapping,
};
use std::{
	collections::BTreeMap,
	fs::File,
	io::{BufReader, BufWriter},
	path::Path,
};

/// A column's cardinality tier, which decides the encoder it receives.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Tier {
	Low,
	Medium,
	High,
}

impl Tier {
	pub const ALL: [Tier; 3] = [Tier::Low, Tier::Medium, Tier::High];

	pub fn as_str(&self) -> &'static str {
		match self {
			Tier::Low => "low",
			Tier::Medium => "medium",
			Tier::High => "high",
		}
	}
}

impl std::fmt::Display for Tier {
	fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
		f.write_str(self.as_str())
	}
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Encoder {
	OneHot,
	Frequency,
	Target,
}

/**
A named assignment of encoders to tiers.

| strategy                   | low     | medium    | high      |
|----------------------------|---------|-----------|-----------|
| `all_one_hot`              | one hot | one hot   | one hot   |
| `one_hot_frequency`        | one hot | frequency | frequency |
| `one_hot_target`           | one hot | target    | target    |
| `one_hot_frequency_target` | one hot | frequency | target    |
*/
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Strategy {
	AllOneHot,
	OneHotFrequency,
	OneHotTarget,
	OneHotFrequencyTarget,
}

impl Strategy {
	pub const ALL: [Strategy; 4] = [
		Strategy::AllOneHot,
		Strategy::OneHotFrequency,
		Strategy::OneHotTarget,
		Strategy::OneHotFrequencyTarget,
	];

	pub fn as_str(&self) -> &'static str {
		match self {
			Strategy::AllOneHot => "all_one_hot",
			Strategy::OneHotFrequency => "one_hot_frequency",
			Strategy::OneHotTarget => "one_hot_target",
			Strategy::OneHotFrequencyTarget => "one_hot_frequency_target",
		}
	}

	pub fn encoder(&self, tier: Tier) -> Encoder {
		match (self, tier) {
			(_, Tier::Low) | (Strategy::AllOneHot, _) => Encoder::OneHot,
			(Strategy::OneHotFrequency, _) => Encoder::Frequency,
			(Strategy::OneHotTarget, _) => Encoder::Target,
			(Strategy::OneHotFrequencyTarget, Tier::Medium) => Encoder::Frequency,
			(Strategy::OneHotFrequencyTarget, Tier::High) => Encoder::Target,
		}
	}
}

impl std::fmt::Display for Strategy {
	fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
		f.write_str(self.as_str())
	}
}

impl std::str::FromStr for Strategy {
	type Err = Error;
	fn from_str(name: &str) -> Result<Strategy, Error> {
		Strategy::ALL
			.iter()
			.find(|strategy| strategy.as_str() == name)
			.copied()
			.ok_or_else(|| Error::UnknownStrategy {
				name: name.to_owned(),
			})
	}
}

/// The columns assigned to each tier. Names are matched exactly and are case sensitive.
#[derive(Debug, Clone, Default, PartialEq, serde::Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ColumnTiers {
	#[serde(default)]
	pub low: Vec<String>,
	#[serde(default)]
	pub medium: Vec<String>,
	#[serde(default)]
	pub high: Vec<String>,
}

impl ColumnTiers {
	pub fn columns(&self, tier: Tier) -> &[String] {
		match tier {
			Tier::Low => &self.low,
			Tier::Medium => &self.medium,
			Tier::High => &self.high,
		}
	}

	/// Check that no column is assigned to a tier more than once.
	pub fn validate(&self) -> Result<(), Error> {
		let mut assigned: BTreeMap<&str, Tier> = BTreeMap::new();
		for tier in Tier::ALL.iter().copied() {
			for column in self.columns(tier) {
				if let Some(first) = assigned.insert(column.as_str(), tier) {
					return Err(Error::ColumnTierConflict {
						column: column.clone(),
						first,
						second: tier,
					});
				}
			}
		}
		Ok(())
	}

	pub fn contains(&self, column: &str) -> bool {
		Tier::ALL
			.iter()
			.any(|tier| self.columns(*tier).iter().any(|name| name == column))
	}
}

/// The encoded training and test rows of one strategy, and the mappings that produced them.
#[derive(Debug, Clone, PartialEq)]
pub struct Encoded {
	pub train: DataFrame,
	pub test: DataFrame,
	pub mappings: MappingBundle,
}

/**
Everything needed to replay a strategy's transformation on new rows: the numeric columns passed through unchanged, the mapping fit for each tier, and the target column. Tiers without columns have no mapping.
*/
#[derive(Debug, Clone, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct MappingBundle {
	pub strategy: Strategy,
	pub target_column: String,
	pub passthrough_columns: Vec<String>,
	pub tiers: BTreeMap<Tier, Mapping>,
}

impl MappingBundle {
	/// Encode `dataframe` with the persisted mappings. The target column is copied to the end of the output if `dataframe` has it.
	pub fn apply(&self, dataframe: &DataFrame) -> Result<DataFrame, Error> {
		let mut columns = passthrough(dataframe, &self.passthrough_columns, "new")?;
		for (tier, mapping) in self.tiers.iter() {
			let output = mapping.apply(dataframe)?;
			log_fallbacks(self.strategy, *tier, "new", &output);
			columns.extend(output.features.into_iter().map(Column::Number));
		}
		if let Some(target) = dataframe.column(&self.target_column) {
			columns.push(target.clone());
		}
		Ok(DataFrame::from_columns(columns)?)
	}

	pub fn write(&self, path: &Path) -> Result<(), Error> {
		let writer = BufWriter::new(File::create(path)?);
		serde_json::to_writer_pretty(writer, self)?;
		Ok(())
	}

	pub fn read(path: &Path) -> Result<MappingBundle, Error> {
		let reader = BufReader::new(File::open(path)?);
		Ok(serde_json::from_reader(reader)?)
	}
}

/// These are the inputs to [`encode`](fn.encode.html).
pub struct EncodeInput<'a> {
	pub train: &'a DataFrame,
	pub test: &'a DataFrame,
	pub strategy: Strategy,
	pub tiers: &'a ColumnTiers,
	pub target_column: &'a str,
	pub target_encoding: TargetEncodingOptions,
}

/**
Encode the training and test rows with `strategy`. Every mapping is fit on the training rows only and then applied unchanged to the test rows.

The output frames hold the numeric columns that are in no tier, then the encoded low, medium and high tier columns, then the target column. Categorical columns that are in no tier are dropped.
*/
pub fn encode(input: EncodeInput) -> Result<Encoded, Error> {
	let EncodeInput {
		train,
		test,
		strategy,
		tiers,
		target_column,
		target_encoding,
	} = input;
	tiers.validate()?;
	target_encoding.validate()?;
	for (table, dataframe) in [("training", train), ("test", test)].iter() {
		check_columns(dataframe, tiers, target_column, *table)?;
	}
	let mut passthrough_columns = Vec::new();
	for column in train.columns.iter() {
		let name = column.name();
		if name == target_column || tiers.contains(name) {
			continue;
		}
		match column {
			Column::Number(_) => passthrough_columns.push(name.to_owned()),
			Column::Categorical(_) => {
				tracing::warn!(column = name, "dropping a categorical column that is in no tier")
			}
		}
	}
	let mut train_columns = passthrough(train, &passthrough_columns, "training")?;
	let mut mappings = BTreeMap::new();
	for tier in Tier::ALL.iter().copied() {
		let columns = tiers.columns(tier);
		if columns.is_empty() {
			continue;
		}
		let (output, mapping) = match strategy.encoder(tier) {
			Encoder::OneHot => {
				let (output, mapping) = OneHotMapping::fit(train, columns)?;
				(output, Mapping::OneHot(mapping))
			}
			Encoder::Frequency => {
				let (output, mapping) = FrequencyMapping::fit(train, columns)?;
				(output, Mapping::Frequency(mapping))
			}
			Encoder::Target => {
				let (output, mapping) =
					TargetMapping::fit(train, columns, target_column, target_encoding)?;
				(output, Mapping::Target(mapping))
			}
		};
		tracing::debug!(
			strategy = strategy.as_str(),
			tier = tier.as_str(),
			n_features = output.features.len(),
			"fit tier"
		);
		log_fallbacks(strategy, tier, "training", &output);
		train_columns.extend(output.features.into_iter().map(Column::Number));
		mappings.insert(tier, mapping);
	}
	if let Some(target) = train.column(target_column) {
		train_columns.push(target.clone());
	}
	let mappings = MappingBundle {
		strategy,
		target_column: target_column.to_owned(),
		passthrough_columns,
		tiers: mappings,
	};
	let train = DataFrame::from_columns(train_columns)?;
	let test = mappings.apply(test)?;
	tracing::info!(
		strategy = strategy.as_str(),
		n_features = train.ncols() - 1,
		"encoded"
	);
	Ok(Encoded {
		train,
		test,
		mappings,
	})
}

fn check_columns(
	dataframe: &DataFrame,
	tiers: &ColumnTiers,
	target_column: &str,
	table: &'static str,
) -> Result<(), Error> {
	for tier in Tier::ALL.iter() {
		for name in tiers.columns(*tier) {
			match dataframe.column(name) {
				None => {
					return Err(Error::MissingColumn {
						column: name.clone(),
						table,
					})
				}
				Some(Column::Number(_)) => {
					return Err(Error::InvalidColumnType {
						column: name.clone(),
						expected: "categorical to be assigned to a tier",
					})
				}
				Some(Column::Categorical(_)) => {}
			}
		}
	}
	match dataframe.column(target_column) {
		None => Err(Error::MissingColumn {
			column: target_column.to_owned(),
			table,
		}),
		Some(Column::Categorical(_)) => Err(Error::InvalidColumnType {
			column: target_column.to_owned(),
			expected: "numeric to be the target",
		}),
		Some(Column::Number(_)) => Ok(()),
	}
}

fn passthrough(
	dataframe: &DataFrame,
	names: &[String],
	table: &'static str,
) -> Result<Vec<Column>, Error> {
	names
		.iter()
		.map(|name| match dataframe.column(name) {
			Some(Column::Number(column)) => Ok(Column::Number(NumberColumn::new(
				column.name.clone(),
				column.data.clone(),
			))),
			Some(Column::Categorical(_)) => Err(Error::InvalidColumnType {
				column: name.clone(),
				expected: "numeric",
			}),
			None => Err(Error::MissingColumn {
				column: name.clone(),
				table,
			}),
		})
		.collect()
}

fn log_fallbacks(strategy: Strategy, tier: Tier, table: &str, output: &EncodeOutput) {
	for (column, n_fallbacks) in output.fallbacks.iter() {
		if *n_fallbacks > 0 {
			tracing::info!(
				strategy = strategy.as_str(),
				tier = tier.as_str(),
				column = column.as_str(),
				table,
				n_fallbacks = *n_fallbacks,
				"encoded missing or unseen categories with the fallback value"
			);
		}
	}
}

#[cfg(test)]
fn example() -> (DataFrame, ColumnTiers) {
	use ic50_dataframe::CategoricalColumn;
	let dataframe = DataFrame::from_columns(vec![
		Column::Number(NumberColumn::new(
			"dose".to_owned(),
			(0..10).map(|i| i as f64 * 0.5).collect(),
		)),
		Column::Categorical(CategoricalColumn::from_labels(
			"msi".to_owned(),
			vec!["MSS", "MSI-H", "MSS", "MSS", "MSI-H", "MSS", "MSS", "MSS", "MSI-H", "MSS"]
				.into_iter()
				.map(Some),
		)),
		Column::Categorical(CategoricalColumn::from_labels(
			"tissue".to_owned(),
			vec!["lung", "skin", "lung", "blood", "skin", "lung", "blood", "skin", "lung", "bone"]
				.into_iter()
				.map(Some),
		)),
		Column::Categorical(CategoricalColumn::from_labels(
			"C".to_owned(),
			vec!["A", "A", "B", "B", "B", "C", "C", "C", "C", "D"]
				.into_iter()
				.map(Some),
		)),
		Column::Categorical(CategoricalColumn::from_labels(
			"comment".to_owned(),
			(0..10).map(|_| Some("n/a")),
		)),
		Column::Number(NumberColumn::new(
			"ln_ic50".to_owned(),
			(1..=10).map(|i| i as f64).collect(),
		)),
	])
	.unwrap();
	let tiers = ColumnTiers {
		low: vec!["msi".to_owned()],
		medium: vec!["tissue".to_owned()],
		high: vec!["C".to_owned()],
	};
	(dataframe, tiers)
}

#[test]
fn test_strategy_names() {
	for strategy in Strategy::ALL.iter() {
		assert_eq!(strategy.as_str().parse::<Strategy>().unwrap(), *strategy);
	}
	assert!(matches!(
		"target_only".parse::<Strategy>(),
		Err(Error::UnknownStrategy { .. })
	));
	assert_eq!(
		Strategy::OneHotFrequencyTarget.encoder(Tier::Medium),
		Encoder::Frequency
	);
	assert_eq!(
		Strategy::OneHotFrequencyTarget.encoder(Tier::High),
		Encoder::Target
	);
	assert_eq!(Strategy::OneHotTarget.encoder(Tier::Low), Encoder::OneHot);
}

#[test]
fn test_tier_conflict() {
	let tiers = ColumnTiers {
		low: vec!["tissue".to_owned()],
		medium: vec![],
		high: vec!["cell_line".to_owned(), "tissue".to_owned()],
	};
	assert!(matches!(
		tiers.validate(),
		Err(Error::ColumnTierConflict { column, first: Tier::Low, second: Tier::High }) if column == "tissue"
	));
}

#[test]
fn test_encode() {
	let (dataframe, tiers) = example();
	let split = crate::split(10, 0.8, 42).unwrap();
	let (train, test) = split.slices(&dataframe).unwrap();
	let encoded = encode(EncodeInput {
		train: &train,
		test: &test,
		strategy: Strategy::OneHotFrequencyTarget,
		tiers: &tiers,
		target_column: "ln_ic50",
		target_encoding: TargetEncodingOptions::default(),
	})
	.unwrap();
	assert_eq!(encoded.train.nrows(), 8);
	assert_eq!(encoded.test.nrows(), 2);
	assert_eq!(
		encoded.train.column_names(),
		encoded.test.column_names()
	);
	let names = encoded.train.column_names();
	assert_eq!(names[0], "dose");
	assert_eq!(names[names.len() - 2], "C_TargetEnc");
	assert_eq!(names[names.len() - 1], "ln_ic50");
	assert!(names.contains(&"tissue_FreqEnc"));
	assert!(!names.contains(&"comment"));
	assert!(encoded
		.train
		.columns
		.iter()
		.all(|column| column.as_number().is_some()));
	let tiers: Vec<Tier> = encoded.mappings.tiers.keys().copied().collect();
	assert_eq!(tiers, vec![Tier::Low, Tier::Medium, Tier::High]);
	// Replaying the bundle on the test rows reproduces the encoded test rows.
	assert_eq!(encoded.mappings.apply(&test).unwrap(), encoded.test);
}

#[test]
fn test_encode_ignores_test_rows() {
	let (dataframe, tiers) = example();
	let train = dataframe.take_rows(&[0, 1, 2, 3, 4, 5, 6, 7]).unwrap();
	let encode_with = |test_rows: &[usize]| {
		let test = dataframe.take_rows(test_rows).unwrap();
		encode(EncodeInput {
			train: &train,
			test: &test,
			strategy: Strategy::OneHotTarget,
			tiers: &tiers,
			target_column: "ln_ic50",
			target_encoding: TargetEncodingOptions::default(),
		})
		.unwrap()
	};
	let a = encode_with(&[8, 9]);
	let b = encode_with(&[9, 9, 9]);
	assert_eq!(a.mappings, b.mappings);
	assert_eq!(a.train, b.train);
}

#[test]
fn test_encode_errors() {
	let (dataframe, _) = example();
	let run = |tiers: ColumnTiers, target_column: &str| {
		encode(EncodeInput {
			train: &dataframe,
			test: &dataframe,
			strategy: Strategy::AllOneHot,
			tiers: &tiers,
			target_column,
			target_encoding: TargetEncodingOptions::default(),
		})
	};
	let missing = ColumnTiers {
		low: vec!["drug".to_owned()],
		..Default::default()
	};
	assert!(matches!(
		run(missing, "ln_ic50"),
		Err(Error::MissingColumn { column, .. }) if column == "drug"
	));
	let numeric = ColumnTiers {
		low: vec!["dose".to_owned()],
		..Default::default()
	};
	assert!(matches!(
		run(numeric, "ln_ic50"),
		Err(Error::InvalidColumnType { .. })
	));
	assert!(matches!(
		run(ColumnTiers::default(), "C"),
		Err(Error::InvalidColumnType { .. })
	));
}

#[test]
fn test_mapping_bundle_json() {
	let (dataframe, tiers) = example();
	let encoded = encode(EncodeInput {
		train: &dataframe,
		test: &dataframe,
		strategy: Strategy::OneHotFrequency,
		tiers: &tiers,
		target_column: "ln_ic50",
		target_encoding: TargetEncodingOptions::default(),
	})
	.unwrap();
	let dir = tempfile::tempdir().unwrap();
	let path = dir.path().join("mappings.json");
	encoded.mappings.write(&path).unwrap();
	let read = MappingBundle::read(&path).unwrap();
	// Adjusted frequencies reload bit for bit, so the replay matches the original encoding.
	assert_eq!(read, encoded.mappings);
	assert_eq!(read.apply(&dataframe).unwrap(), encoded.test);
	let json: serde_json::Value =
		serde_json::from_str(&std::fs::read_to_string(&path).unwrap()).unwrap();
	assert_eq!(json["strategy"], "one_hot_frequency");
	assert_eq!(
		json["tiers"]["low"],
		serde_json::json!({
			"encoder": "one_hot",
			"columns": [{ "source_column_name": "msi", "categories": ["MSI-H", "MSS"] }],
		})
	);
	assert_eq!(json["tiers"]["medium"]["encoder"], "frequency");
}

#[test]
fn test_invalid_target_encoding_rejected_by_every_strategy() {
	let (dataframe, tiers) = example();
	let result = encode(EncodeInput {
		train: &dataframe,
		test: &dataframe,
		strategy: Strategy::AllOneHot,
		tiers: &tiers,
		target_column: "ln_ic50",
		target_encoding: TargetEncodingOptions {
			n_folds: 1,
			..Default::default()
		},
	});
	assert!(matches!(
		result,
		Err(Error::Encode(ic50_features::EncodeError::InvalidFolds { n_folds: 1 }))
	));
}
