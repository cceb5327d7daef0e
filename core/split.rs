use crate::Error;
use chrono::{DateTime, Utc};
use ic50_dataframe::DataFrame;
use num_traits::ToPrimitive;
use rand::{seq::SliceRandom, SeedableRng};
use rand_xoshiro::Xoshiro256Plus;
use std::{fs::File, io::BufWriter, path::Path};

/// A partition of the row indexes of a dataset into training and test rows.
#[derive(Debug, Clone, PartialEq)]
pub struct Split {
	pub seed: u64,
	pub ratio: f64,
	pub train_indices: Vec<usize>,
	pub test_indices: Vec<usize>,
}

/**
Randomly partition the indexes `0..n_rows` into training and test rows. The indexes are shuffled with a generator seeded from `seed`, and the first `floor(n_rows * ratio)` become the training rows. The same `n_rows`, `ratio` and `seed` always produce the same split.
*/
pub fn split(n_rows: usize, ratio: f64, seed: u64) -> Result<Split, Error> {
	if !(ratio > 0.0 && ratio < 1.0) {
		return Err(Error::InvalidRatio { ratio });
	}
	if n_rows == 0 {
		return Err(Error::EmptyDataset);
	}
	let mut permutation: Vec<usize> = (0..n_rows).collect();
	let mut rng = Xoshiro256Plus::seed_from_u64(seed);
	permutation.shuffle(&mut rng);
	let n_train = (n_rows.to_f64().unwrap_or(0.0) * ratio)
		.floor()
		.to_usize()
		.unwrap_or(0)
		.min(n_rows);
	let test_indices = permutation.split_off(n_train);
	Ok(Split {
		seed,
		ratio,
		train_indices: permutation,
		test_indices,
	})
}

impl Split {
	pub fn n_rows(&self) -> usize {
		self.train_indices.len() + self.test_indices.len()
	}

	/// Select the training and test rows of `dataframe`, in the order of the indexes.
	pub fn slices(&self, dataframe: &DataFrame) -> Result<(DataFrame, DataFrame), Error> {
		if dataframe.nrows() != self.n_rows() {
			return Err(Error::InvalidSplitRecord {
				reason: format!(
					"the split covers {} rows but the dataset has {}",
					self.n_rows(),
					dataframe.nrows()
				),
			});
		}
		let train = dataframe.take_rows(&self.train_indices)?;
		let test = dataframe.take_rows(&self.test_indices)?;
		Ok((train, test))
	}
}

/// The persisted form of a [`Split`](struct.Split.html). It holds the index lists themselves, so a split can be replayed without the random number generator.
#[derive(Debug, Clone, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct SplitRecord {
	pub seed: u64,
	pub ratio: f64,
	pub n_rows: usize,
	pub n_train: usize,
	pub n_test: usize,
	pub train_indices: Vec<usize>,
	pub test_indices: Vec<usize>,
	pub created_at: DateTime<Utc>,
}

impl SplitRecord {
	pub fn new(split: &Split, created_at: DateTime<Utc>) -> SplitRecord {
		SplitRecord {
			seed: split.seed,
			ratio: split.ratio,
			n_rows: split.n_rows(),
			n_train: split.train_indices.len(),
			n_test: split.test_indices.len(),
			train_indices: split.train_indices.clone(),
			test_indices: split.test_indices.clone(),
			created_at,
		}
	}

	pub fn split(&self) -> Split {
		Split {
			seed: self.seed,
			ratio: self.ratio,
			train_indices: self.train_indices.clone(),
			test_indices: self.test_indices.clone(),
		}
	}

	pub fn write(&self, path: &Path) -> Result<(), Error> {
		let writer = BufWriter::new(File::create(path)?);
		serde_json::to_writer_pretty(writer, self)?;
		Ok(())
	}

	/// Read a split record and check that it is a partition of `0..n_rows`.
	pub fn read(path: &Path) -> Result<SplitRecord, Error> {
		let file = File::open(path)?;
		let record: SplitRecord = serde_json::from_reader(std::io::BufReader::new(file))?;
		record.validate()?;
		Ok(record)
	}

	pub fn validate(&self) -> Result<(), Error> {
		let invalid = |reason: String| Err(Error::InvalidSplitRecord { reason });
		if self.train_indices.len() != self.n_train || self.test_indices.len() != self.n_test {
			return invalid("the index lists do not match the recorded counts".to_owned());
		}
		if self.n_train + self.n_test != self.n_rows {
			return invalid(format!(
				"{} training and {} test rows do not add up to {} rows",
				self.n_train, self.n_test, self.n_rows
			));
		}
		let mut seen = vec![false; self.n_rows];
		for index in self.train_indices.iter().chain(self.test_indices.iter()) {
			match seen.get_mut(*index) {
				None => return invalid(format!("row index {} is out of bounds", index)),
				Some(true) => return invalid(format!("row index {} appears twice", index)),
				Some(seen) => *seen = true,
			}
		}
		Ok(())
	}
}

#[test]
fn test_split_partitions_rows() {
	let split = split(10, 0.8, 42).unwrap();
	assert_eq!(split.train_indices.len(), 8);
	assert_eq!(split.test_indices.len(), 2);
	let mut all: Vec<usize> = split
		.train_indices
		.iter()
		.chain(split.test_indices.iter())
		.copied()
		.collect();
	all.sort_unstable();
	assert_eq!(all, (0..10).collect::<Vec<_>>());
	assert_eq!(self::split(10, 0.8, 42).unwrap(), split);
	assert_ne!(self::split(10, 0.8, 43).unwrap(), split);
}

#[test]
fn test_split_errors() {
	assert!(matches!(split(10, 1.0, 0), Err(Error::InvalidRatio { .. })));
	assert!(matches!(split(10, 0.0, 0), Err(Error::InvalidRatio { .. })));
	assert!(matches!(split(10, f64::NAN, 0), Err(Error::InvalidRatio { .. })));
	assert!(matches!(split(0, 0.8, 0), Err(Error::EmptyDataset)));
}

#[test]
fn test_split_record_round_trip() {
	let dir = tempfile::tempdir().unwrap();
	let path = dir.path().join("split.json");
	let split = split(25, 0.8, 7).unwrap();
	let created_at = DateTime::parse_from_rfc3339("2024-01-02T03:04:05Z")
		.unwrap()
		.with_timezone(&Utc);
	let record = SplitRecord::new(&split, created_at);
	record.write(&path).unwrap();
	let read = SplitRecord::read(&path).unwrap();
	assert_eq!(read, record);
	assert_eq!(read.split(), split);
	let json = std::fs::read_to_string(&path).unwrap();
	assert!(json.contains("\"created_at\": \"2024-01-02T03:04:05Z\""));
}

#[test]
fn test_split_record_rejects_overlap() {
	let mut record = SplitRecord::new(&split(4, 0.5, 1).unwrap(), Utc::now());
	record.test_indices[0] = record.train_indices[0];
	assert!(matches!(
		record.validate(),
		Err(Error::InvalidSplitRecord { .. })
	));
}
