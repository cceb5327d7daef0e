use itertools::Itertools;
use ndarray::prelude::*;
use num_traits::ToPrimitive;

/*
This struct specifies how to bin a feature.

The first bin is reserved for missing values, and after that feature values are binned by comparing them with a set of thresholds. For example, given the thresholds `[0.5, 1.5, 2]`, the bins will be:
0. missing values
1. (-infinity, 0.5]
2. (0.5, 1.5]
3. (1.5, 2]
4. (2, infinity)
*/
#[derive(Clone, Debug, PartialEq)]
pub struct BinningInstruction {
	pub thresholds: Vec<f64>,
}

impl BinningInstruction {
	pub fn n_bins(&self) -> usize {
		1 + self.n_valid_bins()
	}

	pub fn n_valid_bins(&self) -> usize {
		self.thresholds.len() + 1
	}

	pub fn bin(&self, value: f64) -> u8 {
		if value.is_nan() {
			0
		} else {
			let position = self.thresholds.partition_point(|threshold| *threshold < value);
			(position + 1).to_u8().unwrap_or(u8::MAX)
		}
	}
}

/// Compute the binning instructions for each column in `features`.
pub fn compute_binning_instructions(
	features: ArrayView2<f64>,
	max_valid_bins: usize,
) -> Vec<BinningInstruction> {
	let max_valid_bins = max_valid_bins.max(2).min(255);
	features
		.axis_iter(Axis(1))
		.map(|column| compute_binning_instruction_for_feature(column, max_valid_bins))
		.collect()
}

fn compute_binning_instruction_for_feature(
	column: ArrayView1<f64>,
	max_valid_bins: usize,
) -> BinningInstruction {
	let mut values: Vec<f64> = column.iter().copied().filter(|value| !value.is_nan()).collect();
	values.sort_by(|a, b| a.total_cmp(b));
	let mut unique_values = values.clone();
	unique_values.dedup();
	// If the number of unique values is less than `max_valid_bins`, then create one bin per unique value. Otherwise, create bins at quantiles.
	let thresholds = if unique_values.len() <= max_valid_bins {
		unique_values
			.iter()
			.tuple_windows()
			.map(|(a, b)| (a + b) / 2.0)
			.collect()
	} else {
		let n_values = values.len().to_f64().unwrap_or(0.0);
		let max_valid_bins_f64 = max_valid_bins.to_f64().unwrap_or(1.0);
		let mut thresholds: Vec<f64> = (1..max_valid_bins)
			.filter_map(|i| {
				let q = i.to_f64()? / max_valid_bins_f64;
				values.get(((n_values - 1.0) * q).to_usize()?).copied()
			})
			.collect();
		thresholds.dedup();
		// A threshold equal to the largest value would leave the last bin empty.
		if let Some(max) = values.last() {
			thresholds.retain(|threshold| threshold < max);
		}
		thresholds
	};
	BinningInstruction { thresholds }
}

/// Compute the binned features, stored column major, based on the binning instructions.
pub fn compute_binned_features(
	features: ArrayView2<f64>,
	binning_instructions: &[BinningInstruction],
) -> Vec<Vec<u8>> {
	features
		.axis_iter(Axis(1))
		.zip(binning_instructions.iter())
		.map(|(column, instruction)| column.iter().map(|value| instruction.bin(*value)).collect())
		.collect()
}

#[test]
fn test_binning() {
	let features = arr2(&[[1.0, f64::NAN], [2.0, 5.0], [2.0, 5.0], [4.0, 6.0]]);
	let instructions = compute_binning_instructions(features.view(), 255);
	assert_eq!(instructions[0].thresholds, vec![1.5, 3.0]);
	assert_eq!(instructions[1].thresholds, vec![5.5]);
	let binned = compute_binned_features(features.view(), &instructions);
	assert_eq!(binned[0], vec![1, 2, 2, 3]);
	assert_eq!(binned[1], vec![0, 1, 1, 2]);
}

#[test]
fn test_binning_quantiles() {
	let column: Array2<f64> = Array2::from_shape_fn((100, 1), |(i, _)| i as f64);
	let instructions = compute_binning_instructions(column.view(), 4);
	assert_eq!(instructions[0].thresholds.len(), 3);
	assert_eq!(instructions[0].n_bins(), 5);
	let binned = compute_binned_features(column.view(), &instructions);
	assert!(binned[0].iter().all(|bin| (1..=4).contains(bin)));
	assert_eq!(binned[0][0], 1);
	assert_eq!(binned[0][99], 4);
}
