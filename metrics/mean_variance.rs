//! https://en.wikipedia.org/wiki/Algorithms_for_calculating_variance#Parallel_algorithm

use num_traits::ToPrimitive;

/// The running count, mean and sum of squared deviations (`m2`) of a stream of values.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct MeanVariance {
	pub n: u64,
	pub mean: f64,
	pub m2: f64,
}

impl MeanVariance {
	pub fn update(&mut self, value: f64) {
		let (mean, m2) = merge_mean_m2(self.n, self.mean, self.m2, 1, value, 0.0);
		self.n += 1;
		self.mean = mean;
		self.m2 = m2;
	}

	pub fn merge(&mut self, other: MeanVariance) {
		if other.n == 0 {
			return;
		}
		let (mean, m2) = merge_mean_m2(self.n, self.mean, self.m2, other.n, other.mean, other.m2);
		self.n += other.n;
		self.mean = mean;
		self.m2 = m2;
	}

	/// The population variance, or `NaN` if no values were seen.
	pub fn variance(&self) -> f64 {
		m2_to_variance(self.m2, self.n)
	}
}

/// Combine two separate means and m2s into a single mean and m2.
pub fn merge_mean_m2(
	n_a: u64,
	mean_a: f64,
	m2_a: f64,
	n_b: u64,
	mean_b: f64,
	m2_b: f64,
) -> (f64, f64) {
	let n_a = n_a.to_f64().unwrap_or(0.0);
	let n_b = n_b.to_f64().unwrap_or(0.0);
	if n_a + n_b == 0.0 {
		return (0.0, 0.0);
	}
	(
		(((n_a * mean_a) + (n_b * mean_b)) / (n_a + n_b)),
		m2_a + m2_b + (mean_b - mean_a) * (mean_b - mean_a) * (n_a * n_b / (n_a + n_b)),
	)
}

pub fn m2_to_variance(m2: f64, n: u64) -> f64 {
	if n == 0 {
		f64::NAN
	} else {
		m2 / n.to_f64().unwrap_or(f64::NAN)
	}
}

#[test]
fn test_mean_variance() {
	let mut left = MeanVariance::default();
	left.update(1.0);
	left.update(2.0);
	let mut right = MeanVariance::default();
	right.update(3.0);
	right.update(4.0);
	left.merge(right);
	insta::assert_debug_snapshot!(left, @r###"
 MeanVariance {
     n: 4,
     mean: 2.5,
     m2: 5.0,
 }
 "###);
	assert!((left.variance() - 1.25).abs() < 1e-12);
	assert!(MeanVariance::default().variance().is_nan());
}
