use super::{merge_mean_m2, StreamingMetric};

/// The arithmetic mean of a stream of values. `finalize()` returns `None` if no values were seen.
#[derive(Debug, Clone, Default)]
pub struct Mean {
	n: u64,
	mean: f64,
}

impl Mean {
	pub fn n(&self) -> u64 {
		self.n
	}
}

impl StreamingMetric<'_> for Mean {
	type Input = f64;
	type Output = Option<f64>;

	fn update(&mut self, value: Self::Input) {
		self.n += 1;
		self.mean += (value - self.mean) / self.n as f64;
	}

	fn merge(&mut self, other: Self) {
		if other.n == 0 {
			return;
		}
		let (mean, _) = merge_mean_m2(self.n, self.mean, 0.0, other.n, other.mean, 0.0);
		self.n += other.n;
		self.mean = mean;
	}

	fn finalize(self) -> Self::Output {
		if self.n > 0 {
			Some(self.mean)
		} else {
			None
		}
	}
}

#[test]
fn test_mean() {
	let mut a = Mean::default();
	for value in &[1.0, 2.0, 3.0] {
		a.update(*value);
	}
	let mut b = Mean::default();
	b.update(10.0);
	a.merge(b);
	assert_eq!(a.n(), 4);
	assert!((a.finalize().unwrap() - 4.0).abs() < 1e-12);
	assert_eq!(Mean::default().finalize(), None);
}
