/// An `EarlyStoppingMonitor` watches the loss after each epoch and reports when it has stopped improving.
#[derive(Debug, Clone)]
pub struct EarlyStoppingMonitor {
	min_decrease_in_loss_for_significant_change: f64,
	n_epochs_without_improvement_to_stop: usize,
	previous_loss: Option<f64>,
	n_epochs_without_improvement: usize,
}

impl EarlyStoppingMonitor {
	pub fn new(
		min_decrease_in_loss_for_significant_change: f64,
		n_epochs_without_improvement_to_stop: usize,
	) -> Self {
		Self {
			min_decrease_in_loss_for_significant_change,
			n_epochs_without_improvement_to_stop,
			previous_loss: None,
			n_epochs_without_improvement: 0,
		}
	}

	/// Update with the next epoch's loss. Returns true if training should stop.
	pub fn update(&mut self, loss: f64) -> bool {
		let result = if let Some(previous_loss) = self.previous_loss {
			if previous_loss - loss < self.min_decrease_in_loss_for_significant_change {
				self.n_epochs_without_improvement += 1;
				self.n_epochs_without_improvement >= self.n_epochs_without_improvement_to_stop
			} else {
				self.n_epochs_without_improvement = 0;
				false
			}
		} else {
			false
		};
		self.previous_loss = Some(loss);
		result
	}
}

#[test]
fn test_early_stopping_monitor() {
	let mut monitor = EarlyStoppingMonitor::new(0.1, 2);
	assert!(!monitor.update(10.0));
	assert!(!monitor.update(5.0));
	assert!(!monitor.update(4.95));
	assert!(!monitor.update(4.0));
	assert!(!monitor.update(3.99));
	assert!(monitor.update(3.98));
}
