//! Statistics primitives: streaming sample aggregation and the run-level
//! statistics record.

use serde::{Deserialize, Serialize};

/// Distribution summary over a numeric sample.
///
/// All fields are zero for an empty sample; the sample standard deviation is
/// zero for fewer than two values (the `n - 1` divisor is guarded).
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct Statistics {
	/// Smallest sample value.
	pub min: f64,
	/// Largest sample value.
	pub max: f64,
	/// Arithmetic mean.
	pub mean: f64,
	/// Sample standard deviation (Bessel's correction, `n - 1` divisor).
	pub std_dev: f64,
}

impl Statistics {
	/// Aggregates an iterator of values into a [`Statistics`] summary.
	pub fn from_values<I>(values: I) -> Self
	where
		I: IntoIterator<Item = f64>,
	{
		let mut sample = Sample::new();
		for value in values {
			sample.push(value);
		}
		sample.statistics()
	}
}

/// Streaming accumulator using the sum / sum-of-squares formulation.
#[derive(Debug, Clone)]
pub struct Sample {
	count: u64,
	sum: f64,
	sum_of_squares: f64,
	min: f64,
	max: f64,
}

impl Sample {
	/// Creates an empty accumulator.
	pub fn new() -> Self {
		Self {
			count: 0,
			sum: 0.0,
			sum_of_squares: 0.0,
			min: f64::INFINITY,
			max: f64::NEG_INFINITY,
		}
	}

	/// Adds one value to the sample.
	pub fn push(&mut self, value: f64) {
		self.count += 1;
		self.sum += value;
		self.sum_of_squares += value * value;
		if value < self.min {
			self.min = value;
		}
		if value > self.max {
			self.max = value;
		}
	}

	/// Number of accumulated values.
	pub fn count(&self) -> u64 {
		self.count
	}

	/// Finalizes the accumulator into a [`Statistics`] summary.
	pub fn statistics(&self) -> Statistics {
		if self.count == 0 {
			return Statistics::default();
		}
		let n = self.count as f64;
		let std_dev = if self.count < 2 {
			0.0
		} else {
			((n * self.sum_of_squares - self.sum * self.sum) / (n * (n - 1.0))).sqrt()
		};
		Statistics {
			min: self.min,
			max: self.max,
			mean: self.sum / n,
			std_dev,
		}
	}
}

impl Default for Sample {
	fn default() -> Self {
		Self::new()
	}
}

/// Full statistics record for one run, covering throughput, delay
/// distributions, and the minted-per-relative-block histogram.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RunStatistics {
	/// Chain head observed before the first batch of the run.
	pub first_sending_block_number: u64,
	/// Configured submission rate, transactions per second.
	pub expected_rate: u64,
	/// Observed average rate: total sent over the configured duration.
	pub actual_average_rate: f64,
	/// Configured sending duration in seconds.
	pub sending_duration_secs: u64,
	/// Configured pause between intra-interval batches, milliseconds.
	pub batch_pause_ms: u64,
	/// Total transactions sent.
	pub sent_tx_count: usize,
	/// Transactions confirmed as minted.
	pub minted_tx_count: usize,
	/// Distribution of RPC batch sizes.
	pub rpc_batch_size: Statistics,
	/// Distribution of sent counts bucketed by relative sending block.
	pub sent_tx_count_per_block: Statistics,
	/// Distribution of per-batch submission delay in blocks.
	pub submission_delay_in_blocks: Statistics,
	/// Distribution of per-transaction minting delay in milliseconds.
	pub minting_delay_in_ms: Statistics,
	/// Distribution of per-transaction minting delay in blocks.
	pub minting_delay_in_blocks: Statistics,
	/// Minted transaction counts indexed by `mining_block - sending_block`.
	pub minted_tx_count_per_relative_block: Vec<usize>,
}
