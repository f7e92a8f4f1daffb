//! Aggregation of the final run state into the statistics record and the
//! per-block projections consumed by the reports.

use crate::RunContext;
use loadgen_types::{BlockResult, RunStatistics, Statistics};

/// Computes the run-level statistics over the finished context.
///
/// Unresolved transactions contribute zero to the minting-delay
/// distributions, biasing them downward rather than excluding the
/// transactions; the minted counters are not affected by this.
pub fn run_statistics(ctx: &RunContext) -> RunStatistics {
	let batch_sizes = ctx.batches.iter().map(|batch| batch.size() as f64);
	let submission_delays = ctx
		.batches
		.iter()
		.map(|batch| (batch.after_block_number - batch.before_block_number) as f64);

	// Sent counts bucketed by sending block, relative to the first one.
	let mut sent_per_block: Vec<usize> = Vec::new();
	for batch in &ctx.batches {
		let bucket = (batch.before_block_number - ctx.first_sending_block) as usize;
		if bucket >= sent_per_block.len() {
			sent_per_block.resize(bucket + 1, 0);
		}
		sent_per_block[bucket] += batch.size();
	}

	let mut minted_count = 0usize;
	let mut minted_per_relative_block: Vec<usize> = Vec::new();
	let mut delays_ms: Vec<f64> = Vec::with_capacity(ctx.results.len());
	let mut delays_blocks: Vec<f64> = Vec::with_capacity(ctx.results.len());
	for result in ctx.results.values() {
		match (result.mining_block_number, result.minted_at_ms) {
			(Some(mining_block), Some(minted_at)) => {
				minted_count += 1;
				let relative = (mining_block - result.sending_block_number) as usize;
				if relative >= minted_per_relative_block.len() {
					minted_per_relative_block.resize(relative + 1, 0);
				}
				minted_per_relative_block[relative] += 1;
				delays_ms.push(minted_at.saturating_sub(result.sent_confirmed_at_ms) as f64);
				delays_blocks.push(relative as f64);
			}
			_ => {
				delays_ms.push(0.0);
				delays_blocks.push(0.0);
			}
		}
	}

	let actual_average_rate = if ctx.sending.duration_secs == 0 {
		0.0
	} else {
		ctx.sent_count as f64 / ctx.sending.duration_secs as f64
	};

	RunStatistics {
		first_sending_block_number: ctx.first_sending_block,
		expected_rate: ctx.sending.rate,
		actual_average_rate,
		sending_duration_secs: ctx.sending.duration_secs,
		batch_pause_ms: ctx.sending.batch_pause_ms,
		sent_tx_count: ctx.sent_count,
		minted_tx_count: minted_count,
		rpc_batch_size: Statistics::from_values(batch_sizes),
		sent_tx_count_per_block: Statistics::from_values(
			sent_per_block.iter().map(|count| *count as f64),
		),
		submission_delay_in_blocks: Statistics::from_values(submission_delays),
		minting_delay_in_ms: Statistics::from_values(delays_ms),
		minting_delay_in_blocks: Statistics::from_values(delays_blocks),
		minted_tx_count_per_relative_block: minted_per_relative_block,
	}
}

/// Projects the fetched receipts into per-block results, counting how many
/// transactions of each block belong to this run.
pub fn block_results(ctx: &RunContext) -> Vec<BlockResult> {
	ctx.receipts
		.sorted_block_numbers()
		.into_iter()
		.filter_map(|number| ctx.receipts.get(number))
		.map(|receipt| BlockResult {
			number: receipt.number,
			timestamp_ms: receipt.timestamp_ms,
			gas_limit: receipt.gas_limit,
			gas_used: receipt.gas_used,
			size: receipt.size,
			hash: receipt.hash.clone(),
			miner: receipt.miner.clone(),
			total_tx_count: receipt.transactions.len(),
			tracked_tx_count: receipt
				.transactions
				.iter()
				.filter(|hash| ctx.results.contains_key(*hash))
				.count(),
		})
		.collect()
}
