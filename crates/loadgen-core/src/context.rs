//! The shared run state mutated by the sequential phases.

use loadgen_types::{
	BlockReceiptCollection, SignedTransaction, TransactionBatch, TransactionResult,
};
use std::collections::HashMap;

/// Pacing options for the dispatch phase.
#[derive(Debug, Clone, Copy)]
pub struct SendingOptions {
	/// Target submission rate, transactions per second.
	pub rate: u64,
	/// Number of one-second sending intervals.
	pub duration_secs: u64,
	/// Length of one sending interval in milliseconds.
	pub target_interval_ms: u64,
	/// Minimum runway required to issue a call within an interval.
	pub allowed_interval_ms: u64,
	/// Maximum number of submissions per RPC call.
	pub max_batch_size: usize,
	/// Pause between successive intra-interval calls, milliseconds.
	pub batch_pause_ms: u64,
}

/// Options for the reconciliation phase.
#[derive(Debug, Clone, Copy)]
pub struct MintingOptions {
	/// Timeout in seconds, armed once the chain catches up to the last
	/// sending block.
	pub timeout_secs: u64,
	/// Consecutive transport failures tolerated before giving up.
	pub error_limit: u32,
	/// Size of the block-polling window.
	pub block_batch_size: usize,
}

/// Mutable shared record of one run.
///
/// The dispatcher owns it during dispatch, the reconciler afterwards; there
/// is never more than one active writer.
#[derive(Debug)]
pub struct RunContext {
	/// Pacing options.
	pub sending: SendingOptions,
	/// Reconciliation options.
	pub minting: MintingOptions,
	/// The ordered, pre-signed transaction sequence. Read-only.
	pub txs: Vec<SignedTransaction>,
	/// Batches recorded by the dispatcher, in strictly increasing,
	/// non-overlapping index order.
	pub batches: Vec<TransactionBatch>,
	/// Per-hash results, created in bulk after dispatch.
	pub results: HashMap<String, TransactionResult>,
	/// Receipts of the fetched blocks.
	pub receipts: BlockReceiptCollection,
	/// Chain head observed before the first batch of the run.
	pub first_sending_block: u64,
	/// Number of transactions sent so far.
	pub sent_count: usize,
}

impl RunContext {
	/// Creates a fresh context over a prepared transaction sequence.
	pub fn new(
		sending: SendingOptions,
		minting: MintingOptions,
		txs: Vec<SignedTransaction>,
	) -> Self {
		Self {
			sending,
			minting,
			txs,
			batches: Vec::new(),
			results: HashMap::new(),
			receipts: BlockReceiptCollection::new(),
			first_sending_block: 0,
			sent_count: 0,
		}
	}

	/// Total number of transactions the run targets.
	pub fn total_target(&self) -> usize {
		(self.sending.rate * self.sending.duration_secs) as usize
	}

	/// Builds the per-hash result skeletons by mapping each recorded
	/// batch's index range back to its own bracket values.
	pub fn build_results(&mut self) {
		for batch in &self.batches {
			for index in batch.beg_index..batch.end_index {
				let tx = &self.txs[index];
				self.results.insert(
					tx.hash.clone(),
					TransactionResult {
						index,
						sending_block_number: batch.before_block_number,
						sent_at_ms: batch.before_timestamp_ms,
						sent_confirmed_at_ms: batch.after_timestamp_ms,
						mining_block_number: None,
						minted_at_ms: None,
					},
				);
			}
		}
	}
}

#[cfg(test)]
mod tests {
	use super::*;
	use crate::testutil::{test_minting_options, test_sending_options, test_tx};
	use loadgen_types::TransactionBatch;

	#[test]
	fn test_build_results_maps_batch_brackets() {
		let txs: Vec<_> = (0..4).map(test_tx).collect();
		let mut ctx = RunContext::new(test_sending_options(4, 1), test_minting_options(), txs);
		ctx.batches.push(TransactionBatch {
			beg_index: 0,
			end_index: 2,
			before_block_number: 100,
			after_block_number: 100,
			before_timestamp_ms: 10,
			after_timestamp_ms: 20,
		});
		ctx.batches.push(TransactionBatch {
			beg_index: 2,
			end_index: 4,
			before_block_number: 101,
			after_block_number: 102,
			before_timestamp_ms: 30,
			after_timestamp_ms: 40,
		});
		ctx.build_results();

		assert_eq!(ctx.results.len(), 4);
		let first = ctx.results.get(&ctx.txs[0].hash).unwrap();
		assert_eq!(first.sending_block_number, 100);
		assert_eq!(first.sent_confirmed_at_ms, 20);
		let last = ctx.results.get(&ctx.txs[3].hash).unwrap();
		assert_eq!(last.index, 3);
		assert_eq!(last.sending_block_number, 101);
		assert!(last.mining_block_number.is_none());
	}
}
