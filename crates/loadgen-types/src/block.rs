//! Block receipt types and the receipt collection with its merge rule.

use alloy_primitives::U256;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// A fetched block, reduced to the fields the run consumes.
///
/// Immutable once constructed from a node response.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BlockReceipt {
	/// Block number.
	pub number: u64,
	/// Block timestamp in milliseconds (the node reports unix seconds).
	pub timestamp_ms: u64,
	/// Local wall clock when this receipt was fetched (ms).
	pub receipt_timestamp_ms: u64,
	/// Block gas limit.
	pub gas_limit: U256,
	/// Gas used by the block.
	pub gas_used: U256,
	/// Block size in bytes.
	pub size: u64,
	/// Block hash.
	pub hash: String,
	/// Miner / fee recipient address.
	pub miner: String,
	/// Hashes of the transactions contained in the block, in block order.
	pub transactions: Vec<String>,
}

/// Mapping from block number to receipt with running min/max bounds.
///
/// Receipts accumulate monotonically and are never deleted within a run.
/// The insertion rule: a number outside `[min, max]` is always inserted and
/// extends the bound; a number inside the bound is inserted only if absent,
/// so later duplicate fetches for the same number are discarded, not merged.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct BlockReceiptCollection {
	/// Lowest block number stored so far (0 until populated).
	pub min_block_number: u64,
	/// Highest block number stored so far (0 until populated).
	pub max_block_number: u64,
	receipts: HashMap<u64, BlockReceipt>,
}

impl BlockReceiptCollection {
	/// Creates an empty collection.
	pub fn new() -> Self {
		Self::default()
	}

	/// Inserts a receipt under the first-write-wins-inside-bounds rule.
	pub fn insert(&mut self, receipt: BlockReceipt) {
		if receipt.number > self.max_block_number || self.max_block_number == 0 {
			self.max_block_number = receipt.number;
			self.receipts.insert(receipt.number, receipt);
		} else if receipt.number < self.min_block_number || self.min_block_number == 0 {
			self.min_block_number = receipt.number;
			self.receipts.insert(receipt.number, receipt);
		} else if !self.receipts.contains_key(&receipt.number) {
			self.receipts.insert(receipt.number, receipt);
		}
	}

	/// Looks up the receipt for a block number.
	pub fn get(&self, number: u64) -> Option<&BlockReceipt> {
		self.receipts.get(&number)
	}

	/// Number of stored receipts.
	pub fn len(&self) -> usize {
		self.receipts.len()
	}

	/// Whether the collection is empty.
	pub fn is_empty(&self) -> bool {
		self.receipts.is_empty()
	}

	/// Stored block numbers in ascending order.
	pub fn sorted_block_numbers(&self) -> Vec<u64> {
		let mut numbers: Vec<u64> = self.receipts.keys().copied().collect();
		numbers.sort_unstable();
		numbers
	}
}

/// Per-block projection consumed by the blocks report: header fields plus
/// how many of the block's transactions belong to this run.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BlockResult {
	/// Block number.
	pub number: u64,
	/// Block timestamp in milliseconds.
	pub timestamp_ms: u64,
	/// Block gas limit.
	pub gas_limit: U256,
	/// Gas used by the block.
	pub gas_used: U256,
	/// Block size in bytes.
	pub size: u64,
	/// Block hash.
	pub hash: String,
	/// Miner / fee recipient address.
	pub miner: String,
	/// Count of all transactions in the block.
	pub total_tx_count: usize,
	/// Count of this run's transactions in the block.
	pub tracked_tx_count: usize,
}

#[cfg(test)]
mod tests {
	use super::*;

	fn receipt(number: u64, miner: &str) -> BlockReceipt {
		BlockReceipt {
			number,
			timestamp_ms: number * 1000,
			receipt_timestamp_ms: 0,
			gas_limit: U256::from(30_000_000u64),
			gas_used: U256::ZERO,
			size: 512,
			hash: format!("0xblock{}", number),
			miner: miner.to_string(),
			transactions: vec![],
		}
	}

	#[test]
	fn test_insert_extends_bounds() {
		let mut collection = BlockReceiptCollection::new();
		collection.insert(receipt(100, "a"));
		assert_eq!(collection.max_block_number, 100);

		collection.insert(receipt(105, "a"));
		collection.insert(receipt(95, "a"));
		assert_eq!(collection.min_block_number, 95);
		assert_eq!(collection.max_block_number, 105);
		assert_eq!(collection.len(), 3);
		assert_eq!(collection.sorted_block_numbers(), vec![95, 100, 105]);
	}

	#[test]
	fn test_insert_inside_bounds_first_write_wins() {
		let mut collection = BlockReceiptCollection::new();
		collection.insert(receipt(90, "a"));
		collection.insert(receipt(110, "a"));
		collection.insert(receipt(100, "first"));
		// A later duplicate fetch for the same in-range number is discarded.
		collection.insert(receipt(100, "second"));
		assert_eq!(collection.get(100).unwrap().miner, "first");
		assert_eq!(collection.len(), 3);
	}
}
