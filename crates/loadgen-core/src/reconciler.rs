//! Windowed block-polling reconciler.
//!
//! After dispatch, correlates the outstanding transaction hashes against
//! incoming blocks. Each round fetches the block numbers currently in the
//! polling window plus the chain head in one combined request, merges the
//! returned receipts, and resolves any contained hashes. The minting
//! timeout is armed only once the chain has caught up to the last block
//! observed while sending; transport failures consume a bounded error
//! budget with a fixed backoff.

use crate::{CoreError, RunContext};
use loadgen_rpc::{BatchRpc, RpcError, RpcRequest};
use loadgen_types::{now_millis, parse_hex_u256, parse_hex_u64, BlockReceipt};
use serde_json::Value;
use std::collections::{BTreeSet, HashSet};
use tokio::time::{sleep, Duration, Instant};

/// Fixed backoff between retries after a transport failure.
const RETRY_BACKOFF: Duration = Duration::from_secs(2);

/// What one polling round produced.
struct RoundData {
	receipts: Vec<BlockReceipt>,
	new_last_block: u64,
}

/// A failed polling round.
enum RoundError {
	/// Recoverable: consumes the error budget.
	Transport(RpcError),
	/// A response that cannot be trusted; aborts the run.
	Protocol(String),
}

/// Runs the reconciliation phase and returns the hashes still unresolved.
///
/// Termination causes, in priority of detection: the pending set drains
/// (full success), the armed deadline passes, or the error budget is
/// exhausted. All three return normally; only protocol violations abort.
pub async fn run<R: BatchRpc>(rpc: &R, ctx: &mut RunContext) -> Result<HashSet<String>, CoreError> {
	let mut pending: HashSet<String> = HashSet::new();
	let mut last_sending_block = 0u64;
	for (hash, result) in &ctx.results {
		if result.mining_block_number.is_none() {
			pending.insert(hash.clone());
			last_sending_block = last_sending_block.max(result.sending_block_number);
		}
	}

	let block_batch_size = ctx.minting.block_batch_size;
	let mut last_known_block = ctx.first_sending_block + block_batch_size as u64 - 1;
	let mut window: BTreeSet<u64> = (0..block_batch_size as u64)
		.map(|i| ctx.first_sending_block + i)
		.collect();

	let mut deadline: Option<Instant> = None;
	let mut error_budget = ctx.minting.error_limit;

	while !pending.is_empty()
		&& deadline.map_or(true, |d| Instant::now() < d)
		&& error_budget != 0
	{
		match poll_round(rpc, &window, last_known_block).await {
			Ok(round) => {
				for receipt in round.receipts {
					window.remove(&receipt.number);
					for tx_hash in &receipt.transactions {
						pending.remove(tx_hash);
						if let Some(result) = ctx.results.get_mut(tx_hash) {
							result.minted_at_ms = Some(receipt.receipt_timestamp_ms);
							result.mining_block_number = Some(receipt.number);
						}
					}
					let receipt_number = receipt.number;
					ctx.receipts.insert(receipt);
					if receipt_number == last_sending_block && deadline.is_none() {
						tracing::info!(
							block = last_sending_block,
							timeout_secs = ctx.minting.timeout_secs,
							"last sending block processed, minting timeout armed"
						);
						deadline = Some(
							Instant::now() + Duration::from_secs(ctx.minting.timeout_secs),
						);
					}
				}
				last_known_block = grow_window(
					&mut window,
					last_known_block,
					round.new_last_block,
					block_batch_size,
				);
				tracing::debug!(
					pending = pending.len(),
					window = window.len(),
					head = last_known_block,
					"reconciliation round processed"
				);
				error_budget = ctx.minting.error_limit;
			}
			Err(RoundError::Protocol(message)) => return Err(CoreError::Protocol(message)),
			Err(RoundError::Transport(error)) => {
				error_budget -= 1;
				if error_budget > 0 {
					tracing::warn!(
						remaining_attempts = error_budget,
						backoff_ms = RETRY_BACKOFF.as_millis() as u64,
						"block fetching failed, retrying: {}",
						error
					);
					sleep(RETRY_BACKOFF).await;
				} else {
					tracing::warn!("block fetching failed and the error budget is exhausted: {}", error);
				}
			}
		}
	}

	Ok(pending)
}

/// Issues one combined request for the window plus the chain head, and
/// parses the receipts out of the response.
async fn poll_round<R: BatchRpc>(
	rpc: &R,
	window: &BTreeSet<u64>,
	last_known_block: u64,
) -> Result<RoundData, RoundError> {
	let head_id = last_known_block + 1;
	let mut requests: Vec<RpcRequest> = window
		.iter()
		.map(|number| RpcRequest::block_by_number(*number))
		.collect();
	requests.push(RpcRequest::block_number(head_id));

	let responses = rpc.execute(&requests).await.map_err(RoundError::Transport)?;
	let receipt_timestamp_ms = now_millis();

	let mut receipts = Vec::new();
	let mut new_last_block = last_known_block;
	for item in responses {
		let (Some(id), Some(result)) = (item.id, item.result.as_ref()) else {
			continue;
		};
		if id == head_id {
			let head = result
				.as_str()
				.and_then(|s| parse_hex_u64(s).ok())
				.ok_or_else(|| {
					RoundError::Transport(RpcError::Malformed(
						"unparsable chain head in reconciliation response".to_string(),
					))
				})?;
			new_last_block = head;
		} else {
			let receipt = parse_block_receipt(result, receipt_timestamp_ms)?;
			if receipt.number != id {
				return Err(RoundError::Protocol(format!(
					"block number {} in the response does not match the request id {}",
					receipt.number, id
				)));
			}
			receipts.push(receipt);
		}
	}
	Ok(RoundData {
		receipts,
		new_last_block,
	})
}

/// Builds a [`BlockReceipt`] from the node's block object.
fn parse_block_receipt(block: &Value, receipt_timestamp_ms: u64) -> Result<BlockReceipt, RoundError> {
	let field = |name: &str| -> Result<&str, RoundError> {
		block.get(name).and_then(Value::as_str).ok_or_else(|| {
			RoundError::Transport(RpcError::Malformed(format!(
				"block object without field '{}'",
				name
			)))
		})
	};
	let quantity = |name: &str| -> Result<u64, RoundError> {
		parse_hex_u64(field(name)?).map_err(|e| {
			RoundError::Transport(RpcError::Malformed(e.to_string()))
		})
	};

	let transactions = block
		.get("transactions")
		.and_then(Value::as_array)
		.map(|hashes| {
			hashes
				.iter()
				.filter_map(Value::as_str)
				.map(str::to_string)
				.collect()
		})
		.unwrap_or_default();

	Ok(BlockReceipt {
		number: quantity("number")?,
		// The node reports unix seconds.
		timestamp_ms: quantity("timestamp")? * 1000,
		receipt_timestamp_ms,
		gas_limit: parse_hex_u256(field("gasLimit")?)
			.map_err(|e| RoundError::Transport(RpcError::Malformed(e.to_string())))?,
		gas_used: parse_hex_u256(field("gasUsed")?)
			.map_err(|e| RoundError::Transport(RpcError::Malformed(e.to_string())))?,
		size: quantity("size")?,
		hash: field("hash")?.to_string(),
		miner: field("miner")?.to_string(),
		transactions,
	})
}

/// Admits new consecutive block numbers into the window when the chain head
/// advanced, up to the window capacity, and returns the new head pointer.
fn grow_window(
	window: &mut BTreeSet<u64>,
	last_known_block: u64,
	new_last_block: u64,
	capacity: usize,
) -> u64 {
	if new_last_block <= last_known_block {
		return last_known_block;
	}
	let mut number = last_known_block;
	while number <= new_last_block {
		window.insert(number);
		if window.len() >= capacity {
			break;
		}
		number += 1;
	}
	number
}

#[cfg(test)]
mod tests {
	use super::*;
	use crate::context::{MintingOptions, RunContext};
	use crate::testutil::{block_json, test_minting_options, test_sending_options, test_tx, MockRpc, Round};
	use loadgen_types::TransactionBatch;

	/// Context with `count` sent transactions, all in one batch bracketed
	/// by `sending_block`.
	fn reconciliation_context(count: usize, sending_block: u64) -> RunContext {
		let txs: Vec<_> = (0..count).map(test_tx).collect();
		let mut ctx = RunContext::new(
			test_sending_options(count as u64, 1),
			test_minting_options(),
			txs,
		);
		ctx.first_sending_block = sending_block;
		ctx.sent_count = count;
		ctx.batches.push(TransactionBatch {
			beg_index: 0,
			end_index: count,
			before_block_number: sending_block,
			after_block_number: sending_block,
			before_timestamp_ms: 1,
			after_timestamp_ms: 2,
		});
		ctx.build_results();
		ctx
	}

	fn hashes_of(ctx: &RunContext) -> Vec<String> {
		ctx.txs.iter().map(|tx| tx.hash.clone()).collect()
	}

	#[tokio::test(start_paused = true)]
	async fn test_all_hashes_resolve_in_one_block() {
		let mut ctx = reconciliation_context(2, 100);
		let hashes = hashes_of(&ctx);
		let contained: Vec<&str> = hashes.iter().map(String::as_str).collect();
		let rpc = MockRpc::for_reconciliation(vec![Round::Blocks {
			blocks: vec![(100, block_json(100, &contained))],
			head: 100,
		}]);

		let unresolved = run(&rpc, &mut ctx).await.unwrap();

		assert!(unresolved.is_empty());
		for hash in &hashes {
			let result = ctx.results.get(hash).unwrap();
			assert_eq!(result.mining_block_number, Some(100));
			assert!(result.minted_at_ms.is_some());
		}
		assert_eq!(ctx.receipts.len(), 1);
	}

	#[tokio::test(start_paused = true)]
	async fn test_block_number_mismatch_is_fatal() {
		let mut ctx = reconciliation_context(1, 105);
		// The block fetched under id 105 declares itself as number 106.
		let rpc = MockRpc::for_reconciliation(vec![Round::Blocks {
			blocks: vec![(105, block_json(106, &[]))],
			head: 105,
		}]);

		let result = run(&rpc, &mut ctx).await;
		assert!(matches!(result, Err(CoreError::Protocol(_))));
	}

	#[tokio::test(start_paused = true)]
	async fn test_error_budget_exhaustion_returns_unresolved() {
		let mut ctx = reconciliation_context(3, 50);
		ctx.minting.error_limit = 2;
		let rpc = MockRpc::for_reconciliation(vec![Round::Fail, Round::Fail]);

		let unresolved = run(&rpc, &mut ctx).await.unwrap();
		assert_eq!(unresolved.len(), 3);
	}

	#[tokio::test(start_paused = true)]
	async fn test_successful_round_resets_the_error_budget() {
		let mut ctx = reconciliation_context(2, 100);
		ctx.minting.error_limit = 2;
		let hashes = hashes_of(&ctx);
		// One failure, then a good round resolving the first hash (which
		// resets the budget), one more failure, then the final block.
		let rpc = MockRpc::for_reconciliation(vec![
			Round::Fail,
			Round::Blocks {
				blocks: vec![(100, block_json(100, &[hashes[0].as_str()]))],
				head: 101,
			},
			Round::Fail,
			Round::Blocks {
				blocks: vec![(101, block_json(101, &[hashes[1].as_str()]))],
				head: 101,
			},
		]);

		let unresolved = run(&rpc, &mut ctx).await.unwrap();
		assert!(unresolved.is_empty());
		assert_eq!(
			ctx.results.get(&hashes[1]).unwrap().mining_block_number,
			Some(101)
		);
	}

	#[tokio::test(start_paused = true)]
	async fn test_timeout_arms_on_last_sending_block_and_expires() {
		let mut ctx = reconciliation_context(3, 100);
		ctx.minting = MintingOptions {
			timeout_secs: 5,
			error_limit: 10,
			block_batch_size: 10,
		};
		let hashes = hashes_of(&ctx);
		// Block 100 (the last sending block) resolves one hash and arms
		// the 5-second timeout; the other two hashes never appear. Each
		// mock round takes 500 ms, so the deadline passes after a bounded
		// number of empty rounds.
		let rpc = MockRpc::for_reconciliation(vec![Round::Blocks {
			blocks: vec![(100, block_json(100, &[hashes[0].as_str()]))],
			head: 100,
		}]);

		let unresolved = run(&rpc, &mut ctx).await.unwrap();

		assert_eq!(unresolved.len(), 2);
		assert!(unresolved.contains(&hashes[1]));
		assert!(unresolved.contains(&hashes[2]));
	}

	#[tokio::test(start_paused = true)]
	async fn test_pending_set_is_monotonically_non_increasing() {
		let mut ctx = reconciliation_context(4, 200);
		let hashes = hashes_of(&ctx);
		let rpc = MockRpc::for_reconciliation(vec![
			Round::Blocks {
				blocks: vec![(200, block_json(200, &[hashes[0].as_str(), hashes[1].as_str()]))],
				head: 201,
			},
			Round::Blocks {
				blocks: vec![(201, block_json(201, &[hashes[2].as_str()]))],
				head: 202,
			},
			Round::Blocks {
				blocks: vec![(202, block_json(202, &[hashes[3].as_str()]))],
				head: 202,
			},
		]);

		let unresolved = run(&rpc, &mut ctx).await.unwrap();
		assert!(unresolved.is_empty());
		assert_eq!(ctx.receipts.sorted_block_numbers(), vec![200, 201, 202]);
	}

	#[test]
	fn test_grow_window_respects_capacity() {
		let mut window: BTreeSet<u64> = (100..110).collect();
		// Head did not advance: nothing changes.
		assert_eq!(grow_window(&mut window, 109, 109, 10), 109);
		assert_eq!(window.len(), 10);

		// Three fetched blocks leave room; the head advanced to 115.
		window.remove(&100);
		window.remove(&101);
		window.remove(&102);
		let new_last = grow_window(&mut window, 109, 115, 10);
		assert_eq!(window.len(), 10);
		// Numbers are admitted from the old head pointer upward.
		assert!(window.contains(&109));
		assert!(window.contains(&110));
		assert!(window.contains(&111));
		assert!(new_last > 109);
	}

	#[tokio::test(start_paused = true)]
	async fn test_results_for_unknown_hashes_are_ignored() {
		let mut ctx = reconciliation_context(1, 100);
		let hashes = hashes_of(&ctx);
		// The block also contains a foreign transaction.
		let rpc = MockRpc::for_reconciliation(vec![Round::Blocks {
			blocks: vec![(
				100,
				block_json(100, &["0xfeedfeed", hashes[0].as_str()]),
			)],
			head: 100,
		}]);

		let unresolved = run(&rpc, &mut ctx).await.unwrap();
		assert!(unresolved.is_empty());
		assert_eq!(ctx.results.len(), 1);
	}
}
