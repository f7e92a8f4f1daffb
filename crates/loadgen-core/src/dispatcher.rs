//! Interval-paced batch dispatcher.
//!
//! Submits the prepared transactions across fixed one-second intervals,
//! recording one [`TransactionBatch`] per RPC call. Each call brackets the
//! submissions with a chain-head query before (`id = 1`) and after (a large
//! sentinel id) in the same combined request. Dispatch has no retry layer:
//! re-sending would risk double submission with differing nonces, so any
//! transport failure or protocol violation aborts the run.

use crate::{CoreError, RunContext};
use loadgen_rpc::{BatchRpc, RpcRequest, RpcResponseItem, FIRST_HEAD_ID, LAST_HEAD_ID};
use loadgen_types::{now_millis, parse_hex_u64, SignedTransaction, TransactionBatch};
use tokio::time::{sleep, Duration, Instant};

/// Runs the dispatch phase to completion.
///
/// Iterates over `duration_secs` one-second intervals. An interval whose
/// remaining runway is at or below the allowed floor is skipped entirely;
/// its quota rolls into later intervals through the shared sent-count
/// cursor. After an interval's sends, the task sleeps until the interval
/// boundary unless the target is already reached or this is the final
/// interval.
pub async fn run<R: BatchRpc>(rpc: &R, ctx: &mut RunContext) -> Result<(), CoreError> {
	let start = Instant::now();
	for interval in 0..ctx.sending.duration_secs {
		let remaining = remaining_interval_ms(ctx, interval, start);
		if remaining <= ctx.sending.allowed_interval_ms as i64 {
			tracing::warn!(
				interval,
				remaining_ms = remaining,
				allowed_ms = ctx.sending.allowed_interval_ms,
				"not enough runway left in the interval, skipping its sends"
			);
		} else {
			let sent = send_interval(rpc, ctx).await?;
			tracing::info!(interval, sent, total = ctx.sent_count, "interval sends issued");
		}

		let remaining = remaining_interval_ms(ctx, interval, start);
		if remaining > 0
			&& ctx.sent_count < ctx.total_target()
			&& interval != ctx.sending.duration_secs - 1
		{
			sleep(Duration::from_millis(remaining as u64)).await;
		}
	}
	Ok(())
}

/// Milliseconds left until the end of interval `index`, negative when the
/// interval deadline has already passed.
fn remaining_interval_ms(ctx: &RunContext, index: u64, start: Instant) -> i64 {
	let deadline = ctx.sending.target_interval_ms as i64 * (index as i64 + 1);
	deadline - start.elapsed().as_millis() as i64
}

/// Sends this interval's quota, carving it into chunks of at most
/// `max_batch_size` transactions, and returns how many went out.
///
/// The inner loop stops early when the interval's time budget runs out;
/// the remainder rolls into later intervals, not lost.
async fn send_interval<R: BatchRpc>(rpc: &R, ctx: &mut RunContext) -> Result<usize, CoreError> {
	let interval_start = Instant::now();
	let beg = ctx.sent_count;
	let end = usize::min(beg + ctx.sending.rate as usize, ctx.txs.len());

	let mut index = beg;
	while index < end {
		if interval_start.elapsed().as_millis() as u64 >= ctx.sending.target_interval_ms {
			break;
		}
		let batch_size = usize::min(ctx.sending.max_batch_size, end - index);
		let batch = send_batch(rpc, &ctx.txs, index, index + batch_size).await?;
		if ctx.batches.is_empty() {
			ctx.first_sending_block = batch.before_block_number;
			tracing::debug!(
				block = ctx.first_sending_block,
				"recorded the first sending block of the run"
			);
		}
		ctx.batches.push(batch);
		index += batch_size;
		if index < end && ctx.sending.batch_pause_ms > 0 {
			sleep(Duration::from_millis(ctx.sending.batch_pause_ms)).await;
		}
	}

	let sent = index - beg;
	ctx.sent_count = index;
	Ok(sent)
}

/// Submits one batch of transactions as a single combined request and
/// returns its record.
async fn send_batch<R: BatchRpc>(
	rpc: &R,
	txs: &[SignedTransaction],
	beg: usize,
	end: usize,
) -> Result<TransactionBatch, CoreError> {
	let mut requests = Vec::with_capacity(end - beg + 2);
	requests.push(RpcRequest::block_number(FIRST_HEAD_ID));
	let mut id = 2u64;
	for tx in &txs[beg..end] {
		requests.push(RpcRequest::send_raw_transaction(&tx.raw, id));
		id += 1;
	}
	requests.push(RpcRequest::block_number(LAST_HEAD_ID));
	let last_id = id;

	let before_timestamp_ms = now_millis();
	let responses = rpc.execute(&requests).await?;
	let after_timestamp_ms = now_millis();

	check_response_shape(&responses, last_id as usize)?;
	let (hashes, before_block_number, after_block_number) =
		collect_batch_results(&responses, last_id)?;
	check_tx_hashes(&hashes, &txs[beg..end])?;

	Ok(TransactionBatch {
		beg_index: beg,
		end_index: end,
		before_block_number,
		after_block_number,
		before_timestamp_ms,
		after_timestamp_ms,
	})
}

/// The response array must have exactly one item per request, each carrying
/// a result.
fn check_response_shape(responses: &[RpcResponseItem], expected: usize) -> Result<(), CoreError> {
	if responses.len() != expected {
		return Err(CoreError::Protocol(format!(
			"batch response has {} items, expected {}",
			responses.len(),
			expected
		)));
	}
	if let Some(failed) = responses.iter().find(|item| item.result.is_none()) {
		let detail = match &failed.error {
			Some(error) => format!("code {}: {}", error.code, error.message),
			None => "no error object".to_string(),
		};
		return Err(CoreError::Protocol(format!(
			"batch response item without a result ({})",
			detail
		)));
	}
	Ok(())
}

/// Separates the bracketing head numbers from the positionally-keyed
/// submission hashes.
fn collect_batch_results(
	responses: &[RpcResponseItem],
	last_id: u64,
) -> Result<(Vec<String>, u64, u64), CoreError> {
	let mut hashes = vec![String::new(); (last_id - 2) as usize];
	let mut before_block_number = 0u64;
	let mut after_block_number = 0u64;

	for item in responses {
		let id = item
			.id
			.ok_or_else(|| CoreError::Protocol("batch response item without an id".to_string()))?;
		let result = item.result_str().ok_or_else(|| {
			CoreError::Protocol(format!("non-string result for batch response id {}", id))
		})?;
		if id == FIRST_HEAD_ID {
			before_block_number = parse_hex_u64(result)
				.map_err(|e| CoreError::Protocol(e.to_string()))?;
		} else if id >= last_id {
			after_block_number = parse_hex_u64(result)
				.map_err(|e| CoreError::Protocol(e.to_string()))?;
		} else if id < 2 {
			// Real nodes echo id 0 when they fail to parse a request.
			return Err(CoreError::Protocol(format!(
				"batch response id {} does not belong to any request",
				id
			)));
		} else {
			hashes[(id - 2) as usize] = result.to_string();
		}
	}
	Ok((hashes, before_block_number, after_block_number))
}

/// The returned hashes, positionally matched, must equal the precomputed
/// ones; any mismatch signals a signing/transport inconsistency.
fn check_tx_hashes(hashes: &[String], txs: &[SignedTransaction]) -> Result<(), CoreError> {
	for (hash, tx) in hashes.iter().zip(txs) {
		if hash != &tx.hash {
			return Err(CoreError::Protocol(format!(
				"returned transaction hash does not match the precomputed one \
				 (expected {}, got {})",
				tx.hash, hash
			)));
		}
	}
	Ok(())
}
