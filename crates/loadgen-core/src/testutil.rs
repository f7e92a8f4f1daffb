//! Shared fixtures for the core tests: canned options, deterministic
//! transactions, and a scripted mock transport.

use crate::context::{MintingOptions, SendingOptions};
use async_trait::async_trait;
use loadgen_rpc::{BatchRpc, RpcError, RpcRequest, RpcResponseItem};
use loadgen_types::SignedTransaction;
use serde_json::{json, Value};
use std::collections::HashMap;
use std::sync::Mutex;
use std::time::Duration;

pub(crate) fn test_sending_options(rate: u64, duration_secs: u64) -> SendingOptions {
	SendingOptions {
		rate,
		duration_secs,
		target_interval_ms: 1000,
		allowed_interval_ms: 850,
		max_batch_size: 1_000_000,
		batch_pause_ms: 0,
	}
}

pub(crate) fn test_minting_options() -> MintingOptions {
	MintingOptions {
		timeout_secs: 60,
		error_limit: 10,
		block_batch_size: 10,
	}
}

pub(crate) fn test_tx(index: usize) -> SignedTransaction {
	SignedTransaction {
		raw: format!("0xraw{:04}", index),
		hash: format!("0x{:064x}", index + 1),
		from: "0xfrom".to_string(),
		to: "0xto".to_string(),
		nonce: index as u64,
		tx_type: 0,
		gas_limit: 21_000,
		gas_price: Some(1),
		max_fee_per_gas: None,
		max_priority_fee_per_gas: None,
		value: alloy_primitives::U256::ZERO,
		data: "0x".to_string(),
	}
}

/// A block object in the node's response shape.
pub(crate) fn block_json(number: u64, tx_hashes: &[&str]) -> Value {
	json!({
		"number": format!("0x{:x}", number),
		"timestamp": format!("0x{:x}", 1_700_000_000u64 + number),
		"gasLimit": "0x1c9c380",
		"gasUsed": "0x5208",
		"size": "0x200",
		"hash": format!("0xb{:063x}", number),
		"miner": "0x0000000000000000000000000000000000000001",
		"transactions": tx_hashes,
	})
}

/// One scripted reconciliation round.
pub(crate) enum Round {
	/// The transport fails outright.
	Fail,
	/// Blocks available by number (with an optional number override to
	/// fake a protocol violation), plus the reported chain head.
	Blocks {
		blocks: Vec<(u64, Value)>,
		head: u64,
	},
}

/// Mock transport that answers dispatch batches from a raw→hash table and
/// reconciliation rounds from a script. Each call simulates network latency
/// so that paused-clock tests advance time.
pub(crate) struct MockRpc {
	/// Raw transaction string to returned hash.
	pub hashes: HashMap<String, String>,
	/// Chain head reported by `eth_blockNumber` during dispatch.
	pub head: u64,
	/// Scripted reconciliation rounds, consumed in order. When the script
	/// runs out, every further round reports no blocks and `head` as the
	/// chain head (0 under `for_reconciliation`, so the window never grows).
	pub rounds: Mutex<Vec<Round>>,
	/// Simulated request latency.
	pub latency: Duration,
}

impl MockRpc {
	pub(crate) fn for_dispatch(txs: &[SignedTransaction], head: u64) -> Self {
		Self {
			hashes: txs
				.iter()
				.map(|tx| (tx.raw.clone(), tx.hash.clone()))
				.collect(),
			head,
			rounds: Mutex::new(Vec::new()),
			latency: Duration::from_millis(10),
		}
	}

	pub(crate) fn for_reconciliation(rounds: Vec<Round>) -> Self {
		Self {
			hashes: HashMap::new(),
			head: 0,
			rounds: Mutex::new(rounds),
			latency: Duration::from_millis(500),
		}
	}
}

#[async_trait]
impl BatchRpc for MockRpc {
	async fn execute(&self, requests: &[RpcRequest]) -> Result<Vec<RpcResponseItem>, RpcError> {
		tokio::time::sleep(self.latency).await;

		if requests.iter().any(|r| r.method == "eth_sendRawTransaction") {
			return Ok(self.answer_dispatch(requests));
		}

		let round = {
			let mut rounds = self.rounds.lock().unwrap();
			if rounds.is_empty() {
				Round::Blocks {
					blocks: Vec::new(),
					head: self.head,
				}
			} else {
				rounds.remove(0)
			}
		};
		match round {
			Round::Fail => Err(RpcError::Transport("connection refused".to_string())),
			Round::Blocks { blocks, head } => Ok(answer_reconciliation(requests, blocks, head)),
		}
	}
}

impl MockRpc {
	fn answer_dispatch(&self, requests: &[RpcRequest]) -> Vec<RpcResponseItem> {
		requests
			.iter()
			.map(|request| {
				let result = match request.method {
					"eth_blockNumber" => json!(format!("0x{:x}", self.head)),
					"eth_sendRawTransaction" => {
						let raw = request.params[0].as_str().unwrap();
						json!(self.hashes.get(raw).cloned().unwrap_or_default())
					}
					other => panic!("unexpected method {}", other),
				};
				item(request.id, Some(result))
			})
			.collect()
	}
}

fn answer_reconciliation(
	requests: &[RpcRequest],
	blocks: Vec<(u64, Value)>,
	head: u64,
) -> Vec<RpcResponseItem> {
	requests
		.iter()
		.map(|request| match request.method {
			"eth_blockNumber" => item(request.id, Some(json!(format!("0x{:x}", head)))),
			"eth_getBlockByNumber" => {
				let block = blocks
					.iter()
					.find(|(number, _)| *number == request.id)
					.map(|(_, value)| value.clone());
				item(request.id, block)
			}
			other => panic!("unexpected method {}", other),
		})
		.collect()
}

fn item(id: u64, result: Option<Value>) -> RpcResponseItem {
	serde_json::from_value(json!({
		"id": id,
		"result": result,
		"jsonrpc": "2.0",
	}))
	.unwrap()
}
