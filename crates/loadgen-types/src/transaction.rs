//! Transaction-related types: signed transactions, dispatch batches, and
//! per-transaction results.

use alloy_primitives::U256;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// The kind of transaction the run submits.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum TransactionKind {
	/// A plain value transfer, optionally carrying an arbitrary data field.
	Common,
	/// An ERC-20 `transfer(address,uint256)` call against a token contract.
	Erc20Transfer,
	/// A `cashIn(address,uint256,bytes32)` call against a PIX cash-in contract.
	PixCashIn,
}

impl FromStr for TransactionKind {
	type Err = String;

	fn from_str(s: &str) -> Result<Self, Self::Err> {
		match s {
			"common" => Ok(Self::Common),
			"erc20-transfer" => Ok(Self::Erc20Transfer),
			"pix-cash-in" => Ok(Self::PixCashIn),
			other => Err(format!("unsupported transaction kind '{}'", other)),
		}
	}
}

impl fmt::Display for TransactionKind {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		let name = match self {
			Self::Common => "common",
			Self::Erc20Transfer => "erc20-transfer",
			Self::PixCashIn => "pix-cash-in",
		};
		f.write_str(name)
	}
}

/// An already-signed transaction with its raw encoding and precomputed hash.
///
/// Immutable once created; identified by its hash, which is assumed unique
/// within a run.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SignedTransaction {
	/// Raw EIP-2718 encoding, 0x-prefixed hex, ready for `eth_sendRawTransaction`.
	pub raw: String,
	/// Transaction hash, 0x-prefixed hex.
	pub hash: String,
	/// Sender address.
	pub from: String,
	/// Recipient address (the target contract for call kinds).
	pub to: String,
	/// Account nonce.
	pub nonce: u64,
	/// Transaction envelope type: 0 for legacy, 2 for EIP-1559.
	pub tx_type: u8,
	/// Gas limit.
	pub gas_limit: u64,
	/// Gas price in wei (legacy transactions only).
	pub gas_price: Option<u128>,
	/// Max fee per gas in wei (EIP-1559 transactions only).
	pub max_fee_per_gas: Option<u128>,
	/// Max priority fee per gas in wei (EIP-1559 transactions only).
	pub max_priority_fee_per_gas: Option<u128>,
	/// Transferred value in wei.
	pub value: U256,
	/// Calldata, 0x-prefixed hex.
	pub data: String,
}

impl SignedTransaction {
	/// The effective per-gas price column for reports: the gas price for
	/// legacy transactions, the max fee for EIP-1559 ones.
	pub fn fee_per_gas(&self) -> u128 {
		self.gas_price
			.or(self.max_fee_per_gas)
			.unwrap_or_default()
	}
}

/// One RPC round of submissions: a half-open index range into the ordered
/// transaction sequence, bracketed by the chain head and the wall clock
/// observed immediately before and after the call.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct TransactionBatch {
	/// First transaction index covered by this batch (inclusive).
	pub beg_index: usize,
	/// One past the last transaction index covered by this batch.
	pub end_index: usize,
	/// Chain head observed in the same request, before the submissions.
	pub before_block_number: u64,
	/// Chain head observed in the same request, after the submissions.
	pub after_block_number: u64,
	/// Wall clock immediately before the request was issued (ms).
	pub before_timestamp_ms: u64,
	/// Wall clock immediately after the response arrived (ms).
	pub after_timestamp_ms: u64,
}

impl TransactionBatch {
	/// Number of transactions covered by this batch.
	pub fn size(&self) -> usize {
		self.end_index - self.beg_index
	}
}

/// Per-transaction outcome record.
///
/// Created in bulk once all batches are known, then mutated exactly once by
/// the reconciler when the hash is matched to a block.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TransactionResult {
	/// Position in the ordered transaction sequence.
	pub index: usize,
	/// Chain head observed before the batch that sent this transaction.
	pub sending_block_number: u64,
	/// Wall clock before the sending batch was issued (ms).
	pub sent_at_ms: u64,
	/// Wall clock after the sending batch was acknowledged (ms).
	pub sent_confirmed_at_ms: u64,
	/// Block in which the transaction was minted, once known.
	pub mining_block_number: Option<u64>,
	/// Local wall clock when the minting block was fetched (ms).
	pub minted_at_ms: Option<u64>,
}
