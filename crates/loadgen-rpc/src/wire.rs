//! JSON-RPC request and response wire shapes.

use serde::{Deserialize, Serialize};
use serde_json::{json, Value};

/// Request id of the head query that opens a dispatch batch.
pub const FIRST_HEAD_ID: u64 = 1;

/// Sentinel request id of the head query that closes a dispatch batch.
///
/// Large enough that no submission id in the same batch can reach it.
pub const LAST_HEAD_ID: u64 = 1_000_000_000;

/// One JSON-RPC 2.0 request.
#[derive(Debug, Clone, Serialize)]
pub struct RpcRequest {
	/// Method name, e.g. `eth_blockNumber`.
	pub method: &'static str,
	/// Positional parameters.
	pub params: Value,
	/// Request id, echoed back by the node.
	pub id: u64,
	/// Protocol version, always `"2.0"`.
	pub jsonrpc: &'static str,
}

impl RpcRequest {
	/// Creates a request with the given method, params, and id.
	pub fn new(method: &'static str, params: Value, id: u64) -> Self {
		Self {
			method,
			params,
			id,
			jsonrpc: "2.0",
		}
	}

	/// `eth_blockNumber` query for the current chain head.
	pub fn block_number(id: u64) -> Self {
		Self::new("eth_blockNumber", json!([]), id)
	}

	/// `eth_sendRawTransaction` submission of a raw signed transaction.
	pub fn send_raw_transaction(raw: &str, id: u64) -> Self {
		Self::new("eth_sendRawTransaction", json!([raw]), id)
	}

	/// `eth_getBlockByNumber` query without transaction bodies.
	///
	/// The request id is the block number itself, so the response can be
	/// checked against the block's own declared number.
	pub fn block_by_number(number: u64) -> Self {
		Self::new(
			"eth_getBlockByNumber",
			json!([format!("0x{:x}", number), false]),
			number,
		)
	}
}

/// One item of a JSON-RPC batch response.
#[derive(Debug, Clone, Deserialize)]
pub struct RpcResponseItem {
	/// Echoed request id. Missing or null on some node-side failures.
	#[serde(default)]
	pub id: Option<u64>,
	/// Result payload; `None` when absent or null.
	#[serde(default)]
	pub result: Option<Value>,
	/// Error object on failure.
	#[serde(default)]
	pub error: Option<RpcErrorObject>,
}

impl RpcResponseItem {
	/// The result as a string slice, if it is a JSON string.
	pub fn result_str(&self) -> Option<&str> {
		self.result.as_ref().and_then(Value::as_str)
	}
}

/// JSON-RPC error object.
#[derive(Debug, Clone, Deserialize)]
pub struct RpcErrorObject {
	/// Error code.
	pub code: i64,
	/// Error message.
	pub message: String,
}
