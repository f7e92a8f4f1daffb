//! HTTP JSON-RPC client over reqwest.

use crate::{BatchRpc, RpcError, RpcRequest, RpcResponseItem};
use async_trait::async_trait;
use loadgen_types::{parse_hex_u128, parse_hex_u64};
use serde_json::{json, Value};

/// JSON-RPC client for a single node endpoint.
///
/// Batch execution goes through [`BatchRpc`]; the inherent methods cover the
/// single-shot queries used during startup (chain id, nonce, fee discovery).
pub struct HttpRpc {
	client: reqwest::Client,
	url: String,
}

impl HttpRpc {
	/// Creates a client for the given endpoint URL.
	pub fn new(url: impl Into<String>) -> Self {
		Self {
			client: reqwest::Client::new(),
			url: url.into(),
		}
	}

	/// The endpoint URL this client talks to.
	pub fn url(&self) -> &str {
		&self.url
	}

	/// Issues one request outside of a batch and returns its result payload.
	async fn call(&self, request: RpcRequest) -> Result<Value, RpcError> {
		let response = self
			.client
			.post(&self.url)
			.json(&request)
			.send()
			.await
			.map_err(|e| RpcError::Transport(e.to_string()))?
			.error_for_status()
			.map_err(|e| RpcError::Transport(e.to_string()))?;

		let item: RpcResponseItem = response
			.json()
			.await
			.map_err(|e| RpcError::Malformed(e.to_string()))?;

		if let Some(error) = item.error {
			return Err(RpcError::Node {
				code: error.code,
				message: error.message,
			});
		}
		item.result
			.ok_or_else(|| RpcError::Malformed(format!("no result for {}", request.method)))
	}

	/// Issues one request and parses its result as a hex quantity string.
	async fn call_quantity(&self, request: RpcRequest) -> Result<String, RpcError> {
		let method = request.method;
		let result = self.call(request).await?;
		result
			.as_str()
			.map(str::to_string)
			.ok_or_else(|| RpcError::Malformed(format!("non-string result for {}", method)))
	}

	/// Current chain head number.
	pub async fn block_number(&self) -> Result<u64, RpcError> {
		let quantity = self.call_quantity(RpcRequest::block_number(1)).await?;
		parse_hex_u64(&quantity).map_err(|e| RpcError::Malformed(e.to_string()))
	}

	/// Chain id of the node.
	pub async fn chain_id(&self) -> Result<u64, RpcError> {
		let quantity = self
			.call_quantity(RpcRequest::new("eth_chainId", json!([]), 1))
			.await?;
		parse_hex_u64(&quantity).map_err(|e| RpcError::Malformed(e.to_string()))
	}

	/// Current recommended gas price in wei.
	pub async fn gas_price(&self) -> Result<u128, RpcError> {
		let quantity = self
			.call_quantity(RpcRequest::new("eth_gasPrice", json!([]), 1))
			.await?;
		parse_hex_u128(&quantity).map_err(|e| RpcError::Malformed(e.to_string()))
	}

	/// Current recommended priority fee in wei.
	pub async fn max_priority_fee_per_gas(&self) -> Result<u128, RpcError> {
		let quantity = self
			.call_quantity(RpcRequest::new("eth_maxPriorityFeePerGas", json!([]), 1))
			.await?;
		parse_hex_u128(&quantity).map_err(|e| RpcError::Malformed(e.to_string()))
	}

	/// Base fee of the latest block, when the chain reports one.
	pub async fn latest_base_fee(&self) -> Result<Option<u128>, RpcError> {
		let block = self
			.call(RpcRequest::new(
				"eth_getBlockByNumber",
				json!(["latest", false]),
				1,
			))
			.await?;
		match block.get("baseFeePerGas").and_then(Value::as_str) {
			Some(quantity) => parse_hex_u128(quantity)
				.map(Some)
				.map_err(|e| RpcError::Malformed(e.to_string())),
			None => Ok(None),
		}
	}

	/// Gas estimation for a call object.
	pub async fn estimate_gas(&self, call: &Value) -> Result<u64, RpcError> {
		let quantity = self
			.call_quantity(RpcRequest::new("eth_estimateGas", json!([call]), 1))
			.await?;
		parse_hex_u64(&quantity).map_err(|e| RpcError::Malformed(e.to_string()))
	}

	/// Transaction count (next nonce) of an address at the latest block.
	pub async fn transaction_count(&self, address: &str) -> Result<u64, RpcError> {
		let quantity = self
			.call_quantity(RpcRequest::new(
				"eth_getTransactionCount",
				json!([address, "latest"]),
				1,
			))
			.await?;
		parse_hex_u64(&quantity).map_err(|e| RpcError::Malformed(e.to_string()))
	}

	/// Deployed code at an address, `"0x"` for an EOA.
	pub async fn get_code(&self, address: &str) -> Result<String, RpcError> {
		self.call_quantity(RpcRequest::new(
			"eth_getCode",
			json!([address, "latest"]),
			1,
		))
		.await
	}
}

#[async_trait]
impl BatchRpc for HttpRpc {
	async fn execute(&self, requests: &[RpcRequest]) -> Result<Vec<RpcResponseItem>, RpcError> {
		tracing::trace!(count = requests.len(), url = %self.url, "executing combined request");
		let response = self
			.client
			.post(&self.url)
			.json(&requests)
			.send()
			.await
			.map_err(|e| RpcError::Transport(e.to_string()))?
			.error_for_status()
			.map_err(|e| RpcError::Transport(e.to_string()))?;

		response
			.json()
			.await
			.map_err(|e| RpcError::Malformed(e.to_string()))
	}
}
