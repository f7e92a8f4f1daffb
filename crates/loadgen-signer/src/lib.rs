//! Transaction construction and signing for the load generator.
//!
//! This module turns the configured transaction shape into a sequence of
//! pre-signed transactions with precomputed hashes and sequential nonces.
//! It resolves gas settings against the node once at startup, builds the
//! calldata for each supported kind, and signs locally with a private key.
//! Everything the dispatcher later submits is immutable from here on.

use alloy_consensus::{SignableTransaction, TxEip1559, TxEnvelope, TxLegacy};
use alloy_eips::eip2718::Encodable2718;
use alloy_network::TxSignerSync;
use alloy_primitives::{keccak256, Address, Bytes, TxKind, U256};
use alloy_signer_local::PrivateKeySigner;
use loadgen_config::{Config, TransactionConfig};
use loadgen_rpc::{HttpRpc, RpcError};
use loadgen_types::{with_0x_prefix, without_0x_prefix, SignedTransaction, TransactionKind};
use rand::Rng;
use serde_json::{json, Value};
use thiserror::Error;

/// 1.0 expressed in parts per million.
const UNIT_PPM: u64 = 1_000_000;

/// Errors that can occur while preparing signed transactions.
#[derive(Debug, Error)]
pub enum SignerError {
	/// The transaction section of the configuration is unusable.
	#[error("invalid configuration: {0}")]
	Config(String),
	/// The private key could not be parsed.
	#[error("invalid private key: {0}")]
	InvalidKey(String),
	/// Local signing failed.
	#[error("signing failed: {0}")]
	Signing(String),
	/// A node query during fee discovery failed.
	#[error(transparent)]
	Rpc(#[from] RpcError),
	/// Automatic EIP-1559 fees were requested on a pre-London chain.
	#[error("the node does not support EIP-1559 transactions")]
	Eip1559Unsupported,
}

/// Gas settings shared by every transaction of the run, resolved once.
#[derive(Debug, Clone, Copy)]
pub struct FeeSettings {
	/// Gas limit.
	pub gas_limit: u64,
	/// Gas price in wei (legacy transactions).
	pub gas_price: Option<u128>,
	/// Max fee per gas in wei (EIP-1559 transactions).
	pub max_fee_per_gas: Option<u128>,
	/// Max priority fee per gas in wei (EIP-1559 transactions).
	pub max_priority_fee_per_gas: Option<u128>,
}

/// Parses the configured private key into a local signer.
pub fn load_signer(private_key: &str) -> Result<PrivateKeySigner, SignerError> {
	private_key
		.parse()
		.map_err(|e| SignerError::InvalidKey(format!("{}", e)))
}

/// Prepares `count` signed transactions with nonces starting at `nonce`.
///
/// Fee settings are resolved once against the node; the recipient and
/// calldata are rebuilt per transaction so that random recipients and random
/// data vary across the sequence.
pub async fn prepare_signed_transactions(
	rpc: &HttpRpc,
	config: &Config,
	signer: &PrivateKeySigner,
	chain_id: u64,
	nonce: u64,
	count: usize,
) -> Result<Vec<SignedTransaction>, SignerError> {
	let tx_config = &config.transaction;
	let kind = tx_config.kind().map_err(|e| SignerError::Config(e.to_string()))?;
	let value = parse_u256(&tx_config.value, "value")?;
	let amount = parse_u256(&tx_config.amount, "amount")?;

	let fees = resolve_fees(rpc, config, signer, kind).await?;
	tracing::debug!(
		gas_limit = fees.gas_limit,
		gas_price = ?fees.gas_price,
		max_fee_per_gas = ?fees.max_fee_per_gas,
		"resolved gas settings"
	);

	let mut txs = Vec::with_capacity(count);
	for i in 0..count {
		let (to, data) = build_payload(rpc, tx_config, kind, amount).await?;
		let tx = sign_transaction(
			signer,
			chain_id,
			nonce + i as u64,
			&fees,
			to,
			value,
			data,
			tx_config.legacy,
		)?;
		txs.push(tx);
	}
	Ok(txs)
}

/// Resolves the run's gas settings, querying the node where automatic.
pub async fn resolve_fees(
	rpc: &HttpRpc,
	config: &Config,
	signer: &PrivateKeySigner,
	kind: TransactionKind,
) -> Result<FeeSettings, SignerError> {
	let tx_config = &config.transaction;

	let gas_limit = if tx_config.auto_gas_limit {
		let call = estimation_call(rpc, tx_config, signer, kind).await?;
		let estimated = rpc.estimate_gas(&call).await?;
		apply_ppm(estimated as u128, tx_config.auto_gas_limit_coef_ppm) as u64
	} else {
		tx_config.gas_limit
	};

	let (gas_price, max_fee_per_gas, max_priority_fee_per_gas) = if !tx_config.auto_gas_price {
		let static_price: u128 = tx_config
			.gas_price
			.parse()
			.map_err(|_| SignerError::Config("gas price is not a decimal number".to_string()))?;
		if tx_config.legacy {
			(Some(static_price), None, None)
		} else {
			(None, Some(static_price), Some(static_price))
		}
	} else if tx_config.legacy {
		let price = apply_ppm(rpc.gas_price().await?, tx_config.auto_gas_price_coef_ppm);
		(Some(price), None, None)
	} else {
		let priority = rpc.max_priority_fee_per_gas().await?;
		let base_fee = rpc
			.latest_base_fee()
			.await?
			.ok_or(SignerError::Eip1559Unsupported)?;
		let max_fee = base_fee * 2 + priority;
		(
			None,
			Some(apply_ppm(max_fee, tx_config.auto_gas_price_coef_ppm)),
			Some(apply_ppm(priority, tx_config.auto_gas_price_coef_ppm)),
		)
	};

	Ok(FeeSettings {
		gas_limit,
		gas_price,
		max_fee_per_gas,
		max_priority_fee_per_gas,
	})
}

/// Builds the recipient and calldata for one transaction.
async fn build_payload(
	rpc: &HttpRpc,
	tx_config: &TransactionConfig,
	kind: TransactionKind,
	amount: U256,
) -> Result<(Address, Bytes), SignerError> {
	match kind {
		TransactionKind::Common => {
			let to = recipient(rpc, tx_config).await?;
			Ok((to, common_calldata(tx_config)?))
		}
		TransactionKind::Erc20Transfer => {
			let contract = contract_address(tx_config)?;
			let to = recipient(rpc, tx_config).await?;
			Ok((contract, encode_transfer(to, amount)))
		}
		TransactionKind::PixCashIn => {
			let contract = contract_address(tx_config)?;
			let to = recipient(rpc, tx_config).await?;
			Ok((contract, encode_cash_in(to, amount)))
		}
	}
}

/// Signs one transaction and captures its raw encoding and hash.
#[allow(clippy::too_many_arguments)]
pub fn sign_transaction(
	signer: &PrivateKeySigner,
	chain_id: u64,
	nonce: u64,
	fees: &FeeSettings,
	to: Address,
	value: U256,
	data: Bytes,
	legacy: bool,
) -> Result<SignedTransaction, SignerError> {
	let envelope = if legacy {
		let mut tx = TxLegacy {
			chain_id: Some(chain_id),
			nonce,
			gas_price: fees.gas_price.unwrap_or_default(),
			gas_limit: fees.gas_limit,
			to: TxKind::Call(to),
			value,
			input: data.clone(),
		};
		let signature = signer
			.sign_transaction_sync(&mut tx)
			.map_err(|e| SignerError::Signing(e.to_string()))?;
		TxEnvelope::Legacy(tx.into_signed(signature))
	} else {
		let mut tx = TxEip1559 {
			chain_id,
			nonce,
			gas_limit: fees.gas_limit,
			max_fee_per_gas: fees.max_fee_per_gas.unwrap_or_default(),
			max_priority_fee_per_gas: fees.max_priority_fee_per_gas.unwrap_or_default(),
			to: TxKind::Call(to),
			value,
			access_list: Default::default(),
			input: data.clone(),
		};
		let signature = signer
			.sign_transaction_sync(&mut tx)
			.map_err(|e| SignerError::Signing(e.to_string()))?;
		TxEnvelope::Eip1559(tx.into_signed(signature))
	};

	let raw = envelope.encoded_2718();
	let hash = keccak256(&raw);
	Ok(SignedTransaction {
		raw: with_0x_prefix(&hex::encode(&raw)),
		hash: with_0x_prefix(&hex::encode(hash)),
		from: signer.address().to_string(),
		to: to.to_string(),
		nonce,
		tx_type: if legacy { 0 } else { 2 },
		gas_limit: fees.gas_limit,
		gas_price: if legacy { fees.gas_price } else { None },
		max_fee_per_gas: if legacy { None } else { fees.max_fee_per_gas },
		max_priority_fee_per_gas: if legacy {
			None
		} else {
			fees.max_priority_fee_per_gas
		},
		value,
		data: with_0x_prefix(&hex::encode(&data)),
	})
}

/// Resolves the recipient: the configured static address, or a fresh random
/// EOA checked against the node for absence of code.
async fn recipient(rpc: &HttpRpc, tx_config: &TransactionConfig) -> Result<Address, SignerError> {
	if let Some(static_recipient) = tx_config.static_recipient.as_deref() {
		return static_recipient.parse().map_err(|_| {
			SignerError::Config(format!("invalid static recipient '{}'", static_recipient))
		});
	}
	loop {
		let mut bytes = [0u8; 20];
		rand::thread_rng().fill(&mut bytes[..]);
		let address = Address::from(bytes);
		let code = rpc.get_code(&address.to_string()).await?;
		if code == "0x" {
			return Ok(address);
		}
	}
}

fn contract_address(tx_config: &TransactionConfig) -> Result<Address, SignerError> {
	let contract = tx_config
		.contract_address
		.as_deref()
		.ok_or_else(|| SignerError::Config("missing contract address".to_string()))?;
	contract
		.parse()
		.map_err(|_| SignerError::Config(format!("invalid contract address '{}'", contract)))
}

/// Calldata for the `common` kind: static, random of the configured size,
/// or empty.
fn common_calldata(tx_config: &TransactionConfig) -> Result<Bytes, SignerError> {
	if let Some(data) = tx_config.data.as_deref() {
		let decoded = hex::decode(without_0x_prefix(data))
			.map_err(|_| SignerError::Config("static calldata is not valid hex".to_string()))?;
		return Ok(Bytes::from(decoded));
	}
	if tx_config.random_data_size > 0 {
		let mut data = vec![0u8; tx_config.random_data_size];
		rand::thread_rng().fill(&mut data[..]);
		return Ok(Bytes::from(data));
	}
	Ok(Bytes::new())
}

/// Worst-case calldata for gas estimation of the `common` kind.
fn estimation_calldata(tx_config: &TransactionConfig) -> Result<Bytes, SignerError> {
	if tx_config.data.is_some() {
		return common_calldata(tx_config);
	}
	Ok(Bytes::from(vec![0xffu8; tx_config.random_data_size]))
}

/// Builds the `eth_estimateGas` call object for the configured shape.
async fn estimation_call(
	rpc: &HttpRpc,
	tx_config: &TransactionConfig,
	signer: &PrivateKeySigner,
	kind: TransactionKind,
) -> Result<Value, SignerError> {
	let value = parse_u256(&tx_config.value, "value")?;
	let amount = parse_u256(&tx_config.amount, "amount")?;
	let (to, data) = match kind {
		TransactionKind::Common => {
			let to = recipient(rpc, tx_config).await?;
			(to, estimation_calldata(tx_config)?)
		}
		_ => build_payload(rpc, tx_config, kind, amount).await?,
	};

	let mut call = json!({
		"from": signer.address().to_string(),
		"to": to.to_string(),
		"value": format!("{:#x}", value),
	});
	if !data.is_empty() {
		call["data"] = json!(with_0x_prefix(&hex::encode(&data)));
	}
	Ok(call)
}

/// First four bytes of the keccak hash of a Solidity function signature.
fn selector(signature: &str) -> [u8; 4] {
	let hash = keccak256(signature.as_bytes());
	[hash[0], hash[1], hash[2], hash[3]]
}

/// Encodes `transfer(address,uint256)` calldata.
fn encode_transfer(recipient: Address, amount: U256) -> Bytes {
	let mut data = Vec::with_capacity(4 + 64);
	data.extend_from_slice(&selector("transfer(address,uint256)"));
	data.extend_from_slice(&[0u8; 12]);
	data.extend_from_slice(recipient.as_slice());
	data.extend_from_slice(&amount.to_be_bytes::<32>());
	Bytes::from(data)
}

/// Encodes `cashIn(address,uint256,bytes32)` calldata with an all-ones tx id.
fn encode_cash_in(recipient: Address, amount: U256) -> Bytes {
	let mut data = Vec::with_capacity(4 + 96);
	data.extend_from_slice(&selector("cashIn(address,uint256,bytes32)"));
	data.extend_from_slice(&[0u8; 12]);
	data.extend_from_slice(recipient.as_slice());
	data.extend_from_slice(&amount.to_be_bytes::<32>());
	data.extend_from_slice(&[0xffu8; 32]);
	Bytes::from(data)
}

/// Applies a parts-per-million coefficient with integer arithmetic.
fn apply_ppm(value: u128, coef_ppm: u64) -> u128 {
	if coef_ppm == UNIT_PPM {
		return value;
	}
	let scaled = U256::from(value) * U256::from(coef_ppm) / U256::from(UNIT_PPM);
	scaled.to::<u128>()
}

fn parse_u256(value: &str, what: &str) -> Result<U256, SignerError> {
	value
		.parse()
		.map_err(|_| SignerError::Config(format!("{} '{}' is not a valid number", what, value)))
}
