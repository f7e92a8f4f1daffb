//! Configuration module for the load generator.
//!
//! This module provides structures and utilities for managing run
//! configuration. It supports loading configuration from TOML files and
//! provides fail-fast validation so that misconfiguration is rejected
//! before any network activity.

use alloy_primitives::{Address, U256};
use loadgen_types::TransactionKind;
use serde::{Deserialize, Serialize};
use std::path::Path;
use thiserror::Error;

/// Length of one sending interval in milliseconds.
pub const TARGET_INTERVAL_MS: u64 = 1000;

/// Minimum interval runway required to issue a call; with less remaining
/// time the interval is skipped entirely.
pub const ALLOWED_INTERVAL_MS: u64 = 850;

/// Errors that can occur during configuration operations.
#[derive(Debug, Error)]
pub enum ConfigError {
	/// Error that occurs during file I/O operations.
	#[error("IO error: {0}")]
	Io(#[from] std::io::Error),
	/// Error that occurs when parsing TOML configuration.
	#[error("Configuration error: {0}")]
	Parse(String),
	/// Error that occurs when configuration validation fails.
	#[error("Validation error: {0}")]
	Validation(String),
}

impl From<toml::de::Error> for ConfigError {
	fn from(err: toml::de::Error) -> Self {
		ConfigError::Parse(err.message().to_string())
	}
}

/// Main configuration structure for a load-generation run.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct Config {
	/// Node endpoints.
	pub node: NodeConfig,
	/// Sender account.
	pub account: AccountConfig,
	/// Shape of the submitted transactions.
	#[serde(default)]
	pub transaction: TransactionConfig,
	/// Pacing of the dispatch phase.
	#[serde(default)]
	pub sending: SendingConfig,
	/// Reconciliation of minted transactions.
	#[serde(default)]
	pub minting: MintingConfig,
	/// Report file output.
	#[serde(default)]
	pub report: ReportConfig,
}

/// Node endpoint configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct NodeConfig {
	/// JSON-RPC URL used for transaction submission.
	pub sending_url: String,
	/// JSON-RPC URL used for reads; defaults to the sending URL.
	pub reading_url: Option<String>,
}

impl NodeConfig {
	/// The URL to use for read queries.
	pub fn reading_url(&self) -> &str {
		self.reading_url.as_deref().unwrap_or(&self.sending_url)
	}
}

/// Sender account configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct AccountConfig {
	/// Hex-encoded private key of the sending account, 0x prefix optional.
	pub private_key: String,
}

/// Shape of the submitted transactions.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct TransactionConfig {
	/// Transaction kind: `common`, `erc20-transfer`, or `pix-cash-in`.
	#[serde(default = "default_kind")]
	pub kind: String,
	/// Target contract for the call kinds.
	pub contract_address: Option<String>,
	/// Static recipient; a fresh random EOA is used per transaction when absent.
	pub static_recipient: Option<String>,
	/// Transferred native value in wei (decimal string).
	#[serde(default = "default_zero")]
	pub value: String,
	/// Token amount for the call kinds (decimal string).
	#[serde(default = "default_one")]
	pub amount: String,
	/// Static calldata for the `common` kind, 0x-prefixed hex.
	pub data: Option<String>,
	/// Size in bytes of the random calldata for the `common` kind when no
	/// static calldata is configured.
	#[serde(default)]
	pub random_data_size: usize,
	/// Whether to build legacy (pre-EIP-1559) transactions.
	#[serde(default = "default_true")]
	pub legacy: bool,
	/// Whether to fetch the gas price from the node.
	#[serde(default = "default_true")]
	pub auto_gas_price: bool,
	/// Coefficient applied to the fetched gas price, parts per million.
	#[serde(default = "default_unit_ppm")]
	pub auto_gas_price_coef_ppm: u64,
	/// Static gas price in wei (decimal string), used when not automatic.
	#[serde(default = "default_one")]
	pub gas_price: String,
	/// Whether to estimate the gas limit against the node.
	#[serde(default = "default_true")]
	pub auto_gas_limit: bool,
	/// Coefficient applied to the estimated gas limit, parts per million.
	#[serde(default = "default_unit_ppm")]
	pub auto_gas_limit_coef_ppm: u64,
	/// Static gas limit, used when not automatic.
	#[serde(default = "default_one_u64")]
	pub gas_limit: u64,
}

impl TransactionConfig {
	/// The parsed transaction kind.
	pub fn kind(&self) -> Result<TransactionKind, ConfigError> {
		self.kind.parse().map_err(ConfigError::Validation)
	}

	/// Calldata size in bytes, derived from either the static calldata or
	/// the configured random size. Used for gas estimation.
	pub fn data_field_size(&self) -> usize {
		match &self.data {
			Some(data) => loadgen_types::without_0x_prefix(data).len() / 2,
			None => self.random_data_size,
		}
	}
}

impl Default for TransactionConfig {
	fn default() -> Self {
		Self {
			kind: default_kind(),
			contract_address: None,
			static_recipient: None,
			value: default_zero(),
			amount: default_one(),
			data: None,
			random_data_size: 0,
			legacy: true,
			auto_gas_price: true,
			auto_gas_price_coef_ppm: default_unit_ppm(),
			gas_price: default_one(),
			auto_gas_limit: true,
			auto_gas_limit_coef_ppm: default_unit_ppm(),
			gas_limit: 1,
		}
	}
}

/// Pacing configuration for the dispatch phase.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct SendingConfig {
	/// Target submission rate, transactions per second.
	#[serde(default = "default_rate")]
	pub rate: u64,
	/// Number of one-second sending intervals.
	#[serde(default = "default_duration")]
	pub duration_secs: u64,
	/// Maximum number of submissions per RPC call.
	#[serde(default = "default_max_batch_size")]
	pub max_batch_size: usize,
	/// Pause between successive intra-interval calls, milliseconds.
	#[serde(default)]
	pub batch_pause_ms: u64,
	/// Optional trailing-milliseconds alignment for the run start, as a
	/// digit string (e.g. `"0000"` starts on a whole second).
	pub start_millis: Option<String>,
}

impl SendingConfig {
	/// Total number of transactions the run targets.
	pub fn total_tx_count(&self) -> usize {
		(self.rate * self.duration_secs) as usize
	}
}

impl Default for SendingConfig {
	fn default() -> Self {
		Self {
			rate: default_rate(),
			duration_secs: default_duration(),
			max_batch_size: default_max_batch_size(),
			batch_pause_ms: 0,
			start_millis: None,
		}
	}
}

/// Reconciliation configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct MintingConfig {
	/// Whether to await transaction minting at all.
	#[serde(default = "default_true")]
	pub enabled: bool,
	/// Timeout in seconds, armed once the chain catches up to the last
	/// sending block.
	#[serde(default = "default_minting_timeout")]
	pub timeout_secs: u64,
	/// Consecutive transport failures tolerated before giving up.
	#[serde(default = "default_error_limit")]
	pub error_limit: u32,
	/// Size of the block-polling window.
	#[serde(default = "default_block_batch_size")]
	pub block_batch_size: usize,
}

impl Default for MintingConfig {
	fn default() -> Self {
		Self {
			enabled: true,
			timeout_secs: default_minting_timeout(),
			error_limit: default_error_limit(),
			block_batch_size: default_block_batch_size(),
		}
	}
}

/// Report file configuration. An empty file name disables that report.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ReportConfig {
	/// Directory the report files are written into.
	#[serde(default = "default_report_directory")]
	pub directory: String,
	/// Base name of the per-transaction report.
	#[serde(default = "default_transactions_file")]
	pub transactions_file: String,
	/// Base name of the per-block report.
	#[serde(default = "default_blocks_file")]
	pub blocks_file: String,
	/// Base name of the statistics report.
	#[serde(default = "default_statistics_file")]
	pub statistics_file: String,
	/// Suffix appended to every report file name.
	#[serde(default = "default_suffix")]
	pub suffix: String,
}

impl Default for ReportConfig {
	fn default() -> Self {
		Self {
			directory: default_report_directory(),
			transactions_file: default_transactions_file(),
			blocks_file: default_blocks_file(),
			statistics_file: default_statistics_file(),
			suffix: default_suffix(),
		}
	}
}

fn default_kind() -> String {
	"common".to_string()
}

fn default_zero() -> String {
	"0".to_string()
}

fn default_one() -> String {
	"1".to_string()
}

fn default_one_u64() -> u64 {
	1
}

fn default_true() -> bool {
	true
}

fn default_unit_ppm() -> u64 {
	1_000_000
}

fn default_rate() -> u64 {
	3
}

fn default_duration() -> u64 {
	5
}

fn default_max_batch_size() -> usize {
	1_000_000
}

fn default_minting_timeout() -> u64 {
	60
}

fn default_error_limit() -> u32 {
	10
}

fn default_block_batch_size() -> usize {
	10
}

fn default_report_directory() -> String {
	"results".to_string()
}

fn default_transactions_file() -> String {
	"out_txs".to_string()
}

fn default_blocks_file() -> String {
	"out_blocks".to_string()
}

fn default_statistics_file() -> String {
	"out_tx_stat".to_string()
}

fn default_suffix() -> String {
	"net-local".to_string()
}

impl Config {
	/// Loads configuration from a TOML file.
	pub fn from_file(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
		let content = std::fs::read_to_string(path)?;
		let config: Config = toml::from_str(&content)?;
		Ok(config)
	}

	/// Validates the configuration before any network activity.
	///
	/// Rejects unsupported transaction kinds, colliding report file names,
	/// and malformed keys, addresses, and numeric strings.
	pub fn validate(&self) -> Result<(), ConfigError> {
		let kind = self.transaction.kind()?;

		let key = loadgen_types::without_0x_prefix(&self.account.private_key);
		let key_bytes = hex::decode(key)
			.map_err(|_| ConfigError::Validation("private key is not valid hex".to_string()))?;
		if key_bytes.len() != 32 {
			return Err(ConfigError::Validation(
				"private key must be 32 bytes".to_string(),
			));
		}

		if kind != TransactionKind::Common {
			let contract = self.transaction.contract_address.as_deref().ok_or_else(|| {
				ConfigError::Validation(format!(
					"transaction kind '{}' requires a contract address",
					kind
				))
			})?;
			parse_address(contract, "contract address")?;
		}
		if let Some(recipient) = self.transaction.static_recipient.as_deref() {
			parse_address(recipient, "static recipient")?;
		}

		parse_u256(&self.transaction.value, "value")?;
		parse_u256(&self.transaction.amount, "amount")?;
		self.transaction
			.gas_price
			.parse::<u128>()
			.map_err(|_| ConfigError::Validation("gas price is not a decimal number".to_string()))?;

		if let Some(data) = self.transaction.data.as_deref() {
			hex::decode(loadgen_types::without_0x_prefix(data))
				.map_err(|_| ConfigError::Validation("static calldata is not valid hex".to_string()))?;
		}

		if let Some(millis) = self.sending.start_millis.as_deref() {
			if millis.is_empty() || !millis.bytes().all(|b| b.is_ascii_digit()) {
				return Err(ConfigError::Validation(
					"start_millis must be a non-empty digit string".to_string(),
				));
			}
		}

		self.check_report_names()?;
		Ok(())
	}

	/// Rejects two enabled report outputs sharing one file name, which would
	/// silently overwrite each other.
	fn check_report_names(&self) -> Result<(), ConfigError> {
		let report = &self.report;
		let pairs = [
			(&report.transactions_file, &report.statistics_file),
			(&report.transactions_file, &report.blocks_file),
			(&report.statistics_file, &report.blocks_file),
		];
		for (a, b) in pairs {
			if !a.is_empty() && a == b {
				return Err(ConfigError::Validation(format!(
					"report file name '{}' is used for two different reports",
					a
				)));
			}
		}
		Ok(())
	}
}

fn parse_address(value: &str, what: &str) -> Result<Address, ConfigError> {
	value
		.parse()
		.map_err(|_| ConfigError::Validation(format!("{} '{}' is not a valid address", what, value)))
}

fn parse_u256(value: &str, what: &str) -> Result<U256, ConfigError> {
	value
		.parse()
		.map_err(|_| ConfigError::Validation(format!("{} '{}' is not a valid number", what, value)))
}
