//! Small conversion and formatting helpers shared across the workspace.

use alloy_primitives::U256;
use std::time::{SystemTime, UNIX_EPOCH};
use thiserror::Error;

/// Error returned when a JSON-RPC hex quantity cannot be parsed.
#[derive(Debug, Error)]
#[error("invalid hex quantity '{0}'")]
pub struct HexQuantityError(pub String);

/// Ensures a hex string carries the `0x` prefix.
pub fn with_0x_prefix(hex: &str) -> String {
	if hex.starts_with("0x") {
		hex.to_string()
	} else {
		format!("0x{}", hex)
	}
}

/// Strips the `0x` prefix from a hex string if present.
pub fn without_0x_prefix(hex: &str) -> &str {
	hex.strip_prefix("0x").unwrap_or(hex)
}

/// Parses a JSON-RPC hex quantity (e.g. `"0x1a"`) into a `u64`.
pub fn parse_hex_u64(quantity: &str) -> Result<u64, HexQuantityError> {
	u64::from_str_radix(without_0x_prefix(quantity), 16)
		.map_err(|_| HexQuantityError(quantity.to_string()))
}

/// Parses a JSON-RPC hex quantity into a `u128`.
pub fn parse_hex_u128(quantity: &str) -> Result<u128, HexQuantityError> {
	u128::from_str_radix(without_0x_prefix(quantity), 16)
		.map_err(|_| HexQuantityError(quantity.to_string()))
}

/// Parses a JSON-RPC hex quantity into a `U256`.
///
/// Used for gas fields, which must never pass through a floating-point type.
pub fn parse_hex_u256(quantity: &str) -> Result<U256, HexQuantityError> {
	U256::from_str_radix(without_0x_prefix(quantity), 16)
		.map_err(|_| HexQuantityError(quantity.to_string()))
}

/// Current wall-clock time as milliseconds since the Unix epoch.
pub fn now_millis() -> u64 {
	SystemTime::now()
		.duration_since(UNIX_EPOCH)
		.unwrap_or_default()
		.as_millis() as u64
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn test_prefix_helpers() {
		assert_eq!(with_0x_prefix("ab"), "0xab");
		assert_eq!(with_0x_prefix("0xab"), "0xab");
		assert_eq!(without_0x_prefix("0xab"), "ab");
		assert_eq!(without_0x_prefix("ab"), "ab");
	}

	#[test]
	fn test_parse_hex_u64() {
		assert_eq!(parse_hex_u64("0x0").unwrap(), 0);
		assert_eq!(parse_hex_u64("0x1a").unwrap(), 26);
		assert_eq!(parse_hex_u64("ff").unwrap(), 255);
		assert!(parse_hex_u64("0xzz").is_err());
		assert!(parse_hex_u64("").is_err());
	}

	#[test]
	fn test_parse_hex_u256() {
		let parsed = parse_hex_u256("0x1c9c380").unwrap();
		assert_eq!(parsed, U256::from(30_000_000u64));
		assert!(parse_hex_u256("0xzz").is_err());
	}
}
