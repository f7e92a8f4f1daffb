//! JSON-RPC batch transport for the load generator.
//!
//! This module defines the wire types for combined JSON-RPC requests, the
//! [`BatchRpc`] trait the dispatcher and reconciler talk through, and an
//! HTTP implementation over reqwest. Keeping the trait at this seam lets
//! the pacing and reconciliation logic run against mock transports in tests.

use async_trait::async_trait;
use thiserror::Error;

mod http;
mod wire;

pub use http::HttpRpc;
pub use wire::{RpcErrorObject, RpcRequest, RpcResponseItem, FIRST_HEAD_ID, LAST_HEAD_ID};

/// Errors that can occur while talking to the node.
#[derive(Debug, Error)]
pub enum RpcError {
	/// Request failure, timeout, or a non-success HTTP status.
	#[error("transport error: {0}")]
	Transport(String),
	/// The node answered with a JSON-RPC error object.
	#[error("node error {code}: {message}")]
	Node {
		/// JSON-RPC error code.
		code: i64,
		/// JSON-RPC error message.
		message: String,
	},
	/// The response body could not be decoded into the expected shape.
	#[error("malformed response: {0}")]
	Malformed(String),
}

/// Transport capable of executing one combined JSON-RPC request.
///
/// Exactly one call is in flight at a time; the response array may order
/// its items arbitrarily, so callers correlate by request id.
#[async_trait]
pub trait BatchRpc: Send + Sync {
	/// Executes the combined request and returns the raw response items.
	async fn execute(&self, requests: &[RpcRequest]) -> Result<Vec<RpcResponseItem>, RpcError>;
}
