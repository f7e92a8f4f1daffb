//! Core pipeline of the load generator: the shared run state, the paced
//! batch dispatcher, the windowed block reconciler, and the statistics
//! engine.
//!
//! The dispatcher and reconciler run as strictly sequential phases over one
//! [`RunContext`]; exactly one RPC call is in flight at any time. Both talk
//! to the node through the [`loadgen_rpc::BatchRpc`] seam, which is what the
//! tests mock.

use loadgen_rpc::RpcError;
use thiserror::Error;

/// The run context and its bookkeeping.
pub mod context;
/// The interval-paced batch dispatcher.
pub mod dispatcher;
/// The windowed block-polling reconciler.
pub mod reconciler;
/// Statistics aggregation over the final run state.
pub mod stats;

#[cfg(test)]
pub(crate) mod testutil;

pub use context::{MintingOptions, RunContext, SendingOptions};

/// Errors that abort a run.
#[derive(Debug, Error)]
pub enum CoreError {
	/// The node's response contradicts the request: a block's declared
	/// number differs from the id it was fetched under, a returned
	/// submission hash differs from the precomputed one, or the response
	/// array has the wrong shape. Never retried.
	#[error("protocol violation: {0}")]
	Protocol(String),
	/// Transport failure during dispatch, where no retry layer exists.
	#[error(transparent)]
	Rpc(#[from] RpcError),
}
