//! Common types module for the loadgen workspace.
//!
//! This module defines the core data types shared across the load generator:
//! signed transactions, batches, per-transaction results, block receipts,
//! and the statistics primitives. It provides a centralized location for
//! shared types to ensure consistency across all components.

/// Block receipt and block result types.
pub mod block;
/// Statistics primitives: the streaming sample accumulator and run-level aggregates.
pub mod stats;
/// Transaction-related types: signed transactions, batches, and results.
pub mod transaction;
/// Small conversion and formatting helpers.
pub mod utils;

// Re-export all types for convenient access
pub use block::*;
pub use stats::*;
pub use transaction::*;
pub use utils::*;
