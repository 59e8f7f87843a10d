//! Node access module for the txpipe pipeline.
//!
//! This module defines the narrow interface the pipeline needs from an
//! Ethereum node: broadcasting raw signed transactions, looking up receipts,
//! and a couple of account and chain queries used by the command surface.
//! Implementations classify failures so callers can tell a definitive
//! rejection by the node from a transport problem that is safe to retry.

use alloy::primitives::{Address, Bytes, TxHash};
use async_trait::async_trait;
use thiserror::Error;
use txpipe_types::Receipt;

/// Re-export implementations
pub mod implementations {
	pub mod evm {
		pub mod alloy;
	}
}

pub use implementations::evm::alloy::AlloyNodeClient;

/// Errors that can occur while talking to the node.
#[derive(Debug, Clone, Error)]
pub enum NodeError {
	/// The node answered with a JSON-RPC error. Resending the same request
	/// will not change the answer.
	#[error("Rejected by node: {0}")]
	Rejected(String),
	/// The request did not complete: connection, HTTP, timeout or a response
	/// that could not be decoded.
	#[error("Transport error: {0}")]
	Transport(String),
}

impl NodeError {
	/// Whether the same request may be sent again.
	pub fn is_retryable(&self) -> bool {
		matches!(self, NodeError::Transport(_))
	}
}

/// Trait defining the interface to an Ethereum JSON-RPC node.
///
/// Every call is an independent request. Implementations must be safe to
/// share between concurrent pipelines.
#[cfg_attr(feature = "testing", mockall::automock)]
#[async_trait]
pub trait NodeClient: Send + Sync {
	/// Broadcasts a raw signed transaction and returns the hash the node
	/// accepted it under.
	async fn submit(&self, raw: &Bytes) -> Result<TxHash, NodeError>;

	/// Looks up the receipt of a transaction. `None` means not yet mined.
	async fn get_receipt(&self, hash: TxHash) -> Result<Option<Receipt>, NodeError>;

	/// Returns the next nonce for `address`, counting pending transactions.
	async fn transaction_count(&self, address: Address) -> Result<u64, NodeError>;

	/// Returns the chain id reported by the node.
	async fn chain_id(&self) -> Result<u64, NodeError>;
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn test_only_transport_errors_are_retryable() {
		assert!(NodeError::Transport("connection refused".into()).is_retryable());
		assert!(!NodeError::Rejected("nonce too low".into()).is_retryable());
	}
}
