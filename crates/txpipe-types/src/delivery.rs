//! Broadcast and receipt records.
//!
//! This module defines what the node client hands back to the pipeline:
//! the hash and time of a successful broadcast, and the receipt of a mined
//! transaction.

use alloy::primitives::{Address, TxHash};
use chrono::{DateTime, Utc};

/// Outcome of broadcasting a signed transaction.
#[derive(Debug, Clone, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub struct SubmissionResult {
	/// Hash under which the node accepted the transaction.
	pub transaction_hash: TxHash,
	/// When the node accepted the transaction.
	pub submitted_at: DateTime<Utc>,
	/// Number of broadcasts performed, including transport retries.
	pub attempts: u32,
}

/// Transaction receipt containing execution details.
///
/// A receipt is terminal: once the node returns one for a hash it is not
/// polled again.
#[derive(Debug, Clone, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub struct Receipt {
	/// The hash of the transaction.
	pub transaction_hash: TxHash,
	/// The block number where the transaction was included.
	pub block_number: u64,
	/// Whether the transaction executed successfully.
	pub success: bool,
	/// Address of the created contract, for successful creation transactions.
	pub contract_address: Option<Address>,
	/// Gas consumed by execution.
	pub gas_used: u64,
}

impl Receipt {
	/// True when the transaction was mined but its execution reverted.
	pub fn is_reverted(&self) -> bool {
		!self.success
	}
}
