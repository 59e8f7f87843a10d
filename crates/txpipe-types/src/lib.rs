//! Common types module for the txpipe transaction pipeline.
//!
//! This module defines the data model shared by every pipeline stage: the
//! unsigned and signed transaction records with their canonical encoding,
//! the broadcast and receipt records produced by the node, and the secret
//! wrappers used to carry key material between stages.

/// Submission and receipt records produced by the node client.
pub mod delivery;
/// Registry trait for pluggable implementations.
pub mod registry;
/// Zeroizing wrappers for private keys and passwords.
pub mod secrets;
/// Transaction records and their canonical RLP encoding.
pub mod transaction;
/// Hex and display helpers.
pub mod utils;

pub use alloy::primitives::{Address, Bytes, TxHash, B256, U256};
pub use delivery::{Receipt, SubmissionResult};
pub use registry::ImplementationRegistry;
pub use secrets::{PrivateKey, SecretString};
pub use transaction::{CodecError, SignedTransaction, UnsignedTransaction};
pub use utils::{decode_hex, truncate_id, without_0x_prefix};
