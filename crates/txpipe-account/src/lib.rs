//! Account management module for the txpipe pipeline.
//!
//! This module provides the two account-facing pieces of the pipeline: key
//! providers, which turn an account identifier and secret into raw key
//! material, and the transaction signer, which turns an unsigned transaction
//! and a key into a signed, serialized transaction.

use async_trait::async_trait;
use std::collections::HashMap;
use thiserror::Error;
use txpipe_types::{ImplementationRegistry, PrivateKey, SecretString};

/// Re-export implementations
pub mod implementations {
	pub mod keystore;
	pub mod local;
}

pub mod signer;

pub use signer::{SigningError, TransactionSigner};

/// Errors that can occur during key provider operations.
#[derive(Debug, Error)]
pub enum AccountError {
	/// The account is unknown or the secret does not unlock it.
	#[error("Invalid credentials for account '{account}': {reason}")]
	InvalidCredentials { account: String, reason: String },
	/// Error that occurs when stored key material is malformed.
	#[error("Invalid key: {0}")]
	InvalidKey(String),
	/// Error that occurs when configuring or running the implementation.
	#[error("Implementation error: {0}")]
	Implementation(String),
}

impl AccountError {
	pub(crate) fn invalid_credentials(account: &str, reason: impl Into<String>) -> Self {
		Self::InvalidCredentials {
			account: account.to_string(),
			reason: reason.into(),
		}
	}
}

/// Trait defining the interface for key providers.
///
/// A key provider is the only place key material comes from. The returned
/// key is handed to a single signing call and dropped afterwards.
#[async_trait]
pub trait KeyProvider: Send + Sync {
	/// Recovers the private key of `account`, unlocking it with `secret`
	/// where the implementation requires one.
	async fn recover_private_key(
		&self,
		account: &str,
		secret: &SecretString,
	) -> Result<PrivateKey, AccountError>;
}

/// Type alias for key provider factory functions.
pub type KeyProviderFactory = fn(&toml::Value) -> Result<Box<dyn KeyProvider>, AccountError>;

/// Registry trait for key provider implementations.
pub trait KeyProviderRegistry: ImplementationRegistry<Factory = KeyProviderFactory> {}

/// Get all registered key provider implementations.
///
/// Returns a vector of (name, factory) tuples for all available implementations.
pub fn get_all_implementations() -> Vec<(&'static str, KeyProviderFactory)> {
	use implementations::{keystore, local};

	vec![
		(local::Registry::NAME, local::Registry::factory()),
		(keystore::Registry::NAME, keystore::Registry::factory()),
	]
}

/// Creates the key provider registered under `name` from its configuration table.
pub fn create_key_provider(
	name: &str,
	config: &toml::Value,
) -> Result<Box<dyn KeyProvider>, AccountError> {
	let factories: HashMap<&'static str, KeyProviderFactory> =
		get_all_implementations().into_iter().collect();

	let factory = factories.get(name).ok_or_else(|| {
		AccountError::Implementation(format!("Unknown key provider implementation '{}'", name))
	})?;

	factory(config)
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn test_registered_implementations() {
		let names: Vec<&str> = get_all_implementations()
			.into_iter()
			.map(|(name, _)| name)
			.collect();
		assert_eq!(names, vec!["local", "keystore"]);
	}

	#[test]
	fn test_unknown_implementation() {
		let config = toml::Value::Table(Default::default());
		let result = create_key_provider("kms", &config);
		assert!(matches!(result, Err(AccountError::Implementation(msg)) if msg.contains("kms")));
	}
}
