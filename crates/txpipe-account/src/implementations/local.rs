//! Key provider backed by hex keys in configuration.
//!
//! Keys are usually injected through environment references such as
//! `${DEPLOYER_PRIVATE_KEY}` so they never sit in the file itself. The
//! secret passed at recovery time is not used.

use crate::{AccountError, KeyProvider, KeyProviderFactory, KeyProviderRegistry};
use async_trait::async_trait;
use serde::Deserialize;
use std::collections::HashMap;
use txpipe_types::{ImplementationRegistry, PrivateKey, SecretString};

/// Configuration table for `[account.implementations.local]`.
#[derive(Debug, Deserialize)]
struct LocalKeysConfig {
	/// Account name to hex-encoded private key.
	#[serde(default)]
	keys: HashMap<String, SecretString>,
}

/// Key provider holding hex-encoded keys by account name.
pub struct LocalKeyProvider {
	keys: HashMap<String, SecretString>,
}

impl LocalKeyProvider {
	pub fn new(keys: HashMap<String, SecretString>) -> Self {
		Self { keys }
	}
}

#[async_trait]
impl KeyProvider for LocalKeyProvider {
	async fn recover_private_key(
		&self,
		account: &str,
		_secret: &SecretString,
	) -> Result<PrivateKey, AccountError> {
		let encoded = self
			.keys
			.get(account)
			.ok_or_else(|| AccountError::invalid_credentials(account, "unknown account"))?;

		PrivateKey::try_from(encoded).map_err(|e| {
			AccountError::InvalidKey(format!("key for account '{}' is not hex: {}", account, e))
		})
	}
}

/// Factory function to create a local key provider from configuration.
pub fn create_key_provider(config: &toml::Value) -> Result<Box<dyn KeyProvider>, AccountError> {
	let parsed: LocalKeysConfig = config
		.clone()
		.try_into()
		.map_err(|e| AccountError::Implementation(format!("Invalid local key config: {}", e)))?;

	if parsed.keys.is_empty() {
		return Err(AccountError::Implementation(
			"Local key provider requires at least one entry in 'keys'".to_string(),
		));
	}

	Ok(Box::new(LocalKeyProvider::new(parsed.keys)))
}

/// Registry for the local key provider.
pub struct Registry;

impl ImplementationRegistry for Registry {
	const NAME: &'static str = "local";
	type Factory = KeyProviderFactory;

	fn factory() -> Self::Factory {
		create_key_provider
	}
}

impl KeyProviderRegistry for Registry {}

#[cfg(test)]
mod tests {
	use super::*;

	fn config(toml_str: &str) -> toml::Value {
		toml::from_str(toml_str).unwrap()
	}

	#[tokio::test]
	async fn test_recover_configured_key() {
		let provider = create_key_provider(&config(
			r#"keys = { deployer = "0xac0974bec39a17e36ba4a6b4d238ff944bacb478cbed5efcae784d7bf4f2ff80" }"#,
		))
		.unwrap();

		let key = provider
			.recover_private_key("deployer", &SecretString::from(""))
			.await
			.unwrap();
		assert_eq!(key.len(), 32);
	}

	#[tokio::test]
	async fn test_unknown_account_is_invalid_credentials() {
		let provider = create_key_provider(&config(r#"keys = { deployer = "0x01" }"#)).unwrap();

		let result = provider
			.recover_private_key("someone-else", &SecretString::from(""))
			.await;
		assert!(matches!(
			result,
			Err(AccountError::InvalidCredentials { account, .. }) if account == "someone-else"
		));
	}

	#[tokio::test]
	async fn test_non_hex_key_is_invalid_key() {
		let provider =
			create_key_provider(&config(r#"keys = { deployer = "not-a-key" }"#)).unwrap();

		let result = provider
			.recover_private_key("deployer", &SecretString::from(""))
			.await;
		assert!(matches!(result, Err(AccountError::InvalidKey(_))));
	}

	#[test]
	fn test_empty_keys_rejected() {
		assert!(create_key_provider(&config("")).is_err());
		assert!(create_key_provider(&config("keys = 5")).is_err());
	}
}
