//! Key provider backed by encrypted keystore files.
//!
//! Each account is a Web3 Secret Storage JSON file named after the account in
//! the configured directory. Decryption is delegated to alloy's keystore
//! support and runs on the blocking pool, since scrypt is deliberately slow.

use crate::{AccountError, KeyProvider, KeyProviderFactory, KeyProviderRegistry};
use alloy::signers::local::PrivateKeySigner;
use async_trait::async_trait;
use serde::Deserialize;
use std::path::PathBuf;
use txpipe_types::{ImplementationRegistry, PrivateKey, SecretString};

/// Configuration table for `[account.implementations.keystore]`.
#[derive(Debug, Deserialize)]
struct KeystoreConfig {
	directory: PathBuf,
}

/// Key provider reading keystore files from a directory.
pub struct KeystoreKeyProvider {
	directory: PathBuf,
}

impl KeystoreKeyProvider {
	pub fn new(directory: impl Into<PathBuf>) -> Self {
		Self {
			directory: directory.into(),
		}
	}

	/// Maps an account name to its keystore file, rejecting names that would
	/// escape the directory.
	fn keystore_path(&self, account: &str) -> Result<PathBuf, AccountError> {
		let valid = !account.is_empty()
			&& !account.starts_with('.')
			&& account
				.chars()
				.all(|c| c.is_ascii_alphanumeric() || matches!(c, '-' | '_' | '.'));
		if !valid {
			return Err(AccountError::invalid_credentials(
				account,
				"account name is not a valid keystore file name",
			));
		}
		Ok(self.directory.join(account))
	}
}

#[async_trait]
impl KeyProvider for KeystoreKeyProvider {
	async fn recover_private_key(
		&self,
		account: &str,
		secret: &SecretString,
	) -> Result<PrivateKey, AccountError> {
		let path = self.keystore_path(account)?;
		if !path.is_file() {
			return Err(AccountError::invalid_credentials(account, "no keystore file"));
		}

		tracing::debug!(account, path = %path.display(), "Decrypting keystore");

		let password = secret.clone();
		let decrypted = tokio::task::spawn_blocking(move || {
			password.with_exposed(|password| PrivateKeySigner::decrypt_keystore(&path, password))
		})
		.await
		.map_err(|e| AccountError::Implementation(format!("Keystore task failed: {}", e)))?;

		let signer =
			decrypted.map_err(|e| AccountError::invalid_credentials(account, e.to_string()))?;
		Ok(PrivateKey::from_bytes(signer.credential().to_bytes().to_vec()))
	}
}

/// Factory function to create a keystore key provider from configuration.
pub fn create_key_provider(config: &toml::Value) -> Result<Box<dyn KeyProvider>, AccountError> {
	let parsed: KeystoreConfig = config
		.clone()
		.try_into()
		.map_err(|e| AccountError::Implementation(format!("Invalid keystore config: {}", e)))?;

	if !parsed.directory.is_dir() {
		return Err(AccountError::Implementation(format!(
			"Keystore directory {} does not exist",
			parsed.directory.display()
		)));
	}

	Ok(Box::new(KeystoreKeyProvider::new(parsed.directory)))
}

/// Registry for the keystore key provider.
pub struct Registry;

impl ImplementationRegistry for Registry {
	const NAME: &'static str = "keystore";
	type Factory = KeyProviderFactory;

	fn factory() -> Self::Factory {
		create_key_provider
	}
}

impl KeyProviderRegistry for Registry {}

#[cfg(test)]
mod tests {
	use super::*;
	use tempfile::TempDir;

	fn provider_for(dir: &TempDir) -> Box<dyn KeyProvider> {
		let mut table = toml::Table::new();
		table.insert(
			"directory".to_string(),
			toml::Value::String(dir.path().display().to_string()),
		);
		create_key_provider(&toml::Value::Table(table)).unwrap()
	}

	#[test]
	fn test_missing_directory_rejected() {
		let mut table = toml::Table::new();
		table.insert(
			"directory".to_string(),
			toml::Value::String("/definitely/not/here".to_string()),
		);
		assert!(matches!(
			create_key_provider(&toml::Value::Table(table)),
			Err(AccountError::Implementation(_))
		));
	}

	#[tokio::test]
	async fn test_unknown_account_is_invalid_credentials() {
		let dir = TempDir::new().unwrap();
		let provider = provider_for(&dir);

		let result = provider
			.recover_private_key("deployer", &SecretString::from("password"))
			.await;
		assert!(matches!(result, Err(AccountError::InvalidCredentials { .. })));
	}

	#[tokio::test]
	async fn test_path_traversal_rejected() {
		let dir = TempDir::new().unwrap();
		let provider = provider_for(&dir);

		for account in ["../etc/passwd", ".hidden", "a/b", ""] {
			let result = provider
				.recover_private_key(account, &SecretString::from("password"))
				.await;
			assert!(
				matches!(result, Err(AccountError::InvalidCredentials { .. })),
				"account {:?} should be rejected",
				account
			);
		}
	}

	#[tokio::test]
	async fn test_corrupt_keystore_is_invalid_credentials() {
		let dir = TempDir::new().unwrap();
		std::fs::write(dir.path().join("deployer"), "{\"not\": \"a keystore\"}").unwrap();
		let provider = provider_for(&dir);

		let result = provider
			.recover_private_key("deployer", &SecretString::from("password"))
			.await;
		assert!(matches!(result, Err(AccountError::InvalidCredentials { .. })));
	}
}
