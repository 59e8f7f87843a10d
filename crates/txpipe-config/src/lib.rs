//! Configuration module for the txpipe transaction pipeline.
//!
//! This module provides structures and utilities for managing pipeline configuration.
//! Configuration is loaded from a TOML file; `${VAR}` and `${VAR:-default}`
//! references are resolved from the environment before parsing so that keys and
//! endpoints can stay out of the file itself.

use regex::Regex;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::Path;
use std::str::FromStr;
use std::time::Duration;
use thiserror::Error;

/// Errors that can occur during configuration operations.
#[derive(Debug, Error)]
pub enum ConfigError {
	/// Error that occurs during file I/O operations.
	#[error("IO error: {0}")]
	Io(#[from] std::io::Error),
	/// Error that occurs when parsing TOML configuration.
	#[error("Configuration error: {0}")]
	Parse(String),
	/// Error that occurs when configuration validation fails.
	#[error("Validation error: {0}")]
	Validation(String),
}

impl From<toml::de::Error> for ConfigError {
	fn from(err: toml::de::Error) -> Self {
		// Extract just the message without the huge input dump
		ConfigError::Parse(err.message().to_string())
	}
}

/// Main configuration structure for the pipeline.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct Config {
	/// Node endpoint and network identity.
	pub node: NodeConfig,
	/// Defaults and limits applied when building transactions.
	#[serde(default)]
	pub transaction: TransactionConfig,
	/// Receipt polling behaviour.
	#[serde(default)]
	pub confirmation: ConfirmationConfig,
	/// Retry policy for transient transport failures.
	#[serde(default)]
	pub retry: RetryConfig,
	/// Key provider selection.
	pub account: AccountConfig,
}

/// Node endpoint configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct NodeConfig {
	/// JSON-RPC HTTP endpoint of the target node.
	pub endpoint_url: String,
	/// Chain id embedded in every signature for replay protection.
	pub chain_id: u64,
	/// Timeout applied to each individual RPC request.
	#[serde(default = "default_request_timeout_ms")]
	pub request_timeout_ms: u64,
}

impl NodeConfig {
	pub fn request_timeout(&self) -> Duration {
		Duration::from_millis(self.request_timeout_ms)
	}
}

/// Transaction defaults and limits.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct TransactionConfig {
	/// Gas price in wei used when the caller does not supply one.
	#[serde(default = "default_gas_price")]
	pub default_gas_price: u128,
	/// Gas limit used when the caller does not supply one.
	#[serde(default = "default_gas_limit")]
	pub default_gas_limit: u64,
	/// Largest payload (call data or init code) the builder accepts.
	#[serde(default = "default_max_payload_bytes")]
	pub max_payload_bytes: usize,
}

impl Default for TransactionConfig {
	fn default() -> Self {
		Self {
			default_gas_price: default_gas_price(),
			default_gas_limit: default_gas_limit(),
			max_payload_bytes: default_max_payload_bytes(),
		}
	}
}

/// Receipt polling configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ConfirmationConfig {
	/// Delay between receipt lookups while the transaction is pending.
	#[serde(default = "default_poll_interval_ms")]
	pub poll_interval_ms: u64,
	/// Total time to wait for a receipt before reporting an unknown outcome.
	#[serde(default = "default_max_wait_ms")]
	pub max_wait_ms: u64,
}

impl ConfirmationConfig {
	pub fn poll_interval(&self) -> Duration {
		Duration::from_millis(self.poll_interval_ms)
	}

	pub fn max_wait(&self) -> Duration {
		Duration::from_millis(self.max_wait_ms)
	}
}

impl Default for ConfirmationConfig {
	fn default() -> Self {
		Self {
			poll_interval_ms: default_poll_interval_ms(),
			max_wait_ms: default_max_wait_ms(),
		}
	}
}

/// Retry policy for transport failures, shared by submission and polling.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct RetryConfig {
	/// Consecutive transport failures tolerated before giving up.
	#[serde(default = "default_max_retries")]
	pub max_retries: u32,
	/// First backoff delay.
	#[serde(default = "default_initial_backoff_ms")]
	pub initial_backoff_ms: u64,
	/// Upper bound for a single backoff delay.
	#[serde(default = "default_max_backoff_ms")]
	pub max_backoff_ms: u64,
}

impl Default for RetryConfig {
	fn default() -> Self {
		Self {
			max_retries: default_max_retries(),
			initial_backoff_ms: default_initial_backoff_ms(),
			max_backoff_ms: default_max_backoff_ms(),
		}
	}
}

/// Configuration for key providers.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct AccountConfig {
	/// Which implementation to use as primary.
	pub primary: String,
	/// Map of key provider implementation names to their configurations.
	pub implementations: HashMap<String, toml::Value>,
}

impl AccountConfig {
	/// Returns the configuration table of the primary implementation.
	pub fn primary_config(&self) -> Result<&toml::Value, ConfigError> {
		self.implementations.get(&self.primary).ok_or_else(|| {
			ConfigError::Validation(format!(
				"Primary account '{}' not found in implementations",
				self.primary
			))
		})
	}
}

fn default_request_timeout_ms() -> u64 {
	10_000
}

fn default_gas_price() -> u128 {
	20_000_000_000 // 20 gwei
}

fn default_gas_limit() -> u64 {
	5_000_000
}

fn default_max_payload_bytes() -> usize {
	128 * 1024
}

fn default_poll_interval_ms() -> u64 {
	1_000
}

fn default_max_wait_ms() -> u64 {
	30_000
}

fn default_max_retries() -> u32 {
	3
}

fn default_initial_backoff_ms() -> u64 {
	500
}

fn default_max_backoff_ms() -> u64 {
	5_000
}

/// Resolves environment variables in a string.
///
/// Replaces ${VAR_NAME} with the value of the environment variable VAR_NAME.
/// Supports default values with ${VAR_NAME:-default_value}.
///
/// Input strings are limited to 1MB to prevent ReDoS attacks.
pub(crate) fn resolve_env_vars(input: &str) -> Result<String, ConfigError> {
	const MAX_INPUT_SIZE: usize = 1024 * 1024;
	if input.len() > MAX_INPUT_SIZE {
		return Err(ConfigError::Validation(format!(
			"Configuration file too large: {} bytes (max: {} bytes)",
			input.len(),
			MAX_INPUT_SIZE
		)));
	}

	let re = Regex::new(r"\$\{([A-Z_][A-Z0-9_]{0,127})(?::-([^}]{0,256}))?\}")
		.map_err(|e| ConfigError::Parse(format!("Regex error: {}", e)))?;

	let mut result = String::with_capacity(input.len());
	let mut last_end = 0;

	for cap in re.captures_iter(input) {
		let (Some(full_match), Some(var_name)) = (cap.get(0), cap.get(1)) else {
			continue;
		};
		let default_value = cap.get(2).map(|m| m.as_str());

		let value = match std::env::var(var_name.as_str()) {
			Ok(v) => v,
			Err(_) => match default_value {
				Some(default) => default.to_string(),
				None => {
					return Err(ConfigError::Validation(format!(
						"Environment variable '{}' not found",
						var_name.as_str()
					)));
				},
			},
		};

		result.push_str(&input[last_end..full_match.start()]);
		result.push_str(&value);
		last_end = full_match.end();
	}
	result.push_str(&input[last_end..]);

	Ok(result)
}

impl Config {
	/// Loads configuration from a file, resolving environment variables.
	pub async fn from_file(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
		let path = path.as_ref();
		let content = tokio::fs::read_to_string(path).await.map_err(|e| {
			ConfigError::Io(std::io::Error::new(
				e.kind(),
				format!("Cannot read configuration {}: {}", path.display(), e),
			))
		})?;
		content.parse()
	}

	/// Validates the configuration to ensure all required fields are properly set.
	fn validate(&self) -> Result<(), ConfigError> {
		// Validate node config
		if self.node.endpoint_url.trim().is_empty() {
			return Err(ConfigError::Validation(
				"Node endpoint_url cannot be empty".into(),
			));
		}
		let endpoint = url::Url::parse(&self.node.endpoint_url).map_err(|e| {
			ConfigError::Validation(format!(
				"Invalid node endpoint_url '{}': {}",
				self.node.endpoint_url, e
			))
		})?;
		if !matches!(endpoint.scheme(), "http" | "https") {
			return Err(ConfigError::Validation(format!(
				"Node endpoint_url must use http or https, got '{}'",
				endpoint.scheme()
			)));
		}
		if self.node.chain_id == 0 {
			return Err(ConfigError::Validation(
				"Node chain_id must be greater than 0".into(),
			));
		}
		if self.node.request_timeout_ms == 0 {
			return Err(ConfigError::Validation(
				"Node request_timeout_ms must be greater than 0".into(),
			));
		}

		// Validate transaction defaults
		if self.transaction.default_gas_limit == 0 {
			return Err(ConfigError::Validation(
				"default_gas_limit must be greater than 0".into(),
			));
		}
		if self.transaction.max_payload_bytes == 0 {
			return Err(ConfigError::Validation(
				"max_payload_bytes must be greater than 0".into(),
			));
		}

		// Validate confirmation config
		if self.confirmation.poll_interval_ms == 0 {
			return Err(ConfigError::Validation(
				"poll_interval_ms must be greater than 0".into(),
			));
		}

		// Validate retry config
		if self.retry.initial_backoff_ms > self.retry.max_backoff_ms {
			return Err(ConfigError::Validation(
				"initial_backoff_ms cannot exceed max_backoff_ms".into(),
			));
		}

		// Validate account config
		if self.account.primary.is_empty() {
			return Err(ConfigError::Validation(
				"Account primary implementation cannot be empty".into(),
			));
		}
		self.account.primary_config()?;

		Ok(())
	}
}

/// Parses configuration from a TOML string.
///
/// Environment variables are resolved and the configuration is validated
/// after parsing.
impl FromStr for Config {
	type Err = ConfigError;

	fn from_str(s: &str) -> Result<Self, Self::Err> {
		let resolved = resolve_env_vars(s)?;
		let config: Config = toml::from_str(&resolved)?;
		config.validate()?;
		Ok(config)
	}
}
