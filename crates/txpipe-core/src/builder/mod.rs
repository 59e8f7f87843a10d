//! Construction and validation of unsigned transactions.
//!
//! Callers describe a transaction with [`TransactionParams`], whose numeric
//! fields are full-width `U256` values so out-of-range input can be caught
//! here instead of being silently truncated. [`TransactionBuilder::build`]
//! narrows each field to the width the network uses and checks the
//! remaining structural rules. Building is pure.

use alloy::primitives::{Address, Bytes, U256};
use thiserror::Error;
use txpipe_config::TransactionConfig;
use txpipe_types::UnsignedTransaction;

/// Gas charged for every transaction before execution starts.
pub const INTRINSIC_GAS: u64 = 21_000;

/// Largest chain id whose EIP-155 `v` value (`chain_id * 2 + 36`) fits 64 bits.
pub const MAX_CHAIN_ID: u64 = (u64::MAX - 36) / 2;

/// Errors that can occur while building a transaction.
#[derive(Debug, Error)]
pub enum BuildError {
	#[error("Invalid {field}: {reason}")]
	InvalidParameter { field: &'static str, reason: String },
}

impl BuildError {
	fn invalid(field: &'static str, reason: impl Into<String>) -> Self {
		Self::InvalidParameter {
			field,
			reason: reason.into(),
		}
	}
}

/// Caller-supplied description of a transaction.
///
/// Gas price and gas limit fall back to the builder's defaults when unset.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TransactionParams {
	pub nonce: U256,
	pub gas_price: Option<U256>,
	pub gas_limit: Option<U256>,
	/// Recipient, or `None` to create a contract.
	pub to: Option<Address>,
	pub value: U256,
	/// Call data, or init code followed by constructor arguments for creation.
	pub data: Bytes,
	pub chain_id: U256,
}

impl TransactionParams {
	/// Contract creation running `init_code`.
	pub fn creation(init_code: impl Into<Bytes>, chain_id: u64) -> Self {
		Self {
			nonce: U256::ZERO,
			gas_price: None,
			gas_limit: None,
			to: None,
			value: U256::ZERO,
			data: init_code.into(),
			chain_id: U256::from(chain_id),
		}
	}

	/// Message call to `to` with `data`.
	pub fn call(to: Address, data: impl Into<Bytes>, chain_id: u64) -> Self {
		Self {
			to: Some(to),
			..Self::creation(data, chain_id)
		}
	}

	pub fn with_nonce(mut self, nonce: u64) -> Self {
		self.nonce = U256::from(nonce);
		self
	}

	pub fn with_gas_price(mut self, gas_price: u128) -> Self {
		self.gas_price = Some(U256::from(gas_price));
		self
	}

	pub fn with_gas_limit(mut self, gas_limit: u64) -> Self {
		self.gas_limit = Some(U256::from(gas_limit));
		self
	}

	pub fn with_value(mut self, value: U256) -> Self {
		self.value = value;
		self
	}

	pub fn is_creation(&self) -> bool {
		self.to.is_none()
	}
}

/// Validates [`TransactionParams`] into [`UnsignedTransaction`]s.
#[derive(Debug, Clone)]
pub struct TransactionBuilder {
	max_payload_bytes: usize,
	default_gas_price: u128,
	default_gas_limit: u64,
}

impl TransactionBuilder {
	/// Creates a builder accepting payloads up to `max_payload_bytes`, with
	/// the stock gas defaults.
	pub fn new(max_payload_bytes: usize) -> Self {
		let defaults = TransactionConfig::default();
		Self {
			max_payload_bytes,
			default_gas_price: defaults.default_gas_price,
			default_gas_limit: defaults.default_gas_limit,
		}
	}

	/// Overrides the gas price and gas limit used when params leave them unset.
	pub fn with_default_gas(mut self, gas_price: u128, gas_limit: u64) -> Self {
		self.default_gas_price = gas_price;
		self.default_gas_limit = gas_limit;
		self
	}

	pub fn from_config(config: &TransactionConfig) -> Self {
		Self::new(config.max_payload_bytes)
			.with_default_gas(config.default_gas_price, config.default_gas_limit)
	}

	/// Builds an unsigned transaction, rejecting any parameter the network
	/// would not accept.
	pub fn build(&self, params: TransactionParams) -> Result<UnsignedTransaction, BuildError> {
		let nonce: u64 = narrow("nonce", params.nonce)?;
		if nonce == u64::MAX {
			return Err(BuildError::invalid("nonce", "must be below 2^64 - 1"));
		}

		let gas_price: u128 = match params.gas_price {
			Some(gas_price) => narrow("gas_price", gas_price)?,
			None => self.default_gas_price,
		};

		let gas_limit: u64 = match params.gas_limit {
			Some(gas_limit) => narrow("gas_limit", gas_limit)?,
			None => self.default_gas_limit,
		};
		if gas_limit < INTRINSIC_GAS {
			return Err(BuildError::invalid(
				"gas_limit",
				format!("{} is below the intrinsic gas of {}", gas_limit, INTRINSIC_GAS),
			));
		}

		let chain_id: u64 = narrow("chain_id", params.chain_id)?;
		if chain_id == 0 {
			return Err(BuildError::invalid("chain_id", "must be positive"));
		}
		if chain_id > MAX_CHAIN_ID {
			return Err(BuildError::invalid(
				"chain_id",
				format!("must not exceed {}", MAX_CHAIN_ID),
			));
		}

		if params.data.len() > self.max_payload_bytes {
			return Err(BuildError::invalid(
				"data",
				format!(
					"{} bytes exceeds the maximum of {}",
					params.data.len(),
					self.max_payload_bytes
				),
			));
		}
		if params.to.is_none() && params.data.is_empty() {
			return Err(BuildError::invalid(
				"data",
				"contract creation requires init code",
			));
		}

		Ok(UnsignedTransaction {
			nonce,
			gas_price,
			gas_limit,
			to: params.to,
			value: params.value,
			data: params.data,
			chain_id,
		})
	}
}

impl Default for TransactionBuilder {
	fn default() -> Self {
		Self::from_config(&TransactionConfig::default())
	}
}

fn narrow<T: TryFrom<U256>>(field: &'static str, value: U256) -> Result<T, BuildError> {
	T::try_from(value).map_err(|_| {
		BuildError::invalid(
			field,
			format!("{} does not fit in {} bits", value, std::mem::size_of::<T>() * 8),
		)
	})
}

#[cfg(test)]
mod tests {
	use super::*;
	use alloy::primitives::address;

	const RECIPIENT: Address = address!("3535353535353535353535353535353535353535");

	fn builder() -> TransactionBuilder {
		TransactionBuilder::new(1024)
	}

	fn assert_invalid(result: Result<UnsignedTransaction, BuildError>, expected: &str) {
		match result {
			Err(BuildError::InvalidParameter { field, .. }) => assert_eq!(field, expected),
			Ok(tx) => panic!("expected invalid {}, built {:?}", expected, tx),
		}
	}

	#[test]
	fn test_build_creation() {
		let tx = builder()
			.build(
				TransactionParams::creation(vec![0x60, 0x80], 4)
					.with_nonce(4)
					.with_gas_price(20_000_000_000)
					.with_gas_limit(5_000_000),
			)
			.unwrap();

		assert!(tx.is_creation());
		assert_eq!(tx.nonce, 4);
		assert_eq!(tx.gas_price, 20_000_000_000);
		assert_eq!(tx.gas_limit, 5_000_000);
		assert_eq!(tx.chain_id, 4);
		assert_eq!(tx.value, U256::ZERO);
	}

	#[test]
	fn test_defaults_fill_missing_gas() {
		let tx = TransactionBuilder::new(1024)
			.with_default_gas(7, 30_000)
			.build(TransactionParams::call(RECIPIENT, Bytes::new(), 1))
			.unwrap();

		assert_eq!(tx.gas_price, 7);
		assert_eq!(tx.gas_limit, 30_000);
		assert_eq!(tx.to, Some(RECIPIENT));
	}

	#[test]
	fn test_call_with_empty_data_is_allowed() {
		let params = TransactionParams::call(RECIPIENT, Bytes::new(), 1)
			.with_value(U256::from(1_000_000_000_000_000_000u128));
		assert!(builder().build(params).is_ok());
	}

	#[test]
	fn test_creation_without_init_code_rejected() {
		assert_invalid(
			builder().build(TransactionParams::creation(Bytes::new(), 1)),
			"data",
		);
	}

	#[test]
	fn test_nonce_limits() {
		let mut params = TransactionParams::call(RECIPIENT, Bytes::new(), 1);
		params.nonce = U256::from(u64::MAX - 1);
		assert!(builder().build(params.clone()).is_ok());

		params.nonce = U256::from(u64::MAX);
		assert_invalid(builder().build(params.clone()), "nonce");

		params.nonce = U256::from(u64::MAX) + U256::from(1);
		assert_invalid(builder().build(params), "nonce");
	}

	#[test]
	fn test_gas_price_must_fit_128_bits() {
		let mut params = TransactionParams::call(RECIPIENT, Bytes::new(), 1);
		params.gas_price = Some(U256::from(u128::MAX));
		assert!(builder().build(params.clone()).is_ok());

		params.gas_price = Some(U256::from(u128::MAX) + U256::from(1));
		assert_invalid(builder().build(params), "gas_price");
	}

	#[test]
	fn test_gas_limit_bounds() {
		let params = TransactionParams::call(RECIPIENT, Bytes::new(), 1);
		assert!(builder().build(params.clone().with_gas_limit(INTRINSIC_GAS)).is_ok());
		assert_invalid(
			builder().build(params.clone().with_gas_limit(INTRINSIC_GAS - 1)),
			"gas_limit",
		);

		let mut too_large = params;
		too_large.gas_limit = Some(U256::from(u64::MAX) + U256::from(1));
		assert_invalid(builder().build(too_large), "gas_limit");
	}

	#[test]
	fn test_chain_id_bounds() {
		assert_invalid(
			builder().build(TransactionParams::call(RECIPIENT, Bytes::new(), 0)),
			"chain_id",
		);
		assert!(builder()
			.build(TransactionParams::call(RECIPIENT, Bytes::new(), MAX_CHAIN_ID))
			.is_ok());
		assert_invalid(
			builder().build(TransactionParams::call(RECIPIENT, Bytes::new(), MAX_CHAIN_ID + 1)),
			"chain_id",
		);
	}

	#[test]
	fn test_payload_limit() {
		assert!(builder()
			.build(TransactionParams::creation(vec![0u8; 1024], 1))
			.is_ok());
		assert_invalid(
			builder().build(TransactionParams::creation(vec![0u8; 1025], 1)),
			"data",
		);
	}

	#[test]
	fn test_large_value_is_accepted() {
		let params = TransactionParams::call(RECIPIENT, Bytes::new(), 1).with_value(U256::MAX);
		assert_eq!(builder().build(params).unwrap().value, U256::MAX);
	}

	#[test]
	fn test_default_builder_uses_config_defaults() {
		let tx = TransactionBuilder::default()
			.build(TransactionParams::creation(vec![0x60], 4))
			.unwrap();
		assert_eq!(tx.gas_price, 20_000_000_000);
		assert_eq!(tx.gas_limit, 5_000_000);
	}
}
