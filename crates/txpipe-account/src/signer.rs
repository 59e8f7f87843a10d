//! EIP-155 transaction signing and signature verification.
//!
//! Signing is deterministic (RFC 6979 nonces, low-s normalization): the same
//! transaction and key always produce the same raw bytes. The chain id is part
//! of the signed payload and of the wire `v` value, so a signature made for one
//! chain does not recover to the same sender on another.

use alloy::primitives::Address;
use alloy::signers::local::PrivateKeySigner;
use alloy::signers::SignerSync;
use thiserror::Error;
use txpipe_types::{PrivateKey, SignedTransaction, UnsignedTransaction};

/// Length of a secp256k1 secret scalar.
const PRIVATE_KEY_LEN: usize = 32;

/// Errors that can occur while signing or verifying a transaction.
#[derive(Debug, Error)]
pub enum SigningError {
	/// The key has the wrong length or is not a valid secp256k1 scalar.
	#[error("Malformed private key: {0}")]
	MalformedKey(String),
	/// The signing backend failed.
	#[error("Signing failed: {0}")]
	Signature(String),
	/// No public key can be recovered from the signature.
	#[error("Signer recovery failed: {0}")]
	Recovery(String),
	/// The signature recovers to a different address than expected.
	#[error("Signature recovers to {recovered}, expected {expected}")]
	SignerMismatch { expected: Address, recovered: Address },
	/// The transaction is bound to a different chain than expected.
	#[error("Transaction is signed for chain {actual}, expected chain {expected}")]
	ChainMismatch { expected: u64, actual: u64 },
}

/// Stateless EIP-155 signer.
pub struct TransactionSigner;

impl TransactionSigner {
	/// Signs `tx` with `key` and serializes the result.
	///
	/// The parsed signing key lives only for the duration of this call.
	pub fn sign(
		tx: UnsignedTransaction,
		key: &PrivateKey,
	) -> Result<SignedTransaction, SigningError> {
		let signer = Self::parse_key(key)?;
		let signature = signer
			.sign_hash_sync(&tx.signature_hash())
			.map_err(|e| SigningError::Signature(e.to_string()))?;
		drop(signer);

		let signed = SignedTransaction::from_parts(tx, signature);
		tracing::debug!(
			tx_hash = %signed.hash(),
			nonce = signed.transaction().nonce,
			chain_id = signed.transaction().chain_id,
			"Signed transaction"
		);
		Ok(signed)
	}

	/// Returns the address controlled by `key`.
	pub fn address_of(key: &PrivateKey) -> Result<Address, SigningError> {
		Ok(Self::parse_key(key)?.address())
	}

	/// Recovers the sender of a signed transaction without the key.
	pub fn recover_signer(signed: &SignedTransaction) -> Result<Address, SigningError> {
		Self::recover_signer_for_chain(signed, signed.transaction().chain_id)
	}

	/// Recovers the sender as if the transaction had been signed for `chain_id`.
	///
	/// For any chain other than the one actually signed for, this yields an
	/// unrelated address or fails.
	pub fn recover_signer_for_chain(
		signed: &SignedTransaction,
		chain_id: u64,
	) -> Result<Address, SigningError> {
		let mut tx = signed.transaction().clone();
		tx.chain_id = chain_id;
		signed
			.signature()
			.recover_address_from_prehash(&tx.signature_hash())
			.map_err(|e| SigningError::Recovery(e.to_string()))
	}

	/// Checks that `signed` is a valid signature by `expected` on `chain_id`.
	pub fn verify(
		signed: &SignedTransaction,
		chain_id: u64,
		expected: Address,
	) -> Result<(), SigningError> {
		let recovered = Self::recover_signer_for_chain(signed, chain_id)?;
		if recovered != expected {
			return Err(SigningError::SignerMismatch {
				expected,
				recovered,
			});
		}

		let actual = signed.transaction().chain_id;
		if actual != chain_id {
			return Err(SigningError::ChainMismatch {
				expected: chain_id,
				actual,
			});
		}

		Ok(())
	}

	fn parse_key(key: &PrivateKey) -> Result<PrivateKeySigner, SigningError> {
		if key.len() != PRIVATE_KEY_LEN {
			return Err(SigningError::MalformedKey(format!(
				"expected {} bytes, got {}",
				PRIVATE_KEY_LEN,
				key.len()
			)));
		}
		key.with_exposed(PrivateKeySigner::from_slice)
			.map_err(|e| SigningError::MalformedKey(e.to_string()))
	}
}

#[cfg(test)]
mod tests {
	use super::*;
	use alloy::primitives::{address, hex, Bytes, U256};

	// Anvil's first development account.
	const TEST_PRIVATE_KEY: &str =
		"ac0974bec39a17e36ba4a6b4d238ff944bacb478cbed5efcae784d7bf4f2ff80";
	const TEST_ADDRESS: Address = address!("f39fd6e51aad88f6f4ce6ab8827279cfffb92266");

	const EIP155_PRIVATE_KEY: &str =
		"4646464646464646464646464646464646464646464646464646464646464646";
	const EIP155_SIGNED: &str = "f86c098504a817c800825208943535353535353535353535353535353535353535880de0b6b3a76400008025a028ef61340bd939bc2195fe537567866003e1a15d3c71ff63e1590620aa636276a067cbe9d8997f761aecb703304b3800ccf555c9f3dc64214b297fb1966a3b6d83";

	// Creation transaction: nonce 4, 20 gwei, 5_000_000 gas, chain 4,
	// init code followed by the ABI-encoded constructor argument 10000.
	const DEPLOY_DATA: &str = "6080604052348015600f57600080fd5b506040510000000000000000000000000000000000000000000000000000000000002710";
	const DEPLOY_SIGNED: &str = "f885048504a817c800834c4b408080b46080604052348015600f57600080fd5b5060405100000000000000000000000000000000000000000000000000000000000027102ba0470e94b10582d9fc9bd6ca1efd4b22dad4719546ec994677a5728831a630f239a076ee5d56adcccdfdac997e7bf8a82ca9d06caadac83cdb20b5295b8635aaefaa";
	const DEPLOY_TX_HASH: &str =
		"d1451b5eec7dfcc35d6241cccec672dede03b2721e3c3cd9f3df63bb47eb5cfd";

	fn test_key() -> PrivateKey {
		PrivateKey::from_hex(TEST_PRIVATE_KEY).unwrap()
	}

	fn deploy_transaction(chain_id: u64) -> UnsignedTransaction {
		UnsignedTransaction {
			nonce: 4,
			gas_price: 20_000_000_000,
			gas_limit: 5_000_000,
			to: None,
			value: U256::ZERO,
			data: Bytes::from(hex::decode(DEPLOY_DATA).unwrap()),
			chain_id,
		}
	}

	#[test]
	fn test_sign_matches_eip155_reference_vector() {
		let tx = UnsignedTransaction {
			nonce: 9,
			gas_price: 20_000_000_000,
			gas_limit: 21_000,
			to: Some(address!("3535353535353535353535353535353535353535")),
			value: U256::from(1_000_000_000_000_000_000u128),
			data: Bytes::new(),
			chain_id: 1,
		};
		let key = PrivateKey::from_hex(EIP155_PRIVATE_KEY).unwrap();

		let signed = TransactionSigner::sign(tx, &key).unwrap();
		assert_eq!(hex::encode(signed.raw()), EIP155_SIGNED);
		assert_eq!(signed.v(), 37);
	}

	#[test]
	fn test_sign_deploy_fixture() {
		let signed = TransactionSigner::sign(deploy_transaction(4), &test_key()).unwrap();

		assert_eq!(hex::encode(signed.raw()), DEPLOY_SIGNED);
		assert_eq!(hex::encode(signed.hash()), DEPLOY_TX_HASH);
		assert_eq!(signed.v(), 4 * 2 + 35);
	}

	#[test]
	fn test_sign_is_deterministic() {
		let first = TransactionSigner::sign(deploy_transaction(4), &test_key()).unwrap();
		let second = TransactionSigner::sign(deploy_transaction(4), &test_key()).unwrap();
		assert_eq!(first.raw(), second.raw());
	}

	#[test]
	fn test_recover_signer() {
		let signed = TransactionSigner::sign(deploy_transaction(4), &test_key()).unwrap();
		assert_eq!(TransactionSigner::recover_signer(&signed).unwrap(), TEST_ADDRESS);
		assert!(TransactionSigner::verify(&signed, 4, TEST_ADDRESS).is_ok());
	}

	#[test]
	fn test_recover_signer_after_decode() {
		let raw = TransactionSigner::sign(deploy_transaction(4), &test_key())
			.unwrap()
			.raw()
			.clone();
		let decoded = SignedTransaction::decode(&raw).unwrap();

		assert_eq!(decoded.transaction(), &deploy_transaction(4));
		assert_eq!(TransactionSigner::recover_signer(&decoded).unwrap(), TEST_ADDRESS);
	}

	#[test]
	fn test_signature_does_not_validate_on_other_chain() {
		let signed = TransactionSigner::sign(deploy_transaction(4), &test_key()).unwrap();

		let recovered = TransactionSigner::recover_signer_for_chain(&signed, 5);
		assert!(!matches!(recovered, Ok(address) if address == TEST_ADDRESS));
		assert!(TransactionSigner::verify(&signed, 5, TEST_ADDRESS).is_err());
	}

	#[test]
	fn test_verify_rejects_other_signer() {
		let signed = TransactionSigner::sign(deploy_transaction(4), &test_key()).unwrap();
		let other = address!("3535353535353535353535353535353535353535");

		assert!(matches!(
			TransactionSigner::verify(&signed, 4, other),
			Err(SigningError::SignerMismatch { recovered, .. }) if recovered == TEST_ADDRESS
		));
	}

	#[test]
	fn test_chain_id_changes_raw_bytes() {
		let chain_4 = TransactionSigner::sign(deploy_transaction(4), &test_key()).unwrap();
		let chain_5 = TransactionSigner::sign(deploy_transaction(5), &test_key()).unwrap();

		assert_ne!(chain_4.raw(), chain_5.raw());
		assert_ne!(chain_4.hash(), chain_5.hash());
		assert_eq!(TransactionSigner::recover_signer(&chain_5).unwrap(), TEST_ADDRESS);
	}

	#[test]
	fn test_malformed_keys_rejected() {
		let short = PrivateKey::from_bytes(vec![0x11; 31]);
		assert!(matches!(
			TransactionSigner::sign(deploy_transaction(4), &short),
			Err(SigningError::MalformedKey(msg)) if msg.contains("31")
		));

		let zero = PrivateKey::from_bytes(vec![0u8; 32]);
		assert!(matches!(
			TransactionSigner::sign(deploy_transaction(4), &zero),
			Err(SigningError::MalformedKey(_))
		));

		// Larger than the secp256k1 group order.
		let overflow = PrivateKey::from_bytes(vec![0xff; 32]);
		assert!(matches!(
			TransactionSigner::sign(deploy_transaction(4), &overflow),
			Err(SigningError::MalformedKey(_))
		));
	}

	#[test]
	fn test_address_of() {
		assert_eq!(TransactionSigner::address_of(&test_key()).unwrap(), TEST_ADDRESS);
	}
}
