//! Transaction records and their canonical encoding.
//!
//! Transactions are legacy (pre-typed-envelope) Ethereum transactions with
//! EIP-155 replay protection. The unsigned form is encoded as the EIP-155
//! signing payload `rlp([nonce, gasPrice, gasLimit, to, value, data, chainId, 0, 0])`,
//! the signed form as `rlp([nonce, gasPrice, gasLimit, to, value, data, v, r, s])`
//! with `v = chainId * 2 + 35 + yParity`.

use alloy::consensus::{SignableTransaction, TxEnvelope, TxLegacy};
use alloy::eips::eip2718::{Decodable2718, Encodable2718};
use alloy::primitives::{keccak256, Address, Bytes, Signature, TxHash, TxKind, B256, U256};
use alloy_rlp::{Decodable, Header};
use thiserror::Error;

/// Errors that can occur while decoding a transaction from bytes.
#[derive(Debug, Error)]
pub enum CodecError {
	/// The bytes are not valid RLP or do not have the expected field layout.
	#[error("RLP decoding failed: {0}")]
	Rlp(#[from] alloy_rlp::Error),
	/// The signed transaction envelope could not be decoded.
	#[error("Malformed transaction envelope: {0}")]
	Envelope(String),
	/// The envelope holds a typed (EIP-2718) transaction instead of a legacy one.
	#[error("Unsupported transaction type {0:#04x}")]
	UnsupportedType(u8),
	/// The legacy transaction was signed without a chain id.
	#[error("Transaction is not replay-protected: missing chain id")]
	MissingChainId,
	/// The signing payload does not end with the two empty EIP-155 fields.
	#[error("Signing payload must end with two empty fields")]
	InvalidSigningSuffix,
	/// Extra bytes follow the encoded transaction.
	#[error("{0} trailing bytes after encoded transaction")]
	TrailingBytes(usize),
	/// The input decodes but re-encodes to different bytes.
	#[error("Transaction encoding is not canonical")]
	NonCanonical,
}

/// One transaction prior to signing.
///
/// Instances are produced by the transaction builder, which enforces the
/// parameter constraints. `to == None` marks a contract creation.
#[derive(Debug, Clone, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub struct UnsignedTransaction {
	/// Account-scoped sequence number.
	pub nonce: u64,
	/// Price per unit of gas in wei.
	pub gas_price: u128,
	/// Upper bound on gas consumed by execution.
	pub gas_limit: u64,
	/// Recipient; absent for contract creation.
	pub to: Option<Address>,
	/// Amount of wei transferred.
	pub value: U256,
	/// Call data or contract init code.
	pub data: Bytes,
	/// EIP-155 chain id.
	pub chain_id: u64,
}

impl UnsignedTransaction {
	/// Returns true when the transaction deploys a contract.
	pub fn is_creation(&self) -> bool {
		self.to.is_none()
	}

	/// Canonical EIP-155 signing payload.
	pub fn encode(&self) -> Vec<u8> {
		let mut out = Vec::new();
		self.to_legacy().encode_for_signing(&mut out);
		out
	}

	/// Keccak-256 hash of the signing payload; this is what gets signed.
	pub fn signature_hash(&self) -> B256 {
		self.to_legacy().signature_hash()
	}

	/// Decodes a signing payload produced by [`UnsignedTransaction::encode`].
	pub fn decode(bytes: &[u8]) -> Result<Self, CodecError> {
		let mut buf = bytes;
		let header = Header::decode(&mut buf)?;
		if !header.list {
			return Err(alloy_rlp::Error::UnexpectedString.into());
		}
		if buf.len() < header.payload_length {
			return Err(alloy_rlp::Error::InputTooShort.into());
		}
		let (mut payload, rest) = buf.split_at(header.payload_length);
		if !rest.is_empty() {
			return Err(CodecError::TrailingBytes(rest.len()));
		}

		let nonce = u64::decode(&mut payload)?;
		let gas_price = u128::decode(&mut payload)?;
		let gas_limit = u64::decode(&mut payload)?;
		let to = TxKind::decode(&mut payload)?;
		let value = U256::decode(&mut payload)?;
		let data = Bytes::decode(&mut payload)?;
		let chain_id = u64::decode(&mut payload)?;
		let r = u8::decode(&mut payload)?;
		let s = u8::decode(&mut payload)?;
		if r != 0 || s != 0 {
			return Err(CodecError::InvalidSigningSuffix);
		}
		if !payload.is_empty() {
			return Err(alloy_rlp::Error::UnexpectedLength.into());
		}

		Ok(Self {
			nonce,
			gas_price,
			gas_limit,
			to: to.to().copied(),
			value,
			data,
			chain_id,
		})
	}

	pub(crate) fn to_legacy(&self) -> TxLegacy {
		TxLegacy {
			chain_id: Some(self.chain_id),
			nonce: self.nonce,
			gas_price: self.gas_price,
			gas_limit: self.gas_limit,
			to: self.to.map_or(TxKind::Create, TxKind::Call),
			value: self.value,
			input: self.data.clone(),
		}
	}
}

impl TryFrom<&TxLegacy> for UnsignedTransaction {
	type Error = CodecError;

	fn try_from(tx: &TxLegacy) -> Result<Self, Self::Error> {
		Ok(Self {
			nonce: tx.nonce,
			gas_price: tx.gas_price,
			gas_limit: tx.gas_limit,
			to: tx.to.to().copied(),
			value: tx.value,
			data: tx.input.clone(),
			chain_id: tx.chain_id.ok_or(CodecError::MissingChainId)?,
		})
	}
}

/// A signed transaction together with its broadcast bytes.
///
/// The raw bytes and hash are computed once at construction. Resubmission
/// must reuse [`SignedTransaction::raw`] rather than re-signing, so that a
/// retry can never produce a second transaction for the same nonce.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SignedTransaction {
	transaction: UnsignedTransaction,
	signature: Signature,
	raw: Bytes,
	hash: TxHash,
}

impl SignedTransaction {
	/// Attaches a signature over [`UnsignedTransaction::signature_hash`] and
	/// serializes the result. The signature is not checked here.
	pub fn from_parts(transaction: UnsignedTransaction, signature: Signature) -> Self {
		let signed = transaction.to_legacy().into_signed(signature);
		let hash = *signed.hash();
		let raw = Bytes::from(TxEnvelope::Legacy(signed).encoded_2718());

		Self {
			transaction,
			signature,
			raw,
			hash,
		}
	}

	/// Decodes raw broadcast bytes back into a signed transaction.
	///
	/// Only canonical, replay-protected legacy transactions are accepted.
	pub fn decode(raw: &[u8]) -> Result<Self, CodecError> {
		let mut buf = raw;
		let envelope =
			TxEnvelope::decode_2718(&mut buf).map_err(|e| CodecError::Envelope(e.to_string()))?;
		if !buf.is_empty() {
			return Err(CodecError::TrailingBytes(buf.len()));
		}

		let signed = match envelope {
			TxEnvelope::Legacy(signed) => signed,
			other => return Err(CodecError::UnsupportedType(other.tx_type() as u8)),
		};

		let transaction = UnsignedTransaction::try_from(signed.tx())?;
		let decoded = Self::from_parts(transaction, *signed.signature());
		if decoded.raw.as_ref() != raw {
			return Err(CodecError::NonCanonical);
		}

		Ok(decoded)
	}

	/// The transaction that was signed.
	pub fn transaction(&self) -> &UnsignedTransaction {
		&self.transaction
	}

	/// The secp256k1 signature `(r, s, yParity)`.
	pub fn signature(&self) -> &Signature {
		&self.signature
	}

	/// Canonical serialized form used for broadcast.
	pub fn raw(&self) -> &Bytes {
		&self.raw
	}

	/// Keccak-256 of the raw bytes; the node reports the same hash.
	pub fn hash(&self) -> TxHash {
		self.hash
	}

	/// EIP-155 recovery discriminant as it appears on the wire.
	///
	/// Widened to `u128` so that any `u64` chain id fits.
	pub fn v(&self) -> u128 {
		u128::from(self.transaction.chain_id) * 2 + 35 + u128::from(self.signature.v())
	}
}

/// Hash of arbitrary raw transaction bytes, as a node would compute it.
pub fn raw_transaction_hash(raw: &[u8]) -> TxHash {
	keccak256(raw)
}
