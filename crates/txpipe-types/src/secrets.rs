//! Secret wrappers for key material and passwords.
//!
//! Both types zero their memory on drop and never print their contents in
//! `Debug`, `Display` or serialized output. Access goes through
//! `with_exposed`, which keeps the exposure scoped to a closure.

use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::fmt;
use zeroize::Zeroizing;

const REDACTED: &str = "***REDACTED***";

/// A zeroizing string for passwords and other textual secrets.
#[derive(Clone, PartialEq, Eq)]
pub struct SecretString(Zeroizing<String>);

impl SecretString {
	/// Creates a new SecretString from a regular string.
	pub fn new(s: String) -> Self {
		Self(Zeroizing::new(s))
	}

	/// Exposes the secret to a closure for processing.
	pub fn with_exposed<F, R>(&self, f: F) -> R
	where
		F: FnOnce(&str) -> R,
	{
		f(&self.0)
	}

	/// Returns true if the secret string is empty.
	pub fn is_empty(&self) -> bool {
		self.0.is_empty()
	}
}

impl fmt::Debug for SecretString {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		write!(f, "SecretString({})", REDACTED)
	}
}

impl fmt::Display for SecretString {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		f.write_str(REDACTED)
	}
}

impl From<String> for SecretString {
	fn from(s: String) -> Self {
		Self::new(s)
	}
}

impl From<&str> for SecretString {
	fn from(s: &str) -> Self {
		Self::new(s.to_string())
	}
}

impl Serialize for SecretString {
	fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
	where
		S: Serializer,
	{
		serializer.serialize_str(REDACTED)
	}
}

impl<'de> Deserialize<'de> for SecretString {
	fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
	where
		D: Deserializer<'de>,
	{
		let s = String::deserialize(deserializer)?;
		Ok(SecretString::new(s))
	}
}

/// Raw private key bytes.
///
/// The length is not checked here; the signer rejects keys that are not a
/// valid secp256k1 scalar. Keys are moved into the pipeline and dropped as
/// soon as the transaction is signed.
pub struct PrivateKey(Zeroizing<Vec<u8>>);

impl PrivateKey {
	/// Wraps raw key bytes.
	pub fn from_bytes(bytes: impl Into<Vec<u8>>) -> Self {
		Self(Zeroizing::new(bytes.into()))
	}

	/// Parses a hex-encoded key, with or without `0x` prefix.
	pub fn from_hex(key: &str) -> Result<Self, hex::FromHexError> {
		let bytes = hex::decode(crate::without_0x_prefix(key.trim()))?;
		Ok(Self::from_bytes(bytes))
	}

	/// Exposes the key bytes to a closure.
	pub fn with_exposed<F, R>(&self, f: F) -> R
	where
		F: FnOnce(&[u8]) -> R,
	{
		f(&self.0)
	}

	/// Length of the key in bytes.
	pub fn len(&self) -> usize {
		self.0.len()
	}

	/// Returns true if no key bytes are present.
	pub fn is_empty(&self) -> bool {
		self.0.is_empty()
	}
}

impl fmt::Debug for PrivateKey {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		write!(f, "PrivateKey({})", REDACTED)
	}
}

impl TryFrom<&SecretString> for PrivateKey {
	type Error = hex::FromHexError;

	fn try_from(secret: &SecretString) -> Result<Self, Self::Error> {
		secret.with_exposed(PrivateKey::from_hex)
	}
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn test_secret_string_is_redacted() {
		let secret = SecretString::from("hunter2");
		assert_eq!(format!("{:?}", secret), "SecretString(***REDACTED***)");
		assert_eq!(format!("{}", secret), "***REDACTED***");
		assert_eq!(
			serde_json::to_string(&secret).unwrap(),
			"\"***REDACTED***\""
		);
	}

	#[test]
	fn test_secret_string_with_exposed() {
		let secret = SecretString::from("hunter2");
		let len = secret.with_exposed(|s| {
			assert_eq!(s, "hunter2");
			s.len()
		});
		assert_eq!(len, 7);
	}

	#[test]
	fn test_private_key_from_hex() {
		let key = PrivateKey::from_hex(
			"0xac0974bec39a17e36ba4a6b4d238ff944bacb478cbed5efcae784d7bf4f2ff80",
		)
		.unwrap();
		assert_eq!(key.len(), 32);
		key.with_exposed(|bytes| assert_eq!(bytes[0], 0xac));
	}

	#[test]
	fn test_private_key_keeps_odd_lengths() {
		let key = PrivateKey::from_hex("abcd").unwrap();
		assert_eq!(key.len(), 2);
		assert!(PrivateKey::from_hex("not-hex").is_err());
	}

	#[test]
	fn test_private_key_debug_is_redacted() {
		let key = PrivateKey::from_bytes(vec![0x11; 32]);
		let debug = format!("{:?}", key);
		assert_eq!(debug, "PrivateKey(***REDACTED***)");
		assert!(!debug.contains("11"));
	}
}
