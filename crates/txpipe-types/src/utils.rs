//! Hex and display helpers.

/// Shortens a hex identifier for log output.
///
/// Shows only the first 10 characters followed by ".." for longer strings.
pub fn truncate_id(id: &str) -> String {
	if id.len() <= 10 {
		id.to_string()
	} else {
		format!("{}..", &id[..10])
	}
}

/// Removes "0x" prefix from a hex string if present.
pub fn without_0x_prefix(hex_str: &str) -> &str {
	hex_str
		.strip_prefix("0x")
		.or_else(|| hex_str.strip_prefix("0X"))
		.unwrap_or(hex_str)
}

/// Decodes a hex string with optional "0x" prefix and surrounding whitespace.
pub fn decode_hex(hex_str: &str) -> Result<Vec<u8>, hex::FromHexError> {
	hex::decode(without_0x_prefix(hex_str.trim()))
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn test_truncate_id() {
		assert_eq!(truncate_id("0x1234"), "0x1234");
		assert_eq!(truncate_id("0x1234567890abcdef"), "0x12345678..");
	}

	#[test]
	fn test_without_0x_prefix() {
		assert_eq!(without_0x_prefix("0xabcd"), "abcd");
		assert_eq!(without_0x_prefix("0Xabcd"), "abcd");
		assert_eq!(without_0x_prefix("abcd"), "abcd");
	}

	#[test]
	fn test_decode_hex() {
		assert_eq!(decode_hex(" 0x00ff\n").unwrap(), vec![0x00, 0xff]);
		assert_eq!(decode_hex("").unwrap(), Vec::<u8>::new());
		assert!(decode_hex("0xabc").is_err());
	}
}
