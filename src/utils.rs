//! Hex decoding for hashes and opaque byte fields read from files and CLI arguments.

use crate::types::{Hash, HASH_SIZE};
use anyhow::{anyhow, Result};

/// Trims whitespace and an optional `0x`/`0X` prefix.
fn strip_prefix(input: &str) -> &str {
    let trimmed = input.trim();
    trimmed
        .strip_prefix("0x")
        .or_else(|| trimmed.strip_prefix("0X"))
        .unwrap_or(trimmed)
}

fn decode_even_hex(digits: &str) -> Result<Vec<u8>> {
    if digits.is_empty() {
        return Err(anyhow!("Hex value is empty"));
    }
    if let Some(pos) = digits.find(|c: char| !c.is_ascii_hexdigit()) {
        return Err(anyhow!("Hex value has a non-hex character at offset {pos}"));
    }
    if digits.len() % 2 != 0 {
        return Err(anyhow!("Hex value has an odd number of digits ({})", digits.len()));
    }
    Ok(hex::decode(digits)?)
}

/// Decodes 64 hex digits (optionally `0x`-prefixed) into a hash.
///
/// # Errors
/// Returns an error unless the input is exactly 32 bytes of hex.
///
/// # Examples
///
/// ```
/// use msingi_registry::utils::parse_hash_hex;
///
/// let hash = parse_hash_hex(&"2a".repeat(32)).unwrap();
/// assert_eq!(hash, [0x2a; 32]);
/// ```
pub fn parse_hash_hex(input: &str) -> Result<Hash> {
    let bytes = decode_even_hex(strip_prefix(input))?;
    let len = bytes.len();
    bytes
        .try_into()
        .map_err(|_| anyhow!("Expected {HASH_SIZE} bytes of hex, got {len} bytes"))
}

/// Decodes any non-empty, even-length hex value (optionally `0x`-prefixed).
///
/// # Errors
/// Returns an error if the input is empty, odd-length, or not hex.
pub fn parse_hex_bytes(input: &str) -> Result<Vec<u8>> {
    decode_even_hex(strip_prefix(input))
}
