//! Hex and address helpers shared by the providers and the CLI.

use crate::errors::{Result, SessionError};

pub const ADDRESS_LEN: usize = 20;

/// Encode bytes as `0x`-prefixed lowercase hex.
pub fn to_hex(bytes: impl AsRef<[u8]>) -> String {
    format!("0x{}", hex::encode(bytes))
}

/// Decode hex with or without a `0x` prefix.
pub fn from_hex(value: &str) -> Result<Vec<u8>> {
    let trimmed = value.trim();
    let digits = trimmed
        .strip_prefix("0x")
        .or_else(|| trimmed.strip_prefix("0X"))
        .unwrap_or(trimmed);
    hex::decode(digits)
        .map_err(|err| SessionError::InvalidInput(format!("invalid hex `{value}`: {err}")))
}

/// Parse a 20-byte account or contract address.
pub fn parse_address(value: &str) -> Result<[u8; ADDRESS_LEN]> {
    let bytes = from_hex(value)?;
    bytes.try_into().map_err(|bytes: Vec<u8>| {
        SessionError::InvalidInput(format!(
            "address must be {ADDRESS_LEN} bytes, got {}",
            bytes.len()
        ))
    })
}

/// Shorten an address for display: `0x1234…abcd`. Values too short to
/// shorten are returned unchanged.
pub fn format_address(address: &str) -> String {
    let address = address.trim();
    if address.len() <= 12 || !address.is_ascii() {
        return address.to_string();
    }
    format!("{}…{}", &address[..6], &address[address.len() - 4..])
}
