//! Lowercase hex text form for keys, addresses and signatures.
//! Decoding tolerates an optional "0x" prefix; encoding never adds one
//! unless asked.

use crate::error::SextantError;
use hex;

/// Strip an optional "0x"/"0X" prefix.
pub fn strip_prefix(s: &str) -> &str {
    s.strip_prefix("0x").or_else(|| s.strip_prefix("0X")).unwrap_or(s)
}

/// Encode bytes as plain lowercase hex.
pub fn encode(bytes: &[u8]) -> String {
    hex::encode(bytes)
}

/// Encode bytes as "0x"-prefixed lowercase hex.
pub fn encode_prefixed(bytes: &[u8]) -> String {
    format!("0x{}", hex::encode(bytes))
}

/// Decode a hex string, with or without "0x" prefix.
pub fn decode(s: &str) -> Result<Vec<u8>, SextantError> {
    hex::decode(strip_prefix(s))
        .map_err(|e| SextantError::InvalidValue(format!("hex decode: {}", e)))
}

/// Decode a hex string into a fixed-size array.
pub fn decode_fixed<const N: usize>(s: &str) -> Result<[u8; N], SextantError> {
    let bytes = decode(s)?;
    if bytes.len() != N {
        return Err(SextantError::InvalidValue(format!(
            "expected {} bytes, got {}",
            N,
            bytes.len()
        )));
    }
    let mut out = [0u8; N];
    out.copy_from_slice(&bytes);
    Ok(out)
}
