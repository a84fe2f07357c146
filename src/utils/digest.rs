//! Hex helpers for 32-byte digests
//!
//! Node RPC shows most digests in display order, which is the byte-reverse
//! of the order they are serialized in.

use crate::utils::error::MinerError;

/// Decodes exactly 32 bytes from a 64-character hex string
///
/// `field` names the template field for the error message.
pub fn decode_digest(field: &str, hex_str: &str) -> Result<[u8; 32], MinerError> {
    if hex_str.len() != 64 {
        return Err(MinerError::TemplateError(format!(
            "Invalid {} length: expected 64 hex characters, got {}",
            field,
            hex_str.len()
        )));
    }
    let mut out = [0u8; 32];
    hex::decode_to_slice(hex_str, &mut out).map_err(|e| {
        MinerError::TemplateError(format!("Invalid {} hex: {}", field, e))
    })?;
    Ok(out)
}

/// Decodes a display-order digest and reverses it into internal order
pub fn decode_display_digest(field: &str, hex_str: &str) -> Result<[u8; 32], MinerError> {
    let mut bytes = decode_digest(field, hex_str)?;
    bytes.reverse();
    Ok(bytes)
}

/// Hex of `bytes` in reversed order, as block explorers show hashes
pub fn to_display_hex(bytes: &[u8]) -> String {
    let reversed: Vec<u8> = bytes.iter().rev().copied().collect();
    hex::encode(reversed)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_display_digest_is_reversed() {
        let display = "00000000000000000000000000000000000000000000000000000000000000ff";
        let internal = decode_display_digest("previousblockhash", display).unwrap();
        assert_eq!(internal[0], 0xff);
        assert!(internal[1..].iter().all(|b| *b == 0));
        assert_eq!(to_display_hex(&internal), display);
    }

    #[test]
    fn test_wrong_length_is_rejected() {
        let err = decode_digest("merkleroot", "abcd").unwrap_err();
        assert!(err.to_string().contains("merkleroot"));
    }

    #[test]
    fn test_bad_digit_is_rejected() {
        let bad = "zz".repeat(32);
        assert!(matches!(
            decode_digest("randomxseedhash", &bad),
            Err(MinerError::TemplateError(_))
        ));
    }
}
