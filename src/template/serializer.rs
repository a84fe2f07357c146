//! Submittable block assembly
//!
//! Layout: header(140) ∥ compact-size(32) ∥ PoW digest ∥
//! compact-size(tx count) ∥ coinbase ∥ transactions, hex encoded.
//! The PoW digest doubles as the block's identity hash on this chain.

use crate::template::block_template::HEADER_LEN;
use crate::utils::error::MinerError;

/// Bitcoin-style compact size (varint) encoding
pub fn encode_compact_size(n: u64) -> Vec<u8> {
    if n < 0xfd {
        vec![n as u8]
    } else if n <= 0xffff {
        let mut out = vec![0xfd];
        out.extend_from_slice(&(n as u16).to_le_bytes());
        out
    } else if n <= 0xffff_ffff {
        let mut out = vec![0xfe];
        out.extend_from_slice(&(n as u32).to_le_bytes());
        out
    } else {
        let mut out = vec![0xff];
        out.extend_from_slice(&n.to_le_bytes());
        out
    }
}

/// Serializes a solved block for `submitblock`
///
/// # Arguments
/// * `header` - Solved header including the winning nonce
/// * `solution` - RandomX digest of `header`
/// * `coinbase_hex` - Coinbase transaction, raw hex
/// * `txn_hex` - Other transactions, raw hex, in block order
///
/// # Returns
/// Lowercase hex of the whole block, or a template error if a
/// transaction payload is not valid hex
pub fn serialize_block(
    header: &[u8; HEADER_LEN],
    solution: &[u8; 32],
    coinbase_hex: &str,
    txn_hex: &[String],
) -> Result<String, MinerError> {
    let mut block = Vec::with_capacity(HEADER_LEN + 34 + coinbase_hex.len() / 2);

    block.extend_from_slice(header);

    block.extend(encode_compact_size(solution.len() as u64));
    block.extend_from_slice(solution);

    block.extend(encode_compact_size(1 + txn_hex.len() as u64));
    block.extend(hex::decode(coinbase_hex)?);
    for tx in txn_hex {
        block.extend(hex::decode(tx)?);
    }

    Ok(hex::encode(block))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_compact_size_boundaries() {
        assert_eq!(encode_compact_size(1), vec![0x01]);
        assert_eq!(encode_compact_size(0xfc), vec![0xfc]);
        assert_eq!(encode_compact_size(0xfd), vec![0xfd, 0xfd, 0x00]);
        assert_eq!(encode_compact_size(0xffff), vec![0xfd, 0xff, 0xff]);
        assert_eq!(
            encode_compact_size(0x10000),
            vec![0xfe, 0x00, 0x00, 0x01, 0x00]
        );
        assert_eq!(
            encode_compact_size(0x1_0000_0000),
            vec![0xff, 0, 0, 0, 0, 1, 0, 0, 0]
        );
    }

    #[test]
    fn test_coinbase_only_block_layout() {
        let header = [0x11u8; HEADER_LEN];
        let solution = [0x22u8; 32];
        let block = serialize_block(&header, &solution, "c0ffee", &[]).unwrap();
        let bytes = hex::decode(&block).unwrap();

        assert_eq!(bytes.len(), HEADER_LEN + 1 + 32 + 1 + 3);
        assert_eq!(&bytes[..HEADER_LEN], &header[..]);
        assert_eq!(bytes[HEADER_LEN], 0x20);
        assert_eq!(&bytes[HEADER_LEN + 1..HEADER_LEN + 33], &solution[..]);
        assert_eq!(bytes[HEADER_LEN + 33], 0x01);
        assert_eq!(&bytes[HEADER_LEN + 34..], &[0xc0, 0xff, 0xee]);
    }

    #[test]
    fn test_transactions_follow_coinbase_in_order() {
        let header = [0u8; HEADER_LEN];
        let txns = vec!["aa".to_string(), "bbcc".to_string()];
        let block = serialize_block(&header, &[0u8; 32], "01", &txns).unwrap();
        assert!(block.ends_with("0301aabbcc"));
    }

    #[test]
    fn test_bad_transaction_hex_is_an_error() {
        let header = [0u8; HEADER_LEN];
        let txns = vec!["zz".to_string()];
        assert!(serialize_block(&header, &[0u8; 32], "01", &txns).is_err());
    }
}
