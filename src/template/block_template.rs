//! Block template model
//!
//! A [`BlockTemplate`] is the validated, immutable form of a node's
//! `getblocktemplate` answer. Parsing is all-or-nothing: any missing or
//! malformed required field rejects the whole document.

use crate::template::target::{Target, compact_to_target};
use crate::utils::digest::{decode_digest, decode_display_digest};
use crate::utils::error::MinerError;
use serde_json::Value;

/// Length of the consensus header prefix hashed before the nonce
pub const HEADER_PREFIX_LEN: usize = 108;

/// Length of the full hashed header (prefix + 32-byte nonce)
pub const HEADER_LEN: usize = 140;

/// Length of the nonce field
pub const NONCE_LEN: usize = 32;

/// A parsed, validated mining job
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BlockTemplate {
    /// Block version
    pub version: u32,
    /// Height of the block being mined
    pub height: u32,
    /// Header timestamp (`curtime`)
    pub time: u32,
    /// Compact difficulty
    pub bits: u32,
    /// Previous block hash as sent by the node (display order)
    pub previous_block_hash: String,
    /// Merkle root as sent by the node (display order)
    pub merkle_root: String,
    /// Block commitments hash as sent by the node (display order)
    pub block_commitments_hash: String,
    /// Target expanded from `bits`
    pub target: Target,
    /// Target string reported by the node, informational only
    pub target_hex: Option<String>,
    /// Height of the RandomX seed block
    pub seed_height: u64,
    /// RandomX seed for this template (internal order, used as-is)
    pub seed_hash: [u8; 32],
    /// Seed of the following epoch, when the node already knows it
    pub next_seed_hash: Option<[u8; 32]>,
    /// Coinbase transaction, raw hex
    pub coinbase_txn_hex: String,
    /// Remaining transactions, raw hex, in block order
    pub txn_hex: Vec<String>,
    header_base: [u8; HEADER_LEN],
}

impl BlockTemplate {
    /// Parses a `getblocktemplate` result object
    ///
    /// # Returns
    /// * `Ok(BlockTemplate)` with the 108-byte header prefix built
    /// * `Err(MinerError::TemplateError)` naming the first bad field
    pub fn parse(doc: &Value) -> Result<Self, MinerError> {
        let version = required_u32(doc, "version")?;
        let previous_block_hash = required_str(doc, "previousblockhash")?.to_string();
        let time = required_u32(doc, "curtime")?;
        let bits_str = required_str(doc, "bits")?;
        let bits = u32::from_str_radix(bits_str, 16).map_err(|e| {
            MinerError::TemplateError(format!("Invalid bits '{}': {}", bits_str, e))
        })?;
        let height = required_u32(doc, "height")?;

        let seed_height = required(doc, "randomxseedheight")?
            .as_u64()
            .ok_or_else(|| invalid("randomxseedheight", "expected unsigned integer"))?;
        let seed_hash = decode_digest("randomxseedhash", required_str(doc, "randomxseedhash")?)?;

        let next_seed_hash = match doc.get("randomxnextseedhash").and_then(Value::as_str) {
            Some(hex_str) => match decode_digest("randomxnextseedhash", hex_str) {
                Ok(seed) => Some(seed),
                Err(e) => {
                    log::warn!("Ignoring next seed hash: {}", e);
                    None
                }
            },
            None => None,
        };

        let target_hex = doc
            .get("target")
            .and_then(Value::as_str)
            .map(str::to_string);

        let roots = doc.get("defaultroots");
        let merkle_root = roots
            .and_then(|r| r.get("merkleroot"))
            .and_then(Value::as_str)
            .ok_or_else(|| missing("defaultroots.merkleroot"))?
            .to_string();
        let block_commitments_hash = roots
            .and_then(|r| r.get("blockcommitmentshash"))
            .or_else(|| doc.get("blockcommitmentshash"))
            .and_then(Value::as_str)
            .ok_or_else(|| missing("blockcommitmentshash"))?
            .to_string();

        let coinbase_txn_hex = doc
            .get("coinbasetxn")
            .and_then(|c| c.get("data"))
            .and_then(Value::as_str)
            .ok_or_else(|| missing("coinbasetxn.data"))?
            .to_string();
        check_hex("coinbasetxn.data", &coinbase_txn_hex)?;

        let mut txn_hex = Vec::new();
        if let Some(txns) = doc.get("transactions").and_then(Value::as_array) {
            for (i, txn) in txns.iter().enumerate() {
                let field = format!("transactions[{}].data", i);
                let data = txn
                    .get("data")
                    .and_then(Value::as_str)
                    .ok_or_else(|| missing(&field))?;
                check_hex(&field, data)?;
                txn_hex.push(data.to_string());
            }
        }

        let header_base = build_header_base(
            version,
            &decode_display_digest("previousblockhash", &previous_block_hash)?,
            &decode_display_digest("merkleroot", &merkle_root)?,
            &decode_display_digest("blockcommitmentshash", &block_commitments_hash)?,
            time,
            bits,
        );

        Ok(BlockTemplate {
            version,
            height,
            time,
            bits,
            previous_block_hash,
            merkle_root,
            block_commitments_hash,
            target: compact_to_target(bits),
            target_hex,
            seed_height,
            seed_hash,
            next_seed_hash,
            coinbase_txn_hex,
            txn_hex,
            header_base,
        })
    }

    /// The 140-byte header with a zero nonce
    pub fn header_base(&self) -> &[u8; HEADER_LEN] {
        &self.header_base
    }

    /// The consensus-serialized prefix that every candidate shares
    pub fn header_prefix(&self) -> &[u8] {
        &self.header_base[..HEADER_PREFIX_LEN]
    }

    /// Copy of this template mining against a different target
    ///
    /// The header keeps the original `bits`; only the local acceptance
    /// threshold changes. Used for benchmarks and tests.
    pub fn with_target(&self, target: Target) -> Self {
        BlockTemplate {
            target,
            ..self.clone()
        }
    }
}

/// Serializes version ∥ prev ∥ merkle ∥ commitments ∥ time ∥ bits and
/// leaves the nonce bytes zeroed
fn build_header_base(
    version: u32,
    prev_hash: &[u8; 32],
    merkle_root: &[u8; 32],
    commitments: &[u8; 32],
    time: u32,
    bits: u32,
) -> [u8; HEADER_LEN] {
    let mut header = [0u8; HEADER_LEN];
    header[0..4].copy_from_slice(&version.to_le_bytes());
    header[4..36].copy_from_slice(prev_hash);
    header[36..68].copy_from_slice(merkle_root);
    header[68..100].copy_from_slice(commitments);
    header[100..104].copy_from_slice(&time.to_le_bytes());
    header[104..HEADER_PREFIX_LEN].copy_from_slice(&bits.to_le_bytes());
    header
}

fn required<'a>(doc: &'a Value, key: &str) -> Result<&'a Value, MinerError> {
    doc.get(key).ok_or_else(|| missing(key))
}

fn required_str<'a>(doc: &'a Value, key: &str) -> Result<&'a str, MinerError> {
    required(doc, key)?
        .as_str()
        .ok_or_else(|| invalid(key, "expected string"))
}

fn required_u32(doc: &Value, key: &str) -> Result<u32, MinerError> {
    let value = required(doc, key)?
        .as_u64()
        .ok_or_else(|| invalid(key, "expected unsigned integer"))?;
    u32::try_from(value).map_err(|_| invalid(key, "does not fit in 32 bits"))
}

fn check_hex(field: &str, data: &str) -> Result<(), MinerError> {
    hex::decode(data)
        .map(|_| ())
        .map_err(|e| invalid(field, &e.to_string()))
}

fn missing(field: &str) -> MinerError {
    MinerError::TemplateError(format!("Missing {} in block template", field))
}

fn invalid(field: &str, why: &str) -> MinerError {
    MinerError::TemplateError(format!("Invalid {} in block template: {}", field, why))
}
