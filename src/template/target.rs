//! Difficulty target handling
//!
//! Targets are 256-bit values stored as 32 little-endian bytes, the same
//! layout the RandomX digest is compared in.

/// A 256-bit target, little-endian byte layout
pub type Target = [u8; 32];

/// Expands compact `bits` into a 256-bit target
///
/// The top byte is the size (exponent), the low 23 bits the mantissa. The
/// sign bit (0x00800000) is ignored. Sizes above 32 yield a zero target.
pub fn compact_to_target(bits: u32) -> Target {
    let size = (bits >> 24) as usize;
    let mut word = bits & 0x007f_ffff;
    let mut target = [0u8; 32];

    if size <= 3 {
        word >>= 8 * (3 - size);
        for (i, byte) in target.iter_mut().enumerate().take(size) {
            *byte = (word >> (i * 8)) as u8;
        }
    } else if size <= 32 {
        let pos = size - 3;
        target[pos] = word as u8;
        target[pos + 1] = (word >> 8) as u8;
        target[pos + 2] = (word >> 16) as u8;
    }

    target
}

/// Checks `hash <= target`
///
/// Both sides are read as eight little-endian u32 words and compared from
/// word 7 down to word 0. Equality satisfies the target.
pub fn hash_meets_target(hash: &[u8; 32], target: &Target) -> bool {
    for word in (0..8).rev() {
        let h = read_le32(hash, word * 4);
        let t = read_le32(target, word * 4);
        if h < t {
            return true;
        }
        if h > t {
            return false;
        }
    }
    true
}

/// Target rendered most-significant byte first, as nodes print it
pub fn target_to_hex(target: &Target) -> String {
    crate::utils::digest::to_display_hex(target)
}

fn read_le32(bytes: &[u8; 32], offset: usize) -> u32 {
    u32::from_le_bytes([
        bytes[offset],
        bytes[offset + 1],
        bytes[offset + 2],
        bytes[offset + 3],
    ])
}
