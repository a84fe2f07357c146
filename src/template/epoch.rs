//! RandomX epoch arithmetic

/// Blocks per RandomX epoch; a power of two so rounding is a mask
pub const EPOCH_BLOCKS: u64 = 2048;

/// Blocks between a seed block and the first block that uses it
pub const EPOCH_LAG: u64 = 96;

/// Height of the block whose hash seeds RandomX for block `height`
pub fn seed_height(height: u64) -> u64 {
    if height <= EPOCH_BLOCKS + EPOCH_LAG {
        return 0;
    }
    (height - EPOCH_LAG - 1) & !(EPOCH_BLOCKS - 1)
}

/// One-based epoch number for display
pub fn epoch_number(height: u64) -> u64 {
    seed_height(height) / EPOCH_BLOCKS + 1
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_first_epoch_boundary() {
        assert_eq!(seed_height(0), 0);
        assert_eq!(seed_height(2144), 0);
        assert_eq!(seed_height(2145), (2145 - 96 - 1) / 2048 * 2048);
        assert_eq!(seed_height(2145), 2048);
    }

    #[test]
    fn test_later_epochs_round_down() {
        assert_eq!(seed_height(4192), 2048);
        assert_eq!(seed_height(4193), 4096);
        assert_eq!(epoch_number(1583), 1);
        assert_eq!(epoch_number(4193), 3);
    }
}
