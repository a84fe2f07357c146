//! Block template handling
//!
//! Everything that must reproduce the chain's consensus encoding byte for
//! byte: the header prefix, compact-bits targets, epoch arithmetic and the
//! final block serialization.

/// Template parsing and header assembly
pub mod block_template;

/// Compact-bits expansion and target comparison
pub mod target;

/// Block serialization for submission
pub mod serializer;

/// RandomX epoch arithmetic
pub mod epoch;

pub use block_template::{BlockTemplate, HEADER_LEN, HEADER_PREFIX_LEN, NONCE_LEN};
pub use epoch::seed_height;
pub use serializer::{encode_compact_size, serialize_block};
pub use target::{Target, compact_to_target, hash_meets_target};
