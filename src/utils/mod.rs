//! Utilities module for common functionality
//!
//! Error handling, logging setup and digest hex helpers shared across
//! the miner.

/// Error types and handling utilities
///
/// Contains the [`MinerError`] enum which defines all possible error conditions
/// for the mining application, along with conversion implementations.
pub mod error;

/// Logging configuration and utilities
pub mod logging;

/// Display/internal order hex conversion for 32-byte digests
pub mod digest;

// Re-export for easier access
pub use error::MinerError;
pub use logging::init_logging;
