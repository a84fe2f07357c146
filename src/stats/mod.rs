//! Statistics collection and reporting module
//!
//! This module provides functionality for tracking and reporting mining statistics,
//! including:
//! - Hashrate sampling from the scheduler
//! - Block acceptance/rejection tracking
//! - Hardware monitoring (CPU, memory, temperature)
//! - Host resource detection used to size the thread pool
//!
//! The main component is [`StatsReporter`] which collects data and periodically
//! reports statistics to the log.

/// Submodule containing the statistics reporter implementation
///
/// The reporter handles:
/// - Atomic collection of block results
/// - Hardware monitoring
/// - Periodic reporting of stats
pub mod reporter;

/// CPU and memory detection plus thread-count sizing
pub mod system;

// Re-export main components
pub use reporter::{
    BlockResult, HardwareStats, HashSample, MiningStats, StatsReporter, format_hashrate,
};
pub use system::SystemResources;
