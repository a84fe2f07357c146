//! Juno Miner - RandomX solo mining engine for Juno Cash
//!
//! This crate provides a complete solo miner that works against a full
//! node's JSON-RPC interface:
//! - Block template parsing and bit-exact header/block serialization
//! - RandomX cache, dataset and VM lifecycle with NUMA-aware placement
//! - A multi-threaded nonce search with a single-winner solution slot
//! - Performance benchmarking
//! - Hardware monitoring

#![forbid(unsafe_code)]

/// Miner core: RandomX resources, sessions, workers and scheduling
pub mod miner;

/// Full node RPC client
pub mod network;

/// Statistics collection and reporting functionality
pub mod stats;

/// Block templates, targets, epochs and block serialization
pub mod template;

/// Utility functions and error handling
pub mod utils;

/// Command-line interface definitions
pub mod cli;

/// Configuration management
pub mod config;

/// Shared type definitions
pub mod types;

// Core exports
pub use cli::Commands;
pub use config::Config;
pub use miner::{RandomXBackend, RustRandomX, Scheduler, Solution, Worker};
pub use network::{NodeClient, SubmitOutcome};
pub use stats::{HardwareStats, MiningStats, StatsReporter, SystemResources};
pub use template::BlockTemplate;
pub use types::MiningMode;
pub use utils::{MinerError, init_logging};
