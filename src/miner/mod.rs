// src/miner/mod.rs
//! Core mining functionality
//!
//! This module contains all components related to the mining process:
//! - The RandomX backend seam and its production implementation
//! - NUMA topology and thread placement
//! - RandomX cache/dataset/VM lifecycle
//! - Per-template mining sessions, workers and their scheduler

/// RandomX backend abstraction
pub mod randomx;

/// NUMA detection and CPU pinning
pub mod topology;

/// Cache, dataset and VM ownership
///
/// Rebuilds RandomX memory on seed, thread count or mode changes.
pub mod resources;

/// Shared state of one mining attempt
pub mod session;

/// Nonce search loop run by each mining thread
pub mod worker;

/// Mining thread scheduler
///
/// Starts and joins workers and serialises reconfiguration against them.
pub mod scheduler;

// Re-export main components for cleaner imports
pub use self::randomx::{RandomXBackend, RustRandomX, SeedHash};
pub use self::resources::{ResourceManager, SeedChange};
pub use self::scheduler::Scheduler;
pub use self::session::{MiningSession, SessionState, Solution};
pub use self::topology::{SysfsTopology, Topology, TopologyProvider};
pub use self::worker::Worker;
