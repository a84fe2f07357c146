// src/network/mod.rs
//! Network communication components
//!
//! Solo mining talks to a single full node over JSON-RPC: it pulls block
//! templates, watches the chain tip and submits solved blocks.

/// Full node client implementation
///
/// Handles communication with a local node for solo mining.
/// Uses JSON-RPC 1.0 over HTTP with basic authentication.
pub mod node;

// Re-export main components for cleaner imports
pub use node::{ChainInfo, DEFAULT_RPC_URL, MiningInfo, NodeClient, NodeConfig, SubmitOutcome};
