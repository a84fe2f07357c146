// src/cli/mod.rs
//! Command-line interface definitions

/// Sub-commands and their options
pub mod commands;

pub use commands::{Action, BenchmarkOptions, Commands, ConfigOptions, StartOptions};
