// src/cli/commands.rs
use crate::types::MiningMode;
use clap::{Parser, Subcommand};
use std::path::PathBuf;

/// Juno Miner CLI - RandomX solo miner for Juno Cash
#[derive(Parser, Debug)]
#[command(name = "juno-miner")]
#[command(version, about, long_about = None)]
pub struct Commands {
    /// The action to perform (start mining, run benchmarks, or generate config)
    #[command(subcommand)]
    pub action: Action,
}

/// Top-level commands for the miner application
#[derive(Subcommand, Debug)]
pub enum Action {
    /// Mine against a node with the specified options
    Start(StartOptions),

    /// Measure the local RandomX hashrate
    Benchmark(BenchmarkOptions),

    /// Generate configuration file template
    Config(ConfigOptions),
}

/// Options for starting the mining operation
#[derive(Parser, Debug)]
pub struct StartOptions {
    /// Path to configuration file (defaults apply when it does not exist)
    #[arg(short, long, default_value = "juno-miner.toml")]
    pub config: PathBuf,

    /// Node RPC URL (overrides config)
    #[arg(long)]
    pub rpc_url: Option<String>,

    /// Node RPC username (overrides config)
    #[arg(long)]
    pub rpc_user: Option<String>,

    /// Node RPC password (overrides config)
    #[arg(long)]
    pub rpc_password: Option<String>,

    /// Number of mining threads, 0 for auto (overrides config)
    #[arg(short, long)]
    pub threads: Option<usize>,

    /// Use the full dataset (~2 GiB) for higher hashrate
    #[arg(long)]
    pub fast: bool,

    /// Seconds between statistics lines (overrides config)
    #[arg(long)]
    pub update_interval: Option<u64>,

    /// Seconds between new-block checks (overrides config)
    #[arg(long)]
    pub block_check_interval: Option<u64>,

    /// Enable debug logging
    #[arg(short, long)]
    pub debug: bool,

    /// Write the log to this file instead of stdout
    #[arg(long)]
    pub log_file: Option<PathBuf>,
}

/// Options for running mining benchmarks
#[derive(Parser, Debug)]
pub struct BenchmarkOptions {
    /// RandomX mode to benchmark
    #[arg(short, long, value_enum, default_value_t = MiningMode::Light)]
    pub mode: MiningMode,

    /// Duration of benchmark in seconds
    #[arg(short, long, default_value_t = 60)]
    pub duration: u64,

    /// Number of threads to use
    #[arg(short, long, default_value_t = num_cpus::get())]
    pub threads: usize,
}

/// Options for generating configuration files
#[derive(Parser, Debug)]
pub struct ConfigOptions {
    /// Output file path
    #[arg(short, long, default_value = "juno-miner.toml")]
    pub output: PathBuf,
}
