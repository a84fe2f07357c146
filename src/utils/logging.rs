//! Logging configuration and utilities
//!
//! The miner logs through the `log` facade. One `env_logger` backend is
//! built at process start by [`init_logging`]; components never hold their
//! own logger state.

use crate::utils::error::MinerError;
use env_logger::{Builder, Target};
use log::LevelFilter;
use std::env;
use std::fs::OpenOptions;
use std::path::Path;

/// Initializes the logging subsystem
///
/// # Arguments
/// * `level` - Default level when `RUST_LOG` is not set
/// * `log_file` - Optional file that receives the log lines instead of stdout
///
/// # Returns
/// * `Err(MinerError)` if the log file cannot be opened
pub fn init_logging(level: LevelFilter, log_file: Option<&Path>) -> Result<(), MinerError> {
    let mut builder = common_log_config();
    builder.filter_level(level);
    if env::var("RUST_LOG").is_ok() {
        builder.parse_env("RUST_LOG");
    }

    if let Some(path) = log_file {
        let file = OpenOptions::new().create(true).append(true).open(path)?;
        builder.target(Target::Pipe(Box::new(file)));
    }

    // A second init (tests, benchmark after start) is not an error.
    let _ = builder.try_init();
    Ok(())
}

/// Configures benchmark-specific logging
///
/// Defaults to Debug so per-thread hashrates are visible.
pub fn init_bench_logging() {
    let mut builder = common_log_config();

    if env::var("RUST_LOG").is_err() {
        builder.filter_level(LevelFilter::Debug);
    } else {
        builder.parse_env("RUST_LOG");
    }

    let _ = builder.try_init();
}

/// Parses a textual level from the config file, falling back to Info
pub fn parse_level(level: &str) -> LevelFilter {
    level.parse().unwrap_or(LevelFilter::Info)
}

/// Base builder shared by all logging setups
///
/// Format: `[timestamp LEVEL module:line] message`, written to stdout.
fn common_log_config() -> Builder {
    let mut builder = Builder::new();

    builder
        .format(|buf, record| {
            use std::io::Write;
            let ts = buf.timestamp_seconds();
            let level = record.level();
            let module = record.module_path().unwrap_or_default();
            let line = record.line().unwrap_or(0);

            writeln!(
                buf,
                "[{} {} {}:{}] {}",
                ts,
                level,
                module,
                line,
                record.args()
            )
        })
        .target(Target::Stdout);

    builder
}
