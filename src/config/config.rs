// src/config/config.rs
use crate::{network::node::NodeConfig, types::MiningMode, utils::error::MinerError};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use url::Url;

/// Main configuration structure for the mining application
///
/// Contains all settings needed to solo mine against one node: the RPC
/// connection, thread count and RandomX mode, reporting cadence and
/// logging. Every field has a default so a partial file is valid.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Node RPC connection
    pub node: NodeConfig,

    /// Number of mining threads (0 = auto-detect from CPUs and memory)
    pub threads: usize,

    /// Use the ~2 GiB dataset instead of the cache
    /// (falls back to light mode when memory is short)
    pub fast_mode: bool,

    /// Seconds between statistics log lines
    pub update_interval_secs: u64,

    /// Seconds between chain tip checks while mining
    pub block_check_interval_secs: u64,

    /// Default log level (overridden by `RUST_LOG`)
    pub log_level: String,

    /// Optional file receiving the log instead of stdout
    pub log_file: Option<PathBuf>,
}

impl Default for Config {
    fn default() -> Self {
        Config {
            node: NodeConfig::default(),
            threads: 0,
            fast_mode: false,
            update_interval_secs: 5,
            block_check_interval_secs: 2,
            log_level: "info".into(),
            log_file: None,
        }
    }
}

impl Config {
    /// Loads configuration from a file
    ///
    /// # Arguments
    /// * `path` - Path to the configuration file (TOML format)
    ///
    /// # Returns
    /// * `Ok(Config)` - Successfully loaded and validated configuration
    /// * `Err(MinerError)` - If file couldn't be read, parsed or validated
    pub fn load(path: impl Into<PathBuf>) -> Result<Self, MinerError> {
        let path = path.into();
        let config_str = std::fs::read_to_string(&path).map_err(|e| {
            MinerError::ConfigError(format!(
                "Failed to read config at {}: {}",
                path.display(),
                e
            ))
        })?;

        let config: Config = toml::from_str(&config_str)
            .map_err(|e| MinerError::ConfigError(format!("Invalid config format: {}", e)))?;
        config.validate()?;
        Ok(config)
    }

    /// Checks values serde cannot
    pub fn validate(&self) -> Result<(), MinerError> {
        Url::parse(&self.node.rpc_url).map_err(|e| {
            MinerError::ConfigError(format!("Invalid rpc_url {}: {}", self.node.rpc_url, e))
        })?;
        if self.update_interval_secs == 0 {
            return Err(MinerError::ConfigError(
                "update_interval_secs must be greater than 0".into(),
            ));
        }
        if self.block_check_interval_secs == 0 {
            return Err(MinerError::ConfigError(
                "block_check_interval_secs must be greater than 0".into(),
            ));
        }
        Ok(())
    }

    /// Requested RandomX mode
    pub fn mode(&self) -> MiningMode {
        MiningMode::from_fast_flag(self.fast_mode)
    }

    /// Generates a configuration template string
    ///
    /// # Returns
    /// String containing a commented TOML configuration template
    pub fn generate_template() -> String {
        let mut template = String::new();
        template.push_str("# Juno Miner Configuration\n\n");
        template.push_str("# Number of mining threads (0 = auto-detect)\n");
        template.push_str("threads = 0\n");
        template.push_str("# Fast mode uses a ~2 GiB dataset for several times the hashrate\n");
        template.push_str("fast_mode = false\n");
        template.push_str("# Seconds between statistics lines\n");
        template.push_str("update_interval_secs = 5\n");
        template.push_str("# Seconds between checks for a new block on the network\n");
        template.push_str("block_check_interval_secs = 2\n");
        template.push_str("# Log level: error, warn, info, debug, trace\n");
        template.push_str("log_level = \"info\"\n");
        template.push_str("# log_file = \"juno-miner.log\"\n\n");

        template.push_str("# Node RPC connection\n");
        template.push_str("[node]\n");
        template.push_str("rpc_url = \"http://127.0.0.1:8232\"\n");
        template.push_str("rpc_user = \"\"\n");
        template.push_str("rpc_password = \"\"\n");

        template
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_template_parses_to_defaults() {
        let config: Config = toml::from_str(&Config::generate_template()).unwrap();
        assert_eq!(config, Config::default());
        config.validate().unwrap();
    }

    #[test]
    fn test_partial_file_keeps_defaults() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "fast_mode = true\n[node]\nrpc_user = \"miner\"").unwrap();

        let config = Config::load(file.path()).unwrap();
        assert_eq!(config.mode(), MiningMode::Fast);
        assert_eq!(config.node.rpc_user, "miner");
        assert_eq!(config.node.rpc_url, "http://127.0.0.1:8232");
        assert_eq!(config.block_check_interval_secs, 2);
    }

    #[test]
    fn test_zero_interval_rejected() {
        let config = Config {
            update_interval_secs: 0,
            ..Config::default()
        };
        assert!(matches!(config.validate(), Err(MinerError::ConfigError(_))));
    }

    #[test]
    fn test_bad_url_rejected() {
        let mut config = Config::default();
        config.node.rpc_url = "127.0.0.1 8232".into();
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_missing_file_is_config_error() {
        assert!(matches!(
            Config::load("/nonexistent/juno-miner.toml"),
            Err(MinerError::ConfigError(_))
        ));
    }
}
