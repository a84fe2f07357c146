use serde_json;
use std::io;
use thiserror::Error;
use url;

/// Main error type for the mining application
///
/// Variants follow the failure classes of the miner: configuration
/// mistakes are rejected before anything is touched, resource failures
/// are fatal to the reconfiguration call that hit them, template errors
/// discard a single job, and the remaining variants wrap the I/O stack.
#[derive(Error, Debug)]
pub enum MinerError {
    /// Invalid seed length, zero thread count, bad config file
    #[error("Configuration error: {0}")]
    ConfigError(String),

    /// Cache, dataset or VM allocation failed
    #[error("Resource allocation error: {0}")]
    ResourceError(String),

    /// Missing or malformed block template field
    #[error("Block template error: {0}")]
    TemplateError(String),

    /// Node answered with an RPC-level error object
    #[error("RPC error: {0}")]
    RpcError(String),

    /// Standard I/O operation errors
    #[error("I/O error: {0}")]
    IoError(#[from] io::Error),

    /// JSON serialization/deserialization errors
    #[error("JSON error: {0}")]
    JsonError(#[from] serde_json::Error),

    /// URL parsing errors
    #[error("URL parse error: {0}")]
    UrlError(#[from] url::ParseError),

    /// HTTP request/response errors
    #[error("HTTP error: {0}")]
    HttpError(#[from] reqwest::Error),

    /// Background thread or task failures
    #[error("Task execution error: {0}")]
    TaskError(String),
}

/// Converts hex decoding errors into MinerError
///
/// Hex only enters the miner through block templates, so a bad digit
/// is always a template problem.
impl From<hex::FromHexError> for MinerError {
    fn from(e: hex::FromHexError) -> Self {
        MinerError::TemplateError(format!("Hex conversion failed: {}", e))
    }
}

/// Converts async task join errors into MinerError
impl From<tokio::task::JoinError> for MinerError {
    fn from(e: tokio::task::JoinError) -> Self {
        MinerError::TaskError(format!("Async task failed: {}", e))
    }
}

impl From<rayon::ThreadPoolBuildError> for MinerError {
    fn from(e: rayon::ThreadPoolBuildError) -> Self {
        MinerError::ResourceError(format!("Dataset helper pool failed: {}", e))
    }
}
