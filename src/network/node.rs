// src/network/node.rs
use crate::template::BlockTemplate;
use crate::utils::error::MinerError;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use serde_json::{Value, json};
use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;
use url::Url;

/// Connect timeout for every RPC request
const CONNECT_TIMEOUT: Duration = Duration::from_secs(10);

/// Total timeout for every RPC request
const REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

/// Capabilities advertised in `getblocktemplate`
const TEMPLATE_CAPABILITIES: [&str; 3] = ["coinbasetxn", "workid", "coinbase/append"];

/// Default RPC endpoint of a local node
pub const DEFAULT_RPC_URL: &str = "http://127.0.0.1:8232";

/// Configuration for connecting to a node's RPC interface
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct NodeConfig {
    /// URL of the node's RPC endpoint (e.g., "http://127.0.0.1:8232")
    pub rpc_url: String,
    /// Username for RPC authentication
    pub rpc_user: String,
    /// Password for RPC authentication
    pub rpc_password: String,
}

impl Default for NodeConfig {
    fn default() -> Self {
        NodeConfig {
            rpc_url: DEFAULT_RPC_URL.to_string(),
            rpc_user: String::new(),
            rpc_password: String::new(),
        }
    }
}

/// How the node answered `submitblock`
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SubmitOutcome {
    /// Null or empty result: block accepted and validated
    Accepted,
    /// Node stored the block without (re)validating it
    Duplicate(String),
    /// Any other answer
    Rejected(String),
}

impl SubmitOutcome {
    /// Classifies a `submitblock` result
    pub fn from_result(result: &Value) -> Self {
        match result {
            Value::Null => SubmitOutcome::Accepted,
            Value::String(s) => match s.as_str() {
                "" => SubmitOutcome::Accepted,
                "duplicate" | "inconclusive" | "duplicate-inconclusive" => {
                    SubmitOutcome::Duplicate(s.clone())
                }
                _ => SubmitOutcome::Rejected(s.clone()),
            },
            other => SubmitOutcome::Rejected(other.to_string()),
        }
    }

    /// True when the node kept the block
    pub fn is_stored(&self) -> bool {
        !matches!(self, SubmitOutcome::Rejected(_))
    }
}

impl fmt::Display for SubmitOutcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SubmitOutcome::Accepted => write!(f, "accepted"),
            SubmitOutcome::Duplicate(s) | SubmitOutcome::Rejected(s) => write!(f, "{}", s),
        }
    }
}

/// Subset of `getblockchaininfo`
#[derive(Debug, Clone, Deserialize)]
pub struct ChainInfo {
    pub chain: String,
    pub blocks: u64,
    #[serde(default)]
    pub bestblockhash: String,
}

/// Subset of `getmininginfo`
#[derive(Debug, Clone, Default, Deserialize)]
pub struct MiningInfo {
    #[serde(default)]
    pub blocks: u64,
    #[serde(default)]
    pub difficulty: f64,
    #[serde(default)]
    pub networksolps: f64,
}

/// Client for interacting with a node's RPC interface
pub struct NodeClient {
    /// Configuration for the node connection
    config: NodeConfig,
    /// HTTP client for making RPC requests
    client: Client,
    /// Monotonic JSON-RPC request id
    request_id: AtomicU64,
}

impl NodeClient {
    /// Creates a new NodeClient with the given configuration
    ///
    /// # Arguments
    /// * `config` - Node configuration containing RPC connection details
    ///
    /// # Returns
    /// * `Err(MinerError::UrlError)` if `rpc_url` does not parse
    pub fn new(config: NodeConfig) -> Result<Self, MinerError> {
        Url::parse(&config.rpc_url)?;
        let client = Client::builder()
            .connect_timeout(CONNECT_TIMEOUT)
            .timeout(REQUEST_TIMEOUT)
            .build()?;
        Ok(NodeClient {
            config,
            client,
            request_id: AtomicU64::new(0),
        })
    }

    pub fn url(&self) -> &str {
        &self.config.rpc_url
    }

    /// Requests and parses a block template
    ///
    /// # Returns
    /// * `Ok(BlockTemplate)` - Validated template ready to mine
    /// * `Err(MinerError)` - Transport, RPC or template error
    pub async fn get_block_template(&self) -> Result<BlockTemplate, MinerError> {
        let result = self
            .rpc_call(
                "getblocktemplate",
                json!([{ "capabilities": TEMPLATE_CAPABILITIES }]),
            )
            .await?;
        BlockTemplate::parse(&result)
    }

    /// Submits a serialized block
    ///
    /// # Arguments
    /// * `block_hex` - Output of [`serialize_block`](crate::template::serialize_block)
    pub async fn submit_block(&self, block_hex: &str) -> Result<SubmitOutcome, MinerError> {
        let result = self.rpc_call("submitblock", json!([block_hex])).await?;
        Ok(SubmitOutcome::from_result(&result))
    }

    /// Chain name and tip height
    pub async fn get_blockchain_info(&self) -> Result<ChainInfo, MinerError> {
        let result = self.rpc_call("getblockchaininfo", json!([])).await?;
        Ok(serde_json::from_value(result)?)
    }

    /// Network difficulty and hashrate
    pub async fn get_mining_info(&self) -> Result<MiningInfo, MinerError> {
        let result = self.rpc_call("getmininginfo", json!([])).await?;
        Ok(serde_json::from_value(result)?)
    }

    /// Makes an RPC call to the node
    ///
    /// HTTP error statuses are not treated as failures by themselves: nodes
    /// report RPC errors as a JSON body on a 500 response.
    ///
    /// # Arguments
    /// * `method` - The RPC method to call
    /// * `params` - Positional parameters
    ///
    /// # Returns
    /// * `Ok(Value)` - The `result` member of the response
    /// * `Err(MinerError)` - Transport failure, non-null `error`, or no `result`
    pub async fn rpc_call(&self, method: &str, params: Value) -> Result<Value, MinerError> {
        let id = self.request_id.fetch_add(1, Ordering::Relaxed) + 1;
        let request = build_request(id, method, params);
        log::trace!("RPC request: {}", request);

        let response: Value = self
            .client
            .post(&self.config.rpc_url)
            .basic_auth(&self.config.rpc_user, Some(&self.config.rpc_password))
            .json(&request)
            .send()
            .await?
            .json()
            .await?;

        extract_result(method, response)
    }
}

/// JSON-RPC 1.0 request envelope
fn build_request(id: u64, method: &str, params: Value) -> Value {
    json!({
        "jsonrpc": "1.0",
        "id": id,
        "method": method,
        "params": params
    })
}

/// Returns `result`, or the node's error message
fn extract_result(method: &str, mut response: Value) -> Result<Value, MinerError> {
    let error = response.get("error").filter(|e| !e.is_null());
    if let Some(error) = error {
        let message = error
            .get("message")
            .and_then(Value::as_str)
            .map(str::to_string)
            .unwrap_or_else(|| error.to_string());
        log::warn!("RPC error from {}: {}", method, message);
        return Err(MinerError::RpcError(message));
    }

    match response.get_mut("result") {
        Some(result) => Ok(result.take()),
        None => Err(MinerError::RpcError(format!(
            "{}: response has no result",
            method
        ))),
    }
}
