//! JSON-RPC over HTTP
//!
//! A thin JSON-RPC 2.0 client for the handful of `eth_*` methods the wallet
//! needs. Quantities come back as 0x-prefixed hex and are decoded here.

use super::{BlockTag, NodeClient, NodeError, SyncProgress};
use crate::core::{Address, U256};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

/// Endpoint used when none is given
pub const DEFAULT_NODE_ADDR: &str = "http://127.0.0.1:8545";

/// Time allowed to establish the TCP/TLS connection
const CONNECT_TIMEOUT: Duration = Duration::from_secs(10);

/// JSON-RPC 2.0 request
#[derive(Debug, Serialize)]
struct JsonRpcRequest<'a> {
    jsonrpc: &'static str,
    method: &'a str,
    params: Value,
    id: u64,
}

/// JSON-RPC 2.0 response
#[derive(Debug, Deserialize)]
struct JsonRpcResponse {
    #[serde(default)]
    result: Value,
    error: Option<JsonRpcError>,
}

#[derive(Debug, Deserialize)]
struct JsonRpcError {
    code: i64,
    message: String,
}

/// Connection to one node endpoint
#[derive(Debug)]
pub struct RpcConnector {
    client: reqwest::Client,
    url: reqwest::Url,
    next_id: AtomicU64,
}

impl RpcConnector {
    /// Bind to an `http://` or `https://` endpoint. No request is made yet.
    pub fn new(endpoint: &str) -> Result<Self, NodeError> {
        let url = reqwest::Url::parse(endpoint)
            .map_err(|e| NodeError::Connection(format!("bad endpoint {}: {}", endpoint, e)))?;
        if !matches!(url.scheme(), "http" | "https") {
            return Err(NodeError::Connection(format!(
                "unsupported scheme {} in {}",
                url.scheme(),
                endpoint
            )));
        }

        let client = reqwest::Client::builder()
            .connect_timeout(CONNECT_TIMEOUT)
            .build()
            .map_err(|e| NodeError::Connection(e.to_string()))?;

        Ok(Self {
            client,
            url,
            next_id: AtomicU64::new(1),
        })
    }

    async fn call(&self, method: &str, params: Value) -> Result<Value, NodeError> {
        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        let request = JsonRpcRequest {
            jsonrpc: "2.0",
            method,
            params,
            id,
        };
        log::debug!("-> {} #{} {}", method, id, request.params);

        let response = self
            .client
            .post(self.url.clone())
            .json(&request)
            .send()
            .await
            .map_err(|e| NodeError::Connection(e.to_string()))?;

        if !response.status().is_success() {
            return Err(NodeError::Connection(format!("HTTP {}", response.status())));
        }

        let body: JsonRpcResponse = response
            .json()
            .await
            .map_err(|e| NodeError::InvalidResponse(e.to_string()))?;

        if let Some(error) = body.error {
            log::debug!("<- {} #{} error {}", method, id, error.code);
            return Err(NodeError::Rpc {
                code: error.code,
                message: error.message,
            });
        }

        log::debug!("<- {} #{} {}", method, id, body.result);
        Ok(body.result)
    }
}

#[async_trait]
impl NodeClient for RpcConnector {
    async fn chain_id(&self) -> Result<u64, NodeError> {
        let result = self.call("eth_chainId", json!([])).await?;
        parse_u64(&result)
    }

    async fn balance_at(&self, address: &Address, block: BlockTag) -> Result<U256, NodeError> {
        let result = self
            .call("eth_getBalance", json!([address, block.to_param()]))
            .await?;
        parse_u256(&result)
    }

    async fn transaction_count(
        &self,
        address: &Address,
        block: BlockTag,
    ) -> Result<u64, NodeError> {
        let result = self
            .call("eth_getTransactionCount", json!([address, block.to_param()]))
            .await?;
        parse_u64(&result)
    }

    async fn gas_price(&self) -> Result<U256, NodeError> {
        let result = self.call("eth_gasPrice", json!([])).await?;
        parse_u256(&result)
    }

    async fn sync_progress(&self) -> Result<Option<SyncProgress>, NodeError> {
        let result = self.call("eth_syncing", json!([])).await?;
        parse_sync_progress(&result)
    }

    async fn send_raw_transaction(&self, raw: &[u8]) -> Result<[u8; 32], NodeError> {
        let result = self
            .call(
                "eth_sendRawTransaction",
                json!([format!("0x{}", hex::encode(raw))]),
            )
            .await?;
        parse_hash(&result)
    }
}

fn quantity_digits(value: &Value) -> Result<&str, NodeError> {
    let s = value
        .as_str()
        .ok_or_else(|| NodeError::InvalidResponse(format!("expected hex quantity, got {}", value)))?;
    let digits = s
        .strip_prefix("0x")
        .ok_or_else(|| NodeError::InvalidResponse(format!("missing 0x prefix: {}", s)))?;
    if digits.is_empty() {
        return Err(NodeError::InvalidResponse("empty quantity".into()));
    }
    Ok(digits)
}

fn parse_u64(value: &Value) -> Result<u64, NodeError> {
    let digits = quantity_digits(value)?;
    u64::from_str_radix(digits, 16)
        .map_err(|e| NodeError::InvalidResponse(format!("bad quantity {}: {}", digits, e)))
}

fn parse_u256(value: &Value) -> Result<U256, NodeError> {
    let digits = quantity_digits(value)?;
    if digits.len() > 64 {
        return Err(NodeError::InvalidResponse(format!("quantity too large: {}", digits)));
    }
    U256::from_str_radix(digits, 16)
        .map_err(|e| NodeError::InvalidResponse(format!("bad quantity {}: {:?}", digits, e)))
}

fn parse_sync_progress(value: &Value) -> Result<Option<SyncProgress>, NodeError> {
    if value == &Value::Bool(false) {
        return Ok(None);
    }
    let field = |name: &str| -> Result<u64, NodeError> {
        parse_u64(value.get(name).ok_or_else(|| {
            NodeError::InvalidResponse(format!("sync status missing {}", name))
        })?)
    };
    let optional = |name: &str| -> Result<Option<u64>, NodeError> {
        value.get(name).filter(|v| !v.is_null()).map(parse_u64).transpose()
    };

    Ok(Some(SyncProgress {
        starting_block: field("startingBlock")?,
        current_block: field("currentBlock")?,
        highest_block: field("highestBlock")?,
        pulled_states: optional("pulledStates")?,
        known_states: optional("knownStates")?,
    }))
}

fn parse_hash(value: &Value) -> Result<[u8; 32], NodeError> {
    let digits = quantity_digits(value)?;
    let bytes = hex::decode(digits)
        .map_err(|e| NodeError::InvalidResponse(format!("bad hash {}: {}", digits, e)))?;
    bytes
        .try_into()
        .map_err(|_| NodeError::InvalidResponse(format!("hash is not 32 bytes: {}", digits)))
}
