//! Node connector
//!
//! The wallet talks to a remote Ethereum node through the [`NodeClient`]
//! trait. [`RpcConnector`] implements it over JSON-RPC/HTTP; tests use an
//! in-memory node.

pub mod rpc;

#[cfg(test)]
pub mod mock;

use crate::core::{Address, U256};
use async_trait::async_trait;
use thiserror::Error;

pub use rpc::{RpcConnector, DEFAULT_NODE_ADDR};

/// Node-related errors
#[derive(Error, Debug)]
pub enum NodeError {
    #[error("Connection error: {0}")]
    Connection(String),
    #[error("RPC error {code}: {message}")]
    Rpc { code: i64, message: String },
    #[error("Invalid response: {0}")]
    InvalidResponse(String),
}

/// Block to evaluate a state query against
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BlockTag {
    Latest,
    /// Latest block plus transactions still in the node's pool
    Pending,
}

impl BlockTag {
    /// JSON-RPC parameter form
    pub fn to_param(self) -> String {
        match self {
            BlockTag::Latest => "latest".to_string(),
            BlockTag::Pending => "pending".to_string(),
        }
    }
}

/// Progress of a node that is still catching up with the network
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SyncProgress {
    pub starting_block: u64,
    pub current_block: u64,
    pub highest_block: u64,
    pub pulled_states: Option<u64>,
    pub known_states: Option<u64>,
}

/// Chain queries and transaction submission against a remote node
#[async_trait]
pub trait NodeClient: Send + Sync {
    /// Replay-protection chain id
    async fn chain_id(&self) -> Result<u64, NodeError>;

    /// Balance in wei
    async fn balance_at(&self, address: &Address, block: BlockTag) -> Result<U256, NodeError>;

    /// Number of transactions sent from `address`; at [`BlockTag::Pending`]
    /// this includes the ones not yet mined
    async fn transaction_count(&self, address: &Address, block: BlockTag)
        -> Result<u64, NodeError>;

    /// The node's suggested gas price in wei
    async fn gas_price(&self) -> Result<U256, NodeError>;

    /// `None` once the node is in sync
    async fn sync_progress(&self) -> Result<Option<SyncProgress>, NodeError>;

    /// Submit a raw signed transaction, returning its hash
    async fn send_raw_transaction(&self, raw: &[u8]) -> Result<[u8; 32], NodeError>;
}
