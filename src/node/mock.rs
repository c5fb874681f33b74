//! In-memory node for session and workflow tests

use super::{BlockTag, NodeClient, NodeError, SyncProgress};
use crate::core::{Address, U256};
use crate::crypto::keccak256;
use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use std::time::Duration;

#[derive(Debug, Default)]
struct State {
    chain_id: u64,
    gas_price: Option<U256>,
    balances: HashMap<Address, U256>,
    confirmed: HashMap<Address, u64>,
    pending: HashMap<Address, u64>,
    syncing: Option<SyncProgress>,
    unreachable: bool,
    delay: Option<Duration>,
    sent: Vec<Vec<u8>>,
}

/// Scriptable node: each setter changes what later queries return.
/// Clones share state, so a test can keep a handle to a node it gave away.
#[derive(Debug, Default, Clone)]
pub struct MockNode {
    state: Arc<Mutex<State>>,
}

impl MockNode {
    pub fn new(chain_id: u64) -> Self {
        let node = Self::default();
        node.state.lock().unwrap().chain_id = chain_id;
        node
    }

    pub fn with_gas_price(self, price: u64) -> Self {
        self.state.lock().unwrap().gas_price = Some(U256::from(price));
        self
    }

    pub fn with_balance(self, address: Address, wei: U256) -> Self {
        self.state.lock().unwrap().balances.insert(address, wei);
        self
    }

    /// `confirmed` mined transactions plus `pending` ones in the pool
    pub fn with_transactions(self, address: Address, confirmed: u64, pending: u64) -> Self {
        {
            let mut state = self.state.lock().unwrap();
            state.confirmed.insert(address, confirmed);
            state.pending.insert(address, pending);
        }
        self
    }

    pub fn with_syncing(self, progress: SyncProgress) -> Self {
        self.state.lock().unwrap().syncing = Some(progress);
        self
    }

    /// Every call fails as if the endpoint refused the connection
    pub fn unreachable(self) -> Self {
        self.state.lock().unwrap().unreachable = true;
        self
    }

    /// Every call sleeps this long before answering
    pub fn with_delay(self, delay: Duration) -> Self {
        self.state.lock().unwrap().delay = Some(delay);
        self
    }

    pub fn sent(&self) -> Vec<Vec<u8>> {
        self.state.lock().unwrap().sent.clone()
    }

    async fn enter(&self) -> Result<(), NodeError> {
        let (unreachable, delay) = {
            let state = self.state.lock().unwrap();
            (state.unreachable, state.delay)
        };
        if let Some(delay) = delay {
            tokio::time::sleep(delay).await;
        }
        if unreachable {
            return Err(NodeError::Connection("connection refused".into()));
        }
        Ok(())
    }
}

#[async_trait]
impl NodeClient for MockNode {
    async fn chain_id(&self) -> Result<u64, NodeError> {
        self.enter().await?;
        Ok(self.state.lock().unwrap().chain_id)
    }

    async fn balance_at(&self, address: &Address, _block: BlockTag) -> Result<U256, NodeError> {
        self.enter().await?;
        let state = self.state.lock().unwrap();
        Ok(state.balances.get(address).copied().unwrap_or_default())
    }

    async fn transaction_count(
        &self,
        address: &Address,
        block: BlockTag,
    ) -> Result<u64, NodeError> {
        self.enter().await?;
        let state = self.state.lock().unwrap();
        let confirmed = state.confirmed.get(address).copied().unwrap_or(0);
        let pending = state.pending.get(address).copied().unwrap_or(0);
        Ok(match block {
            BlockTag::Pending => confirmed + pending,
            _ => confirmed,
        })
    }

    async fn gas_price(&self) -> Result<U256, NodeError> {
        self.enter().await?;
        self.state
            .lock()
            .unwrap()
            .gas_price
            .ok_or_else(|| NodeError::Rpc {
                code: -32000,
                message: "fee history unavailable".into(),
            })
    }

    async fn sync_progress(&self) -> Result<Option<SyncProgress>, NodeError> {
        self.enter().await?;
        Ok(self.state.lock().unwrap().syncing.clone())
    }

    async fn send_raw_transaction(&self, raw: &[u8]) -> Result<[u8; 32], NodeError> {
        self.enter().await?;
        self.state.lock().unwrap().sent.push(raw.to_vec());
        Ok(keccak256(raw))
    }
}
