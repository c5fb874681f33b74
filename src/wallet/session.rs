//! Wallet session
//!
//! One session per invocation: it owns the node connector and the key vault,
//! bounds every network call by a deadline fixed when the session opens, and
//! hands out an exit signal that fires once the session is closed.

use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;

use primitive_types::U256;
use thiserror::Error;
use tokio::sync::watch;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;

use crate::core::{Address, FlatGasLimit, GasLimitPolicy, SignedTransaction, DEFAULT_GAS_LIMIT};
use crate::keystore::{KeyVault, ScryptConfig, VaultError};
use crate::node::{BlockTag, NodeClient, NodeError, RpcConnector, SyncProgress, DEFAULT_NODE_ADDR};

/// Deadline applied to a session when none is configured
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(30);

/// Session-related errors
#[derive(Error, Debug)]
pub enum SessionError {
    #[error("Cannot reach node: {0}")]
    Connection(String),
    #[error("Session deadline exceeded")]
    Timeout,
    #[error("Session closed")]
    Cancelled,
    #[error("Estimation failed: {0}")]
    Estimation(String),
    #[error("Node error: {0}")]
    Node(#[from] NodeError),
    #[error("Vault error: {0}")]
    Vault(#[from] VaultError),
    #[error("Node is syncing: block {current} of {highest}")]
    Syncing { current: u64, highest: u64 },
    #[error("Insufficient funds: have {have} wei, need {need} wei")]
    InsufficientFunds { have: U256, need: U256 },
    #[error("Invalid transfer: {0}")]
    InvalidTransfer(String),
}

/// Session configuration
#[derive(Debug, Clone)]
pub struct WalletConfig {
    /// JSON-RPC endpoint of the node
    pub node_addr: String,
    /// Directory holding encrypted key files
    pub keystore_dir: PathBuf,
    /// Deadline for all network calls of the session
    pub timeout: Duration,
    /// scrypt cost for key files the vault writes
    pub scrypt: ScryptConfig,
    /// Flat gas limit for transfers
    pub gas_limit: u64,
}

impl Default for WalletConfig {
    fn default() -> Self {
        Self {
            node_addr: DEFAULT_NODE_ADDR.to_string(),
            keystore_dir: PathBuf::from(".ethwallet/keystore"),
            timeout: DEFAULT_TIMEOUT,
            scrypt: ScryptConfig::STANDARD,
            gas_limit: DEFAULT_GAS_LIMIT,
        }
    }
}

/// Fires once; any number of tasks can wait on it, before or after it fires
#[derive(Debug, Clone)]
pub struct ExitSignal {
    tx: Arc<watch::Sender<bool>>,
}

impl ExitSignal {
    pub fn new() -> Self {
        let (tx, _rx) = watch::channel(false);
        Self { tx: Arc::new(tx) }
    }

    /// Fire the signal. Returns `false` if it had already fired.
    pub fn signal(&self) -> bool {
        self.tx.send_if_modified(|fired| {
            if *fired {
                false
            } else {
                *fired = true;
                true
            }
        })
    }

    pub fn is_signaled(&self) -> bool {
        *self.tx.borrow()
    }

    /// Resolve once the signal has fired
    pub async fn wait(&self) {
        let mut rx = self.tx.subscribe();
        // The sender lives in `self`, so this can't observe a closed channel
        let _ = rx.wait_for(|fired| *fired).await;
    }
}

impl Default for ExitSignal {
    fn default() -> Self {
        Self::new()
    }
}

/// A node connector and a key vault under one deadline-bound lifetime
pub struct WalletSession<N: NodeClient> {
    node: Mutex<Option<Arc<N>>>,
    vault: KeyVault,
    gas_policy: Box<dyn GasLimitPolicy>,
    /// Answer to the opening handshake
    chain_id: u64,
    deadline: Instant,
    cancel: CancellationToken,
    closed: AtomicBool,
    exit: ExitSignal,
}

impl WalletSession<RpcConnector> {
    /// Connect to `config.node_addr` and open the vault at
    /// `config.keystore_dir`
    pub async fn open(config: &WalletConfig) -> Result<Self, SessionError> {
        let node = RpcConnector::new(&config.node_addr)
            .map_err(|e| SessionError::Connection(e.to_string()))?;
        let vault = KeyVault::open(&config.keystore_dir, config.scrypt)?;
        let session = Self::with_node(node, vault, config.timeout)
            .await?
            .with_gas_policy(FlatGasLimit(config.gas_limit));
        log::info!("Connected to {}", config.node_addr);
        Ok(session)
    }
}

impl<N: NodeClient> WalletSession<N> {
    /// Start the deadline and check the node answers with its chain id
    pub async fn with_node(node: N, vault: KeyVault, timeout: Duration) -> Result<Self, SessionError> {
        let mut session = Self {
            node: Mutex::new(Some(Arc::new(node))),
            vault,
            gas_policy: Box::new(FlatGasLimit::default()),
            chain_id: 0,
            deadline: Instant::now() + timeout,
            cancel: CancellationToken::new(),
            closed: AtomicBool::new(false),
            exit: ExitSignal::new(),
        };

        let node = session.node()?;
        match session.bounded(node.chain_id()).await {
            Ok(chain_id) => {
                log::debug!("Handshake ok, chain id {}", chain_id);
                session.chain_id = chain_id;
            }
            Err(SessionError::Node(e)) => return Err(SessionError::Connection(e.to_string())),
            Err(e) => return Err(e),
        }

        Ok(session)
    }

    /// Replace the gas limit policy
    pub fn with_gas_policy(mut self, policy: impl GasLimitPolicy + 'static) -> Self {
        self.gas_policy = Box::new(policy);
        self
    }

    pub fn vault(&self) -> &KeyVault {
        &self.vault
    }

    /// Release the connector, cancel in-flight calls and fire the exit
    /// signal. Only the first call does anything; it returns `true`.
    pub fn close(&self) -> bool {
        if self.closed.swap(true, Ordering::SeqCst) {
            log::debug!("Session already closed");
            return false;
        }

        self.node
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .take();
        self.cancel.cancel();
        self.exit.signal();
        log::debug!("Session closed");
        true
    }

    pub fn is_closed(&self) -> bool {
        self.closed.load(Ordering::SeqCst)
    }

    /// Resolve once [`close`](Self::close) has run
    pub async fn await_exit(&self) {
        self.exit.wait().await
    }

    /// A handle other tasks can wait on
    pub fn exit_signal(&self) -> ExitSignal {
        self.exit.clone()
    }

    /// Next nonce for `address`: mined plus pending transactions
    pub async fn nonce_at(&self, address: &Address) -> Result<u64, SessionError> {
        let node = self.node()?;
        self.bounded(node.transaction_count(address, BlockTag::Pending))
            .await
            .map_err(as_estimation)
    }

    /// Gas limit for a new transfer, from the configured policy
    pub fn recommended_gas_limit(&self) -> u64 {
        self.gas_policy.gas_limit()
    }

    /// The node's gas price suggestion
    pub async fn recommended_gas_price(&self) -> Result<U256, SessionError> {
        let node = self.node()?;
        self.bounded(node.gas_price()).await.map_err(as_estimation)
    }

    /// Chain id reported by the handshake
    pub fn chain_id(&self) -> Result<u64, SessionError> {
        self.node()?;
        Ok(self.chain_id)
    }

    /// Latest balance in wei
    pub async fn balance_at(&self, address: &Address) -> Result<U256, SessionError> {
        let node = self.node()?;
        self.bounded(node.balance_at(address, BlockTag::Latest)).await
    }

    pub async fn sync_progress(&self) -> Result<Option<SyncProgress>, SessionError> {
        let node = self.node()?;
        self.bounded(node.sync_progress()).await
    }

    /// Fail with [`SessionError::Syncing`] unless the node is in sync
    pub async fn ensure_synced(&self) -> Result<(), SessionError> {
        match self.sync_progress().await? {
            None => Ok(()),
            Some(progress) => Err(SessionError::Syncing {
                current: progress.current_block,
                highest: progress.highest_block,
            }),
        }
    }

    /// Hand a signed transaction to the node, returning the reported hash
    pub async fn send_raw_transaction(
        &self,
        signed: &SignedTransaction,
    ) -> Result<[u8; 32], SessionError> {
        let node = self.node()?;
        let raw = signed.encode();
        let hash = self.bounded(node.send_raw_transaction(&raw)).await?;
        log::info!("Submitted transaction 0x{}", hex::encode(hash));
        Ok(hash)
    }

    fn node(&self) -> Result<Arc<N>, SessionError> {
        self.node
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
            .ok_or(SessionError::Cancelled)
    }

    /// Run a node call under the session deadline and cancellation
    async fn bounded<T, F>(&self, call: F) -> Result<T, SessionError>
    where
        F: std::future::Future<Output = Result<T, NodeError>>,
    {
        tokio::select! {
            biased;
            _ = self.cancel.cancelled() => Err(SessionError::Cancelled),
            result = tokio::time::timeout_at(self.deadline, call) => match result {
                Ok(outcome) => outcome.map_err(SessionError::from),
                Err(_) => Err(SessionError::Timeout),
            },
        }
    }
}

fn as_estimation(error: SessionError) -> SessionError {
    match error {
        SessionError::Node(e) => SessionError::Estimation(e.to_string()),
        other => other,
    }
}
