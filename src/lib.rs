//! ethwallet: a command-line Ethereum wallet in Rust
//!
//! This crate provides:
//! - Encrypted local key storage (Web3 Secret Storage v3 key files)
//! - A passphrase strength policy for every key it writes
//! - JSON-RPC access to an Ethereum node over HTTP
//! - Deadline-bound wallet sessions with cooperative cancellation
//! - A staged transfer workflow producing EIP-155 signed transactions
//!
//! # Example
//!
//! ```no_run
//! use ethwallet::core::parse_ether;
//! use ethwallet::wallet::{WalletConfig, WalletSession};
//!
//! # async fn run() -> Result<(), Box<dyn std::error::Error>> {
//! let session = WalletSession::open(&WalletConfig::default()).await?;
//! let from = session.vault().create_account("Correct1!")?.address;
//!
//! let to = "0x3535353535353535353535353535353535353535".parse()?;
//! let signed = session
//!     .prepare_transfer(&from, to, parse_ether("0.1")?, "Correct1!")
//!     .await?;
//! println!("{}", signed.raw_hex());
//!
//! session.close();
//! session.await_exit().await;
//! # Ok(())
//! # }
//! ```

pub mod cli;
pub mod core;
pub mod crypto;
pub mod keystore;
pub mod node;
pub mod wallet;

pub use crate::core::{Address, LegacyTransaction, SignedTransaction, U256};
pub use crypto::KeyPair;
pub use keystore::{Account, KeyVault};
pub use node::{NodeClient, RpcConnector};
pub use wallet::{SessionError, TransferIntent, WalletConfig, WalletSession};
