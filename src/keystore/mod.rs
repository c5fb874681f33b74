//! Key vault: encrypted local key material
//!
//! - Passphrase strength policy
//! - Web3 Secret Storage v3 key files
//! - A directory-backed vault that creates, imports, exports, finds and
//!   signs with accounts

pub mod keyfile;
pub mod passphrase;
pub mod vault;

use crate::core::{Address, TransactionError};
use thiserror::Error;

pub use keyfile::{KeyFile, ScryptConfig, KEYFILE_VERSION};
pub use passphrase::{check_passphrase, verify, PassphraseIssue, MIN_PASSPHRASE_LENGTH};
pub use vault::{Account, KeyVault};

/// Vault-related errors
#[derive(Error, Debug)]
pub enum VaultError {
    #[error("Weak passphrase: {0}")]
    WeakPassphrase(#[from] PassphraseIssue),
    #[error("Invalid key file: {0}")]
    InvalidKeyFile(String),
    #[error("Could not decrypt key: wrong passphrase")]
    Authentication,
    #[error("Account not found: {0}")]
    NotFound(Address),
    #[error("Account already exists: {0}")]
    AlreadyExists(Address),
    #[error("Signing failed: {0}")]
    Signing(#[from] TransactionError),
    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),
    #[error("Serialization error: {0}")]
    SerializationError(#[from] serde_json::Error),
}
