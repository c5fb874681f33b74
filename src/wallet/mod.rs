//! Wallet session and the transfer workflow built on it

pub mod session;
pub mod transfer;

pub use session::{ExitSignal, SessionError, WalletConfig, WalletSession, DEFAULT_TIMEOUT};
pub use transfer::{TransferIntent, TransferStage};
