//! Core chain primitives
//!
//! This module contains the building blocks every other layer speaks in:
//! - Addresses (EIP-55 checksummed)
//! - Ether/wei unit conversion
//! - RLP encoding
//! - Legacy EIP-155 transactions
//! - Gas limit policy

pub mod gas;
pub mod rlp;
pub mod transaction;
pub mod types;
pub mod units;

pub use gas::{FlatGasLimit, GasLimitPolicy, DEFAULT_GAS_LIMIT, TRANSFER_INTRINSIC_GAS};
pub use rlp::{RlpError, RlpItem, RlpStream};
pub use transaction::{LegacyTransaction, SignedTransaction, TransactionError};
pub use types::{Address, ParseError, ADDRESS_LENGTH};
pub use units::{format_ether, format_units, parse_ether, parse_units, wei_per_ether, ETHER_DECIMALS};

pub use primitive_types::U256;
