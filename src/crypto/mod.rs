//! Cryptographic utilities
//!
//! This module provides:
//! - Keccak-256 hashing
//! - ECDSA key management (secp256k1) with public key recovery

pub mod hash;
pub mod keys;

pub use hash::{keccak256, keccak256_concat};
pub use keys::{public_key_to_address, recover_address, KeyError, KeyPair, Signature};
