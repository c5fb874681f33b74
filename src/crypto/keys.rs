//! ECDSA key management
//!
//! Provides key pair generation, recoverable signing and public key
//! recovery on the secp256k1 curve, plus Ethereum address derivation.

use rand::rngs::OsRng;
use secp256k1::ecdsa::{RecoverableSignature, RecoveryId};
use secp256k1::{Message, PublicKey, Secp256k1, SecretKey};
use thiserror::Error;
use zeroize::Zeroizing;

use super::hash::keccak256;
use crate::core::Address;

/// Errors that can occur during key operations
#[derive(Error, Debug)]
pub enum KeyError {
    #[error("Invalid private key")]
    InvalidPrivateKey,
    #[error("Invalid signature")]
    InvalidSignature,
    #[error("Secp256k1 error: {0}")]
    Secp256k1Error(#[from] secp256k1::Error),
}

/// A recoverable ECDSA signature split into its components
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Signature {
    pub r: [u8; 32],
    pub s: [u8; 32],
    /// Recovery id, 0 or 1
    pub recovery_id: u8,
}

impl Signature {
    fn to_recoverable(self) -> Result<RecoverableSignature, KeyError> {
        let recovery_id =
            RecoveryId::from_i32(i32::from(self.recovery_id)).map_err(|_| KeyError::InvalidSignature)?;
        let mut compact = [0u8; 64];
        compact[..32].copy_from_slice(&self.r);
        compact[32..].copy_from_slice(&self.s);
        RecoverableSignature::from_compact(&compact, recovery_id)
            .map_err(|_| KeyError::InvalidSignature)
    }
}

/// A key pair consisting of a private key and its corresponding public key
#[derive(Clone)]
pub struct KeyPair {
    secret_key: SecretKey,
    public_key: PublicKey,
}

impl KeyPair {
    /// Generate a new random key pair
    pub fn generate() -> Self {
        let secp = Secp256k1::new();
        let (secret_key, public_key) = secp.generate_keypair(&mut OsRng);
        Self {
            secret_key,
            public_key,
        }
    }

    /// Create a key pair from an existing secret key
    pub fn from_secret_key(secret_key: SecretKey) -> Self {
        let secp = Secp256k1::new();
        let public_key = PublicKey::from_secret_key(&secp, &secret_key);
        Self {
            secret_key,
            public_key,
        }
    }

    /// Create a key pair from raw private key bytes
    pub fn from_private_key_bytes(bytes: &[u8]) -> Result<Self, KeyError> {
        let secret_key = SecretKey::from_slice(bytes).map_err(|_| KeyError::InvalidPrivateKey)?;
        Ok(Self::from_secret_key(secret_key))
    }

    /// Raw private key bytes, wiped from memory on drop
    pub fn private_key_bytes(&self) -> Zeroizing<[u8; 32]> {
        Zeroizing::new(self.secret_key.secret_bytes())
    }

    /// Uncompressed public key as hex, without the 0x04 tag
    pub fn public_key_hex(&self) -> String {
        hex::encode(&self.public_key.serialize_uncompressed()[1..])
    }

    /// The account address controlled by this key
    pub fn address(&self) -> Address {
        public_key_to_address(&self.public_key)
    }

    /// Sign a 32-byte digest, producing a signature the public key can be
    /// recovered from
    pub fn sign_recoverable(&self, digest: &[u8; 32]) -> Result<Signature, KeyError> {
        let secp = Secp256k1::new();
        let message = Message::from_digest_slice(digest)?;
        let signature = secp.sign_ecdsa_recoverable(&message, &self.secret_key);
        let (recovery_id, compact) = signature.serialize_compact();

        let mut r = [0u8; 32];
        let mut s = [0u8; 32];
        r.copy_from_slice(&compact[..32]);
        s.copy_from_slice(&compact[32..]);

        Ok(Signature {
            r,
            s,
            recovery_id: recovery_id.to_i32() as u8,
        })
    }
}

/// Derive an address: the last 20 bytes of keccak256 over the uncompressed
/// public key without its 0x04 tag
pub fn public_key_to_address(public_key: &PublicKey) -> Address {
    let uncompressed = public_key.serialize_uncompressed();
    let hash = keccak256(&uncompressed[1..]);
    let mut bytes = [0u8; 20];
    bytes.copy_from_slice(&hash[12..]);
    Address::new(bytes)
}

/// Recover the signer's address from a digest and its signature
pub fn recover_address(digest: &[u8; 32], signature: &Signature) -> Result<Address, KeyError> {
    let secp = Secp256k1::new();
    let message = Message::from_digest_slice(digest)?;
    let recoverable = signature.to_recoverable()?;
    let public_key = secp
        .recover_ecdsa(&message, &recoverable)
        .map_err(|_| KeyError::InvalidSignature)?;
    Ok(public_key_to_address(&public_key))
}
