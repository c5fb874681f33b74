//! Legacy value-transfer transactions
//!
//! Signing follows EIP-155: the digest covers
//! `rlp([nonce, gasPrice, gasLimit, to, value, data, chainId, 0, 0])` and the
//! chain id is folded into `v` as `recovery_id + 35 + 2 * chainId`, so a
//! signature for one network can't be replayed on another.

use super::rlp::{self, RlpError, RlpStream};
use super::types::Address;
use crate::crypto::{keccak256, recover_address, KeyError, KeyPair, Signature};
use primitive_types::U256;
use thiserror::Error;

// =============================================================================
// Constants
// =============================================================================

/// Offset added to `v` for replay-protected signatures
pub const EIP155_V_OFFSET: u64 = 35;

/// `v` values of pre-EIP-155 signatures
pub const LEGACY_V_OFFSET: u64 = 27;

/// Number of RLP fields in a signed legacy transaction
const SIGNED_FIELD_COUNT: usize = 9;

// =============================================================================
// Error Types
// =============================================================================

/// Transaction-related errors
#[derive(Error, Debug)]
pub enum TransactionError {
    #[error("RLP error: {0}")]
    Rlp(#[from] RlpError),
    #[error("Invalid transaction: {0}")]
    InvalidTransaction(String),
    #[error("Invalid signature")]
    InvalidSignature,
    #[error("Crypto error: {0}")]
    CryptoError(#[from] KeyError),
}

// =============================================================================
// Unsigned Transaction
// =============================================================================

/// An unsigned legacy transaction
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LegacyTransaction {
    pub nonce: u64,
    pub gas_price: U256,
    pub gas_limit: u64,
    /// `None` creates a contract
    pub to: Option<Address>,
    pub value: U256,
    pub data: Vec<u8>,
}

impl LegacyTransaction {
    fn append_body(&self, stream: &mut RlpStream) {
        stream
            .append_u64(self.nonce)
            .append_u256(&self.gas_price)
            .append_u64(self.gas_limit);
        match &self.to {
            Some(to) => stream.append_bytes(to.as_bytes()),
            None => stream.append_bytes(&[]),
        };
        stream.append_u256(&self.value).append_bytes(&self.data);
    }

    /// The EIP-155 digest a signer commits to
    pub fn signing_hash(&self, chain_id: u64) -> [u8; 32] {
        let mut stream = RlpStream::new();
        self.append_body(&mut stream);
        stream.append_u64(chain_id).append_u64(0).append_u64(0);
        keccak256(&stream.finish())
    }

    /// Sign for `chain_id` with `key`
    pub fn sign(self, key: &KeyPair, chain_id: u64) -> Result<SignedTransaction, TransactionError> {
        let signature = key.sign_recoverable(&self.signing_hash(chain_id))?;
        let v = u64::from(signature.recovery_id)
            .checked_add(EIP155_V_OFFSET)
            .and_then(|v| chain_id.checked_mul(2).and_then(|c| c.checked_add(v)))
            .ok_or_else(|| TransactionError::InvalidTransaction("chain id too large".into()))?;

        Ok(SignedTransaction {
            tx: self,
            v,
            r: U256::from_big_endian(&signature.r),
            s: U256::from_big_endian(&signature.s),
        })
    }
}

// =============================================================================
// Signed Transaction
// =============================================================================

/// A signed legacy transaction, ready for `eth_sendRawTransaction`
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SignedTransaction {
    tx: LegacyTransaction,
    v: u64,
    r: U256,
    s: U256,
}

impl SignedTransaction {
    /// The signed fields
    pub fn transaction(&self) -> &LegacyTransaction {
        &self.tx
    }

    pub fn v(&self) -> u64 {
        self.v
    }

    /// Chain id folded into `v`, or `None` for a pre-EIP-155 signature
    pub fn chain_id(&self) -> Option<u64> {
        if self.v >= EIP155_V_OFFSET {
            Some((self.v - EIP155_V_OFFSET) / 2)
        } else {
            None
        }
    }

    /// RLP encoding of the signed transaction
    pub fn encode(&self) -> Vec<u8> {
        let mut stream = RlpStream::new();
        self.tx.append_body(&mut stream);
        stream
            .append_u64(self.v)
            .append_u256(&self.r)
            .append_u256(&self.s);
        stream.finish()
    }

    /// 0x-prefixed hex of the raw encoding
    pub fn raw_hex(&self) -> String {
        format!("0x{}", hex::encode(self.encode()))
    }

    /// Transaction hash as the network reports it
    pub fn hash(&self) -> [u8; 32] {
        keccak256(&self.encode())
    }

    /// Parse a raw signed legacy transaction
    pub fn decode(raw: &[u8]) -> Result<Self, TransactionError> {
        let item = rlp::decode(raw)?;
        let fields = item.as_list()?;
        if fields.len() != SIGNED_FIELD_COUNT {
            return Err(TransactionError::InvalidTransaction(format!(
                "expected {} fields, got {}",
                SIGNED_FIELD_COUNT,
                fields.len()
            )));
        }

        let to = match fields[3].as_bytes()? {
            [] => None,
            bytes => Some(Address::from_slice(bytes).map_err(|e| {
                TransactionError::InvalidTransaction(e.to_string())
            })?),
        };

        let tx = LegacyTransaction {
            nonce: fields[0].as_u64()?,
            gas_price: fields[1].as_u256()?,
            gas_limit: fields[2].as_u64()?,
            to,
            value: fields[4].as_u256()?,
            data: fields[5].as_bytes()?.to_vec(),
        };

        Ok(Self {
            tx,
            v: fields[6].as_u64()?,
            r: fields[7].as_u256()?,
            s: fields[8].as_u256()?,
        })
    }

    /// Recover the address that signed this transaction
    pub fn recover_sender(&self) -> Result<Address, TransactionError> {
        let (digest, recovery) = match self.chain_id() {
            Some(chain_id) => (
                self.tx.signing_hash(chain_id),
                self.v - EIP155_V_OFFSET - 2 * chain_id,
            ),
            None => {
                let recovery = self
                    .v
                    .checked_sub(LEGACY_V_OFFSET)
                    .ok_or(TransactionError::InvalidSignature)?;
                (self.unprotected_hash(), recovery)
            }
        };

        if recovery > 1 {
            return Err(TransactionError::InvalidSignature);
        }

        let mut signature = Signature {
            r: [0u8; 32],
            s: [0u8; 32],
            recovery_id: recovery as u8,
        };
        self.r.to_big_endian(&mut signature.r);
        self.s.to_big_endian(&mut signature.s);

        Ok(recover_address(&digest, &signature)?)
    }

    fn unprotected_hash(&self) -> [u8; 32] {
        let mut stream = RlpStream::new();
        self.tx.append_body(&mut stream);
        keccak256(&stream.finish())
    }
}

// =============================================================================
// Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    fn eip155_example() -> LegacyTransaction {
        LegacyTransaction {
            nonce: 9,
            gas_price: U256::from(20_000_000_000u64),
            gas_limit: 21_000,
            to: Some("0x3535353535353535353535353535353535353535".parse().unwrap()),
            value: U256::exp10(18),
            data: Vec::new(),
        }
    }

    #[test]
    fn test_eip155_signing_hash() {
        // Example transaction from EIP-155
        let hash = eip155_example().signing_hash(1);
        assert_eq!(
            hex::encode(hash),
            "daf5a779ae972f972197303d7b574746c7ef83eadac0f2791ad23db92e4c8e53"
        );
    }

    #[test]
    fn test_eip155_known_signature() {
        let key = KeyPair::from_private_key_bytes(&[0x46; 32]).unwrap();
        let signed = eip155_example().sign(&key, 1).unwrap();
        assert_eq!(
            signed.raw_hex(),
            "0xf86c098504a817c800825208943535353535353535353535353535353535353535880de0b6b3a76400008025a028ef61340bd939bc2195fe537567866003e1a15d3c71ff63e1590620aa636276a067cbe9d8997f761aecb703304b3800ccf555c9f3dc64214b297fb1966a3b6d83"
        );
    }

    #[test]
    fn test_sign_decode_recover() {
        let key = KeyPair::generate();
        let tx = LegacyTransaction {
            nonce: 5,
            gas_price: U256::from(2u64),
            gas_limit: 300_000,
            to: Some(KeyPair::generate().address()),
            value: U256::from(12_345u64),
            data: Vec::new(),
        };

        let signed = tx.clone().sign(&key, 1).unwrap();
        let decoded = SignedTransaction::decode(&signed.encode()).unwrap();

        assert_eq!(decoded, signed);
        assert_eq!(decoded.transaction(), &tx);
        assert_eq!(decoded.chain_id(), Some(1));
        assert_eq!(decoded.recover_sender().unwrap(), key.address());
    }

    #[test]
    fn test_chain_id_bound_into_v() {
        let key = KeyPair::generate();
        let signed = eip155_example().sign(&key, 1337).unwrap();
        assert!(signed.v() == 1337 * 2 + 35 || signed.v() == 1337 * 2 + 36);
        assert_eq!(signed.chain_id(), Some(1337));
        assert_eq!(signed.recover_sender().unwrap(), key.address());
    }

    #[test]
    fn test_decode_rejects_wrong_shape() {
        let mut stream = RlpStream::new();
        stream.append_u64(1).append_u64(2);
        assert!(matches!(
            SignedTransaction::decode(&stream.finish()),
            Err(TransactionError::InvalidTransaction(_))
        ));
        assert!(matches!(
            SignedTransaction::decode(&[0x01]),
            Err(TransactionError::Rlp(RlpError::ExpectedList))
        ));
    }
}
