//! Transfer workflow
//!
//! A transfer moves through `Drafted → NonceResolved → GasResolved →
//! ChainResolved → Signed`. Each stage is its own type and every transition
//! consumes the previous value, so a stage can't be skipped or repeated and
//! only a signed intent exposes a raw transaction. Broadcasting is left to
//! the caller.

use super::session::{SessionError, WalletSession};
use crate::core::{Address, LegacyTransaction, SignedTransaction, U256};
use crate::keystore::{Account, KeyVault};
use crate::node::NodeClient;

/// Where an intent is in the workflow
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum TransferStage {
    Drafted,
    NonceResolved,
    GasResolved,
    ChainResolved,
    Signed,
}

/// Marker trait implemented by each stage type
pub trait Stage {
    const STAGE: TransferStage;
}

#[derive(Debug, Clone)]
pub struct Drafted;

#[derive(Debug, Clone)]
pub struct NonceResolved {
    nonce: u64,
}

#[derive(Debug, Clone)]
pub struct GasResolved {
    nonce: u64,
    gas_limit: u64,
    gas_price: U256,
}

#[derive(Debug, Clone)]
pub struct ChainResolved {
    nonce: u64,
    gas_limit: u64,
    gas_price: U256,
    chain_id: u64,
}

#[derive(Debug, Clone)]
pub struct Signed {
    signed: SignedTransaction,
}

impl Stage for Drafted {
    const STAGE: TransferStage = TransferStage::Drafted;
}
impl Stage for NonceResolved {
    const STAGE: TransferStage = TransferStage::NonceResolved;
}
impl Stage for GasResolved {
    const STAGE: TransferStage = TransferStage::GasResolved;
}
impl Stage for ChainResolved {
    const STAGE: TransferStage = TransferStage::ChainResolved;
}
impl Stage for Signed {
    const STAGE: TransferStage = TransferStage::Signed;
}

/// A value transfer from a vault account, at stage `S`
#[derive(Debug, Clone)]
pub struct TransferIntent<S: Stage> {
    from: Account,
    to: Address,
    value: U256,
    stage: S,
}

impl<S: Stage> TransferIntent<S> {
    pub fn stage(&self) -> TransferStage {
        S::STAGE
    }

    pub fn from(&self) -> &Account {
        &self.from
    }

    pub fn to(&self) -> &Address {
        &self.to
    }

    /// Amount in wei
    pub fn value(&self) -> U256 {
        self.value
    }

    fn advance<T: Stage>(self, stage: T) -> TransferIntent<T> {
        log::debug!(
            "Transfer {} -> {}: {:?} -> {:?}",
            self.from.address,
            self.to,
            S::STAGE,
            T::STAGE
        );
        TransferIntent {
            from: self.from,
            to: self.to,
            value: self.value,
            stage,
        }
    }
}

impl TransferIntent<Drafted> {
    pub fn draft(from: Account, to: Address, value: U256) -> Self {
        Self {
            from,
            to,
            value,
            stage: Drafted,
        }
    }

    pub async fn resolve_nonce<N: NodeClient>(
        self,
        session: &WalletSession<N>,
    ) -> Result<TransferIntent<NonceResolved>, SessionError> {
        let nonce = session.nonce_at(&self.from.address).await?;
        Ok(self.advance(NonceResolved { nonce }))
    }
}

impl TransferIntent<NonceResolved> {
    pub fn nonce(&self) -> u64 {
        self.stage.nonce
    }

    pub async fn resolve_gas<N: NodeClient>(
        self,
        session: &WalletSession<N>,
    ) -> Result<TransferIntent<GasResolved>, SessionError> {
        let gas_price = session.recommended_gas_price().await?;
        let gas_limit = session.recommended_gas_limit();
        let nonce = self.stage.nonce;
        Ok(self.advance(GasResolved {
            nonce,
            gas_limit,
            gas_price,
        }))
    }
}

impl TransferIntent<GasResolved> {
    pub async fn resolve_chain<N: NodeClient>(
        self,
        session: &WalletSession<N>,
    ) -> Result<TransferIntent<ChainResolved>, SessionError> {
        let chain_id = session.chain_id()?;
        let GasResolved {
            nonce,
            gas_limit,
            gas_price,
        } = self.stage.clone();
        Ok(self.advance(ChainResolved {
            nonce,
            gas_limit,
            gas_price,
            chain_id,
        }))
    }
}

impl TransferIntent<ChainResolved> {
    pub fn chain_id(&self) -> u64 {
        self.stage.chain_id
    }

    /// The unsigned transaction this intent will sign
    pub fn transaction(&self) -> LegacyTransaction {
        LegacyTransaction {
            nonce: self.stage.nonce,
            gas_price: self.stage.gas_price,
            gas_limit: self.stage.gas_limit,
            to: Some(self.to),
            value: self.value,
            data: Vec::new(),
        }
    }

    /// Value plus the most gas the transaction can burn
    pub fn max_cost(&self) -> Result<U256, SessionError> {
        self.stage
            .gas_price
            .checked_mul(U256::from(self.stage.gas_limit))
            .and_then(|fee| fee.checked_add(self.value))
            .ok_or_else(|| SessionError::InvalidTransfer("cost overflows 256 bits".into()))
    }

    /// Unlock the sender's key and sign
    pub fn sign(
        self,
        vault: &KeyVault,
        passphrase: &str,
    ) -> Result<TransferIntent<Signed>, SessionError> {
        let signed =
            vault.sign_transaction(&self.from, passphrase, self.transaction(), self.stage.chain_id)?;
        Ok(self.advance(Signed { signed }))
    }
}

impl TransferIntent<Signed> {
    pub fn signed(&self) -> &SignedTransaction {
        &self.stage.signed
    }

    pub fn into_signed(self) -> SignedTransaction {
        self.stage.signed
    }
}

impl<N: NodeClient> WalletSession<N> {
    /// Run the whole workflow for a transfer of `value` wei from a vault
    /// account to `to`, failing before signing if the sender can't cover
    /// value plus maximum fee
    pub async fn prepare_transfer(
        &self,
        from: &Address,
        to: Address,
        value: U256,
        passphrase: &str,
    ) -> Result<SignedTransaction, SessionError> {
        let account = self.vault().find_account(from)?;

        let intent = TransferIntent::draft(account, to, value)
            .resolve_nonce(self)
            .await?
            .resolve_gas(self)
            .await?
            .resolve_chain(self)
            .await?;

        let need = intent.max_cost()?;
        let have = self.balance_at(from).await?;
        if have < need {
            return Err(SessionError::InsufficientFunds { have, need });
        }

        let signed = intent.sign(self.vault(), passphrase)?.into_signed();
        log::info!(
            "Signed transfer of {} wei from {} to {} (tx 0x{})",
            value,
            from,
            to,
            hex::encode(signed.hash())
        );
        Ok(signed)
    }
}
