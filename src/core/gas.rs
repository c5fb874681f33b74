//! Gas limit policy
//!
//! The workflow asks a [`GasLimitPolicy`] for the gas limit of a transfer
//! instead of hardcoding it, so a simulation-based estimator can be dropped
//! in later. The only implementation today is a flat allowance.

use std::fmt;

/// Gas allowance used for plain value transfers
pub const DEFAULT_GAS_LIMIT: u64 = 300_000;

/// Gas cost of a plain transfer to an externally owned account
pub const TRANSFER_INTRINSIC_GAS: u64 = 21_000;

/// Source of the gas limit for new transfers
pub trait GasLimitPolicy: fmt::Debug + Send + Sync {
    fn gas_limit(&self) -> u64;
}

/// A fixed gas limit, regardless of the transaction
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FlatGasLimit(pub u64);

impl Default for FlatGasLimit {
    fn default() -> Self {
        Self(DEFAULT_GAS_LIMIT)
    }
}

impl GasLimitPolicy for FlatGasLimit {
    fn gas_limit(&self) -> u64 {
        self.0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_flat_limit() {
        assert_eq!(FlatGasLimit::default().gas_limit(), DEFAULT_GAS_LIMIT);
    }

    #[test]
    fn test_flat_limit_covers_a_transfer() {
        let policy: Box<dyn GasLimitPolicy> = Box::new(FlatGasLimit::default());
        assert!(policy.gas_limit() >= TRANSFER_INTRINSIC_GAS);
    }
}
