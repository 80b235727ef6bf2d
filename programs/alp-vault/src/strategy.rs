use std::fmt;

use serde::Serialize;

use crate::{error::Result, token::TokenLedger, types::Address};

/// Yield source a vault lends to.
///
/// Adapters are registered at runtime and may be upgraded by registering a
/// new version under a new address. Only the vault moves funds out of an
/// adapter, through `divest`.
pub trait Strategy: fmt::Debug + Send {
    fn address(&self) -> Address;

    fn version(&self) -> u32;

    /// Assets held by the strategy, as seen on the chain's ledger.
    fn total_assets(&self, ledger: &TokenLedger) -> u64 {
        ledger.balance_of(self.address())
    }

    /// Portion of `total_assets` that can be returned immediately.
    fn liquid_assets(&self, ledger: &TokenLedger) -> u64 {
        self.total_assets(ledger)
    }

    /// Sends up to `amount` back to `to` and returns what actually moved.
    fn divest(&mut self, ledger: &mut TokenLedger, to: Address, amount: u64) -> Result<u64> {
        let freed = amount.min(self.liquid_assets(ledger));
        if freed > 0 {
            ledger.transfer(self.address(), to, freed)?;
        }
        Ok(freed)
    }
}

/// Strategy that keeps lent funds at its own address.
///
/// Yield and losses are simulated by minting to or moving funds away from
/// that address before the strategy reports.
#[derive(Debug, Clone)]
pub struct HoldingStrategy {
    address: Address,
    version: u32,
    /// Amount that `divest` cannot touch, e.g. funds locked in a lending market.
    pub locked: u64,
}

impl HoldingStrategy {
    pub fn new(address: Address, version: u32) -> Self {
        Self {
            address,
            version,
            locked: 0,
        }
    }

    pub fn with_locked(mut self, locked: u64) -> Self {
        self.locked = locked;
        self
    }
}

impl Strategy for HoldingStrategy {
    fn address(&self) -> Address {
        self.address
    }

    fn version(&self) -> u32 {
        self.version
    }

    fn liquid_assets(&self, ledger: &TokenLedger) -> u64 {
        self.total_assets(ledger).saturating_sub(self.locked)
    }
}

/// Accounting the vault keeps per registered strategy.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct StrategyParams {
    pub debt_ratio: u64,
    pub min_debt_per_harvest: u64,
    pub max_debt_per_harvest: u64,
    pub current_debt: u64,
    pub total_gain: u64,
    pub total_loss: u64,
    pub last_report: u64,
    pub activation: u64,
}

#[derive(Debug)]
pub(crate) struct StrategyEntry {
    pub params: StrategyParams,
    pub adapter: Box<dyn Strategy>,
}

impl StrategyEntry {
    pub fn address(&self) -> Address {
        self.adapter.address()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_divest_is_capped_by_liquidity() {
        let vault = Address::derive("vault");
        let mut strategy = HoldingStrategy::new(Address::derive("strategy"), 1).with_locked(70);
        let mut ledger = TokenLedger::new("USDC", 6);
        ledger.mint(strategy.address(), 100).unwrap();

        let freed = strategy.divest(&mut ledger, vault, 50).unwrap();
        assert_eq!(freed, 30);
        assert_eq!(ledger.balance_of(vault), 30);
        assert_eq!(strategy.total_assets(&ledger), 70);
        assert_eq!(strategy.divest(&mut ledger, vault, 50).unwrap(), 0);
    }
}
