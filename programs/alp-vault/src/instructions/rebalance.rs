use serde::Serialize;

use crate::{
    error::{Result, VaultError},
    math::{mul_div, Rounding},
    state::L2Vault,
    token::TokenLedger,
};

/// What L2 does after learning L1's TVL.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case", tag = "action", content = "amount")]
pub enum RebalanceAction {
    None,
    RequestFromL1(u64),
    TransferToL1(u64),
}

impl L2Vault {
    /// Records a TVL report from L1.
    ///
    /// A set `received` flag acknowledges the last L2 -> L1 transfer and
    /// releases the transfer lock. Returns whether a lock was released.
    pub fn record_l1_tvl(&mut self, tvl: u64, received: bool, block: u64) -> bool {
        let acknowledged = received && self.lock.acknowledge_transfer_to_l1();
        if acknowledged {
            self.in_transit_to_l1 = 0;
        }
        self.l1_tvl = tvl;
        self.last_tvl_report_block = block;
        self.sync_other_chain_tvl();
        acknowledged
    }

    /// Splits combined TVL `l1_ratio : l2_ratio` and picks the direction funds should move.
    ///
    /// expectedL1 = (l1TVL + l2TVL) × l1Ratio / (l1Ratio + l2Ratio). Imbalances
    /// below `rebalance_delta` (and zero) are left alone.
    pub fn plan_rebalance(&self, ledger: &TokenLedger, l1_tvl: u64) -> Result<RebalanceAction> {
        let l2_tvl = self.vault.vault_tvl(ledger)?;
        let total = l1_tvl.checked_add(l2_tvl).ok_or(VaultError::MathOverflow)?;
        let parts = self
            .l1_ratio
            .checked_add(self.l2_ratio)
            .ok_or(VaultError::MathOverflow)?;
        let expected_l1 = mul_div(total, self.l1_ratio, parts, Rounding::Floor)?;
        let threshold = self.rebalance_delta.max(1);

        let action = if l1_tvl > expected_l1 && l1_tvl - expected_l1 >= threshold {
            RebalanceAction::RequestFromL1(l1_tvl - expected_l1)
        } else if expected_l1 > l1_tvl && expected_l1 - l1_tvl >= threshold {
            RebalanceAction::TransferToL1(expected_l1 - l1_tvl)
        } else {
            RebalanceAction::None
        };
        Ok(action)
    }

    /// Books an L1 -> L2 transfer cleared by the escrow.
    pub fn record_funds_from_l1(&mut self, amount: u64) -> Result<()> {
        self.lock.complete_request_from_l1()?;
        self.l1_tvl = self.l1_tvl.saturating_sub(amount);
        self.sync_other_chain_tvl();
        Ok(())
    }

    /// Books an L2 -> L1 burn; the amount counts towards remote TVL until acknowledged.
    pub fn record_transfer_to_l1(&mut self, amount: u64) -> Result<()> {
        self.lock.begin_transfer_to_l1()?;
        self.in_transit_to_l1 = self
            .in_transit_to_l1
            .checked_add(amount)
            .ok_or(VaultError::MathOverflow)?;
        self.sync_other_chain_tvl();
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{escrow::BridgeLock, state::Vault, types::Address};

    fn l2_with_balance(balance: u64) -> (L2Vault, TokenLedger) {
        let vault = Vault::new(Address::derive("l2-vault"), Address::derive("governance"));
        let mut ledger = TokenLedger::new("USDC", 6);
        ledger.mint(vault.address, balance).unwrap();
        (L2Vault::new(vault), ledger)
    }

    #[test]
    fn test_empty_l2_requests_a_tenth() {
        let (l2, ledger) = l2_with_balance(0);
        assert_eq!(
            l2.plan_rebalance(&ledger, 1_000).unwrap(),
            RebalanceAction::RequestFromL1(100)
        );
    }

    #[test]
    fn test_overweight_l2_sends_to_l1() {
        let (l2, ledger) = l2_with_balance(1_000);
        assert_eq!(
            l2.plan_rebalance(&ledger, 0).unwrap(),
            RebalanceAction::TransferToL1(900)
        );
    }

    #[test]
    fn test_balanced_or_within_delta_does_nothing() {
        let (mut l2, ledger) = l2_with_balance(100);
        assert_eq!(l2.plan_rebalance(&ledger, 900).unwrap(), RebalanceAction::None);
        l2.rebalance_delta = 50;
        assert_eq!(l2.plan_rebalance(&ledger, 940).unwrap(), RebalanceAction::None);
        assert_eq!(
            l2.plan_rebalance(&ledger, 1_500).unwrap(),
            RebalanceAction::RequestFromL1(60)
        );
    }

    #[test]
    fn test_in_transit_funds_stay_in_remote_tvl_until_acknowledged() {
        let (mut l2, _) = l2_with_balance(0);
        l2.record_transfer_to_l1(900).unwrap();
        assert_eq!(l2.vault.other_chain_tvl, 900);
        assert!(!l2.lock.can_transfer_to_l1());

        // A report sent before L1 cleared the funds keeps the lock.
        assert!(!l2.record_l1_tvl(0, false, 10));
        assert_eq!(l2.vault.other_chain_tvl, 900);

        assert!(l2.record_l1_tvl(900, true, 11));
        assert_eq!(l2.lock, BridgeLock::Idle);
        assert_eq!(l2.vault.other_chain_tvl, 900);
    }

    #[test]
    fn test_funds_from_l1_require_open_request() {
        let (mut l2, _) = l2_with_balance(0);
        l2.record_l1_tvl(1_000, false, 1);
        assert!(l2.record_funds_from_l1(100).is_err());
        l2.lock.begin_request_from_l1().unwrap();
        l2.record_funds_from_l1(100).unwrap();
        assert_eq!(l2.l1_tvl, 900);
        assert!(l2.lock.is_idle());
    }
}
