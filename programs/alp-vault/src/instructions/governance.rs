use std::collections::HashSet;

use tracing::info;

use crate::{
    constants::MAX_BPS,
    error::{Result, VaultError},
    state::Vault,
    strategy::{Strategy, StrategyEntry, StrategyParams},
    token::TokenLedger,
    types::Address,
};

impl Vault {
    fn require_governance(&self, caller: Address) -> Result<()> {
        if caller != self.governance {
            return Err(VaultError::Unauthorized("governance"));
        }
        Ok(())
    }

    /// Registers `adapter` at the end of the withdrawal queue.
    pub fn add_strategy(
        &mut self,
        caller: Address,
        adapter: Box<dyn Strategy>,
        debt_ratio: u64,
        min_debt_per_harvest: u64,
        max_debt_per_harvest: u64,
        block: u64,
    ) -> Result<()> {
        self.require_governance(caller)?;
        let address = adapter.address();
        if self.strategy_index(address).is_ok() {
            return Err(VaultError::StrategyAlreadyAdded);
        }
        if min_debt_per_harvest > max_debt_per_harvest {
            return Err(VaultError::InvalidHarvestBounds);
        }
        if self.total_debt_ratio().saturating_add(debt_ratio) > MAX_BPS {
            return Err(VaultError::DebtRatioExceeded);
        }

        info!(
            vault = %self.address,
            strategy = %address,
            version = adapter.version(),
            debt_ratio,
            "Strategy added"
        );
        self.strategies.push(StrategyEntry {
            params: StrategyParams {
                debt_ratio,
                min_debt_per_harvest,
                max_debt_per_harvest,
                activation: block,
                last_report: block,
                ..Default::default()
            },
            adapter,
        });
        Ok(())
    }

    /// Unregisters a strategy that no longer holds debt.
    pub fn remove_strategy(&mut self, caller: Address, strategy: Address) -> Result<()> {
        self.require_governance(caller)?;
        let index = self.strategy_index(strategy)?;
        if self.strategies[index].params.current_debt > 0 {
            return Err(VaultError::StrategyHasDebt);
        }
        self.strategies.remove(index);
        info!(vault = %self.address, %strategy, "Strategy removed");
        Ok(())
    }

    pub fn update_strategy_debt_ratio(
        &mut self,
        caller: Address,
        strategy: Address,
        debt_ratio: u64,
    ) -> Result<()> {
        self.update_many_strategy_debt_ratios(caller, &[(strategy, debt_ratio)])
    }

    /// Applies all ratio changes or none of them.
    pub fn update_many_strategy_debt_ratios(
        &mut self,
        caller: Address,
        updates: &[(Address, u64)],
    ) -> Result<()> {
        self.require_governance(caller)?;
        let mut ratios: Vec<u64> = self.strategies.iter().map(|s| s.params.debt_ratio).collect();
        for (strategy, debt_ratio) in updates {
            ratios[self.strategy_index(*strategy)?] = *debt_ratio;
        }
        let total = ratios
            .iter()
            .try_fold(0u64, |acc, ratio| acc.checked_add(*ratio))
            .ok_or(VaultError::MathOverflow)?;
        if total > MAX_BPS {
            return Err(VaultError::DebtRatioExceeded);
        }

        for (entry, ratio) in self.strategies.iter_mut().zip(ratios) {
            entry.params.debt_ratio = ratio;
        }
        Ok(())
    }

    /// Reorders the withdrawal queue; `order` must be a permutation of the registered strategies.
    pub fn set_withdrawal_queue(&mut self, caller: Address, order: &[Address]) -> Result<()> {
        self.require_governance(caller)?;
        let unique: HashSet<&Address> = order.iter().collect();
        if order.len() != self.strategies.len() || unique.len() != order.len() {
            return Err(VaultError::InvalidWithdrawalQueue);
        }
        let mut positions = Vec::with_capacity(order.len());
        for strategy in order {
            positions.push(
                self.strategy_index(*strategy)
                    .map_err(|_| VaultError::InvalidWithdrawalQueue)?,
            );
        }

        let mut entries: Vec<Option<StrategyEntry>> =
            std::mem::take(&mut self.strategies).into_iter().map(Some).collect();
        self.strategies = positions
            .into_iter()
            .filter_map(|index| entries[index].take())
            .collect();
        Ok(())
    }

    /// Governance-triggered divestment of up to `amount` from strategies.
    pub fn liquidate(&mut self, caller: Address, ledger: &mut TokenLedger, amount: u64) -> Result<u64> {
        self.require_governance(caller)?;
        self.free_funds(ledger, amount)
    }
}
