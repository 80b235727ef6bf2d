use tracing::debug;

use crate::{
    error::{Result, VaultError},
    state::Vault,
    token::TokenLedger,
    types::Address,
};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct ReportOutcome {
    pub gain: u64,
    pub loss: u64,
    pub debt_paid: u64,
    pub credit: u64,
    pub current_debt: u64,
}

impl Vault {
    /// Settles a strategy's periodic report.
    ///
    /// Losses reduce the strategy's debt, gain and debt repayment are pulled
    /// into the vault, and fresh credit is extended up to the strategy's
    /// allowance within its per-harvest bounds. Only the strategy itself may
    /// report.
    pub fn report(
        &mut self,
        ledger: &mut TokenLedger,
        caller: Address,
        gain: u64,
        loss: u64,
        debt_payment: u64,
        block: u64,
    ) -> Result<ReportOutcome> {
        let index = self
            .strategy_index(caller)
            .map_err(|_| VaultError::Unauthorized("a registered strategy"))?;

        let debt = self.strategies[index].params.current_debt;
        if loss > debt {
            return Err(VaultError::LossExceedsDebt);
        }
        let debt_paid = debt_payment.min(self.debt_outstanding(ledger, caller)?.saturating_sub(loss));
        let returned = gain.checked_add(debt_paid).ok_or(VaultError::MathOverflow)?;
        if ledger.balance_of(caller) < returned {
            return Err(VaultError::InsufficientBalance);
        }

        let debt_reduction = loss + debt_paid;
        ledger.transfer(caller, self.address, returned)?;
        {
            let params = &mut self.strategies[index].params;
            params.current_debt -= debt_reduction;
            params.total_loss = params.total_loss.saturating_add(loss);
            params.total_gain = params.total_gain.saturating_add(gain);
            params.last_report = block;
        }
        self.total_debt = self
            .total_debt
            .checked_sub(debt_reduction)
            .ok_or(VaultError::MathOverflow)?;

        let credit = self.harvest_credit(ledger, index)?;
        if credit > 0 {
            ledger.transfer(self.address, caller, credit)?;
            self.strategies[index].params.current_debt += credit;
            self.total_debt = self
                .total_debt
                .checked_add(credit)
                .ok_or(VaultError::MathOverflow)?;
        }

        let outcome = ReportOutcome {
            gain,
            loss,
            debt_paid,
            credit,
            current_debt: self.strategies[index].params.current_debt,
        };
        debug!(vault = %self.address, strategy = %caller, ?outcome, "Strategy reported");
        Ok(outcome)
    }

    /// Credit to hand out this harvest: allowance capped by idle funds and `max_debt_per_harvest`,
    /// zero below `min_debt_per_harvest`.
    fn harvest_credit(&self, ledger: &TokenLedger, index: usize) -> Result<u64> {
        let strategy = self.strategies[index].address();
        let params = &self.strategies[index].params;
        let credit = self
            .credit_available(ledger, strategy)?
            .min(self.local_balance(ledger))
            .min(params.max_debt_per_harvest);
        if credit < params.min_debt_per_harvest {
            return Ok(0);
        }
        Ok(credit)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::strategy::HoldingStrategy;

    fn setup(debt_ratio: u64, min: u64, max: u64) -> (Vault, TokenLedger, Address) {
        let governance = Address::derive("governance");
        let strategy = Address::derive("strategy");
        let mut ledger = TokenLedger::new("USDC", 6);
        let mut vault = Vault::new(Address::derive("vault"), governance);
        ledger.mint(vault.address, 1_000).unwrap();
        vault
            .add_strategy(
                governance,
                Box::new(HoldingStrategy::new(strategy, 1)),
                debt_ratio,
                min,
                max,
                1,
            )
            .unwrap();
        (vault, ledger, strategy)
    }

    #[test]
    fn test_first_report_extends_credit_to_ratio() {
        let (mut vault, mut ledger, strategy) = setup(6_000, 0, u64::MAX);
        let outcome = vault.report(&mut ledger, strategy, 0, 0, 0, 5).unwrap();
        assert_eq!(outcome.credit, 600);
        assert_eq!(ledger.balance_of(strategy), 600);
        assert_eq!(vault.total_debt, 600);
        assert_eq!(vault.vault_tvl(&ledger).unwrap(), 1_000);
        assert_eq!(vault.strategy_params(strategy).unwrap().last_report, 5);
    }

    #[test]
    fn test_gain_is_pulled_and_raises_tvl() {
        let (mut vault, mut ledger, strategy) = setup(5_000, 0, u64::MAX);
        vault.report(&mut ledger, strategy, 0, 0, 0, 2).unwrap();
        ledger.mint(strategy, 100).unwrap();

        let outcome = vault.report(&mut ledger, strategy, 100, 0, 0, 3).unwrap();
        assert_eq!(outcome.gain, 100);
        // TVL 1100 → allowance 550, debt 500 → 50 more credit.
        assert_eq!(outcome.credit, 50);
        assert_eq!(vault.vault_tvl(&ledger).unwrap(), 1_100);
        assert_eq!(vault.strategy_params(strategy).unwrap().total_gain, 100);
    }

    #[test]
    fn test_loss_writes_down_debt() {
        let (mut vault, mut ledger, strategy) = setup(5_000, 0, u64::MAX);
        vault.report(&mut ledger, strategy, 0, 0, 0, 2).unwrap();
        ledger.burn(strategy, 200).unwrap();

        let outcome = vault.report(&mut ledger, strategy, 0, 200, 0, 3).unwrap();
        assert_eq!(outcome.loss, 200);
        // TVL 800 → allowance 400, debt 300 → 100 credit.
        assert_eq!(outcome.credit, 100);
        assert_eq!(vault.total_debt, 400);
        assert_eq!(vault.vault_tvl(&ledger).unwrap(), 800);
        assert_eq!(
            vault.report(&mut ledger, strategy, 0, 1_000, 0, 4),
            Err(VaultError::LossExceedsDebt)
        );
    }

    #[test]
    fn test_ratio_cut_is_repaid_on_report() {
        let (mut vault, mut ledger, strategy) = setup(5_000, 0, u64::MAX);
        let governance = vault.governance;
        vault.report(&mut ledger, strategy, 0, 0, 0, 2).unwrap();
        vault.update_strategy_debt_ratio(governance, strategy, 2_000).unwrap();
        assert_eq!(vault.debt_outstanding(&ledger, strategy).unwrap(), 300);

        let outcome = vault.report(&mut ledger, strategy, 0, 0, 1_000, 3).unwrap();
        assert_eq!(outcome.debt_paid, 300);
        assert_eq!(outcome.credit, 0);
        assert_eq!(vault.total_debt, 200);
    }

    #[test]
    fn test_harvest_bounds() {
        let (mut vault, mut ledger, strategy) = setup(5_000, 0, 100);
        assert_eq!(vault.report(&mut ledger, strategy, 0, 0, 0, 2).unwrap().credit, 100);

        let (mut vault, mut ledger, strategy) = setup(5_000, 600, u64::MAX);
        assert_eq!(vault.report(&mut ledger, strategy, 0, 0, 0, 2).unwrap().credit, 0);
    }

    #[test]
    fn test_unregistered_caller_cannot_report() {
        let (mut vault, mut ledger, _) = setup(5_000, 0, u64::MAX);
        assert_eq!(
            vault.report(&mut ledger, Address::derive("someone"), 0, 0, 0, 2),
            Err(VaultError::Unauthorized("a registered strategy"))
        );
    }
}
